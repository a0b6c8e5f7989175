use std::{path::Path, time::Duration};

use crate::exec::Executor;
use crate::model::{TestCase, TestCaseResult};
use crate::sql;

/// What to execute once per test case.
#[derive(Debug, Clone, Copy)]
pub enum ProgramSpec<'a> {
    /// An already-planned (and, if needed, compiled) command run inside the
    /// request's workspace.
    Command {
        argv: &'a [String],
        cwd: &'a Path,
        executor: &'a Executor,
    },
    /// Candidate SQL re-evaluated against a fresh in-memory store per case.
    Sql {
        setup: Option<&'a str>,
        source: &'a str,
        time_limit: Duration,
    },
}

/// Runs every test case independently; one case's failure (crash, timeout,
/// spawn error) becomes an `Error: ...` actual output for that case only and
/// never aborts the remaining cases.
pub async fn run_cases(spec: ProgramSpec<'_>, cases: &[TestCase]) -> Vec<TestCaseResult> {
    let mut results = Vec::with_capacity(cases.len());
    for case in cases {
        let actual = run_single(spec, &case.input).await;
        let passed = outputs_match(&actual, &case.expected_output);
        results.push(TestCaseResult {
            input: case.input.clone(),
            expected_output: case.expected_output.clone(),
            actual_output: actual,
            passed,
        });
    }
    results
}

async fn run_single(spec: ProgramSpec<'_>, input: &str) -> String {
    let res = match spec {
        ProgramSpec::Command {
            argv,
            cwd,
            executor,
        } => executor.run(argv, input, cwd).await,
        ProgramSpec::Sql {
            setup,
            source,
            time_limit,
        } => {
            let setup = setup.map(str::to_owned);
            let source = source.to_owned();
            tokio::task::spawn_blocking(move || {
                sql::evaluate(setup.as_deref(), &source, time_limit)
            })
            .await
            .unwrap_or_else(|e| Err(anyhow::anyhow!("SQL evaluation panicked: {}", e)))
        }
    };

    match res {
        Err(e) => format!("Error: {:#}", e),
        Ok(r) if r.timed_out => format!(
            "Error: execution timed out after {} ms",
            r.wall_time.as_millis()
        ),
        Ok(r) if !r.success() && !r.stderr.trim().is_empty() => {
            format!("Error: {}", r.stderr.trim())
        }
        Ok(r) => normalize_output(&r.stdout),
    }
}

/// Whitespace-normalized exact match, then numeric equivalence, then JSON
/// value equality (so `[0,1]` matches `[0, 1]` and `5` matches `5.0`).
pub fn outputs_match(actual: &str, expected: &str) -> bool {
    let actual = normalize_output(actual);
    let expected = normalize_output(expected);
    if actual == expected {
        return true;
    }
    if let (Ok(a), Ok(e)) = (actual.parse::<f64>(), expected.parse::<f64>()) {
        return (a - e).abs() < 1e-9;
    }
    if let (Ok(a), Ok(e)) = (
        serde_json::from_str::<serde_json::Value>(&actual),
        serde_json::from_str::<serde_json::Value>(&expected),
    ) {
        return a == e;
    }
    false
}

/// Collapses runs of spaces/tabs to one space and blank lines to single
/// newlines, then trims. Keeps line structure so multi-line output still has
/// to match line for line.
pub fn normalize_output(s: &str) -> String {
    let mut lines: Vec<String> = Vec::new();
    for line in s.lines() {
        let collapsed = line.split_whitespace().collect::<Vec<_>>().join(" ");
        if collapsed.is_empty() && lines.last().map_or(true, String::is_empty) {
            continue;
        }
        lines.push(collapsed);
    }
    while lines.last().map_or(false, String::is_empty) {
        lines.pop();
    }
    lines.join("\n")
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn exact_match_after_normalization() {
        assert!(outputs_match("5\n", "5"));
        assert!(outputs_match("a   b\tc", "a b c"));
        assert!(outputs_match("1\n\n\n2\n", "1\n2"));
        assert!(!outputs_match("hello", "world"));
    }

    #[test]
    fn numeric_equivalence_bridges_formatting() {
        assert!(outputs_match("5.0", "5"));
        assert!(outputs_match("3.14159", "3.14159"));
        assert!(!outputs_match("5.1", "5"));
    }

    #[test]
    fn json_equivalence_bridges_spacing() {
        assert!(outputs_match("[0,1]", "[0, 1]"));
        assert!(outputs_match(r#"{"a": 1, "b": 2}"#, r#"{"b":2,"a":1}"#));
        assert!(!outputs_match("[0,1]", "[1,0]"));
    }

    #[tokio::test]
    async fn cases_run_independently() {
        let registry = crate::toolchain::ToolchainRegistry::probe();
        let plan = registry
            .plan(
                crate::model::Language::Python,
                Path::new("."),
                Path::new("unused.py"),
            )
            .expect("python3 is required for harness tests");
        let argv = vec![
            plan.run[0].clone(),
            "-c".to_owned(),
            "a, b = input().split(); print(int(a) + int(b))".to_owned(),
        ];
        let executor = Executor::new(Duration::from_secs(5));
        let cases = vec![
            TestCase {
                input: "2 3".into(),
                expected_output: "5".into(),
            },
            TestCase {
                input: "not numbers".into(),
                expected_output: "0".into(),
            },
            TestCase {
                input: "10 -4".into(),
                expected_output: "6".into(),
            },
        ];
        let results = run_cases(
            ProgramSpec::Command {
                argv: &argv,
                cwd: Path::new("."),
                executor: &executor,
            },
            &cases,
        )
        .await;

        assert!(results[0].passed);
        assert!(!results[1].passed);
        assert!(results[1].actual_output.starts_with("Error:"));
        assert!(results[2].passed);
    }

    #[tokio::test]
    async fn sql_cases_get_a_fresh_store_each_time() {
        let spec = ProgramSpec::Sql {
            setup: Some("CREATE TABLE t (x INTEGER); INSERT INTO t VALUES (1);"),
            source: "INSERT INTO t VALUES (2); SELECT count(*) FROM t;",
            time_limit: Duration::from_secs(10),
        };
        let cases = vec![
            TestCase {
                input: String::new(),
                expected_output: "unused".into(),
            },
            TestCase {
                input: String::new(),
                expected_output: "unused".into(),
            },
        ];
        let results = run_cases(spec, &cases).await;
        // Both cases see the same row count: no state leaks across cases.
        assert_eq!(results[0].actual_output, results[1].actual_output);
        assert!(results[0].actual_output.contains("\"row_count\": 1"));
    }
}
