use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use coderound_judge::{CaseReport, JudgeAssessment, JudgeClient, JudgeRequest};

use crate::config::EngineConfig;
use crate::error::{Error, Result};
use crate::exec::Executor;
use crate::harness::{self, ProgramSpec};
use crate::model::*;
use crate::sql;
use crate::toolchain::{self, ToolchainRegistry};
use crate::workspace::Workspace;

/// Seam to the LLM judge so tests can script its behavior.
#[async_trait]
pub trait Judge: Send + Sync {
    async fn assess(&self, req: JudgeRequest) -> coderound_judge::Result<JudgeAssessment>;
}

#[async_trait]
impl Judge for JudgeClient {
    async fn assess(&self, req: JudgeRequest) -> coderound_judge::Result<JudgeAssessment> {
        JudgeClient::assess(self, &req).await
    }
}

/// The evaluation engine. One instance serves many concurrent requests: the
/// toolchain registry is probed once at construction and only ever read, and
/// each request gets its own workspace and in-memory SQL store.
pub struct Engine {
    registry: ToolchainRegistry,
    config: EngineConfig,
    judge: Option<Arc<dyn Judge>>,
}

/// Everything EXECUTE + RUN_TESTS produced, handed to JUDGE and FINALIZE.
struct PipelineOutcome {
    execution_summary: String,
    compile_error: bool,
    timed_out: bool,
    test_results: Vec<TestCaseResult>,
}

impl Engine {
    pub fn new(config: EngineConfig) -> Self {
        let judge: Option<Arc<dyn Judge>> = if config.judge.enabled {
            match std::env::var(&config.judge.api_key_env) {
                Ok(key) if !key.is_empty() => Some(Arc::new(JudgeClient::new(
                    config.judge.endpoint.clone(),
                    config.judge.model.clone(),
                    key,
                    Duration::from_millis(config.judge.request_timeout_ms),
                ))),
                _ => {
                    log::info!(
                        "Judge disabled: environment variable '{}' is not set",
                        config.judge.api_key_env
                    );
                    None
                }
            }
        } else {
            None
        };
        Self {
            registry: ToolchainRegistry::probe(),
            config,
            judge,
        }
    }

    pub fn with_judge(mut self, judge: Arc<dyn Judge>) -> Self {
        self.judge = Some(judge);
        self
    }

    pub fn with_registry(mut self, registry: ToolchainRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn registry(&self) -> &ToolchainRegistry {
        &self.registry
    }

    /// Runs the EXECUTE → RUN_TESTS → JUDGE → FINALIZE pipeline for one
    /// submission.
    ///
    /// Only `UnsupportedLanguage` and `ToolchainUnavailable` surface as
    /// errors; every other condition (compile error, crash, timeout, unsafe
    /// SQL, judge trouble) is absorbed into the returned `Verdict`.
    pub async fn evaluate(&self, req: &EvaluateRequest) -> Result<Verdict> {
        let language = Language::from_str(&req.language)
            .map_err(|_| Error::UnsupportedLanguage(req.language.clone()))?;

        let outcome = match language {
            Language::Sql => self.run_sql_pipeline(req).await,
            _ => self.run_program_pipeline(language, req).await?,
        };

        let assessment = match &self.judge {
            // A timed-out run carries nothing worth judging.
            None => None,
            Some(_) if outcome.timed_out => None,
            Some(judge) => {
                let judge_req = JudgeRequest {
                    source: req.source.clone(),
                    language: language.to_string(),
                    difficulty: req.difficulty.map(|d| d.to_string()),
                    execution_summary: outcome.execution_summary.clone(),
                    cases: outcome
                        .test_results
                        .iter()
                        .map(|t| CaseReport {
                            input: t.input.clone(),
                            expected: t.expected_output.clone(),
                            actual: t.actual_output.clone(),
                        })
                        .collect(),
                };
                match judge.assess(judge_req).await {
                    Ok(a) => Some(a),
                    Err(e) if e.is_unavailable() => {
                        log::warn!("Judge unavailable, using deterministic scoring: {:#}", e);
                        None
                    }
                    Err(e) => {
                        log::warn!("Judge verdict unusable, using deterministic scoring: {:#}", e);
                        None
                    }
                }
            }
        };

        Ok(self.finalize(req, outcome, assessment))
    }

    /// EXECUTE + RUN_TESTS for languages that run as a child process.
    async fn run_program_pipeline(
        &self,
        language: Language,
        req: &EvaluateRequest,
    ) -> Result<PipelineOutcome> {
        self.registry.ensure_available(language)?;

        let ws = match Workspace::create() {
            Ok(ws) => ws,
            Err(e) => return Ok(PipelineOutcome::infra_error(format!("{:#}", e))),
        };
        let source_name = toolchain::source_filename(language, &req.source);
        let src_path = match ws.write_source(&source_name, &req.source).await {
            Ok(p) => p,
            Err(e) => {
                ws.release();
                return Ok(PipelineOutcome::infra_error(format!("{:#}", e)));
            }
        };
        let plan = match self.registry.plan(language, ws.dirpath(), &src_path) {
            Ok(p) => p,
            Err(e) => {
                ws.release();
                return Err(e);
            }
        };

        let caps = (
            self.config.exec.stdout_capture_max_bytes,
            self.config.exec.stderr_capture_max_bytes,
        );

        if let Some(compile_argv) = &plan.compile {
            log::info!("Compiling {}", source_name);
            let compiler =
                Executor::new(self.config.exec.compile_time_limit()).capture_max_bytes(caps.0, caps.1);
            match compiler.run(compile_argv, "", ws.dirpath()).await {
                Err(e) => {
                    ws.release();
                    return Ok(PipelineOutcome::infra_error(format!("{:#}", e)));
                }
                Ok(r) if r.timed_out => {
                    ws.release();
                    return Ok(PipelineOutcome {
                        execution_summary: timeout_message(compiler.time_limit()),
                        compile_error: false,
                        timed_out: true,
                        test_results: Vec::new(),
                    });
                }
                Ok(r) if !r.success() => {
                    // Run step is never invoked after a failed compile.
                    ws.release();
                    return Ok(PipelineOutcome {
                        execution_summary: compile_error_message(language, &r),
                        compile_error: true,
                        timed_out: false,
                        test_results: Vec::new(),
                    });
                }
                Ok(_) => {}
            }
        }

        let executor =
            Executor::new(self.config.exec.time_limit_for(language)).capture_max_bytes(caps.0, caps.1);
        log::info!("Running: {}", plan.run.join(" "));
        let execution = match executor.run(&plan.run, &req.stdin, ws.dirpath()).await {
            Ok(r) => r,
            Err(e) => {
                ws.release();
                return Ok(PipelineOutcome::infra_error(format!("{:#}", e)));
            }
        };

        if execution.timed_out {
            ws.release();
            return Ok(PipelineOutcome {
                execution_summary: timeout_message(executor.time_limit()),
                compile_error: false,
                timed_out: true,
                test_results: Vec::new(),
            });
        }

        let test_results = harness::run_cases(
            ProgramSpec::Command {
                argv: &plan.run,
                cwd: ws.dirpath(),
                executor: &executor,
            },
            &req.test_cases,
        )
        .await;
        ws.release();

        Ok(PipelineOutcome {
            execution_summary: execution_summary(language, &execution),
            compile_error: false,
            timed_out: false,
            test_results,
        })
    }

    /// EXECUTE + RUN_TESTS for SQL; runs in-process against a store that
    /// exists only for this request.
    async fn run_sql_pipeline(&self, req: &EvaluateRequest) -> PipelineOutcome {
        let time_limit = self.config.exec.time_limit_for(Language::Sql);
        let setup = req.sql_setup.clone();
        let source = req.source.clone();
        let execution = tokio::task::spawn_blocking(move || {
            sql::evaluate(setup.as_deref(), &source, time_limit)
        })
        .await
        .unwrap_or_else(|e| Err(anyhow::anyhow!("SQL evaluation panicked: {}", e)));

        let execution = match execution {
            Ok(r) => r,
            Err(e) => return PipelineOutcome::infra_error(format!("{:#}", e)),
        };

        let test_results = harness::run_cases(
            ProgramSpec::Sql {
                setup: req.sql_setup.as_deref(),
                source: &req.source,
                time_limit,
            },
            &req.test_cases,
        )
        .await;

        PipelineOutcome {
            execution_summary: execution_summary(Language::Sql, &execution),
            compile_error: false,
            timed_out: false,
            test_results,
        }
    }

    /// FINALIZE: merge test results with the judge's assessment (or the
    /// deterministic fallback), clamp, and guarantee non-empty fields.
    fn finalize(
        &self,
        req: &EvaluateRequest,
        outcome: PipelineOutcome,
        assessment: Option<JudgeAssessment>,
    ) -> Verdict {
        let policy = &self.config.fallback;
        let passed = outcome.test_results.iter().filter(|t| t.passed).count() as u32;
        let total = if outcome.timed_out {
            req.test_cases.len() as u32
        } else {
            outcome.test_results.len() as u32
        };
        let pass_ratio_ok =
            total > 0 && f64::from(passed) >= policy.pass_ratio_threshold * f64::from(total);

        let (mut correctness, mut score, mut feedback, time_c, space_c, reference) =
            match assessment {
                Some(a) => {
                    let mut correctness = a.correctness;
                    let mut score = a.score.clamp(0, 100) as u8;
                    // Deterministic test results outrank the judge's opinion
                    // when most cases pass.
                    if total > 0 && passed == total {
                        correctness = true;
                        if score < 80 {
                            score = policy.pass_score;
                        }
                    } else if pass_ratio_ok {
                        correctness = true;
                        let ratio = f64::from(passed) / f64::from(total);
                        score = score.max(70 + (ratio * 15.0) as u8);
                    }
                    (
                        correctness,
                        score,
                        a.feedback,
                        a.time_complexity,
                        a.space_complexity,
                        a.reference_solution,
                    )
                }
                None => {
                    let (correctness, score, feedback) =
                        self.fallback_scoring(&outcome, passed, total);
                    (correctness, score, feedback, String::new(), String::new(), String::new())
                }
            };

        // Consistency clamps: a correct solution never scores below 75, an
        // incorrect one never above 50.
        if correctness {
            score = score.max(75);
        } else {
            score = score.min(50);
        }

        // A compile/syntax failure overrides the judge outright.
        if outcome.compile_error {
            correctness = false;
            score = 0;
        }
        if outcome.timed_out {
            correctness = false;
            score = 0;
            feedback = outcome.execution_summary.clone();
        }

        Verdict {
            correctness,
            score,
            feedback: non_empty(feedback, || default_feedback(correctness)),
            execution_output: non_empty(outcome.execution_summary, || {
                "No execution data available".to_owned()
            }),
            test_cases_passed: passed,
            total_test_cases: total,
            time_complexity: non_empty(time_c, || "Not analyzed".to_owned()),
            space_complexity: non_empty(space_c, || "Not analyzed".to_owned()),
            reference_solution: non_empty(reference, || {
                "Reference solution unavailable for this submission.".to_owned()
            }),
        }
    }

    /// Deterministic scoring when the judge is unavailable or unusable.
    fn fallback_scoring(
        &self,
        outcome: &PipelineOutcome,
        passed: u32,
        total: u32,
    ) -> (bool, u8, String) {
        let policy = &self.config.fallback;
        if total == 0 {
            let feedback = format!(
                "Code execution analysis:\n\n{}\n\nNo test cases were provided, \
                 so only execution behavior was checked.",
                outcome.execution_summary
            );
            return (false, policy.neutral_score, feedback);
        }

        let correct = passed == total
            || f64::from(passed) >= policy.pass_ratio_threshold * f64::from(total);
        let score = if correct {
            policy.pass_score
        } else {
            (f64::from(policy.partial_score_scale) * f64::from(passed) / f64::from(total)) as u8
        };

        let mut feedback = format!(
            "Test case analysis:\n\nYour solution passed {} out of {} test cases.\n",
            passed, total
        );
        for (i, t) in outcome.test_results.iter().enumerate() {
            feedback.push_str(&format!(
                "\nTest {}: {}\n  Input: {}\n  Expected: {}\n  Got: {}",
                i + 1,
                if t.passed { "PASSED" } else { "FAILED" },
                t.input,
                t.expected_output,
                t.actual_output,
            ));
        }
        if correct {
            feedback.push_str("\n\nGreat job! Your solution passed the test cases.");
        } else {
            feedback.push_str("\n\nReview the failed cases and refine your solution.");
        }
        (correct, score, feedback)
    }
}

impl PipelineOutcome {
    fn infra_error(msg: String) -> Self {
        Self {
            execution_summary: format!("Execution error: {}", msg),
            compile_error: false,
            timed_out: false,
            test_results: Vec::new(),
        }
    }
}

fn non_empty(s: String, default: impl FnOnce() -> String) -> String {
    if s.trim().is_empty() {
        default()
    } else {
        s
    }
}

fn default_feedback(correctness: bool) -> String {
    if correctness {
        "Your solution works correctly and handles the main requirement. \
         Keep practicing to improve consistency."
            .to_owned()
    } else {
        "Your solution needs some adjustments. Review the execution output, \
         check the error messages carefully, and verify your logic handles \
         all test cases."
            .to_owned()
    }
}

fn timeout_message(limit: Duration) -> String {
    format!(
        "Execution timeout ({} seconds exceeded). Your code took too long to \
         execute.\n\nTip: check for infinite loops, optimize your algorithm, \
         or reduce input size.",
        limit.as_secs()
    )
}

fn compile_error_message(language: Language, result: &ExecutionResult) -> String {
    let detail = if result.stderr.trim().is_empty() {
        result.stdout.trim()
    } else {
        result.stderr.trim()
    };
    let tip = match language {
        Language::Java => {
            "Tip: ensure your class name matches the file name and all syntax is correct."
        }
        _ => "Tip: check for syntax errors, missing includes, or undefined references.",
    };
    format!(
        "Compilation Error:\n{}\n\n{}",
        if detail.is_empty() {
            "Compilation failed"
        } else {
            detail
        },
        tip
    )
}

fn execution_summary(language: Language, result: &ExecutionResult) -> String {
    if result.success() {
        if result.stdout.trim().is_empty() {
            "Code executed successfully but produced no output.\nThis is normal \
             for programs that only define functions."
                .to_owned()
        } else {
            format!("Output: {}", result.stdout.trim_end())
        }
    } else {
        let mut msg = format!("Execution Error:\n{}", result.stderr.trim_end());
        if language == Language::Python && is_missing_module(&result.stderr) {
            msg.push_str(
                "\n\nNote: third-party modules are not available in the execution \
                 environment. Please use the standard library only.",
            );
        }
        msg
    }
}

fn is_missing_module(stderr: &str) -> bool {
    let lower = stderr.to_lowercase();
    lower.contains("modulenotfounderror") || lower.contains("no module named")
}

#[cfg(test)]
mod test {
    use super::*;

    struct ScriptedJudge(std::result::Result<JudgeAssessment, ()>);

    #[async_trait]
    impl Judge for ScriptedJudge {
        async fn assess(
            &self,
            _req: JudgeRequest,
        ) -> coderound_judge::Result<JudgeAssessment> {
            match &self.0 {
                Ok(a) => Ok(a.clone()),
                Err(()) => Err(coderound_judge::Error::EmptyResponse),
            }
        }
    }

    fn offline_engine() -> Engine {
        let mut config = EngineConfig::default();
        config.judge.enabled = false;
        Engine::new(config)
    }

    fn addition_request(cases: &[(&str, &str)]) -> EvaluateRequest {
        EvaluateRequest {
            source: "a, b = input().split()\nprint(int(a) + int(b))".into(),
            language: "python".into(),
            stdin: "1 1".into(),
            sql_setup: None,
            test_cases: cases
                .iter()
                .map(|(i, o)| TestCase {
                    input: (*i).into(),
                    expected_output: (*o).into(),
                })
                .collect(),
            difficulty: Some(Difficulty::Easy),
        }
    }

    #[tokio::test]
    async fn unsupported_language_fails_fast() {
        let engine = offline_engine();
        let mut req = addition_request(&[]);
        req.language = "cobol".into();
        match engine.evaluate(&req).await {
            Err(Error::UnsupportedLanguage(tag)) => assert_eq!(tag, "cobol"),
            other => panic!("unexpected result: {:?}", other.map(|v| v.score)),
        }
    }

    #[tokio::test]
    async fn missing_toolchain_is_terminal() {
        let engine = offline_engine().with_registry(ToolchainRegistry::empty());
        let req = addition_request(&[("2 3", "5")]);
        match engine.evaluate(&req).await {
            Err(Error::ToolchainUnavailable { binary, .. }) => assert_eq!(binary, "python3"),
            other => panic!("unexpected result: {:?}", other.map(|v| v.score)),
        }
    }

    #[tokio::test]
    async fn fallback_eighty_percent_counts_as_correct() {
        let engine = offline_engine();
        let req = addition_request(&[
            ("1 2", "3"),
            ("2 3", "5"),
            ("10 5", "15"),
            ("0 0", "0"),
            ("1 1", "999"), // deliberate mismatch
        ]);
        let v = engine.evaluate(&req).await.unwrap();
        assert_eq!(v.test_cases_passed, 4);
        assert_eq!(v.total_test_cases, 5);
        assert!(v.correctness);
        assert_eq!(v.score, 85);
    }

    #[tokio::test]
    async fn fallback_partial_credit_is_floored() {
        let engine = offline_engine();
        let req = addition_request(&[
            ("1 2", "3"),
            ("2 3", "5"),
            ("10 5", "15"),
            ("0 0", "1"), // mismatch
            ("1 1", "3"), // mismatch
        ]);
        let v = engine.evaluate(&req).await.unwrap();
        assert_eq!(v.test_cases_passed, 3);
        assert!(!v.correctness);
        assert_eq!(v.score, 36); // floor(60 * 3/5)
    }

    #[tokio::test]
    async fn fallback_without_cases_is_neutral() {
        let engine = offline_engine();
        let req = addition_request(&[]);
        let v = engine.evaluate(&req).await.unwrap();
        assert_eq!(v.score, 50);
        assert!(!v.correctness);
        assert!(!v.feedback.is_empty());
    }

    #[tokio::test]
    async fn judge_verdict_is_used_when_available() {
        let judge = ScriptedJudge(Ok(JudgeAssessment {
            correctness: true,
            score: 95,
            feedback: "Elegant.".into(),
            reference_solution: "print(sum(map(int, input().split())))".into(),
            time_complexity: "O(1)".into(),
            space_complexity: "O(1)".into(),
            test_cases_passed: None,
            total_test_cases: None,
        }));
        let engine = offline_engine().with_judge(Arc::new(judge));
        let req = addition_request(&[]);
        let v = engine.evaluate(&req).await.unwrap();
        assert!(v.correctness);
        assert_eq!(v.score, 95);
        assert_eq!(v.feedback, "Elegant.");
        assert_eq!(v.time_complexity, "O(1)");
    }

    #[tokio::test]
    async fn judge_score_is_clamped() {
        let judge = ScriptedJudge(Ok(JudgeAssessment {
            correctness: true,
            score: 400,
            feedback: "Over-enthusiastic judge.".into(),
            reference_solution: String::new(),
            time_complexity: String::new(),
            space_complexity: String::new(),
            test_cases_passed: None,
            total_test_cases: None,
        }));
        let engine = offline_engine().with_judge(Arc::new(judge));
        let v = engine.evaluate(&addition_request(&[])).await.unwrap();
        assert_eq!(v.score, 100);
    }

    #[tokio::test]
    async fn passing_tests_override_a_harsh_judge() {
        let judge = ScriptedJudge(Ok(JudgeAssessment {
            correctness: false,
            score: 10,
            feedback: "I dislike the variable names.".into(),
            reference_solution: String::new(),
            time_complexity: String::new(),
            space_complexity: String::new(),
            test_cases_passed: None,
            total_test_cases: None,
        }));
        let engine = offline_engine().with_judge(Arc::new(judge));
        let req = addition_request(&[("1 2", "3"), ("4 5", "9")]);
        let v = engine.evaluate(&req).await.unwrap();
        assert!(v.correctness);
        assert!(v.score >= 80);
    }

    #[tokio::test]
    async fn judge_failure_triggers_deterministic_fallback() {
        let engine = offline_engine().with_judge(Arc::new(ScriptedJudge(Err(()))));
        let req = addition_request(&[("1 2", "3"), ("4 5", "9")]);
        let v = engine.evaluate(&req).await.unwrap();
        assert!(v.correctness);
        assert_eq!(v.score, 85);
    }

    #[tokio::test]
    async fn runtime_error_still_runs_remaining_cases() {
        let engine = offline_engine();
        let mut req = addition_request(&[("2 3", "5")]);
        req.stdin = "garbage".into(); // first EXECUTE crashes
        let v = engine.evaluate(&req).await.unwrap();
        assert_eq!(v.test_cases_passed, 1);
        assert!(v.execution_output.contains("Execution Error"));
    }

    #[tokio::test]
    async fn infinite_loop_times_out_with_zero_score() {
        let mut config = EngineConfig::default();
        config.judge.enabled = false;
        config.exec.interpreted_time_limit_ms = 400;
        let engine = Engine::new(config);
        let req = EvaluateRequest {
            source: "while True: pass".into(),
            language: "python".into(),
            stdin: String::new(),
            sql_setup: None,
            test_cases: vec![TestCase {
                input: String::new(),
                expected_output: "never".into(),
            }],
            difficulty: None,
        };
        let v = engine.evaluate(&req).await.unwrap();
        assert!(!v.correctness);
        assert_eq!(v.score, 0);
        assert!(v.feedback.to_lowercase().contains("timeout"));
        assert_eq!(v.total_test_cases, 1);
        assert_eq!(v.test_cases_passed, 0);
    }

    #[tokio::test]
    async fn compile_error_short_circuits_even_a_kind_judge() {
        let engine = offline_engine();
        if !engine.registry().is_available(Language::Cpp) {
            return; // host has no g++
        }
        let judge = ScriptedJudge(Ok(JudgeAssessment {
            correctness: true,
            score: 90,
            feedback: "Looks fine to me.".into(),
            reference_solution: String::new(),
            time_complexity: String::new(),
            space_complexity: String::new(),
            test_cases_passed: None,
            total_test_cases: None,
        }));
        let engine = engine.with_judge(Arc::new(judge));
        let req = EvaluateRequest {
            source: "int main( { return 0; }".into(), // deliberate syntax error
            language: "cpp".into(),
            stdin: String::new(),
            sql_setup: None,
            test_cases: vec![TestCase {
                input: String::new(),
                expected_output: "unused".into(),
            }],
            difficulty: None,
        };
        let v = engine.evaluate(&req).await.unwrap();
        assert!(!v.correctness);
        assert_eq!(v.score, 0);
        assert!(v.execution_output.contains("Compilation Error"));
        assert_eq!(v.test_cases_passed, 0);
    }

    #[tokio::test]
    async fn sql_submission_is_evaluated_in_process() {
        let engine = offline_engine();
        let req = EvaluateRequest {
            source: "SELECT name FROM users ORDER BY id;".into(),
            language: "sql".into(),
            stdin: String::new(),
            sql_setup: Some(
                "CREATE TABLE users (id INTEGER, name TEXT); \
                 INSERT INTO users VALUES (1, 'ada'), (2, 'grace');"
                    .into(),
            ),
            test_cases: Vec::new(),
            difficulty: None,
        };
        let v = engine.evaluate(&req).await.unwrap();
        assert_eq!(v.score, 50);
        assert!(v.execution_output.contains("ada"));
        assert!(v.execution_output.contains("grace"));
    }

    #[tokio::test]
    async fn verdict_fields_are_never_empty() {
        let engine = offline_engine();
        let v = engine.evaluate(&addition_request(&[])).await.unwrap();
        assert!(!v.feedback.is_empty());
        assert!(!v.execution_output.is_empty());
        assert!(!v.time_complexity.is_empty());
        assert!(!v.space_complexity.is_empty());
        assert!(!v.reference_solution.is_empty());
    }
}
