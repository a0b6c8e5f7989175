use std::time::{Duration, Instant};

use anyhow::Context;
use rusqlite::Connection;
use serde::Serialize;

use crate::model::ExecutionResult;

/// Allow/deny policy for candidate SQL, independent of the execution path.
///
/// Only statements whose blast radius stays inside the per-request in-memory
/// store are allowed: reads and row-level writes. Anything touching schema,
/// external storage, or engine configuration is blocked per statement so the
/// rest of the batch still runs (partial credit stays possible).
pub mod policy {
    /// Matched case-insensitively against the whole statement; keywords are
    /// stored uppercase, dot-commands as sqlite spells them.
    pub const BLOCKED_KEYWORDS: &[&str] = &[
        "ATTACH",
        "DETACH",
        "PRAGMA",
        ".READ",
        ".IMPORT",
        ".OUTPUT",
        ".DUMP",
        "CREATE TABLE",
        "CREATE TRIGGER",
        "CREATE VIEW",
        "CREATE INDEX",
        "DROP",
        "ALTER",
        "TRUNCATE",
        "VACUUM",
        "ANALYZE",
        "EXPLAIN QUERY PLAN",
    ];

    /// Returns the offending keyword for a statement that must not run.
    pub fn check(statement: &str) -> Result<(), &'static str> {
        let upper = statement.to_uppercase();
        for &keyword in BLOCKED_KEYWORDS {
            if upper.contains(keyword) {
                return Err(keyword);
            }
        }
        Ok(())
    }

    #[cfg(test)]
    mod test {
        use super::*;

        #[test]
        fn row_level_writes_are_allowed() {
            assert!(check("INSERT INTO t VALUES (1)").is_ok());
            assert!(check("update t set x = 2 where id = 1").is_ok());
            assert!(check("DELETE FROM t WHERE id = 3").is_ok());
            assert!(check("SELECT * FROM t").is_ok());
        }

        #[test]
        fn schema_and_engine_statements_are_blocked() {
            assert_eq!(check("create table evil (x)"), Err("CREATE TABLE"));
            assert_eq!(check("DROP TABLE t"), Err("DROP"));
            assert_eq!(check("ATTACH DATABASE 'x' AS y"), Err("ATTACH"));
            assert_eq!(check("PRAGMA writable_schema = 1"), Err("PRAGMA"));
            assert_eq!(check(".read /etc/passwd"), Err(".READ"));
            assert_eq!(check("EXPLAIN QUERY PLAN SELECT 1"), Err("EXPLAIN QUERY PLAN"));
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum StatementOutput {
    Rows {
        columns: Vec<String>,
        rows: Vec<Vec<serde_json::Value>>,
        row_count: usize,
    },
    Write {
        message: &'static str,
        rows_affected: usize,
    },
    Error {
        error: String,
        statement: String,
    },
}

/// Evaluates candidate SQL against a fresh in-memory store.
///
/// The setup script (schema + seed rows) runs first; its errors are logged
/// and skipped so the candidate still runs against whatever state setup
/// reached. Candidate statements then run one at a time, each independently
/// checked against the policy blocklist. The outcome renders as a JSON array
/// on stdout, shaped like any other `ExecutionResult`.
///
/// rusqlite is synchronous, so callers on the async pipeline wrap this in
/// `spawn_blocking`; a progress handler aborts statements that outrun the
/// time limit (e.g. a runaway recursive CTE).
pub fn evaluate(
    setup: Option<&str>,
    candidate_sql: &str,
    time_limit: Duration,
) -> anyhow::Result<ExecutionResult> {
    let started = Instant::now();
    let conn = Connection::open_in_memory().context("Failed to open in-memory store")?;

    let deadline = started + time_limit;
    conn.progress_handler(10_000, Some(move || Instant::now() >= deadline));

    let mut setup_warnings = Vec::new();
    if let Some(setup) = setup {
        for stmt in split_statements(setup) {
            if let Err(e) = conn.execute_batch(&stmt) {
                log::warn!("SQL setup statement failed: {:#}", e);
                setup_warnings.push(format!("Setup warning: {}", e));
            }
        }
    }

    let statements = split_statements(candidate_sql);
    if statements.is_empty() {
        return Ok(ExecutionResult::completed(
            r#"[{"error": "No SQL statements found"}]"#.to_owned(),
            setup_warnings.join("\n"),
            1,
            started.elapsed(),
        ));
    }

    let mut outputs = Vec::with_capacity(statements.len());
    for stmt in &statements {
        if let Err(keyword) = policy::check(stmt) {
            outputs.push(StatementOutput::Error {
                error: format!("Unsafe SQL keyword detected: {}", keyword),
                statement: truncated(stmt),
            });
            continue;
        }
        match run_statement(&conn, stmt) {
            Ok(output) => outputs.push(output),
            Err(e) => outputs.push(StatementOutput::Error {
                error: e.to_string(),
                statement: truncated(stmt),
            }),
        }
    }

    let stdout =
        serde_json::to_string_pretty(&outputs).context("Failed to render SQL results")?;
    Ok(ExecutionResult::completed(
        stdout,
        setup_warnings.join("\n"),
        0,
        started.elapsed(),
    ))
}

fn run_statement(conn: &Connection, sql: &str) -> rusqlite::Result<StatementOutput> {
    let mut stmt = conn.prepare(sql)?;
    if stmt.column_count() > 0 {
        let columns: Vec<String> = stmt
            .column_names()
            .into_iter()
            .map(str::to_owned)
            .collect();
        let n_cols = columns.len();
        let mut rows = Vec::new();
        let mut iter = stmt.query([])?;
        while let Some(row) = iter.next()? {
            let mut values = Vec::with_capacity(n_cols);
            for i in 0..n_cols {
                values.push(json_value(row.get_ref(i)?));
            }
            rows.push(values);
        }
        let row_count = rows.len();
        Ok(StatementOutput::Rows {
            columns,
            rows,
            row_count,
        })
    } else {
        let rows_affected = stmt.execute([])?;
        Ok(StatementOutput::Write {
            message: "Statement executed successfully",
            rows_affected,
        })
    }
}

fn json_value(value: rusqlite::types::ValueRef) -> serde_json::Value {
    use rusqlite::types::ValueRef::*;
    match value {
        Null => serde_json::Value::Null,
        Integer(i) => serde_json::Value::from(i),
        Real(f) => serde_json::Value::from(f),
        Text(t) => serde_json::Value::from(String::from_utf8_lossy(t).into_owned()),
        Blob(b) => serde_json::Value::from(format!("<blob {} bytes>", b.len())),
    }
}

/// Splits on `;` and collapses internal whitespace, the way the setup and
/// candidate scripts arrive from the session layer (free-form multi-line).
fn split_statements(sql: &str) -> Vec<String> {
    sql.split(';')
        .map(|part| part.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|stmt| !stmt.is_empty())
        .collect()
}

fn truncated(stmt: &str) -> String {
    const MAX: usize = 100;
    stmt.chars().take(MAX).collect()
}
