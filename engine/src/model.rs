use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Languages the engine can execute. The wire tags match what the
/// interview-session layer sends (`"cpp"`/`"c++"`, `"javascript"`/`"js"`).
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    strum::Display,
    strum::EnumIter,
    strum::EnumString,
    Serialize,
    Deserialize,
)]
#[strum(ascii_case_insensitive)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    #[strum(serialize = "python", serialize = "python3")]
    Python,

    #[strum(serialize = "java")]
    Java,

    #[strum(serialize = "javascript", serialize = "js")]
    #[serde(alias = "js")]
    Javascript,

    #[strum(serialize = "c")]
    C,

    #[strum(serialize = "cpp", serialize = "c++")]
    #[serde(alias = "c++")]
    Cpp,

    #[strum(serialize = "sql")]
    Sql,
}

impl Language {
    pub fn file_extension(&self) -> &'static str {
        use Language::*;
        match self {
            Python => "py",
            Java => "java",
            Javascript => "js",
            C => "c",
            Cpp => "cpp",
            Sql => "sql",
        }
    }

    /// Compiled languages need a compile step before the run step.
    pub fn has_compile_step(&self) -> bool {
        matches!(self, Language::Java | Language::C | Language::Cpp)
    }
}

/// One execution of candidate code. Constructed once per call, never mutated.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ExecutionRequest {
    pub source: String,
    pub language: Language,

    #[serde(default)]
    pub stdin: String,

    #[serde(default)]
    pub sql_setup: Option<String>,
}

/// What happened when a command ran.
///
/// Exactly one of `timed_out == true` or `exit_code == Some(_)` holds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionResult {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: Option<i32>,
    pub wall_time: Duration,
    pub timed_out: bool,
}

impl ExecutionResult {
    pub fn completed(
        stdout: String,
        stderr: String,
        exit_code: i32,
        wall_time: Duration,
    ) -> Self {
        Self {
            stdout,
            stderr,
            exit_code: Some(exit_code),
            wall_time,
            timed_out: false,
        }
    }

    pub fn timed_out(time_limit: Duration) -> Self {
        Self {
            stdout: String::new(),
            stderr: String::new(),
            exit_code: None,
            wall_time: time_limit,
            timed_out: true,
        }
    }

    pub fn success(&self) -> bool {
        !self.timed_out && self.exit_code == Some(0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestCase {
    pub input: String,
    pub expected_output: String,
}

/// Per-case outcome, derived from its parent `TestCase`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TestCaseResult {
    pub input: String,
    pub expected_output: String,
    pub actual_output: String,
    pub passed: bool,
}

/// The engine's sole external output. Every user-facing text field is
/// guaranteed non-empty after finalization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Verdict {
    pub correctness: bool,
    pub score: u8,
    pub feedback: String,
    pub execution_output: String,
    pub test_cases_passed: u32,
    pub total_test_cases: u32,
    pub time_complexity: String,
    pub space_complexity: String,
    pub reference_solution: String,
}

/// Inbound request from the interview-session layer.
/// `language` is kept as the raw tag so an unknown identifier fails fast
/// with `Error::UnsupportedLanguage` before any workspace is created.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct EvaluateRequest {
    pub source: String,
    pub language: String,

    #[serde(default)]
    pub stdin: String,

    #[serde(default)]
    pub sql_setup: Option<String>,

    #[serde(default)]
    pub test_cases: Vec<TestCase>,

    #[serde(default)]
    pub difficulty: Option<Difficulty>,
}

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    strum::Display,
    strum::EnumIter,
    strum::EnumString,
    Serialize,
    Deserialize,
)]
#[strum(ascii_case_insensitive)]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

impl Difficulty {
    pub fn step_up(self) -> Self {
        use Difficulty::*;
        match self {
            Easy => Medium,
            Medium | Hard => Hard,
        }
    }

    pub fn step_down(self) -> Self {
        use Difficulty::*;
        match self {
            Hard => Medium,
            Medium | Easy => Easy,
        }
    }
}

/// Rolling performance snapshot owned by the caller; read-only input to
/// difficulty selection.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct DifficultyProfile {
    #[serde(default)]
    pub experience_years: Option<f64>,

    /// Raw experience text from the resume ("fresher", "3+ years", "1-2 years"),
    /// parsed only when `experience_years` is absent.
    #[serde(default)]
    pub experience_level: Option<String>,

    #[serde(default)]
    pub rolling_accuracy: Option<f64>,

    #[serde(default)]
    pub rolling_average_score: Option<f64>,

    /// Coding skills extracted from the resume; used as a coarse baseline
    /// when no experience information is available at all.
    #[serde(default)]
    pub skills: Vec<String>,
}
