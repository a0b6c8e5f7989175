pub mod config;
pub mod difficulty;
pub mod error;
pub mod evaluate;
pub mod exec;
pub mod harness;
pub mod model;
pub mod sql;
pub mod toolchain;
pub mod workspace;

pub use config::EngineConfig;
pub use error::{Error, Result};
pub use evaluate::{Engine, Judge};
pub use model::{
    Difficulty, DifficultyProfile, EvaluateRequest, ExecutionRequest, ExecutionResult, Language,
    TestCase, TestCaseResult, Verdict,
};
