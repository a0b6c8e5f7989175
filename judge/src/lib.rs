pub mod client;
pub mod error;
pub mod model;

pub use client::JudgeClient;
pub use error::{Error, Result};
pub use model::{CaseReport, JudgeAssessment, JudgeRequest};
