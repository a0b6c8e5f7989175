use serde::{Deserialize, Serialize};

/// Everything the judge needs to assess one submission.
/// The engine owns the execution; the judge only ever sees text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JudgeRequest {
    pub source: String,
    pub language: String,
    pub difficulty: Option<String>,
    pub execution_summary: String,
    pub cases: Vec<CaseReport>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaseReport {
    pub input: String,
    pub expected: String,
    pub actual: String,
}

/// Structured verdict returned by the judge.
///
/// Decoding is strict on the fields that drive scoring: `correctness` must
/// be a JSON boolean and `score` a number. A judge that returns `"true"` or
/// prose instead of the schema fails decoding and the engine falls back to
/// deterministic scoring.
#[derive(Debug, Clone, Deserialize)]
pub struct JudgeAssessment {
    pub correctness: bool,
    pub score: i64,
    pub feedback: String,

    #[serde(default)]
    pub reference_solution: String,

    #[serde(default)]
    pub time_complexity: String,

    #[serde(default)]
    pub space_complexity: String,

    #[serde(default)]
    pub test_cases_passed: Option<u32>,

    #[serde(default)]
    pub total_test_cases: Option<u32>,
}

#[derive(Debug, Serialize)]
pub(crate) struct ChatRequest<'a> {
    pub model: &'a str,
    pub messages: Vec<ChatMessage<'a>>,
    pub temperature: f32,
    pub response_format: ResponseFormat,
}

#[derive(Debug, Serialize)]
pub(crate) struct ChatMessage<'a> {
    pub role: &'static str,
    pub content: &'a str,
}

#[derive(Debug, Serialize)]
pub(crate) struct ResponseFormat {
    #[serde(rename = "type")]
    pub kind: &'static str,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ChatResponse {
    pub choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ChatChoice {
    pub message: AssistantMessage,
}

#[derive(Debug, Deserialize)]
pub(crate) struct AssistantMessage {
    pub content: String,
}
