use std::time::Duration;

use crate::error::{Error, Result};
use crate::model::*;

const SYSTEM_PROMPT: &str = "\
You are an expert coding interview evaluator.

EVALUATION RULES:
- A solution is CORRECT if it implements the right algorithm and logic, \
even if output formatting differs from the expected output.
- Be generous with correctness: judge the algorithm, not byte-exact output.
- For SQL, check whether the query logic is correct, not only the row set.

Respond with a single JSON object and nothing else:
{
  \"correctness\": true/false,
  \"score\": 0-100,
  \"feedback\": \"short feedback: correctness in 1-2 sentences, then 2-3 \
one-sentence improvements, then one short encouraging sentence\",
  \"reference_solution\": \"complete clean solution in the same language\",
  \"time_complexity\": \"O(...)\",
  \"space_complexity\": \"O(...)\",
  \"test_cases_passed\": number,
  \"total_test_cases\": number
}";

/// Client for an OpenAI-style chat-completions endpoint acting as the judge.
///
/// One instance is safe to share across concurrent evaluations; reqwest's
/// client is internally reference counted.
#[derive(Debug, Clone)]
pub struct JudgeClient {
    http: reqwest::Client,
    endpoint: String,
    model: String,
    api_key: String,
}

impl JudgeClient {
    pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

    pub fn new(
        endpoint: impl Into<String>,
        model: impl Into<String>,
        api_key: impl Into<String>,
        request_timeout: Duration,
    ) -> Self {
        Self {
            http: reqwest::Client::builder()
                .timeout(request_timeout)
                .gzip(true)
                .build()
                .unwrap(),
            endpoint: endpoint.into(),
            model: model.into(),
            api_key: api_key.into(),
        }
    }

    pub async fn assess(&self, req: &JudgeRequest) -> Result<JudgeAssessment> {
        let user_prompt = Self::build_user_prompt(req);
        let body = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT,
                },
                ChatMessage {
                    role: "user",
                    content: &user_prompt,
                },
            ],
            temperature: 0.3,
            response_format: ResponseFormat {
                kind: "json_object",
            },
        };

        let resp = self
            .http
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            return Err(Error::UnexpectedResponseCode {
                got: status,
                requested_url: self.endpoint.clone(),
            });
        }

        let chat: ChatResponse = resp.json().await?;
        let content = chat
            .choices
            .into_iter()
            .next()
            .ok_or(Error::EmptyResponse)?
            .message
            .content;

        log::debug!("Judge raw verdict: {}", content);
        serde_json::from_str(&content).map_err(Error::MalformedVerdict)
    }

    fn build_user_prompt(req: &JudgeRequest) -> String {
        let mut prompt = format!(
            "Evaluate this coding solution.\n\n\
             CANDIDATE'S SOLUTION ({lang}):\n```{lang}\n{src}\n```\n\n\
             EXECUTION RESULTS:\n{summary}\n",
            lang = req.language,
            src = req.source,
            summary = req.execution_summary,
        );
        if !req.cases.is_empty() {
            prompt.push_str("\nTest Case Execution Results:\n");
            for (i, case) in req.cases.iter().enumerate() {
                prompt.push_str(&format!(
                    "Test Case {n}:\n  Input: {input}\n  Expected Output: {expected}\n  Actual Output: {actual}\n",
                    n = i + 1,
                    input = case.input,
                    expected = case.expected,
                    actual = case.actual,
                ));
            }
        }
        prompt.push_str(&format!(
            "\nDIFFICULTY LEVEL: {}\n",
            req.difficulty.as_deref().unwrap_or("Medium")
        ));
        prompt
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn sample_request() -> JudgeRequest {
        JudgeRequest {
            source: "print(int(input()) * 2)".into(),
            language: "python".into(),
            difficulty: Some("Easy".into()),
            execution_summary: "Output: 4".into(),
            cases: vec![CaseReport {
                input: "2".into(),
                expected: "4".into(),
                actual: "4".into(),
            }],
        }
    }

    #[test]
    fn user_prompt_embeds_source_and_cases() {
        let prompt = JudgeClient::build_user_prompt(&sample_request());
        assert!(prompt.contains("print(int(input()) * 2)"));
        assert!(prompt.contains("Test Case 1:"));
        assert!(prompt.contains("Expected Output: 4"));
        assert!(prompt.contains("DIFFICULTY LEVEL: Easy"));
    }

    #[test]
    fn user_prompt_defaults_difficulty_to_medium() {
        let mut req = sample_request();
        req.difficulty = None;
        let prompt = JudgeClient::build_user_prompt(&req);
        assert!(prompt.contains("DIFFICULTY LEVEL: Medium"));
    }
}
