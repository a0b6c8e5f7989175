use reqwest::StatusCode;

pub type Result<T> = ::std::result::Result<T, Error>;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("Unexpected response code '{got}' while requesting to {requested_url}")]
    UnexpectedResponseCode {
        got: StatusCode,
        requested_url: String,
    },

    #[error("Judge response contains no choices")]
    EmptyResponse,

    #[error("Malformed judge verdict: {0}")]
    MalformedVerdict(#[source] serde_json::Error),

    #[error("Http error: {0}")]
    Http(#[from] reqwest::Error),
}

impl Error {
    /// True when the judge never produced a usable response (network down,
    /// timeout, non-2xx). Malformed verdicts are reported separately so the
    /// caller can distinguish "unreachable" from "unusable output", but both
    /// trigger the same deterministic fallback.
    pub fn is_unavailable(&self) -> bool {
        matches!(
            self,
            Error::Http(_) | Error::UnexpectedResponseCode { .. } | Error::EmptyResponse
        )
    }
}
