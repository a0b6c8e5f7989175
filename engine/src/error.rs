use crate::model::Language;

pub type Result<T> = std::result::Result<T, Error>;

/// Request-level failures. Everything else the pipeline can encounter
/// (compile errors, timeouts, judge trouble, unsafe SQL) is absorbed into
/// the returned `Verdict` instead of surfacing here.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(
        "Unsupported language '{0}'. Supported: python, java, javascript, c, cpp, sql"
    )]
    UnsupportedLanguage(String),

    #[error(
        "Toolchain for {language} is unavailable: '{binary}' was not found in PATH. \
         Install it and make sure it is on PATH"
    )]
    ToolchainUnavailable {
        language: Language,
        binary: &'static str,
    },
}
