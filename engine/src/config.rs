use std::path::{Path, PathBuf};
use std::result::Result as StdResult;
use std::time::Duration;

use anyhow::Context as _;
use rust_embed::RustEmbed;
use serde::Deserialize;

use crate::model::Language;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub exec: ExecConfig,
    pub judge: JudgeConfig,
    pub fallback: FallbackConfig,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ExecConfig {
    /// Interpreted scripts and SQL get a longer budget: data-processing
    /// workloads are slower to start.
    pub interpreted_time_limit_ms: u64,
    pub compiled_time_limit_ms: u64,
    pub compile_time_limit_ms: u64,
    pub stdout_capture_max_bytes: usize,
    pub stderr_capture_max_bytes: usize,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct JudgeConfig {
    pub enabled: bool,
    pub endpoint: String,
    pub model: String,
    pub request_timeout_ms: u64,
    /// Name of the environment variable holding the API key. The key itself
    /// never appears in config files.
    pub api_key_env: String,
}

/// Scoring policy for when the judge is unavailable or unusable.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct FallbackConfig {
    /// Pass ratio at or above which a submission still counts as correct.
    /// Product policy, not a derived constant; tune with care.
    pub pass_ratio_threshold: f64,
    pub pass_score: u8,
    /// Partial credit is `floor(partial_score_scale * passed / total)`.
    pub partial_score_scale: u8,
    /// Score when there are no test cases and no judge to consult.
    pub neutral_score: u8,
}

impl Default for ExecConfig {
    fn default() -> Self {
        Self {
            interpreted_time_limit_ms: 10_000,
            compiled_time_limit_ms: 5_000,
            compile_time_limit_ms: 5_000,
            stdout_capture_max_bytes: 1 << 20,
            stderr_capture_max_bytes: 1 << 20,
        }
    }
}

impl Default for JudgeConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            endpoint: "https://api.openai.com/v1/chat/completions".to_owned(),
            model: "gpt-4o".to_owned(),
            request_timeout_ms: 30_000,
            api_key_env: "OPENAI_API_KEY".to_owned(),
        }
    }
}

impl Default for FallbackConfig {
    fn default() -> Self {
        Self {
            pass_ratio_threshold: 0.8,
            pass_score: 85,
            partial_score_scale: 60,
            neutral_score: 50,
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            exec: ExecConfig::default(),
            judge: JudgeConfig::default(),
            fallback: FallbackConfig::default(),
        }
    }
}

#[derive(RustEmbed)]
#[folder = "assets/"]
struct Asset;

impl EngineConfig {
    pub const FILENAME: &str = "coderound.toml";

    pub fn example_toml() -> String {
        let file = Asset::get(Self::FILENAME).unwrap();
        std::str::from_utf8(file.data.as_ref()).unwrap().to_owned()
    }

    pub fn from_toml(s: &str) -> StdResult<Self, toml::de::Error> {
        toml::from_str(s)
    }

    pub fn from_toml_file(filepath: impl Into<PathBuf>) -> anyhow::Result<Self> {
        let filepath = filepath.into();
        let toml = std::fs::read_to_string(&filepath)
            .with_context(|| format!("Cannot read config file {:?}", filepath))?;
        Self::from_toml(&toml).with_context(|| format!("Invalid config TOML: {:?}", filepath))
    }

    /// Find config file in ancestor dirs, including current dir.
    pub fn find_file_in_ancestors(cur_dir: impl AsRef<Path>) -> Option<PathBuf> {
        cur_dir
            .as_ref()
            .ancestors()
            .map(|dir| dir.join(Self::FILENAME))
            .find(|path| path.is_file())
    }
}

impl ExecConfig {
    pub fn time_limit_for(&self, language: Language) -> Duration {
        let ms = match language {
            Language::Python | Language::Sql => self.interpreted_time_limit_ms,
            // Node starts fast; it shares the tighter budget.
            Language::Javascript => self.compiled_time_limit_ms,
            Language::Java | Language::C | Language::Cpp => self.compiled_time_limit_ms,
        };
        Duration::from_millis(ms)
    }

    pub fn compile_time_limit(&self) -> Duration {
        Duration::from_millis(self.compile_time_limit_ms)
    }
}
