use config::{Config, File, FileFormat};
use serde::Deserialize;

use crate::error::TutorError;

#[derive(Debug, Deserialize, Clone)]
pub struct TutorConfig {
    pub service: ServiceConfig,
    pub database: DatabaseConfig,
    pub llm: LlmConfig,
    #[serde(default)]
    pub semaphore: SemaphoreConfig,
    #[serde(default)]
    pub grading: GradingConfig,
    #[serde(default)]
    pub tutor: TutorReplyConfig,
    #[serde(default)]
    pub exercises: ExercisesConfig,
    #[serde(default)]
    pub http: HttpConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServiceConfig {
    pub log_level: String,
    /// Capacity of the live notification channel.
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,
}

fn default_event_capacity() -> usize {
    256
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LlmConfig {
    pub base_url: String,
    pub model: String,
    /// Name of the environment variable holding the API key.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
    #[serde(default = "default_classify_temperature")]
    pub classify_temperature: f32,
    #[serde(default = "default_classify_max_tokens")]
    pub classify_max_tokens: u32,
}

fn default_api_key_env() -> String {
    "OPENAI_API_KEY".to_string()
}

fn default_timeout_seconds() -> u64 {
    30
}

fn default_classify_temperature() -> f32 {
    0.1
}

fn default_classify_max_tokens() -> u32 {
    60
}

#[derive(Debug, Deserialize, Clone)]
pub struct SemaphoreConfig {
    pub window_seconds: i64,
    pub red_threshold: usize,
    pub yellow_threshold: usize,
}

impl Default for SemaphoreConfig {
    fn default() -> Self {
        Self {
            window_seconds: 300,
            red_threshold: 2,
            yellow_threshold: 2,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct GradingConfig {
    pub temperature: f32,
    pub max_tokens: u32,
}

impl Default for GradingConfig {
    fn default() -> Self {
        Self {
            temperature: 0.2,
            max_tokens: 400,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct TutorReplyConfig {
    pub temperature: f32,
    pub max_tokens: u32,
    /// Number of previous exchanges replayed to the model.
    pub history_turns: usize,
}

impl Default for TutorReplyConfig {
    fn default() -> Self {
        Self {
            temperature: 0.7,
            max_tokens: 600,
            history_turns: 6,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ExercisesConfig {
    pub root: String,
}

impl Default for ExercisesConfig {
    fn default() -> Self {
        Self {
            root: "exercises".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct HttpConfig {
    pub host: String,
    pub port: u16,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8780,
        }
    }
}

impl TutorConfig {
    pub fn load(path: &str) -> Result<Self, TutorError> {
        let s = Config::builder()
            .add_source(File::with_name(path))
            .build()?;
        let config: Self = s.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Parse a config from an in-memory TOML document.
    pub fn from_toml_str(toml: &str) -> Result<Self, TutorError> {
        let s = Config::builder()
            .add_source(File::from_str(toml, FileFormat::Toml))
            .build()?;
        let config: Self = s.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the pipeline cannot run with.
    pub fn validate(&self) -> Result<(), TutorError> {
        if self.service.event_capacity == 0 {
            return Err(TutorError::InvalidConfig(
                "service.event_capacity must be at least 1".to_string(),
            ));
        }
        if self.llm.timeout_seconds == 0 {
            return Err(TutorError::InvalidConfig(
                "llm.timeout_seconds must be at least 1".to_string(),
            ));
        }
        if self.semaphore.window_seconds <= 0 {
            return Err(TutorError::InvalidConfig(
                "semaphore.window_seconds must be positive".to_string(),
            ));
        }
        if self.semaphore.red_threshold == 0 || self.semaphore.yellow_threshold == 0 {
            return Err(TutorError::InvalidConfig(
                "semaphore thresholds must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
