use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct TrackwiseConfig {
    #[serde(default)]
    pub service: ServiceConfig,
    #[serde(default)]
    pub model: ModelConfig,
    #[serde(default)]
    pub notifications: NotificationConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServiceConfig {
    pub log_level: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            log_level: "warn".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ModelConfig {
    pub name: String,
    pub base_url: String,
    /// Environment variable holding the API key.
    pub api_key_env: String,
    pub request_timeout_seconds: u64,
    pub max_retries: usize,
    pub retry_delay_ms: u64,
    /// Check the key against the models endpoint when a session is created.
    pub verify_on_create: bool,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            name: "gemini-2.5-flash".to_string(),
            base_url: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            api_key_env: "API_KEY".to_string(),
            request_timeout_seconds: 60,
            max_retries: 3,
            retry_delay_ms: 500,
            verify_on_create: true,
        }
    }
}

impl ModelConfig {
    /// The API key from the configured environment variable, if set and non-blank.
    pub fn api_key(&self) -> Option<String> {
        std::env::var(&self.api_key_env)
            .ok()
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty())
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct NotificationConfig {
    pub default_duration_ms: u64,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            default_duration_ms: 3500,
        }
    }
}

impl TrackwiseConfig {
    /// Load from a TOML file (optional) layered with `TRACKWISE__SECTION__KEY`
    /// environment overrides.
    pub fn load(path: &str) -> Result<Self, ConfigError> {
        let s = Config::builder()
            .add_source(File::with_name(path).required(false))
            .add_source(Environment::with_prefix("TRACKWISE").separator("__"))
            .build()?;
        s.try_deserialize()
    }
}
