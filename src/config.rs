use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use validator::Validate;

/// Application configuration
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct Settings {
    #[serde(default)]
    pub server: ServerSettings,
    #[serde(default)]
    #[validate(nested)]
    pub backend: BackendSettings,
    #[serde(default)]
    #[validate(nested)]
    pub cache: CacheSettings,
    #[serde(default)]
    #[validate(nested)]
    pub matching: MatchingSettings,
    #[serde(default)]
    pub logging: LoggingSettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerSettings {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    pub workers: Option<usize>,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            workers: None,
        }
    }
}

fn default_host() -> String { "0.0.0.0".to_string() }
fn default_port() -> u16 { 8000 }

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct BackendSettings {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_model")]
    #[validate(length(min = 1))]
    pub model: String,
    #[serde(default = "default_temperature")]
    #[validate(range(min = 0.0, max = 2.0))]
    pub temperature: f32,
    #[serde(default = "default_max_tokens")]
    #[validate(range(min = 1))]
    pub max_tokens: u32,
    #[serde(default = "default_timeout_secs")]
    #[validate(range(min = 1))]
    pub timeout_secs: u64,
}

impl Default for BackendSettings {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            api_key: String::new(),
            model: default_model(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl BackendSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

fn default_base_url() -> String { "https://api.openai.com/v1".to_string() }
fn default_model() -> String { "gpt-3.5-turbo".to_string() }
fn default_temperature() -> f32 { 0.3 }
fn default_max_tokens() -> u32 { 2000 }
fn default_timeout_secs() -> u64 { 60 }

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CacheSettings {
    #[serde(default = "default_database_path")]
    pub database_path: String,
    /// At most ten years; moka rejects longer expiries
    #[serde(default = "default_ttl_hours")]
    #[validate(range(min = 1, max = 87_600))]
    pub ttl_hours: u64,
    #[serde(default = "default_l1_capacity")]
    pub l1_capacity: u64,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            ttl_hours: default_ttl_hours(),
            l1_capacity: default_l1_capacity(),
        }
    }
}

impl CacheSettings {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_hours.saturating_mul(3600))
    }
}

fn default_database_path() -> String { "data/cv_match.db".to_string() }
fn default_ttl_hours() -> u64 { 168 }
fn default_l1_capacity() -> u64 { 1000 }

/// Match interpretation settings
///
/// `threshold` is advisory: it is reported, not applied to results.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct MatchingSettings {
    #[serde(default = "default_threshold")]
    #[validate(range(max = 100))]
    pub threshold: u8,
}

impl Default for MatchingSettings {
    fn default() -> Self {
        Self {
            threshold: default_threshold(),
        }
    }
}

fn default_threshold() -> u8 { 70 }

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingSettings {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

fn default_log_level() -> String { "info".to_string() }
fn default_log_format() -> String { "json".to_string() }

impl Settings {
    /// Load configuration from file and environment variables
    ///
    /// Configuration is loaded in the following order (later overrides earlier):
    /// 1. Default values in the struct
    /// 2. Configuration file (config/default.toml)
    /// 3. Local overrides (config/local.toml)
    /// 4. Environment variables (prefixed with CVMATCH_)
    /// 5. OPENAI_API_KEY / OPENAI_MODEL
    pub fn load() -> Result<Self, ConfigError> {
        let settings = Config::builder()
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name("config/local").required(false))
            // e.g., CVMATCH__CACHE__TTL_HOURS -> cache.ttl_hours
            .add_source(env_source())
            .build()?;

        let settings = apply_openai_env(
            settings,
            std::env::var("OPENAI_API_KEY").ok(),
            std::env::var("OPENAI_MODEL").ok(),
        )?;

        Self::finish(settings)
    }

    /// Load configuration from a custom path
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let settings = Config::builder()
            .add_source(File::from(path.as_ref()))
            .add_source(env_source())
            .build()?;

        Self::finish(settings)
    }

    fn finish(settings: Config) -> Result<Self, ConfigError> {
        let settings: Settings = settings.try_deserialize()?;
        settings
            .validate()
            .map_err(|e| ConfigError::Message(format!("Invalid configuration: {}", e)))?;
        Ok(settings)
    }
}

fn env_source() -> Environment {
    Environment::with_prefix("CVMATCH")
        .prefix_separator("__")
        .separator("__")
        .try_parsing(true)
}

/// Honour the conventional OpenAI variables on top of the layered config
///
/// Empty values are ignored so a blank `OPENAI_API_KEY=` line in `.env` does
/// not wipe a key set in a config file.
fn apply_openai_env(
    settings: Config,
    api_key: Option<String>,
    model: Option<String>,
) -> Result<Config, ConfigError> {
    let mut builder = Config::builder().add_source(settings);

    if let Some(api_key) = api_key.filter(|k| !k.is_empty()) {
        builder = builder.set_override("backend.api_key", api_key)?;
    }
    if let Some(model) = model.filter(|m| !m.is_empty()) {
        builder = builder.set_override("backend.model", model)?;
    }

    builder.build()
}
