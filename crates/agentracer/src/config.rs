use config::{Config as ConfigLoader, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;

use agentracer_types::DEFAULT_ENVIRONMENT;

pub const DEFAULT_HOST: &str = "https://api.agentracer.dev";

/// Process-wide tracker settings
///
/// Replaced as a whole by [`crate::init`]; never mutated field by field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackerConfig {
    /// Credential sent in the `x-api-key` header
    #[serde(default)]
    pub api_key: String,
    #[serde(default)]
    pub project_id: String,
    #[serde(default = "default_environment")]
    pub environment: String,
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default)]
    pub debug: bool,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_environment() -> String {
    DEFAULT_ENVIRONMENT.to_string()
}

fn default_host() -> String {
    DEFAULT_HOST.to_string()
}

fn default_enabled() -> bool {
    true
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            project_id: String::new(),
            environment: default_environment(),
            host: default_host(),
            debug: false,
            enabled: default_enabled(),
        }
    }
}

impl TrackerConfig {
    pub fn new(api_key: impl Into<String>, project_id: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            project_id: project_id.into(),
            ..Self::default()
        }
    }

    pub fn with_environment(mut self, environment: impl Into<String>) -> Self {
        self.environment = environment.into();
        self
    }

    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Whether anything should leave the process at all
    ///
    /// A missing credential makes the tracker effectively disabled.
    pub fn is_active(&self) -> bool {
        self.enabled && !self.api_key.is_empty()
    }

    /// Load configuration from an optional TOML file and environment variables
    ///
    /// Hierarchy (weakest to strongest):
    /// 1. `agentracer.toml` in the working directory (or the file named by `AGENTRACER_CONFIG`)
    /// 2. `AGENTRACER_API_KEY`, `AGENTRACER_PROJECT_ID`, `AGENTRACER_ENVIRONMENT`,
    ///    `AGENTRACER_HOST`, `AGENTRACER_DEBUG`, `AGENTRACER_ENABLED`
    pub fn load() -> Result<Self, ConfigError> {
        let file = std::env::var("AGENTRACER_CONFIG").unwrap_or_else(|_| "agentracer".to_string());

        let config = ConfigLoader::builder()
            .add_source(File::with_name(&file).required(false))
            .add_source(Environment::with_prefix("AGENTRACER").try_parsing(true))
            .build()?;

        config.try_deserialize()
    }

    /// Load config from a specific path (useful for testing)
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let config = ConfigLoader::builder()
            .add_source(File::from(path.as_ref()))
            .build()?;

        config.try_deserialize()
    }
}
