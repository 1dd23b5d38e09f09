use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Clone)]
pub struct Settings {
    pub(super) runtime: RuntimeSettings,
    pub(super) api: ApiSettings,
    pub(super) session: SessionSettings,
    pub(super) storage: StorageSettings,
    pub(super) telemetry: TelemetrySettings,
}

#[derive(Debug, Clone)]
pub struct ApiSettings {
    pub base_url: String,
    pub access_token: Option<String>,
    pub request_timeout_seconds: u64,
    pub connect_timeout_seconds: u64,
}

#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub autosave_debounce_ms: u64,
    pub exam_id: Option<String>,
}

#[derive(Debug, Clone)]
pub struct StorageSettings {
    pub resume_store_path: PathBuf,
}

#[derive(Debug, Clone)]
pub struct TelemetrySettings {
    pub log_level: String,
    pub json: bool,
    pub prometheus_enabled: bool,
}

#[derive(Debug, Clone)]
pub struct RuntimeSettings {
    pub environment: Environment,
    pub strict_config: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Development,
    Production,
    Staging,
    Test,
}

impl Environment {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Development => "development",
            Self::Production => "production",
            Self::Staging => "staging",
            Self::Test => "test",
        }
    }

    pub(super) fn is_production(self) -> bool {
        matches!(self, Self::Production)
    }
}

impl ApiSettings {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_seconds)
    }
}

impl SessionSettings {
    pub fn autosave_debounce(&self) -> Duration {
        Duration::from_millis(self.autosave_debounce_ms)
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {field}: {value}")]
    InvalidValue { field: &'static str, value: String },
    #[error("missing required value for {0}")]
    MissingValue(&'static str),
}
