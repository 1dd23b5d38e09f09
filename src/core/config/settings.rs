use std::path::PathBuf;

use super::parsing::{
    env_optional, env_or_default, parse_base_url, parse_bool, parse_environment, parse_u64,
};
use super::types::{
    ApiSettings, ConfigError, RuntimeSettings, SessionSettings, Settings, StorageSettings,
    TelemetrySettings,
};

impl Settings {
    pub fn load() -> Result<Self, ConfigError> {
        let environment =
            parse_environment(env_optional("PICRETE_ENV").or_else(|| env_optional("ENVIRONMENT")));
        let strict_config =
            env_optional("PICRETE_STRICT_CONFIG").map(|value| parse_bool(&value)).unwrap_or(false)
                || environment.is_production();

        let base_url = parse_base_url(
            "EXAM_API_BASE_URL",
            env_or_default("EXAM_API_BASE_URL", "http://localhost:8000/api/v1"),
        )?;
        let access_token = env_optional("EXAM_API_TOKEN");
        let request_timeout_seconds = parse_u64(
            "EXAM_API_TIMEOUT_SECONDS",
            env_or_default("EXAM_API_TIMEOUT_SECONDS", "30"),
        )?;
        let connect_timeout_seconds = parse_u64(
            "EXAM_API_CONNECT_TIMEOUT_SECONDS",
            env_or_default("EXAM_API_CONNECT_TIMEOUT_SECONDS", "10"),
        )?;

        let autosave_debounce_ms =
            parse_u64("AUTOSAVE_DEBOUNCE_MS", env_or_default("AUTOSAVE_DEBOUNCE_MS", "1000"))?;
        let exam_id = env_optional("EXAM_ID");

        let resume_store_path = PathBuf::from(env_or_default(
            "RESUME_STORE_PATH",
            ".picrete/resume_pointers.json",
        ));

        let log_level = env_or_default("LOG_LEVEL", "info");
        let json = env_optional("LOG_JSON").map(|value| parse_bool(&value)).unwrap_or(false);
        let prometheus_enabled =
            env_optional("PROMETHEUS_ENABLED").map(|value| parse_bool(&value)).unwrap_or(false);

        let settings = Self {
            runtime: RuntimeSettings { environment, strict_config },
            api: ApiSettings {
                base_url,
                access_token,
                request_timeout_seconds,
                connect_timeout_seconds,
            },
            session: SessionSettings { autosave_debounce_ms, exam_id },
            storage: StorageSettings { resume_store_path },
            telemetry: TelemetrySettings { log_level, json, prometheus_enabled },
        };

        settings.validate()?;
        Ok(settings)
    }

    pub fn api(&self) -> &ApiSettings {
        &self.api
    }

    pub fn session(&self) -> &SessionSettings {
        &self.session
    }

    pub fn storage(&self) -> &StorageSettings {
        &self.storage
    }

    pub fn telemetry(&self) -> &TelemetrySettings {
        &self.telemetry
    }

    pub fn runtime(&self) -> &RuntimeSettings {
        &self.runtime
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.session.autosave_debounce_ms == 0 {
            return Err(ConfigError::InvalidValue {
                field: "AUTOSAVE_DEBOUNCE_MS",
                value: "0".to_string(),
            });
        }

        if self.api.request_timeout_seconds == 0 {
            return Err(ConfigError::InvalidValue {
                field: "EXAM_API_TIMEOUT_SECONDS",
                value: "0".to_string(),
            });
        }

        if !(self.runtime.strict_config || self.runtime.environment.is_production()) {
            return Ok(());
        }

        if self.api.access_token.is_none() {
            return Err(ConfigError::MissingValue("EXAM_API_TOKEN"));
        }

        Ok(())
    }
}
