use tracing_subscriber::{fmt, EnvFilter};

use crate::core::config::Settings;

// The HTTP stack logs every connection at debug; keep it out of session logs.
const QUIET_DEPENDENCIES: &str = "hyper=warn,hyper_util=warn,reqwest=warn,rustls=warn";

fn default_filter(log_level: &str) -> String {
    format!("{log_level},{QUIET_DEPENDENCIES}")
}

pub fn init_tracing(settings: &Settings) -> anyhow::Result<()> {
    let telemetry = settings.telemetry();
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter(&telemetry.log_level)));

    let builder = fmt().with_env_filter(filter).with_target(false);

    if telemetry.json {
        builder
            .json()
            .with_current_span(false)
            .try_init()
            .map_err(|err| anyhow::anyhow!(err.to_string()))?;
    } else {
        builder.compact().try_init().map_err(|err| anyhow::anyhow!(err.to_string()))?;
    }

    tracing::debug!(
        environment = settings.runtime().environment.as_str(),
        json = telemetry.json,
        "Tracing initialized"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_filter_keeps_level_and_quiets_http_stack() {
        let filter = default_filter("debug");
        assert!(filter.starts_with("debug,"));
        assert!(filter.contains("reqwest=warn"));
        assert!(EnvFilter::try_new(filter).is_ok());
    }
}
