use std::sync::OnceLock;

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

use crate::core::config::Settings;

static PROM_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

pub(crate) const AUTOSAVE_WRITES: &str = "exam_client_autosave_writes_total";
pub(crate) const SUBMISSIONS: &str = "exam_client_submissions_total";

pub fn init(settings: &Settings) -> anyhow::Result<()> {
    if !settings.telemetry().prometheus_enabled {
        return Ok(());
    }

    let handle = PrometheusBuilder::new().install_recorder()?;
    let _ = PROM_HANDLE.set(handle);
    Ok(())
}

pub fn render() -> Option<String> {
    PROM_HANDLE.get().map(|handle| handle.render())
}

pub(crate) fn record_autosave(outcome: &'static str) {
    metrics::counter!(AUTOSAVE_WRITES, "outcome" => outcome).increment(1);
}

pub(crate) fn record_submission(trigger: &'static str, outcome: &'static str) {
    metrics::counter!(SUBMISSIONS, "trigger" => trigger, "outcome" => outcome).increment(1);
}
