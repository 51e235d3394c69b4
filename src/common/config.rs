use std::time::Duration;

use anyhow::{Result, bail};
use serde::Deserialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricsSinkType {
    Log,
    File,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ControllerConfig {
    pub uplink_endpoint: String,
    pub downlink_endpoint: String,
    pub max_frame_len: usize,
    pub channel: u32,
    pub monitor_parameters: Vec<String>,
    pub echo_interval_ms: u64,
    pub echo_timeout_ms: u64,
    pub exit_grace_multiplier: u32,
    pub policy_path: Option<String>,
    pub metrics_sink_type: MetricsSinkType,
    pub metrics_file_path: Option<String>,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            uplink_endpoint: "0.0.0.0:8989".to_string(),
            downlink_endpoint: "0.0.0.0:8990".to_string(),
            max_frame_len: 8 * 1024 * 1024,
            channel: 11,
            monitor_parameters: vec!["droppedPackets".to_string()],
            echo_interval_ms: 3_000,
            echo_timeout_ms: 10_000,
            exit_grace_multiplier: 3,
            policy_path: None,
            metrics_sink_type: MetricsSinkType::Log,
            metrics_file_path: None,
        }
    }
}

impl ControllerConfig {
    pub fn echo_interval(&self) -> Duration {
        Duration::from_millis(self.echo_interval_ms)
    }

    pub fn echo_timeout(&self) -> Duration {
        Duration::from_millis(self.echo_timeout_ms)
    }

    pub fn validate(&self) -> Result<()> {
        if self.uplink_endpoint.trim().is_empty() || self.downlink_endpoint.trim().is_empty() {
            bail!("uplink_endpoint and downlink_endpoint must be set");
        }
        if self.echo_interval_ms == 0 {
            bail!("echo_interval_ms must be greater than zero");
        }
        if self.echo_timeout_ms == 0 {
            bail!("echo_timeout_ms must be greater than zero");
        }
        if self.exit_grace_multiplier < 1 {
            bail!("exit_grace_multiplier must be at least 1");
        }
        if self.max_frame_len == 0 {
            bail!("max_frame_len must be greater than zero");
        }
        if self.metrics_sink_type == MetricsSinkType::File && self.metrics_file_path.is_none() {
            bail!("metrics_file_path is required for the file metrics sink");
        }
        Ok(())
    }
}

/// Load the controller configuration from an optional file layered with
/// `CONTROLLER_*` environment variables (a `.env` file is honoured).
pub fn load_controller_config(path: &str) -> Result<ControllerConfig> {
    dotenv::dotenv().ok();
    let settings = config::Config::builder()
        .add_source(config::File::with_name(path).required(false))
        .add_source(config::Environment::with_prefix("CONTROLLER"))
        .build()?;
    let controller_config: ControllerConfig = settings.try_deserialize()?;
    controller_config.validate()?;
    log::debug!("Loaded controller config: {:?}", controller_config);
    Ok(controller_config)
}
