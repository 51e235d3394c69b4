use anyhow::{Context, Result};

use crate::common::config::{ControllerConfig, MetricsSinkType};
use crate::qos::policy::PolicyTable;
use crate::sink::{
    file_sink::FileMetricsSink, log_sink::LogMetricsSink, metrics_sink_impl::MetricsSinkImpl,
};
use crate::transport::{tcp::tcp_bus::TcpBus, transport_impl::TransportImpl};

pub async fn load_transport(config: &ControllerConfig) -> Result<TransportImpl> {
    log::debug!("Using TCP control bus");
    let bus = TcpBus::bind(
        &config.uplink_endpoint,
        &config.downlink_endpoint,
        config.max_frame_len,
    )
    .await?;
    Ok(TransportImpl::Tcp(bus))
}

pub fn load_metrics_sink(config: &ControllerConfig) -> Result<MetricsSinkImpl> {
    let sink = match config.metrics_sink_type {
        MetricsSinkType::Log => {
            log::debug!("Using log metrics sink");
            MetricsSinkImpl::Log(LogMetricsSink)
        }
        MetricsSinkType::File => {
            let path = config
                .metrics_file_path
                .clone()
                .ok_or_else(|| anyhow::anyhow!("metrics file path not configured"))?;
            log::debug!("Using file metrics sink at {}", path);
            MetricsSinkImpl::File(FileMetricsSink::new(path))
        }
    };
    Ok(sink)
}

pub fn load_policy_table(config: &ControllerConfig) -> Result<PolicyTable> {
    let table = match &config.policy_path {
        Some(path) => {
            log::debug!("Loading policy table from {}", path);
            PolicyTable::load(path).with_context(|| format!("failed to load policy table {}", path))?
        }
        None => {
            log::debug!("Using builtin policy table");
            PolicyTable::builtin()?
        }
    };
    Ok(table)
}
