use crate::traits::metrics_sink::{MetricsSink, MonitorReport};

/// Writes monitoring responses to the log.
#[derive(Debug, Default)]
pub struct LogMetricsSink;

impl MetricsSink for LogMetricsSink {
    async fn record(&self, report: &MonitorReport) -> anyhow::Result<()> {
        log::info!(
            "Monitor transmission parameters response from {} at {}: {}",
            report.source_topic,
            report.received_at.to_rfc3339(),
            String::from_utf8_lossy(&report.payload)
        );
        Ok(())
    }
}
