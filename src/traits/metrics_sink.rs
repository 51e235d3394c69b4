use bytes::Bytes;
use chrono::{DateTime, Utc};

/// A monitoring response forwarded from an agent.
#[derive(Debug, Clone, PartialEq)]
pub struct MonitorReport {
    pub source_topic: String,
    pub received_at: DateTime<Utc>,
    pub payload: Bytes,
}

#[trait_variant::make(MetricsSink: Send)]
pub trait UnsendMetricsSink {
    async fn record(&self, report: &MonitorReport) -> anyhow::Result<()>;
}
