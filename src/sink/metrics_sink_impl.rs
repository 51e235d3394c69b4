use crate::sink::channel_sink::ChannelMetricsSink;
use crate::sink::file_sink::FileMetricsSink;
use crate::sink::log_sink::LogMetricsSink;
use crate::traits::metrics_sink::{MetricsSink, MonitorReport};

pub enum MetricsSinkImpl {
    Log(LogMetricsSink),
    File(FileMetricsSink),
    Channel(ChannelMetricsSink),
}

impl MetricsSink for MetricsSinkImpl {
    async fn record(&self, report: &MonitorReport) -> anyhow::Result<()> {
        match self {
            MetricsSinkImpl::Log(l) => l.record(report).await,
            MetricsSinkImpl::File(f) => f.record(report).await,
            MetricsSinkImpl::Channel(c) => c.record(report).await,
        }
    }
}
