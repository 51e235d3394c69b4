use tokio::sync::mpsc;

use crate::traits::metrics_sink::{MetricsSink, MonitorReport};

/// Hands monitoring responses to another task.
#[derive(Debug, Clone)]
pub struct ChannelMetricsSink {
    tx: mpsc::UnboundedSender<MonitorReport>,
}

impl ChannelMetricsSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<MonitorReport>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl MetricsSink for ChannelMetricsSink {
    async fn record(&self, report: &MonitorReport) -> anyhow::Result<()> {
        self.tx
            .send(report.clone())
            .map_err(|_| anyhow::anyhow!("metrics receiver dropped"))
    }
}
