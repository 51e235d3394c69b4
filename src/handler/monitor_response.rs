use bytes::Bytes;
use chrono::Utc;

use crate::common::error::ControllerResult;
use crate::handler::context::HandlerContext;
use crate::traits::metrics_sink::{MetricsSink, MonitorReport};

/// Forward a monitoring response to the metrics sink. Sink failures are
/// logged; they never stop the controller.
pub async fn handle_monitor_response(
    ctx: &mut HandlerContext,
    topic: String,
    payload: Bytes,
) -> ControllerResult<()> {
    log::debug!("Monitor transmission parameters response on {} ({} bytes)", topic, payload.len());
    let report = MonitorReport {
        source_topic: topic,
        received_at: Utc::now(),
        payload,
    };
    if let Err(e) = ctx.metrics.record(&report).await {
        log::warn!("Metrics sink rejected report from {}: {:?}", report.source_topic, e);
    }
    Ok(())
}
