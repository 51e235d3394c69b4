use std::sync::Arc;

use uuid::Uuid;

use crate::common::config::ControllerConfig;
use crate::membership::registry::Registry;
use crate::qos::builder::QosConfigBuilder;
use crate::sink::metrics_sink_impl::MetricsSinkImpl;
use crate::transport::transport_impl::TransportImpl;

/// Everything a handler may touch. Owned by the controller loop; handlers get
/// it by `&mut`, so no locking is involved.
pub struct HandlerContext {
    pub controller_id: Uuid,
    pub config: Arc<ControllerConfig>,
    pub transport: TransportImpl,
    pub registry: Registry,
    pub qos: QosConfigBuilder,
    pub metrics: MetricsSinkImpl,
    pub echo_seq: u64,
}
