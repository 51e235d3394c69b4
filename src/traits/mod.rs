pub mod metrics_sink;
pub mod transport;
