pub mod channel_sink;
pub mod file_sink;
pub mod log_sink;
pub mod metrics_sink_impl;
