pub mod common;
pub mod handler;
pub mod membership;
pub mod qos;
pub mod server;
pub mod sink;
pub mod traits;
pub mod transport;

pub use server::controller::Controller;
pub use server::server::controller_start;
