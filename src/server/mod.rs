pub mod controller;
pub mod dispatch;
pub mod heartbeat;
pub mod loader;
pub mod server;
