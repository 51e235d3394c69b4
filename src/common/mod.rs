pub mod config;
pub mod error;
pub mod frame;
pub mod node;
pub mod protocol;
