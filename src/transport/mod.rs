pub mod tcp {
    pub mod tcp_bus;
}
pub mod memory {
    pub mod memory_bus;
}
pub mod transport_impl;
