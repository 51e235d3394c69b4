pub mod context;
pub mod monitor_response;
pub mod new_node;
pub mod node_exit;
