// Shared value types and the ports adapters implement. No vendor code here.

pub mod model;
pub mod ports;
