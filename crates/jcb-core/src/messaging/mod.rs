//! Chat-platform abstractions (Circuit today).

pub mod port;
pub mod types;
