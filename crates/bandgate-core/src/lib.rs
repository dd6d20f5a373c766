//! bandgate-core — shared types: configuration, QoS policy, HTTP framing.
//! All other bandgate crates depend on this one.

pub mod config;
pub mod http;
pub mod qos;

pub use qos::{QosEntry, QosError, QosTable, Rate};
