//! Prometheus metrics for the PretzelAI Operator

pub mod prometheus;

pub use prometheus::*;
