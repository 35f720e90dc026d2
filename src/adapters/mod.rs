//! Builders for the Kubernetes resources owned by a PretzelAI

pub mod config_map_builder;
pub mod deployment_builder;
pub mod labels;
pub mod service_builder;

/// Port the PretzelAI container listens on
pub const CONTAINER_PORT: i32 = 8888;

/// Port the Service exposes
pub const SERVICE_PORT: i32 = 80;

/// Name shared by the container port and the Service port
pub const PORT_NAME: &str = "http";
