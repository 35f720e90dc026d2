//! PretzelAI Kubernetes Operator
//!
//! This operator keeps the Deployment, Service and optional ConfigMap owned by a
//! `PretzelAI` custom resource converged to the state declared in its spec, and
//! reflects what it observes back into the resource's status.

pub mod adapters;
pub mod config;
pub mod controllers;
pub mod crd;
pub mod error;
pub mod metrics;
pub mod reconcilers;
pub mod store;

pub use config::OperatorConfig;
pub use error::{Error, Result};
