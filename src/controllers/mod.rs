//! Controller implementations for watching and reconciling resources

pub mod pretzel_ai_controller;

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::OperatorConfig;

/// Shared context for controllers
pub struct Context<S> {
    /// Object store the reconcilers read and write through
    pub store: S,
    /// Operator configuration
    pub config: OperatorConfig,
    /// Fires when the operator is shutting down
    pub shutdown: CancellationToken,
}

impl<S> Context<S> {
    /// Create a new context
    pub fn new(store: S, config: OperatorConfig, shutdown: CancellationToken) -> Arc<Self> {
        Arc::new(Self {
            store,
            config,
            shutdown,
        })
    }
}
