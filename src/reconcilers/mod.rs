//! Reconciliation logic for PretzelAI resources and the resources they own

pub mod converger;
pub mod finalizer;
pub mod pretzel_ai;
pub mod status;

pub use converger::{ConvergeAction, Converged, Converger};
pub use finalizer::{GateDecision, FINALIZER};
pub use pretzel_ai::{reconcile_pass, validate, PassOutcome, PassReport};
