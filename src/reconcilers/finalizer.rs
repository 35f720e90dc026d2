//! Finalizer gate
//!
//! Makes sure a PretzelAI carries the operator's finalizer before any owned
//! resource exists, and releases it once the resource is being deleted so the
//! garbage collector can remove the PretzelAI and everything it owns.

use kube::ResourceExt;
use tracing::info;

use crate::crd::PretzelAI;
use crate::store::ObjectStore;
use crate::Result;

/// Finalizer owned by this operator
pub const FINALIZER: &str = "pretzelai.finalizers.pretzelai.local";

/// What the gate decided for one pass
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GateDecision {
    /// Active without the finalizer: add it and end the pass
    AddFinalizer,
    /// Active with the finalizer: converge owned resources
    Proceed,
    /// Being deleted with the finalizer: remove it and end the pass
    RemoveFinalizer,
    /// Being deleted without the finalizer: nothing left to do
    Released,
}

/// Decide the gate transition from the object's metadata alone
pub fn evaluate(app: &PretzelAI) -> GateDecision {
    let has_finalizer = app.finalizers().iter().any(|f| f == FINALIZER);
    let terminating = app.metadata.deletion_timestamp.is_some();

    match (terminating, has_finalizer) {
        (false, false) => GateDecision::AddFinalizer,
        (false, true) => GateDecision::Proceed,
        (true, true) => GateDecision::RemoveFinalizer,
        (true, false) => GateDecision::Released,
    }
}

/// Persist the finalizer on an active PretzelAI
pub async fn add<S: ObjectStore>(store: &S, app: &PretzelAI) -> Result<PretzelAI> {
    let ns = app.namespace().unwrap_or_default();
    let name = app.name_any();

    let mut updated = app.clone();
    updated.finalizers_mut().push(FINALIZER.to_string());
    let stored = store.replace(&ns, &name, &updated).await?;

    info!("Added finalizer to PretzelAI {}/{}", ns, name);
    Ok(stored)
}

/// Drop the finalizer from a terminating PretzelAI
///
/// Owned resources are not deleted here: they carry owner references, so the
/// garbage collector removes them once the PretzelAI itself is gone. Any
/// pre-deletion work belongs before the write below.
pub async fn remove<S: ObjectStore>(store: &S, app: &PretzelAI) -> Result<PretzelAI> {
    let ns = app.namespace().unwrap_or_default();
    let name = app.name_any();

    let mut updated = app.clone();
    updated.finalizers_mut().retain(|f| f != FINALIZER);
    let stored = store.replace(&ns, &name, &updated).await?;

    info!("Removed finalizer from PretzelAI {}/{}", ns, name);
    Ok(stored)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crd::PretzelAISpec;
    use crate::store::InMemoryStore;
    use chrono::Utc;
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::Time;

    fn app(finalizers: &[&str], terminating: bool) -> PretzelAI {
        let mut app = PretzelAI::new(
            "notebook",
            serde_json::from_str::<PretzelAISpec>("{}").unwrap(),
        );
        app.metadata.namespace = Some("lab".to_string());
        app.metadata.finalizers = Some(finalizers.iter().map(|f| f.to_string()).collect());
        if terminating {
            app.metadata.deletion_timestamp = Some(Time(Utc::now()));
        }
        app
    }

    #[test]
    fn gate_covers_all_four_states() {
        assert_eq!(evaluate(&app(&[], false)), GateDecision::AddFinalizer);
        assert_eq!(evaluate(&app(&[FINALIZER], false)), GateDecision::Proceed);
        assert_eq!(evaluate(&app(&[FINALIZER], true)), GateDecision::RemoveFinalizer);
        assert_eq!(evaluate(&app(&[], true)), GateDecision::Released);
    }

    #[test]
    fn foreign_finalizers_do_not_count() {
        assert_eq!(
            evaluate(&app(&["example.com/other"], false)),
            GateDecision::AddFinalizer
        );
        assert_eq!(
            evaluate(&app(&["example.com/other"], true)),
            GateDecision::Released
        );
    }

    #[tokio::test]
    async fn add_then_remove_keeps_foreign_finalizers() {
        let store = InMemoryStore::new();
        let seeded = store.seed(&app(&["example.com/other"], false)).unwrap();

        let added = add(&store, &seeded).await.unwrap();
        assert_eq!(added.finalizers(), &["example.com/other", FINALIZER]);

        let removed = remove(&store, &added).await.unwrap();
        assert_eq!(removed.finalizers(), &["example.com/other"]);
    }
}
