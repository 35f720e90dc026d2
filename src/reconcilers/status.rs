//! Status projection from owned resources onto the PretzelAI

use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::Service;
use kube::ResourceExt;
use tracing::info;

use crate::adapters::service_builder;
use crate::crd::{PretzelAI, PretzelAIStatus};
use crate::store::ObjectStore;
use crate::Result;

/// Status value reported once the declared ConfigMap has been applied
pub const CONFIG_MAP_APPLIED: &str = "Applied";

/// Status the PretzelAI should carry given what the owned resources report
///
/// When no ConfigMap is declared the previous `configMapStatus` is kept as-is;
/// it is not cleared after `configMapName` is removed from the spec.
pub fn observe(app: &PretzelAI, workload: &Deployment, exposure: &Service) -> PretzelAIStatus {
    let current = app.status.clone().unwrap_or_default();
    let workload_status = workload.status.as_ref();

    PretzelAIStatus {
        ready_replicas: workload_status
            .and_then(|s| s.ready_replicas)
            .unwrap_or(0),
        available_replicas: workload_status
            .and_then(|s| s.available_replicas)
            .unwrap_or(0),
        service_status: service_builder::service_type(exposure).to_string(),
        config_map_status: if app.spec.config_map().is_some() {
            CONFIG_MAP_APPLIED.to_string()
        } else {
            current.config_map_status
        },
    }
}

/// Write the observed status if it differs from the recorded one
///
/// Uses the status write path only, so concurrent spec edits are never
/// overwritten. Returns whether a write happened.
pub async fn project<S: ObjectStore>(
    store: &S,
    app: &PretzelAI,
    workload: &Deployment,
    exposure: &Service,
) -> Result<bool> {
    let observed = observe(app, workload, exposure);
    if app.status.as_ref() == Some(&observed) {
        return Ok(false);
    }

    let ns = app.namespace().unwrap_or_default();
    let name = app.name_any();

    let mut updated = app.clone();
    updated.status = Some(observed.clone());
    store.replace_status(&ns, &name, &updated).await?;

    info!(
        "Updated status for PretzelAI {}/{}: ready={}, available={}, service={}",
        ns, name, observed.ready_replicas, observed.available_replicas, observed.service_status
    );
    Ok(true)
}
