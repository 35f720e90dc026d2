//! Reconciliation logic for PretzelAI resources
//!
//! One call to [`reconcile_pass`] loads the PretzelAI, runs the finalizer gate,
//! converges the Deployment, Service and optional ConfigMap, and projects the
//! observed state back into the PretzelAI's status. Every step is idempotent,
//! so an interrupted pass is simply repeated.

use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::{ConfigMap, Service};
use kube::ResourceExt;
use tracing::{debug, info, instrument};

use super::converger::{ConvergeAction, Converged, Converger};
use super::finalizer::{self, GateDecision};
use super::status;
use crate::adapters::{config_map_builder, deployment_builder, service_builder};
use crate::crd::PretzelAI;
use crate::store::ObjectStore;
use crate::{Error, Result};

/// Deployment running the PretzelAI pods; watches replicas and image
pub const WORKLOAD: Converger<PretzelAI, Deployment> =
    Converger::new(build_workload, workload_fields_equal, apply_workload);

/// Service exposing the pods; watches the port mappings
pub const EXPOSURE: Converger<PretzelAI, Service> =
    Converger::new(build_exposure, exposure_fields_equal, apply_exposure);

/// ConfigMap named by `spec.configMapName`; watches the data payload
pub const CONFIG_BUNDLE: Converger<PretzelAI, ConfigMap> =
    Converger::new(config_map_builder::build_config_map, config_fields_equal, apply_config);

fn build_workload(app: &PretzelAI) -> Option<Deployment> {
    Some(deployment_builder::build_deployment(app))
}

fn workload_fields_equal(desired: &Deployment, live: &Deployment) -> bool {
    deployment_builder::replicas(desired) == deployment_builder::replicas(live)
        && deployment_builder::image(desired) == deployment_builder::image(live)
}

fn apply_workload(desired: &Deployment, live: &mut Deployment) {
    let replicas = deployment_builder::replicas(desired);
    let image = deployment_builder::image(desired).map(str::to_string);

    let live_spec = live.spec.get_or_insert_with(Default::default);
    live_spec.replicas = replicas;
    if let Some(container) = live_spec
        .template
        .spec
        .as_mut()
        .and_then(|pod| pod.containers.first_mut())
    {
        container.image = image;
        return;
    }

    // No container to patch; take the whole desired pod template
    if let Some(desired_spec) = desired.spec.as_ref() {
        live_spec.template = desired_spec.template.clone();
    }
}

fn build_exposure(app: &PretzelAI) -> Option<Service> {
    Some(service_builder::build_service(app))
}

fn exposure_fields_equal(desired: &Service, live: &Service) -> bool {
    service_builder::port_mappings(desired) == service_builder::port_mappings(live)
}

fn apply_exposure(desired: &Service, live: &mut Service) {
    let ports = desired.spec.as_ref().and_then(|s| s.ports.clone());
    live.spec.get_or_insert_with(Default::default).ports = ports;
}

fn config_fields_equal(desired: &ConfigMap, live: &ConfigMap) -> bool {
    desired.data == live.data
}

fn apply_config(desired: &ConfigMap, live: &mut ConfigMap) {
    live.data = desired.data.clone();
}

/// Summary of a pass that reached convergence
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PassReport {
    pub workload: ConvergeAction,
    pub exposure: ConvergeAction,
    /// `None` when no ConfigMap is declared
    pub config_map: Option<ConvergeAction>,
    pub status_updated: bool,
    pub ready_replicas: i32,
}

impl PassReport {
    /// Number of writes made to owned resources
    pub fn owned_writes(&self) -> usize {
        [Some(self.workload), Some(self.exposure), self.config_map]
            .into_iter()
            .flatten()
            .filter(ConvergeAction::wrote)
            .count()
    }
}

/// How a pass ended
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PassOutcome {
    /// The PretzelAI no longer exists
    NotFound,
    /// Finalizer added; owned resources are converged on the next pass
    FinalizerAdded,
    /// Finalizer removed; the garbage collector takes it from here
    FinalizerRemoved,
    /// Being deleted and already released by this operator
    Released,
    /// Owned resources and status are converged
    Converged(PassReport),
}

/// Validate a PretzelAI spec
pub fn validate(app: &PretzelAI) -> Result<()> {
    if app.spec.replicas < 1 {
        return Err(Error::validation(format!(
            "spec.replicas must be >= 1, got {}",
            app.spec.replicas
        )));
    }
    Ok(())
}

/// Run one reconcile pass for the PretzelAI `namespace/name`
#[instrument(skip(store))]
pub async fn reconcile_pass<S: ObjectStore>(
    store: &S,
    namespace: &str,
    name: &str,
) -> Result<PassOutcome> {
    let Some(app) = store.get::<PretzelAI>(namespace, name).await? else {
        debug!("PretzelAI {}/{} not found, nothing to do", namespace, name);
        return Ok(PassOutcome::NotFound);
    };

    match finalizer::evaluate(&app) {
        GateDecision::AddFinalizer => {
            finalizer::add(store, &app).await?;
            return Ok(PassOutcome::FinalizerAdded);
        }
        GateDecision::RemoveFinalizer => {
            finalizer::remove(store, &app).await?;
            return Ok(PassOutcome::FinalizerRemoved);
        }
        GateDecision::Released => {
            debug!("PretzelAI {}/{} is being deleted, nothing to do", namespace, name);
            return Ok(PassOutcome::Released);
        }
        GateDecision::Proceed => {}
    }

    validate(&app)?;

    let workload = required(WORKLOAD.converge(store, &app).await?, "Deployment", &app)?;
    let exposure = required(EXPOSURE.converge(store, &app).await?, "Service", &app)?;
    let config_map = CONFIG_BUNDLE.converge(store, &app).await?;

    let status_updated = status::project(store, &app, &workload.object, &exposure.object).await?;

    let report = PassReport {
        workload: workload.action,
        exposure: exposure.action,
        config_map: config_map.map(|c| c.action),
        status_updated,
        ready_replicas: workload
            .object
            .status
            .as_ref()
            .and_then(|s| s.ready_replicas)
            .unwrap_or(0),
    };

    info!(
        "Converged PretzelAI {}/{}: deployment={}, service={}, configmap={}, status_updated={}",
        namespace,
        name,
        report.workload,
        report.exposure,
        report.config_map.map_or("none", |a| a.as_str()),
        report.status_updated
    );

    Ok(PassOutcome::Converged(report))
}

fn required<O>(converged: Option<Converged<O>>, kind: &str, app: &PretzelAI) -> Result<Converged<O>> {
    converged.ok_or_else(|| {
        Error::InvalidObject(format!(
            "no {} could be built for PretzelAI {}",
            kind,
            app.name_any()
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crd::{PretzelAISpec, ServiceType};
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;

    fn app(replicas: i32, image: Option<&str>) -> PretzelAI {
        PretzelAI {
            metadata: ObjectMeta {
                name: Some("notebook".to_string()),
                namespace: Some("lab".to_string()),
                ..Default::default()
            },
            spec: PretzelAISpec {
                replicas,
                image: image.map(str::to_string),
                config_map_name: None,
                service_type: ServiceType::ClusterIP,
            },
            status: None,
        }
    }

    #[test]
    fn zero_replicas_fail_validation() {
        let err = validate(&app(0, None)).unwrap_err();
        assert!(err.is_validation());
        assert!(err.to_string().contains("spec.replicas"));
    }

    #[test]
    fn positive_replicas_pass_validation() {
        assert!(validate(&app(1, None)).is_ok());
        assert!(validate(&app(5, Some("x:latest"))).is_ok());
    }

    #[test]
    fn workload_equality_ignores_unwatched_fields() {
        let desired = deployment_builder::build_deployment(&app(2, Some("x:1")));
        let mut live = desired.clone();
        live.metadata.labels = None;
        live.metadata.resource_version = Some("42".to_string());
        if let Some(spec) = live.spec.as_mut() {
            spec.revision_history_limit = Some(10);
        }

        assert!(workload_fields_equal(&desired, &live));
    }

    #[test]
    fn workload_equality_sees_replicas_and_image() {
        let desired = deployment_builder::build_deployment(&app(2, Some("x:1")));

        let scaled = deployment_builder::build_deployment(&app(3, Some("x:1")));
        assert!(!workload_fields_equal(&desired, &scaled));

        let retagged = deployment_builder::build_deployment(&app(2, Some("x:2")));
        assert!(!workload_fields_equal(&desired, &retagged));
    }

    #[test]
    fn apply_workload_only_touches_watched_fields() {
        let desired = deployment_builder::build_deployment(&app(4, Some("x:2")));
        let mut live = deployment_builder::build_deployment(&app(1, Some("x:1")));
        live.metadata
            .labels
            .get_or_insert_with(Default::default)
            .insert("team".to_string(), "data".to_string());

        apply_workload(&desired, &mut live);

        assert_eq!(deployment_builder::replicas(&live), Some(4));
        assert_eq!(deployment_builder::image(&live), Some("x:2"));
        assert!(live.labels().contains_key("team"));
    }

    #[test]
    fn apply_workload_fills_empty_template() {
        let desired = deployment_builder::build_deployment(&app(2, Some("x:1")));
        let mut live = Deployment::default();

        apply_workload(&desired, &mut live);

        assert!(workload_fields_equal(&desired, &live));
    }

    #[test]
    fn exposure_apply_restores_ports() {
        let desired = service_builder::build_service(&app(1, None));
        let mut live = desired.clone();
        if let Some(spec) = live.spec.as_mut() {
            spec.ports = None;
        }
        assert!(!exposure_fields_equal(&desired, &live));

        apply_exposure(&desired, &mut live);
        assert!(exposure_fields_equal(&desired, &live));
    }

    #[test]
    fn report_counts_owned_writes() {
        let report = PassReport {
            workload: ConvergeAction::Created,
            exposure: ConvergeAction::Unchanged,
            config_map: Some(ConvergeAction::Updated),
            status_updated: true,
            ready_replicas: 0,
        };
        assert_eq!(report.owned_writes(), 2);
    }
}
