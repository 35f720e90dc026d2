//! Controller for PretzelAI resources

use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::StreamExt;
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::{ConfigMap, Service};
use kube::{
    runtime::{
        controller::{Action, Controller},
        watcher::Config,
    },
    Api, Client, ResourceExt,
};
use tracing::{error, info, instrument, warn};

use crate::controllers::Context;
use crate::crd::PretzelAI;
use crate::metrics::prometheus::{
    forget_instance, record_pass, RECONCILE_DURATION, RECONCILIATIONS, RECONCILIATION_ERRORS,
};
use crate::reconcilers::{reconcile_pass, PassOutcome};
use crate::store::{KubeStore, ObjectStore};
use crate::Error;

/// Run the PretzelAI controller until the context's shutdown token fires
pub async fn run(client: Client, ctx: Arc<Context<KubeStore>>) {
    let apps: Api<PretzelAI> = Api::all(client.clone());
    let shutdown = ctx.shutdown.clone();

    info!("Starting PretzelAI controller");

    Controller::new(apps, Config::default().any_semantic())
        .owns(Api::<Deployment>::all(client.clone()), Config::default())
        .owns(Api::<Service>::all(client.clone()), Config::default())
        .owns(Api::<ConfigMap>::all(client), Config::default())
        .graceful_shutdown_on(async move { shutdown.cancelled().await })
        .run(reconcile::<KubeStore>, error_policy::<KubeStore>, ctx)
        .for_each(|res| async move {
            match res {
                Ok(o) => info!("Reconciled {:?}", o),
                Err(e) => error!("Reconcile failed: {:?}", e),
            }
        })
        .await;

    info!("PretzelAI controller stopped");
}

/// Reconcile a PretzelAI resource
///
/// The object handed in by the watcher only identifies what to reconcile; the
/// pass itself re-reads everything from the store.
#[instrument(skip(app, ctx), fields(name = %app.name_any(), namespace = %app.namespace().unwrap_or_default()))]
pub async fn reconcile<S: ObjectStore + 'static>(
    app: Arc<PretzelAI>,
    ctx: Arc<Context<S>>,
) -> Result<Action, Error> {
    let start = Instant::now();
    let ns = app.namespace().unwrap_or_default();
    let name = app.name_any();
    let deadline = ctx.config.pass_timeout();

    let result = tokio::select! {
        biased;
        _ = ctx.shutdown.cancelled() => Err(Error::Cancelled),
        res = tokio::time::timeout(deadline, reconcile_pass(&ctx.store, &ns, &name)) => {
            res.unwrap_or_else(|_| Err(Error::Timeout(deadline)))
        }
    };

    let duration = start.elapsed().as_secs_f64();

    let outcome = match result {
        Ok(outcome) => outcome,
        Err(e) => {
            RECONCILE_DURATION
                .with_label_values(&["error"])
                .observe(duration);
            RECONCILIATION_ERRORS
                .with_label_values(&[error_reason(&e)])
                .inc();
            return Err(e);
        }
    };

    let label = outcome_label(&outcome);
    RECONCILIATIONS.with_label_values(&[label]).inc();
    RECONCILE_DURATION
        .with_label_values(&[label])
        .observe(duration);
    info!(
        "Reconciled PretzelAI {}/{} ({}) in {:.2}s",
        ns, name, label, duration
    );

    Ok(match outcome {
        PassOutcome::NotFound | PassOutcome::FinalizerRemoved => {
            forget_instance(&ns, &name);
            Action::await_change()
        }
        PassOutcome::Released => Action::await_change(),
        // Owned resources are converged on a fresh pass that sees the finalizer
        PassOutcome::FinalizerAdded => Action::requeue(Duration::ZERO),
        PassOutcome::Converged(report) => {
            record_pass(&ns, &name, &report);
            Action::requeue(ctx.config.requeue_interval())
        }
    })
}

/// Error policy for the controller
pub fn error_policy<S: ObjectStore>(
    app: Arc<PretzelAI>,
    err: &Error,
    ctx: Arc<Context<S>>,
) -> Action {
    let ns = app.namespace().unwrap_or_default();
    let name = app.name_any();

    match err {
        Error::Conflict { .. } => {
            warn!("Conflict reconciling {}/{}, retrying from a fresh read: {}", ns, name, err);
            Action::requeue(ctx.config.conflict_requeue())
        }
        Error::Validation(_) => {
            error!("Invalid spec for {}/{}: {}", ns, name, err);
            Action::requeue(ctx.config.validation_requeue())
        }
        Error::Cancelled => Action::await_change(),
        _ => {
            error!("Reconciliation error for {}/{}: {:?}", ns, name, err);
            Action::requeue(ctx.config.error_requeue())
        }
    }
}

fn outcome_label(outcome: &PassOutcome) -> &'static str {
    match outcome {
        PassOutcome::NotFound => "not_found",
        PassOutcome::FinalizerAdded => "finalizer_added",
        PassOutcome::FinalizerRemoved => "finalizer_removed",
        PassOutcome::Released => "released",
        PassOutcome::Converged(_) => "converged",
    }
}

fn error_reason(err: &Error) -> &'static str {
    match err {
        Error::Kube(_) => "kube",
        Error::Conflict { .. } => "conflict",
        Error::NotFound { .. } => "not_found",
        Error::InvalidObject(_) => "invalid_object",
        Error::Validation(_) => "validation",
        Error::Store(_) => "store",
        Error::Serialization(_) => "serialization",
        Error::Timeout(_) => "timeout",
        Error::Cancelled => "cancelled",
    }
}
