//! Kubernetes Deployment builder for PretzelAI pods

use k8s_openapi::api::apps::v1::{Deployment, DeploymentSpec};
use k8s_openapi::api::core::v1::{Container, ContainerPort, PodSpec, PodTemplateSpec};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{LabelSelector, ObjectMeta};
use kube::ResourceExt;

use super::labels::{resource_labels, selector_labels};
use super::{CONTAINER_PORT, PORT_NAME};
use crate::crd::PretzelAI;

/// Image used when the spec does not override it
pub const DEFAULT_IMAGE: &str = "pretzelai:local";

/// Name of the single application container
pub const CONTAINER_NAME: &str = "pretzelai";

/// Build the Deployment for a PretzelAI
///
/// The Deployment shares the PretzelAI's name and namespace.
pub fn build_deployment(app: &PretzelAI) -> Deployment {
    let name = app.name_any();
    let labels = resource_labels(&name);
    let selector = selector_labels(&name);

    Deployment {
        metadata: ObjectMeta {
            name: Some(name),
            namespace: app.namespace(),
            labels: Some(labels.clone()),
            ..Default::default()
        },
        spec: Some(DeploymentSpec {
            replicas: Some(app.spec.replicas),
            selector: LabelSelector {
                match_labels: Some(selector),
                ..Default::default()
            },
            template: PodTemplateSpec {
                metadata: Some(ObjectMeta {
                    labels: Some(labels),
                    ..Default::default()
                }),
                spec: Some(build_pod_spec(app)),
            },
            ..Default::default()
        }),
        ..Default::default()
    }
}

fn build_pod_spec(app: &PretzelAI) -> PodSpec {
    let image = app.spec.image_override().unwrap_or(DEFAULT_IMAGE);

    PodSpec {
        containers: vec![Container {
            name: CONTAINER_NAME.to_string(),
            image: Some(image.to_string()),
            image_pull_policy: Some("IfNotPresent".to_string()),
            ports: Some(vec![ContainerPort {
                name: Some(PORT_NAME.to_string()),
                container_port: CONTAINER_PORT,
                protocol: Some("TCP".to_string()),
                ..Default::default()
            }]),
            ..Default::default()
        }],
        ..Default::default()
    }
}

/// Replica count of a Deployment, if set
pub fn replicas(deployment: &Deployment) -> Option<i32> {
    deployment.spec.as_ref().and_then(|s| s.replicas)
}

/// Image of the first container, if any
pub fn image(deployment: &Deployment) -> Option<&str> {
    deployment
        .spec
        .as_ref()
        .and_then(|s| s.template.spec.as_ref())
        .and_then(|pod| pod.containers.first())
        .and_then(|c| c.image.as_deref())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crd::{PretzelAISpec, ServiceType};

    fn app(image: Option<&str>) -> PretzelAI {
        let mut app = PretzelAI::new(
            "notebook",
            PretzelAISpec {
                replicas: 3,
                image: image.map(str::to_string),
                config_map_name: None,
                service_type: ServiceType::ClusterIP,
            },
        );
        app.metadata.namespace = Some("lab".to_string());
        app
    }

    #[test]
    fn deployment_mirrors_spec() {
        let deployment = build_deployment(&app(Some("pretzelai:2.0")));

        assert_eq!(deployment.metadata.name.as_deref(), Some("notebook"));
        assert_eq!(deployment.metadata.namespace.as_deref(), Some("lab"));
        assert_eq!(replicas(&deployment), Some(3));
        assert_eq!(image(&deployment), Some("pretzelai:2.0"));
    }

    #[test]
    fn default_image_when_unset() {
        assert_eq!(image(&build_deployment(&app(None))), Some(DEFAULT_IMAGE));
        assert_eq!(image(&build_deployment(&app(Some("")))), Some(DEFAULT_IMAGE));
    }

    #[test]
    fn container_exposes_fixed_port() {
        let deployment = build_deployment(&app(None));
        let pod = deployment.spec.unwrap().template.spec.unwrap();
        let ports = pod.containers[0].ports.clone().unwrap();

        assert_eq!(ports.len(), 1);
        assert_eq!(ports[0].container_port, 8888);
        assert_eq!(ports[0].name.as_deref(), Some("http"));
    }

    #[test]
    fn selector_matches_pod_labels() {
        let deployment = build_deployment(&app(None));
        let spec = deployment.spec.unwrap();
        let selector = spec.selector.match_labels.unwrap();
        let pod_labels = spec.template.metadata.unwrap().labels.unwrap();

        for (key, value) in &selector {
            assert_eq!(pod_labels.get(key), Some(value));
        }
    }

    #[test]
    fn accessors_tolerate_missing_spec() {
        let empty = Deployment::default();
        assert_eq!(replicas(&empty), None);
        assert_eq!(image(&empty), None);
    }
}
