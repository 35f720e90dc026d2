//! Kubernetes Service builder for PretzelAI access

use k8s_openapi::api::core::v1::{Service, ServicePort, ServiceSpec};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
use kube::ResourceExt;

use super::labels::{resource_labels, selector_labels};
use super::{CONTAINER_PORT, PORT_NAME, SERVICE_PORT};
use crate::crd::PretzelAI;

/// Build the Service for a PretzelAI
///
/// Routes port 80 to the container port of every pod of this instance.
pub fn build_service(app: &PretzelAI) -> Service {
    let name = app.name_any();

    Service {
        metadata: ObjectMeta {
            name: Some(name.clone()),
            namespace: app.namespace(),
            labels: Some(resource_labels(&name)),
            ..Default::default()
        },
        spec: Some(ServiceSpec {
            type_: Some(app.spec.service_type.as_str().to_string()),
            selector: Some(selector_labels(&name)),
            ports: Some(vec![ServicePort {
                name: Some(PORT_NAME.to_string()),
                port: SERVICE_PORT,
                target_port: Some(IntOrString::Int(CONTAINER_PORT)),
                protocol: Some("TCP".to_string()),
                ..Default::default()
            }]),
            ..Default::default()
        }),
        ..Default::default()
    }
}

/// The parts of a port the operator manages
///
/// Node ports and other server-assigned values are left out so that
/// allocation by the API server never registers as drift.
#[derive(Debug, PartialEq, Eq)]
pub struct PortMapping<'a> {
    pub name: Option<&'a str>,
    pub port: i32,
    pub target_port: Option<&'a IntOrString>,
    pub protocol: &'a str,
}

/// Port mappings of a Service in declaration order
pub fn port_mappings(service: &Service) -> Vec<PortMapping<'_>> {
    service
        .spec
        .as_ref()
        .and_then(|s| s.ports.as_ref())
        .map(|ports| {
            ports
                .iter()
                .map(|p| PortMapping {
                    name: p.name.as_deref(),
                    port: p.port,
                    target_port: p.target_port.as_ref(),
                    protocol: p.protocol.as_deref().unwrap_or("TCP"),
                })
                .collect()
        })
        .unwrap_or_default()
}

/// Service type, defaulting to ClusterIP like the API server does
pub fn service_type(service: &Service) -> &str {
    service
        .spec
        .as_ref()
        .and_then(|s| s.type_.as_deref())
        .unwrap_or("ClusterIP")
}
