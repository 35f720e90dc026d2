//! PretzelAI Custom Resource Definition

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// PretzelAI resource specification
#[derive(CustomResource, Clone, Debug, PartialEq, Deserialize, Serialize, JsonSchema)]
#[kube(
    group = "pretzelai.pretzelai.local",
    version = "v1alpha1",
    kind = "PretzelAI",
    plural = "pretzelais",
    singular = "pretzelai",
    namespaced,
    status = "PretzelAIStatus",
    printcolumn = r#"{"name": "Replicas", "type": "integer", "description": "The desired number of replicas", "jsonPath": ".spec.replicas"}"#,
    printcolumn = r#"{"name": "Ready", "type": "integer", "description": "The number of ready replicas", "jsonPath": ".status.readyReplicas"}"#,
    printcolumn = r#"{"name": "Service", "type": "string", "description": "The service type", "jsonPath": ".spec.serviceType"}"#,
    printcolumn = r#"{"name": "Age", "type": "date", "jsonPath": ".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct PretzelAISpec {
    /// Desired number of PretzelAI pods
    #[serde(default = "default_replicas")]
    #[schemars(range(min = 1))]
    pub replicas: i32,

    /// Container image override; the operator default is used when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,

    /// Name of the ConfigMap the operator manages for this instance
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config_map_name: Option<String>,

    /// How the application is exposed
    #[serde(default)]
    pub service_type: ServiceType,
}

fn default_replicas() -> i32 {
    1
}

impl PretzelAISpec {
    /// Image override, treating an empty string as unset
    pub fn image_override(&self) -> Option<&str> {
        self.image.as_deref().filter(|image| !image.is_empty())
    }

    /// Declared ConfigMap name, treating an empty string as unset
    pub fn config_map(&self) -> Option<&str> {
        self.config_map_name.as_deref().filter(|name| !name.is_empty())
    }
}

/// Service exposure mode
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
pub enum ServiceType {
    #[default]
    ClusterIP,
    NodePort,
    LoadBalancer,
}

impl ServiceType {
    /// Kubernetes `spec.type` value for this mode
    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceType::ClusterIP => "ClusterIP",
            ServiceType::NodePort => "NodePort",
            ServiceType::LoadBalancer => "LoadBalancer",
        }
    }
}

impl std::fmt::Display for ServiceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// PretzelAI status
///
/// Only ever written from observations of the owned resources.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct PretzelAIStatus {
    /// Number of pods that are ready and serving traffic
    #[serde(default)]
    pub ready_replicas: i32,

    /// Number of available pods
    #[serde(default)]
    pub available_replicas: i32,

    /// Current type of the Service
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub service_status: String,

    /// Confirms the declared ConfigMap was applied
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub config_map_status: String,
}
