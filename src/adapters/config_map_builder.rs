//! Kubernetes ConfigMap builder for PretzelAI configuration

use std::collections::BTreeMap;

use k8s_openapi::api::core::v1::ConfigMap;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::ResourceExt;

use super::labels::resource_labels;
use crate::crd::PretzelAI;

/// Key of the single configuration entry
pub const CONFIG_KEY: &str = "config.yaml";

/// Placeholder payload written under [`CONFIG_KEY`]
pub const CONFIG_PAYLOAD: &str = "example: value";

/// Build the ConfigMap named by `spec.configMapName`
///
/// Returns `None` when no ConfigMap is declared.
pub fn build_config_map(app: &PretzelAI) -> Option<ConfigMap> {
    let name = app.spec.config_map()?;

    Some(ConfigMap {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: app.namespace(),
            labels: Some(resource_labels(&app.name_any())),
            ..Default::default()
        },
        data: Some(BTreeMap::from([(
            CONFIG_KEY.to_string(),
            CONFIG_PAYLOAD.to_string(),
        )])),
        ..Default::default()
    })
}
