//! Labels stamped on owned resources

use std::collections::BTreeMap;

const APP_NAME: &str = "pretzelai";
const MANAGED_BY: &str = "pretzelai-operator";

/// Labels used to select the pods of one PretzelAI instance
pub fn selector_labels(instance: &str) -> BTreeMap<String, String> {
    BTreeMap::from([
        ("app.kubernetes.io/name".to_string(), APP_NAME.to_string()),
        ("app.kubernetes.io/instance".to_string(), instance.to_string()),
    ])
}

/// Selector labels plus the managed-by marker
pub fn resource_labels(instance: &str) -> BTreeMap<String, String> {
    let mut labels = selector_labels(instance);
    labels.insert(
        "app.kubernetes.io/managed-by".to_string(),
        MANAGED_BY.to_string(),
    );
    labels
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resource_labels_extend_selector() {
        let selector = selector_labels("demo");
        let labels = resource_labels("demo");

        for (key, value) in &selector {
            assert_eq!(labels.get(key), Some(value));
        }
        assert_eq!(
            labels.get("app.kubernetes.io/managed-by").map(String::as_str),
            Some("pretzelai-operator")
        );
        assert_eq!(labels.len(), selector.len() + 1);
    }
}
