//! Custom Resource Definitions for the PretzelAI Operator

mod pretzel_ai;

pub use pretzel_ai::*;

use kube::CustomResourceExt;

/// Generate CRD YAML manifests for all custom resources
pub fn generate_crds() -> Result<Vec<String>, serde_yaml::Error> {
    Ok(vec![serde_yaml::to_string(&PretzelAI::crd())?])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_crd_describes_pretzelai() {
        let crds = generate_crds().unwrap();
        assert_eq!(crds.len(), 1);

        let yaml = &crds[0];
        assert!(yaml.contains("pretzelais.pretzelai.pretzelai.local"));
        assert!(yaml.contains("kind: PretzelAI"));
        assert!(yaml.contains("configMapName"));
        assert!(yaml.contains("serviceType"));
        assert!(yaml.contains("subresources"));
    }
}
