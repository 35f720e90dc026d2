//! CRD YAML Generator
//!
//! Prints the Kubernetes CRD manifest for the PretzelAI custom resource.
//!
//! Usage: cargo run --bin crdgen > deploy/crds/pretzelai.yaml

use pretzelai_operator::crd::generate_crds;

fn main() -> anyhow::Result<()> {
    for crd in generate_crds()? {
        println!("---");
        print!("{}", crd);
    }
    Ok(())
}
