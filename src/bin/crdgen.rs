//! CRD YAML Generator
//!
//! This binary generates the Kubernetes CRD manifest for the App resource.
//!
//! Usage: cargo run --bin crdgen > deploy/crds/app.yaml

use app_controller::crd::generate_crds;

fn main() -> anyhow::Result<()> {
    for crd in generate_crds()? {
        println!("---");
        print!("{}", crd);
    }
    Ok(())
}
