//! # CRD Generator
//!
//! Prints the `Lockbox` CustomResourceDefinition YAML.
//!
//! ```bash
//! cargo run --bin crdgen | kubectl apply -f -
//! ```

use kube::core::CustomResourceExt;
use lockbox_controller::Lockbox;

fn main() {
    match serde_yaml::to_string(&Lockbox::crd()) {
        Ok(yaml) => print!("{yaml}"),
        Err(e) => {
            eprintln!("Failed to serialize CRD to YAML: {e}");
            std::process::exit(1);
        }
    }
}
