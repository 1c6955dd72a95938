/*!

The custom resource definitions are modeled as Rust structs in the model crate. Here we generate
the corresponding k8s yaml file. Crates that depend on this file can add yamlgen as a build
dependency to ensure the file is current. Scripts can call `cargo build --package yamlgen`.

!*/

use kube::CustomResourceExt;
use model::{ClusterOperator, ImageRegistry};
use std::fs::{create_dir_all, File};
use std::io::Write;
use std::path::PathBuf;

const YAMLGEN_DIR: &str = env!("CARGO_MANIFEST_DIR");
const HEADER: &str = "# This file is generated. Do not edit.\n";

fn main() {
    // Re-run this build script if the model changes.
    println!("cargo:rerun-if-changed=../model/src");

    let dir = PathBuf::from(YAMLGEN_DIR).join("deploy");
    create_dir_all(&dir)
        .unwrap_or_else(|e| panic!("unable to create directory '{}': {}", dir.display(), e));
    let path = dir.join("registry-operator.yaml");

    let mut f = File::create(&path).unwrap_or_else(|e| {
        panic!("unable to open file '{}' for writing: {}", path.display(), e)
    });

    f.write_all(HEADER.as_bytes())
        .expect("unable to write file header");
    serde_yaml::to_writer(&f, &ImageRegistry::crd()).expect("unable to write ImageRegistry CRD");
    f.write_all(b"---\n").expect("unable to write document separator");
    serde_yaml::to_writer(&f, &ClusterOperator::crd())
        .expect("unable to write ClusterOperator CRD");
}
