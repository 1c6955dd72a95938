/*!

This crate writes out the YAML representation of the registry operator CRDs. The operator itself
does not need these files, but they are needed to install the CRDs into a cluster before the
operator starts, and they come in handy for reference, testing and development.

This `lib.rs` file is intentionally empty as `yamlgen` provides a `build.rs` that is invoked during
builds of other crates that specify `yamlgen` as a `build-dependency`.

!*/
