use crate::{ClusterOperator, ImageRegistry};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;

/// Provides some conveniences for querying and editing the metadata of a `kube-rs` object.
pub trait CrdExt {
    /// Returns this objects `ObjectMeta` information (i.e. the `metadata` field). You implement
    /// this be returning `&self.metadata`. This allows the rest of this trait's functions to be
    /// implemented for you.
    fn object_meta(&self) -> &ObjectMeta;

    fn object_meta_mut(&mut self) -> &mut ObjectMeta;

    /// Returns the object.metadata.name field, unwrapping a potential `None` with `""`. In
    /// practice, an object's name cannot be missing since this is how we `GET` an object in the
    /// first place, so we do away with the `Option` for convenience. This is named `object_name`
    /// to avoid confusion with `ResourceExt`.
    fn object_name(&self) -> &str {
        self.object_meta().name.as_deref().unwrap_or("")
    }

    /// The optimistic concurrency token the object was read with.
    fn version_token(&self) -> Option<&str> {
        self.object_meta().resource_version.as_deref()
    }

    /// The generation of the object's spec, zero for objects the API server has not seen yet.
    fn generation(&self) -> i64 {
        self.object_meta().generation.unwrap_or_default()
    }

    /// Does the object have one or more finalizers.
    fn has_finalizers(&self) -> bool {
        self.object_meta()
            .finalizers
            .as_ref()
            .map(|finalizers| !finalizers.is_empty())
            .unwrap_or(false)
    }

    /// Does the object have the given `finalizer`.
    fn has_finalizer(&self, finalizer: &str) -> bool {
        let mut finalizers = match &self.object_meta().finalizers {
            None => return false,
            Some(value) => value.iter(),
        };
        finalizers.any(|item| item == finalizer)
    }

    /// Append `finalizer` unless it is already present. Returns `true` if the object changed.
    fn add_finalizer(&mut self, finalizer: &str) -> bool {
        if self.has_finalizer(finalizer) {
            return false;
        }
        self.object_meta_mut()
            .finalizers
            .get_or_insert_with(Vec::new)
            .push(finalizer.to_owned());
        true
    }

    /// Remove every occurrence of `finalizer`. Returns `true` if the object changed.
    fn remove_finalizer(&mut self, finalizer: &str) -> bool {
        let finalizers = match self.object_meta_mut().finalizers.as_mut() {
            None => return false,
            Some(finalizers) => finalizers,
        };
        let before = finalizers.len();
        finalizers.retain(|item| item != finalizer);
        before != finalizers.len()
    }

    /// Has someone requested that the object be deleted.
    fn is_delete_requested(&self) -> bool {
        self.object_meta().deletion_timestamp.is_some()
    }
}

impl CrdExt for ImageRegistry {
    fn object_meta(&self) -> &ObjectMeta {
        &self.metadata
    }

    fn object_meta_mut(&mut self) -> &mut ObjectMeta {
        &mut self.metadata
    }
}

impl CrdExt for ClusterOperator {
    fn object_meta(&self) -> &ObjectMeta {
        &self.metadata
    }

    fn object_meta_mut(&mut self) -> &mut ObjectMeta {
        &mut self.metadata
    }
}
