//! The process-wide field registry.
//!
//! Maps every [`FieldId`] of every open handle to its [`Descriptor`].
//! Writes happen when a handle opens or closes; statement builders only
//! read.

use std::collections::HashMap;
use std::sync::{LazyLock, Mutex, PoisonError};

use crate::field::{FieldId, HandleId};
use crate::introspect::Descriptor;

static GLOBAL: LazyLock<FieldRegistry> = LazyLock::new(FieldRegistry::new);

/// Concurrent map from field tokens to descriptors.
#[derive(Debug, Default)]
pub struct FieldRegistry {
    fields: Mutex<HashMap<FieldId, Descriptor>>,
}

impl FieldRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The registry shared by every handle of the process.
    #[must_use]
    pub fn global() -> &'static Self {
        &GLOBAL
    }

    /// Binds a field, replacing any previous binding.
    pub fn set(&self, id: FieldId, descriptor: Descriptor) {
        self.fields
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id, descriptor);
    }

    /// Looks a field up.
    #[must_use]
    pub fn get(&self, id: FieldId) -> Option<Descriptor> {
        self.fields
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&id)
            .cloned()
    }

    /// Removes a binding.
    pub fn delete(&self, id: FieldId) {
        self.fields
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&id);
    }

    /// Removes every binding of a handle.
    pub fn delete_handle(&self, handle: HandleId) {
        self.fields
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .retain(|id, _| id.handle != handle);
    }

    /// Number of bindings of a handle.
    #[must_use]
    pub fn count_handle(&self, handle: HandleId) -> usize {
        self.fields
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .filter(|id| id.handle == handle)
            .count()
    }

    /// Number of bindings.
    #[must_use]
    pub fn len(&self) -> usize {
        self.fields
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Whether the registry holds no binding.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
