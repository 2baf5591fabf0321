use std::sync::Arc;

use indexmap::IndexMap;
use sha2::{Digest, Sha256};

use crate::error::ModelError;
use crate::model::entity::Entity;

/// A collection that indexes entities by their own identity key, preserving
/// insertion order.
#[derive(Debug)]
pub struct EntityMap<T: Entity> {
    entries: IndexMap<String, Arc<T>>,
}

impl<T: Entity> Default for EntityMap<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Entity> EntityMap<T> {
    pub fn new() -> Self {
        Self {
            entries: IndexMap::new(),
        }
    }

    /// Store an entity under its identity key, replacing any prior entry
    /// for that key. A blank key is rejected and leaves the map untouched.
    pub fn insert(&mut self, entity: Arc<T>) -> Result<Option<Arc<T>>, ModelError> {
        if entity.id().trim().is_empty() {
            return Err(ModelError::BlankKey);
        }
        Ok(self.entries.insert(entity.id().to_string(), entity))
    }

    pub fn get(&self, id: &str) -> Option<&Arc<T>> {
        self.entries.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.entries.contains_key(id)
    }

    /// Remove an entry, preserving the order of the remaining entries.
    pub fn remove(&mut self, id: &str) -> Option<Arc<T>> {
        self.entries.shift_remove(id)
    }

    /// First entry in insertion order.
    pub fn first(&self) -> Option<&Arc<T>> {
        self.entries.values().next()
    }

    pub fn values(&self) -> impl Iterator<Item = &Arc<T>> {
        self.entries.values()
    }

    pub fn to_vec(&self) -> Vec<Arc<T>> {
        self.entries.values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

/// Fingerprint of an entity's ordered attribute-name sequence.
fn schema_fingerprint(names: &[String]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    for name in names {
        hasher.update(name.as_bytes());
        hasher.update([0u8]);
    }
    hasher.finalize().into()
}

/// An [`EntityMap`] that additionally enforces one attribute shape for its
/// whole lifetime.
///
/// The first insert fixes the collection's schema fingerprint; every later
/// insert must match it. Clearing the entries does not reset the
/// fingerprint: a strict collection stays bound to one entity shape, and
/// re-use across shapes requires a new instance.
#[derive(Debug)]
pub struct StrictEntityMap<T: Entity> {
    inner: EntityMap<T>,
    fingerprint: Option<[u8; 32]>,
}

impl<T: Entity> Default for StrictEntityMap<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Entity> StrictEntityMap<T> {
    pub fn new() -> Self {
        Self {
            inner: EntityMap::new(),
            fingerprint: None,
        }
    }

    pub fn insert(&mut self, entity: Arc<T>) -> Result<Option<Arc<T>>, ModelError> {
        let fingerprint = schema_fingerprint(&entity.attr_names());
        if let Some(expected) = self.fingerprint {
            if expected != fingerprint {
                return Err(ModelError::SchemaMismatch {
                    expected: hex::encode(expected),
                    actual: hex::encode(fingerprint),
                });
            }
        }
        let prior = self.inner.insert(entity)?;
        // Fix the shape only once an entity has actually been stored; a
        // rejected insert must not bind the collection.
        self.fingerprint.get_or_insert(fingerprint);
        Ok(prior)
    }

    pub fn get(&self, id: &str) -> Option<&Arc<T>> {
        self.inner.get(id)
    }

    pub fn values(&self) -> impl Iterator<Item = &Arc<T>> {
        self.inner.values()
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Remove every entry. The schema fingerprint is kept.
    pub fn clear(&mut self) {
        self.inner.clear();
    }
}
