use std::sync::RwLock;

use crate::error::ModelError;
use crate::model::attribute::{AttrType, AttrValue, AttributeBag, NAME_ATTR};

/// Identity key of an entity that has not been assigned a real id.
pub const NULL_ID: &str = "OBJECT_WITHOUT_ID";

/// Shared identity-plus-attributes state embedded by every entity kind.
///
/// The identity key is immutable; the attribute bag (display name included)
/// is mutated in place behind a lock, so every holder of the entity's `Arc`
/// observes updates from later backend sightings.
#[derive(Debug)]
pub struct EntityCore {
    id: String,
    attrs: RwLock<AttributeBag>,
}

impl EntityCore {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            attrs: RwLock::new(AttributeBag::new(name)),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> String {
        self.attrs
            .read()
            .expect("attribute bag poisoned")
            .get(NAME_ATTR)
            .and_then(AttrValue::as_str)
            .unwrap_or_default()
            .to_string()
    }

    pub fn set_name(&self, name: &str) {
        self.attrs
            .write()
            .expect("attribute bag poisoned")
            .set(NAME_ATTR, AttrValue::from(name));
    }

    pub fn attr_names(&self) -> Vec<String> {
        self.attrs
            .read()
            .expect("attribute bag poisoned")
            .names()
            .map(str::to_string)
            .collect()
    }

    pub fn add_attr(
        &self,
        name: impl Into<String>,
        ty: AttrType,
        value: AttrValue,
    ) -> Result<(), ModelError> {
        self.attrs
            .write()
            .expect("attribute bag poisoned")
            .add(name, ty, value)
    }

    pub fn get_attr(&self, name: &str) -> Option<AttrValue> {
        self.attrs
            .read()
            .expect("attribute bag poisoned")
            .get(name)
            .cloned()
    }

    pub fn set_attr(&self, name: &str, value: AttrValue) -> bool {
        self.attrs
            .write()
            .expect("attribute bag poisoned")
            .set(name, value)
    }
}

/// An entity with an immutable identity key, a mutable display name, and an
/// ordered bag of typed attributes. Implemented by composition over
/// [`EntityCore`].
pub trait Entity: Send + Sync + 'static {
    fn core(&self) -> &EntityCore;

    /// The identity key. Never blank; [`NULL_ID`] means "no id assigned".
    fn id(&self) -> &str {
        self.core().id()
    }

    fn has_null_id(&self) -> bool {
        self.id() == NULL_ID
    }

    fn name(&self) -> String {
        self.core().name()
    }

    fn set_name(&self, name: &str) {
        self.core().set_name(name);
    }

    /// Ordered attribute-name sequence; the entity's schema for strict
    /// collections.
    fn attr_names(&self) -> Vec<String> {
        self.core().attr_names()
    }
}
