use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::ModelError;

/// Reference to an object held by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ObjectId(pub String);

impl std::fmt::Display for ObjectId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Declared type of an attribute slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttrType {
    String,
    Integer,
    Double,
    Boolean,
    Date,
    ObjectId,
    LockOwner,
}

/// An attribute value. The variant is the value's runtime type; it must
/// agree with the slot's declared [`AttrType`] on every write.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttrValue {
    String(String),
    Integer(i64),
    Double(f64),
    Boolean(bool),
    Date(DateTime<Utc>),
    ObjectId(ObjectId),
    LockOwner(String),
}

impl AttrValue {
    /// The declared type this value satisfies.
    pub fn attr_type(&self) -> AttrType {
        match self {
            AttrValue::String(_) => AttrType::String,
            AttrValue::Integer(_) => AttrType::Integer,
            AttrValue::Double(_) => AttrType::Double,
            AttrValue::Boolean(_) => AttrType::Boolean,
            AttrValue::Date(_) => AttrType::Date,
            AttrValue::ObjectId(_) => AttrType::ObjectId,
            AttrValue::LockOwner(_) => AttrType::LockOwner,
        }
    }

    /// The string payload, if this is a `String` value.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            AttrValue::String(s) => Some(s),
            _ => None,
        }
    }
}

impl From<&str> for AttrValue {
    fn from(value: &str) -> Self {
        AttrValue::String(value.to_string())
    }
}

impl From<String> for AttrValue {
    fn from(value: String) -> Self {
        AttrValue::String(value)
    }
}

/// One named, typed slot of an [`AttributeBag`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attribute {
    pub name: String,
    pub ty: AttrType,
    pub value: AttrValue,
}

/// An ordered, name-keyed store of typed attributes.
///
/// Slot order is insertion order and takes part in schema comparison (see
/// [`StrictEntityMap`](crate::model::StrictEntityMap)). The first slot is
/// always `name`.
#[derive(Debug, Clone)]
pub struct AttributeBag {
    slots: IndexMap<String, Attribute>,
}

pub(crate) const NAME_ATTR: &str = "name";

impl AttributeBag {
    /// Create a bag with the mandatory `name` slot as its first attribute.
    pub fn new(name: impl Into<String>) -> Self {
        let mut slots = IndexMap::new();
        let value = AttrValue::String(name.into());
        slots.insert(
            NAME_ATTR.to_string(),
            Attribute {
                name: NAME_ATTR.to_string(),
                ty: AttrType::String,
                value,
            },
        );
        Self { slots }
    }

    /// Register a new slot.
    ///
    /// Fails when the value's runtime type is incompatible with `ty`, or
    /// when a slot with this name already exists.
    pub fn add(
        &mut self,
        name: impl Into<String>,
        ty: AttrType,
        value: AttrValue,
    ) -> Result<(), ModelError> {
        let name = name.into();
        if value.attr_type() != ty {
            return Err(ModelError::TypeMismatch {
                attribute: name,
                expected: ty,
                actual: value.attr_type(),
            });
        }
        if self.slots.contains_key(&name) {
            return Err(ModelError::DuplicateAttribute { attribute: name });
        }
        self.slots.insert(
            name.clone(),
            Attribute {
                name,
                ty,
                value,
            },
        );
        Ok(())
    }

    /// Read a slot's value. Unknown names yield `None` rather than an error
    /// so readers cannot disturb the schema.
    pub fn get(&self, name: &str) -> Option<&AttrValue> {
        self.slots.get(name).map(|attr| &attr.value)
    }

    /// Write a slot's value.
    ///
    /// Returns `false` (and leaves the bag untouched) when the name is
    /// unknown or the value's runtime type disagrees with the slot's
    /// declared type.
    pub fn set(&mut self, name: &str, value: AttrValue) -> bool {
        match self.slots.get_mut(name) {
            Some(attr) if value.attr_type() == attr.ty => {
                attr.value = value;
                true
            }
            _ => false,
        }
    }

    /// Declared type of a slot.
    pub fn attr_type(&self, name: &str) -> Option<AttrType> {
        self.slots.get(name).map(|attr| attr.ty)
    }

    /// Slot names in insertion order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.slots.keys().map(String::as_str)
    }

    /// Slots in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &Attribute> {
        self.slots.values()
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_slot_is_always_name() {
        let bag = AttributeBag::new("thing");
        assert_eq!(bag.names().next(), Some("name"));
        assert_eq!(bag.get("name").and_then(AttrValue::as_str), Some("thing"));
    }

    #[test]
    fn add_rejects_type_mismatch() {
        let mut bag = AttributeBag::new("thing");
        let err = bag
            .add("count", AttrType::Integer, AttrValue::String("3".into()))
            .unwrap_err();
        assert!(matches!(err, ModelError::TypeMismatch { .. }));
        assert_eq!(bag.len(), 1);
    }

    #[test]
    fn add_rejects_duplicate_slot() {
        let mut bag = AttributeBag::new("thing");
        bag.add("count", AttrType::Integer, AttrValue::Integer(3))
            .unwrap();
        let err = bag
            .add("count", AttrType::Integer, AttrValue::Integer(4))
            .unwrap_err();
        assert!(matches!(err, ModelError::DuplicateAttribute { .. }));
    }

    #[test]
    fn set_is_silent_on_unknown_name_and_rejects_mismatch() {
        let mut bag = AttributeBag::new("thing");
        bag.add("count", AttrType::Integer, AttrValue::Integer(3))
            .unwrap();

        assert!(!bag.set("missing", AttrValue::Integer(1)));
        assert!(!bag.set("count", AttrValue::Boolean(true)));
        assert_eq!(bag.get("count"), Some(&AttrValue::Integer(3)));

        assert!(bag.set("count", AttrValue::Integer(9)));
        assert_eq!(bag.get("count"), Some(&AttrValue::Integer(9)));
    }

    #[test]
    fn slot_order_is_insertion_order() {
        let mut bag = AttributeBag::new("thing");
        bag.add("zeta", AttrType::String, "z".into()).unwrap();
        bag.add("alpha", AttrType::String, "a".into()).unwrap();
        let names: Vec<_> = bag.names().collect();
        assert_eq!(names, vec!["name", "zeta", "alpha"]);
    }

    #[test]
    fn custom_value_types_carry_their_tag() {
        let id = AttrValue::ObjectId(ObjectId("0900000180001234".into()));
        assert_eq!(id.attr_type(), AttrType::ObjectId);
        let lock = AttrValue::LockOwner("dmadmin".into());
        assert_eq!(lock.attr_type(), AttrType::LockOwner);
        let date = AttrValue::Date(chrono::Utc::now());
        assert_eq!(date.attr_type(), AttrType::Date);
    }
}
