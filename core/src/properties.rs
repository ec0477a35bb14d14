//! Typed property bags.
//!
//! A [`PropertyBag`] is a small string-keyed container used to pass optional
//! configuration through generic entry points such as
//! `GpuDevice::create_with_properties`. Values are typed; reading a key with the
//! wrong type yields the caller's default instead of a coerced value.
//!
//! # Example
//!
//! ```
//! use lumen_core::properties::{PropertyBag, PropertyType};
//!
//! let mut props = PropertyBag::new();
//! props.set_bool("gpu.device.create.debugmode", false);
//! props.set_string("gpu.device.create.name", "dummy");
//!
//! assert!(!props.get_bool("gpu.device.create.debugmode", true));
//! assert_eq!(props.property_type("gpu.device.create.name"), PropertyType::String);
//! assert_eq!(props.get_number("missing", 7), 7);
//! ```

use std::collections::BTreeMap;

/// The type of a stored property.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PropertyType {
    /// No property is stored under the key.
    Invalid,
    /// A boolean.
    Boolean,
    /// A signed 64-bit integer.
    Number,
    /// A 32-bit float.
    Float,
    /// A UTF-8 string.
    String,
}

/// A single property value.
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyValue {
    /// Boolean value.
    Boolean(bool),
    /// Integer value.
    Number(i64),
    /// Float value.
    Float(f32),
    /// String value.
    String(String),
}

impl PropertyValue {
    /// The type tag of this value.
    pub fn property_type(&self) -> PropertyType {
        match self {
            Self::Boolean(_) => PropertyType::Boolean,
            Self::Number(_) => PropertyType::Number,
            Self::Float(_) => PropertyType::Float,
            Self::String(_) => PropertyType::String,
        }
    }
}

/// An owned, string-keyed set of typed properties.
///
/// Keys are kept sorted so enumeration order is stable.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PropertyBag {
    values: BTreeMap<String, PropertyValue>,
}

impl PropertyBag {
    /// Create an empty property bag.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a boolean property, replacing any previous value.
    pub fn set_bool(&mut self, name: impl Into<String>, value: bool) -> &mut Self {
        self.set(name, PropertyValue::Boolean(value))
    }

    /// Store an integer property, replacing any previous value.
    pub fn set_number(&mut self, name: impl Into<String>, value: i64) -> &mut Self {
        self.set(name, PropertyValue::Number(value))
    }

    /// Store a float property, replacing any previous value.
    pub fn set_float(&mut self, name: impl Into<String>, value: f32) -> &mut Self {
        self.set(name, PropertyValue::Float(value))
    }

    /// Store a string property, replacing any previous value.
    pub fn set_string(&mut self, name: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.set(name, PropertyValue::String(value.into()))
    }

    /// Store a property value, replacing any previous value.
    pub fn set(&mut self, name: impl Into<String>, value: PropertyValue) -> &mut Self {
        let name = name.into();
        log::trace!("PropertyBag: set {name} = {value:?}");
        self.values.insert(name, value);
        self
    }

    /// Check whether a property is stored under `name`.
    pub fn has(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    /// Get the type of the property stored under `name`.
    pub fn property_type(&self, name: &str) -> PropertyType {
        self.values
            .get(name)
            .map_or(PropertyType::Invalid, PropertyValue::property_type)
    }

    /// Get the raw value stored under `name`.
    pub fn get(&self, name: &str) -> Option<&PropertyValue> {
        self.values.get(name)
    }

    /// Get a boolean property, or `default` if missing or of another type.
    pub fn get_bool(&self, name: &str, default: bool) -> bool {
        match self.values.get(name) {
            Some(PropertyValue::Boolean(v)) => *v,
            _ => default,
        }
    }

    /// Get an integer property, or `default` if missing or of another type.
    pub fn get_number(&self, name: &str, default: i64) -> i64 {
        match self.values.get(name) {
            Some(PropertyValue::Number(v)) => *v,
            _ => default,
        }
    }

    /// Get a float property, or `default` if missing or of another type.
    pub fn get_float(&self, name: &str, default: f32) -> f32 {
        match self.values.get(name) {
            Some(PropertyValue::Float(v)) => *v,
            _ => default,
        }
    }

    /// Get a string property, or `None` if missing or of another type.
    pub fn get_string(&self, name: &str) -> Option<&str> {
        match self.values.get(name) {
            Some(PropertyValue::String(v)) => Some(v.as_str()),
            _ => None,
        }
    }

    /// Remove a property. Returns `true` if something was removed.
    pub fn clear(&mut self, name: &str) -> bool {
        self.values.remove(name).is_some()
    }

    /// Copy every property from `other` into this bag, overwriting on conflict.
    pub fn copy_from(&mut self, other: &PropertyBag) {
        for (name, value) in &other.values {
            self.values.insert(name.clone(), value.clone());
        }
    }

    /// Enumerate all properties in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &PropertyValue)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Number of stored properties.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether the bag is empty.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_typed_getters() {
        let mut props = PropertyBag::new();
        props
            .set_bool("flag", true)
            .set_number("count", 3)
            .set_float("scale", 0.5)
            .set_string("name", "device");

        assert!(props.get_bool("flag", false));
        assert_eq!(props.get_number("count", 0), 3);
        assert_eq!(props.get_float("scale", 1.0), 0.5);
        assert_eq!(props.get_string("name"), Some("device"));
        assert_eq!(props.len(), 4);
    }

    #[test]
    fn test_wrong_type_uses_default() {
        let mut props = PropertyBag::new();
        props.set_number("flag", 1);
        assert!(!props.get_bool("flag", false));
        assert_eq!(props.get_string("flag"), None);
        assert_eq!(props.property_type("flag"), PropertyType::Number);
        assert_eq!(props.property_type("nothing"), PropertyType::Invalid);
    }

    #[test]
    fn test_clear_and_copy() {
        let mut a = PropertyBag::new();
        a.set_bool("x", true).set_number("y", 2);

        let mut b = PropertyBag::new();
        b.set_number("y", 5).set_string("z", "keep");
        b.copy_from(&a);

        assert_eq!(b.get_number("y", 0), 2);
        assert!(b.has("z"));
        assert!(b.clear("x"));
        assert!(!b.clear("x"));
        assert!(!b.has("x"));
    }

    #[test]
    fn test_iteration_is_sorted() {
        let mut props = PropertyBag::new();
        props.set_number("b", 2).set_number("a", 1).set_number("c", 3);
        let keys: Vec<_> = props.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["a", "b", "c"]);
    }
}
