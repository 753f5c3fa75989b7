//! Plain records: `{}`-style bags of named fields.

use indexmap::IndexMap;
use vellum_core::error::EngineError;

use crate::class::{Class, ClassRef, construct};
use crate::object::Serializable;
use crate::value::Value;

/// Marker class for plain records, registered as `Object`.
pub static OBJECT: Class = Class::new("Object", construct::<Record>);

/// An unstructured record of named fields, kept in insertion order.
#[derive(Debug, Default)]
pub struct Record {
    fields: IndexMap<String, Value>,
}

impl Record {
    /// Creates an empty record.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    #[must_use]
    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    /// Inserts or replaces a field, returning the previous value.
    pub fn insert(&mut self, key: &str, value: impl Into<Value>) -> Option<Value> {
        self.fields.insert(key.to_owned(), value.into())
    }

    /// Removes a field, returning its value.
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.fields.shift_remove(key)
    }

    /// Reads a field.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// Number of fields.
    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Whether the record has no fields.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Iterates fields in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }
}

impl Serializable for Record {
    fn class(&self) -> ClassRef {
        &OBJECT
    }

    fn fields(&self) -> Vec<(String, Value)> {
        self.fields
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    fn set_field(&mut self, key: &str, value: Value) -> Result<(), EngineError> {
        self.fields.insert(key.to_owned(), value);
        Ok(())
    }
}
