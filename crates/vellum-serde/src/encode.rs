//! Live graph to [`Document`].

use std::collections::HashMap;

use indexmap::IndexMap;
use tracing::debug;
use vellum_core::error::EngineError;

use crate::document::{
    CLASS_FIELD, CONSTRUCTOR_FIELD, Document, ROOT_LINK, SerializedEntry, SerializedValue, Tag,
    child_link,
};
use crate::object::{ArrayRef, ObjectRef};
use crate::registry::{Registry, Singleton};
use crate::value::Value;

/// Encodes the graph reachable from `root`.
///
/// Objects and arrays are written once, under the link where they were
/// first reached; later references emit that link. Registered singletons
/// always encode by name.
///
/// # Errors
///
/// Returns `EngineError::UnserializableValue` for a value with no encoding:
/// an unregistered class, a non-finite number without a registered
/// sentinel, an instance of an unregistered class, or an object with a
/// genuine `constructor` field. Returns `EngineError::InvalidOperation` if
/// an object is mutably borrowed during the pass.
pub fn encode(registry: &Registry, root: &Value) -> Result<Document, EngineError> {
    let mut encoder = Encoder {
        registry,
        document: Document::new(),
        visited: HashMap::new(),
        retained: Vec::new(),
    };
    let encoded = encoder.value(root, ROOT_LINK)?;
    if !encoded.is_root_link() {
        encoder
            .document
            .insert(ROOT_LINK, SerializedEntry::Value(encoded));
    }
    debug!(entries = encoder.document.len(), "encoded document");
    Ok(encoder.document)
}

struct Encoder<'r> {
    registry: &'r Registry,
    document: Document,
    visited: HashMap<usize, String>,
    // Keeps every visited compound alive so addresses are not reused mid-pass.
    retained: Vec<Value>,
}

impl Encoder<'_> {
    fn value(&mut self, value: &Value, link: &str) -> Result<SerializedValue, EngineError> {
        if let Some(name) = self.registry.name_of(value) {
            return Ok(SerializedValue::tag(&Tag::Singleton(name)));
        }
        match value {
            Value::Null => Ok(SerializedValue::Null),
            Value::Bool(b) => Ok(SerializedValue::Bool(*b)),
            Value::Number(n) if n.is_finite() => Ok(SerializedValue::Number(*n)),
            Value::BigInt(n) => Ok(SerializedValue::tag(&Tag::BigInt(n.clone()))),
            Value::String(text) => Ok(SerializedValue::tag(&Tag::String(text))),
            Value::Symbol(key) => Ok(SerializedValue::tag(&Tag::Symbol(key))),
            Value::Object(object) => self.object(object, link),
            Value::Array(array) => self.array(array, link),
            Value::Class(class) => Err(EngineError::UnserializableValue(format!(
                "class `{}` is not registered",
                class.name()
            ))),
            Value::Undefined | Value::Number(_) => Err(EngineError::UnserializableValue(
                format!("{value:?} has no registered sentinel"),
            )),
        }
    }

    fn seen(&mut self, addr: usize, value: Value, link: &str) -> Option<SerializedValue> {
        if let Some(existing) = self.visited.get(&addr) {
            return Some(SerializedValue::Tag(existing.clone()));
        }
        self.visited.insert(addr, link.to_owned());
        self.retained.push(value);
        None
    }

    fn object(&mut self, object: &ObjectRef, link: &str) -> Result<SerializedValue, EngineError> {
        let class = object.class();
        let Some(class_name) = self.registry.lookup_by_value(&Singleton::Class(class)) else {
            return Err(EngineError::UnserializableValue(format!(
                "instance of unregistered class `{}`",
                class.name()
            )));
        };
        let class_link = SerializedValue::tag(&Tag::Singleton(class_name));
        if let Some(existing) = self.seen(object.addr(), Value::Object(object.clone()), link) {
            return Ok(existing);
        }

        let fields = object.try_borrow()?.fields();
        self.document
            .insert(link, SerializedEntry::Record(IndexMap::new()));

        let mut record = IndexMap::with_capacity(fields.len() + 1);
        record.insert(CLASS_FIELD.to_owned(), class_link);
        for (field, value) in fields {
            if field == CONSTRUCTOR_FIELD {
                return Err(EngineError::UnserializableValue(format!(
                    "`{}` has a `{CONSTRUCTOR_FIELD}` field, which collides with its class link",
                    class.name()
                )));
            }
            let encoded = self.value(&value, &child_link(link, &field))?;
            let key = if field.is_empty() {
                CONSTRUCTOR_FIELD.to_owned()
            } else {
                field
            };
            record.insert(key, encoded);
        }
        self.document.insert(link, SerializedEntry::Record(record));
        Ok(SerializedValue::Tag(link.to_owned()))
    }

    fn array(&mut self, array: &ArrayRef, link: &str) -> Result<SerializedValue, EngineError> {
        if let Some(existing) = self.seen(array.addr(), Value::Array(array.clone()), link) {
            return Ok(existing);
        }

        let items = array.to_vec();
        self.document
            .insert(link, SerializedEntry::Sequence(Vec::new()));

        let mut sequence = Vec::with_capacity(items.len());
        for (index, item) in items.iter().enumerate() {
            sequence.push(self.value(item, &format!("{link}.{index}"))?);
        }
        self.document.insert(link, SerializedEntry::Sequence(sequence));
        Ok(SerializedValue::Tag(link.to_owned()))
    }
}

#[cfg(test)]
mod tests {
    use num_bigint::BigInt;

    use super::*;
    use crate::class::{Class, ClassRef, construct};
    use crate::object::Serializable;
    use crate::record::Record;

    static STRAY: Class = Class::new("Stray", construct::<Stray>);

    #[derive(Debug, Default)]
    struct Stray;

    impl Serializable for Stray {
        fn class(&self) -> ClassRef {
            &STRAY
        }

        fn fields(&self) -> Vec<(String, Value)> {
            Vec::new()
        }

        fn set_field(&mut self, _key: &str, _value: Value) -> Result<(), EngineError> {
            Ok(())
        }
    }

    fn record_at<'d>(document: &'d Document, link: &str) -> &'d IndexMap<String, SerializedValue> {
        match document.get(link) {
            Some(SerializedEntry::Record(record)) => record,
            other => panic!("expected a record at `{link}`, got {other:?}"),
        }
    }

    fn tag(raw: &str) -> SerializedValue {
        SerializedValue::Tag(raw.to_owned())
    }

    #[test]
    fn test_scalars_encode_under_the_root() {
        let registry = Registry::new();
        let cases = [
            (Value::from("hi"), tag("_hi")),
            (Value::BigInt(BigInt::from(-7)), tag("b-7")),
            (Value::Symbol("iterator".into()), tag("rsiterator")),
            (Value::Undefined, tag("sundefined")),
            (Value::Number(f64::INFINITY), tag("sInfinity")),
            (Value::Number(2.5), SerializedValue::Number(2.5)),
            (Value::Null, SerializedValue::Null),
        ];

        for (value, expected) in cases {
            let document = encode(&registry, &value).unwrap();

            assert_eq!(document.len(), 1);
            assert_eq!(document.root(), Some(&SerializedEntry::Value(expected)));
        }
    }

    #[test]
    fn test_object_fields_extend_the_link() {
        // Arrange
        let registry = Registry::new();
        let inner = Value::object(Record::new().with("n", 1));
        let root = Value::object(
            Record::new()
                .with("a.b", inner)
                .with("list", Value::array(vec![Value::from(true)])),
        );

        // Act
        let document = encode(&registry, &root).unwrap();

        // Assert
        let keys: Vec<&str> = document.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, ["", ".a\\.b", ".list"]);
        let top = record_at(&document, "");
        assert_eq!(top.get(""), Some(&tag("sObject")));
        assert_eq!(top.get("a.b"), Some(&tag(".a\\.b")));
        assert_eq!(
            document.get(".list"),
            Some(&SerializedEntry::Sequence(vec![SerializedValue::Bool(true)]))
        );
    }

    #[test]
    fn test_shared_objects_are_written_once() {
        let registry = Registry::new();
        let shared = Value::object(Record::new());
        let root = Value::object(
            Record::new()
                .with("first", shared.clone())
                .with("second", shared),
        );

        let document = encode(&registry, &root).unwrap();

        assert_eq!(document.len(), 2);
        assert_eq!(record_at(&document, "").get("second"), Some(&tag(".first")));
    }

    #[test]
    fn test_empty_field_swaps_with_constructor() {
        let registry = Registry::new();
        let root = Value::object(Record::new().with("", 3));

        let document = encode(&registry, &root).unwrap();

        let top = record_at(&document, "");
        assert_eq!(top.get(""), Some(&tag("sObject")));
        assert_eq!(top.get("constructor"), Some(&SerializedValue::Number(3.0)));
    }

    #[test]
    fn test_constructor_field_is_unserializable() {
        let registry = Registry::new();
        let root = Value::object(Record::new().with("constructor", 1));

        let result = encode(&registry, &root);

        assert!(matches!(result, Err(EngineError::UnserializableValue(_))));
    }

    #[test]
    fn test_unregistered_values_are_unserializable() {
        let registry = Registry::new();

        let class_result = encode(&registry, &Value::Class(&STRAY));
        let instance_result = encode(&registry, &Value::object(Stray));
        let nested_result = encode(&Registry::new(), &Value::array(vec![Value::Class(&STRAY)]));

        assert!(matches!(class_result, Err(EngineError::UnserializableValue(_))));
        assert!(matches!(instance_result, Err(EngineError::UnserializableValue(_))));
        assert!(matches!(nested_result, Err(EngineError::UnserializableValue(_))));
    }
}
