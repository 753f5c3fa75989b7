//! [`Document`] back to a live graph.

use std::collections::HashMap;

use tracing::{debug, trace};
use vellum_core::error::EngineError;

use crate::class::ClassRef;
use crate::document::{
    CLASS_FIELD, CONSTRUCTOR_FIELD, Document, ROOT_LINK, SerializedEntry, SerializedValue, Tag,
};
use crate::encode::encode;
use crate::object::ArrayRef;
use crate::registry::{Registry, Singleton};
use crate::value::Value;

/// Rebuilds the graph stored in `document`.
///
/// Every link decodes to one live value no matter how often it is
/// referenced, so cycles and aliases survive. Fields a class does not know
/// are still handed to its `set_field`.
///
/// # Errors
///
/// Returns `EngineError::MalformedDocument` for unrecognised tags, dangling
/// links, records without a class link, or a missing root;
/// `EngineError::UnknownSingleton` for names the registry does not know;
/// and whatever a class's `set_field` rejects.
pub fn decode(registry: &Registry, document: &Document) -> Result<Value, EngineError> {
    let mut decoder = Decoder {
        registry,
        document,
        resolved: HashMap::new(),
    };
    let root = match document.root() {
        Some(SerializedEntry::Value(value)) => decoder.value(value)?,
        Some(_) => decoder.link(ROOT_LINK)?,
        None => {
            return Err(EngineError::MalformedDocument(
                "document has no root entry".to_owned(),
            ));
        }
    };
    debug!(objects = decoder.resolved.len(), "decoded document");
    Ok(root)
}

/// Copies the graph reachable from `value` through an encode/decode pass.
///
/// # Errors
///
/// Returns any error [`encode`] or [`decode`] returns.
pub fn deep_clone(registry: &Registry, value: &Value) -> Result<Value, EngineError> {
    decode(registry, &encode(registry, value)?)
}

struct Decoder<'a> {
    registry: &'a Registry,
    document: &'a Document,
    resolved: HashMap<String, Value>,
}

impl Decoder<'_> {
    fn value(&mut self, value: &SerializedValue) -> Result<Value, EngineError> {
        let raw = match value {
            SerializedValue::Null => return Ok(Value::Null),
            SerializedValue::Bool(b) => return Ok(Value::Bool(*b)),
            SerializedValue::Number(n) => return Ok(Value::Number(*n)),
            SerializedValue::Tag(raw) => raw,
        };
        match Tag::parse(raw)? {
            Tag::RootLink => self.link(ROOT_LINK),
            Tag::Link(link) => self.link(link),
            Tag::String(text) => Ok(Value::String(text.to_owned())),
            Tag::Symbol(key) => Ok(Value::Symbol(key.to_owned())),
            Tag::BigInt(n) => Ok(Value::BigInt(n)),
            Tag::Singleton(name) => self
                .registry
                .lookup_by_name(name)
                .map(Singleton::to_value)
                .ok_or_else(|| EngineError::UnknownSingleton(name.to_owned())),
        }
    }

    fn link(&mut self, link: &str) -> Result<Value, EngineError> {
        if let Some(value) = self.resolved.get(link) {
            return Ok(value.clone());
        }
        let document = self.document;
        match document.get(link) {
            Some(SerializedEntry::Record(record)) => {
                let class = self.class_of(link, record.get(CLASS_FIELD))?;
                let object = class.instantiate();
                trace!(link, class = class.name(), "constructed object");
                self.resolved
                    .insert(link.to_owned(), Value::Object(object.clone()));
                for (key, serialized) in record {
                    if key == CLASS_FIELD {
                        continue;
                    }
                    let field = if key == CONSTRUCTOR_FIELD {
                        CLASS_FIELD
                    } else {
                        key.as_str()
                    };
                    let value = self.value(serialized)?;
                    object.try_borrow_mut()?.set_field(field, value)?;
                }
                Ok(Value::Object(object))
            }
            Some(SerializedEntry::Sequence(items)) => {
                let array = ArrayRef::new(Vec::with_capacity(items.len()));
                self.resolved
                    .insert(link.to_owned(), Value::Array(array.clone()));
                for item in items {
                    let value = self.value(item)?;
                    array.borrow_mut().push(value);
                }
                Ok(Value::Array(array))
            }
            Some(SerializedEntry::Value(_)) => Err(EngineError::MalformedDocument(format!(
                "link `{link}` names a bare value, not an object or array"
            ))),
            None => Err(EngineError::MalformedDocument(format!(
                "link `{link}` has no entry"
            ))),
        }
    }

    fn class_of(
        &self,
        link: &str,
        class_link: Option<&SerializedValue>,
    ) -> Result<ClassRef, EngineError> {
        let missing = || EngineError::MalformedDocument(format!("record `{link}` has no class link"));
        let Some(SerializedValue::Tag(raw)) = class_link else {
            return Err(missing());
        };
        let Tag::Singleton(name) = Tag::parse(raw)? else {
            return Err(missing());
        };
        match self.registry.lookup_by_name(name) {
            Some(Singleton::Class(class)) => Ok(class),
            Some(_) => Err(EngineError::MalformedDocument(format!(
                "record `{link}` names `{name}`, which is not a class"
            ))),
            None => Err(EngineError::UnknownSingleton(name.to_owned())),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use indexmap::IndexMap;

    use super::*;
    use crate::object::ObjectRef;
    use crate::record::Record;

    fn field(object: &ObjectRef, name: &str) -> Value {
        object
            .borrow()
            .fields()
            .into_iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value)
            .unwrap_or_else(|| panic!("missing field `{name}`"))
    }

    fn document_from(json: serde_json::Value) -> Document {
        serde_json::from_value(json).unwrap()
    }

    #[test]
    fn test_round_trip_preserves_self_reference() {
        // Arrange
        let registry = Registry::new();
        let root = ObjectRef::new(Record::new().with("name", "loop"));
        root.borrow_mut()
            .set_field("self", Value::Object(root.clone()))
            .unwrap();

        // Act
        let decoded = deep_clone(&registry, &Value::Object(root.clone())).unwrap();

        // Assert
        let decoded = decoded.as_object().unwrap().clone();
        assert!(!decoded.ptr_eq(&root));
        assert_eq!(field(&decoded, "name").as_str(), Some("loop"));
        assert!(field(&decoded, "self").as_object().unwrap().ptr_eq(&decoded));
    }

    #[test]
    fn test_round_trip_preserves_aliasing() {
        // Arrange
        let registry = Registry::new();
        let shared = Value::object(Record::new().with("hp", 3));
        let list = Value::array(vec![shared.clone(), Value::from("x")]);
        let root = Value::object(
            Record::new()
                .with("left", shared.clone())
                .with("right", shared)
                .with("list", list),
        );

        // Act
        let decoded = deep_clone(&registry, &root).unwrap();

        // Assert
        let decoded = decoded.as_object().unwrap().clone();
        let left = field(&decoded, "left");
        let right = field(&decoded, "right");
        let list = field(&decoded, "list");
        assert!(left.is_same(&right));
        let items = list.as_array().unwrap().to_vec();
        assert_eq!(items.len(), 2);
        assert!(items[0].is_same(&left));
        assert_eq!(items[1].as_str(), Some("x"));
        assert_eq!(
            field(left.as_object().unwrap(), "hp").as_number(),
            Some(3.0)
        );
    }

    #[test]
    fn test_big_integers_beyond_128_bits_decode() {
        // Arrange
        let digits = "340282366920938463463374607431768211457";
        let document = document_from(serde_json::json!({
            "": {"": "sObject", "supply": format!("b{digits}")},
        }));

        // Act
        let decoded = decode(&Registry::new(), &document).unwrap();

        // Assert
        let supply = field(decoded.as_object().unwrap(), "supply");
        assert!(matches!(supply, Value::BigInt(n) if n.to_string() == digits));
    }

    #[test]
    fn test_sentinels_round_trip() {
        let registry = Registry::new();

        for value in [
            Value::Undefined,
            Value::Number(f64::NAN),
            Value::Number(f64::INFINITY),
            Value::Number(f64::NEG_INFINITY),
            Value::BigInt(format!("-{}", "9".repeat(60)).parse().unwrap()),
            Value::Symbol("iterator".into()),
        ] {
            let decoded = deep_clone(&registry, &value).unwrap();

            assert!(decoded.is_same(&value), "{value:?} became {decoded:?}");
        }

        let empty = deep_clone(&registry, &Value::object(Record::new())).unwrap();
        let empty = empty.as_object().unwrap();
        assert!(empty.downcast::<Record>().is_some());
        assert!(empty.borrow().fields().is_empty());
    }

    #[test]
    fn test_empty_field_name_round_trips() {
        let registry = Registry::new();
        let root = Value::object(Record::new().with("", "blank"));

        let decoded = deep_clone(&registry, &root).unwrap();

        assert_eq!(
            field(decoded.as_object().unwrap(), "").as_str(),
            Some("blank")
        );
    }

    #[test]
    fn test_root_link_inside_an_array() {
        let registry = Registry::new();
        let root = ArrayRef::new(Vec::new());
        root.borrow_mut().push(Value::Array(root.clone()));

        let decoded = deep_clone(&registry, &Value::Array(root)).unwrap();

        let decoded = decoded.as_array().unwrap().clone();
        assert!(decoded.borrow()[0].as_array().unwrap().ptr_eq(&decoded));
    }

    #[test]
    fn test_unknown_singleton_is_reported() {
        let registry = Registry::new();
        let document = document_from(serde_json::json!({"": {"": "sGhost"}}));

        let result = decode(&registry, &document);

        assert!(matches!(result, Err(EngineError::UnknownSingleton(name)) if name == "Ghost"));
    }

    #[test]
    fn test_malformed_documents_are_rejected() {
        let registry = Registry::new();
        let cases = [
            serde_json::json!({}),
            serde_json::json!({"": "plain"}),
            serde_json::json!({"": {"": "sObject", "x": ".missing"}}),
            serde_json::json!({"": {"x": 1}}),
            serde_json::json!({"": {"": "sNaN"}}),
            serde_json::json!({"": {"": "sObject", "x": ".v"}, ".v": 1}),
        ];

        for json in cases {
            let result = decode(&registry, &document_from(json.clone()));

            assert!(
                matches!(result, Err(EngineError::MalformedDocument(_))),
                "{json} gave {result:?}"
            );
        }
    }

    #[test]
    fn test_unknown_fields_are_assigned() {
        // Arrange
        let registry = Registry::new();
        let mut record = IndexMap::new();
        record.insert(String::new(), SerializedValue::Tag("sObject".into()));
        record.insert("legacy".into(), SerializedValue::Number(7.0));
        let mut document = Document::new();
        document.insert("", SerializedEntry::Record(record));

        // Act
        let decoded = decode(&registry, &document).unwrap();

        // Assert
        let typed = decoded.as_object().unwrap().downcast::<Record>().unwrap();
        assert_eq!(
            RefCell::borrow(&typed).get("legacy").and_then(Value::as_number),
            Some(7.0)
        );
    }
}
