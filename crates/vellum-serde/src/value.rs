//! Dynamic values of the live object graph.

use num_bigint::BigInt;

use crate::class::ClassRef;
use crate::object::{ArrayRef, ObjectRef, Serializable};

/// Any value reachable from an encode root.
#[derive(Debug, Clone, Default)]
pub enum Value {
    /// The absent value.
    #[default]
    Undefined,
    /// The explicit null value.
    Null,
    /// A boolean.
    Bool(bool),
    /// A double-precision number, including the non-finite sentinels.
    Number(f64),
    /// An integer of any size.
    BigInt(BigInt),
    /// A text string.
    String(String),
    /// A registered symbol, identified by its key.
    Symbol(String),
    /// A class, serialized by its registry name.
    Class(ClassRef),
    /// A shared object.
    Object(ObjectRef),
    /// A shared ordered sequence.
    Array(ArrayRef),
}

impl Value {
    /// Wraps `value` in a new shared object.
    #[must_use]
    pub fn object<T: Serializable>(value: T) -> Self {
        Self::Object(ObjectRef::new(value))
    }

    /// Builds a new shared array.
    #[must_use]
    pub fn array(items: Vec<Value>) -> Self {
        Self::Array(ArrayRef::new(items))
    }

    /// Short description of the value's kind, for error messages.
    #[must_use]
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Undefined => "undefined",
            Self::Null => "null",
            Self::Bool(_) => "a boolean",
            Self::Number(_) => "a number",
            Self::BigInt(_) => "a big integer",
            Self::String(_) => "a string",
            Self::Symbol(_) => "a symbol",
            Self::Class(_) => "a class",
            Self::Object(_) => "an object",
            Self::Array(_) => "an array",
        }
    }

    /// Whether this is [`Value::Undefined`].
    #[must_use]
    pub fn is_undefined(&self) -> bool {
        matches!(self, Self::Undefined)
    }

    /// The boolean, if this is one.
    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// The number, if this is one.
    #[must_use]
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// The text, if this is a string.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s.as_str()),
            _ => None,
        }
    }

    /// The class, if this is one.
    #[must_use]
    pub fn as_class(&self) -> Option<ClassRef> {
        match self {
            Self::Class(c) => Some(*c),
            _ => None,
        }
    }

    /// The object handle, if this is an object.
    #[must_use]
    pub fn as_object(&self) -> Option<&ObjectRef> {
        match self {
            Self::Object(o) => Some(o),
            _ => None,
        }
    }

    /// The array handle, if this is an array.
    #[must_use]
    pub fn as_array(&self) -> Option<&ArrayRef> {
        match self {
            Self::Array(a) => Some(a),
            _ => None,
        }
    }

    /// Identity-aware equality: scalars compare by value (`NaN` equals
    /// itself), classes, objects and arrays by identity.
    #[must_use]
    pub fn is_same(&self, other: &Value) -> bool {
        match (self, other) {
            (Self::Undefined, Self::Undefined) | (Self::Null, Self::Null) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Number(a), Self::Number(b)) => a == b || (a.is_nan() && b.is_nan()),
            (Self::BigInt(a), Self::BigInt(b)) => a == b,
            (Self::String(a), Self::String(b)) | (Self::Symbol(a), Self::Symbol(b)) => a == b,
            (Self::Class(a), Self::Class(b)) => a == b,
            (Self::Object(a), Self::Object(b)) => a.ptr_eq(b),
            (Self::Array(a), Self::Array(b)) => a.ptr_eq(b),
            _ => false,
        }
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Self::Number(f64::from(value))
    }
}

impl From<u32> for Value {
    fn from(value: u32) -> Self {
        Self::Number(f64::from(value))
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::String(value.to_owned())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<ClassRef> for Value {
    fn from(value: ClassRef) -> Self {
        Self::Class(value)
    }
}

impl From<ObjectRef> for Value {
    fn from(value: ObjectRef) -> Self {
        Self::Object(value)
    }
}

impl From<ArrayRef> for Value {
    fn from(value: ArrayRef) -> Self {
        Self::Array(value)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::OBJECT;

    #[test]
    fn test_nan_is_same_as_itself() {
        assert!(Value::Number(f64::NAN).is_same(&Value::Number(f64::NAN)));
        assert!(!Value::Number(1.0).is_same(&Value::Number(2.0)));
    }

    #[test]
    fn test_arrays_compare_by_identity() {
        let a = Value::array(vec![Value::from(1)]);
        let b = Value::array(vec![Value::from(1)]);

        assert!(a.is_same(&a.clone()));
        assert!(!a.is_same(&b));
    }

    #[test]
    fn test_option_converts_to_null() {
        let none: Option<&str> = None;

        assert!(matches!(Value::from(none), Value::Null));
        assert_eq!(Value::from(Some("x")).as_str(), Some("x"));
    }

    #[test]
    fn test_class_values() {
        let value = Value::from(&OBJECT);

        assert_eq!(value.as_class().map(|c| c.name()), Some("Object"));
        assert_eq!(value.kind_name(), "a class");
    }
}
