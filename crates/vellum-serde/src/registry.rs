//! Singleton registry.
//!
//! Maps stable names to singleton values (classes and the handful of scalar
//! sentinels JSON cannot express) and back. The encoder consults it before
//! anything else, so registered values always serialize as compact links;
//! the decoder resolves those links by name.

use std::collections::HashMap;
use std::sync::{LazyLock, PoisonError, RwLock, RwLockReadGuard};

use tracing::debug;
use vellum_core::error::EngineError;

use crate::class::ClassRef;
use crate::record::OBJECT;
use crate::value::Value;

/// A value that serializes by name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Singleton {
    /// [`Value::Undefined`].
    Undefined,
    /// A `NaN` number.
    NaN,
    /// Positive infinity.
    Infinity,
    /// Negative infinity.
    NegInfinity,
    /// A class.
    Class(ClassRef),
}

impl Singleton {
    /// The singleton `value` is, if any.
    #[must_use]
    pub fn of(value: &Value) -> Option<Self> {
        match value {
            Value::Undefined => Some(Self::Undefined),
            Value::Number(n) if n.is_nan() => Some(Self::NaN),
            Value::Number(n) if *n == f64::INFINITY => Some(Self::Infinity),
            Value::Number(n) if *n == f64::NEG_INFINITY => Some(Self::NegInfinity),
            Value::Class(class) => Some(Self::Class(*class)),
            _ => None,
        }
    }

    /// The live value this singleton stands for.
    #[must_use]
    pub fn to_value(self) -> Value {
        match self {
            Self::Undefined => Value::Undefined,
            Self::NaN => Value::Number(f64::NAN),
            Self::Infinity => Value::Number(f64::INFINITY),
            Self::NegInfinity => Value::Number(f64::NEG_INFINITY),
            Self::Class(class) => Value::Class(class),
        }
    }
}

/// Bidirectional name/singleton table.
#[derive(Debug)]
pub struct Registry {
    by_name: HashMap<String, Singleton>,
    by_value: HashMap<Singleton, String>,
}

impl Registry {
    /// Creates a registry seeded with the scalar sentinels (`undefined`,
    /// `NaN`, `Infinity`, `-Infinity`) and the plain record marker `Object`.
    #[must_use]
    pub fn new() -> Self {
        let mut registry = Self {
            by_name: HashMap::new(),
            by_value: HashMap::new(),
        };
        for (name, singleton) in [
            ("undefined", Singleton::Undefined),
            ("NaN", Singleton::NaN),
            ("Infinity", Singleton::Infinity),
            ("-Infinity", Singleton::NegInfinity),
            (OBJECT.name(), Singleton::Class(&OBJECT)),
        ] {
            registry.insert(name, singleton);
        }
        registry
    }

    /// Binds `name` to `singleton`.
    ///
    /// Registering the same pair again is a no-op.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::DuplicateRegistration` if `name` is already
    /// bound to a different singleton.
    pub fn register(&mut self, name: &str, singleton: Singleton) -> Result<(), EngineError> {
        match self.by_name.get(name) {
            Some(existing) if *existing == singleton => Ok(()),
            Some(_) => Err(EngineError::DuplicateRegistration {
                name: name.to_owned(),
            }),
            None => {
                debug!(name, "registered singleton");
                self.insert(name, singleton);
                Ok(())
            }
        }
    }

    /// Registers `class` under its own name.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::DuplicateRegistration` if another class already
    /// uses the name.
    pub fn register_class(&mut self, class: ClassRef) -> Result<(), EngineError> {
        self.register(class.name(), Singleton::Class(class))
    }

    /// Resolves a name, as the decoder does for singleton links.
    #[must_use]
    pub fn lookup_by_name(&self, name: &str) -> Option<Singleton> {
        self.by_name.get(name).copied()
    }

    /// The name a singleton is registered under.
    #[must_use]
    pub fn lookup_by_value(&self, singleton: &Singleton) -> Option<&str> {
        self.by_value.get(singleton).map(String::as_str)
    }

    /// The registered name of `value`, if it is a registered singleton.
    #[must_use]
    pub fn name_of(&self, value: &Value) -> Option<&str> {
        Singleton::of(value).and_then(|singleton| self.lookup_by_value(&singleton))
    }

    /// Resolves a name to a class.
    #[must_use]
    pub fn class(&self, name: &str) -> Option<ClassRef> {
        match self.lookup_by_name(name) {
            Some(Singleton::Class(class)) => Some(class),
            _ => None,
        }
    }

    /// Number of registered names.
    #[must_use]
    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    /// Whether nothing is registered. Never true for [`Registry::new`].
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }

    fn insert(&mut self, name: &str, singleton: Singleton) {
        self.by_name.insert(name.to_owned(), singleton);
        self.by_value.entry(singleton).or_insert_with(|| name.to_owned());
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

static GLOBAL: LazyLock<RwLock<Registry>> = LazyLock::new(|| RwLock::new(Registry::new()));

/// Read access to the process-wide registry.
///
/// Registration is expected to finish during startup, before the frame loop
/// begins reading.
pub fn global() -> RwLockReadGuard<'static, Registry> {
    GLOBAL.read().unwrap_or_else(PoisonError::into_inner)
}

/// Runs `register` against the process-wide registry.
///
/// # Errors
///
/// Propagates the first error `register` returns.
pub fn register_global<F>(register: F) -> Result<(), EngineError>
where
    F: FnOnce(&mut Registry) -> Result<(), EngineError>,
{
    let mut registry = GLOBAL.write().unwrap_or_else(PoisonError::into_inner);
    register(&mut registry)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::class::{Class, construct};
    use crate::record::Record;

    static PAGE: Class = Class::new("Page", construct::<Record>);
    static IMPOSTOR: Class = Class::new("Page", construct::<Record>);

    #[test]
    fn test_new_registry_has_sentinels() {
        let registry = Registry::new();

        assert_eq!(registry.lookup_by_name("undefined"), Some(Singleton::Undefined));
        assert_eq!(registry.lookup_by_name("NaN"), Some(Singleton::NaN));
        assert_eq!(registry.lookup_by_name("Infinity"), Some(Singleton::Infinity));
        assert_eq!(registry.lookup_by_name("-Infinity"), Some(Singleton::NegInfinity));
        assert_eq!(registry.class("Object"), Some(&OBJECT));
    }

    #[test]
    fn test_register_is_idempotent_for_the_same_pair() {
        let mut registry = Registry::new();

        registry.register_class(&PAGE).unwrap();
        registry.register_class(&PAGE).unwrap();

        assert_eq!(registry.class("Page"), Some(&PAGE));
    }

    #[test]
    fn test_register_rejects_a_different_value() {
        let mut registry = Registry::new();
        registry.register_class(&PAGE).unwrap();

        let result = registry.register_class(&IMPOSTOR);

        match result {
            Err(EngineError::DuplicateRegistration { name }) => assert_eq!(name, "Page"),
            other => panic!("expected DuplicateRegistration, got {other:?}"),
        }
        assert_eq!(registry.class("Page"), Some(&PAGE));
    }

    #[test]
    fn test_name_of_finds_sentinels_and_classes() {
        let mut registry = Registry::new();
        registry.register_class(&PAGE).unwrap();

        assert_eq!(registry.name_of(&Value::Number(f64::NAN)), Some("NaN"));
        assert_eq!(registry.name_of(&Value::Number(f64::NEG_INFINITY)), Some("-Infinity"));
        assert_eq!(registry.name_of(&Value::Class(&PAGE)), Some("Page"));
        assert_eq!(registry.name_of(&Value::Number(1.5)), None);
        assert_eq!(registry.name_of(&Value::Class(&IMPOSTOR)), None);
    }

    #[test]
    fn test_global_registry_accepts_registrations() {
        static GLOBAL_ONLY: Class = Class::new("GlobalOnly", construct::<Record>);

        register_global(|registry| registry.register_class(&GLOBAL_ONLY)).unwrap();

        assert_eq!(global().class("GlobalOnly"), Some(&GLOBAL_ONLY));
    }
}
