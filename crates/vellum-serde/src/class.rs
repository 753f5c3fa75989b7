//! Class descriptors.
//!
//! A [`Class`] is the closed, compile-time counterpart of a constructor: a
//! registry name, an optional base class for "is a" checks, a typed
//! zero-argument factory, and an optional typed extension that higher layers
//! use to recover richer views of instances. Classes are declared as
//! statics and referred to as `&'static Class`.

use std::any::Any;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::ptr;

use crate::object::{ObjectRef, Serializable};

/// Reference to a statically declared class.
pub type ClassRef = &'static Class;

/// Descriptor of a serializable class.
pub struct Class {
    name: &'static str,
    base: Option<ClassRef>,
    construct: fn() -> ObjectRef,
    extension: Option<&'static (dyn Any + Send + Sync)>,
}

impl Class {
    /// Declares a class named `name` built by `construct`.
    #[must_use]
    pub const fn new(name: &'static str, construct: fn() -> ObjectRef) -> Self {
        Self {
            name,
            base: None,
            construct,
            extension: None,
        }
    }

    /// Declares `base` as this class's parent.
    #[must_use]
    pub const fn extends(mut self, base: ClassRef) -> Self {
        self.base = Some(base);
        self
    }

    /// Attaches a typed extension, retrievable with [`Class::extension`].
    #[must_use]
    pub const fn with_extension(mut self, extension: &'static (dyn Any + Send + Sync)) -> Self {
        self.extension = Some(extension);
        self
    }

    /// The class name, which is also its default registry name.
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// The parent class, if any.
    #[must_use]
    pub fn base(&self) -> Option<ClassRef> {
        self.base
    }

    /// Constructs a fresh, default instance.
    #[must_use]
    pub fn instantiate(&self) -> ObjectRef {
        (self.construct)()
    }

    /// Whether this class is `ancestor` or extends it, directly or not.
    #[must_use]
    pub fn is_a(&self, ancestor: &Class) -> bool {
        let mut current = Some(self);
        while let Some(class) = current {
            if class == ancestor {
                return true;
            }
            current = class.base;
        }
        false
    }

    /// The attached extension, if it is an `E`.
    #[must_use]
    pub fn extension<E: Any>(&self) -> Option<&'static E> {
        self.extension.and_then(|ext| ext.downcast_ref::<E>())
    }
}

/// Factory for classes whose instances start from `T::default()`.
#[must_use]
pub fn construct<T: Serializable + Default>() -> ObjectRef {
    ObjectRef::new(T::default())
}

impl PartialEq for Class {
    fn eq(&self, other: &Self) -> bool {
        ptr::eq(self, other)
    }
}

impl Eq for Class {}

impl Hash for Class {
    fn hash<H: Hasher>(&self, state: &mut H) {
        ptr::hash(self, state);
    }
}

impl fmt::Debug for Class {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Class")
            .field("name", &self.name)
            .field("base", &self.base.map(Class::name))
            .finish_non_exhaustive()
    }
}
