//! Vellum Serde: link-addressed object-graph codec.
//!
//! Live graphs of shared objects and arrays are flattened into a
//! [`Document`]: every compound value lives under the link of the path where
//! it was first reached, and every later reference is just that link.
//! Classes and the scalar sentinels JSON cannot express encode by name
//! through the [`Registry`].

pub mod class;
pub mod decode;
pub mod document;
pub mod encode;
pub mod object;
pub mod record;
pub mod registry;
pub mod value;

pub use class::{Class, ClassRef, construct};
pub use decode::{decode, deep_clone};
pub use document::{Document, SerializedEntry, SerializedValue};
pub use encode::encode;
pub use object::{ArrayRef, ObjectRef, Serializable, type_mismatch};
pub use record::{OBJECT, Record};
pub use registry::{Registry, Singleton};
pub use value::Value;

pub use num_bigint::BigInt;

use vellum_core::error::EngineError;

/// Registers the classes this crate defines.
///
/// # Errors
///
/// Returns `EngineError::DuplicateRegistration` on a name collision.
pub fn register(registry: &mut Registry) -> Result<(), EngineError> {
    registry.register_class(&OBJECT)
}
