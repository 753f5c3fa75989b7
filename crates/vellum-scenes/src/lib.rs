//! Vellum Scenes: top-level application flow.
//!
//! The engine's top-level flow is a stack of scenes (splash, title, the
//! story itself, menus over it). The [`SceneStack`] is itself a state
//! object, so the whole flow persists through the codec.

pub mod builtin;
pub mod scene;
pub mod stack;

pub use builtin::{BaseScene, SCENE, SPLASH, Splash, TITLE, Title};
pub use scene::{Scene, SceneControl, SceneRef, SceneState, SceneView, scene_of};
pub use stack::{STACK, SceneStack};

use vellum_core::error::EngineError;
use vellum_serde::Registry;

#[doc(hidden)]
pub mod __private {
    pub use vellum_core::dirty::DirtyFlag;
    pub use vellum_core::error::EngineError;
    pub use vellum_serde::{ClassRef, Serializable, Value};
    pub use vellum_state::{DIRTY_FIELD, StateCore, StateObject, set_dirty_field};
}

/// Registers the classes this crate defines.
///
/// # Errors
///
/// Returns `EngineError::DuplicateRegistration` on a name collision.
pub fn register(registry: &mut Registry) -> Result<(), EngineError> {
    for class in [&SCENE, &SPLASH, &TITLE, &STACK] {
        registry.register_class(class)?;
    }
    Ok(())
}
