//! Vellum State: dirty-tracked persistent state.
//!
//! A state object represents durable state: the stops a script settles on,
//! not the transient animation between them. Every write marks it dirty,
//! which tells the persistence layer it needs saving again.

pub mod message;
pub mod state;

pub use message::{Actor, Message, MessageText, StageDirection, TextStyle, default_text_style};
pub use state::{
    CleanTraversal, DIRTY_FIELD, DirtySource, StateCore, StateObject, propagate_clean,
    set_dirty_field,
};

use vellum_core::error::EngineError;
use vellum_serde::Registry;

/// Registers the classes this crate defines.
///
/// # Errors
///
/// Returns `EngineError::DuplicateRegistration` on a name collision.
pub fn register(registry: &mut Registry) -> Result<(), EngineError> {
    for class in [
        &message::ACTOR,
        &message::TEXT_STYLE,
        &message::MESSAGE_TEXT,
        &message::STAGE_DIRECTION,
        &message::MESSAGE,
    ] {
        registry.register_class(class)?;
    }
    Ok(())
}
