//! Vellum runtime: a reference frame driver for the scene stack.
//!
//! The binary pushes the splash scene, ticks the stack at a fixed interval,
//! persists it after every frame and exits once the stack is empty.

pub mod config;
pub mod driver;
pub mod error;

use vellum_core::error::EngineError;
use vellum_serde::Registry;

/// Registers every class the engine crates define.
///
/// # Errors
///
/// Returns `EngineError::DuplicateRegistration` on a name collision.
pub fn register_engine(registry: &mut Registry) -> Result<(), EngineError> {
    vellum_serde::register(registry)?;
    vellum_state::register(registry)?;
    vellum_scenes::register(registry)
}
