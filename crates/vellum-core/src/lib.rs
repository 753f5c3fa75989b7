//! Vellum Core: shared engine abstractions.
//!
//! This crate defines the error taxonomy, the dirty-flag cell every state
//! object is built on, and the clock used by frame drivers. It knows nothing
//! about serialization or scenes.

pub mod clock;
pub mod dirty;
pub mod error;
