//! Shared test clocks, probe scenes and registries for the Vellum engine.

mod clock;
pub mod journal;
mod scenes;

pub use clock::{FixedClock, SteppingClock};
pub use scenes::{BACKDROP, PROBE, Probe, RELAY};

use vellum_serde::Registry;

/// A registry holding every class the engine crates define, plus the probes.
///
/// # Panics
///
/// Panics if two classes share a name, which is a bug in the crates.
#[must_use]
pub fn test_registry() -> Registry {
    let mut registry = Registry::new();
    vellum_serde::register(&mut registry).expect("serde classes register");
    vellum_state::register(&mut registry).expect("state classes register");
    vellum_scenes::register(&mut registry).expect("scene classes register");
    for class in [&PROBE, &BACKDROP, &RELAY] {
        registry.register_class(class).expect("probe classes register");
    }
    registry
}
