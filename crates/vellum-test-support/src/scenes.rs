//! Probe scenes that journal every hook call.
//!
//! All three classes share the [`Probe`] type. `Relay` additionally changes
//! to a `Probe` as soon as it is focused, mirroring how a splash screen
//! hands over.

use std::cell::RefCell;
use std::rc::Rc;

use vellum_core::dirty::DirtyFlag;
use vellum_core::error::EngineError;
use vellum_scenes::{SCENE, Scene, SceneControl, SceneState, SceneView};
use vellum_serde::{Class, ClassRef, ObjectRef, Serializable, Value};
use vellum_state::{DIRTY_FIELD, StateCore, StateObject, set_dirty_field};

use crate::journal;

static PROBE_VIEW: SceneView = SceneView::of::<Probe>();

/// A scene that journals its hooks.
pub static PROBE: Class = Class::new("Probe", new_probe)
    .extends(&SCENE)
    .with_extension(&PROBE_VIEW);

/// A probe meant to sit below others and collect background ticks.
pub static BACKDROP: Class = Class::new("Backdrop", new_backdrop)
    .extends(&SCENE)
    .with_extension(&PROBE_VIEW);

/// A probe that changes to [`PROBE`] when focused.
pub static RELAY: Class = Class::new("Relay", new_relay)
    .extends(&PROBE)
    .with_extension(&PROBE_VIEW);

fn new_probe() -> ObjectRef {
    ObjectRef::new(Probe::new(&PROBE))
}

fn new_backdrop() -> ObjectRef {
    ObjectRef::new(Probe::new(&BACKDROP))
}

fn new_relay() -> ObjectRef {
    ObjectRef::new(Probe::new(&RELAY))
}

/// Journaling scene with switchable readiness gates.
#[derive(Debug)]
pub struct Probe {
    class: ClassRef,
    state: SceneState,
    /// While set, `update_popping` reports not ready.
    pub hold_pop: bool,
    /// While set, `update_blurring` reports not ready.
    pub hold_blur: bool,
}

impl Probe {
    /// Creates an ungated probe of `class`.
    #[must_use]
    pub fn new(class: ClassRef) -> Self {
        Self {
            class,
            state: SceneState::new(),
            hold_pop: false,
            hold_blur: false,
        }
    }

    /// The typed probe behind `object`, if it is one.
    #[must_use]
    pub fn of(object: &ObjectRef) -> Option<Rc<RefCell<Probe>>> {
        object.downcast::<Probe>()
    }

    fn record(&self, hook: &str) {
        journal::record(format!("{}.{hook}", self.class.name()));
    }
}

impl Serializable for Probe {
    fn class(&self) -> ClassRef {
        self.class
    }

    fn fields(&self) -> Vec<(String, Value)> {
        self.state.fields()
    }

    fn set_field(&mut self, key: &str, value: Value) -> Result<(), EngineError> {
        if key == DIRTY_FIELD {
            return set_dirty_field(&*self, &value);
        }
        self.state.set_field(self.class, key, value)
    }

    fn dirty_flag(&self) -> Option<&DirtyFlag> {
        Some(self.state.core().flag())
    }
}

impl StateObject for Probe {
    fn state(&self) -> &StateCore {
        self.state.core()
    }

    fn state_mut(&mut self) -> &mut StateCore {
        self.state.core_mut()
    }
}

impl Scene for Probe {
    fn scene_state(&self) -> &SceneState {
        &self.state
    }

    fn scene_state_mut(&mut self) -> &mut SceneState {
        &mut self.state
    }

    fn start(&mut self, _control: &mut SceneControl) {
        self.record("start");
    }

    fn stop(&mut self, _control: &mut SceneControl) {
        self.record("stop");
    }

    fn on_focused(&mut self, control: &mut SceneControl) {
        self.record("on_focused");
        if self.class == &RELAY {
            control.change(&[&PROBE]);
        }
    }

    fn on_focus_lost(&mut self, _control: &mut SceneControl) {
        self.record("on_focus_lost");
    }

    fn update(&mut self, _control: &mut SceneControl) {
        self.record("update");
    }

    fn update_blurring(&mut self, _control: &mut SceneControl) -> bool {
        self.record("update_blurring");
        !self.hold_blur
    }

    fn update_popping(&mut self, _control: &mut SceneControl) -> bool {
        self.record("update_popping");
        !self.hold_pop
    }

    fn update_background(&mut self, _control: &mut SceneControl) {
        self.record("update_background");
    }
}
