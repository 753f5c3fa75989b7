//! The scene contract and the deferred-transition buffer scenes drive.

use std::cell::RefCell;
use std::rc::Rc;

use tracing::trace;
use vellum_core::clock::FrameTime;
use vellum_core::dirty::DirtyFlag;
use vellum_core::error::EngineError;
use vellum_serde::{ClassRef, ObjectRef, Value, type_mismatch};
use vellum_state::{StateCore, StateObject};

/// Shared handle to a scene, viewed through its [`Scene`] interface.
pub type SceneRef = Rc<RefCell<dyn Scene>>;

/// Class extension that recovers the [`Scene`] view of an instance.
///
/// Every scene class carries one:
///
/// ```ignore
/// static SPLASH_VIEW: SceneView = SceneView::of::<Splash>();
/// pub static SPLASH: Class = Class::new("Splash", construct::<Splash>)
///     .extends(&SCENE)
///     .with_extension(&SPLASH_VIEW);
/// ```
#[derive(Debug)]
pub struct SceneView {
    view: fn(&ObjectRef) -> Option<SceneRef>,
}

impl SceneView {
    /// The view for instances of `T`.
    #[must_use]
    pub const fn of<T: Scene>() -> Self {
        Self { view: view_as::<T> }
    }

    /// Views `object` as a scene, if it is one of this view's type.
    #[must_use]
    pub fn view(&self, object: &ObjectRef) -> Option<SceneRef> {
        (self.view)(object)
    }
}

fn view_as<T: Scene>(object: &ObjectRef) -> Option<SceneRef> {
    object.downcast::<T>().map(|scene| scene as SceneRef)
}

/// Views `object` as a scene through its class's [`SceneView`].
#[must_use]
pub fn scene_of(object: &ObjectRef) -> Option<SceneRef> {
    object.class().extension::<SceneView>()?.view(object)
}

/// State every scene carries besides its own fields.
#[derive(Debug, Default)]
pub struct SceneState {
    core: StateCore,
    focused: bool,
}

impl SceneState {
    /// Creates an unfocused, clean scene state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The dirty-tracking core.
    #[must_use]
    pub fn core(&self) -> &StateCore {
        &self.core
    }

    /// The dirty-tracking core, mutably.
    pub fn core_mut(&mut self) -> &mut StateCore {
        &mut self.core
    }

    /// Whether the scene holds focus.
    #[must_use]
    pub fn is_focused(&self) -> bool {
        self.focused
    }

    /// Sets focus without running hooks; returns whether it changed.
    pub fn replace_focused(&mut self, focused: bool) -> bool {
        if self.focused == focused {
            return false;
        }
        self.focused = focused;
        self.core.mark_dirty();
        true
    }

    /// Serializable fields: `focused`, then extras.
    #[must_use]
    pub fn fields(&self) -> Vec<(String, Value)> {
        let mut fields = vec![("focused".to_owned(), Value::Bool(self.focused))];
        fields.extend(self.core.extra_fields());
        fields
    }

    /// Field writes for scenes without fields of their own.
    ///
    /// Callers route `dirty` to `vellum_state::set_dirty_field` first, since
    /// it acts on the whole object.
    ///
    /// Writing `focused` restores the flag silently; focus hooks only run
    /// for transitions the stack performs.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::Type` if `focused` receives a non-boolean.
    pub fn set_field(&mut self, class: ClassRef, key: &str, value: Value) -> Result<(), EngineError> {
        match key {
            "focused" => match value {
                Value::Bool(focused) => {
                    self.focused = focused;
                    self.core.mark_dirty();
                }
                other => return Err(type_mismatch(class, key, "a boolean", &other)),
            },
            _ => self.core.set_extra(key, value),
        }
        Ok(())
    }
}

/// Deferred transitions requested while the stack is mid-update.
///
/// Scenes never touch the stack directly: every hook receives this buffer,
/// and the stack realises what it holds on later `update` calls.
#[derive(Debug)]
pub struct SceneControl {
    flag: DirtyFlag,
    pop_count: u32,
    push_queue: Vec<ClassRef>,
    frame: Option<FrameTime>,
}

impl SceneControl {
    /// Creates an empty buffer that marks `flag` dirty on every change.
    #[must_use]
    pub fn new(flag: DirtyFlag) -> Self {
        Self {
            flag,
            pop_count: 0,
            push_queue: Vec::new(),
            frame: None,
        }
    }

    /// Queues scene classes to push, in order.
    pub fn push(&mut self, classes: &[ClassRef]) {
        if classes.is_empty() {
            return;
        }
        self.push_queue.extend_from_slice(classes);
        trace!(queued = self.push_queue.len(), "queued scene push");
        self.flag.mark();
    }

    /// Removes `count` scenes from the top.
    ///
    /// Queued pushes that have not happened yet are cancelled first, newest
    /// first; only the remainder becomes real pops.
    pub fn pop(&mut self, count: u32) {
        if count == 0 {
            return;
        }
        let queued = u32::try_from(self.push_queue.len()).unwrap_or(u32::MAX);
        let cancelled = count.min(queued);
        self.push_queue
            .truncate(self.push_queue.len() - cancelled as usize);
        self.pop_count = self.pop_count.saturating_add(count - cancelled);
        trace!(cancelled, pop_count = self.pop_count, "scheduled scene pop");
        self.flag.mark();
    }

    /// Replaces the top scene: `pop(1)` then `push(classes)`.
    pub fn change(&mut self, classes: &[ClassRef]) {
        self.pop(1);
        self.push(classes);
    }

    /// Pending real pops.
    #[must_use]
    pub fn pop_count(&self) -> u32 {
        self.pop_count
    }

    /// Pending pushes, in order.
    #[must_use]
    pub fn push_queue(&self) -> &[ClassRef] {
        &self.push_queue
    }

    /// Timing of the frame being updated, if the driver provided one.
    #[must_use]
    pub fn frame(&self) -> Option<&FrameTime> {
        self.frame.as_ref()
    }

    pub(crate) fn set_frame(&mut self, frame: FrameTime) {
        self.frame = Some(frame);
    }

    pub(crate) fn take_pop(&mut self) {
        self.pop_count = self.pop_count.saturating_sub(1);
        self.flag.mark();
    }

    pub(crate) fn reset_pops(&mut self) {
        if self.pop_count != 0 {
            self.pop_count = 0;
            self.flag.mark();
        }
    }

    pub(crate) fn take_queue(&mut self) -> Vec<ClassRef> {
        let queue = std::mem::take(&mut self.push_queue);
        if !queue.is_empty() {
            self.flag.mark();
        }
        queue
    }

    pub(crate) fn restore_queue(&mut self, mut queue: Vec<ClassRef>) {
        queue.append(&mut self.push_queue);
        self.push_queue = queue;
    }

    pub(crate) fn schedule_exact(&mut self, pop_count: u32) {
        self.push_queue.clear();
        self.pop_count = pop_count;
        self.flag.mark();
    }

    pub(crate) fn set_pending(&mut self, pop_count: u32, push_queue: Vec<ClassRef>) {
        self.pop_count = pop_count;
        self.push_queue = push_queue;
        self.flag.mark();
    }
}

/// One focus-holding unit of application flow.
///
/// All hooks default to doing nothing; the readiness gates default to ready.
/// Hooks request transitions through the [`SceneControl`] they receive.
pub trait Scene: StateObject {
    /// Scene bookkeeping shared by all scenes.
    fn scene_state(&self) -> &SceneState;

    /// Scene bookkeeping, mutably.
    fn scene_state_mut(&mut self) -> &mut SceneState;

    /// Called once right after the scene is pushed.
    fn start(&mut self, _control: &mut SceneControl) {}

    /// Called once right before the scene is removed.
    fn stop(&mut self, _control: &mut SceneControl) {}

    /// Called when the scene becomes the focused top.
    fn on_focused(&mut self, _control: &mut SceneControl) {}

    /// Called when the scene stops being the focused top.
    fn on_focus_lost(&mut self, _control: &mut SceneControl) {}

    /// Per-frame tick while this scene is on top.
    fn update(&mut self, _control: &mut SceneControl) {}

    /// Readiness gate for being covered by a push, e.g. an outro animation.
    fn update_blurring(&mut self, _control: &mut SceneControl) -> bool {
        true
    }

    /// Readiness gate for being popped.
    fn update_popping(&mut self, _control: &mut SceneControl) -> bool {
        true
    }

    /// Per-frame tick for scenes below a top that is not ready to pop.
    fn update_background(&mut self, _control: &mut SceneControl) {}

    /// Whether the scene holds focus.
    fn is_focused(&self) -> bool {
        self.scene_state().is_focused()
    }

    /// Moves focus, running [`Scene::on_focused`] or
    /// [`Scene::on_focus_lost`] when it actually changes.
    fn set_focused(&mut self, focused: bool, control: &mut SceneControl) {
        if !self.scene_state_mut().replace_focused(focused) {
            return;
        }
        if focused {
            self.on_focused(control);
        } else {
            self.on_focus_lost(control);
        }
    }
}

/// Implements `Serializable` and `StateObject` for a scene type whose only
/// persistent state is a `state: SceneState` field.
#[macro_export]
macro_rules! impl_scene_object {
    ($ty:ty, $class:path) => {
        impl $crate::__private::Serializable for $ty {
            fn class(&self) -> $crate::__private::ClassRef {
                &$class
            }

            fn fields(&self) -> ::std::vec::Vec<(::std::string::String, $crate::__private::Value)> {
                self.state.fields()
            }

            fn set_field(
                &mut self,
                key: &str,
                value: $crate::__private::Value,
            ) -> ::core::result::Result<(), $crate::__private::EngineError> {
                if key == $crate::__private::DIRTY_FIELD {
                    return $crate::__private::set_dirty_field(&*self, &value);
                }
                self.state.set_field(&$class, key, value)
            }

            fn dirty_flag(&self) -> ::core::option::Option<&$crate::__private::DirtyFlag> {
                ::core::option::Option::Some(self.state.core().flag())
            }
        }

        impl $crate::__private::StateObject for $ty {
            fn state(&self) -> &$crate::__private::StateCore {
                self.state.core()
            }

            fn state_mut(&mut self) -> &mut $crate::__private::StateCore {
                self.state.core_mut()
            }
        }
    };
}
