//! The scene stack state machine.
//!
//! Transitions are deferred: `push`, `pop`, `change` and `pop_to` only
//! schedule work in the [`SceneControl`] buffer, and [`SceneStack::update`]
//! realises it once per frame. Within one update, pops are realised before
//! pushes, and pushes before the top scene's tick.

use std::cell::RefMut;

use tracing::debug;
use vellum_core::clock::FrameTime;
use vellum_core::dirty::DirtyFlag;
use vellum_core::error::EngineError;
use vellum_serde::{
    Class, ClassRef, ObjectRef, Serializable, Value, construct, type_mismatch,
};
use vellum_state::{DIRTY_FIELD, DirtySource, StateCore, StateObject, set_dirty_field};

use crate::scene::{Scene, SceneControl, SceneRef, scene_of};

/// Class of [`SceneStack`].
pub static STACK: Class = Class::new("SceneStack", construct::<SceneStack>);

#[derive(Debug)]
struct SceneSlot {
    object: ObjectRef,
    scene: SceneRef,
}

impl SceneSlot {
    fn from_object(object: ObjectRef) -> Result<Self, EngineError> {
        let scene = scene_of(&object).ok_or_else(|| {
            EngineError::Type(format!("`{}` is not a scene class", object.class().name()))
        })?;
        Ok(Self { object, scene })
    }

    fn borrow(&self) -> Result<RefMut<'_, dyn Scene>, EngineError> {
        self.scene.try_borrow_mut().map_err(|_| {
            EngineError::InvalidOperation(format!(
                "`{}` scene is already borrowed",
                self.object.class().name()
            ))
        })
    }
}

impl DirtySource for SceneSlot {
    fn subscribe(&self, owner: &DirtyFlag) {
        self.object.subscribe(owner);
    }

    fn unsubscribe(&self, owner: &DirtyFlag) -> Result<(), EngineError> {
        self.object.unsubscribe(owner)
    }
}

/// Ordered collection of scenes; only the top one is ever focused.
#[derive(Debug)]
pub struct SceneStack {
    state: StateCore,
    scenes: Vec<SceneSlot>,
    control: SceneControl,
}

impl Default for SceneStack {
    fn default() -> Self {
        let state = StateCore::new();
        let control = SceneControl::new(state.flag().clone());
        Self {
            state,
            scenes: Vec::new(),
            control,
        }
    }
}

impl SceneStack {
    /// Creates an empty stack.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues scene classes to push on the next update.
    pub fn push(&mut self, classes: &[ClassRef]) {
        self.control.push(classes);
    }

    /// Schedules `count` pops, cancelling queued pushes first.
    pub fn pop(&mut self, count: u32) {
        self.control.pop(count);
    }

    /// Replaces the top scene with `classes`.
    pub fn change(&mut self, classes: &[ClassRef]) {
        self.control.change(classes);
    }

    /// Schedules exactly the pops that bring the nearest scene of `class`
    /// (or a subclass) to the top, cancelling queued pushes.
    ///
    /// With `skip_pending_pops`, scenes already slated for removal are not
    /// considered. Does nothing if the target will already be on top.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::InvalidOperation` if no such scene is found.
    pub fn pop_to(&mut self, class: ClassRef, skip_pending_pops: bool) -> Result<(), EngineError> {
        let len = self.scenes.len();
        let pending = self.control.pop_count() as usize;
        let searchable = if skip_pending_pops {
            len.saturating_sub(pending)
        } else {
            len
        };
        let index = self.scenes[..searchable]
            .iter()
            .rposition(|slot| slot.object.class().is_a(class))
            .ok_or_else(|| {
                EngineError::InvalidOperation(format!(
                    "no `{}` scene on the stack to pop to",
                    class.name()
                ))
            })?;
        let needed = u32::try_from(len - 1 - index).map_err(|_| {
            EngineError::InvalidOperation("too many scenes above the target".to_owned())
        })?;
        if self.control.pop_count() == needed && self.control.push_queue().is_empty() {
            return Ok(());
        }
        debug!(target = class.name(), pops = needed, "scheduled pop_to");
        self.control.schedule_exact(needed);
        Ok(())
    }

    /// Realises pending transitions, then ticks the top scene.
    ///
    /// 1. While pops are pending, the top scene's `update_popping` gate
    ///    decides: ready scenes are popped; otherwise every other scene gets
    ///    `update_background` and the frame ends.
    /// 2. Pending pops reset to zero.
    /// 3. If pushes are queued, the top's `update_blurring` gate decides
    ///    whether the whole batch is pushed now; either way the frame ends.
    /// 4. Otherwise the top scene regains focus if it lost it, then is
    ///    ticked.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::Type` if a queued class is not a scene class (the
    /// queue is kept), or `EngineError::InvalidOperation` if a scene is
    /// re-entered while borrowed.
    pub fn update(&mut self) -> Result<(), EngineError> {
        while self.control.pop_count() > 0 {
            let Some(top) = self.scenes.last() else {
                break;
            };
            let ready = top.borrow()?.update_popping(&mut self.control);
            if !ready {
                let background = &self.scenes[..self.scenes.len() - 1];
                for slot in background {
                    slot.borrow()?.update_background(&mut self.control);
                }
                return Ok(());
            }
            self.control.take_pop();
            self.exec_pop()?;
        }
        self.control.reset_pops();

        if !self.control.push_queue().is_empty() {
            let ready = match self.scenes.last() {
                Some(top) => top.borrow()?.update_blurring(&mut self.control),
                None => true,
            };
            if ready {
                let batch = self.control.take_queue();
                self.exec_push(batch)?;
            }
            return Ok(());
        }

        if let Some(top) = self.scenes.last() {
            let mut scene = top.borrow()?;
            if !scene.is_focused() {
                scene.set_focused(true, &mut self.control);
            }
            scene.update(&mut self.control);
        }
        Ok(())
    }

    /// Provides the timing hooks see through [`SceneControl::frame`].
    pub fn set_frame_time(&mut self, frame: FrameTime) {
        self.control.set_frame(frame);
    }

    /// The scenes, bottom first.
    #[must_use]
    pub fn scenes(&self) -> Vec<ObjectRef> {
        self.scenes.iter().map(|slot| slot.object.clone()).collect()
    }

    /// The top scene, if any.
    #[must_use]
    pub fn top(&self) -> Option<&ObjectRef> {
        self.scenes.last().map(|slot| &slot.object)
    }

    /// Number of scenes on the stack.
    #[must_use]
    pub fn len(&self) -> usize {
        self.scenes.len()
    }

    /// Whether the stack holds no scenes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.scenes.is_empty()
    }

    /// Pending real pops.
    #[must_use]
    pub fn pop_count(&self) -> u32 {
        self.control.pop_count()
    }

    /// Pending pushes, in order.
    #[must_use]
    pub fn push_queue(&self) -> &[ClassRef] {
        self.control.push_queue()
    }

    fn exec_push(&mut self, batch: Vec<ClassRef>) -> Result<(), EngineError> {
        let slots = match batch
            .iter()
            .map(|class| SceneSlot::from_object(class.instantiate()))
            .collect::<Result<Vec<_>, _>>()
        {
            Ok(slots) => slots,
            Err(error) => {
                self.control.restore_queue(batch);
                return Err(error);
            }
        };

        if let Some(top) = self.scenes.last() {
            top.borrow()?.set_focused(false, &mut self.control);
        }
        for slot in slots {
            slot.subscribe(self.state.flag());
            debug!(scene = slot.object.class().name(), "pushing scene");
            self.scenes.push(slot);
            if let Some(pushed) = self.scenes.last() {
                pushed.borrow()?.start(&mut self.control);
            }
        }
        if let Some(top) = self.scenes.last() {
            top.borrow()?.set_focused(true, &mut self.control);
        }
        self.state.mark_dirty();
        Ok(())
    }

    fn exec_pop(&mut self) -> Result<(), EngineError> {
        let Some(top) = self.scenes.last() else {
            return Err(EngineError::InvalidOperation(
                "cannot pop a scene from an empty stack".to_owned(),
            ));
        };
        {
            let mut scene = top.borrow()?;
            scene.set_focused(false, &mut self.control);
            scene.stop(&mut self.control);
        }
        if let Some(slot) = self.scenes.pop() {
            debug!(scene = slot.object.class().name(), "popped scene");
            slot.unsubscribe(self.state.flag())?;
        }
        self.state.mark_dirty();
        Ok(())
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn pop_count_from(value: &Value) -> Result<u32, EngineError> {
    match value {
        Value::Number(n) if n.is_finite() && *n >= 0.0 && n.fract() == 0.0 && *n <= f64::from(u32::MAX) => {
            Ok(*n as u32)
        }
        other => Err(type_mismatch(
            &STACK,
            "popCount",
            "a non-negative whole number",
            other,
        )),
    }
}

fn classes_from(value: &Value) -> Result<Vec<ClassRef>, EngineError> {
    let expected = "an array of classes";
    let Value::Array(array) = value else {
        return Err(type_mismatch(&STACK, "pushQueue", expected, value));
    };
    array
        .to_vec()
        .iter()
        .map(|item| {
            item.as_class()
                .ok_or_else(|| type_mismatch(&STACK, "pushQueue", expected, item))
        })
        .collect()
}

fn slots_from(value: &Value) -> Result<Vec<SceneSlot>, EngineError> {
    let expected = "an array of scenes";
    let Value::Array(array) = value else {
        return Err(type_mismatch(&STACK, "scenes", expected, value));
    };
    array
        .to_vec()
        .into_iter()
        .map(|item| match item {
            Value::Object(object) => SceneSlot::from_object(object),
            other => Err(type_mismatch(&STACK, "scenes", expected, &other)),
        })
        .collect()
}

impl Serializable for SceneStack {
    fn class(&self) -> ClassRef {
        &STACK
    }

    fn fields(&self) -> Vec<(String, Value)> {
        let scenes = self
            .scenes
            .iter()
            .map(|slot| Value::Object(slot.object.clone()))
            .collect();
        let queue = self
            .control
            .push_queue()
            .iter()
            .copied()
            .map(Value::Class)
            .collect();
        let mut fields = vec![
            ("scenes".to_owned(), Value::array(scenes)),
            (
                "popCount".to_owned(),
                Value::Number(f64::from(self.control.pop_count())),
            ),
            ("pushQueue".to_owned(), Value::array(queue)),
        ];
        fields.extend(self.state.extra_fields());
        fields
    }

    fn set_field(&mut self, key: &str, value: Value) -> Result<(), EngineError> {
        match key {
            "scenes" => {
                let slots = slots_from(&value)?;
                self.state.replace_subscribed(&mut self.scenes, slots)?;
            }
            "popCount" => {
                let pop_count = pop_count_from(&value)?;
                let queue = self.control.push_queue().to_vec();
                self.control.set_pending(pop_count, queue);
            }
            "pushQueue" => {
                let queue = classes_from(&value)?;
                let pop_count = self.control.pop_count();
                self.control.set_pending(pop_count, queue);
            }
            DIRTY_FIELD => return set_dirty_field(&*self, &value),
            _ => self.state.set_extra(key, value),
        }
        Ok(())
    }

    fn dirty_flag(&self) -> Option<&DirtyFlag> {
        Some(self.state.flag())
    }
}

impl StateObject for SceneStack {
    fn state(&self) -> &StateCore {
        &self.state
    }

    fn state_mut(&mut self) -> &mut StateCore {
        &mut self.state
    }
}

#[cfg(test)]
mod tests {
    use vellum_serde::OBJECT;

    use super::*;
    use crate::builtin::{SCENE, SPLASH, TITLE};

    #[test]
    fn test_splash_hands_over_to_title_which_leaves() {
        // Arrange
        let mut stack = SceneStack::new();
        stack.push(&[&SPLASH]);

        // Act & Assert
        stack.update().unwrap();
        assert_eq!(stack.len(), 1);
        assert_eq!(stack.top().unwrap().class(), &SPLASH);
        assert_eq!(stack.pop_count(), 1);
        assert_eq!(stack.push_queue(), [&TITLE]);

        stack.update().unwrap();
        assert_eq!(stack.len(), 1);
        assert_eq!(stack.top().unwrap().class(), &TITLE);
        assert_eq!(stack.pop_count(), 1);
        assert!(stack.push_queue().is_empty());

        stack.update().unwrap();
        assert!(stack.is_empty());
        assert_eq!(stack.pop_count(), 0);
    }

    #[test]
    fn test_push_then_pop_cancels_without_touching_the_stack() {
        let mut stack = SceneStack::new();

        stack.push(&[&SCENE]);
        stack.pop(1);
        stack.update().unwrap();

        assert!(stack.is_empty());
        assert_eq!(stack.pop_count(), 0);
    }

    #[test]
    fn test_non_scene_class_fails_update_and_keeps_queue() {
        // Arrange
        let mut stack = SceneStack::new();
        stack.push(&[&SCENE, &OBJECT]);

        // Act
        let result = stack.update();

        // Assert
        assert!(matches!(result, Err(EngineError::Type(_))));
        assert!(stack.is_empty());
        assert_eq!(stack.push_queue(), [&SCENE, &OBJECT]);
    }

    #[test]
    fn test_pop_to_unknown_class_fails() {
        let mut stack = SceneStack::new();
        stack.push(&[&SCENE]);
        stack.update().unwrap();

        let result = stack.pop_to(&TITLE, false);

        assert!(matches!(result, Err(EngineError::InvalidOperation(_))));
    }

    #[test]
    fn test_pop_on_empty_stack_is_dropped_by_update() {
        let mut stack = SceneStack::new();
        stack.pop(2);

        stack.update().unwrap();

        assert_eq!(stack.pop_count(), 0);
    }

    #[test]
    fn test_pushed_scenes_subscribe_the_stack() {
        // Arrange
        let mut stack = SceneStack::new();
        stack.push(&[&SCENE]);
        stack.update().unwrap();
        stack.set_dirty(false).unwrap();
        let top = stack.top().unwrap().clone();

        // Act
        top.borrow_mut()
            .set_field("note", Value::from("touched"))
            .unwrap();

        // Assert
        assert!(stack.is_dirty());
    }

    #[test]
    fn test_dirty_field_write_cleans_without_adding_a_field() {
        // Arrange
        let stack = ObjectRef::new(SceneStack::new());
        stack.dirty_flag().unwrap().mark();

        // Act
        stack
            .borrow_mut()
            .set_field("dirty", Value::Bool(false))
            .unwrap();

        // Assert
        assert!(!stack.dirty_flag().unwrap().is_dirty());
        let keys: Vec<String> = stack.borrow().fields().into_iter().map(|(k, _)| k).collect();
        assert_eq!(keys, ["scenes", "popCount", "pushQueue"]);
    }

    #[test]
    fn test_scene_dirty_field_write_reaches_the_stack() {
        // Arrange
        let mut stack = SceneStack::new();
        stack.push(&[&SCENE]);
        stack.update().unwrap();
        stack.set_dirty(false).unwrap();
        let top = stack.top().unwrap().clone();

        // Act
        top.borrow_mut()
            .set_field("dirty", Value::Bool(true))
            .unwrap();

        // Assert
        assert!(stack.is_dirty());
        assert_eq!(top.borrow().fields().len(), 1);
    }

    #[test]
    fn test_clean_stack_cleans_its_scenes() {
        let mut stack = SceneStack::new();
        stack.push(&[&SCENE, &SCENE]);
        stack.update().unwrap();

        stack.set_dirty(false).unwrap();

        for scene in stack.scenes() {
            assert!(!scene.dirty_flag().unwrap().is_dirty());
        }
    }
}
