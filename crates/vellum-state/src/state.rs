//! The dirty-tracking base every persistent state object is built on.

use std::collections::HashSet;

use indexmap::IndexMap;
use tracing::trace;
use vellum_core::dirty::DirtyFlag;
use vellum_core::error::EngineError;
use vellum_serde::{ObjectRef, Serializable, Value, type_mismatch};

/// The field name that addresses an object's dirty bit.
pub const DIRTY_FIELD: &str = "dirty";

/// Which containers clean propagation descends into.
///
/// Child state objects held directly in a field are always cleaned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CleanTraversal {
    /// Clean state objects held in arrays.
    pub sequences: bool,
    /// Clean state objects held inside plain records.
    pub records: bool,
}

impl Default for CleanTraversal {
    fn default() -> Self {
        Self {
            sequences: true,
            records: false,
        }
    }
}

/// Shared state carried by every state object: the dirty flag and the
/// side-map of fields the concrete type does not know.
#[derive(Debug, Default)]
pub struct StateCore {
    flag: DirtyFlag,
    extras: IndexMap<String, Value>,
}

impl StateCore {
    /// Creates a clean core with no extra fields.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The object's dirty flag.
    #[must_use]
    pub fn flag(&self) -> &DirtyFlag {
        &self.flag
    }

    /// Whether the object changed since it was last cleaned.
    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.flag.is_dirty()
    }

    /// Marks the object dirty, notifying subscribers on a transition.
    pub fn mark_dirty(&self) {
        self.flag.mark();
    }

    /// Reads an extra field.
    #[must_use]
    pub fn extra(&self, key: &str) -> Option<&Value> {
        self.extras.get(key)
    }

    /// Writes an extra field.
    pub fn set_extra(&mut self, key: &str, value: Value) {
        self.extras.insert(key.to_owned(), value);
        self.mark_dirty();
    }

    /// Removes an extra field, returning it.
    pub fn remove_extra(&mut self, key: &str) -> Option<Value> {
        let removed = self.extras.shift_remove(key);
        self.mark_dirty();
        removed
    }

    /// Extra fields in insertion order, for [`Serializable::fields`].
    #[must_use]
    pub fn extra_fields(&self) -> Vec<(String, Value)> {
        self.extras
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    /// Replaces an auto-subscribing field.
    ///
    /// `value` subscribes this object before the previous value drops its
    /// subscription, so reassigning the same child keeps its count
    /// unchanged. Returns the previous value.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::InvalidOperation` if the previous value was not
    /// subscribed to this object; the field is left unchanged.
    pub fn replace_subscribed<T: DirtySource>(
        &self,
        slot: &mut T,
        value: T,
    ) -> Result<T, EngineError> {
        value.subscribe(&self.flag);
        if let Err(error) = slot.unsubscribe(&self.flag) {
            // Roll back the new subscription.
            let _ = value.unsubscribe(&self.flag);
            return Err(error);
        }
        let previous = std::mem::replace(slot, value);
        self.mark_dirty();
        Ok(previous)
    }
}

/// A field value whose state objects can subscribe an owner.
pub trait DirtySource {
    /// Subscribes `owner` to every state object in the value.
    fn subscribe(&self, owner: &DirtyFlag);

    /// Drops one subscription of `owner` from every state object in the value.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::InvalidOperation` if a state object held no
    /// subscription for `owner`.
    fn unsubscribe(&self, owner: &DirtyFlag) -> Result<(), EngineError>;
}

impl DirtySource for ObjectRef {
    fn subscribe(&self, owner: &DirtyFlag) {
        if let Some(flag) = self.dirty_flag() {
            flag.subscribe(owner);
        }
    }

    fn unsubscribe(&self, owner: &DirtyFlag) -> Result<(), EngineError> {
        match self.dirty_flag() {
            Some(flag) => flag.unsubscribe(owner),
            None => Ok(()),
        }
    }
}

impl<T: DirtySource> DirtySource for Option<T> {
    fn subscribe(&self, owner: &DirtyFlag) {
        if let Some(inner) = self {
            inner.subscribe(owner);
        }
    }

    fn unsubscribe(&self, owner: &DirtyFlag) -> Result<(), EngineError> {
        self.as_ref().map_or(Ok(()), |inner| inner.unsubscribe(owner))
    }
}

impl<T: DirtySource> DirtySource for Vec<T> {
    fn subscribe(&self, owner: &DirtyFlag) {
        for item in self {
            item.subscribe(owner);
        }
    }

    fn unsubscribe(&self, owner: &DirtyFlag) -> Result<(), EngineError> {
        self.iter().try_for_each(|item| item.unsubscribe(owner))
    }
}

/// A persistent, dirty-tracked object.
///
/// Dirtying flows up to subscribers; cleaning flows down to the child state
/// objects this object holds.
pub trait StateObject: Serializable {
    /// The shared state core.
    fn state(&self) -> &StateCore;

    /// The shared state core, mutably.
    fn state_mut(&mut self) -> &mut StateCore;

    /// Whether the object changed since it was last cleaned.
    fn is_dirty(&self) -> bool {
        self.state().is_dirty()
    }

    /// Sets the dirty bit with the default [`CleanTraversal`].
    ///
    /// # Errors
    ///
    /// See [`StateObject::set_dirty_with`].
    fn set_dirty(&self, dirty: bool) -> Result<(), EngineError> {
        self.set_dirty_with(dirty, CleanTraversal::default())
    }

    /// Sets the dirty bit.
    ///
    /// Dirtying marks every subscriber dirty. Cleaning clears child state
    /// objects reachable through this object's fields, as far as
    /// `traversal` allows. Either only happens when the bit changes.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::InvalidOperation` if a child that needs
    /// cleaning is mutably borrowed.
    fn set_dirty_with(&self, dirty: bool, traversal: CleanTraversal) -> Result<(), EngineError> {
        if self.state().flag().set(dirty) && !dirty {
            propagate_clean(self, traversal)?;
        }
        Ok(())
    }

    /// Subscribes `subscriber` to this object's dirty transitions.
    fn subscribe_dirty(&self, subscriber: &DirtyFlag) {
        self.state().flag().subscribe(subscriber);
    }

    /// Drops one subscription of `subscriber`.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::InvalidOperation` if `subscriber` has no
    /// outstanding subscription.
    fn unsubscribe_dirty(&self, subscriber: &DirtyFlag) -> Result<(), EngineError> {
        self.state().flag().unsubscribe(subscriber)
    }
}

/// Applies a dynamic write of [`DIRTY_FIELD`] to `object`'s own flag.
///
/// The value is never stored as a field and the write does not dirty the
/// object by itself: `true` marks it and its subscribers, `false` cleans it
/// and its children.
///
/// # Errors
///
/// Returns `EngineError::Type` for a non-boolean value, or whatever
/// [`StateObject::set_dirty`] returns.
pub fn set_dirty_field<T: StateObject + ?Sized>(object: &T, value: &Value) -> Result<(), EngineError> {
    match value {
        Value::Bool(dirty) => object.set_dirty(*dirty),
        other => Err(type_mismatch(object.class(), DIRTY_FIELD, "a boolean", other)),
    }
}

/// Clears the dirty bit of every child state object reachable from
/// `root`'s fields, descending further only through children that were
/// actually dirty.
///
/// # Errors
///
/// Returns `EngineError::InvalidOperation` if a child that needs cleaning is
/// mutably borrowed.
pub fn propagate_clean<T: Serializable + ?Sized>(
    root: &T,
    traversal: CleanTraversal,
) -> Result<(), EngineError> {
    let mut pending: Vec<Value> = root.fields().into_iter().map(|(_, v)| v).collect();
    let mut visited = HashSet::new();
    while let Some(value) = pending.pop() {
        match value {
            Value::Object(object) => match object.dirty_flag() {
                Some(flag) => {
                    if flag.set(false) {
                        trace!(class = object.class().name(), "cleaned child");
                        pending.extend(field_values(&object)?);
                    }
                }
                None if traversal.records && visited.insert(object.addr()) => {
                    pending.extend(field_values(&object)?);
                }
                None => {}
            },
            Value::Array(array) if traversal.sequences && visited.insert(array.addr()) => {
                pending.extend(array.to_vec());
            }
            _ => {}
        }
    }
    Ok(())
}

fn field_values(object: &ObjectRef) -> Result<Vec<Value>, EngineError> {
    Ok(object
        .try_borrow()?
        .fields()
        .into_iter()
        .map(|(_, v)| v)
        .collect())
}
