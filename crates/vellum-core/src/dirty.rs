//! Dirty flags with reference-counted, weak subscriptions.
//!
//! A [`DirtyFlag`] is the shared cell behind every state object's `dirty`
//! bit. Dirtying flows outward: when a flag goes from clean to dirty, every
//! live subscriber is dirtied too, transitively. Subscriptions are keyed by
//! identity and hold the subscriber weakly, so dropping an object never
//! requires explicit teardown.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::ptr;
use std::rc::{Rc, Weak};

use crate::error::EngineError;

#[derive(Default)]
struct FlagCell {
    dirty: Cell<bool>,
    subscribers: RefCell<Vec<Subscription>>,
}

struct Subscription {
    subscriber: Weak<FlagCell>,
    count: usize,
}

impl Subscription {
    fn is(&self, cell: &Rc<FlagCell>) -> bool {
        ptr::eq(self.subscriber.as_ptr(), Rc::as_ptr(cell))
    }
}

/// Shared handle to a dirty bit and its subscriber set.
///
/// Cloning the handle shares the same bit.
#[derive(Clone, Default)]
pub struct DirtyFlag(Rc<FlagCell>);

impl DirtyFlag {
    /// Creates a clean flag with no subscribers.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the current value of the bit.
    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.0.dirty.get()
    }

    /// Sets the bit and returns whether it changed.
    ///
    /// On a clean to dirty transition every live subscriber is dirtied as
    /// well. Clearing does not touch subscribers; clean propagation to owned
    /// children is the owning object's concern.
    pub fn set(&self, dirty: bool) -> bool {
        if self.0.dirty.replace(dirty) == dirty {
            return false;
        }
        if dirty {
            for subscriber in self.live_subscribers() {
                DirtyFlag(subscriber).set(true);
            }
        }
        true
    }

    /// Shorthand for `set(true)`.
    pub fn mark(&self) {
        self.set(true);
    }

    /// Registers `subscriber` to be dirtied whenever this flag becomes dirty.
    ///
    /// Subscribing the same flag again increments its subscription count.
    pub fn subscribe(&self, subscriber: &DirtyFlag) {
        let mut subscribers = self.0.subscribers.borrow_mut();
        prune(&mut subscribers);
        if let Some(existing) = subscribers.iter_mut().find(|s| s.is(&subscriber.0)) {
            existing.count += 1;
        } else {
            subscribers.push(Subscription {
                subscriber: Rc::downgrade(&subscriber.0),
                count: 1,
            });
        }
    }

    /// Drops one subscription of `subscriber`. The subscriber stops being
    /// notified once its count reaches zero.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::InvalidOperation` if `subscriber` has no
    /// outstanding subscription.
    pub fn unsubscribe(&self, subscriber: &DirtyFlag) -> Result<(), EngineError> {
        let mut subscribers = self.0.subscribers.borrow_mut();
        prune(&mut subscribers);
        let index = subscribers
            .iter()
            .position(|s| s.is(&subscriber.0))
            .ok_or_else(|| {
                EngineError::InvalidOperation(
                    "unsubscribe_dirty called without a matching subscription".to_owned(),
                )
            })?;
        subscribers[index].count -= 1;
        if subscribers[index].count == 0 {
            subscribers.remove(index);
        }
        Ok(())
    }

    /// Returns how many outstanding subscriptions `subscriber` holds.
    #[must_use]
    pub fn subscription_count(&self, subscriber: &DirtyFlag) -> usize {
        self.0
            .subscribers
            .borrow()
            .iter()
            .find(|s| s.is(&subscriber.0) && s.subscriber.strong_count() > 0)
            .map_or(0, |s| s.count)
    }

    /// Returns the number of distinct live subscribers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.0
            .subscribers
            .borrow()
            .iter()
            .filter(|s| s.subscriber.strong_count() > 0)
            .count()
    }

    /// Returns whether both handles share the same bit.
    #[must_use]
    pub fn ptr_eq(&self, other: &DirtyFlag) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    fn live_subscribers(&self) -> Vec<Rc<FlagCell>> {
        let mut subscribers = self.0.subscribers.borrow_mut();
        prune(&mut subscribers);
        subscribers
            .iter()
            .filter_map(|s| s.subscriber.upgrade())
            .collect()
    }
}

fn prune(subscribers: &mut Vec<Subscription>) {
    subscribers.retain(|s| s.subscriber.strong_count() > 0);
}

impl fmt::Debug for DirtyFlag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DirtyFlag")
            .field("dirty", &self.is_dirty())
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dirtying_propagates_through_subscription_chain() {
        // Arrange
        let a = DirtyFlag::new();
        let b = DirtyFlag::new();
        let c = DirtyFlag::new();
        a.subscribe(&b);
        b.subscribe(&c);

        // Act
        a.mark();

        // Assert
        assert!(a.is_dirty());
        assert!(b.is_dirty());
        assert!(c.is_dirty());
    }

    #[test]
    fn test_clearing_does_not_touch_subscribers() {
        let a = DirtyFlag::new();
        let b = DirtyFlag::new();
        a.subscribe(&b);
        a.mark();

        assert!(a.set(false));

        assert!(!a.is_dirty());
        assert!(b.is_dirty());
    }

    #[test]
    fn test_set_reports_transitions_only() {
        let flag = DirtyFlag::new();

        assert!(!flag.set(false));
        assert!(flag.set(true));
        assert!(!flag.set(true));
        assert!(flag.set(false));
    }

    #[test]
    fn test_cyclic_subscriptions_terminate() {
        let a = DirtyFlag::new();
        let b = DirtyFlag::new();
        a.subscribe(&b);
        b.subscribe(&a);

        b.mark();

        assert!(a.is_dirty());
        assert!(b.is_dirty());
    }

    #[test]
    fn test_subscriptions_are_reference_counted() {
        // Arrange
        let source = DirtyFlag::new();
        let subscriber = DirtyFlag::new();
        source.subscribe(&subscriber);
        source.subscribe(&subscriber);

        // Act
        source.unsubscribe(&subscriber).unwrap();

        // Assert
        assert_eq!(source.subscription_count(&subscriber), 1);
        source.mark();
        assert!(subscriber.is_dirty());

        subscriber.set(false);
        source.set(false);
        source.unsubscribe(&subscriber).unwrap();
        source.mark();
        assert!(!subscriber.is_dirty());

        let result = source.unsubscribe(&subscriber);
        assert!(matches!(result, Err(EngineError::InvalidOperation(_))));
    }

    #[test]
    fn test_dropped_subscribers_are_pruned() {
        let source = DirtyFlag::new();
        {
            let transient = DirtyFlag::new();
            source.subscribe(&transient);
            assert_eq!(source.subscriber_count(), 1);
        }

        source.mark();

        assert_eq!(source.subscriber_count(), 0);
    }

    #[test]
    fn test_clones_share_the_bit() {
        let flag = DirtyFlag::new();
        let alias = flag.clone();

        alias.mark();

        assert!(flag.is_dirty());
        assert!(flag.ptr_eq(&alias));
    }
}
