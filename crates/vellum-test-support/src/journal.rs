//! Per-thread record of scene hook calls, in call order.

use std::cell::RefCell;

thread_local! {
    static ENTRIES: RefCell<Vec<String>> = const { RefCell::new(Vec::new()) };
}

/// Appends an entry such as `"Probe.start"`.
pub fn record(entry: impl Into<String>) {
    let entry = entry.into();
    ENTRIES.with(|entries| entries.borrow_mut().push(entry));
}

/// Returns and clears everything recorded on this thread so far.
#[must_use]
pub fn take() -> Vec<String> {
    ENTRIES.with(|entries| std::mem::take(&mut *entries.borrow_mut()))
}

/// Discards everything recorded on this thread.
pub fn clear() {
    ENTRIES.with(|entries| entries.borrow_mut().clear());
}
