//! Callback registry
//!
//! User callbacks are not `Send`; they stay on the callback thread in this
//! registry. A Baton only carries the [`CallbackHandle`] token, which can be
//! redeemed exactly once.

use serde_json::Value;
use std::collections::HashMap;

/// A user callback: `(error, result)`, `error` is `None` on success
pub type Callback = Box<dyn FnOnce(Option<Value>, Value)>;

/// Registry key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CallbackId(u64);

/// Capability token for one stored callback.
///
/// Not `Clone`: redeeming or releasing consumes it.
#[derive(Debug, PartialEq, Eq)]
#[must_use = "a callback handle must be redeemed or released"]
pub struct CallbackHandle {
    id: CallbackId,
}

impl CallbackHandle {
    pub fn id(&self) -> CallbackId {
        self.id
    }
}

/// Callbacks owned by one event loop
#[derive(Default)]
pub struct CallbackRegistry {
    next_id: u64,
    callbacks: HashMap<CallbackId, Callback>,
}

impl CallbackRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take ownership of `callback` and hand back its token
    pub fn store(&mut self, callback: Callback) -> CallbackHandle {
        self.next_id += 1;
        let id = CallbackId(self.next_id);
        self.callbacks.insert(id, callback);
        CallbackHandle { id }
    }

    /// Remove the callback so it can be invoked
    pub fn redeem(&mut self, handle: CallbackHandle) -> Option<Callback> {
        self.callbacks.remove(&handle.id)
    }

    /// Drop the callback without invoking it
    pub fn release(&mut self, handle: CallbackHandle) -> bool {
        self.callbacks.remove(&handle.id).is_some()
    }

    /// Callbacks stored and not yet redeemed
    pub fn len(&self) -> usize {
        self.callbacks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.callbacks.is_empty()
    }
}

impl std::fmt::Debug for CallbackRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallbackRegistry")
            .field("stored", &self.callbacks.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;

    #[test]
    fn test_redeem_once() {
        let mut registry = CallbackRegistry::new();
        let calls = Rc::new(Cell::new(0));
        let c = Rc::clone(&calls);
        let handle = registry.store(Box::new(move |_, _| c.set(c.get() + 1)));
        assert_eq!(registry.len(), 1);

        let callback = registry.redeem(handle).unwrap();
        callback(None, Value::Null);

        assert_eq!(calls.get(), 1);
        assert!(registry.is_empty());
    }

    #[test]
    fn test_release_drops_callback() {
        let mut registry = CallbackRegistry::new();
        let token = Rc::new(());
        let held = Rc::clone(&token);
        let handle = registry.store(Box::new(move |_, _| drop(held)));
        assert_eq!(Rc::strong_count(&token), 2);

        assert!(registry.release(handle));
        assert_eq!(Rc::strong_count(&token), 1);
    }

    #[test]
    fn test_handles_are_distinct() {
        let mut registry = CallbackRegistry::new();
        let a = registry.store(Box::new(|_, _| {}));
        let b = registry.store(Box::new(|_, _| {}));
        assert_ne!(a.id(), b.id());
        assert!(registry.release(a));
        assert!(registry.release(b));
    }
}
