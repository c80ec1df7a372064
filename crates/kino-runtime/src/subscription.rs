//! Unsubscribe handles shared by cells, the state store, and the event bus

use std::cell::RefCell;
use std::fmt;

/// Handle returned by every subscribe-style call.
///
/// Calling [`Subscription::unsubscribe`] detaches the callback. The call is
/// idempotent: only the first invocation has an effect. Dropping the handle
/// does *not* unsubscribe; listeners stay registered until explicitly removed
/// or until their owner is torn down.
pub struct Subscription {
    release: RefCell<Option<Box<dyn FnOnce()>>>,
}

impl Subscription {
    /// Wrap a release closure
    pub fn new(release: impl FnOnce() + 'static) -> Self {
        Self {
            release: RefCell::new(Some(Box::new(release))),
        }
    }

    /// A handle with nothing to release
    pub fn empty() -> Self {
        Self {
            release: RefCell::new(None),
        }
    }

    /// Detach the callback. Later calls are no-ops.
    pub fn unsubscribe(&self) {
        let release = self.release.borrow_mut().take();
        if let Some(release) = release {
            release();
        }
    }

    /// Whether the callback is still attached through this handle
    pub fn is_active(&self) -> bool {
        self.release.borrow().is_some()
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.is_active())
            .finish()
    }
}
