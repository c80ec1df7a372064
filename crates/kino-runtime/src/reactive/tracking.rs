//! Ambient dependency tracking
//!
//! While a derivation or effect runs, it is installed as the *active
//! subscriber* of the current thread. Every cell read during that run adds the
//! active subscriber to its own subscriber set. Installation is stack-scoped:
//! [`enter`] returns a guard that restores the previous subscriber when it is
//! dropped, including on early return and unwinding, so reads in a nested run
//! never leak into the outer one.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

thread_local! {
    static ACTIVE: RefCell<Option<Subscriber>> = const { RefCell::new(None) };
}

type Callback = Box<dyn Fn() -> anyhow::Result<()>>;

struct SubscriberInner {
    label: &'static str,
    active: Cell<bool>,
    callback: Callback,
}

/// A callback that cells notify on change.
///
/// Subscribers compare by identity, so a subscriber set never holds the same
/// subscriber twice no matter how often it reads a cell.
#[derive(Clone)]
pub struct Subscriber(Rc<SubscriberInner>);

impl Subscriber {
    pub fn new(label: &'static str, callback: impl Fn() -> anyhow::Result<()> + 'static) -> Self {
        Self(Rc::new(SubscriberInner {
            label,
            active: Cell::new(true),
            callback: Box::new(callback),
        }))
    }

    /// Build a subscriber whose callback needs a handle to itself
    pub fn new_cyclic<F>(label: &'static str, make: impl FnOnce(WeakSubscriber) -> F) -> Self
    where
        F: Fn() -> anyhow::Result<()> + 'static,
    {
        Self(Rc::new_cyclic(|weak| SubscriberInner {
            label,
            active: Cell::new(true),
            callback: Box::new(make(WeakSubscriber(weak.clone()))),
        }))
    }

    /// Run the callback. Inactive subscribers do nothing.
    pub fn notify(&self) -> anyhow::Result<()> {
        if !self.0.active.get() {
            return Ok(());
        }
        (self.0.callback)()
    }

    pub fn label(&self) -> &'static str {
        self.0.label
    }

    pub fn is_active(&self) -> bool {
        self.0.active.get()
    }

    /// Stop future notifications; cells drop the subscriber on their next pass
    pub fn deactivate(&self) {
        self.0.active.set(false);
    }

    pub fn ptr_eq(&self, other: &Subscriber) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for Subscriber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscriber")
            .field("label", &self.0.label)
            .field("active", &self.0.active.get())
            .finish()
    }
}

/// Non-owning subscriber reference handed to self-referencing callbacks
#[derive(Clone)]
pub struct WeakSubscriber(std::rc::Weak<SubscriberInner>);

impl WeakSubscriber {
    pub fn upgrade(&self) -> Option<Subscriber> {
        self.0.upgrade().map(Subscriber)
    }
}

/// Insertion-ordered set of subscribers keyed by identity
#[derive(Default)]
pub struct SubscriberSet {
    entries: Vec<Subscriber>,
}

impl SubscriberSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a subscriber; returns false if it was already present
    pub fn insert(&mut self, subscriber: Subscriber) -> bool {
        if self.entries.iter().any(|s| s.ptr_eq(&subscriber)) {
            return false;
        }
        self.entries.push(subscriber);
        true
    }

    pub fn remove(&mut self, subscriber: &Subscriber) {
        self.entries.retain(|s| !s.ptr_eq(subscriber));
    }

    /// Prune inactive entries and return a copy for notification
    pub fn snapshot(&mut self) -> Vec<Subscriber> {
        self.entries.retain(Subscriber::is_active);
        self.entries.clone()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.iter().filter(|s| s.is_active()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Restores the previously active subscriber on drop
#[must_use = "the subscriber is uninstalled as soon as the guard is dropped"]
pub struct TrackingGuard {
    previous: Option<Subscriber>,
}

impl Drop for TrackingGuard {
    fn drop(&mut self) {
        let previous = self.previous.take();
        ACTIVE.with(|active| *active.borrow_mut() = previous);
    }
}

/// Install `subscriber` as the active subscriber until the guard drops
pub fn enter(subscriber: Option<Subscriber>) -> TrackingGuard {
    let previous = ACTIVE.with(|active| std::mem::replace(&mut *active.borrow_mut(), subscriber));
    TrackingGuard { previous }
}

/// The subscriber currently collecting dependencies, if any
pub fn current() -> Option<Subscriber> {
    ACTIVE.with(|active| active.borrow().clone())
}

/// Subscribe the active subscriber (if any) to `set`
pub(crate) fn track(set: &RefCell<SubscriberSet>) {
    if let Some(subscriber) = current() {
        set.borrow_mut().insert(subscriber);
    }
}

/// Run `f` with tracking suspended; reads inside do not subscribe anything
pub fn untracked<T>(f: impl FnOnce() -> T) -> T {
    let _guard = enter(None);
    f()
}

/// Notify every subscriber in `subscribers`, logging failures without stopping
pub(crate) fn notify_all(subscribers: Vec<Subscriber>, origin: &'static str) {
    for subscriber in subscribers {
        if let Err(e) = subscriber.notify() {
            tracing::error!(
                origin,
                subscriber = subscriber.label(),
                error = %e,
                "Reactive subscriber failed"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_guard_restores_previous() {
        let outer = Subscriber::new("outer", || Ok(()));
        let inner = Subscriber::new("inner", || Ok(()));

        let _outer_guard = enter(Some(outer.clone()));
        {
            let _inner_guard = enter(Some(inner.clone()));
            assert!(current().is_some_and(|s| s.ptr_eq(&inner)));
        }
        assert!(current().is_some_and(|s| s.ptr_eq(&outer)));
    }

    #[test]
    fn test_untracked_hides_active() {
        let sub = Subscriber::new("effect", || Ok(()));
        let _guard = enter(Some(sub));
        assert!(untracked(current).is_none());
        assert!(current().is_some());
    }

    #[test]
    fn test_set_is_identity_keyed() {
        let sub = Subscriber::new("effect", || Ok(()));
        let mut set = SubscriberSet::new();
        assert!(set.insert(sub.clone()));
        assert!(!set.insert(sub.clone()));
        assert_eq!(set.len(), 1);

        sub.deactivate();
        assert!(set.snapshot().is_empty());
    }
}
