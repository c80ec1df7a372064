//! Reactive cell holding a single value

use super::same_value::SameValue;
use super::tracking::{self, Subscriber, SubscriberSet};
use crate::subscription::Subscription;
use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

struct SignalInner<T> {
    value: RefCell<T>,
    subscribers: RefCell<SubscriberSet>,
}

/// A single observable value.
///
/// Cloning a `Signal` yields another handle to the same cell.
pub struct Signal<T>(Rc<SignalInner<T>>);

impl<T> Clone for Signal<T> {
    fn clone(&self) -> Self {
        Self(Rc::clone(&self.0))
    }
}

impl<T: SameValue + Clone + 'static> Signal<T> {
    pub fn new(value: T) -> Self {
        Self(Rc::new(SignalInner {
            value: RefCell::new(value),
            subscribers: RefCell::new(SubscriberSet::new()),
        }))
    }

    /// Current value; subscribes the active tracking context, if any
    pub fn get(&self) -> T {
        tracking::track(&self.0.subscribers);
        self.0.value.borrow().clone()
    }

    /// Current value without subscribing anything
    pub fn peek(&self) -> T {
        self.0.value.borrow().clone()
    }

    /// Borrow the value for the duration of `f`; tracks like [`Signal::get`]
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        tracking::track(&self.0.subscribers);
        f(&self.0.value.borrow())
    }

    /// Store `value` and notify subscribers unless it is the same value.
    ///
    /// Returns whether the value changed. Subscriber failures are logged and
    /// do not prevent the remaining subscribers from running.
    pub fn set(&self, value: T) -> bool {
        {
            let mut current = self.0.value.borrow_mut();
            if current.same_value(&value) {
                return false;
            }
            *current = value;
        }
        let subscribers = self.0.subscribers.borrow_mut().snapshot();
        tracking::notify_all(subscribers, "signal");
        true
    }

    /// Compute a new value from the current one and [`set`](Signal::set) it
    pub fn update(&self, f: impl FnOnce(&T) -> T) -> bool {
        let next = f(&self.0.value.borrow());
        self.set(next)
    }

    /// Register `callback` to run after every change
    pub fn subscribe(&self, callback: impl Fn() -> anyhow::Result<()> + 'static) -> Subscription {
        let subscriber = Subscriber::new("signal.subscribe", callback);
        self.0.subscribers.borrow_mut().insert(subscriber.clone());

        let cell = Rc::downgrade(&self.0);
        Subscription::new(move || {
            subscriber.deactivate();
            if let Some(cell) = cell.upgrade() {
                cell.subscribers.borrow_mut().remove(&subscriber);
            }
        })
    }

    /// Non-owning handle, for callbacks stored inside the cell itself
    pub fn downgrade(&self) -> WeakSignal<T> {
        WeakSignal(Rc::downgrade(&self.0))
    }

    /// Number of live subscribers
    pub fn subscriber_count(&self) -> usize {
        self.0.subscribers.borrow().len()
    }

    /// Drop every subscriber
    pub fn clear_subscribers(&self) {
        self.0.subscribers.borrow_mut().clear();
    }
}

/// Weak counterpart of [`Signal`]
pub struct WeakSignal<T>(Weak<SignalInner<T>>);

impl<T> Clone for WeakSignal<T> {
    fn clone(&self) -> Self {
        Self(Weak::clone(&self.0))
    }
}

impl<T> WeakSignal<T> {
    pub fn upgrade(&self) -> Option<Signal<T>> {
        self.0.upgrade().map(Signal)
    }
}

impl<T: fmt::Debug> fmt::Debug for Signal<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Signal")
            .field("value", &*self.0.value.borrow())
            .field("subscribers", &self.0.subscribers.borrow().len())
            .finish()
    }
}
