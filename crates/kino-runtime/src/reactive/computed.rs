//! Lazily recomputed derivations

use super::tracking::{self, Subscriber, SubscriberSet};
use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

struct ComputedInner<T> {
    compute: Box<dyn Fn() -> T>,
    cached: RefCell<Option<T>>,
    dirty: Cell<bool>,
    subscribers: RefCell<SubscriberSet>,
    invalidator: Subscriber,
}

impl<T> ComputedInner<T> {
    /// Mark dirty and tell dependents, even when already dirty
    fn invalidate(&self) {
        self.dirty.set(true);
        let subscribers = self.subscribers.borrow_mut().snapshot();
        tracking::notify_all(subscribers, "computed");
    }
}

impl<T> Drop for ComputedInner<T> {
    fn drop(&mut self) {
        self.invalidator.deactivate();
    }
}

/// A cached value derived from cells and other derivations.
///
/// The cache is only valid while clean. Any upstream change marks it dirty;
/// recomputation happens on the next read, never eagerly.
pub struct Computed<T>(Rc<ComputedInner<T>>);

impl<T> Clone for Computed<T> {
    fn clone(&self) -> Self {
        Self(Rc::clone(&self.0))
    }
}

impl<T: Clone + 'static> Computed<T> {
    pub fn new(compute: impl Fn() -> T + 'static) -> Self {
        let inner = Rc::new_cyclic(|weak: &std::rc::Weak<ComputedInner<T>>| {
            let weak = weak.clone();
            let invalidator = Subscriber::new("computed.invalidate", move || {
                if let Some(inner) = weak.upgrade() {
                    inner.invalidate();
                }
                Ok(())
            });
            ComputedInner {
                compute: Box::new(compute),
                cached: RefCell::new(None),
                dirty: Cell::new(true),
                subscribers: RefCell::new(SubscriberSet::new()),
                invalidator,
            }
        });
        Self(inner)
    }

    /// Current value, recomputing first if dirty.
    ///
    /// Afterwards the active tracking context (if any) is subscribed to this
    /// derivation, the same way [`Signal::get`](super::Signal::get) does.
    pub fn get(&self) -> T {
        let value = match self.clean_value() {
            Some(value) => value,
            None => self.recompute(),
        };
        tracking::track(&self.0.subscribers);
        value
    }

    /// Whether the next read will recompute
    pub fn is_dirty(&self) -> bool {
        self.0.dirty.get()
    }

    /// Number of live dependents
    pub fn subscriber_count(&self) -> usize {
        self.0.subscribers.borrow().len()
    }

    fn clean_value(&self) -> Option<T> {
        if self.0.dirty.get() {
            return None;
        }
        self.0.cached.borrow().clone()
    }

    fn recompute(&self) -> T {
        let value = {
            let _guard = tracking::enter(Some(self.0.invalidator.clone()));
            (self.0.compute)()
        };
        *self.0.cached.borrow_mut() = Some(value.clone());
        self.0.dirty.set(false);
        value
    }
}

impl<T: fmt::Debug> fmt::Debug for Computed<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Computed")
            .field("cached", &*self.0.cached.borrow())
            .field("dirty", &self.0.dirty.get())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::Signal;

    fn counted<T: Clone + 'static>(
        calls: &Rc<Cell<usize>>,
        f: impl Fn() -> T + 'static,
    ) -> Computed<T> {
        let calls = calls.clone();
        Computed::new(move || {
            calls.set(calls.get() + 1);
            f()
        })
    }

    #[test]
    fn test_lazy_until_read() {
        let source = Signal::new(2);
        let calls = Rc::new(Cell::new(0));
        let s = source.clone();
        let doubled = counted(&calls, move || s.get() * 2);

        assert_eq!(calls.get(), 0);
        assert_eq!(doubled.get(), 4);
        assert_eq!(doubled.get(), 4);
        assert_eq!(calls.get(), 1);

        source.set(5);
        assert!(doubled.is_dirty());
        assert_eq!(calls.get(), 1);
        assert_eq!(doubled.get(), 10);
        assert_eq!(calls.get(), 2);
    }

    #[test]
    fn test_chain_recomputes_each_link_once() {
        let a = Signal::new(1);
        let b_calls = Rc::new(Cell::new(0));
        let c_calls = Rc::new(Cell::new(0));

        let a_for_b = a.clone();
        let b = counted(&b_calls, move || a_for_b.get() + 1);
        let b_for_c = b.clone();
        let c = counted(&c_calls, move || b_for_c.get() * 10);

        assert_eq!(c.get(), 20);
        assert_eq!((b_calls.get(), c_calls.get()), (1, 1));

        a.set(2);
        let _ = a.peek();
        let _ = a.get();
        a.set(3);

        assert_eq!(c.get(), 40);
        assert_eq!((b_calls.get(), c_calls.get()), (2, 2));
        assert_eq!(c.get(), 40);
        assert_eq!((b_calls.get(), c_calls.get()), (2, 2));
    }

    #[test]
    fn test_diamond_reads_shared_source() {
        let price = Signal::new(10.0_f64);
        let p1 = price.clone();
        let p2 = price.clone();
        let with_tax = Computed::new(move || p1.get() * 1.5);
        let discounted = Computed::new(move || p2.get() - 1.0);
        let (t, d) = (with_tax.clone(), discounted.clone());
        let total = Computed::new(move || t.get() + d.get());

        assert_eq!(total.get(), 24.0);
        price.set(20.0);
        assert_eq!(total.get(), 49.0);
    }

    #[test]
    fn test_dropped_derivation_stops_listening() {
        let source = Signal::new(1);
        let s = source.clone();
        let derived = Computed::new(move || s.get());
        assert_eq!(derived.get(), 1);
        assert_eq!(source.subscriber_count(), 1);

        drop(derived);
        assert_eq!(source.subscriber_count(), 0);
        source.set(2);
    }
}
