//! Name-routed publish/subscribe with ordered interceptors

use super::catalog::Event;
use crate::subscription::Subscription;
use futures::future::{join_all, LocalBoxFuture};
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::rc::{Rc, Weak};
use tracing::{debug, error, warn};

/// Default listener count per event before a leak warning is logged
pub const DEFAULT_MAX_LISTENERS: usize = 10;

type SyncHandler<E> = Rc<dyn Fn(&E) -> anyhow::Result<()>>;
type AsyncHandler<E> = Rc<dyn Fn(E) -> LocalBoxFuture<'static, anyhow::Result<()>>>;
type SyncInterceptor<E> = Rc<dyn Fn(&E) -> anyhow::Result<Option<E>>>;
type AsyncInterceptor<E> = Rc<dyn Fn(E) -> LocalBoxFuture<'static, anyhow::Result<Option<E>>>>;

enum Handler<E> {
    Sync(SyncHandler<E>),
    Async(AsyncHandler<E>),
}

impl<E> Clone for Handler<E> {
    fn clone(&self) -> Self {
        match self {
            Handler::Sync(f) => Handler::Sync(Rc::clone(f)),
            Handler::Async(f) => Handler::Async(Rc::clone(f)),
        }
    }
}

enum Interceptor<E> {
    Sync(SyncInterceptor<E>),
    Async(AsyncInterceptor<E>),
}

impl<E> Clone for Interceptor<E> {
    fn clone(&self) -> Self {
        match self {
            Interceptor::Sync(f) => Interceptor::Sync(Rc::clone(f)),
            Interceptor::Async(f) => Interceptor::Async(Rc::clone(f)),
        }
    }
}

/// Per-event subscription table entry
struct Channel<E> {
    handlers: Vec<(u64, Handler<E>)>,
    once: Vec<(u64, Handler<E>)>,
    interceptors: Vec<(u64, Interceptor<E>)>,
}

impl<E> Default for Channel<E> {
    fn default() -> Self {
        Self {
            handlers: Vec::new(),
            once: Vec::new(),
            interceptors: Vec::new(),
        }
    }
}

impl<E> Channel<E> {
    fn listener_count(&self) -> usize {
        self.handlers.len() + self.once.len()
    }

    fn is_empty(&self) -> bool {
        self.listener_count() == 0 && self.interceptors.is_empty()
    }

    fn remove(&mut self, id: u64) {
        self.handlers.retain(|(i, _)| *i != id);
        self.once.retain(|(i, _)| *i != id);
        self.interceptors.retain(|(i, _)| *i != id);
    }
}

#[derive(Clone, Copy)]
enum Slot {
    Persistent,
    Once,
}

struct BusInner<E: Event> {
    channels: RefCell<HashMap<E::Name, Channel<E>>>,
    next_id: Cell<u64>,
    max_listeners: Cell<usize>,
}

/// Typed event bus.
///
/// Cloning yields another handle to the same subscription table. Handlers
/// run in registration order against a snapshot of the table, so handlers
/// added or removed during delivery only affect later emissions.
pub struct EventBus<E: Event> {
    inner: Rc<BusInner<E>>,
}

impl<E: Event> Clone for EventBus<E> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<E: Event> Default for EventBus<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: Event> EventBus<E> {
    pub fn new() -> Self {
        Self::with_max_listeners(DEFAULT_MAX_LISTENERS)
    }

    pub fn with_max_listeners(max: usize) -> Self {
        Self {
            inner: Rc::new(BusInner {
                channels: RefCell::new(HashMap::new()),
                next_id: Cell::new(0),
                max_listeners: Cell::new(max),
            }),
        }
    }

    /// Register a persistent handler
    pub fn on(&self, name: E::Name, handler: impl Fn(&E) -> anyhow::Result<()> + 'static) -> Subscription {
        self.add_handler(name, Slot::Persistent, Handler::Sync(Rc::new(handler)))
    }

    /// Register a handler that fires on the next emission only
    pub fn once(&self, name: E::Name, handler: impl Fn(&E) -> anyhow::Result<()> + 'static) -> Subscription {
        self.add_handler(name, Slot::Once, Handler::Sync(Rc::new(handler)))
    }

    /// Register an asynchronous handler; only [`emit_async`](Self::emit_async) delivers to it
    pub fn on_async<F, Fut>(&self, name: E::Name, handler: F) -> Subscription
    where
        F: Fn(E) -> Fut + 'static,
        Fut: Future<Output = anyhow::Result<()>> + 'static,
    {
        let handler: AsyncHandler<E> = Rc::new(move |event| Box::pin(handler(event)));
        self.add_handler(name, Slot::Persistent, Handler::Async(handler))
    }

    /// Add an interceptor to the end of the event's chain.
    ///
    /// Returning `Ok(Some(event))` passes a (possibly transformed) payload on,
    /// `Ok(None)` cancels the emission, and `Err` is logged and ignored.
    pub fn intercept(
        &self,
        name: E::Name,
        interceptor: impl Fn(&E) -> anyhow::Result<Option<E>> + 'static,
    ) -> Subscription {
        self.add_interceptor(name, Interceptor::Sync(Rc::new(interceptor)))
    }

    /// Asynchronous interceptor; skipped by the synchronous [`emit`](Self::emit)
    pub fn intercept_async<F, Fut>(&self, name: E::Name, interceptor: F) -> Subscription
    where
        F: Fn(E) -> Fut + 'static,
        Fut: Future<Output = anyhow::Result<Option<E>>> + 'static,
    {
        let interceptor: AsyncInterceptor<E> = Rc::new(move |event| Box::pin(interceptor(event)));
        self.add_interceptor(name, Interceptor::Async(interceptor))
    }

    /// Deliver `event` synchronously.
    ///
    /// Returns `false` when an interceptor cancelled the emission.
    pub fn emit(&self, event: E) -> bool {
        let name = event.name();
        let mut payload = event;

        for interceptor in self.interceptors(&name) {
            let Interceptor::Sync(f) = interceptor else {
                debug!(event = %name, "Skipping async interceptor in sync emit");
                continue;
            };
            match f(&payload) {
                Ok(Some(next)) => payload = next,
                Ok(None) => {
                    debug!(event = %name, "Emission cancelled by interceptor");
                    return false;
                }
                Err(e) => error!(event = %name, error = %e, "Interceptor failed"),
            }
        }

        for handler in self.take_delivery(&name) {
            match handler {
                Handler::Sync(f) => {
                    if let Err(e) = f(&payload) {
                        error!(event = %name, error = %e, "Event handler failed");
                    }
                }
                Handler::Async(_) => {
                    debug!(event = %name, "Skipping async handler in sync emit");
                }
            }
        }
        true
    }

    /// Deliver `event`, awaiting asynchronous interceptors in order and
    /// joining asynchronous handlers concurrently.
    pub async fn emit_async(&self, event: E) -> bool {
        let name = event.name();
        let mut payload = event;

        for interceptor in self.interceptors(&name) {
            let outcome = match interceptor {
                Interceptor::Sync(f) => f(&payload),
                Interceptor::Async(f) => f(payload.clone()).await,
            };
            match outcome {
                Ok(Some(next)) => payload = next,
                Ok(None) => {
                    debug!(event = %name, "Emission cancelled by interceptor");
                    return false;
                }
                Err(e) => error!(event = %name, error = %e, "Interceptor failed"),
            }
        }

        let mut pending = Vec::new();
        for handler in self.take_delivery(&name) {
            match handler {
                Handler::Sync(f) => {
                    if let Err(e) = f(&payload) {
                        error!(event = %name, error = %e, "Event handler failed");
                    }
                }
                Handler::Async(f) => pending.push(f(payload.clone())),
            }
        }

        for result in join_all(pending).await {
            if let Err(e) = result {
                error!(event = %name, error = %e, "Async event handler failed");
            }
        }
        true
    }

    /// Clear one event's table entry, or every entry when `name` is `None`
    pub fn remove_all_listeners(&self, name: Option<&E::Name>) {
        let mut channels = self.inner.channels.borrow_mut();
        match name {
            Some(name) => {
                channels.remove(name);
            }
            None => channels.clear(),
        }
    }

    /// Persistent plus one-shot handlers registered for `name`
    pub fn listener_count(&self, name: &E::Name) -> usize {
        self.inner
            .channels
            .borrow()
            .get(name)
            .map_or(0, Channel::listener_count)
    }

    pub fn interceptor_count(&self, name: &E::Name) -> usize {
        self.inner
            .channels
            .borrow()
            .get(name)
            .map_or(0, |c| c.interceptors.len())
    }

    /// Names with at least one handler or interceptor
    pub fn event_names(&self) -> Vec<E::Name> {
        self.inner.channels.borrow().keys().cloned().collect()
    }

    /// Threshold for the leak warning; 0 disables it
    pub fn set_max_listeners(&self, max: usize) {
        self.inner.max_listeners.set(max);
    }

    pub fn max_listeners(&self) -> usize {
        self.inner.max_listeners.get()
    }

    fn next_id(&self) -> u64 {
        let id = self.inner.next_id.get();
        self.inner.next_id.set(id + 1);
        id
    }

    fn add_handler(&self, name: E::Name, slot: Slot, handler: Handler<E>) -> Subscription {
        let id = self.next_id();
        let count = {
            let mut channels = self.inner.channels.borrow_mut();
            let channel = channels.entry(name.clone()).or_default();
            match slot {
                Slot::Persistent => channel.handlers.push((id, handler)),
                Slot::Once => channel.once.push((id, handler)),
            }
            channel.listener_count()
        };

        let max = self.inner.max_listeners.get();
        if max > 0 && count > max {
            warn!(
                event = %name,
                count,
                max,
                "Possible listener leak: more listeners than max_listeners"
            );
        }
        debug!(event = %name, id, "Listener added");
        self.release(name, id)
    }

    fn add_interceptor(&self, name: E::Name, interceptor: Interceptor<E>) -> Subscription {
        let id = self.next_id();
        self.inner
            .channels
            .borrow_mut()
            .entry(name.clone())
            .or_default()
            .interceptors
            .push((id, interceptor));
        debug!(event = %name, id, "Interceptor added");
        self.release(name, id)
    }

    fn release(&self, name: E::Name, id: u64) -> Subscription {
        let inner: Weak<BusInner<E>> = Rc::downgrade(&self.inner);
        Subscription::new(move || {
            let Some(inner) = inner.upgrade() else {
                return;
            };
            let mut channels = inner.channels.borrow_mut();
            if let Some(channel) = channels.get_mut(&name) {
                channel.remove(id);
                if channel.is_empty() {
                    channels.remove(&name);
                }
            }
        })
    }

    fn interceptors(&self, name: &E::Name) -> Vec<Interceptor<E>> {
        self.inner
            .channels
            .borrow()
            .get(name)
            .map(|c| c.interceptors.iter().map(|(_, i)| i.clone()).collect())
            .unwrap_or_default()
    }

    /// Snapshot persistent handlers and drain one-shot handlers, in that
    /// delivery order. One-shot handlers are removed before any runs, so a
    /// re-entrant emission cannot fire them twice.
    fn take_delivery(&self, name: &E::Name) -> Vec<Handler<E>> {
        let mut channels = self.inner.channels.borrow_mut();
        let Some(channel) = channels.get_mut(name) else {
            return Vec::new();
        };
        let mut delivery: Vec<Handler<E>> = channel.handlers.iter().map(|(_, h)| h.clone()).collect();
        delivery.extend(channel.once.drain(..).map(|(_, h)| h));
        if channel.is_empty() {
            channels.remove(name);
        }
        delivery
    }
}

impl<E: Event> fmt::Debug for EventBus<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("events", &self.inner.channels.borrow().len())
            .field("max_listeners", &self.inner.max_listeners.get())
            .finish()
    }
}
