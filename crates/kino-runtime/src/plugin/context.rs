//! Capability facade handed to each plugin

use super::registry::RegistryInner;
use super::traits::Plugin;
use crate::error::Result;
use crate::events::{EventBus, EventName, PlayerEvent};
use crate::state::{StateChange, StateKey, StateSnapshot, StateStore, StateValue};
use crate::subscription::Subscription;
use std::cell::{Cell, RefCell};
use std::fmt;
use std::future::Future;
use std::rc::{Rc, Weak};
use tracing::{debug, error};

const PLUGIN_TARGET: &str = "kino_runtime::plugin";

type Cleanup = Box<dyn FnOnce() -> anyhow::Result<()>>;

/// Logger that stamps every record with the owning plugin's id
#[derive(Clone)]
pub struct PluginLogger {
    plugin: Rc<str>,
}

impl PluginLogger {
    pub(crate) fn new(plugin: &str) -> Self {
        Self { plugin: Rc::from(plugin) }
    }

    pub fn plugin(&self) -> &str {
        &self.plugin
    }

    pub fn debug(&self, message: impl fmt::Display) {
        tracing::debug!(target: PLUGIN_TARGET, plugin = %self.plugin, "{message}");
    }

    pub fn info(&self, message: impl fmt::Display) {
        tracing::info!(target: PLUGIN_TARGET, plugin = %self.plugin, "{message}");
    }

    pub fn warn(&self, message: impl fmt::Display) {
        tracing::warn!(target: PLUGIN_TARGET, plugin = %self.plugin, "{message}");
    }

    pub fn error(&self, message: impl fmt::Display) {
        tracing::error!(target: PLUGIN_TARGET, plugin = %self.plugin, "{message}");
    }
}

impl fmt::Debug for PluginLogger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginLogger").field("plugin", &self.plugin).finish()
    }
}

struct ContextInner {
    plugin_id: String,
    store: Rc<StateStore>,
    bus: EventBus<PlayerEvent>,
    registry: Weak<RegistryInner>,
    mount_point: Option<String>,
    logger: PluginLogger,
    owned: RefCell<Vec<(u64, Rc<Subscription>)>>,
    next_owned: Cell<u64>,
    cleanups: RefCell<Vec<Cleanup>>,
}

impl ContextInner {
    fn next_owned_id(&self) -> u64 {
        let id = self.next_owned.get() + 1;
        self.next_owned.set(id);
        id
    }

    /// Forget an owned handle once it can no longer fire
    fn release_owned(&self, id: u64) {
        self.owned.borrow_mut().retain(|(owned_id, _)| *owned_id != id);
    }
}

/// A plugin's view of the player.
///
/// State access goes through the shared store, events through the shared
/// bus, and other plugins are visible only while `ready`. Listeners created
/// here are released automatically when the plugin is torn down.
#[derive(Clone)]
pub struct PluginContext {
    inner: Rc<ContextInner>,
}

impl PluginContext {
    pub(crate) fn new(
        plugin_id: &str,
        store: Rc<StateStore>,
        bus: EventBus<PlayerEvent>,
        registry: Weak<RegistryInner>,
        mount_point: Option<String>,
    ) -> Self {
        Self {
            inner: Rc::new(ContextInner {
                plugin_id: plugin_id.to_string(),
                store,
                bus,
                registry,
                mount_point,
                logger: PluginLogger::new(plugin_id),
                owned: RefCell::new(Vec::new()),
                next_owned: Cell::new(0),
                cleanups: RefCell::new(Vec::new()),
            }),
        }
    }

    /// Id of the plugin this context belongs to
    pub fn plugin_id(&self) -> &str {
        &self.inner.plugin_id
    }

    /// Host mount point, if the player was configured with one
    pub fn mount_point(&self) -> Option<&str> {
        self.inner.mount_point.as_deref()
    }

    pub fn logger(&self) -> &PluginLogger {
        &self.inner.logger
    }

    // State

    pub fn get_state(&self, key: StateKey) -> Result<StateValue> {
        self.inner.store.get(key)
    }

    pub fn set_state(&self, key: StateKey, value: impl Into<StateValue>) -> Result<bool> {
        self.inner.store.set(key, value)
    }

    /// Write several fields; unknown names are skipped
    pub fn update_state<K: AsRef<str>>(&self, partial: impl IntoIterator<Item = (K, StateValue)>) -> Result<usize> {
        self.inner.store.update(partial)
    }

    pub fn snapshot(&self) -> Result<StateSnapshot> {
        self.inner.store.snapshot()
    }

    /// Watch one field
    pub fn watch_state(
        &self,
        key: StateKey,
        listener: impl Fn(&StateValue) -> anyhow::Result<()> + 'static,
    ) -> Result<Subscription> {
        let sub = self.inner.store.subscribe(key, listener)?;
        Ok(self.own(self.inner.next_owned_id(), sub))
    }

    /// Watch every field
    pub fn on_any_state_change(
        &self,
        listener: impl Fn(&StateChange) -> anyhow::Result<()> + 'static,
    ) -> Result<Subscription> {
        let sub = self.inner.store.subscribe_any(listener)?;
        Ok(self.own(self.inner.next_owned_id(), sub))
    }

    // Events

    pub fn on(&self, name: EventName, handler: impl Fn(&PlayerEvent) -> anyhow::Result<()> + 'static) -> Subscription {
        let sub = self.inner.bus.on(name, handler);
        self.own(self.inner.next_owned_id(), sub)
    }

    pub fn once(&self, name: EventName, handler: impl Fn(&PlayerEvent) -> anyhow::Result<()> + 'static) -> Subscription {
        let id = self.inner.next_owned_id();
        let inner = Rc::downgrade(&self.inner);
        let sub = self.inner.bus.once(name, move |event| {
            if let Some(inner) = inner.upgrade() {
                inner.release_owned(id);
            }
            handler(event)
        });
        self.own(id, sub)
    }

    pub fn on_async<F, Fut>(&self, name: EventName, handler: F) -> Subscription
    where
        F: Fn(PlayerEvent) -> Fut + 'static,
        Fut: Future<Output = anyhow::Result<()>> + 'static,
    {
        let sub = self.inner.bus.on_async(name, handler);
        self.own(self.inner.next_owned_id(), sub)
    }

    pub fn intercept(
        &self,
        name: EventName,
        interceptor: impl Fn(&PlayerEvent) -> anyhow::Result<Option<PlayerEvent>> + 'static,
    ) -> Subscription {
        let sub = self.inner.bus.intercept(name, interceptor);
        self.own(self.inner.next_owned_id(), sub)
    }

    /// Detach a listener created through this context
    pub fn off(&self, subscription: &Subscription) {
        subscription.unsubscribe();
    }

    pub fn emit(&self, event: PlayerEvent) -> bool {
        self.inner.bus.emit(event)
    }

    pub async fn emit_async(&self, event: PlayerEvent) -> bool {
        self.inner.bus.emit_async(event).await
    }

    // Plugins and teardown

    /// Another plugin, if it is currently ready
    pub fn get_plugin(&self, id: &str) -> Option<Rc<dyn Plugin>> {
        if id == self.inner.plugin_id {
            return None;
        }
        self.inner.registry.upgrade()?.ready_plugin(id)
    }

    /// Run `cleanup` once when this plugin is torn down
    pub fn register_cleanup(&self, cleanup: impl FnOnce() -> anyhow::Result<()> + 'static) {
        self.inner.cleanups.borrow_mut().push(Box::new(cleanup));
    }

    #[cfg(test)]
    pub(crate) fn pending_cleanups(&self) -> usize {
        self.inner.cleanups.borrow().len()
    }

    #[cfg(test)]
    pub(crate) fn owned_count(&self) -> usize {
        self.inner.owned.borrow().len()
    }

    /// Release owned listeners and run every registered cleanup once
    pub(crate) fn teardown(&self) {
        let owned: Vec<_> = self.inner.owned.borrow_mut().drain(..).collect();
        for (_, sub) in owned {
            sub.unsubscribe();
        }

        let cleanups: Vec<_> = self.inner.cleanups.borrow_mut().drain(..).collect();
        let count = cleanups.len();
        for cleanup in cleanups {
            if let Err(e) = cleanup() {
                error!(plugin = %self.inner.plugin_id, error = %e, "Cleanup callback failed");
            }
        }
        debug!(plugin = %self.inner.plugin_id, cleanups = count, "Plugin context released");
    }

    /// Keep a shared handle so teardown can release it.
    ///
    /// Unsubscribing through the returned handle drops the entry again.
    fn own(&self, id: u64, sub: Subscription) -> Subscription {
        let shared = Rc::new(sub);
        self.inner.owned.borrow_mut().push((id, Rc::clone(&shared)));
        let inner = Rc::downgrade(&self.inner);
        Subscription::new(move || {
            shared.unsubscribe();
            if let Some(inner) = inner.upgrade() {
                inner.release_owned(id);
            }
        })
    }
}

impl fmt::Debug for PluginContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginContext")
            .field("plugin_id", &self.inner.plugin_id)
            .field("mount_point", &self.inner.mount_point)
            .field("owned", &self.inner.owned.borrow().len())
            .field("cleanups", &self.inner.cleanups.borrow().len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    fn context(id: &str) -> (PluginContext, Rc<StateStore>, EventBus<PlayerEvent>) {
        let store = Rc::new(StateStore::new());
        let bus = EventBus::new();
        let ctx = PluginContext::new(id, store.clone(), bus.clone(), Weak::new(), Some("#player".into()));
        (ctx, store, bus)
    }

    #[test]
    fn test_state_goes_through_shared_store() {
        let (ctx, store, _) = context("analytics");
        ctx.set_state(StateKey::Volume, 0.25).unwrap();
        assert_eq!(store.get(StateKey::Volume).unwrap(), StateValue::Number(0.25));
        assert_eq!(ctx.mount_point(), Some("#player"));
    }

    #[test]
    fn test_teardown_releases_listeners_and_runs_cleanups_once() {
        let (ctx, _, bus) = context("analytics");
        let cleaned = Rc::new(Cell::new(0));

        ctx.on(EventName::Play, |_| Ok(()));
        ctx.register_cleanup(|| Err(anyhow::anyhow!("cleanup failed")));
        let c = cleaned.clone();
        ctx.register_cleanup(move || {
            c.set(c.get() + 1);
            Ok(())
        });
        assert_eq!(bus.listener_count(&EventName::Play), 1);
        assert_eq!(ctx.pending_cleanups(), 2);

        ctx.teardown();
        ctx.teardown();
        assert_eq!(cleaned.get(), 1);
        assert_eq!(bus.listener_count(&EventName::Play), 0);
    }

    #[test]
    fn test_off_detaches_listener() {
        let (ctx, _, bus) = context("ui");
        let sub = ctx.on(EventName::Pause, |_| Ok(()));
        ctx.off(&sub);
        assert_eq!(bus.listener_count(&EventName::Pause), 0);
    }

    #[test]
    fn test_released_listeners_are_forgotten() {
        let (ctx, _, bus) = context("analytics");
        for _ in 0..1000 {
            ctx.once(EventName::Play, |_| Ok(())).unsubscribe();
            ctx.watch_state(StateKey::Muted, |_| Ok(())).unwrap().unsubscribe();
        }
        assert_eq!(ctx.owned_count(), 0);

        let fired = Rc::new(Cell::new(0));
        for _ in 0..1000 {
            let f = fired.clone();
            ctx.once(EventName::Play, move |_| {
                f.set(f.get() + 1);
                Ok(())
            });
            assert!(bus.emit(PlayerEvent::Play));
        }
        assert_eq!(fired.get(), 1000);
        assert_eq!(ctx.owned_count(), 0);
        assert_eq!(bus.listener_count(&EventName::Play), 0);

        let kept = ctx.on(EventName::Pause, |_| Ok(()));
        assert_eq!(ctx.owned_count(), 1);
        ctx.off(&kept);
        assert_eq!(ctx.owned_count(), 0);
    }

    #[test]
    fn test_get_plugin_without_registry() {
        let (ctx, _, _) = context("ui");
        assert!(ctx.get_plugin("hls").is_none());
        assert!(ctx.get_plugin("ui").is_none());
    }
}
