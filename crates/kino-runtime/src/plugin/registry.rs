//! Plugin registry: registration, dependency ordering, lifecycle

use super::context::PluginContext;
use super::graph::{self, DependencyCycle};
use super::info::PluginCategory;
use super::lifecycle::{LifecycleState, PluginDescriptor, RegistryStats};
use super::traits::Plugin;
use crate::error::{Error, Result};
use crate::events::{EventBus, PlayerEvent};
use crate::state::{StateChange, StateStore};
use crate::types::PlayerErrorInfo;
use futures::future::LocalBoxFuture;
use futures::FutureExt;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::{Rc, Weak};
use tracing::{debug, error, info, instrument, warn};

struct Entry {
    plugin: Rc<dyn Plugin>,
    descriptor: PluginDescriptor,
    context: PluginContext,
}

pub(crate) struct RegistryInner {
    entries: RefCell<HashMap<String, Entry>>,
    /// Registration order
    order: RefCell<Vec<String>>,
    bus: EventBus<PlayerEvent>,
    store: Rc<StateStore>,
    mount_point: Option<String>,
    default_configs: HashMap<String, serde_json::Value>,
}

impl RegistryInner {
    pub(crate) fn ready_plugin(&self, id: &str) -> Option<Rc<dyn Plugin>> {
        self.entries
            .borrow()
            .get(id)
            .filter(|e| e.descriptor.state == LifecycleState::Ready)
            .map(|e| Rc::clone(&e.plugin))
    }
}

/// Holds plugin descriptors and drives them through their lifecycle.
///
/// Cloning yields another handle to the same registry. Only the registry
/// changes a plugin's [`LifecycleState`].
#[derive(Clone)]
pub struct PluginRegistry {
    inner: Rc<RegistryInner>,
}

impl PluginRegistry {
    pub fn new(store: Rc<StateStore>, bus: EventBus<PlayerEvent>) -> Self {
        Self::with_options(store, bus, None, HashMap::new())
    }

    /// `default_configs` supplies configuration for plugins registered without one
    pub fn with_options(
        store: Rc<StateStore>,
        bus: EventBus<PlayerEvent>,
        mount_point: Option<String>,
        default_configs: HashMap<String, serde_json::Value>,
    ) -> Self {
        Self {
            inner: Rc::new(RegistryInner {
                entries: RefCell::new(HashMap::new()),
                order: RefCell::new(Vec::new()),
                bus,
                store,
                mount_point,
                default_configs,
            }),
        }
    }

    /// Handle that does not keep the registry alive
    pub(crate) fn downgrade(&self) -> WeakRegistry {
        WeakRegistry(Rc::downgrade(&self.inner))
    }

    /// Add a plugin in the `registered` state
    pub fn register(&self, plugin: Rc<dyn Plugin>, config: Option<serde_json::Value>) -> Result<()> {
        let info = plugin.info();
        if info.id.trim().is_empty() {
            return Err(Error::InvalidPlugin("plugin id must not be empty".into()));
        }
        if info.name.trim().is_empty() {
            return Err(Error::InvalidPlugin(format!("plugin '{}' has an empty name", info.id)));
        }
        if self.contains(&info.id) {
            return Err(Error::DuplicatePlugin { id: info.id });
        }

        let id = info.id.clone();
        let config = config.or_else(|| self.inner.default_configs.get(&id).cloned());
        let context = PluginContext::new(
            &id,
            Rc::clone(&self.inner.store),
            self.inner.bus.clone(),
            Rc::downgrade(&self.inner),
            self.inner.mount_point.clone(),
        );

        info!(
            plugin = %id,
            version = %info.version,
            category = %info.category,
            "Plugin registered"
        );
        self.inner.entries.borrow_mut().insert(
            id.clone(),
            Entry {
                plugin,
                descriptor: PluginDescriptor::new(info, config),
                context,
            },
        );
        self.inner.order.borrow_mut().push(id.clone());

        self.inner.bus.emit(PlayerEvent::PluginRegistered { id });
        Ok(())
    }

    /// Initialization order over every registered plugin
    pub fn resolve_order(&self) -> Result<Vec<String>> {
        Ok(self.dependency_order()?)
    }

    fn dependency_order(&self) -> std::result::Result<Vec<String>, DependencyCycle> {
        let entries = self.inner.entries.borrow();
        let order = self.inner.order.borrow();
        let resolved = graph::resolve_order(order.iter().filter_map(|id| {
            entries
                .get(id)
                .map(|e| (id.as_str(), e.descriptor.info.dependency_ids()))
        }));
        resolved
    }

    /// Initialize every plugin in dependency order, stopping at the first failure
    #[instrument(skip(self))]
    pub async fn init_all(&self) -> Result<()> {
        let order = self.resolve_order()?;
        info!(plugins = order.len(), "Initializing plugins");
        for id in order {
            self.init_plugin(&id).await?;
        }
        Ok(())
    }

    /// Initialize one plugin, initializing its dependencies first
    pub async fn init_plugin(&self, id: &str) -> Result<()> {
        self.init_with_path(id.to_string(), Vec::new()).await
    }

    fn init_with_path(&self, id: String, path: Vec<String>) -> LocalBoxFuture<'_, Result<()>> {
        async move {
            let (state, dependencies) = {
                let entries = self.inner.entries.borrow();
                let entry = entries.get(&id).ok_or_else(|| Error::PluginNotFound { id: id.clone() })?;

                for dep in &entry.descriptor.info.dependencies {
                    let target = entries.get(&dep.id).ok_or_else(|| Error::MissingDependency {
                        plugin: id.clone(),
                        dependency: dep.id.clone(),
                    })?;
                    let found = &target.descriptor.info.version;
                    if let Some(required) = dep.version_req.as_ref().filter(|_| !dep.is_satisfied_by(found)) {
                        return Err(Error::IncompatibleDependency {
                            plugin: id.clone(),
                            dependency: dep.id.clone(),
                            required: required.clone(),
                            found: found.clone(),
                        });
                    }
                }

                let deps: Vec<String> = entry.descriptor.info.dependency_ids().map(str::to_string).collect();
                (entry.descriptor.state, deps)
            };

            match state {
                LifecycleState::Ready => return Ok(()),
                LifecycleState::Initializing => {
                    let mut chain = path;
                    chain.push(id);
                    return Err(Error::cycle(chain));
                }
                LifecycleState::Registered | LifecycleState::Error => {}
            }

            self.advance(&id, LifecycleState::Initializing)?;
            debug!(plugin = %id, "Initializing plugin");

            let mut child_path = path;
            child_path.push(id.clone());
            for dep in dependencies {
                if let Err(e) = self.init_with_path(dep.clone(), child_path.clone()).await {
                    self.fail(&id, format!("dependency '{dep}' failed: {e}"))?;
                    return Err(e);
                }
            }

            let (plugin, context, config) = {
                let entries = self.inner.entries.borrow();
                let entry = entries.get(&id).ok_or_else(|| Error::PluginNotFound { id: id.clone() })?;
                (
                    Rc::clone(&entry.plugin),
                    entry.context.clone(),
                    entry.descriptor.config.clone(),
                )
            };

            match plugin.init(context.clone(), config.as_ref()).await {
                Ok(()) => {
                    self.advance(&id, LifecycleState::Ready)?;
                    info!(plugin = %id, "Plugin ready");
                    self.inner.bus.emit(PlayerEvent::PluginReady { id });
                    Ok(())
                }
                Err(e) => {
                    context.teardown();
                    self.fail(&id, format!("{e:#}"))?;
                    Err(Error::PluginInit { id, source: e })
                }
            }
        }
        .boxed_local()
    }

    /// Record an init failure: `initializing -> error`, then publish it
    fn fail(&self, id: &str, message: String) -> Result<()> {
        {
            let mut entries = self.inner.entries.borrow_mut();
            let entry = entries
                .get_mut(id)
                .ok_or_else(|| Error::PluginNotFound { id: id.to_string() })?;
            entry.descriptor.advance(LifecycleState::Error)?;
            entry.descriptor.last_error = Some(message.clone());
        }
        error!(plugin = %id, error = %message, "Plugin failed to initialize");
        self.inner.bus.emit(PlayerEvent::PluginError {
            id: id.to_string(),
            message,
        });
        Ok(())
    }

    fn advance(&self, id: &str, next: LifecycleState) -> Result<()> {
        let mut entries = self.inner.entries.borrow_mut();
        let entry = entries
            .get_mut(id)
            .ok_or_else(|| Error::PluginNotFound { id: id.to_string() })?;
        entry.descriptor.advance(next)
    }

    /// Tear down every plugin in reverse dependency order
    #[instrument(skip(self))]
    pub async fn destroy_all(&self) -> Result<()> {
        let mut order = match self.dependency_order() {
            Ok(order) => order,
            Err(cycle) => {
                warn!(%cycle, "Falling back to registration order for teardown");
                self.inner.order.borrow().clone()
            }
        };
        order.reverse();
        for id in order {
            self.destroy_plugin(&id).await?;
        }
        Ok(())
    }

    /// Tear down a ready plugin; a no-op in any other state.
    ///
    /// A failing `destroy` is logged and the plugin still returns to
    /// `registered`. Cleanup callbacks run exactly once.
    pub async fn destroy_plugin(&self, id: &str) -> Result<()> {
        let (plugin, context) = {
            let entries = self.inner.entries.borrow();
            let entry = entries
                .get(id)
                .ok_or_else(|| Error::PluginNotFound { id: id.to_string() })?;
            if entry.descriptor.state != LifecycleState::Ready {
                debug!(plugin = %id, state = %entry.descriptor.state, "Skipping teardown");
                return Ok(());
            }
            (Rc::clone(&entry.plugin), entry.context.clone())
        };

        if let Err(e) = plugin.destroy().await {
            warn!(plugin = %id, error = %e, "Plugin destroy failed");
        }
        context.teardown();

        self.advance(id, LifecycleState::Registered)?;
        info!(plugin = %id, "Plugin destroyed");
        self.inner.bus.emit(PlayerEvent::PluginDestroyed { id: id.to_string() });
        Ok(())
    }

    /// Remove a plugin, tearing it down first if ready
    pub async fn unregister(&self, id: &str) -> Result<()> {
        self.destroy_plugin(id).await?;

        let entry = self.inner.entries.borrow_mut().remove(id);
        let Some(entry) = entry else {
            return Err(Error::PluginNotFound { id: id.to_string() });
        };
        entry.context.teardown();
        self.inner.order.borrow_mut().retain(|o| o != id);

        info!(plugin = %id, "Plugin unregistered");
        self.inner.bus.emit(PlayerEvent::PluginUnregistered { id: id.to_string() });
        Ok(())
    }

    /// First provider, in registration order, that accepts `source`
    pub fn select_provider(&self, source: &str) -> Option<Rc<dyn Plugin>> {
        self.plugins().into_iter().find(|plugin| {
            plugin.info().category == PluginCategory::Provider
                && plugin.as_source_provider().is_some_and(|p| p.can_play(source))
        })
    }

    /// Plugin by id, in any state
    pub fn get(&self, id: &str) -> Option<Rc<dyn Plugin>> {
        self.inner.entries.borrow().get(id).map(|e| Rc::clone(&e.plugin))
    }

    /// Plugin by id, only while ready
    pub fn get_ready(&self, id: &str) -> Option<Rc<dyn Plugin>> {
        self.inner.ready_plugin(id)
    }

    /// Every plugin in registration order
    pub fn plugins(&self) -> Vec<Rc<dyn Plugin>> {
        let entries = self.inner.entries.borrow();
        self.inner
            .order
            .borrow()
            .iter()
            .filter_map(|id| entries.get(id).map(|e| Rc::clone(&e.plugin)))
            .collect()
    }

    pub fn descriptor(&self, id: &str) -> Option<PluginDescriptor> {
        self.inner.entries.borrow().get(id).map(|e| e.descriptor.clone())
    }

    /// Descriptors in registration order
    pub fn descriptors(&self) -> Vec<PluginDescriptor> {
        let entries = self.inner.entries.borrow();
        self.inner
            .order
            .borrow()
            .iter()
            .filter_map(|id| entries.get(id).map(|e| e.descriptor.clone()))
            .collect()
    }

    pub fn state_of(&self, id: &str) -> Option<LifecycleState> {
        self.inner.entries.borrow().get(id).map(|e| e.descriptor.state)
    }

    pub fn ready_ids(&self) -> Vec<String> {
        self.descriptors()
            .into_iter()
            .filter(|d| d.state == LifecycleState::Ready)
            .map(|d| d.info.id)
            .collect()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.inner.entries.borrow().contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.inner.entries.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> RegistryStats {
        let entries = self.inner.entries.borrow();
        let mut stats = RegistryStats {
            total: entries.len(),
            ..Default::default()
        };
        for entry in entries.values() {
            match entry.descriptor.state {
                LifecycleState::Registered => stats.registered += 1,
                LifecycleState::Initializing => stats.initializing += 1,
                LifecycleState::Ready => stats.ready += 1,
                LifecycleState::Error => stats.failed += 1,
            }
        }
        stats
    }

    /// Deliver a state change to every ready plugin's hook
    pub fn notify_state_change(&self, change: &StateChange) {
        for plugin in self.ready_plugins() {
            if let Err(e) = plugin.on_state_change(change) {
                error!(plugin = %plugin.info().id, key = %change.key, error = %e, "on_state_change failed");
            }
        }
    }

    /// Deliver an error record to every ready plugin's hook
    pub fn notify_error(&self, err: &PlayerErrorInfo) {
        for plugin in self.ready_plugins() {
            if let Err(e) = plugin.on_error(err) {
                error!(plugin = %plugin.info().id, error = %e, "on_error failed");
            }
        }
    }

    fn ready_plugins(&self) -> Vec<Rc<dyn Plugin>> {
        let entries = self.inner.entries.borrow();
        self.inner
            .order
            .borrow()
            .iter()
            .filter_map(|id| entries.get(id))
            .filter(|e| e.descriptor.state == LifecycleState::Ready)
            .map(|e| Rc::clone(&e.plugin))
            .collect()
    }

    /// Tear everything down and forget every plugin
    pub async fn clear(&self) -> Result<()> {
        self.destroy_all().await?;
        let entries: Vec<Entry> = self.inner.entries.borrow_mut().drain().map(|(_, e)| e).collect();
        for entry in &entries {
            entry.context.teardown();
        }
        self.inner.order.borrow_mut().clear();
        debug!(plugins = entries.len(), "Registry cleared");
        Ok(())
    }
}

/// Weak counterpart of [`PluginRegistry`]
#[derive(Clone)]
pub(crate) struct WeakRegistry(Weak<RegistryInner>);

impl WeakRegistry {
    pub(crate) fn upgrade(&self) -> Option<PluginRegistry> {
        self.0.upgrade().map(|inner| PluginRegistry { inner })
    }
}

impl std::fmt::Debug for PluginRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginRegistry")
            .field("plugins", &*self.inner.order.borrow())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventName;
    use crate::plugin::{PluginDependency, PluginInfo, SourceProvider};
    use async_trait::async_trait;
    use semver::{Version, VersionReq};
    use std::cell::Cell;

    type Log = Rc<RefCell<Vec<String>>>;

    struct TestPlugin {
        info: PluginInfo,
        log: Log,
        fail_init: Cell<bool>,
        fail_destroy: bool,
        mp4: bool,
    }

    impl TestPlugin {
        fn new(id: &str, deps: &[&str], log: &Log) -> Self {
            let mut info = PluginInfo::new(id, id.to_uppercase(), Version::new(1, 0, 0), PluginCategory::Feature);
            for dep in deps {
                info = info.depends_on(*dep);
            }
            Self {
                info,
                log: log.clone(),
                fail_init: Cell::new(false),
                fail_destroy: false,
                mp4: false,
            }
        }

        fn provider(id: &str, log: &Log) -> Self {
            let mut plugin = Self::new(id, &[], log);
            plugin.info.category = PluginCategory::Provider;
            plugin.mp4 = true;
            plugin
        }
    }

    #[async_trait(?Send)]
    impl Plugin for TestPlugin {
        fn info(&self) -> PluginInfo {
            self.info.clone()
        }

        async fn init(&self, ctx: PluginContext, _config: Option<&serde_json::Value>) -> anyhow::Result<()> {
            if self.fail_init.get() {
                anyhow::bail!("{} refused to start", self.info.id);
            }
            let log = self.log.clone();
            let id = self.info.id.clone();
            ctx.register_cleanup(move || {
                log.borrow_mut().push(format!("cleanup:{id}"));
                Ok(())
            });
            self.log.borrow_mut().push(format!("init:{}", self.info.id));
            Ok(())
        }

        async fn destroy(&self) -> anyhow::Result<()> {
            self.log.borrow_mut().push(format!("destroy:{}", self.info.id));
            if self.fail_destroy {
                anyhow::bail!("destroy exploded");
            }
            Ok(())
        }

        fn as_source_provider(&self) -> Option<&dyn SourceProvider> {
            if self.mp4 {
                Some(self)
            } else {
                None
            }
        }
    }

    #[async_trait(?Send)]
    impl SourceProvider for TestPlugin {
        fn can_play(&self, source: &str) -> bool {
            crate::source::extension(source).as_deref() == Some("mp4")
        }

        async fn load_source(&self, _source: &str) -> anyhow::Result<()> {
            Ok(())
        }
    }

    fn registry() -> (PluginRegistry, EventBus<PlayerEvent>, Log) {
        let bus = EventBus::new();
        let registry = PluginRegistry::new(Rc::new(StateStore::new()), bus.clone());
        (registry, bus, Rc::default())
    }

    fn add(registry: &PluginRegistry, plugin: TestPlugin) {
        registry.register(Rc::new(plugin), None).unwrap();
    }

    #[test]
    fn test_register_validates() {
        let (registry, _, log) = registry();
        let err = registry.register(Rc::new(TestPlugin::new("", &[], &log)), None).unwrap_err();
        assert_eq!(err.error_code(), "INVALID_PLUGIN");

        add(&registry, TestPlugin::new("hls", &[], &log));
        let err = registry
            .register(Rc::new(TestPlugin::new("hls", &[], &log)), None)
            .unwrap_err();
        assert!(matches!(err, Error::DuplicatePlugin { .. }));
        assert_eq!(registry.state_of("hls"), Some(LifecycleState::Registered));
    }

    #[test]
    fn test_register_emits_event() {
        let (registry, bus, log) = registry();
        let seen = Rc::new(RefCell::new(None));
        let s = seen.clone();
        bus.on(EventName::PluginRegistered, move |event| {
            if let PlayerEvent::PluginRegistered { id } = event {
                *s.borrow_mut() = Some(id.clone());
            }
            Ok(())
        });

        add(&registry, TestPlugin::new("analytics", &[], &log));
        assert_eq!(seen.borrow().as_deref(), Some("analytics"));
    }

    #[tokio::test]
    async fn test_init_all_follows_dependencies() {
        let (registry, _, log) = registry();
        add(&registry, TestPlugin::new("p2", &["p1"], &log));
        add(&registry, TestPlugin::new("p1", &[], &log));

        registry.init_all().await.unwrap();
        assert_eq!(*log.borrow(), vec!["init:p1", "init:p2"]);
        assert_eq!(registry.ready_ids(), vec!["p2", "p1"]);
        assert_eq!(registry.stats().ready, 2);
    }

    #[tokio::test]
    async fn test_init_all_reports_cycle_before_initializing() {
        let (registry, _, log) = registry();
        add(&registry, TestPlugin::new("a", &["b"], &log));
        add(&registry, TestPlugin::new("b", &["c"], &log));
        add(&registry, TestPlugin::new("c", &["a"], &log));

        let err = registry.init_all().await.unwrap_err();
        assert_eq!(err.to_string(), "Circular dependency detected: a -> b -> c -> a");
        assert!(log.borrow().is_empty());
        assert_eq!(registry.stats().registered, 3);
    }

    #[tokio::test]
    async fn test_init_plugin_detects_reentry() {
        let (registry, _, log) = registry();
        add(&registry, TestPlugin::new("a", &["b"], &log));
        add(&registry, TestPlugin::new("b", &["a"], &log));

        let err = registry.init_plugin("a").await.unwrap_err();
        match err {
            Error::CircularDependency { chain } => assert_eq!(chain, vec!["a", "b", "a"]),
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(registry.state_of("a"), Some(LifecycleState::Error));
    }

    #[tokio::test]
    async fn test_missing_dependency_leaves_state_untouched() {
        let (registry, _, log) = registry();
        add(&registry, TestPlugin::new("ui", &["controls"], &log));

        let err = registry.init_plugin("ui").await.unwrap_err();
        assert!(matches!(err, Error::MissingDependency { .. }));
        assert_eq!(registry.state_of("ui"), Some(LifecycleState::Registered));
    }

    #[tokio::test]
    async fn test_incompatible_dependency_version() {
        let (registry, _, log) = registry();
        add(&registry, TestPlugin::new("hls", &[], &log));
        let mut ui = TestPlugin::new("ui", &[], &log);
        ui.info = ui
            .info
            .with_dependency(PluginDependency::new("hls").with_version(VersionReq::parse(">=2").unwrap()));
        add(&registry, ui);

        let err = registry.init_all().await.unwrap_err();
        assert_eq!(err.error_code(), "INCOMPATIBLE_DEPENDENCY");
    }

    #[tokio::test]
    async fn test_init_failure_records_error_and_aborts_batch() {
        let (registry, bus, log) = registry();
        let failed = TestPlugin::new("first", &[], &log);
        failed.fail_init.set(true);
        add(&registry, failed);
        add(&registry, TestPlugin::new("second", &[], &log));
        let errors = Rc::new(Cell::new(0));
        let e = errors.clone();
        bus.on(EventName::PluginError, move |_| {
            e.set(e.get() + 1);
            Ok(())
        });

        let err = registry.init_all().await.unwrap_err();
        assert!(matches!(err, Error::PluginInit { ref id, .. } if id == "first"));
        assert_eq!(registry.state_of("first"), Some(LifecycleState::Error));
        assert_eq!(registry.state_of("second"), Some(LifecycleState::Registered));
        assert!(registry
            .descriptor("first")
            .and_then(|d| d.last_error)
            .is_some_and(|m| m.contains("refused to start")));
        assert_eq!(errors.get(), 1);
    }

    #[tokio::test]
    async fn test_failed_plugin_can_be_retried() {
        let (registry, _, log) = registry();
        let plugin = Rc::new(TestPlugin::new("flaky", &[], &log));
        plugin.fail_init.set(true);
        registry.register(plugin.clone(), None).unwrap();

        assert!(registry.init_plugin("flaky").await.is_err());
        plugin.fail_init.set(false);
        registry.init_plugin("flaky").await.unwrap();
        assert_eq!(registry.state_of("flaky"), Some(LifecycleState::Ready));
        assert!(registry.descriptor("flaky").unwrap().last_error.is_none());
    }

    #[tokio::test]
    async fn test_destroy_failure_still_resets_plugin() {
        let (registry, _, log) = registry();
        let mut plugin = TestPlugin::new("cast", &[], &log);
        plugin.fail_destroy = true;
        add(&registry, plugin);
        registry.init_plugin("cast").await.unwrap();

        registry.destroy_plugin("cast").await.unwrap();
        assert_eq!(registry.state_of("cast"), Some(LifecycleState::Registered));
        assert_eq!(*log.borrow(), vec!["init:cast", "destroy:cast", "cleanup:cast"]);

        registry.destroy_plugin("cast").await.unwrap();
        assert_eq!(log.borrow().len(), 3);
    }

    #[tokio::test]
    async fn test_destroy_all_reverses_order() {
        let (registry, _, log) = registry();
        add(&registry, TestPlugin::new("ui", &["core"], &log));
        add(&registry, TestPlugin::new("core", &[], &log));
        registry.init_all().await.unwrap();
        log.borrow_mut().clear();

        registry.destroy_all().await.unwrap();
        let destroys: Vec<_> = log.borrow().iter().filter(|l| l.starts_with("destroy")).cloned().collect();
        assert_eq!(destroys, vec!["destroy:ui", "destroy:core"]);
    }

    #[tokio::test]
    async fn test_unregister_tears_down_first() {
        let (registry, _, log) = registry();
        add(&registry, TestPlugin::new("pip", &[], &log));
        registry.init_plugin("pip").await.unwrap();

        registry.unregister("pip").await.unwrap();
        assert!(!registry.contains("pip"));
        assert!(log.borrow().contains(&"destroy:pip".to_string()));
        assert!(matches!(
            registry.unregister("pip").await,
            Err(Error::PluginNotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_context_sees_only_ready_plugins() {
        let (registry, _, log) = registry();
        add(&registry, TestPlugin::new("hls", &[], &log));
        add(&registry, TestPlugin::new("ui", &[], &log));
        let ctx = registry.inner.entries.borrow().get("ui").map(|e| e.context.clone()).unwrap();

        assert!(ctx.get_plugin("hls").is_none());
        registry.init_plugin("hls").await.unwrap();
        assert!(ctx.get_plugin("hls").is_some());
    }

    #[test]
    fn test_select_provider() {
        let (registry, _, log) = registry();
        assert!(registry.select_provider("clip.mp4").is_none());

        add(&registry, TestPlugin::new("analytics", &[], &log));
        add(&registry, TestPlugin::provider("progressive", &log));
        let provider = registry.select_provider("clip.mp4").unwrap();
        assert_eq!(provider.info().id, "progressive");
        assert!(registry.select_provider("live.m3u8").is_none());
    }

    #[test]
    fn test_default_config_applies() {
        let mut configs = HashMap::new();
        configs.insert("analytics".to_string(), serde_json::json!({ "endpoint": "https://beacon" }));
        let registry = PluginRegistry::with_options(Rc::new(StateStore::new()), EventBus::new(), None, configs);
        let log = Log::default();

        add(&registry, TestPlugin::new("analytics", &[], &log));
        let config = registry.descriptor("analytics").and_then(|d| d.config).unwrap();
        assert_eq!(config["endpoint"], "https://beacon");
    }

    #[test]
    fn test_resolve_order_preview() {
        let (registry, _, log) = registry();
        add(&registry, TestPlugin::new("d", &["b", "c"], &log));
        add(&registry, TestPlugin::new("b", &["a"], &log));
        add(&registry, TestPlugin::new("c", &["a"], &log));
        add(&registry, TestPlugin::new("a", &[], &log));

        let order = registry.resolve_order().unwrap();
        assert_eq!(order.first().map(String::as_str), Some("a"));
        assert_eq!(order.last().map(String::as_str), Some("d"));
        assert!(log.borrow().is_empty());
    }
}
