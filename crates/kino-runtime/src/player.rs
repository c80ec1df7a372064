//! Player - composition root
//!
//! Owns one state store, one event bus and one plugin registry, and forwards
//! the public playback API to them or to the provider that currently owns
//! playback.

use crate::{
    config::PlayerConfig,
    error::{Error, Result},
    events::{EventBus, EventName, PlayerEvent},
    plugin::{Plugin, PluginCategory, PluginRegistry},
    state::{StateKey, StateSnapshot, StateStore, StateValue},
    subscription::Subscription,
    types::*,
};
use std::cell::{Cell, RefCell};
use std::future::Future;
use std::rc::Rc;
use tracing::{debug, info, instrument, warn};

/// Embeddable media player
pub struct Player {
    /// Unique player ID
    id: PlayerId,
    config: PlayerConfig,
    store: Rc<StateStore>,
    bus: EventBus<PlayerEvent>,
    registry: PluginRegistry,
    /// Provider that loaded the current source
    active_provider: RefCell<Option<String>>,
    /// Store and bus listeners installed by the player itself
    wiring: RefCell<Vec<Subscription>>,
    destroyed: Cell<bool>,
}

impl Player {
    /// Create a player with default configuration
    pub fn new() -> Self {
        Self::build(PlayerConfig::default(), StateStore::new())
    }

    /// Create a player from a validated configuration
    pub fn with_config(config: PlayerConfig) -> Result<Self> {
        config.validate()?;
        let store = StateStore::with_overrides(config.initial_state.entries())?;
        Ok(Self::build(config, store))
    }

    fn build(config: PlayerConfig, store: StateStore) -> Self {
        let id = PlayerId::new();
        let store = Rc::new(store);
        let bus = EventBus::with_max_listeners(config.max_listeners);
        let registry = PluginRegistry::with_options(
            Rc::clone(&store),
            bus.clone(),
            config.mount_point.clone(),
            config.plugins.clone(),
        );

        let player = Self {
            id,
            config,
            store,
            bus,
            registry,
            active_provider: RefCell::new(None),
            wiring: RefCell::new(Vec::new()),
            destroyed: Cell::new(false),
        };
        player.wire();
        info!(player = %id, "Player created");
        player
    }

    /// Re-publish store changes on the bus and fan state changes and errors
    /// out to ready plugins
    fn wire(&self) {
        let bus = self.bus.clone();
        let registry = self.registry.downgrade();
        let state_changes = self.store.subscribe_any(move |change| {
            bus.emit(PlayerEvent::StateChange(change.clone()));
            if let Some(registry) = registry.upgrade() {
                registry.notify_state_change(change);
            }
            Ok(())
        });

        let registry = self.registry.downgrade();
        let errors = self.bus.on(EventName::Error, move |event| {
            if let (PlayerEvent::Error(err), Some(registry)) = (event, registry.upgrade()) {
                registry.notify_error(err);
            }
            Ok(())
        });

        let mut wiring = self.wiring.borrow_mut();
        // A freshly built store is never destroyed
        if let Ok(sub) = state_changes {
            wiring.push(sub);
        }
        wiring.push(errors);
    }

    pub fn id(&self) -> PlayerId {
        self.id
    }

    pub fn config(&self) -> &PlayerConfig {
        &self.config
    }

    pub fn store(&self) -> &StateStore {
        &self.store
    }

    pub fn bus(&self) -> &EventBus<PlayerEvent> {
        &self.bus
    }

    pub fn registry(&self) -> &PluginRegistry {
        &self.registry
    }

    fn ensure_alive(&self) -> Result<()> {
        if self.destroyed.get() {
            Err(Error::PlayerDestroyed)
        } else {
            Ok(())
        }
    }

    // =========================================================================
    // Plugins
    // =========================================================================

    pub fn register_plugin(&self, plugin: Rc<dyn Plugin>) -> Result<()> {
        self.ensure_alive()?;
        self.registry.register(plugin, None)
    }

    pub fn register_plugin_with_config(&self, plugin: Rc<dyn Plugin>, config: serde_json::Value) -> Result<()> {
        self.ensure_alive()?;
        self.registry.register(plugin, Some(config))
    }

    /// Plugin by id, in any lifecycle state
    pub fn plugin(&self, id: &str) -> Option<Rc<dyn Plugin>> {
        self.registry.get(id)
    }

    /// Initialize every non-provider plugin in dependency order.
    ///
    /// Providers are initialized on demand by [`Player::load`], unless
    /// another plugin depends on them.
    #[instrument(skip(self), fields(player = %self.id))]
    pub async fn init(&self) -> Result<()> {
        self.ensure_alive()?;
        for id in self.registry.resolve_order()? {
            let is_provider = self
                .registry
                .descriptor(&id)
                .is_some_and(|d| d.info.category == PluginCategory::Provider);
            if !is_provider {
                self.registry.init_plugin(&id).await?;
            }
        }
        info!(ready = self.registry.ready_ids().len(), "Player ready");
        self.bus.emit(PlayerEvent::Ready);
        Ok(())
    }

    // =========================================================================
    // Loading
    // =========================================================================

    /// Load `source` through the first provider that accepts it.
    ///
    /// A missing provider or a failing `load_source` is reported as a fatal
    /// error event, not returned. A provider whose `init` fails is reported
    /// and returned.
    #[instrument(skip(self), fields(player = %self.id))]
    pub async fn load(&self, source: &str) -> Result<()> {
        self.ensure_alive()?;

        let Some(provider) = self.registry.select_provider(source) else {
            warn!(source, "No provider can play source");
            self.report(PlayerErrorInfo::fatal(
                ErrorCode::NoProvider,
                format!("No provider can play '{source}'"),
            ))?;
            return Ok(());
        };
        let provider_id = provider.info().id;

        let previous = self.active_provider.borrow_mut().take();
        if let Some(previous) = previous {
            debug!(provider = %previous, "Tearing down previous provider");
            self.registry.destroy_plugin(&previous).await?;
        }

        self.bus.emit(PlayerEvent::LoadStart {
            source: source.to_string(),
        });
        self.store.update_keys([
            (StateKey::Source, source.into()),
            (StateKey::Status, PlaybackStatus::Loading.into()),
            (StateKey::Error, StateValue::Null),
            (StateKey::CurrentTime, 0.0.into()),
            (StateKey::Duration, 0.0.into()),
            (StateKey::Buffered, 0.0.into()),
            (StateKey::QualityLevels, Vec::<QualityLevel>::new().into()),
            (StateKey::CurrentQuality, StateValue::Null),
            (StateKey::IsLive, false.into()),
        ])?;

        if let Err(e) = self.registry.init_plugin(&provider_id).await {
            self.report(PlayerErrorInfo::fatal(ErrorCode::PluginInit, e.to_string()).with_plugin(&provider_id))?;
            return Err(e);
        }
        *self.active_provider.borrow_mut() = Some(provider_id.clone());

        let Some(loader) = provider.as_source_provider() else {
            return self.report(PlayerErrorInfo::fatal(
                ErrorCode::NoProvider,
                format!("Plugin '{provider_id}' is not a source provider"),
            ));
        };
        if let Err(e) = loader.load_source(source).await {
            warn!(provider = %provider_id, error = %e, "Source failed to load");
            return self.report(PlayerErrorInfo::fatal(ErrorCode::LoadFailed, format!("{e:#}")).with_plugin(&provider_id));
        }

        self.after_load(provider.as_ref(), &provider_id)?;
        info!(source, provider = %provider_id, "Source loaded");
        self.bus.emit(PlayerEvent::Loaded {
            source: source.to_string(),
            provider: provider_id,
        });

        if self.store.get(StateKey::Autoplay)?.as_bool() == Some(true) {
            self.play()?;
        }
        Ok(())
    }

    /// Publish what the provider knows once the source is loaded
    fn after_load(&self, provider: &dyn Plugin, provider_id: &str) -> Result<()> {
        if self.store.get(StateKey::Status)?.as_status() == Some(PlaybackStatus::Loading) {
            self.store.set(StateKey::Status, PlaybackStatus::Ready)?;
        }

        if let Some(control) = provider.as_quality_control() {
            let levels = control.levels();
            if !levels.is_empty() {
                debug!(provider = %provider_id, levels = levels.len(), "Quality levels available");
                self.store.update_keys([
                    (StateKey::QualityLevels, StateValue::from(levels.clone())),
                    (StateKey::CurrentQuality, StateValue::from(control.current_level())),
                    (StateKey::AutoQuality, StateValue::from(control.current_level().is_none())),
                ])?;
                self.bus.emit(PlayerEvent::LevelsLoaded { levels });
            }
        }

        if let Some(info) = provider.as_live_source().and_then(|live| live.live_info()) {
            self.store.set(StateKey::IsLive, info.is_live)?;
            self.bus.emit(PlayerEvent::LiveUpdate { info });
        }
        Ok(())
    }

    /// Record an error in the store and publish it
    fn report(&self, err: PlayerErrorInfo) -> Result<()> {
        if err.fatal {
            self.store.set(StateKey::Status, PlaybackStatus::Error)?;
        }
        self.store.set(StateKey::Error, err.clone())?;
        self.bus.emit(PlayerEvent::Error(err));
        Ok(())
    }

    fn active_provider(&self) -> Option<Rc<dyn Plugin>> {
        let id = self.active_provider.borrow().clone()?;
        self.registry.get_ready(&id)
    }

    pub fn active_provider_id(&self) -> Option<String> {
        self.active_provider.borrow().clone()
    }

    // =========================================================================
    // Playback control
    // =========================================================================

    /// Start playback. Returns `false` when nothing is loaded.
    pub fn play(&self) -> Result<bool> {
        self.ensure_alive()?;
        let status = self.status()?;
        if !status.has_source() {
            debug!(%status, "Ignoring play without a source");
            return Ok(false);
        }
        if status == PlaybackStatus::Playing {
            return Ok(true);
        }
        if status == PlaybackStatus::Ended {
            self.store.set(StateKey::CurrentTime, 0.0)?;
        }
        self.bus.emit(PlayerEvent::Play);
        self.store.set(StateKey::Status, PlaybackStatus::Playing)?;
        self.bus.emit(PlayerEvent::Playing);
        Ok(true)
    }

    /// Pause playback. Returns `false` when not playing.
    pub fn pause(&self) -> Result<bool> {
        self.ensure_alive()?;
        if !matches!(self.status()?, PlaybackStatus::Playing | PlaybackStatus::Buffering) {
            return Ok(false);
        }
        self.store.set(StateKey::Status, PlaybackStatus::Paused)?;
        self.bus.emit(PlayerEvent::Pause);
        Ok(true)
    }

    /// Seek to `time` seconds, clamped to the known duration.
    ///
    /// Returns `false` when nothing is loaded or an interceptor cancelled the
    /// seek.
    pub fn seek(&self, time: f64) -> Result<bool> {
        self.ensure_alive()?;
        if time.is_nan() || !self.status()?.has_source() {
            return Ok(false);
        }
        let snapshot = self.store.snapshot()?;
        let mut to = time.max(0.0);
        if snapshot.duration > 0.0 && !snapshot.is_live {
            to = to.min(snapshot.duration);
        }

        if !self.bus.emit(PlayerEvent::Seeking {
            from: snapshot.current_time,
            to,
        }) {
            debug!(to, "Seek cancelled");
            return Ok(false);
        }
        self.store.set(StateKey::CurrentTime, to)?;
        self.bus.emit(PlayerEvent::Seeked { position: to });
        Ok(true)
    }

    /// Set volume, clamped to `[0, 1]`
    pub fn set_volume(&self, volume: f64) -> Result<bool> {
        self.ensure_alive()?;
        if volume.is_nan() {
            return Ok(false);
        }
        let changed = self.store.set(StateKey::Volume, volume.clamp(0.0, 1.0))?;
        if changed {
            self.emit_volume()?;
        }
        Ok(changed)
    }

    pub fn set_muted(&self, muted: bool) -> Result<bool> {
        self.ensure_alive()?;
        let changed = self.store.set(StateKey::Muted, muted)?;
        if changed {
            self.emit_volume()?;
        }
        Ok(changed)
    }

    fn emit_volume(&self) -> Result<()> {
        let snapshot = self.store.snapshot()?;
        self.bus.emit(PlayerEvent::VolumeChange {
            volume: snapshot.volume,
            muted: snapshot.muted,
        });
        Ok(())
    }

    pub fn set_playback_rate(&self, rate: f64) -> Result<bool> {
        self.ensure_alive()?;
        if !rate.is_finite() || rate <= 0.0 {
            return Err(Error::InvalidConfig(format!("playback rate must be positive, got {rate}")));
        }
        let changed = self.store.set(StateKey::PlaybackRate, rate)?;
        if changed {
            self.bus.emit(PlayerEvent::RateChange { rate });
        }
        Ok(changed)
    }

    fn status(&self) -> Result<PlaybackStatus> {
        Ok(self.store.get(StateKey::Status)?.as_status().unwrap_or_default())
    }

    // =========================================================================
    // Quality and live metadata
    // =========================================================================

    /// Levels of the active provider; empty when it has none
    pub fn quality_levels(&self) -> Vec<QualityLevel> {
        self.active_provider()
            .and_then(|p| p.as_quality_control().map(|q| q.levels()))
            .unwrap_or_default()
    }

    /// Current level of the active provider; `None` when automatic or unsupported
    pub fn current_quality(&self) -> Option<usize> {
        self.active_provider()
            .and_then(|p| p.as_quality_control().and_then(|q| q.current_level()))
    }

    /// Pin a quality level, or `None` for automatic selection.
    ///
    /// Returns `false` when the active provider has no quality control or
    /// rejected the level.
    pub fn set_quality(&self, level: Option<usize>) -> Result<bool> {
        self.ensure_alive()?;
        let Some(provider) = self.active_provider() else {
            return Ok(false);
        };
        let Some(control) = provider.as_quality_control() else {
            return Ok(false);
        };
        if let Err(e) = control.set_level(level) {
            let id = provider.info().id;
            warn!(provider = %id, ?level, error = %e, "Quality change rejected");
            self.report(PlayerErrorInfo::new(ErrorCode::Unknown, format!("{e:#}"), false).with_plugin(id))?;
            return Ok(false);
        }

        let current = control.current_level();
        self.store.update_keys([
            (StateKey::CurrentQuality, StateValue::from(current)),
            (StateKey::AutoQuality, StateValue::from(level.is_none())),
        ])?;
        self.bus.emit(PlayerEvent::QualityChange {
            level: current,
            auto: level.is_none(),
        });
        Ok(true)
    }

    /// Live metadata of the active provider
    pub fn live_info(&self) -> Option<LiveInfo> {
        self.active_provider()
            .and_then(|p| p.as_live_source().and_then(|l| l.live_info()))
    }

    // =========================================================================
    // Events and state
    // =========================================================================

    pub fn on(&self, name: EventName, handler: impl Fn(&PlayerEvent) -> anyhow::Result<()> + 'static) -> Subscription {
        self.bus.on(name, handler)
    }

    pub fn once(&self, name: EventName, handler: impl Fn(&PlayerEvent) -> anyhow::Result<()> + 'static) -> Subscription {
        self.bus.once(name, handler)
    }

    pub fn on_async<F, Fut>(&self, name: EventName, handler: F) -> Subscription
    where
        F: Fn(PlayerEvent) -> Fut + 'static,
        Fut: Future<Output = anyhow::Result<()>> + 'static,
    {
        self.bus.on_async(name, handler)
    }

    pub fn intercept(
        &self,
        name: EventName,
        interceptor: impl Fn(&PlayerEvent) -> anyhow::Result<Option<PlayerEvent>> + 'static,
    ) -> Subscription {
        self.bus.intercept(name, interceptor)
    }

    /// Point-in-time copy of every state field
    pub fn state(&self) -> Result<StateSnapshot> {
        self.ensure_alive()?;
        self.store.snapshot()
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed.get()
    }

    /// Tear down every plugin, then release the bus and the store.
    ///
    /// Later calls are no-ops.
    #[instrument(skip(self), fields(player = %self.id))]
    pub async fn destroy(&self) -> Result<()> {
        if self.destroyed.get() {
            return Ok(());
        }
        self.bus.emit(PlayerEvent::Destroy);
        self.registry.clear().await?;
        self.destroyed.set(true);

        for sub in self.wiring.borrow_mut().drain(..) {
            sub.unsubscribe();
        }
        self.active_provider.borrow_mut().take();
        self.bus.remove_all_listeners(None);
        self.store.destroy();
        info!("Player destroyed");
        Ok(())
    }
}

impl Default for Player {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Player {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Player")
            .field("id", &self.id)
            .field("plugins", &self.registry.len())
            .field("active_provider", &*self.active_provider.borrow())
            .field("destroyed", &self.destroyed.get())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugin::{PluginContext, PluginInfo, QualityControl, SourceProvider};
    use async_trait::async_trait;
    use semver::Version;

    struct Progressive {
        fail_load: bool,
        levels: Vec<QualityLevel>,
        current: Cell<Option<usize>>,
    }

    impl Progressive {
        fn new() -> Self {
            Self {
                fail_load: false,
                levels: vec![QualityLevel::new(0, 800_000, Some(360)), QualityLevel::new(1, 2_500_000, Some(720))],
                current: Cell::new(None),
            }
        }
    }

    #[async_trait(?Send)]
    impl Plugin for Progressive {
        fn info(&self) -> PluginInfo {
            PluginInfo::new("progressive", "Progressive", Version::new(1, 0, 0), PluginCategory::Provider)
        }

        async fn init(&self, _ctx: PluginContext, _config: Option<&serde_json::Value>) -> anyhow::Result<()> {
            Ok(())
        }

        async fn destroy(&self) -> anyhow::Result<()> {
            Ok(())
        }

        fn as_source_provider(&self) -> Option<&dyn SourceProvider> {
            Some(self)
        }

        fn as_quality_control(&self) -> Option<&dyn QualityControl> {
            Some(self)
        }
    }

    #[async_trait(?Send)]
    impl SourceProvider for Progressive {
        fn can_play(&self, source: &str) -> bool {
            crate::source::has_extension(source, &["mp4", "webm"])
        }

        async fn load_source(&self, source: &str) -> anyhow::Result<()> {
            if self.fail_load {
                anyhow::bail!("404 for {source}");
            }
            Ok(())
        }
    }

    impl QualityControl for Progressive {
        fn levels(&self) -> Vec<QualityLevel> {
            self.levels.clone()
        }

        fn set_level(&self, index: Option<usize>) -> anyhow::Result<()> {
            if index.is_some_and(|i| i >= self.levels.len()) {
                anyhow::bail!("no level {index:?}");
            }
            self.current.set(index);
            Ok(())
        }

        fn current_level(&self) -> Option<usize> {
            self.current.get()
        }
    }

    fn errors(player: &Player) -> Rc<RefCell<Vec<PlayerErrorInfo>>> {
        let errors = Rc::new(RefCell::new(Vec::new()));
        let e = errors.clone();
        player.on(EventName::Error, move |event| {
            if let PlayerEvent::Error(err) = event {
                e.borrow_mut().push(err.clone());
            }
            Ok(())
        });
        errors
    }

    #[tokio::test]
    async fn test_load_without_provider_reports_fatal_error() {
        let player = Player::new();
        let errors = errors(&player);

        player.load("clip.mp4").await.unwrap();
        let errors = errors.borrow();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].code, ErrorCode::NoProvider);
        assert!(errors[0].fatal);
        assert_eq!(player.state().unwrap().status, PlaybackStatus::Error);
    }

    #[tokio::test]
    async fn test_load_initializes_provider_and_publishes_levels() {
        let player = Player::new();
        player.register_plugin(Rc::new(Progressive::new())).unwrap();

        player.load("clip.mp4").await.unwrap();
        let state = player.state().unwrap();
        assert_eq!(state.status, PlaybackStatus::Ready);
        assert_eq!(state.source.as_deref(), Some("clip.mp4"));
        assert_eq!(state.quality_levels.len(), 2);
        assert_eq!(player.active_provider_id().as_deref(), Some("progressive"));
        assert_eq!(player.quality_levels().len(), 2);
    }

    #[tokio::test]
    async fn test_load_failure_is_an_event() {
        let player = Player::new();
        let mut provider = Progressive::new();
        provider.fail_load = true;
        player.register_plugin(Rc::new(provider)).unwrap();
        let errors = errors(&player);

        player.load("clip.mp4").await.unwrap();
        assert_eq!(errors.borrow()[0].code, ErrorCode::LoadFailed);
        assert_eq!(errors.borrow()[0].plugin.as_deref(), Some("progressive"));
    }

    #[tokio::test]
    async fn test_playback_controls() {
        let player = Player::new();
        assert!(!player.play().unwrap());

        player.register_plugin(Rc::new(Progressive::new())).unwrap();
        player.load("clip.mp4").await.unwrap();
        assert!(player.play().unwrap());
        assert_eq!(player.state().unwrap().status, PlaybackStatus::Playing);
        assert!(player.pause().unwrap());
        assert!(!player.pause().unwrap());

        player.set_volume(3.0).unwrap();
        assert_eq!(player.state().unwrap().volume, 1.0);
        assert!(player.set_playback_rate(0.0).is_err());
    }

    #[tokio::test]
    async fn test_seek_can_be_cancelled() {
        let player = Player::new();
        player.register_plugin(Rc::new(Progressive::new())).unwrap();
        player.load("clip.mp4").await.unwrap();

        assert!(player.seek(12.0).unwrap());
        assert_eq!(player.state().unwrap().current_time, 12.0);

        player.intercept(EventName::Seeking, |_| Ok(None));
        assert!(!player.seek(30.0).unwrap());
        assert_eq!(player.state().unwrap().current_time, 12.0);
    }

    #[tokio::test]
    async fn test_state_changes_are_republished() {
        let player = Player::new();
        let keys = Rc::new(RefCell::new(Vec::new()));
        let k = keys.clone();
        player.on(EventName::StateChange, move |event| {
            if let PlayerEvent::StateChange(change) = event {
                k.borrow_mut().push(change.key);
            }
            Ok(())
        });

        player.set_muted(true).unwrap();
        assert_eq!(*keys.borrow(), vec![StateKey::Muted]);
    }

    #[tokio::test]
    async fn test_set_quality() {
        let player = Player::new();
        assert!(!player.set_quality(Some(1)).unwrap());

        player.register_plugin(Rc::new(Progressive::new())).unwrap();
        player.load("clip.webm").await.unwrap();
        assert!(player.set_quality(Some(1)).unwrap());
        assert_eq!(player.current_quality(), Some(1));
        let state = player.state().unwrap();
        assert_eq!(state.current_quality, Some(1));
        assert!(!state.auto_quality);

        assert!(!player.set_quality(Some(9)).unwrap());
    }

    #[tokio::test]
    async fn test_destroy_is_final() {
        let player = Player::new();
        player.register_plugin(Rc::new(Progressive::new())).unwrap();
        player.load("clip.mp4").await.unwrap();

        player.destroy().await.unwrap();
        player.destroy().await.unwrap();
        assert!(player.is_destroyed());
        assert!(matches!(player.state(), Err(Error::PlayerDestroyed)));
        assert!(player.registry().is_empty());
    }

    #[test]
    fn test_config_overrides_initial_state() {
        let config = PlayerConfig::from_json(r#"{ "initial_state": { "volume": 0.3, "muted": true } }"#).unwrap();
        let player = Player::with_config(config).unwrap();
        let state = player.state().unwrap();
        assert_eq!(state.volume, 0.3);
        assert!(state.muted);
    }
}
