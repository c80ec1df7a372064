//! Demonstration plugins for headless sessions
//!
//! Nothing is decoded: providers simulate a media clock on top of the
//! runtime's state store so every runtime path can be exercised from a
//! terminal.

use async_trait::async_trait;
use kino_runtime::source::has_extension;
use kino_runtime::{
    EventName, LiveInfo, LiveSource, PlaybackStatus, PlayerEvent, Plugin, PluginCategory, PluginContext,
    PluginDependency, PluginInfo, QualityControl, QualityLevel, SourceProvider, StateChange, StateKey,
};
use semver::{Version, VersionReq};
use serde::Deserialize;
use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::rc::Rc;

/// Duration reported for sources that carry no hint
const DEFAULT_DURATION: f64 = 120.0;

// ============================================================================
// Media clock
// ============================================================================

/// Playback position shared by the simulated providers
#[derive(Default)]
struct Clock {
    ctx: RefCell<Option<PluginContext>>,
}

impl Clock {
    fn attach(&self, ctx: PluginContext) {
        *self.ctx.borrow_mut() = Some(ctx);
    }

    fn detach(&self) {
        self.ctx.borrow_mut().take();
    }

    /// Advance by `dt` seconds of media time. Returns `false` once ended or
    /// when not playing.
    fn advance(&self, dt: f64) -> anyhow::Result<bool> {
        let Some(ctx) = self.ctx.borrow().clone() else {
            return Ok(false);
        };
        let state = ctx.snapshot()?;
        if state.status != PlaybackStatus::Playing {
            return Ok(false);
        }

        let mut now = state.current_time + dt * state.playback_rate;
        if !state.is_live && state.duration > 0.0 {
            now = now.min(state.duration);
        }
        ctx.set_state(StateKey::CurrentTime, now)?;
        ctx.set_state(StateKey::Buffered, (now + 10.0).min(state.duration.max(now)))?;
        ctx.emit(PlayerEvent::TimeUpdate {
            current_time: now,
            duration: state.duration,
        });

        if !state.is_live && state.duration > 0.0 && now >= state.duration {
            ctx.set_state(StateKey::Status, PlaybackStatus::Ended)?;
            ctx.emit(PlayerEvent::Ended);
            return Ok(false);
        }
        Ok(true)
    }
}

/// Providers whose clock the host drives
pub trait Simulated {
    fn advance(&self, dt: f64) -> anyhow::Result<bool>;
}

/// `clip-90s.mp4` reports 90 seconds
fn duration_hint(source: &str) -> f64 {
    source
        .rsplit(['/', '-', '_'])
        .next()
        .and_then(|tail| tail.split_once('s'))
        .and_then(|(secs, _)| secs.parse::<f64>().ok())
        .filter(|secs| *secs > 0.0)
        .unwrap_or(DEFAULT_DURATION)
}

// ============================================================================
// Progressive provider
// ============================================================================

/// Plays single-file sources (mp4, webm, mov)
#[derive(Default)]
pub struct ProgressiveProvider {
    clock: Clock,
}

impl ProgressiveProvider {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait(?Send)]
impl Plugin for ProgressiveProvider {
    fn info(&self) -> PluginInfo {
        PluginInfo::new("progressive", "Progressive Provider", Version::new(1, 2, 0), PluginCategory::Provider)
            .with_description("Single-file playback for mp4, webm and mov")
    }

    async fn init(&self, ctx: PluginContext, _config: Option<&serde_json::Value>) -> anyhow::Result<()> {
        ctx.logger().debug("progressive provider attached");
        self.clock.attach(ctx);
        Ok(())
    }

    async fn destroy(&self) -> anyhow::Result<()> {
        self.clock.detach();
        Ok(())
    }

    fn as_source_provider(&self) -> Option<&dyn SourceProvider> {
        Some(self)
    }
}

#[async_trait(?Send)]
impl SourceProvider for ProgressiveProvider {
    fn can_play(&self, source: &str) -> bool {
        has_extension(source, &["mp4", "webm", "mov", "m4v"])
    }

    async fn load_source(&self, source: &str) -> anyhow::Result<()> {
        let Some(ctx) = self.clock.ctx.borrow().clone() else {
            anyhow::bail!("provider is not initialized");
        };
        ctx.set_state(StateKey::Duration, duration_hint(source))?;
        ctx.logger().info(format_args!("opened {source}"));
        Ok(())
    }
}

impl Simulated for ProgressiveProvider {
    fn advance(&self, dt: f64) -> anyhow::Result<bool> {
        self.clock.advance(dt)
    }
}

// ============================================================================
// Adaptive provider
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(default)]
struct AdaptiveConfig {
    /// Ladder heights, lowest first
    renditions: Vec<u32>,
    /// Seconds behind the live edge
    live_latency: f64,
}

impl Default for AdaptiveConfig {
    fn default() -> Self {
        Self {
            renditions: vec![360, 540, 720, 1080],
            live_latency: 6.0,
        }
    }
}

/// Plays HLS and DASH manifests with a quality ladder. Sources whose path
/// mentions `live` are treated as live streams.
#[derive(Default)]
pub struct AdaptiveProvider {
    clock: Clock,
    levels: RefCell<Vec<QualityLevel>>,
    pinned: Cell<Option<usize>>,
    live: RefCell<Option<LiveInfo>>,
    latency: Cell<f64>,
}

impl AdaptiveProvider {
    pub fn new() -> Self {
        Self::default()
    }
}

fn ladder(heights: &[u32]) -> Vec<QualityLevel> {
    heights
        .iter()
        .enumerate()
        .map(|(index, &height)| {
            // Rough bits-per-pixel budget for H.264
            let bitrate = u64::from(height) * u64::from(height) * 16 / 9 * 30 / 10;
            QualityLevel::new(index, bitrate, Some(height))
        })
        .collect()
}

#[async_trait(?Send)]
impl Plugin for AdaptiveProvider {
    fn info(&self) -> PluginInfo {
        PluginInfo::new("adaptive", "Adaptive Provider", Version::new(2, 0, 1), PluginCategory::Provider)
            .with_description("HLS and DASH playback with a quality ladder")
    }

    async fn init(&self, ctx: PluginContext, config: Option<&serde_json::Value>) -> anyhow::Result<()> {
        let config: AdaptiveConfig = match config {
            Some(value) => serde_json::from_value(value.clone())?,
            None => AdaptiveConfig::default(),
        };
        if config.renditions.is_empty() {
            anyhow::bail!("at least one rendition is required");
        }
        *self.levels.borrow_mut() = ladder(&config.renditions);
        self.latency.set(config.live_latency);
        self.clock.attach(ctx);
        Ok(())
    }

    async fn destroy(&self) -> anyhow::Result<()> {
        self.clock.detach();
        self.pinned.set(None);
        self.live.borrow_mut().take();
        Ok(())
    }

    fn as_source_provider(&self) -> Option<&dyn SourceProvider> {
        Some(self)
    }

    fn as_quality_control(&self) -> Option<&dyn QualityControl> {
        Some(self)
    }

    fn as_live_source(&self) -> Option<&dyn LiveSource> {
        Some(self)
    }
}

#[async_trait(?Send)]
impl SourceProvider for AdaptiveProvider {
    fn can_play(&self, source: &str) -> bool {
        has_extension(source, &["m3u8", "mpd"])
    }

    async fn load_source(&self, source: &str) -> anyhow::Result<()> {
        let Some(ctx) = self.clock.ctx.borrow().clone() else {
            anyhow::bail!("provider is not initialized");
        };
        self.pinned.set(None);

        let is_live = source.to_ascii_lowercase().contains("live");
        if is_live {
            *self.live.borrow_mut() = Some(LiveInfo {
                is_live: true,
                latency: self.latency.get(),
                dvr_window: 0.0,
                at_live_edge: true,
            });
        } else {
            self.live.borrow_mut().take();
            ctx.set_state(StateKey::Duration, duration_hint(source))?;
        }
        ctx.logger().info(format_args!("opened {source} ({} renditions)", self.levels.borrow().len()));
        Ok(())
    }
}

impl QualityControl for AdaptiveProvider {
    fn levels(&self) -> Vec<QualityLevel> {
        self.levels.borrow().clone()
    }

    fn set_level(&self, index: Option<usize>) -> anyhow::Result<()> {
        let count = self.levels.borrow().len();
        if let Some(index) = index {
            if index >= count {
                anyhow::bail!("quality level {index} does not exist ({count} available)");
            }
        }
        self.pinned.set(index);
        Ok(())
    }

    fn current_level(&self) -> Option<usize> {
        self.pinned.get()
    }
}

impl LiveSource for AdaptiveProvider {
    fn live_info(&self) -> Option<LiveInfo> {
        self.live.borrow().clone()
    }
}

impl Simulated for AdaptiveProvider {
    fn advance(&self, dt: f64) -> anyhow::Result<bool> {
        self.clock.advance(dt)
    }
}

// ============================================================================
// Analytics
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(default)]
struct AnalyticsConfig {
    /// Event names to count
    events: Vec<String>,
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            events: ["play", "pause", "seeked", "quality_change", "ended", "error"]
                .map(String::from)
                .to_vec(),
        }
    }
}

/// Counts player events and state changes
#[derive(Default)]
pub struct AnalyticsPlugin {
    counts: Rc<RefCell<BTreeMap<String, usize>>>,
    state_changes: Cell<usize>,
}

impl AnalyticsPlugin {
    pub fn new() -> Self {
        Self::default()
    }

    /// Event counts by name
    pub fn summary(&self) -> BTreeMap<String, usize> {
        self.counts.borrow().clone()
    }

    pub fn state_changes(&self) -> usize {
        self.state_changes.get()
    }
}

#[async_trait(?Send)]
impl Plugin for AnalyticsPlugin {
    fn info(&self) -> PluginInfo {
        PluginInfo::new("analytics", "Session Analytics", Version::new(1, 0, 3), PluginCategory::Analytics)
            .with_description("Counts playback events for a session summary")
    }

    async fn init(&self, ctx: PluginContext, config: Option<&serde_json::Value>) -> anyhow::Result<()> {
        let config: AnalyticsConfig = match config {
            Some(value) => serde_json::from_value(value.clone())?,
            None => AnalyticsConfig::default(),
        };

        for name in config.events {
            let event = EventName::from(name.as_str());
            let counts = Rc::clone(&self.counts);
            ctx.on(event, move |_| {
                *counts.borrow_mut().entry(name.clone()).or_default() += 1;
                Ok(())
            });
        }

        let counts = Rc::clone(&self.counts);
        let logger = ctx.logger().clone();
        ctx.register_cleanup(move || {
            let total: usize = counts.borrow().values().sum();
            logger.info(format_args!("session closed after {total} tracked events"));
            Ok(())
        });
        Ok(())
    }

    async fn destroy(&self) -> anyhow::Result<()> {
        Ok(())
    }

    fn on_state_change(&self, _change: &StateChange) -> anyhow::Result<()> {
        self.state_changes.set(self.state_changes.get() + 1);
        Ok(())
    }
}

// ============================================================================
// Status line
// ============================================================================

/// Renders a one-line status readout. Initialized after analytics so it can
/// tell whether the session is being recorded.
#[derive(Default)]
pub struct StatusLine {
    line: Rc<RefCell<String>>,
}

impl StatusLine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn line(&self) -> String {
        self.line.borrow().clone()
    }
}

fn analytics_requirement() -> VersionReq {
    VersionReq::parse("^1.0").unwrap_or(VersionReq::STAR)
}

#[async_trait(?Send)]
impl Plugin for StatusLine {
    fn info(&self) -> PluginInfo {
        PluginInfo::new("status-line", "Status Line", Version::new(0, 3, 0), PluginCategory::Ui)
            .with_description("Terminal status readout")
            .with_dependency(PluginDependency::new("analytics").with_version(analytics_requirement()))
    }

    async fn init(&self, ctx: PluginContext, _config: Option<&serde_json::Value>) -> anyhow::Result<()> {
        let recording = if ctx.get_plugin("analytics").is_some() { " [rec]" } else { "" };
        let line = Rc::clone(&self.line);
        let reader = ctx.clone();
        ctx.on_any_state_change(move |change| {
            if matches!(change.key, StateKey::Status | StateKey::CurrentTime | StateKey::CurrentQuality) {
                let state = reader.snapshot()?;
                let quality = match state.current_quality {
                    Some(index) => state
                        .quality_levels
                        .get(index)
                        .map_or_else(|| "?".to_string(), |level| level.label.clone()),
                    None => "auto".to_string(),
                };
                *line.borrow_mut() = format!(
                    "{} {:>7.1}s / {:.1}s  {}{}",
                    state.status, state.current_time, state.duration, quality, recording
                );
            }
            Ok(())
        })?;
        Ok(())
    }

    async fn destroy(&self) -> anyhow::Result<()> {
        self.line.borrow_mut().clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kino_runtime::Player;

    #[test]
    fn test_duration_hint() {
        assert_eq!(duration_hint("clip-90s.mp4"), 90.0);
        assert_eq!(duration_hint("https://cdn/trailer_45s.m3u8"), 45.0);
        assert_eq!(duration_hint("movie.mp4"), DEFAULT_DURATION);
    }

    #[test]
    fn test_ladder() {
        let levels = ladder(&[360, 720]);
        assert_eq!(levels.len(), 2);
        assert_eq!(levels[1].label, "720p");
        assert!(levels[1].bitrate > levels[0].bitrate);
    }

    #[tokio::test]
    async fn test_progressive_session_runs_to_end() {
        let player = Player::new();
        let provider = Rc::new(ProgressiveProvider::new());
        player.register_plugin(provider.clone()).unwrap();

        player.load("clip-2s.mp4").await.unwrap();
        player.play().unwrap();
        assert!(provider.advance(1.0).unwrap());
        assert!(!provider.advance(5.0).unwrap());

        let state = player.state().unwrap();
        assert_eq!(state.status, PlaybackStatus::Ended);
        assert_eq!(state.current_time, 2.0);
    }

    #[tokio::test]
    async fn test_adaptive_live_source() {
        let player = Player::new();
        player.register_plugin(Rc::new(AdaptiveProvider::new())).unwrap();

        player.load("https://cdn/live/channel.m3u8").await.unwrap();
        assert!(player.state().unwrap().is_live);
        assert_eq!(player.quality_levels().len(), 4);
        assert!(player.live_info().is_some_and(|info| info.at_live_edge));
        assert!(!player.set_quality(Some(10)).unwrap());
        assert!(player.set_quality(Some(2)).unwrap());
    }

    #[tokio::test]
    async fn test_analytics_counts_configured_events() {
        let player = Player::new();
        let analytics = Rc::new(AnalyticsPlugin::new());
        player
            .register_plugin_with_config(analytics.clone(), serde_json::json!({ "events": ["play", "pause"] }))
            .unwrap();
        player.register_plugin(Rc::new(ProgressiveProvider::new())).unwrap();
        player.init().await.unwrap();

        player.load("clip.mp4").await.unwrap();
        player.play().unwrap();
        player.pause().unwrap();
        player.play().unwrap();

        let summary = analytics.summary();
        assert_eq!(summary.get("play"), Some(&2));
        assert_eq!(summary.get("pause"), Some(&1));
        assert!(analytics.state_changes() > 0);
    }

    #[tokio::test]
    async fn test_status_line_follows_state() {
        let player = Player::new();
        let status = Rc::new(StatusLine::new());
        player.register_plugin(Rc::new(AnalyticsPlugin::new())).unwrap();
        player.register_plugin(status.clone()).unwrap();
        player.register_plugin(Rc::new(ProgressiveProvider::new())).unwrap();
        player.init().await.unwrap();

        player.load("clip-30s.mp4").await.unwrap();
        player.seek(12.0).unwrap();
        assert!(status.line().contains("12.0s"));
        assert!(status.line().ends_with("[rec]"));
    }
}
