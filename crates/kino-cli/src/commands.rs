//! CLI command implementations

use crate::output::{self, event_line, OutputFormat};
use crate::plugins::{AdaptiveProvider, AnalyticsPlugin, ProgressiveProvider, Simulated, StatusLine};
use indicatif::{ProgressBar, ProgressStyle};
use kino_runtime::source::extension;
use kino_runtime::{EventName, PlaybackStatus, Player, PlayerConfig, PlayerEvent, Subscription};
use std::cell::RefCell;
use std::path::Path;
use std::rc::Rc;
use std::time::Duration;
use tracing::{debug, info};

/// Events too frequent for the session log
const NOISY_EVENTS: [EventName; 2] = [EventName::TimeUpdate, EventName::StateChange];

/// Load `--config`, if given
pub fn load_config(path: Option<&Path>) -> anyhow::Result<PlayerConfig> {
    let Some(path) = path else {
        return Ok(PlayerConfig::default());
    };
    let json = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("cannot read config {}: {e}", path.display()))?;
    let config = PlayerConfig::from_json(&json)?;
    debug!(path = %path.display(), "Loaded configuration");
    Ok(config)
}

/// The demonstration plugins, registered on one player
pub struct DemoPlugins {
    pub progressive: Rc<ProgressiveProvider>,
    pub adaptive: Rc<AdaptiveProvider>,
    pub analytics: Rc<AnalyticsPlugin>,
    pub status: Rc<StatusLine>,
}

impl DemoPlugins {
    fn new() -> Self {
        Self {
            progressive: Rc::new(ProgressiveProvider::new()),
            adaptive: Rc::new(AdaptiveProvider::new()),
            analytics: Rc::new(AnalyticsPlugin::new()),
            status: Rc::new(StatusLine::new()),
        }
    }

    fn register(&self, player: &Player) -> anyhow::Result<()> {
        player.register_plugin(self.status.clone())?;
        player.register_plugin(self.analytics.clone())?;
        player.register_plugin(self.progressive.clone())?;
        player.register_plugin(self.adaptive.clone())?;
        Ok(())
    }

    /// Clock of the provider with this id
    fn clock(&self, provider: &str) -> Option<&dyn Simulated> {
        match provider {
            "progressive" => Some(&*self.progressive),
            "adaptive" => Some(&*self.adaptive),
            _ => None,
        }
    }
}

/// Build a player with every demonstration plugin registered
pub fn build_player(config: PlayerConfig) -> anyhow::Result<(Player, DemoPlugins)> {
    let player = Player::with_config(config)?;
    let plugins = DemoPlugins::new();
    plugins.register(&player)?;
    Ok((player, plugins))
}

/// Scripted playback session options
#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub source: String,
    /// Media seconds advanced per tick
    pub step: f64,
    /// Upper bound on ticks
    pub ticks: usize,
    /// Wall-clock delay between ticks
    pub interval: Duration,
    pub seek: Option<f64>,
    pub quality: Option<usize>,
    pub rate: Option<f64>,
    /// Log every event, including time updates and state changes
    pub all_events: bool,
}

/// Prints to stdout, or above the progress bar while one is shown
#[derive(Clone, Default)]
struct Console {
    bar: Rc<RefCell<Option<ProgressBar>>>,
}

impl Console {
    fn println(&self, line: String) {
        match self.bar.borrow().as_ref() {
            Some(bar) => bar.println(line),
            None => println!("{line}"),
        }
    }
}

fn log_events(player: &Player, console: &Console, all_events: bool) -> Vec<Subscription> {
    EventName::BUILTIN
        .iter()
        .filter(|name| all_events || !NOISY_EVENTS.contains(name))
        .map(|name| {
            let console = console.clone();
            player.on(name.clone(), move |event| {
                console.println(event_line(event));
                Ok(())
            })
        })
        .collect()
}

/// Run a scripted session against `options.source`
pub async fn play(config: PlayerConfig, options: SessionOptions, format: OutputFormat) -> anyhow::Result<()> {
    let (player, plugins) = build_player(config)?;
    let console = Console::default();
    let _log = log_events(&player, &console, options.all_events);

    println!("Session {} for {}", player.id(), options.source);
    player.init().await?;
    player.load(&options.source).await?;

    let loaded = player.state()?;
    if loaded.status == PlaybackStatus::Error {
        let reason = loaded.error.map(|e| e.message).unwrap_or_default();
        player.destroy().await?;
        anyhow::bail!("session failed: {reason}");
    }

    if let Some(rate) = options.rate {
        player.set_playback_rate(rate)?;
    }
    if let Some(level) = options.quality {
        player.set_quality(Some(level))?;
    }
    if !loaded.autoplay {
        player.play()?;
    }

    let provider = player.active_provider_id().unwrap_or_default();
    let bar = ProgressBar::new(options.ticks as u64);
    bar.set_style(
        ProgressStyle::default_bar()
            .template("[{bar:40.cyan/blue}] {pos}/{len} ticks | {msg}")?
            .progress_chars("█▓░"),
    );
    *console.bar.borrow_mut() = Some(bar.clone());

    let seek_tick = options.seek.map(|_| options.ticks / 2);
    for tick in 0..options.ticks {
        if seek_tick == Some(tick) {
            if let Some(position) = options.seek {
                player.seek(position)?;
            }
        }
        let running = match plugins.clock(&provider) {
            Some(clock) => clock.advance(options.step)?,
            None => false,
        };
        bar.set_position(tick as u64 + 1);
        bar.set_message(plugins.status.line());
        if !running {
            break;
        }
        tokio::time::sleep(options.interval).await;
    }
    bar.finish_and_clear();
    console.bar.borrow_mut().take();

    player.pause()?;
    let state = player.state()?;
    println!("\nFinal state:\n{}", output::format_state(&state, format)?);

    let summary = plugins.analytics.summary();
    if format == OutputFormat::Json {
        println!("{}", output::to_json(&summary)?);
    } else {
        println!("\nAnalytics ({} state changes):", plugins.analytics.state_changes());
        for (event, count) in &summary {
            println!("  {event:<16} {count}");
        }
    }

    player.destroy().await?;
    info!("Session finished");
    Ok(())
}

/// List the demonstration plugins, optionally after initializing them
pub async fn plugins(config: PlayerConfig, init: bool, format: OutputFormat) -> anyhow::Result<()> {
    let (player, _plugins) = build_player(config)?;
    if init {
        player.init().await?;
    }

    let registry = player.registry();
    println!("{}", output::format_plugins(&registry.descriptors(), format)?);
    if format != OutputFormat::Json {
        println!("\nInitialization order: {}", registry.resolve_order()?.join(" -> "));
        let stats = registry.stats();
        println!(
            "{} plugins: {} registered, {} ready, {} failed",
            stats.total, stats.registered, stats.ready, stats.failed
        );
    }

    player.destroy().await?;
    Ok(())
}

/// Show which provider would play `source`
pub fn probe(source: &str) -> anyhow::Result<()> {
    let (player, _plugins) = build_player(PlayerConfig::default())?;
    println!("Source:    {source}");
    println!("Extension: {}", extension(source).as_deref().unwrap_or("-"));
    match player.registry().select_provider(source) {
        Some(provider) => {
            let info = provider.info();
            println!("Provider:  {} ({} {})", info.id, info.name, info.version);
        }
        None => println!("Provider:  none"),
    }
    Ok(())
}

/// Print the initial player state
pub fn state(config: PlayerConfig, format: OutputFormat) -> anyhow::Result<()> {
    let player = Player::with_config(config)?;
    println!("{}", output::format_state(&player.state()?, format)?);
    Ok(())
}

/// Whether an event name carries data, as shown by `events`
fn payload_label(name: &EventName) -> &'static str {
    if name.is_lifecycle() {
        "no payload"
    } else {
        "payload"
    }
}

/// List the built-in event names
pub fn events(format: OutputFormat) -> anyhow::Result<()> {
    if format == OutputFormat::Json {
        let names: Vec<&str> = EventName::BUILTIN.iter().map(EventName::as_str).collect();
        println!("{}", output::to_json(&names)?);
        return Ok(());
    }
    for name in EventName::BUILTIN.iter() {
        println!("  {:<20} {}", name.as_str(), payload_label(name));
    }
    // Custom events are accepted under any other name
    let custom = PlayerEvent::custom("chapter", serde_json::json!({ "title": "Intro" }));
    println!("  {:<20} custom, e.g. {}", "<any>", event_line(&custom).trim());
    Ok(())
}
