//! Kino CLI - Headless Player Host
//!
//! Features:
//! - Scripted playback sessions against simulated providers
//! - Plugin listing with dependency order and lifecycle state
//! - Provider probing for a source
//! - State and event catalog dumps

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

mod commands;
mod output;
mod plugins;

use output::OutputFormat;

/// Kino CLI - Player runtime host
#[derive(Parser)]
#[command(name = "kino-cli")]
#[command(author = "Purple Squirrel Media")]
#[command(version)]
#[command(about = "Headless host for the Kino player runtime", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output format (text, json, table)
    #[arg(short, long, default_value = "text", global = true)]
    format: String,

    /// Player configuration file (JSON)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a scripted playback session
    Play {
        /// Source URL or path (mp4/webm/mov, m3u8/mpd)
        source: String,

        /// Media seconds advanced per tick
        #[arg(long, default_value = "1.0")]
        step: f64,

        /// Maximum number of ticks
        #[arg(short, long, default_value = "20")]
        ticks: usize,

        /// Delay between ticks in milliseconds
        #[arg(short, long, default_value = "100")]
        interval: u64,

        /// Seek to this position halfway through the session
        #[arg(short, long)]
        seek: Option<f64>,

        /// Pin a quality level
        #[arg(short, long)]
        quality: Option<usize>,

        /// Playback rate
        #[arg(short, long)]
        rate: Option<f64>,

        /// Initial volume (0-1)
        #[arg(long)]
        volume: Option<f64>,

        /// Start muted
        #[arg(long)]
        muted: bool,

        /// Start playing as soon as the source loads
        #[arg(long)]
        autoplay: bool,

        /// Also log time updates and state changes
        #[arg(long)]
        all_events: bool,
    },

    /// List demonstration plugins
    Plugins {
        /// Initialize plugins before listing
        #[arg(long)]
        init: bool,
    },

    /// Show which provider would play a source
    Probe {
        /// Source URL or path
        source: String,
    },

    /// Print the initial player state
    State,

    /// List built-in event names
    Events,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize tracing; RUST_LOG wins over --verbose
    let level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)))
        .with_writer(std::io::stderr)
        .init();
    kino_runtime::init();

    let format = OutputFormat::from(cli.format.as_str());
    let mut config = commands::load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Play {
            source,
            step,
            ticks,
            interval,
            seek,
            quality,
            rate,
            volume,
            muted,
            autoplay,
            all_events,
        } => {
            let overrides = &mut config.initial_state;
            overrides.volume = volume.or(overrides.volume);
            if muted {
                overrides.muted = Some(true);
            }
            if autoplay {
                overrides.autoplay = Some(true);
            }
            overrides.source = Some(source.clone());
            config.validate()?;

            let options = commands::SessionOptions {
                source,
                step,
                ticks,
                interval: Duration::from_millis(interval),
                seek,
                quality,
                rate,
                all_events,
            };
            commands::play(config, options, format).await?;
        }
        Commands::Plugins { init } => {
            commands::plugins(config, init, format).await?;
        }
        Commands::Probe { source } => {
            commands::probe(&source)?;
        }
        Commands::State => {
            commands::state(config, format)?;
        }
        Commands::Events => {
            commands::events(format)?;
        }
    }

    Ok(())
}
