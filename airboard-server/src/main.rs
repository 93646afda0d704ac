//! airboard: departures board for the airport you are standing in.

use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use thiserror::Error;

use airboard_core::config::{self, Config, SourceMode};
use airboard_core::directory::AirportDirectory;
use airboard_core::feed::{Clock, FixedClock, SystemClock};
use airboard_core::resolver::{Resolution, Resolver};
use airboard_core::types::{AirboardError, AirportRecord, Coordinate};

mod board;
mod controller;
mod lifecycle;
mod logging;
mod source;
mod web;

use controller::FeedController;
use lifecycle::{LifecycleObserver, LifecycleState};
use source::{FetchError, FixtureFlightSource, FlightSource, HttpFlightSource};

#[derive(Debug, Error)]
enum CliError {
    #[error(transparent)]
    Core(#[from] AirboardError),
    #[error("flight source: {0}")]
    Source(#[from] FetchError),
    #[error("This app only works inside an airport.")]
    Unsupported,
}

#[derive(Parser)]
#[command(name = "airboard", version, about = "Live departures for the airport you are in")]
struct Cli {
    /// Config file (default: ~/.airboard/config.yaml)
    #[arg(long, global = true, env = "AIRBOARD_CONFIG")]
    config: Option<PathBuf>,

    /// Debug logging on stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Replay the bundled fixture and allow a simulated location
    #[arg(long, global = true, env = "AIRBOARD_MOCK")]
    mock: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct LocationArgs {
    /// Latitude in decimal degrees
    #[arg(long, allow_hyphen_values = true, env = "AIRBOARD_LAT")]
    lat: String,

    /// Longitude in decimal degrees
    #[arg(long, allow_hyphen_values = true, env = "AIRBOARD_LON")]
    lon: String,

    /// Search radius in km (overrides config)
    #[arg(long)]
    radius_km: Option<f64>,

    /// Fall back to the configured airport when none is in range
    #[arg(long)]
    fallback: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// List the airport directory
    Airports,

    /// Resolve a location to an airport
    Resolve {
        #[command(flatten)]
        location: LocationArgs,
    },

    /// Print the departures board and keep it refreshed
    Board {
        #[command(flatten)]
        location: LocationArgs,

        /// Print once and exit
        #[arg(long)]
        once: bool,

        /// Accept a simulated location without asking
        #[arg(short, long)]
        yes: bool,

        /// Extra pages to load after the first
        #[arg(long, default_value = "0")]
        pages: usize,
    },

    /// Serve the departures board as a JSON API
    Serve {
        #[command(flatten)]
        location: LocationArgs,

        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        #[arg(long, default_value = "8080")]
        port: u16,

        /// Accept a simulated location without asking
        #[arg(short, long)]
        yes: bool,
    },

    /// Show or create the configuration file
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the effective configuration
    Show,
    /// Write a default configuration file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    logging::init_logging(cli.verbose);

    if let Err(e) = run(cli).await {
        eprintln!("{e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), CliError> {
    if let Commands::Config { action } = &cli.command {
        return cmd_config(&cli, action);
    }

    let config = load_settings(&cli)?;
    match cli.command {
        Commands::Airports => cmd_airports(&config),
        Commands::Resolve { location } => cmd_resolve(&config, &location),
        Commands::Board {
            location,
            once,
            yes,
            pages,
        } => cmd_board(&config, &location, once, yes, pages).await,
        Commands::Serve {
            location,
            host,
            port,
            yes,
        } => cmd_serve(&config, &location, &host, port, yes).await,
        Commands::Config { .. } => Ok(()),
    }
}

// ---------------------------------------------------------------------------
// Setup
// ---------------------------------------------------------------------------

fn load_settings(cli: &Cli) -> Result<Config, CliError> {
    let mut config = match &cli.config {
        Some(path) => config::load_config_from(path)?,
        None => config::load_config()?,
    };
    if cli.mock {
        config.source.mode = SourceMode::Fixture;
        config.resolver.fallback_enabled = true;
    }
    config.validate()?;
    Ok(config)
}

fn load_directory(config: &Config) -> Result<AirportDirectory, CliError> {
    match &config.directory {
        Some(path) => Ok(AirportDirectory::load(&PathBuf::from(path))?),
        None => Ok(AirportDirectory::builtin()),
    }
}

fn build_resolver(config: &Config, location: &LocationArgs) -> Result<Resolver, CliError> {
    let mut settings = config.resolver_settings();
    if let Some(radius_km) = location.radius_km {
        settings.radius_km = radius_km;
    }
    if location.fallback {
        settings.fallback_enabled = true;
    }
    Ok(Resolver::new(load_directory(config)?, settings)?)
}

fn resolve_location(
    config: &Config,
    location: &LocationArgs,
) -> Result<(Resolver, Resolution), CliError> {
    let coordinate = Coordinate::parse(&location.lat, &location.lon)?;
    let resolver = build_resolver(config, location)?;
    let resolution = resolver.resolve(&coordinate);
    Ok((resolver, resolution))
}

/// Data source and clock for the configured mode.
///
/// Fixture replays pin the clock to the fixture's first departure so its
/// flights pass the recency filter.
fn build_source(config: &Config) -> Result<(Arc<dyn FlightSource>, Arc<dyn Clock>), CliError> {
    match config.source.mode {
        SourceMode::Fixture => {
            let fixture = FixtureFlightSource::bundled()?;
            if fixture.is_empty() {
                tracing::warn!("Bundled fixture has no departures");
            }
            let clock: Arc<dyn Clock> = match fixture.reference_time() {
                Some(now) => Arc::new(FixedClock::new(now)),
                None => Arc::new(SystemClock),
            };
            tracing::info!(records = fixture.len(), "Using bundled fixture");
            Ok((Arc::new(fixture), clock))
        }
        SourceMode::Live => {
            let source = HttpFlightSource::new(
                &config.source.endpoint,
                Duration::from_secs(config.source.timeout_secs),
            )?;
            tracing::debug!(endpoint = source.endpoint(), "Using live flight source");
            Ok((Arc::new(source), Arc::new(SystemClock)))
        }
    }
}

/// Turn a resolution into the airport to show, asking before using a
/// simulated one.
fn confirm_resolution(
    resolution: &Resolution,
    assume_yes: bool,
) -> Result<AirportRecord, CliError> {
    let airport = resolution.airport.clone().ok_or(CliError::Unsupported)?;
    if !resolution.needs_confirmation() || assume_yes {
        return Ok(airport);
    }

    print!(
        "Simulated location: {} ({}). Continue? [y/N] ",
        airport.title, airport.code
    );
    io::stdout().flush()?;
    let mut answer = String::new();
    io::stdin().lock().read_line(&mut answer)?;
    match answer.trim().to_ascii_lowercase().as_str() {
        "y" | "yes" => Ok(airport),
        _ => Err(CliError::Unsupported),
    }
}

impl From<io::Error> for CliError {
    fn from(e: io::Error) -> Self {
        CliError::Core(AirboardError::Io(e))
    }
}

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

fn cmd_airports(config: &Config) -> Result<(), CliError> {
    let directory = load_directory(config)?;
    println!("{}", board::render_airports(&directory));
    println!("{} airports", directory.len());
    Ok(())
}

fn cmd_resolve(config: &Config, location: &LocationArgs) -> Result<(), CliError> {
    let (resolver, resolution) = resolve_location(config, location)?;
    let Some(airport) = &resolution.airport else {
        println!(
            "No airport within {} km of {}, {}",
            resolver.settings().radius_km,
            location.lat,
            location.lon
        );
        return Err(CliError::Unsupported);
    };

    match resolution.distance_km {
        Some(km) => println!("{} {} ({km:.2} km)", airport.code, airport.title),
        None => println!("{} {} (simulated location)", airport.code, airport.title),
    }
    Ok(())
}

async fn cmd_board(
    config: &Config,
    location: &LocationArgs,
    once: bool,
    assume_yes: bool,
    pages: usize,
) -> Result<(), CliError> {
    let (_, resolution) = resolve_location(config, location)?;
    let airport = confirm_resolution(&resolution, assume_yes)?;
    let (source, clock) = build_source(config)?;

    let controller = FeedController::new(source, clock, &config.feed_settings());
    controller.confirm_airport(&airport.code).await;
    for _ in 0..pages {
        if controller.load_more().await.is_none() {
            break;
        }
    }
    print!("{}", board::render_board(&airport, &controller.snapshot()));
    if once {
        return Ok(());
    }

    // A terminal session stays in the foreground until it exits
    let lifecycle = LifecycleObserver::new(LifecycleState::Active);
    controller.subscribe(&lifecycle);

    let mut changes = controller.changes();
    changes.borrow_and_update();
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            changed = changes.changed() => {
                if changed.is_err() {
                    break;
                }
                changes.borrow_and_update();
                println!();
                print!("{}", board::render_board(&airport, &controller.snapshot()));
            }
        }
    }

    lifecycle.set(LifecycleState::Background);
    controller.dispose();
    Ok(())
}

async fn cmd_serve(
    config: &Config,
    location: &LocationArgs,
    host: &str,
    port: u16,
    assume_yes: bool,
) -> Result<(), CliError> {
    let (resolver, resolution) = resolve_location(config, location)?;
    let airport = confirm_resolution(&resolution, assume_yes)?;
    let (source, clock) = build_source(config)?;

    let controller = FeedController::new(source, clock, &config.feed_settings());
    controller.confirm_airport(&airport.code).await;

    // Clients report visibility through POST /api/lifecycle
    let lifecycle = LifecycleObserver::new(LifecycleState::Active);
    controller.subscribe(&lifecycle);

    let state = Arc::new(web::AppState {
        controller: controller.clone(),
        airport,
        resolution,
        directory: resolver.directory().clone(),
        lifecycle,
    });
    let served = web::serve(state, host, port).await;
    controller.dispose();
    Ok(served?)
}

fn cmd_config(cli: &Cli, action: &ConfigAction) -> Result<(), CliError> {
    match action {
        ConfigAction::Show => {
            let config = load_settings(cli)?;
            let path = cli.config.clone().unwrap_or_else(config::config_file);
            println!("# {}", path.display());
            print!("{}", config::serialize_config(&config));
        }
        ConfigAction::Init { force } => {
            let path = cli.config.clone().unwrap_or_else(config::config_file);
            if path.exists() && !force {
                println!("Config already exists at {} (use --force to overwrite)", path.display());
                return Ok(());
            }
            match &cli.config {
                Some(path) => config::save_config_to(&Config::default(), path)?,
                None => {
                    config::save_config(&Config::default())?;
                }
            }
            println!("Wrote {}", path.display());
        }
    }
    Ok(())
}
