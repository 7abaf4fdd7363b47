//! # Sokolink Main Entry Point
//!
//! Loads or generates a level, connects to the solver service, and runs the
//! text session loop on a single-threaded runtime.

use clap::Parser;
use sokolink::{
    ClientConfig, HttpOracle, InputHandler, Level, LevelCollection, QueryMode, Session,
    SessionNotice, SokolinkError, SokolinkResult, Tier,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};

#[cfg(feature = "dev-tools")]
use tracing::{error, info};

#[cfg(not(feature = "dev-tools"))]
use log::{error, info};

/// Command line arguments for the Sokolink client.
#[derive(Parser, Debug)]
#[command(name = "sokolink")]
#[command(about = "A box-pushing puzzle client backed by a solver oracle")]
#[command(version)]
struct Args {
    /// Level file (single grid or a `Level N` collection)
    #[arg(long)]
    level: Option<PathBuf>,

    /// Level to play from a collection file
    #[arg(long)]
    level_id: Option<u32>,

    /// Difficulty of generated levels
    #[arg(long)]
    tier: Option<Tier>,

    /// Random seed for level generation
    #[arg(short, long)]
    seed: Option<u64>,

    /// Base URL of the solver service
    #[arg(long)]
    oracle_url: Option<String>,

    /// Query mode (fixed or auto)
    #[arg(long)]
    mode: Option<QueryMode>,

    /// JSON configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, default_value = "warn")]
    log_level: String,

    /// Show the solver's plan while playing
    #[arg(long)]
    show_plan: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> SokolinkResult<()> {
    let args = Args::parse();

    initialize_logging(&args.log_level)?;

    info!("Starting Sokolink v{}", sokolink::VERSION);

    let config = load_config(&args)?;
    let oracle = HttpOracle::new(&config.oracle)?;
    info!("Using solver at {}", oracle.endpoint());

    let seed = args.seed.unwrap_or_else(time_seed);
    let mut session = match &args.level {
        Some(path) => {
            let level = load_level(path, args.level_id)?;
            Session::new(config, level, Arc::new(oracle), seed)
        }
        None => Session::with_random_level(config, Arc::new(oracle), seed)?,
    };

    run_session(&mut session).await
}

/// Initializes the logging system based on the specified log level.
fn initialize_logging(log_level: &str) -> SokolinkResult<()> {
    #[cfg(feature = "dev-tools")]
    {
        let filter = tracing_subscriber::EnvFilter::try_new(log_level)
            .map_err(|err| SokolinkError::Config(format!("bad log level: {}", err)))?;

        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_writer(std::io::stderr)
            .init();
    }

    #[cfg(not(feature = "dev-tools"))]
    {
        env_logger::Builder::new()
            .parse_filters(log_level)
            .format_target(false)
            .init();
    }

    Ok(())
}

fn load_config(args: &Args) -> SokolinkResult<ClientConfig> {
    let mut config = match &args.config {
        Some(path) => ClientConfig::load_from_path(path)?,
        None => ClientConfig::new(),
    };

    if let Some(url) = &args.oracle_url {
        config.oracle.base_url = url.clone();
    }
    if let Some(mode) = args.mode {
        config.orchestrator.mode = mode;
    }
    if let Some(tier) = args.tier {
        config.generation.tier = tier;
    }
    if args.show_plan {
        config.show_plan = true;
    }
    Ok(config)
}

fn load_level(path: &Path, id: Option<u32>) -> SokolinkResult<Level> {
    let collection = LevelCollection::load_from_path(path)?;
    let level = match id {
        Some(id) => collection.get(id)?,
        None => collection
            .playable()
            .map(|(_, level)| level)
            .next()
            .ok_or_else(|| {
                SokolinkError::StructuralLevel(format!("no playable level in {}", path.display()))
            })?,
    };
    Ok(level.clone())
}

fn time_seed() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs())
        .unwrap_or(12345)
}

/// Main loop: stdin commands and session events, whichever comes first.
async fn run_session(session: &mut Session) -> SokolinkResult<()> {
    let input_handler = InputHandler::new();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    println!("Welcome to Sokolink!");
    println!("{}", input_handler.help_text());
    let notices = session.start();
    if present(session, notices) {
        return Ok(());
    }

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else {
                    info!("Input closed");
                    break;
                };
                let mut quit = false;
                for input in input_handler.parse_line(&line) {
                    let notices = session.handle_input(input);
                    quit |= present(session, notices);
                }
                if quit {
                    break;
                }
            }
            event = session.next_event() => {
                let Some(event) = event else {
                    error!("Session event channels closed");
                    break;
                };
                let notices = session.handle_event(event);
                present(session, notices);
            }
        }
    }

    session.shutdown();
    info!("Session ended");
    Ok(())
}

/// Prints notices; returns whether the player asked to quit.
fn present(session: &Session, notices: Vec<SessionNotice>) -> bool {
    let mut quit = false;
    for notice in &notices {
        match notice {
            SessionNotice::BoardChanged => print_board(session),
            SessionNotice::Quit => quit = true,
            other => {
                if let Some(text) = other.describe() {
                    println!("{}", text);
                }
            }
        }
    }
    quit
}

fn print_board(session: &Session) {
    let puzzle = session.puzzle();
    println!();
    println!("{}", puzzle);
    println!(
        "Moves: {}  Boxes on goals: {}/{}  Mode: {}",
        puzzle.move_count(),
        puzzle.boxes_on_goals(),
        puzzle.boxes().len(),
        session.orchestrator().mode()
    );
}
