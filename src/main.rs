use anyhow::{Context, Result};
use clap::Parser;
use std::io::IsTerminal;
use std::path::PathBuf;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

mod catalog;
mod config;
mod host;
mod input;
mod lifecycle;
mod scene;
mod script;
mod ui;

use config::Config;
use host::Host;

/// Cabinet - a terminal arcade machine that plays Lua games
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long)]
    config: Option<String>,

    /// Directory scanned for games (overrides the config file)
    #[arg(short, long)]
    games_dir: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    /// Skip the menu and play this game directly
    #[arg(short, long)]
    play: Option<String>,
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Log to stderr so nothing leaks into the drawn frames. The default
    // level stays quiet; --debug surfaces the lifecycle trace including
    // contained game faults and their tracebacks.
    let log_level = if args.debug {
        Level::DEBUG
    } else {
        Level::WARN
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set global default subscriber")?;

    let mut config = if let Some(config_path) = args.config {
        Config::load_from_file(&config_path)?
    } else {
        Config::load_default()?
    };

    if let Some(games_dir) = args.games_dir {
        config.games.dir = games_dir;
    }

    // The carousel and raw-mode input need a real terminal
    if !std::io::stdout().is_terminal() {
        eprintln!("Error: cabinet must be run in an interactive terminal.");
        eprintln!("It cannot be run with redirected output or in non-TTY environments.");
        std::process::exit(1);
    }

    let mut host = Host::new(config)?;
    if let Some(game) = args.play {
        host.queue_game(&game)?;
    }

    if let Err(e) = host.run() {
        // The terminal was restored before run() returned
        eprintln!("\nCabinet encountered an error: {e}");
        return Err(e);
    }

    Ok(())
}
