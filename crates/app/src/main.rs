//! Huddle - group accountability with a shared creature
//!
//! Members complete tasks with photo proof to keep their group's creature
//! happy; idle time makes it sad.

use std::path::Path;
use std::sync::Arc;

use clap::Parser;
use huddle_core::Config;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod cli;
mod clipboard;
mod commands;
mod error;
mod feed;
mod state;
mod viewmodel;

use cli::{Cli, Command};
use error::AppResult;

#[tokio::main]
async fn main() {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    if let Err(e) = run(cli).await {
        tracing::error!("{}", e);
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> AppResult<()> {
    let config_path = match cli.config {
        Some(path) => path,
        None => Config::default_path()?,
    };
    let config = load_config(&config_path)?;

    if let Command::Config(cmd) = cli.command {
        return commands::run_config(cmd, &config_path, &config);
    }

    let state = Arc::new(state::AppState::new(config)?);
    commands::run(cli.command, state).await
}

/// Missing config file means defaults
fn load_config(path: &Path) -> AppResult<Config> {
    if path.exists() {
        Ok(Config::load_from(path)?)
    } else {
        tracing::debug!(path = %path.display(), "No config file; using defaults");
        Ok(Config::default())
    }
}
