//! deskchat - terminal chat client for the DeepSeek API
//!
//! Conversations are append-only logs that can be reloaded, renamed,
//! deleted and truncated; a bounded window of prior turns is replayed as
//! context on every request.

mod cli;
mod client;
mod commands;
mod config;
mod context;
mod llm;
mod store;
mod usage;

use clap::Parser;
use cli::Cli;
use client::ChatClient;
use commands::CommandResult;
use config::Settings;
use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::watch;
use tracing_subscriber::EnvFilter;

/// How often the background task flushes settings to disk
const AUTOSAVE_INTERVAL: Duration = Duration::from_secs(30);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("deskchat=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Cli::parse();
    let config_path = args.config.clone().unwrap_or_else(default_config_path);

    let mut settings = Settings::load(&config_path);
    if let Some(model) = args.model {
        settings.model = model;
    }

    let mut client = ChatClient::new(settings, config_path.clone(), args.log_dir.clone());

    // One-shot mode: send the prompt, print the reply, save, done
    if let Some(prompt) = args.prompt {
        let outcome = client.send(&prompt).await?;
        println!("{}", outcome.response);
        client.save_state();
        return Ok(());
    }

    // The autosave task only ever touches the settings file, so it never
    // contends with conversation log I/O. It works from snapshots handed
    // over after each completed action.
    let (state_tx, state_rx) = watch::channel(client.settings_snapshot());
    let autosave = tokio::spawn(autosave_loop(state_rx, config_path));

    println!("deskchat {} - /help for commands", env!("CARGO_PKG_VERSION"));
    if client.settings().api_key.is_empty() {
        println!("No API key configured yet. /set key <value> to add one.");
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("> ");
        std::io::stdout().flush()?;

        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                println!();
                break;
            }
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                if commands::handle_command(&mut client, &line).await == CommandResult::Exit {
                    break;
                }
                let _ = state_tx.send(client.settings_snapshot());
            }
        }
    }

    autosave.abort();
    client.save_state();
    Ok(())
}

/// Periodically flush the latest settings snapshot, best-effort
async fn autosave_loop(rx: watch::Receiver<Settings>, path: PathBuf) {
    let mut ticker = tokio::time::interval(AUTOSAVE_INTERVAL);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    // The first tick fires immediately; harmless, it just persists the
    // freshly loaded settings once at startup.
    loop {
        ticker.tick().await;
        let snapshot = rx.borrow().clone();
        if let Err(err) = snapshot.save(&path) {
            tracing::warn!(path = %path.display(), %err, "periodic settings flush failed");
        }
    }
}

/// Where the settings live when no --config is given
///
/// A config.json in the working directory (the legacy layout) wins;
/// otherwise the platform config directory is used.
fn default_config_path() -> PathBuf {
    let local = PathBuf::from("config.json");
    if local.exists() {
        return local;
    }
    match dirs::config_dir() {
        Some(config_dir) => config_dir.join("deskchat").join("config.json"),
        None => local,
    }
}
