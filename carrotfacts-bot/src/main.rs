//! carrotfacts: joins one channel and shares vegetable facts.
//!
//!   .carrot          — a random carrot fact
//!   .turnip          — the next turnip fact, in order
//!   .carroooo…       — CARROT, once per `o`
//!
//! Ctrl+C quits politely; a second Ctrl+C exits without waiting.

use clap::Parser;
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

use carrotfacts_bot::config::{Args, Config, DEFAULT_LOG_FILTER};
use carrotfacts_bot::session::{self, State};

#[tokio::main]
async fn main() {
    // JSON logs when CARROTFACTS_LOG_JSON=1, human-readable otherwise
    let json_logs = std::env::var("CARROTFACTS_LOG_JSON").unwrap_or_default() == "1";
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| DEFAULT_LOG_FILTER.into());
    if json_logs {
        tracing_subscriber::fmt().with_env_filter(filter).json().init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    let args = Args::parse();

    if let Err(e) = run(&args).await {
        tracing::error!(error = %e, "Fatal");
        std::process::exit(1);
    }
    tracing::info!(state = ?State::Terminated, "Bye");
}

async fn run(args: &Args) -> anyhow::Result<()> {
    tracing::info!(state = ?State::Configuring, config = %args.config.display(), "Reading config");
    let config = Config::load(&args.config)?;

    let (interrupt_tx, interrupt_rx) = mpsc::channel(4);
    tokio::spawn(async move {
        while tokio::signal::ctrl_c().await.is_ok() {
            if interrupt_tx.send(()).await.is_err() {
                break;
            }
        }
    });

    session::run(&config, interrupt_rx).await?;
    Ok(())
}
