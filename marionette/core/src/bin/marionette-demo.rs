//! Marionette Demo - Scripted Session Against a Logging Surface
//!
//! Runs a full engine session headless: a scripted in-process actor
//! plays a short scenario over the loopback transport, render
//! operations land in the log, and actions the engine sends back are
//! printed as they arrive.
//!
//! # Usage
//!
//! ```bash
//! # Run with defaults
//! marionette-demo
//!
//! # With config file
//! marionette-demo --config ~/.config/marionette/marionette.toml
//!
//! # Verbose logging
//! RUST_LOG=debug marionette-demo
//! ```

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use serde_json::json;
use tracing::{debug, info};

use marionette_core::capability::NullEnvironment;
use marionette_core::config::{load_config, load_config_from_path};
use marionette_core::driver::{channel_pair, session, ActorHarness, DriverHandle, DriverMessage};
use marionette_core::render::{RenderOp, RenderSurface};

/// Marionette demo - scripted reconciliation session
#[derive(Parser, Debug)]
#[command(name = "marionette-demo")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration file path
    #[arg(short = 'c', long, env = "MARIONETTE_CONFIG", value_name = "FILE")]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short = 'l', long, env = "MARIONETTE_LOG_LEVEL", default_value = "info")]
    log_level: String,
}

/// Initialize logging with the specified level
fn init_logging(level: &str) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(format!("marionette_core={level},marionette_demo={level}")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();

    Ok(())
}

/// Surface that narrates what it is told to display.
struct TracingSurface;

impl RenderSurface for TracingSurface {
    fn apply(&mut self, op: RenderOp) {
        match &op {
            RenderOp::SetContent { node, text } => info!(%node, text, "content"),
            RenderOp::SetProgress { node, ratio, text } => {
                info!(%node, ratio, text, "progress");
            }
            RenderOp::SetPopupVisible { visible } => info!(visible, "popup"),
            RenderOp::SetSelected { node, selected } => info!(%node, selected, "selected"),
            _ => debug!(?op, "surface op"),
        }
    }
}

/// Play the scripted scenario, then shut the driver down.
async fn run_script(harness: ActorHarness, handle: DriverHandle) {
    let ActorHarness {
        directives,
        mut actions,
    } = harness;

    // print actions as the engine sends them
    tokio::spawn(async move {
        while let Some(action) = actions.recv().await {
            info!(action, "engine sent");
        }
    });

    let beats = [
        json!("Loading..."),
        json!({"_replace": {"~t": "Today"}}),
        json!(null),
        json!({
            "title": "~t at a glance",
            "tasks": {"_i2": "", "write report": "", "review code": 2},
            "progress": {"_nm": {"rnd": 1, "<=": 100}, "#0": 42},
        }),
        json!({"progress": {"_T": {"s": 1.5, "tid": "warm"}, "#0": 90}}),
        json!({"_W": {"beat": 2}, "status": "two seconds later"}),
        json!({"_pp": {"#0": "All caught up!"}}),
        json!({"_pp": null}),
    ];
    for beat in beats {
        if directives.send(beat).is_err() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(600)).await;
    }

    // give the deferred beat room to fire
    tokio::time::sleep(Duration::from_secs(2)).await;
    handle.send(DriverMessage::Shutdown);
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    init_logging(&args.log_level)?;

    info!("Marionette demo starting");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let config = match args.config {
        Some(path) => load_config_from_path(Some(path))?,
        None => load_config()?,
    };

    let (transport, harness) = channel_pair();
    let (driver, handle) = session(
        &config,
        TracingSurface,
        NullEnvironment,
        Box::new(transport),
    );

    tokio::spawn(run_script(harness, handle.clone()));
    driver.run().await;

    info!("Marionette demo finished");
    Ok(())
}
