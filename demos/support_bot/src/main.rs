//! Support Bot Demo
//!
//! Reads one webhook payload per stdin line, dispatches it through a rule
//! file plus a few code handlers, and prints the JSON response.
//!
//! Lines that are not JSON objects are sent as plain messages from
//! `--sender`.
//!
//! # Usage
//!
//! ```bash
//! cargo run --package support-bot -- --rules demos/support_bot/rules.json
//! {"message": "my name is Ada", "sender_id": "u1"}
//! /order
//! large pizza
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use parley::prelude::*;
use parley::runtime::config::ConfigLoader;
use serde_json::json;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{error, info};

#[derive(Debug, Parser)]
#[command(about = "Line-oriented Parley support bot")]
struct Args {
    /// Configuration file (defaults to parley.toml discovery).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Rule file; overrides `rules.path` from the configuration.
    #[arg(long)]
    rules: Option<PathBuf>,

    /// Sender id used for plain-text lines.
    #[arg(long, default_value = "cli")]
    sender: String,
}

// ============================================================================
// Handler Functions
// ============================================================================

async fn help(_ctx: Arc<Context>) -> &'static str {
    "Try: hello, my name is <name>, who am i, /order, order #42, /reset"
}

async fn start_order(ctx: Arc<Context>) -> Result<&'static str, BoxError> {
    ctx.conversation().set_state("ordering").await?;
    Ok("What would you like to order?")
}

async fn take_order(ctx: Arc<Context>) -> Result<Vec<String>, BoxError> {
    let item = ctx.message().to_string();
    let conversation = ctx.conversation();
    conversation.set("last_order", item.clone()).await?;
    conversation.reset_state().await?;
    Ok(vec![
        format!("Got it: {item}."),
        "Anything else? Type /order to order again.".to_string(),
    ])
}

async fn reset(ctx: Arc<Context>) -> Result<&'static str, BoxError> {
    ctx.conversation().clear().await?;
    Ok("Conversation cleared.")
}

async fn fallback(_ctx: Arc<Context>) -> &'static str {
    "Sorry, I didn't understand that. Type /help for options."
}

fn build_payload(line: &str, sender: &str) -> serde_json::Value {
    match serde_json::from_str::<serde_json::Value>(line) {
        Ok(value) if value.is_object() => value,
        _ => json!({ "message": line, "sender_id": sender }),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut loader = ConfigLoader::new();
    if let Some(path) = &args.config {
        loader = loader.file(path);
    }
    let mut config = loader.load()?;
    if args.rules.is_some() {
        config.rules.path = args.rules.clone();
    }

    let mut runtime = ParleyRuntime::from_config(&config).await?;
    let dispatcher = runtime.dispatcher_mut();

    dispatcher
        .middleware(|ctx: Arc<Context>| async move {
            info!(sender_id = ctx.sender_id(), message = ctx.message(), "Incoming");
        })
        .command("help", help)
        .command("order", start_order)
        .command("reset", reset)
        .fallback(fallback);

    // Code routes go after the rule routes, so the state guard only sees
    // messages no rule claimed.
    dispatcher.route(
        Route::new("*", take_order)
            .when(|ctx| ctx.conversation().is_in_state("ordering"))
            .name("take_order"),
    );

    let handle = runtime.into_handle();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let driver = match WebDriver::from_value(build_payload(line, &args.sender)) {
            Ok(driver) => Arc::new(driver),
            Err(e) => {
                error!("Rejected payload: {e}");
                continue;
            }
        };

        match handle.handle(driver.clone()).await {
            Ok(outcome) => info!(?outcome, "Dispatched"),
            Err(e) => error!("Dispatch failed: {e}"),
        }
        println!("{}", driver.to_json());
    }

    Ok(())
}
