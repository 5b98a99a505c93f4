use std::{path::PathBuf, sync::Arc};

use anyhow::{Context, Result};
use clap::Parser;
use client_core::{HttpNotesApi, NoteListController};
use shared::domain::ListVariant;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::info;
use tracing_subscriber::EnvFilter;

mod config;
mod repl;

use config::{load_settings, normalize_api_base_url};
use repl::{parse_command, ReplSession};

#[derive(Parser, Debug)]
#[command(about = "Terminal client for a REST notes service")]
struct Args {
    /// Settings file; missing files are ignored.
    #[arg(long, default_value = "notes.toml")]
    config: PathBuf,
    /// Base URL of the notes service, e.g. http://127.0.0.1:8000
    #[arg(long)]
    api_url: Option<String>,
    /// `basic` or `advanced`
    #[arg(long)]
    variant: Option<ListVariant>,
    #[arg(long)]
    timeout_secs: Option<u64>,
    #[arg(long)]
    discard_stale_responses: bool,
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let args = Args::parse();

    let mut settings = load_settings(&args.config)?;
    if let Some(url) = args.api_url {
        settings.api_base_url = normalize_api_base_url(&url);
    }
    if let Some(variant) = args.variant {
        settings.variant = variant;
    }
    if args.timeout_secs.is_some() {
        settings.request_timeout_secs = args.timeout_secs;
    }
    if args.discard_stale_responses {
        settings.discard_stale_responses = true;
    }

    let api = HttpNotesApi::with_timeout(&settings.api_base_url, settings.request_timeout())
        .context("failed to set up notes client")?;
    info!(
        "notes: using {} ({:?} variant)",
        api.base_url(),
        settings.variant
    );
    let controller = NoteListController::new(Arc::new(api), settings.controller_options());

    let mut session = ReplSession::new(controller);
    let mut stdout = std::io::stdout();
    session.start(&mut stdout).await?;
    println!("type 'help' for commands");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let command = match parse_command(&line) {
            Ok(Some(command)) => command,
            Ok(None) => continue,
            Err(message) => {
                println!("{message}");
                continue;
            }
        };
        if !session.execute(command, &mut stdout).await? {
            break;
        }
    }

    Ok(())
}
