use std::{sync::Arc, time::Duration};

use anyhow::Result;
use clap::{Parser, Subcommand};
use shared::domain::RideId;
use tracing_subscriber::EnvFilter;

mod config;
mod demo;
mod session;
mod terminal;

use config::load_settings;
use terminal::{TerminalPrompt, TerminalRenderer};

#[derive(Parser, Debug)]
#[command(about = "Follow a booked ride from the rider's side")]
struct Args {
    /// Realtime database root, e.g. https://<project>.firebaseio.com
    #[arg(long, global = true)]
    store_url: Option<String>,
    #[arg(long, global = true)]
    auth_token: Option<String>,
    #[arg(long, global = true)]
    app_name: Option<String>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Track rides in the realtime store, reading rider commands from stdin.
    Watch {
        #[arg(long)]
        ride_id: Option<String>,
        /// Accept offers without asking.
        #[arg(long)]
        yes: bool,
    },
    /// Play a scripted ride against an in-memory store.
    Demo {
        #[arg(long, default_value_t = 800)]
        pace_ms: u64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let mut settings = load_settings();
    if let Some(url) = args.store_url {
        settings.store_url = Some(url);
    }
    if let Some(token) = args.auth_token {
        settings.auth_token = Some(token);
    }
    if let Some(name) = args.app_name {
        settings.app_name = name;
    }

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(settings.log_filter.as_str()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match args.command {
        Command::Watch { ride_id, yes } => {
            let ride_id = ride_id
                .map(|id| id.trim().to_string())
                .filter(|id| !id.is_empty())
                .map(RideId::new);
            session::run_watch(&settings, ride_id, yes).await
        }
        Command::Demo { pace_ms } => {
            demo::run_demo(
                Arc::new(TerminalRenderer::new()),
                Arc::new(TerminalPrompt::auto_confirm()),
                &settings.app_name,
                Duration::from_millis(pace_ms),
            )
            .await
        }
    }
}
