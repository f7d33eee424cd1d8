//! riff-watch - follow one user's agent status from the terminal.
//!
//! ## Usage
//!
//! ```bash
//! # Dev-mode server, token minted with `riff token alice`
//! riff-watch --url http://localhost:41830 --user alice --token "$RIFF_TOKEN"
//!
//! # Only the fallback transports
//! riff-watch --user alice --transport sse --transport long_polling
//! ```
//!
//! Prints every status transition, the elapsed time once a second while the
//! agent is processing, and connection state changes. Ctrl-C leaves the group
//! and disconnects.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use log::{info, warn};
use riff_client::{
    ClientConfig, ConnectionState, StaticToken, StatusSession, TokenFactory,
};
use riff_protocol::{AgentStatus, TransportKind};

#[derive(Parser, Debug)]
#[command(
    name = "riff-watch",
    about = "Follow agent status updates for one user",
    after_help = "Examples:\n  \
        riff-watch --user alice --token dev:alice\n  \
        riff-watch --config ~/.config/riff/client.toml --user alice"
)]
struct Args {
    /// Server base URL (overrides the config file)
    #[arg(long)]
    url: Option<String>,

    /// Bearer token
    #[arg(long, env = "RIFF_TOKEN", hide_env_values = true)]
    token: String,

    /// Identity whose status group to join
    #[arg(short, long)]
    user: String,

    /// Client config file (TOML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Restrict negotiation to these transports
    #[arg(long = "transport")]
    transports: Vec<TransportKind>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

fn load_config(args: &Args) -> Result<ClientConfig> {
    let mut config = match &args.config {
        Some(path) => {
            let path = PathBuf::from(shellexpand::tilde(&path.to_string_lossy()).as_ref());
            ClientConfig::from_file(&path)
                .with_context(|| format!("Failed to load client config: {:?}", path))?
        }
        None => ClientConfig::default(),
    };

    if let Some(url) = &args.url {
        config.base_url = url.clone();
    }
    if !args.transports.is_empty() {
        config.transports = args.transports.clone();
    }
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let log_level = if args.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level)).init();

    let config = load_config(&args)?;
    info!("riff-watch connecting to {}", config.base_url);
    info!("  User: {}", args.user);
    info!("  Transports: {:?}", config.transports);

    let tokens: Arc<dyn TokenFactory> = Arc::new(StaticToken::new(args.token.clone()));
    let session = Arc::new(StatusSession::new(&config, tokens));

    let _transitions = session.on_status_change(|change| {
        println!("status: {} -> {}", change.previous, change.current);
    });
    let _events = session.on_event(|event| {
        if let Some(message) = &event.message {
            println!("        {}", message);
        }
    });

    session
        .connect(&args.user)
        .await
        .with_context(|| format!("Failed to connect as {}", args.user))?;

    let mut states = session.watch_state();
    let mut ticker = tokio::time::interval(Duration::from_secs(1));
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted, disconnecting");
                break;
            }
            changed = states.changed() => {
                if changed.is_err() {
                    break;
                }
                let state = *states.borrow_and_update();
                println!("connection: {}", state);
                if state == ConnectionState::Failed {
                    warn!("Reconnect attempts exhausted; giving up");
                    break;
                }
            }
            _ = ticker.tick() => {
                if session.status() == AgentStatus::Processing {
                    let elapsed = session.get_elapsed();
                    println!("elapsed: {}s", elapsed.elapsed_seconds);
                }
            }
        }
    }

    session.disconnect().await;
    Ok(())
}
