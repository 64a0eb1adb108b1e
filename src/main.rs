//! Pairgate - pair a messaging client from the browser
//!
//! Serves a pairing page backed by an external messaging client and lets the
//! user download the resulting session directory as a zip archive.

use anyhow::Result;
use clap::Parser;
use pairgate_auth::SessionStore;
use pairgate_bridge::ProcessBridge;
use pairgate_core::{Config, DEFAULT_PORT};
use pairgate_server::{create_router, AppState};
use std::net::IpAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, Level};
use tracing_subscriber::EnvFilter;

/// Pairgate - pair a messaging client and export its session
#[derive(Parser, Debug)]
#[command(name = "pairgate")]
#[command(version, about, long_about = None)]
struct Args {
    /// Server port
    #[arg(short, long, env = "PORT", default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Bind address
    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    host: IpAddr,

    /// Directory holding the messaging client's session files
    #[arg(long, env = "SESSION_DIR", default_value = "session")]
    session_dir: PathBuf,

    /// Directory served as static assets
    #[arg(long, env = "PUBLIC_DIR", default_value = "public")]
    public_dir: PathBuf,

    /// Directory for temporary download archives (default: system temp dir)
    #[arg(long, env = "ARCHIVE_DIR")]
    archive_dir: Option<PathBuf>,

    /// External messaging client program
    #[arg(long, env = "PAIRGATE_BRIDGE", default_value = "pairgate-bridge")]
    bridge: String,

    /// Seconds to wait for a QR or pairing code
    #[arg(long, env = "HANDSHAKE_TIMEOUT", default_value = "3")]
    handshake_timeout: u64,

    /// Also print QR codes in this terminal
    #[arg(long)]
    print_qr: bool,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let log_level = if args.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_target(false)
        .compact()
        .with_env_filter(EnvFilter::from_default_env().add_directive(log_level.into()))
        .finish();
    tracing::subscriber::set_global_default(subscriber).ok();

    info!("Pairgate v{}", env!("CARGO_PKG_VERSION"));

    let mut config = Config::new()
        .with_host(args.host)
        .with_port(args.port)
        .with_session_dir(args.session_dir)
        .with_public_dir(args.public_dir)
        .with_bridge_program(args.bridge)
        .with_handshake_timeout(Duration::from_secs(args.handshake_timeout))
        .with_print_qr(args.print_qr);
    if let Some(dir) = args.archive_dir {
        config = config.with_archive_dir(dir);
    }

    let store = Arc::new(
        SessionStore::open(&config.session_dir)
            .map_err(|e| anyhow::anyhow!("Failed to open session directory: {}", e))?,
    );
    let client = Arc::new(ProcessBridge::new(config.bridge_program.clone()));

    info!("Session directory: {}", store.dir().display());
    info!("Messaging client: {}", client.program());

    let addr = config.bind_addr();
    let state = Arc::new(AppState::new(config, client, store));
    let router = create_router(state.clone());

    let shutdown = async {
        tokio::signal::ctrl_c().await.ok();
        info!("Shutting down...");
    };

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("✅ Server is running on http://localhost:{}", addr.port());

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown)
        .await?;

    state.shutdown();
    info!("Goodbye!");
    Ok(())
}
