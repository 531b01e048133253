//! Entry point for `window-flow`.
//!
//! Parses CLI arguments and dispatches into either **peer** or **send** mode.
//! All protocol work is delegated to library modules; `main.rs` owns only
//! process setup (logging, argument parsing) and fixture loading.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand, ValueEnum};

use window_flow::config::ConnectionConfig;
use window_flow::connection::{Connection, SendError};
use window_flow::peer::{AckPolicy, SimulatedPeer};

/// Windowed flow-control sender over UDP with a scriptable stub peer.
#[derive(Parser)]
#[command(author, version, about)]
struct Cli {
    #[command(subcommand)]
    mode: Mode,
}

#[derive(Subcommand)]
enum Mode {
    /// Run a simulated peer that logs received bytes.
    Peer {
        /// Local address to bind (e.g. 127.0.0.1:9000).
        #[arg(short, long, default_value = "127.0.0.1:9000")]
        bind: SocketAddr,
        /// Receive window to advertise, in bytes.
        #[arg(short, long, default_value_t = 4096)]
        window: u32,
        /// Acknowledgment policy.
        #[arg(short, long, value_enum, default_value_t = PolicyArg::Always)]
        ack_policy: PolicyArg,
        /// Ack delay in milliseconds (only with --ack-policy delayed).
        #[arg(long, default_value_t = 500)]
        ack_delay_ms: u64,
    },
    /// Connect to a peer and stream a payload under flow control.
    Send {
        /// Local address to bind (port 0 = ephemeral).
        #[arg(short, long, default_value = "127.0.0.1:0")]
        bind: SocketAddr,
        /// Remote peer address.
        #[arg(short, long)]
        peer: SocketAddr,
        /// File whose contents become the payload.
        #[arg(short, long)]
        file: PathBuf,
        /// How long to wait for an ACK once the window is full, in ms.
        #[arg(long, default_value_t = 1000)]
        ack_wait_ms: u64,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum PolicyArg {
    /// Acknowledge every data segment.
    Always,
    /// Never acknowledge (forces the sender to stall).
    Never,
    /// Acknowledge after --ack-delay-ms.
    Delayed,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialise env_logger; set RUST_LOG to control verbosity.
    env_logger::init();

    let cli = Cli::parse();

    match cli.mode {
        Mode::Peer {
            bind,
            window,
            ack_policy,
            ack_delay_ms,
        } => {
            let policy = match ack_policy {
                PolicyArg::Always => AckPolicy::AlwaysAck,
                PolicyArg::Never => AckPolicy::NeverAck,
                PolicyArg::Delayed => AckPolicy::DelayedAck(Duration::from_millis(ack_delay_ms)),
            };
            let mut peer = SimulatedPeer::bind(bind, window, policy).await?;
            peer.listen();
            log::info!("peer listening on {} (window {window})", peer.local_addr);

            tokio::signal::ctrl_c().await?;
            log::info!("received {} bytes in total", peer.received().len());
            peer.disconnect();
        }
        Mode::Send {
            bind,
            peer,
            file,
            ack_wait_ms,
        } => {
            let payload = std::fs::read(&file)?;
            let config = ConnectionConfig {
                ack_wait: Duration::from_millis(ack_wait_ms),
                ..ConnectionConfig::default()
            };

            let mut conn = Connection::new(config);
            conn.bind(bind).await?;
            conn.connect(peer).await?;
            log::info!(
                "connected to {peer}, window {} bytes, payload {} bytes",
                conn.peer_window().unwrap_or(0),
                payload.len()
            );

            match conn.send(&payload).await {
                Ok(()) => log::info!("payload fully admitted"),
                Err(SendError::Timeout) => log::warn!(
                    "stalled at the window boundary with {} bytes unacknowledged",
                    conn.in_flight()
                ),
                Err(e) => return Err(e.into()),
            }
            conn.disconnect().await;
        }
    }

    Ok(())
}
