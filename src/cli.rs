//! Command line interface for the `qws` binary.
//!
//! Shared with the build script, which renders the manual page from it.

use std::net::SocketAddr;

use clap::{Args, Parser, Subcommand};

/// Connect query argument naming the sending session.
pub const SESSION_ARG: &str = "session";

/// Command line arguments for the `qws` binary.
#[derive(Debug, Parser)]
#[command(name = "qws", version, about = "Queued WebSocket listener and sender")]
pub struct Cli {
    /// Serve Prometheus metrics on this address.
    #[arg(long, global = true)]
    pub metrics_addr: Option<SocketAddr>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Accept qws connections and log every payload received.
    Serve {
        /// Address to listen on.
        #[arg(long, default_value = "127.0.0.1:3000")]
        addr: SocketAddr,
    },
    /// Connect to a qws endpoint and send numbered test messages.
    Send(SendArgs),
}

#[derive(Debug, Args)]
pub struct SendArgs {
    /// Endpoint to connect to.
    #[arg(long, default_value = "ws://127.0.0.1:3000/mypath/default")]
    pub url: String,
    /// Route attached to each message.
    #[arg(long, default_value = "")]
    pub route: String,
    /// Number of message batches to send.
    #[arg(long, default_value_t = 3)]
    pub count: u32,
    /// Delay between batches in milliseconds.
    #[arg(long, default_value_t = 1000)]
    pub interval_ms: u64,
    /// Retries after a lost connection before giving up.
    #[arg(long, default_value_t = 12)]
    pub reconnect_tries: u32,
    /// Delay between reconnection attempts in milliseconds.
    #[arg(long, default_value_t = 5000)]
    pub reconnect_interval_ms: u64,
    /// Session name the server resumes by. Defaults to one unique to this process.
    #[arg(long)]
    pub session: Option<String>,
}
