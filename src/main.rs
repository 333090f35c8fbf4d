//! chat-gate: a one-message-per-connection chat server
//!
//! Each TCP connection carries exactly one request and one reply. The
//! message boundary is the half-close of the sender's write direction,
//! not a length prefix.
//!
//! Features:
//! - Chunked, bounded-buffer send and receive
//! - Password gate with per-connection or process-wide sessions
//! - Interactive chat client
//! - Configuration via CLI arguments or TOML file

mod client;
mod config;
mod net;
mod server;
mod session;

use clap::Parser;
use client::ChatClient;
use config::{CliArgs, Config, Role};
use server::Server;
use tracing::info;
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Resolve configuration
    let cli = CliArgs::parse();
    let (role, config) = Config::resolve(cli)?;

    // Initialize logging
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    match role {
        Role::Serve => {
            info!(
                host = %config.host,
                port = config.port,
                backlog = config.backlog,
                policy = ?config.session_policy,
                "Starting chat-gate server"
            );

            let server = Server::bind(&config)?;
            server.run()?;
        }
        Role::Chat => {
            info!(host = %config.host, port = config.port, "Starting chat client");

            let client = ChatClient::new(config.host.clone(), config.port);
            let stdin = std::io::stdin();
            let stdout = std::io::stdout();
            client.chat_loop(stdin.lock(), stdout.lock(), &config.end_command)?;
        }
    }

    Ok(())
}
