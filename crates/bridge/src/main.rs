// EASE Bridge - Scripting Engine Bridge
// Copyright (C) 2024 Zhuo Zhang and Wuqi Zhang
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! EASE Bridge
//!
//! Scripting engine process launched by a host. It reports its own JSON-RPC
//! port to the host, serves script execution requests until the host closes
//! the bridge's stdin, then tears down and exits.

use std::{path::PathBuf, process, sync::Arc};

use clap::Parser;
use ease_common::{config::BridgeConfig, logging::init_logging};
use ease_engine::{EngineRpcServer, RpcHost, ShutdownSignal, ShutdownWatchdog};
use eyre::{Result, WrapErr};
use tokio::runtime::Handle;
use tracing::{error, info};

/// Command-line interface for the bridge
#[derive(Debug, Parser)]
#[command(name = "ease-bridge")]
#[command(about = "EASE Bridge - scripting engine driven by a host over JSON-RPC")]
#[command(version)]
pub struct Cli {
    /// JSON-RPC port of the host
    pub port: u16,

    /// Configuration file (default: <config dir>/ease-bridge/config.toml)
    #[arg(long, env = "EASE_BRIDGE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Port for the bridge's own JSON-RPC server (0 picks a free one)
    #[arg(long)]
    pub listen_port: Option<u16>,

    /// Report trace events from the start of the session
    #[arg(long)]
    pub trace: bool,

    /// Seconds between stdin EOF and the forced exit
    #[arg(long)]
    pub shutdown_timeout: Option<u64>,

    /// Verbosity level (repeat for more: -v, -vv, -vvv)
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count)]
    pub verbose: u8,
}

impl Cli {
    /// Effective configuration: file first, then command-line overrides
    fn config(&self) -> Result<BridgeConfig> {
        let mut config = BridgeConfig::load(self.config.as_deref())?;
        if let Some(port) = self.listen_port {
            config.server.listen_port = port;
        }
        if self.trace {
            config.trace.enabled = true;
        }
        if let Some(secs) = self.shutdown_timeout {
            config.shutdown.deadline_secs = secs;
        }
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set RUST_LOG based on verbosity
    if std::env::var("RUST_LOG").is_err() {
        let level = match cli.verbose {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        };
        std::env::set_var("RUST_LOG", level);
    }

    init_logging("ease-bridge", false)?;

    let code = run(cli).await?;
    process::exit(code);
}

/// Serve one session and return the process exit code
async fn run(cli: Cli) -> Result<i32> {
    let config = cli.config()?;
    let signal = Arc::new(ShutdownSignal::new());

    let host_url = config.host_url(cli.port);
    let host = RpcHost::new(&host_url, config.request_timeout(), Handle::current())?
        .with_max_frames(config.trace.max_frame_depth);
    let notifier = host.clone();

    let deadline = config.shutdown_deadline();
    let server = EngineRpcServer::new(config, signal.clone());
    let handle = server.start(host).await?;

    notifier
        .startup_complete(handle.port())
        .await
        .wrap_err_with(|| format!("Failed to report startup to the host at {host_url}"))?;
    info!("Bridge ready on port {}, host at {}", handle.port(), host_url);

    ShutdownWatchdog::new(std::io::stdin(), signal.clone())
        .with_deadline(deadline)
        .spawn()
        .wrap_err("Failed to start the shutdown watchdog")?;

    let waiter = signal.clone();
    tokio::task::spawn_blocking(move || waiter.wait()).await?;

    info!("Shutting down the bridge");
    if let Err(e) = handle.shutdown_and_wait(deadline).await {
        error!("Failed to shutdown RPC server: {}", e);
    }
    signal.mark_complete();

    Ok(signal.exit_code().unwrap_or(0))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_overrides_config() {
        let cli = Cli::parse_from([
            "ease-bridge",
            "4242",
            "--listen-port",
            "7000",
            "--trace",
            "--shutdown-timeout",
            "3",
        ]);
        assert_eq!(cli.port, 4242);

        let config = cli.config().unwrap();
        assert_eq!(config.server.listen_port, 7000);
        assert!(config.trace.enabled);
        assert_eq!(config.shutdown.deadline_secs, 3);
        assert_eq!(config.host_url(cli.port), "http://127.0.0.1:4242");
    }

    #[test]
    fn test_verbosity_counts() {
        let cli = Cli::parse_from(["ease-bridge", "-vvv", "1"]);
        assert_eq!(cli.verbose, 3);
        assert!(!cli.trace);
    }
}
