//! Entry point for `cellconn-agent`.
//!
//! Brings the link up, then sends one telemetry payload per interval until
//! interrupted. A cycle that finds the link down is skipped and recovery is
//! attempted before the next one. Reconnect exhaustion ends the process so an
//! outer supervisor can restart it from a cold start.

mod config;
mod lock;

use std::path::PathBuf;
use std::time::Instant;

use anyhow::{Context, anyhow};
use cellconn::host::{NoopModem, StaticInterface, SystemDnsBackend, TcpTransport};
use cellconn::{ConnectionState, ConnectivityManager, ModemInfo, SendError};
use clap::Parser;
use log::{debug, info, warn};
use serde::Serialize;

use crate::config::AgentConfig;

type HostManager = ConnectivityManager<NoopModem, StaticInterface, SystemDnsBackend, TcpTransport>;

/// Sends periodic telemetry over a managed cellular link.
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Cli {
    /// TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Server hostname (overrides the config file).
    #[arg(long)]
    host: Option<String>,

    /// Server port (overrides the config file).
    #[arg(short, long)]
    port: Option<u16>,

    /// Seconds between payloads (overrides the config file).
    #[arg(short, long)]
    interval_secs: Option<u64>,

    /// Network interface carrying the link (overrides the config file).
    #[arg(long)]
    interface: Option<String>,

    /// Stop after this many cycles.
    #[arg(long)]
    max_cycles: Option<u64>,
}

impl Cli {
    fn agent_config(&self) -> anyhow::Result<AgentConfig> {
        let mut config = match &self.config {
            Some(path) => AgentConfig::load(path)?,
            None => AgentConfig::default(),
        };

        if let Some(host) = &self.host {
            config.connectivity.hostname = host.clone();
        }
        if let Some(port) = self.port {
            config.connectivity.port = port;
        }
        if let Some(secs) = self.interval_secs {
            if secs == 0 {
                return Err(anyhow!("--interval-secs must be at least 1"));
            }
            config.interval = std::time::Duration::from_secs(secs);
        }
        if let Some(interface) = &self.interface {
            config.interface = interface.clone();
        }
        if self.max_cycles.is_some() {
            config.max_cycles = self.max_cycles;
        }
        Ok(config)
    }
}

/// One telemetry record. Modem fields are included when reported.
#[derive(Debug, Serialize)]
struct Telemetry<'a> {
    seq: u64,
    uptime_s: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    operator: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    rsrp: Option<&'a str>,
}

/// Encodes one newline-terminated JSON payload.
fn telemetry_payload(
    seq: u64,
    uptime_secs: u64,
    info: Option<&ModemInfo>,
) -> serde_json::Result<String> {
    let telemetry = Telemetry {
        seq,
        uptime_s: uptime_secs,
        operator: info.and_then(|i| i.operator.as_deref()),
        rsrp: info.and_then(|i| i.rsrp.as_deref()),
    };
    let mut payload = serde_json::to_string(&telemetry)?;
    payload.push('\n');
    Ok(payload)
}

async fn run(manager: &mut HostManager, config: &AgentConfig) -> anyhow::Result<()> {
    let started = Instant::now();
    manager
        .start()
        .await
        .context("Initial bring-up failed")?;

    let mut ticker = tokio::time::interval(config.interval);
    let mut cycle: u64 = 0;
    loop {
        ticker.tick().await;
        cycle += 1;

        if manager.current_state() == ConnectionState::Reconnecting {
            manager
                .reconnect()
                .await
                .context("Connection could not be recovered")?;
        }

        let payload = telemetry_payload(cycle, started.elapsed().as_secs(), manager.modem_info())
            .context("Failed to encode telemetry")?;
        match manager.send(payload.as_bytes()).await {
            Ok(sent) => debug!("Cycle {cycle}: sent {sent} bytes"),
            Err(SendError::NotConnected) => warn!("Cycle {cycle}: not connected, skipping"),
            Err(e) => warn!("Cycle {cycle}: {e}"),
        }

        if config.max_cycles.is_some_and(|max| cycle >= max) {
            info!("Completed {cycle} cycles");
            return Ok(());
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Set RUST_LOG to control verbosity.
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let _lock = lock::acquire_agent_lock()?;
    let config = cli.agent_config()?;

    info!(
        "Sending to {}:{} every {:?} over {}",
        config.connectivity.hostname,
        config.connectivity.port,
        config.interval,
        config.interface
    );

    let mut manager = ConnectivityManager::new(
        NoopModem::new(),
        StaticInterface::new(config.interface.as_str()),
        SystemDnsBackend::new(),
        TcpTransport::default(),
        config.connectivity.clone(),
    );

    let outcome = tokio::select! {
        result = run(&mut manager, &config) => result,
        _ = tokio::signal::ctrl_c() => {
            info!("Interrupted");
            Ok(())
        }
    };

    manager.shutdown().await;
    outcome
}
