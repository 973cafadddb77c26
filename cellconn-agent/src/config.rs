//! Agent configuration file.
//!
//! Every key is optional; anything left out falls back to the library
//! defaults. Durations are given in whole seconds unless the key says
//! otherwise.
//!
//! ```toml
//! [endpoint]
//! hostname = "telemetry.example.com"
//! port = 8080
//! family = "ipv4"        # or "ipv6"
//! policy = "re-resolve"  # or "cache"
//!
//! [timeouts]
//! link_secs = 120
//! reconnect_link_secs = 60
//! dns_ready_secs = 10
//! resolve_secs = 20
//! power_settle_ms = 1000
//! stabilization_secs = 5
//!
//! [retry]
//! max_attempts = 5
//! initial_backoff_secs = 1
//! max_backoff_secs = 60
//!
//! [agent]
//! interface = "ppp0"
//! interval_secs = 60
//! ```

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, anyhow};
use cellconn::{AddressFamily, ConnectivityConfig, EndpointPolicy, RetryPolicy};
use serde::Deserialize;

const DEFAULT_INTERFACE: &str = "ppp0";
const DEFAULT_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AgentConfigInput {
    pub endpoint: EndpointInput,
    pub timeouts: TimeoutsInput,
    pub retry: RetryInput,
    pub agent: LoopInput,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct EndpointInput {
    pub hostname: Option<String>,
    pub port: Option<u16>,
    pub family: Option<String>,
    pub policy: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct TimeoutsInput {
    pub link_secs: Option<u64>,
    pub reconnect_link_secs: Option<u64>,
    pub dns_ready_secs: Option<u64>,
    pub resolve_secs: Option<u64>,
    pub power_settle_ms: Option<u64>,
    pub stabilization_secs: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RetryInput {
    pub max_attempts: Option<u32>,
    pub initial_backoff_secs: Option<u64>,
    pub max_backoff_secs: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct LoopInput {
    pub interface: Option<String>,
    pub interval_secs: Option<u64>,
    pub max_cycles: Option<u64>,
}

/// Fully resolved agent settings.
#[derive(Debug, Clone)]
pub struct AgentConfig {
    pub connectivity: ConnectivityConfig,
    /// Interface name handed to the host interface backend.
    pub interface: String,
    /// Time between payloads.
    pub interval: Duration,
    /// Stop after this many cycles. Runs until interrupted when unset.
    pub max_cycles: Option<u64>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            connectivity: ConnectivityConfig::default(),
            interface: DEFAULT_INTERFACE.to_string(),
            interval: DEFAULT_INTERVAL,
            max_cycles: None,
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.and_then(|v| {
        let trimmed = v.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    })
}

fn parse_family(value: &str) -> Result<AddressFamily, String> {
    match value.trim().to_ascii_lowercase().as_str() {
        "ipv4" | "inet" => Ok(AddressFamily::Ipv4),
        "ipv6" | "inet6" => Ok(AddressFamily::Ipv6),
        other => Err(format!("Unknown address family '{other}'")),
    }
}

fn parse_policy(value: &str) -> Result<EndpointPolicy, String> {
    match value.trim().to_ascii_lowercase().as_str() {
        "re-resolve" | "reresolve" => Ok(EndpointPolicy::ReResolve),
        "cache" => Ok(EndpointPolicy::Cache),
        other => Err(format!("Unknown endpoint policy '{other}'")),
    }
}

impl AgentConfigInput {
    pub fn resolve(self) -> Result<AgentConfig, String> {
        let defaults = ConnectivityConfig::default();
        let secs = |value: Option<u64>, fallback: Duration| -> Duration {
            value.map(Duration::from_secs).unwrap_or(fallback)
        };

        let mut connectivity = defaults.clone();
        if let Some(hostname) = non_empty(self.endpoint.hostname) {
            connectivity.hostname = hostname;
        }
        if let Some(port) = self.endpoint.port {
            if port == 0 {
                return Err("Endpoint port must be non-zero".to_string());
            }
            connectivity.port = port;
        }
        if let Some(family) = self.endpoint.family.as_deref() {
            connectivity.address_family = parse_family(family)?;
        }
        if let Some(policy) = self.endpoint.policy.as_deref() {
            connectivity.endpoint_policy = parse_policy(policy)?;
        }

        let t = self.timeouts;
        connectivity.link_timeout = secs(t.link_secs, defaults.link_timeout);
        connectivity.reconnect_link_timeout =
            secs(t.reconnect_link_secs, defaults.reconnect_link_timeout);
        connectivity.dns_ready_timeout = secs(t.dns_ready_secs, defaults.dns_ready_timeout);
        connectivity.resolve_timeout = secs(t.resolve_secs, defaults.resolve_timeout);
        connectivity.power_settle = t
            .power_settle_ms
            .map(Duration::from_millis)
            .unwrap_or(defaults.power_settle);
        connectivity.stabilization_delay =
            secs(t.stabilization_secs, defaults.stabilization_delay);

        let retry_defaults = RetryPolicy::default();
        let initial_backoff = secs(
            self.retry.initial_backoff_secs,
            retry_defaults.initial_backoff,
        );
        let max_backoff = secs(self.retry.max_backoff_secs, retry_defaults.max_backoff)
            .max(initial_backoff);
        connectivity.retry = RetryPolicy {
            max_attempts: self
                .retry
                .max_attempts
                .unwrap_or(retry_defaults.max_attempts),
            initial_backoff,
            max_backoff,
        };

        let interval = secs(self.agent.interval_secs, DEFAULT_INTERVAL);
        if interval.is_zero() {
            return Err("Send interval must be at least one second".to_string());
        }

        Ok(AgentConfig {
            connectivity,
            interface: non_empty(self.agent.interface)
                .unwrap_or_else(|| DEFAULT_INTERFACE.to_string()),
            interval,
            max_cycles: self.agent.max_cycles,
        })
    }
}

impl AgentConfig {
    pub fn from_toml_str(input: &str) -> Result<Self, String> {
        if input.trim().is_empty() {
            return Ok(AgentConfig::default());
        }
        let parsed: AgentConfigInput =
            toml::from_str(input).map_err(|e| format!("Invalid config TOML: {e}"))?;
        parsed.resolve()
    }

    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::from_toml_str(&text).map_err(|e| anyhow!("{}: {e}", path.display()))
    }
}
