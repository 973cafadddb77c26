//! Configuration for the connectivity lifecycle.

use std::time::Duration;

use crate::api::models::AddressFamily;
use crate::types::constants::{endpoint, retry, timeouts};

/// What to do with a previously resolved endpoint when reconnecting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EndpointPolicy {
    /// Resolve the hostname again on every reconnect attempt.
    #[default]
    ReResolve,
    /// Reuse the endpoint from the first successful resolution.
    Cache,
}

/// Bounded reconnect schedule.
///
/// The first reconnect attempt runs immediately. Each further attempt waits
/// `initial_backoff * 2^(n-1)`, capped at `max_backoff`. After `max_attempts`
/// failed attempts the manager shuts down.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Attempts before giving up. Zero disables reconnection.
    pub max_attempts: u32,
    /// Delay before the second attempt.
    pub initial_backoff: Duration,
    /// Upper bound on any single delay.
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: retry::MAX_ATTEMPTS,
            initial_backoff: retry::initial_backoff(),
            max_backoff: retry::max_backoff(),
        }
    }
}

impl RetryPolicy {
    /// Returns the delay to wait before attempt number `attempt` (1-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        if attempt <= 1 {
            return Duration::ZERO;
        }
        let exp = (attempt - 2).min(31);
        self.initial_backoff
            .checked_mul(1u32 << exp)
            .unwrap_or(self.max_backoff)
            .min(self.max_backoff)
    }
}

/// Settings for a [`ConnectivityManager`](crate::ConnectivityManager).
///
/// Use the builder methods to override individual values:
///
/// ```rust
/// use cellconn::{ConnectivityConfig, EndpointPolicy};
/// use std::time::Duration;
///
/// let config = ConnectivityConfig::new()
///     .with_hostname("telemetry.example.net")
///     .with_port(9000)
///     .with_link_timeout(Duration::from_secs(180))
///     .with_endpoint_policy(EndpointPolicy::Cache);
///
/// assert_eq!(config.port, 9000);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectivityConfig {
    /// Hostname of the remote endpoint.
    pub hostname: String,
    /// Destination port.
    pub port: u16,
    /// Address family to query for.
    pub address_family: AddressFamily,
    /// Hard gate: time allowed for L4 connectivity on first bring-up.
    pub link_timeout: Duration,
    /// Hard gate: time allowed for L4 connectivity after a power-cycle.
    pub reconnect_link_timeout: Duration,
    /// Soft gate: time allowed for a DNS server announcement.
    pub dns_ready_timeout: Duration,
    /// Time allowed for one hostname resolution.
    pub resolve_timeout: Duration,
    /// Delay after each modem power-state change.
    pub power_settle: Duration,
    /// Delay between link-up and connect while reconnecting.
    pub stabilization_delay: Duration,
    /// Whether reconnects resolve the hostname again.
    pub endpoint_policy: EndpointPolicy,
    /// Reconnect schedule.
    pub retry: RetryPolicy,
}

impl Default for ConnectivityConfig {
    fn default() -> Self {
        Self {
            hostname: endpoint::DEFAULT_HOSTNAME.to_string(),
            port: endpoint::DEFAULT_PORT,
            address_family: AddressFamily::default(),
            link_timeout: timeouts::link_timeout(),
            reconnect_link_timeout: timeouts::reconnect_link_timeout(),
            dns_ready_timeout: timeouts::dns_ready_timeout(),
            resolve_timeout: timeouts::resolve_timeout(),
            power_settle: timeouts::power_settle(),
            stabilization_delay: timeouts::stabilization_delay(),
            endpoint_policy: EndpointPolicy::default(),
            retry: RetryPolicy::default(),
        }
    }
}

impl ConnectivityConfig {
    /// Creates a configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the remote hostname.
    pub fn with_hostname(mut self, hostname: impl Into<String>) -> Self {
        self.hostname = hostname.into();
        self
    }

    /// Sets the remote port.
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Sets the address family queried for.
    pub fn with_address_family(mut self, family: AddressFamily) -> Self {
        self.address_family = family;
        self
    }

    /// Sets the initial link-up timeout.
    pub fn with_link_timeout(mut self, timeout: Duration) -> Self {
        self.link_timeout = timeout;
        self
    }

    /// Sets the link-up timeout used while reconnecting.
    pub fn with_reconnect_link_timeout(mut self, timeout: Duration) -> Self {
        self.reconnect_link_timeout = timeout;
        self
    }

    /// Sets the DNS-ready timeout.
    pub fn with_dns_ready_timeout(mut self, timeout: Duration) -> Self {
        self.dns_ready_timeout = timeout;
        self
    }

    /// Sets the resolution timeout.
    pub fn with_resolve_timeout(mut self, timeout: Duration) -> Self {
        self.resolve_timeout = timeout;
        self
    }

    /// Sets the power settle delay.
    pub fn with_power_settle(mut self, delay: Duration) -> Self {
        self.power_settle = delay;
        self
    }

    /// Sets the post-link stabilization delay used while reconnecting.
    pub fn with_stabilization_delay(mut self, delay: Duration) -> Self {
        self.stabilization_delay = delay;
        self
    }

    /// Sets the endpoint policy for reconnects.
    pub fn with_endpoint_policy(mut self, policy: EndpointPolicy) -> Self {
        self.endpoint_policy = policy;
        self
    }

    /// Sets the reconnect retry policy.
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }
}
