//! Default values for the connectivity lifecycle.
//!
//! These match what a typical LTE-M/NB-IoT modem on a PPP interface needs:
//! attaching to the network can take minutes, while DNS server announcement
//! either happens quickly or not at all.

/// Default remote endpoint.
pub mod endpoint {
    /// Hostname the manager resolves when none is configured.
    pub const DEFAULT_HOSTNAME: &str = "example.com";

    /// Destination port applied to the resolved address.
    pub const DEFAULT_PORT: u16 = 8080;
}

/// Timeout constants for readiness waits and settle delays.
pub mod timeouts {
    use std::time::Duration;

    /// Maximum time to wait for L4 connectivity on first bring-up (120 seconds).
    ///
    /// Network attach after a cold modem start is slow.
    const LINK_TIMEOUT_SECS: u64 = 120;

    /// Maximum time to wait for L4 connectivity after a power-cycle (60 seconds).
    const RECONNECT_LINK_TIMEOUT_SECS: u64 = 60;

    /// Maximum time to wait for a DNS server announcement (10 seconds).
    ///
    /// Soft gate; some networks never send it.
    const DNS_READY_TIMEOUT_SECS: u64 = 10;

    /// Maximum time to wait for a hostname resolution (20 seconds).
    const RESOLVE_TIMEOUT_SECS: u64 = 20;

    /// Delay after a power-state change before touching the interface.
    const POWER_SETTLE_MS: u64 = 1000;

    /// Delay after link-up on reconnect before opening the socket.
    const STABILIZATION_DELAY_SECS: u64 = 5;

    /// Returns the initial link-up timeout.
    pub fn link_timeout() -> Duration {
        Duration::from_secs(LINK_TIMEOUT_SECS)
    }

    /// Returns the link-up timeout used while reconnecting.
    pub fn reconnect_link_timeout() -> Duration {
        Duration::from_secs(RECONNECT_LINK_TIMEOUT_SECS)
    }

    /// Returns the DNS-ready timeout.
    pub fn dns_ready_timeout() -> Duration {
        Duration::from_secs(DNS_READY_TIMEOUT_SECS)
    }

    /// Returns the resolution timeout.
    pub fn resolve_timeout() -> Duration {
        Duration::from_secs(RESOLVE_TIMEOUT_SECS)
    }

    /// Returns the power settle delay.
    pub fn power_settle() -> Duration {
        Duration::from_millis(POWER_SETTLE_MS)
    }

    /// Returns the post-link stabilization delay.
    pub fn stabilization_delay() -> Duration {
        Duration::from_secs(STABILIZATION_DELAY_SECS)
    }
}

/// Reconnect retry defaults.
pub mod retry {
    use std::time::Duration;

    /// Reconnect attempts before escalating to shutdown.
    pub const MAX_ATTEMPTS: u32 = 5;

    /// Backoff before the second attempt; doubles afterwards.
    pub fn initial_backoff() -> Duration {
        Duration::from_secs(1)
    }

    /// Upper bound on the backoff between attempts.
    pub fn max_backoff() -> Duration {
        Duration::from_secs(60)
    }
}

/// RSRP thresholds (dBm) for bar display.
pub mod signal_strength {
    /// Offset between the modem's raw RSRP index and dBm (3GPP TS 36.133).
    pub const RSRP_OFFSET_DBM: i32 = 140;
    pub const BAR_4_MIN: i32 = -80;
    pub const BAR_3_MIN: i32 = -90;
    pub const BAR_2_MIN: i32 = -100;
}
