//! DNS backend over the system resolver.

use log::{debug, warn};
use std::time::Duration;
use tokio::net::lookup_host;
use tokio::runtime::Handle;
use tokio::time::timeout;

use crate::api::models::{AddressFamily, DnsEvent, ResolveError};
use crate::core::resolver::{DnsBackend, DnsCallback};

/// getaddrinfo status reported when the lookup ran out of time.
const EAI_AGAIN: i32 = -3;
/// getaddrinfo status reported for failures without an OS error code.
const EAI_FAIL: i32 = -4;

/// Resolves through the host's resolver on a background task.
///
/// Must be used from within a tokio runtime.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemDnsBackend;

impl SystemDnsBackend {
    pub fn new() -> Self {
        Self
    }
}

impl DnsBackend for SystemDnsBackend {
    fn start_query(
        &self,
        hostname: &str,
        family: AddressFamily,
        query_timeout: Duration,
        callback: DnsCallback,
    ) -> Result<(), ResolveError> {
        let handle = Handle::try_current()
            .map_err(|_| ResolveError::ProtocolFailure("no async runtime available".into()))?;
        let host = hostname.to_string();
        debug!("Starting {family} lookup for {host}");

        handle.spawn(async move {
            match timeout(query_timeout, lookup_host((host.as_str(), 0))).await {
                Ok(Ok(addrs)) => {
                    for addr in addrs {
                        callback(DnsEvent::Address(addr.ip()));
                    }
                    callback(DnsEvent::Done);
                }
                Ok(Err(e)) => {
                    warn!("Lookup for {host} failed: {e}");
                    callback(DnsEvent::Failed(e.raw_os_error().unwrap_or(EAI_FAIL)));
                }
                Err(_) => {
                    warn!("Lookup for {host} timed out");
                    callback(DnsEvent::Failed(EAI_AGAIN));
                }
            }
        });
        Ok(())
    }
}
