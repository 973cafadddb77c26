//! Network interface bring-up and readiness waits.
//!
//! Waits are driven by interface management events rather than polling. Each
//! wait subscribes to the event stream FIRST, then checks the current state,
//! and only then blocks, so an event raised between the check and the wait is
//! never lost.
//!
//! Link-layer readiness (L4 connected) is a hard gate for the caller. DNS
//! server announcement is a soft gate: some networks never send it and still
//! resolve fine, so the caller only logs its timeout.

use async_trait::async_trait;
use futures::stream::{BoxStream, Fuse};
use futures::{FutureExt, StreamExt, select};
use futures_timer::Delay;
use log::{debug, error, info, warn};
use std::pin::pin;
use std::sync::Arc;
use std::time::Duration;

use crate::api::models::{IfaceError, InterfaceEvent, TimeoutError};

/// Stream of management events for one interface.
pub type EventStream = BoxStream<'static, InterfaceEvent>;

/// A network interface bound to the modem (typically PPP).
///
/// Acquired once at startup and reused across reconnects.
#[async_trait]
pub trait NetworkInterface: Send + Sync {
    /// Interface name used in logs.
    fn name(&self) -> &str;

    /// Brings the interface up. Must succeed if it is already up.
    async fn up(&self) -> Result<(), IfaceError>;

    /// Brings the interface down.
    async fn down(&self) -> Result<(), IfaceError>;

    /// Returns a new subscription to this interface's management events.
    ///
    /// Only events raised after the call are delivered.
    fn events(&self) -> EventStream;

    /// Returns `true` if L4 connectivity is currently available.
    async fn is_l4_connected(&self) -> bool;

    /// Returns `true` if a DNS server is currently configured.
    async fn has_dns_server(&self) -> bool {
        false
    }
}

#[async_trait]
impl<T: NetworkInterface + ?Sized> NetworkInterface for Arc<T> {
    fn name(&self) -> &str {
        (**self).name()
    }

    async fn up(&self) -> Result<(), IfaceError> {
        (**self).up().await
    }

    async fn down(&self) -> Result<(), IfaceError> {
        (**self).down().await
    }

    fn events(&self) -> EventStream {
        (**self).events()
    }

    async fn is_l4_connected(&self) -> bool {
        (**self).is_l4_connected().await
    }

    async fn has_dns_server(&self) -> bool {
        (**self).has_dns_server().await
    }
}

/// Brings an interface up or down and waits for readiness events.
pub struct InterfaceMonitor<I> {
    iface: I,
    up: bool,
    link_watch: Option<Fuse<EventStream>>,
}

impl<I: NetworkInterface> InterfaceMonitor<I> {
    pub fn new(iface: I) -> Self {
        Self {
            iface,
            up: false,
            link_watch: None,
        }
    }

    pub fn name(&self) -> &str {
        self.iface.name()
    }

    /// Brings the interface up.
    pub async fn bring_up(&mut self) -> Result<(), IfaceError> {
        info!("Bringing up network interface {}", self.iface.name());
        self.iface.up().await.inspect_err(|e| {
            error!("Failed to bring up network interface: {e}");
        })?;
        self.up = true;
        Ok(())
    }

    /// Brings the interface down and stops watching for link loss.
    pub async fn bring_down(&mut self) -> Result<(), IfaceError> {
        self.link_watch = None;
        debug!("Bringing down network interface {}", self.iface.name());
        self.iface.down().await.inspect_err(|e| {
            error!("Failed to bring down network interface: {e}");
        })?;
        self.up = false;
        Ok(())
    }

    /// Returns `true` after a successful `bring_up` not followed by `bring_down`.
    pub fn is_up(&self) -> bool {
        self.up
    }

    /// Waits for L4 connectivity.
    ///
    /// On success the subscription is kept so that a later link loss can be
    /// picked up by [`poll_link_lost`](Self::poll_link_lost).
    pub async fn await_link(&mut self, timeout: Duration) -> Result<(), TimeoutError> {
        // Subscribe to events FIRST to avoid race condition
        let mut events = self.iface.events().fuse();

        if self.iface.is_l4_connected().await {
            debug!("L4 already connected on {}", self.iface.name());
            self.link_watch = Some(events);
            return Ok(());
        }

        info!("Waiting for L4 connectivity...");
        if wait_for_event(&mut events, InterfaceEvent::L4Connected, timeout).await {
            info!("L4 connected");
            self.link_watch = Some(events);
            Ok(())
        } else {
            error!("L4 was not connected in time");
            Err(TimeoutError::Link(timeout))
        }
    }

    /// Waits for a DNS server announcement.
    ///
    /// A timeout here is expected on some networks; callers treat it as
    /// non-fatal.
    pub async fn await_dns_ready(&mut self, timeout: Duration) -> Result<(), TimeoutError> {
        let mut events = self.iface.events().fuse();

        if self.iface.has_dns_server().await {
            debug!("DNS server already configured on {}", self.iface.name());
            return Ok(());
        }

        info!("Waiting for DNS server...");
        if wait_for_event(&mut events, InterfaceEvent::DnsServerAdded, timeout).await {
            info!("DNS server added");
            Ok(())
        } else {
            Err(TimeoutError::DnsReady(timeout))
        }
    }

    /// Returns `true` if link loss has been reported since the last successful
    /// [`await_link`](Self::await_link). Never blocks.
    pub fn poll_link_lost(&mut self) -> bool {
        let Some(watch) = self.link_watch.as_mut() else {
            return false;
        };

        let mut lost = false;
        let mut ended = false;
        while let Some(item) = watch.next().now_or_never() {
            match item {
                Some(InterfaceEvent::L4Disconnected) => {
                    lost = true;
                    break;
                }
                Some(other) => debug!("Ignoring interface event while connected: {other}"),
                None => {
                    ended = true;
                    break;
                }
            }
        }

        if lost {
            warn!("L4 connectivity lost on {}", self.iface.name());
        }
        if lost || ended {
            self.link_watch = None;
        }
        lost
    }

    /// Borrows the underlying interface.
    pub fn interface(&self) -> &I {
        &self.iface
    }
}

/// Waits until `target` arrives on `events` or `timeout` elapses.
///
/// Returns `false` on timeout or when the stream ends.
async fn wait_for_event(
    events: &mut Fuse<EventStream>,
    target: InterfaceEvent,
    timeout: Duration,
) -> bool {
    let mut timeout_delay = pin!(Delay::new(timeout).fuse());

    loop {
        select! {
            _ = timeout_delay => {
                warn!("No {target} event within {timeout:?}");
                return false;
            }
            event = events.next() => {
                match event {
                    Some(e) if e == target => return true,
                    Some(other) => debug!("Interface event while waiting for {target}: {other}"),
                    None => {
                        warn!("Interface event stream ended");
                        return false;
                    }
                }
            }
        }
    }
}
