//! Asynchronous hostname resolution behind a waiting façade.
//!
//! The stack resolves in the background and reports through a callback that
//! may run on another thread. [`AsyncResolver::resolve`] starts the query and
//! suspends the caller until the callback hands over the first address or
//! the timeout fires.
//!
//! Each request gets a generation token and its own single-use channel. The
//! slot is retired the moment the waiter stops waiting, on success or on
//! timeout, so a callback that fires late finds a stale token and is dropped.
//! It can never deliver into a newer request.

use futures::channel::oneshot;
use futures::{FutureExt, select};
use futures_timer::Delay;
use log::{debug, error, info, warn};
use std::net::IpAddr;
use std::pin::pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use crate::api::models::{AddressFamily, DnsEvent, ResolveError, ResolvedEndpoint};

/// Completion callback handed to a [`DnsBackend`].
///
/// May be called any number of times, from any thread, at any point after
/// `start_query` returns, including after the waiter has given up.
pub type DnsCallback = Arc<dyn Fn(DnsEvent) + Send + Sync>;

/// Non-blocking DNS query interface of the network stack.
pub trait DnsBackend: Send + Sync {
    /// Starts a query and returns without waiting for it.
    ///
    /// `timeout` is passed through to the stack; results arrive via `callback`.
    fn start_query(
        &self,
        hostname: &str,
        family: AddressFamily,
        timeout: Duration,
        callback: DnsCallback,
    ) -> Result<(), ResolveError>;
}

impl<T: DnsBackend + ?Sized> DnsBackend for Arc<T> {
    fn start_query(
        &self,
        hostname: &str,
        family: AddressFamily,
        timeout: Duration,
        callback: DnsCallback,
    ) -> Result<(), ResolveError> {
        (**self).start_query(hostname, family, timeout, callback)
    }
}

type Outcome = Result<IpAddr, ResolveError>;

#[derive(Debug, Default)]
struct Slot {
    generation: u64,
    in_flight: bool,
    waiter: Option<oneshot::Sender<Outcome>>,
}

fn lock(slot: &Mutex<Slot>) -> MutexGuard<'_, Slot> {
    slot.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Resolves one hostname at a time through a [`DnsBackend`].
pub struct AsyncResolver<D> {
    backend: D,
    slot: Arc<Mutex<Slot>>,
}

impl<D: DnsBackend> AsyncResolver<D> {
    /// Creates an idle resolver over `backend`.
    pub fn new(backend: D) -> Self {
        Self {
            backend,
            slot: Arc::new(Mutex::new(Slot::default())),
        }
    }

    /// Resolves `hostname` and returns the first address of `family`, with
    /// `port` applied.
    ///
    /// Fails fast with [`ResolveError::Busy`] while another request on this
    /// resolver is pending. On timeout the underlying query is not cancelled,
    /// but this resolver is free for the next request.
    pub async fn resolve(
        &self,
        hostname: &str,
        port: u16,
        family: AddressFamily,
        timeout: Duration,
    ) -> Result<ResolvedEndpoint, ResolveError> {
        let (token, mut rx) = self.begin()?;
        // Retires the slot on every exit path, including the future being dropped.
        let _pending = PendingRequest {
            slot: &self.slot,
            token,
        };
        info!("Performing DNS lookup for {hostname}");

        let callback = completion_callback(Arc::downgrade(&self.slot), token, family);
        if let Err(e) = self.backend.start_query(hostname, family, timeout, callback) {
            error!("Failed to start DNS query: {e}");
            return Err(e);
        }

        let mut timeout_delay = pin!(Delay::new(timeout).fuse());
        let outcome = select! {
            _ = timeout_delay => {
                error!("DNS query timed out");
                Err(ResolveError::Timeout(timeout))
            }
            delivered = rx => match delivered {
                Ok(outcome) => outcome,
                Err(oneshot::Canceled) => {
                    Err(ResolveError::ProtocolFailure("query abandoned".into()))
                }
            }
        };

        let ip = outcome?;
        let endpoint = ResolvedEndpoint::new(ip, port);
        info!("Resolved {hostname} to {ip}");
        Ok(endpoint)
    }

    /// Returns `true` while a request is pending.
    pub fn is_busy(&self) -> bool {
        lock(&self.slot).in_flight
    }

    /// Borrows the underlying backend.
    pub fn backend(&self) -> &D {
        &self.backend
    }

    fn begin(&self) -> Result<(u64, oneshot::Receiver<Outcome>), ResolveError> {
        let mut slot = lock(&self.slot);
        if slot.in_flight {
            warn!("DNS query already in progress");
            return Err(ResolveError::Busy);
        }
        let (tx, rx) = oneshot::channel();
        slot.generation = slot.generation.wrapping_add(1);
        slot.in_flight = true;
        slot.waiter = Some(tx);
        Ok((slot.generation, rx))
    }
}

/// Invalidates its token when dropped, if it is still the pending request.
struct PendingRequest<'a> {
    slot: &'a Mutex<Slot>,
    token: u64,
}

impl Drop for PendingRequest<'_> {
    fn drop(&mut self) {
        let mut slot = lock(self.slot);
        if slot.generation == self.token && slot.in_flight {
            slot.in_flight = false;
            slot.waiter = None;
            debug!("Retired DNS request {}", self.token);
        }
    }
}

fn completion_callback(slot: Weak<Mutex<Slot>>, token: u64, family: AddressFamily) -> DnsCallback {
    Arc::new(move |event: DnsEvent| {
        let Some(slot) = slot.upgrade() else {
            return;
        };
        let mut slot = lock(&slot);
        if slot.generation != token || !slot.in_flight {
            debug!("Dropping DNS event for retired request {token}: {event:?}");
            return;
        }

        let outcome = match event {
            DnsEvent::Address(ip) if family.matches(&ip) => Ok(ip),
            DnsEvent::Address(ip) => {
                debug!("Skipping {ip}: not {family}");
                return;
            }
            DnsEvent::Done => Err(ResolveError::ProtocolFailure(format!(
                "no {family} address in response"
            ))),
            DnsEvent::Failed(status) => Err(ResolveError::ProtocolFailure(format!(
                "resolver status {status}"
            ))),
        };

        slot.in_flight = false;
        if let Some(tx) = slot.waiter.take() {
            // The receiver is only gone if the waiter was dropped mid-wait.
            let _ = tx.send(outcome);
        }
    })
}
