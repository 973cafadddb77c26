//! Connectivity lifecycle state machine.
//!
//! Composes the power controller, interface monitor, resolver and socket
//! session into one lifecycle:
//!
//! 1. Power on the modem
//! 2. Bring up the interface
//! 3. Wait for L4 connectivity (hard gate)
//! 4. Wait for a DNS server (soft gate), then resolve the endpoint
//! 5. Connect
//!
//! Any failure before the first `Connected` is fatal and ends in `Shutdown`;
//! partially initialized hardware is not retried blindly. After the first
//! success, send failures and link loss move to `Reconnecting`, which
//! power-cycles the modem and rebuilds the session under a bounded retry
//! budget before escalating to shutdown.
//!
//! All steps run on the caller's task and take `&mut self`, so no two steps
//! ever overlap.

use log::{debug, error, info, warn};
use tokio::sync::watch;

use crate::Result;
use crate::api::config::{ConnectivityConfig, EndpointPolicy};
use crate::api::models::{
    ConnectionState, LifecycleError, ModemInfo, ResolvedEndpoint, SendError,
};
use crate::core::interface::{InterfaceMonitor, NetworkInterface};
use crate::core::power::{ModemDevice, PowerController};
use crate::core::resolver::{AsyncResolver, DnsBackend};
use crate::core::retry::RetryBudget;
use crate::core::session::{SocketSession, Transport};
use crate::util::utils::{log_modem_info, pause};

/// Drives a cellular link from cold start to a connected TCP session and
/// keeps it there.
///
/// # Example
///
/// ```no_run
/// use cellconn::host::{NoopModem, StaticInterface, SystemDnsBackend, TcpTransport};
/// use cellconn::{ConnectivityConfig, ConnectivityManager, SendError};
///
/// # async fn example() -> cellconn::Result<()> {
/// let mut manager = ConnectivityManager::new(
///     NoopModem::new(),
///     StaticInterface::new("ppp0"),
///     SystemDnsBackend::new(),
///     TcpTransport::default(),
///     ConnectivityConfig::new().with_hostname("example.com").with_port(8080),
/// );
///
/// manager.start().await?;
///
/// match manager.send(b"{\"x\":1}").await {
///     Ok(n) => println!("sent {n} bytes"),
///     Err(SendError::NotConnected) => println!("skipped, not connected"),
///     Err(SendError::TransportFailure(e)) => {
///         println!("send failed: {e}");
///         manager.reconnect().await?;
///     }
/// }
///
/// manager.shutdown().await;
/// # Ok(())
/// # }
/// ```
pub struct ConnectivityManager<M, I, D, T: Transport> {
    config: ConnectivityConfig,
    power: PowerController<M>,
    iface: InterfaceMonitor<I>,
    resolver: AsyncResolver<D>,
    session: SocketSession<T>,
    state: ConnectionState,
    state_tx: watch::Sender<ConnectionState>,
    retry: RetryBudget,
    endpoint: Option<ResolvedEndpoint>,
    modem_info: Option<ModemInfo>,
}

impl<M, I, D, T> ConnectivityManager<M, I, D, T>
where
    M: ModemDevice,
    I: NetworkInterface,
    D: DnsBackend,
    T: Transport,
{
    /// Creates a manager in `Uninitialized`. Nothing is touched until [`start`](Self::start).
    pub fn new(modem: M, iface: I, dns: D, transport: T, config: ConnectivityConfig) -> Self {
        let (state_tx, _) = watch::channel(ConnectionState::Uninitialized);
        Self {
            power: PowerController::new(modem, config.power_settle),
            iface: InterfaceMonitor::new(iface),
            resolver: AsyncResolver::new(dns),
            session: SocketSession::new(transport),
            state: ConnectionState::Uninitialized,
            state_tx,
            retry: RetryBudget::new(config.retry),
            endpoint: None,
            modem_info: None,
            config,
        }
    }

    /// Runs the bring-up pipeline up to `Connected`.
    ///
    /// # Errors
    ///
    /// Any failure is fatal: resources acquired so far are released, the
    /// state becomes `Shutdown`, and the error is returned. Returns
    /// `LifecycleError::InvalidState` unless called in `Uninitialized`.
    pub async fn start(&mut self) -> Result<()> {
        if self.state != ConnectionState::Uninitialized {
            return Err(LifecycleError::InvalidState(self.state));
        }

        info!("Starting cellular connectivity");
        match self.bring_up().await {
            Ok(()) => Ok(()),
            Err(e) => {
                error!("Bring-up failed while {}: {e}", self.state);
                self.release_resources().await;
                self.transition(ConnectionState::Shutdown);
                Err(e)
            }
        }
    }

    /// Sends a payload over the session.
    ///
    /// Only valid in `Connected`. In any other state nothing is attempted and
    /// `SendError::NotConnected` is returned; callers treat that as "skip
    /// this cycle". A transport failure, or link loss noticed before sending,
    /// moves the manager to `Reconnecting`.
    pub async fn send(&mut self, bytes: &[u8]) -> std::result::Result<usize, SendError> {
        if self.state != ConnectionState::Connected {
            debug!("Not sending {} bytes while {}", bytes.len(), self.state);
            return Err(SendError::NotConnected);
        }

        if self.iface.poll_link_lost() {
            self.begin_reconnect("link lost");
            return Err(SendError::NotConnected);
        }

        match self.session.send(bytes).await {
            Ok(sent) => Ok(sent),
            Err(SendError::NotConnected) => {
                self.begin_reconnect("session closed");
                Err(SendError::NotConnected)
            }
            Err(e) => {
                self.begin_reconnect("send failure");
                Err(e)
            }
        }
    }

    /// Reports an externally observed disconnect.
    ///
    /// Moves `Connected` to `Reconnecting`; ignored in any other state.
    pub fn notify_disconnected(&mut self) {
        if self.state == ConnectionState::Connected {
            self.begin_reconnect("external disconnect");
        } else {
            debug!("Ignoring disconnect notification while {}", self.state);
        }
    }

    /// Runs the reconnect procedure until connected or out of budget.
    ///
    /// Each attempt closes the session, power-cycles the modem, brings the
    /// interface up, waits for the link, re-resolves the endpoint unless it is
    /// cached, and connects. Calling this while `Connected` forces a
    /// reconnect.
    ///
    /// # Errors
    ///
    /// `LifecycleError::RetriesExhausted` after the budget runs out; the
    /// manager has shut down by then. `LifecycleError::InvalidState` unless
    /// called in `Connected` or `Reconnecting`.
    pub async fn reconnect(&mut self) -> Result<()> {
        match self.state {
            ConnectionState::Reconnecting => {}
            ConnectionState::Connected => self.begin_reconnect("requested"),
            other => return Err(LifecycleError::InvalidState(other)),
        }

        info!("Attempting to reconnect");
        while let Some(delay) = self.retry.next_attempt() {
            let attempt = self.retry.attempts();
            if !delay.is_zero() {
                info!("Waiting {delay:?} before reconnect attempt {attempt}");
                pause(delay).await;
            }

            match self.reconnect_once().await {
                Ok(()) => {
                    info!("Reconnected to server on attempt {attempt}");
                    self.enter_connected();
                    return Ok(());
                }
                Err(e) => {
                    warn!(
                        "Reconnect attempt {attempt}/{} failed: {e}",
                        self.config.retry.max_attempts
                    );
                    if !self.retry.is_exhausted() {
                        self.transition(ConnectionState::Reconnecting);
                    }
                }
            }
        }

        let attempts = self.retry.attempts();
        error!("Failed to reconnect after {attempts} attempts, shutting down");
        self.shutdown().await;
        Err(LifecycleError::RetriesExhausted { attempts })
    }

    /// Closes the session, brings the interface down and powers the modem off.
    ///
    /// Best-effort: errors are logged and the manager always ends in
    /// `Shutdown`. Also releases whatever an interrupted `start` left
    /// acquired. Calling it again does nothing.
    pub async fn shutdown(&mut self) {
        if self.state.is_terminal() {
            return;
        }

        if matches!(
            self.state,
            ConnectionState::Connected | ConnectionState::Reconnecting
        ) {
            self.transition(ConnectionState::ShuttingDown);
            info!("Shutting down cellular connection");
            self.release_resources().await;
        } else if self.state.is_bringing_up() {
            // start() was dropped mid-pipeline.
            warn!("Shutting down during bring-up while {}", self.state);
            self.release_resources().await;
        }
        self.transition(ConnectionState::Shutdown);
    }

    /// Returns `true` if a payload can be sent right now.
    pub fn is_connected(&self) -> bool {
        self.state == ConnectionState::Connected && self.session.is_open()
    }

    /// Current lifecycle state.
    pub fn current_state(&self) -> ConnectionState {
        self.state
    }

    /// Subscribes to state changes.
    ///
    /// The receiver sees the state at subscription time and every later
    /// transition.
    pub fn subscribe_state(&self) -> watch::Receiver<ConnectionState> {
        self.state_tx.subscribe()
    }

    /// Reconnect attempts made since the last time `Connected` was reached.
    pub fn retry_count(&self) -> u32 {
        self.retry.attempts()
    }

    /// Most recently resolved endpoint.
    pub fn endpoint(&self) -> Option<ResolvedEndpoint> {
        self.endpoint
    }

    /// Modem report captured at the last link-up.
    pub fn modem_info(&self) -> Option<&ModemInfo> {
        self.modem_info.as_ref()
    }

    /// Configuration the manager was created with.
    pub fn config(&self) -> &ConnectivityConfig {
        &self.config
    }

    async fn bring_up(&mut self) -> Result<()> {
        self.transition(ConnectionState::PoweringOn);
        self.power.power_on().await?;

        self.transition(ConnectionState::InterfaceBringUp);
        self.iface.bring_up().await?;

        self.transition(ConnectionState::AwaitingLinkUp);
        self.iface.await_link(self.config.link_timeout).await?;
        self.report_modem_info().await;

        self.transition(ConnectionState::ResolvingEndpoint);
        let endpoint = self.resolve_endpoint().await?;

        self.transition(ConnectionState::Connecting);
        self.session.connect(&endpoint).await?;

        self.enter_connected();
        Ok(())
    }

    async fn reconnect_once(&mut self) -> Result<()> {
        self.session.close().await;
        self.power.power_cycle().await?;
        self.iface.bring_up().await?;
        self.iface
            .await_link(self.config.reconnect_link_timeout)
            .await?;
        self.report_modem_info().await;

        // Wait a bit to stabilize
        pause(self.config.stabilization_delay).await;

        let endpoint = match (self.config.endpoint_policy, self.endpoint) {
            (EndpointPolicy::Cache, Some(cached)) => {
                debug!("Reusing cached endpoint {cached}");
                cached
            }
            _ => self.resolve_endpoint().await?,
        };

        self.session.connect(&endpoint).await?;
        Ok(())
    }

    async fn resolve_endpoint(&mut self) -> Result<ResolvedEndpoint> {
        if let Err(e) = self
            .iface
            .await_dns_ready(self.config.dns_ready_timeout)
            .await
        {
            warn!("{e}, continuing anyway");
        }

        let endpoint = self
            .resolver
            .resolve(
                &self.config.hostname,
                self.config.port,
                self.config.address_family,
                self.config.resolve_timeout,
            )
            .await?;
        self.endpoint = Some(endpoint);
        Ok(endpoint)
    }

    async fn report_modem_info(&mut self) {
        let info = self.power.modem_info().await;
        log_modem_info(&info);
        self.modem_info = Some(info);
    }

    async fn release_resources(&mut self) {
        self.session.close().await;
        if self.iface.is_up() {
            // Logged by the monitor; shutdown carries on regardless.
            let _ = self.iface.bring_down().await;
        }
        if self.power.is_powered() {
            let _ = self.power.power_off().await;
        }
    }

    fn enter_connected(&mut self) {
        self.retry.reset();
        self.transition(ConnectionState::Connected);
    }

    fn begin_reconnect(&mut self, reason: &str) {
        warn!("Connection lost ({reason}), reconnecting");
        self.transition(ConnectionState::Reconnecting);
    }

    fn transition(&mut self, next: ConnectionState) {
        let prev = self.state;
        debug_assert!(
            prev.can_transition_to(next),
            "illegal transition {prev} -> {next}"
        );
        if !prev.can_transition_to(next) {
            error!("Illegal state transition {prev} -> {next}");
        }
        if prev != next {
            debug!("State: {prev} -> {next}");
        }
        self.state = next;
        self.state_tx.send_replace(next);
    }
}
