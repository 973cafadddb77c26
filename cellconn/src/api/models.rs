use std::fmt::{Display, Formatter};
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;
use thiserror::Error;

/// Lifecycle state of the cellular link.
///
/// There is exactly one of these per [`ConnectivityManager`](crate::ConnectivityManager)
/// and it only changes through validated transitions. See
/// [`ConnectionState::can_transition_to`] for the permitted edges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    /// Nothing has been touched yet. Every cold start begins here.
    Uninitialized,
    /// The modem is being resumed.
    PoweringOn,
    /// The network interface is being brought up.
    InterfaceBringUp,
    /// Waiting for L4 (IP-layer) connectivity on the interface.
    AwaitingLinkUp,
    /// Waiting for a DNS server (soft) and resolving the target hostname.
    ResolvingEndpoint,
    /// Opening the TCP connection to the resolved endpoint.
    Connecting,
    /// Steady state. Payloads may be sent.
    Connected,
    /// Recovering from a failure after the first successful connect.
    Reconnecting,
    /// Releasing the socket, the interface and the modem.
    ShuttingDown,
    /// Terminal.
    Shutdown,
}

impl ConnectionState {
    /// Returns `true` if `next` is a legal successor of `self`.
    ///
    /// Bring-up is a strict pipeline: every step either advances or fails
    /// straight to `Shutdown`, including the first connect. Only `Connected`
    /// may enter `Reconnecting`, and `Reconnecting` may loop on itself while
    /// the retry budget lasts.
    pub fn can_transition_to(self, next: ConnectionState) -> bool {
        use ConnectionState::*;
        matches!(
            (self, next),
            (Uninitialized, PoweringOn)
                | (Uninitialized, Shutdown)
                | (PoweringOn, InterfaceBringUp)
                | (PoweringOn, Shutdown)
                | (InterfaceBringUp, AwaitingLinkUp)
                | (InterfaceBringUp, Shutdown)
                | (AwaitingLinkUp, ResolvingEndpoint)
                | (AwaitingLinkUp, Shutdown)
                | (ResolvingEndpoint, Connecting)
                | (ResolvingEndpoint, Shutdown)
                | (Connecting, Connected)
                | (Connecting, Shutdown)
                | (Connected, Reconnecting)
                | (Connected, ShuttingDown)
                | (Reconnecting, Reconnecting)
                | (Reconnecting, Connected)
                | (Reconnecting, ShuttingDown)
                | (ShuttingDown, Shutdown)
        )
    }

    /// Returns `true` for `Shutdown`.
    pub fn is_terminal(self) -> bool {
        matches!(self, ConnectionState::Shutdown)
    }

    /// Returns `true` while the initial bring-up pipeline is running.
    pub fn is_bringing_up(self) -> bool {
        matches!(
            self,
            ConnectionState::PoweringOn
                | ConnectionState::InterfaceBringUp
                | ConnectionState::AwaitingLinkUp
                | ConnectionState::ResolvingEndpoint
                | ConnectionState::Connecting
        )
    }
}

impl Display for ConnectionState {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Uninitialized => write!(f, "uninitialized"),
            Self::PoweringOn => write!(f, "powering on"),
            Self::InterfaceBringUp => write!(f, "interface bring-up"),
            Self::AwaitingLinkUp => write!(f, "awaiting link-up"),
            Self::ResolvingEndpoint => write!(f, "resolving endpoint"),
            Self::Connecting => write!(f, "connecting"),
            Self::Connected => write!(f, "connected"),
            Self::Reconnecting => write!(f, "reconnecting"),
            Self::ShuttingDown => write!(f, "shutting down"),
            Self::Shutdown => write!(f, "shutdown"),
        }
    }
}

/// IP address family requested from the resolver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum AddressFamily {
    /// A records.
    #[default]
    Ipv4,
    /// AAAA records.
    Ipv6,
}

impl AddressFamily {
    /// Returns the family of a concrete address.
    pub fn of(ip: &IpAddr) -> Self {
        match ip {
            IpAddr::V4(_) => Self::Ipv4,
            IpAddr::V6(_) => Self::Ipv6,
        }
    }

    /// Returns `true` if `ip` belongs to this family.
    pub fn matches(self, ip: &IpAddr) -> bool {
        Self::of(ip) == self
    }
}

impl Display for AddressFamily {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Ipv4 => write!(f, "IPv4"),
            Self::Ipv6 => write!(f, "IPv6"),
        }
    }
}

/// Immutable snapshot of one successful resolution.
///
/// The resolver hands these out by value; nothing inside the resolver can
/// alter a snapshot after it has been returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ResolvedEndpoint {
    family: AddressFamily,
    ip: IpAddr,
    port: u16,
}

impl ResolvedEndpoint {
    /// Creates a snapshot for `ip:port`.
    pub fn new(ip: IpAddr, port: u16) -> Self {
        Self {
            family: AddressFamily::of(&ip),
            ip,
            port,
        }
    }

    /// Address family of the resolved address.
    pub fn family(&self) -> AddressFamily {
        self.family
    }

    /// Resolved IP address.
    pub fn ip(&self) -> IpAddr {
        self.ip
    }

    /// Destination port.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Socket address suitable for a transport connect.
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.ip, self.port)
    }
}

impl Display for ResolvedEndpoint {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.socket_addr())
    }
}

/// Identity and radio information read from the modem.
///
/// Every field is optional: modems differ in what they report and a missing
/// value is never an error.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModemInfo {
    /// Device IMEI.
    pub imei: Option<String>,
    /// SIM card ICCID.
    pub iccid: Option<String>,
    /// Reference signal received power, as reported by the modem.
    pub rsrp: Option<String>,
    /// Current network operator.
    pub operator: Option<String>,
    /// IP address assigned by the network.
    pub ip_address: Option<String>,
}

/// Network management events emitted by an interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterfaceEvent {
    /// IP-layer connectivity is available.
    L4Connected,
    /// IP-layer connectivity was lost.
    L4Disconnected,
    /// A DNS server was announced on the interface.
    DnsServerAdded,
}

impl Display for InterfaceEvent {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::L4Connected => write!(f, "L4 connected"),
            Self::L4Disconnected => write!(f, "L4 disconnected"),
            Self::DnsServerAdded => write!(f, "DNS server added"),
        }
    }
}

/// Completion events delivered by a [`DnsBackend`](crate::DnsBackend) callback.
///
/// A backend may deliver several `Address` events for one query, followed by
/// `Done`. Only the first address is used.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DnsEvent {
    /// One resolved address.
    Address(IpAddr),
    /// The query finished; no more events follow.
    Done,
    /// The query failed with a stack-specific status code.
    Failed(i32),
}

/// Errors raised while changing the modem's power state.
///
/// The power controller never retries these; retry policy belongs to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PowerError {
    /// The modem device is not ready or could not be bound.
    #[error("modem device not ready")]
    NotReady,

    /// Resuming the modem failed.
    #[error("failed to power on modem (error {0})")]
    Resume(i32),

    /// Suspending the modem failed.
    #[error("failed to power down modem (error {0})")]
    Suspend(i32),
}

/// Errors raised while bringing a network interface up or down.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IfaceError {
    /// No interface of the expected kind was found.
    #[error("network interface not found: {0}")]
    NotFound(String),

    /// The interface refused to come up.
    #[error("failed to bring up interface {iface} (error {code})")]
    Up {
        /// Interface name.
        iface: String,
        /// Stack error code.
        code: i32,
    },

    /// The interface refused to go down.
    #[error("failed to bring down interface {iface} (error {code})")]
    Down {
        /// Interface name.
        iface: String,
        /// Stack error code.
        code: i32,
    },
}

/// Readiness waits that ran out of time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TimeoutError {
    /// L4 connectivity was not reported in time.
    #[error("L4 was not connected within {0:?}")]
    Link(Duration),

    /// No DNS server was announced in time.
    #[error("DNS server was not added within {0:?}")]
    DnsReady(Duration),
}

/// Errors returned by the asynchronous resolver.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    /// Another resolution is still in flight on this resolver.
    #[error("a DNS query is already in progress")]
    Busy,

    /// No address arrived within the timeout.
    #[error("DNS query timed out after {0:?}")]
    Timeout(Duration),

    /// The stack rejected the query or reported a failure.
    #[error("DNS query failed: {0}")]
    ProtocolFailure(String),
}

/// Errors returned when opening the TCP session.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConnectError {
    /// A session is already open; close it first.
    #[error("a connection is already open")]
    AlreadyOpen,

    /// The remote end refused the connection.
    #[error("connection refused by {0}")]
    Refused(SocketAddr),

    /// The remote end could not be reached.
    #[error("{addr} unreachable: {reason}")]
    Unreachable {
        /// Destination that could not be reached.
        addr: SocketAddr,
        /// Description of the underlying failure.
        reason: String,
    },
}

/// Errors returned when sending a payload.
///
/// The two variants let a caller tell "nothing was attempted" apart from
/// "an attempt was made and failed".
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SendError {
    /// No session is open; nothing was transmitted.
    #[error("not connected")]
    NotConnected,

    /// The transport failed during transmission.
    #[error("transport failure: {0}")]
    TransportFailure(String),
}

/// Errors surfaced by the connectivity lifecycle.
///
/// # Examples
///
/// ```no_run
/// use cellconn::{ConnectivityManager, LifecycleError};
/// # use cellconn::host::{NoopModem, StaticInterface, SystemDnsBackend, TcpTransport};
///
/// # async fn example() -> cellconn::Result<()> {
/// # let mut manager = ConnectivityManager::new(
/// #     NoopModem::new(), StaticInterface::new("ppp0"), SystemDnsBackend::new(),
/// #     TcpTransport::default(), Default::default());
/// match manager.start().await {
///     Ok(()) => println!("connected"),
///     Err(LifecycleError::Timeout(e)) => eprintln!("link never came up: {e}"),
///     Err(e) => eprintln!("bring-up failed: {e}"),
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LifecycleError {
    /// Power control failed.
    #[error("power error: {0}")]
    Power(#[from] PowerError),

    /// Interface control failed.
    #[error("interface error: {0}")]
    Iface(#[from] IfaceError),

    /// A hard readiness gate timed out.
    #[error("timeout: {0}")]
    Timeout(#[from] TimeoutError),

    /// Hostname resolution failed.
    #[error("resolve error: {0}")]
    Resolve(#[from] ResolveError),

    /// Opening the session failed.
    #[error("connect error: {0}")]
    Connect(#[from] ConnectError),

    /// The reconnect budget ran out.
    #[error("reconnect gave up after {attempts} attempts")]
    RetriesExhausted {
        /// Number of attempts made.
        attempts: u32,
    },

    /// The operation is not valid in the current state.
    #[error("operation not valid in state: {0}")]
    InvalidState(ConnectionState),
}

/// Maps a socket `connect` errno reported by an embedded stack to a `ConnectError`.
///
/// Refusals keep their own variant; everything else is reported as unreachable
/// with the errno in the reason.
pub fn connect_errno_to_error(errno: i32, addr: SocketAddr) -> ConnectError {
    match errno {
        // ECONNREFUSED
        111 => ConnectError::Refused(addr),
        // ENETUNREACH
        101 => ConnectError::Unreachable {
            addr,
            reason: "network unreachable".into(),
        },
        // ETIMEDOUT
        110 => ConnectError::Unreachable {
            addr,
            reason: "connection timed out".into(),
        },
        // EHOSTUNREACH
        113 => ConnectError::Unreachable {
            addr,
            reason: "host unreachable".into(),
        },
        other => ConnectError::Unreachable {
            addr,
            reason: format!("errno {other}"),
        },
    }
}
