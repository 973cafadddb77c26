//! Connectivity lifecycle management for cellular modems.
//!
//! This crate takes a modem from cold start to a live TCP session and keeps
//! it there:
//!
//! - Powering the modem on, off, and through power cycles
//! - Bringing up the modem's network interface and waiting for the link
//! - Resolving the server endpoint through an asynchronous DNS backend
//! - Opening one outbound TCP session and sending payloads over it
//! - Reconnecting under a bounded retry budget after the link is lost
//!
//! # Example
//!
//! ```no_run
//! use cellconn::host::{NoopModem, StaticInterface, SystemDnsBackend, TcpTransport};
//! use cellconn::{ConnectivityConfig, ConnectivityManager};
//!
//! # async fn example() -> cellconn::Result<()> {
//! let config = ConnectivityConfig::new()
//!     .with_hostname("telemetry.example.com")
//!     .with_port(8080);
//!
//! let mut manager = ConnectivityManager::new(
//!     NoopModem::new(),
//!     StaticInterface::new("ppp0"),
//!     SystemDnsBackend::new(),
//!     TcpTransport::default(),
//!     config,
//! );
//!
//! manager.start().await?;
//! manager.send(b"{\"temperature\":21.5}").await.ok();
//! manager.shutdown().await;
//! # Ok(())
//! # }
//! ```
//!
//! # Hardware Seams
//!
//! The modem, interface, DNS backend and transport are traits
//! ([`ModemDevice`], [`NetworkInterface`], [`DnsBackend`], [`Transport`]).
//! The [`host`] module implements them for a regular OS where the kernel owns
//! the link; embedded targets supply their own.
//!
//! # Error Handling
//!
//! Lifecycle operations return `Result<T, LifecycleError>`. Each stage has its
//! own error type (`PowerError`, `IfaceError`, `TimeoutError`,
//! `ResolveError`, `ConnectError`) which converts into `LifecycleError`.
//! `send` returns `SendError` directly so callers can tell "not connected,
//! skip this cycle" apart from a real transport failure.
//!
//! # Event-Driven Waits
//!
//! Waiting for the link and for DNS servers is driven by interface events,
//! not polling. Every wait subscribes before checking the current state, so
//! an event raised in between is never lost, and every wait is bounded by a
//! timeout.
//!
//! # Logging
//!
//! This crate uses the [`log`](https://docs.rs/log) facade for logging. To see
//! log output, add a logging implementation like `env_logger`. For example:

//! ```no_run,ignore
//! env_logger::init();
//! // ...
//! ```

// Internal implementation modules
mod core;
mod types;
mod util;

// Public API modules
pub mod api;
pub mod host;

// Re-exported public API
pub use api::config::{ConnectivityConfig, EndpointPolicy, RetryPolicy};
pub use api::models::{
    AddressFamily, ConnectError, ConnectionState, DnsEvent, IfaceError, InterfaceEvent,
    LifecycleError, ModemInfo, PowerError, ResolveError, ResolvedEndpoint, SendError,
    TimeoutError, connect_errno_to_error,
};
pub use crate::core::interface::{EventStream, InterfaceMonitor, NetworkInterface};
pub use crate::core::lifecycle::ConnectivityManager;
pub use crate::core::power::{ModemDevice, PowerController};
pub use crate::core::resolver::{AsyncResolver, DnsBackend, DnsCallback};
pub use crate::core::retry::RetryBudget;
pub use crate::core::session::{SocketSession, Transport, TransportStream};

/// A specialized `Result` type for lifecycle operations.
pub type Result<T> = std::result::Result<T, LifecycleError>;
