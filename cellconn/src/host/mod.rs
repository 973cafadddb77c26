//! Backends for running on a regular host.
//!
//! On a development machine or a Linux gateway the OS owns the modem and the
//! interface, so power control is a no-op and the interface is reported as
//! connected once brought up. DNS and TCP go through tokio.

mod device;
mod dns;
mod tcp;

pub use device::{NoopModem, StaticInterface};
pub use dns::SystemDnsBackend;
pub use tcp::{TcpSession, TcpTransport};
