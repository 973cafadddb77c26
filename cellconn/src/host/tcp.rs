//! TCP transport over `tokio::net::TcpStream`.

use async_trait::async_trait;
use log::debug;
use std::io::ErrorKind;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::time::timeout;

use crate::api::models::{ConnectError, SendError};
use crate::core::session::{Transport, TransportStream};

/// Opens plain TCP connections with bounded connect and send times.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TcpTransport {
    /// Time allowed for the TCP handshake.
    pub connect_timeout: Duration,
    /// Time allowed for one `send` to be fully written.
    pub send_timeout: Duration,
}

impl Default for TcpTransport {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(30),
            send_timeout: Duration::from_secs(10),
        }
    }
}

#[async_trait]
impl Transport for TcpTransport {
    type Stream = TcpSession;

    async fn connect(&self, addr: SocketAddr) -> Result<TcpSession, ConnectError> {
        match timeout(self.connect_timeout, TcpStream::connect(addr)).await {
            Ok(Ok(stream)) => {
                if let Err(e) = stream.set_nodelay(true) {
                    debug!("Failed to set TCP_NODELAY on {addr}: {e}");
                }
                Ok(TcpSession {
                    stream,
                    send_timeout: self.send_timeout,
                })
            }
            Ok(Err(e)) if e.kind() == ErrorKind::ConnectionRefused => {
                Err(ConnectError::Refused(addr))
            }
            Ok(Err(e)) => Err(ConnectError::Unreachable {
                addr,
                reason: e.to_string(),
            }),
            Err(_) => Err(ConnectError::Unreachable {
                addr,
                reason: format!("connect timed out after {:?}", self.connect_timeout),
            }),
        }
    }
}

/// An open TCP connection produced by [`TcpTransport`].
#[derive(Debug)]
pub struct TcpSession {
    stream: TcpStream,
    send_timeout: Duration,
}

#[async_trait]
impl TransportStream for TcpSession {
    async fn send(&mut self, buf: &[u8]) -> Result<usize, SendError> {
        match timeout(self.send_timeout, self.stream.write_all(buf)).await {
            Ok(Ok(())) => Ok(buf.len()),
            Ok(Err(e)) => Err(SendError::TransportFailure(e.to_string())),
            Err(_) => Err(SendError::TransportFailure(format!(
                "send timed out after {:?}",
                self.send_timeout
            ))),
        }
    }

    async fn close(mut self) {
        if let Err(e) = self.stream.shutdown().await {
            debug!("TCP shutdown reported: {e}");
        }
    }
}
