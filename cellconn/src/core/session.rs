//! Single outbound TCP session.
//!
//! A [`SocketSession`] is either open, holding exactly one live transport
//! connection, or absent. Closing takes the connection out and releases it in
//! one step, so callers never observe a half-closed session.

use async_trait::async_trait;
use log::{debug, error, info};
use std::net::SocketAddr;
use std::sync::Arc;

use crate::api::models::{ConnectError, ResolvedEndpoint, SendError};

/// A connected byte stream.
#[async_trait]
pub trait TransportStream: Send {
    /// Sends `buf`, returning the number of bytes accepted by the transport.
    async fn send(&mut self, buf: &[u8]) -> Result<usize, SendError>;

    /// Releases the connection.
    async fn close(self);
}

/// Opens connections for a [`SocketSession`].
#[async_trait]
pub trait Transport: Send + Sync {
    /// Connection type produced by [`connect`](Transport::connect).
    type Stream: TransportStream;

    /// Opens a TCP connection to `addr`.
    async fn connect(&self, addr: SocketAddr) -> Result<Self::Stream, ConnectError>;
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for Arc<T> {
    type Stream = T::Stream;

    async fn connect(&self, addr: SocketAddr) -> Result<Self::Stream, ConnectError> {
        (**self).connect(addr).await
    }
}

struct OpenConnection<S> {
    stream: S,
    endpoint: ResolvedEndpoint,
}

/// Owns at most one outbound connection.
pub struct SocketSession<T: Transport> {
    transport: T,
    open: Option<OpenConnection<T::Stream>>,
}

impl<T: Transport> SocketSession<T> {
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            open: None,
        }
    }

    /// Connects to `endpoint`.
    ///
    /// # Errors
    ///
    /// Returns `ConnectError::AlreadyOpen` if a connection is open; close it
    /// first. Transport failures leave the session absent.
    pub async fn connect(&mut self, endpoint: &ResolvedEndpoint) -> Result<(), ConnectError> {
        if self.open.is_some() {
            error!("Refusing to connect to {endpoint}: a connection is already open");
            return Err(ConnectError::AlreadyOpen);
        }

        info!("Connecting to server {endpoint}");
        let stream = self
            .transport
            .connect(endpoint.socket_addr())
            .await
            .inspect_err(|e| error!("Failed to connect to server: {e}"))?;

        self.open = Some(OpenConnection {
            stream,
            endpoint: *endpoint,
        });
        info!("Connected to server {endpoint}");
        Ok(())
    }

    /// Sends `bytes` over the open connection.
    ///
    /// # Errors
    ///
    /// `SendError::NotConnected` if no connection is open (nothing is
    /// attempted), `SendError::TransportFailure` if the attempt failed.
    pub async fn send(&mut self, bytes: &[u8]) -> Result<usize, SendError> {
        let Some(open) = self.open.as_mut() else {
            error!("Cannot send: not connected");
            return Err(SendError::NotConnected);
        };

        match open.stream.send(bytes).await {
            Ok(sent) => {
                info!("Sent {sent} bytes to server");
                Ok(sent)
            }
            Err(e) => {
                error!("Failed to send data: {e}");
                Err(e)
            }
        }
    }

    pub fn is_open(&self) -> bool {
        self.open.is_some()
    }

    /// Destination of the open connection, if any.
    pub fn endpoint(&self) -> Option<ResolvedEndpoint> {
        self.open.as_ref().map(|open| open.endpoint)
    }

    /// Closes the connection if one is open. Closing an absent session does nothing.
    pub async fn close(&mut self) {
        if let Some(open) = self.open.take() {
            debug!("Closing connection to {}", open.endpoint);
            open.stream.close().await;
        }
    }

    /// Borrows the underlying transport.
    pub fn transport(&self) -> &T {
        &self.transport
    }
}
