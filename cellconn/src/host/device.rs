//! Modem and interface stand-ins for hosts where the OS manages the link.

use async_trait::async_trait;
use futures::StreamExt;
use futures::channel::mpsc;
use log::debug;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};

use crate::api::models::{IfaceError, InterfaceEvent, ModemInfo, PowerError};
use crate::core::interface::{EventStream, NetworkInterface};
use crate::core::power::ModemDevice;

/// A modem whose power is not under our control.
#[derive(Debug, Clone, Default)]
pub struct NoopModem {
    info: ModemInfo,
}

impl NoopModem {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reports `info` whenever the manager asks for modem information.
    pub fn with_info(info: ModemInfo) -> Self {
        Self { info }
    }
}

#[async_trait]
impl ModemDevice for NoopModem {
    async fn resume(&self) -> Result<(), PowerError> {
        debug!("Modem power is managed by the host, resume is a no-op");
        Ok(())
    }

    async fn suspend(&self) -> Result<(), PowerError> {
        debug!("Modem power is managed by the host, suspend is a no-op");
        Ok(())
    }

    async fn info(&self) -> ModemInfo {
        self.info.clone()
    }
}

/// An interface the OS keeps connected.
///
/// `up` reports L4 connectivity and a DNS server immediately; `down` reports
/// link loss.
#[derive(Debug)]
pub struct StaticInterface {
    name: String,
    up: AtomicBool,
    subscribers: Mutex<Vec<mpsc::UnboundedSender<InterfaceEvent>>>,
}

impl StaticInterface {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            up: AtomicBool::new(false),
            subscribers: Mutex::new(Vec::new()),
        }
    }

    fn emit(&self, event: InterfaceEvent) {
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .retain(|tx| tx.unbounded_send(event).is_ok());
    }
}

#[async_trait]
impl NetworkInterface for StaticInterface {
    fn name(&self) -> &str {
        &self.name
    }

    async fn up(&self) -> Result<(), IfaceError> {
        self.up.store(true, Ordering::SeqCst);
        self.emit(InterfaceEvent::L4Connected);
        self.emit(InterfaceEvent::DnsServerAdded);
        Ok(())
    }

    async fn down(&self) -> Result<(), IfaceError> {
        self.up.store(false, Ordering::SeqCst);
        self.emit(InterfaceEvent::L4Disconnected);
        Ok(())
    }

    fn events(&self) -> EventStream {
        let (tx, rx) = mpsc::unbounded();
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(tx);
        rx.boxed()
    }

    async fn is_l4_connected(&self) -> bool {
        self.up.load(Ordering::SeqCst)
    }

    async fn has_dns_server(&self) -> bool {
        self.up.load(Ordering::SeqCst)
    }
}
