//! Modem power control.
//!
//! Resumes and suspends the modem through a [`ModemDevice`]. Every power-state
//! change is followed by a settle delay before the interface may be touched.
//! Failures are reported to the caller as-is; nothing here retries.

use async_trait::async_trait;
use log::{debug, error, info};
use std::sync::Arc;
use std::time::Duration;

use crate::api::models::{ModemInfo, PowerError};
use crate::util::utils::pause;

/// Power-management handle to the modem device.
///
/// Acquired once at startup and reused across reconnects.
#[async_trait]
pub trait ModemDevice: Send + Sync {
    /// Resumes the modem (power on).
    async fn resume(&self) -> Result<(), PowerError>;

    /// Suspends the modem (power down).
    async fn suspend(&self) -> Result<(), PowerError>;

    /// Reads identity and radio information. Defaults to an empty report.
    async fn info(&self) -> ModemInfo {
        ModemInfo::default()
    }
}

#[async_trait]
impl<T: ModemDevice + ?Sized> ModemDevice for Arc<T> {
    async fn resume(&self) -> Result<(), PowerError> {
        (**self).resume().await
    }

    async fn suspend(&self) -> Result<(), PowerError> {
        (**self).suspend().await
    }

    async fn info(&self) -> ModemInfo {
        (**self).info().await
    }
}

/// Drives a [`ModemDevice`] through power states.
#[derive(Debug)]
pub struct PowerController<M> {
    modem: M,
    settle: Duration,
    powered: bool,
}

impl<M: ModemDevice> PowerController<M> {
    pub fn new(modem: M, settle: Duration) -> Self {
        Self {
            modem,
            settle,
            powered: false,
        }
    }

    /// Resumes the modem and waits for it to settle.
    pub async fn power_on(&mut self) -> Result<(), PowerError> {
        info!("Powering on modem");
        if let Err(e) = self.modem.resume().await {
            error!("Failed to power on modem: {e}");
            return Err(e);
        }
        self.powered = true;
        pause(self.settle).await;
        debug!("Modem powered on");
        Ok(())
    }

    /// Suspends the modem.
    pub async fn power_off(&mut self) -> Result<(), PowerError> {
        if let Err(e) = self.modem.suspend().await {
            error!("Failed to power down modem: {e}");
            return Err(e);
        }
        self.powered = false;
        info!("Modem powered down");
        Ok(())
    }

    /// Suspends, waits for the settle delay, then resumes the modem.
    ///
    /// This is the soft radio reset used on reconnect.
    pub async fn power_cycle(&mut self) -> Result<(), PowerError> {
        info!("Restarting modem");
        self.power_off().await?;
        pause(self.settle).await;
        self.power_on().await
    }

    /// Returns `true` after a successful `power_on` not followed by `power_off`.
    pub fn is_powered(&self) -> bool {
        self.powered
    }

    pub async fn modem_info(&self) -> ModemInfo {
        self.modem.info().await
    }

    /// Borrows the underlying device.
    pub fn device(&self) -> &M {
        &self.modem
    }
}
