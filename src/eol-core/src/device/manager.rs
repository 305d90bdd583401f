// SPDX-FileCopyrightText: 2026 Stan Grams <sjg@haxx.space>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Device connection manager.
//!
//! Owns the in-memory device registry cache and the open instrument links.
//! All mutation goes through one mutex; connect/disconnect may block on
//! transport I/O while holding it, which serializes lifecycle changes from
//! every call site (session start, manual actions, reconnect logic).

use std::collections::HashMap;

use tokio::sync::Mutex;
use tokio::time::{timeout, Duration, Instant};
use tracing::{info, warn};

use crate::device::{ConnectionState, Device, DeviceIdentity, DeviceType};
use crate::error::{EngineError, EngineResult};
use crate::transport::{InstrumentLink, LinkBuilder};

/// Outcome of a `*IDN?` connectivity probe.
#[derive(Debug, Clone)]
pub struct ProbeReport {
    pub identity: Option<DeviceIdentity>,
    pub raw_response: String,
    pub response_time_ms: f64,
}

struct Slot {
    record: Device,
    link: Option<Box<dyn InstrumentLink>>,
}

pub struct ConnectionManager {
    inner: Mutex<HashMap<DeviceType, Slot>>,
    builder: Box<dyn LinkBuilder>,
    settle_delay: Duration,
}

impl ConnectionManager {
    /// Delay between tearing down a half-open link and reopening it. Serial
    /// ports report port-in-use for a short window after an unclean close.
    pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_millis(200);

    pub fn new(builder: Box<dyn LinkBuilder>) -> Self {
        Self {
            inner: Mutex::new(HashMap::new()),
            builder,
            settle_delay: Self::DEFAULT_SETTLE_DELAY,
        }
    }

    pub fn with_settle_delay(mut self, settle_delay: Duration) -> Self {
        self.settle_delay = settle_delay;
        self
    }

    /// Seed or refresh one registry record. An existing open link for the
    /// same role is kept only when the access address is unchanged.
    pub async fn register(&self, device: Device) {
        let mut inner = self.inner.lock().await;
        match inner.get_mut(&device.device_type) {
            Some(slot) if slot.record.access == device.access => {
                slot.record.id = device.id;
            }
            _ => {
                inner.insert(
                    device.device_type,
                    Slot {
                        record: device,
                        link: None,
                    },
                );
            }
        }
    }

    /// Connect a device. Idempotent: already-connected devices return Ok
    /// without touching the transport. A half-open link from a previous run
    /// is torn down first, with a short settle delay before reopening.
    pub async fn connect(&self, device_type: DeviceType) -> EngineResult<()> {
        let mut inner = self.inner.lock().await;
        let slot = inner
            .get_mut(&device_type)
            .ok_or_else(|| EngineError::Connect(format!("{device_type} is not registered")))?;

        if slot.record.connection_state == ConnectionState::Connected && slot.link.is_some() {
            return Ok(());
        }

        if let Some(mut stale) = slot.link.take() {
            info!("{} left half-open, reconnecting", device_type);
            if let Err(e) = stale.close().await {
                warn!("teardown of stale {} link failed: {}", device_type, e);
            }
            tokio::time::sleep(self.settle_delay).await;
        }

        slot.record.connection_state = ConnectionState::Connecting;
        match self.builder.open(&slot.record).await {
            Ok(link) => {
                slot.link = Some(link);
                slot.record.connection_state = ConnectionState::Connected;
                slot.record.last_error = None;
                info!("{} connected ({})", device_type, slot.record.access);
                Ok(())
            }
            Err(e) => {
                slot.record.connection_state = ConnectionState::Error;
                slot.record.last_error = Some(e.to_string());
                Err(EngineError::Connect(e.to_string()))
            }
        }
    }

    /// Disconnect a device. Best-effort: transport failures during teardown
    /// are logged and the state is forced to Disconnected regardless.
    pub async fn disconnect(&self, device_type: DeviceType) {
        let mut inner = self.inner.lock().await;
        let Some(slot) = inner.get_mut(&device_type) else {
            return;
        };
        if let Some(mut link) = slot.link.take() {
            if let Err(e) = link.close().await {
                warn!("disconnect of {} failed: {}", device_type, e);
            }
        }
        slot.record.connection_state = ConnectionState::Disconnected;
    }

    pub async fn status(&self, device_type: DeviceType) -> ConnectionState {
        let inner = self.inner.lock().await;
        inner
            .get(&device_type)
            .map(|slot| slot.record.connection_state)
            .unwrap_or(ConnectionState::Disconnected)
    }

    /// Snapshot of the registry cache, refreshed on demand by callers.
    pub async fn registry(&self) -> Vec<Device> {
        let inner = self.inner.lock().await;
        inner.values().map(|slot| slot.record.clone()).collect()
    }

    /// Run a `*IDN?` round trip against a connected device and record the
    /// parsed identity on its registry record.
    pub async fn probe(
        &self,
        device_type: DeviceType,
        budget: Duration,
    ) -> EngineResult<ProbeReport> {
        let mut inner = self.inner.lock().await;
        let slot = inner
            .get_mut(&device_type)
            .ok_or(EngineError::NotConnected(device_type))?;
        let link = slot
            .link
            .as_mut()
            .ok_or(EngineError::NotConnected(device_type))?;

        let started = Instant::now();
        let response = timeout(budget, link.round_trip("*IDN?"))
            .await
            .map_err(|_| EngineError::Timeout(budget))?
            .map_err(|e| EngineError::Connect(e.to_string()))?;
        let response_time_ms = started.elapsed().as_secs_f64() * 1000.0;

        let identity = DeviceIdentity::parse_idn(&response);
        slot.record.identity = identity.clone();
        Ok(ProbeReport {
            identity,
            raw_response: response,
            response_time_ms,
        })
    }

    /// Take the open link out of the manager for a longer exclusive
    /// exchange, such as the safety sequence.
    pub async fn take_link(&self, device_type: DeviceType) -> Option<Box<dyn InstrumentLink>> {
        let mut inner = self.inner.lock().await;
        inner.get_mut(&device_type).and_then(|slot| slot.link.take())
    }

    /// Return a link borrowed with [`Self::take_link`]. Dropped instead when
    /// the device was disconnected in the meantime.
    pub async fn put_link(&self, device_type: DeviceType, link: Box<dyn InstrumentLink>) {
        let mut inner = self.inner.lock().await;
        if let Some(slot) = inner.get_mut(&device_type) {
            if slot.record.connection_state == ConnectionState::Connected {
                slot.link = Some(link);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::LinkAccess;
    use crate::transport::ScriptedBuilder;

    fn meter_record() -> Device {
        Device::new(
            "wt310",
            DeviceType::PowerMeter,
            LinkAccess::Serial {
                path: "/dev/ttyUSB0".to_string(),
                baud: 9600,
            },
        )
    }

    fn manager(builder: ScriptedBuilder) -> ConnectionManager {
        ConnectionManager::new(Box::new(builder)).with_settle_delay(Duration::from_millis(1))
    }

    #[tokio::test]
    async fn connect_is_idempotent() {
        let mgr = manager(ScriptedBuilder::new());
        mgr.register(meter_record()).await;

        mgr.connect(DeviceType::PowerMeter).await.expect("connect");
        assert_eq!(
            mgr.status(DeviceType::PowerMeter).await,
            ConnectionState::Connected
        );
        // Second connect is a no-op success.
        mgr.connect(DeviceType::PowerMeter).await.expect("reconnect");
        assert_eq!(
            mgr.status(DeviceType::PowerMeter).await,
            ConnectionState::Connected
        );
    }

    #[tokio::test]
    async fn connect_failure_records_error() {
        let mgr = manager(ScriptedBuilder::new().fail_connect("port busy"));
        mgr.register(meter_record()).await;

        let err = mgr
            .connect(DeviceType::PowerMeter)
            .await
            .expect_err("must fail");
        assert!(matches!(err, EngineError::Connect(_)));
        assert_eq!(
            mgr.status(DeviceType::PowerMeter).await,
            ConnectionState::Error
        );
        let registry = mgr.registry().await;
        assert_eq!(registry.len(), 1);
        assert!(registry[0].last_error.as_deref().unwrap().contains("busy"));
    }

    #[tokio::test]
    async fn disconnect_forces_state_even_on_teardown_failure() {
        let mgr = manager(ScriptedBuilder::new());
        mgr.register(meter_record()).await;
        mgr.connect(DeviceType::PowerMeter).await.expect("connect");

        mgr.disconnect(DeviceType::PowerMeter).await;
        assert_eq!(
            mgr.status(DeviceType::PowerMeter).await,
            ConnectionState::Disconnected
        );
        // Disconnecting an unknown or already-disconnected device is a no-op.
        mgr.disconnect(DeviceType::BarcodeScanner).await;
    }

    #[tokio::test]
    async fn probe_parses_identity() {
        let mgr = manager(ScriptedBuilder::new().reply("YOKOGAWA,WT310,C2PH13047V,F1.03"));
        mgr.register(meter_record()).await;
        mgr.connect(DeviceType::PowerMeter).await.expect("connect");

        let report = mgr
            .probe(DeviceType::PowerMeter, Duration::from_secs(1))
            .await
            .expect("probe");
        assert_eq!(report.identity.as_ref().unwrap().model, "WT310");

        let registry = mgr.registry().await;
        assert_eq!(registry[0].identity.as_ref().unwrap().model, "WT310");
    }

    #[tokio::test]
    async fn status_of_unregistered_device_is_disconnected() {
        let mgr = manager(ScriptedBuilder::new());
        assert_eq!(
            mgr.status(DeviceType::SafetyTester).await,
            ConnectionState::Disconnected
        );
    }
}
