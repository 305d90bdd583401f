// SPDX-FileCopyrightText: 2026 Stan Grams <sjg@haxx.space>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Bench device records and connection lifecycle.

use std::fmt;

use serde::{Deserialize, Serialize};

pub mod manager;

pub use manager::{ConnectionManager, ProbeReport};

/// Logical instrument roles on the bench.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceType {
    PowerMeter,
    SafetyTester,
    BarcodeScanner,
}

impl fmt::Display for DeviceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PowerMeter => write!(f, "power meter"),
            Self::SafetyTester => write!(f, "safety tester"),
            Self::BarcodeScanner => write!(f, "barcode scanner"),
        }
    }
}

/// Connection lifecycle of one bench device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Error,
}

/// How the link layer reaches a device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LinkAccess {
    Serial { path: String, baud: u32 },
    Tcp { addr: String },
}

impl fmt::Display for LinkAccess {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Serial { path, baud } => write!(f, "serial {} @ {} baud", path, baud),
            Self::Tcp { addr } => write!(f, "tcp {}", addr),
        }
    }
}

/// Registry record for one device. The engine only caches these in memory;
/// registration itself lives outside the engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Device {
    pub id: String,
    pub device_type: DeviceType,
    pub access: LinkAccess,
    pub connection_state: ConnectionState,
    #[serde(default)]
    pub last_error: Option<String>,
    #[serde(default)]
    pub identity: Option<DeviceIdentity>,
}

impl Device {
    pub fn new(id: impl Into<String>, device_type: DeviceType, access: LinkAccess) -> Self {
        Self {
            id: id.into(),
            device_type,
            access,
            connection_state: ConnectionState::Disconnected,
            last_error: None,
            identity: None,
        }
    }
}

/// Identity captured from a `*IDN?` probe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceIdentity {
    pub manufacturer: String,
    pub model: String,
    pub serial_number: String,
    pub firmware_version: String,
}

impl DeviceIdentity {
    /// Parse the conventional four-field IDN response
    /// `Manufacturer,Model,SerialNumber,FirmwareVersion`.
    pub fn parse_idn(response: &str) -> Option<Self> {
        let parts: Vec<&str> = response.split(',').collect();
        if parts.len() < 4 {
            return None;
        }
        Some(Self {
            manufacturer: parts[0].trim().to_string(),
            model: parts[1].trim().to_string(),
            serial_number: parts[2].trim().to_string(),
            firmware_version: parts[3].trim().to_string(),
        })
    }
}
