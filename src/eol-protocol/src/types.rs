// SPDX-FileCopyrightText: 2026 Stan Grams <sjg@haxx.space>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Transport DTOs for the JSON line protocols.

use serde::{Deserialize, Serialize};

/// Envelope every push-stream message arrives in. The payload stays opaque
/// here; [`crate::codec`] resolves it per message type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamEnvelope {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub timestamp: Option<String>,
    #[serde(default)]
    pub data: serde_json::Value,
}

/// Payload of `barcode_scanned`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BarcodePayload {
    pub barcode: String,
}

/// Payload of `measurement_update`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MeasurementPayload {
    #[serde(default)]
    pub phase: Option<String>,
    pub value: f64,
    #[serde(default)]
    pub unit: Option<String>,
}

/// Payload of `message_log`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogPayload {
    pub message: String,
}

/// Payload of `inspection_started`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StartedPayload {
    #[serde(default)]
    pub session_id: Option<String>,
}

/// Payload of `phase_update` / `step_start` and `phase_complete` /
/// `step_complete`. Both spellings arrive from older backends.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhasePayload {
    #[serde(alias = "step")]
    pub phase: String,
}

/// Payload of `inspection_error`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorPayload {
    pub error: String,
}

/// Command sent to the backend over the command channel (JSON line).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "cmd", rename_all = "snake_case")]
pub enum BackendCommand {
    StartInspection {
        barcode: String,
        model_id: String,
        measurement_duration: f64,
        wait_duration: f64,
        interval_seconds: f64,
    },
    StopInspection,
    SendRawCommand {
        device_id: String,
        command: String,
        timeout_seconds: f64,
    },
}

/// Reply line for one backend command.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandReply {
    pub success: bool,
    #[serde(default)]
    pub response: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

impl CommandReply {
    /// Collapse the success-flag wire shape into a real result.
    pub fn into_outcome(self) -> Result<Option<String>, String> {
        if self.success {
            Ok(self.response)
        } else {
            Err(self
                .error
                .unwrap_or_else(|| "backend rejected command".to_string()))
        }
    }
}

/// Device record as served by the registry query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceRecord {
    pub id: String,
    pub device_type: eol_core::DeviceType,
    pub connection_status: eol_core::ConnectionState,
    pub port: String,
    #[serde(default)]
    pub baud_rate: Option<u32>,
}
