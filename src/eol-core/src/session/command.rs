// SPDX-FileCopyrightText: 2026 Stan Grams <sjg@haxx.space>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Outbound commands to the device-driving backend.

/// Requests the engine issues over the command channel.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineCommand {
    /// Kick off the sequential inspection for one scanned unit. The backend
    /// drives the instruments and reports progress back over the stream.
    StartInspection {
        barcode: String,
        model_id: String,
        measurement_duration: f64,
        wait_duration: f64,
        interval_seconds: f64,
    },
    /// Abort the inspection currently driven by the backend.
    StopInspection,
    /// Pass one raw command line to a device and return its response.
    SendRawCommand {
        device_id: String,
        command: String,
        timeout_seconds: f64,
    },
}
