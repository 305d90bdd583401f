// SPDX-FileCopyrightText: 2026 Stan Grams <sjg@haxx.space>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Typed events the controller consumes.
//!
//! Decoded from the push stream envelope by the protocol crate and delivered
//! in arrival order over a single-consumer channel.

#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// A barcode was scanned at the bench.
    BarcodeScanned { barcode: String },
    /// The backend acknowledged the sequential-inspection request.
    InspectionStarted { session_id: Option<String> },
    /// A measurement phase began on the backend.
    PhaseStarted { phase: String },
    /// One streamed telemetry sample. The phase tag may be absent on the
    /// merged/compat stream; the controller falls back to the current phase.
    Measurement {
        phase: Option<String>,
        value: f64,
        unit: Option<String>,
    },
    /// A measurement phase finished on the backend.
    PhaseCompleted { phase: String },
    /// All phases finished.
    InspectionCompleted,
    /// The backend confirmed a stop.
    InspectionStopped,
    /// The backend aborted the inspection.
    InspectionError { message: String },
    /// Operator-facing log line relayed from the bench.
    Log { message: String },
}
