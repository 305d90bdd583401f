// SPDX-FileCopyrightText: 2026 Stan Grams <sjg@haxx.space>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Stream envelope decoding.

use eol_core::session::SessionEvent;

use crate::types::{
    BarcodePayload, ErrorPayload, LogPayload, MeasurementPayload, PhasePayload, StartedPayload,
    StreamEnvelope,
};

/// Result of decoding one stream line. Unknown message types are surfaced
/// rather than failing, so the client can log and drop them.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamDecode {
    Event(SessionEvent),
    Unknown { kind: String },
}

/// Decode one JSON line from the push stream into a typed session event.
///
/// Structural JSON errors (bad JSON, payload shape mismatch) are returned as
/// errors; an unrecognized `type` is not an error.
pub fn decode_stream_line(line: &str) -> Result<StreamDecode, serde_json::Error> {
    let envelope: StreamEnvelope = serde_json::from_str(line)?;
    let event = match envelope.kind.as_str() {
        "barcode_scanned" => {
            let payload: BarcodePayload = serde_json::from_value(envelope.data)?;
            SessionEvent::BarcodeScanned {
                barcode: payload.barcode,
            }
        }
        "inspection_started" => {
            let payload: StartedPayload = serde_json::from_value(envelope.data)?;
            SessionEvent::InspectionStarted {
                session_id: payload.session_id,
            }
        }
        "phase_update" | "step_start" => {
            let payload: PhasePayload = serde_json::from_value(envelope.data)?;
            SessionEvent::PhaseStarted {
                phase: payload.phase,
            }
        }
        "measurement_update" => {
            let payload: MeasurementPayload = serde_json::from_value(envelope.data)?;
            SessionEvent::Measurement {
                phase: payload.phase,
                value: payload.value,
                unit: payload.unit,
            }
        }
        "phase_complete" | "step_complete" => {
            let payload: PhasePayload = serde_json::from_value(envelope.data)?;
            SessionEvent::PhaseCompleted {
                phase: payload.phase,
            }
        }
        "inspection_complete" => SessionEvent::InspectionCompleted,
        "inspection_stopped" => SessionEvent::InspectionStopped,
        "inspection_error" => {
            let payload: ErrorPayload = serde_json::from_value(envelope.data)?;
            SessionEvent::InspectionError {
                message: payload.error,
            }
        }
        "message_log" => {
            let payload: LogPayload = serde_json::from_value(envelope.data)?;
            SessionEvent::Log {
                message: payload.message,
            }
        }
        other => {
            return Ok(StreamDecode::Unknown {
                kind: other.to_string(),
            })
        }
    };
    Ok(StreamDecode::Event(event))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_barcode_scanned() {
        let decoded =
            decode_stream_line(r#"{"type": "barcode_scanned", "data": {"barcode": "ABC123"}}"#)
                .expect("decode");
        assert_eq!(
            decoded,
            StreamDecode::Event(SessionEvent::BarcodeScanned {
                barcode: "ABC123".to_string()
            })
        );
    }

    #[test]
    fn decode_measurement_with_and_without_phase() {
        let decoded = decode_stream_line(
            r#"{"type": "measurement_update", "data": {"phase": "P2", "value": 42.5, "unit": "W"}}"#,
        )
        .expect("decode");
        assert_eq!(
            decoded,
            StreamDecode::Event(SessionEvent::Measurement {
                phase: Some("P2".to_string()),
                value: 42.5,
                unit: Some("W".to_string()),
            })
        );

        let decoded =
            decode_stream_line(r#"{"type": "measurement_update", "data": {"value": 1.0}}"#)
                .expect("decode");
        assert_eq!(
            decoded,
            StreamDecode::Event(SessionEvent::Measurement {
                phase: None,
                value: 1.0,
                unit: None,
            })
        );
    }

    #[test]
    fn decode_phase_aliases() {
        let new_style =
            decode_stream_line(r#"{"type": "phase_update", "data": {"phase": "P1"}}"#).expect("decode");
        let old_style =
            decode_stream_line(r#"{"type": "step_start", "data": {"step": "P1"}}"#).expect("decode");
        assert_eq!(new_style, old_style);

        let complete =
            decode_stream_line(r#"{"type": "step_complete", "data": {"phase": "P1"}}"#)
                .expect("decode");
        assert_eq!(
            complete,
            StreamDecode::Event(SessionEvent::PhaseCompleted {
                phase: "P1".to_string()
            })
        );
    }

    #[test]
    fn decode_terminal_events() {
        let complete = decode_stream_line(r#"{"type": "inspection_complete", "data": {}}"#)
            .expect("decode");
        assert_eq!(
            complete,
            StreamDecode::Event(SessionEvent::InspectionCompleted)
        );

        let error = decode_stream_line(
            r#"{"type": "inspection_error", "data": {"error": "meter fault"}}"#,
        )
        .expect("decode");
        assert_eq!(
            error,
            StreamDecode::Event(SessionEvent::InspectionError {
                message: "meter fault".to_string()
            })
        );
    }

    #[test]
    fn unknown_type_is_not_an_error() {
        let decoded = decode_stream_line(r#"{"type": "heartbeat", "data": {}}"#).expect("decode");
        assert_eq!(
            decoded,
            StreamDecode::Unknown {
                kind: "heartbeat".to_string()
            }
        );
    }

    #[test]
    fn top_level_timestamp_is_tolerated() {
        let decoded = decode_stream_line(
            r#"{"type": "message_log", "timestamp": "2026-02-11T10:00:00", "data": {"message": "ready"}}"#,
        )
        .expect("decode");
        assert_eq!(
            decoded,
            StreamDecode::Event(SessionEvent::Log {
                message: "ready".to_string()
            })
        );
    }

    #[test]
    fn malformed_json_is_an_error() {
        assert!(decode_stream_line("not json").is_err());
        assert!(decode_stream_line(r#"{"type": "measurement_update", "data": {}}"#).is_err());
    }
}
