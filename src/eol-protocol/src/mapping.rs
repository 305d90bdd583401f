// SPDX-FileCopyrightText: 2026 Stan Grams <sjg@haxx.space>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Conversions between engine types and wire DTOs.

use eol_core::device::{Device, LinkAccess};
use eol_core::session::EngineCommand;

use crate::types::{BackendCommand, DeviceRecord};

/// Default baud rate when a registry record does not carry one.
const DEFAULT_BAUD: u32 = 9600;

/// Convert an engine command to its wire form.
pub fn backend_command(cmd: &EngineCommand) -> BackendCommand {
    match cmd {
        EngineCommand::StartInspection {
            barcode,
            model_id,
            measurement_duration,
            wait_duration,
            interval_seconds,
        } => BackendCommand::StartInspection {
            barcode: barcode.clone(),
            model_id: model_id.clone(),
            measurement_duration: *measurement_duration,
            wait_duration: *wait_duration,
            interval_seconds: *interval_seconds,
        },
        EngineCommand::StopInspection => BackendCommand::StopInspection,
        EngineCommand::SendRawCommand {
            device_id,
            command,
            timeout_seconds,
        } => BackendCommand::SendRawCommand {
            device_id: device_id.clone(),
            command: command.clone(),
            timeout_seconds: *timeout_seconds,
        },
    }
}

/// Build an engine device record from a registry query row. The engine's
/// connection manager owns the live connection state afterwards; the
/// reported status is only the registry's last known value.
pub fn device_from_record(record: &DeviceRecord) -> Device {
    let mut device = Device::new(
        record.id.clone(),
        record.device_type,
        LinkAccess::Serial {
            path: record.port.clone(),
            baud: record.baud_rate.unwrap_or(DEFAULT_BAUD),
        },
    );
    device.connection_state = record.connection_status;
    device
}

#[cfg(test)]
mod tests {
    use eol_core::{ConnectionState, DeviceType};

    use super::*;

    #[test]
    fn start_command_maps_all_fields() {
        let cmd = EngineCommand::StartInspection {
            barcode: "ABC123".to_string(),
            model_id: "m1".to_string(),
            measurement_duration: 5.0,
            wait_duration: 2.0,
            interval_seconds: 0.1,
        };
        match backend_command(&cmd) {
            BackendCommand::StartInspection {
                barcode,
                model_id,
                measurement_duration,
                ..
            } => {
                assert_eq!(barcode, "ABC123");
                assert_eq!(model_id, "m1");
                assert_eq!(measurement_duration, 5.0);
            }
            other => panic!("unexpected mapping: {:?}", other),
        }
    }

    #[test]
    fn registry_row_becomes_serial_device() {
        let record = DeviceRecord {
            id: "wt310".to_string(),
            device_type: DeviceType::PowerMeter,
            connection_status: ConnectionState::Connected,
            port: "/dev/ttyUSB0".to_string(),
            baud_rate: None,
        };
        let device = device_from_record(&record);
        assert_eq!(device.device_type, DeviceType::PowerMeter);
        assert_eq!(device.connection_state, ConnectionState::Connected);
        assert_eq!(
            device.access,
            LinkAccess::Serial {
                path: "/dev/ttyUSB0".to_string(),
                baud: 9600
            }
        );
    }
}
