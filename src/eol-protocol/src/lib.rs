// SPDX-FileCopyrightText: 2026 Stan Grams <sjg@haxx.space>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Wire protocol for the inspection engine.
//!
//! This crate owns the JSON DTOs spoken with the device-driving backend:
//! the server-push stream envelope, the command channel request/reply pair,
//! and the conversions between wire shapes and engine types.

pub mod codec;
pub mod mapping;
pub mod types;

// Re-export commonly used items
pub use codec::{decode_stream_line, StreamDecode};
pub use mapping::{backend_command, device_from_record};
pub use types::{BackendCommand, CommandReply, DeviceRecord, StreamEnvelope};
