// SPDX-FileCopyrightText: 2026 Stan Grams <sjg@haxx.space>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Network clients for the inspection engine.
//!
//! One task subscribes to the backend's push stream and feeds typed events
//! into the engine loop; another drains engine requests onto the command
//! channel and routes replies back to the callers.

pub mod command;
pub mod stream;

pub use command::{run_command_client, CommandClientConfig};
pub use stream::{run_stream_client, StreamClientConfig, StreamHealth};
