// SPDX-FileCopyrightText: 2026 Stan Grams <sjg@haxx.space>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Engine error taxonomy.
//!
//! Every variant here corresponds to a user-visible failure mode: connection
//! errors are retryable, stream errors are terminal per subscription instance,
//! and session conflicts are rejected without touching existing state.

use std::time::Duration;

use thiserror::Error;

use crate::device::DeviceType;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum EngineError {
    /// A second start request arrived while a session was already RUNNING.
    #[error("inspection session already active")]
    SessionConflict,

    #[error("no inspection model selected")]
    NoModel,

    #[error("{0} is not connected")]
    NotConnected(DeviceType),

    #[error("connect failed: {0}")]
    Connect(String),

    /// The push stream dropped. Terminal for the subscription instance.
    #[error("stream connection lost: {0}")]
    Stream(String),

    #[error("command round trip timed out after {0:?}")]
    Timeout(Duration),

    /// The backend answered the command with `success: false`.
    #[error("backend rejected command: {0}")]
    Rejected(String),

    #[error("engine command channel closed")]
    ChannelClosed,
}

impl EngineError {
    /// Whether a retry has any chance of succeeding.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Connect(_) | Self::Stream(_) | Self::Timeout(_) | Self::ChannelClosed
        )
    }
}

pub type EngineResult<T> = Result<T, EngineError>;
