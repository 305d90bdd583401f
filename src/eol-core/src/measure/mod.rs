// SPDX-FileCopyrightText: 2026 Stan Grams <sjg@haxx.space>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Readings, limits and bounded measurement history.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub mod history;
pub mod limit;
pub mod parse;

pub use history::{HistoryStore, ReadingHistory, ReadingStats, MERGED_HISTORY_CAP, PHASE_HISTORY_CAP};
pub use limit::{Limit, LimitDirection, Verdict};
pub use parse::{ParseError, ParsedReading, TestKind};

/// One measurement sample. Immutable once created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    pub phase: String,
    pub value: f64,
    pub unit: String,
    pub timestamp: DateTime<Utc>,
    pub verdict: Verdict,
}

impl Reading {
    pub fn now(
        phase: impl Into<String>,
        value: f64,
        unit: impl Into<String>,
        verdict: Verdict,
    ) -> Self {
        Self {
            phase: phase.into(),
            value,
            unit: unit.into(),
            timestamp: Utc::now(),
            verdict,
        }
    }
}
