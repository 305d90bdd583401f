// SPDX-FileCopyrightText: 2026 Stan Grams <sjg@haxx.space>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Bounded measurement history.
//!
//! Pure storage: capacity enforcement and snapshotting only. Verdict logic
//! lives with the session, not here.

use std::collections::VecDeque;

use serde::Serialize;

use crate::measure::Reading;

/// Per-phase cap for the three-phase numeric flow.
pub const PHASE_HISTORY_CAP: usize = 100;
/// Cap for the merged cross-phase view fed to plotting consumers.
pub const MERGED_HISTORY_CAP: usize = 300;

/// Ring buffer of readings. Oldest evicted at capacity, never an error.
#[derive(Debug, Clone)]
pub struct ReadingHistory {
    capacity: usize,
    entries: VecDeque<Reading>,
}

impl ReadingHistory {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            entries: VecDeque::with_capacity(capacity.max(1)),
        }
    }

    pub fn append(&mut self, reading: Reading) {
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(reading);
    }

    /// Readings in arrival order.
    pub fn snapshot(&self) -> Vec<Reading> {
        self.entries.iter().cloned().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Reading> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

/// Summary statistics over one phase buffer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ReadingStats {
    pub count: usize,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
}

impl ReadingStats {
    pub fn over<'a>(readings: impl Iterator<Item = &'a Reading>) -> Option<Self> {
        let mut count = 0usize;
        let mut min = f64::INFINITY;
        let mut max = f64::NEG_INFINITY;
        let mut sum = 0.0;
        for reading in readings {
            count += 1;
            min = min.min(reading.value);
            max = max.max(reading.value);
            sum += reading.value;
        }
        if count == 0 {
            return None;
        }
        Some(Self {
            count,
            min,
            max,
            mean: sum / count as f64,
        })
    }
}

/// Per-phase buffers plus the merged cross-phase view. Phase order is fixed
/// at construction and never reordered.
#[derive(Debug)]
pub struct HistoryStore {
    phases: Vec<(String, ReadingHistory)>,
    merged: ReadingHistory,
}

impl HistoryStore {
    pub fn new(phase_names: &[String], phase_cap: usize, merged_cap: usize) -> Self {
        Self {
            phases: phase_names
                .iter()
                .map(|name| (name.clone(), ReadingHistory::new(phase_cap)))
                .collect(),
            merged: ReadingHistory::new(merged_cap),
        }
    }

    /// Append to the phase buffer and the merged view. Readings for phases
    /// outside the fixed plan only land in the merged view.
    pub fn append(&mut self, reading: Reading) {
        if let Some((_, ring)) = self
            .phases
            .iter_mut()
            .find(|(name, _)| *name == reading.phase)
        {
            ring.append(reading.clone());
        }
        self.merged.append(reading);
    }

    pub fn snapshot(&self, phase: &str) -> Vec<Reading> {
        self.phases
            .iter()
            .find(|(name, _)| name == phase)
            .map(|(_, ring)| ring.snapshot())
            .unwrap_or_default()
    }

    pub fn merged_snapshot(&self) -> Vec<Reading> {
        self.merged.snapshot()
    }

    pub fn stats(&self, phase: &str) -> Option<ReadingStats> {
        self.phases
            .iter()
            .find(|(name, _)| name == phase)
            .and_then(|(_, ring)| ReadingStats::over(ring.iter()))
    }

    pub fn clear(&mut self) {
        for (_, ring) in &mut self.phases {
            ring.clear();
        }
        self.merged.clear();
    }
}
