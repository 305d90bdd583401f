// SPDX-FileCopyrightText: 2026 Stan Grams <sjg@haxx.space>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Pass/fail limits with direction-aware comparison.

use std::fmt;

use serde::{Deserialize, Serialize};

/// PASS/FAIL/PENDING classification of a reading or phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Verdict {
    Pass,
    Fail,
    Pending,
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pass => write!(f, "PASS"),
            Self::Fail => write!(f, "FAIL"),
            Self::Pending => write!(f, "PENDING"),
        }
    }
}

/// Which side of the bound a value must fall on.
///
/// Leakage current is capped from above, insulation resistance from below,
/// and the streamed power phases run between two bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LimitDirection {
    AtMost,
    AtLeast,
    InRange,
}

/// Limit for one phase. Bounds not consulted by the direction may be absent.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Limit {
    #[serde(default)]
    pub lower: Option<f64>,
    #[serde(default)]
    pub upper: Option<f64>,
    pub direction: LimitDirection,
}

impl Limit {
    pub fn at_most(upper: f64) -> Self {
        Self {
            lower: None,
            upper: Some(upper),
            direction: LimitDirection::AtMost,
        }
    }

    pub fn at_least(lower: f64) -> Self {
        Self {
            lower: Some(lower),
            upper: None,
            direction: LimitDirection::AtLeast,
        }
    }

    pub fn in_range(lower: f64, upper: f64) -> Self {
        Self {
            lower: Some(lower),
            upper: Some(upper),
            direction: LimitDirection::InRange,
        }
    }

    /// Classify a measured value against this limit. A missing bound on the
    /// consulted side passes, so a partially configured model never fails
    /// readings it cannot judge.
    pub fn check(&self, value: f64) -> Verdict {
        let within = match self.direction {
            LimitDirection::AtMost => self.upper.map(|u| value <= u).unwrap_or(true),
            LimitDirection::AtLeast => self.lower.map(|l| value >= l).unwrap_or(true),
            LimitDirection::InRange => {
                self.lower.map(|l| value >= l).unwrap_or(true)
                    && self.upper.map(|u| value <= u).unwrap_or(true)
            }
        };
        if within {
            Verdict::Pass
        } else {
            Verdict::Fail
        }
    }
}
