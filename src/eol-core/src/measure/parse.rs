// SPDX-FileCopyrightText: 2026 Stan Grams <sjg@haxx.space>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Safety-tester response parsing.
//!
//! The tester reports every check as one fixed-arity comma record:
//!
//! ```text
//! ACW,1.8kV,0.374mA,0.5mA,PASS
//! ```
//!
//! fields: test kind, source level, measured value with unit suffix, limit
//! with unit suffix, verdict token. The unit suffix is taken from a fixed
//! table keyed by the expected test kind and used only to strip the measured
//! field; it is not cross-validated against the unit the tester embedded.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::measure::Verdict;

/// Checks the safety tester runs, in bench order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TestKind {
    /// Withstand voltage (ACW), leakage current in mA.
    Dielectric,
    /// Insulation resistance (IR), in MΩ.
    Insulation,
    /// Ground bond (GB), in Ω.
    GroundBond,
}

impl TestKind {
    /// Unit suffix the tester appends to measured values for this kind.
    pub fn unit_suffix(self) -> &'static str {
        match self {
            Self::Dielectric => "mA",
            Self::Insulation => "MΩ",
            Self::GroundBond => "Ω",
        }
    }

    /// Front-panel command that runs this check.
    pub fn test_command(self) -> &'static str {
        match self {
            Self::Dielectric => "MANU:ACW:TEST",
            Self::Insulation => "MANU:IR:TEST",
            Self::GroundBond => "MANU:GB:TEST",
        }
    }

    /// Query that re-reads the stored result of the last run.
    pub fn result_query(self) -> &'static str {
        match self {
            Self::Dielectric => "RESULT:ACW?",
            Self::Insulation => "RESULT:IR?",
            Self::GroundBond => "RESULT:GB?",
        }
    }

    /// Phase name used in session results for this check.
    pub fn phase_name(self) -> &'static str {
        match self {
            Self::Dielectric => "dielectric",
            Self::Insulation => "insulation",
            Self::GroundBond => "ground_bond",
        }
    }
}

impl fmt::Display for TestKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.phase_name())
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("malformed tester response: expected 5 fields, got {0}")]
    Malformed(usize),
}

/// Typed reading extracted from one tester response line.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedReading {
    pub kind: TestKind,
    pub value: f64,
    pub unit: &'static str,
    pub verdict: Verdict,
}

impl ParsedReading {
    /// Fallback for responses that cannot be parsed at all. Keeps the
    /// sequence moving instead of aborting the session.
    pub fn fail_zero(kind: TestKind) -> Self {
        Self {
            kind,
            value: 0.0,
            unit: kind.unit_suffix(),
            verdict: Verdict::Fail,
        }
    }
}

/// Parse one tester response line for the expected test kind.
///
/// The verdict token must equal the literal `PASS`, case-sensitively; any
/// other token fails. An unparseable measured value is reported as
/// `0, FAIL`, never skipped.
pub fn parse_response(raw: &str, kind: TestKind) -> Result<ParsedReading, ParseError> {
    let fields: Vec<&str> = raw.trim().split(',').collect();
    if fields.len() < 5 {
        return Err(ParseError::Malformed(fields.len()));
    }

    let token_verdict = if fields[4].trim() == "PASS" {
        Verdict::Pass
    } else {
        Verdict::Fail
    };

    let measured = fields[2].trim();
    let number = measured.strip_suffix(kind.unit_suffix()).unwrap_or(measured);
    let (value, verdict) = match number.parse::<f64>() {
        Ok(v) if v.is_finite() => (v, token_verdict),
        _ => (0.0, Verdict::Fail),
    };

    Ok(ParsedReading {
        kind,
        value,
        unit: kind.unit_suffix(),
        verdict,
    })
}

/// Like [`parse_response`], with malformed input collapsed to the zero/FAIL
/// reading so callers always get something to record.
pub fn parse_lenient(raw: &str, kind: TestKind) -> ParsedReading {
    parse_response(raw, kind).unwrap_or_else(|_| ParsedReading::fail_zero(kind))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_dielectric_pass() {
        let parsed =
            parse_response("ACW,1.8kV,0.374mA,0.5mA,PASS", TestKind::Dielectric).expect("parse");
        assert_eq!(parsed.value, 0.374);
        assert_eq!(parsed.unit, "mA");
        assert_eq!(parsed.verdict, Verdict::Pass);
    }

    #[test]
    fn parse_insulation_fail() {
        let parsed =
            parse_response("IR,0.5kV,0.66MΩ,1.0MΩ,FAIL", TestKind::Insulation).expect("parse");
        assert_eq!(parsed.value, 0.66);
        assert_eq!(parsed.verdict, Verdict::Fail);
    }

    #[test]
    fn parse_ground_bond_strips_ohm_suffix() {
        let parsed =
            parse_response("GB,25.0A,8.16Ω,10.0Ω,PASS", TestKind::GroundBond).expect("parse");
        assert_eq!(parsed.value, 8.16);
        assert_eq!(parsed.unit, "Ω");
        assert_eq!(parsed.verdict, Verdict::Pass);
    }

    #[test]
    fn short_record_is_malformed() {
        assert_eq!(
            parse_response("garbage", TestKind::Dielectric),
            Err(ParseError::Malformed(1))
        );
        assert_eq!(
            parse_response("ACW,NO_DATA", TestKind::Dielectric),
            Err(ParseError::Malformed(2))
        );
    }

    #[test]
    fn lenient_parse_collapses_garbage_to_zero_fail() {
        let parsed = parse_lenient("garbage", TestKind::Dielectric);
        assert_eq!(parsed.value, 0.0);
        assert_eq!(parsed.verdict, Verdict::Fail);
    }

    #[test]
    fn verdict_token_is_case_sensitive() {
        let parsed =
            parse_response("ACW,1.8kV,0.374mA,0.5mA,pass", TestKind::Dielectric).expect("parse");
        assert_eq!(parsed.verdict, Verdict::Fail);

        let parsed = parse_response("ACW,1.8kV,0.374mA,0.5mA,", TestKind::Dielectric).expect("parse");
        assert_eq!(parsed.verdict, Verdict::Fail);
    }

    #[test]
    fn unparseable_number_becomes_zero_fail() {
        // Wrong embedded unit: suffix strip misses, numeric parse fails.
        let parsed =
            parse_response("ACW,1.8kV,0.374A,0.5mA,PASS", TestKind::Dielectric).expect("parse");
        assert_eq!(parsed.value, 0.0);
        assert_eq!(parsed.verdict, Verdict::Fail);

        let parsed =
            parse_response("ACW,1.8kV,NaNmA,0.5mA,PASS", TestKind::Dielectric).expect("parse");
        assert_eq!(parsed.value, 0.0);
        assert_eq!(parsed.verdict, Verdict::Fail);
    }

    #[test]
    fn trailing_line_ending_is_tolerated() {
        let parsed =
            parse_response("ACW,1.8kV,0.374mA,0.5mA,PASS\r\n", TestKind::Dielectric).expect("parse");
        assert_eq!(parsed.verdict, Verdict::Pass);
    }
}
