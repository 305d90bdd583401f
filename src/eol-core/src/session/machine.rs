// SPDX-FileCopyrightText: 2026 Stan Grams <sjg@haxx.space>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Inspection session state.
//!
//! One session is one barcode-triggered run of all phases for a model. At
//! most one session is RUNNING at a time; that guard lives in the
//! controller, this module owns the per-session data and verdict rules.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::measure::{
    HistoryStore, Limit, ParsedReading, Reading, ReadingStats, Verdict, MERGED_HISTORY_CAP,
    PHASE_HISTORY_CAP,
};

/// Lifecycle of one inspection session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SessionStatus {
    Idle,
    Running,
    Completed,
    Error,
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "IDLE"),
            Self::Running => write!(f, "RUNNING"),
            Self::Completed => write!(f, "COMPLETED"),
            Self::Error => write!(f, "ERROR"),
        }
    }
}

/// One ordered phase of a model's plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhaseSpec {
    pub name: String,
    pub limit: Limit,
}

/// Phase plan and timing for one product model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelSpec {
    pub id: String,
    pub name: String,
    pub phases: Vec<PhaseSpec>,
    /// Seconds each measurement phase runs on the backend.
    pub measurement_duration: f64,
    /// Seconds the backend waits between phases.
    pub wait_duration: f64,
    /// Sampling interval in seconds during a phase.
    pub interval_seconds: f64,
}

impl ModelSpec {
    /// Three numeric phases P1/P2/P3 with a shared in-range limit each.
    pub fn three_phase(
        id: impl Into<String>,
        name: impl Into<String>,
        limits: [(f64, f64); 3],
    ) -> Self {
        let phases = ["P1", "P2", "P3"]
            .iter()
            .zip(limits)
            .map(|(phase, (lower, upper))| PhaseSpec {
                name: (*phase).to_string(),
                limit: Limit::in_range(lower, upper),
            })
            .collect();
        Self {
            id: id.into(),
            name: name.into(),
            phases,
            measurement_duration: 5.0,
            wait_duration: 2.0,
            interval_seconds: 0.1,
        }
    }

    /// Default safety plan: withstand, insulation, ground bond.
    pub fn safety(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: "safety".to_string(),
            phases: vec![
                PhaseSpec {
                    name: "dielectric".to_string(),
                    limit: Limit::at_most(1.0),
                },
                PhaseSpec {
                    name: "insulation".to_string(),
                    limit: Limit::at_least(1.0),
                },
                PhaseSpec {
                    name: "ground_bond".to_string(),
                    limit: Limit::at_most(10.0),
                },
            ],
            measurement_duration: 2.0,
            wait_duration: 0.0,
            interval_seconds: 0.0,
        }
    }

    pub fn phase_names(&self) -> Vec<String> {
        self.phases.iter().map(|p| p.name.clone()).collect()
    }
}

/// Result of one phase. Readings themselves sit in the session's history
/// store; this carries the counters the verdict is derived from.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PhaseResult {
    pub name: String,
    pub limit: Limit,
    pub verdict: Verdict,
    pub completed: bool,
    pub readings: u32,
    pub violations: u32,
    pub error: Option<String>,
}

impl PhaseResult {
    fn new(spec: &PhaseSpec) -> Self {
        Self {
            name: spec.name.clone(),
            limit: spec.limit,
            verdict: Verdict::Pending,
            completed: false,
            readings: 0,
            violations: 0,
            error: None,
        }
    }

    fn record(&mut self, verdict: Verdict) {
        self.readings += 1;
        if verdict == Verdict::Fail {
            self.violations += 1;
        }
        // A reading that trails the phase-complete event still counts
        // against the finalized verdict.
        if self.completed {
            self.verdict = self.derived_verdict();
        }
    }

    fn derived_verdict(&self) -> Verdict {
        if self.violations > 0 || self.error.is_some() {
            Verdict::Fail
        } else {
            Verdict::Pass
        }
    }

    /// Verdict rule: FAIL on any violating reading or device error, PASS
    /// when completed clean, PENDING until then.
    fn finalize(&mut self) {
        self.completed = true;
        self.verdict = self.derived_verdict();
    }
}

/// One running (or finished) inspection with its phase results and history.
#[derive(Debug)]
pub struct InspectionSession {
    pub session_id: String,
    pub epoch: u64,
    pub barcode: String,
    pub model_id: String,
    pub status: SessionStatus,
    pub current_phase: Option<String>,
    pub phases: Vec<PhaseResult>,
    pub history: HistoryStore,
    pub started_at: DateTime<Utc>,
    pub error: Option<String>,
}

impl InspectionSession {
    /// Fresh session in RUNNING state with empty buffers.
    pub fn begin(epoch: u64, barcode: impl Into<String>, model: &ModelSpec) -> Self {
        let names = model.phase_names();
        Self {
            session_id: Uuid::new_v4().to_string(),
            epoch,
            barcode: barcode.into(),
            model_id: model.id.clone(),
            status: SessionStatus::Running,
            current_phase: None,
            phases: model.phases.iter().map(PhaseResult::new).collect(),
            history: HistoryStore::new(&names, PHASE_HISTORY_CAP, MERGED_HISTORY_CAP),
            started_at: Utc::now(),
            error: None,
        }
    }

    pub fn phase(&self, name: &str) -> Option<&PhaseResult> {
        self.phases.iter().find(|p| p.name == name)
    }

    fn phase_mut(&mut self, name: &str) -> Option<&mut PhaseResult> {
        self.phases.iter_mut().find(|p| p.name == name)
    }

    /// Record a streamed reading against a phase in the plan. Returns the
    /// per-reading verdict, or None when the phase is unknown.
    pub fn record_reading(
        &mut self,
        phase: &str,
        value: f64,
        unit: Option<String>,
    ) -> Option<Verdict> {
        let result = self.phase_mut(phase)?;
        let verdict = result.limit.check(value);
        result.record(verdict);
        let reading = Reading::now(phase, value, unit.unwrap_or_default(), verdict);
        self.history.append(reading);
        Some(verdict)
    }

    /// Record a parsed tester reading. The tester's own verdict is
    /// authoritative here; the plan limit is not re-applied.
    pub fn record_parsed(&mut self, phase: &str, parsed: &ParsedReading) -> Option<Verdict> {
        let result = self.phase_mut(phase)?;
        result.record(parsed.verdict);
        let reading = Reading::now(phase, parsed.value, parsed.unit, parsed.verdict);
        self.history.append(reading);
        Some(parsed.verdict)
    }

    /// Mark a phase completed and finalize its verdict. Returns false for
    /// phases outside the plan.
    pub fn complete_phase(&mut self, phase: &str) -> bool {
        match self.phase_mut(phase) {
            Some(result) => {
                result.finalize();
                true
            }
            None => false,
        }
    }

    /// Mark a phase failed with a device error and finalize it.
    pub fn fail_phase(&mut self, phase: &str, error: impl Into<String>) -> bool {
        match self.phase_mut(phase) {
            Some(result) => {
                result.error = Some(error.into());
                result.finalize();
                true
            }
            None => false,
        }
    }

    /// Aggregate verdict: FAIL if any phase failed, PASS only when every
    /// phase completed clean, PENDING otherwise.
    pub fn overall_verdict(&self) -> Verdict {
        if self.phases.iter().any(|p| p.verdict == Verdict::Fail) {
            return Verdict::Fail;
        }
        if self
            .phases
            .iter()
            .all(|p| p.completed && p.verdict == Verdict::Pass)
        {
            return Verdict::Pass;
        }
        Verdict::Pending
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            session_id: Some(self.session_id.clone()),
            barcode: Some(self.barcode.clone()),
            model_id: Some(self.model_id.clone()),
            status: self.status,
            current_phase: self.current_phase.clone(),
            phases: self
                .phases
                .iter()
                .map(|p| PhaseSnapshot {
                    result: p.clone(),
                    stats: self.history.stats(&p.name),
                })
                .collect(),
            overall: self.overall_verdict(),
            error: self.error.clone(),
        }
    }
}

/// Serializable view of the session published to frontends.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionSnapshot {
    pub session_id: Option<String>,
    pub barcode: Option<String>,
    pub model_id: Option<String>,
    pub status: SessionStatus,
    pub current_phase: Option<String>,
    pub phases: Vec<PhaseSnapshot>,
    pub overall: Verdict,
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PhaseSnapshot {
    #[serde(flatten)]
    pub result: PhaseResult,
    pub stats: Option<ReadingStats>,
}

impl SessionSnapshot {
    pub fn idle() -> Self {
        Self {
            session_id: None,
            barcode: None,
            model_id: None,
            status: SessionStatus::Idle,
            current_phase: None,
            phases: Vec::new(),
            overall: Verdict::Pending,
            error: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn model() -> ModelSpec {
        ModelSpec::three_phase("m1", "test model", [(0.0, 100.0); 3])
    }

    #[test]
    fn fresh_session_is_running_with_pending_phases() {
        let session = InspectionSession::begin(1, "ABC123", &model());
        assert_eq!(session.status, SessionStatus::Running);
        assert_eq!(session.current_phase, None);
        assert_eq!(session.phases.len(), 3);
        assert!(session
            .phases
            .iter()
            .all(|p| p.verdict == Verdict::Pending && !p.completed));
        assert_eq!(session.overall_verdict(), Verdict::Pending);
    }

    #[test]
    fn one_violation_fails_the_phase_and_the_session() {
        let mut session = InspectionSession::begin(1, "ABC123", &model());
        session.record_reading("P1", 50.0, None);
        session.record_reading("P2", 150.0, None);
        session.record_reading("P3", 50.0, None);
        for phase in ["P1", "P2", "P3"] {
            assert!(session.complete_phase(phase));
        }

        assert_eq!(session.phase("P1").unwrap().verdict, Verdict::Pass);
        assert_eq!(session.phase("P2").unwrap().verdict, Verdict::Fail);
        assert_eq!(session.phase("P3").unwrap().verdict, Verdict::Pass);
        assert_eq!(session.overall_verdict(), Verdict::Fail);
    }

    #[test]
    fn verdict_stays_pending_until_completed() {
        let mut session = InspectionSession::begin(1, "ABC123", &model());
        session.record_reading("P1", 50.0, None);
        assert_eq!(session.phase("P1").unwrap().verdict, Verdict::Pending);
        session.complete_phase("P1");
        assert_eq!(session.phase("P1").unwrap().verdict, Verdict::Pass);
        // Other phases still pending, so overall is pending.
        assert_eq!(session.overall_verdict(), Verdict::Pending);
    }

    #[test]
    fn device_error_fails_a_phase_without_readings() {
        let mut session = InspectionSession::begin(1, "ABC123", &model());
        session.fail_phase("P1", "round trip timed out");
        let phase = session.phase("P1").unwrap();
        assert_eq!(phase.verdict, Verdict::Fail);
        assert!(phase.completed);
        assert_eq!(phase.error.as_deref(), Some("round trip timed out"));
    }

    #[test]
    fn unknown_phase_is_rejected() {
        let mut session = InspectionSession::begin(1, "ABC123", &model());
        assert!(session.record_reading("P9", 1.0, None).is_none());
        assert!(!session.complete_phase("P9"));
    }

    #[test]
    fn all_phases_pass_yields_pass() {
        let mut session = InspectionSession::begin(1, "ABC123", &model());
        for phase in ["P1", "P2", "P3"] {
            session.record_reading(phase, 50.0, None);
            session.complete_phase(phase);
        }
        assert_eq!(session.overall_verdict(), Verdict::Pass);
    }

    #[test]
    fn snapshot_carries_stats_and_overall() {
        let mut session = InspectionSession::begin(1, "ABC123", &model());
        session.record_reading("P1", 10.0, Some("W".to_string()));
        session.record_reading("P1", 30.0, Some("W".to_string()));
        let snapshot = session.snapshot();
        assert_eq!(snapshot.status, SessionStatus::Running);
        let p1 = &snapshot.phases[0];
        assert_eq!(p1.result.readings, 2);
        let stats = p1.stats.expect("stats");
        assert_eq!(stats.count, 2);
        assert!((stats.mean - 20.0).abs() < f64::EPSILON);
    }
}
