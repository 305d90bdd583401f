// SPDX-FileCopyrightText: 2026 Stan Grams <sjg@haxx.space>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Synchronous safety-tester sequence.
//!
//! The three safety checks run as blocking command/response round trips
//! against the tester, one per phase, instead of streamed events. Every
//! round trip carries a hard timeout and the whole sequence can be
//! interrupted by the cancel signal, so the session can never wedge in
//! RUNNING behind a dead instrument.

use tokio::sync::watch;
use tokio::time::{timeout, Duration};
use tracing::{info, warn};

use crate::error::{EngineError, EngineResult};
use crate::measure::parse::{parse_lenient, TestKind};
use crate::measure::Verdict;
use crate::session::controller::InspectionController;
use crate::session::machine::{ModelSpec, SessionStatus};
use crate::transport::InstrumentLink;

/// Bench order of the safety checks.
pub const SAFETY_SEQUENCE: [TestKind; 3] = [
    TestKind::Dielectric,
    TestKind::Insulation,
    TestKind::GroundBond,
];

#[derive(Debug, Clone)]
pub struct SafetyRunConfig {
    /// Budget for one command/response round trip.
    pub round_trip_timeout: Duration,
}

impl Default for SafetyRunConfig {
    fn default() -> Self {
        Self {
            round_trip_timeout: Duration::from_secs(5),
        }
    }
}

impl InspectionController {
    /// Run the three-phase safety sequence against a tester link.
    ///
    /// Single-flight like the streamed path. A timed-out or failed round
    /// trip marks that phase FAIL and the sequence moves on; a cancel signal
    /// resets the session to IDLE immediately and returns PENDING.
    pub async fn run_safety_sequence(
        &mut self,
        barcode: &str,
        link: &mut dyn InstrumentLink,
        config: &SafetyRunConfig,
        cancel: &mut watch::Receiver<bool>,
    ) -> EngineResult<Verdict> {
        if self.status() == SessionStatus::Running {
            return Err(EngineError::SessionConflict);
        }

        let model = self
            .model()
            .cloned()
            .filter(plan_covers_safety_sequence)
            .unwrap_or_else(|| ModelSpec::safety("safety-default"));

        let epoch = self.begin_session(barcode, &model);
        info!("safety sequence started for {}", barcode);

        for kind in SAFETY_SEQUENCE {
            let phase = kind.phase_name();
            match self.session_mut() {
                Some(session) if session.epoch == epoch => {
                    session.current_phase = Some(phase.to_string());
                }
                // Session was torn down or replaced while a round trip was
                // in flight. Discard the rest of this stale run.
                _ => return Ok(Verdict::Pending),
            }
            self.publish();

            let trip = timeout(config.round_trip_timeout, link.round_trip(kind.test_command()));
            tokio::pin!(trip);
            let outcome = loop {
                tokio::select! {
                    result = &mut trip => break result,
                    changed = cancel.changed() => match changed {
                        Ok(()) if *cancel.borrow() => {
                            info!("safety sequence cancelled during {}", phase);
                            self.reset_to_idle();
                            return Ok(Verdict::Pending);
                        }
                        Ok(()) => {}
                        // Cancel handle gone; nothing can interrupt anymore.
                        Err(_) => break (&mut trip).await,
                    },
                }
            };

            if self.epoch() != epoch {
                return Ok(Verdict::Pending);
            }
            let Some(session) = self.session_mut() else {
                return Ok(Verdict::Pending);
            };

            match outcome {
                Ok(Ok(line)) => {
                    let parsed = parse_lenient(&line, kind);
                    session.record_parsed(phase, &parsed);
                    session.complete_phase(phase);
                }
                Ok(Err(e)) => {
                    warn!("{} round trip failed: {}", phase, e);
                    session.fail_phase(phase, e.to_string());
                }
                Err(_) => {
                    let message = format!(
                        "round trip timed out after {:?}",
                        config.round_trip_timeout
                    );
                    warn!("{}: {}", phase, message);
                    session.fail_phase(phase, message);
                }
            }
            self.publish();
        }

        let Some(session) = self.session_mut() else {
            return Ok(Verdict::Pending);
        };
        session.status = SessionStatus::Completed;
        session.current_phase = None;
        let overall = session.overall_verdict();
        info!("safety sequence for {} finished: {}", barcode, overall);
        self.publish();
        Ok(overall)
    }
}

/// Whether a selected model already names the three safety phases.
fn plan_covers_safety_sequence(model: &ModelSpec) -> bool {
    SAFETY_SEQUENCE
        .iter()
        .all(|kind| model.phases.iter().any(|p| p.name == kind.phase_name()))
}
