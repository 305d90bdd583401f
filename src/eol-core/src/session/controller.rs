// SPDX-FileCopyrightText: 2026 Stan Grams <sjg@haxx.space>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Inspection session controller.
//!
//! Single owner of all session state. One task feeds it stream events in
//! arrival order and every transition runs to completion before the next
//! event is looked at, so no guard against concurrent mutation is needed
//! here. The controller talks to the backend through the command channel
//! and to the device layer through the connection manager.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::device::{ConnectionManager, ConnectionState, DeviceType};
use crate::error::{EngineError, EngineResult};
use crate::session::command::EngineCommand;
use crate::session::event::SessionEvent;
use crate::session::machine::{InspectionSession, ModelSpec, SessionSnapshot, SessionStatus};
use crate::session::request::EngineRequest;

pub struct InspectionController {
    devices: Arc<ConnectionManager>,
    commands: mpsc::Sender<EngineRequest>,
    snapshot_tx: watch::Sender<SessionSnapshot>,
    model: Option<ModelSpec>,
    session: Option<InspectionSession>,
    epoch: u64,
    command_timeout: Duration,
}

impl InspectionController {
    pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(10);

    pub fn new(
        devices: Arc<ConnectionManager>,
        commands: mpsc::Sender<EngineRequest>,
        snapshot_tx: watch::Sender<SessionSnapshot>,
    ) -> Self {
        Self {
            devices,
            commands,
            snapshot_tx,
            model: None,
            session: None,
            epoch: 0,
            command_timeout: Self::DEFAULT_COMMAND_TIMEOUT,
        }
    }

    pub fn with_command_timeout(mut self, command_timeout: Duration) -> Self {
        self.command_timeout = command_timeout;
        self
    }

    /// Select the model applied to subsequent sessions. Does not touch a
    /// session already in flight.
    pub fn select_model(&mut self, model: ModelSpec) {
        info!("model selected: {} ({})", model.name, model.id);
        self.model = Some(model);
    }

    pub fn model(&self) -> Option<&ModelSpec> {
        self.model.as_ref()
    }

    pub fn status(&self) -> SessionStatus {
        self.session
            .as_ref()
            .map(|s| s.status)
            .unwrap_or(SessionStatus::Idle)
    }

    pub fn devices(&self) -> &Arc<ConnectionManager> {
        &self.devices
    }

    /// Current generation counter. Bumped on every session start and reset;
    /// long round trips compare it afterwards to detect a stale session.
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.session
            .as_ref()
            .map(|s| s.snapshot())
            .unwrap_or_else(SessionSnapshot::idle)
    }

    pub(crate) fn session_mut(&mut self) -> Option<&mut InspectionSession> {
        self.session.as_mut()
    }

    pub(crate) fn begin_session(&mut self, barcode: &str, model: &ModelSpec) -> u64 {
        self.epoch += 1;
        self.session = Some(InspectionSession::begin(self.epoch, barcode, model));
        self.publish();
        self.epoch
    }

    pub(crate) fn reset_to_idle(&mut self) {
        self.session = None;
        self.epoch += 1;
        self.publish();
    }

    pub(crate) fn publish(&self) {
        let _ = self.snapshot_tx.send(self.snapshot());
    }

    /// Dispatch one stream event. Late or duplicate events for a session
    /// that is no longer RUNNING are ignored, not buffered.
    pub async fn handle_event(&mut self, event: SessionEvent) {
        match event {
            SessionEvent::BarcodeScanned { barcode } => match self.start_session(&barcode).await {
                Ok(()) => {}
                Err(EngineError::SessionConflict) => {
                    warn!("barcode {} rejected: session already active", barcode);
                }
                Err(e) => warn!("cannot start inspection for {}: {}", barcode, e),
            },
            SessionEvent::InspectionStarted { session_id } => {
                if self.running() {
                    debug!(
                        "backend acknowledged inspection start (remote session {:?})",
                        session_id
                    );
                }
            }
            SessionEvent::PhaseStarted { phase } => {
                let Some(session) = self.running_session_mut() else {
                    return;
                };
                if session.phase(&phase).is_none() {
                    warn!("phase {} is not part of the selected plan", phase);
                }
                session.current_phase = Some(phase);
                self.publish();
            }
            SessionEvent::Measurement { phase, value, unit } => {
                let Some(session) = self.running_session_mut() else {
                    return;
                };
                let target = phase.or_else(|| session.current_phase.clone());
                match target {
                    Some(name) => {
                        if session.record_reading(&name, value, unit).is_none() {
                            warn!("reading for unknown phase {} dropped", name);
                            return;
                        }
                        self.publish();
                    }
                    None => warn!("reading without a phase tag dropped"),
                }
            }
            SessionEvent::PhaseCompleted { phase } => {
                let Some(session) = self.running_session_mut() else {
                    return;
                };
                if !session.complete_phase(&phase) {
                    warn!("completion for unknown phase {} dropped", phase);
                    return;
                }
                self.publish();
            }
            SessionEvent::InspectionCompleted => {
                let Some(session) = self.running_session_mut() else {
                    return;
                };
                session.status = SessionStatus::Completed;
                session.current_phase = None;
                info!(
                    "inspection {} completed: {}",
                    session.barcode,
                    session.overall_verdict()
                );
                self.publish();
            }
            SessionEvent::InspectionStopped => {
                if self.running() {
                    info!("inspection stopped by backend");
                    self.reset_to_idle();
                }
            }
            SessionEvent::InspectionError { message } => {
                let Some(session) = self.running_session_mut() else {
                    return;
                };
                warn!("inspection error reported: {}", message);
                session.status = SessionStatus::Error;
                session.current_phase = None;
                session.error = Some(message);
                self.publish();
            }
            SessionEvent::Log { message } => info!("bench: {}", message),
        }
    }

    /// Start a session for a scanned barcode. Requires a selected model and
    /// a connected power meter; rejects with [`EngineError::SessionConflict`]
    /// and zero side effects while a session is RUNNING.
    pub async fn start_session(&mut self, barcode: &str) -> EngineResult<()> {
        if self.running() {
            return Err(EngineError::SessionConflict);
        }
        let model = self.model.clone().ok_or(EngineError::NoModel)?;
        if self.devices.status(DeviceType::PowerMeter).await != ConnectionState::Connected {
            return Err(EngineError::NotConnected(DeviceType::PowerMeter));
        }

        self.begin_session(barcode, &model);
        info!("inspection started for {} (model {})", barcode, model.id);

        let start = EngineCommand::StartInspection {
            barcode: barcode.to_string(),
            model_id: model.id.clone(),
            measurement_duration: model.measurement_duration,
            wait_duration: model.wait_duration,
            interval_seconds: model.interval_seconds,
        };
        if let Err(e) = self.send_command(start).await {
            warn!("sequential inspection request failed: {}", e);
            if let Some(session) = self.session.as_mut() {
                session.status = SessionStatus::Error;
                session.error = Some(e.to_string());
            }
            self.publish();
        }
        Ok(())
    }

    /// Explicit stop. Local state is reset to IDLE first; the remote stop
    /// request is best-effort and its outcome never blocks the reset.
    pub async fn stop(&mut self) {
        if self.session.is_none() {
            return;
        }
        let was_running = self.running();
        self.reset_to_idle();
        info!("inspection session reset to idle");

        if was_running {
            let (tx, _rx) = oneshot::channel();
            let request = EngineRequest {
                cmd: EngineCommand::StopInspection,
                respond_to: tx,
            };
            if self.commands.send(request).await.is_err() {
                warn!("stop request could not be delivered to the backend");
            }
        }
    }

    /// The push stream died under a RUNNING session. Terminal for the
    /// session; the operator restarts via the reconnect action.
    pub fn on_stream_lost(&mut self, reason: &str) {
        let Some(session) = self.running_session_mut() else {
            return;
        };
        warn!("stream lost during inspection: {}", reason);
        session.status = SessionStatus::Error;
        session.current_phase = None;
        session.error = Some(EngineError::Stream(reason.to_string()).to_string());
        self.publish();
    }

    /// Relay one raw command line to a device through the backend.
    pub async fn send_raw_command(
        &self,
        device_id: &str,
        command: &str,
        timeout_seconds: f64,
    ) -> EngineResult<Option<String>> {
        self.send_command(EngineCommand::SendRawCommand {
            device_id: device_id.to_string(),
            command: command.to_string(),
            timeout_seconds,
        })
        .await
    }

    fn running(&self) -> bool {
        self.status() == SessionStatus::Running
    }

    fn running_session_mut(&mut self) -> Option<&mut InspectionSession> {
        self.session
            .as_mut()
            .filter(|s| s.status == SessionStatus::Running)
    }

    pub(crate) async fn send_command(&self, cmd: EngineCommand) -> EngineResult<Option<String>> {
        let (tx, rx) = oneshot::channel();
        self.commands
            .send(EngineRequest {
                cmd,
                respond_to: tx,
            })
            .await
            .map_err(|_| EngineError::ChannelClosed)?;
        match timeout(self.command_timeout, rx).await {
            Err(_) => Err(EngineError::Timeout(self.command_timeout)),
            Ok(Err(_)) => Err(EngineError::ChannelClosed),
            Ok(Ok(result)) => result,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::{Device, LinkAccess};
    use crate::measure::Verdict;
    use crate::transport::ScriptedBuilder;

    /// Command stub that acknowledges every request and records it.
    fn spawn_command_stub() -> (mpsc::Sender<EngineRequest>, mpsc::Receiver<EngineCommand>) {
        let (tx, mut rx) = mpsc::channel::<EngineRequest>(16);
        let (log_tx, log_rx) = mpsc::channel(16);
        tokio::spawn(async move {
            while let Some(request) = rx.recv().await {
                let _ = log_tx.send(request.cmd.clone()).await;
                let _ = request.respond_to.send(Ok(None));
            }
        });
        (tx, log_rx)
    }

    /// Command stub whose replies always fail.
    fn spawn_failing_command_stub() -> mpsc::Sender<EngineRequest> {
        let (tx, mut rx) = mpsc::channel::<EngineRequest>(16);
        tokio::spawn(async move {
            while let Some(request) = rx.recv().await {
                let _ = request
                    .respond_to
                    .send(Err(EngineError::Rejected("backend down".to_string())));
            }
        });
        tx
    }

    /// Command stub that accepts starts but fails every stop.
    fn spawn_stub_failing_stop() -> mpsc::Sender<EngineRequest> {
        let (tx, mut rx) = mpsc::channel::<EngineRequest>(16);
        tokio::spawn(async move {
            while let Some(request) = rx.recv().await {
                let reply = match request.cmd {
                    EngineCommand::StopInspection => {
                        Err(EngineError::Rejected("stop refused".to_string()))
                    }
                    _ => Ok(None),
                };
                let _ = request.respond_to.send(reply);
            }
        });
        tx
    }

    async fn connected_devices() -> Arc<ConnectionManager> {
        let mgr = ConnectionManager::new(Box::new(ScriptedBuilder::new()))
            .with_settle_delay(Duration::from_millis(1));
        mgr.register(Device::new(
            "wt310",
            DeviceType::PowerMeter,
            LinkAccess::Tcp {
                addr: "127.0.0.1:9999".to_string(),
            },
        ))
        .await;
        mgr.connect(DeviceType::PowerMeter).await.expect("connect");
        Arc::new(mgr)
    }

    fn controller_with(
        devices: Arc<ConnectionManager>,
        commands: mpsc::Sender<EngineRequest>,
    ) -> (InspectionController, watch::Receiver<SessionSnapshot>) {
        let (snapshot_tx, snapshot_rx) = watch::channel(SessionSnapshot::idle());
        let mut controller = InspectionController::new(devices, commands, snapshot_tx)
            .with_command_timeout(Duration::from_millis(200));
        controller.select_model(ModelSpec::three_phase("m1", "unit", [(0.0, 100.0); 3]));
        (controller, snapshot_rx)
    }

    #[tokio::test]
    async fn start_requires_model_and_connected_meter() {
        let (commands, _log) = spawn_command_stub();
        let devices = Arc::new(ConnectionManager::new(Box::new(ScriptedBuilder::new())));
        let (snapshot_tx, _snapshot_rx) = watch::channel(SessionSnapshot::idle());
        let mut controller = InspectionController::new(devices, commands, snapshot_tx);

        let err = controller.start_session("ABC123").await.expect_err("no model");
        assert_eq!(err, EngineError::NoModel);

        controller.select_model(ModelSpec::three_phase("m1", "unit", [(0.0, 100.0); 3]));
        let err = controller
            .start_session("ABC123")
            .await
            .expect_err("meter not connected");
        assert_eq!(err, EngineError::NotConnected(DeviceType::PowerMeter));
        assert_eq!(controller.status(), SessionStatus::Idle);
    }

    #[tokio::test]
    async fn second_start_is_rejected_without_side_effects() {
        let (commands, mut log) = spawn_command_stub();
        let (mut controller, _rx) = controller_with(connected_devices().await, commands);

        controller.start_session("ABC123").await.expect("first start");
        assert_eq!(controller.status(), SessionStatus::Running);
        let epoch = controller.epoch();
        assert!(matches!(
            log.recv().await,
            Some(EngineCommand::StartInspection { .. })
        ));

        let err = controller
            .start_session("XYZ789")
            .await
            .expect_err("must conflict");
        assert_eq!(err, EngineError::SessionConflict);
        assert_eq!(controller.epoch(), epoch);
        let snapshot = controller.snapshot();
        assert_eq!(snapshot.barcode.as_deref(), Some("ABC123"));
    }

    #[tokio::test]
    async fn end_to_end_three_phase_scenario() {
        let (commands, _log) = spawn_command_stub();
        let (mut controller, _rx) = controller_with(connected_devices().await, commands);

        controller
            .handle_event(SessionEvent::BarcodeScanned {
                barcode: "ABC123".to_string(),
            })
            .await;
        assert_eq!(controller.status(), SessionStatus::Running);

        for (phase, value) in [("P1", 50.0), ("P2", 150.0), ("P3", 50.0)] {
            controller
                .handle_event(SessionEvent::PhaseStarted {
                    phase: phase.to_string(),
                })
                .await;
            controller
                .handle_event(SessionEvent::Measurement {
                    phase: Some(phase.to_string()),
                    value,
                    unit: Some("W".to_string()),
                })
                .await;
            controller
                .handle_event(SessionEvent::PhaseCompleted {
                    phase: phase.to_string(),
                })
                .await;
        }
        controller.handle_event(SessionEvent::InspectionCompleted).await;

        let snapshot = controller.snapshot();
        assert_eq!(snapshot.status, SessionStatus::Completed);
        assert_eq!(snapshot.current_phase, None);
        assert_eq!(snapshot.phases[0].result.verdict, Verdict::Pass);
        assert_eq!(snapshot.phases[1].result.verdict, Verdict::Fail);
        assert_eq!(snapshot.phases[2].result.verdict, Verdict::Pass);
        assert_eq!(snapshot.overall, Verdict::Fail);
    }

    #[tokio::test]
    async fn untagged_reading_routes_to_current_phase() {
        let (commands, _log) = spawn_command_stub();
        let (mut controller, _rx) = controller_with(connected_devices().await, commands);

        controller.start_session("ABC123").await.expect("start");
        controller
            .handle_event(SessionEvent::PhaseStarted {
                phase: "P2".to_string(),
            })
            .await;
        controller
            .handle_event(SessionEvent::Measurement {
                phase: None,
                value: 42.0,
                unit: None,
            })
            .await;

        let snapshot = controller.snapshot();
        assert_eq!(snapshot.phases[1].result.readings, 1);
    }

    #[tokio::test]
    async fn late_events_after_completion_are_ignored() {
        let (commands, _log) = spawn_command_stub();
        let (mut controller, _rx) = controller_with(connected_devices().await, commands);

        controller.start_session("ABC123").await.expect("start");
        controller.handle_event(SessionEvent::InspectionCompleted).await;
        assert_eq!(controller.status(), SessionStatus::Completed);

        controller
            .handle_event(SessionEvent::Measurement {
                phase: Some("P1".to_string()),
                value: 1.0,
                unit: None,
            })
            .await;
        controller
            .handle_event(SessionEvent::PhaseStarted {
                phase: "P1".to_string(),
            })
            .await;
        let snapshot = controller.snapshot();
        assert_eq!(snapshot.status, SessionStatus::Completed);
        assert_eq!(snapshot.phases[0].result.readings, 0);
        assert_eq!(snapshot.current_phase, None);
    }

    #[tokio::test]
    async fn stop_is_idempotent_and_always_lands_idle() {
        let (commands, _log) = spawn_command_stub();
        let (mut controller, _rx) = controller_with(connected_devices().await, commands);

        // Stop while idle is a no-op.
        controller.stop().await;
        assert_eq!(controller.status(), SessionStatus::Idle);

        controller.start_session("ABC123").await.expect("start");
        controller.stop().await;
        assert_eq!(controller.status(), SessionStatus::Idle);
    }

    #[tokio::test]
    async fn stop_lands_idle_even_when_remote_stop_fails() {
        let commands = spawn_stub_failing_stop();
        let (mut controller, _rx) = controller_with(connected_devices().await, commands);

        controller.start_session("ABC123").await.expect("start");
        assert_eq!(controller.status(), SessionStatus::Running);
        controller.stop().await;
        assert_eq!(controller.status(), SessionStatus::Idle);
    }

    #[tokio::test]
    async fn failed_start_command_moves_session_to_error() {
        let commands = spawn_failing_command_stub();
        let (mut controller, _rx) = controller_with(connected_devices().await, commands);

        controller.start_session("ABC123").await.expect("start accepted");
        let snapshot = controller.snapshot();
        assert_eq!(snapshot.status, SessionStatus::Error);
        assert!(snapshot.error.as_deref().unwrap().contains("backend down"));
    }

    #[tokio::test]
    async fn stream_loss_terminates_running_session() {
        let (commands, _log) = spawn_command_stub();
        let (mut controller, _rx) = controller_with(connected_devices().await, commands);

        controller.start_session("ABC123").await.expect("start");
        controller.on_stream_lost("connection lost, use the reconnect action");
        let snapshot = controller.snapshot();
        assert_eq!(snapshot.status, SessionStatus::Error);
        assert!(snapshot.error.as_deref().unwrap().contains("stream"));

        // A later loss notification with no running session changes nothing.
        controller.on_stream_lost("again");
        assert_eq!(controller.status(), SessionStatus::Error);
    }

    #[tokio::test]
    async fn backend_error_event_carries_message() {
        let (commands, _log) = spawn_command_stub();
        let (mut controller, _rx) = controller_with(connected_devices().await, commands);

        controller.start_session("ABC123").await.expect("start");
        controller
            .handle_event(SessionEvent::InspectionError {
                message: "meter range fault".to_string(),
            })
            .await;
        let snapshot = controller.snapshot();
        assert_eq!(snapshot.status, SessionStatus::Error);
        assert_eq!(snapshot.error.as_deref(), Some("meter range fault"));
    }
}
