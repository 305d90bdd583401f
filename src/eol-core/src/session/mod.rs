// SPDX-FileCopyrightText: 2026 Stan Grams <sjg@haxx.space>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Inspection session components.
//!
//! The controller consumes typed stream events, drives the per-session state
//! machine through its ordered phases, and issues outbound commands to the
//! device-driving backend.

pub mod command;
pub mod controller;
pub mod event;
pub mod machine;
pub mod policy;
pub mod request;
pub mod runner;

pub use command::EngineCommand;
pub use controller::InspectionController;
pub use event::SessionEvent;
pub use machine::{
    InspectionSession, ModelSpec, PhaseResult, PhaseSpec, SessionSnapshot, SessionStatus,
};
pub use policy::{ExponentialBackoff, RetryPolicy};
pub use request::EngineRequest;
pub use runner::{SafetyRunConfig, SAFETY_SEQUENCE};
