// SPDX-FileCopyrightText: 2026 Stan Grams <sjg@haxx.space>
//
// SPDX-License-Identifier: BSD-2-Clause

pub mod device;
pub mod error;
pub mod measure;
pub mod session;
pub mod transport;

pub type DynResult<T> = Result<T, Box<dyn std::error::Error + Send + Sync>>;

pub use device::{ConnectionState, Device, DeviceType, LinkAccess};
pub use error::{EngineError, EngineResult};
pub use measure::{Limit, LimitDirection, Reading, Verdict};
pub use session::{InspectionController, InspectionSession, SessionEvent, SessionStatus};
