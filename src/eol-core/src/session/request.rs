// SPDX-FileCopyrightText: 2026 Stan Grams <sjg@haxx.space>
//
// SPDX-License-Identifier: BSD-2-Clause

use tokio::sync::oneshot;

use crate::error::EngineResult;
use crate::session::command::EngineCommand;

/// Request sent to the command client task. The reply is the backend's
/// optional response payload, already collapsed into a real result.
#[derive(Debug)]
pub struct EngineRequest {
    pub cmd: EngineCommand,
    pub respond_to: oneshot::Sender<EngineResult<Option<String>>>,
}
