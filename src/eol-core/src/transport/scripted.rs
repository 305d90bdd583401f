// SPDX-FileCopyrightText: 2026 Stan Grams <sjg@haxx.space>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Scripted in-memory link for tests and dry runs.
//!
//! Replies are consumed in order, one per round trip. A delayed reply can be
//! scripted to exercise timeout handling without real hardware.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use tokio::time::Duration;

use crate::device::Device;

use super::{InstrumentLink, LinkBuilder, LinkFuture};

#[derive(Debug, Clone)]
enum Scripted {
    Reply(String),
    DelayedReply(Duration, String),
    Fail(String),
}

#[derive(Default)]
pub struct ScriptedLink {
    replies: VecDeque<Scripted>,
    sent: Arc<Mutex<Vec<String>>>,
}

impl ScriptedLink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reply(mut self, line: impl Into<String>) -> Self {
        self.replies.push_back(Scripted::Reply(line.into()));
        self
    }

    pub fn reply_after(mut self, delay: Duration, line: impl Into<String>) -> Self {
        self.replies
            .push_back(Scripted::DelayedReply(delay, line.into()));
        self
    }

    pub fn fail(mut self, message: impl Into<String>) -> Self {
        self.replies.push_back(Scripted::Fail(message.into()));
        self
    }

    /// Shared log of every command written to the link, in send order.
    pub fn sent_log(&self) -> Arc<Mutex<Vec<String>>> {
        Arc::clone(&self.sent)
    }

    fn record(&self, command: &str) {
        if let Ok(mut log) = self.sent.lock() {
            log.push(command.to_string());
        }
    }
}

impl InstrumentLink for ScriptedLink {
    fn round_trip<'a>(&'a mut self, command: &'a str) -> LinkFuture<'a, String> {
        Box::pin(async move {
            self.record(command);
            match self.replies.pop_front() {
                Some(Scripted::Reply(line)) => Ok(line),
                Some(Scripted::DelayedReply(delay, line)) => {
                    tokio::time::sleep(delay).await;
                    Ok(line)
                }
                Some(Scripted::Fail(message)) => Err(message.into()),
                None => Err("scripted link exhausted".into()),
            }
        })
    }

    fn send<'a>(&'a mut self, command: &'a str) -> LinkFuture<'a, ()> {
        Box::pin(async move {
            self.record(command);
            Ok(())
        })
    }

    fn close<'a>(&'a mut self) -> LinkFuture<'a, ()> {
        Box::pin(async move { Ok(()) })
    }
}

/// Builder handing out identically scripted links, plus a connect-failure
/// variant for exercising error paths.
pub struct ScriptedBuilder {
    script: Vec<(String, bool)>,
    fail_connect: Option<String>,
}

impl Default for ScriptedBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedBuilder {
    pub fn new() -> Self {
        Self {
            script: Vec::new(),
            fail_connect: None,
        }
    }

    pub fn reply(mut self, line: impl Into<String>) -> Self {
        self.script.push((line.into(), false));
        self
    }

    pub fn fail(mut self, message: impl Into<String>) -> Self {
        self.script.push((message.into(), true));
        self
    }

    pub fn fail_connect(mut self, message: impl Into<String>) -> Self {
        self.fail_connect = Some(message.into());
        self
    }
}

impl LinkBuilder for ScriptedBuilder {
    fn open<'a>(&'a self, _device: &'a Device) -> LinkFuture<'a, Box<dyn InstrumentLink>> {
        Box::pin(async move {
            if let Some(message) = &self.fail_connect {
                return Err(message.clone().into());
            }
            let mut link = ScriptedLink::new();
            for (line, is_failure) in &self.script {
                link = if *is_failure {
                    link.fail(line.clone())
                } else {
                    link.reply(line.clone())
                };
            }
            Ok(Box::new(link) as Box<dyn InstrumentLink>)
        })
    }
}
