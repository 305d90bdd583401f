// SPDX-FileCopyrightText: 2026 Stan Grams <sjg@haxx.space>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Push stream subscriber.
//!
//! One instance owns one subscription. Establishing the connection is
//! retried under the backoff policy; once the stream is live, the first
//! transport error is terminal for the instance. The caller observes
//! [`StreamHealth::Disconnected`] and decides whether to spin up a fresh
//! instance (the reconnect action), the client never retries on its own.

use std::time::Duration;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio::time;
use tracing::{debug, info, warn};

use eol_core::session::{ExponentialBackoff, RetryPolicy, SessionEvent};
use eol_core::{EngineError, EngineResult};
use eol_protocol::{decode_stream_line, StreamDecode};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
const MAX_JSON_LINE_BYTES: usize = 16 * 1024;

/// Message shown to the operator when the subscription dies.
const STREAM_LOST_MESSAGE: &str = "connection lost, use the reconnect action";

#[derive(Debug, Clone)]
pub struct StreamClientConfig {
    pub addr: String,
    pub retry: ExponentialBackoff,
}

impl StreamClientConfig {
    pub fn new(addr: impl Into<String>) -> Self {
        Self {
            addr: addr.into(),
            retry: ExponentialBackoff::default_stream(),
        }
    }
}

/// Health of one subscription instance.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamHealth {
    Connecting,
    Connected,
    /// Terminal for this instance. A fresh instance must be created to retry.
    Disconnected { reason: String },
}

/// Run one stream subscription until shutdown or a terminal error.
///
/// Events are forwarded into `events_tx` strictly in arrival order; a full
/// channel applies backpressure instead of reordering or dropping.
pub async fn run_stream_client(
    config: StreamClientConfig,
    events_tx: mpsc::Sender<SessionEvent>,
    health_tx: watch::Sender<StreamHealth>,
    mut shutdown_rx: watch::Receiver<bool>,
) -> EngineResult<()> {
    let _ = health_tx.send(StreamHealth::Connecting);

    let stream = match establish(&config, &mut shutdown_rx).await {
        Ok(Some(stream)) => stream,
        Ok(None) => return Ok(()),
        Err(e) => {
            let _ = health_tx.send(StreamHealth::Disconnected {
                reason: e.to_string(),
            });
            return Err(e);
        }
    };
    info!("stream subscribed to {}", config.addr);
    let _ = health_tx.send(StreamHealth::Connected);

    let mut reader = BufReader::new(stream);
    loop {
        tokio::select! {
            changed = shutdown_rx.changed() => {
                match changed {
                    Ok(()) if *shutdown_rx.borrow() => {
                        info!("stream client shutting down");
                        return Ok(());
                    }
                    Ok(()) => {}
                    Err(_) => return Ok(()),
                }
            }
            line = read_limited_line(&mut reader, MAX_JSON_LINE_BYTES) => {
                let reason = match line {
                    Ok(Some(line)) => {
                        dispatch_line(&line, &events_tx).await;
                        continue;
                    }
                    Ok(None) => "stream closed by server".to_string(),
                    Err(e) => format!("stream read failed: {e}"),
                };
                // Close our side before reporting, so no half-open socket
                // lingers behind the terminal state.
                drop(reader);
                warn!("{}; {}", reason, STREAM_LOST_MESSAGE);
                let _ = health_tx.send(StreamHealth::Disconnected {
                    reason: STREAM_LOST_MESSAGE.to_string(),
                });
                return Err(EngineError::Stream(reason));
            }
        }
    }
}

/// Connect with backoff. Ok(None) means shutdown was requested mid-retry.
async fn establish(
    config: &StreamClientConfig,
    shutdown_rx: &mut watch::Receiver<bool>,
) -> EngineResult<Option<TcpStream>> {
    let mut attempt = 0u32;
    loop {
        if *shutdown_rx.borrow() {
            return Ok(None);
        }
        let error = match time::timeout(CONNECT_TIMEOUT, TcpStream::connect(&config.addr)).await {
            Ok(Ok(stream)) => return Ok(Some(stream)),
            Ok(Err(e)) => EngineError::Connect(format!("connect to {} failed: {e}", config.addr)),
            Err(_) => EngineError::Connect(format!(
                "connect to {} timed out after {:?}",
                config.addr, CONNECT_TIMEOUT
            )),
        };
        if !config.retry.should_retry(attempt + 1, &error) {
            return Err(EngineError::Stream(error.to_string()));
        }
        let delay = config.retry.delay(attempt);
        warn!("{} (attempt {}), retrying in {:?}", error, attempt + 1, delay);
        tokio::select! {
            _ = time::sleep(delay) => {}
            changed = shutdown_rx.changed() => {
                match changed {
                    Ok(()) if *shutdown_rx.borrow() => return Ok(None),
                    Ok(()) => {}
                    Err(_) => return Ok(None),
                }
            }
        }
        attempt += 1;
    }
}

async fn dispatch_line(line: &str, events_tx: &mpsc::Sender<SessionEvent>) {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return;
    }
    match decode_stream_line(trimmed) {
        Ok(StreamDecode::Event(event)) => {
            if events_tx.send(event).await.is_err() {
                debug!("event consumer gone, dropping message");
            }
        }
        Ok(StreamDecode::Unknown { kind }) => {
            debug!("unknown stream message type {} dropped", kind);
        }
        Err(e) => {
            warn!("undecodable stream message dropped: {}", e);
        }
    }
}

async fn read_limited_line<R: AsyncBufRead + Unpin>(
    reader: &mut R,
    max_bytes: usize,
) -> std::io::Result<Option<String>> {
    let mut line = Vec::with_capacity(256);
    loop {
        let available = reader.fill_buf().await?;
        if available.is_empty() {
            if line.is_empty() {
                return Ok(None);
            }
            let text = String::from_utf8(line).map_err(|e| {
                std::io::Error::new(
                    std::io::ErrorKind::InvalidData,
                    format!("line is not valid UTF-8: {e}"),
                )
            })?;
            return Ok(Some(text));
        }

        if let Some(pos) = available.iter().position(|b| *b == b'\n') {
            let chunk = &available[..=pos];
            if line.len() + chunk.len() > max_bytes {
                return Err(std::io::Error::new(
                    std::io::ErrorKind::InvalidData,
                    format!("line exceeds maximum size of {max_bytes} bytes"),
                ));
            }
            line.extend_from_slice(chunk);
            reader.consume(pos + 1);
            let text = String::from_utf8(line).map_err(|e| {
                std::io::Error::new(
                    std::io::ErrorKind::InvalidData,
                    format!("line is not valid UTF-8: {e}"),
                )
            })?;
            return Ok(Some(text));
        }

        if line.len() + available.len() > max_bytes {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                format!("line exceeds maximum size of {max_bytes} bytes"),
            ));
        }

        line.extend_from_slice(available);
        let consumed = available.len();
        reader.consume(consumed);
    }
}
