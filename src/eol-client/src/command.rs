// SPDX-FileCopyrightText: 2026 Stan Grams <sjg@haxx.space>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Command channel client.
//!
//! Drains [`EngineRequest`]s from the engine and runs them as JSON line
//! request/response exchanges against the backend. The connection is opened
//! lazily and dropped on any transport error, so the next request starts
//! from a fresh connect instead of a wedged socket.

use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio::time;
use tracing::info;

use eol_core::session::EngineRequest;
use eol_core::{EngineError, EngineResult};
use eol_protocol::backend_command;
use eol_protocol::types::CommandReply;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
const IO_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone)]
pub struct CommandClientConfig {
    pub addr: String,
    pub io_timeout: Duration,
}

impl CommandClientConfig {
    pub fn new(addr: impl Into<String>) -> Self {
        Self {
            addr: addr.into(),
            io_timeout: IO_TIMEOUT,
        }
    }
}

struct Connection {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
}

/// Run the command client until the request channel closes or shutdown.
pub async fn run_command_client(
    config: CommandClientConfig,
    mut rx: mpsc::Receiver<EngineRequest>,
    mut shutdown_rx: watch::Receiver<bool>,
) -> EngineResult<()> {
    let mut connection: Option<Connection> = None;

    loop {
        let request = tokio::select! {
            changed = shutdown_rx.changed() => {
                match changed {
                    Ok(()) if *shutdown_rx.borrow() => {
                        info!("command client shutting down");
                        return Ok(());
                    }
                    Ok(()) => continue,
                    Err(_) => return Ok(()),
                }
            }
            request = rx.recv() => {
                let Some(request) = request else {
                    return Ok(());
                };
                request
            }
        };

        let result = exchange(&config, &mut connection, &request).await;
        if result.is_err() {
            // Force a fresh connect for the next request.
            connection = None;
        }
        let _ = request.respond_to.send(result);
    }
}

async fn exchange(
    config: &CommandClientConfig,
    connection: &mut Option<Connection>,
    request: &EngineRequest,
) -> EngineResult<Option<String>> {
    if connection.is_none() {
        *connection = Some(connect(config).await?);
    }
    let conn = connection.as_mut().ok_or(EngineError::ChannelClosed)?;

    let wire = backend_command(&request.cmd);
    let payload = serde_json::to_string(&wire)
        .map_err(|e| EngineError::Stream(format!("JSON serialize failed: {e}")))?;

    time::timeout(
        config.io_timeout,
        conn.writer.write_all(format!("{payload}\n").as_bytes()),
    )
    .await
    .map_err(|_| EngineError::Timeout(config.io_timeout))?
    .map_err(|e| EngineError::Stream(format!("write failed: {e}")))?;
    time::timeout(config.io_timeout, conn.writer.flush())
        .await
        .map_err(|_| EngineError::Timeout(config.io_timeout))?
        .map_err(|e| EngineError::Stream(format!("flush failed: {e}")))?;

    let mut line = String::new();
    let n = time::timeout(config.io_timeout, conn.reader.read_line(&mut line))
        .await
        .map_err(|_| EngineError::Timeout(config.io_timeout))?
        .map_err(|e| EngineError::Stream(format!("read failed: {e}")))?;
    if n == 0 {
        return Err(EngineError::Stream(
            "connection closed by backend".to_string(),
        ));
    }

    let reply: CommandReply = serde_json::from_str(line.trim_end())
        .map_err(|e| EngineError::Stream(format!("invalid reply: {e}")))?;
    reply.into_outcome().map_err(EngineError::Rejected)
}

async fn connect(config: &CommandClientConfig) -> EngineResult<Connection> {
    let stream = time::timeout(CONNECT_TIMEOUT, TcpStream::connect(&config.addr))
        .await
        .map_err(|_| {
            EngineError::Connect(format!(
                "connect to {} timed out after {:?}",
                config.addr, CONNECT_TIMEOUT
            ))
        })?
        .map_err(|e| EngineError::Connect(format!("connect to {} failed: {e}", config.addr)))?;
    let (reader, writer) = stream.into_split();
    Ok(Connection {
        reader: BufReader::new(reader),
        writer,
    })
}
