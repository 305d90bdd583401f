// SPDX-FileCopyrightText: 2026 Stan Grams <sjg@haxx.space>
//
// SPDX-License-Identifier: BSD-2-Clause

//! TCP instrument link, used for bench emulators that expose the same
//! line protocol over a socket.

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::time::{timeout, Duration};

use crate::DynResult;

use super::{InstrumentLink, LinkFuture};

pub struct TcpLink {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
    read_timeout: Duration,
}

impl TcpLink {
    const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
    const DEFAULT_READ_TIMEOUT: Duration = Duration::from_millis(800);

    pub async fn connect(addr: &str) -> DynResult<Self> {
        let stream = timeout(Self::CONNECT_TIMEOUT, TcpStream::connect(addr))
            .await
            .map_err(|_| format!("connect to {addr} timed out"))??;
        let (reader, writer) = stream.into_split();
        Ok(Self {
            reader: BufReader::new(reader),
            writer,
            read_timeout: Self::DEFAULT_READ_TIMEOUT,
        })
    }

    pub fn with_read_timeout(mut self, read_timeout: Duration) -> Self {
        self.read_timeout = read_timeout;
        self
    }

    async fn write_cmd(&mut self, command: &str) -> DynResult<()> {
        self.writer.write_all(command.as_bytes()).await?;
        self.writer.write_all(b"\n").await?;
        self.writer.flush().await?;
        Ok(())
    }
}

impl InstrumentLink for TcpLink {
    fn round_trip<'a>(&'a mut self, command: &'a str) -> LinkFuture<'a, String> {
        Box::pin(async move {
            self.write_cmd(command).await?;
            let mut line = String::new();
            let n = timeout(self.read_timeout, self.reader.read_line(&mut line))
                .await
                .map_err(|_| format!("read timed out after {:?}", self.read_timeout))??;
            if n == 0 {
                return Err("connection closed by instrument".into());
            }
            Ok(line.trim_end_matches(['\r', '\n']).to_string())
        })
    }

    fn send<'a>(&'a mut self, command: &'a str) -> LinkFuture<'a, ()> {
        Box::pin(async move { self.write_cmd(command).await })
    }

    fn close<'a>(&'a mut self) -> LinkFuture<'a, ()> {
        Box::pin(async move {
            self.writer.shutdown().await?;
            Ok(())
        })
    }
}
