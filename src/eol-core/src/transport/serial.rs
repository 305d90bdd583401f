// SPDX-FileCopyrightText: 2026 Stan Grams <sjg@haxx.space>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Serial instrument link over tokio-serial.

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::time::{timeout, Duration};
use tokio_serial::{SerialPortBuilderExt, SerialStream};

use crate::DynResult;

use super::{InstrumentLink, LinkFuture};

/// Line-oriented RS-232 link. Commands go out LF-terminated, responses are
/// read byte-wise until LF.
pub struct SerialLink {
    port: SerialStream,
    read_timeout: Duration,
}

impl SerialLink {
    const DEFAULT_READ_TIMEOUT: Duration = Duration::from_millis(800);

    pub fn open(path: &str, baud: u32) -> DynResult<Self> {
        let builder = tokio_serial::new(path, baud);
        let port = builder.open_native_async()?;
        Ok(Self {
            port,
            read_timeout: Self::DEFAULT_READ_TIMEOUT,
        })
    }

    pub fn with_read_timeout(mut self, read_timeout: Duration) -> Self {
        self.read_timeout = read_timeout;
        self
    }

    async fn write_cmd(&mut self, command: &str) -> DynResult<()> {
        self.port.write_all(command.as_bytes()).await?;
        self.port.write_all(b"\n").await?;
        self.port.flush().await?;
        Ok(())
    }

    async fn read_line(&mut self) -> DynResult<String> {
        let mut line = Vec::with_capacity(64);
        let mut byte = [0u8; 1];
        loop {
            let n = timeout(self.read_timeout, self.port.read(&mut byte))
                .await
                .map_err(|_| format!("serial read timed out after {:?}", self.read_timeout))??;
            if n == 0 {
                return Err("serial port closed".into());
            }
            match byte[0] {
                b'\n' => break,
                b'\r' => {}
                b => line.push(b),
            }
        }
        Ok(String::from_utf8(line).map_err(|e| format!("response is not valid UTF-8: {e}"))?)
    }
}

impl InstrumentLink for SerialLink {
    fn round_trip<'a>(&'a mut self, command: &'a str) -> LinkFuture<'a, String> {
        Box::pin(async move {
            self.write_cmd(command).await?;
            self.read_line().await
        })
    }

    fn send<'a>(&'a mut self, command: &'a str) -> LinkFuture<'a, ()> {
        Box::pin(async move { self.write_cmd(command).await })
    }

    fn close<'a>(&'a mut self) -> LinkFuture<'a, ()> {
        Box::pin(async move {
            self.port.flush().await?;
            Ok(())
        })
    }
}
