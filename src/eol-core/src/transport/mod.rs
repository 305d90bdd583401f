// SPDX-FileCopyrightText: 2026 Stan Grams <sjg@haxx.space>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Byte-string command/response seam between the engine and the instruments.
//!
//! The engine never sees port handles or sockets, only this trait pair. The
//! physical transport (serial, TCP test emulators) is an implementation
//! detail behind [`LinkBuilder`].

use std::future::Future;
use std::pin::Pin;

use crate::device::{Device, LinkAccess};
use crate::DynResult;

pub mod scripted;
pub mod serial;
pub mod tcp;

pub use scripted::{ScriptedBuilder, ScriptedLink};
pub use serial::SerialLink;
pub use tcp::TcpLink;

/// Alias to reduce type complexity in link futures.
pub type LinkFuture<'a, T> = Pin<Box<dyn Future<Output = DynResult<T>> + Send + 'a>>;

/// Command/response interface to one instrument.
pub trait InstrumentLink: Send {
    /// Send one command line and await a single response line.
    /// Line terminators are handled by the implementation.
    fn round_trip<'a>(&'a mut self, command: &'a str) -> LinkFuture<'a, String>;

    /// Send a command that produces no response.
    fn send<'a>(&'a mut self, command: &'a str) -> LinkFuture<'a, ()>;

    /// Close the underlying transport. Best-effort.
    fn close<'a>(&'a mut self) -> LinkFuture<'a, ()>;
}

/// Opens links from registry records. Tests substitute scripted links here.
pub trait LinkBuilder: Send + Sync {
    fn open<'a>(&'a self, device: &'a Device) -> LinkFuture<'a, Box<dyn InstrumentLink>>;
}

/// Builder that picks the link implementation from the device's access method.
pub struct AccessLinkBuilder;

impl LinkBuilder for AccessLinkBuilder {
    fn open<'a>(&'a self, device: &'a Device) -> LinkFuture<'a, Box<dyn InstrumentLink>> {
        Box::pin(async move {
            match &device.access {
                LinkAccess::Serial { path, baud } => {
                    let link = SerialLink::open(path, *baud)?;
                    Ok(Box::new(link) as Box<dyn InstrumentLink>)
                }
                LinkAccess::Tcp { addr } => {
                    let link = TcpLink::connect(addr).await?;
                    Ok(Box::new(link) as Box<dyn InstrumentLink>)
                }
            }
        })
    }
}
