// SPDX-License-Identifier: GPL-3.0-only
/*
 * Copyright (c) 2025 Code Construct
 */
//! The boundary to the physical link.
//!
//! The protocol engine never opens sockets itself. A transport moves one
//! complete request message to an address and hands back the complete
//! response message, blocking until it arrives or the transport gives up.

use core::fmt::Debug;

use thiserror::Error;

#[derive(Clone, Copy, Debug, Error, Eq, PartialEq)]
pub enum TransportError {
    #[error("timed out waiting for response")]
    Timeout,
    #[error("link failure")]
    Link,
}

/// A request/response link to management endpoints.
///
/// Implementations must deliver the request fragments as one message, in
/// order, and must return a single complete response message.
pub trait Transport {
    type Address: Copy + Debug;

    /// The largest message, in bytes, that can be exchanged with `addr` in
    /// either direction, including all headers and the integrity check.
    fn max_message_size(&self, addr: &Self::Address) -> usize;

    /// Send the concatenation of `req` to `addr` and receive the response
    /// into `resp`, returning the number of response bytes written.
    fn send_and_receive(
        &mut self,
        addr: &Self::Address,
        req: &[&[u8]],
        resp: &mut [u8],
    ) -> Result<usize, TransportError>;
}

/// MCTP addressing: a local network id plus the remote endpoint id.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct MctpAddr {
    pub net: u32,
    pub eid: mctp::Eid,
}

impl MctpAddr {
    pub fn new(net: u32, eid: u8) -> Self {
        Self {
            net,
            eid: mctp::Eid(eid),
        }
    }
}
