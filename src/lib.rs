// SPDX-License-Identifier: GPL-3.0-only
/*
 * Copyright (c) 2025 Code Construct
 */
#![no_std]

pub mod error;
pub mod nvme;
pub mod topology;
pub mod transport;
mod wire;

extern crate deku;
extern crate num_derive;

pub use error::{Error, Framing, Precondition, Status, Violation};
pub use topology::{Accommodation, AdminChannel, Controller, Endpoint, EndpointId, Root};
pub use transport::{MctpAddr, Transport, TransportError};

use deku::{DekuError, DekuWriter, no_std_io::Cursor, writer::Writer};

/// Maximum number of endpoints a [`Root`] can hold open at once
pub const MAX_ENDPOINTS: usize = 8;

/// Maximum number of controller handles open against a single endpoint.
///
/// This bounds open handles, not the controllers a subsystem may report;
/// see [`Root::init_controller`].
pub const MAX_CONTROLLERS: usize = 32;

/// Serialise a wire structure into a zero-filled buffer of `S` bytes.
///
/// Structures shorter than `S` leave the tail zeroed, which is how the
/// reserved regions of the fixed-size data structures are produced.
pub(crate) trait Encode<const S: usize>: DekuWriter<()> {
    fn encode(&self) -> Result<[u8; S], DekuError> {
        let mut buf = [0u8; S];
        {
            let mut cursor = Cursor::new(buf.as_mut_slice());
            let mut writer = Writer::new(&mut cursor);
            self.to_writer(&mut writer, ())?;
            writer.finalize()?;
        }
        Ok(buf)
    }
}
