// SPDX-License-Identifier: GPL-3.0-only
/*
 * Copyright (c) 2025 Code Construct
 */
//! Failure taxonomy for MI commands.
//!
//! Every public operation returns [`Error`] on failure. The variants are
//! disjoint so callers can tell a dead link from a misbehaving endpoint from
//! an endpoint that simply refused the command.

use core::fmt;

use deku::DekuError;
use log::debug;
use num_traits::FromPrimitive;
use thiserror::Error;

use crate::nvme::mi::ResponseStatus;
use crate::transport::TransportError;

#[derive(Clone, Copy, Debug, Error, Eq, PartialEq)]
pub enum Error {
    /// The transport could not deliver the request or return a response.
    #[error("transport failure: {0}")]
    Transport(#[from] TransportError),

    /// A received message could not be parsed.
    #[error("framing error: {0}")]
    Framing(Framing),

    /// A well-formed response that does not answer the request that was sent.
    #[error("protocol violation: {0}")]
    Protocol(Violation),

    /// The endpoint reported a non-zero status.
    #[error("status failure: {0}")]
    Status(Status),

    /// Caller arguments violate a documented constraint. No I/O was attempted.
    #[error("precondition violation: {0}")]
    Precondition(Precondition),
}

#[derive(Clone, Copy, Debug, Error, Eq, PartialEq)]
pub enum Framing {
    #[error("message of {found} bytes is shorter than the {need} byte minimum")]
    Short { need: usize, found: usize },

    #[error("message integrity check mismatch")]
    Integrity,

    #[error("field decode failed")]
    Decode,
}

#[derive(Clone, Copy, Debug, Error, Eq, PartialEq)]
pub enum Violation {
    #[error("message type {found:#04x} in response, expected {expected:#04x}")]
    MessageType { expected: u8, found: u8 },

    #[error("NMIMT {found:#x} in response, expected {expected:#x}")]
    Nmimt { expected: u8, found: u8 },

    #[error("ROR bit clear in response")]
    NotResponse,

    #[error("command slot mismatch")]
    CommandSlot,

    #[error("received {found} payload bytes, expected {expected}")]
    Length { expected: usize, found: usize },

    #[error("received {found} payload bytes but response data length is {rdl}")]
    DataLength { rdl: usize, found: usize },

    #[error("unrecognised value {0:#x} in response field")]
    Field(u32),
}

/// Status code reported by the endpoint, carried verbatim.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Status {
    pub code: u8,
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind() {
            Some(kind) => write!(f, "{:#04x} ({kind:?})", self.code),
            None => write!(f, "{:#04x}", self.code),
        }
    }
}

impl core::error::Error for Status {}

impl Status {
    pub fn new(code: u8) -> Self {
        Self { code }
    }

    /// Interpret the code against the NVMe-MI response status table
    pub fn kind(&self) -> Option<ResponseStatus> {
        ResponseStatus::from_u8(self.code)
    }
}

#[derive(Clone, Copy, Debug, Error, Eq, PartialEq)]
pub enum Precondition {
    #[error("buffer of {capacity} bytes cannot hold {len} bytes")]
    BufferTooSmall { capacity: usize, len: usize },

    #[error("payload of {len} bytes exceeds the {max} byte limit")]
    PayloadTooLarge { len: usize, max: usize },

    #[error("offset {0:#x} is not dword aligned")]
    Misaligned(u64),

    #[error("length {0} is not a non-zero dword multiple")]
    InvalidLength(usize),

    #[error("window at offset {offset:#x} of {len} bytes overflows")]
    WindowOverflow { offset: u64, len: usize },

    #[error("data offset {0:#x} is not supported by this transfer")]
    Offset(u32),

    #[error("request and response payloads are mutually exclusive")]
    Bidirectional,

    #[error("maximum message size {0} cannot carry a data transfer")]
    MessageSize(usize),

    #[error("no such endpoint")]
    UnknownEndpoint,

    #[error("no such controller {0}")]
    UnknownController(u16),

    #[error("controller {0} is already open")]
    ControllerOpen(u16),

    #[error("endpoint still has {0} open controllers")]
    ControllersOutstanding(usize),

    #[error("topology table is full")]
    TableFull,
}

impl From<Precondition> for Error {
    fn from(value: Precondition) -> Self {
        Self::Precondition(value)
    }
}

impl From<Framing> for Error {
    fn from(value: Framing) -> Self {
        Self::Framing(value)
    }
}

impl From<Violation> for Error {
    fn from(value: Violation) -> Self {
        Self::Protocol(value)
    }
}

impl From<DekuError> for Error {
    fn from(err: DekuError) -> Self {
        debug!("Codec operation failed: {err}");
        Self::Framing(Framing::Decode)
    }
}
