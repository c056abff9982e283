// SPDX-License-Identifier: GPL-3.0-only
/*
 * Copyright (c) 2025 Code Construct
 */
//! Moving one logical command through a transport of bounded message size.
//!
//! Admin commands address their data with DOFF/DLEN, so a large response is
//! fetched as a sequence of windows, each its own request/response
//! exchange. Management commands have no offset field and must complete in
//! a single exchange.

use flagset::FlagSet;
use log::Level;

use super::{
    AdminCommandFlags, AdminRequestHeader, AdminResponseHeader, MAX_DATA_LEN, MIC_LEN,
    MSGTYPE_NVME, MessageHeader, MessageType, MiRequestHeader, MiResponseHeader, WireHeader, mic,
};
use crate::topology::{Accommodation, Endpoint, diag};
use crate::transport::Transport;
use crate::{Error, Framing, Precondition, Status, Violation};

// Generic header, the largest response header, data and MIC
const RESPONSE_BUF_LEN: usize = 4 + 16 + MAX_DATA_LEN + MIC_LEN;

// Generic header and the largest request header
const REQUEST_HEADER_BUF_LEN: usize = 4 + 64;

/// A command header that can be sent to an endpoint.
pub trait RequestHeader: WireHeader + Clone {
    /// The header shape the endpoint answers with
    type Response: WireHeader;

    /// Message type carried in the generic header
    const NMIMT: MessageType;

    /// Whether the header carries a data offset, allowing responses to be
    /// split over several exchanges
    const WINDOWED: bool;

    /// Describe the data window `[offset, offset + len)` in the header.
    fn set_window(&mut self, offset: u32, len: u32, accommodations: FlagSet<Accommodation>);
}

impl RequestHeader for MiRequestHeader {
    type Response = MiResponseHeader;
    const NMIMT: MessageType = MessageType::NvmeMiCommand;
    const WINDOWED: bool = false;

    fn set_window(&mut self, _offset: u32, _len: u32, _acc: FlagSet<Accommodation>) {}
}

impl RequestHeader for AdminRequestHeader {
    type Response = AdminResponseHeader;
    const NMIMT: MessageType = MessageType::NvmeAdminCommand;
    const WINDOWED: bool = true;

    fn set_window(&mut self, offset: u32, len: u32, accommodations: FlagSet<Accommodation>) {
        self.doff = offset;
        self.dlen = len;

        let mut flags = FlagSet::<AdminCommandFlags>::default();
        if accommodations.contains(Accommodation::AdminFlags) {
            if len != 0 {
                flags |= AdminCommandFlags::Dlv;
            }
            if offset != 0 {
                flags |= AdminCommandFlags::Dov;
            }
        }
        self.flags = flags.bits();
    }
}

/// A contiguous range of a logical transfer moved by one exchange.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Window {
    pub offset: u32,
    pub len: u32,
}

/// Splits `[offset, offset + len)` into ascending, contiguous windows of at
/// most `max` bytes. A zero length transfer is a single empty window.
#[derive(Clone, Debug)]
pub struct Windows {
    next: u64,
    end: u64,
    max: u64,
    empty: bool,
}

impl Windows {
    pub fn new(offset: u32, len: u32, max: u32) -> Self {
        Self {
            next: offset as u64,
            end: offset as u64 + len as u64,
            max: max.max(1) as u64,
            empty: len == 0,
        }
    }
}

impl Iterator for Windows {
    type Item = Window;

    fn next(&mut self) -> Option<Window> {
        if self.empty {
            self.empty = false;
            return Some(Window {
                offset: u32::try_from(self.next).ok()?,
                len: 0,
            });
        }

        if self.next >= self.end {
            return None;
        }

        let len = (self.end - self.next).min(self.max);
        let w = Window {
            offset: u32::try_from(self.next).ok()?,
            len: u32::try_from(len).ok()?,
        };
        self.next += len;
        Some(w)
    }
}

impl<T: Transport> Endpoint<T> {
    /// Execute one logical command.
    ///
    /// Sends `req` with the optional request payload `req_data`, or fetches
    /// the `len` byte response window starting at data offset `offset` into
    /// `resp_data[..len]`. The header of the last response received is
    /// stored in `resp`. Returns the number of response payload bytes
    /// received.
    ///
    /// On failure `resp_data` holds the windows validated so far and is
    /// untouched past them.
    pub fn execute<H: RequestHeader>(
        &mut self,
        req: &H,
        req_data: &[u8],
        resp: &mut H::Response,
        resp_data: &mut [u8],
        offset: u32,
        len: usize,
    ) -> Result<usize, Error> {
        if len > resp_data.len() {
            return Err(Precondition::BufferTooSmall {
                capacity: resp_data.len(),
                len,
            }
            .into());
        }

        if !req_data.is_empty() && len != 0 {
            return Err(Precondition::Bidirectional.into());
        }

        let req_max = (self.max_msg - (MessageHeader::LEN + H::LEN + MIC_LEN)).min(MAX_DATA_LEN);
        if req_data.len() > req_max {
            return Err(Precondition::PayloadTooLarge {
                len: req_data.len(),
                max: req_max,
            }
            .into());
        }

        let Some(len32) = u32::try_from(len)
            .ok()
            .filter(|l| offset.checked_add(*l).is_some())
        else {
            return Err(Precondition::WindowOverflow {
                offset: offset as u64,
                len,
            }
            .into());
        };

        if len == 0 && offset != 0 {
            return Err(Precondition::Offset(offset).into());
        }

        if H::WINDOWED {
            if offset & 3 != 0 {
                return Err(Precondition::Misaligned(offset as u64).into());
            }
        } else {
            if offset != 0 {
                return Err(Precondition::Offset(offset).into());
            }
            if len > self.max_payload {
                return Err(Precondition::PayloadTooLarge {
                    len,
                    max: self.max_payload,
                }
                .into());
            }
        }

        if !req_data.is_empty() {
            let mut hdr = req.clone();
            // Checked against req_max above
            hdr.set_window(0, req_data.len() as u32, self.accommodations);
            return self.exchange(&hdr, req_data, resp, &mut [], 0);
        }

        let mut total = 0;
        for w in Windows::new(offset, len32, self.max_payload as u32) {
            let mut hdr = req.clone();
            hdr.set_window(w.offset, w.len, self.accommodations);

            let start = (w.offset - offset) as usize;
            let dst = &mut resp_data[start..start + w.len as usize];
            let expected = if H::WINDOWED { w.len as usize } else { 0 };

            total += self.exchange(&hdr, &[], resp, dst, expected)?;
        }

        Ok(total)
    }

    /// One request/response exchange. For windowed shapes `dst` must be
    /// filled exactly when `exact` is its length.
    fn exchange<H: RequestHeader>(
        &mut self,
        req: &H,
        req_data: &[u8],
        resp: &mut H::Response,
        dst: &mut [u8],
        exact: usize,
    ) -> Result<usize, Error> {
        let mh = MessageHeader::request(H::NMIMT);
        let mut hbuf = [0u8; REQUEST_HEADER_BUF_LEN];
        let mut hlen = mh.encode_into(&mut hbuf)?;
        hlen += req.encode_into(&mut hbuf[hlen..])?;
        let hbuf = &hbuf[..hlen];
        let req_mic = mic(&[hbuf, req_data]);

        diag!(
            self,
            Level::Trace,
            "Sending {} byte request with {} data bytes to {:?}",
            hlen + MIC_LEN,
            req_data.len(),
            self.addr
        );

        let mut rbuf = [0u8; RESPONSE_BUF_LEN];
        let rlen = self
            .link
            .send_and_receive(&self.addr, &[hbuf, req_data, &req_mic], &mut rbuf)
            .inspect_err(|e| diag!(self, Level::Warn, "Exchange with {:?} failed: {e}", self.addr))?;

        let Some(rx) = rbuf.get(..rlen) else {
            return Err(Violation::Length {
                expected: RESPONSE_BUF_LEN,
                found: rlen,
            }
            .into());
        };

        let payload = self.validate::<H>(rx, &mh, resp)?;

        if payload.len() > dst.len() {
            diag!(
                self,
                Level::Debug,
                "Response payload of {} bytes exceeds window of {}",
                payload.len(),
                dst.len()
            );
            return Err(Violation::Length {
                expected: dst.len(),
                found: payload.len(),
            }
            .into());
        }

        if H::WINDOWED && payload.len() != exact {
            diag!(
                self,
                Level::Debug,
                "Short response payload: {} of {} bytes",
                payload.len(),
                exact
            );
            return Err(Violation::Length {
                expected: exact,
                found: payload.len(),
            }
            .into());
        }

        dst[..payload.len()].copy_from_slice(payload);
        Ok(payload.len())
    }

    fn validate<'r, H: RequestHeader>(
        &self,
        rx: &'r [u8],
        sent: &MessageHeader,
        resp: &mut H::Response,
    ) -> Result<&'r [u8], Error> {
        if rx.len() < MessageHeader::LEN + MIC_LEN {
            return Err(Framing::Short {
                need: MessageHeader::LEN + MIC_LEN,
                found: rx.len(),
            }
            .into());
        }

        let (msg, rx_mic) = rx.split_at(rx.len() - MIC_LEN);
        if mic(&[msg]) != rx_mic {
            diag!(self, Level::Debug, "Integrity check failed on response from {:?}", self.addr);
            return Err(Framing::Integrity.into());
        }

        let mh = MessageHeader::decode(msg)?;
        if mh.typ != MSGTYPE_NVME {
            return Err(Violation::MessageType {
                expected: MSGTYPE_NVME,
                found: mh.typ,
            }
            .into());
        }

        if !mh.ror() {
            return Err(Violation::NotResponse.into());
        }

        let nmimt = (mh.nmp >> 3) & 0xf;
        if nmimt != H::NMIMT as u8 {
            return Err(Violation::Nmimt {
                expected: H::NMIMT as u8,
                found: nmimt,
            }
            .into());
        }

        if mh.csi() != sent.csi() {
            return Err(Violation::CommandSlot.into());
        }

        let body = &msg[MessageHeader::LEN..];
        match body.first() {
            Some(&0) | None => (),
            Some(&status) => {
                diag!(self, Level::Debug, "Endpoint {:?} reported status {status:#04x}", self.addr);
                return Err(Error::Status(Status::new(status)));
            }
        }

        *resp = H::Response::decode(body)?;
        Ok(&body[H::Response::LEN..])
    }
}
