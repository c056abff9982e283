// SPDX-License-Identifier: GPL-3.0-only
/*
 * Copyright (c) 2025 Code Construct
 */
//! NVMe admin commands tunnelled to a controller behind the endpoint.

use log::Level;

use super::{AdminRequestHeader, AdminResponseHeader, MAX_DATA_LEN};
use crate::nvme::{
    AdminOpcode, CNSSPECID_NONE, CNTLID_NONE, CommandSetIdentifier, ControllerList,
    IDENTIFY_DATA_SIZE, IdentifyCns, NSID_NONE, UUID_NONE,
};
use crate::topology::{AdminChannel, diag};
use crate::transport::Transport;
use crate::{Error, Precondition, Violation};

/// Default number of bytes fetched by each Get Log Page command
pub const LOG_CHUNK_SIZE: usize = 4096;

/// Selectors for an Identify command.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct IdentifyArgs {
    pub cns: u8,
    pub nsid: u32,
    pub cntid: u16,
    pub cnssid: u16,
    pub csi: u8,
    pub uuidx: u8,
}

impl IdentifyArgs {
    /// Select `cns` with every other selector unset.
    pub fn new(cns: IdentifyCns) -> Self {
        Self {
            cns: cns.into(),
            nsid: NSID_NONE,
            cntid: CNTLID_NONE,
            cnssid: CNSSPECID_NONE,
            csi: CommandSetIdentifier::Nvm.into(),
            uuidx: UUID_NONE,
        }
    }

    pub fn cns_nsid(cns: IdentifyCns, nsid: u32) -> Self {
        Self {
            nsid,
            ..Self::new(cns)
        }
    }

    pub fn ctrl() -> Self {
        Self::new(IdentifyCns::IdentifyController)
    }

    /// Controllers in the subsystem with ids of at least `cntid`
    pub fn ctrl_list(cntid: u16) -> Self {
        Self {
            cntid,
            ..Self::new(IdentifyCns::NvmSubsystemControllerList)
        }
    }

    pub fn builder(cns: IdentifyCns) -> IdentifyArgsBuilder {
        IdentifyArgsBuilder {
            args: Self::new(cns),
        }
    }

    fn header(&self) -> AdminRequestHeader {
        AdminRequestHeader {
            cdw1: self.nsid,
            cdw10: (self.cntid as u32) << 16 | self.cns as u32,
            cdw11: (self.csi as u32) << 24 | self.cnssid as u32,
            cdw14: (self.uuidx & 0x7f) as u32,
            ..AdminRequestHeader::new(AdminOpcode::Identify)
        }
    }
}

pub struct IdentifyArgsBuilder {
    args: IdentifyArgs,
}

impl IdentifyArgsBuilder {
    pub fn nsid(&mut self, nsid: u32) -> &mut Self {
        self.args.nsid = nsid;
        self
    }

    pub fn cntid(&mut self, cntid: u16) -> &mut Self {
        self.args.cntid = cntid;
        self
    }

    pub fn cnssid(&mut self, cnssid: u16) -> &mut Self {
        self.args.cnssid = cnssid;
        self
    }

    pub fn csi(&mut self, csi: CommandSetIdentifier) -> &mut Self {
        self.args.csi = csi.into();
        self
    }

    pub fn uuidx(&mut self, uuidx: u8) -> &mut Self {
        self.args.uuidx = uuidx;
        self
    }

    pub fn build(&self) -> IdentifyArgs {
        self.args
    }
}

/// Parameters for Get Log Page.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct GetLogArgs {
    pub lid: u8,
    pub nsid: u32,
    pub lsp: u8,
    pub lsi: u16,
    /// Log page offset of the first byte requested
    pub lpo: u64,
    /// Retain asynchronous events after the final chunk too
    pub rae: bool,
    pub csi: u8,
    pub ot: bool,
    pub uuidx: u8,
    /// Bytes fetched per command. Some logs must be read in smaller pieces
    /// to stay consistent.
    pub chunk_size: usize,
}

impl GetLogArgs {
    pub fn new(lid: impl Into<u8>) -> Self {
        Self {
            lid: lid.into(),
            nsid: NSID_NONE,
            lsp: 0,
            lsi: 0,
            lpo: 0,
            rae: false,
            csi: CommandSetIdentifier::Nvm.into(),
            ot: false,
            uuidx: UUID_NONE,
            chunk_size: LOG_CHUNK_SIZE,
        }
    }

    fn header(&self, lpo: u64, len: usize, rae: bool) -> AdminRequestHeader {
        let numd = (len / 4 - 1) as u32;
        AdminRequestHeader {
            cdw1: self.nsid,
            cdw10: (numd & 0xffff) << 16
                | (rae as u32) << 15
                | ((self.lsp & 0x7f) as u32) << 8
                | self.lid as u32,
            cdw11: (self.lsi as u32) << 16 | numd >> 16,
            cdw12: lpo as u32,
            cdw13: (lpo >> 32) as u32,
            cdw14: (self.csi as u32) << 24 | (self.ot as u32) << 23 | (self.uuidx & 0x7f) as u32,
            ..AdminRequestHeader::new(AdminOpcode::GetLogPage)
        }
    }
}

/// Security protocol selectors shared by Security Send and Receive.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct SecurityArgs {
    pub nsid: u32,
    pub secp: u8,
    pub spsp: u16,
    pub nssf: u8,
}

impl SecurityArgs {
    fn header(&self, opcode: AdminOpcode, len: usize) -> AdminRequestHeader {
        AdminRequestHeader {
            cdw1: self.nsid,
            cdw10: (self.secp as u32) << 24 | (self.spsp as u32) << 8 | self.nssf as u32,
            cdw11: len as u32,
            ..AdminRequestHeader::new(opcode)
        }
    }
}

impl<T: Transport> AdminChannel<'_, T> {
    /// Issue an arbitrary admin command to this controller. The controller
    /// id of `req` is replaced with the channel's.
    pub fn admin_xfer(
        &mut self,
        req: &AdminRequestHeader,
        req_data: &[u8],
        resp: &mut AdminResponseHeader,
        resp_data: &mut [u8],
        offset: u32,
        len: usize,
    ) -> Result<usize, Error> {
        let hdr = AdminRequestHeader {
            ctrl_id: self.ctrl_id,
            ..*req
        };
        self.ep.execute(&hdr, req_data, resp, resp_data, offset, len)
    }

    /// Fetch `[offset, offset + len)` of an Identify data structure into
    /// `data[..len]`, returning completion dword 0.
    pub fn identify_partial(
        &mut self,
        args: &IdentifyArgs,
        data: &mut [u8],
        offset: usize,
        len: usize,
    ) -> Result<u32, Error> {
        offset
            .checked_add(len)
            .filter(|e| *e <= IDENTIFY_DATA_SIZE)
            .ok_or(Precondition::WindowOverflow {
                offset: offset as u64,
                len,
            })?;

        let capacity = data.len();
        let Some(dst) = data.get_mut(..len) else {
            return Err(Precondition::BufferTooSmall { capacity, len }.into());
        };

        let mut resp = AdminResponseHeader::default();
        let n = self.admin_xfer(&args.header(), &[], &mut resp, dst, offset as u32, len)?;
        if n != len {
            return Err(Violation::Length {
                expected: len,
                found: n,
            }
            .into());
        }

        Ok(resp.cdw0)
    }

    pub fn identify(
        &mut self,
        args: &IdentifyArgs,
        data: &mut [u8; IDENTIFY_DATA_SIZE],
    ) -> Result<u32, Error> {
        self.identify_partial(args, data, 0, IDENTIFY_DATA_SIZE)
    }

    pub fn identify_cns_nsid(
        &mut self,
        cns: IdentifyCns,
        nsid: u32,
        data: &mut [u8; IDENTIFY_DATA_SIZE],
    ) -> Result<u32, Error> {
        self.identify(&IdentifyArgs::cns_nsid(cns, nsid), data)
    }

    pub fn identify_ctrl(&mut self, data: &mut [u8; IDENTIFY_DATA_SIZE]) -> Result<u32, Error> {
        self.identify(&IdentifyArgs::ctrl(), data)
    }

    pub fn identify_ctrl_list(&mut self, cntid: u16) -> Result<ControllerList, Error> {
        let mut data = [0u8; IDENTIFY_DATA_SIZE];
        self.identify(&IdentifyArgs::ctrl_list(cntid), &mut data)?;
        ControllerList::decode(&data)
    }

    /// Read a log page into `data`, one Get Log Page command per
    /// `args.chunk_size` bytes.
    pub fn get_log_page(&mut self, args: &GetLogArgs, data: &mut [u8]) -> Result<usize, Error> {
        let len = data.len();
        if len == 0 || len % 4 != 0 {
            return Err(Precondition::InvalidLength(len).into());
        }

        if args.chunk_size == 0 || args.chunk_size % 4 != 0 {
            return Err(Precondition::InvalidLength(args.chunk_size).into());
        }

        if args.lpo % 4 != 0 {
            return Err(Precondition::Misaligned(args.lpo).into());
        }

        if args.lpo.checked_add(len as u64).is_none() {
            return Err(Precondition::WindowOverflow {
                offset: args.lpo,
                len,
            }
            .into());
        }

        let mut xfered = 0;
        while xfered < len {
            let n = args.chunk_size.min(len - xfered);
            let last = xfered + n == len;
            let lpo = args.lpo + xfered as u64;

            diag!(
                self.ep,
                Level::Debug,
                "Get Log Page {:#04x}: {n} bytes at offset {lpo:#x}",
                args.lid
            );

            let hdr = args.header(lpo, n, args.rae || !last);
            let mut resp = AdminResponseHeader::default();
            let got = self.admin_xfer(&hdr, &[], &mut resp, &mut data[xfered..xfered + n], 0, n)?;
            if got != n {
                return Err(Violation::Length {
                    expected: n,
                    found: got,
                }
                .into());
            }
            xfered += n;
        }

        Ok(xfered)
    }

    /// Send `data` to a security protocol, returning completion dword 0.
    pub fn security_send(&mut self, args: &SecurityArgs, data: &[u8]) -> Result<u32, Error> {
        if data.len() > MAX_DATA_LEN {
            return Err(Precondition::PayloadTooLarge {
                len: data.len(),
                max: MAX_DATA_LEN,
            }
            .into());
        }

        let hdr = args.header(AdminOpcode::SecuritySend, data.len());
        let mut resp = AdminResponseHeader::default();
        self.admin_xfer(&hdr, data, &mut resp, &mut [], 0, 0)?;
        Ok(resp.cdw0)
    }

    /// Receive `data.len()` bytes from a security protocol.
    pub fn security_recv(&mut self, args: &SecurityArgs, data: &mut [u8]) -> Result<usize, Error> {
        let len = data.len();
        let max = MAX_DATA_LEN.min(self.ep.max_payload);
        if len > max {
            return Err(Precondition::PayloadTooLarge { len, max }.into());
        }

        let hdr = args.header(AdminOpcode::SecurityReceive, len);
        let mut resp = AdminResponseHeader::default();
        self.admin_xfer(&hdr, &[], &mut resp, data, 0, len)
    }
}
