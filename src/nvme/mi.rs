// SPDX-License-Identifier: GPL-3.0-only
/*
 * Copyright (c) 2025 Code Construct
 */
//! NVMe-MI message formats.
//!
//! Every message starts with the 4 byte [`MessageHeader`] and ends with a
//! 4 byte message integrity check. Between the two sits a command header,
//! one of the management ([`MiRequestHeader`], [`MiResponseHeader`]) or
//! admin ([`AdminRequestHeader`], [`AdminResponseHeader`]) shapes, followed
//! by any payload.
//!
//! The header layouts are declared with deku and are little-endian and
//! packed regardless of host.

pub mod admin;
pub mod mgmt;
pub mod xfer;

use deku::ctx::Endian;
use deku::{DekuContainerRead, DekuRead, DekuWrite};
use flagset::{FlagSet, flags};
use num_derive::FromPrimitive;

use crate::wire::WireFlagSet;
use crate::wire::WireVec;
use crate::{Encode, Error, Framing, Precondition};

/// MCTP message type byte for NVMe-MI: NVMe (0x04) with the integrity check
/// bit (0x80) set
pub const MSGTYPE_NVME: u8 = 0x80 | mctp::MCTP_TYPE_NVME.0;

/// Length of the message integrity check trailing every message
pub const MIC_LEN: usize = 4;

/// Upper bound on DLEN for a single exchange
pub const MAX_DATA_LEN: usize = 4096;

const ISCSI: crc::Crc<u32> = crc::Crc::<u32>::new(&crc::CRC_32_ISCSI);

/// Compute the message integrity check over the concatenation of `bufs`.
pub fn mic(bufs: &[&[u8]]) -> [u8; MIC_LEN] {
    let mut digest = ISCSI.digest();
    for s in bufs {
        digest.update(s);
    }
    digest.finalize().to_le_bytes()
}

/// A fixed-size header shape.
pub trait WireHeader: Sized {
    /// Encoded length in bytes
    const LEN: usize;

    /// Write the header to the front of `buf`, returning [`Self::LEN`].
    fn encode_into(&self, buf: &mut [u8]) -> Result<usize, Error>;

    /// Decode the header from the front of `buf`. Bytes past
    /// [`Self::LEN`] are not examined.
    fn decode(buf: &[u8]) -> Result<Self, Error>;
}

macro_rules! wire_header {
    ($ty:ty, $len:literal) => {
        impl Encode<$len> for $ty {}

        impl WireHeader for $ty {
            const LEN: usize = $len;

            fn encode_into(&self, buf: &mut [u8]) -> Result<usize, Error> {
                let capacity = buf.len();
                let Some(dst) = buf.get_mut(..$len) else {
                    return Err(Precondition::BufferTooSmall { capacity, len: $len }.into());
                };
                dst.copy_from_slice(&Encode::<$len>::encode(self)?);
                Ok($len)
            }

            fn decode(buf: &[u8]) -> Result<Self, Error> {
                if buf.len() < $len {
                    return Err(Framing::Short {
                        need: $len,
                        found: buf.len(),
                    }
                    .into());
                }
                let (_, hdr) = <$ty>::from_bytes((&buf[..$len], 0))?;
                Ok(hdr)
            }
        }
    };
}

// MI v2.0, 3.1.1, Figure 20, NMIMT
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum MessageType {
    ControlPrimitive = 0x00,
    NvmeMiCommand = 0x01,
    NvmeAdminCommand = 0x02,
    PcieCommand = 0x04,
    AsynchronousEvent = 0x05,
}

impl TryFrom<u8> for MessageType {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, u8> {
        match value {
            0x00 => Ok(Self::ControlPrimitive),
            0x01 => Ok(Self::NvmeMiCommand),
            0x02 => Ok(Self::NvmeAdminCommand),
            0x04 => Ok(Self::PcieCommand),
            0x05 => Ok(Self::AsynchronousEvent),
            _ => Err(value),
        }
    }
}

// MI v2.0, 3.1.1, Figure 20
#[derive(Clone, Copy, Debug, DekuRead, DekuWrite, Eq, PartialEq)]
#[deku(endian = "little")]
pub struct MessageHeader {
    pub typ: u8,
    pub nmp: u8,
    #[deku(pad_bytes_after = "1")]
    pub meb: u8,
}
wire_header!(MessageHeader, 4);

impl MessageHeader {
    pub fn request(nmimt: MessageType) -> Self {
        Self {
            typ: MSGTYPE_NVME,
            nmp: (nmimt as u8 & 0xf) << 3,
            meb: 0,
        }
    }

    pub fn respond(nmimt: MessageType) -> Self {
        Self {
            typ: MSGTYPE_NVME,
            nmp: ((true as u8) << 7) | ((nmimt as u8 & 0xf) << 3),
            meb: 0,
        }
    }

    pub fn nmimt(&self) -> Result<MessageType, u8> {
        ((self.nmp >> 3) & 0xf).try_into()
    }

    pub fn csi(&self) -> bool {
        (self.nmp & 0x01) != 0
    }

    pub fn ror(&self) -> bool {
        (self.nmp & 0x80) != 0
    }
}

// MI v2.0, 4.1.2, Figure 29
#[derive(Clone, Copy, Debug, Eq, FromPrimitive, PartialEq)]
#[repr(u8)]
pub enum ResponseStatus {
    Success = 0x00,
    MoreProcessingRequired = 0x01,
    InternalError = 0x02,
    InvalidCommandOpcode = 0x03,
    InvalidParameter = 0x04,
    InvalidCommandSize = 0x05,
    InvalidCommandInputDataSize = 0x06,
    AccessDenied = 0x07,
    VpdUpdatesExceeded = 0x20,
    PcieInaccessible = 0x21,
    ManagementEndpointBufferCleared = 0x22,
    EnclosureServicesFailure = 0x23,
    EnclosureServicesTransferFailure = 0x24,
    EnclosureFailure = 0x25,
    EnclosureServicesTransferRefused = 0x26,
    UnsupportedEnclosureFunction = 0x27,
    EnclosureServicesNotAvailable = 0x28,
    EnclosureDegrade = 0x29,
    SanitizeInProgress = 0x2a,
}

// MI v2.0, 5, Figure 68
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum MiOpcode {
    ReadNvmeMiDataStructure = 0x00,
    NvmSubsystemHealthStatusPoll = 0x01,
    ControllerHealthStatusPoll = 0x02,
    ConfigurationSet = 0x03,
    ConfigurationGet = 0x04,
}

// MI v2.0, 5, Figure 67
#[derive(Clone, Copy, Debug, Default, DekuRead, DekuWrite, Eq, PartialEq)]
#[deku(endian = "little")]
pub struct MiRequestHeader {
    pub opcode: u8,
    #[deku(pad_bytes_before = "3")]
    pub cdw0: u32,
    pub cdw1: u32,
}
wire_header!(MiRequestHeader, 12);

impl MiRequestHeader {
    pub fn new(opcode: MiOpcode, cdw0: u32, cdw1: u32) -> Self {
        Self {
            opcode: opcode as u8,
            cdw0,
            cdw1,
        }
    }
}

// MI v2.0, 5, Figure 71
#[derive(Clone, Copy, Debug, Default, DekuRead, DekuWrite, Eq, PartialEq)]
#[deku(endian = "little")]
pub struct MiResponseHeader {
    pub status: u8,
    pub nmresp: [u8; 3],
}
wire_header!(MiResponseHeader, 4);

impl MiResponseHeader {
    /// Response Data Length, for Read NVMe-MI Data Structure
    pub fn rdl(&self) -> u16 {
        u16::from_le_bytes([self.nmresp[0], self.nmresp[1]])
    }
}

// MI v1.1, 6, Figure 110, CFLGS
flags! {
    pub enum AdminCommandFlags: u8 {
        Dlv = 1 << 0,
        Dov = 1 << 1,
    }
}

// MI v2.0, 6, Figure 136
#[derive(Clone, Copy, Debug, Default, DekuRead, DekuWrite, Eq, PartialEq)]
#[deku(endian = "little")]
pub struct AdminRequestHeader {
    pub opcode: u8,
    pub flags: u8,
    pub ctrl_id: u16,
    pub cdw1: u32,
    pub cdw2: u32,
    pub cdw3: u32,
    pub cdw4: u32,
    pub cdw5: u32,
    pub doff: u32,
    #[deku(pad_bytes_after = "8")]
    pub dlen: u32,
    pub cdw10: u32,
    pub cdw11: u32,
    pub cdw12: u32,
    pub cdw13: u32,
    pub cdw14: u32,
    pub cdw15: u32,
}
wire_header!(AdminRequestHeader, 64);

impl AdminRequestHeader {
    pub fn new(opcode: impl Into<u8>) -> Self {
        Self {
            opcode: opcode.into(),
            ..Default::default()
        }
    }

    pub fn cflgs(&self) -> FlagSet<AdminCommandFlags> {
        FlagSet::new_truncated(self.flags)
    }
}

// MI v2.0, 6, Figure 138
#[derive(Clone, Copy, Debug, Default, DekuRead, DekuWrite, Eq, PartialEq)]
#[deku(endian = "little")]
pub struct AdminResponseHeader {
    pub status: u8,
    #[deku(pad_bytes_before = "3")]
    pub cdw0: u32,
    pub cdw1: u32,
    pub cdw3: u32,
}
wire_header!(AdminResponseHeader, 16);

// MI v2.0, 5.7, Figure 109, DTYP
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum DataStructureType {
    NvmSubsystemInformation = 0x00,
    PortInformation = 0x01,
    ControllerList = 0x02,
    ControllerInformation = 0x03,
    OptionallySupportedCommandList = 0x04,
    ManagementEndpointBufferCommandSupportList = 0x05,
}

impl DataStructureType {
    /// Length of the structure when the layout fixes it
    pub fn fixed_len(&self) -> Option<usize> {
        match self {
            Self::NvmSubsystemInformation
            | Self::PortInformation
            | Self::ControllerInformation => Some(32),
            Self::ControllerList
            | Self::OptionallySupportedCommandList
            | Self::ManagementEndpointBufferCommandSupportList => None,
        }
    }
}

// MI v2.0, 5.7, Figure 109
/// Selects the data structure returned by Read NVMe-MI Data Structure.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct DataStructureRequest {
    pub dtyp: DataStructureType,
    pub portid: u8,
    pub ctrlid: u16,
    pub iocsi: u8,
}

impl DataStructureRequest {
    pub fn new(dtyp: DataStructureType) -> Self {
        Self {
            dtyp,
            portid: 0,
            ctrlid: 0,
            iocsi: 0,
        }
    }

    pub fn cdw0(&self) -> u32 {
        (self.dtyp as u32) << 24 | (self.portid as u32) << 16 | self.ctrlid as u32
    }

    pub fn cdw1(&self) -> u32 {
        self.iocsi as u32
    }
}

// MI v2.0, 5.7.1, Figure 112
#[derive(Clone, Copy, Debug, DekuRead, Default, Eq, PartialEq)]
#[deku(endian = "little")]
pub struct SubsystemInfo {
    pub nump: u8,
    pub mjr: u8,
    pub mnr: u8,
    pub nnsc: u8,
}

// MI v2.0, 5.7.2, Figure 114, PRTTYP
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum PortType {
    Inactive = 0x00,
    Pcie = 0x01,
    TwoWire = 0x02,
}

// MI v2.0, 5.7.2, Figure 114
#[derive(Clone, Copy, Debug, DekuRead, Eq, PartialEq)]
#[deku(endian = "little")]
pub struct PortInfo {
    pub prttyp: u8,
    pub prtcap: u8,
    pub mmtus: u16,
    pub mebs: u32,
    #[deku(ctx = "*prttyp")]
    pub data: PortData,
}

impl PortInfo {
    pub fn port_type(&self) -> PortType {
        match self.data {
            PortData::Inactive => PortType::Inactive,
            PortData::Pcie(_) => PortType::Pcie,
            PortData::TwoWire(_) => PortType::TwoWire,
        }
    }
}

#[derive(Clone, Copy, Debug, DekuRead, Eq, PartialEq)]
#[deku(ctx = "endian: Endian, prttyp: u8", id = "prttyp", endian = "endian")]
#[repr(u8)]
pub enum PortData {
    #[deku(id = "0x00")]
    Inactive,
    #[deku(id = "0x01")]
    Pcie(PciePortData),
    #[deku(id = "0x02")]
    TwoWire(TwoWirePortData),
}

// MI v2.0, 5.7.2, Figure 115
#[derive(Clone, Copy, Debug, DekuRead, Eq, PartialEq)]
#[deku(ctx = "endian: Endian", endian = "endian")]
pub struct PciePortData {
    pub pciemps: u8,
    pub pcieslsv: u8,
    pub pciecls: u8,
    pub pciemlw: u8,
    pub pcienlw: u8,
    pub pciepn: u8,
}

// MI v2.0, 5.7.2, Figure 116
#[derive(Clone, Copy, Debug, DekuRead, Eq, PartialEq)]
#[deku(ctx = "endian: Endian", endian = "endian")]
pub struct TwoWirePortData {
    pub cvpdaddr: u8,
    pub mvpdfreq: u8,
    pub cmeaddr: u8,
    pub twprt: u8,
    pub nvmebm: u8,
}

// MI v2.0, 5.7.4, Figure 117
#[derive(Clone, Copy, Debug, DekuRead, Default, Eq, PartialEq)]
#[deku(endian = "little")]
pub struct ControllerInfo {
    #[deku(pad_bytes_after = "4")]
    pub portid: u8,
    pub prii: u8,
    pub pri: u16,
    pub pcivid: u16,
    pub pcidid: u16,
    pub pcisvid: u16,
    pub pcisdid: u16,
    pub pciesn: u8,
}

// MI v2.0, 5.7.5, Figure 119
#[derive(Clone, Copy, Debug, DekuRead, Default, Eq, PartialEq)]
#[deku(ctx = "endian: Endian", endian = "endian")]
pub struct SupportedCommand {
    pub cmdtype: u8,
    pub opc: u8,
}

/// Largest number of entries in a command support list
pub const MAX_SUPPORTED_COMMANDS: usize = 2047;

// MI v2.0, 5.7.5, Figure 118
// MI v2.0, 5.7.6, Figure 120
#[derive(Clone, Debug, DekuRead, Default, Eq, PartialEq)]
#[deku(endian = "little")]
pub struct SupportedCommandList {
    numcmd: u16,
    #[deku(count = "numcmd")]
    cmds: WireVec<SupportedCommand, MAX_SUPPORTED_COMMANDS>,
}

impl SupportedCommandList {
    pub fn commands(&self) -> &[SupportedCommand] {
        self.cmds.as_slice()
    }
}

// MI v2.0, 5.6, Figure 107
flags! {
    #[repr(u16)]
    pub enum CompositeControllerStatusFlags: u16 {
        Rdy = 1 << 0,
        Cfs = 1 << 1,
        Shst = 1 << 2,
        Nssro = 1 << 4,
        Ceco = 1 << 5,
        Nac = 1 << 6,
        Fa = 1 << 7,
        Csts = 1 << 8,
        Ctemp = 1 << 9,
        Pdlu = 1 << 10,
        Spare = 1 << 11,
        Cwarn = 1 << 12,
        Tcida = 1 << 13,
    }
}

/// Length of the NVM Subsystem Health Data Structure plus the Composite
/// Controller Status
pub const SUBSYSTEM_HEALTH_LEN: usize = 8;

// MI v2.0, 5.6, Figure 108
#[derive(Clone, Copy, Debug, DekuRead, Default, Eq, PartialEq)]
#[deku(endian = "little")]
pub struct SubsystemHealthStatus {
    pub nss: u8,
    pub sw: u8,
    pub ctemp: u8,
    pub pdlu: u8,
    ccs: WireFlagSet<CompositeControllerStatusFlags>,
}

impl SubsystemHealthStatus {
    pub fn ccs(&self) -> FlagSet<CompositeControllerStatusFlags> {
        self.ccs.0
    }

    /// Composite temperature in degrees Celsius
    pub fn temperature(&self) -> i8 {
        self.ctemp as i8
    }
}

// MI v2.0, 5.1, Figure 75
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum ConfigurationIdentifier {
    SmbusI2cFrequency = 0x01,
    HealthStatusChange = 0x02,
    MctpTransmissionUnitSize = 0x03,
}

// MI v2.0, Figure 116, MVPDFREQ
#[derive(Clone, Copy, Debug, Eq, FromPrimitive, Ord, PartialEq, PartialOrd)]
#[repr(u8)]
pub enum SmbusFrequency {
    FreqNotSupported = 0x00,
    Freq100Khz = 0x01,
    Freq400Khz = 0x02,
    Freq1Mhz = 0x03,
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn message_header_layout() {
        let mh = MessageHeader::request(MessageType::NvmeAdminCommand);
        let mut buf = [0xffu8; 4];
        assert_eq!(mh.encode_into(&mut buf), Ok(4));
        assert_eq!(buf, [0x84, 0x10, 0x00, 0x00]);

        let rh = MessageHeader::respond(MessageType::NvmeMiCommand);
        assert_eq!(rh.encode().unwrap(), [0x84, 0x88, 0x00, 0x00]);
        assert!(rh.ror());
        assert!(!rh.csi());
        assert_eq!(rh.nmimt(), Ok(MessageType::NvmeMiCommand));
    }

    #[test]
    fn message_header_unknown_nmimt() {
        let mh = MessageHeader::decode(&[0x84, 0x98, 0x00, 0x00]).unwrap();
        assert_eq!(mh.nmimt(), Err(0x03));
    }

    #[test]
    fn mi_request_layout() {
        let hdr = MiRequestHeader::new(MiOpcode::ConfigurationGet, 0x0100_0003, 0x8000_0000);
        #[rustfmt::skip]
        let expected = [
            0x04, 0x00, 0x00, 0x00,
            0x03, 0x00, 0x00, 0x01,
            0x00, 0x00, 0x00, 0x80,
        ];
        assert_eq!(hdr.encode().unwrap(), expected);
        assert_eq!(MiRequestHeader::decode(&expected), Ok(hdr));
    }

    #[test]
    fn admin_request_layout() {
        let hdr = AdminRequestHeader {
            opcode: 0x06,
            flags: 0x03,
            ctrl_id: 0x1234,
            cdw1: 1,
            cdw2: 2,
            cdw3: 3,
            cdw4: 4,
            cdw5: 5,
            doff: 0x100,
            dlen: 0x200,
            cdw10: 10,
            cdw11: 11,
            cdw12: 12,
            cdw13: 13,
            cdw14: 14,
            cdw15: 0xffff_ffff,
        };
        let buf = hdr.encode().unwrap();
        assert_eq!(&buf[..4], &[0x06, 0x03, 0x34, 0x12]);
        assert_eq!(&buf[4..8], &[1, 0, 0, 0]);
        assert_eq!(&buf[20..24], &[5, 0, 0, 0]);
        assert_eq!(&buf[24..28], &[0x00, 0x01, 0x00, 0x00]);
        assert_eq!(&buf[28..32], &[0x00, 0x02, 0x00, 0x00]);
        assert_eq!(&buf[32..40], &[0u8; 8]);
        assert_eq!(&buf[40..44], &[10, 0, 0, 0]);
        assert_eq!(&buf[60..64], &[0xff; 4]);
        assert_eq!(AdminRequestHeader::decode(&buf), Ok(hdr));
    }

    #[test]
    fn admin_response_layout() {
        #[rustfmt::skip]
        let raw = [
            0x00, 0x00, 0x00, 0x00,
            0x78, 0x56, 0x34, 0x12,
            0x00, 0x00, 0x00, 0x00,
            0x01, 0x00, 0x00, 0x00,
        ];
        let hdr = AdminResponseHeader::decode(&raw).unwrap();
        assert_eq!(hdr.status, 0);
        assert_eq!(hdr.cdw0, 0x1234_5678);
        assert_eq!(hdr.cdw3, 1);
        assert_eq!(hdr.encode().unwrap(), raw);
    }

    #[test]
    fn short_decode() {
        assert_eq!(
            AdminResponseHeader::decode(&[0u8; 15]),
            Err(Error::Framing(Framing::Short {
                need: 16,
                found: 15
            }))
        );
        assert_eq!(
            MessageHeader::decode(&[0x84]),
            Err(Error::Framing(Framing::Short { need: 4, found: 1 }))
        );
    }

    #[test]
    fn rdl() {
        let hdr = MiResponseHeader::decode(&[0x00, 0x20, 0x00, 0x00]).unwrap();
        assert_eq!(hdr.rdl(), 32);
    }

    fn roundtrip<H: WireHeader>(hdr: &H) -> Result<H, Error> {
        let mut buf = [0u8; 64];
        let n = hdr.encode_into(&mut buf)?;
        assert_eq!(n, H::LEN);
        H::decode(&buf[..n])
    }

    #[test]
    fn header_boundaries() {
        let mh = MessageHeader {
            typ: 0xff,
            nmp: 0xff,
            meb: 0xff,
        };
        assert_eq!(roundtrip(&mh), Ok(mh));
        assert!(mh.ror());
        assert!(mh.csi());
        assert_eq!(mh.nmimt(), Err(0x0f));

        let mh = MessageHeader {
            typ: 0,
            nmp: 0,
            meb: 0,
        };
        assert_eq!(roundtrip(&mh), Ok(mh));
        assert!(!mh.ror());

        for hdr in [
            MiRequestHeader::default(),
            MiRequestHeader {
                opcode: 0xff,
                cdw0: u32::MAX,
                cdw1: u32::MAX,
            },
        ] {
            assert_eq!(roundtrip(&hdr), Ok(hdr));
        }

        let hdr = MiResponseHeader {
            status: 0xff,
            nmresp: [0xff; 3],
        };
        assert_eq!(roundtrip(&hdr), Ok(hdr));
        assert_eq!(hdr.rdl(), u16::MAX);
        assert_eq!(roundtrip(&MiResponseHeader::default()).unwrap().rdl(), 0);

        let max = AdminRequestHeader {
            opcode: 0xff,
            flags: 0xff,
            ctrl_id: u16::MAX,
            cdw1: crate::nvme::NSID_ALL,
            cdw2: u32::MAX,
            cdw3: u32::MAX,
            cdw4: u32::MAX,
            cdw5: u32::MAX,
            doff: u32::MAX,
            dlen: u32::MAX,
            cdw10: u32::MAX,
            cdw11: u32::MAX,
            cdw12: u32::MAX,
            cdw13: u32::MAX,
            cdw14: u32::MAX,
            cdw15: u32::MAX,
        };
        assert_eq!(roundtrip(&max), Ok(max));
        // Reserved flag bits are not reported
        assert_eq!(max.cflgs(), AdminCommandFlags::Dlv | AdminCommandFlags::Dov);

        let none = AdminRequestHeader {
            ctrl_id: crate::nvme::CNTLID_NONE,
            cdw1: crate::nvme::NSID_NONE,
            ..AdminRequestHeader::new(crate::nvme::AdminOpcode::Identify)
        };
        assert_eq!(roundtrip(&none), Ok(none));
        assert!(none.cflgs().is_empty());

        for hdr in [
            AdminResponseHeader::default(),
            AdminResponseHeader {
                status: 0xff,
                cdw0: u32::MAX,
                cdw1: u32::MAX,
                cdw3: u32::MAX,
            },
        ] {
            assert_eq!(roundtrip(&hdr), Ok(hdr));
        }
    }

    mod roundtrip {
        use proptest::prelude::*;

        use super::*;

        proptest! {
            #[test]
            fn message_header(typ: u8, nmp: u8, meb: u8) {
                let hdr = MessageHeader { typ, nmp, meb };
                prop_assert_eq!(roundtrip(&hdr), Ok(hdr));
            }

            #[test]
            fn mi_request(opcode: u8, cdw0: u32, cdw1: u32) {
                let hdr = MiRequestHeader { opcode, cdw0, cdw1 };
                prop_assert_eq!(roundtrip(&hdr), Ok(hdr));
            }

            #[test]
            fn mi_response(status: u8, nmresp: [u8; 3]) {
                let hdr = MiResponseHeader { status, nmresp };
                prop_assert_eq!(roundtrip(&hdr), Ok(hdr));
                prop_assert_eq!(hdr.rdl(), u16::from_le_bytes([nmresp[0], nmresp[1]]));
            }

            #[test]
            fn admin_request(
                opcode: u8,
                flags: u8,
                ctrl_id: u16,
                lo: [u32; 5],
                doff: u32,
                dlen: u32,
                hi: [u32; 6],
            ) {
                let hdr = AdminRequestHeader {
                    opcode,
                    flags,
                    ctrl_id,
                    cdw1: lo[0],
                    cdw2: lo[1],
                    cdw3: lo[2],
                    cdw4: lo[3],
                    cdw5: lo[4],
                    doff,
                    dlen,
                    cdw10: hi[0],
                    cdw11: hi[1],
                    cdw12: hi[2],
                    cdw13: hi[3],
                    cdw14: hi[4],
                    cdw15: hi[5],
                };
                prop_assert_eq!(roundtrip(&hdr), Ok(hdr));
            }

            #[test]
            fn admin_response(status: u8, cdw0: u32, cdw1: u32, cdw3: u32) {
                let hdr = AdminResponseHeader { status, cdw0, cdw1, cdw3 };
                prop_assert_eq!(roundtrip(&hdr), Ok(hdr));
            }
        }
    }

    #[test]
    fn data_structure_cdw0() {
        let mut req = DataStructureRequest::new(DataStructureType::PortInformation);
        req.portid = 1;
        assert_eq!(req.cdw0(), 0x0101_0000);

        let mut req = DataStructureRequest::new(DataStructureType::ControllerInformation);
        req.ctrlid = 0x0203;
        assert_eq!(req.cdw0(), 0x0300_0203);
    }

    #[test]
    fn port_info_pcie() {
        #[rustfmt::skip]
        let raw = [
            0x01, 0x00, 0x40, 0x00,
            0x00, 0x00, 0x00, 0x00,
            0x00, 0x3f, 0x01, 0x02,
            0x01, 0x00, 0x00, 0x00,
        ];
        let (_, pi) = PortInfo::from_bytes((raw.as_slice(), 0)).unwrap();
        assert_eq!(pi.port_type(), PortType::Pcie);
        assert_eq!(pi.mmtus, 64);
        let PortData::Pcie(pcie) = pi.data else {
            panic!("Expected PCIe port data: {pi:?}");
        };
        assert_eq!(pcie.pcieslsv, 0x3f);
        assert_eq!(pcie.pciemlw, 2);
    }

    #[test]
    fn health_status() {
        let raw = [0x38, 0x3f, 0xf6, 0x05, 0x21, 0x00, 0x00, 0x00];
        let (_, hs) = SubsystemHealthStatus::from_bytes((raw.as_slice(), 0)).unwrap();
        assert_eq!(hs.temperature(), -10);
        assert_eq!(hs.pdlu, 5);
        assert_eq!(
            hs.ccs(),
            CompositeControllerStatusFlags::Rdy | CompositeControllerStatusFlags::Ceco
        );
    }

    #[test]
    fn mic_check_value() {
        // CRC-32C check value over "123456789"
        assert_eq!(mic(&[b"1234", b"56789"]), 0xe306_9283u32.to_le_bytes());
    }
}
