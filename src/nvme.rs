// SPDX-License-Identifier: GPL-3.0-only
/*
 * Copyright (c) 2025 Code Construct
 */
pub mod mi;

use deku::{DekuContainerRead, DekuRead};

use crate::Error;
use crate::wire::WireVec;

/// Size of every Identify data structure
pub const IDENTIFY_DATA_SIZE: usize = 4096;

// Base v2.1, 3.2.1.1
pub const NSID_NONE: u32 = 0;
pub const NSID_ALL: u32 = 0xffff_ffff;
// Base v2.1, 5.1.13.1, Figure 308
pub const CNTLID_NONE: u16 = 0;
pub const CNSSPECID_NONE: u16 = 0;
pub const UUID_NONE: u8 = 0;

// Base v2.1, 5.1, Figure 143
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[repr(u8)]
pub enum AdminOpcode {
    GetLogPage = 0x02,
    Identify = 0x06,
    SecuritySend = 0x81,
    SecurityReceive = 0x82,
}

impl From<AdminOpcode> for u8 {
    fn from(op: AdminOpcode) -> Self {
        op as Self
    }
}

// Base v2.1, 5.1.13.1, Figure 311
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
#[repr(u8)]
pub enum CommandSetIdentifier {
    #[default]
    Nvm = 0x00,
    KeyValue = 0x01,
    ZonedNamespace = 0x02,
    SubsystemLocalMemory = 0x03,
    ComputationalPrograms = 0x04,
}

impl From<CommandSetIdentifier> for u8 {
    fn from(csi: CommandSetIdentifier) -> Self {
        csi as Self
    }
}

// Base v2.1, 5.1.13.1, Figure 310
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[repr(u8)]
pub enum IdentifyCns {
    NvmIdentifyNamespace = 0x00,
    IdentifyController = 0x01,
    ActiveNamespaceIdList = 0x02,
    NamespaceIdentificationDescriptorList = 0x03,
    IoIdentifyNamespace = 0x05,
    IoIdentifyController = 0x06,
    IoActiveNamespaceIdList = 0x07,
    IdentifyNamespace = 0x08,
    AllocatedNamespaceIdList = 0x10,
    NamespaceAttachedControllerList = 0x12,
    NvmSubsystemControllerList = 0x13,
    SecondaryControllerList = 0x15,
}

impl From<IdentifyCns> for u8 {
    fn from(cns: IdentifyCns) -> Self {
        cns as Self
    }
}

// Base v2.1, 5.1.12, Figure 202
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[repr(u8)]
pub enum LogPageId {
    SupportedLogPages = 0x00,
    ErrorInformation = 0x01,
    SmartHealthInformation = 0x02,
    FirmwareSlotInformation = 0x03,
    CommandsSupportedAndEffects = 0x05,
    DeviceSelfTest = 0x06,
    TelemetryHostInitiated = 0x07,
    TelemetryControllerInitiated = 0x08,
    FeatureIdentifiersSupportedAndEffects = 0x12,
    PersistentEventLog = 0x0d,
}

impl From<LogPageId> for u8 {
    fn from(lid: LogPageId) -> Self {
        lid as Self
    }
}

/// Largest number of identifiers in a Controller List
pub const MAX_CONTROLLER_LIST: usize = 2047;

// Base v2.1, Section 5.1.13.2.12
/// A Controller List, as returned by both the Read NVMe-MI Data Structure
/// command and the Identify command.
#[derive(Clone, Debug, DekuRead, Default, Eq, PartialEq)]
#[deku(endian = "little")]
pub struct ControllerList {
    numids: u16,
    #[deku(count = "numids")]
    ids: WireVec<u16, MAX_CONTROLLER_LIST>,
}

impl ControllerList {
    pub fn decode(buf: &[u8]) -> Result<Self, Error> {
        let (_, list) = Self::from_bytes((buf, 0))?;
        Ok(list)
    }

    pub fn ids(&self) -> &[u16] {
        self.ids.as_slice()
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}
