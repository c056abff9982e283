// SPDX-License-Identifier: GPL-3.0-only
/*
 * Copyright (c) 2025 Code Construct
 */
//! NVMe-MI management commands, addressed to the endpoint itself.

use deku::DekuContainerRead;
use flagset::{FlagSet, flags};
use log::Level;
use num_traits::FromPrimitive;

use super::{
    ConfigurationIdentifier, ControllerInfo, DataStructureRequest, DataStructureType, MAX_DATA_LEN,
    MiOpcode, MiRequestHeader, MiResponseHeader, PortInfo, SUBSYSTEM_HEALTH_LEN, SmbusFrequency,
    SubsystemHealthStatus, SubsystemInfo, SupportedCommandList,
};
use crate::nvme::ControllerList;
use crate::topology::{Endpoint, diag};
use crate::transport::Transport;
use crate::{Error, Violation};

// MI v2.0, 5.2.2, Figure 88
flags! {
    #[repr(u32)]
    pub enum HealthStatusChangeFlags: u32 {
        Rdy,
        Cfs,
        Shst,
        Nssro,
        Ceco,
        Nac,
        Fa,
        Csts,
        Ctemp,
        Pdlu,
        Spare,
        Cwarn,
        Tcida,
    }
}

fn config_cdw0(id: ConfigurationIdentifier, port: u8, param: u8) -> u32 {
    (port as u32) << 24 | (param as u32) << 8 | id as u32
}

impl<T: Transport> Endpoint<T> {
    fn mi_command(
        &mut self,
        req: &MiRequestHeader,
        data: &mut [u8],
    ) -> Result<(MiResponseHeader, usize), Error> {
        let mut resp = MiResponseHeader::default();
        let len = data.len();
        let n = self.execute(req, &[], &mut resp, data, 0, len)?;
        Ok((resp, n))
    }

    /// Read an NVMe-MI data structure into `buf`, returning its length.
    ///
    /// The structure must fit in a single exchange.
    pub fn read_mi_data(
        &mut self,
        dsr: &DataStructureRequest,
        buf: &mut [u8],
    ) -> Result<usize, Error> {
        let req = MiRequestHeader::new(MiOpcode::ReadNvmeMiDataStructure, dsr.cdw0(), dsr.cdw1());
        let len = buf.len().min(MAX_DATA_LEN).min(self.max_payload);

        let (resp, n) = self.mi_command(&req, &mut buf[..len])?;

        let rdl = resp.rdl() as usize;
        if rdl != n {
            diag!(
                self,
                Level::Debug,
                "{:?}: response data length {rdl} but received {n}",
                dsr.dtyp
            );
            return Err(Violation::DataLength { rdl, found: n }.into());
        }

        Ok(n)
    }

    fn read_mi_data_fixed(&mut self, dsr: &DataStructureRequest, buf: &mut [u8]) -> Result<(), Error> {
        let n = self.read_mi_data(dsr, buf)?;
        let expected = dsr.dtyp.fixed_len().unwrap_or(n);
        if n != expected {
            return Err(Violation::Length { expected, found: n }.into());
        }
        Ok(())
    }

    pub fn read_mi_data_subsys(&mut self) -> Result<SubsystemInfo, Error> {
        let dsr = DataStructureRequest::new(DataStructureType::NvmSubsystemInformation);
        let mut buf = [0u8; 32];
        self.read_mi_data_fixed(&dsr, &mut buf)?;
        let (_, info) = SubsystemInfo::from_bytes((buf.as_slice(), 0))?;
        Ok(info)
    }

    pub fn read_mi_data_port(&mut self, portid: u8) -> Result<PortInfo, Error> {
        let mut dsr = DataStructureRequest::new(DataStructureType::PortInformation);
        dsr.portid = portid;
        let mut buf = [0u8; 32];
        self.read_mi_data_fixed(&dsr, &mut buf)?;
        let (_, info) = PortInfo::from_bytes((buf.as_slice(), 0))?;
        Ok(info)
    }

    /// Read the list of controllers in the subsystem with ids of at least
    /// `start`.
    pub fn read_mi_data_ctrl_list(&mut self, start: u16) -> Result<ControllerList, Error> {
        let mut dsr = DataStructureRequest::new(DataStructureType::ControllerList);
        dsr.ctrlid = start;
        let mut buf = [0u8; MAX_DATA_LEN];
        let n = self.read_mi_data(&dsr, &mut buf)?;
        ControllerList::decode(&buf[..n])
    }

    pub fn read_mi_data_ctrl(&mut self, ctrl_id: u16) -> Result<ControllerInfo, Error> {
        let mut dsr = DataStructureRequest::new(DataStructureType::ControllerInformation);
        dsr.ctrlid = ctrl_id;
        let mut buf = [0u8; 32];
        self.read_mi_data_fixed(&dsr, &mut buf)?;
        let (_, info) = ControllerInfo::from_bytes((buf.as_slice(), 0))?;
        Ok(info)
    }

    pub fn read_mi_data_opt_cmd_support(&mut self) -> Result<SupportedCommandList, Error> {
        self.read_command_list(DataStructureType::OptionallySupportedCommandList)
    }

    pub fn read_mi_data_meb_support(&mut self) -> Result<SupportedCommandList, Error> {
        self.read_command_list(DataStructureType::ManagementEndpointBufferCommandSupportList)
    }

    fn read_command_list(&mut self, dtyp: DataStructureType) -> Result<SupportedCommandList, Error> {
        let dsr = DataStructureRequest::new(dtyp);
        let mut buf = [0u8; MAX_DATA_LEN];
        let n = self.read_mi_data(&dsr, &mut buf)?;
        let (_, list) = SupportedCommandList::from_bytes((&buf[..n], 0))?;
        Ok(list)
    }

    /// Poll the NVM subsystem health status. With `clear` set, the
    /// composite controller status is cleared once reported.
    pub fn subsystem_health_status_poll(
        &mut self,
        clear: bool,
    ) -> Result<SubsystemHealthStatus, Error> {
        let req = MiRequestHeader::new(
            MiOpcode::NvmSubsystemHealthStatusPoll,
            0,
            (clear as u32) << 31,
        );
        let mut buf = [0u8; SUBSYSTEM_HEALTH_LEN];
        let (_, n) = self.mi_command(&req, &mut buf)?;
        if n != SUBSYSTEM_HEALTH_LEN {
            return Err(Violation::Length {
                expected: SUBSYSTEM_HEALTH_LEN,
                found: n,
            }
            .into());
        }
        let (_, hs) = SubsystemHealthStatus::from_bytes((buf.as_slice(), 0))?;
        Ok(hs)
    }

    fn config_get(&mut self, cdw0: u32) -> Result<MiResponseHeader, Error> {
        let req = MiRequestHeader::new(MiOpcode::ConfigurationGet, cdw0, 0);
        let (resp, _) = self.mi_command(&req, &mut [])?;
        Ok(resp)
    }

    fn config_set(&mut self, cdw0: u32, cdw1: u32) -> Result<(), Error> {
        let req = MiRequestHeader::new(MiOpcode::ConfigurationSet, cdw0, cdw1);
        self.mi_command(&req, &mut [])?;
        Ok(())
    }

    pub fn config_get_smbus_freq(&mut self, port: u8) -> Result<SmbusFrequency, Error> {
        let resp = self.config_get(config_cdw0(ConfigurationIdentifier::SmbusI2cFrequency, port, 0))?;
        let sfreq = resp.nmresp[0] & 0xf;
        SmbusFrequency::from_u8(sfreq).ok_or(Violation::Field(sfreq as u32).into())
    }

    pub fn config_set_smbus_freq(&mut self, port: u8, freq: SmbusFrequency) -> Result<(), Error> {
        let cdw0 = config_cdw0(ConfigurationIdentifier::SmbusI2cFrequency, port, freq as u8 & 0xf);
        self.config_set(cdw0, 0)
    }

    pub fn config_get_mctp_mtu(&mut self, port: u8) -> Result<u16, Error> {
        let resp = self.config_get(config_cdw0(
            ConfigurationIdentifier::MctpTransmissionUnitSize,
            port,
            0,
        ))?;
        Ok(u16::from_le_bytes([resp.nmresp[0], resp.nmresp[1]]))
    }

    pub fn config_set_mctp_mtu(&mut self, port: u8, mtu: u16) -> Result<(), Error> {
        let cdw0 = config_cdw0(ConfigurationIdentifier::MctpTransmissionUnitSize, port, 0);
        self.config_set(cdw0, mtu as u32)
    }

    /// Clear the health status changes selected by `mask`.
    pub fn config_set_health_status_change(
        &mut self,
        mask: impl Into<FlagSet<HealthStatusChangeFlags>>,
    ) -> Result<(), Error> {
        let cdw0 = config_cdw0(ConfigurationIdentifier::HealthStatusChange, 0, 0);
        self.config_set(cdw0, mask.into().bits())
    }
}
