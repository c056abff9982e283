// SPDX-License-Identifier: GPL-3.0-only
/*
 * Copyright (c) 2025 Code Construct
 */
#![allow(dead_code)]

extern crate simplelog;

use log::LevelFilter;
use nvme_mi_host::{EndpointId, MctpAddr, Root, Transport, TransportError};
use simplelog::{ColorChoice, Config, TermLogger, TerminalMode};

const ISCSI: crc::Crc<u32> = crc::Crc::<u32>::new(&crc::CRC_32_ISCSI);

pub fn mic(buf: &[u8]) -> [u8; 4] {
    ISCSI.checksum(buf).to_le_bytes()
}

pub fn setup() {
    if true {
        let _ = TermLogger::init(
            LevelFilter::Debug,
            Config::default(),
            TerminalMode::Mixed,
            ColorChoice::Auto,
        );
    }
}

pub fn addr() -> MctpAddr {
    MctpAddr::new(1, 9)
}

/// Opens a root holding a single mock endpoint.
pub fn open(mock: MockEndpoint) -> (Root<MockEndpoint>, EndpointId) {
    let mut root = Root::new(LevelFilter::Trace);
    let id = root.open_endpoint(mock, addr()).unwrap();
    (root, id)
}

/// Misbehaviour injected into the response to one exchange.
#[derive(Clone, Copy, Debug)]
pub enum Fault {
    Timeout,
    Link,
    Status(u8),
    MessageType(u8),
    Nmimt(u8),
    NotResponse,
    CommandSlot,
    Integrity,
    Runt,
    Truncate(usize),
    Extend(usize),
    Rdl(u16),
}

/// A request as received by the mock, integrity check included.
#[derive(Clone, Debug)]
pub struct Exchange {
    pub raw: Vec<u8>,
}

impl Exchange {
    pub fn nmimt(&self) -> u8 {
        (self.raw[1] >> 3) & 0xf
    }

    pub fn opcode(&self) -> u8 {
        self.raw[4]
    }

    pub fn flags(&self) -> u8 {
        self.raw[5]
    }

    pub fn ctrl_id(&self) -> u16 {
        u16::from_le_bytes([self.raw[6], self.raw[7]])
    }

    pub fn dword(&self, off: usize) -> u32 {
        u32::from_le_bytes(self.raw[off..off + 4].try_into().unwrap())
    }

    pub fn mi_cdw0(&self) -> u32 {
        self.dword(8)
    }

    pub fn mi_cdw1(&self) -> u32 {
        self.dword(12)
    }

    pub fn cdw(&self, n: usize) -> u32 {
        match n {
            1..=5 => self.dword(8 + 4 * (n - 1)),
            10..=15 => self.dword(44 + 4 * (n - 10)),
            _ => panic!("No admin command dword {n}"),
        }
    }

    pub fn doff(&self) -> u32 {
        self.dword(28)
    }

    pub fn dlen(&self) -> u32 {
        self.dword(32)
    }

    pub fn data(&self) -> &[u8] {
        let hlen = if self.nmimt() == 1 { 16 } else { 68 };
        &self.raw[hlen..self.raw.len() - 4]
    }
}

type Reply = Result<(Vec<u8>, Vec<u8>), u8>;

/// A scripted NVM subsystem behind a management endpoint.
///
/// Ports: 1 PCIe (0), 1 Two-wire (1)
/// Controllers: as listed in `ctrl_ids`
pub struct MockEndpoint {
    pub max_msg: usize,
    pub exchanges: Vec<Exchange>,
    pub faults: Vec<(usize, Fault)>,
    pub identify: Vec<u8>,
    pub log: Vec<u8>,
    pub ctrl_ids: Vec<u16>,
    pub security: Vec<u8>,
    pub smbus_freq: u8,
    pub mtu: u16,
    pub hsc: u32,
    pub health: [u8; 8],
    pub cleared: bool,
}

impl MockEndpoint {
    pub fn new(max_msg: usize) -> Self {
        Self {
            max_msg,
            exchanges: Vec::new(),
            faults: Vec::new(),
            identify: (0..4096).map(|i| (i % 251) as u8).collect(),
            log: (0..3 * 4096).map(|i| (i % 253) as u8).collect(),
            ctrl_ids: vec![0, 1, 4],
            security: Vec::new(),
            smbus_freq: 0x01,
            mtu: 64,
            hsc: 0,
            health: [0x38, 0x3f, 0x1d, 0x05, 0x21, 0x00, 0x00, 0x00],
            cleared: false,
        }
    }

    pub fn fault(mut self, exchange: usize, fault: Fault) -> Self {
        self.faults.push((exchange, fault));
        self
    }

    fn ctrl_list(&self, start: u16) -> Vec<u8> {
        let ids: Vec<u16> = self
            .ctrl_ids
            .iter()
            .copied()
            .filter(|id| *id >= start)
            .collect();
        let mut data = (ids.len() as u16).to_le_bytes().to_vec();
        for id in ids {
            data.extend(id.to_le_bytes());
        }
        data
    }

    fn data_structure(&self, cdw0: u32) -> Result<Vec<u8>, u8> {
        let dtyp = (cdw0 >> 24) as u8;
        let portid = (cdw0 >> 16) as u8;
        let ctrlid = cdw0 as u16;

        let mut data = match dtyp {
            0x00 => vec![0x01, 0x01, 0x02, 0x00],
            0x01 => match portid {
                #[rustfmt::skip]
                0 => vec![
                    0x01, 0x00, 0x40, 0x00,
                    0x00, 0x00, 0x00, 0x00,
                    0x00, 0x3f, 0x01, 0x02,
                    0x01, 0x00,
                ],
                #[rustfmt::skip]
                1 => vec![
                    0x02, 0x00, 0x40, 0x00,
                    0x00, 0x00, 0x00, 0x00,
                    0x00, 0x00, 0x1d, 0x01,
                    0x00,
                ],
                _ => return Err(0x04),
            },
            0x02 => return Ok(self.ctrl_list(ctrlid)),
            0x03 => {
                if !self.ctrl_ids.contains(&ctrlid) {
                    return Err(0x04);
                }
                #[rustfmt::skip]
                let info = vec![
                    0x00, 0x00, 0x00, 0x00,
                    0x00, 0x01, 0x00, 0x00,
                    0x96, 0x1b, 0x00, 0x26,
                    0x96, 0x1b, 0x01, 0x00,
                    0x00,
                ];
                info
            }
            0x04 | 0x05 => return Ok(vec![0x02, 0x00, 0x00, 0x01, 0x00, 0x04]),
            _ => return Err(0x04),
        };
        data.resize(32, 0);
        Ok(data)
    }

    fn handle_mi(&mut self, ex: &Exchange) -> Reply {
        let cdw0 = ex.mi_cdw0();
        let cdw1 = ex.mi_cdw1();
        match ex.opcode() {
            0x00 => {
                let data = self.data_structure(cdw0)?;
                let rdl = (data.len() as u16).to_le_bytes();
                Ok((vec![0x00, rdl[0], rdl[1], 0x00], data))
            }
            0x01 => {
                if cdw1 & (1 << 31) != 0 {
                    self.cleared = true;
                }
                Ok((vec![0x00; 4], self.health.to_vec()))
            }
            0x03 => {
                match cdw0 & 0xff {
                    0x01 => self.smbus_freq = ((cdw0 >> 8) & 0xf) as u8,
                    0x02 => self.hsc = cdw1,
                    0x03 => self.mtu = cdw1 as u16,
                    _ => return Err(0x04),
                }
                Ok((vec![0x00; 4], Vec::new()))
            }
            0x04 => {
                let nmresp = match cdw0 & 0xff {
                    0x01 => [self.smbus_freq, 0x00, 0x00],
                    0x03 => {
                        let mtu = self.mtu.to_le_bytes();
                        [mtu[0], mtu[1], 0x00]
                    }
                    _ => return Err(0x04),
                };
                Ok((
                    vec![0x00, nmresp[0], nmresp[1], nmresp[2]],
                    Vec::new(),
                ))
            }
            _ => Err(0x03),
        }
    }

    fn handle_admin(&mut self, ex: &Exchange) -> Reply {
        let window = |src: &[u8]| -> Vec<u8> {
            let start = (ex.doff() as usize).min(src.len());
            let end = (start + ex.dlen() as usize).min(src.len());
            src[start..end].to_vec()
        };

        let (cdw0, data) = match ex.opcode() {
            0x02 => {
                let numd = (ex.cdw(10) >> 16) | (ex.cdw(11) & 0xffff) << 16;
                let len = (numd as usize + 1) * 4;
                let lpo = (ex.cdw(12) as u64 | (ex.cdw(13) as u64) << 32) as usize;
                let start = lpo.min(self.log.len());
                let end = (lpo + len).min(self.log.len());
                (0, window(&self.log[start..end]))
            }
            0x06 => match ex.cdw(10) & 0xff {
                0x01 => (0xc0de, window(&self.identify)),
                0x13 => {
                    let mut list = self.ctrl_list((ex.cdw(10) >> 16) as u16);
                    list.resize(4096, 0);
                    (0, window(&list))
                }
                _ => return Err(0x04),
            },
            0x81 => {
                self.security = ex.data().to_vec();
                (self.security.len() as u32, Vec::new())
            }
            0x82 => (0, window(&self.security)),
            _ => return Err(0x03),
        };

        let mut hdr = vec![0x00; 4];
        hdr.extend(cdw0.to_le_bytes());
        hdr.extend([0x00; 8]);
        Ok((hdr, data))
    }
}

impl Transport for MockEndpoint {
    type Address = MctpAddr;

    fn max_message_size(&self, _addr: &MctpAddr) -> usize {
        self.max_msg
    }

    fn send_and_receive(
        &mut self,
        addr: &MctpAddr,
        req: &[&[u8]],
        resp: &mut [u8],
    ) -> Result<usize, TransportError> {
        assert_eq!(*addr, self::addr());

        let raw: Vec<u8> = req.iter().flat_map(|b| b.iter()).copied().collect();
        assert!(
            raw.len() <= self.max_msg,
            "Request of {} bytes exceeds {}",
            raw.len(),
            self.max_msg
        );
        let (body, tail) = raw.split_at(raw.len() - 4);
        assert_eq!(mic(body), tail, "Request integrity check mismatch");
        assert_eq!(raw[0], 0x84);
        assert_eq!(raw[1] & 0x80, 0, "Response bit set in request");

        let idx = self.exchanges.len();
        let ex = Exchange { raw: raw.clone() };
        self.exchanges.push(ex.clone());

        let fault = self
            .faults
            .iter()
            .find(|(i, _)| *i == idx)
            .map(|(_, f)| *f);

        match fault {
            Some(Fault::Timeout) => return Err(TransportError::Timeout),
            Some(Fault::Link) => return Err(TransportError::Link),
            _ => (),
        }

        let reply = match ex.nmimt() {
            1 => self.handle_mi(&ex),
            2 => self.handle_admin(&ex),
            n => panic!("Unexpected NMIMT {n}"),
        };

        let mut msg = vec![0x84, 0x80 | ex.nmimt() << 3 | (ex.raw[1] & 0x01), 0x00, 0x00];
        match reply {
            Ok((hdr, data)) => {
                msg.extend(hdr);
                msg.extend(data);
            }
            Err(status) => msg.extend([status, 0x00, 0x00, 0x00]),
        }

        match fault {
            Some(Fault::Status(code)) => {
                msg.truncate(4);
                msg.extend([code, 0x00, 0x00, 0x00]);
            }
            Some(Fault::MessageType(typ)) => msg[0] = typ,
            Some(Fault::Nmimt(nmimt)) => msg[1] = (msg[1] & !0x78) | (nmimt & 0xf) << 3,
            Some(Fault::NotResponse) => msg[1] &= !0x80,
            Some(Fault::CommandSlot) => msg[1] ^= 0x01,
            Some(Fault::Runt) => msg.truncate(2),
            Some(Fault::Truncate(n)) => msg.truncate(msg.len() - n),
            Some(Fault::Extend(n)) => msg.extend(vec![0xa5; n]),
            Some(Fault::Rdl(rdl)) => msg[5..7].copy_from_slice(&rdl.to_le_bytes()),
            _ => (),
        }

        let check = mic(&msg);
        msg.extend(check);

        if let Some(Fault::Integrity) = fault {
            let last = msg.len() - 1;
            msg[last] ^= 0xff;
        }

        resp[..msg.len()].copy_from_slice(&msg);
        Ok(msg.len())
    }
}
