// SPDX-License-Identifier: GPL-3.0-only
/*
 * Copyright (c) 2025 Code Construct
 */
//! Endpoints and the controllers behind them.
//!
//! A [`Root`] owns a fixed-size table of [`Endpoint`]s, one per management
//! endpoint reachable over a [`Transport`]. Controllers are addressed through
//! [`Controller`] handles, which are keys into that table rather than
//! references, and which must be closed before their endpoint can be.

use flagset::{FlagSet, flags};
use log::{Level, LevelFilter, debug};

use crate::nvme::mi::{AdminRequestHeader, MAX_DATA_LEN, MIC_LEN, MessageHeader, WireHeader};
use crate::transport::Transport;
use crate::{Error, MAX_CONTROLLERS, MAX_ENDPOINTS, Precondition};

flags! {
    /// Protocol variations an endpoint needs from the host.
    pub enum Accommodation: u8 {
        /// Use the NVMe-MI 1.1 meaning of the admin command flags byte,
        /// marking DLEN and DOFF as valid.
        AdminFlags = 1 << 0,
    }
}

/// Log through `log` when `$lvl` passes the endpoint's verbosity.
macro_rules! diag {
    ($ep:expr, $lvl:expr, $($arg:tt)+) => {
        if $lvl <= $ep.level {
            log::log!($lvl, $($arg)+);
        }
    };
}
pub(crate) use diag;

/// Smallest message that carries an admin request header, its integrity
/// check and one dword of data.
pub const MIN_MESSAGE_SIZE: usize =
    MessageHeader::LEN + <AdminRequestHeader as WireHeader>::LEN + MIC_LEN + 4;

// Generic header, admin response header and MIC
const RESPONSE_OVERHEAD: usize = 20 + MIC_LEN;

/// Identifies an open endpoint within its [`Root`].
///
/// Closing the endpoint invalidates the id, even if the slot is reused.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct EndpointId {
    index: usize,
    generation: u32,
}

/// An open controller on an endpoint.
///
/// Handles are neither `Clone` nor `Copy`; [`Root::close_controller`]
/// consumes them.
#[derive(Debug, Eq, PartialEq)]
pub struct Controller {
    ep: EndpointId,
    id: u16,
}

impl Controller {
    pub fn endpoint(&self) -> EndpointId {
        self.ep
    }

    pub fn id(&self) -> u16 {
        self.id
    }
}

/// A management endpoint of an NVM subsystem.
pub struct Endpoint<T: Transport> {
    pub(crate) link: T,
    pub(crate) addr: T::Address,
    pub(crate) max_msg: usize,
    pub(crate) max_payload: usize,
    pub(crate) accommodations: FlagSet<Accommodation>,
    pub(crate) level: LevelFilter,
    ctrls: heapless::Vec<u16, MAX_CONTROLLERS>,
}

impl<T: Transport> Endpoint<T> {
    fn new(
        link: T,
        addr: T::Address,
        accommodations: FlagSet<Accommodation>,
        level: LevelFilter,
    ) -> Result<Self, Error> {
        let max_msg = link.max_message_size(&addr);
        if max_msg < MIN_MESSAGE_SIZE {
            return Err(Precondition::MessageSize(max_msg).into());
        }

        let max_payload = (max_msg - RESPONSE_OVERHEAD).min(MAX_DATA_LEN) & !3;

        Ok(Self {
            link,
            addr,
            max_msg,
            max_payload,
            accommodations,
            level,
            ctrls: heapless::Vec::new(),
        })
    }

    pub fn addr(&self) -> &T::Address {
        &self.addr
    }

    pub fn link(&self) -> &T {
        &self.link
    }

    pub fn link_mut(&mut self) -> &mut T {
        &mut self.link
    }

    /// Largest message the transport carries to this endpoint
    pub fn max_message_size(&self) -> usize {
        self.max_msg
    }

    /// Largest data payload moved by a single exchange
    pub fn max_payload(&self) -> usize {
        self.max_payload
    }

    pub fn accommodations(&self) -> FlagSet<Accommodation> {
        self.accommodations
    }

    pub fn set_accommodations(&mut self, accommodations: impl Into<FlagSet<Accommodation>>) {
        self.accommodations = accommodations.into();
    }

    /// Ids of the controllers currently open on this endpoint
    pub fn controllers(&self) -> &[u16] {
        &self.ctrls
    }
}

/// A borrow of an endpoint scoped to one of its controllers, through which
/// admin commands are issued.
pub struct AdminChannel<'a, T: Transport> {
    pub(crate) ep: &'a mut Endpoint<T>,
    pub(crate) ctrl_id: u16,
}

impl<T: Transport> AdminChannel<'_, T> {
    pub fn ctrl_id(&self) -> u16 {
        self.ctrl_id
    }

    pub fn endpoint(&mut self) -> &mut Endpoint<T> {
        self.ep
    }
}

struct Slot<T: Transport> {
    generation: u32,
    ep: Option<Endpoint<T>>,
}

/// The context that owns every endpoint opened by the host.
pub struct Root<T: Transport> {
    level: LevelFilter,
    slots: heapless::Vec<Slot<T>, MAX_ENDPOINTS>,
}

impl<T: Transport> Root<T> {
    pub fn new(level: LevelFilter) -> Self {
        Self {
            level,
            slots: heapless::Vec::new(),
        }
    }

    /// Tear down the root and every endpoint it still holds.
    pub fn destroy(self) {
        let open = self.slots.iter().filter(|s| s.ep.is_some()).count();
        if Level::Debug <= self.level {
            debug!("Destroying root with {open} open endpoints");
        }
    }

    pub fn level(&self) -> LevelFilter {
        self.level
    }

    pub fn set_level(&mut self, level: LevelFilter) {
        self.level = level;
        for ep in self.slots.iter_mut().filter_map(|s| s.ep.as_mut()) {
            ep.level = level;
        }
    }

    pub fn open_endpoint(&mut self, link: T, addr: T::Address) -> Result<EndpointId, Error> {
        self.open_endpoint_with(link, addr, FlagSet::default())
    }

    pub fn open_endpoint_with(
        &mut self,
        link: T,
        addr: T::Address,
        accommodations: impl Into<FlagSet<Accommodation>>,
    ) -> Result<EndpointId, Error> {
        let ep = Endpoint::new(link, addr, accommodations.into(), self.level)?;
        diag!(
            ep,
            Level::Debug,
            "Opening endpoint {:?}: max message {}, max payload {}",
            ep.addr,
            ep.max_msg,
            ep.max_payload
        );

        let index = match self.slots.iter().position(|s| s.ep.is_none()) {
            Some(index) => index,
            None => {
                let index = self.slots.len();
                self.slots
                    .push(Slot {
                        generation: 0,
                        ep: None,
                    })
                    .map_err(|_| Precondition::TableFull)?;
                index
            }
        };

        let slot = &mut self.slots[index];
        slot.generation = slot.generation.wrapping_add(1);
        slot.ep = Some(ep);

        Ok(EndpointId {
            index,
            generation: slot.generation,
        })
    }

    /// Close an endpoint, handing back its link.
    ///
    /// Fails while any controller opened on the endpoint remains open.
    pub fn close_endpoint(&mut self, id: EndpointId) -> Result<T, Error> {
        let slot = self
            .slots
            .get_mut(id.index)
            .filter(|s| s.generation == id.generation)
            .ok_or(Precondition::UnknownEndpoint)?;

        let Some(ep) = slot.ep.as_ref() else {
            return Err(Precondition::UnknownEndpoint.into());
        };

        if !ep.ctrls.is_empty() {
            return Err(Precondition::ControllersOutstanding(ep.ctrls.len()).into());
        }

        let ep = slot.ep.take().ok_or(Precondition::UnknownEndpoint)?;
        diag!(ep, Level::Debug, "Closing endpoint {:?}", ep.addr);
        Ok(ep.link)
    }

    pub fn endpoint(&self, id: &EndpointId) -> Result<&Endpoint<T>, Error> {
        self.slots
            .get(id.index)
            .filter(|s| s.generation == id.generation)
            .and_then(|s| s.ep.as_ref())
            .ok_or(Precondition::UnknownEndpoint.into())
    }

    pub fn endpoint_mut(&mut self, id: &EndpointId) -> Result<&mut Endpoint<T>, Error> {
        self.slots
            .get_mut(id.index)
            .filter(|s| s.generation == id.generation)
            .and_then(|s| s.ep.as_mut())
            .ok_or(Precondition::UnknownEndpoint.into())
    }

    /// Open a handle to controller `ctrl_id` behind the endpoint. Nothing is
    /// sent to the endpoint.
    ///
    /// At most [`MAX_CONTROLLERS`] handles may be open
    /// per endpoint, far fewer than a controller list can name. Callers
    /// walking a large subsystem should close each handle before opening the
    /// next; exceeding the bound fails with [`Precondition::TableFull`].
    pub fn init_controller(&mut self, id: &EndpointId, ctrl_id: u16) -> Result<Controller, Error> {
        let ep = self.endpoint_mut(id)?;

        if ep.ctrls.contains(&ctrl_id) {
            return Err(Precondition::ControllerOpen(ctrl_id).into());
        }

        ep.ctrls
            .push(ctrl_id)
            .map_err(|_| Precondition::TableFull)?;

        Ok(Controller {
            ep: *id,
            id: ctrl_id,
        })
    }

    pub fn close_controller(&mut self, ctrl: Controller) -> Result<(), Error> {
        let ep = self.endpoint_mut(&ctrl.ep)?;

        let Some(pos) = ep.ctrls.iter().position(|c| *c == ctrl.id) else {
            return Err(Precondition::UnknownController(ctrl.id).into());
        };

        ep.ctrls.swap_remove(pos);
        Ok(())
    }

    pub fn controller(&mut self, ctrl: &Controller) -> Result<AdminChannel<'_, T>, Error> {
        let ep = self.endpoint_mut(&ctrl.ep)?;

        if !ep.ctrls.contains(&ctrl.id) {
            return Err(Precondition::UnknownController(ctrl.id).into());
        }

        Ok(AdminChannel {
            ep,
            ctrl_id: ctrl.id,
        })
    }
}
