//! The EtherCAT topology model: I/O server, devices (masters), and slaves
//! (couplers and terminals).
//!
//! Slaves form a tree: couplers parent downstream terminals. The tree is
//! stored arena-style; a device owns a flat `Vec<IoSlave>` and parent
//! links are indices, so there are no reference cycles to manage.

mod introspect;

pub(crate) use introspect::introspect;
pub(crate) use introspect::{refresh_counters, refresh_link_states};

use catio_core::ams::AmsNetId;
use serde::Serialize;

/// Index of a slave within its device's arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct SlaveIndex(pub usize);

/// Vendor, product, and revision of a device or slave.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct EcatIdentity {
    pub vendor: u32,
    pub product: u32,
    pub revision: u32,
}

/// Frame counters of a device, refreshed on demand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct FrameCounters {
    pub cyclic_sent: u32,
    pub cyclic_lost: u32,
    pub acyclic_sent: u32,
    pub acyclic_lost: u32,
    pub resent_cyclic: u32,
    pub resent_acyclic: u32,
}

/// CRC and link diagnostics of a slave.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct SlaveCounters {
    /// CRC error counters of ports A through D.
    pub crc: [u32; 4],
    /// Number of observed link losses.
    pub lost_links: u32,
}

/// Physical link state of a device's network port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum LinkState {
    Down,
    Up,
    Unknown(u32),
}

impl From<u32> for LinkState {
    fn from(value: u32) -> Self {
        match value {
            0 => Self::Down,
            1 => Self::Up,
            n => Self::Unknown(n),
        }
    }
}

/// EtherCAT state machine position of a slave.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum EcatState {
    Init,
    PreOp,
    Boot,
    SafeOp,
    Op,
    Unknown(u16),
}

impl From<u16> for EcatState {
    fn from(value: u16) -> Self {
        match value {
            1 => Self::Init,
            2 => Self::PreOp,
            3 => Self::Boot,
            4 => Self::SafeOp,
            8 => Self::Op,
            n => Self::Unknown(n),
        }
    }
}

/// A slave on an EtherCAT device: a coupler or terminal.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IoSlave {
    /// Fixed EtherCAT address.
    pub address: u16,
    /// Position in the physical chain.
    pub position: u16,
    /// Human name; blank names are replaced by `"Term <address>"`.
    pub name: String,
    pub identity: EcatIdentity,
    /// Manufacturing serial number.
    pub serial: u32,
    /// Address of the parenting coupler; zero means the device root.
    pub parent_address: u16,
    /// Arena index of the parent, if it resolved.
    pub parent: Option<SlaveIndex>,
    /// Set when `parent_address` named a slave that is not present; the
    /// slave is linked under the device root instead.
    pub orphan: bool,
    pub state: EcatState,
    /// Raw link word from the slave info block.
    pub link: u16,
    pub counters: SlaveCounters,
}

/// An EtherCAT master on the I/O server.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IoDevice {
    pub id: u32,
    /// Numeric device type code.
    pub device_type: u32,
    pub name: String,
    /// The master's own AMS Net ID; its services listen on port 65535.
    pub net_id: AmsNetId,
    pub identity: EcatIdentity,
    pub link_state: LinkState,
    pub frame_counters: FrameCounters,
    /// Slave arena. Parent links are indices into this vector.
    pub slaves: Vec<IoSlave>,
}

impl IoDevice {
    /// Returns the slave at an arena index.
    pub fn slave(&self, index: SlaveIndex) -> Option<&IoSlave> {
        self.slaves.get(index.0)
    }

    /// Returns the slaves hanging directly off the device root.
    pub fn root_slaves(&self) -> impl Iterator<Item = &IoSlave> {
        self.slaves.iter().filter(|s| s.parent.is_none())
    }

    /// Returns the children of the slave at `parent`.
    pub fn children(&self, parent: SlaveIndex) -> impl Iterator<Item = &IoSlave> {
        self.slaves
            .iter()
            .filter(move |s| s.parent == Some(parent))
    }

    /// Looks up a slave by its fixed EtherCAT address.
    pub fn slave_by_address(&self, address: u16) -> Option<&IoSlave> {
        self.slaves.iter().find(|s| s.address == address)
    }
}

/// The root of an introspected topology.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IoServer {
    pub name: String,
    /// Version formatted `"<major>-<minor>"`.
    pub version: String,
    pub build: u16,
    pub devices: Vec<IoDevice>,
}

impl IoServer {
    /// Looks up a device by id.
    pub fn device(&self, id: u32) -> Option<&IoDevice> {
        self.devices.iter().find(|d| d.id == id)
    }
}
