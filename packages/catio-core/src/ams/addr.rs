//! AMS network addresses: a Net ID plus a 16-bit AMS port.

use super::error::NetIdError;
use super::net_id::AmsNetId;
use std::fmt;

/// AMS port number.
pub type AmsPort = u16;

/// Well-known AMS ports and the TCP/UDP socket ports used by the transport.
pub mod port {
    use super::AmsPort;

    /// The I/O server (device enumeration, process image, symbol table).
    pub const IO_SERVER: AmsPort = 300;
    /// The PLC runtime.
    pub const RUNTIME: AmsPort = 851;
    /// The system service.
    pub const SYSTEM_SERVICE: AmsPort = 10000;
    /// The EtherCAT master of a device (per-device identity and diagnostics).
    pub const ECAT_MASTER: AmsPort = 65535;
    /// Lowest AMS port a local client should pick for itself.
    pub const LOCAL_MIN: AmsPort = 8000;

    /// TCP socket port carrying framed ADS traffic.
    pub const ADS_TCP: u16 = 48898;
    /// UDP socket port for discovery and route negotiation.
    pub const ADS_UDP: u16 = 48899;
}

/// An endpoint on the AMS network (Net ID + AMS port).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AmsAddr {
    net_id: AmsNetId,
    port: AmsPort,
}

impl AmsAddr {
    /// The length of an AMS address on the wire (6-byte Net ID + 2-byte port).
    pub const LENGTH: usize = 8;

    /// Creates a new AMS address.
    pub const fn new(net_id: AmsNetId, port: AmsPort) -> Self {
        Self { net_id, port }
    }

    /// Returns the Net ID.
    pub fn net_id(&self) -> AmsNetId {
        self.net_id
    }

    /// Returns the AMS port.
    pub fn port(&self) -> AmsPort {
        self.port
    }

    /// Returns a copy of this address with a different port.
    pub fn with_port(&self, port: AmsPort) -> Self {
        Self::new(self.net_id, port)
    }

    /// Serializes the address into a byte array (port little-endian).
    pub fn to_bytes(&self) -> [u8; Self::LENGTH] {
        self.into()
    }

    /// Creates an address from a byte array.
    pub fn from_bytes(bytes: [u8; Self::LENGTH]) -> Self {
        Self::from(bytes)
    }

    /// Tries to parse an address from the first eight bytes of a slice.
    pub fn try_from_slice(bytes: &[u8]) -> Result<Self, NetIdError> {
        Self::try_from(bytes)
    }
}

impl From<(AmsNetId, AmsPort)> for AmsAddr {
    fn from((net_id, port): (AmsNetId, AmsPort)) -> Self {
        Self::new(net_id, port)
    }
}

impl From<&AmsAddr> for [u8; AmsAddr::LENGTH] {
    fn from(value: &AmsAddr) -> Self {
        let mut buf = [0u8; AmsAddr::LENGTH];
        buf[..AmsNetId::LENGTH].copy_from_slice(value.net_id.as_bytes());
        buf[AmsNetId::LENGTH..].copy_from_slice(&value.port.to_le_bytes());
        buf
    }
}

impl From<[u8; AmsAddr::LENGTH]> for AmsAddr {
    fn from(value: [u8; AmsAddr::LENGTH]) -> Self {
        let mut net_id = [0u8; AmsNetId::LENGTH];
        net_id.copy_from_slice(&value[..AmsNetId::LENGTH]);
        Self {
            net_id: AmsNetId::from_bytes(net_id),
            port: AmsPort::from_le_bytes([value[6], value[7]]),
        }
    }
}

impl TryFrom<&[u8]> for AmsAddr {
    type Error = NetIdError;

    fn try_from(bytes: &[u8]) -> Result<Self, Self::Error> {
        if bytes.len() < Self::LENGTH {
            return Err(NetIdError::BufferTooSmall {
                expected: Self::LENGTH,
                found: bytes.len(),
            });
        }

        Ok(Self {
            net_id: AmsNetId::try_from(&bytes[..AmsNetId::LENGTH])?,
            port: AmsPort::from_le_bytes([bytes[6], bytes[7]]),
        })
    }
}

impl fmt::Display for AmsAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.net_id, self.port)
    }
}
