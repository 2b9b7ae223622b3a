use super::frame::UdpError;
use crate::ads::string::{decode_plc_string, encode_plc_string};
use crate::ams::AmsNetId;

/// Identifiers of the tagged values a discovery frame may carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TagId {
    /// u32 status of an add/delete-route request. Zero is success.
    Status,
    /// Route password, sent in the clear (inherited protocol behaviour).
    Password,
    /// TwinCAT version of the responding peer.
    Version,
    /// Host name of the sender.
    HostName,
    /// 6-byte AMS Net ID.
    NetId,
    /// Name the peer should store the route under.
    RouteName,
    /// User name authorizing the route.
    UserName,
    /// Dotted-decimal IP address of the sender.
    IpAddress,
    /// A tag this crate does not know; preserved for diagnostics.
    Unknown(u16),
}

impl From<u16> for TagId {
    fn from(value: u16) -> Self {
        match value {
            0x0001 => Self::Status,
            0x0002 => Self::Password,
            0x0003 => Self::Version,
            0x0005 => Self::HostName,
            0x0007 => Self::NetId,
            0x000C => Self::RouteName,
            0x000D => Self::UserName,
            0x0010 => Self::IpAddress,
            n => Self::Unknown(n),
        }
    }
}

impl From<TagId> for u16 {
    fn from(value: TagId) -> Self {
        match value {
            TagId::Status => 0x0001,
            TagId::Password => 0x0002,
            TagId::Version => 0x0003,
            TagId::HostName => 0x0005,
            TagId::NetId => 0x0007,
            TagId::RouteName => 0x000C,
            TagId::UserName => 0x000D,
            TagId::IpAddress => 0x0010,
            TagId::Unknown(n) => n,
        }
    }
}

/// One tagged value: id, length, raw data.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Tag {
    id: TagId,
    data: Vec<u8>,
}

impl Tag {
    /// The fixed prefix of a tag (id + length).
    pub const HEAD_SIZE: usize = 4;

    /// Creates a tag from raw bytes.
    pub fn new(id: TagId, data: impl Into<Vec<u8>>) -> Self {
        Self {
            id,
            data: data.into(),
        }
    }

    /// Creates a string tag (CP-1252, NUL-terminated on the wire).
    pub fn string(id: TagId, value: &str) -> Self {
        Self {
            id,
            data: encode_plc_string(value),
        }
    }

    /// Creates a Net ID tag.
    pub fn net_id(net_id: AmsNetId) -> Self {
        Self {
            id: TagId::NetId,
            data: net_id.to_bytes().to_vec(),
        }
    }

    /// Creates a status tag.
    pub fn status(status: u32) -> Self {
        Self {
            id: TagId::Status,
            data: status.to_le_bytes().to_vec(),
        }
    }

    /// Returns the tag id.
    pub fn id(&self) -> TagId {
        self.id
    }

    /// Returns the raw tag data.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Decodes the data as a NUL-terminated CP-1252 string.
    pub fn as_string(&self) -> String {
        decode_plc_string(&self.data).into_owned()
    }

    /// Decodes the data as a u32 status value.
    pub fn as_status(&self) -> Result<u32, UdpError> {
        if self.data.len() < 4 {
            return Err(UdpError::TagTooShort {
                id: self.id,
                expected: 4,
                got: self.data.len(),
            });
        }
        Ok(u32::from_le_bytes(self.data[0..4].try_into().unwrap()))
    }

    /// Decodes the data as an AMS Net ID.
    pub fn as_net_id(&self) -> Result<AmsNetId, UdpError> {
        AmsNetId::try_from_slice(&self.data).map_err(|_| UdpError::TagTooShort {
            id: self.id,
            expected: AmsNetId::LENGTH,
            got: self.data.len(),
        })
    }

    /// The on-wire size of this tag.
    pub fn wire_size(&self) -> usize {
        Self::HEAD_SIZE + self.data.len()
    }

    pub(super) fn write_into(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&u16::from(self.id).to_le_bytes());
        out.extend_from_slice(&(self.data.len() as u16).to_le_bytes());
        out.extend_from_slice(&self.data);
    }

    pub(super) fn parse(bytes: &[u8]) -> Result<(Self, &[u8]), UdpError> {
        if bytes.len() < Self::HEAD_SIZE {
            return Err(UdpError::Truncated {
                expected: Self::HEAD_SIZE,
                got: bytes.len(),
            });
        }

        let id = TagId::from(u16::from_le_bytes([bytes[0], bytes[1]]));
        let len = u16::from_le_bytes([bytes[2], bytes[3]]) as usize;

        if bytes.len() < Self::HEAD_SIZE + len {
            return Err(UdpError::Truncated {
                expected: Self::HEAD_SIZE + len,
                got: bytes.len(),
            });
        }

        Ok((
            Self {
                id,
                data: bytes[Self::HEAD_SIZE..Self::HEAD_SIZE + len].to_vec(),
            },
            &bytes[Self::HEAD_SIZE + len..],
        ))
    }
}
