use super::error::AmsTcpHeaderError;

/// The 6-byte prefix carried before every ADS frame on the TCP stream.
///
/// Layout: 2 reserved bytes (always zero) followed by the little-endian
/// `u32` length of everything that follows the prefix (ADS header + body).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AmsTcpHeader {
    length: u32,
}

impl AmsTcpHeader {
    /// Length of the AMS/TCP header in bytes.
    pub const LENGTH: usize = 6;

    /// Constructs a header declaring `length` payload bytes.
    pub const fn new(length: u32) -> Self {
        Self { length }
    }

    /// Returns the declared payload length (excluding the 6-byte prefix).
    pub fn length(&self) -> u32 {
        self.length
    }

    /// Serializes the header into a byte array.
    pub fn to_bytes(&self) -> [u8; Self::LENGTH] {
        self.into()
    }

    /// Parses a header from a byte array, rejecting a non-zero reserved field.
    pub fn from_bytes(bytes: [u8; Self::LENGTH]) -> Result<Self, AmsTcpHeaderError> {
        let reserved = u16::from_le_bytes([bytes[0], bytes[1]]);
        if reserved != 0 {
            return Err(AmsTcpHeaderError::NonZeroReserved { value: reserved });
        }

        Ok(Self {
            length: u32::from_le_bytes(bytes[2..Self::LENGTH].try_into().unwrap()),
        })
    }

    /// Tries to parse a header from the first six bytes of a slice.
    pub fn try_from_slice(bytes: &[u8]) -> Result<Self, AmsTcpHeaderError> {
        Self::try_from(bytes)
    }
}

impl From<&AmsTcpHeader> for [u8; AmsTcpHeader::LENGTH] {
    fn from(value: &AmsTcpHeader) -> Self {
        let mut buf = [0u8; AmsTcpHeader::LENGTH];
        buf[2..AmsTcpHeader::LENGTH].copy_from_slice(&value.length.to_le_bytes());
        buf
    }
}

impl TryFrom<&[u8]> for AmsTcpHeader {
    type Error = AmsTcpHeaderError;

    fn try_from(value: &[u8]) -> Result<Self, Self::Error> {
        if value.len() < Self::LENGTH {
            return Err(AmsTcpHeaderError::BufferTooSmall {
                expected: Self::LENGTH,
                found: value.len(),
            });
        }

        let bytes: [u8; Self::LENGTH] = value[..Self::LENGTH].try_into().unwrap();
        Self::from_bytes(bytes)
    }
}
