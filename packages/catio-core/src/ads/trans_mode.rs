use super::error::TransModeError;

/// The transmission mode of a device notification subscription.
///
/// Determines when the server pushes a sample for the watched value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum AdsTransMode {
    /// No transmission.
    NoTrans,
    /// The client polls cyclically.
    ClientCycle,
    /// The client polls, transmission only on change.
    ClientOnChange,
    /// The server samples and pushes cyclically.
    ServerCycle,
    /// The server samples cyclically and pushes only on change.
    ServerOnChange,
    /// A mode this crate does not know.
    Unknown(u32),
}

impl AdsTransMode {
    /// The length of a transmission mode on the wire.
    pub const LENGTH: usize = 4;

    /// Serializes the mode into a little-endian byte array.
    pub fn to_bytes(&self) -> [u8; Self::LENGTH] {
        u32::from(*self).to_le_bytes()
    }

    /// Creates a mode from a little-endian byte array.
    pub fn from_bytes(bytes: [u8; Self::LENGTH]) -> Self {
        u32::from_le_bytes(bytes).into()
    }

    /// Tries to parse a mode from a byte slice.
    pub fn try_from_slice(bytes: &[u8]) -> Result<Self, TransModeError> {
        if bytes.len() < Self::LENGTH {
            return Err(TransModeError::UnexpectedLength {
                expected: Self::LENGTH,
                got: bytes.len(),
            });
        }
        Ok(Self::from_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }
}

impl From<u32> for AdsTransMode {
    fn from(value: u32) -> Self {
        match value {
            0 => Self::NoTrans,
            1 => Self::ClientCycle,
            2 => Self::ClientOnChange,
            3 => Self::ServerCycle,
            4 => Self::ServerOnChange,
            n => Self::Unknown(n),
        }
    }
}

impl From<AdsTransMode> for u32 {
    fn from(value: AdsTransMode) -> Self {
        match value {
            AdsTransMode::NoTrans => 0,
            AdsTransMode::ClientCycle => 1,
            AdsTransMode::ClientOnChange => 2,
            AdsTransMode::ServerCycle => 3,
            AdsTransMode::ServerOnChange => 4,
            AdsTransMode::Unknown(n) => n,
        }
    }
}
