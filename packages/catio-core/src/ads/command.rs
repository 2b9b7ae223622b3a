use super::error::AdsCommandError;

/// ADS command identifiers (the `command id` field of the ADS header).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum AdsCommand {
    /// Query device name and version.
    ReadDeviceInfo,
    /// Read bytes addressed by (index group, index offset, length).
    Read,
    /// Write bytes addressed by (index group, index offset).
    Write,
    /// Read the ADS and device state.
    ReadState,
    /// Change the ADS state (start/stop/reset).
    WriteControl,
    /// Register a device notification subscription.
    AddDeviceNotification,
    /// Cancel a device notification subscription.
    DeleteDeviceNotification,
    /// Server-pushed notification samples.
    DeviceNotification,
    /// Combined write-then-read in one round trip.
    ReadWrite,
    /// Any command id this crate does not know.
    Unknown(u16),
}

impl AdsCommand {
    /// The length of a command id on the wire.
    pub const LENGTH: usize = 2;

    /// Serializes the command id into a little-endian byte array.
    pub fn to_bytes(&self) -> [u8; Self::LENGTH] {
        u16::from(*self).to_le_bytes()
    }

    /// Creates a command id from a little-endian byte array.
    pub fn from_bytes(bytes: [u8; Self::LENGTH]) -> Self {
        u16::from_le_bytes(bytes).into()
    }

    /// Tries to parse a command id from a byte slice.
    pub fn try_from_slice(bytes: &[u8]) -> Result<Self, AdsCommandError> {
        if bytes.len() < Self::LENGTH {
            return Err(AdsCommandError::UnexpectedLength {
                expected: Self::LENGTH,
                got: bytes.len(),
            });
        }
        Ok(Self::from_bytes([bytes[0], bytes[1]]))
    }
}

impl From<u16> for AdsCommand {
    fn from(value: u16) -> Self {
        match value {
            0x0001 => Self::ReadDeviceInfo,
            0x0002 => Self::Read,
            0x0003 => Self::Write,
            0x0004 => Self::ReadState,
            0x0005 => Self::WriteControl,
            0x0006 => Self::AddDeviceNotification,
            0x0007 => Self::DeleteDeviceNotification,
            0x0008 => Self::DeviceNotification,
            0x0009 => Self::ReadWrite,
            n => Self::Unknown(n),
        }
    }
}

impl From<AdsCommand> for u16 {
    fn from(value: AdsCommand) -> Self {
        match value {
            AdsCommand::ReadDeviceInfo => 0x0001,
            AdsCommand::Read => 0x0002,
            AdsCommand::Write => 0x0003,
            AdsCommand::ReadState => 0x0004,
            AdsCommand::WriteControl => 0x0005,
            AdsCommand::AddDeviceNotification => 0x0006,
            AdsCommand::DeleteDeviceNotification => 0x0007,
            AdsCommand::DeviceNotification => 0x0008,
            AdsCommand::ReadWrite => 0x0009,
            AdsCommand::Unknown(n) => n,
        }
    }
}
