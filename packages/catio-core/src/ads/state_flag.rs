use super::error::StateFlagError;
use std::fmt;

/// AMS state flags (16-bit bitfield).
///
/// Carries the request/response direction and the transport kind of a frame.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct StateFlag(pub u16);

impl StateFlag {
    /// The length of the state flags on the wire.
    pub const LENGTH: usize = 2;

    /// Bit 0: set on responses, clear on requests.
    pub const RESPONSE: u16 = 0x0001;
    /// Bit 1: receiver must not reply (fire-and-forget).
    pub const NO_RETURN: u16 = 0x0002;
    /// Bit 2: the frame carries an ADS command. Set on all normal traffic.
    pub const ADS_COMMAND: u16 = 0x0004;
    /// Bit 6: transport is UDP rather than TCP.
    pub const UDP: u16 = 0x0040;

    /// Creates flags from a raw bitfield.
    pub const fn new(raw: u16) -> Self {
        Self(raw)
    }

    /// Standard ADS request over TCP.
    pub const fn tcp_ads_request() -> Self {
        Self(Self::ADS_COMMAND)
    }

    /// Standard ADS response over TCP.
    pub const fn tcp_ads_response() -> Self {
        Self(Self::ADS_COMMAND | Self::RESPONSE)
    }

    /// ADS request over UDP.
    pub const fn udp_ads_request() -> Self {
        Self(Self::ADS_COMMAND | Self::UDP)
    }

    /// ADS response over UDP.
    pub const fn udp_ads_response() -> Self {
        Self(Self::ADS_COMMAND | Self::RESPONSE | Self::UDP)
    }

    /// Returns `true` if the frame is a request.
    pub fn is_request(&self) -> bool {
        self.0 & Self::RESPONSE == 0
    }

    /// Returns `true` if the frame is a response.
    pub fn is_response(&self) -> bool {
        self.0 & Self::RESPONSE != 0
    }

    /// Returns `true` if the frame carries an ADS command.
    pub fn is_ads_command(&self) -> bool {
        self.0 & Self::ADS_COMMAND != 0
    }

    /// Returns the raw bitfield.
    pub fn bits(&self) -> u16 {
        self.0
    }

    /// Serializes the flags into a little-endian byte array.
    pub fn to_bytes(&self) -> [u8; Self::LENGTH] {
        self.0.to_le_bytes()
    }

    /// Creates flags from a little-endian byte array.
    pub fn from_bytes(bytes: [u8; Self::LENGTH]) -> Self {
        Self(u16::from_le_bytes(bytes))
    }

    /// Tries to parse flags from a byte slice.
    pub fn try_from_slice(bytes: &[u8]) -> Result<Self, StateFlagError> {
        if bytes.len() < Self::LENGTH {
            return Err(StateFlagError::UnexpectedLength {
                expected: Self::LENGTH,
                got: bytes.len(),
            });
        }
        Ok(Self::from_bytes([bytes[0], bytes[1]]))
    }
}

impl fmt::Debug for StateFlag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let dir = if self.is_response() { "response" } else { "request" };
        write!(f, "StateFlag({:#06x}, {dir})", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_response_direction() {
        assert!(StateFlag::tcp_ads_request().is_request());
        assert!(!StateFlag::tcp_ads_request().is_response());
        assert!(StateFlag::tcp_ads_response().is_response());
        assert!(StateFlag::udp_ads_response().is_response());
    }

    #[test]
    fn bytes_roundtrip() {
        let flags = StateFlag::tcp_ads_response();
        assert_eq!(flags.to_bytes(), [0x05, 0x00]);
        assert_eq!(StateFlag::from_bytes(flags.to_bytes()), flags);
    }
}
