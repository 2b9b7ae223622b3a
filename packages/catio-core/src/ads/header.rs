use super::command::AdsCommand;
use super::error::AdsHeaderError;
use super::return_code::AdsReturnCode;
use super::state_flag::StateFlag;
use crate::ams::AmsAddr;

/// The 32-byte ADS header that opens every frame payload.
///
/// Contains routing (target and source AMS address), the command id, state
/// flags, the length of the command body that follows, an error code, and
/// the invoke id used to match responses to requests.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AdsHeader {
    target: AmsAddr,
    source: AmsAddr,
    command_id: AdsCommand,
    state_flags: StateFlag,
    length: u32,
    error_code: AdsReturnCode,
    invoke_id: u32,
}

impl AdsHeader {
    /// The length of the ADS header on the wire.
    pub const LENGTH: usize = 32;

    /// Creates a new ADS header.
    pub fn new(
        target: AmsAddr,
        source: AmsAddr,
        command_id: AdsCommand,
        state_flags: StateFlag,
        length: u32,
        error_code: AdsReturnCode,
        invoke_id: u32,
    ) -> Self {
        Self {
            target,
            source,
            command_id,
            state_flags,
            length,
            error_code,
            invoke_id,
        }
    }

    /// The address the frame is directed to.
    pub fn target(&self) -> &AmsAddr {
        &self.target
    }

    /// The address the frame originates from.
    pub fn source(&self) -> &AmsAddr {
        &self.source
    }

    /// The command id of the request or response.
    pub fn command_id(&self) -> AdsCommand {
        self.command_id
    }

    /// Request/response direction and transport flags.
    pub fn state_flags(&self) -> StateFlag {
        self.state_flags
    }

    /// The byte length of the command body following this header.
    pub fn length(&self) -> u32 {
        self.length
    }

    /// The error code. Non-zero only on responses.
    pub fn error_code(&self) -> AdsReturnCode {
        self.error_code
    }

    /// The correlation id matching this frame to its request.
    pub fn invoke_id(&self) -> u32 {
        self.invoke_id
    }

    /// Serializes the header into a byte array.
    pub fn to_bytes(&self) -> [u8; Self::LENGTH] {
        self.into()
    }

    /// Parses a header from a byte array.
    pub fn from_bytes(bytes: [u8; Self::LENGTH]) -> Self {
        Self::from(&bytes)
    }

    /// Splits a frame payload into its ADS header and command body.
    ///
    /// Fails if the buffer is shorter than a header or if the header's
    /// declared body length disagrees with the bytes actually present.
    pub fn parse_prefix(payload: &[u8]) -> Result<(Self, &[u8]), AdsHeaderError> {
        if payload.len() < Self::LENGTH {
            return Err(AdsHeaderError::UnexpectedLength {
                expected: Self::LENGTH,
                got: payload.len(),
            });
        }

        let header = Self::from(
            &<[u8; Self::LENGTH]>::try_from(&payload[..Self::LENGTH]).unwrap(),
        );
        let body = &payload[Self::LENGTH..];

        if body.len() != header.length as usize {
            return Err(AdsHeaderError::BodyLengthMismatch {
                declared: header.length as usize,
                got: body.len(),
            });
        }

        Ok((header, body))
    }
}

impl From<&AdsHeader> for [u8; AdsHeader::LENGTH] {
    fn from(value: &AdsHeader) -> Self {
        let mut buf = [0u8; AdsHeader::LENGTH];

        buf[0..8].copy_from_slice(&value.target.to_bytes());
        buf[8..16].copy_from_slice(&value.source.to_bytes());
        buf[16..18].copy_from_slice(&value.command_id.to_bytes());
        buf[18..20].copy_from_slice(&value.state_flags.to_bytes());
        buf[20..24].copy_from_slice(&value.length.to_le_bytes());
        buf[24..28].copy_from_slice(&value.error_code.to_bytes());
        buf[28..32].copy_from_slice(&value.invoke_id.to_le_bytes());

        buf
    }
}

impl From<&[u8; AdsHeader::LENGTH]> for AdsHeader {
    fn from(value: &[u8; AdsHeader::LENGTH]) -> Self {
        Self {
            target: AmsAddr::from_bytes(value[0..8].try_into().unwrap()),
            source: AmsAddr::from_bytes(value[8..16].try_into().unwrap()),
            command_id: AdsCommand::from_bytes(value[16..18].try_into().unwrap()),
            state_flags: StateFlag::from_bytes(value[18..20].try_into().unwrap()),
            length: u32::from_le_bytes(value[20..24].try_into().unwrap()),
            error_code: AdsReturnCode::from_bytes(value[24..28].try_into().unwrap()),
            invoke_id: u32::from_le_bytes(value[28..32].try_into().unwrap()),
        }
    }
}

impl From<[u8; AdsHeader::LENGTH]> for AdsHeader {
    fn from(value: [u8; AdsHeader::LENGTH]) -> Self {
        (&value).into()
    }
}
