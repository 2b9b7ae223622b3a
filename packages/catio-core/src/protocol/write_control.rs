use super::{ProtocolError, parse_ads_frame};
use crate::ads::{AdsCommand, AdsError, AdsHeader, AdsReturnCode, AdsState, StateFlag};
use crate::ams::AmsAddr;
use crate::io::AmsFrame;

/// An ADS Write Control request (command `0x0005`).
///
/// Requests a state transition on the target.
///
/// Body layout (8 + n bytes): ADS state u16, device state u16, length u32,
/// data.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct WriteControlRequest {
    header: AdsHeader,
    ads_state: AdsState,
    device_state: u16,
    data: Vec<u8>,
}

impl WriteControlRequest {
    /// The minimum size of the request body.
    pub const MIN_BODY_SIZE: usize = 8;

    /// Creates a new request asking for `ads_state`.
    pub fn new(
        target: AmsAddr,
        source: AmsAddr,
        invoke_id: u32,
        ads_state: AdsState,
        device_state: u16,
        data: impl Into<Vec<u8>>,
    ) -> Self {
        let data = data.into();
        let header = AdsHeader::new(
            target,
            source,
            AdsCommand::WriteControl,
            StateFlag::tcp_ads_request(),
            (Self::MIN_BODY_SIZE + data.len()) as u32,
            AdsReturnCode::Ok,
            invoke_id,
        );
        Self {
            header,
            ads_state,
            device_state,
            data,
        }
    }

    /// Returns the ADS header.
    pub fn header(&self) -> &AdsHeader {
        &self.header
    }

    /// Returns the requested ADS state.
    pub fn ads_state(&self) -> AdsState {
        self.ads_state
    }

    /// Returns the requested device-specific state word.
    pub fn device_state(&self) -> u16 {
        self.device_state
    }

    /// Returns the command's additional data, usually empty.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Serializes the request into a frame.
    pub fn to_frame(&self) -> AmsFrame {
        let mut payload =
            Vec::with_capacity(AdsHeader::LENGTH + Self::MIN_BODY_SIZE + self.data.len());
        payload.extend_from_slice(&self.header.to_bytes());
        payload.extend_from_slice(&self.ads_state.to_bytes());
        payload.extend_from_slice(&self.device_state.to_le_bytes());
        payload.extend_from_slice(&(self.data.len() as u32).to_le_bytes());
        payload.extend_from_slice(&self.data);
        AmsFrame::new(payload)
    }
}

impl TryFrom<&AmsFrame> for WriteControlRequest {
    type Error = ProtocolError;

    fn try_from(value: &AmsFrame) -> Result<Self, Self::Error> {
        let (header, body) = parse_ads_frame(value, AdsCommand::WriteControl, true)?;

        if body.len() < Self::MIN_BODY_SIZE {
            return Err(AdsError::UnexpectedDataLength {
                expected: Self::MIN_BODY_SIZE,
                got: body.len(),
            })?;
        }

        let ads_state = AdsState::from_bytes([body[0], body[1]]);
        let device_state = u16::from_le_bytes([body[2], body[3]]);
        let length = u32::from_le_bytes(body[4..8].try_into().unwrap()) as usize;

        if body.len() < Self::MIN_BODY_SIZE + length {
            return Err(AdsError::UnexpectedDataLength {
                expected: Self::MIN_BODY_SIZE + length,
                got: body.len(),
            })?;
        }

        Ok(Self {
            header,
            ads_state,
            device_state,
            data: body[Self::MIN_BODY_SIZE..Self::MIN_BODY_SIZE + length].to_vec(),
        })
    }
}

/// An ADS Write Control response (command `0x0005`).
///
/// Body layout (4 bytes): result u32.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct WriteControlResponse {
    header: AdsHeader,
    result: AdsReturnCode,
}

impl WriteControlResponse {
    /// The size of the response body.
    pub const BODY_SIZE: usize = 4;

    /// Creates a new response. Used by a conforming server.
    pub fn new(target: AmsAddr, source: AmsAddr, invoke_id: u32, result: AdsReturnCode) -> Self {
        let header = AdsHeader::new(
            target,
            source,
            AdsCommand::WriteControl,
            StateFlag::tcp_ads_response(),
            Self::BODY_SIZE as u32,
            AdsReturnCode::Ok,
            invoke_id,
        );
        Self { header, result }
    }

    /// Returns the ADS header.
    pub fn header(&self) -> &AdsHeader {
        &self.header
    }

    /// Returns the result code.
    pub fn result(&self) -> AdsReturnCode {
        self.result
    }

    /// Parses only the body.
    pub fn parse_body(body: &[u8]) -> Result<AdsReturnCode, ProtocolError> {
        if body.len() != Self::BODY_SIZE {
            return Err(AdsError::UnexpectedDataLength {
                expected: Self::BODY_SIZE,
                got: body.len(),
            })?;
        }
        Ok(AdsReturnCode::try_from_slice(body).map_err(AdsError::from)?)
    }

    /// Serializes the response into a frame.
    pub fn to_frame(&self) -> AmsFrame {
        let mut payload = Vec::with_capacity(AdsHeader::LENGTH + Self::BODY_SIZE);
        payload.extend_from_slice(&self.header.to_bytes());
        payload.extend_from_slice(&self.result.to_bytes());
        AmsFrame::new(payload)
    }
}

impl TryFrom<&AmsFrame> for WriteControlResponse {
    type Error = ProtocolError;

    fn try_from(value: &AmsFrame) -> Result<Self, Self::Error> {
        let (header, body) = parse_ads_frame(value, AdsCommand::WriteControl, false)?;
        let result = Self::parse_body(body)?;
        Ok(Self { header, result })
    }
}
