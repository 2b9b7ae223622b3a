use super::{ProtocolError, parse_ads_frame};
use crate::ads::{AdsCommand, AdsError, AdsHeader, AdsReturnCode, AdsState, StateFlag};
use crate::ams::AmsAddr;
use crate::io::AmsFrame;

/// An ADS Read State request (command `0x0004`). Empty body.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ReadStateRequest {
    header: AdsHeader,
}

impl ReadStateRequest {
    /// Creates a new request.
    pub fn new(target: AmsAddr, source: AmsAddr, invoke_id: u32) -> Self {
        let header = AdsHeader::new(
            target,
            source,
            AdsCommand::ReadState,
            StateFlag::tcp_ads_request(),
            0,
            AdsReturnCode::Ok,
            invoke_id,
        );
        Self { header }
    }

    /// Returns the ADS header.
    pub fn header(&self) -> &AdsHeader {
        &self.header
    }

    /// Serializes the request into a frame.
    pub fn to_frame(&self) -> AmsFrame {
        AmsFrame::new(self.header.to_bytes())
    }
}

impl TryFrom<&AmsFrame> for ReadStateRequest {
    type Error = ProtocolError;

    fn try_from(value: &AmsFrame) -> Result<Self, Self::Error> {
        let (header, body) = parse_ads_frame(value, AdsCommand::ReadState, true)?;

        if !body.is_empty() {
            return Err(AdsError::UnexpectedDataLength {
                expected: 0,
                got: body.len(),
            })?;
        }

        Ok(Self { header })
    }
}

/// An ADS Read State response (command `0x0004`).
///
/// Body layout (8 bytes): result u32, ADS state u16, device state u16.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ReadStateResponse {
    header: AdsHeader,
    result: AdsReturnCode,
    ads_state: AdsState,
    device_state: u16,
}

impl ReadStateResponse {
    /// The size of the response body.
    pub const BODY_SIZE: usize = 8;

    /// Creates a new response. Used by a conforming server.
    pub fn new(
        target: AmsAddr,
        source: AmsAddr,
        invoke_id: u32,
        result: AdsReturnCode,
        ads_state: AdsState,
        device_state: u16,
    ) -> Self {
        let header = AdsHeader::new(
            target,
            source,
            AdsCommand::ReadState,
            StateFlag::tcp_ads_response(),
            Self::BODY_SIZE as u32,
            AdsReturnCode::Ok,
            invoke_id,
        );
        Self {
            header,
            result,
            ads_state,
            device_state,
        }
    }

    /// Returns the ADS header.
    pub fn header(&self) -> &AdsHeader {
        &self.header
    }

    /// Returns the result code.
    pub fn result(&self) -> AdsReturnCode {
        self.result
    }

    /// Returns the ADS state.
    pub fn ads_state(&self) -> AdsState {
        self.ads_state
    }

    /// Returns the device-specific state word.
    pub fn device_state(&self) -> u16 {
        self.device_state
    }

    /// Parses only the body.
    pub fn parse_body(body: &[u8]) -> Result<(AdsReturnCode, AdsState, u16), ProtocolError> {
        if body.len() != Self::BODY_SIZE {
            return Err(AdsError::UnexpectedDataLength {
                expected: Self::BODY_SIZE,
                got: body.len(),
            })?;
        }

        let result = AdsReturnCode::try_from_slice(&body[0..4]).map_err(AdsError::from)?;
        let ads_state = AdsState::from_bytes([body[4], body[5]]);
        let device_state = u16::from_le_bytes([body[6], body[7]]);

        Ok((result, ads_state, device_state))
    }

    /// Serializes the response into a frame.
    pub fn to_frame(&self) -> AmsFrame {
        let mut payload = Vec::with_capacity(AdsHeader::LENGTH + Self::BODY_SIZE);
        payload.extend_from_slice(&self.header.to_bytes());
        payload.extend_from_slice(&self.result.to_bytes());
        payload.extend_from_slice(&self.ads_state.to_bytes());
        payload.extend_from_slice(&self.device_state.to_le_bytes());
        AmsFrame::new(payload)
    }
}

impl TryFrom<&AmsFrame> for ReadStateResponse {
    type Error = ProtocolError;

    fn try_from(value: &AmsFrame) -> Result<Self, Self::Error> {
        let (header, body) = parse_ads_frame(value, AdsCommand::ReadState, false)?;
        let (result, ads_state, device_state) = Self::parse_body(body)?;
        Ok(Self {
            header,
            result,
            ads_state,
            device_state,
        })
    }
}
