use super::{ProtocolError, parse_ads_frame};
use crate::ads::{
    AdsCommand, AdsError, AdsHeader, AdsReturnCode, NotificationHandle, StateFlag,
};
use crate::ams::AmsAddr;
use crate::io::AmsFrame;

/// An ADS Delete Device Notification request (command `0x0007`).
///
/// Body layout (4 bytes): notification handle u32.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DeleteNotificationRequest {
    header: AdsHeader,
    handle: NotificationHandle,
}

impl DeleteNotificationRequest {
    /// The size of the request body.
    pub const BODY_SIZE: usize = 4;

    /// Creates a new request cancelling `handle`.
    pub fn new(
        target: AmsAddr,
        source: AmsAddr,
        invoke_id: u32,
        handle: NotificationHandle,
    ) -> Self {
        let header = AdsHeader::new(
            target,
            source,
            AdsCommand::DeleteDeviceNotification,
            StateFlag::tcp_ads_request(),
            Self::BODY_SIZE as u32,
            AdsReturnCode::Ok,
            invoke_id,
        );
        Self { header, handle }
    }

    /// Returns the ADS header.
    pub fn header(&self) -> &AdsHeader {
        &self.header
    }

    /// Returns the handle to cancel.
    pub fn handle(&self) -> NotificationHandle {
        self.handle
    }

    /// Serializes the request into a frame.
    pub fn to_frame(&self) -> AmsFrame {
        let mut payload = Vec::with_capacity(AdsHeader::LENGTH + Self::BODY_SIZE);
        payload.extend_from_slice(&self.header.to_bytes());
        payload.extend_from_slice(&self.handle.to_bytes());
        AmsFrame::new(payload)
    }
}

impl TryFrom<&AmsFrame> for DeleteNotificationRequest {
    type Error = ProtocolError;

    fn try_from(value: &AmsFrame) -> Result<Self, Self::Error> {
        let (header, body) = parse_ads_frame(value, AdsCommand::DeleteDeviceNotification, true)?;

        if body.len() != Self::BODY_SIZE {
            return Err(AdsError::UnexpectedDataLength {
                expected: Self::BODY_SIZE,
                got: body.len(),
            })?;
        }

        Ok(Self {
            header,
            handle: NotificationHandle::try_from_slice(body).map_err(AdsError::from)?,
        })
    }
}

/// An ADS Delete Device Notification response (command `0x0007`).
///
/// Body layout (4 bytes): result u32.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DeleteNotificationResponse {
    header: AdsHeader,
    result: AdsReturnCode,
}

impl DeleteNotificationResponse {
    /// The size of the response body.
    pub const BODY_SIZE: usize = 4;

    /// Creates a new response. Used by a conforming server.
    pub fn new(target: AmsAddr, source: AmsAddr, invoke_id: u32, result: AdsReturnCode) -> Self {
        let header = AdsHeader::new(
            target,
            source,
            AdsCommand::DeleteDeviceNotification,
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

impl TryFrom<&AmsFrame> for DeleteNotificationResponse {
    type Error = ProtocolError;

    fn try_from(value: &AmsFrame) -> Result<Self, Self::Error> {
        let (header, body) = parse_ads_frame(value, AdsCommand::DeleteDeviceNotification, false)?;
        let result = Self::parse_body(body)?;
        Ok(Self { header, result })
    }
}
