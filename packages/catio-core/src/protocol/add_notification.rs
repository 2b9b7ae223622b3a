use super::{ProtocolError, parse_ads_frame};
use crate::ads::{
    AdsCommand, AdsError, AdsHeader, AdsReturnCode, AdsTransMode, IndexGroup, IndexOffset,
    NotificationHandle, StateFlag,
};
use crate::ams::AmsAddr;
use crate::io::AmsFrame;

/// The transmission policy of a notification subscription.
///
/// `max_delay` and `cycle_time` are in 100-nanosecond units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct NotificationSettings {
    /// When the server transmits.
    pub mode: AdsTransMode,
    /// Longest time the server may hold a sample back, in 100 ns units.
    pub max_delay: u32,
    /// Sampling interval, in 100 ns units.
    pub cycle_time: u32,
}

impl NotificationSettings {
    /// Server-cycle sampling at the given interval in 100 ns units.
    pub fn server_cycle(cycle_time: u32) -> Self {
        Self {
            mode: AdsTransMode::ServerCycle,
            max_delay: 0,
            cycle_time,
        }
    }

    /// Server-side on-change detection at the given check interval.
    pub fn server_on_change(cycle_time: u32) -> Self {
        Self {
            mode: AdsTransMode::ServerOnChange,
            max_delay: 0,
            cycle_time,
        }
    }
}

/// An ADS Add Device Notification request (command `0x0006`).
///
/// Body layout (40 bytes): index group u32, index offset u32, length u32,
/// transmission mode u32, max delay u32, cycle time u32, 16 reserved bytes.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AddNotificationRequest {
    header: AdsHeader,
    index_group: IndexGroup,
    index_offset: IndexOffset,
    length: u32,
    settings: NotificationSettings,
}

impl AddNotificationRequest {
    /// The size of the request body.
    pub const BODY_SIZE: usize = 40;

    /// Creates a new request watching `length` bytes at `(group, offset)`.
    pub fn new(
        target: AmsAddr,
        source: AmsAddr,
        invoke_id: u32,
        index_group: IndexGroup,
        index_offset: IndexOffset,
        length: u32,
        settings: NotificationSettings,
    ) -> Self {
        let header = AdsHeader::new(
            target,
            source,
            AdsCommand::AddDeviceNotification,
            StateFlag::tcp_ads_request(),
            Self::BODY_SIZE as u32,
            AdsReturnCode::Ok,
            invoke_id,
        );
        Self {
            header,
            index_group,
            index_offset,
            length,
            settings,
        }
    }

    /// Returns the ADS header.
    pub fn header(&self) -> &AdsHeader {
        &self.header
    }

    /// Returns the index group.
    pub fn index_group(&self) -> IndexGroup {
        self.index_group
    }

    /// Returns the index offset.
    pub fn index_offset(&self) -> IndexOffset {
        self.index_offset
    }

    /// Returns the watched byte length.
    pub fn length(&self) -> u32 {
        self.length
    }

    /// Returns the transmission policy.
    pub fn settings(&self) -> NotificationSettings {
        self.settings
    }

    /// Serializes the request into a frame.
    pub fn to_frame(&self) -> AmsFrame {
        let mut payload = Vec::with_capacity(AdsHeader::LENGTH + Self::BODY_SIZE);
        payload.extend_from_slice(&self.header.to_bytes());
        payload.extend_from_slice(&self.index_group.to_le_bytes());
        payload.extend_from_slice(&self.index_offset.to_le_bytes());
        payload.extend_from_slice(&self.length.to_le_bytes());
        payload.extend_from_slice(&self.settings.mode.to_bytes());
        payload.extend_from_slice(&self.settings.max_delay.to_le_bytes());
        payload.extend_from_slice(&self.settings.cycle_time.to_le_bytes());
        payload.extend_from_slice(&[0u8; 16]);
        AmsFrame::new(payload)
    }
}

impl TryFrom<&AmsFrame> for AddNotificationRequest {
    type Error = ProtocolError;

    fn try_from(value: &AmsFrame) -> Result<Self, Self::Error> {
        let (header, body) = parse_ads_frame(value, AdsCommand::AddDeviceNotification, true)?;

        if body.len() != Self::BODY_SIZE {
            return Err(AdsError::UnexpectedDataLength {
                expected: Self::BODY_SIZE,
                got: body.len(),
            })?;
        }

        Ok(Self {
            header,
            index_group: u32::from_le_bytes(body[0..4].try_into().unwrap()),
            index_offset: u32::from_le_bytes(body[4..8].try_into().unwrap()),
            length: u32::from_le_bytes(body[8..12].try_into().unwrap()),
            settings: NotificationSettings {
                mode: AdsTransMode::from_bytes(body[12..16].try_into().unwrap()),
                max_delay: u32::from_le_bytes(body[16..20].try_into().unwrap()),
                cycle_time: u32::from_le_bytes(body[20..24].try_into().unwrap()),
            },
        })
    }
}

/// An ADS Add Device Notification response (command `0x0006`).
///
/// Body layout (8 bytes): result u32, notification handle u32.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AddNotificationResponse {
    header: AdsHeader,
    result: AdsReturnCode,
    handle: NotificationHandle,
}

impl AddNotificationResponse {
    /// The size of the response body.
    pub const BODY_SIZE: usize = 8;

    /// Creates a new response assigning `handle`. Used by a conforming server.
    pub fn new(
        target: AmsAddr,
        source: AmsAddr,
        invoke_id: u32,
        result: AdsReturnCode,
        handle: NotificationHandle,
    ) -> Self {
        let header = AdsHeader::new(
            target,
            source,
            AdsCommand::AddDeviceNotification,
            StateFlag::tcp_ads_response(),
            Self::BODY_SIZE as u32,
            AdsReturnCode::Ok,
            invoke_id,
        );
        Self {
            header,
            result,
            handle,
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

    /// Returns the server-assigned handle.
    pub fn handle(&self) -> NotificationHandle {
        self.handle
    }

    /// Parses only the body.
    pub fn parse_body(
        body: &[u8],
    ) -> Result<(AdsReturnCode, NotificationHandle), ProtocolError> {
        if body.len() != Self::BODY_SIZE {
            return Err(AdsError::UnexpectedDataLength {
                expected: Self::BODY_SIZE,
                got: body.len(),
            })?;
        }

        let result = AdsReturnCode::try_from_slice(&body[0..4]).map_err(AdsError::from)?;
        let handle = NotificationHandle::try_from_slice(&body[4..8]).map_err(AdsError::from)?;
        Ok((result, handle))
    }

    /// Serializes the response into a frame.
    pub fn to_frame(&self) -> AmsFrame {
        let mut payload = Vec::with_capacity(AdsHeader::LENGTH + Self::BODY_SIZE);
        payload.extend_from_slice(&self.header.to_bytes());
        payload.extend_from_slice(&self.result.to_bytes());
        payload.extend_from_slice(&self.handle.to_bytes());
        AmsFrame::new(payload)
    }
}

impl TryFrom<&AmsFrame> for AddNotificationResponse {
    type Error = ProtocolError;

    fn try_from(value: &AmsFrame) -> Result<Self, Self::Error> {
        let (header, body) = parse_ads_frame(value, AdsCommand::AddDeviceNotification, false)?;
        let (result, handle) = Self::parse_body(body)?;
        Ok(Self {
            header,
            result,
            handle,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ams::{AmsNetId, port};

    fn make_addrs() -> (AmsAddr, AmsAddr) {
        let target = AmsAddr::new(AmsNetId::new(10, 0, 0, 1, 3, 1), port::IO_SERVER);
        let source = AmsAddr::new(AmsNetId::new(10, 0, 0, 2, 1, 1), 8001);
        (target, source)
    }

    #[test]
    fn request_roundtrip() {
        let (target, source) = make_addrs();
        // 100 ms sampling expressed in 100 ns units
        let settings = NotificationSettings::server_cycle(1_000_000);

        let req = AddNotificationRequest::new(target, source, 6, 0xF020, 0x04, 2, settings);
        let frame = req.to_frame();

        let parsed = AddNotificationRequest::try_from(&frame).expect("Should parse");
        assert_eq!(parsed.index_group(), 0xF020);
        assert_eq!(parsed.length(), 2);
        assert_eq!(parsed.settings().mode, AdsTransMode::ServerCycle);
        assert_eq!(parsed.settings().cycle_time, 1_000_000);
    }

    #[test]
    fn response_roundtrip() {
        let (target, source) = make_addrs();
        let handle = NotificationHandle::new(0x77);

        let resp = AddNotificationResponse::new(source, target, 6, AdsReturnCode::Ok, handle);
        let parsed = AddNotificationResponse::try_from(&resp.to_frame()).expect("Should parse");
        assert_eq!(parsed.handle(), handle);
        assert_eq!(parsed.result(), AdsReturnCode::Ok);
    }

    #[test]
    fn short_request_body_rejected() {
        let (target, source) = make_addrs();
        let settings = NotificationSettings::server_on_change(10_000);
        let req = AddNotificationRequest::new(target, source, 1, 0x1, 0x2, 4, settings);

        let mut payload = req.to_frame().into_payload();
        payload.truncate(AdsHeader::LENGTH + 24); // drop the reserved block
        // fix up the declared body length so the header parses
        payload[20..24].copy_from_slice(&24u32.to_le_bytes());
        let frame = AmsFrame::new(payload);

        let err = AddNotificationRequest::try_from(&frame).unwrap_err();
        assert!(matches!(err, ProtocolError::Ads(_)));
    }
}
