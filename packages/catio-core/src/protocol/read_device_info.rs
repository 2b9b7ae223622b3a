use super::{ProtocolError, parse_ads_frame};
use crate::ads::{
    AdsCommand, AdsError, AdsHeader, AdsReturnCode, FixedString, StateFlag,
};
use crate::ams::AmsAddr;
use crate::io::AmsFrame;

/// An ADS Read Device Info request (command `0x0001`).
///
/// Queries the target's name and version. The body is empty.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ReadDeviceInfoRequest {
    header: AdsHeader,
}

impl ReadDeviceInfoRequest {
    /// Creates a new request.
    pub fn new(target: AmsAddr, source: AmsAddr, invoke_id: u32) -> Self {
        let header = AdsHeader::new(
            target,
            source,
            AdsCommand::ReadDeviceInfo,
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

impl TryFrom<&AmsFrame> for ReadDeviceInfoRequest {
    type Error = ProtocolError;

    fn try_from(value: &AmsFrame) -> Result<Self, Self::Error> {
        let (header, body) = parse_ads_frame(value, AdsCommand::ReadDeviceInfo, true)?;

        if !body.is_empty() {
            return Err(AdsError::UnexpectedDataLength {
                expected: 0,
                got: body.len(),
            })?;
        }

        Ok(Self { header })
    }
}

/// The name, version, and build number reported by a device.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DeviceInfo {
    /// Major version.
    pub major: u8,
    /// Minor version.
    pub minor: u8,
    /// Build number.
    pub build: u16,
    /// Device name, NUL-padded to 16 bytes on the wire.
    pub name: FixedString<16>,
}

impl DeviceInfo {
    /// Formats the version as `"<major>-<minor>"`.
    pub fn version(&self) -> String {
        format!("{}-{}", self.major, self.minor)
    }
}

/// An ADS Read Device Info response (command `0x0001`).
///
/// Body layout (24 bytes): result u32, major u8, minor u8, build u16,
/// name 16 bytes.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ReadDeviceInfoResponse {
    header: AdsHeader,
    result: AdsReturnCode,
    info: DeviceInfo,
}

impl ReadDeviceInfoResponse {
    /// The size of the response body.
    pub const BODY_SIZE: usize = 24;

    /// Creates a new response. Used by a conforming server.
    pub fn new(
        target: AmsAddr,
        source: AmsAddr,
        invoke_id: u32,
        result: AdsReturnCode,
        info: DeviceInfo,
    ) -> Self {
        let header = AdsHeader::new(
            target,
            source,
            AdsCommand::ReadDeviceInfo,
            StateFlag::tcp_ads_response(),
            Self::BODY_SIZE as u32,
            AdsReturnCode::Ok,
            invoke_id,
        );
        Self {
            header,
            result,
            info,
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

    /// Returns the reported device info.
    pub fn info(&self) -> &DeviceInfo {
        &self.info
    }

    /// Parses only the body (result + version + name).
    pub fn parse_body(body: &[u8]) -> Result<(AdsReturnCode, DeviceInfo), ProtocolError> {
        if body.len() < Self::BODY_SIZE {
            return Err(AdsError::UnexpectedDataLength {
                expected: Self::BODY_SIZE,
                got: body.len(),
            })?;
        }

        let result = AdsReturnCode::try_from_slice(&body[0..4]).map_err(AdsError::from)?;
        let major = body[4];
        let minor = body[5];
        let build = u16::from_le_bytes([body[6], body[7]]);
        let name = FixedString::<16>::try_from_slice(&body[8..24]).map_err(AdsError::from)?;

        Ok((
            result,
            DeviceInfo {
                major,
                minor,
                build,
                name,
            },
        ))
    }

    /// Serializes the response into a frame.
    pub fn to_frame(&self) -> AmsFrame {
        let mut payload = Vec::with_capacity(AdsHeader::LENGTH + Self::BODY_SIZE);
        payload.extend_from_slice(&self.header.to_bytes());
        payload.extend_from_slice(&self.result.to_bytes());
        payload.push(self.info.major);
        payload.push(self.info.minor);
        payload.extend_from_slice(&self.info.build.to_le_bytes());
        payload.extend_from_slice(self.info.name.as_bytes());
        AmsFrame::new(payload)
    }
}

impl TryFrom<&AmsFrame> for ReadDeviceInfoResponse {
    type Error = ProtocolError;

    fn try_from(value: &AmsFrame) -> Result<Self, Self::Error> {
        let (header, body) = parse_ads_frame(value, AdsCommand::ReadDeviceInfo, false)?;
        let (result, info) = Self::parse_body(body)?;
        Ok(Self {
            header,
            result,
            info,
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
        let req = ReadDeviceInfoRequest::new(target, source, 7);
        let frame = req.to_frame();

        let parsed = ReadDeviceInfoRequest::try_from(&frame).expect("Should parse");
        assert_eq!(parsed.header().invoke_id(), 7);
        assert_eq!(parsed.header().command_id(), AdsCommand::ReadDeviceInfo);
    }

    #[test]
    fn response_roundtrip() {
        let (target, source) = make_addrs();
        let info = DeviceInfo {
            major: 3,
            minor: 1,
            build: 4024,
            name: FixedString::from_str_checked("I/O Server").unwrap(),
        };

        let resp =
            ReadDeviceInfoResponse::new(source, target, 7, AdsReturnCode::Ok, info.clone());
        let frame = resp.to_frame();

        let parsed = ReadDeviceInfoResponse::try_from(&frame).expect("Should parse");
        assert_eq!(parsed.result(), AdsReturnCode::Ok);
        assert_eq!(parsed.info().name.as_str(), "I/O Server");
        assert_eq!(parsed.info().version(), "3-1");
        assert_eq!(parsed.info().build, 4024);
    }

    #[test]
    fn short_body_rejected() {
        let err = ReadDeviceInfoResponse::parse_body(&[0u8; 8]).unwrap_err();
        assert!(matches!(err, ProtocolError::Ads(_)));
    }
}
