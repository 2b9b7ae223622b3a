use super::{ProtocolError, parse_ads_frame};
use crate::ads::{
    AdsCommand, AdsError, AdsHeader, AdsReturnCode, IndexGroup, IndexOffset, StateFlag,
};
use crate::ams::AmsAddr;
use crate::io::AmsFrame;

/// An ADS Read request (command `0x0002`).
///
/// Body layout (12 bytes): index group u32, index offset u32, length u32.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ReadRequest {
    header: AdsHeader,
    index_group: IndexGroup,
    index_offset: IndexOffset,
    length: u32,
}

impl ReadRequest {
    /// The size of the request body.
    pub const BODY_SIZE: usize = 12;

    /// Creates a new request for `length` bytes at `(group, offset)`.
    pub fn new(
        target: AmsAddr,
        source: AmsAddr,
        invoke_id: u32,
        index_group: IndexGroup,
        index_offset: IndexOffset,
        length: u32,
    ) -> Self {
        let header = AdsHeader::new(
            target,
            source,
            AdsCommand::Read,
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

    /// Returns the number of bytes requested.
    pub fn length(&self) -> u32 {
        self.length
    }

    /// Serializes the request into a frame.
    pub fn to_frame(&self) -> AmsFrame {
        let mut payload = Vec::with_capacity(AdsHeader::LENGTH + Self::BODY_SIZE);
        payload.extend_from_slice(&self.header.to_bytes());
        payload.extend_from_slice(&self.index_group.to_le_bytes());
        payload.extend_from_slice(&self.index_offset.to_le_bytes());
        payload.extend_from_slice(&self.length.to_le_bytes());
        AmsFrame::new(payload)
    }
}

impl TryFrom<&AmsFrame> for ReadRequest {
    type Error = ProtocolError;

    fn try_from(value: &AmsFrame) -> Result<Self, Self::Error> {
        let (header, body) = parse_ads_frame(value, AdsCommand::Read, true)?;

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
        })
    }
}

/// A zero-copy view of an ADS Read response (command `0x0002`).
///
/// Body layout (8 + n bytes): result u32, length u32, data.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ReadResponse<'a> {
    header: AdsHeader,
    result: AdsReturnCode,
    data: &'a [u8],
}

impl<'a> ReadResponse<'a> {
    /// The minimum size of the response body (result + length).
    pub const MIN_BODY_SIZE: usize = 8;

    /// Returns the ADS header.
    pub fn header(&self) -> &AdsHeader {
        &self.header
    }

    /// Returns the result code.
    pub fn result(&self) -> AdsReturnCode {
        self.result
    }

    /// Returns a zero-copy slice of the data read.
    pub fn data(&self) -> &'a [u8] {
        self.data
    }

    /// Copies this view into an owned [`ReadResponseOwned`].
    pub fn into_owned(self) -> ReadResponseOwned {
        ReadResponseOwned {
            header: self.header,
            result: self.result,
            data: self.data.to_vec(),
        }
    }

    /// Parses only the body (result + length + data).
    pub fn parse_body(body: &[u8]) -> Result<(AdsReturnCode, &[u8]), ProtocolError> {
        if body.len() < Self::MIN_BODY_SIZE {
            return Err(AdsError::UnexpectedDataLength {
                expected: Self::MIN_BODY_SIZE,
                got: body.len(),
            })?;
        }

        let result = AdsReturnCode::try_from_slice(&body[0..4]).map_err(AdsError::from)?;
        let length = u32::from_le_bytes(body[4..8].try_into().unwrap()) as usize;

        if body.len() < Self::MIN_BODY_SIZE + length {
            return Err(AdsError::UnexpectedDataLength {
                expected: Self::MIN_BODY_SIZE + length,
                got: body.len(),
            })?;
        }

        Ok((result, &body[Self::MIN_BODY_SIZE..Self::MIN_BODY_SIZE + length]))
    }
}

impl<'a> TryFrom<&'a AmsFrame> for ReadResponse<'a> {
    type Error = ProtocolError;

    fn try_from(value: &'a AmsFrame) -> Result<Self, Self::Error> {
        let (header, body) = parse_ads_frame(value, AdsCommand::Read, false)?;
        let (result, data) = Self::parse_body(body)?;
        Ok(Self {
            header,
            result,
            data,
        })
    }
}

/// A fully owned ADS Read response. Construct one on a server, or convert a
/// view with [`ReadResponse::into_owned`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ReadResponseOwned {
    header: AdsHeader,
    result: AdsReturnCode,
    data: Vec<u8>,
}

impl ReadResponseOwned {
    /// Creates a new response carrying `data`.
    pub fn new(
        target: AmsAddr,
        source: AmsAddr,
        invoke_id: u32,
        result: AdsReturnCode,
        data: impl Into<Vec<u8>>,
    ) -> Self {
        let data = data.into();
        let header = AdsHeader::new(
            target,
            source,
            AdsCommand::Read,
            StateFlag::tcp_ads_response(),
            (ReadResponse::MIN_BODY_SIZE + data.len()) as u32,
            AdsReturnCode::Ok,
            invoke_id,
        );
        Self {
            header,
            result,
            data,
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

    /// Returns the data read.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Serializes the response into a frame.
    pub fn to_frame(&self) -> AmsFrame {
        let mut payload =
            Vec::with_capacity(AdsHeader::LENGTH + ReadResponse::MIN_BODY_SIZE + self.data.len());
        payload.extend_from_slice(&self.header.to_bytes());
        payload.extend_from_slice(&self.result.to_bytes());
        payload.extend_from_slice(&(self.data.len() as u32).to_le_bytes());
        payload.extend_from_slice(&self.data);
        AmsFrame::new(payload)
    }
}
