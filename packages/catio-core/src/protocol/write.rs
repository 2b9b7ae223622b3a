use super::{ProtocolError, parse_ads_frame};
use crate::ads::{
    AdsCommand, AdsError, AdsHeader, AdsReturnCode, IndexGroup, IndexOffset, StateFlag,
};
use crate::ams::AmsAddr;
use crate::io::AmsFrame;

/// A zero-copy view of an ADS Write request (command `0x0003`).
///
/// Body layout (12 + n bytes): index group u32, index offset u32,
/// length u32, data.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct WriteRequest<'a> {
    header: AdsHeader,
    index_group: IndexGroup,
    index_offset: IndexOffset,
    data: &'a [u8],
}

impl<'a> WriteRequest<'a> {
    /// The minimum size of the request body.
    pub const MIN_BODY_SIZE: usize = 12;

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

    /// Returns a zero-copy slice of the data to write.
    pub fn data(&self) -> &'a [u8] {
        self.data
    }

    /// Copies this view into an owned [`WriteRequestOwned`].
    pub fn into_owned(self) -> WriteRequestOwned {
        WriteRequestOwned {
            header: self.header,
            index_group: self.index_group,
            index_offset: self.index_offset,
            data: self.data.to_vec(),
        }
    }

    /// Parses only the body.
    pub fn parse_body(
        body: &[u8],
    ) -> Result<(IndexGroup, IndexOffset, &[u8]), ProtocolError> {
        if body.len() < Self::MIN_BODY_SIZE {
            return Err(AdsError::UnexpectedDataLength {
                expected: Self::MIN_BODY_SIZE,
                got: body.len(),
            })?;
        }

        let index_group = u32::from_le_bytes(body[0..4].try_into().unwrap());
        let index_offset = u32::from_le_bytes(body[4..8].try_into().unwrap());
        let length = u32::from_le_bytes(body[8..12].try_into().unwrap()) as usize;

        if body.len() < Self::MIN_BODY_SIZE + length {
            return Err(AdsError::UnexpectedDataLength {
                expected: Self::MIN_BODY_SIZE + length,
                got: body.len(),
            })?;
        }

        Ok((
            index_group,
            index_offset,
            &body[Self::MIN_BODY_SIZE..Self::MIN_BODY_SIZE + length],
        ))
    }
}

impl<'a> TryFrom<&'a AmsFrame> for WriteRequest<'a> {
    type Error = ProtocolError;

    fn try_from(value: &'a AmsFrame) -> Result<Self, Self::Error> {
        let (header, body) = parse_ads_frame(value, AdsCommand::Write, true)?;
        let (index_group, index_offset, data) = Self::parse_body(body)?;
        Ok(Self {
            header,
            index_group,
            index_offset,
            data,
        })
    }
}

/// A fully owned ADS Write request. Construct one on a client to send.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct WriteRequestOwned {
    header: AdsHeader,
    index_group: IndexGroup,
    index_offset: IndexOffset,
    data: Vec<u8>,
}

impl WriteRequestOwned {
    /// Creates a new request writing `data` to `(group, offset)`.
    pub fn new(
        target: AmsAddr,
        source: AmsAddr,
        invoke_id: u32,
        index_group: IndexGroup,
        index_offset: IndexOffset,
        data: impl Into<Vec<u8>>,
    ) -> Self {
        let data = data.into();
        let header = AdsHeader::new(
            target,
            source,
            AdsCommand::Write,
            StateFlag::tcp_ads_request(),
            (WriteRequest::MIN_BODY_SIZE + data.len()) as u32,
            AdsReturnCode::Ok,
            invoke_id,
        );
        Self {
            header,
            index_group,
            index_offset,
            data,
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

    /// Returns the data to write.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Serializes the request into a frame.
    pub fn to_frame(&self) -> AmsFrame {
        let mut payload = Vec::with_capacity(
            AdsHeader::LENGTH + WriteRequest::MIN_BODY_SIZE + self.data.len(),
        );
        payload.extend_from_slice(&self.header.to_bytes());
        payload.extend_from_slice(&self.index_group.to_le_bytes());
        payload.extend_from_slice(&self.index_offset.to_le_bytes());
        payload.extend_from_slice(&(self.data.len() as u32).to_le_bytes());
        payload.extend_from_slice(&self.data);
        AmsFrame::new(payload)
    }
}

/// An ADS Write response (command `0x0003`).
///
/// Body layout (4 bytes): result u32.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct WriteResponse {
    header: AdsHeader,
    result: AdsReturnCode,
}

impl WriteResponse {
    /// The size of the response body.
    pub const BODY_SIZE: usize = 4;

    /// Creates a new response. Used by a conforming server.
    pub fn new(target: AmsAddr, source: AmsAddr, invoke_id: u32, result: AdsReturnCode) -> Self {
        let header = AdsHeader::new(
            target,
            source,
            AdsCommand::Write,
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

impl TryFrom<&AmsFrame> for WriteResponse {
    type Error = ProtocolError;

    fn try_from(value: &AmsFrame) -> Result<Self, Self::Error> {
        let (header, body) = parse_ads_frame(value, AdsCommand::Write, false)?;
        let result = Self::parse_body(body)?;
        Ok(Self { header, result })
    }
}
