use super::{ProtocolError, parse_ads_frame};
use crate::ads::{
    AdsCommand, AdsError, AdsHeader, AdsReturnCode, IndexGroup, IndexOffset, StateFlag,
};
use crate::ams::AmsAddr;
use crate::io::AmsFrame;

/// A zero-copy view of an ADS Read/Write request (command `0x0009`).
///
/// A combined write-then-read in one round trip; used for handle lookups by
/// name, sum commands, and any read whose result depends on written input.
///
/// Body layout (16 + n bytes): index group u32, index offset u32,
/// read length u32, write length u32, write data.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ReadWriteRequest<'a> {
    header: AdsHeader,
    index_group: IndexGroup,
    index_offset: IndexOffset,
    read_length: u32,
    data: &'a [u8],
}

impl<'a> ReadWriteRequest<'a> {
    /// The minimum size of the request body.
    pub const MIN_BODY_SIZE: usize = 16;

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

    /// Returns the number of bytes expected back.
    pub fn read_length(&self) -> u32 {
        self.read_length
    }

    /// Returns a zero-copy slice of the write data.
    pub fn data(&self) -> &'a [u8] {
        self.data
    }

    /// Copies this view into an owned [`ReadWriteRequestOwned`].
    pub fn into_owned(self) -> ReadWriteRequestOwned {
        ReadWriteRequestOwned {
            header: self.header,
            index_group: self.index_group,
            index_offset: self.index_offset,
            read_length: self.read_length,
            data: self.data.to_vec(),
        }
    }

    /// Parses only the body.
    pub fn parse_body(
        body: &[u8],
    ) -> Result<(IndexGroup, IndexOffset, u32, &[u8]), ProtocolError> {
        if body.len() < Self::MIN_BODY_SIZE {
            return Err(AdsError::UnexpectedDataLength {
                expected: Self::MIN_BODY_SIZE,
                got: body.len(),
            })?;
        }

        let index_group = u32::from_le_bytes(body[0..4].try_into().unwrap());
        let index_offset = u32::from_le_bytes(body[4..8].try_into().unwrap());
        let read_length = u32::from_le_bytes(body[8..12].try_into().unwrap());
        let write_length = u32::from_le_bytes(body[12..16].try_into().unwrap()) as usize;

        if body.len() < Self::MIN_BODY_SIZE + write_length {
            return Err(AdsError::UnexpectedDataLength {
                expected: Self::MIN_BODY_SIZE + write_length,
                got: body.len(),
            })?;
        }

        Ok((
            index_group,
            index_offset,
            read_length,
            &body[Self::MIN_BODY_SIZE..Self::MIN_BODY_SIZE + write_length],
        ))
    }
}

impl<'a> TryFrom<&'a AmsFrame> for ReadWriteRequest<'a> {
    type Error = ProtocolError;

    fn try_from(value: &'a AmsFrame) -> Result<Self, Self::Error> {
        let (header, body) = parse_ads_frame(value, AdsCommand::ReadWrite, true)?;
        let (index_group, index_offset, read_length, data) = Self::parse_body(body)?;
        Ok(Self {
            header,
            index_group,
            index_offset,
            read_length,
            data,
        })
    }
}

/// A fully owned ADS Read/Write request. Construct one on a client to send.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ReadWriteRequestOwned {
    header: AdsHeader,
    index_group: IndexGroup,
    index_offset: IndexOffset,
    read_length: u32,
    data: Vec<u8>,
}

impl ReadWriteRequestOwned {
    /// Creates a new request writing `data` and expecting `read_length`
    /// bytes back.
    pub fn new(
        target: AmsAddr,
        source: AmsAddr,
        invoke_id: u32,
        index_group: IndexGroup,
        index_offset: IndexOffset,
        read_length: u32,
        data: impl Into<Vec<u8>>,
    ) -> Self {
        let data = data.into();
        let header = AdsHeader::new(
            target,
            source,
            AdsCommand::ReadWrite,
            StateFlag::tcp_ads_request(),
            (ReadWriteRequest::MIN_BODY_SIZE + data.len()) as u32,
            AdsReturnCode::Ok,
            invoke_id,
        );
        Self {
            header,
            index_group,
            index_offset,
            read_length,
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

    /// Returns the number of bytes expected back.
    pub fn read_length(&self) -> u32 {
        self.read_length
    }

    /// Returns the write data.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Serializes the request into a frame.
    pub fn to_frame(&self) -> AmsFrame {
        let mut payload = Vec::with_capacity(
            AdsHeader::LENGTH + ReadWriteRequest::MIN_BODY_SIZE + self.data.len(),
        );
        payload.extend_from_slice(&self.header.to_bytes());
        payload.extend_from_slice(&self.index_group.to_le_bytes());
        payload.extend_from_slice(&self.index_offset.to_le_bytes());
        payload.extend_from_slice(&self.read_length.to_le_bytes());
        payload.extend_from_slice(&(self.data.len() as u32).to_le_bytes());
        payload.extend_from_slice(&self.data);
        AmsFrame::new(payload)
    }
}

/// A zero-copy view of an ADS Read/Write response (command `0x0009`).
///
/// Body layout (8 + n bytes): result u32, length u32, data.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ReadWriteResponse<'a> {
    header: AdsHeader,
    result: AdsReturnCode,
    data: &'a [u8],
}

impl<'a> ReadWriteResponse<'a> {
    /// The minimum size of the response body.
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

    /// Copies this view into an owned [`ReadWriteResponseOwned`].
    pub fn into_owned(self) -> ReadWriteResponseOwned {
        ReadWriteResponseOwned {
            header: self.header,
            result: self.result,
            data: self.data.to_vec(),
        }
    }

    /// Parses only the body.
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

impl<'a> TryFrom<&'a AmsFrame> for ReadWriteResponse<'a> {
    type Error = ProtocolError;

    fn try_from(value: &'a AmsFrame) -> Result<Self, Self::Error> {
        let (header, body) = parse_ads_frame(value, AdsCommand::ReadWrite, false)?;
        let (result, data) = Self::parse_body(body)?;
        Ok(Self {
            header,
            result,
            data,
        })
    }
}

/// A fully owned ADS Read/Write response. Construct one on a server.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ReadWriteResponseOwned {
    header: AdsHeader,
    result: AdsReturnCode,
    data: Vec<u8>,
}

impl ReadWriteResponseOwned {
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
            AdsCommand::ReadWrite,
            StateFlag::tcp_ads_response(),
            (ReadWriteResponse::MIN_BODY_SIZE + data.len()) as u32,
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
        let mut payload = Vec::with_capacity(
            AdsHeader::LENGTH + ReadWriteResponse::MIN_BODY_SIZE + self.data.len(),
        );
        payload.extend_from_slice(&self.header.to_bytes());
        payload.extend_from_slice(&self.result.to_bytes());
        payload.extend_from_slice(&(self.data.len() as u32).to_le_bytes());
        payload.extend_from_slice(&self.data);
        AmsFrame::new(payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ads::index_group;
    use crate::ams::{AmsNetId, port};

    fn make_addrs() -> (AmsAddr, AmsAddr) {
        let target = AmsAddr::new(AmsNetId::new(10, 0, 0, 1, 3, 1), port::IO_SERVER);
        let source = AmsAddr::new(AmsNetId::new(10, 0, 0, 2, 1, 1), 8001);
        (target, source)
    }

    #[test]
    fn handle_by_name_pattern() {
        let (target, source) = make_addrs();
        let name = b"Term 2 (EL1014).Channel 1.Input\0";

        let owned = ReadWriteRequestOwned::new(
            target,
            source,
            1,
            index_group::SYM_HNDBYNAME,
            0,
            4,
            name.to_vec(),
        );
        let frame = owned.to_frame();

        let view = ReadWriteRequest::try_from(&frame).expect("Should parse");
        assert_eq!(view.index_group(), index_group::SYM_HNDBYNAME);
        assert_eq!(view.read_length(), 4);
        assert_eq!(view.data(), name);

        let handle = 0x1Au32.to_le_bytes();
        let resp = ReadWriteResponseOwned::new(source, target, 1, AdsReturnCode::Ok, handle);
        let resp_frame = resp.to_frame();
        let resp_view = ReadWriteResponse::try_from(&resp_frame).expect("Should parse");
        assert_eq!(resp_view.data(), &handle);
    }

    #[test]
    fn empty_write_data() {
        let (target, source) = make_addrs();
        let owned = ReadWriteRequestOwned::new(target, source, 1, 0xF101, 1, 88, []);
        let frame = owned.to_frame();

        let view = ReadWriteRequest::try_from(&frame).expect("Should parse");
        assert!(view.data().is_empty());
        assert_eq!(view.read_length(), 88);
    }

    #[test]
    fn response_truncated_rejected() {
        let mut body = Vec::new();
        body.extend_from_slice(&0u32.to_le_bytes());
        body.extend_from_slice(&100u32.to_le_bytes());
        body.extend_from_slice(&[0u8; 4]);

        let err = ReadWriteResponse::parse_body(&body).unwrap_err();
        assert!(matches!(err, ProtocolError::Ads(_)));
    }

    #[test]
    fn view_into_owned_roundtrip() {
        let (target, source) = make_addrs();
        let data = vec![1, 2, 3];

        let owned = ReadWriteRequestOwned::new(target, source, 4, 0x1, 0x2, 8, data.clone());
        let frame = owned.to_frame();
        let back = ReadWriteRequest::try_from(&frame).unwrap().into_owned();
        assert_eq!(back.data(), data.as_slice());
        assert_eq!(back.read_length(), 8);
    }
}
