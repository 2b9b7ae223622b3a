use super::tag::{Tag, TagId};
use crate::ams::AmsAddr;

/// The magic cookie opening every discovery frame.
pub const UDP_COOKIE: [u8; 4] = [0x03, 0x66, 0x14, 0x71];

/// Bit 31 of the service id, set on responses.
pub const RESPONSE_BIT: u32 = 0x8000_0000;

/// The service requested by a discovery frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ServiceId {
    /// Ask the peer to identify itself (host name, Net ID, version).
    Identify,
    /// Ask the peer to store a route to the sender.
    AddRoute,
    /// Ask the peer to drop a stored route.
    DelRoute,
    /// A service this crate does not know.
    Unknown(u32),
}

impl From<u32> for ServiceId {
    fn from(value: u32) -> Self {
        match value {
            1 => Self::Identify,
            6 => Self::AddRoute,
            7 => Self::DelRoute,
            n => Self::Unknown(n),
        }
    }
}

impl From<ServiceId> for u32 {
    fn from(value: ServiceId) -> Self {
        match value {
            ServiceId::Identify => 1,
            ServiceId::AddRoute => 6,
            ServiceId::DelRoute => 7,
            ServiceId::Unknown(n) => n,
        }
    }
}

/// Errors from the UDP discovery codec.
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum UdpError {
    #[error("Datagram truncated: expected {expected} bytes, got {got}")]
    Truncated { expected: usize, got: usize },

    #[error("Bad magic cookie: {got:02x?}")]
    BadCookie { got: [u8; 4] },

    #[error("Tag {id:?} too short: expected {expected} bytes, got {got}")]
    TagTooShort {
        id: TagId,
        expected: usize,
        got: usize,
    },

    #[error("Required tag {id:?} missing from frame")]
    MissingTag { id: TagId },
}

/// A single discovery datagram.
///
/// Wire layout: cookie (4 bytes), invoke id u32, service id u32 (bit 31 set
/// on responses), sender AMS address (8 bytes), tag count u32, tags.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct UdpFrame {
    invoke_id: u32,
    service: ServiceId,
    is_response: bool,
    sender: AmsAddr,
    tags: Vec<Tag>,
}

impl UdpFrame {
    /// The fixed prefix of a datagram (cookie + invoke + service + sender).
    pub const HEAD_SIZE: usize = 4 + 4 + 4 + AmsAddr::LENGTH + 4;

    /// Creates a request frame.
    pub fn request(
        invoke_id: u32,
        service: ServiceId,
        sender: AmsAddr,
        tags: impl Into<Vec<Tag>>,
    ) -> Self {
        Self {
            invoke_id,
            service,
            is_response: false,
            sender,
            tags: tags.into(),
        }
    }

    /// Creates a response frame.
    pub fn response(
        invoke_id: u32,
        service: ServiceId,
        sender: AmsAddr,
        tags: impl Into<Vec<Tag>>,
    ) -> Self {
        Self {
            invoke_id,
            service,
            is_response: true,
            sender,
            tags: tags.into(),
        }
    }

    /// Returns the invoke id.
    pub fn invoke_id(&self) -> u32 {
        self.invoke_id
    }

    /// Returns the requested service.
    pub fn service(&self) -> ServiceId {
        self.service
    }

    /// Returns `true` if the response bit is set.
    pub fn is_response(&self) -> bool {
        self.is_response
    }

    /// Returns the sender's AMS address.
    pub fn sender(&self) -> AmsAddr {
        self.sender
    }

    /// Returns the tags in wire order.
    pub fn tags(&self) -> &[Tag] {
        &self.tags
    }

    /// Returns the first tag with the given id.
    pub fn tag(&self, id: TagId) -> Option<&Tag> {
        self.tags.iter().find(|t| t.id() == id)
    }

    /// Returns the first tag with the given id, or a `MissingTag` error.
    pub fn require_tag(&self, id: TagId) -> Result<&Tag, UdpError> {
        self.tag(id).ok_or(UdpError::MissingTag { id })
    }

    /// Serializes the datagram.
    pub fn to_vec(&self) -> Vec<u8> {
        let tags_wire: usize = self.tags.iter().map(|t| t.wire_size()).sum();
        let mut out = Vec::with_capacity(Self::HEAD_SIZE + tags_wire);

        out.extend_from_slice(&UDP_COOKIE);
        out.extend_from_slice(&self.invoke_id.to_le_bytes());
        let mut service = u32::from(self.service);
        if self.is_response {
            service |= RESPONSE_BIT;
        }
        out.extend_from_slice(&service.to_le_bytes());
        out.extend_from_slice(&self.sender.to_bytes());
        out.extend_from_slice(&(self.tags.len() as u32).to_le_bytes());
        for tag in &self.tags {
            tag.write_into(&mut out);
        }
        out
    }

    /// Parses a datagram.
    pub fn parse(bytes: &[u8]) -> Result<Self, UdpError> {
        if bytes.len() < Self::HEAD_SIZE {
            return Err(UdpError::Truncated {
                expected: Self::HEAD_SIZE,
                got: bytes.len(),
            });
        }

        let cookie: [u8; 4] = bytes[0..4].try_into().unwrap();
        if cookie != UDP_COOKIE {
            return Err(UdpError::BadCookie { got: cookie });
        }

        let invoke_id = u32::from_le_bytes(bytes[4..8].try_into().unwrap());
        let service_raw = u32::from_le_bytes(bytes[8..12].try_into().unwrap());
        let is_response = service_raw & RESPONSE_BIT != 0;
        let service = ServiceId::from(service_raw & !RESPONSE_BIT);

        let sender = AmsAddr::try_from(&bytes[12..20]).map_err(|_| UdpError::Truncated {
            expected: 20,
            got: bytes.len(),
        })?;
        let tag_count = u32::from_le_bytes(bytes[20..24].try_into().unwrap()) as usize;

        let mut tags = Vec::with_capacity(tag_count);
        let mut remaining = &bytes[Self::HEAD_SIZE..];
        for _ in 0..tag_count {
            let (tag, rest) = Tag::parse(remaining)?;
            tags.push(tag);
            remaining = rest;
        }

        Ok(Self {
            invoke_id,
            service,
            is_response,
            sender,
            tags,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ams::{AmsNetId, port};

    fn sender() -> AmsAddr {
        AmsAddr::new(AmsNetId::new(10, 0, 0, 2, 1, 1), port::LOCAL_MIN)
    }

    #[test]
    fn identify_request_roundtrip() {
        let frame = UdpFrame::request(
            1,
            ServiceId::Identify,
            sender(),
            vec![
                Tag::string(TagId::HostName, "ioc-host"),
                Tag::net_id(AmsNetId::new(10, 0, 0, 2, 1, 1)),
                Tag::string(TagId::IpAddress, "10.0.0.2"),
            ],
        );

        let bytes = frame.to_vec();
        assert_eq!(&bytes[0..4], &UDP_COOKIE);

        let parsed = UdpFrame::parse(&bytes).expect("Should parse");
        assert_eq!(parsed, frame);
        assert_eq!(parsed.service(), ServiceId::Identify);
        assert!(!parsed.is_response());
        assert_eq!(
            parsed.require_tag(TagId::HostName).unwrap().as_string(),
            "ioc-host"
        );
    }

    #[test]
    fn response_bit_roundtrip() {
        let frame = UdpFrame::response(
            2,
            ServiceId::AddRoute,
            sender(),
            vec![Tag::status(0)],
        );
        let parsed = UdpFrame::parse(&frame.to_vec()).expect("Should parse");
        assert!(parsed.is_response());
        assert_eq!(parsed.service(), ServiceId::AddRoute);
        assert_eq!(parsed.require_tag(TagId::Status).unwrap().as_status(), Ok(0));
    }

    #[test]
    fn bad_cookie_rejected() {
        let mut bytes = UdpFrame::request(1, ServiceId::Identify, sender(), vec![]).to_vec();
        bytes[0] = 0xFF;
        let err = UdpFrame::parse(&bytes).unwrap_err();
        assert!(matches!(err, UdpError::BadCookie { .. }));
    }

    #[test]
    fn missing_tag_reported() {
        let frame = UdpFrame::response(3, ServiceId::AddRoute, sender(), vec![]);
        let parsed = UdpFrame::parse(&frame.to_vec()).unwrap();
        let err = parsed.require_tag(TagId::Status).unwrap_err();
        assert_eq!(err, UdpError::MissingTag { id: TagId::Status });
    }

    #[test]
    fn truncated_datagram_rejected() {
        let bytes = UdpFrame::request(1, ServiceId::Identify, sender(), vec![]).to_vec();
        let err = UdpFrame::parse(&bytes[..10]).unwrap_err();
        assert!(matches!(err, UdpError::Truncated { .. }));
    }
}
