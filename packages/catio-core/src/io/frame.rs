use crate::ams::AmsTcpHeader;

/// Maximum allowed frame payload size (64 KB minus the prefix) to bound
/// allocations driven by a hostile or corrupted length field.
pub const AMS_FRAME_MAX_LEN: usize = 65535 - AmsTcpHeader::LENGTH;

/// A single AMS frame: the 6-byte TCP prefix plus the payload it declares
/// (ADS header + command body).
///
/// The type is I/O-agnostic; reading and writing frames is the job of
/// [`AmsReader`](crate::io::AmsReader) and [`AmsWriter`](crate::io::AmsWriter).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AmsFrame {
    header: AmsTcpHeader,
    payload: Vec<u8>,
}

impl AmsFrame {
    /// Creates a frame around the given payload.
    ///
    /// Returns `None` if the payload exceeds [`AMS_FRAME_MAX_LEN`].
    pub fn try_new(payload: impl Into<Vec<u8>>) -> Option<Self> {
        let payload = payload.into();
        if payload.len() > AMS_FRAME_MAX_LEN {
            return None;
        }

        Some(Self {
            header: AmsTcpHeader::new(payload.len() as u32),
            payload,
        })
    }

    /// Creates a frame around the given payload.
    ///
    /// # Panics
    ///
    /// Panics if the payload exceeds [`AMS_FRAME_MAX_LEN`]. Use
    /// [`try_new`](Self::try_new) for fallible construction.
    pub fn new(payload: impl Into<Vec<u8>>) -> Self {
        let payload = payload.into();
        assert!(
            payload.len() <= AMS_FRAME_MAX_LEN,
            "Payload too large: {} bytes (max {})",
            payload.len(),
            AMS_FRAME_MAX_LEN
        );
        Self {
            header: AmsTcpHeader::new(payload.len() as u32),
            payload,
        }
    }

    /// Constructs a frame from an already-validated header and payload.
    ///
    /// Does NOT check that `payload.len()` matches `header.length()`; intended
    /// for I/O readers that read exactly the declared payload length.
    pub fn from_parts(header: AmsTcpHeader, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            header,
            payload: payload.into(),
        }
    }

    /// Returns the frame's prefix header.
    pub fn header(&self) -> AmsTcpHeader {
        self.header
    }

    /// Returns the frame's payload (ADS header + command body).
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Consumes the frame, returning its payload.
    pub fn into_payload(self) -> Vec<u8> {
        self.payload
    }

    /// Returns the total on-wire size of this frame.
    pub fn total_size(&self) -> usize {
        AmsTcpHeader::LENGTH + self.payload.len()
    }

    /// Serializes the frame into a byte vector (prefix + payload).
    pub fn to_vec(&self) -> Vec<u8> {
        let mut vec = Vec::with_capacity(self.total_size());
        vec.extend_from_slice(&self.header.to_bytes());
        vec.extend_from_slice(&self.payload);
        vec
    }
}

impl From<AmsFrame> for Vec<u8> {
    fn from(frame: AmsFrame) -> Self {
        frame.to_vec()
    }
}
