#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum NetIdError {
    #[error("Buffer too small for AMS address: expected {expected}, found {found}")]
    BufferTooSmall { expected: usize, found: usize },

    #[error("Wrong number of octets: expected {expected}, found {found}")]
    WrongOctetCount { expected: usize, found: usize },

    #[error("Invalid octet at position {position}: {value:?}")]
    InvalidOctet { position: usize, value: String },
}

#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum AmsTcpHeaderError {
    #[error("Buffer too small for AMS/TCP header: expected {expected}, found {found}")]
    BufferTooSmall { expected: usize, found: usize },

    #[error("Reserved prefix field must be zero, got {value:#06x}")]
    NonZeroReserved { value: u16 },
}

/// Errors from the AMS addressing and framing layer.
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum AmsError {
    #[error("Net ID error: {0}")]
    NetId(#[from] NetIdError),

    #[error("AMS/TCP header error: {0}")]
    TcpHeader(#[from] AmsTcpHeaderError),
}
