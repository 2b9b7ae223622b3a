use super::error::NotificationHandleError;
use std::fmt;

/// A handle identifying an active device notification subscription.
///
/// Assigned by the server in the add-notification response, tagged onto every
/// sample the server pushes, and passed back in delete-notification to cancel
/// the subscription. The value is opaque; equality and hashing are
/// well-defined, so it works as a map key for dispatching samples.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct NotificationHandle(u32);

impl NotificationHandle {
    /// The length of a notification handle on the wire.
    pub const LENGTH: usize = 4;

    /// Creates a handle from its raw value.
    pub const fn new(handle: u32) -> Self {
        Self(handle)
    }

    /// Returns the raw handle value.
    pub fn as_u32(&self) -> u32 {
        self.0
    }

    /// Serializes the handle into a little-endian byte array.
    pub fn to_bytes(&self) -> [u8; Self::LENGTH] {
        self.0.to_le_bytes()
    }

    /// Creates a handle from a little-endian byte array.
    pub fn from_bytes(bytes: [u8; Self::LENGTH]) -> Self {
        Self(u32::from_le_bytes(bytes))
    }

    /// Tries to parse a handle from a byte slice.
    pub fn try_from_slice(bytes: &[u8]) -> Result<Self, NotificationHandleError> {
        if bytes.len() < Self::LENGTH {
            return Err(NotificationHandleError::UnexpectedLength {
                expected: Self::LENGTH,
                got: bytes.len(),
            });
        }
        Ok(Self::from_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }
}

impl From<u32> for NotificationHandle {
    fn from(value: u32) -> Self {
        Self(value)
    }
}

impl From<NotificationHandle> for u32 {
    fn from(value: NotificationHandle) -> Self {
        value.0
    }
}

impl fmt::Debug for NotificationHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NotificationHandle({:#x})", self.0)
    }
}

impl fmt::Display for NotificationHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bytes_roundtrip() {
        let handle = NotificationHandle::new(0xCAFE_BABE);
        assert_eq!(NotificationHandle::from_bytes(handle.to_bytes()), handle);
        assert_eq!(handle.as_u32(), 0xCAFE_BABE);
    }

    #[test]
    fn short_slice_rejected() {
        let err = NotificationHandle::try_from_slice(&[1, 2]).unwrap_err();
        assert!(matches!(
            err,
            NotificationHandleError::UnexpectedLength { .. }
        ));
    }
}
