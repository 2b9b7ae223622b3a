use super::error::AdsStringError;
use encoding_rs::WINDOWS_1252;
use std::borrow::Cow;
use std::fmt;

/// Decodes a NUL-terminated Windows-1252 byte region into UTF-8.
///
/// Device, symbol, and comment strings on the wire are CP-1252, not UTF-8.
/// Bytes after the first NUL are ignored; decoding is lossy.
pub fn decode_plc_string(bytes: &[u8]) -> Cow<'_, str> {
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    let (cow, _, _) = WINDOWS_1252.decode(&bytes[..end]);
    cow
}

/// Encodes a UTF-8 string into Windows-1252 with a trailing NUL.
///
/// Characters outside CP-1252 are replaced by the encoder's substitute.
pub fn encode_plc_string(s: &str) -> Vec<u8> {
    let (bytes, _, _) = WINDOWS_1252.encode(s);
    let mut out = bytes.into_owned();
    out.push(0);
    out
}

/// A fixed-size NUL-padded string field, as embedded in device-info and
/// introspection blocks.
///
/// `N` is the total byte size of the field on the wire, including padding.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FixedString<const N: usize>([u8; N]);

impl<const N: usize> FixedString<N> {
    /// Creates an empty (all-zero) string field.
    pub const fn new() -> Self {
        Self([0; N])
    }

    /// Creates a field from raw wire bytes.
    pub const fn from_bytes(bytes: [u8; N]) -> Self {
        Self(bytes)
    }

    /// Builds a field from a UTF-8 string, encoding to CP-1252.
    ///
    /// Fails if the encoded form (plus NUL) does not fit in `N` bytes.
    pub fn from_str_checked(s: &str) -> Result<Self, AdsStringError> {
        let encoded = encode_plc_string(s);
        if encoded.len() > N {
            return Err(AdsStringError::TooLong {
                capacity: N,
                got: encoded.len(),
            });
        }
        let mut buf = [0u8; N];
        buf[..encoded.len()].copy_from_slice(&encoded);
        Ok(Self(buf))
    }

    /// Tries to read a field from the first `N` bytes of a slice.
    pub fn try_from_slice(bytes: &[u8]) -> Result<Self, AdsStringError> {
        if bytes.len() < N {
            return Err(AdsStringError::BufferTooSmall {
                expected: N,
                found: bytes.len(),
            });
        }
        let mut buf = [0u8; N];
        buf.copy_from_slice(&bytes[..N]);
        Ok(Self(buf))
    }

    /// Returns the raw wire bytes, padding included.
    pub fn as_bytes(&self) -> &[u8; N] {
        &self.0
    }

    /// Decodes the content up to the first NUL into UTF-8.
    pub fn as_str(&self) -> Cow<'_, str> {
        decode_plc_string(&self.0)
    }

    /// Returns `true` if the field holds no characters.
    pub fn is_empty(&self) -> bool {
        self.0[0] == 0
    }
}

impl<const N: usize> Default for FixedString<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> fmt::Debug for FixedString<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.as_str())
    }
}

impl<const N: usize> fmt::Display for FixedString<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_stops_at_nul() {
        let bytes = b"I/O Server\0garbage";
        assert_eq!(decode_plc_string(bytes), "I/O Server");
    }

    #[test]
    fn decode_handles_cp1252() {
        // 0xE4 is 'ä' in CP-1252 and invalid UTF-8
        let bytes = [b'T', b'e', b'r', b'm', 0xE4, 0x00];
        assert_eq!(decode_plc_string(&bytes), "Termä");
    }

    #[test]
    fn fixed_string_roundtrip() {
        let s = FixedString::<16>::from_str_checked("EK1100").unwrap();
        assert_eq!(s.as_str(), "EK1100");
        assert_eq!(s.as_bytes().len(), 16);
        assert_eq!(s.as_bytes()[6], 0);
    }

    #[test]
    fn fixed_string_too_long() {
        let err = FixedString::<4>::from_str_checked("too long").unwrap_err();
        assert!(matches!(err, AdsStringError::TooLong { capacity: 4, .. }));
    }

    #[test]
    fn fixed_string_from_short_slice() {
        let err = FixedString::<8>::try_from_slice(&[0u8; 3]).unwrap_err();
        assert!(matches!(err, AdsStringError::BufferTooSmall { .. }));
    }
}
