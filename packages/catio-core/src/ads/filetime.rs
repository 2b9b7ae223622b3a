use super::error::FileTimeError;
use chrono::{DateTime, TimeZone, Utc};
use std::fmt;

/// A timestamp in the Windows FILETIME format.
///
/// The number of 100-nanosecond intervals since `1601-01-01 00:00:00 UTC`.
/// Notification samples are stamped with this format on the wire; convert
/// with [`to_datetime`](Self::to_datetime) for display or arithmetic.
///
/// FILETIME has 100 ns resolution while [`DateTime<Utc>`] carries
/// microseconds, so one decimal digit of sub-microsecond precision is lost
/// on conversion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct WindowsFileTime(u64);

impl WindowsFileTime {
    /// The length of a FILETIME on the wire.
    pub const LENGTH: usize = 8;

    /// The number of 100 ns ticks between 1601-01-01 and the Unix epoch.
    pub const UNIX_EPOCH_TICKS: u64 = 116_444_736_000_000_000;

    /// 100 ns ticks per second.
    pub const TICKS_PER_SEC: u64 = 10_000_000;

    /// 100 ns ticks per microsecond.
    pub const TICKS_PER_MICRO: u64 = 10;

    /// Creates a timestamp from a raw tick count.
    pub const fn from_raw(ticks: u64) -> Self {
        Self(ticks)
    }

    /// Returns the raw tick count.
    pub const fn as_raw(self) -> u64 {
        self.0
    }

    /// Creates a timestamp for the current UTC time.
    pub fn now() -> Self {
        Self::from_datetime(Utc::now())
    }

    /// Converts a [`DateTime<Utc>`] into a FILETIME.
    ///
    /// Times before 1601-01-01 saturate to zero.
    pub fn from_datetime(dt: DateTime<Utc>) -> Self {
        let micros = dt.timestamp_micros();
        if micros < 0 {
            let before_epoch = micros.unsigned_abs() * Self::TICKS_PER_MICRO;
            return Self(Self::UNIX_EPOCH_TICKS.saturating_sub(before_epoch));
        }
        Self(Self::UNIX_EPOCH_TICKS + micros as u64 * Self::TICKS_PER_MICRO)
    }

    /// Converts the timestamp into a [`DateTime<Utc>`].
    pub fn to_datetime(self) -> DateTime<Utc> {
        let since_unix = self.0 as i64 - Self::UNIX_EPOCH_TICKS as i64;
        let micros = since_unix / Self::TICKS_PER_MICRO as i64;
        Utc.timestamp_micros(micros).single().unwrap_or_default()
    }

    /// Serializes the timestamp into a little-endian byte array.
    pub fn to_bytes(&self) -> [u8; Self::LENGTH] {
        self.0.to_le_bytes()
    }

    /// Creates a timestamp from a little-endian byte array.
    pub fn from_bytes(bytes: [u8; Self::LENGTH]) -> Self {
        Self(u64::from_le_bytes(bytes))
    }

    /// Tries to parse a timestamp from a byte slice.
    pub fn try_from_slice(bytes: &[u8]) -> Result<Self, FileTimeError> {
        if bytes.len() < Self::LENGTH {
            return Err(FileTimeError::UnexpectedLength {
                expected: Self::LENGTH,
                got: bytes.len(),
            });
        }
        let arr: [u8; Self::LENGTH] = bytes[..Self::LENGTH].try_into().unwrap();
        Ok(Self::from_bytes(arr))
    }
}

impl fmt::Display for WindowsFileTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_datetime())
    }
}
