use super::error::AdsStateError;

/// The ADS state of a device, as reported by `ReadState` and requested by
/// `WriteControl`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum AdsState {
    Invalid,
    Idle,
    Reset,
    Init,
    Start,
    Run,
    Stop,
    SaveCfg,
    LoadCfg,
    PowerFailure,
    PowerGood,
    Error,
    Shutdown,
    Suspend,
    Resume,
    Config,
    Reconfig,
    /// A state code this crate does not know.
    Unknown(u16),
}

impl AdsState {
    /// The length of an ADS state on the wire.
    pub const LENGTH: usize = 2;

    /// Serializes the state into a little-endian byte array.
    pub fn to_bytes(&self) -> [u8; Self::LENGTH] {
        u16::from(*self).to_le_bytes()
    }

    /// Creates a state from a little-endian byte array.
    pub fn from_bytes(bytes: [u8; Self::LENGTH]) -> Self {
        u16::from_le_bytes(bytes).into()
    }

    /// Tries to parse a state from a byte slice.
    pub fn try_from_slice(bytes: &[u8]) -> Result<Self, AdsStateError> {
        if bytes.len() < Self::LENGTH {
            return Err(AdsStateError::UnexpectedLength {
                expected: Self::LENGTH,
                got: bytes.len(),
            });
        }
        Ok(Self::from_bytes([bytes[0], bytes[1]]))
    }
}

impl From<u16> for AdsState {
    fn from(value: u16) -> Self {
        match value {
            0 => Self::Invalid,
            1 => Self::Idle,
            2 => Self::Reset,
            3 => Self::Init,
            4 => Self::Start,
            5 => Self::Run,
            6 => Self::Stop,
            7 => Self::SaveCfg,
            8 => Self::LoadCfg,
            9 => Self::PowerFailure,
            10 => Self::PowerGood,
            11 => Self::Error,
            12 => Self::Shutdown,
            13 => Self::Suspend,
            14 => Self::Resume,
            15 => Self::Config,
            16 => Self::Reconfig,
            n => Self::Unknown(n),
        }
    }
}

impl From<AdsState> for u16 {
    fn from(value: AdsState) -> Self {
        match value {
            AdsState::Invalid => 0,
            AdsState::Idle => 1,
            AdsState::Reset => 2,
            AdsState::Init => 3,
            AdsState::Start => 4,
            AdsState::Run => 5,
            AdsState::Stop => 6,
            AdsState::SaveCfg => 7,
            AdsState::LoadCfg => 8,
            AdsState::PowerFailure => 9,
            AdsState::PowerGood => 10,
            AdsState::Error => 11,
            AdsState::Shutdown => 12,
            AdsState::Suspend => 13,
            AdsState::Resume => 14,
            AdsState::Config => 15,
            AdsState::Reconfig => 16,
            AdsState::Unknown(n) => n,
        }
    }
}
