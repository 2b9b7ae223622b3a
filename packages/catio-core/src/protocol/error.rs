use crate::ads::{AdsCommand, AdsError};
use crate::ams::AmsError;
use std::io;

/// Errors raised while encoding or decoding command frames.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("AMS error: {0}")]
    Ams(#[from] AmsError),

    #[error("ADS error: {0}")]
    Ads(#[from] AdsError),

    #[error("Unexpected ADS command: expected {expected:?}, got {got:?}")]
    UnexpectedCommand {
        expected: AdsCommand,
        got: AdsCommand,
    },

    #[error("Frame direction mismatch: expected a {expected}")]
    UnexpectedDirection { expected: &'static str },

    #[error("Unexpected length: expected {expected}, got {got}")]
    UnexpectedLength { expected: usize, got: usize },
}
