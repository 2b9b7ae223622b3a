use super::ProtocolError;
use crate::ads::{AdsCommand, AdsError, AdsHeader};
use crate::io::AmsFrame;

/// Splits a frame into its ADS header and body, checking command id and
/// request/response direction.
pub fn parse_ads_frame(
    frame: &AmsFrame,
    expected_cmd: AdsCommand,
    is_request: bool,
) -> Result<(AdsHeader, &[u8]), ProtocolError> {
    let (header, body) = AdsHeader::parse_prefix(frame.payload()).map_err(AdsError::from)?;

    if header.command_id() != expected_cmd {
        return Err(ProtocolError::UnexpectedCommand {
            expected: expected_cmd,
            got: header.command_id(),
        });
    }

    let flags = header.state_flags();
    if is_request && !flags.is_request() {
        return Err(ProtocolError::UnexpectedDirection {
            expected: "request",
        });
    }
    if !is_request && !flags.is_response() {
        return Err(ProtocolError::UnexpectedDirection {
            expected: "response",
        });
    }

    Ok((header, body))
}
