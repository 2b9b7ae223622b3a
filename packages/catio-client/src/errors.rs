use crate::client::SessionState;
use catio_core::ads::{AdsCommand, AdsReturnCode, NotificationHandle};
use catio_core::protocol::ProtocolError;
use std::time::Duration;
use thiserror::Error;

/// The user-facing error taxonomy of the client.
///
/// Every failure is surfaced to the caller of the operation that caused it;
/// nothing is retried automatically. The only global effect is a transport
/// failure, which fails every request pending on the same connection.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The TCP connection died underneath pending work.
    #[error("Connection lost: {reason}")]
    ConnectionLost { reason: String },

    /// An operation was attempted on a connection already torn down.
    #[error("Connection closed")]
    ConnectionClosed,

    /// A frame failed to encode or decode.
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// The peer answered with a non-zero ADS return code.
    #[error("Device returned {code} to {command:?} (invoke id {invoke_id})")]
    Device {
        code: AdsReturnCode,
        command: AdsCommand,
        invoke_id: u32,
    },

    /// A symbol name is not present in the device's catalog.
    #[error("Unknown symbol {name:?} on device {device_id}")]
    UnknownSymbol { name: String, device_id: u32 },

    /// A symbol's datatype code is not supported by this client.
    #[error("Unsupported datatype code {code} for symbol {name:?}")]
    UnsupportedDataType { code: u32, name: String },

    /// A method was called in a session state that does not admit it.
    #[error("Operation {op:?} is not valid in state {state:?}")]
    InvalidState { op: &'static str, state: SessionState },

    /// The query facade has no handler registered under the name.
    #[error("Unknown operation {name:?}")]
    UnknownOperation { name: String },

    /// A facade handler received arguments it cannot use.
    #[error("Invalid argument: {message}")]
    InvalidArgument { message: String },

    /// A request deadline expired. The response, if it ever arrives, is
    /// discarded.
    #[error("{context} timed out after {after:?}")]
    RequestTimeout { context: String, after: Duration },

    /// A consumer fell behind and the oldest buffered samples were dropped.
    #[error("Dropped {dropped} buffered samples on notification handle {handle}")]
    NotificationOverflow {
        handle: NotificationHandle,
        dropped: u64,
    },

    /// The peer rejected the route registration.
    #[error("Route refused by peer (status {status:#x})")]
    RouteRefused { status: u32 },

    /// No reply to a route negotiation datagram within the deadline.
    #[error("Route negotiation timed out")]
    RouteTimeout,

    /// A socket error during route negotiation.
    #[error("Route peer unreachable: {0}")]
    RouteUnreachable(#[source] std::io::Error),
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, ClientError>;
