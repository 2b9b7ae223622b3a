#![doc = include_str!("../README.md")]

/// ADS protocol primitives - command ids, states, return codes, strings,
/// and wire-format types like [`AdsHeader`] and [`NotificationHandle`].
pub mod ads;

/// AMS layer - network addressing ([`AmsNetId`], [`AmsAddr`]) and the 6-byte
/// TCP framing prefix ([`AmsTcpHeader`]).
pub mod ams;

/// Frame I/O - [`AmsFrame`] construction and the tokio stream types that
/// read and write frames over TCP.
pub mod io;

/// Typed request and response structs for every ADS command. Start here if
/// you are building a client or a conforming test server.
pub mod protocol;

/// The UDP discovery and route-negotiation codec.
pub mod udp;

pub use ads::{
    AdsCommand, AdsError, AdsHeader, AdsReturnCode, AdsState, AdsTransMode, NotificationHandle,
};
pub use ams::{AmsAddr, AmsNetId, AmsPort, AmsTcpHeader};
pub use io::AmsFrame;
pub use protocol::ProtocolError;
