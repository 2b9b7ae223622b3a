//! The UDP discovery and route-negotiation codec (port 48899).
//!
//! Before a TCP session can carry ADS traffic the peer must know the
//! client's network identity. That handshake runs over UDP with its own
//! frame format: a magic cookie, an invoke id, a service id, the sender's
//! AMS address, and a packed list of tagged values.

pub mod frame;
pub mod tag;

pub use frame::{ServiceId, UdpError, UdpFrame};
pub use tag::{Tag, TagId};
