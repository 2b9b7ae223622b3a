//! Umbrella crate re-exporting the wire-level [`core`] layer and the
//! session-level [`client`] layer.
//!
//! ```no_run
//! use catio::client::{Client, ClientConfig};
//! use catio::core::ams::AmsNetId;
//!
//! # async fn run() -> catio::client::Result<()> {
//! let config = ClientConfig::new(AmsNetId::new(10, 0, 0, 2, 1, 1), "10.0.0.2");
//! let client = Client::new(config);
//! client.connect("10.0.0.1".parse().unwrap(), AmsNetId::new(10, 0, 0, 1, 3, 1)).await?;
//! let topology = client.introspect().await?;
//! println!("{} devices", topology.devices.len());
//! # Ok(())
//! # }
//! ```

pub use catio_client as client;
pub use catio_core as core;
