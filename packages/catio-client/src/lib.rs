//! Async client for Beckhoff TwinCAT I/O servers over ADS/AMS.
//!
//! The layers, bottom up:
//!
//! * [`route`] - UDP route negotiation so the peer will talk to us at all.
//! * [`connection`] - one TCP connection, one background receiver, requests
//!   correlated by invoke id ([`commands`] adds the typed surface).
//! * [`topology`] - the EtherCAT topology reconstructed by scripted reads.
//! * [`symbols`] - the server's symbol table, parsed into typed handles.
//! * [`notify`] - subscription bookkeeping and sample fan-out.
//! * [`client`] / [`facade`] - the per-session object and the name-dispatch
//!   layer the controller consumes.

pub mod client;
pub mod commands;
pub mod config;
pub mod connection;
pub mod errors;
pub mod facade;
pub mod notify;
pub mod route;
pub mod symbols;
pub mod topology;

pub use client::{Client, SessionState, SymbolSubscription};
pub use config::ClientConfig;
pub use connection::Connection;
pub use errors::{ClientError, Result};
pub use facade::Facade;
pub use notify::{NotificationEngine, SampleRecord, Subscription};
pub use route::{RouteAgent, RouteInfo};
pub use symbols::{AdsDataType, Symbol, SymbolCatalog};
pub use topology::{IoDevice, IoServer, IoSlave};
