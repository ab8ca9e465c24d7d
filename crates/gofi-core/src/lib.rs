//! Protocol codec, data model and config generation for a wireless AP
//! controller speaking the vendor "Inform" protocol (§3).
//!
//! This crate is intentionally transport-free: it has no knowledge of
//! sockets, SSH, or HTTP. `gofi-net` builds the runtime on top of it.

pub mod codec;
pub mod command;
pub mod config;
pub mod discovery;
pub mod inform;
pub mod informdata;
pub mod types;

pub use codec::CodecError;
pub use config::{ConfigError, Section};
pub use discovery::{Discovery, DiscoveryError};
pub use inform::{InformEnvelope, InformError};
pub use informdata::{InformData, InformDataError};
pub use types::{AccessPoint, ApState, Mac, Network, NetworkConfig, NetworkKind};
