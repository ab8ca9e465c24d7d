//! Transport-facing runtime for a wireless AP controller: SSH adoption,
//! the UDP/HTTP server, and the manager that ties them together (§3 G/H/I).

pub mod adopt;
pub mod manager;
pub mod server;

pub use adopt::{AdoptError, AdoptTransport, RusshAdopt};
pub use manager::{DesiredConfig, Manager, ManagerError, OnDiscovery, OnUnknownAp, SharedConfig};
pub use server::{Server, ServerError};
