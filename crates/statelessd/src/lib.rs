//! statelessd - the "stateless" Inform controller: every AP shares one
//! `NetworkConfig` and nothing is persisted across restarts.

pub mod config;

pub use config::Config;
