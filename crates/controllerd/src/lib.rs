//! controllerd - the "basic" Inform controller, with per-AP state persisted
//! to a JSON statefile between runs.

pub mod config;
pub mod state;

pub use config::Config;
pub use state::{PersistedState, StateError};
