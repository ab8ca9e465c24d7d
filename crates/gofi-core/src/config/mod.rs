//! Device configuration tree and per-model document generation (§4.E, §4.F).

pub mod generator;
pub mod section;

pub use generator::{generate_mgmt_conf, generate_sys_conf};
pub use section::{parse, ConfigError, Section};
