//! Core data model shared across the codec, config generator and manager (§3).

use serde::{Deserialize, Serialize};
use std::fmt;

/// A 6-byte hardware address, the primary key for an [`AccessPoint`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Mac(pub [u8; 6]);

impl Mac {
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Display for Mac {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:02X}:{:02X}:{:02X}:{:02X}:{:02X}:{:02X}",
            self.0[0], self.0[1], self.0[2], self.0[3], self.0[4], self.0[5]
        )
    }
}

/// Lifecycle state of a managed access point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ApState {
    Unknown,
    Adopting,
    Adopted,
    Provisioning,
    Managed,
}

/// Per-AP record. `auth_key` is minted once, at adoption, and never mutated
/// afterward; `config_version` only ever changes via a fresh random draw
/// (the "mark dirty" transition).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessPoint {
    pub mac: Mac,
    pub ip: String,
    pub auth_key: [u8; 16],
    pub ssh_password: String,
    pub config_version: String,
    pub state: ApState,
}

impl AccessPoint {
    /// Mark the config dirty: draw a fresh 8-byte (16 hex char) version token.
    pub fn mark_config_dirty(&mut self) {
        let mut bytes = [0u8; 8];
        rand::RngCore::fill_bytes(&mut rand::thread_rng(), &mut bytes);
        self.config_version = hex::encode(bytes);
    }
}

/// A queued operator action, at most one per MAC.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Locate,
    KickStation { target: Mac },
}

/// Network security mode for a configured SSID.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NetworkKind {
    WpaPsk,
    WpaEapRadius,
}

/// One configured wireless network (§3 `Network`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Network {
    pub kind: NetworkKind,
    pub ssid: String,
    pub password: String,
    pub is_5ghz: bool,
    pub hide_beacon: bool,
    pub channel: u32,
    pub radius_ip: String,
    pub radius_port: u16,
    pub radius_secret: String,
}

impl Default for Network {
    fn default() -> Self {
        Self {
            kind: NetworkKind::WpaPsk,
            ssid: String::new(),
            password: String::new(),
            is_5ghz: false,
            hide_beacon: false,
            channel: 0,
            radius_ip: String::new(),
            radius_port: 0,
            radius_secret: String::new(),
        }
    }
}

/// Band steering mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BandSteerMode {
    Prefer5G,
    Balance,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BandSteer {
    pub enabled: bool,
    pub mode: BandSteerMode,
}

impl Default for BandSteer {
    fn default() -> Self {
        Self {
            enabled: false,
            mode: BandSteerMode::Prefer5G,
        }
    }
}

/// Reserved for switch-attached settings; currently carries no fields.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SwitchSettings {}

/// The logical desired state for an AP or a whole controller (§3 `NetworkConfig`).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NetworkConfig {
    pub networks: Vec<Network>,
    pub band_steer: BandSteer,
    pub tx_power: i32,
    pub min_rssi: i32,
    pub min_rssi_interval: i32,
    pub switch_settings: SwitchSettings,
}
