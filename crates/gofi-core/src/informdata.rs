//! Incoming inform payload JSON (§6 "Inform payload JSON (incoming)").
//!
//! The core state machine only ever reads `cfgversion`, `model_display` and
//! `state`; everything else is telemetry forwarded unchanged to an optional
//! observer. We keep that telemetry as a raw [`serde_json::Value`] bucket
//! rather than dropping it, with typed accessors layered on top for callers
//! who want the shapes the device actually sends.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum InformDataError {
    #[error("invalid inform payload JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// The fields the manager's state machine reads directly, plus a raw bucket
/// for everything else the device reported.
#[derive(Debug, Clone, Deserialize)]
pub struct InformData {
    #[serde(default)]
    pub cfgversion: String,
    #[serde(default)]
    pub model_display: String,
    #[serde(default)]
    pub state: i64,

    /// Everything else in the payload, untouched.
    #[serde(flatten)]
    pub raw: Value,
}

pub fn parse(payload: &[u8]) -> Result<InformData, InformDataError> {
    Ok(serde_json::from_slice(payload)?)
}

/// Network interface telemetry (`if_table`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Interface {
    pub drops: i64,
    pub full_duplex: bool,
    pub ip: String,
    pub latency: i64,
    pub mac: String,
    pub name: String,
    pub netmask: String,
    pub num_port: i64,
    pub speed: i64,
    pub up: bool,
    pub uptime: i64,
    pub rx_bytes: i64,
    pub rx_dropped: i64,
    pub rx_errors: i64,
    pub rx_multicast: i64,
    pub rx_packets: i64,
    pub tx_bytes: i64,
    pub tx_dropped: i64,
    pub tx_errors: i64,
    pub tx_multicast: i64,
    pub tx_packets: i64,
}

/// A radio (wireless interface) reported in `radio_table`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RadioInfo {
    pub builtin_ant_gain: i64,
    pub builtin_antenna: bool,
    pub max_txpower: i64,
    pub name: String,
    pub radio: String,
    pub scan_table: Vec<NearbyNetwork>,
}

/// A network the AP detected during a scan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NearbyNetwork {
    pub age: i64,
    pub bssid: String,
    pub essid: String,
    pub security: String,
    pub channel: i64,
    pub freq: i64,
    pub is_adhoc: bool,
    pub rssi: i64,
}

/// A network the AP is running, reported in `vap_table`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Net {
    pub bssid: String,
    pub essid: String,
    pub ccq: i64,
    pub channel: i64,
    pub name: String,
    pub radio: String,
    pub rx_bytes: i64,
    pub tx_bytes: i64,
    pub rx_errors: i64,
    pub tx_errors: i64,
    pub rx_packets: i64,
    pub tx_packets: i64,
    pub sta_table: Vec<Station>,
}

/// A station (client) associated with one of the AP's networks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Station {
    pub auth_time: i64,
    pub authorized: bool,
    pub hostname: String,
    pub ip: String,
    pub mac: String,
    pub state: i64,
    pub uptime: i64,
    pub idletime: i64,
    pub is_11n: bool,
    pub ccq: i64,
    pub noise: i64,
    pub rssi: i64,
    pub signal: i64,
    pub state_pwrmgt: bool,
}

impl InformData {
    /// Deserialize the `if_table` field, if present.
    pub fn interfaces(&self) -> Result<Vec<Interface>, InformDataError> {
        Ok(match self.raw.get("if_table") {
            Some(v) => serde_json::from_value(v.clone())?,
            None => Vec::new(),
        })
    }

    /// Deserialize the `radio_table` field, if present.
    pub fn radios(&self) -> Result<Vec<RadioInfo>, InformDataError> {
        Ok(match self.raw.get("radio_table") {
            Some(v) => serde_json::from_value(v.clone())?,
            None => Vec::new(),
        })
    }

    /// Deserialize the `vap_table` field, if present.
    pub fn nets(&self) -> Result<Vec<Net>, InformDataError> {
        Ok(match self.raw.get("vap_table") {
            Some(v) => serde_json::from_value(v.clone())?,
            None => Vec::new(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_cfgversion_and_forwards_telemetry() {
        let payload = br#"{"cfgversion":"v1","model_display":"UAP-AC-LR","state":1,"extra_telemetry":42}"#;
        let data = parse(payload).unwrap();
        assert_eq!(data.cfgversion, "v1");
        assert_eq!(data.model_display, "UAP-AC-LR");
        assert_eq!(data.raw["extra_telemetry"], 42);
    }

    #[test]
    fn missing_telemetry_tables_decode_as_empty() {
        let data = parse(br#"{"cfgversion":"v1"}"#).unwrap();
        assert!(data.interfaces().unwrap().is_empty());
        assert!(data.radios().unwrap().is_empty());
        assert!(data.nets().unwrap().is_empty());
    }
}
