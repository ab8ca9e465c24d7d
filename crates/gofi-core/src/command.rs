//! JSON command payloads sent to an AP in an inform reply (§4.D).

use chrono::Utc;
use serde::Serialize;

/// `noop` — nothing to do, check back in `interval` seconds.
#[derive(Debug, Serialize)]
struct Noop {
    _type: &'static str,
    interval: u32,
}

/// `cmd` with `cmd=locate` — blink the locate LED.
#[derive(Debug, Serialize)]
struct Locate {
    _type: &'static str,
    cmd: &'static str,
    server_time_in_utc: String,
    datetime: String,
    time: String,
}

/// `cmd` with `cmd=kick-sta` — deauth a station.
#[derive(Debug, Serialize)]
struct KickStation {
    _type: &'static str,
    cmd: &'static str,
    mac: String,
    server_time_in_utc: String,
}

/// `setparam` — push full system + management config.
#[derive(Debug, Serialize)]
struct SetParam {
    _type: &'static str,
    system_cfg: String,
    mgmt_cfg: String,
    cfgversion: String,
    server_time_in_utc: String,
}

/// `setparam` (mgmt-only) — redirect-only variant used during early adopt.
#[derive(Debug, Serialize)]
struct SetParamMgmtOnly {
    _type: &'static str,
    mgmt_cfg: String,
    cfgversion: String,
    server_time_in_utc: String,
}

fn server_time_in_utc() -> String {
    Utc::now().timestamp_millis().to_string()
}

/// Build a `noop` payload.
pub fn noop(interval_secs: u32) -> Vec<u8> {
    serde_json::to_vec(&Noop {
        _type: "noop",
        interval: interval_secs,
    })
    .expect("Noop is always serializable")
}

/// Build a `locate` command payload.
pub fn locate() -> Vec<u8> {
    let now = Utc::now();
    serde_json::to_vec(&Locate {
        _type: "cmd",
        cmd: "locate",
        server_time_in_utc: now.timestamp_millis().to_string(),
        datetime: now.to_rfc3339(),
        time: now.timestamp().to_string(),
    })
    .expect("Locate is always serializable")
}

/// Build a `kick-sta` command payload targeting `mac`.
pub fn kick_station(mac: &str) -> Vec<u8> {
    serde_json::to_vec(&KickStation {
        _type: "cmd",
        cmd: "kick-sta",
        mac: mac.to_string(),
        server_time_in_utc: server_time_in_utc(),
    })
    .expect("KickStation is always serializable")
}

/// Build a full `setparam` payload carrying both sysconf and mgmt-conf.
pub fn set_param(system_cfg: String, mgmt_cfg: String, cfgversion: String) -> Vec<u8> {
    serde_json::to_vec(&SetParam {
        _type: "setparam",
        system_cfg,
        mgmt_cfg,
        cfgversion,
        server_time_in_utc: server_time_in_utc(),
    })
    .expect("SetParam is always serializable")
}

/// Build the mgmt-only `setparam` variant used during early adopt.
pub fn set_param_mgmt_only(mgmt_cfg: String, cfgversion: String) -> Vec<u8> {
    serde_json::to_vec(&SetParamMgmtOnly {
        _type: "setparam",
        mgmt_cfg,
        cfgversion,
        server_time_in_utc: server_time_in_utc(),
    })
    .expect("SetParamMgmtOnly is always serializable")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    #[test]
    fn noop_has_expected_shape() {
        let v: Value = serde_json::from_slice(&noop(3)).unwrap();
        assert_eq!(v["_type"], "noop");
        assert_eq!(v["interval"], 3);
    }

    #[test]
    fn locate_has_nonempty_timestamps() {
        let v: Value = serde_json::from_slice(&locate()).unwrap();
        assert_eq!(v["_type"], "cmd");
        assert_eq!(v["cmd"], "locate");
        assert!(!v["datetime"].as_str().unwrap().is_empty());
        assert!(!v["time"].as_str().unwrap().is_empty());
        assert!(!v["server_time_in_utc"].as_str().unwrap().is_empty());
    }

    #[test]
    fn set_param_carries_cfgversion() {
        let v: Value =
            serde_json::from_slice(&set_param("sys".into(), "mgmt".into(), "v2".into())).unwrap();
        assert_eq!(v["_type"], "setparam");
        assert_eq!(v["system_cfg"], "sys");
        assert_eq!(v["mgmt_cfg"], "mgmt");
        assert_eq!(v["cfgversion"], "v2");
    }
}
