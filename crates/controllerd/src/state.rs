//! JSON-persisted AP state, the Rust equivalent of the source's
//! `controllers/basic/conf.go` `loadConfig`/`flushConfig` pair.

use gofi_core::types::AccessPoint;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StateError {
    #[error("IO error reading/writing {0:?}: {1}")]
    Io(PathBuf, #[source] std::io::Error),
    #[error("malformed statefile {0:?}: {1}")]
    Json(PathBuf, #[source] serde_json::Error),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PersistedState {
    /// Keyed by hex-encoded MAC, as in the source's `state.AccessPoints` map.
    pub access_points: HashMap<String, AccessPoint>,
}

/// Load the statefile if it exists, or start empty (first run).
pub fn load(path: &Path) -> Result<PersistedState, StateError> {
    match std::fs::read(path) {
        Ok(bytes) => {
            serde_json::from_slice(&bytes).map_err(|e| StateError::Json(path.to_path_buf(), e))
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(PersistedState::default()),
        Err(e) => Err(StateError::Io(path.to_path_buf(), e)),
    }
}

/// Overwrite the statefile with the current AP set.
pub fn flush(path: &Path, aps: &[AccessPoint]) -> Result<(), StateError> {
    let state = PersistedState {
        access_points: aps
            .iter()
            .map(|ap| (ap.mac.to_hex(), ap.clone()))
            .collect(),
    };
    let bytes =
        serde_json::to_vec_pretty(&state).map_err(|e| StateError::Json(path.to_path_buf(), e))?;
    std::fs::write(path, bytes).map_err(|e| StateError::Io(path.to_path_buf(), e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use gofi_core::types::{ApState, Mac};
    use tempfile::tempdir;

    fn sample_ap() -> AccessPoint {
        AccessPoint {
            mac: Mac([1, 2, 3, 4, 5, 6]),
            ip: "192.168.1.50".into(),
            auth_key: [7u8; 16],
            ssh_password: "ubnt".into(),
            config_version: "deadbeefdeadbeef".into(),
            state: ApState::Managed,
        }
    }

    #[test]
    fn missing_statefile_loads_as_empty() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("controllerState.json");
        let state = load(&path).unwrap();
        assert!(state.access_points.is_empty());
    }

    #[test]
    fn flush_then_load_round_trips() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("controllerState.json");
        let ap = sample_ap();

        flush(&path, &[ap.clone()]).unwrap();
        let loaded = load(&path).unwrap();

        let got = &loaded.access_points[&ap.mac.to_hex()];
        assert_eq!(got.ip, ap.ip);
        assert_eq!(got.config_version, ap.config_version);
        assert_eq!(got.state, ap.state);
    }
}
