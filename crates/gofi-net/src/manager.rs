//! The core orchestrator: per-AP state, lifecycle transitions, inform
//! response selection, and the action queue (§4.I).

use crate::adopt::{AdoptError, AdoptTransport};
use gofi_core::command;
use gofi_core::config::generator;
use gofi_core::discovery::Discovery;
use gofi_core::inform::{self, InformEnvelope, InformError};
use gofi_core::informdata::{self, InformData, InformDataError};
use gofi_core::types::{AccessPoint, Action, ApState, Mac, NetworkConfig};
use gofi_core::ConfigError;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum ManagerError {
    #[error("inform envelope error: {0}")]
    Inform(#[from] InformError),
    #[error("inform payload error: {0}")]
    InformData(#[from] InformDataError),
    #[error("config generation error: {0}")]
    Config(#[from] ConfigError),
    #[error("unknown AP {0}")]
    UnknownAp(Mac),
    #[error("an action is already pending for {0}")]
    DuplicateAction(Mac),
}

/// What an external collaborator decided about a freshly discovered AP.
pub struct AdoptParams {
    pub ssh_password: String,
}

/// Decides how to react to a discovery from a MAC not yet in the map.
pub trait OnDiscovery: Send + Sync {
    fn on_discovery(&self, disc: &Discovery) -> Option<AdoptParams>;
}

/// Default policy: always mint a new AP and adopt it with an empty
/// (factory-default) SSH password (§4.I).
pub struct AlwaysAdopt;

impl OnDiscovery for AlwaysAdopt {
    fn on_discovery(&self, _disc: &Discovery) -> Option<AdoptParams> {
        Some(AdoptParams {
            ssh_password: String::new(),
        })
    }
}

/// Decides whether to admit an AP that informs without ever being
/// discovered. Returning `Some(auth_key)` admits it in place, using that key
/// to decrypt the payload. Default policy is reject (§9).
pub trait OnUnknownAp: Send + Sync {
    fn on_unknown_ap(&self, remote_addr: SocketAddr, envelope: &InformEnvelope) -> Option<[u8; 16]>;
}

pub struct RejectUnknown;

impl OnUnknownAp for RejectUnknown {
    fn on_unknown_ap(&self, _remote_addr: SocketAddr, _envelope: &InformEnvelope) -> Option<[u8; 16]> {
        None
    }
}

/// Supplies the logical desired configuration for an AP; either one shared
/// tree controller-wide (`statelessd`) or one looked up per AP (`controllerd`).
pub trait DesiredConfig: Send + Sync {
    fn desired_config(&self, mac: &Mac) -> NetworkConfig;
}

/// The simplest `DesiredConfig`: the same network settings for every AP.
pub struct SharedConfig(pub NetworkConfig);

impl DesiredConfig for SharedConfig {
    fn desired_config(&self, _mac: &Mac) -> NetworkConfig {
        self.0.clone()
    }
}

const DEFAULT_MODEL: &str = "UAP-AC-LR";
const NOOP_INTERVAL_SECS: u32 = 3;

struct Inner {
    aps: HashMap<Mac, AccessPoint>,
    actions: HashMap<Mac, Action>,
    last_seen: HashMap<Mac, Instant>,
}

/// `aps`/`actions` live behind one exclusive lock per Manager, not one per
/// AP (§5) — crypto, JSON parsing and config generation happen outside it.
pub struct Manager {
    inner: Mutex<Inner>,
    adopt: Arc<dyn AdoptTransport>,
    on_discovery: Box<dyn OnDiscovery>,
    on_unknown_ap: Box<dyn OnUnknownAp>,
    desired: Arc<dyn DesiredConfig>,
    controller_host: String,
    http_listen_port: String,
    observer: Option<UnboundedSender<(Mac, InformData)>>,
}

impl Manager {
    pub fn new(
        controller_host: String,
        http_listen_port: String,
        adopt: Arc<dyn AdoptTransport>,
        desired: Arc<dyn DesiredConfig>,
    ) -> Self {
        Self {
            inner: Mutex::new(Inner {
                aps: HashMap::new(),
                actions: HashMap::new(),
                last_seen: HashMap::new(),
            }),
            adopt,
            on_discovery: Box::new(AlwaysAdopt),
            on_unknown_ap: Box::new(RejectUnknown),
            desired,
            controller_host,
            http_listen_port,
            observer: None,
        }
    }

    pub fn with_on_discovery(mut self, hook: Box<dyn OnDiscovery>) -> Self {
        self.on_discovery = hook;
        self
    }

    pub fn with_on_unknown_ap(mut self, hook: Box<dyn OnUnknownAp>) -> Self {
        self.on_unknown_ap = hook;
        self
    }

    pub fn with_observer(mut self, tx: UnboundedSender<(Mac, InformData)>) -> Self {
        self.observer = Some(tx);
        self
    }

    fn controller_url(&self) -> String {
        format!("http://{}{}/inform", self.controller_host, self.http_listen_port)
    }

    /// A snapshot of every AP record, for the "basic" controller's JSON statefile.
    pub fn snapshot(&self) -> Vec<AccessPoint> {
        self.inner.lock().aps.values().cloned().collect()
    }

    /// Restore AP records persisted by a previous run.
    pub fn restore(&self, aps: Vec<AccessPoint>) {
        let mut inner = self.inner.lock();
        let now = Instant::now();
        for ap in aps {
            inner.last_seen.insert(ap.mac, now);
            inner.aps.insert(ap.mac, ap);
        }
    }

    pub fn ap(&self, mac: &Mac) -> Option<AccessPoint> {
        self.inner.lock().aps.get(mac).cloned()
    }

    /// React to a discovery datagram: mint and adopt a new AP if the MAC is
    /// unknown and the hook approves (§4.I).
    pub async fn handle_discovery(&self, disc: &Discovery) {
        let Some(mac_bytes) = disc.mac else {
            debug!("discovery with no MAC TLV, ignoring");
            return;
        };
        let mac = Mac(mac_bytes);

        if self.inner.lock().aps.contains_key(&mac) {
            return;
        }

        let Some(params) = self.on_discovery.on_discovery(disc) else {
            debug!(%mac, "on_discovery hook declined adoption");
            return;
        };

        let mut auth_key = [0u8; 16];
        rand::RngCore::fill_bytes(&mut rand::thread_rng(), &mut auth_key);

        let mut ap = AccessPoint {
            mac,
            ip: disc.remote_addr.ip().to_string(),
            auth_key,
            ssh_password: params.ssh_password.clone(),
            config_version: String::new(),
            state: ApState::Adopting,
        };
        ap.mark_config_dirty();

        {
            let mut inner = self.inner.lock();
            inner.last_seen.insert(mac, Instant::now());
            inner.aps.insert(mac, ap);
        }

        let ap_addr = disc.remote_addr.ip().to_string();
        let auth_key_hex = hex::encode(auth_key);
        let controller_url = self.controller_url();

        match self
            .adopt
            .adopt(&ap_addr, &params.ssh_password, &controller_url, &auth_key_hex)
            .await
        {
            Ok(()) => {
                if let Some(ap) = self.inner.lock().aps.get_mut(&mac) {
                    ap.state = ApState::Adopted;
                }
                info!(%mac, "adopted");
            }
            Err(err) => {
                warn!(%mac, %err, "adopt failed, AP remains Adopting");
            }
        }
    }

    /// Evict AP records stuck in `Adopting` for longer than `max_age`,
    /// letting the next discovery mint them fresh (§9).
    pub fn evict_stale_adopting(&self, max_age: Duration) {
        let mut inner = self.inner.lock();
        let now = Instant::now();
        let stale: Vec<Mac> = inner
            .aps
            .iter()
            .filter(|(_, ap)| ap.state == ApState::Adopting)
            .filter(|(mac, _)| {
                inner
                    .last_seen
                    .get(*mac)
                    .map(|seen| now.duration_since(*seen) > max_age)
                    .unwrap_or(true)
            })
            .map(|(mac, _)| *mac)
            .collect();

        for mac in stale {
            warn!(%mac, "evicting AP stuck in Adopting");
            inner.aps.remove(&mac);
            inner.last_seen.remove(&mac);
            inner.actions.remove(&mac);
        }
    }

    pub fn locate_ap(&self, mac: Mac) -> Result<(), ManagerError> {
        self.enqueue(mac, Action::Locate)
    }

    pub fn kick_station(&self, ap_mac: Mac, sta_mac: Mac) -> Result<(), ManagerError> {
        self.enqueue(ap_mac, Action::KickStation { target: sta_mac })
    }

    fn enqueue(&self, mac: Mac, action: Action) -> Result<(), ManagerError> {
        let mut inner = self.inner.lock();
        if !inner.aps.contains_key(&mac) {
            return Err(ManagerError::UnknownAp(mac));
        }
        if inner.actions.contains_key(&mac) {
            return Err(ManagerError::DuplicateAction(mac));
        }
        inner.actions.insert(mac, action);
        Ok(())
    }

    /// Handle a decoded HTTP `/inform` body end to end, returning the sealed
    /// reply bytes (§4.I steps 1-5).
    pub fn handle_inform(&self, remote_addr: SocketAddr, raw: &[u8]) -> Result<Vec<u8>, ManagerError> {
        let mut envelope = inform::decode(raw)?;
        let mac = Mac(envelope.ap_mac);

        let known_key = self.inner.lock().aps.get(&mac).map(|ap| ap.auth_key);
        let auth_key = match known_key {
            Some(key) => key,
            None => {
                let key = self
                    .on_unknown_ap
                    .on_unknown_ap(remote_addr, &envelope)
                    .ok_or(ManagerError::UnknownAp(mac))?;
                let mut inner = self.inner.lock();
                inner.aps.entry(mac).or_insert_with(|| AccessPoint {
                    mac,
                    ip: remote_addr.ip().to_string(),
                    auth_key: key,
                    ssh_password: String::new(),
                    config_version: String::new(),
                    state: ApState::Adopted,
                });
                key
            }
        };

        let payload = envelope.payload(&auth_key)?;
        let data = informdata::parse(payload)?;

        if let Some(observer) = &self.observer {
            let _ = observer.send((mac, data.clone()));
        }

        let reply_body = self.advance_state(&mac, remote_addr, &data)?;

        self.inner.lock().last_seen.insert(mac, Instant::now());

        Ok(envelope.seal_reply(&auth_key, &reply_body)?)
    }

    fn advance_state(
        &self,
        mac: &Mac,
        remote_addr: SocketAddr,
        data: &InformData,
    ) -> Result<Vec<u8>, ManagerError> {
        let mut inner = self.inner.lock();
        let ap = inner.aps.get_mut(mac).ok_or(ManagerError::UnknownAp(*mac))?;
        ap.ip = remote_addr.ip().to_string();

        if data.cfgversion != ap.config_version {
            let config_version = ap.config_version.clone();
            let auth_key_hex = hex::encode(ap.auth_key);
            let was_adopted = ap.state == ApState::Adopted;
            drop(inner);

            // Generate both documents before touching state: a generator
            // failure must leave the AP exactly as it was.
            let net = self.desired.desired_config(mac);
            let model = if data.model_display.is_empty() {
                DEFAULT_MODEL.to_string()
            } else {
                data.model_display.clone()
            };
            let sys_conf = generator::generate_sys_conf(&model, &config_version, &net)?;
            let mgmt_conf = generator::generate_mgmt_conf(
                &auth_key_hex,
                &config_version,
                &self.controller_host,
                &self.http_listen_port,
            )?;

            if was_adopted {
                let mut inner = self.inner.lock();
                if let Some(ap) = inner.aps.get_mut(mac) {
                    ap.state = ApState::Provisioning;
                }
            }
            return Ok(command::set_param(sys_conf, mgmt_conf, config_version));
        }

        if ap.state == ApState::Provisioning {
            ap.state = ApState::Managed;
        }

        let action = inner.actions.remove(mac);
        Ok(match action {
            Some(Action::Locate) => command::locate(),
            Some(Action::KickStation { target }) => command::kick_station(&target.to_hex()),
            None => command::noop(NOOP_INTERVAL_SECS),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use gofi_core::codec;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex as StdMutex;

    struct FakeAdopt {
        calls: StdMutex<Vec<(String, String, String)>>,
        fail: AtomicUsize,
    }

    impl FakeAdopt {
        fn new() -> Self {
            Self {
                calls: StdMutex::new(Vec::new()),
                fail: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl AdoptTransport for FakeAdopt {
        async fn adopt(
            &self,
            ap_addr: &str,
            _ssh_password: &str,
            controller_url: &str,
            auth_key_hex: &str,
        ) -> Result<(), AdoptError> {
            self.calls.lock().unwrap().push((
                ap_addr.to_string(),
                controller_url.to_string(),
                auth_key_hex.to_string(),
            ));
            if self.fail.load(Ordering::SeqCst) > 0 {
                return Err(AdoptError::CommandFailed(1));
            }
            Ok(())
        }
    }

    fn disc(mac: [u8; 6]) -> Discovery {
        Discovery {
            pkt_size: 0,
            raw_tlvs: vec![],
            mac: Some(mac),
            hostname: None,
            platform: None,
            firmware_version: None,
            uptime_secs: None,
            remote_addr: "192.168.1.50:10001".parse().unwrap(),
        }
    }

    fn test_manager(adopt: Arc<dyn AdoptTransport>) -> Manager {
        Manager::new(
            "192.168.1.2".into(),
            ":8080".into(),
            adopt,
            Arc::new(SharedConfig(NetworkConfig {
                networks: vec![gofi_core::types::Network {
                    ssid: "kek".into(),
                    password: "the_shrekkening".into(),
                    ..Default::default()
                }],
                ..Default::default()
            })),
        )
    }

    fn seal_request(key: &[u8; 16], mac: [u8; 6], cfgversion: &str) -> Vec<u8> {
        let iv = [0x42u8; 16];
        let plaintext = format!(r#"{{"cfgversion":"{cfgversion}"}}"#);
        let mut ciphertext = codec::pkcs7_pad(plaintext.as_bytes());
        codec::aes_cbc_encrypt(key, &iv, &mut ciphertext).unwrap();

        let mut out = Vec::new();
        out.extend_from_slice(b"TNBU");
        out.extend_from_slice(&0u32.to_be_bytes());
        out.extend_from_slice(&mac);
        out.extend_from_slice(&1u16.to_be_bytes());
        out.extend_from_slice(&iv);
        out.extend_from_slice(&1u32.to_be_bytes());
        out.extend_from_slice(&(ciphertext.len() as u32).to_be_bytes());
        out.extend_from_slice(&ciphertext);
        out
    }

    #[tokio::test]
    async fn discovery_adopts_and_transitions_to_adopted() {
        let adopt = Arc::new(FakeAdopt::new());
        let mgr = test_manager(adopt.clone());
        let mac = [1, 2, 3, 4, 5, 6];

        mgr.handle_discovery(&disc(mac)).await;

        let ap = mgr.ap(&Mac(mac)).unwrap();
        assert_eq!(ap.state, ApState::Adopted);
        assert_eq!(adopt.calls.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn failed_adopt_leaves_ap_adopting() {
        let adopt = Arc::new(FakeAdopt::new());
        adopt.fail.store(1, Ordering::SeqCst);
        let mgr = test_manager(adopt);
        let mac = [9, 9, 9, 9, 9, 9];

        mgr.handle_discovery(&disc(mac)).await;

        let ap = mgr.ap(&Mac(mac)).unwrap();
        assert_eq!(ap.state, ApState::Adopting);
    }

    #[tokio::test]
    async fn version_mismatch_drives_provisioning() {
        let adopt = Arc::new(FakeAdopt::new());
        let mgr = test_manager(adopt);
        let mac = [1, 1, 1, 1, 1, 1];
        mgr.handle_discovery(&disc(mac)).await;

        let key = mgr.ap(&Mac(mac)).unwrap().auth_key;
        let request = seal_request(&key, mac, "some-other-version");
        let reply = mgr.handle_inform("10.0.0.1:4321".parse().unwrap(), &request).unwrap();

        let mut env = inform::decode(&reply).unwrap();
        let body = env.payload(&key).unwrap();
        let v: serde_json::Value = serde_json::from_slice(body).unwrap();
        assert_eq!(v["_type"], "setparam");
        assert_eq!(mgr.ap(&Mac(mac)).unwrap().state, ApState::Provisioning);
    }

    #[tokio::test]
    async fn matching_version_with_pending_locate_emits_locate_then_noop() {
        let adopt = Arc::new(FakeAdopt::new());
        let mgr = test_manager(adopt);
        let mac = [2, 2, 2, 2, 2, 2];
        mgr.handle_discovery(&disc(mac)).await;

        let key = mgr.ap(&Mac(mac)).unwrap().auth_key;
        let cfgversion = mgr.ap(&Mac(mac)).unwrap().config_version;

        mgr.locate_ap(Mac(mac)).unwrap();
        assert!(matches!(
            mgr.locate_ap(Mac(mac)),
            Err(ManagerError::DuplicateAction(_))
        ));

        let request = seal_request(&key, mac, &cfgversion);
        let reply = mgr.handle_inform("10.0.0.1:4321".parse().unwrap(), &request).unwrap();
        let mut env = inform::decode(&reply).unwrap();
        let body = env.payload(&key).unwrap();
        let v: serde_json::Value = serde_json::from_slice(body).unwrap();
        assert_eq!(v["cmd"], "locate");

        let request2 = seal_request(&key, mac, &cfgversion);
        let reply2 = mgr.handle_inform("10.0.0.1:4321".parse().unwrap(), &request2).unwrap();
        let mut env2 = inform::decode(&reply2).unwrap();
        let body2 = env2.payload(&key).unwrap();
        let v2: serde_json::Value = serde_json::from_slice(body2).unwrap();
        assert_eq!(v2["_type"], "noop");
    }

    #[tokio::test]
    async fn config_generation_failure_leaves_state_unchanged() {
        let adopt = Arc::new(FakeAdopt::new());
        let mgr = Manager::new(
            "192.168.1.2".into(),
            ":8080".into(),
            adopt,
            Arc::new(SharedConfig(NetworkConfig::default())),
        );
        let mac = [3, 3, 3, 3, 3, 3];
        mgr.handle_discovery(&disc(mac)).await;

        let key = mgr.ap(&Mac(mac)).unwrap().auth_key;
        let state_before = mgr.ap(&Mac(mac)).unwrap().state;
        assert_eq!(state_before, ApState::Adopted);

        let request = seal_request(&key, mac, "some-other-version");
        let err = mgr
            .handle_inform("10.0.0.1:4321".parse().unwrap(), &request)
            .unwrap_err();

        assert!(matches!(err, ManagerError::Config(_)));
        assert_eq!(mgr.ap(&Mac(mac)).unwrap().state, state_before);
    }

    #[tokio::test]
    async fn inform_from_unknown_mac_is_rejected_by_default() {
        let adopt = Arc::new(FakeAdopt::new());
        let mgr = test_manager(adopt);
        let request = seal_request(&[0u8; 16], [7, 7, 7, 7, 7, 7], "v1");
        let err = mgr
            .handle_inform("10.0.0.1:4321".parse().unwrap(), &request)
            .unwrap_err();
        assert!(matches!(err, ManagerError::UnknownAp(_)));
    }
}
