//! Compose sysconf and mgmt-conf documents from per-model base templates and
//! a logical [`NetworkConfig`] (§4.F). Base templates are carried over
//! verbatim from the vendor's shipped per-model config skeletons.

use super::section::{self, ConfigError, Section};
use crate::types::{BandSteerMode, NetworkConfig, NetworkKind};
use tracing::warn;

const BASE_TWO_RADIO_DEVICE: &str = r#"
radio.status=enabled
radio.countrycode=36
aaa.status=enabled
wireless.status=enabled

bridge.1.devname=br0
bridge.1.fd=1
bridge.1.port.1.devname=eth0
bridge.1.stp.status=disabled
bridge.status=enabled
route.status=enabled

ntpclient.1.server=0.ubnt.pool.ntp.org
ntpclient.1.status=enabled
ntpclient.status=enabled
dhcpc.1.devname=br0
dhcpc.1.status=enabled
dhcpc.status=enabled
dhcpd.1.status=disabled
dhcpd.status=disabled
ebtables.1.cmd=-t broute -A BROUTING -p 0x888e -i ath0 -j DROP
ebtables.status=enabled
httpd.status=disabled
mgmt.discovery.status=enabled
mgmt.flavor=ace
mgmt.is_default=true
syslog.file=/var/log/messages
syslog.level=8
syslog.remote.ip=192.168.1.1
syslog.remote.port=514
syslog.remote.status=disabled
syslog.rotate=1
syslog.size=200
syslog.status=enabled
netconf.1.autoip.status=disabled
netconf.1.devname=br0
netconf.1.ip=192.168.1.20
netconf.1.netmask=255.255.255.0
netconf.1.status=enabled
netconf.1.up=enabled
netconf.2.autoip.status=disabled
netconf.2.devname=eth0
netconf.2.ip=0.0.0.0
netconf.2.promisc=enabled
netconf.2.status=enabled
netconf.2.up=enabled
netconf.3.autoip.status=disabled
netconf.3.devname=ath0
netconf.3.ip=0.0.0.0
netconf.3.promisc=enabled
netconf.3.status=enabled
netconf.3.up=disabled
netconf.4.autoip.status=disabled
netconf.4.devname=ath1
netconf.4.ip=0.0.0.0
netconf.4.promisc=enabled
netconf.4.status=enabled
netconf.4.up=disabled
netconf.status=enabled

bandsteering.status=disabled
bandsteering.mode=prefer_5g

radio.1.ack.auto=disabled
radio.1.acktimeout=64
radio.1.ampdu.status=enabled
radio.1.channel=auto
radio.1.cwm.enable=0
radio.1.cwm.mode=0
radio.1.devname=ath0
radio.1.forbiasauto=0
radio.1.ieee_mode=11nght20
radio.1.mode=master
radio.1.phyname=wifi0
radio.1.rate.auto=enabled
radio.1.rate.mcs=auto
radio.1.status=enabled
radio.1.txpower=auto
radio.1.hard_noisefloor.status=disabled
radio.1.ubntroam.status=disabled
radio.1.bgscan.status=disabled

radio.2.ack.auto=disabled
radio.2.acktimeout=64
radio.2.ampdu.status=enabled
radio.2.channel=auto
radio.2.clksel=1
radio.2.cwm.enable=0
radio.2.cwm.mode=1
radio.2.devname=ath1
radio.2.forbiasauto=0
radio.2.ieee_mode=11naht40
radio.2.mode=master
radio.2.phyname=wifi1
radio.2.rate.auto=enabled
radio.2.rate.mcs=auto
radio.2.status=enabled
radio.2.txpower=auto
radio.2.hard_noisefloor.status=disabled
radio.2.ubntroam.status=disabled
radio.2.bgscan.status=disabled
"#;

const PER_NETWORK_BASE: &str = r#"
aaa.XREPX.br.devname=br0
aaa.XREPX.devname=ath0
aaa.XREPX.driver=madwifi
aaa.XREPX.ssid=kek
aaa.XREPX.status=enabled
aaa.XREPX.verbose=2
aaa.XREPX.wpa=2
aaa.XREPX.eapol_version=2
aaa.XREPX.wpa.group_rekey=0
aaa.XREPX.wpa.1.pairwise=CCMP
aaa.XREPX.wpa.key.1.mgmt=WPA-PSK
aaa.XREPX.wpa.psk=ee

wireless.XREPX.addmtikie=disabled
wireless.XREPX.authmode=1
wireless.XREPX.autowds=disabled
wireless.XREPX.devname=ath0
wireless.XREPX.hide_ssid=false
wireless.XREPX.is_guest=false
wireless.XREPX.l2_isolation=disabled
wireless.XREPX.mac_acl.policy=deny
wireless.XREPX.mac_acl.status=enabled
wireless.XREPX.mode=master
wireless.XREPX.parent=wifi0
wireless.XREPX.schedule_enabled=disabled
wireless.XREPX.security=none
wireless.XREPX.ssid=kek
wireless.XREPX.status=enabled
wireless.XREPX.uapsd=disabled
wireless.XREPX.usage=user
wireless.XREPX.vport=disabled
wireless.XREPX.vwire=disabled
wireless.XREPX.wds=disabled
wireless.XREPX.wmm=enabled
wireless.XREPX.puren=0
wireless.XREPX.pureg=1
"#;

/// The switch base template is shipped but "apply switch config" remains a
/// no-op (§9) until switch support is genuinely implemented.
const BASIC_SWITCH_CONFIG: &str = r#"
vlan.status=disabled
bridge.status=disabled

dhcpc.1.devname=eth0
dhcpc.1.status=enabled
dhcpc.status=enabled
dhcpd.1.status=disabled
dhcpd.status=disabled

ebtables.status=disabled
httpd.status=disabled

netconf.1.autoip.status=disabled
netconf.1.devname=eth0
netconf.1.ip=0.0.0.0
netconf.1.status=enabled
netconf.1.up=enabled
netconf.status=enabled

route.status=enabled

ntpclient.status=enabled
ntpclient.1.status=enabled
ntpclient.1.server=0.ubnt.pool.ntp.org
ntpclient.2.status=enabled
ntpclient.2.server=1.ubnt.pool.ntp.org
ntpclient.3.status=enabled
ntpclient.3.server=2.ubnt.pool.ntp.org
ntpclient.4.status=enabled
ntpclient.4.server=3.ubnt.pool.ntp.org

radio.status=disabled
stamgr.status=disabled
switch.status=enabled

syslog.file=/var/log/messages
syslog.level=8
syslog.remote.status=disabled
syslog.rotate=1
syslog.size=200
syslog.status=enabled

switch.managementvlan=1
switch.wevent.idp=enabled
switch.wevent.mcip=
switch.wevent.key=
switch.jumboframes=disabled
switch.mtu=9216
switch.stp.version=rstp
switch.stp.priority=32768
switch.stp.status=enabled
switch.dot1x.status=disabled
switch.vlan.1.id=1
switch.vlan.1.mode=untagged
switch.vlan.1.status=enabled
switch.dhcp_snoop.status=enabled
switch.port.1.name=Port 1
switch.port.1.lldpmed.opmode=enabled
switch.port.1.lldpmed.topology_notify=disabled
switch.port.1.opmode=switch
switch.port.2.name=Port 2
switch.port.2.lldpmed.opmode=enabled
switch.port.2.lldpmed.topology_notify=disabled
switch.port.2.opmode=switch
switch.port.3.name=Port 3
switch.port.3.lldpmed.opmode=enabled
switch.port.3.lldpmed.topology_notify=disabled
switch.port.3.opmode=switch
switch.port.4.name=Port 4
switch.port.4.lldpmed.opmode=enabled
switch.port.4.lldpmed.topology_notify=disabled
switch.port.4.opmode=switch
switch.port.5.name=Port 5
switch.port.5.lldpmed.opmode=enabled
switch.port.5.lldpmed.topology_notify=disabled
switch.port.5.opmode=switch
switch.port.5.poe=auto
switch.port.6.name=Port 6
switch.port.6.lldpmed.opmode=enabled
switch.port.6.lldpmed.topology_notify=disabled
switch.port.6.opmode=switch
switch.port.6.poe=auto
switch.port.7.name=Port 7
switch.port.7.lldpmed.opmode=enabled
switch.port.7.lldpmed.topology_notify=disabled
switch.port.7.opmode=switch
switch.port.7.poe=auto
switch.port.8.name=Port 8
switch.port.8.lldpmed.opmode=enabled
switch.port.8.lldpmed.topology_notify=disabled
switch.port.8.opmode=switch
switch.port.8.poe=auto

users.1.name=ubnt
users.1.password=VvpvCwhccFv6Q
users.1.status=enabled
users.status=enabled
"#;

enum Model {
    TwoRadioAp,
    Switch,
}

fn model_for(name: &str) -> Result<Model, ConfigError> {
    match name {
        "USW-8P-60" => Ok(Model::Switch),
        "UAP-AC" | "UAP-AC-LR" => Ok(Model::TwoRadioAp),
        other => {
            warn!(model = other, "rejecting config generation for unsupported model");
            Err(ConfigError::UnsupportedModel(other.to_string()))
        }
    }
}

/// Generate the device's full system configuration document.
pub fn generate_sys_conf(
    model_name: &str,
    _config_version: &str,
    net: &NetworkConfig,
) -> Result<String, ConfigError> {
    if net.networks.is_empty() {
        return Err(ConfigError::NoNetworks);
    }
    if net.networks.len() > 2 {
        return Err(ConfigError::TooManyNetworks(net.networks.len()));
    }

    let model = model_for(model_name)?;
    let mut conf = section::parse(match model {
        Model::Switch => BASIC_SWITCH_CONFIG,
        Model::TwoRadioAp => BASE_TWO_RADIO_DEVICE,
    })?;

    match model {
        Model::Switch => apply_switch_conf(&mut conf, net),
        Model::TwoRadioAp => apply_sys_conf(&mut conf, net),
    }

    Ok(conf.serialize())
}

fn apply_sys_conf(conf: &mut Section, net: &NetworkConfig) {
    for (i, network) in net.networks.iter().enumerate() {
        let index = (i + 1).to_string();
        let base = PER_NETWORK_BASE.replace("XREPX", &index);
        let mut net_specific = section::parse(&base).expect("per-network template is valid");

        net_specific
            .ensure_path("aaa")
            .ensure(&index)
            .ensure_path_val("devname", format!("ath{i}"));
        net_specific
            .ensure_path("wireless")
            .ensure(&index)
            .ensure_path_val("devname", format!("ath{i}"));
        net_specific.ensure_path_val(
            &format!("bridge.1.port.{}.devname", i + 2),
            format!("ath{i}"),
        );

        net_specific.ensure_path_val(&format!("aaa.{index}.ssid"), network.ssid.clone());
        net_specific.ensure_path_val(&format!("wireless.{index}.ssid"), network.ssid.clone());
        net_specific.ensure_path_val(&format!("aaa.{index}.wpa.psk"), network.password.clone());

        net_specific.ensure_path_val(
            &format!("wireless.{index}.hide_ssid"),
            if network.hide_beacon { "true" } else { "false" },
        );

        net_specific.ensure_path_val(
            &format!("wireless.{index}.parent"),
            if network.is_5ghz { "wifi1" } else { "wifi0" },
        );

        if network.channel != 0 {
            net_specific
                .ensure_path_val(&format!("wireless.{index}.channel"), network.channel.to_string());
        }

        if network.kind == NetworkKind::WpaEapRadius {
            net_specific.ensure_path_val(
                &format!("aaa.{index}.radius.acct.1.ip"),
                network.radius_ip.clone(),
            );
            net_specific.ensure_path_val(
                &format!("aaa.{index}.radius.acct.1.secret"),
                network.radius_secret.clone(),
            );
            net_specific.ensure_path_val(
                &format!("aaa.{index}.radius.acct.1.port"),
                network.radius_port.to_string(),
            );
            net_specific.ensure_path_val(
                &format!("aaa.{index}.radius.auth.1.ip"),
                network.radius_ip.clone(),
            );
            net_specific.ensure_path_val(
                &format!("aaa.{index}.radius.auth.1.secret"),
                network.radius_secret.clone(),
            );
            net_specific.ensure_path_val(
                &format!("aaa.{index}.radius.auth.1.port"),
                network.radius_port.to_string(),
            );
            net_specific.ensure_path_val(&format!("aaa.{index}.wpa.key.1.mgmt"), "WPA-EAP");
        }

        conf.consume(net_specific);
    }

    if net.band_steer.enabled {
        conf.ensure_path_val("bandsteering.status", "enabled");
        conf.ensure_path_val(
            "bandsteering.mode",
            match net.band_steer.mode {
                BandSteerMode::Prefer5G => "prefer_5g",
                BandSteerMode::Balance => "equal",
            },
        );
    }

    if net.tx_power != 0 {
        conf.ensure_path_val("radio.1.txpower", net.tx_power.to_string());
        conf.ensure_path_val("radio.2.txpower", net.tx_power.to_string());
        conf.ensure_path_val("radio.1.txpower_mode", "custom");
        conf.ensure_path_val("radio.2.txpower_mode", "custom");
    } else {
        conf.ensure_path_val("radio.1.txpower_mode", "auto");
        conf.ensure_path_val("radio.2.txpower_mode", "auto");
    }

    if net.min_rssi != 0 {
        conf.ensure_path_val("stamgr.1.minrssi.status", "true");
        conf.ensure_path_val("stamgr.1.minrssi.rssi", net.min_rssi.to_string());
        conf.ensure_path_val("stamgr.1.radio", "ng");
        conf.ensure_path_val("stamgr.1.status", "true");
        conf.ensure_path_val("stamgr.1.loadbalance.status", "false");
        conf.ensure_path_val("stamgr.2.minrssi.status", "true");
        conf.ensure_path_val("stamgr.2.minrssi.rssi", net.min_rssi.to_string());
        conf.ensure_path_val("stamgr.2.radio", "na");
        conf.ensure_path_val("stamgr.2.status", "true");
        conf.ensure_path_val("stamgr.2.loadbalance.status", "false");

        conf.ensure_path_val("stamgr.status", "enabled");
        conf.ensure_path_val(
            "stamgr.interval",
            if net.min_rssi_interval != 0 {
                net.min_rssi_interval.to_string()
            } else {
                "2".to_string()
            },
        );
        conf.ensure_path_val("ubntroam.status", "disabled");
        conf.ensure_path_val("connectivity.status", "enabled");
    }
}

/// Switch support is shipped as a base template only; applying per-model
/// network settings to it is a documented no-op until switch support is
/// genuinely implemented (§9).
fn apply_switch_conf(_conf: &mut Section, _net: &NetworkConfig) {}

/// Generate the mgmt-conf document that redirects the device to this controller.
pub fn generate_mgmt_conf(
    auth_key_hex: &str,
    config_version: &str,
    controller_host: &str,
    http_listen_port: &str,
) -> Result<String, ConfigError> {
    let mut conf = section::parse(
        r#"
mgmt.is_default=false
mgmt.authkey=41d6529fd555fbb1bdeeafeb995510fa
mgmt.cfgversion=f1bb359840b519a4
mgmt.servers.1.url=http://172.16.0.38:6080/inform
mgmt.selfrun_guest=pass
selfrun_guest=pass
led_enabled=true
cfgversion=f1bb359840b519a4
authkey=41d6529fd555fbb1bdeeafeb995510fa
"#,
    )?;

    conf.ensure_path_val(
        "mgmt.servers.1.url",
        format!("http://{controller_host}{http_listen_port}/inform"),
    );
    conf.ensure_path_val("mgmt.authkey", auth_key_hex);
    conf.ensure_path_val("authkey", auth_key_hex);
    conf.ensure_path_val("mgmt.cfgversion", config_version);
    conf.ensure_path_val("cfgversion", config_version);

    Ok(conf.serialize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{BandSteer, BandSteerMode, Network, NetworkKind};

    fn single_psk_network() -> NetworkConfig {
        NetworkConfig {
            networks: vec![Network {
                ssid: "kek".into(),
                password: "the_shrekkening".into(),
                ..Default::default()
            }],
            band_steer: BandSteer {
                enabled: true,
                mode: BandSteerMode::Balance,
            },
            ..Default::default()
        }
    }

    #[test]
    fn rejects_zero_networks() {
        let net = NetworkConfig::default();
        assert!(matches!(
            generate_sys_conf("UAP-AC-LR", "1", &net),
            Err(ConfigError::NoNetworks)
        ));
    }

    #[test]
    fn rejects_too_many_networks() {
        let mut net = single_psk_network();
        net.networks.push(Network::default());
        net.networks.push(Network::default());
        assert!(matches!(
            generate_sys_conf("UAP-AC-LR", "1", &net),
            Err(ConfigError::TooManyNetworks(3))
        ));
    }

    #[test]
    fn rejects_unsupported_model() {
        let net = single_psk_network();
        assert!(matches!(
            generate_sys_conf("NOT-A-MODEL", "1", &net),
            Err(ConfigError::UnsupportedModel(_))
        ));
    }

    #[test]
    fn two_network_dual_band_bandsteer_balance() {
        let net = NetworkConfig {
            networks: vec![
                Network {
                    ssid: "kek".into(),
                    password: "the_shrekkening".into(),
                    is_5ghz: false,
                    ..Default::default()
                },
                Network {
                    ssid: "kek".into(),
                    password: "the_shrekkening".into(),
                    is_5ghz: true,
                    ..Default::default()
                },
            ],
            band_steer: BandSteer {
                enabled: true,
                mode: BandSteerMode::Balance,
            },
            ..Default::default()
        };

        let out = generate_sys_conf("UAP-AC-LR", "123", &net).unwrap();
        assert!(out.contains("bandsteering.mode=equal"));
        assert!(out.contains("bandsteering.status=enabled"));
        assert!(out.contains("aaa.1.ssid=kek"));
        assert!(out.contains("aaa.2.ssid=kek"));
        assert!(out.contains("wireless.2.parent=wifi1"));
        assert!(out.contains("wireless.1.hide_ssid=false"));

        let mut sorted = out.lines().collect::<Vec<_>>();
        let mut expected_sorted = sorted.clone();
        expected_sorted.sort();
        assert_eq!(sorted, expected_sorted);
        sorted.dedup();
    }

    #[test]
    fn wpa_eap_radius_network() {
        let net = NetworkConfig {
            networks: vec![Network {
                kind: NetworkKind::WpaEapRadius,
                ssid: "kek".into(),
                password: "the_shrekkening".into(),
                radius_ip: "192.168.1.3".into(),
                radius_port: 1813,
                radius_secret: "secret".into(),
                ..Default::default()
            }],
            band_steer: BandSteer {
                enabled: true,
                mode: BandSteerMode::Balance,
            },
            ..Default::default()
        };

        let out = generate_sys_conf("UAP-AC-LR", "123", &net).unwrap();
        assert!(out.contains("aaa.1.wpa.key.1.mgmt=WPA-EAP"));
        assert!(out.contains("aaa.1.radius.auth.1.ip=192.168.1.3"));
        assert!(out.contains("aaa.1.radius.auth.1.port=1813"));
        assert!(out.contains("aaa.1.radius.auth.1.secret=secret"));
        assert!(out.contains("aaa.1.radius.acct.1.ip=192.168.1.3"));
        assert!(out.contains("aaa.1.radius.acct.1.port=1813"));
        assert!(out.contains("aaa.1.radius.acct.1.secret=secret"));
    }

    #[test]
    fn mgmt_conf_carries_authkey_and_url() {
        let out = generate_mgmt_conf("deadbeef", "v2", "192.168.1.50", ":8080").unwrap();
        assert!(out.contains("mgmt.authkey=deadbeef"));
        assert!(out.contains("mgmt.cfgversion=v2"));
        assert!(out.contains("mgmt.servers.1.url=http://192.168.1.50:8080/inform"));
    }
}
