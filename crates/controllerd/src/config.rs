//! CLI surface for the "basic" controller (§6 "CLI surface", mirroring the
//! source's `controllers/basic/main.go` flag set).

use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;

/// controllerd - per-AP persisted-state wireless controller
#[derive(Parser, Debug, Clone)]
#[command(name = "controllerd")]
#[command(about = "Inform-protocol wireless AP controller with a JSON statefile")]
pub struct Config {
    /// Network name pushed to every adopted AP
    #[arg(long, default_value = "gofi")]
    pub ssid: String,

    /// Network password
    #[arg(long, default_value = "fiogfiog", env = "CONTROLLERD_PW")]
    pub pw: String,

    /// Make the network available on 5GHz as well as 2.4GHz
    #[arg(long, default_value_t = true)]
    pub enable_5g: bool,

    /// Steer dual-band clients toward 5GHz
    #[arg(long, default_value_t = false)]
    pub enable_bandsteering: bool,

    /// Fixed TX power in dBm (0 = auto)
    #[arg(long, default_value_t = 0)]
    pub tx: i32,

    /// Minimum RSSI before a client is disconnected (0 = disabled)
    #[arg(long, default_value_t = 0)]
    pub min_rssi: i32,

    /// Controller LAN IP; autodetected if not set
    #[arg(long)]
    pub addr: Option<String>,

    /// HTTP inform listener address
    #[arg(long, default_value = "0.0.0.0:8421")]
    pub listener: SocketAddr,

    /// Path to the JSON statefile (defaults to ./controllerState.json)
    #[arg(long)]
    pub statefile: Option<PathBuf>,
}

impl Config {
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.enable_bandsteering && !self.enable_5g {
            anyhow::bail!("cannot bandsteer without 5G networks enabled");
        }
        Ok(())
    }

    pub fn statefile_path(&self) -> PathBuf {
        self.statefile
            .clone()
            .unwrap_or_else(|| PathBuf::from("controllerState.json"))
    }

    pub fn network_config(&self) -> gofi_core::types::NetworkConfig {
        use gofi_core::types::{BandSteer, BandSteerMode, Network, NetworkConfig};

        let mut networks = vec![Network {
            ssid: self.ssid.clone(),
            password: self.pw.clone(),
            is_5ghz: false,
            ..Default::default()
        }];
        if self.enable_5g {
            networks.push(Network {
                ssid: self.ssid.clone(),
                password: self.pw.clone(),
                is_5ghz: true,
                ..Default::default()
            });
        }

        NetworkConfig {
            networks,
            band_steer: BandSteer {
                enabled: self.enable_bandsteering,
                mode: BandSteerMode::Prefer5G,
            },
            tx_power: self.tx,
            min_rssi: self.min_rssi,
            ..Default::default()
        }
    }
}
