//! UDP discovery announcement decoding (§4.B).

use std::net::SocketAddr;
use thiserror::Error;

const MAGIC: [u8; 2] = [0x02, 0x06];

const TLV_MAC: u8 = 0x01;
const TLV_FIRMWARE_VERSION: u8 = 0x03;
const TLV_UPTIME: u8 = 0x0A;
const TLV_HOSTNAME: u8 = 0x0B;
const TLV_PLATFORM: u8 = 0x0C;

/// Discovery decoding errors
#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("bad magic prefix")]
    BadMagic,
    #[error("truncated datagram")]
    Truncated,
    #[error("MAC TLV payload must be 6 bytes, got {0}")]
    BadMacLength(usize),
}

/// One raw type-length-value block, preserved even for kinds we don't
/// semantically interpret.
#[derive(Debug, Clone)]
pub struct Tlv {
    pub kind: u8,
    pub payload: Vec<u8>,
}

/// A decoded discovery announcement.
#[derive(Debug, Clone)]
pub struct Discovery {
    pub pkt_size: u16,
    pub raw_tlvs: Vec<Tlv>,

    pub mac: Option<[u8; 6]>,
    pub hostname: Option<String>,
    pub platform: Option<String>,
    pub firmware_version: Option<String>,
    pub uptime_secs: Option<u32>,
    pub remote_addr: SocketAddr,
}

/// Decode a raw discovery datagram from `remote_addr`.
pub fn decode(remote_addr: SocketAddr, pkt: &[u8]) -> Result<Discovery, DiscoveryError> {
    let mut cursor = pkt;

    let magic = take(&mut cursor, 2)?;
    if magic != MAGIC {
        return Err(DiscoveryError::BadMagic);
    }

    let size_bytes = take(&mut cursor, 2)?;
    let pkt_size = u16::from_be_bytes([size_bytes[0], size_bytes[1]]);

    let mut raw_tlvs = Vec::new();
    while !cursor.is_empty() {
        let kind = take(&mut cursor, 1)?[0];
        let len_bytes = take(&mut cursor, 2)?;
        let len = u16::from_be_bytes([len_bytes[0], len_bytes[1]]) as usize;
        let payload = take(&mut cursor, len)?.to_vec();
        raw_tlvs.push(Tlv { kind, payload });
    }

    let mut out = Discovery {
        pkt_size,
        raw_tlvs: raw_tlvs.clone(),
        mac: None,
        hostname: None,
        platform: None,
        firmware_version: None,
        uptime_secs: None,
        remote_addr,
    };

    for tlv in &raw_tlvs {
        match tlv.kind {
            TLV_MAC => {
                if tlv.payload.len() != 6 {
                    return Err(DiscoveryError::BadMacLength(tlv.payload.len()));
                }
                let mut mac = [0u8; 6];
                mac.copy_from_slice(&tlv.payload);
                out.mac = Some(mac);
            }
            TLV_UPTIME => {
                if tlv.payload.len() == 4 {
                    out.uptime_secs = Some(u32::from_be_bytes([
                        tlv.payload[0],
                        tlv.payload[1],
                        tlv.payload[2],
                        tlv.payload[3],
                    ]));
                }
            }
            TLV_HOSTNAME => out.hostname = Some(String::from_utf8_lossy(&tlv.payload).into_owned()),
            TLV_FIRMWARE_VERSION => {
                out.firmware_version = Some(String::from_utf8_lossy(&tlv.payload).into_owned())
            }
            TLV_PLATFORM => out.platform = Some(String::from_utf8_lossy(&tlv.payload).into_owned()),
            _ => {}
        }
    }

    Ok(out)
}

fn take<'a>(cursor: &mut &'a [u8], n: usize) -> Result<&'a [u8], DiscoveryError> {
    if cursor.len() < n {
        return Err(DiscoveryError::Truncated);
    }
    let (head, tail) = cursor.split_at(n);
    *cursor = tail;
    Ok(head)
}
