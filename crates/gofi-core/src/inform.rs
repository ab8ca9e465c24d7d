//! Inform envelope marshal/unmarshal and the flag-driven decompress/decrypt
//! pipeline (§4.C).

use crate::codec::{self, CodecError};
use thiserror::Error;
use tracing::warn;

const MAGIC: &[u8; 4] = b"TNBU";
const IV_LEN: usize = 16;

const FLAG_ENCRYPTED: u16 = 1 << 0;
const FLAG_ZLIB: u16 = 1 << 1;
const FLAG_SNAPPY: u16 = 1 << 2;

/// Inform codec errors
#[derive(Debug, Error)]
pub enum InformError {
    #[error("bad magic prefix")]
    BadMagic,
    #[error("unsupported protocol version {0}")]
    UnsupportedProtocolVersion(u32),
    #[error("unsupported data version {0}")]
    UnsupportedDataVersion(u32),
    #[error("truncated envelope")]
    Truncated,
    #[error(transparent)]
    Codec(#[from] CodecError),
}

/// A decoded inform envelope. The payload is left exactly as it arrived on
/// the wire until [`InformEnvelope::payload`] is called; decode never
/// decrypts or decompresses eagerly.
#[derive(Debug, Clone)]
pub struct InformEnvelope {
    pub protocol_version: u32,
    pub ap_mac: [u8; 6],
    pub iv: [u8; IV_LEN],
    pub data_version: u32,
    pub data: Vec<u8>,

    pub encrypted: bool,
    pub zlib: bool,
    pub snappy: bool,
}

/// Decode an inform envelope from a raw byte stream (e.g. an HTTP request body).
pub fn decode(bytes: &[u8]) -> Result<InformEnvelope, InformError> {
    let mut cursor = bytes;

    let magic = take(&mut cursor, 4)?;
    if magic != MAGIC.as_slice() {
        return Err(InformError::BadMagic);
    }

    let protocol_version = take_u32(&mut cursor)?;
    if protocol_version != 0 {
        return Err(InformError::UnsupportedProtocolVersion(protocol_version));
    }

    let mac_bytes = take(&mut cursor, 6)?;
    let mut ap_mac = [0u8; 6];
    ap_mac.copy_from_slice(mac_bytes);

    let flags_bytes = take(&mut cursor, 2)?;
    let flags = u16::from_be_bytes([flags_bytes[0], flags_bytes[1]]);

    let iv_bytes = take(&mut cursor, IV_LEN)?;
    let mut iv = [0u8; IV_LEN];
    iv.copy_from_slice(iv_bytes);

    let data_version = take_u32(&mut cursor)?;
    if data_version != 1 {
        return Err(InformError::UnsupportedDataVersion(data_version));
    }

    let data_length = take_u32(&mut cursor)? as usize;
    let data = take(&mut cursor, data_length)?.to_vec();

    Ok(InformEnvelope {
        protocol_version,
        ap_mac,
        iv,
        data_version,
        data,
        encrypted: flags & FLAG_ENCRYPTED != 0,
        zlib: flags & FLAG_ZLIB != 0,
        snappy: flags & FLAG_SNAPPY != 0,
    })
}

impl InformEnvelope {
    /// Apply the flagged transformations, in the order decrypt -> snappy ->
    /// zlib, clearing each flag as it's applied so a second call is a no-op.
    pub fn payload(&mut self, key: &[u8]) -> Result<&[u8], InformError> {
        if self.encrypted {
            if let Err(err) = codec::aes_cbc_decrypt(key, &self.iv, &mut self.data) {
                warn!(mac = ?self.ap_mac, %err, "inform payload decrypt failed");
                return Err(err.into());
            }
            self.data = match codec::pkcs7_unpad(&self.data) {
                Ok(unpadded) => unpadded.to_vec(),
                Err(err) => {
                    warn!(mac = ?self.ap_mac, %err, "inform payload unpad failed");
                    return Err(err.into());
                }
            };
            self.encrypted = false;
        }
        if self.snappy {
            self.data = match codec::snappy_decode(&self.data) {
                Ok(d) => d,
                Err(err) => {
                    warn!(mac = ?self.ap_mac, %err, "inform payload snappy decode failed");
                    return Err(err.into());
                }
            };
            self.snappy = false;
        }
        if self.zlib {
            self.data = match codec::zlib_decode(&self.data) {
                Ok(d) => d,
                Err(err) => {
                    warn!(mac = ?self.ap_mac, %err, "inform payload zlib decode failed");
                    return Err(err.into());
                }
            };
            self.zlib = false;
        }
        Ok(&self.data)
    }

    /// Seal `data` as a reply to this request: PKCS7-pad, AES-CBC encrypt
    /// with `key` and this request's IV, and emit an encrypted-only envelope
    /// sharing this request's `protocol_version`, `ap_mac` and `data_version`.
    pub fn seal_reply(&self, key: &[u8], data: &[u8]) -> Result<Vec<u8>, InformError> {
        let mut ciphertext = codec::pkcs7_pad(data);
        codec::aes_cbc_encrypt(key, &self.iv, &mut ciphertext)?;

        let mut out = Vec::with_capacity(4 + 4 + 6 + 2 + IV_LEN + 4 + 4 + ciphertext.len());
        out.extend_from_slice(MAGIC);
        out.extend_from_slice(&self.protocol_version.to_be_bytes());
        out.extend_from_slice(&self.ap_mac);
        out.extend_from_slice(&FLAG_ENCRYPTED.to_be_bytes());
        out.extend_from_slice(&self.iv);
        out.extend_from_slice(&self.data_version.to_be_bytes());
        out.extend_from_slice(&(ciphertext.len() as u32).to_be_bytes());
        out.extend_from_slice(&ciphertext);
        Ok(out)
    }
}

fn take<'a>(cursor: &mut &'a [u8], n: usize) -> Result<&'a [u8], InformError> {
    if cursor.len() < n {
        return Err(InformError::Truncated);
    }
    let (head, tail) = cursor.split_at(n);
    *cursor = tail;
    Ok(head)
}

fn take_u32(cursor: &mut &[u8]) -> Result<u32, InformError> {
    let b = take(cursor, 4)?;
    Ok(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encrypted_envelope(key: &[u8; 16], iv: &[u8; 16], plaintext: &[u8]) -> Vec<u8> {
        let mut ciphertext = codec::pkcs7_pad(plaintext);
        codec::aes_cbc_encrypt(key, iv, &mut ciphertext).unwrap();

        let mut out = Vec::new();
        out.extend_from_slice(MAGIC);
        out.extend_from_slice(&0u32.to_be_bytes());
        out.extend_from_slice(&[0xAA, 0xBB, 0xCC, 0xDD, 0xEE, 0xFF]);
        out.extend_from_slice(&FLAG_ENCRYPTED.to_be_bytes());
        out.extend_from_slice(iv);
        out.extend_from_slice(&1u32.to_be_bytes());
        out.extend_from_slice(&(ciphertext.len() as u32).to_be_bytes());
        out.extend_from_slice(&ciphertext);
        out
    }

    #[test]
    fn decode_then_payload_round_trips() {
        let key = [0x11u8; 16];
        let iv = [0x22u8; 16];
        let plaintext = br#"{"cfgversion":"v1"}"#;

        let wire = encrypted_envelope(&key, &iv, plaintext);
        let mut env = decode(&wire).unwrap();
        assert_eq!(env.ap_mac, [0xAA, 0xBB, 0xCC, 0xDD, 0xEE, 0xFF]);
        assert!(env.encrypted);

        let out = env.payload(&key).unwrap();
        assert_eq!(out, plaintext);
        assert!(!env.encrypted);
    }

    #[test]
    fn payload_is_idempotent() {
        let key = [0x33u8; 16];
        let iv = [0x44u8; 16];
        let plaintext = b"idempotency check";
        let wire = encrypted_envelope(&key, &iv, plaintext);
        let mut env = decode(&wire).unwrap();

        let first = env.payload(&key).unwrap().to_vec();
        let second = env.payload(&key).unwrap().to_vec();
        assert_eq!(first, second);
    }

    #[test]
    fn rejects_bad_magic() {
        let wire = vec![0u8; 40];
        assert!(matches!(decode(&wire), Err(InformError::BadMagic)));
    }

    #[test]
    fn rejects_unsupported_versions() {
        let mut wire = Vec::new();
        wire.extend_from_slice(MAGIC);
        wire.extend_from_slice(&1u32.to_be_bytes()); // bad protocol version
        wire.extend_from_slice(&[0u8; 6 + 2 + 16 + 4 + 4]);
        assert!(matches!(
            decode(&wire),
            Err(InformError::UnsupportedProtocolVersion(1))
        ));
    }

    #[test]
    fn seal_reply_reuses_request_iv_and_identity() {
        let key = [0x55u8; 16];
        let iv = [0x66u8; 16];
        let wire = encrypted_envelope(&key, &iv, b"{}");
        let env = decode(&wire).unwrap();

        let reply = env.seal_reply(&key, b"reply-body").unwrap();
        let decoded_reply = decode(&reply).unwrap();

        assert_eq!(decoded_reply.ap_mac, env.ap_mac);
        assert_eq!(decoded_reply.protocol_version, env.protocol_version);
        assert_eq!(decoded_reply.data_version, env.data_version);
        assert_eq!(decoded_reply.iv, env.iv);
        assert!(decoded_reply.encrypted);
        assert!(!decoded_reply.zlib && !decoded_reply.snappy);
    }
}
