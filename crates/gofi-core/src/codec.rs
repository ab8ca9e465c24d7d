//! PKCS7, AES-128-CBC, zlib and snappy helpers shared by the inform codec.

use aes::cipher::{generic_array::GenericArray, BlockDecrypt, BlockEncrypt, KeyInit};
use aes::Aes128;
use std::io::Read;
use thiserror::Error;

pub const BLOCK_SIZE: usize = 16;

/// Codec errors
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("key must be {BLOCK_SIZE} bytes, got {0}")]
    BadKeyLength(usize),
    #[error("iv must be {BLOCK_SIZE} bytes, got {0}")]
    BadIvLength(usize),
    #[error("ciphertext length {0} is not a multiple of the block size")]
    UnalignedCiphertext(usize),
    #[error("invalid PKCS7 padding")]
    BadPadding,
    #[error("zlib decompression failed: {0}")]
    Zlib(#[from] std::io::Error),
    #[error("snappy decompression failed: {0}")]
    Snappy(#[from] snap::Error),
}

/// Pad `data` to a multiple of [`BLOCK_SIZE`] using PKCS7.
pub fn pkcs7_pad(data: &[u8]) -> Vec<u8> {
    let pad_len = BLOCK_SIZE - (data.len() % BLOCK_SIZE);
    let mut out = Vec::with_capacity(data.len() + pad_len);
    out.extend_from_slice(data);
    out.extend(std::iter::repeat(pad_len as u8).take(pad_len));
    out
}

/// Strip and validate PKCS7 padding. Rejects a zero or oversized pad byte, or
/// padding bytes that aren't all equal to the pad length.
pub fn pkcs7_unpad(data: &[u8]) -> Result<&[u8], CodecError> {
    let pad_len = *data.last().ok_or(CodecError::BadPadding)? as usize;
    if pad_len == 0 || pad_len > BLOCK_SIZE || pad_len > data.len() {
        return Err(CodecError::BadPadding);
    }
    let (body, padding) = data.split_at(data.len() - pad_len);
    if padding.iter().any(|&b| b as usize != pad_len) {
        return Err(CodecError::BadPadding);
    }
    Ok(body)
}

/// Encrypt `data` in place with AES-128-CBC. `data` must already be a
/// multiple of [`BLOCK_SIZE`] (i.e. already PKCS7-padded).
pub fn aes_cbc_encrypt(key: &[u8], iv: &[u8], data: &mut [u8]) -> Result<(), CodecError> {
    let cipher = make_cipher(key)?;
    let iv = check_iv(iv)?;
    if data.len() % BLOCK_SIZE != 0 {
        return Err(CodecError::UnalignedCiphertext(data.len()));
    }

    let mut prev = *iv;
    for block in data.chunks_mut(BLOCK_SIZE) {
        for (b, p) in block.iter_mut().zip(prev.iter()) {
            *b ^= p;
        }
        let ga = GenericArray::from_mut_slice(block);
        cipher.encrypt_block(ga);
        prev.copy_from_slice(block);
    }
    Ok(())
}

/// Decrypt `data` in place with AES-128-CBC. `data` must be a multiple of
/// [`BLOCK_SIZE`].
pub fn aes_cbc_decrypt(key: &[u8], iv: &[u8], data: &mut [u8]) -> Result<(), CodecError> {
    let cipher = make_cipher(key)?;
    let iv = check_iv(iv)?;
    if data.len() % BLOCK_SIZE != 0 {
        return Err(CodecError::UnalignedCiphertext(data.len()));
    }

    let mut prev = *iv;
    for block in data.chunks_mut(BLOCK_SIZE) {
        let mut carry = [0u8; BLOCK_SIZE];
        carry.copy_from_slice(block);
        let ga = GenericArray::from_mut_slice(block);
        cipher.decrypt_block(ga);
        for (b, p) in block.iter_mut().zip(prev.iter()) {
            *b ^= p;
        }
        prev = carry;
    }
    Ok(())
}

fn make_cipher(key: &[u8]) -> Result<Aes128, CodecError> {
    if key.len() != BLOCK_SIZE {
        return Err(CodecError::BadKeyLength(key.len()));
    }
    Ok(Aes128::new(GenericArray::from_slice(key)))
}

fn check_iv(iv: &[u8]) -> Result<&[u8; BLOCK_SIZE], CodecError> {
    iv.try_into().map_err(|_| CodecError::BadIvLength(iv.len()))
}

/// Inflate a standard zlib stream.
pub fn zlib_decode(data: &[u8]) -> Result<Vec<u8>, CodecError> {
    let mut decoder = flate2::read::ZlibDecoder::new(data);
    let mut out = Vec::new();
    decoder.read_to_end(&mut out)?;
    Ok(out)
}

/// Decode a snappy block (not the framed streaming format).
pub fn snappy_decode(data: &[u8]) -> Result<Vec<u8>, CodecError> {
    let mut decoder = snap::raw::Decoder::new();
    Ok(decoder.decompress_vec(data)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pkcs7_round_trip() {
        for len in 0..40 {
            let data: Vec<u8> = (0..len as u8).collect();
            let padded = pkcs7_pad(&data);
            assert_eq!(padded.len() % BLOCK_SIZE, 0);
            assert_eq!(pkcs7_unpad(&padded).unwrap(), data.as_slice());
        }
    }

    #[test]
    fn pkcs7_unpad_rejects_zero_pad_byte() {
        let mut data = vec![1, 2, 3, 0];
        data[3] = 0;
        assert!(matches!(pkcs7_unpad(&data), Err(CodecError::BadPadding)));
    }

    #[test]
    fn pkcs7_unpad_rejects_oversized_pad_byte() {
        let data = vec![1, 2, 3, 200];
        assert!(matches!(pkcs7_unpad(&data), Err(CodecError::BadPadding)));
    }

    #[test]
    fn pkcs7_unpad_rejects_non_uniform_padding() {
        let data = vec![1, 2, 3, 2];
        // last byte says "2 bytes of padding" but byte before it is 3, not 2
        assert!(matches!(pkcs7_unpad(&data), Err(CodecError::BadPadding)));
    }

    #[test]
    fn aes_cbc_round_trip() {
        let key = [0x42u8; 16];
        let iv = [0x24u8; 16];
        let plaintext = b"hello from an access point!!".to_vec();
        let mut buf = pkcs7_pad(&plaintext);
        aes_cbc_encrypt(&key, &iv, &mut buf).unwrap();
        aes_cbc_decrypt(&key, &iv, &mut buf).unwrap();
        assert_eq!(pkcs7_unpad(&buf).unwrap(), plaintext.as_slice());
    }

    #[test]
    fn aes_cbc_rejects_bad_key_length() {
        let mut buf = vec![0u8; 16];
        assert!(matches!(
            aes_cbc_encrypt(&[0u8; 8], &[0u8; 16], &mut buf),
            Err(CodecError::BadKeyLength(8))
        ));
    }
}
