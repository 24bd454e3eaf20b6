//! Password encryption for the login exchange
//!
//! The gateway hands out a per-session key (`baseprm`) from its
//! initialisation endpoint and expects the account password encrypted
//! with it: Blowfish in ECB mode, PKCS#5 padded, base64 encoded.

use base64::{engine::general_purpose, Engine as _};
use blowfish::cipher::{generic_array::GenericArray, BlockEncrypt, KeyInit};
use blowfish::Blowfish;

use crate::error::{LeafClientError, Result};

const BLOCK_SIZE: usize = 8;

/// Keyed transformation of a secret into the credential format upstream accepts.
///
/// Implementations must be deterministic and free of I/O. The only failure
/// is malformed key material, which is a configuration problem.
pub trait Encryptor: Send + Sync {
    fn encrypt(&self, plaintext: &str, key: &str) -> Result<String>;
}

/// Blowfish/ECB/PKCS#5 + base64, as used by the production gateway
#[derive(Debug, Clone, Copy, Default)]
pub struct BlowfishEncryptor;

impl Encryptor for BlowfishEncryptor {
    fn encrypt(&self, plaintext: &str, key: &str) -> Result<String> {
        let cipher: Blowfish = Blowfish::new_from_slice(key.as_bytes()).map_err(|_| {
            LeafClientError::Encryption(format!(
                "key must be 4 to 56 bytes, got {}",
                key.len()
            ))
        })?;

        let mut data = pkcs5_pad(plaintext.as_bytes());
        for block in data.chunks_exact_mut(BLOCK_SIZE) {
            cipher.encrypt_block(GenericArray::from_mut_slice(block));
        }

        Ok(general_purpose::STANDARD.encode(data))
    }
}

/// Pad to a whole number of blocks. Always adds at least one byte.
fn pkcs5_pad(input: &[u8]) -> Vec<u8> {
    let pad = BLOCK_SIZE - input.len() % BLOCK_SIZE;
    let mut out = Vec::with_capacity(input.len() + pad);
    out.extend_from_slice(input);
    out.resize(input.len() + pad, pad as u8);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    const SESSION_KEY: &str = "uyI5Dj9g8VCOFDnBRUbr3g";

    #[test]
    fn test_padding() {
        assert_eq!(pkcs5_pad(b""), vec![8u8; 8]);
        assert_eq!(pkcs5_pad(b"abcdefg"), b"abcdefg\x01".to_vec());
        assert_eq!(pkcs5_pad(b"abcdefgh").len(), 16);
    }

    #[test]
    fn test_known_vector() {
        // Zero key, zero block: 4EF997456198DD78
        let key = "\0\0\0\0\0\0\0\0";
        let encoded = BlowfishEncryptor.encrypt("\0\0\0\0\0\0\0\0", key).unwrap();
        let raw = general_purpose::STANDARD.decode(encoded).unwrap();
        assert_eq!(raw.len(), 16);
        assert_eq!(
            &raw[..8],
            &[0x4E, 0xF9, 0x97, 0x45, 0x61, 0x98, 0xDD, 0x78]
        );
    }

    #[test]
    fn test_deterministic() {
        let a = BlowfishEncryptor.encrypt("secret", SESSION_KEY).unwrap();
        let b = BlowfishEncryptor.encrypt("secret", SESSION_KEY).unwrap();
        assert_eq!(a, b);
        // "secret" pads to one block
        assert_eq!(general_purpose::STANDARD.decode(&a).unwrap().len(), 8);
    }

    #[test]
    fn test_key_changes_output() {
        let a = BlowfishEncryptor.encrypt("secret", SESSION_KEY).unwrap();
        let b = BlowfishEncryptor.encrypt("secret", "anotherkey").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_malformed_key() {
        let err = BlowfishEncryptor.encrypt("secret", "abc").unwrap_err();
        assert!(matches!(err, LeafClientError::Encryption(_)));

        let long = "k".repeat(57);
        assert!(BlowfishEncryptor.encrypt("secret", &long).is_err());
        assert!(BlowfishEncryptor.encrypt("secret", "").is_err());
    }
}
