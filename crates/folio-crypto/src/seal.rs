use aes_gcm::{
    Aes256Gcm, Key, Nonce,
    aead::{Aead, KeyInit, OsRng, rand_core::RngCore},
};
use anyhow::{Result, anyhow, bail};
use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};

const NONCE_LEN: usize = 12;

/// Seals and opens short secrets with one server-wide AES-256-GCM key.
#[derive(Clone)]
pub struct Sealer {
    cipher: Aes256Gcm,
}

impl Sealer {
    pub fn new(key: &[u8; 32]) -> Self {
        Self {
            cipher: Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key)),
        }
    }

    /// Encrypt a secret. Every call uses a fresh random nonce.
    pub fn seal(&self, plaintext: &str) -> Result<String> {
        let mut nonce_bytes = [0u8; NONCE_LEN];
        OsRng.fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = self
            .cipher
            .encrypt(nonce, plaintext.as_bytes())
            .map_err(|e| anyhow!("Encryption failed: {}", e))?;

        let mut out = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        out.extend_from_slice(&nonce_bytes);
        out.extend_from_slice(&ciphertext);
        Ok(BASE64.encode(out))
    }

    pub fn open(&self, sealed: &str) -> Result<String> {
        let bytes = BASE64.decode(sealed)?;
        if bytes.len() <= NONCE_LEN {
            bail!("Sealed value too short");
        }
        let (nonce, ciphertext) = bytes.split_at(NONCE_LEN);

        let plaintext = self
            .cipher
            .decrypt(Nonce::from_slice(nonce), ciphertext)
            .map_err(|e| anyhow!("Decryption failed: {}", e))?;

        Ok(String::from_utf8(plaintext)?)
    }
}

impl std::fmt::Debug for Sealer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Sealer(..)")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::generate_key;

    #[test]
    fn seal_open_roundtrip() {
        let sealer = Sealer::new(&generate_key());
        let sealed = sealer.seal("hunter2").unwrap();
        assert!(!sealed.contains("hunter2"));
        assert_eq!(sealer.open(&sealed).unwrap(), "hunter2");
    }

    #[test]
    fn same_secret_seals_differently() {
        let sealer = Sealer::new(&generate_key());
        assert_ne!(sealer.seal("token").unwrap(), sealer.seal("token").unwrap());
    }

    #[test]
    fn wrong_key_fails() {
        let sealed = Sealer::new(&generate_key()).seal("smtp-pass").unwrap();
        assert!(Sealer::new(&generate_key()).open(&sealed).is_err());
    }

    #[test]
    fn truncated_value_fails() {
        let sealer = Sealer::new(&generate_key());
        assert!(sealer.open("AAAA").is_err());
    }
}
