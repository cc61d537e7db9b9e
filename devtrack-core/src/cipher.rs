//! At-rest encryption for cached file contents.
//!
//! The key is derived from stable attributes of the local machine, so a
//! cache can always be read back on the machine that wrote it and is opaque
//! anywhere else. This protects copies of the store, not the running user.

use crate::error::{Error, Result};
use argon2::Argon2;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chacha20poly1305::aead::{Aead, KeyInit};
use chacha20poly1305::{ChaCha20Poly1305, Key, Nonce};
use rand::RngCore;
use serde::Serialize;
use sha2::{Digest, Sha256};

const NONCE_LEN: usize = 12;
const KEY_SALT: &[u8] = b"devtrack-salt";
const KEY_LEN: usize = 32;

/// Machine attributes that feed key derivation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MachineIdentity {
    pub username: String,
    pub hostname: String,
    pub home: String,
}

impl MachineIdentity {
    pub fn from_env() -> Self {
        let var = |names: &[&str]| {
            names
                .iter()
                .find_map(|name| std::env::var(name).ok())
                .unwrap_or_default()
        };
        Self {
            username: var(&["USER", "USERNAME"]),
            hostname: var(&["HOSTNAME", "COMPUTERNAME"]),
            home: var(&["HOME", "USERPROFILE"]),
        }
    }

    fn fingerprint(&self) -> Vec<u8> {
        let encoded = serde_json::to_vec(self).unwrap_or_default();
        Sha256::digest(encoded).to_vec()
    }
}

#[derive(Clone)]
pub struct ContentCipher {
    cipher: ChaCha20Poly1305,
}

impl std::fmt::Debug for ContentCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContentCipher").finish_non_exhaustive()
    }
}

impl ContentCipher {
    /// Derives the key with Argon2id (default parameters) from the machine
    /// fingerprint.
    pub fn for_machine(identity: &MachineIdentity) -> Result<Self> {
        let mut key = [0u8; KEY_LEN];
        Argon2::default()
            .hash_password_into(&identity.fingerprint(), KEY_SALT, &mut key)
            .map_err(|e| Error::Crypto(format!("key derivation failed: {}", e)))?;
        Ok(Self {
            cipher: ChaCha20Poly1305::new(Key::from_slice(&key)),
        })
    }

    pub fn local() -> Result<Self> {
        Self::for_machine(&MachineIdentity::from_env())
    }

    /// base64(nonce || ciphertext || tag)
    pub fn encrypt(&self, plaintext: &str) -> Result<String> {
        let mut nonce = [0u8; NONCE_LEN];
        rand::rng().fill_bytes(&mut nonce);

        let ciphertext = self
            .cipher
            .encrypt(Nonce::from_slice(&nonce), plaintext.as_bytes())
            .map_err(|e| Error::Crypto(e.to_string()))?;

        let mut payload = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        payload.extend_from_slice(&nonce);
        payload.extend_from_slice(&ciphertext);
        Ok(STANDARD.encode(payload))
    }

    pub fn decrypt(&self, encoded: &str) -> Result<String> {
        let payload = STANDARD
            .decode(encoded)
            .map_err(|e| Error::Crypto(format!("invalid base64: {}", e)))?;
        if payload.len() < NONCE_LEN {
            return Err(Error::Crypto("payload too short".into()));
        }

        let (nonce, ciphertext) = payload.split_at(NONCE_LEN);
        let plaintext = self
            .cipher
            .decrypt(Nonce::from_slice(nonce), ciphertext)
            .map_err(|_| Error::Crypto("failed to decrypt data".into()))?;
        String::from_utf8(plaintext).map_err(|e| Error::Crypto(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity(user: &str) -> MachineIdentity {
        MachineIdentity {
            username: user.into(),
            hostname: "devbox".into(),
            home: format!("/home/{}", user),
        }
    }

    #[test]
    fn test_round_trip() {
        let cipher = ContentCipher::for_machine(&identity("ada")).unwrap();
        for text in ["", "hello", "multi\nline\n\u{1F980} unicode\n"] {
            let encrypted = cipher.encrypt(text).unwrap();
            assert_eq!(cipher.decrypt(&encrypted).unwrap(), text);
        }
    }

    #[test]
    fn test_round_trip_large_text() {
        let cipher = ContentCipher::for_machine(&identity("ada")).unwrap();
        let text = "let x = 42; // some source line\n".repeat(100_000);
        assert!(text.len() > 3_000_000);

        let encrypted = cipher.encrypt(&text).unwrap();
        assert_eq!(cipher.decrypt(&encrypted).unwrap(), text);
    }

    #[test]
    fn test_nonce_is_random() {
        let cipher = ContentCipher::for_machine(&identity("ada")).unwrap();
        assert_ne!(cipher.encrypt("same").unwrap(), cipher.encrypt("same").unwrap());
    }

    #[test]
    fn test_other_machine_cannot_decrypt() {
        let ours = ContentCipher::for_machine(&identity("ada")).unwrap();
        let theirs = ContentCipher::for_machine(&identity("grace")).unwrap();

        let encrypted = ours.encrypt("secret source").unwrap();
        assert!(matches!(theirs.decrypt(&encrypted), Err(Error::Crypto(_))));
    }

    #[test]
    fn test_garbage_is_rejected() {
        let cipher = ContentCipher::for_machine(&identity("ada")).unwrap();
        assert!(cipher.decrypt("not base64!").is_err());
        assert!(cipher.decrypt("AAAA").is_err());
    }

    #[test]
    fn test_key_derivation_is_deterministic() {
        let a = ContentCipher::for_machine(&identity("ada")).unwrap();
        let b = ContentCipher::for_machine(&identity("ada")).unwrap();
        let encrypted = a.encrypt("stable").unwrap();
        assert_eq!(b.decrypt(&encrypted).unwrap(), "stable");
    }
}
