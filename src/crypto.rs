//! Encrypted location submissions.
//!
//! Body format: base64 of `version ‖ nonce ‖ AES-256-GCM(ciphertext ‖ tag)`,
//! keyed by SHA-256 of the shared encryption secret. The version byte is
//! bound as associated data.

use axum::http::{HeaderMap, header::CONTENT_TYPE};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use ring::aead::{AES_256_GCM, Aad, LessSafeKey, NONCE_LEN, Nonce, UnboundKey};
use ring::rand::{SecureRandom, SystemRandom};
use sha2::{Digest, Sha256};

use crate::error::{Error, Result};

pub const FORMAT_VERSION: u8 = 1;
pub const ENCRYPTED_HEADER: &str = "x-encrypted";
pub const ENCRYPTED_CONTENT_TYPE: &str = "application/octet-stream";

const TAG_LEN: usize = 16;

/// Whether the request declares an encrypted body.
#[must_use]
pub fn is_encrypted(headers: &HeaderMap) -> bool {
    let flagged = headers
        .get(ENCRYPTED_HEADER)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.eq_ignore_ascii_case("true") || v == "1");

    let octet_stream = headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.starts_with(ENCRYPTED_CONTENT_TYPE));

    flagged || octet_stream
}

pub struct PayloadCipher {
    key: LessSafeKey,
    rng: SystemRandom,
}

impl PayloadCipher {
    pub fn new(secret: &str) -> Result<Self> {
        if secret.is_empty() {
            return Err(Error::Config("encryption secret cannot be empty".to_string()));
        }

        let digest = Sha256::digest(secret.as_bytes());
        let key = UnboundKey::new(&AES_256_GCM, &digest)
            .map_err(|_| Error::Config("invalid encryption key".to_string()))?;

        Ok(Self {
            key: LessSafeKey::new(key),
            rng: SystemRandom::new(),
        })
    }

    pub fn encrypt(&self, plaintext: &[u8]) -> Result<String> {
        let mut nonce_bytes = [0u8; NONCE_LEN];
        self.rng
            .fill(&mut nonce_bytes)
            .map_err(|_| Error::Config("system randomness unavailable".to_string()))?;

        let mut in_out = plaintext.to_vec();
        self.key
            .seal_in_place_append_tag(
                Nonce::assume_unique_for_key(nonce_bytes),
                Aad::from([FORMAT_VERSION]),
                &mut in_out,
            )
            .map_err(|_| Error::Config("encryption failed".to_string()))?;

        let mut framed = Vec::with_capacity(1 + NONCE_LEN + in_out.len());
        framed.push(FORMAT_VERSION);
        framed.extend_from_slice(&nonce_bytes);
        framed.extend_from_slice(&in_out);

        Ok(STANDARD.encode(framed))
    }

    /// Recovers the plaintext of an encrypted body. Never returns partial data.
    pub fn decrypt(&self, body: &[u8]) -> Result<Vec<u8>> {
        let framed = STANDARD
            .decode(body.trim_ascii())
            .map_err(|e| Error::Decrypt(format!("invalid base64: {e}")))?;

        if framed.len() < 1 + NONCE_LEN + TAG_LEN {
            return Err(Error::Decrypt("payload too short".to_string()));
        }

        let (version, rest) = framed.split_at(1);
        if version[0] != FORMAT_VERSION {
            return Err(Error::Decrypt(format!(
                "unsupported format version {}",
                version[0]
            )));
        }

        let (nonce, ciphertext) = rest.split_at(NONCE_LEN);
        let nonce = Nonce::try_assume_unique_for_key(nonce)
            .map_err(|_| Error::Decrypt("invalid nonce".to_string()))?;

        let mut in_out = ciphertext.to_vec();
        let plaintext = self
            .key
            .open_in_place(nonce, Aad::from([FORMAT_VERSION]), &mut in_out)
            .map_err(|_| Error::Decrypt("authentication failed".to_string()))?;

        Ok(plaintext.to_vec())
    }
}
