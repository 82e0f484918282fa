//! Per-file encryption keys
//!
//! A key is 32 bytes from the operating system RNG. Its text form is
//! URL-safe base64 with padding, which is always exactly 44 characters
//! and safe to paste into a shell unquoted.

use crate::error::{ErrorCategory, ErrorKind, Result, VaultburnError};
use base64::{Engine, engine::general_purpose::URL_SAFE};
use rand::RngCore;
use rand::rngs::OsRng;
use std::fmt;
use zeroize::Zeroizing;

/// Length of a key in bytes
pub const KEY_LEN: usize = 32;

/// Length of the encoded key text
pub const ENCODED_KEY_LEN: usize = 44;

/// Secret key for a single encrypted file.
///
/// The key material is wiped from memory on drop.
#[derive(Clone)]
pub struct FileKey {
    bytes: Zeroizing<[u8; KEY_LEN]>,
}

impl FileKey {
    /// Generates a fresh random key.
    pub fn generate() -> Self {
        let mut bytes = Zeroizing::new([0u8; KEY_LEN]);
        OsRng.fill_bytes(&mut bytes[..]);
        Self { bytes }
    }

    pub fn from_bytes(bytes: [u8; KEY_LEN]) -> Self {
        Self {
            bytes: Zeroizing::new(bytes),
        }
    }

    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.bytes
    }

    /// Text form of the key, suitable for showing to the user.
    pub fn encode(&self) -> Zeroizing<String> {
        Zeroizing::new(URL_SAFE.encode(&self.bytes[..]))
    }

    /// Parses the text form of a key.
    ///
    /// Only syntax is checked here: the length and the base64 alphabet.
    /// Whether the key is the *right* one is only known once
    /// authentication of the ciphertext succeeds or fails.
    pub fn parse(text: &str) -> Result<Self> {
        let text = text.trim();
        if text.is_empty() {
            return Err(malformed("key is empty"));
        }
        if text.len() != ENCODED_KEY_LEN {
            return Err(malformed(format!(
                "key must be {} characters, got {}",
                ENCODED_KEY_LEN,
                text.len()
            )));
        }

        let decoded = Zeroizing::new(URL_SAFE.decode(text).map_err(|e| {
            VaultburnError::with_kind_and_source(
                ErrorCategory::User,
                ErrorKind::MalformedKey,
                "key is not valid URL-safe base64",
                e,
            )
        })?);
        let bytes: [u8; KEY_LEN] = decoded.as_slice().try_into().map_err(|_| {
            malformed(format!(
                "key must decode to {} bytes, got {}",
                KEY_LEN,
                decoded.len()
            ))
        })?;
        Ok(Self::from_bytes(bytes))
    }
}

impl fmt::Debug for FileKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("FileKey(..)")
    }
}

impl PartialEq for FileKey {
    fn eq(&self, other: &Self) -> bool {
        // Not constant time; keys are only compared in tests and never
        // against attacker-controlled input.
        self.bytes[..] == other.bytes[..]
    }
}

impl Eq for FileKey {}

fn malformed(msg: impl Into<String>) -> VaultburnError {
    VaultburnError::with_kind(ErrorCategory::User, ErrorKind::MalformedKey, msg)
}
