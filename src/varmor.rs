//! Versioned armoring for encrypted files
//!
//! Provides base64url encoding with a version prefix. The armored format is:
//! - Free of whitespace (including newlines)
//! - Safe to embed in URLs
//! - Safe to pass unescaped in a POSIX shell

use crate::error::{ErrorCategory, ErrorKind, Result, VaultburnError};
use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};

/// Magic prefix for all vaultburn versions
const MAGIC_PREFIX: &str = "vaultburn";

/// Version 1 magic marker
const V1_MAGIC: &str = "vaultburn1:";

/// Wrap bytes in armor, returning the armored string
///
/// Format: vaultburn1:{base64url-no-padding}
pub fn wrap(body: &[u8]) -> String {
    let encoded = URL_SAFE_NO_PAD.encode(body);
    format!("{}{}", V1_MAGIC, encoded)
}

/// Unwrap an armored string, returning the original bytes
///
/// A single trailing newline is tolerated so that files passed through
/// editors that append one still decrypt.
pub fn unwrap(armored: &str) -> Result<Vec<u8>> {
    let armored = armored.strip_suffix('\n').unwrap_or(armored);
    let armored = armored.strip_suffix('\r').unwrap_or(armored);

    if armored.len() < V1_MAGIC.len() {
        return Err(VaultburnError::with_kind(
            ErrorCategory::User,
            ErrorKind::ArmoringInvalid,
            "input size smaller than magic marker; likely truncated",
        ));
    }

    if let Some(encoded) = armored.strip_prefix(V1_MAGIC) {
        let body = URL_SAFE_NO_PAD.decode(encoded).map_err(|e| {
            VaultburnError::with_kind_and_source(
                ErrorCategory::User,
                ErrorKind::ArmoringDecode,
                format!("base64 decoding failed: {}", e),
                e,
            )
        })?;
        Ok(body)
    } else if armored.starts_with(MAGIC_PREFIX) {
        Err(VaultburnError::with_kind(
            ErrorCategory::User,
            ErrorKind::ArmoringFromFuture,
            "input claims to be vaultburn data, but not a version we support",
        ))
    } else {
        Err(VaultburnError::with_kind(
            ErrorCategory::User,
            ErrorKind::ArmoringInvalid,
            "input unrecognized as vaultburn encrypted data",
        ))
    }
}
