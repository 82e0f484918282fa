//! Authenticated encryption of whole files under a random key
//!
//! Uses NaCl secretbox (XSalsa20Poly1305). There is no key derivation:
//! the key is generated per file and handed to the user.
//!
//! The binary format is:
//! - nonce: 24 bytes
//! - length: 8 bytes (big-endian signed int64)
//! - sealed box: variable length (includes 16-byte Poly1305 MAC)

use crate::error::{ErrorCategory, ErrorKind, Result, VaultburnError};
use crate::key::FileKey;
use crypto_secretbox::aead::{Aead, KeyInit};
use crypto_secretbox::{Key, Nonce, XSalsa20Poly1305};
use rand::RngCore;
use rand::rngs::OsRng;
use std::mem::{size_of, size_of_val};
use zeroize::Zeroizing;

/// Length of nonce in bytes
pub const NONCE_LEN: usize = 24;

/// Length of the Poly1305 tag appended by the sealed box
pub const TAG_LEN: usize = 16;

/// Encrypt plaintext under `key` using a random nonce
///
/// Returns the binary format: nonce(24) + length(8) + sealedbox(variable)
pub fn encrypt(key: &FileKey, plaintext: &[u8]) -> Result<Vec<u8>> {
    let mut nonce = [0u8; NONCE_LEN];
    OsRng.fill_bytes(&mut nonce);

    encrypt_deterministic(key, plaintext, &nonce)
}

/// Encrypt plaintext under `key` using the provided nonce
///
/// This function is ONLY for testing purposes to generate deterministic output.
/// NEVER use this in production - always use `encrypt()` which generates a random nonce.
pub fn encrypt_deterministic(
    key: &FileKey,
    plaintext: &[u8],
    nonce: &[u8; NONCE_LEN],
) -> Result<Vec<u8>> {
    let cipher = XSalsa20Poly1305::new(Key::from_slice(key.as_bytes()));

    let nonce_obj = Nonce::from(*nonce);
    let sealed_box = cipher.encrypt(&nonce_obj, plaintext).map_err(|_| {
        VaultburnError::with_kind(
            ErrorCategory::Internal,
            ErrorKind::SecretboxFailure,
            "secretbox failed to seal plaintext",
        )
    })?;

    let sealed_box_len = sealed_box.len() as i64;
    let mut output =
        Vec::with_capacity(NONCE_LEN + size_of_val(&sealed_box_len) + sealed_box.len());
    output.extend_from_slice(nonce);
    output.extend_from_slice(&sealed_box_len.to_be_bytes()); // big-endian i64
    output.extend_from_slice(&sealed_box);

    Ok(output)
}

/// Decrypt ciphertext with `key`
///
/// The layout is fully validated and the tag verified before any
/// plaintext is returned.
pub fn decrypt(key: &FileKey, ciphertext: &[u8]) -> Result<Zeroizing<Vec<u8>>> {
    let mut pos = 0;

    if ciphertext.len() < pos + NONCE_LEN {
        return Err(truncated("input likely truncated while reading nonce"));
    }
    let nonce: [u8; NONCE_LEN] = ciphertext[pos..pos + NONCE_LEN]
        .try_into()
        .map_err(|_| invariant("failed to read nonce"))?;
    pos += NONCE_LEN;

    if ciphertext.len() < pos + size_of::<i64>() {
        return Err(truncated("input likely truncated while reading sealed box length"));
    }
    let length_bytes: [u8; 8] = ciphertext[pos..pos + size_of::<i64>()]
        .try_into()
        .map_err(|_| invariant("failed to read length"))?;
    let sealed_box_len = i64::from_be_bytes(length_bytes);
    pos += size_of::<i64>();

    if sealed_box_len < 0 {
        return Err(format_error(
            "negative sealed box length (when interpreted as a big-endian i64)",
        ));
    }

    // Check if length exceeds platform's maximum isize. *Valid* input
    // can fail this check if the platforms' isize is small.
    if sealed_box_len > isize::MAX as i64 {
        return Err(format_error("sealed box length exceeds this system's max isize"));
    }

    let sealed_box_len = sealed_box_len as usize;

    if sealed_box_len < TAG_LEN {
        return Err(format_error("sealed box shorter than its authentication tag"));
    }

    if sealed_box_len > ciphertext.len() - pos {
        return Err(truncated(
            "truncated or corrupt input; claimed length greater than available input",
        ));
    }
    let sealed_box = &ciphertext[pos..pos + sealed_box_len];
    pos += sealed_box_len;

    if pos < ciphertext.len() {
        return Err(VaultburnError::with_kind(
            ErrorCategory::User,
            ErrorKind::TrailingData,
            "invalid input: unexpected data after sealed box",
        ));
    }

    let cipher = XSalsa20Poly1305::new(Key::from_slice(key.as_bytes()));
    let nonce_obj = Nonce::from(nonce);
    let plaintext = cipher.decrypt(&nonce_obj, sealed_box).map_err(|_| {
        VaultburnError::with_kind(
            ErrorCategory::User,
            ErrorKind::AuthenticationFailed,
            "authentication failed: wrong key, or corrupt or tampered-with data",
        )
    })?;

    Ok(Zeroizing::new(plaintext))
}

fn truncated(msg: &str) -> VaultburnError {
    VaultburnError::with_kind(ErrorCategory::User, ErrorKind::TruncatedInput, msg)
}

fn format_error(msg: &str) -> VaultburnError {
    VaultburnError::with_kind(ErrorCategory::User, ErrorKind::BinaryFormat, msg)
}

fn invariant(msg: &str) -> VaultburnError {
    VaultburnError::new(ErrorCategory::Internal, msg)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key::KEY_LEN;

    fn test_key() -> FileKey {
        FileKey::from_bytes([0x42u8; KEY_LEN])
    }

    #[test]
    fn test_empty_plaintext() {
        let key = test_key();
        let ciphertext = encrypt(&key, b"").unwrap();
        assert_eq!(ciphertext.len(), NONCE_LEN + 8 + TAG_LEN);

        let decrypted = decrypt(&key, &ciphertext).unwrap();
        assert!(decrypted.is_empty());
    }

    #[test]
    fn test_hello_world() {
        let key = FileKey::generate();
        let ciphertext = encrypt(&key, b"hello world").unwrap();
        let decrypted = decrypt(&key, &ciphertext).unwrap();
        assert_eq!(&decrypted[..], b"hello world");
    }

    #[test]
    fn test_layout() {
        let key = test_key();
        let nonce = [0x24u8; NONCE_LEN];
        let plaintext = b"test payload";

        let ct = encrypt_deterministic(&key, plaintext, &nonce).unwrap();

        assert_eq!(&ct[..NONCE_LEN], &nonce[..]);
        let len = i64::from_be_bytes(ct[NONCE_LEN..NONCE_LEN + 8].try_into().unwrap());
        assert_eq!(len as usize, plaintext.len() + TAG_LEN);
        assert_eq!(ct.len(), NONCE_LEN + 8 + plaintext.len() + TAG_LEN);
    }

    #[test]
    fn test_deterministic_encryption() {
        let key = test_key();
        let nonce = [2u8; NONCE_LEN];

        let ct1 = encrypt_deterministic(&key, b"hello world", &nonce).unwrap();
        let ct2 = encrypt_deterministic(&key, b"hello world", &nonce).unwrap();
        assert_eq!(ct1, ct2);
    }

    #[test]
    fn test_random_nonce_differs() {
        let key = test_key();
        let ct1 = encrypt(&key, b"hello world").unwrap();
        let ct2 = encrypt(&key, b"hello world").unwrap();
        assert_ne!(ct1, ct2);
    }

    #[test]
    fn test_wrong_key() {
        let ciphertext = encrypt(&test_key(), b"secret data").unwrap();
        let err = decrypt(&FileKey::generate(), &ciphertext).unwrap_err();
        assert_eq!(err.kind, Some(ErrorKind::AuthenticationFailed));
    }

    #[test]
    fn test_every_single_bit_flip_in_key_fails() {
        let key = test_key();
        let ciphertext = encrypt(&key, b"hello world").unwrap();

        for byte in 0..KEY_LEN {
            for bit in 0..8 {
                let mut altered = *key.as_bytes();
                altered[byte] ^= 1 << bit;
                let err = decrypt(&FileKey::from_bytes(altered), &ciphertext).unwrap_err();
                assert_eq!(err.kind, Some(ErrorKind::AuthenticationFailed));
            }
        }
    }

    #[test]
    fn test_tampered_ciphertext() {
        let key = test_key();
        let mut ciphertext = encrypt(&key, b"hello world").unwrap();
        let last = ciphertext.len() - 1;
        ciphertext[last] ^= 0x01;

        let err = decrypt(&key, &ciphertext).unwrap_err();
        assert_eq!(err.kind, Some(ErrorKind::AuthenticationFailed));
    }

    #[test]
    fn test_truncated_nonce() {
        let err = decrypt(&test_key(), &[1, 2, 3]).unwrap_err();
        assert_eq!(err.kind, Some(ErrorKind::TruncatedInput));
        assert!(err.message().contains("while reading nonce"));
    }

    #[test]
    fn test_truncated_length() {
        let ciphertext = vec![0u8; NONCE_LEN + 3];
        let err = decrypt(&test_key(), &ciphertext).unwrap_err();
        assert_eq!(err.kind, Some(ErrorKind::TruncatedInput));
    }

    #[test]
    fn test_negative_length() {
        let mut ciphertext = vec![0u8; NONCE_LEN + 8];
        ciphertext[NONCE_LEN..].copy_from_slice(&(-1i64).to_be_bytes());

        let err = decrypt(&test_key(), &ciphertext).unwrap_err();
        assert_eq!(err.kind, Some(ErrorKind::BinaryFormat));
        assert!(err.message().contains("negative sealed box length"));
    }

    #[test]
    fn test_length_shorter_than_tag() {
        let mut ciphertext = vec![0u8; NONCE_LEN + 8 + 4];
        ciphertext[NONCE_LEN..NONCE_LEN + 8].copy_from_slice(&4i64.to_be_bytes());

        let err = decrypt(&test_key(), &ciphertext).unwrap_err();
        assert_eq!(err.kind, Some(ErrorKind::BinaryFormat));
    }

    #[test]
    fn test_length_exceeds_available() {
        let key = test_key();
        let mut ciphertext = encrypt(&key, b"hello").unwrap();
        ciphertext[NONCE_LEN..NONCE_LEN + 8].copy_from_slice(&1_000_000i64.to_be_bytes());

        let err = decrypt(&key, &ciphertext).unwrap_err();
        assert_eq!(err.kind, Some(ErrorKind::TruncatedInput));
    }

    #[test]
    fn test_trailing_data() {
        let key = test_key();
        let mut ciphertext = encrypt(&key, b"hello").unwrap();
        ciphertext.push(0xFF);

        let err = decrypt(&key, &ciphertext).unwrap_err();
        assert_eq!(err.kind, Some(ErrorKind::TrailingData));
    }

    #[test]
    fn test_all_byte_values() {
        let key = test_key();
        let plaintext: Vec<u8> = (0..=255).collect();

        let ciphertext = encrypt(&key, &plaintext).unwrap();
        let decrypted = decrypt(&key, &ciphertext).unwrap();
        assert_eq!(plaintext, *decrypted);
    }

    #[test]
    fn test_large_plaintext() {
        let key = test_key();
        let plaintext = vec![0x42u8; 128 * 1024];

        let ciphertext = encrypt(&key, &plaintext).unwrap();
        let decrypted = decrypt(&key, &ciphertext).unwrap();
        assert_eq!(plaintext, *decrypted);
    }
}
