//! File encryption/decryption operations
//!
//! This module provides high-level file operations for encrypting and
//! decrypting single files using the vaultburn format. Outputs are written
//! atomically: on any failure no output file is left behind.

use crate::error::{ErrorCategory, ErrorKind, Result, VaultburnError, io_error};
use crate::key::FileKey;
use crate::secretcrypt;
use crate::varmor;
use std::ffi::OsString;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::info;
use zeroize::Zeroizing;

/// Extension appended to encrypted files
pub const ENCRYPTED_EXTENSION: &str = "encrypted";

/// Extension appended to decrypted files whose input lacked `.encrypted`
pub const DECRYPTED_EXTENSION: &str = "decrypted";

/// `<input>.encrypted`
pub fn default_encrypted_path(input: &Path) -> PathBuf {
    append_extension(input, ENCRYPTED_EXTENSION)
}

/// `<input>` without a trailing `.encrypted`, or `<input>.decrypted`.
pub fn default_decrypted_path(input: &Path) -> PathBuf {
    match input.extension() {
        Some(ext) if ext == ENCRYPTED_EXTENSION => input.with_extension(""),
        _ => append_extension(input, DECRYPTED_EXTENSION),
    }
}

fn append_extension(path: &Path, ext: &str) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(".");
    name.push(ext);
    PathBuf::from(name)
}

/// Encrypt a file under a freshly generated key
///
/// Reads plaintext from `input_path`, encrypts it, and writes the armored
/// ciphertext to `output_path`. Returns the key; it is not stored anywhere.
///
/// The output file is created with mode 0o600 (read/write for owner only) on Unix systems.
pub fn encrypt_file(input_path: &Path, output_path: &Path, overwrite: bool) -> Result<FileKey> {
    let plaintext = Zeroizing::new(
        fs::read(input_path).map_err(|e| io_error(input_path, "read from", e))?,
    );
    let key = FileKey::generate();
    let ciphertext =
        secretcrypt::encrypt(&key, &plaintext).map_err(|e| e.with_context("encryption failed"))?;
    let armored = varmor::wrap(&ciphertext);
    write_file_atomic(output_path, armored.as_bytes(), overwrite)
        .map_err(|e| e.with_context(format!("failed to write to {}", output_path.display())))?;

    info!(
        "encrypted {} -> {}",
        input_path.display(),
        output_path.display()
    );
    Ok(key)
}

/// Decrypt a file with a key
///
/// Reads armored ciphertext from `input_path`, authenticates and decrypts
/// it with `key`, and writes the plaintext to `output_path`. Nothing is
/// written unless authentication succeeds. Returns the plaintext length.
///
/// The output file is created with mode 0o600 (read/write for owner only) on Unix systems.
pub fn decrypt_file(
    input_path: &Path,
    output_path: &Path,
    key: &FileKey,
    overwrite: bool,
) -> Result<u64> {
    let armored_bytes = fs::read(input_path).map_err(|e| io_error(input_path, "read from", e))?;
    let armored = String::from_utf8(armored_bytes).map_err(|e| {
        VaultburnError::with_kind_and_source(
            ErrorCategory::User,
            ErrorKind::ArmoringInvalid,
            "input file is not vaultburn encrypted data (not valid UTF-8)",
            e,
        )
    })?;
    let ciphertext = varmor::unwrap(&armored).map_err(|e| e.with_context("failed to unarmor"))?;
    let plaintext =
        secretcrypt::decrypt(key, &ciphertext).map_err(|e| e.with_context("failed to decrypt"))?;
    write_file_atomic(output_path, &plaintext, overwrite)
        .map_err(|e| e.with_context(format!("failed to write to {}", output_path.display())))?;

    info!(
        "decrypted {} -> {}",
        input_path.display(),
        output_path.display()
    );
    Ok(plaintext.len() as u64)
}

/// Write `contents` to `path` via tempfile + fsync + rename
///
/// Either the complete file appears at `path` or nothing does. Unless
/// `overwrite` is set an existing `path` is never replaced.
fn write_file_atomic(path: &Path, contents: &[u8], overwrite: bool) -> Result<()> {
    if !overwrite && fs::symlink_metadata(path).is_ok() {
        return Err(output_exists(path));
    }

    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut temp_file = tempfile::Builder::new()
        .prefix(".vaultburn-")
        .tempfile_in(dir)
        .map_err(|e| io_error(dir, "create tempfile in", e))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        temp_file
            .as_file()
            .set_permissions(fs::Permissions::from_mode(0o600))
            .map_err(|e| io_error(temp_file.path(), "set permissions on", e))?;
    }

    temp_file
        .write_all(contents)
        .map_err(|e| io_error(temp_file.path(), "write to", e))?;
    // Flush and fsync() such that the rename later, if it succeeds, will
    // always point to a complete file.
    temp_file
        .flush()
        .map_err(|e| io_error(temp_file.path(), "flush", e))?;
    temp_file
        .as_file()
        .sync_all()
        .map_err(|e| io_error(temp_file.path(), "sync", e))?;

    let persisted = if overwrite {
        temp_file.persist(path)
    } else {
        temp_file.persist_noclobber(path)
    };
    persisted.map_err(|e| {
        if e.error.kind() == io::ErrorKind::AlreadyExists {
            output_exists(path)
        } else {
            io_error(path, "rename to", e.error)
        }
    })?;
    Ok(())
}

fn output_exists(path: &Path) -> VaultburnError {
    VaultburnError::with_kind(
        ErrorCategory::User,
        ErrorKind::OutputExists,
        format!("{} already exists (use --force to replace it)", path.display()),
    )
}
