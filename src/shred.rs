//! Multi-pass overwrite followed by deletion
//!
//! Each pass rewrites the whole data region of the file with fresh random
//! bytes and syncs it to the device before the next pass starts. After the
//! last pass the directory entry is removed.
//!
//! This defeats naive undelete tools. It does NOT guarantee the old data is
//! gone from copy-on-write or log-structured filesystems (btrfs, ZFS, APFS),
//! journaled data modes, SSDs and flash media with wear levelling,
//! snapshots, or backups: on those the overwrite may land on different
//! physical blocks than the original contents.
//!
//! Symbolic links are never followed. A link passed as a target is refused
//! and neither the link nor what it points to is modified.

use crate::error::{ErrorCategory, ErrorKind, Result, VaultburnError, io_error};
use crate::format::human_size;
use rand::RngCore;
use rand::rngs::OsRng;
use std::fs::{self, File, Metadata, OpenOptions};
use std::io::{self, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Number of overwrite passes when none is configured
pub const DEFAULT_PASSES: u32 = 3;

/// Size of each random block written during a pass
const BLOCK_SIZE: usize = 64 * 1024;

/// What a successful shred did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShredSummary {
    pub path: PathBuf,
    pub bytes: u64,
    pub passes: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Shredder {
    passes: u32,
}

impl Default for Shredder {
    fn default() -> Self {
        Self {
            passes: DEFAULT_PASSES,
        }
    }
}

impl Shredder {
    /// Creates a shredder doing `passes` overwrite passes per file.
    ///
    /// At least one pass is required.
    pub fn new(passes: u32) -> Result<Self> {
        if passes == 0 {
            return Err(VaultburnError::with_kind(
                ErrorCategory::User,
                ErrorKind::InvalidPasses,
                "number of overwrite passes must be at least 1",
            ));
        }
        Ok(Self { passes })
    }

    pub fn passes(&self) -> u32 {
        self.passes
    }

    /// Overwrites `path` and removes it.
    ///
    /// `on_pass(done, total)` is called after each pass has been synced.
    /// Once the first pass has started the file is always taken through
    /// every pass unless an I/O error occurs.
    pub fn shred_file(
        &self,
        path: &Path,
        mut on_pass: impl FnMut(u32, u32),
    ) -> Result<ShredSummary> {
        let before = fs::symlink_metadata(path).map_err(|e| io_error(path, "stat", e))?;
        check_target(path, &before)?;

        let mut file = OpenOptions::new()
            .write(true)
            .open(path)
            .map_err(|e| io_error(path, "open", e))?;
        let meta = file.metadata().map_err(|e| io_error(path, "stat", e))?;
        if !same_file(&before, &meta) {
            return Err(VaultburnError::with_kind(
                ErrorCategory::User,
                ErrorKind::SymlinkRefused,
                format!("{} was replaced while being opened", path.display()),
            ));
        }
        let len = meta.len();

        info!(
            "starting secure deletion of {} ({}) with {} passes",
            path.display(),
            human_size(len),
            self.passes
        );

        let mut buf = vec![0u8; BLOCK_SIZE];
        for pass in 1..=self.passes {
            overwrite_pass(&mut file, len, &mut buf)
                .map_err(|e| io_error(path, "overwrite", e))?;
            debug!("completed overwrite pass {}/{} for {}", pass, self.passes, path.display());
            on_pass(pass, self.passes);
        }
        drop(file);

        fs::remove_file(path).map_err(|e| io_error(path, "remove", e))?;
        info!("deleted {} - {} destroyed", path.display(), human_size(len));

        Ok(ShredSummary {
            path: path.to_path_buf(),
            bytes: len,
            passes: self.passes,
        })
    }
}

fn check_target(path: &Path, meta: &Metadata) -> Result<()> {
    let file_type = meta.file_type();
    if file_type.is_symlink() {
        return Err(VaultburnError::with_kind(
            ErrorCategory::User,
            ErrorKind::SymlinkRefused,
            format!("refusing to follow symbolic link {}", path.display()),
        ));
    }
    if !file_type.is_file() {
        return Err(VaultburnError::with_kind(
            ErrorCategory::User,
            ErrorKind::NotAFile,
            format!("{} is not a regular file", path.display()),
        ));
    }
    Ok(())
}

#[cfg(unix)]
fn same_file(a: &Metadata, b: &Metadata) -> bool {
    use std::os::unix::fs::MetadataExt;
    a.dev() == b.dev() && a.ino() == b.ino()
}

#[cfg(not(unix))]
fn same_file(_a: &Metadata, b: &Metadata) -> bool {
    b.is_file()
}

/// Rewrites bytes `0..len` of `file` with fresh random data and syncs.
fn overwrite_pass(file: &mut File, len: u64, buf: &mut [u8]) -> io::Result<()> {
    file.seek(SeekFrom::Start(0))?;
    let mut remaining = len;
    while remaining > 0 {
        let n = remaining.min(buf.len() as u64) as usize;
        OsRng.fill_bytes(&mut buf[..n]);
        file.write_all(&buf[..n])?;
        remaining -= n as u64;
    }
    file.flush()?;
    file.sync_all()
}
