//! Turning user-supplied paths into the list of files to work on
//!
//! Symlink policy: a link named directly on the command line is passed
//! through so the shred step refuses it and reports it as a failure. Links
//! found while walking a directory are skipped and reported, never
//! followed. Special files (devices, FIFOs, sockets) inside directories are
//! skipped the same way.

use crate::error::{Result, VaultburnError, io_error};
use crate::format::human_size;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Result of expanding a set of paths.
#[derive(Debug, Default)]
pub struct Expansion {
    /// Files to process, in argument order, without duplicates.
    pub files: Vec<PathBuf>,
    /// Entries inside directories that were not followed.
    pub skipped: Vec<PathBuf>,
    /// Directories that could not be listed.
    pub errors: Vec<(PathBuf, VaultburnError)>,
}

/// Expands `paths` into files.
///
/// Directories contribute their regular files; their subdirectories are
/// only descended into when `recursive` is set. Paths that do not exist are
/// kept so the caller can report them per file.
pub fn expand(paths: &[PathBuf], recursive: bool) -> Expansion {
    let mut expansion = Expansion::default();
    let mut seen = HashSet::new();

    for path in paths {
        match fs::symlink_metadata(path) {
            Ok(meta) if meta.is_dir() => {
                if let Err(e) = walk(path, recursive, &mut expansion, &mut seen) {
                    expansion.errors.push((path.clone(), e));
                }
            }
            _ => push_unique(&mut expansion.files, &mut seen, path.clone()),
        }
    }

    expansion
}

fn walk(
    dir: &Path,
    recursive: bool,
    expansion: &mut Expansion,
    seen: &mut HashSet<PathBuf>,
) -> Result<()> {
    let mut entries = fs::read_dir(dir)
        .map_err(|e| io_error(dir, "list directory", e))?
        .collect::<std::io::Result<Vec<_>>>()
        .map_err(|e| io_error(dir, "list directory", e))?;
    entries.sort_by_key(|entry| entry.file_name());

    for entry in entries {
        let path = entry.path();
        let file_type = entry
            .file_type()
            .map_err(|e| io_error(&path, "stat", e))?;

        if file_type.is_dir() {
            if recursive {
                if let Err(e) = walk(&path, recursive, expansion, seen) {
                    expansion.errors.push((path, e));
                }
            } else {
                debug!("not descending into {} (not recursive)", path.display());
            }
        } else if file_type.is_file() {
            push_unique(&mut expansion.files, seen, path);
        } else {
            warn!("skipping {} (symbolic link or special file)", path.display());
            expansion.skipped.push(path);
        }
    }
    Ok(())
}

fn push_unique(files: &mut Vec<PathBuf>, seen: &mut HashSet<PathBuf>, path: PathBuf) {
    if seen.insert(path.clone()) {
        files.push(path);
    }
}

/// A file waiting to be processed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingItem {
    pub path: PathBuf,
    /// Size when the item was added, 0 if it could not be read.
    pub size: u64,
}

/// Files selected for a destructive operation, in insertion order.
#[derive(Debug, Default, Clone)]
pub struct PendingList {
    items: Vec<PendingItem>,
}

impl PendingList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `path` unless it is already listed. Returns whether it was added.
    pub fn add(&mut self, path: PathBuf) -> bool {
        if self.contains(&path) {
            return false;
        }
        let size = fs::symlink_metadata(&path).map(|m| m.len()).unwrap_or(0);
        self.items.push(PendingItem { path, size });
        true
    }

    /// Adds every file of an expansion. Returns how many were new.
    pub fn add_all(&mut self, files: impl IntoIterator<Item = PathBuf>) -> usize {
        files.into_iter().filter(|p| self.add(p.clone())).count()
    }

    /// Adds every regular file below `dir`, recursively.
    pub fn add_directory(&mut self, dir: &Path) -> Result<usize> {
        let mut expansion = Expansion::default();
        let mut seen = HashSet::new();
        walk(dir, true, &mut expansion, &mut seen)?;
        Ok(self.add_all(expansion.files))
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.items.iter().any(|item| item.path == path)
    }

    /// Removes `path`. Returns whether it was listed.
    pub fn remove(&mut self, path: &Path) -> bool {
        let before = self.items.len();
        self.items.retain(|item| item.path != path);
        self.items.len() != before
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    pub fn items(&self) -> &[PendingItem] {
        &self.items
    }

    pub fn paths(&self) -> Vec<PathBuf> {
        self.items.iter().map(|item| item.path.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Current combined size of the listed files that still exist.
    pub fn total_size(&self) -> u64 {
        self.items
            .iter()
            .filter_map(|item| fs::symlink_metadata(&item.path).ok())
            .filter(|meta| meta.is_file())
            .map(|meta| meta.len())
            .sum()
    }

    pub fn status_line(&self) -> String {
        match self.items.len() {
            0 => "Ready | 0 files".to_string(),
            1 => format!("1 file | Total size: {}", human_size(self.total_size())),
            n => format!("{} files | Total size: {}", n, human_size(self.total_size())),
        }
    }
}
