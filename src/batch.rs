//! Running file operations over many files off the calling thread
//!
//! A batch is submitted once, executed on a rayon pool from a background
//! thread, and observed through a progress channel. Cancellation is
//! cooperative: the token is checked before each file starts, never in the
//! middle of one, so every file ends up either untouched or fully
//! processed.

use crate::error::{ErrorCategory, ErrorKind, Result, VaultburnError};
use crate::file_ops;
use crate::key::FileKey;
use crate::shred::{ShredSummary, Shredder};
use rayon::prelude::*;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread::{self, JoinHandle};
use tracing::{debug, info, warn};

/// Shared flag asking a batch to stop before its next file.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// Progress notifications. `index` is the position of the file in the batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressEvent {
    Started { index: usize, path: PathBuf },
    PassCompleted { index: usize, pass: u32, total: u32 },
    Finished { index: usize, path: PathBuf, ok: bool },
    Cancelled { index: usize, path: PathBuf },
}

/// Handle an operation uses to report progress within one file.
pub struct UnitProgress<'a> {
    index: usize,
    sender: Option<&'a Sender<ProgressEvent>>,
}

impl UnitProgress<'_> {
    pub fn pass(&self, pass: u32, total: u32) {
        self.send(ProgressEvent::PassCompleted {
            index: self.index,
            pass,
            total,
        });
    }

    fn send(&self, event: ProgressEvent) {
        if let Some(sender) = self.sender {
            // The observer may have gone away; the work continues regardless.
            let _ = sender.send(event);
        }
    }
}

/// One kind of work applied to a single file.
pub trait Operation: Sync {
    type Output: Send;

    /// Verb used in logs, e.g. "shred".
    fn name(&self) -> &'static str;

    fn run(&self, path: &Path, progress: &UnitProgress<'_>) -> Result<Self::Output>;
}

/// Overwrite-and-delete.
#[derive(Debug, Clone, Copy)]
pub struct ShredOperation {
    shredder: Shredder,
}

impl ShredOperation {
    pub fn new(shredder: Shredder) -> Self {
        Self { shredder }
    }
}

impl Operation for ShredOperation {
    type Output = ShredSummary;

    fn name(&self) -> &'static str {
        "shred"
    }

    fn run(&self, path: &Path, progress: &UnitProgress<'_>) -> Result<ShredSummary> {
        self.shredder
            .shred_file(path, |pass, total| progress.pass(pass, total))
    }
}

/// Result of encrypting one file.
///
/// Once the encrypted output exists the unit counts as done, so the key is
/// always handed back. A failure to shred the plaintext afterwards is
/// carried in `shred_error`.
#[derive(Debug)]
pub struct EncryptedFile {
    pub output: PathBuf,
    pub key: FileKey,
    /// Whether the plaintext was shredded afterwards.
    pub shredded: bool,
    pub shred_error: Option<VaultburnError>,
}

/// Encrypt each file to `<file>.encrypted` under its own fresh key.
#[derive(Debug, Clone)]
pub struct EncryptOperation {
    output: Option<PathBuf>,
    overwrite: bool,
    shred_original: Option<Shredder>,
}

impl EncryptOperation {
    pub fn new(overwrite: bool) -> Self {
        Self {
            output: None,
            overwrite,
            shred_original: None,
        }
    }

    /// Write to `output` instead of the default path. Only meaningful for
    /// single-file batches.
    pub fn with_output(mut self, output: PathBuf) -> Self {
        self.output = Some(output);
        self
    }

    /// Shred the plaintext once the encrypted file is safely on disk.
    pub fn shred_original(mut self, shredder: Shredder) -> Self {
        self.shred_original = Some(shredder);
        self
    }
}

impl Operation for EncryptOperation {
    type Output = EncryptedFile;

    fn name(&self) -> &'static str {
        "encrypt"
    }

    fn run(&self, path: &Path, progress: &UnitProgress<'_>) -> Result<EncryptedFile> {
        let output = self
            .output
            .clone()
            .unwrap_or_else(|| file_ops::default_encrypted_path(path));
        if self.shred_original.is_some() && output == path {
            return Err(VaultburnError::with_kind(
                ErrorCategory::User,
                ErrorKind::OutputExists,
                format!(
                    "refusing to encrypt {} onto itself and then shred it",
                    path.display()
                ),
            ));
        }
        let key = file_ops::encrypt_file(path, &output, self.overwrite)?;

        let shred_error = self.shred_original.as_ref().and_then(|shredder| {
            shredder
                .shred_file(path, |pass, total| progress.pass(pass, total))
                .err()
                .map(|e| {
                    let e = e.with_context(format!(
                        "encrypted to {} but failed to shred the original",
                        output.display()
                    ));
                    warn!("{}: {}", self.name(), e.display_chain());
                    e
                })
        });

        Ok(EncryptedFile {
            shredded: self.shred_original.is_some() && shred_error.is_none(),
            output,
            key,
            shred_error,
        })
    }
}

/// How a single file ended up.
#[derive(Debug)]
pub enum UnitOutcome<T> {
    Done(T),
    Failed(VaultburnError),
    /// Not started because the batch was cancelled first.
    Cancelled,
}

#[derive(Debug)]
pub struct UnitResult<T> {
    pub path: PathBuf,
    pub outcome: UnitOutcome<T>,
}

/// Overall result of a batch, for exit codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchStatus {
    /// Every file was processed.
    Success,
    /// Some files were processed, others failed or were cancelled.
    Partial,
    /// No file was processed.
    Fatal,
}

impl BatchStatus {
    /// Status for `succeeded` processed units and `unsuccessful` units that
    /// failed, were cancelled or were skipped.
    pub fn from_counts(succeeded: usize, unsuccessful: usize) -> Self {
        if unsuccessful == 0 {
            BatchStatus::Success
        } else if succeeded == 0 {
            BatchStatus::Fatal
        } else {
            BatchStatus::Partial
        }
    }

    pub fn exit_code(self) -> i32 {
        match self {
            BatchStatus::Success => 0,
            BatchStatus::Fatal => 1,
            BatchStatus::Partial => 2,
        }
    }
}

/// Per-file outcomes, in submission order.
#[derive(Debug)]
pub struct BatchReport<T> {
    pub results: Vec<UnitResult<T>>,
}

impl<T> BatchReport<T> {
    pub fn succeeded(&self) -> usize {
        self.results
            .iter()
            .filter(|r| matches!(r.outcome, UnitOutcome::Done(_)))
            .count()
    }

    pub fn failed(&self) -> usize {
        self.results
            .iter()
            .filter(|r| matches!(r.outcome, UnitOutcome::Failed(_)))
            .count()
    }

    pub fn cancelled(&self) -> usize {
        self.results
            .iter()
            .filter(|r| matches!(r.outcome, UnitOutcome::Cancelled))
            .count()
    }

    pub fn failures(&self) -> impl Iterator<Item = (&Path, &VaultburnError)> {
        self.results.iter().filter_map(|r| match &r.outcome {
            UnitOutcome::Failed(e) => Some((r.path.as_path(), e)),
            _ => None,
        })
    }

    pub fn status(&self) -> BatchStatus {
        let succeeded = self.succeeded();
        BatchStatus::from_counts(succeeded, self.results.len() - succeeded)
    }
}

/// Executes operations over files on a dedicated thread pool.
pub struct BatchRunner {
    pool: rayon::ThreadPool,
}

impl BatchRunner {
    /// `threads == 0` lets rayon pick the number of threads.
    pub fn new(threads: usize) -> Result<Self> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|i| format!("vaultburn-worker-{}", i))
            .build()
            .map_err(|e| {
                VaultburnError::with_source(
                    ErrorCategory::Internal,
                    "failed to build worker thread pool",
                    e,
                )
            })?;
        Ok(Self { pool })
    }

    /// Runs `op` over `items` on the calling thread's behalf and waits.
    pub fn run<O: Operation>(
        &self,
        items: Vec<PathBuf>,
        op: &O,
        token: &CancellationToken,
        progress: Option<&Sender<ProgressEvent>>,
    ) -> Result<BatchReport<O::Output>> {
        let items = prepare(items)?;
        Ok(self.execute(items, op, token, progress, &AtomicUsize::new(0)))
    }

    /// Starts `op` over `items` in the background and returns immediately.
    ///
    /// An empty batch is rejected here, before anything is started.
    pub fn spawn<O>(self, items: Vec<PathBuf>, op: O) -> Result<BatchHandle<O::Output>>
    where
        O: Operation + Send + 'static,
        O::Output: 'static,
    {
        let items = prepare(items)?;
        let total = items.len();
        let token = CancellationToken::new();
        let completed = Arc::new(AtomicUsize::new(0));
        let (sender, receiver) = mpsc::channel();

        let thread = {
            let token = token.clone();
            let completed = Arc::clone(&completed);
            thread::Builder::new()
                .name("vaultburn-batch".to_string())
                .spawn(move || self.execute(items, &op, &token, Some(&sender), &completed))
                .map_err(|e| {
                    VaultburnError::with_source(
                        ErrorCategory::Internal,
                        "failed to start batch thread",
                        e,
                    )
                })?
        };

        Ok(BatchHandle {
            progress: receiver,
            token,
            completed,
            total,
            thread,
        })
    }

    fn execute<O: Operation>(
        &self,
        items: Vec<PathBuf>,
        op: &O,
        token: &CancellationToken,
        progress: Option<&Sender<ProgressEvent>>,
        completed: &AtomicUsize,
    ) -> BatchReport<O::Output> {
        info!("{}: starting batch of {} file(s)", op.name(), items.len());

        let results: Vec<UnitResult<O::Output>> = self.pool.install(|| {
            items
                .into_par_iter()
                .enumerate()
                .map(|(index, path)| {
                    let unit = UnitProgress {
                        index,
                        sender: progress,
                    };

                    if token.is_cancelled() {
                        debug!("{}: cancelled before {}", op.name(), path.display());
                        unit.send(ProgressEvent::Cancelled {
                            index,
                            path: path.clone(),
                        });
                        return UnitResult {
                            path,
                            outcome: UnitOutcome::Cancelled,
                        };
                    }

                    unit.send(ProgressEvent::Started {
                        index,
                        path: path.clone(),
                    });
                    let outcome = match op.run(&path, &unit) {
                        Ok(output) => UnitOutcome::Done(output),
                        Err(e) => {
                            warn!("{}: {}", op.name(), e.display_chain());
                            UnitOutcome::Failed(e)
                        }
                    };
                    completed.fetch_add(1, Ordering::SeqCst);
                    unit.send(ProgressEvent::Finished {
                        index,
                        path: path.clone(),
                        ok: matches!(outcome, UnitOutcome::Done(_)),
                    });

                    UnitResult { path, outcome }
                })
                .collect()
        });

        let report = BatchReport { results };
        info!(
            "{}: {} succeeded, {} failed, {} cancelled",
            op.name(),
            report.succeeded(),
            report.failed(),
            report.cancelled()
        );
        report
    }
}

/// Rejects empty batches and drops paths naming a file already in the
/// batch so no file is worked on by two threads at once.
fn prepare(items: Vec<PathBuf>) -> Result<Vec<PathBuf>> {
    if items.is_empty() {
        return Err(VaultburnError::with_kind(
            ErrorCategory::User,
            ErrorKind::NoItems,
            "no files to process",
        ));
    }
    let mut seen = HashSet::new();
    Ok(items
        .into_iter()
        .filter(|path| {
            let fresh = seen.insert(FileIdentity::of(path));
            if !fresh {
                debug!("dropping {} (already in batch)", path.display());
            }
            fresh
        })
        .collect())
}

/// What makes two paths the same file. Paths that cannot be stat'ed are
/// compared as given.
#[derive(Debug, PartialEq, Eq, Hash)]
enum FileIdentity {
    #[cfg(unix)]
    Inode { dev: u64, ino: u64 },
    Path(PathBuf),
}

impl FileIdentity {
    fn of(path: &Path) -> Self {
        #[cfg(unix)]
        {
            use std::os::unix::fs::MetadataExt;
            if let Ok(meta) = fs::symlink_metadata(path) {
                return FileIdentity::Inode {
                    dev: meta.dev(),
                    ino: meta.ino(),
                };
            }
        }
        FileIdentity::Path(fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf()))
    }
}

/// A batch running in the background.
pub struct BatchHandle<T> {
    progress: Receiver<ProgressEvent>,
    token: CancellationToken,
    completed: Arc<AtomicUsize>,
    total: usize,
    thread: JoinHandle<BatchReport<T>>,
}

impl<T> BatchHandle<T> {
    /// Progress events; the channel closes when the batch is over.
    pub fn progress(&self) -> &Receiver<ProgressEvent> {
        &self.progress
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// Files finished so far, successfully or not.
    pub fn completed(&self) -> usize {
        self.completed.load(Ordering::SeqCst)
    }

    pub fn total(&self) -> usize {
        self.total
    }

    pub fn is_finished(&self) -> bool {
        self.thread.is_finished()
    }

    /// Waits for the batch to end.
    pub fn join(self) -> Result<BatchReport<T>> {
        self.thread.join().map_err(|_| {
            VaultburnError::new(ErrorCategory::Internal, "batch thread panicked")
        })
    }
}
