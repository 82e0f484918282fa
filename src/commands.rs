//! The `vaultburn` subcommands
//!
//! Each command returns the process exit status on completion: 0 when
//! everything was processed, 2 when only some of it was, 1 when nothing
//! was. Errors that stop a command before any file is touched are
//! returned as `Err` and map to status 1.

use crate::batch::{
    BatchHandle, BatchRunner, BatchStatus, EncryptOperation, ProgressEvent, ShredOperation,
    UnitOutcome,
};
use crate::config::Config;
use crate::confirm::Confirmer;
use crate::error::{ErrorCategory, ErrorKind, Result, VaultburnError};
use crate::file_ops;
use crate::format::human_size;
use crate::key_source::KeySource;
use crate::oplog::{EntryOutcome, LogEntry, OperationKind, OperationLog};
use crate::shred::Shredder;
use crate::targets::{self, PendingList};
use indicatif::{ProgressBar, ProgressStyle};
use std::io::Write;
use std::path::PathBuf;
use tracing::warn;

#[derive(Debug, Clone, Default)]
pub struct ShredOptions {
    pub paths: Vec<PathBuf>,
    /// Overrides the configured pass count
    pub passes: Option<u32>,
    pub recursive: bool,
    pub quiet: bool,
}

#[derive(Debug, Clone, Default)]
pub struct EncryptOptions {
    pub files: Vec<PathBuf>,
    pub output: Option<PathBuf>,
    pub force: bool,
    pub shred_original: bool,
    pub quiet: bool,
}

#[derive(Debug, Clone, Default)]
pub struct DecryptOptions {
    pub input: PathBuf,
    pub output: Option<PathBuf>,
    pub force: bool,
}

/// Overwrites and deletes the given files and directories.
///
/// Nothing is touched unless `confirmer` agrees.
pub fn shred(config: &Config, opts: &ShredOptions, confirmer: &mut dyn Confirmer) -> Result<i32> {
    let shredder = Shredder::new(opts.passes.unwrap_or(config.passes))?;
    let expansion = targets::expand(&opts.paths, opts.recursive);

    let mut log = OperationLog::new();
    for path in &expansion.skipped {
        eprintln!("Skipping {} (symbolic link or special file)", path.display());
        log.record(LogEntry::new(
            OperationKind::Shred,
            path,
            EntryOutcome::Skipped {
                reason: "symbolic link or special file".to_string(),
            },
        ));
    }
    for (path, err) in &expansion.errors {
        eprintln!("Error: {}", err.display_chain());
        log.record(LogEntry::failed(OperationKind::Shred, path, err));
    }

    let mut pending = PendingList::new();
    pending.add_all(expansion.files);
    if pending.is_empty() {
        save_log(config, &log);
        return Err(VaultburnError::with_kind(
            ErrorCategory::User,
            ErrorKind::NoItems,
            "no files to shred",
        ));
    }

    let prompt = format!(
        "{} file(s) ({}) will be permanently destroyed, each overwritten {} time(s). Continue?",
        pending.len(),
        human_size(pending.total_size()),
        shredder.passes()
    );
    if !confirmer.confirm(&prompt)? {
        eprintln!("Aborted, no files were touched.");
        save_log(config, &log);
        return Ok(BatchStatus::Fatal.exit_code());
    }
    if !opts.quiet {
        eprintln!("{}", pending.status_line());
    }

    let handle = BatchRunner::new(config.threads)?
        .spawn(pending.paths(), ShredOperation::new(shredder))?;
    follow_progress(&handle, opts.quiet);
    let report = handle.join()?;

    for (path, err) in report.failures() {
        eprintln!("Error: {}: {}", path.display(), err.display_chain());
    }
    log.extend_from_report(OperationKind::Shred, &report, |summary| {
        Some(format!(
            "{} destroyed, {} passes",
            human_size(summary.bytes),
            summary.passes
        ))
    });
    save_log(config, &log);

    let unsuccessful =
        report.failed() + report.cancelled() + expansion.skipped.len() + expansion.errors.len();
    if !opts.quiet {
        eprintln!(
            "Shredded {} file(s), {} failed or skipped.",
            report.succeeded(),
            unsuccessful
        );
    }
    Ok(BatchStatus::from_counts(report.succeeded(), unsuccessful).exit_code())
}

/// Encrypts each file under its own fresh key.
///
/// Writes `<key>\t<output path>` to `out` for every encrypted file. The keys
/// appear nowhere else.
pub fn encrypt(config: &Config, opts: &EncryptOptions, out: &mut dyn Write) -> Result<i32> {
    if opts.output.is_some() && opts.files.len() > 1 {
        return Err(VaultburnError::new(
            ErrorCategory::User,
            "--output can only be used with a single input file",
        ));
    }

    let mut op = EncryptOperation::new(opts.force);
    if let Some(output) = &opts.output {
        op = op.with_output(output.clone());
    }
    if opts.shred_original {
        op = op.shred_original(Shredder::new(config.passes)?);
    }

    let handle = BatchRunner::new(config.threads)?.spawn(opts.files.clone(), op)?;
    follow_progress(&handle, opts.quiet);
    let report = handle.join()?;

    let mut write_error = None;
    let mut shred_failures = 0;
    for result in &report.results {
        if let UnitOutcome::Done(encrypted) = &result.outcome {
            let key = encrypted.key.encode();
            if let Err(e) = writeln!(out, "{}\t{}", key.as_str(), encrypted.output.display()) {
                write_error.get_or_insert(e);
            }
            if let Some(err) = &encrypted.shred_error {
                eprintln!("Error: {}: {}", result.path.display(), err.display_chain());
                shred_failures += 1;
            }
        }
    }
    for (path, err) in report.failures() {
        eprintln!("Error: {}: {}", path.display(), err.display_chain());
    }

    let mut log = OperationLog::new();
    log.extend_from_report(OperationKind::Encrypt, &report, |encrypted| {
        let mut detail = format!("-> {}", encrypted.output.display());
        if encrypted.shredded {
            detail.push_str(", original shredded");
        }
        if let Some(err) = &encrypted.shred_error {
            detail.push_str(&format!(", original NOT shredded: {}", err.display_chain()));
        }
        Some(detail)
    });
    save_log(config, &log);

    if let Some(e) = write_error {
        return Err(VaultburnError::with_kind_and_source(
            ErrorCategory::Internal,
            ErrorKind::Io,
            "failed to print keys; the encrypted files cannot be recovered without them",
            e,
        ));
    }
    if !opts.quiet && report.succeeded() > 0 {
        eprintln!("Store each key safely. It is not saved anywhere and cannot be recovered.");
    }
    let unsuccessful = report.failed() + report.cancelled() + shred_failures;
    Ok(BatchStatus::from_counts(report.succeeded(), unsuccessful).exit_code())
}

/// Decrypts one file.
///
/// The key is obtained and validated before the input is read.
pub fn decrypt(config: &Config, opts: &DecryptOptions, keys: &mut dyn KeySource) -> Result<i32> {
    let mut log = OperationLog::new();
    let result = keys.read_key().and_then(|key| {
        let output = opts
            .output
            .clone()
            .unwrap_or_else(|| file_ops::default_decrypted_path(&opts.input));
        let len = file_ops::decrypt_file(&opts.input, &output, &key, opts.force)?;
        Ok((output, len))
    });

    match result {
        Ok((output, len)) => {
            log.record(
                LogEntry::ok(OperationKind::Decrypt, &opts.input)
                    .with_detail(format!("-> {}", output.display())),
            );
            save_log(config, &log);
            eprintln!(
                "Decrypted {} -> {} ({})",
                opts.input.display(),
                output.display(),
                human_size(len)
            );
            Ok(BatchStatus::Success.exit_code())
        }
        Err(e) => {
            log.record(LogEntry::failed(OperationKind::Decrypt, &opts.input, &e));
            save_log(config, &log);
            Err(e)
        }
    }
}

/// Prints the activity log, oldest first, optionally only the last `tail`
/// entries.
pub fn show_log(config: &Config, tail: Option<usize>, out: &mut dyn Write) -> Result<i32> {
    let log = OperationLog::load(&config.log_file)?;
    let entries = log.entries();
    if entries.is_empty() {
        eprintln!("No activity recorded in {}", config.log_file.display());
        return Ok(0);
    }

    let start = tail.map_or(0, |n| entries.len().saturating_sub(n));
    for entry in &entries[start..] {
        writeln!(out, "{}", entry.render()).map_err(|e| {
            VaultburnError::with_kind_and_source(
                ErrorCategory::Internal,
                ErrorKind::Io,
                "failed to write log output",
                e,
            )
        })?;
    }
    Ok(0)
}

/// Drains the progress channel into a bar until the batch is over.
fn follow_progress<T>(handle: &BatchHandle<T>, quiet: bool) {
    let pb = if quiet {
        ProgressBar::hidden()
    } else {
        let pb = ProgressBar::new(handle.total() as u64);
        pb.set_style(
            ProgressStyle::with_template("[{bar:40.cyan/blue}] {pos}/{len} {wide_msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("=>-"),
        );
        pb
    };

    for event in handle.progress().iter() {
        match event {
            ProgressEvent::Started { path, .. } => pb.set_message(path.display().to_string()),
            ProgressEvent::PassCompleted { .. } => {}
            ProgressEvent::Finished { .. } | ProgressEvent::Cancelled { .. } => pb.inc(1),
        }
    }
    pb.finish_and_clear();
}

/// Appends `log` to the configured activity log. Failing to do so is
/// reported but does not change the outcome of the command.
fn save_log(config: &Config, log: &OperationLog) {
    if !config.activity_log || log.is_empty() {
        return;
    }
    if let Err(e) = log.append_to(&config.log_file) {
        warn!("could not write activity log: {}", e.display_chain());
    }
}
