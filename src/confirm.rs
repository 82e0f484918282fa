//! Asking the user before destroying anything

use crate::error::{ErrorCategory, ErrorKind, Result, VaultburnError};
use std::io::{BufRead, Write};

pub trait Confirmer {
    /// Shows `prompt` and returns whether the user agreed.
    fn confirm(&mut self, prompt: &str) -> Result<bool>;
}

/// Agrees to everything (`--yes`).
pub struct AssumeYes;

impl Confirmer for AssumeYes {
    fn confirm(&mut self, _prompt: &str) -> Result<bool> {
        Ok(true)
    }
}

/// Writes the prompt to `output` and reads one answer line from `input`.
///
/// Only `y` or `yes` (any case) count as agreement. End of input counts as no.
pub struct StreamConfirmer<R, W> {
    input: R,
    output: W,
}

impl<R: BufRead, W: Write> StreamConfirmer<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }
}

impl<R: BufRead, W: Write> Confirmer for StreamConfirmer<R, W> {
    fn confirm(&mut self, prompt: &str) -> Result<bool> {
        write!(self.output, "{} [y/N] ", prompt)
            .and_then(|_| self.output.flush())
            .map_err(|e| {
                VaultburnError::with_kind_and_source(
                    ErrorCategory::Internal,
                    ErrorKind::Io,
                    "failed to write confirmation prompt",
                    e,
                )
            })?;

        let mut line = String::new();
        self.input.read_line(&mut line).map_err(|e| {
            VaultburnError::with_kind_and_source(
                ErrorCategory::Internal,
                ErrorKind::Io,
                "failed to read confirmation",
                e,
            )
        })?;
        let answer = line.trim().to_ascii_lowercase();
        Ok(answer == "y" || answer == "yes")
    }
}
