//! Where decryption keys come from

use crate::error::{ErrorCategory, ErrorKind, Result, VaultburnError};
use crate::key::FileKey;
use std::io::{self, IsTerminal, Read, Write};
use zeroize::Zeroizing;

/// Trait for obtaining the text form of a decryption key
pub trait KeySource {
    /// Read the key text. Parsing and validation are done by the caller.
    ///
    /// Returns the text wrapped in `Zeroizing` so it is wiped from memory
    /// when dropped.
    fn read_key_text(&mut self) -> Result<Zeroizing<String>>;

    /// Read and syntactically validate a key.
    fn read_key(&mut self) -> Result<FileKey> {
        let text = self.read_key_text()?;
        FileKey::parse(&text)
    }
}

/// Returns a fixed key text (from the command line, or tests)
pub struct ConstantKeySource {
    text: Zeroizing<String>,
}

impl ConstantKeySource {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: Zeroizing::new(text.into()),
        }
    }
}

impl KeySource for ConstantKeySource {
    fn read_key_text(&mut self) -> Result<Zeroizing<String>> {
        Ok(self.text.clone())
    }
}

/// Reads the key from any io::Read source until EOF
pub struct ReaderKeySource {
    reader: Box<dyn Read>,
}

impl ReaderKeySource {
    pub fn new(reader: Box<dyn Read>) -> Self {
        Self { reader }
    }
}

impl KeySource for ReaderKeySource {
    fn read_key_text(&mut self) -> Result<Zeroizing<String>> {
        let mut data = Zeroizing::new(String::new());
        self.reader.read_to_string(&mut data).map_err(|e| {
            let kind = if e.kind() == io::ErrorKind::InvalidData {
                ErrorKind::MalformedKey
            } else {
                ErrorKind::KeyUnavailable
            };
            VaultburnError::with_kind_and_source(
                ErrorCategory::User,
                kind,
                format!("error reading key: {}", e),
                e,
            )
        })?;
        Ok(data)
    }
}

/// Prompts for the key on the terminal with no echo
#[derive(Default)]
pub struct TerminalKeySource;

impl TerminalKeySource {
    pub fn new() -> Self {
        Self
    }
}

impl KeySource for TerminalKeySource {
    fn read_key_text(&mut self) -> Result<Zeroizing<String>> {
        if !io::stdin().is_terminal() {
            return Err(VaultburnError::with_kind(
                ErrorCategory::User,
                ErrorKind::KeyUnavailable,
                "cannot prompt for key - stdin is not a terminal (use --key or --key-stdin)",
            ));
        }

        io::stderr().write_all(b"Key (vaultburn): ").map_err(|e| {
            VaultburnError::with_kind_and_source(
                ErrorCategory::Internal,
                ErrorKind::Io,
                format!("failed to write prompt: {}", e),
                e,
            )
        })?;
        io::stderr().flush().map_err(|e| {
            VaultburnError::with_kind_and_source(
                ErrorCategory::Internal,
                ErrorKind::Io,
                format!("failed to flush prompt: {}", e),
                e,
            )
        })?;

        let key = rpassword::read_password().map_err(|e| {
            VaultburnError::with_kind_and_source(
                ErrorCategory::Internal,
                ErrorKind::KeyUnavailable,
                format!("failure reading key: {}", e),
                e,
            )
        })?;

        Ok(Zeroizing::new(key))
    }
}
