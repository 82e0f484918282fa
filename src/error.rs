use std::error::Error as StdError;
use std::io;
use std::path::Path;

use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum ErrorCategory {
    /// Any failure that cannot be confidently attributed to any other error
    /// category in this enum.
    ///
    /// In particular this means that use of Internal is never a guarantee
    /// the error is not, for example due to a user error - merely that it
    /// cannot be confidently determined by the code.
    Internal,

    /// The user provided invalid input or performed an action that is
    /// unsupported or impossible to complete.
    User,
}

/// Fine-grained condition flags for consumers that want to branch on error kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum ErrorKind {
    /// The target path does not exist.
    PathNotFound,
    /// The operating system refused access to the path.
    PermissionDenied,
    /// The file is locked or busy in another process.
    FileLocked,
    /// The key text is not a syntactically valid key (length or encoding).
    MalformedKey,
    /// Authentication failed due to a wrong key, tampering or corruption.
    AuthenticationFailed,
    /// The unit of work was never started because the batch was cancelled.
    Cancelled,
    /// A batch was submitted with nothing to do.
    NoItems,
    /// The overwrite pass count is out of range.
    InvalidPasses,
    /// The path exists but is not a regular file.
    NotAFile,
    /// The path is a symbolic link, which is never followed.
    SymlinkRefused,
    /// The output path already exists and overwriting was not requested.
    OutputExists,
    /// The key could not be obtained from the configured source.
    KeyUnavailable,
    /// The armored representation is malformed (prefix, encoding, or unsupported version).
    ArmoringInvalid,
    /// Base64 decoding of the armored payload failed.
    ArmoringDecode,
    /// Input claimed to be vaultburn data but used a future/unsupported version.
    ArmoringFromFuture,
    /// Ciphertext length fields or binary layout are invalid.
    BinaryFormat,
    /// Input data ended before the expected component could be read.
    TruncatedInput,
    /// Additional bytes were present after the sealed payload.
    TrailingData,
    /// NaCl secretbox (XSalsa20Poly1305) failed to seal data.
    SecretboxFailure,
    /// The configuration file could not be read or parsed.
    Config,
    /// Interaction with the filesystem, stdin/stdout, or other I/O failed.
    Io,
}

impl ErrorKind {
    /// Short stable name used in the activity log.
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::PathNotFound => "path-not-found",
            ErrorKind::PermissionDenied => "permission-denied",
            ErrorKind::FileLocked => "file-locked",
            ErrorKind::MalformedKey => "malformed-key",
            ErrorKind::AuthenticationFailed => "authentication-failed",
            ErrorKind::Cancelled => "cancelled",
            ErrorKind::NoItems => "no-items",
            ErrorKind::InvalidPasses => "invalid-passes",
            ErrorKind::NotAFile => "not-a-file",
            ErrorKind::SymlinkRefused => "symlink-refused",
            ErrorKind::OutputExists => "output-exists",
            ErrorKind::KeyUnavailable => "key-unavailable",
            ErrorKind::ArmoringInvalid => "armoring-invalid",
            ErrorKind::ArmoringDecode => "armoring-decode",
            ErrorKind::ArmoringFromFuture => "armoring-from-future",
            ErrorKind::BinaryFormat => "binary-format",
            ErrorKind::TruncatedInput => "truncated-input",
            ErrorKind::TrailingData => "trailing-data",
            ErrorKind::SecretboxFailure => "secretbox-failure",
            ErrorKind::Config => "config",
            ErrorKind::Io => "io",
        }
    }
}

#[derive(Debug, Error)]
#[error("{msg}")]
pub struct VaultburnError {
    /// Broad error category, always provided.
    pub category: ErrorCategory,
    /// Optional specific condition tag for consumers that need to
    /// branch their behavior. Any code consuming errors MUST handle
    /// the absence of a defined kind.
    pub kind: Option<ErrorKind>,
    #[source]
    source: Option<Box<dyn StdError + Send + Sync + 'static>>,
    msg: String,
}

impl VaultburnError {
    /// Creates a new error with a required category and display message.
    pub fn new(category: ErrorCategory, msg: impl Into<String>) -> Self {
        Self {
            category,
            kind: None,
            source: None,
            msg: msg.into(),
        }
    }

    /// Creates a new error that also tags the failure with a kind.
    pub fn with_kind(category: ErrorCategory, kind: ErrorKind, msg: impl Into<String>) -> Self {
        Self {
            category,
            kind: Some(kind),
            source: None,
            msg: msg.into(),
        }
    }

    /// Creates a new error that retains the originating source error.
    pub fn with_source(
        category: ErrorCategory,
        msg: impl Into<String>,
        source: impl StdError + Send + Sync + 'static,
    ) -> Self {
        Self {
            category,
            kind: None,
            source: Some(Box::new(source)),
            msg: msg.into(),
        }
    }

    /// Creates a new error that carries both a kind tag and the originating source error.
    pub fn with_kind_and_source(
        category: ErrorCategory,
        kind: ErrorKind,
        msg: impl Into<String>,
        source: impl StdError + Send + Sync + 'static,
    ) -> Self {
        Self {
            category,
            kind: Some(kind),
            source: Some(Box::new(source)),
            msg: msg.into(),
        }
    }

    /// The user-facing message carried by the error.
    pub fn message(&self) -> &str {
        &self.msg
    }

    /// Returns the preserved source error if present.
    pub fn source_error(&self) -> Option<&(dyn StdError + Send + Sync + 'static)> {
        self.source.as_deref()
    }

    /// Wraps the current error with a higher-level message while preserving the original as source.
    pub fn with_context(self, msg: impl Into<String>) -> Self {
        let category = self.category;
        let kind = self.kind;
        Self {
            category,
            kind,
            source: Some(Box::new(self)),
            msg: msg.into(),
        }
    }

    /// Message of this error followed by every source in the chain,
    /// joined with `": "`.
    pub fn display_chain(&self) -> String {
        let mut out = self.msg.clone();
        let mut current = self.source_error().map(|e| e as &(dyn StdError + 'static));
        while let Some(err) = current {
            out.push_str(": ");
            out.push_str(&err.to_string());
            current = err.source();
        }
        out
    }
}

/// Maps an I/O failure on `path` to a tagged error.
///
/// `action` completes the sentence "failed to ..." (e.g. "open", "read from").
pub fn io_error(path: &Path, action: &str, err: io::Error) -> VaultburnError {
    let (category, kind) = classify_io(&err);
    VaultburnError::with_kind_and_source(
        category,
        kind,
        format!("failed to {} {}", action, path.display()),
        err,
    )
}

fn classify_io(err: &io::Error) -> (ErrorCategory, ErrorKind) {
    match err.kind() {
        io::ErrorKind::NotFound => return (ErrorCategory::User, ErrorKind::PathNotFound),
        io::ErrorKind::PermissionDenied if !is_lock_violation(err) => {
            return (ErrorCategory::User, ErrorKind::PermissionDenied);
        }
        io::ErrorKind::ResourceBusy => return (ErrorCategory::User, ErrorKind::FileLocked),
        io::ErrorKind::IsADirectory => return (ErrorCategory::User, ErrorKind::NotAFile),
        _ => {}
    }
    if is_lock_violation(err) {
        (ErrorCategory::User, ErrorKind::FileLocked)
    } else {
        (ErrorCategory::Internal, ErrorKind::Io)
    }
}

#[cfg(unix)]
fn is_lock_violation(err: &io::Error) -> bool {
    // ETXTBSY: text file busy (an executable that is currently running)
    matches!(err.raw_os_error(), Some(26))
}

#[cfg(windows)]
fn is_lock_violation(err: &io::Error) -> bool {
    // ERROR_SHARING_VIOLATION, ERROR_LOCK_VIOLATION
    matches!(err.raw_os_error(), Some(32) | Some(33))
}

#[cfg(not(any(unix, windows)))]
fn is_lock_violation(_err: &io::Error) -> bool {
    false
}

/// Convenience alias.
pub type Result<T> = std::result::Result<T, VaultburnError>;
