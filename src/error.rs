//! Error types for the scanlate library.
//!
//! Four error types map onto the four layers of the pipeline:
//!
//! * [`InferenceError`]: one remote call failed. Either **transient** (rate
//!   limit, 5xx, network blip, empty output, timeout) or **permanent** (bad
//!   key, malformed request). Produced by [`crate::client::InferenceClient`].
//!
//! * [`RetryError`]: the terminal outcome of a
//!   [`crate::retry::RetryScheduler`] run: the first permanent failure, or the
//!   attempt budget ran out.
//!
//! * [`PageError`]: **non-fatal**, a single page could not be processed. It
//!   is stored next to the sentinel page in
//!   [`crate::output::ProcessedPage`]; the batch continues.
//!
//! * [`PipelineError`]: **fatal** for a document (bad PDF, snapshot write
//!   failure) or for the whole run (provider not configured).

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// All fatal errors returned by the scanlate library.
///
/// Page-level failures use [`PageError`] and never surface here.
#[derive(Debug, Error)]
pub enum PipelineError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("File not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The input directory does not exist or is not a directory.
    #[error("Directory not found: '{path}'")]
    DirectoryNotFound { path: PathBuf },

    /// The file exists and was read, but is not a PDF.
    #[error("File is not a valid PDF: '{path}'\nFirst bytes: {magic:?}")]
    NotAPdf { path: PathBuf, magic: [u8; 4] },

    // ── PDF errors ────────────────────────────────────────────────────────
    /// PDF header/trailer/xref is corrupt and cannot be parsed.
    #[error("PDF '{path}' is corrupt: {detail}\nTry repairing with: qpdf --decrypt input.pdf output.pdf")]
    CorruptPdf { path: PathBuf, detail: String },

    /// PDF requires a password but none was provided.
    #[error("PDF '{path}' is encrypted and requires a password.\nProvide it with --password <PASSWORD>.")]
    PasswordRequired { path: PathBuf },

    /// A password was provided but it is wrong.
    #[error("Wrong password for PDF '{path}'")]
    WrongPassword { path: PathBuf },

    /// pdfium-render returned an error for a specific page.
    #[error("Rasterisation failed for page {page}: {detail}")]
    RasterisationFailed { page: usize, detail: String },

    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\n\
Install libpdfium for your platform, or set PDFIUM_LIB_PATH to the library\n\
file (or the directory containing it). Pre-built binaries:\n\
  https://github.com/bblanchon/pdfium-binaries/releases\n"
    )]
    PdfiumBindingFailed(String),

    // ── LLM errors ────────────────────────────────────────────────────────
    /// The configured provider is not initialised (missing API key etc.).
    #[error("LLM provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    // ── Snapshot errors ───────────────────────────────────────────────────
    /// Could not read an existing snapshot file.
    #[error("Failed to read snapshot '{path}': {source}")]
    SnapshotReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A snapshot file exists but does not parse as the expected document.
    #[error("Snapshot '{path}' is not a valid document: {detail}")]
    InvalidSnapshot { path: PathBuf, detail: String },

    /// Could not create or overwrite the snapshot file.
    #[error("Failed to write snapshot '{path}': {source}")]
    SnapshotWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Failure of a single remote inference attempt.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum InferenceError {
    /// Rate limit, server-side error, dropped connection, empty output.
    ///
    /// `retry_after` carries a delay suggested by the service, if any.
    #[error("transient error: {message}")]
    Transient {
        message: String,
        retry_after: Option<Duration>,
    },

    /// Bad request, authentication or validation failure. Not retried.
    #[error("permanent error: {message}")]
    Permanent { message: String },

    /// The attempt did not finish within the per-attempt timeout.
    #[error("call timed out after {limit:?}")]
    Timeout { limit: Duration },
}

impl InferenceError {
    pub fn transient(message: impl Into<String>) -> Self {
        Self::Transient {
            message: message.into(),
            retry_after: None,
        }
    }

    pub fn permanent(message: impl Into<String>) -> Self {
        Self::Permanent {
            message: message.into(),
        }
    }

    /// Whether another attempt may succeed.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, Self::Permanent { .. })
    }

    /// Server-suggested delay before the next attempt.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::Transient { retry_after, .. } => *retry_after,
            _ => None,
        }
    }
}

/// Terminal outcome of a [`crate::retry::RetryScheduler::run`] that did not
/// succeed.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RetryError {
    /// A non-retryable failure; returned on the attempt it happened.
    #[error("permanent failure on attempt {attempts}: {source}")]
    Permanent {
        attempts: u32,
        #[source]
        source: InferenceError,
    },

    /// Every attempt failed with a retryable error.
    #[error("retries exhausted after {attempts} attempts; last error: {last_error}")]
    RetriesExhausted {
        attempts: u32,
        last_error: InferenceError,
    },
}

impl RetryError {
    /// Number of attempts made before giving up.
    pub fn attempts(&self) -> u32 {
        match self {
            Self::Permanent { attempts, .. } | Self::RetriesExhausted { attempts, .. } => *attempts,
        }
    }
}

/// A non-fatal error for a single page.
///
/// Stored alongside the sentinel page in [`crate::output::ProcessedPage`].
/// The document run continues with the next page.
#[derive(Debug, Clone, PartialEq, Error, serde::Serialize, serde::Deserialize)]
pub enum PageError {
    /// The service rejected the request; retrying cannot help.
    #[error("Page {page}: rejected after {attempts} attempt(s): {detail}")]
    Permanent {
        page: usize,
        attempts: u32,
        detail: String,
    },

    /// Every attempt failed with a transient error.
    #[error("Page {page}: failed after {attempts} attempts: {detail}")]
    RetriesExhausted {
        page: usize,
        attempts: u32,
        detail: String,
    },

    /// The source text was already a failure marker from an earlier stage.
    #[error("Page {page}: source text is missing (earlier stage failed)")]
    UpstreamFailed { page: usize },

    /// The page image could not be produced, so no request was sent.
    #[error("Page {page}: could not be rendered: {detail}")]
    RenderFailed { page: usize, detail: String },
}

impl PageError {
    /// Convert a scheduler failure into the page-level error stored on disk.
    pub fn from_retry(page: usize, err: &RetryError) -> Self {
        match err {
            RetryError::Permanent { attempts, source } => Self::Permanent {
                page,
                attempts: *attempts,
                detail: source.to_string(),
            },
            RetryError::RetriesExhausted {
                attempts,
                last_error,
            } => Self::RetriesExhausted {
                page,
                attempts: *attempts,
                detail: last_error.to_string(),
            },
        }
    }
}
