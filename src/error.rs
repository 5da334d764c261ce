//! Error types for the accessmatic library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`AccessMaticError`] — **Fatal**: the widget cannot be set up at all
//!   (bad configuration, page cannot be loaded, HTTP client cannot be built).
//!   Returned as `Err(AccessMaticError)` from constructors and loaders.
//!
//! * [`ProcessingError`] — **Non-fatal**: one PDF URL could not be turned into
//!   an accessible rendition. Stored inside
//!   [`crate::coordinator::ProcessingState::Failed`] and shown in the error
//!   view; every other link on the page keeps working.
//!
//! The coordinator never lets a `ProcessingError` escape: it either recovers
//! through the local pipeline or records the URL as failed.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the accessmatic library.
#[derive(Debug, Error)]
pub enum AccessMaticError {
    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// A string that should have been an absolute URL could not be parsed.
    #[error("Invalid URL '{input}': {reason}")]
    InvalidUrl { input: String, reason: String },

    // ── Page loading errors ───────────────────────────────────────────────
    /// Local HTML file was not found at the given path.
    #[error("Page file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Fetching or reading the hosted page failed.
    #[error("Failed to load page '{input}': {reason}")]
    PageLoadFailed { input: String, reason: String },

    /// Fetching the hosted page exceeded the configured timeout.
    #[error("Loading page '{url}' timed out after {secs}s")]
    PageLoadTimeout { url: String, secs: u64 },

    // ── Transport setup ───────────────────────────────────────────────────
    /// The HTTP client for the backend could not be constructed.
    #[error("Failed to build HTTP client: {0}")]
    HttpClient(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Coarse classification of a [`ProcessingError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorKind {
    Connectivity,
    Submission,
    PollTimeout,
    PollFailure,
    LocalPipeline,
}

/// A non-fatal error for a single PDF URL.
#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
pub enum ProcessingError {
    /// The health check failed or timed out. Only ever flips the session to
    /// local mode; never shown to the reader.
    #[error("Backend unreachable: {detail}")]
    Connectivity { detail: String },

    /// The submit request failed in transport or returned a non-success status.
    #[error("Submission failed{}: {detail}", .status.map(|s| format!(" (HTTP {s})")).unwrap_or_default())]
    Submission { status: Option<u16>, detail: String },

    /// A status request failed in transport or returned a non-success status.
    #[error("Status check for task '{task_id}' failed: {detail}")]
    PollTransport { task_id: String, detail: String },

    /// The task never left `pending` within the polling bound.
    #[error("Processing timeout after {elapsed_ms}ms for task '{task_id}'")]
    PollTimeout { task_id: String, elapsed_ms: u64 },

    /// The backend reported the task as failed.
    #[error("Document processing failed for task '{task_id}': {message}")]
    PollFailure { task_id: String, message: String },

    /// The local synthesiser could not produce a rendition.
    #[error("Local processing failed: {detail}")]
    LocalPipeline { detail: String },
}

impl ProcessingError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ProcessingError::Connectivity { .. } => ErrorKind::Connectivity,
            ProcessingError::Submission { .. } | ProcessingError::PollTransport { .. } => {
                ErrorKind::Submission
            }
            ProcessingError::PollTimeout { .. } => ErrorKind::PollTimeout,
            ProcessingError::PollFailure { .. } => ErrorKind::PollFailure,
            ProcessingError::LocalPipeline { .. } => ErrorKind::LocalPipeline,
        }
    }

    /// Transport-level failures of the remote path are recovered by the
    /// local pipeline; backend verdicts and timeouts are not.
    pub fn falls_back_to_local(&self) -> bool {
        matches!(
            self,
            ProcessingError::Connectivity { .. }
                | ProcessingError::Submission { .. }
                | ProcessingError::PollTransport { .. }
        )
    }

    /// Text that is safe to show to a reader. Raw details stay in `Display`.
    pub fn user_message(&self) -> String {
        match self {
            ProcessingError::Connectivity { .. }
            | ProcessingError::Submission { .. }
            | ProcessingError::PollTransport { .. } => {
                "We're unable to reach the accessibility service right now.".to_string()
            }
            ProcessingError::PollTimeout { .. } => {
                "Processing timeout - please try again.".to_string()
            }
            ProcessingError::PollFailure { message, .. } if !message.trim().is_empty() => {
                message.clone()
            }
            ProcessingError::PollFailure { .. } => "Document processing failed.".to_string(),
            ProcessingError::LocalPipeline { .. } => {
                "We're unable to process this document for accessibility right now.".to_string()
            }
        }
    }
}
