//! Error types for the deepdoc-client library.
//!
//! Two families of errors reflect two distinct failure modes:
//!
//! * [`SessionError`] — **Recoverable**: one submission failed (no file
//!   picked, bad recipient address, server rejected the document, the
//!   request timed out). Stored in the session's
//!   [`crate::session::Outcome::Failure`] or its field-local error slot and
//!   rendered to the user. The user can always fix the input and resubmit.
//!
//! * [`DeepDocError`] — **Fatal** for the call that returned it: the file
//!   picker could not read the file, the configuration is invalid, the HTTP
//!   client could not be built. Returned as `Err(DeepDocError)` from the
//!   library entry points.
//!
//! [`ErrorKind`] is the closed taxonomy behind every [`SessionError`]; the
//! classifier never invents a kind outside of it.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Fixed message shown when submit is pressed before a file is chosen.
pub const NO_FILE_SELECTED_MESSAGE: &str = "Please select a file to upload.";

/// Fixed message shown when the advanced-mode recipient is malformed.
pub const INVALID_RECIPIENT_MESSAGE: &str = "Please enter a valid email address.";

/// Label prepended to the server detail on HTTP 500.
pub const PARSER_ERROR_PREFIX: &str = "Parser Error: ";

/// Label prepended to the server detail on any other failing status.
pub const UNEXPECTED_SERVER_ERROR_PREFIX: &str = "Unexpected server error: ";

/// Fixed message for transport failures that are not timeouts.
pub const UNKNOWN_CLIENT_ERROR_MESSAGE: &str =
    "Could not reach the conversion service. Check your connection and try again.";

// ── Session taxonomy ─────────────────────────────────────────────────────

/// Closed set of reasons a submission can fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    /// Submit pressed with no file picked.
    NoFileSelected,
    /// Advanced mode with a recipient that is not `local@domain.tld`.
    InvalidRecipient,
    /// Server answered 400.
    UnsupportedFileType,
    /// Server answered 500.
    ParserFailure,
    /// Server answered with any other failing status.
    UnexpectedServerError,
    /// The request exceeded the configured duration bound.
    NetworkTimeout,
    /// No response at all, for a reason other than the timeout.
    UnknownClientError,
}

/// Where an [`ErrorKind`] originates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorOrigin {
    LocalValidation,
    Server,
    Transport,
}

impl ErrorKind {
    pub fn origin(self) -> ErrorOrigin {
        match self {
            ErrorKind::NoFileSelected | ErrorKind::InvalidRecipient => ErrorOrigin::LocalValidation,
            ErrorKind::UnsupportedFileType
            | ErrorKind::ParserFailure
            | ErrorKind::UnexpectedServerError => ErrorOrigin::Server,
            ErrorKind::NetworkTimeout | ErrorKind::UnknownClientError => ErrorOrigin::Transport,
        }
    }

    /// Every kind is recoverable by a fresh, explicit user action
    /// (re-pick, correct the address, or simply resubmit).
    pub fn is_recoverable(self) -> bool {
        true
    }

    /// Short stable label for logs and JSON output.
    pub fn label(self) -> &'static str {
        match self {
            ErrorKind::NoFileSelected => "no_file_selected",
            ErrorKind::InvalidRecipient => "invalid_recipient",
            ErrorKind::UnsupportedFileType => "unsupported_file_type",
            ErrorKind::ParserFailure => "parser_failure",
            ErrorKind::UnexpectedServerError => "unexpected_server_error",
            ErrorKind::NetworkTimeout => "network_timeout",
            ErrorKind::UnknownClientError => "unknown_client_error",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A user-visible failure of one submission.
///
/// `Display` yields exactly `message`, which is what the UI shows.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{message}")]
pub struct SessionError {
    pub kind: ErrorKind,
    pub message: String,
}

impl SessionError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn no_file_selected() -> Self {
        Self::new(ErrorKind::NoFileSelected, NO_FILE_SELECTED_MESSAGE)
    }

    pub fn invalid_recipient() -> Self {
        Self::new(ErrorKind::InvalidRecipient, INVALID_RECIPIENT_MESSAGE)
    }
}

/// Why [`crate::controller::SessionController::submit`] refused to start.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SubmitError {
    /// A request for this session is already in flight.
    #[error("a conversion is already in progress")]
    Busy,

    /// Local validation rejected the input; no request was issued.
    #[error(transparent)]
    Invalid(#[from] SessionError),

    /// Called outside a tokio runtime, so the upload has nowhere to run.
    #[error("submit must be called from within a tokio runtime")]
    NoRuntime,
}

// ── Fatal errors ─────────────────────────────────────────────────────────

/// All fatal errors returned by the deepdoc-client library.
#[derive(Debug, Error)]
pub enum DeepDocError {
    // ── File picker ───────────────────────────────────────────────────────
    /// The picked file does not exist.
    #[error("File not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The picker only offers `.pdf`, `.docx`, `.csv` and `.html`.
    #[error("Unsupported file extension '{extension}' for '{path}'\nSupported: .pdf, .docx, .csv, .html")]
    UnsupportedExtension { path: PathBuf, extension: String },

    /// The file exists but reading it failed midway.
    #[error("Failed to read '{path}': {source}")]
    FileReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Network plumbing ──────────────────────────────────────────────────
    /// reqwest refused to build a client with the given settings.
    #[error("Failed to build HTTP client: {0}")]
    HttpClient(String),

    /// The health probe could not get a usable answer.
    #[error("Conversion service at '{url}' is unreachable: {reason}")]
    BackendUnreachable { url: String, reason: String },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not write the downloaded Markdown file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_error_displays_message_only() {
        let e = SessionError::new(ErrorKind::UnsupportedFileType, "bad type");
        assert_eq!(e.to_string(), "bad type");
    }

    #[test]
    fn origins_follow_taxonomy() {
        assert_eq!(ErrorKind::NoFileSelected.origin(), ErrorOrigin::LocalValidation);
        assert_eq!(ErrorKind::InvalidRecipient.origin(), ErrorOrigin::LocalValidation);
        assert_eq!(ErrorKind::UnsupportedFileType.origin(), ErrorOrigin::Server);
        assert_eq!(ErrorKind::ParserFailure.origin(), ErrorOrigin::Server);
        assert_eq!(ErrorKind::UnexpectedServerError.origin(), ErrorOrigin::Server);
        assert_eq!(ErrorKind::NetworkTimeout.origin(), ErrorOrigin::Transport);
        assert_eq!(ErrorKind::UnknownClientError.origin(), ErrorOrigin::Transport);
    }

    #[test]
    fn submit_error_wraps_validation_error_transparently() {
        let e: SubmitError = SessionError::no_file_selected().into();
        assert_eq!(e.to_string(), NO_FILE_SELECTED_MESSAGE);
        assert!(SubmitError::Busy.to_string().contains("in progress"));
    }

    #[test]
    fn unsupported_extension_display() {
        let e = DeepDocError::UnsupportedExtension {
            path: PathBuf::from("notes.txt"),
            extension: ".txt".into(),
        };
        let msg = e.to_string();
        assert!(msg.contains(".txt"), "got: {msg}");
        assert!(msg.contains(".docx"), "got: {msg}");
    }

    #[test]
    fn backend_unreachable_display() {
        let e = DeepDocError::BackendUnreachable {
            url: "http://localhost:8000/".into(),
            reason: "connection refused".into(),
        };
        assert!(e.to_string().contains("localhost:8000"));
        assert!(e.to_string().contains("connection refused"));
    }
}
