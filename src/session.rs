//! Session data model: the state of one file-to-Markdown conversion attempt.
//!
//! A [`Session`] is owned by [`crate::controller::SessionController`] and is
//! only ever mutated there. Everything in this module is plain data plus the
//! file picker ([`SelectedFile::open`]); no I/O happens on the network side.

use crate::error::{DeepDocError, SessionError};
use crate::progress::Progress;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

/// Extensions the file picker offers.
pub const ACCEPTED_EXTENSIONS: [&str; 4] = [".pdf", ".docx", ".csv", ".html"];

// ── Selected file ────────────────────────────────────────────────────────

/// Document formats the conversion service understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DocumentFormat {
    Pdf,
    Docx,
    Csv,
    Html,
}

impl DocumentFormat {
    /// Match a file extension (with or without the leading dot, any case).
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.trim_start_matches('.').to_ascii_lowercase().as_str() {
            "pdf" => Some(Self::Pdf),
            "docx" => Some(Self::Docx),
            "csv" => Some(Self::Csv),
            "html" => Some(Self::Html),
            _ => None,
        }
    }

    /// Guess from a file name's extension.
    pub fn from_file_name(name: &str) -> Option<Self> {
        Path::new(name)
            .extension()
            .and_then(|e| e.to_str())
            .and_then(Self::from_extension)
    }

    /// Media type sent on the multipart `file` part.
    pub fn media_type(self) -> &'static str {
        match self {
            Self::Pdf => "application/pdf",
            Self::Docx => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
            Self::Csv => "text/csv",
            Self::Html => "text/html",
        }
    }
}

/// Handle to a user-chosen file: name, size and content.
///
/// Content is reference-counted so a retry (a new submission sharing the
/// same file) never copies the whole payload.
#[derive(Clone, PartialEq, Eq)]
pub struct SelectedFile {
    name: String,
    format: Option<DocumentFormat>,
    content: Arc<[u8]>,
}

impl fmt::Debug for SelectedFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SelectedFile")
            .field("name", &self.name)
            .field("format", &self.format)
            .field("byte_size", &self.byte_size())
            .finish()
    }
}

impl SelectedFile {
    /// Wrap an in-memory payload. No extension check is applied; the server
    /// gets the final say on what it accepts.
    pub fn from_bytes(name: impl Into<String>, content: impl Into<Vec<u8>>) -> Self {
        let name = name.into();
        let content: Vec<u8> = content.into();
        let format = DocumentFormat::from_file_name(&name);
        Self {
            name,
            format,
            content: Arc::from(content),
        }
    }

    /// The file picker: read a local file restricted to
    /// [`ACCEPTED_EXTENSIONS`].
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, DeepDocError> {
        let path = path.as_ref();
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .map(str::to_string)
            .ok_or_else(|| DeepDocError::FileNotFound {
                path: path.to_path_buf(),
            })?;

        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| format!(".{e}"))
            .unwrap_or_default();
        let format = DocumentFormat::from_extension(&extension).ok_or_else(|| {
            DeepDocError::UnsupportedExtension {
                path: path.to_path_buf(),
                extension: extension.clone(),
            }
        })?;

        let content = tokio::fs::read(path)
            .await
            .map_err(|e| map_read_error(path.to_path_buf(), e))?;

        debug!("Picked {} ({} bytes)", path.display(), content.len());
        Ok(Self {
            name,
            format: Some(format),
            content: Arc::from(content),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn format(&self) -> Option<DocumentFormat> {
        self.format
    }

    pub fn byte_size(&self) -> u64 {
        self.content.len() as u64
    }

    pub fn content(&self) -> &[u8] {
        &self.content
    }

    pub(crate) fn shared_content(&self) -> Arc<[u8]> {
        Arc::clone(&self.content)
    }

    /// Media type for the upload part; unknown formats go as raw bytes.
    pub fn media_type(&self) -> &'static str {
        self.format
            .map(DocumentFormat::media_type)
            .unwrap_or("application/octet-stream")
    }
}

fn map_read_error(path: PathBuf, e: std::io::Error) -> DeepDocError {
    match e.kind() {
        std::io::ErrorKind::NotFound => DeepDocError::FileNotFound { path },
        std::io::ErrorKind::PermissionDenied => DeepDocError::PermissionDenied { path },
        _ => DeepDocError::FileReadFailed { path, source: e },
    }
}

// ── Mode ─────────────────────────────────────────────────────────────────

/// Processing path requested from the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Mode {
    /// Plain extraction, result returned inline. (default)
    #[default]
    Basic,
    /// Enhanced extraction; requires a recipient and may be delivered by email.
    Advanced,
}

impl Mode {
    pub fn is_advanced(self) -> bool {
        matches!(self, Mode::Advanced)
    }
}

// ── Incarnation ──────────────────────────────────────────────────────────

/// Monotonically increasing id of a submission within one controller.
///
/// Every asynchronous event carries the incarnation it was produced for;
/// the controller drops events whose incarnation is no longer current.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct Incarnation(u64);

impl Incarnation {
    pub fn next(self) -> Self {
        Self(self.0.wrapping_add(1))
    }
}

impl fmt::Display for Incarnation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

// ── Result ───────────────────────────────────────────────────────────────

/// Shape-specific statistics reported by the server.
///
/// The variant is decided once, from the server's type tag, when the
/// response is classified.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "shape", rename_all = "snake_case")]
pub enum FileDetails {
    /// Prose documents: PDF, DOCX, HTML (and unknown tags).
    Document { word_count: u64, image_count: u64 },
    /// Tabular documents: CSV.
    Tabular { row_count: u64, col_count: u64 },
}

/// Summary of the uploaded file as reported by the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileInfo {
    pub name: String,
    /// Raw type tag from the server, surfaced as-is for display.
    pub file_type: String,
    pub byte_size: u64,
    pub details: FileDetails,
}

impl FileInfo {
    pub fn is_tabular(&self) -> bool {
        matches!(self.details, FileDetails::Tabular { .. })
    }
}

/// How the converted Markdown reaches the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "via", rename_all = "snake_case")]
pub enum Delivery {
    /// Returned in the response. An empty string is a valid result.
    Inline { markdown: String },
    /// Sent out of band to the recipient; the server may or may not also
    /// echo the Markdown back.
    Email { markdown: Option<String> },
}

/// Payload of a successful conversion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversionResult {
    pub delivery: Delivery,
    pub file_info: Option<FileInfo>,
}

impl ConversionResult {
    /// Markdown carried by the response, if any.
    pub fn markdown(&self) -> Option<&str> {
        match &self.delivery {
            Delivery::Inline { markdown } => Some(markdown),
            Delivery::Email { markdown } => markdown.as_deref(),
        }
    }

    pub fn delivered_by_email(&self) -> bool {
        matches!(self.delivery, Delivery::Email { .. })
    }
}

// ── Outcome ──────────────────────────────────────────────────────────────

/// Where the current submission stands.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Outcome {
    /// Nothing submitted for this session yet.
    #[default]
    NotStarted,
    /// A request is in flight.
    Pending,
    Success(ConversionResult),
    Failure(SessionError),
}

impl Outcome {
    pub fn is_pending(&self) -> bool {
        matches!(self, Outcome::Pending)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Outcome::Success(_) | Outcome::Failure(_))
    }
}

// ── Session ──────────────────────────────────────────────────────────────

/// The single mutable unit of state for one conversion attempt.
#[derive(Debug, Clone, Default)]
pub struct Session {
    pub selected_file: Option<SelectedFile>,
    pub mode: Mode,
    /// Only read when `mode` is [`Mode::Advanced`].
    pub recipient_email: String,
    pub progress: Progress,
    pub outcome: Outcome,
    /// Field-local validation error; never stored in `outcome`.
    pub field_error: Option<SessionError>,
    pub incarnation: Incarnation,
}

impl Session {
    /// A fresh session for a newly picked file.
    ///
    /// The form inputs (mode toggle, recipient field) carry over; progress,
    /// outcome and any field error start clean.
    pub fn for_file(file: SelectedFile, mode: Mode, recipient_email: String, incarnation: Incarnation) -> Self {
        Self {
            selected_file: Some(file),
            mode,
            recipient_email,
            progress: Progress::default(),
            outcome: Outcome::NotStarted,
            field_error: None,
            incarnation,
        }
    }

    /// The recipient to send, present only in advanced mode.
    pub fn recipient(&self) -> Option<&str> {
        self.mode.is_advanced().then_some(self.recipient_email.as_str())
    }
}
