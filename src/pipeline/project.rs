//! Presentation projection: derive what the UI shows from a [`Session`].
//!
//! [`project`] is a pure function. Exactly one [`RenderPlan`] variant holds
//! at a time, so the error banner, the Markdown preview and the email notice
//! can never be shown together. [`project_form`] derives the state of the
//! input controls alongside it.

use crate::error::{DeepDocError, SessionError};
use crate::progress::Progress;
use crate::session::{Delivery, FileInfo, Outcome, Session, ACCEPTED_EXTENSIONS};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::info;

/// File name offered by the download action.
pub const DOWNLOAD_FILE_NAME: &str = "converted_markdown.md";

/// Media type offered by the download action.
pub const MARKDOWN_MEDIA_TYPE: &str = "text/markdown";

/// What the progress area shows while a request is in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "percent", rename_all = "snake_case")]
pub enum ProgressIndicator {
    /// Nothing sent yet.
    Hidden,
    Determinate(u8),
    /// Spinner, never a bar.
    Indeterminate,
}

/// Local download of the converted Markdown. No network involved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Download {
    pub file_name: &'static str,
    pub media_type: &'static str,
    pub contents: String,
}

impl Download {
    fn of(markdown: &str) -> Self {
        Self {
            file_name: DOWNLOAD_FILE_NAME,
            media_type: MARKDOWN_MEDIA_TYPE,
            contents: markdown.to_string(),
        }
    }

    /// Write the file into `dir` under [`DOWNLOAD_FILE_NAME`].
    pub async fn save_in(&self, dir: impl AsRef<Path>) -> Result<PathBuf, DeepDocError> {
        self.save_as(dir.as_ref().join(self.file_name)).await
    }

    /// Write to a user-supplied target.
    ///
    /// An existing directory, a path ending in a separator, or a path with
    /// no extension is treated as a directory and receives
    /// [`DOWNLOAD_FILE_NAME`]; anything else is the file itself.
    pub async fn save_to(&self, target: impl AsRef<Path>) -> Result<PathBuf, DeepDocError> {
        let target = target.as_ref();
        if names_directory(target) {
            self.save_in(target).await
        } else {
            self.save_as(target).await
        }
    }

    /// Write the file to an explicit path.
    ///
    /// Uses a temp file + rename so a crash never leaves a half-written
    /// document behind.
    pub async fn save_as(&self, path: impl AsRef<Path>) -> Result<PathBuf, DeepDocError> {
        let path = path.as_ref();
        let write_err = |source| DeepDocError::OutputWriteFailed {
            path: path.to_path_buf(),
            source,
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.map_err(write_err)?;
        }
        let tmp_path = path.with_extension("md.tmp");
        let written = match tokio::fs::write(&tmp_path, self.contents.as_bytes()).await {
            Ok(()) => tokio::fs::rename(&tmp_path, path).await,
            Err(e) => Err(e),
        };
        if let Err(e) = written {
            let _ = tokio::fs::remove_file(&tmp_path).await;
            return Err(write_err(e));
        }

        info!("Saved {} bytes to {}", self.contents.len(), path.display());
        Ok(path.to_path_buf())
    }
}

fn names_directory(target: &Path) -> bool {
    let trailing_separator = target
        .to_str()
        .and_then(|s| s.chars().last())
        .is_some_and(std::path::is_separator);
    trailing_separator || target.is_dir() || target.extension().is_none()
}

/// The two ways a successful conversion is presented.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SuccessView {
    /// Inline preview plus the download action.
    Markdown { preview: String, download: Download },
    /// "Check your email" notice.
    EmailNotice { recipient: Option<String> },
}

/// Mutually exclusive display directives for one session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum RenderPlan {
    Idle,
    Pending { progress: ProgressIndicator },
    Success {
        file_info: Option<FileInfo>,
        view: SuccessView,
    },
    Failure { banner: SessionError },
}

impl RenderPlan {
    pub fn shows_error_banner(&self) -> bool {
        matches!(self, RenderPlan::Failure { .. })
    }

    pub fn shows_progress(&self) -> bool {
        matches!(
            self,
            RenderPlan::Pending { progress } if *progress != ProgressIndicator::Hidden
        )
    }

    pub fn shows_file_info(&self) -> bool {
        matches!(self, RenderPlan::Success { file_info: Some(_), .. })
    }

    pub fn shows_markdown_preview(&self) -> bool {
        matches!(self, RenderPlan::Success { view: SuccessView::Markdown { .. }, .. })
    }

    pub fn shows_email_notice(&self) -> bool {
        matches!(self, RenderPlan::Success { view: SuccessView::EmailNotice { .. }, .. })
    }

    /// The download action, offered exactly when the preview is shown.
    pub fn download(&self) -> Option<&Download> {
        match self {
            RenderPlan::Success {
                view: SuccessView::Markdown { download, .. },
                ..
            } => Some(download),
            _ => None,
        }
    }
}

/// Derive the [`RenderPlan`] for `session`.
pub fn project(session: &Session) -> RenderPlan {
    match &session.outcome {
        Outcome::NotStarted => RenderPlan::Idle,
        Outcome::Pending => RenderPlan::Pending {
            progress: indicator(session.progress),
        },
        Outcome::Failure(err) => RenderPlan::Failure { banner: err.clone() },
        Outcome::Success(result) => {
            let view = match &result.delivery {
                Delivery::Inline { markdown } => SuccessView::Markdown {
                    preview: markdown.clone(),
                    download: Download::of(markdown),
                },
                Delivery::Email { .. } => SuccessView::EmailNotice {
                    recipient: session.recipient().map(str::to_string),
                },
            };
            RenderPlan::Success {
                file_info: result.file_info.clone(),
                view,
            }
        }
    }
}

fn indicator(progress: Progress) -> ProgressIndicator {
    match progress {
        Progress::Percent(0) => ProgressIndicator::Hidden,
        Progress::Percent(p) => ProgressIndicator::Determinate(p),
        Progress::Indeterminate => ProgressIndicator::Indeterminate,
    }
}

/// State of the input controls.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FormPlan {
    pub accepted_extensions: &'static [&'static str],
    pub selected_file: Option<String>,
    pub recipient_visible: bool,
    /// The submit control is the only admission gate for new requests.
    pub submit_enabled: bool,
    pub field_error: Option<SessionError>,
}

/// Derive the [`FormPlan`] for `session`.
pub fn project_form(session: &Session) -> FormPlan {
    FormPlan {
        accepted_extensions: &ACCEPTED_EXTENSIONS,
        selected_file: session.selected_file.as_ref().map(|f| f.name().to_string()),
        recipient_visible: session.mode.is_advanced(),
        submit_enabled: !session.outcome.is_pending(),
        field_error: session.field_error.clone(),
    }
}
