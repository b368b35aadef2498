//! # deepdoc-client
//!
//! Upload a document to a DeepDoc conversion service and get Markdown back.
//!
//! ## Why this crate?
//!
//! Uploading a file is one request, but turning it into a usable result is
//! not: input must be checked before anything leaves the machine, progress
//! has to be shown while the body streams, the answer can arrive inline or
//! by email, and failures come back as a mix of status codes and free-form
//! details. This crate owns that orchestration as a [`SessionController`]
//! so a host (the bundled `deepdoc` CLI, or any other front end) only feeds
//! it user actions and renders the [`RenderPlan`] it derives.
//!
//! ## Pipeline Overview
//!
//! ```text
//! select_file / set_mode / set_recipient
//!  │
//!  ├─ 1. Validate   file present, recipient well-formed (no network)
//!  ├─ 2. Transport  multipart POST /upload, chunked, progress events
//!  ├─ 3. Classify   status + body → Success | Failure(ErrorKind)
//!  └─ 4. Project    session → RenderPlan (banner | progress | preview | email notice)
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use deepdoc_client::{ClientConfig, SelectedFile, SessionController};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ClientConfig::builder().host("localhost").port(8000).build()?;
//!     let mut controller = SessionController::new(config)?;
//!
//!     controller.select_file(SelectedFile::open("report.pdf").await?);
//!     controller.submit()?;
//!     controller.wait_for_outcome().await;
//!
//!     if let Some(download) = controller.render_plan().download() {
//!         println!("{}", download.contents);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `deepdoc` binary (clap + anyhow + indicatif + tracing-subscriber) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! deepdoc-client = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod controller;
pub mod error;
pub mod health;
pub mod pipeline;
pub mod progress;
pub mod session;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{ClientConfig, ClientConfigBuilder};
pub use controller::{SessionController, SessionEvent};
pub use error::{DeepDocError, ErrorKind, ErrorOrigin, SessionError, SubmitError};
pub use health::check_backend;
pub use pipeline::project::{Download, FormPlan, ProgressIndicator, RenderPlan, SuccessView};
pub use pipeline::transport::{HttpTransport, TransportOutcome, UploadRequest, UploadTransport};
pub use progress::{NoopProgressCallback, Progress, ProgressCallback, ProgressReporter, UploadProgressCallback};
pub use session::{
    ConversionResult, Delivery, DocumentFormat, FileDetails, FileInfo, Incarnation, Mode, Outcome, SelectedFile,
    Session,
};
