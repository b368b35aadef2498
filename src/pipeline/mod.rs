//! Pipeline stages for one upload-and-convert submission.
//!
//! Each submodule implements exactly one step. Only the transport does I/O;
//! the other three are pure functions over plain data, which keeps them
//! testable without a server.
//!
//! ## Data Flow
//!
//! ```text
//! validate ──▶ transport ──▶ classify ──▶ project
//! (local)     (multipart)   (status →    (session →
//!              + progress    outcome)     render plan)
//! ```
//!
//! 1. [`validate`]  — file present; recipient well-formed in advanced mode;
//!    A rejection never reaches the network.
//! 2. [`transport`] — one `POST /upload`, streamed in chunks for progress,
//!    bounded by the configured timeout
//! 3. [`classify`]  — fold status and body into the closed [`crate::error::ErrorKind`]
//!    taxonomy or a [`crate::session::ConversionResult`]
//! 4. [`project`]   — decide which panels the UI shows; no I/O

pub mod classify;
pub mod project;
pub mod transport;
pub mod validate;
