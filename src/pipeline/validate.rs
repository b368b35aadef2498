//! Input validation: decide whether a submission may reach the network.
//!
//! Runs entirely locally. A rejection never touches the session's outcome or
//! its selected file; the controller parks it in the field-local error slot.

use crate::error::SessionError;
use crate::session::{Mode, SelectedFile};
use once_cell::sync::Lazy;
use regex::Regex;

/// `local@domain.tld`: one `@`, no whitespace, at least one dot-separated
/// label after the `@`, no empty labels.
static RECIPIENT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^\s@]+@[^\s@.]+(\.[^\s@.]+)+$").expect("static regex"));

/// Go-ahead token returned by [`validate_submission`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Proceed;

/// Check the preconditions of a submit.
///
/// The recipient is only looked at in [`Mode::Advanced`]; a stale address
/// left over from an earlier advanced attempt is ignored in basic mode.
pub fn validate_submission(
    selected_file: Option<&SelectedFile>,
    mode: Mode,
    recipient_email: &str,
) -> Result<Proceed, SessionError> {
    if selected_file.is_none() {
        return Err(SessionError::no_file_selected());
    }
    if mode.is_advanced() && !is_valid_recipient(recipient_email) {
        return Err(SessionError::invalid_recipient());
    }
    Ok(Proceed)
}

/// Syntactic check only; no lookup against real mail servers.
pub fn is_valid_recipient(addr: &str) -> bool {
    addr.is_ascii() && RECIPIENT_RE.is_match(addr)
}
