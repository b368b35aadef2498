//! Response classification: settle a [`TransportOutcome`] into an [`Outcome`].
//!
//! Classification is driven by the status code alone, never by the wording
//! of a message:
//!
//! | Settled as                | Outcome                                          |
//! |---------------------------|--------------------------------------------------|
//! | 2xx                       | `Success` (parsed body)                          |
//! | 400                       | `UnsupportedFileType`, detail verbatim           |
//! | 500                       | `ParserFailure`, `"Parser Error: " + detail`     |
//! | any other status          | `UnexpectedServerError`, generic prefix + detail |
//! | duration bound elapsed    | `NetworkTimeout`                                 |
//! | no response, other reason | `UnknownClientError`                             |
//!
//! [`classify`] is a pure function of its input, so classifying the same
//! transport outcome twice always yields the same [`Outcome`].

use crate::error::{
    ErrorKind, SessionError, PARSER_ERROR_PREFIX, UNEXPECTED_SERVER_ERROR_PREFIX,
    UNKNOWN_CLIENT_ERROR_MESSAGE,
};
use crate::pipeline::transport::TransportOutcome;
use crate::session::{ConversionResult, Delivery, FileDetails, FileInfo, Outcome};
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};

/// Server type tag that selects the tabular shape (compared ignoring case).
pub const TABULAR_MARKER: &str = "CSV";

/// Tags the service is known to send for prose documents.
pub const DOCUMENT_MARKERS: [&str; 3] = ["PDF", "DOCX", "HTML"];

/// Used when a 400 arrives without a usable detail.
const UNSUPPORTED_FALLBACK: &str = "Unsupported file type";

/// Used when a 500 arrives without a usable detail.
const MISSING_DETAIL: &str = "no detail provided";

#[derive(Debug, Deserialize)]
struct SuccessBody {
    #[serde(default)]
    markdown: Option<String>,
    #[serde(rename = "isSentEmail", default)]
    is_sent_email: bool,
    #[serde(default)]
    file_info: Option<RawFileInfo>,
}

#[derive(Debug, Deserialize)]
struct RawFileInfo {
    #[serde(default)]
    name: String,
    #[serde(rename = "type", default)]
    file_type: String,
    #[serde(default)]
    file_size: u64,
    #[serde(default)]
    row_count: Option<u64>,
    #[serde(default)]
    col_count: Option<u64>,
    #[serde(default)]
    word_count: Option<u64>,
    #[serde(default)]
    image_count: Option<u64>,
}

/// Map a settled transport outcome to a terminal session outcome.
pub fn classify(outcome: &TransportOutcome) -> Outcome {
    match outcome {
        TransportOutcome::Response { status, body } if (200..300).contains(status) => {
            classify_success(body)
        }
        TransportOutcome::Response { status: 400, body } => {
            let detail = extract_detail(body).unwrap_or_else(|| UNSUPPORTED_FALLBACK.to_string());
            failure(ErrorKind::UnsupportedFileType, detail)
        }
        TransportOutcome::Response { status: 500, body } => {
            let detail = extract_detail(body).unwrap_or_else(|| MISSING_DETAIL.to_string());
            failure(ErrorKind::ParserFailure, format!("{PARSER_ERROR_PREFIX}{detail}"))
        }
        TransportOutcome::Response { status, body } => {
            let detail = extract_detail(body).unwrap_or_else(|| format!("HTTP {status}"));
            failure(
                ErrorKind::UnexpectedServerError,
                format!("{UNEXPECTED_SERVER_ERROR_PREFIX}{detail}"),
            )
        }
        TransportOutcome::TimedOut { after } => failure(
            ErrorKind::NetworkTimeout,
            format!(
                "The conversion service did not answer within {}. Please try again.",
                human_duration(*after)
            ),
        ),
        TransportOutcome::Failed { reason } => {
            debug!("Transport failed without a response: {}", reason);
            failure(ErrorKind::UnknownClientError, UNKNOWN_CLIENT_ERROR_MESSAGE)
        }
    }
}

fn failure(kind: ErrorKind, message: impl Into<String>) -> Outcome {
    Outcome::Failure(SessionError::new(kind, message))
}

fn classify_success(body: &[u8]) -> Outcome {
    let parsed: SuccessBody = match serde_json::from_slice(body) {
        Ok(b) => b,
        Err(e) => {
            warn!("Success response is not the expected JSON: {}", e);
            return failure(
                ErrorKind::UnexpectedServerError,
                format!("{UNEXPECTED_SERVER_ERROR_PREFIX}malformed response body"),
            );
        }
    };

    let delivery = match (parsed.is_sent_email, parsed.markdown) {
        (true, markdown) => Delivery::Email { markdown },
        (false, Some(markdown)) => Delivery::Inline { markdown },
        (false, None) => {
            return failure(
                ErrorKind::UnexpectedServerError,
                format!("{UNEXPECTED_SERVER_ERROR_PREFIX}response carried no markdown"),
            );
        }
    };

    Outcome::Success(ConversionResult {
        delivery,
        file_info: parsed.file_info.map(into_file_info),
    })
}

/// Decide the [`FileDetails`] shape from the server's type tag.
///
/// Unknown tags fall back to the document shape and keep their raw tag for
/// display.
fn into_file_info(raw: RawFileInfo) -> FileInfo {
    let details = if raw.file_type.eq_ignore_ascii_case(TABULAR_MARKER) {
        FileDetails::Tabular {
            row_count: raw.row_count.unwrap_or(0),
            col_count: raw.col_count.unwrap_or(0),
        }
    } else {
        if !DOCUMENT_MARKERS
            .iter()
            .any(|m| raw.file_type.eq_ignore_ascii_case(m))
        {
            warn!(
                "Unrecognised file type tag '{}', showing document statistics",
                raw.file_type
            );
        }
        FileDetails::Document {
            word_count: raw.word_count.unwrap_or(0),
            image_count: raw.image_count.unwrap_or(0),
        }
    };

    FileInfo {
        name: raw.name,
        file_type: raw.file_type,
        byte_size: raw.file_size,
        details,
    }
}

/// Pull the server's `detail` out of an error body.
///
/// String details are used verbatim; structured details (e.g. validation
/// error lists) are rendered as compact JSON; a non-JSON body is used as
/// plain text. Returns `None` when there is nothing to show.
fn extract_detail(body: &[u8]) -> Option<String> {
    match serde_json::from_slice::<Value>(body) {
        Ok(Value::Object(map)) => match map.get("detail") {
            Some(Value::String(s)) => Some(s.clone()),
            Some(Value::Null) | None => None,
            Some(other) => Some(other.to_string()),
        },
        Ok(_) => None,
        Err(_) => {
            let text = String::from_utf8_lossy(body);
            let text = text.trim();
            (!text.is_empty()).then(|| text.to_string())
        }
    }
}

fn human_duration(d: Duration) -> String {
    if d.subsec_millis() == 0 {
        format!("{}s", d.as_secs())
    } else {
        format!("{}ms", d.as_millis())
    }
}
