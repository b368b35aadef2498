//! Upload transport: one multipart `POST /upload` per submission.
//!
//! The request shape is fixed by the service:
//!
//! ```text
//! POST /upload?advanced=true&receipient_email=a@b.co
//! Content-Type: multipart/form-data; boundary=…
//!
//! --…
//! Content-Disposition: form-data; name="file"; filename="report.pdf"
//! <file bytes>
//! ```
//!
//! `receipient_email` (sic) is only sent in advanced mode and must keep that
//! exact spelling. The file body is streamed in chunks so the
//! [`ProgressReporter`] sees bytes as the connection pulls them. The
//! duration bound is enforced by [`send_with_deadline`] around whichever
//! [`UploadTransport`] is in use, so a timeout is always a transport outcome
//! and never confused with a server answer.

use crate::config::ClientConfig;
use crate::error::DeepDocError;
use crate::progress::ProgressReporter;
use crate::session::{Mode, SelectedFile};
use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use reqwest::multipart::{Form, Part};
use reqwest::Url;
use std::ops::Range;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Multipart field carrying the document.
pub const FILE_FIELD: &str = "file";

/// Query flag selecting the processing path.
pub const ADVANCED_PARAM: &str = "advanced";

/// Query parameter carrying the recipient. Spelling matches the server.
pub const RECIPIENT_PARAM: &str = "receipient_email";

// ── Request ──────────────────────────────────────────────────────────────

/// Everything needed to issue the upload, fixed at submit time.
#[derive(Debug, Clone)]
pub struct UploadRequest {
    pub endpoint: Url,
    pub file: SelectedFile,
    pub advanced: bool,
    /// Present only when `advanced` is set.
    pub recipient: Option<String>,
}

impl UploadRequest {
    /// Build the request for an already-validated submission.
    pub fn new(endpoint: Url, file: SelectedFile, mode: Mode, recipient_email: &str) -> Self {
        let advanced = mode.is_advanced();
        Self {
            endpoint,
            file,
            advanced,
            recipient: advanced.then(|| recipient_email.to_string()),
        }
    }

    /// Query parameters in the order they are sent.
    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = vec![(ADVANCED_PARAM, self.advanced.to_string())];
        if let Some(ref addr) = self.recipient {
            pairs.push((RECIPIENT_PARAM, addr.clone()));
        }
        pairs
    }

    /// Endpoint with the query string applied.
    pub fn target_url(&self) -> Url {
        let mut url = self.endpoint.clone();
        {
            let mut q = url.query_pairs_mut();
            for (k, v) in self.query_pairs() {
                q.append_pair(k, &v);
            }
        }
        url
    }

    /// Payload size, `None` when there is nothing to measure against.
    pub fn total_bytes(&self) -> Option<u64> {
        let n = self.file.byte_size();
        (n > 0).then_some(n)
    }
}

// ── Outcome ──────────────────────────────────────────────────────────────

/// How the exchange settled, before any interpretation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportOutcome {
    /// The server answered (any status).
    Response { status: u16, body: Vec<u8> },
    /// The duration bound elapsed first.
    TimedOut { after: Duration },
    /// No answer for any other reason (refused, reset, DNS, TLS, …).
    Failed { reason: String },
}

impl TransportOutcome {
    /// Convenience for fakes and tests: a JSON body with the given status.
    pub fn json(status: u16, body: serde_json::Value) -> Self {
        TransportOutcome::Response {
            status,
            body: body.to_string().into_bytes(),
        }
    }
}

// ── Transport seam ───────────────────────────────────────────────────────

/// Carries one [`UploadRequest`] to the service.
///
/// Implementations report progress through `progress` and must not retry;
/// retries are always a fresh user action.
#[async_trait]
pub trait UploadTransport: Send + Sync {
    async fn upload(&self, request: UploadRequest, progress: ProgressReporter) -> TransportOutcome;
}

/// Run `transport` with a hard upper bound on total duration.
pub async fn send_with_deadline(
    transport: &dyn UploadTransport,
    request: UploadRequest,
    progress: ProgressReporter,
    limit: Duration,
) -> TransportOutcome {
    let incarnation = progress.incarnation();
    match tokio::time::timeout(limit, transport.upload(request, progress)).await {
        Ok(outcome) => outcome,
        Err(_) => {
            warn!("Upload {} exceeded {:?}, abandoning", incarnation, limit);
            TransportOutcome::TimedOut { after: limit }
        }
    }
}

// ── reqwest implementation ───────────────────────────────────────────────

/// [`UploadTransport`] over a shared `reqwest::Client`.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    chunk_size: usize,
    timeout: Duration,
}

impl HttpTransport {
    pub fn new(config: &ClientConfig) -> Result<Self, DeepDocError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| DeepDocError::HttpClient(e.to_string()))?;
        Ok(Self {
            client,
            chunk_size: config.chunk_size.max(1),
            timeout: config.timeout,
        })
    }

    fn classify_send_error(&self, e: reqwest::Error) -> TransportOutcome {
        if e.is_timeout() {
            TransportOutcome::TimedOut {
                after: self.timeout,
            }
        } else {
            TransportOutcome::Failed {
                reason: e.to_string(),
            }
        }
    }
}

#[async_trait]
impl UploadTransport for HttpTransport {
    async fn upload(&self, request: UploadRequest, progress: ProgressReporter) -> TransportOutcome {
        let url = request.target_url();
        info!(
            "Uploading {} ({} bytes) to {}",
            request.file.name(),
            request.file.byte_size(),
            request.endpoint
        );

        let total = request.file.byte_size();
        let body = progress_body(&request.file, self.chunk_size, progress);
        let part = match Part::stream_with_length(body, total)
            .file_name(request.file.name().to_string())
            .mime_str(request.file.media_type())
        {
            Ok(part) => part,
            Err(e) => {
                return TransportOutcome::Failed {
                    reason: format!("Invalid media type: {e}"),
                }
            }
        };
        let form = Form::new().part(FILE_FIELD, part);

        let response = match self.client.post(url).multipart(form).send().await {
            Ok(r) => r,
            Err(e) => return self.classify_send_error(e),
        };

        let status = response.status().as_u16();
        debug!("Upload answered with HTTP {}", status);
        match response.bytes().await {
            Ok(body) => TransportOutcome::Response {
                status,
                body: body.to_vec(),
            },
            Err(e) => self.classify_send_error(e),
        }
    }
}

/// Stream the file in `chunk_size` pieces, reporting each piece as the
/// connection pulls it.
fn progress_body(file: &SelectedFile, chunk_size: usize, mut progress: ProgressReporter) -> reqwest::Body {
    let content = file.shared_content();
    let total = content.len() as u64;
    let known_total = (total > 0).then_some(total);
    if known_total.is_none() {
        progress.report(0, None);
    }

    let chunks = stream::iter(chunk_ranges(content.len(), chunk_size)).map(move |range| {
        let end = range.end as u64;
        let chunk = content[range].to_vec();
        progress.report(end, known_total);
        Ok::<_, std::io::Error>(chunk)
    });
    reqwest::Body::wrap_stream(chunks)
}

fn chunk_ranges(len: usize, chunk_size: usize) -> impl Iterator<Item = Range<usize>> {
    let chunk_size = chunk_size.max(1);
    (0..len)
        .step_by(chunk_size)
        .map(move |start| start..(start + chunk_size).min(len))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::SessionEvent;
    use crate::session::Incarnation;
    use tokio::sync::mpsc;

    fn endpoint() -> Url {
        Url::parse("http://localhost:8000/upload").unwrap()
    }

    #[test]
    fn basic_request_has_only_advanced_flag() {
        let f = SelectedFile::from_bytes("a.pdf", vec![1u8; 4]);
        let req = UploadRequest::new(endpoint(), f, Mode::Basic, "left@over.com");
        assert_eq!(req.recipient, None);
        assert_eq!(req.target_url().as_str(), "http://localhost:8000/upload?advanced=false");
    }

    #[test]
    fn advanced_request_carries_recipient() {
        let f = SelectedFile::from_bytes("a.pdf", vec![1u8; 4]);
        let req = UploadRequest::new(endpoint(), f, Mode::Advanced, "a@b.co");
        assert_eq!(
            req.query_pairs(),
            vec![("advanced", "true".to_string()), ("receipient_email", "a@b.co".to_string())]
        );
        assert_eq!(
            req.target_url().as_str(),
            "http://localhost:8000/upload?advanced=true&receipient_email=a%40b.co"
        );
    }

    #[test]
    fn total_bytes_unknown_for_empty_payload() {
        let empty = SelectedFile::from_bytes("a.pdf", Vec::<u8>::new());
        let req = UploadRequest::new(endpoint(), empty, Mode::Basic, "");
        assert_eq!(req.total_bytes(), None);
    }

    #[test]
    fn chunk_ranges_cover_payload() {
        let r: Vec<_> = chunk_ranges(1000, 500).collect();
        assert_eq!(r, vec![0..500, 500..1000]);
        let r: Vec<_> = chunk_ranges(7, 3).collect();
        assert_eq!(r, vec![0..3, 3..6, 6..7]);
        assert_eq!(chunk_ranges(0, 3).count(), 0);
        assert_eq!(chunk_ranges(2, 0).count(), 2);
    }

    #[test]
    fn json_outcome_helper() {
        let o = TransportOutcome::json(400, serde_json::json!({"detail": "x"}));
        match o {
            TransportOutcome::Response { status, body } => {
                assert_eq!(status, 400);
                assert_eq!(body, br#"{"detail":"x"}"#.to_vec());
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    struct Stalled;

    #[async_trait]
    impl UploadTransport for Stalled {
        async fn upload(&self, _request: UploadRequest, _progress: ProgressReporter) -> TransportOutcome {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            TransportOutcome::Failed {
                reason: "unreachable".into(),
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn deadline_turns_stall_into_timeout() {
        let (tx, _rx) = mpsc::unbounded_channel::<SessionEvent>();
        let reporter = ProgressReporter::new(Incarnation::default(), tx);
        let f = SelectedFile::from_bytes("a.pdf", vec![1u8; 4]);
        let req = UploadRequest::new(endpoint(), f, Mode::Basic, "");

        let outcome = send_with_deadline(&Stalled, req, reporter, Duration::from_secs(30)).await;
        assert_eq!(
            outcome,
            TransportOutcome::TimedOut {
                after: Duration::from_secs(30)
            }
        );
    }

    #[test]
    fn http_transport_builds_from_default_config() {
        let cfg = ClientConfig::default();
        tokio_test::assert_ok!(HttpTransport::new(&cfg));
    }
}
