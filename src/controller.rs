//! The session controller: single owner of the [`Session`] state.
//!
//! ## Lifecycle
//!
//! ```text
//! select_file ──▶ NotStarted ──submit──▶ Pending ──Settled──▶ Success | Failure
//!      ▲                                   │  ▲                    │
//!      │                                   │  └── Progress ─┘      │
//!      └───────────── (any state) ─────────┴───── submit (retry) ◀─┘
//! ```
//!
//! The controller is driven through `&mut self`. [`SessionController::submit`]
//! spawns the upload on the tokio runtime; the task only ever talks back
//! through [`SessionEvent`]s, each tagged with the [`Incarnation`] it was
//! produced for. [`SessionController::handle_event`] discards anything whose
//! incarnation is no longer current, so a slow response to an abandoned
//! submission can never overwrite a newer one.
//!
//! Picking a new file while a request is pending aborts the in-flight task
//! as well; the incarnation guard catches whatever it had already queued.

use crate::config::ClientConfig;
use crate::error::{DeepDocError, SessionError, SubmitError};
use crate::pipeline::classify::classify;
use crate::pipeline::project::{project, project_form, FormPlan, RenderPlan};
use crate::pipeline::transport::{send_with_deadline, HttpTransport, TransportOutcome, UploadRequest, UploadTransport};
use crate::pipeline::validate::validate_submission;
use crate::progress::{Progress, ProgressReporter};
use crate::session::{Incarnation, Mode, Outcome, SelectedFile, Session};
use reqwest::Url;
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Message from an upload task back to its controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// More of the payload has been handed to the connection.
    Progress { incarnation: Incarnation, progress: Progress },
    /// The exchange finished, one way or another. Always the last event of
    /// its incarnation.
    Settled { incarnation: Incarnation, outcome: TransportOutcome },
}

impl SessionEvent {
    pub fn incarnation(&self) -> Incarnation {
        match self {
            SessionEvent::Progress { incarnation, .. } | SessionEvent::Settled { incarnation, .. } => *incarnation,
        }
    }
}

/// Orchestrates validate → transport → classify for one session at a time
/// and exposes the projected view of the result.
pub struct SessionController {
    config: ClientConfig,
    endpoint: Url,
    transport: Arc<dyn UploadTransport>,
    session: Session,
    events_tx: mpsc::UnboundedSender<SessionEvent>,
    events_rx: mpsc::UnboundedReceiver<SessionEvent>,
    in_flight: Option<JoinHandle<()>>,
}

impl std::fmt::Debug for SessionController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionController")
            .field("endpoint", &self.endpoint.as_str())
            .field("session", &self.session)
            .field("in_flight", &self.in_flight.is_some())
            .finish()
    }
}

impl SessionController {
    /// Controller talking to the configured service over HTTP.
    pub fn new(config: ClientConfig) -> Result<Self, DeepDocError> {
        let transport = HttpTransport::new(&config)?;
        Self::with_transport(config, Arc::new(transport))
    }

    /// Controller using a caller-supplied transport.
    pub fn with_transport(config: ClientConfig, transport: Arc<dyn UploadTransport>) -> Result<Self, DeepDocError> {
        let endpoint = config.upload_url()?;
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Ok(Self {
            config,
            endpoint,
            transport,
            session: Session::default(),
            events_tx,
            events_rx,
            in_flight: None,
        })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Current session state (read-only).
    pub fn session(&self) -> &Session {
        &self.session
    }

    /// What the result area should show right now.
    pub fn render_plan(&self) -> RenderPlan {
        project(&self.session)
    }

    /// What the input form should show right now.
    pub fn form_plan(&self) -> FormPlan {
        project_form(&self.session)
    }

    /// Start a new session for `file`.
    ///
    /// Any pending request is abandoned. The mode and recipient carry over;
    /// everything else resets.
    pub fn select_file(&mut self, file: SelectedFile) {
        if self.cancel_in_flight() {
            info!("New file selected, abandoning upload {}", self.session.incarnation);
        }
        let incarnation = self.session.incarnation.next();
        let mode = self.session.mode;
        let recipient = std::mem::take(&mut self.session.recipient_email);
        debug!("Session {} starts with {:?}", incarnation, file);
        self.session = Session::for_file(file, mode, recipient, incarnation);
    }

    pub fn set_mode(&mut self, mode: Mode) {
        self.session.mode = mode;
    }

    pub fn set_recipient(&mut self, recipient_email: impl Into<String>) {
        self.session.recipient_email = recipient_email.into();
    }

    /// Validate and, if allowed, launch the upload.
    ///
    /// Returns the incarnation of the new submission. A validation failure
    /// lands in the session's `field_error` and leaves the outcome
    /// untouched; outside a tokio runtime nothing changes and
    /// [`SubmitError::NoRuntime`] is returned.
    pub fn submit(&mut self) -> Result<Incarnation, SubmitError> {
        if self.session.outcome.is_pending() {
            return Err(SubmitError::Busy);
        }
        let runtime = Handle::try_current().map_err(|_| SubmitError::NoRuntime)?;

        let checked = validate_submission(
            self.session.selected_file.as_ref(),
            self.session.mode,
            &self.session.recipient_email,
        )
        .and_then(|_| self.session.selected_file.clone().ok_or_else(SessionError::no_file_selected));
        let file = match checked {
            Ok(file) => file,
            Err(e) => {
                debug!("Submission rejected locally: {}", e);
                self.session.field_error = Some(e.clone());
                return Err(SubmitError::Invalid(e));
            }
        };

        let incarnation = self.session.incarnation.next();
        self.session.incarnation = incarnation;
        self.session.outcome = Outcome::Pending;
        self.session.progress = Progress::default();
        self.session.field_error = None;

        let request = UploadRequest::new(
            self.endpoint.clone(),
            file,
            self.session.mode,
            &self.session.recipient_email,
        );
        info!(
            "Submitting {} as {} ({:?} mode)",
            request.file.name(),
            incarnation,
            self.session.mode
        );
        if let Some(ref cb) = self.config.progress_callback {
            cb.on_upload_start(request.file.name(), request.total_bytes());
        }

        let reporter = ProgressReporter::new(incarnation, self.events_tx.clone());
        let transport = Arc::clone(&self.transport);
        let events = self.events_tx.clone();
        let limit = self.config.timeout;
        self.in_flight = Some(runtime.spawn(async move {
            let outcome = send_with_deadline(transport.as_ref(), request, reporter, limit).await;
            let _ = events.send(SessionEvent::Settled { incarnation, outcome });
        }));

        Ok(incarnation)
    }

    /// Apply one event. Returns whether it changed the session.
    pub fn handle_event(&mut self, event: SessionEvent) -> bool {
        if event.incarnation() != self.session.incarnation {
            debug!(
                "Dropping event of {} (current is {})",
                event.incarnation(),
                self.session.incarnation
            );
            return false;
        }
        if !self.session.outcome.is_pending() {
            return false;
        }

        match event {
            SessionEvent::Progress { progress, .. } => {
                if !progress.advances(self.session.progress) {
                    return false;
                }
                self.session.progress = progress;
                if let Some(ref cb) = self.config.progress_callback {
                    cb.on_progress(progress);
                }
            }
            SessionEvent::Settled { outcome, .. } => {
                let outcome = classify(&outcome);
                match outcome {
                    Outcome::Success(ref r) => info!(
                        "Upload {} succeeded ({})",
                        self.session.incarnation,
                        if r.delivered_by_email() { "email delivery" } else { "inline" }
                    ),
                    Outcome::Failure(ref e) => warn!("Upload {} failed: {}: {}", self.session.incarnation, e.kind, e),
                    _ => {}
                }
                self.session.outcome = outcome;
                self.in_flight = None;
                if let Some(ref cb) = self.config.progress_callback {
                    cb.on_settled(&self.session.outcome);
                }
            }
        }
        true
    }

    /// Next event from the upload task, or `None` when nothing is in flight
    /// and nothing is queued.
    pub async fn next_event(&mut self) -> Option<SessionEvent> {
        loop {
            let Some(task) = self.in_flight.as_mut() else {
                return self.events_rx.try_recv().ok();
            };
            tokio::select! {
                biased;
                event = self.events_rx.recv() => return event,
                joined = task => {
                    self.in_flight = None;
                    if let Err(e) = joined {
                        if e.is_panic() {
                            warn!("Upload task {} panicked", self.session.incarnation);
                            return Some(SessionEvent::Settled {
                                incarnation: self.session.incarnation,
                                outcome: TransportOutcome::Failed {
                                    reason: "upload task panicked".to_string(),
                                },
                            });
                        }
                    }
                }
            }
        }
    }

    /// Drive events until the current submission settles.
    pub async fn wait_for_outcome(&mut self) -> &Outcome {
        while self.session.outcome.is_pending() {
            match self.next_event().await {
                Some(event) => {
                    self.handle_event(event);
                }
                None => {
                    warn!("Upload {} ended without settling", self.session.incarnation);
                    break;
                }
            }
        }
        &self.session.outcome
    }

    fn cancel_in_flight(&mut self) -> bool {
        match self.in_flight.take() {
            Some(task) => {
                task.abort();
                true
            }
            None => false,
        }
    }
}

impl Drop for SessionController {
    fn drop(&mut self) {
        self.cancel_in_flight();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::progress::UploadProgressCallback;
    use crate::session::FileDetails;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;
    use tokio::sync::Notify;

    /// Reports a fixed list of `(sent, total)` steps, then answers.
    struct Scripted {
        steps: Vec<(u64, Option<u64>)>,
        answer: TransportOutcome,
        calls: AtomicUsize,
        last_request: Mutex<Option<UploadRequest>>,
    }

    impl Scripted {
        fn new(steps: Vec<(u64, Option<u64>)>, answer: TransportOutcome) -> Arc<Self> {
            Arc::new(Self {
                steps,
                answer,
                calls: AtomicUsize::new(0),
                last_request: Mutex::new(None),
            })
        }

        fn answering(answer: TransportOutcome) -> Arc<Self> {
            Self::new(Vec::new(), answer)
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl UploadTransport for Scripted {
        async fn upload(&self, request: UploadRequest, mut progress: ProgressReporter) -> TransportOutcome {
            self.calls.fetch_add(1, Ordering::SeqCst);
            *self.last_request.lock().unwrap() = Some(request);
            for &(sent, total) in &self.steps {
                progress.report(sent, total);
            }
            self.answer.clone()
        }
    }

    /// Holds every request until released.
    struct Gated {
        release: Notify,
        answer: TransportOutcome,
    }

    #[async_trait]
    impl UploadTransport for Gated {
        async fn upload(&self, _request: UploadRequest, _progress: ProgressReporter) -> TransportOutcome {
            self.release.notified().await;
            self.answer.clone()
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

    #[derive(Default)]
    struct Recorder {
        log: Mutex<Vec<String>>,
    }

    impl UploadProgressCallback for Recorder {
        fn on_upload_start(&self, file_name: &str, total_bytes: Option<u64>) {
            self.log.lock().unwrap().push(format!("start {file_name} {total_bytes:?}"));
        }
        fn on_progress(&self, progress: Progress) {
            self.log.lock().unwrap().push(format!("progress {progress}"));
        }
        fn on_settled(&self, outcome: &Outcome) {
            let label = match outcome {
                Outcome::Success(_) => "success".to_string(),
                Outcome::Failure(e) => format!("failure {}", e.kind),
                other => format!("{other:?}"),
            };
            self.log.lock().unwrap().push(format!("settled {label}"));
        }
    }

    fn ok_body() -> TransportOutcome {
        TransportOutcome::json(
            200,
            json!({
                "markdown": "# Hi",
                "isSentEmail": false,
                "file_info": {"name": "t.csv", "type": "CSV", "file_size": 1000, "row_count": 3, "col_count": 2}
            }),
        )
    }

    fn controller(transport: Arc<dyn UploadTransport>) -> SessionController {
        SessionController::with_transport(ClientConfig::default(), transport).unwrap()
    }

    fn pdf() -> SelectedFile {
        SelectedFile::from_bytes("a.pdf", vec![7u8; 1000])
    }

    #[tokio::test]
    async fn submit_without_file_issues_no_request() {
        let transport = Scripted::answering(ok_body());
        let mut c = controller(transport.clone());

        let err = c.submit().unwrap_err();
        assert!(matches!(err, SubmitError::Invalid(ref e) if e.kind == ErrorKind::NoFileSelected));
        assert_eq!(c.session().field_error.as_ref().map(|e| e.kind), Some(ErrorKind::NoFileSelected));
        assert_eq!(c.session().outcome, Outcome::NotStarted);
        assert!(c.next_event().await.is_none());
        assert_eq!(transport.calls(), 0);
    }

    #[test]
    fn submit_outside_runtime_is_refused() {
        let transport = Scripted::answering(ok_body());
        let mut c = controller(transport.clone());
        c.select_file(pdf());
        let before = c.session().incarnation;

        assert!(matches!(c.submit(), Err(SubmitError::NoRuntime)));
        assert_eq!(c.session().outcome, Outcome::NotStarted);
        assert_eq!(c.session().incarnation, before);
        assert_eq!(transport.calls(), 0);
    }

    #[tokio::test]
    async fn advanced_mode_requires_valid_recipient() {
        let transport = Scripted::answering(TransportOutcome::json(200, json!({"isSentEmail": true})));
        let mut c = controller(transport.clone());
        c.select_file(pdf());
        c.set_mode(Mode::Advanced);
        c.set_recipient("not-an-email");

        let err = c.submit().unwrap_err();
        assert!(matches!(err, SubmitError::Invalid(ref e) if e.kind == ErrorKind::InvalidRecipient));
        assert_eq!(c.session().outcome, Outcome::NotStarted);
        assert!(c.session().selected_file.is_some());
        assert_eq!(transport.calls(), 0);

        c.set_recipient("a@b.co");
        c.submit().unwrap();
        assert!(c.session().field_error.is_none());
        assert!(c.wait_for_outcome().await.is_terminal());
        assert_eq!(transport.calls(), 1);

        let sent = transport.last_request.lock().unwrap().take().unwrap();
        assert!(sent.advanced);
        assert_eq!(sent.recipient.as_deref(), Some("a@b.co"));
        assert!(c.render_plan().shows_email_notice());
    }

    #[tokio::test]
    async fn progress_then_success() {
        let recorder = Arc::new(Recorder::default());
        let config = ClientConfig::builder()
            .progress_callback(recorder.clone() as Arc<dyn UploadProgressCallback>)
            .build()
            .unwrap();
        let transport = Scripted::new(vec![(500, Some(1000)), (1000, Some(1000))], ok_body());
        let mut c = SessionController::with_transport(config, transport).unwrap();
        c.select_file(pdf());
        c.submit().unwrap();
        assert!(c.session().outcome.is_pending());
        assert!(!c.form_plan().submit_enabled);

        let outcome = c.wait_for_outcome().await.clone();
        let result = match outcome {
            Outcome::Success(r) => r,
            other => panic!("expected success, got {other:?}"),
        };
        assert_eq!(result.markdown(), Some("# Hi"));
        let info = result.file_info.unwrap();
        assert_eq!(info.details, FileDetails::Tabular { row_count: 3, col_count: 2 });

        assert_eq!(
            *recorder.log.lock().unwrap(),
            vec![
                "start a.pdf Some(1000)".to_string(),
                "progress 50%".to_string(),
                "progress 100%".to_string(),
                "settled success".to_string(),
            ]
        );
        let plan = c.render_plan();
        assert!(plan.shows_markdown_preview());
        assert!(!plan.shows_email_notice());
        assert!(!plan.shows_error_banner());
    }

    #[tokio::test]
    async fn server_rejection_becomes_failure() {
        let transport = Scripted::answering(TransportOutcome::json(400, json!({"detail": "bad type"})));
        let mut c = controller(transport);
        c.select_file(pdf());
        c.submit().unwrap();

        match c.wait_for_outcome().await {
            Outcome::Failure(e) => {
                assert_eq!(e.kind, ErrorKind::UnsupportedFileType);
                assert_eq!(e.message, "bad type");
            }
            other => panic!("expected failure, got {other:?}"),
        }
        assert!(c.render_plan().shows_error_banner());
        assert!(c.form_plan().submit_enabled);
    }

    #[tokio::test]
    async fn second_submit_while_pending_is_busy() {
        let gate = Arc::new(Gated {
            release: Notify::new(),
            answer: ok_body(),
        });
        let mut c = controller(gate.clone());
        c.select_file(pdf());
        let first = c.submit().unwrap();

        assert!(matches!(c.submit(), Err(SubmitError::Busy)));
        assert_eq!(c.session().incarnation, first);

        gate.release.notify_one();
        assert!(matches!(c.wait_for_outcome().await, Outcome::Success(_)));
    }

    #[tokio::test]
    async fn stale_events_are_ignored() {
        let gate = Arc::new(Gated {
            release: Notify::new(),
            answer: ok_body(),
        });
        let mut c = controller(gate.clone());
        c.select_file(pdf());
        let old = c.submit().unwrap();

        c.select_file(SelectedFile::from_bytes("b.docx", vec![1u8; 10]));
        assert_eq!(c.session().outcome, Outcome::NotStarted);
        assert_eq!(c.session().progress, Progress::Percent(0));

        let late = SessionEvent::Settled {
            incarnation: old,
            outcome: TransportOutcome::json(500, json!({"detail": "late"})),
        };
        assert!(!c.handle_event(late));
        assert!(!c.handle_event(SessionEvent::Progress {
            incarnation: old,
            progress: Progress::Percent(90),
        }));
        assert_eq!(c.session().outcome, Outcome::NotStarted);
        assert_eq!(c.session().selected_file.as_ref().map(|f| f.name()), Some("b.docx"));
        // The abandoned task was aborted, so nothing is left to drain.
        assert!(c.next_event().await.is_none());
    }

    #[tokio::test]
    async fn late_response_never_overwrites_newer_submission() {
        let transport = Scripted::answering(TransportOutcome::json(400, json!({"detail": "first"})));
        let mut c = controller(transport);
        c.select_file(pdf());
        let first = c.submit().unwrap();
        c.wait_for_outcome().await;

        let second = c.submit().unwrap();
        assert!(second > first);
        c.wait_for_outcome().await;

        let stale = SessionEvent::Settled {
            incarnation: first,
            outcome: ok_body(),
        };
        assert!(!c.handle_event(stale));
        assert!(matches!(c.session().outcome, Outcome::Failure(_)));
    }

    #[tokio::test]
    async fn progress_after_settle_is_ignored() {
        let mut c = controller(Scripted::answering(ok_body()));
        c.select_file(pdf());
        let inc = c.submit().unwrap();
        c.wait_for_outcome().await;

        let before = c.session().progress;
        assert!(!c.handle_event(SessionEvent::Progress {
            incarnation: inc,
            progress: Progress::Percent(99),
        }));
        assert_eq!(c.session().progress, before);
    }

    #[tokio::test]
    async fn empty_file_shows_indeterminate_progress() {
        let transport = Scripted::new(vec![(0, None)], ok_body());
        let mut c = controller(transport);
        c.select_file(SelectedFile::from_bytes("empty.html", Vec::<u8>::new()));
        c.submit().unwrap();

        let first = c.next_event().await.unwrap();
        assert!(c.handle_event(first));
        assert_eq!(c.session().progress, Progress::Indeterminate);
        assert_eq!(
            c.render_plan(),
            RenderPlan::Pending {
                progress: crate::pipeline::project::ProgressIndicator::Indeterminate
            }
        );
        c.wait_for_outcome().await;
    }

    #[tokio::test(start_paused = true)]
    async fn stalled_upload_times_out() {
        let config = ClientConfig::builder().timeout(Duration::from_secs(30)).build().unwrap();
        let mut c = SessionController::with_transport(config, Arc::new(Stalled)).unwrap();
        c.select_file(pdf());
        c.submit().unwrap();

        match c.wait_for_outcome().await {
            Outcome::Failure(e) => assert_eq!(e.kind, ErrorKind::NetworkTimeout),
            other => panic!("expected timeout, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn new_file_keeps_form_inputs_and_resets_the_rest() {
        let mut c = controller(Scripted::answering(TransportOutcome::json(200, json!({"isSentEmail": true}))));
        c.select_file(pdf());
        c.set_mode(Mode::Advanced);
        c.set_recipient("x@y.io");
        c.submit().unwrap();
        c.wait_for_outcome().await;
        assert!(c.session().outcome.is_terminal());

        c.select_file(SelectedFile::from_bytes("next.csv", vec![1u8; 3]));
        let s = c.session();
        assert_eq!(s.mode, Mode::Advanced);
        assert_eq!(s.recipient_email, "x@y.io");
        assert_eq!(s.outcome, Outcome::NotStarted);
        assert_eq!(s.progress, Progress::Percent(0));
        assert!(s.field_error.is_none());
        assert_eq!(c.render_plan(), RenderPlan::Idle);
    }

    #[tokio::test]
    async fn panicking_transport_settles_as_client_error() {
        struct Exploding;

        #[async_trait]
        impl UploadTransport for Exploding {
            async fn upload(&self, _request: UploadRequest, _progress: ProgressReporter) -> TransportOutcome {
                panic!("boom");
            }
        }

        let mut c = controller(Arc::new(Exploding));
        c.select_file(pdf());
        c.submit().unwrap();
        match c.wait_for_outcome().await {
            Outcome::Failure(e) => assert_eq!(e.kind, ErrorKind::UnknownClientError),
            other => panic!("expected failure, got {other:?}"),
        }
    }
}
