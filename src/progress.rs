//! Upload progress: the value type, the reporter transports write to, and
//! the callback trait hosts implement to observe a session.
//!
//! Inject an [`Arc<dyn UploadProgressCallback>`] via
//! [`crate::config::ClientConfigBuilder::progress_callback`] to receive
//! events as the controller applies them. Callbacks only ever see events of
//! the current submission: anything from a superseded incarnation is dropped
//! by the controller before a callback runs.
//!
//! # Example
//!
//! ```rust
//! use deepdoc_client::{ClientConfig, Progress, UploadProgressCallback};
//! use std::sync::{Arc, Mutex};
//!
//! struct Recorder {
//!     seen: Mutex<Vec<Progress>>,
//! }
//!
//! impl UploadProgressCallback for Recorder {
//!     fn on_progress(&self, progress: Progress) {
//!         self.seen.lock().unwrap().push(progress);
//!     }
//! }
//!
//! let recorder = Arc::new(Recorder { seen: Mutex::new(Vec::new()) });
//! let config = ClientConfig::builder()
//!     .progress_callback(recorder as Arc<dyn UploadProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use crate::controller::SessionEvent;
use crate::session::{Incarnation, Outcome};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Fraction of the payload handed to the connection so far.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Progress {
    /// Whole-number percentage in `0..=100`.
    Percent(u8),
    /// Total size unknown when the transfer started.
    Indeterminate,
}

impl Default for Progress {
    fn default() -> Self {
        Progress::Percent(0)
    }
}

impl Progress {
    /// `round(sent * 100 / total)`, or [`Progress::Indeterminate`] when the
    /// total is unknown or zero.
    pub fn from_bytes(sent: u64, total: Option<u64>) -> Self {
        match total {
            Some(total) if total > 0 => {
                let sent = u128::from(sent.min(total));
                let total = u128::from(total);
                let pct = (sent * 100 + total / 2) / total;
                Progress::Percent(pct.min(100) as u8)
            }
            _ => Progress::Indeterminate,
        }
    }

    /// Numeric percentage, if determinate.
    pub fn percent(self) -> Option<u8> {
        match self {
            Progress::Percent(p) => Some(p),
            Progress::Indeterminate => None,
        }
    }

    /// Whether there is anything worth drawing.
    pub fn is_started(self) -> bool {
        !matches!(self, Progress::Percent(0))
    }

    /// Whether `self` is a legal successor of `prev` (never moves backwards,
    /// never repeats).
    pub fn advances(self, prev: Progress) -> bool {
        match (prev, self) {
            (Progress::Percent(a), Progress::Percent(b)) => b > a,
            (Progress::Indeterminate, Progress::Indeterminate) => false,
            _ => true,
        }
    }
}

impl fmt::Display for Progress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Progress::Percent(p) => write!(f, "{p}%"),
            Progress::Indeterminate => f.write_str("…"),
        }
    }
}

/// Handed to an [`crate::pipeline::transport::UploadTransport`] for one
/// submission. Reports are converted to [`Progress`] values, deduplicated,
/// and queued for the controller tagged with the submission's incarnation.
#[derive(Debug)]
pub struct ProgressReporter {
    incarnation: Incarnation,
    events: mpsc::UnboundedSender<SessionEvent>,
    last: Option<Progress>,
}

impl ProgressReporter {
    pub(crate) fn new(incarnation: Incarnation, events: mpsc::UnboundedSender<SessionEvent>) -> Self {
        Self {
            incarnation,
            events,
            last: None,
        }
    }

    pub fn incarnation(&self) -> Incarnation {
        self.incarnation
    }

    /// Record that `sent` of `total` payload bytes have been handed off.
    pub fn report(&mut self, sent: u64, total: Option<u64>) {
        let progress = Progress::from_bytes(sent, total);
        if let Some(last) = self.last {
            if !progress.advances(last) {
                return;
            }
        }
        self.last = Some(progress);
        // The controller may already be gone; nothing left to inform.
        let _ = self.events.send(SessionEvent::Progress {
            incarnation: self.incarnation,
            progress,
        });
    }

    #[cfg(test)]
    fn last(&self) -> Option<Progress> {
        self.last
    }
}

/// Observer of a session's lifecycle.
///
/// All methods have default no-op implementations so callers only override
/// what they care about. Implementations must be `Send + Sync`; the
/// controller itself calls them from whichever task drives it.
pub trait UploadProgressCallback: Send + Sync {
    /// Called once when a submission passes validation and the upload starts.
    ///
    /// # Arguments
    /// * `file_name`   — name of the selected file
    /// * `total_bytes` — payload size, `None` when unknown
    fn on_upload_start(&self, file_name: &str, total_bytes: Option<u64>) {
        let _ = (file_name, total_bytes);
    }

    /// Called for every applied progress update of the current submission.
    fn on_progress(&self, progress: Progress) {
        let _ = progress;
    }

    /// Called once when the current submission reaches a terminal outcome.
    fn on_settled(&self, outcome: &Outcome) {
        let _ = outcome;
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl UploadProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::ClientConfig`].
pub type ProgressCallback = Arc<dyn UploadProgressCallback>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_bytes_rounds_to_nearest() {
        assert_eq!(Progress::from_bytes(500, Some(1000)), Progress::Percent(50));
        assert_eq!(Progress::from_bytes(1000, Some(1000)), Progress::Percent(100));
        assert_eq!(Progress::from_bytes(1, Some(3)), Progress::Percent(33));
        assert_eq!(Progress::from_bytes(2, Some(3)), Progress::Percent(67));
        assert_eq!(Progress::from_bytes(0, Some(3)), Progress::Percent(0));
    }

    #[test]
    fn from_bytes_never_exceeds_hundred() {
        assert_eq!(Progress::from_bytes(5000, Some(1000)), Progress::Percent(100));
        assert_eq!(Progress::from_bytes(u64::MAX, Some(u64::MAX)), Progress::Percent(100));
    }

    #[test]
    fn unknown_or_empty_total_is_indeterminate() {
        assert_eq!(Progress::from_bytes(10, None), Progress::Indeterminate);
        assert_eq!(Progress::from_bytes(0, Some(0)), Progress::Indeterminate);
        assert_eq!(Progress::Indeterminate.percent(), None);
    }

    #[test]
    fn advances_is_strictly_forward() {
        assert!(Progress::Percent(50).advances(Progress::Percent(0)));
        assert!(!Progress::Percent(50).advances(Progress::Percent(50)));
        assert!(!Progress::Percent(40).advances(Progress::Percent(50)));
        assert!(!Progress::Indeterminate.advances(Progress::Indeterminate));
    }

    #[test]
    fn reporter_dedups_and_tags_incarnation() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let inc = Incarnation::default().next();
        let mut reporter = ProgressReporter::new(inc, tx);

        reporter.report(100, Some(1000)); // 10
        reporter.report(104, Some(1000)); // still 10, dropped
        reporter.report(50, Some(1000)); // backwards, dropped
        reporter.report(1000, Some(1000)); // 100

        let mut seen = Vec::new();
        while let Ok(ev) = rx.try_recv() {
            match ev {
                SessionEvent::Progress { incarnation, progress } => {
                    assert_eq!(incarnation, inc);
                    seen.push(progress);
                }
                other => panic!("unexpected event {other:?}"),
            }
        }
        assert_eq!(seen, vec![Progress::Percent(10), Progress::Percent(100)]);
        assert_eq!(reporter.last(), Some(Progress::Percent(100)));
    }

    #[test]
    fn reporter_survives_dropped_receiver() {
        let (tx, rx) = mpsc::unbounded_channel();
        drop(rx);
        let mut reporter = ProgressReporter::new(Incarnation::default(), tx);
        reporter.report(1, Some(2));
        assert_eq!(reporter.last(), Some(Progress::Percent(50)));
    }

    #[test]
    fn noop_callback_does_not_panic() {
        let cb = NoopProgressCallback;
        cb.on_upload_start("a.pdf", Some(10));
        cb.on_progress(Progress::Percent(50));
        cb.on_settled(&Outcome::Pending);
    }

    #[test]
    fn arc_dyn_callback_works() {
        let cb: ProgressCallback = Arc::new(NoopProgressCallback);
        cb.on_upload_start("a.csv", None);
        cb.on_progress(Progress::Indeterminate);
    }
}
