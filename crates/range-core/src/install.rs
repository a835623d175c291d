//! Streaming install orchestration
//!
//! One job at a time, driven by a validated state machine:
//!
//! ```text
//! Idle -> Running -> Completed | Failed | Cancelled
//! ```
//!
//! The job holds the UI lock from start to finish. Each chunk is fed to a
//! `LineDecoder`; every completed record is appended to the install log and
//! published as it arrives. Cancellation is cooperative: the token is
//! watched between chunk reads and cancelling drops the stream.

use crate::decoder::{parse_exit_code, LineDecoder};
use crate::error::{RangeError, Result};
use crate::events::{LogLine, Notice, SessionEvent};
use crate::session::Session;
use futures::StreamExt;
use range_backend::Backend;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;

/// Install job state
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobState {
    #[default]
    Idle,
    Running,
    /// Stream reached its natural end
    Completed,
    /// Request rejected or transport broke
    Failed(String),
    /// Operator cancelled
    Cancelled,
}

impl JobState {
    #[inline]
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed(_) | Self::Cancelled)
    }

    #[inline]
    #[must_use]
    pub fn is_running(&self) -> bool {
        matches!(self, Self::Running)
    }

    /// Allowed transitions; a finished job may be started again
    #[must_use]
    pub fn can_transition_to(&self, next: &JobState) -> bool {
        match (self, next) {
            (Self::Running, next) => next.is_terminal(),
            (current, Self::Running) => !current.is_running(),
            _ => false,
        }
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => f.write_str("idle"),
            Self::Running => f.write_str("running"),
            Self::Completed => f.write_str("completed"),
            Self::Failed(reason) => write!(f, "failed: {reason}"),
            Self::Cancelled => f.write_str("cancelled"),
        }
    }
}

#[derive(Debug, Default)]
struct CancelInner {
    cancelled: AtomicBool,
    notify: Notify,
}

/// Cooperative cancellation handle
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    inner: Arc<CancelInner>,
}

impl CancelToken {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation
    pub fn cancel(&self) {
        self.inner.cancelled.store(true, Ordering::Release);
        self.inner.notify.notify_waiters();
    }

    #[inline]
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::Acquire)
    }

    /// Resolves once `cancel` has been called
    pub async fn cancelled(&self) {
        loop {
            let notified = self.inner.notify.notified();
            if self.is_cancelled() {
                return;
            }
            notified.await;
        }
    }
}

/// Read position in the install log
///
/// `InstallLine` events can be dropped for a subscriber that lags behind the
/// bus. A follower treats each event as a wakeup and reads the log through a
/// cursor instead, so every record is seen once, in order.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LogCursor {
    next: usize,
}

impl LogCursor {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records appended since the previous call
    pub fn advance<B: Backend>(&mut self, session: &Session<B>) -> Vec<LogLine> {
        let lines = session.install_log_since(self.next);
        self.next += lines.len();
        lines
    }

    /// Records read so far
    #[inline]
    #[must_use]
    pub fn position(&self) -> usize {
        self.next
    }
}

/// Outcome of one install job
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallReport {
    pub state: JobState,
    /// Records in arrival order
    pub lines: Vec<String>,
    /// Code from the final `[FIN] Exit Code` record
    pub exit_code: Option<i32>,
}

impl InstallReport {
    fn new() -> Self {
        Self {
            state: JobState::Running,
            lines: Vec::new(),
            exit_code: None,
        }
    }

    #[inline]
    #[must_use]
    pub fn succeeded(&self) -> bool {
        self.state == JobState::Completed && self.exit_code.map_or(true, |c| c == 0)
    }
}

impl<B: Backend> Session<B> {
    /// Current install job state
    #[must_use]
    pub fn job_state(&self) -> JobState {
        self.job.lock().clone()
    }

    /// Records of the current or last install job
    #[must_use]
    pub fn install_log(&self) -> Vec<LogLine> {
        self.install_log.lock().clone()
    }

    /// Records from index `from` onwards
    #[must_use]
    pub fn install_log_since(&self, from: usize) -> Vec<LogLine> {
        self.install_log
            .lock()
            .get(from..)
            .map(<[LogLine]>::to_vec)
            .unwrap_or_default()
    }

    fn transition(&self, next: JobState) -> Result<()> {
        {
            let mut job = self.job.lock();
            if !job.can_transition_to(&next) {
                return Err(RangeError::InvalidTransition {
                    from: job.clone(),
                    to: next,
                });
            }
            *job = next.clone();
        }
        tracing::info!(state = %next, "install job state changed");
        self.events.publish(SessionEvent::JobStateChanged(next));
        Ok(())
    }

    fn record_line(&self, text: String, report: &mut InstallReport) {
        if let Some(code) = parse_exit_code(&text) {
            report.exit_code = Some(code);
        }
        let line = LogLine::now(text.clone());
        self.install_log.lock().push(line.clone());
        self.events.publish(SessionEvent::InstallLine(line));
        report.lines.push(text);
    }

    /// Run the install job to a terminal state
    ///
    /// Transport failures and rejections end the job as `Failed` inside the
    /// report; they are not returned as errors.
    ///
    /// # Errors
    /// `Locked` if a job already holds the UI lock
    pub async fn run_install(&self, cancel: &CancelToken) -> Result<InstallReport> {
        let _guard = self
            .lock
            .try_acquire(&self.events)
            .ok_or(RangeError::Locked)?;

        self.install_log.lock().clear();
        self.transition(JobState::Running)?;

        let mut report = InstallReport::new();
        let terminal = self.drive_install(cancel, &mut report).await;

        match &terminal {
            JobState::Completed => match report.exit_code {
                Some(0) | None => self.events.notice(Notice::info("install finished")),
                Some(code) => self.events.notice(Notice::warning(format!(
                    "install finished with exit code {code}"
                ))),
            },
            JobState::Failed(reason) => {
                self.events.notice(Notice::error(format!("install failed: {reason}")));
            }
            JobState::Cancelled => self.events.notice(Notice::warning("install cancelled")),
            JobState::Idle | JobState::Running => {}
        }

        self.transition(terminal.clone())?;
        report.state = terminal;
        Ok(report)
    }

    async fn drive_install(&self, cancel: &CancelToken, report: &mut InstallReport) -> JobState {
        if cancel.is_cancelled() {
            return JobState::Cancelled;
        }

        let mut stream = tokio::select! {
            biased;
            () = cancel.cancelled() => return JobState::Cancelled,
            started = self.backend.install_all() => match started {
                Ok(stream) => stream,
                Err(e) => return JobState::Failed(e.to_string()),
            },
        };

        let mut decoder = LineDecoder::new(self.config.stream.marker.clone());
        loop {
            let next = tokio::select! {
                biased;
                () = cancel.cancelled() => {
                    tracing::info!(pending_bytes = decoder.pending(), "install stream dropped on cancel");
                    return JobState::Cancelled;
                }
                next = stream.next() => next,
            };

            match next {
                Some(Ok(chunk)) => {
                    for record in decoder.push(&chunk) {
                        self.record_line(record, report);
                    }
                }
                Some(Err(e)) => {
                    tracing::warn!(error = %e, "install stream interrupted");
                    return JobState::Failed(e.to_string());
                }
                None => break,
            }
        }

        if let Some(record) = decoder.finish() {
            self.record_line(record, report);
        }
        JobState::Completed
    }
}
