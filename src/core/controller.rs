use serde::Serialize;
use thiserror::Error;

use crate::core::auth::AuthUser;
use crate::core::session::{SessionStats, StudySession};

/// The single in-flight-operation marker. While any non-idle marker is set
/// the controller refuses to begin another triggered action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PendingAction {
    #[default]
    Idle,
    Starting,
    Ending,
    Summarizing,
}

impl PendingAction {
    pub fn is_idle(self) -> bool {
        self == PendingAction::Idle
    }

    pub fn label(self) -> Option<&'static str> {
        match self {
            PendingAction::Idle => None,
            PendingAction::Starting => Some("Starting session…"),
            PendingAction::Ending => Some("Ending session…"),
            PendingAction::Summarizing => Some("Fetching AI insights…"),
        }
    }
}

/// A rejected transition. These map to disabled actions in the UI rather
/// than error banners; no network request is issued for any of them.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransitionError {
    #[error("another action is still in flight")]
    ActionPending,
    #[error("name is required")]
    MissingName,
    #[error("subject is required")]
    MissingSubject,
    #[error("focus level must be between 1 and 5")]
    InvalidFocus,
    #[error("session id is required")]
    MissingSessionId,
    #[error("no active session to cancel")]
    NothingToCancel,
    #[error("no sessions to summarize")]
    NoSessions,
}

/// Start-form input as the user typed it. Validated by `begin_start`.
#[derive(Debug, Clone, Default)]
pub struct StartForm {
    pub name: String,
    pub subject: String,
    pub focus_level: Option<u8>,
}

/// Wire payload for `POST /study/start`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StartPayload {
    pub name: String,
    pub subject: String,
    pub focus_level: u8,
    pub user_id: Option<String>,
}

/// Wire payload for `POST /study/end`. Concepts and test score are always
/// empty/null: this client does not collect post-session detail yet.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EndPayload {
    pub session_id: String,
    pub duration_minutes: u64,
    pub concepts_covered: Vec<String>,
    pub test_score: Option<f64>,
}

/// How an AI-summary request failed. The two classes surface different
/// fallback messages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SummaryFailure {
    /// The backend answered with a non-success status, possibly carrying an
    /// error payload.
    Server(Option<String>),
    /// The request never completed (connection refused, timeout, ...).
    Transport,
}

impl SummaryFailure {
    /// The fallback text shown in place of a summary.
    pub fn into_message(self) -> String {
        match self {
            SummaryFailure::Server(Some(message)) => message,
            SummaryFailure::Server(None) => "Failed to get AI summary".to_string(),
            SummaryFailure::Transport => "Network error".to_string(),
        }
    }
}

/// Client-side session-lifecycle state machine.
///
/// Owns every piece of mutable dashboard state and exposes pure transition
/// functions plus read-only projections, so the whole lifecycle can be
/// exercised without a terminal or a network. The callers (TUI event loop,
/// CLI handlers) perform the actual HTTP round trips: each remote operation
/// is split into a `begin_*` transition that validates preconditions and
/// yields the wire payload, and `*_succeeded` / `*_failed` transitions that
/// apply the outcome.
///
/// The elapsed counter is a client-side approximation driven by a one-second
/// tick; the authoritative duration is whatever the server computes at end
/// time.
#[derive(Debug, Default)]
pub struct SessionController {
    pending: PendingAction,
    running: bool,
    elapsed_seconds: u64,
    active_session: Option<String>,
    last_session: Option<String>,
    sessions: Vec<StudySession>,
    stats: SessionStats,
    ai_summary: Option<String>,
    error: Option<String>,
    notice: Option<String>,
    user: Option<AuthUser>,
}

impl SessionController {
    pub fn new() -> Self {
        Self::default()
    }

    // --- start -----------------------------------------------------------

    /// Validate the start form and mark a start in flight. Returns the wire
    /// payload to POST; a rejection means no request may be issued.
    pub fn begin_start(&mut self, form: &StartForm) -> Result<StartPayload, TransitionError> {
        if !self.pending.is_idle() {
            return Err(TransitionError::ActionPending);
        }
        let name = form.name.trim();
        if name.is_empty() {
            return Err(TransitionError::MissingName);
        }
        let subject = form.subject.trim();
        if subject.is_empty() {
            return Err(TransitionError::MissingSubject);
        }
        let focus_level = match form.focus_level {
            Some(level @ 1..=5) => level,
            _ => return Err(TransitionError::InvalidFocus),
        };

        self.error = None;
        self.pending = PendingAction::Starting;
        Ok(StartPayload {
            name: name.to_string(),
            subject: subject.to_string(),
            focus_level,
            user_id: self.user.as_ref().map(|u| u.uid.clone()),
        })
    }

    /// The server confirmed the start and assigned an id. The session is now
    /// running with a fresh elapsed counter; the caller should follow up
    /// with a fetch-all.
    pub fn start_succeeded(&mut self, id: impl Into<String>) {
        let id = id.into();
        self.active_session = Some(id.clone());
        self.last_session = Some(id);
        self.running = true;
        self.elapsed_seconds = 0;
        self.notice = Some("Session started".to_string());
        self.pending = PendingAction::Idle;
    }

    pub fn start_failed(&mut self, message: impl Into<String>) {
        self.error = Some(message.into());
        self.pending = PendingAction::Idle;
    }

    // --- end -------------------------------------------------------------

    /// Mark an end in flight for `session_id`. Running state flips off
    /// immediately (optimistic: ticking stops before the server confirms)
    /// and the submitted duration is the elapsed time rounded to the nearest
    /// whole minute, never less than one.
    pub fn begin_end(&mut self, session_id: &str) -> Result<EndPayload, TransitionError> {
        if !self.pending.is_idle() {
            return Err(TransitionError::ActionPending);
        }
        let session_id = session_id.trim();
        if session_id.is_empty() {
            return Err(TransitionError::MissingSessionId);
        }

        self.error = None;
        self.running = false;
        self.last_session = Some(session_id.to_string());
        self.pending = PendingAction::Ending;
        Ok(EndPayload {
            session_id: session_id.to_string(),
            duration_minutes: estimate_minutes(self.elapsed_seconds),
            concepts_covered: Vec::new(),
            test_score: None,
        })
    }

    pub fn end_succeeded(&mut self) {
        self.notice = Some("Session ended".to_string());
        self.pending = PendingAction::Idle;
    }

    /// A failed end performs no rollback: running stays off and the server
    /// record may still be open. Recovery is a manual reload.
    pub fn end_failed(&mut self, message: impl Into<String>) {
        self.error = Some(message.into());
        self.pending = PendingAction::Idle;
    }

    // --- cancel ----------------------------------------------------------

    /// Abandon local tracking of the active session. Local-only: any record
    /// already created server-side remains open there.
    pub fn cancel(&mut self) -> Result<(), TransitionError> {
        if matches!(self.pending, PendingAction::Starting | PendingAction::Ending) {
            return Err(TransitionError::ActionPending);
        }
        if self.active_session.is_none() {
            return Err(TransitionError::NothingToCancel);
        }
        self.running = false;
        self.elapsed_seconds = 0;
        self.active_session = None;
        Ok(())
    }

    // --- fetch-all -------------------------------------------------------

    /// Replace the cached list and recompute aggregates. Always clears the
    /// pending marker, which is what returns the controller to rest after a
    /// start/end-triggered refresh.
    pub fn sessions_loaded(&mut self, sessions: Vec<StudySession>) {
        self.stats = SessionStats::from_sessions(&sessions);
        self.sessions = sessions;
        self.notice = Some("Sessions loaded".to_string());
        self.pending = PendingAction::Idle;
    }

    /// Keep the previous cache on a failed fetch.
    pub fn load_failed(&mut self, message: impl Into<String>) {
        self.error = Some(message.into());
        self.pending = PendingAction::Idle;
    }

    // --- AI summary ------------------------------------------------------

    /// Mark a summary request in flight and yield the full cached list to
    /// send.
    pub fn begin_summary(&mut self) -> Result<Vec<StudySession>, TransitionError> {
        if !self.pending.is_idle() {
            return Err(TransitionError::ActionPending);
        }
        if self.sessions.is_empty() {
            return Err(TransitionError::NoSessions);
        }
        self.error = None;
        self.pending = PendingAction::Summarizing;
        Ok(self.sessions.clone())
    }

    pub fn summary_succeeded(&mut self, summary: Option<String>) {
        self.ai_summary = Some(
            summary
                .filter(|s| !s.trim().is_empty())
                .unwrap_or_else(|| "No summary".to_string()),
        );
        self.pending = PendingAction::Idle;
    }

    /// Store a fallback message in place of the summary, keeping the two
    /// failure classes distinguishable.
    pub fn summary_failed(&mut self, failure: SummaryFailure) {
        self.ai_summary = Some(failure.into_message());
        self.pending = PendingAction::Idle;
    }

    // --- tick ------------------------------------------------------------

    /// One-second tick. Increments the elapsed counter by exactly one while
    /// running; a no-op afterwards, so a tick that was already scheduled
    /// when the session stopped contributes nothing.
    pub fn tick(&mut self) -> bool {
        if self.running {
            self.elapsed_seconds += 1;
        }
        self.running
    }

    // --- identity --------------------------------------------------------

    pub fn signed_in(&mut self, user: AuthUser) {
        self.notice = Some(format!("Signed in as {}", user.display_name));
        self.user = Some(user);
    }

    pub fn signed_out(&mut self) {
        self.user = None;
        self.notice = Some("Signed out".to_string());
    }

    pub fn auth_failed(&mut self, message: impl Into<String>) {
        self.error = Some(message.into());
    }

    // --- projections -----------------------------------------------------

    pub fn pending(&self) -> PendingAction {
        self.pending
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn elapsed_seconds(&self) -> u64 {
        self.elapsed_seconds
    }

    pub fn active_session(&self) -> Option<&str> {
        self.active_session.as_deref()
    }

    /// The most recently referenced session id (assigned on start, or
    /// whatever the user last submitted to end).
    pub fn last_session(&self) -> Option<&str> {
        self.last_session.as_deref()
    }

    pub fn sessions(&self) -> &[StudySession] {
        &self.sessions
    }

    pub fn stats(&self) -> SessionStats {
        self.stats
    }

    pub fn ai_summary(&self) -> Option<&str> {
        self.ai_summary.as_deref()
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn notice(&self) -> Option<&str> {
        self.notice.as_deref()
    }

    pub fn user(&self) -> Option<&AuthUser> {
        self.user.as_ref()
    }
}

/// Elapsed seconds -> whole minutes, round half up, floor of one.
fn estimate_minutes(elapsed_seconds: u64) -> u64 {
    ((elapsed_seconds + 30) / 60).max(1)
}
