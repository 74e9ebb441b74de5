use serde::{Deserialize, Serialize};

use crate::history::{ApplicationRecord, QaEntry};

/// Lifecycle of one application attempt.
///
/// `Init → Filling → (Reviewing) → Submitting → Done`, or
/// `Filling → Stuck | Error → Discarded`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Init,
    Filling,
    Reviewing,
    Submitting,
    Done,
    Stuck,
    Error,
    Discarded,
}

impl SessionState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionState::Done | SessionState::Discarded)
    }
}

/// Why the session stopped.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum SessionExit {
    Submitted,
    Stuck(String),
    Error(String),
    Cancelled,
}

/// Transient state for one attempt. Only its outcome outlives it.
#[derive(Debug, Clone)]
pub struct FormSession {
    pub profile_id: String,
    pub job_url: String,
    pub state: SessionState,
    pub step: u32,
    pub step_budget: u32,
    pub qa_log: Vec<QaEntry>,
    pub requires_human_action: bool,
    /// Every state entered, in order, starting with `Init`.
    pub transitions: Vec<SessionState>,
}

impl FormSession {
    pub fn new(profile_id: impl Into<String>, job_url: impl Into<String>, step_budget: u32) -> Self {
        Self {
            profile_id: profile_id.into(),
            job_url: job_url.into(),
            state: SessionState::Init,
            step: 0,
            step_budget,
            qa_log: Vec::new(),
            requires_human_action: false,
            transitions: vec![SessionState::Init],
        }
    }

    pub fn transition(&mut self, next: SessionState) {
        if self.state == next {
            return;
        }
        log::debug!("[NAV] {:?} -> {:?} (step {})", self.state, next, self.step);
        self.state = next;
        self.transitions.push(next);
    }

    pub fn budget_exhausted(&self) -> bool {
        self.step >= self.step_budget
    }

    /// Appends to the transcript unless the same pair is already recorded.
    pub fn record(&mut self, entry: QaEntry) {
        let duplicate = self
            .qa_log
            .iter()
            .any(|e| e.question == entry.question && e.answer == entry.answer);
        if !duplicate {
            self.qa_log.push(entry);
        }
    }

    pub fn summary(&self, exit: SessionExit) -> SessionSummary {
        SessionSummary {
            profile_id: self.profile_id.clone(),
            job_url: self.job_url.clone(),
            state: self.state,
            exit,
            steps: self.step,
            answered: self.qa_log.len(),
            requires_human_action: self.requires_human_action,
        }
    }
}

/// Outcome streamed as `AUTOMATION_FINISHED`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SessionSummary {
    pub profile_id: String,
    pub job_url: String,
    pub state: SessionState,
    pub exit: SessionExit,
    pub steps: u32,
    pub answered: usize,
    pub requires_human_action: bool,
}

#[derive(Debug, Clone)]
pub struct SessionOutcome {
    pub summary: SessionSummary,
    pub transitions: Vec<SessionState>,
    /// Present only when the application was submitted.
    pub record: Option<ApplicationRecord>,
}

impl SessionOutcome {
    pub fn submitted(&self) -> bool {
        self.summary.exit == SessionExit::Submitted
    }
}
