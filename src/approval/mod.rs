//! Human-approval round trip over the control channel.
//!
//! A request is published as `APPROVAL_REQUESTED`; the operator answers with
//! `APPROVAL_RESPONSE`, matched to the pending request by exact question
//! text. Only one outstanding request per question is supported; callers
//! must not issue a second request for the same question before the first
//! resolves.

use crossbeam_channel::{bounded, RecvTimeoutError, Sender};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use crate::notifications::{NotificationSink, OutboundMessage};
use crate::resolver::QuestionContext;

/// Request shown to the operator.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ApprovalRequest {
    pub question: String,
    pub context: QuestionContext,
    pub suggested_answer: Option<String>,
    pub requires_approval: bool,
}

impl ApprovalRequest {
    pub fn new(
        question: impl Into<String>,
        context: QuestionContext,
        suggested_answer: Option<String>,
    ) -> Self {
        Self {
            question: question.into(),
            context,
            suggested_answer,
            requires_approval: true,
        }
    }
}

/// Operator reply. A missing or blank answer means the field was skipped.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ApprovalResponse {
    pub question: String,
    #[serde(default)]
    pub answer: Option<String>,
    #[serde(default)]
    pub save_to_profile: bool,
}

/// How a request ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApprovalOutcome {
    Approved { answer: String, save: bool },
    Rejected,
    TimedOut,
}

/// Registry of pending requests plus the sink that publishes them.
pub struct ApprovalChannel {
    sink: Arc<dyn NotificationSink>,
    pending: Mutex<HashMap<String, Sender<ApprovalResponse>>>,
    timeout: Duration,
    detached: AtomicUsize,
}

impl ApprovalChannel {
    pub fn new(sink: Arc<dyn NotificationSink>, timeout: Duration) -> Self {
        Self {
            sink,
            pending: Mutex::new(HashMap::new()),
            timeout,
            detached: AtomicUsize::new(0),
        }
    }

    /// Publishes the request and blocks until a matching response or the
    /// timeout, whichever comes first. The pending listener is removed
    /// exactly once on either path.
    pub fn request(&self, request: ApprovalRequest) -> ApprovalOutcome {
        let question = request.question.clone();
        let (tx, rx) = bounded(1);
        if self.lock().insert(question.clone(), tx).is_some() {
            log::warn!("[APPROVAL] Replaced an outstanding request for '{question}'");
        }
        log::info!("[APPROVAL] Waiting up to {:?} for '{question}'", self.timeout);
        self.sink.send(OutboundMessage::ApprovalRequested(request));

        let mut received = rx.recv_timeout(self.timeout);
        // `deliver` detaches on the success path; this covers the timeout.
        self.detach(&question);
        if matches!(received, Err(RecvTimeoutError::Timeout)) {
            // A delivery that won the race for the lock has already buffered.
            if let Ok(response) = rx.try_recv() {
                received = Ok(response);
            }
        }

        match received {
            Ok(response) => match response.answer {
                Some(answer) if !answer.trim().is_empty() => ApprovalOutcome::Approved {
                    answer,
                    save: response.save_to_profile,
                },
                _ => {
                    log::info!("[APPROVAL] Operator skipped '{question}'");
                    ApprovalOutcome::Rejected
                }
            },
            Err(RecvTimeoutError::Timeout) => {
                log::warn!("[APPROVAL] No response for '{question}' within {:?}", self.timeout);
                ApprovalOutcome::TimedOut
            }
            Err(RecvTimeoutError::Disconnected) => ApprovalOutcome::TimedOut,
        }
    }

    /// Routes an operator response to its pending request.
    ///
    /// Returns false when nothing is waiting for that question, e.g. a late
    /// response after the timeout; such responses are dropped. A true return
    /// means the waiting request will consume the response.
    pub fn deliver(&self, response: ApprovalResponse) -> bool {
        // Hand-off happens under the registry lock so `request` sees it.
        let mut pending = self.lock();
        let Some(tx) = pending.remove(&response.question) else {
            drop(pending);
            log::warn!(
                "[APPROVAL] Ignoring response for '{}' with no pending request",
                response.question
            );
            return false;
        };
        self.detached.fetch_add(1, Ordering::SeqCst);
        tx.try_send(response).is_ok()
    }

    pub fn pending_count(&self) -> usize {
        self.lock().len()
    }

    /// Total number of listeners removed, by either a response or a timeout.
    pub fn listeners_detached(&self) -> usize {
        self.detached.load(Ordering::SeqCst)
    }

    fn detach(&self, question: &str) {
        if self.lock().remove(question).is_some() {
            self.detached.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Sender<ApprovalResponse>>> {
        self.pending
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
