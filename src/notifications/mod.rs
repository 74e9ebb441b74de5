//! Outbound notification taxonomy and the sinks that carry it.
//!
//! Operator-facing progress is a typed [`OutboundMessage::Log`]; terminal
//! failures use [`OutboundMessage::Error`]. [`emit_log`] and [`emit_error`]
//! also mirror the message to the `log` facade for diagnostics.

use crossbeam_channel::Sender;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Mutex;

use crate::approval::ApprovalRequest;
use crate::history::ApplicationRecord;
use crate::navigation::SessionSummary;
use crate::profiles::Profile;
use crate::resolver::AnswerSource;

/// Severity attached to a `LOG` notification.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LogLevel {
    Info,
    Success,
    Warning,
    Error,
}

/// Every message the core sends over the control channel.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "payload", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OutboundMessage {
    ProfilesLoaded {
        profiles: BTreeMap<String, Profile>,
    },
    ResumeParsed {
        profile: Profile,
    },
    ProfileSaved {
        #[serde(rename = "profileId")]
        profile_id: String,
    },
    ProfileDeleted {
        #[serde(rename = "profileId")]
        profile_id: String,
    },
    AnswerGenerated {
        question: String,
        answer: Option<String>,
        source: AnswerSource,
    },
    AnswerSaved {
        #[serde(rename = "profileId")]
        profile_id: String,
        question: String,
    },
    JobHistorySaved {
        count: usize,
    },
    JobHistoryData {
        records: Vec<ApplicationRecord>,
    },
    ModelsList {
        models: Vec<String>,
    },
    ApprovalRequested(ApprovalRequest),
    AutomationFinished(SessionSummary),
    Log {
        level: LogLevel,
        message: String,
    },
    Error {
        message: String,
    },
    Pong,
}

impl OutboundMessage {
    pub fn is_error(&self) -> bool {
        matches!(self, OutboundMessage::Error { .. })
    }
}

/// Destination for outbound messages. Implementations must not block for long.
pub trait NotificationSink: Send + Sync {
    fn send(&self, message: OutboundMessage);
}

/// Streams a typed progress notification and mirrors it to the log facade.
pub fn emit_log(sink: &dyn NotificationSink, level: LogLevel, message: impl Into<String>) {
    let message = message.into();
    match level {
        LogLevel::Info | LogLevel::Success => log::info!("{message}"),
        LogLevel::Warning => log::warn!("{message}"),
        LogLevel::Error => log::error!("{message}"),
    }
    sink.send(OutboundMessage::Log { level, message });
}

/// Streams a terminal failure as a distinct error notification.
pub fn emit_error(sink: &dyn NotificationSink, message: impl Into<String>) {
    let message = message.into();
    log::error!("{message}");
    sink.send(OutboundMessage::Error { message });
}

/// Forwards messages to a crossbeam channel (the binary drains it to stdout).
pub struct ChannelSink {
    tx: Sender<OutboundMessage>,
}

impl ChannelSink {
    pub fn new(tx: Sender<OutboundMessage>) -> Self {
        Self { tx }
    }
}

impl NotificationSink for ChannelSink {
    fn send(&self, message: OutboundMessage) {
        if self.tx.send(message).is_err() {
            log::warn!("[CONTROL] Outbound channel closed; dropping notification");
        }
    }
}

/// Collects messages in memory.
#[derive(Default)]
pub struct MemorySink {
    messages: Mutex<Vec<OutboundMessage>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> Vec<OutboundMessage> {
        self.messages
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn errors(&self) -> Vec<String> {
        self.messages()
            .into_iter()
            .filter_map(|m| match m {
                OutboundMessage::Error { message } => Some(message),
                _ => None,
            })
            .collect()
    }

    pub fn log_lines(&self) -> Vec<String> {
        self.messages()
            .into_iter()
            .filter_map(|m| match m {
                OutboundMessage::Log { message, .. } => Some(message),
                _ => None,
            })
            .collect()
    }
}

impl NotificationSink for MemorySink {
    fn send(&self, message: OutboundMessage) {
        self.messages
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(message);
    }
}
