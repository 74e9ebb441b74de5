use serde::{Deserialize, Serialize};

use crate::approval::ApprovalResponse;
use crate::history::ApplicationRecord;
use crate::profiles::Profile;
use crate::resolver::QuestionContext;

/// Every message the core accepts over the control channel.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "payload", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InboundMessage {
    #[serde(alias = "loadProfiles")]
    LoadProfiles,
    #[serde(alias = "parseResume")]
    ParseResume {
        text: String,
        #[serde(default)]
        email: Option<String>,
        /// Accepted for compatibility; never stored.
        #[serde(default, skip_serializing)]
        password: Option<String>,
    },
    #[serde(rename_all = "camelCase")]
    StartAutomation { profile_id: String, job_url: String },
    StopAutomation,
    UpdateProfile { profile: Profile },
    #[serde(rename_all = "camelCase")]
    DeleteProfile { profile_id: String },
    GenerateAnswer {
        question: String,
        #[serde(default)]
        context: QuestionContext,
        profile: Profile,
    },
    #[serde(rename_all = "camelCase")]
    SaveAnswer {
        profile_id: String,
        question: String,
        answer: String,
    },
    SaveJobHistory { record: ApplicationRecord },
    GetJobHistory,
    GetAvailableModels,
    ApprovalResponse(ApprovalResponse),
    Ping,
}

impl InboundMessage {
    /// Wire name, for log lines.
    pub fn kind(&self) -> &'static str {
        match self {
            InboundMessage::LoadProfiles => "LOAD_PROFILES",
            InboundMessage::ParseResume { .. } => "PARSE_RESUME",
            InboundMessage::StartAutomation { .. } => "START_AUTOMATION",
            InboundMessage::StopAutomation => "STOP_AUTOMATION",
            InboundMessage::UpdateProfile { .. } => "UPDATE_PROFILE",
            InboundMessage::DeleteProfile { .. } => "DELETE_PROFILE",
            InboundMessage::GenerateAnswer { .. } => "GENERATE_ANSWER",
            InboundMessage::SaveAnswer { .. } => "SAVE_ANSWER",
            InboundMessage::SaveJobHistory { .. } => "SAVE_JOB_HISTORY",
            InboundMessage::GetJobHistory => "GET_JOB_HISTORY",
            InboundMessage::GetAvailableModels => "GET_AVAILABLE_MODELS",
            InboundMessage::ApprovalResponse(_) => "APPROVAL_RESPONSE",
            InboundMessage::Ping => "PING",
        }
    }
}
