//! Layered answer resolution for one form question.
//!
//! Order, first hit wins: direct profile field, experience heuristic,
//! authorization heuristics, learned-answer cache, AI generation, then
//! operator approval. Resolution never fails; every downstream problem
//! degrades to an unresolved answer, which callers treat as "leave blank".

pub mod heuristics;

use serde::{Deserialize, Serialize};

use crate::ai::{prompt::build_answer_prompt, AiProvider};
use crate::approval::{ApprovalChannel, ApprovalOutcome, ApprovalRequest};
use crate::notifications::{emit_error, emit_log, LogLevel, NotificationSink};
use crate::profiles::{learned_cache_key, normalize_question, Profile, ProfileStore};

/// Where an answer came from.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum AnswerSource {
    ProfileField,
    Heuristic,
    Cache,
    Ai,
    Human,
    None,
}

impl AnswerSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnswerSource::ProfileField => "profile-field",
            AnswerSource::Heuristic => "heuristic",
            AnswerSource::Cache => "cache",
            AnswerSource::Ai => "ai",
            AnswerSource::Human => "human",
            AnswerSource::None => "none",
        }
    }
}

/// Control kind of the field being asked about.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum QuestionKind {
    #[default]
    Text,
    Number,
    Boolean,
    Select,
    Radio,
}

impl QuestionKind {
    pub fn is_enumerated(&self) -> bool {
        matches!(self, QuestionKind::Select | QuestionKind::Radio)
    }
}

/// Typed context sent alongside a question (wire form `{type, options}`).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct QuestionContext {
    #[serde(rename = "type", default)]
    pub kind: QuestionKind,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Question {
    pub text: String,
    pub kind: QuestionKind,
    /// Offered choices, in display order, for select/radio questions.
    pub options: Vec<String>,
}

impl Question {
    pub fn new(text: impl Into<String>, kind: QuestionKind) -> Self {
        Self {
            text: text.into(),
            kind,
            options: Vec::new(),
        }
    }

    pub fn with_options(mut self, options: Vec<String>) -> Self {
        self.options = options;
        self
    }

    pub fn from_context(text: impl Into<String>, context: QuestionContext) -> Self {
        Self {
            text: text.into(),
            kind: context.kind,
            options: context.options,
        }
    }

    pub fn context(&self) -> QuestionContext {
        QuestionContext {
            kind: self.kind,
            options: if self.kind.is_enumerated() {
                self.options.clone()
            } else {
                Vec::new()
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedAnswer {
    pub answer: Option<String>,
    pub source: AnswerSource,
}

impl ResolvedAnswer {
    fn found(answer: impl Into<String>, source: AnswerSource) -> Self {
        Self {
            answer: Some(answer.into()),
            source,
        }
    }

    pub fn unresolved() -> Self {
        Self {
            answer: None,
            source: AnswerSource::None,
        }
    }

    pub fn is_resolved(&self) -> bool {
        self.answer.is_some()
    }
}

#[derive(Debug, Clone)]
pub struct ResolverOptions {
    /// Store AI answers without asking the operator.
    pub auto_save: bool,
    /// Write learned answers under the normalized question key.
    pub normalize_learned_keys: bool,
    /// Character budget for the serialized profile in AI prompts.
    pub profile_budget_chars: usize,
}

impl Default for ResolverOptions {
    fn default() -> Self {
        Self {
            auto_save: false,
            normalize_learned_keys: false,
            profile_budget_chars: 20_000,
        }
    }
}

pub struct Resolver<'a> {
    store: &'a ProfileStore,
    sink: &'a dyn NotificationSink,
    provider: Option<&'a dyn AiProvider>,
    approvals: Option<&'a ApprovalChannel>,
    options: ResolverOptions,
}

impl<'a> Resolver<'a> {
    pub fn new(
        store: &'a ProfileStore,
        sink: &'a dyn NotificationSink,
        options: ResolverOptions,
    ) -> Self {
        Self {
            store,
            sink,
            provider: None,
            approvals: None,
            options,
        }
    }

    pub fn with_provider(mut self, provider: &'a dyn AiProvider) -> Self {
        self.provider = Some(provider);
        self
    }

    pub fn with_approvals(mut self, approvals: &'a ApprovalChannel) -> Self {
        self.approvals = Some(approvals);
        self
    }

    pub fn options(&self) -> &ResolverOptions {
        &self.options
    }

    pub fn store(&self) -> &'a ProfileStore {
        self.store
    }

    pub fn sink(&self) -> &'a dyn NotificationSink {
        self.sink
    }

    /// Resolves one question. Learned answers are written to `profile` and
    /// persisted; a failed write is reported but does not lose the answer.
    pub fn resolve(&self, question: &Question, profile: &mut Profile) -> ResolvedAnswer {
        let normalized = normalize_question(&question.text);
        if normalized.is_empty() {
            return ResolvedAnswer::unresolved();
        }

        if let Some((answer, source)) = heuristics::lookup(&normalized, profile) {
            self.report(&question.text, source);
            return ResolvedAnswer::found(answer, source);
        }

        if let Some(cached) = profile.question_cache.get(&normalized) {
            self.report(&question.text, AnswerSource::Cache);
            return ResolvedAnswer::found(cached.clone(), AnswerSource::Cache);
        }

        let suggestion = self.ask_ai(question, profile);

        if self.options.auto_save {
            return match suggestion {
                Some(answer) => {
                    self.learn(profile, &question.text, &answer);
                    self.report(&question.text, AnswerSource::Ai);
                    ResolvedAnswer::found(answer, AnswerSource::Ai)
                }
                None => ResolvedAnswer::unresolved(),
            };
        }

        let Some(approvals) = self.approvals else {
            // No operator attached: use the suggestion as-is, unsaved.
            return match suggestion {
                Some(answer) => {
                    self.report(&question.text, AnswerSource::Ai);
                    ResolvedAnswer::found(answer, AnswerSource::Ai)
                }
                None => ResolvedAnswer::unresolved(),
            };
        };

        emit_log(
            self.sink,
            LogLevel::Warning,
            format!("[RESOLVER] Waiting for approval: {}", preview(&question.text)),
        );
        let request = ApprovalRequest::new(question.text.clone(), question.context(), suggestion);
        match approvals.request(request) {
            ApprovalOutcome::Approved { answer, save } => {
                if save {
                    self.learn(profile, &question.text, &answer);
                }
                self.report(&question.text, AnswerSource::Human);
                ResolvedAnswer::found(answer, AnswerSource::Human)
            }
            ApprovalOutcome::Rejected | ApprovalOutcome::TimedOut => ResolvedAnswer::unresolved(),
        }
    }

    fn ask_ai(&self, question: &Question, profile: &Profile) -> Option<String> {
        let provider = self.provider?;
        emit_log(
            self.sink,
            LogLevel::Info,
            format!("[RESOLVER] Asking AI: {}", preview(&question.text)),
        );
        let prompt = build_answer_prompt(question, profile, self.options.profile_budget_chars);
        provider.generate_answer(&prompt)
    }

    fn learn(&self, profile: &mut Profile, question: &str, answer: &str) {
        let key = learned_cache_key(question, self.options.normalize_learned_keys);
        profile
            .question_cache
            .insert(key.clone(), answer.to_string());
        if let Err(err) = self.store.learn_answer(&profile.id, &key, answer, true) {
            emit_error(
                self.sink,
                format!("Failed to save learned answer for '{question}': {err:#}"),
            );
        }
    }

    fn report(&self, question: &str, source: AnswerSource) {
        emit_log(
            self.sink,
            LogLevel::Success,
            format!("[RESOLVER] {} <- {}", preview(question), source.as_str()),
        );
    }
}

/// First 40 characters of a question, for log lines.
pub fn preview(text: &str) -> String {
    let trimmed = text.trim();
    let mut chars = trimmed.chars();
    let head: String = chars.by_ref().take(40).collect();
    if chars.next().is_some() {
        format!("{head}...")
    } else {
        head
    }
}
