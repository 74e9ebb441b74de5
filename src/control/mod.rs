//! Control-channel dispatcher.
//!
//! [`ControlService::handle`] turns one inbound message into its outbound
//! replies. Only `START_AUTOMATION` does long-running work; it runs on its
//! own thread so approval responses and stop requests keep flowing.

mod messages;

pub use messages::InboundMessage;
pub use crate::notifications::OutboundMessage;

use anyhow::{bail, Context, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use uuid::Uuid;

use crate::ai::AiProvider;
use crate::approval::{ApprovalChannel, ApprovalResponse};
use crate::history::{ApplicationRecord, HistoryLog};
use crate::navigation::{DriverFactory, Navigator, SessionOutcome, Sleeper, ThreadSleeper};
use crate::notifications::{emit_error, emit_log, LogLevel, NotificationSink};
use crate::profiles::{learned_cache_key, Profile, ProfileStore};
use crate::resolver::{AnswerSource, Question, QuestionContext, Resolver, ResolverOptions};
use crate::workspace::{AppConfig, WorkspacePaths};

#[derive(Clone)]
pub struct ControlService {
    config: Arc<AppConfig>,
    store: Arc<ProfileStore>,
    history: Arc<HistoryLog>,
    provider: Arc<dyn AiProvider>,
    approvals: Arc<ApprovalChannel>,
    sink: Arc<dyn NotificationSink>,
    drivers: Option<Arc<dyn DriverFactory>>,
    sleeper: Arc<dyn Sleeper>,
    running: Arc<AtomicBool>,
    stop: Arc<AtomicBool>,
}

/// Clears the running flag when a session thread ends, however it ends.
struct RunningGuard(Arc<AtomicBool>);

impl Drop for RunningGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl ControlService {
    pub fn new(
        config: AppConfig,
        paths: &WorkspacePaths,
        provider: Arc<dyn AiProvider>,
        sink: Arc<dyn NotificationSink>,
    ) -> Self {
        let timeout = Duration::from_secs(config.approval.timeout_secs);
        Self {
            store: Arc::new(ProfileStore::open(paths.profiles_file())),
            history: Arc::new(HistoryLog::open(paths.history_file())),
            approvals: Arc::new(ApprovalChannel::new(sink.clone(), timeout)),
            config: Arc::new(config),
            provider,
            sink,
            drivers: None,
            sleeper: Arc::new(ThreadSleeper),
            running: Arc::new(AtomicBool::new(false)),
            stop: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn with_driver_factory(mut self, drivers: Arc<dyn DriverFactory>) -> Self {
        self.drivers = Some(drivers);
        self
    }

    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    pub fn with_approval_timeout(mut self, timeout: Duration) -> Self {
        self.approvals = Arc::new(ApprovalChannel::new(self.sink.clone(), timeout));
        self
    }

    pub fn store(&self) -> &ProfileStore {
        &self.store
    }

    pub fn history(&self) -> &HistoryLog {
        &self.history
    }

    pub fn approvals(&self) -> &ApprovalChannel {
        &self.approvals
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Handles one inbound message. Failures are reported as `ERROR`.
    ///
    /// Returns the session thread handle for `START_AUTOMATION`.
    pub fn handle(&self, message: InboundMessage) -> Option<JoinHandle<()>> {
        let kind = message.kind();
        log::debug!("[CONTROL] <- {kind}");
        match self.dispatch(message) {
            Ok(handle) => handle,
            Err(err) => {
                emit_error(self.sink.as_ref(), format!("{kind} failed: {err:#}"));
                None
            }
        }
    }

    fn dispatch(&self, message: InboundMessage) -> Result<Option<JoinHandle<()>>> {
        match message {
            InboundMessage::LoadProfiles => self.send_profiles()?,
            InboundMessage::ParseResume { text, email, .. } => self.parse_resume(&text, email)?,
            InboundMessage::StartAutomation { profile_id, job_url } => {
                return self.start_automation(profile_id, job_url).map(Some);
            }
            InboundMessage::StopAutomation => self.stop_automation(),
            InboundMessage::UpdateProfile { profile } => self.update_profile(profile)?,
            InboundMessage::DeleteProfile { profile_id } => {
                if !self.store.delete(&profile_id)? {
                    bail!("Unknown profile '{profile_id}'");
                }
                self.sink.send(OutboundMessage::ProfileDeleted { profile_id });
            }
            InboundMessage::GenerateAnswer {
                question,
                context,
                profile,
            } => self.generate_answer(question, context, profile),
            InboundMessage::SaveAnswer {
                profile_id,
                question,
                answer,
            } => {
                let key = learned_cache_key(&question, self.config.cache.normalize_learned_keys);
                self.store.learn_answer(&profile_id, &key, &answer, true)?;
                self.sink.send(OutboundMessage::AnswerSaved { profile_id, question });
            }
            InboundMessage::SaveJobHistory { record } => self.save_job_history(record)?,
            InboundMessage::GetJobHistory => {
                let records = self.history.load()?;
                self.sink.send(OutboundMessage::JobHistoryData { records });
            }
            InboundMessage::GetAvailableModels => {
                let models = self
                    .provider
                    .list_models()
                    .context("Failed listing models")?;
                self.sink.send(OutboundMessage::ModelsList { models });
            }
            InboundMessage::ApprovalResponse(response) => self.deliver_approval(response),
            InboundMessage::Ping => self.sink.send(OutboundMessage::Pong),
        }
        Ok(None)
    }

    fn send_profiles(&self) -> Result<()> {
        let profiles = self.store.load_all()?;
        self.sink.send(OutboundMessage::ProfilesLoaded { profiles });
        Ok(())
    }

    fn parse_resume(&self, text: &str, email: Option<String>) -> Result<()> {
        if text.trim().is_empty() {
            bail!("Resume text is empty");
        }
        emit_log(self.sink.as_ref(), LogLevel::Info, "[AI] Parsing resume...");
        let Some(record) = self.provider.extract_profile(text) else {
            bail!("Could not extract a profile from the resume");
        };
        let mut profile = Profile::from_extracted(&record);
        profile.account_email = email.filter(|e| !e.trim().is_empty());
        self.store.save(&profile)?;
        emit_log(
            self.sink.as_ref(),
            LogLevel::Success,
            format!("[AI] Created profile {}", profile.display_name()),
        );
        self.sink.send(OutboundMessage::ResumeParsed { profile });
        self.send_profiles()
    }

    fn update_profile(&self, mut profile: Profile) -> Result<()> {
        if profile.id.trim().is_empty() {
            profile.id = Uuid::new_v4().to_string();
        }
        if profile.created_at.is_none() {
            profile.created_at = profile.updated_at.or_else(|| Some(chrono::Utc::now()));
        }
        self.store.save(&profile)?;
        self.sink.send(OutboundMessage::ProfileSaved {
            profile_id: profile.id,
        });
        Ok(())
    }

    /// One-off resolution for a caller-supplied profile. No operator prompt
    /// is raised here; the caller owns any approval step.
    fn generate_answer(&self, question: String, context: QuestionContext, mut profile: Profile) {
        let resolver = Resolver::new(self.store.as_ref(), self.sink.as_ref(), self.resolver_options())
            .with_provider(self.provider.as_ref());
        let question = Question::from_context(question, context);
        let resolved = resolver.resolve(&question, &mut profile);
        if resolved.source == AnswerSource::None {
            log::debug!("[CONTROL] No answer for '{}'", question.text);
        }
        self.sink.send(OutboundMessage::AnswerGenerated {
            question: question.text,
            answer: resolved.answer,
            source: resolved.source,
        });
    }

    fn save_job_history(&self, record: ApplicationRecord) -> Result<()> {
        self.history.append(record)?;
        let count = self.history.load()?.len();
        self.sink.send(OutboundMessage::JobHistorySaved { count });
        Ok(())
    }

    fn stop_automation(&self) {
        if self.is_running() {
            self.stop.store(true, Ordering::SeqCst);
            emit_log(self.sink.as_ref(), LogLevel::Warning, "[CONTROL] Stop requested");
        } else {
            emit_log(self.sink.as_ref(), LogLevel::Info, "[CONTROL] No automation running");
        }
    }

    fn deliver_approval(&self, response: ApprovalResponse) {
        let question = response.question.clone();
        if self.approvals.deliver(response) {
            emit_log(
                self.sink.as_ref(),
                LogLevel::Info,
                format!("[APPROVAL] Response received for '{question}'"),
            );
        } else {
            emit_log(
                self.sink.as_ref(),
                LogLevel::Warning,
                format!("[APPROVAL] No pending request for '{question}'; response ignored"),
            );
        }
    }

    fn start_automation(&self, profile_id: String, job_url: String) -> Result<JoinHandle<()>> {
        if self.drivers.is_none() {
            bail!("No form driver attached; cannot open {job_url}");
        }
        if self.running.swap(true, Ordering::SeqCst) {
            bail!("An automation session is already running");
        }
        self.stop.store(false, Ordering::SeqCst);
        let guard = RunningGuard(self.running.clone());
        let service = self.clone();
        thread::Builder::new()
            .name("autoapply-session".into())
            .spawn(move || {
                let _guard = guard;
                match service.run_automation(&profile_id, &job_url) {
                    Ok(outcome) => service
                        .sink
                        .send(OutboundMessage::AutomationFinished(outcome.summary)),
                    Err(err) => emit_error(
                        service.sink.as_ref(),
                        format!("Automation failed: {err:#}"),
                    ),
                }
            })
            .context("Failed spawning automation thread")
    }

    /// Runs one application attempt to completion on the calling thread.
    pub fn run_automation(&self, profile_id: &str, job_url: &str) -> Result<SessionOutcome> {
        let drivers = self
            .drivers
            .as_ref()
            .context("No form driver attached")?;
        let mut profile = self
            .store
            .get(profile_id)?
            .with_context(|| format!("Unknown profile '{profile_id}'"))?;

        let mut driver = drivers
            .open(job_url)
            .with_context(|| format!("Failed opening form at {job_url}"))?;
        let resolver = Resolver::new(self.store.as_ref(), self.sink.as_ref(), self.resolver_options())
            .with_provider(self.provider.as_ref())
            .with_approvals(self.approvals.as_ref());
        let navigator = Navigator::new(
            &resolver,
            self.history.as_ref(),
            self.sleeper.as_ref(),
            self.config.navigation.clone(),
        )
        .with_stop_flag(self.stop.as_ref());
        navigator.run(&mut *driver, &mut profile, job_url)
    }

    fn resolver_options(&self) -> ResolverOptions {
        ResolverOptions {
            auto_save: self.config.approval.auto_save,
            normalize_learned_keys: self.config.cache.normalize_learned_keys,
            profile_budget_chars: self.config.ai.prompt_profile_budget_chars,
        }
    }
}
