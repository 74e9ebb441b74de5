//! Multi-step form navigation.
//!
//! One [`Navigator::run`] call drives one application attempt: fill the
//! visible fields, then probe for Submit, Review or Next. The loop is bounded
//! by the step budget and checks the stop flag at every step boundary.

mod driver;
mod session;

pub use driver::{
    Control, DriverFactory, FieldDescriptor, FormDriver, JobDetails, Sleeper, ThreadSleeper,
};
pub use session::{FormSession, SessionExit, SessionOutcome, SessionState, SessionSummary};

use anyhow::{Context, Result};
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use crate::history::{ApplicationRecord, HistoryLog, QaEntry};
use crate::notifications::{emit_error, emit_log, LogLevel, NotificationSink};
use crate::profiles::{learned_cache_key, Profile};
use crate::resolver::{preview, AnswerSource, Question, Resolver};
use crate::workspace::NavigationSettings;

/// Result of probing the page for its next action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NextAction {
    Submit,
    Review,
    Next,
    ValidationBlocked,
    Stuck,
}

#[derive(Debug, Default)]
struct StepReport {
    needs_human: bool,
}

pub struct Navigator<'a> {
    resolver: &'a Resolver<'a>,
    history: &'a HistoryLog,
    sleeper: &'a dyn Sleeper,
    settings: NavigationSettings,
    stop: Option<&'a AtomicBool>,
}

impl<'a> Navigator<'a> {
    pub fn new(
        resolver: &'a Resolver<'a>,
        history: &'a HistoryLog,
        sleeper: &'a dyn Sleeper,
        settings: NavigationSettings,
    ) -> Self {
        Self {
            resolver,
            history,
            sleeper,
            settings,
            stop: None,
        }
    }

    /// Cooperative cancellation flag, checked before each step.
    pub fn with_stop_flag(mut self, stop: &'a AtomicBool) -> Self {
        self.stop = Some(stop);
        self
    }

    fn sink(&self) -> &'a dyn NotificationSink {
        self.resolver.sink()
    }

    fn stop_requested(&self) -> bool {
        self.stop.map_or(false, |flag| flag.load(Ordering::SeqCst))
    }

    /// Drives one application attempt to `Done` or `Discarded`.
    ///
    /// Driver failures end the session as discarded and are reported in the
    /// outcome. Only a failed history write after submission is returned as
    /// an error.
    pub fn run(
        &self,
        driver: &mut dyn FormDriver,
        profile: &mut Profile,
        job_url: &str,
    ) -> Result<SessionOutcome> {
        let mut session = FormSession::new(profile.id.clone(), job_url, self.settings.step_budget);
        let mut applied = HashSet::new();
        emit_log(
            self.sink(),
            LogLevel::Info,
            format!("[NAV] Starting application for {} ({job_url})", profile.display_name()),
        );
        session.transition(SessionState::Filling);

        let exit = loop {
            if self.stop_requested() {
                break SessionExit::Cancelled;
            }
            if session.budget_exhausted() {
                break SessionExit::Stuck(format!(
                    "Step budget of {} exhausted",
                    session.step_budget
                ));
            }
            session.step += 1;
            session.transition(SessionState::Filling);
            self.pause(self.settings.step_delay_ms);

            let report = match self.fill_step(driver, profile, &mut session, &mut applied) {
                Ok(report) => report,
                Err(err) => break SessionExit::Error(format!("{err:#}")),
            };
            if report.needs_human {
                session.requires_human_action = true;
                emit_log(
                    self.sink(),
                    LogLevel::Warning,
                    format!("[NAV] Step {} needs a manual answer; waiting", session.step),
                );
                self.pause(self.settings.human_action_delay_ms);
                continue;
            }

            let action = match self.probe(driver) {
                Ok(action) => action,
                Err(err) => break SessionExit::Error(format!("{err:#}")),
            };
            let activated = match action {
                NextAction::Submit => {
                    if let Err(err) = driver.activate(Control::Submit) {
                        break SessionExit::Error(format!("{err:#}"));
                    }
                    break SessionExit::Submitted;
                }
                NextAction::Review => {
                    session.transition(SessionState::Reviewing);
                    driver.activate(Control::Review)
                }
                NextAction::Next => driver.activate(Control::Next),
                NextAction::ValidationBlocked => {
                    emit_log(
                        self.sink(),
                        LogLevel::Warning,
                        "[NAV] Validation error on form; retrying step",
                    );
                    self.pause(self.settings.validation_retry_delay_ms);
                    Ok(())
                }
                NextAction::Stuck => {
                    break SessionExit::Stuck(format!(
                        "No Next, Review or Submit control at step {}",
                        session.step
                    ));
                }
            };
            if let Err(err) = activated {
                break SessionExit::Error(format!("{err:#}"));
            }
        };

        match exit {
            SessionExit::Submitted => self.finish_submitted(driver, session),
            other => Ok(self.abandon(driver, session, other)),
        }
    }

    fn fill_step(
        &self,
        driver: &mut dyn FormDriver,
        profile: &mut Profile,
        session: &mut FormSession,
        applied: &mut HashSet<String>,
    ) -> Result<StepReport> {
        let fields = driver
            .fields()
            .with_context(|| format!("Failed reading fields at step {}", session.step))?;
        let mut report = StepReport::default();

        for field in fields.iter().filter(|f| f.visible) {
            let question = clean_label(&field.label);
            if question.is_empty() {
                continue;
            }
            let required = field.required || question.contains('*');

            if let Some(current) = field.current_value() {
                if !applied.contains(&question) {
                    self.learn_prefilled(profile, &question, current);
                }
                session.record(QaEntry::new(question.clone(), current, AnswerSource::Human));
                continue;
            }

            let resolved = self.resolver.resolve(
                &Question::new(question.clone(), field.kind).with_options(field.options.clone()),
                profile,
            );
            let value = match resolved.answer {
                Some(answer) if field.kind.is_enumerated() => {
                    let matched = match_option(&answer, &field.options);
                    if matched.is_none() {
                        emit_log(
                            self.sink(),
                            LogLevel::Warning,
                            format!("[NAV] No option matches '{answer}' for {}", preview(&question)),
                        );
                    }
                    matched
                }
                other => other,
            };

            match value {
                Some(value) => {
                    driver
                        .apply_value(field, &value)
                        .with_context(|| format!("Failed filling '{question}'"))?;
                    applied.insert(question.clone());
                    session.record(QaEntry::new(question, value, resolved.source));
                }
                None if required => {
                    emit_log(
                        self.sink(),
                        LogLevel::Warning,
                        format!("[NAV] Required field left blank: {}", preview(&question)),
                    );
                    report.needs_human = true;
                }
                None => {}
            }
        }
        Ok(report)
    }

    /// Stores an answer already present on the form, never replacing one
    /// the cache already holds.
    fn learn_prefilled(&self, profile: &mut Profile, question: &str, value: &str) {
        let key = learned_cache_key(question, self.resolver.options().normalize_learned_keys);
        if profile.question_cache.contains_key(&key) {
            return;
        }
        profile.question_cache.insert(key.clone(), value.to_string());
        match self
            .resolver
            .store()
            .learn_answer(&profile.id, &key, value, false)
        {
            Ok(Some(_)) => log::debug!("[NAV] Learned pre-filled answer for {}", preview(question)),
            Ok(None) => {}
            Err(err) => emit_error(
                self.sink(),
                format!("Failed to save pre-filled answer for '{question}': {err:#}"),
            ),
        }
    }

    fn probe(&self, driver: &mut dyn FormDriver) -> Result<NextAction> {
        let submit = driver.has_control(Control::Submit)?;
        let review = driver.has_control(Control::Review)?;
        if submit && !review {
            return Ok(NextAction::Submit);
        }
        if review {
            return Ok(NextAction::Review);
        }
        if driver.has_control(Control::Next)? {
            return Ok(NextAction::Next);
        }
        if driver.has_validation_error()? {
            return Ok(NextAction::ValidationBlocked);
        }
        Ok(NextAction::Stuck)
    }

    fn finish_submitted(
        &self,
        driver: &mut dyn FormDriver,
        mut session: FormSession,
    ) -> Result<SessionOutcome> {
        session.transition(SessionState::Submitting);
        let details = driver.job_details().unwrap_or_else(|err| {
            log::warn!("[NAV] Could not read job details: {err:#}");
            JobDetails::default()
        });
        let record = ApplicationRecord::new(
            non_empty_or(details.title, "Unknown Job"),
            non_empty_or(details.company, "Unknown Company"),
            non_empty_or(details.link, &session.job_url),
            session.profile_id.clone(),
            session.qa_log.clone(),
        );
        self.history
            .append(record.clone())
            .context("Failed saving application history")?;

        session.transition(SessionState::Done);
        self.try_activate(driver, Control::Dismiss);
        emit_log(
            self.sink(),
            LogLevel::Success,
            format!("[NAV] Submitted {} at {}", record.title, record.company),
        );
        let summary = session.summary(SessionExit::Submitted);
        Ok(SessionOutcome {
            summary,
            transitions: session.transitions,
            record: Some(record),
        })
    }

    fn abandon(
        &self,
        driver: &mut dyn FormDriver,
        mut session: FormSession,
        exit: SessionExit,
    ) -> SessionOutcome {
        match &exit {
            SessionExit::Stuck(reason) => {
                session.transition(SessionState::Stuck);
                emit_error(self.sink(), format!("Application stuck: {reason}"));
            }
            SessionExit::Error(reason) => {
                session.transition(SessionState::Error);
                emit_error(self.sink(), format!("Application failed: {reason}"));
            }
            SessionExit::Cancelled => {
                emit_log(self.sink(), LogLevel::Warning, "[NAV] Automation stopped by operator");
            }
            SessionExit::Submitted => {}
        }
        if self.try_activate(driver, Control::Dismiss) {
            self.try_activate(driver, Control::ConfirmDiscard);
        }
        session.transition(SessionState::Discarded);
        let summary = session.summary(exit);
        SessionOutcome {
            summary,
            transitions: session.transitions,
            record: None,
        }
    }

    /// Activates a control when present. Failures here are logged only.
    fn try_activate(&self, driver: &mut dyn FormDriver, control: Control) -> bool {
        match driver.has_control(control) {
            Ok(true) => match driver.activate(control) {
                Ok(()) => true,
                Err(err) => {
                    log::warn!("[NAV] Failed activating {control:?}: {err:#}");
                    false
                }
            },
            Ok(false) => false,
            Err(err) => {
                log::warn!("[NAV] Failed probing {control:?}: {err:#}");
                false
            }
        }
    }

    fn pause(&self, millis: u64) {
        if millis > 0 {
            self.sleeper.sleep(Duration::from_millis(millis));
        }
    }
}

fn non_empty_or(value: String, fallback: &str) -> String {
    if value.trim().is_empty() {
        fallback.to_string()
    } else {
        value.trim().to_string()
    }
}

const LABEL_MARKERS: &[&str] = &["required", "optional"];

/// Question text for a field label: marker words dropped, whitespace collapsed.
///
/// A line consisting only of "Required" or "Optional" is removed, as is a
/// trailing marker word. A `*` is kept since it flags a required field.
pub fn clean_label(label: &str) -> String {
    let joined = label
        .lines()
        .map(str::trim)
        .filter(|line| !LABEL_MARKERS.contains(&line.to_ascii_lowercase().as_str()))
        .collect::<Vec<_>>()
        .join(" ");
    let mut words: Vec<&str> = joined.split_whitespace().collect();
    while words.len() > 1
        && words
            .last()
            .map_or(false, |w| LABEL_MARKERS.contains(&w.to_ascii_lowercase().as_str()))
    {
        words.pop();
    }
    words.join(" ")
}

/// Picks the offered option for a free-form answer.
///
/// Exact (case-insensitive) matches win; otherwise the first option that
/// contains the answer or is contained by it. Placeholder entries such as
/// "Select an option" never match.
pub fn match_option(answer: &str, options: &[String]) -> Option<String> {
    let wanted = answer.trim().to_lowercase();
    if wanted.is_empty() {
        return None;
    }
    let candidates: Vec<(&String, String)> = options
        .iter()
        .map(|opt| (opt, opt.trim().to_lowercase()))
        .filter(|(_, lower)| !lower.is_empty() && !lower.starts_with("select"))
        .collect();
    if let Some((opt, _)) = candidates.iter().find(|(_, lower)| *lower == wanted) {
        return Some(opt.trim().to_string());
    }
    candidates
        .iter()
        .find(|(_, lower)| lower.contains(&wanted) || wanted.contains(lower.as_str()))
        .map(|(opt, _)| opt.trim().to_string())
}
