use anyhow::Result;
use autoapply::approval::ApprovalResponse;
use autoapply::control::{ControlService, InboundMessage, OutboundMessage};
use autoapply::history::{ApplicationRecord, QaEntry};
use autoapply::navigation::{Control, FieldDescriptor, SessionExit};
use autoapply::notifications::MemorySink;
use autoapply::resolver::{AnswerSource, QuestionContext, QuestionKind};
use autoapply::workspace::AppConfig;
use autoapply::Profile;
use std::fs;
use std::sync::Arc;
use std::time::Duration;

use crate::support::mocks::{wait_until, MockProvider, NoopSleeper};
use crate::support::scripted_form::{FormStep, ScriptedFactory, ScriptedForm};
use crate::{fast_navigation, IntegrationHarness};

struct ControlFixture {
    harness: IntegrationHarness,
    sink: Arc<MemorySink>,
    service: ControlService,
}

impl ControlFixture {
    fn new(provider: MockProvider) -> Self {
        let harness = IntegrationHarness::new();
        let sink = Arc::new(MemorySink::new());
        let mut config = AppConfig::default();
        config.navigation = fast_navigation(10);
        let service = ControlService::new(config, &harness.paths, Arc::new(provider), sink.clone())
            .with_sleeper(Arc::new(NoopSleeper));
        Self {
            harness,
            sink,
            service,
        }
    }

    fn with_form(mut self, form: ScriptedForm) -> Self {
        self.service = self
            .service
            .with_driver_factory(Arc::new(ScriptedFactory { form }));
        self
    }

    fn replies(&self) -> Vec<OutboundMessage> {
        self.sink.messages()
    }

    fn last_reply(&self) -> OutboundMessage {
        self.replies().pop().expect("at least one reply")
    }
}

#[test]
fn every_message_gets_a_reply() -> Result<()> {
    let fixture = ControlFixture::new(MockProvider::returning("ok"));
    let messages = vec![
        InboundMessage::Ping,
        InboundMessage::LoadProfiles,
        InboundMessage::StopAutomation,
        InboundMessage::GetJobHistory,
        InboundMessage::GetAvailableModels,
        InboundMessage::DeleteProfile {
            profile_id: "missing".into(),
        },
        InboundMessage::StartAutomation {
            profile_id: "missing".into(),
            job_url: "https://jobs.example/1".into(),
        },
        InboundMessage::ApprovalResponse(ApprovalResponse {
            question: "Nobody asked".into(),
            answer: Some("x".into()),
            save_to_profile: false,
        }),
    ];
    for message in messages {
        let before = fixture.replies().len();
        let kind = message.kind();
        fixture.service.handle(message);
        assert!(fixture.replies().len() > before, "{kind} produced no reply");
    }
    assert_eq!(fixture.replies()[0], OutboundMessage::Pong);
    assert!(fixture.replies().contains(&OutboundMessage::ModelsList {
        models: vec!["mock-model".into()]
    }));
    assert!(fixture.sink.errors().iter().any(|e| e.contains("Unknown profile")));
    assert!(fixture.sink.errors().iter().any(|e| e.contains("No form driver")));
    assert!(fixture
        .sink
        .log_lines()
        .iter()
        .any(|l| l.contains("No pending request")));
    Ok(())
}

#[test]
fn profile_updates_round_trip_through_the_store() -> Result<()> {
    let fixture = ControlFixture::new(MockProvider::silent());
    let mut profile = Profile::default();
    profile.first_name = "Ada".into();

    fixture
        .service
        .handle(InboundMessage::UpdateProfile { profile });
    let profile_id = match fixture.last_reply() {
        OutboundMessage::ProfileSaved { profile_id } => profile_id,
        other => panic!("unexpected reply {other:?}"),
    };
    assert!(!profile_id.is_empty());

    fixture.service.handle(InboundMessage::SaveAnswer {
        profile_id: profile_id.clone(),
        question: "Notice Period".into(),
        answer: "2 weeks".into(),
    });
    assert_eq!(
        fixture.last_reply(),
        OutboundMessage::AnswerSaved {
            profile_id: profile_id.clone(),
            question: "Notice Period".into()
        }
    );

    fixture.service.handle(InboundMessage::LoadProfiles);
    match fixture.last_reply() {
        OutboundMessage::ProfilesLoaded { profiles } => {
            let stored = &profiles[&profile_id];
            assert_eq!(stored.first_name, "Ada");
            assert_eq!(stored.question_cache["Notice Period"], "2 weeks");
            assert!(stored.created_at.is_some());
        }
        other => panic!("unexpected reply {other:?}"),
    }

    fixture.service.handle(InboundMessage::DeleteProfile {
        profile_id: profile_id.clone(),
    });
    assert_eq!(
        fixture.last_reply(),
        OutboundMessage::ProfileDeleted { profile_id }
    );
    assert!(fixture.service.store().load_all()?.is_empty());
    Ok(())
}

#[test]
fn resume_parsing_creates_a_profile_without_the_password() -> Result<()> {
    let extraction = r#"```json
{"firstName": "Grace", "lastName": "Hopper", "email": "grace@navy.mil",
 "yearsExperience": "30", "experience": {"COBOL": 12, "Fortran": "8"}}
```"#;
    let fixture = ControlFixture::new(MockProvider::returning(extraction));

    fixture.service.handle(InboundMessage::ParseResume {
        text: "Grace Hopper, rear admiral".into(),
        email: Some("grace@login.example".into()),
        password: Some("hunter2".into()),
    });

    let replies = fixture.replies();
    let parsed = replies
        .iter()
        .position(|m| matches!(m, OutboundMessage::ResumeParsed { .. }))
        .expect("RESUME_PARSED sent");
    let loaded = replies
        .iter()
        .position(|m| matches!(m, OutboundMessage::ProfilesLoaded { .. }))
        .expect("PROFILES_LOADED sent");
    assert!(parsed < loaded);

    let profile = match &replies[parsed] {
        OutboundMessage::ResumeParsed { profile } => profile.clone(),
        _ => unreachable!(),
    };
    assert_eq!(profile.display_name(), "Grace Hopper");
    assert_eq!(profile.years_experience, 30);
    assert_eq!(profile.experience["Fortran"], 8);
    assert_eq!(profile.account_email.as_deref(), Some("grace@login.example"));

    let raw = fs::read_to_string(fixture.harness.paths.profiles_file())?;
    assert!(raw.contains("Grace"));
    assert!(!raw.contains("hunter2"));
    Ok(())
}

#[test]
fn failed_resume_extraction_is_an_error() {
    let fixture = ControlFixture::new(MockProvider::returning("I could not read that"));
    fixture.service.handle(InboundMessage::ParseResume {
        text: "garbled".into(),
        email: None,
        password: None,
    });
    assert!(fixture.last_reply().is_error());
}

#[test]
fn generate_answer_reports_its_source() {
    let fixture = ControlFixture::new(MockProvider::returning("Because of the mission"));
    let mut profile = Profile::new("Mark", "Smith");
    profile.email = "mark@test.com".into();

    fixture.service.handle(InboundMessage::GenerateAnswer {
        question: "Email".into(),
        context: QuestionContext::default(),
        profile: profile.clone(),
    });
    assert_eq!(
        fixture.last_reply(),
        OutboundMessage::AnswerGenerated {
            question: "Email".into(),
            answer: Some("mark@test.com".into()),
            source: AnswerSource::ProfileField,
        }
    );

    fixture.service.handle(InboundMessage::GenerateAnswer {
        question: "Why us?".into(),
        context: QuestionContext {
            kind: QuestionKind::Text,
            options: Vec::new(),
        },
        profile,
    });
    assert_eq!(
        fixture.last_reply(),
        OutboundMessage::AnswerGenerated {
            question: "Why us?".into(),
            answer: Some("Because of the mission".into()),
            source: AnswerSource::Ai,
        }
    );
}

#[test]
fn job_history_is_saved_and_listed() -> Result<()> {
    let fixture = ControlFixture::new(MockProvider::silent());
    for n in 1..=2 {
        fixture.service.handle(InboundMessage::SaveJobHistory {
            record: ApplicationRecord::new(
                format!("Job {n}"),
                "Acme",
                format!("https://jobs.example/{n}"),
                "p-1",
                vec![QaEntry::new("First name", "Mark", AnswerSource::ProfileField)],
            ),
        });
    }
    assert_eq!(
        fixture.last_reply(),
        OutboundMessage::JobHistorySaved { count: 2 }
    );

    fixture.service.handle(InboundMessage::GetJobHistory);
    match fixture.last_reply() {
        OutboundMessage::JobHistoryData { records } => {
            assert_eq!(records.len(), 2);
            assert_eq!(records[0].title, "Job 2");
        }
        other => panic!("unexpected reply {other:?}"),
    }
    Ok(())
}

#[test]
fn automation_runs_on_its_own_thread_and_reports_completion() -> Result<()> {
    let form = ScriptedForm::new(vec![FormStep::new(
        vec![FieldDescriptor::new("f", "First name", QuestionKind::Text)],
        &[Control::Submit],
    )]);
    let fixture = ControlFixture::new(MockProvider::silent()).with_form(form.clone());
    let profile = fixture.harness.seed_profile(fixture.service.store());

    let handle = fixture
        .service
        .handle(InboundMessage::StartAutomation {
            profile_id: profile.id.clone(),
            job_url: "https://jobs.example/42".into(),
        })
        .expect("session thread started");
    handle.join().expect("session thread panicked");

    let summary = fixture
        .replies()
        .into_iter()
        .find_map(|m| match m {
            OutboundMessage::AutomationFinished(summary) => Some(summary),
            _ => None,
        })
        .expect("AUTOMATION_FINISHED sent");
    assert_eq!(summary.exit, SessionExit::Submitted);
    assert_eq!(summary.profile_id, profile.id);
    assert_eq!(form.applied(), vec![("First name".to_string(), "Mark".to_string())]);
    assert_eq!(fixture.service.history().load()?.len(), 1);
    assert!(!fixture.service.is_running());
    Ok(())
}

#[test]
fn approval_flows_through_the_channel_while_a_session_runs() -> Result<()> {
    let form = ScriptedForm::new(vec![FormStep::new(
        vec![FieldDescriptor::new("w", "Why this role?", QuestionKind::Text).required()],
        &[Control::Submit],
    )]);
    let fixture = ControlFixture::new(MockProvider::returning("Growth"))
        .with_form(form.clone());
    let service = fixture
        .service
        .clone()
        .with_approval_timeout(Duration::from_secs(5));
    let profile = fixture.harness.seed_profile(service.store());

    let handle = service
        .handle(InboundMessage::StartAutomation {
            profile_id: profile.id.clone(),
            job_url: "https://jobs.example/42".into(),
        })
        .expect("session thread started");
    assert!(wait_until(|| service.approvals().pending_count() == 1));

    assert!(service
        .handle(InboundMessage::StartAutomation {
            profile_id: profile.id.clone(),
            job_url: "https://jobs.example/43".into(),
        })
        .is_none());
    assert!(fixture
        .sink
        .errors()
        .iter()
        .any(|e| e.contains("already running")));

    service.handle(InboundMessage::ApprovalResponse(ApprovalResponse {
        question: "Why this role?".into(),
        answer: Some("Growth and ownership".into()),
        save_to_profile: true,
    }));
    handle.join().expect("session thread panicked");

    assert_eq!(
        form.applied(),
        vec![(
            "Why this role?".to_string(),
            "Growth and ownership".to_string()
        )]
    );
    let stored = service.store().get(&profile.id)?.expect("profile persisted");
    assert_eq!(stored.question_cache["Why this role?"], "Growth and ownership");
    let record = &service.history().load()?[0];
    assert_eq!(record.qa_log[0].source, AnswerSource::Human);
    Ok(())
}
