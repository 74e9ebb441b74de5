use anyhow::Result;
use autoapply::navigation::{Control, Navigator, SessionExit, SessionState};
use autoapply::notifications::MemorySink;
use autoapply::resolver::{Resolver, ResolverOptions};
use std::sync::atomic::AtomicBool;

use crate::support::mocks::{MockProvider, NoopSleeper};
use crate::support::scripted_form::{FormStep, ScriptedForm};
use crate::{fast_navigation, IntegrationHarness};

#[test]
fn next_only_form_is_stuck_at_exactly_the_budget() -> Result<()> {
    let harness = IntegrationHarness::new();
    let store = harness.store();
    let history = harness.history();
    let mut profile = harness.seed_profile(&store);
    let sink = MemorySink::new();
    let ai = MockProvider::silent();
    let resolver = Resolver::new(&store, &sink, ResolverOptions::default()).with_provider(&ai);
    let navigator = Navigator::new(&resolver, &history, &NoopSleeper, fast_navigation(10));
    let mut form = ScriptedForm::endless_next();

    let outcome = navigator.run(&mut form, &mut profile, "https://jobs.example/loop")?;

    assert!(matches!(outcome.summary.exit, SessionExit::Stuck(_)));
    assert_eq!(outcome.summary.steps, 10);
    assert_eq!(outcome.summary.state, SessionState::Discarded);
    assert!(outcome.summary.state.is_terminal());
    assert_eq!(
        outcome.transitions,
        vec![
            SessionState::Init,
            SessionState::Filling,
            SessionState::Stuck,
            SessionState::Discarded
        ]
    );
    assert_eq!(
        form.activated().iter().filter(|c| **c == Control::Next).count(),
        10
    );
    assert!(outcome.record.is_none());
    assert!(history.load()?.is_empty());
    assert_eq!(sink.errors().len(), 1, "stuck session reports one error");
    Ok(())
}

#[test]
fn missing_controls_discard_the_application() -> Result<()> {
    let harness = IntegrationHarness::new();
    let store = harness.store();
    let history = harness.history();
    let mut profile = harness.seed_profile(&store);
    let sink = MemorySink::new();
    let resolver = Resolver::new(&store, &sink, ResolverOptions::default());
    let navigator = Navigator::new(&resolver, &history, &NoopSleeper, fast_navigation(25));
    let mut form = ScriptedForm::new(vec![FormStep::new(
        Vec::new(),
        &[Control::Dismiss, Control::ConfirmDiscard],
    )]);

    let outcome = navigator.run(&mut form, &mut profile, "https://jobs.example/dead-end")?;

    assert!(matches!(outcome.summary.exit, SessionExit::Stuck(_)));
    assert_eq!(outcome.summary.steps, 1);
    assert_eq!(form.activated(), vec![Control::Dismiss, Control::ConfirmDiscard]);
    Ok(())
}

#[test]
fn validation_errors_retry_within_the_budget() -> Result<()> {
    let harness = IntegrationHarness::new();
    let store = harness.store();
    let history = harness.history();
    let mut profile = harness.seed_profile(&store);
    let sink = MemorySink::new();
    let resolver = Resolver::new(&store, &sink, ResolverOptions::default());
    let navigator = Navigator::new(&resolver, &history, &NoopSleeper, fast_navigation(3));
    let mut form = ScriptedForm::new(vec![FormStep::default().with_validation_error()]);

    let outcome = navigator.run(&mut form, &mut profile, "https://jobs.example/invalid")?;

    assert!(matches!(outcome.summary.exit, SessionExit::Stuck(_)));
    assert_eq!(outcome.summary.steps, 3);
    assert_eq!(form.log.lock().unwrap().field_reads, 3);
    let retries = sink
        .log_lines()
        .into_iter()
        .filter(|line| line.contains("Validation error"))
        .count();
    assert_eq!(retries, 3);
    Ok(())
}

#[test]
fn stop_flag_cancels_at_the_next_step_boundary() -> Result<()> {
    let harness = IntegrationHarness::new();
    let store = harness.store();
    let history = harness.history();
    let mut profile = harness.seed_profile(&store);
    let sink = MemorySink::new();
    let resolver = Resolver::new(&store, &sink, ResolverOptions::default());
    let stop = AtomicBool::new(true);
    let navigator = Navigator::new(&resolver, &history, &NoopSleeper, fast_navigation(10))
        .with_stop_flag(&stop);
    let mut form = ScriptedForm::endless_next();

    let outcome = navigator.run(&mut form, &mut profile, "https://jobs.example/stop")?;

    assert_eq!(outcome.summary.exit, SessionExit::Cancelled);
    assert_eq!(outcome.summary.steps, 0);
    assert_eq!(outcome.summary.state, SessionState::Discarded);
    assert!(sink.errors().is_empty());
    Ok(())
}

#[test]
fn driver_failure_ends_in_error_then_discard() -> Result<()> {
    let harness = IntegrationHarness::new();
    let store = harness.store();
    let history = harness.history();
    let mut profile = harness.seed_profile(&store);
    let sink = MemorySink::new();
    let resolver = Resolver::new(&store, &sink, ResolverOptions::default());
    let navigator = Navigator::new(&resolver, &history, &NoopSleeper, fast_navigation(10));
    let mut form = ScriptedForm::failing();

    let outcome = navigator.run(&mut form, &mut profile, "https://jobs.example/broken")?;

    match &outcome.summary.exit {
        SessionExit::Error(reason) => assert!(reason.contains("page detached"), "{reason}"),
        other => panic!("unexpected exit {other:?}"),
    }
    assert!(outcome.transitions.contains(&SessionState::Error));
    assert_eq!(outcome.summary.state, SessionState::Discarded);
    assert_eq!(sink.errors().len(), 1);
    Ok(())
}
