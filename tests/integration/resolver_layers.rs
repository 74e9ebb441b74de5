use anyhow::Result;
use autoapply::notifications::MemorySink;
use autoapply::resolver::{AnswerSource, Question, QuestionKind, Resolver, ResolverOptions};

use crate::support::mocks::MockProvider;
use crate::IntegrationHarness;

#[test]
fn direct_field_answers_without_cache_or_ai() -> Result<()> {
    let harness = IntegrationHarness::new();
    let store = harness.store();
    let mut profile = harness.seed_profile(&store);
    profile
        .question_cache
        .insert("first name *".into(), "Bogus".into());
    let sink = MemorySink::new();
    let ai = MockProvider::returning("Nope");
    let resolver = Resolver::new(&store, &sink, ResolverOptions::default()).with_provider(&ai);

    for label in ["First Name *", "Legal first name", "first name"] {
        let resolved = resolver.resolve(&Question::new(label, QuestionKind::Text), &mut profile);
        assert_eq!(resolved.answer.as_deref(), Some("Mark"), "label {label}");
        assert_eq!(resolved.source, AnswerSource::ProfileField);
    }
    assert_eq!(ai.calls(), 0);
    Ok(())
}

#[test]
fn normalized_cache_hit_skips_ai() -> Result<()> {
    let harness = IntegrationHarness::new();
    let store = harness.store();
    let mut profile = harness.seed_profile(&store);
    profile
        .question_cache
        .insert("what is your notice period?".into(), "2 weeks".into());
    let sink = MemorySink::new();
    let ai = MockProvider::returning("1 month");
    let resolver = Resolver::new(&store, &sink, ResolverOptions::default()).with_provider(&ai);

    let resolved = resolver.resolve(
        &Question::new("  What is your NOTICE period?  ", QuestionKind::Text),
        &mut profile,
    );
    assert_eq!(resolved.answer.as_deref(), Some("2 weeks"));
    assert_eq!(resolved.source, AnswerSource::Cache);
    assert_eq!(ai.calls(), 0);
    Ok(())
}

#[test]
fn learned_answer_is_stable_across_resolutions() -> Result<()> {
    let harness = IntegrationHarness::new();
    let store = harness.store();
    let mut profile = harness.seed_profile(&store);
    let sink = MemorySink::new();
    let ai = MockProvider::returning("I enjoy the product");
    let options = ResolverOptions {
        auto_save: true,
        normalize_learned_keys: true,
        ..ResolverOptions::default()
    };
    let resolver = Resolver::new(&store, &sink, options).with_provider(&ai);
    let question = Question::new("Why do you want to work here?", QuestionKind::Text);

    let first = resolver.resolve(&question, &mut profile);
    let second = resolver.resolve(&question, &mut profile);
    assert_eq!(first.answer, second.answer);
    assert_eq!(first.source, AnswerSource::Ai);
    assert_eq!(second.source, AnswerSource::Cache);
    assert_eq!(ai.calls(), 1);

    let stored = store.get(&profile.id)?.expect("profile persisted");
    assert_eq!(
        stored.question_cache.get("why do you want to work here?").map(String::as_str),
        Some("I enjoy the product")
    );
    Ok(())
}

#[test]
fn raw_key_learning_is_invisible_to_normalized_lookup() -> Result<()> {
    let harness = IntegrationHarness::new();
    let store = harness.store();
    let mut profile = harness.seed_profile(&store);
    let sink = MemorySink::new();
    let ai = MockProvider::returning("Remote");
    let options = ResolverOptions {
        auto_save: true,
        ..ResolverOptions::default()
    };
    let resolver = Resolver::new(&store, &sink, options).with_provider(&ai);
    let question = Question::new("Preferred Work Arrangement", QuestionKind::Text);

    let first = resolver.resolve(&question, &mut profile);
    let second = resolver.resolve(&question, &mut profile);
    assert_eq!(first.answer, second.answer);
    assert_eq!(ai.calls(), 2, "raw-key write should not satisfy the normalized lookup");
    assert!(profile.question_cache.contains_key("Preferred Work Arrangement"));
    Ok(())
}

#[test]
fn silent_ai_without_approvals_leaves_field_blank() -> Result<()> {
    let harness = IntegrationHarness::new();
    let store = harness.store();
    let mut profile = harness.seed_profile(&store);
    let sink = MemorySink::new();
    let ai = MockProvider::silent();
    let resolver = Resolver::new(&store, &sink, ResolverOptions::default()).with_provider(&ai);

    let resolved = resolver.resolve(
        &Question::new("Describe a challenging project", QuestionKind::Text),
        &mut profile,
    );
    assert!(!resolved.is_resolved());
    assert_eq!(resolved.source, AnswerSource::None);
    assert_eq!(ai.calls(), 1);
    assert!(sink.errors().is_empty());
    Ok(())
}

#[test]
fn react_experience_comes_from_heuristic() -> Result<()> {
    let harness = IntegrationHarness::new();
    let store = harness.store();
    let mut profile = autoapply::Profile::new("Mark", "");
    profile.experience.insert("react".into(), 5);
    store.save(&profile)?;
    let sink = MemorySink::new();
    let ai = MockProvider::returning("10");
    let resolver = Resolver::new(&store, &sink, ResolverOptions::default()).with_provider(&ai);

    let resolved = resolver.resolve(
        &Question::new(
            "How many years of React experience do you have?",
            QuestionKind::Number,
        ),
        &mut profile,
    );
    assert_eq!(resolved.answer.as_deref(), Some("5"));
    assert_eq!(resolved.source, AnswerSource::Heuristic);
    assert_eq!(ai.calls(), 0);
    Ok(())
}
