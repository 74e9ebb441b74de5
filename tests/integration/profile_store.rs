use anyhow::Result;
use autoapply::profiles::{Profile, ProfileStore};
use std::fs;
use std::sync::Arc;
use std::thread;

use crate::IntegrationHarness;

#[test]
fn save_get_and_delete_profiles() -> Result<()> {
    let harness = IntegrationHarness::new();
    let store = harness.store();
    assert!(store.load_all()?.is_empty());

    let first = harness.seed_profile(&store);
    let second = Profile::new("Ada", "Lovelace");
    let outcome = store.save(&second)?;
    assert_eq!(outcome.hash.len(), 64);
    assert_eq!(outcome.path, harness.paths.profiles_file());

    assert_eq!(store.list()?.len(), 2);
    let loaded = store.get(&first.id)?.expect("seeded profile");
    assert_eq!(loaded.email, "mark@test.com");
    assert!(loaded.updated_at >= first.updated_at);

    assert!(store.delete(&first.id)?);
    assert!(!store.delete(&first.id)?);
    assert!(store.get(&first.id)?.is_none());
    assert!(store.get(&second.id)?.is_some());
    Ok(())
}

#[test]
fn blank_store_file_reads_as_empty() -> Result<()> {
    let harness = IntegrationHarness::new();
    fs::write(harness.paths.profiles_file(), "  \n")?;
    assert!(harness.store().load_all()?.is_empty());
    Ok(())
}

#[test]
fn profile_without_id_is_rejected() {
    let harness = IntegrationHarness::new();
    let err = harness
        .store()
        .save(&Profile::default())
        .expect_err("empty id");
    assert!(err.to_string().contains("without an id"));
}

#[test]
fn learn_answer_respects_overwrite() -> Result<()> {
    let harness = IntegrationHarness::new();
    let store = harness.store();
    let profile = harness.seed_profile(&store);

    assert!(store
        .learn_answer(&profile.id, "Notice period", "2 weeks", false)?
        .is_some());
    assert!(store
        .learn_answer(&profile.id, "Notice period", "1 month", false)?
        .is_none());
    let stored = store.get(&profile.id)?.expect("profile");
    assert_eq!(stored.question_cache["Notice period"], "2 weeks");

    store.learn_answer(&profile.id, "Notice period", "1 month", true)?;
    let stored = store.get(&profile.id)?.expect("profile");
    assert_eq!(stored.question_cache["Notice period"], "1 month");

    assert!(store
        .learn_answer("no-such-profile", "Q", "A", true)
        .is_err());
    Ok(())
}

#[test]
fn concurrent_learning_keeps_every_key() -> Result<()> {
    let harness = IntegrationHarness::new();
    let store = Arc::new(ProfileStore::open(harness.paths.profiles_file()));
    let profile = harness.seed_profile(&store);

    let workers: Vec<_> = (0..4)
        .map(|worker| {
            let store = store.clone();
            let id = profile.id.clone();
            thread::spawn(move || {
                for n in 0..10 {
                    store
                        .learn_answer(&id, &format!("Question {worker}-{n}"), "yes", true)
                        .expect("learn");
                }
            })
        })
        .collect();
    for worker in workers {
        worker.join().expect("worker panicked");
    }

    let stored = store.get(&profile.id)?.expect("profile");
    assert_eq!(stored.question_cache.len(), 40);
    Ok(())
}

#[test]
fn malformed_store_is_reported_with_its_path() {
    let harness = IntegrationHarness::new();
    fs::write(harness.paths.profiles_file(), "{not json").expect("write");
    let err = harness.store().load_all().expect_err("malformed");
    assert!(format!("{err:#}").contains("profiles.json"));
}
