use super::common::*;
use crate::config::StorageConfig;
use crate::registration::domain::OptionId;
use crate::registration::engine::RejectionReason;
use crate::registration::store::InMemoryStore;
use crate::registration::{RegistrationError, RegistrationService};
use std::sync::atomic::Ordering;
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;

fn race<F>(contenders: usize, attempt: F) -> Vec<Result<(), RegistrationError>>
where
    F: Fn() -> Result<(), RegistrationError> + Send + Sync + 'static,
{
    let attempt = Arc::new(attempt);
    let start = Arc::new(Barrier::new(contenders));
    let handles: Vec<_> = (0..contenders)
        .map(|_| {
            let attempt = Arc::clone(&attempt);
            let start = Arc::clone(&start);
            thread::spawn(move || {
                start.wait();
                attempt()
            })
        })
        .collect();

    handles
        .into_iter()
        .map(|handle| handle.join().expect("contender thread"))
        .collect()
}

#[test]
fn two_racers_for_the_last_seat_get_one_confirmation() {
    let (service, store) = build_service();
    service.save_schema(single_seat()).expect("saves");
    let service = Arc::new(service);

    let results = {
        let service = Arc::clone(&service);
        race(2, move || service.submit(ids(&[0])).map(|_| ()))
    };

    let admitted = results.iter().filter(|result| result.is_ok()).count();
    let exceeded = results
        .iter()
        .filter(|result| {
            matches!(
                result,
                Err(RegistrationError::Rejected(RejectionReason::QuotaExceeded(
                    OptionId(0)
                )))
            )
        })
        .count();
    assert_eq!(admitted, 1);
    assert_eq!(exceeded, 1);
    assert_eq!(ledger_of(&store).consumed(OptionId(0)), 1);
}

#[test]
fn heavy_contention_never_oversells() {
    let store = InMemoryStore::new();
    let service = Arc::new(RegistrationService::with_settings(
        Arc::new(store.clone()),
        Arc::new(store.clone()),
        &StorageConfig {
            lock_timeout: Duration::from_secs(30),
            ..StorageConfig::default()
        },
    ));
    service.save_schema(city_and_session()).expect("saves");

    let results = {
        let service = Arc::clone(&service);
        race(48, move || service.submit(ids(&[1, 2])).map(|_| ()))
    };

    // Morning (id 2) holds two seats, Shanghai (id 1) five.
    assert_eq!(results.iter().filter(|result| result.is_ok()).count(), 2);
    let ledger = ledger_of(&store);
    assert_eq!(ledger.consumed(OptionId(2)), 2);
    assert_eq!(ledger.consumed(OptionId(1)), 2);

    let view = service.availability().expect("readable");
    assert!(view
        .questions
        .iter()
        .flat_map(|question| question.options.iter())
        .all(|option| option.consumed <= u64::from(option.quota)));
}

#[test]
fn submissions_racing_a_schema_replacement_match_their_recorded_version() {
    let (service, store) = build_service();
    service.save_schema(city_and_session()).expect("saves");
    let service = Arc::new(service);

    let submitter = {
        let service = Arc::clone(&service);
        thread::spawn(move || {
            for _ in 0..20 {
                let _ = service.submit(ids(&[0, 3]));
            }
        })
    };
    let admin = {
        let service = Arc::clone(&service);
        thread::spawn(move || {
            for _ in 0..5 {
                service.save_schema(city_and_session()).expect("saves");
            }
        })
    };
    submitter.join().expect("submitter thread");
    admin.join().expect("admin thread");

    // Version 1 is the only form that contained ids 0 and 3.
    let ledger = ledger_of(&store);
    assert!(ledger.entries.iter().all(|entry| entry.schema_version == 1));
}

#[test]
fn contended_gate_fails_fast_with_busy() {
    let schemas = Arc::new(InMemoryStore::new());
    let ledger = Arc::new(StallingLedger::new(Duration::from_millis(300)));
    let service = Arc::new(RegistrationService::with_settings(
        schemas,
        ledger.clone(),
        &StorageConfig {
            lock_timeout: Duration::from_millis(25),
            ..StorageConfig::default()
        },
    ));
    service
        .save_schema(vec![question("Seats", vec![option("Row A", 10)])])
        .expect("saves");

    let holder = {
        let service = Arc::clone(&service);
        thread::spawn(move || service.submit(ids(&[0])).map(|_| ()))
    };
    while !ledger.entered.load(Ordering::SeqCst) {
        thread::yield_now();
    }

    match service.submit(ids(&[0])) {
        Err(err @ RegistrationError::Busy(_)) => assert!(err.is_retryable()),
        other => panic!("expected busy, got {other:?}"),
    }

    holder
        .join()
        .expect("holder thread")
        .expect("holder admitted");
}
