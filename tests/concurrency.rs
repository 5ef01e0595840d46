//! Races on the commit path: concurrent submissions of equivalent mail
//! must resolve to a single canonical entry.

mod common;

use std::sync::{Arc, Barrier};
use std::thread;

use tempfile::TempDir;

use common::{build_service, deferred_settings, email, test_settings};

#[test]
fn concurrent_identical_submissions_commit_once() {
    const WORKERS: usize = 8;

    let dir = TempDir::new().unwrap();
    let service = Arc::new(build_service(&test_settings(&dir)));
    let barrier = Arc::new(Barrier::new(WORKERS));

    let handles: Vec<_> = (0..WORKERS)
        .map(|_| {
            let service = Arc::clone(&service);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                let message = email("Invoice payment request #1", "Please settle invoice #1.");
                barrier.wait();
                service.process(&message).unwrap()
            })
        })
        .collect();

    let outcomes: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    let committed = outcomes.iter().filter(|o| !o.is_duplicate).count();
    let duplicates = outcomes.iter().filter(|o| o.is_duplicate).count();

    assert_eq!(committed, 1, "exactly one submission may commit");
    assert_eq!(duplicates, WORKERS - 1);
    assert_eq!(service.stats().entry_count, 1);

    // Every duplicate response references the one canonical entry
    for outcome in outcomes.iter().filter(|o| o.is_duplicate) {
        assert_eq!(
            outcome.similar_matches[0].subject,
            "Invoice payment request #1"
        );
        assert!(outcome.similar_matches[0].similarity >= 0.99);
    }
}

#[test]
fn concurrent_mixed_workload_keeps_one_entry_per_text() {
    const DISTINCT: usize = 4;
    const REPEATS: usize = 5;

    let dir = TempDir::new().unwrap();
    let service = Arc::new(build_service(&test_settings(&dir)));
    let barrier = Arc::new(Barrier::new(DISTINCT * REPEATS));

    let handles: Vec<_> = (0..DISTINCT * REPEATS)
        .map(|i| {
            let service = Arc::clone(&service);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                let n = i % DISTINCT;
                let message = email(
                    &format!("Subject variant number {n}"),
                    &format!("Body text for distinct email variant number {n}."),
                );
                barrier.wait();
                service.process(&message).unwrap()
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }

    let stats = service.stats();
    assert_eq!(
        stats.entry_count, DISTINCT,
        "each distinct text commits exactly once"
    );
    assert_eq!(
        stats.entry_count, stats.record_count,
        "index and store stay paired under races"
    );
}

#[test]
fn deferred_mode_concurrent_commits_all_survive_restart() {
    const DISTINCT: usize = 6;

    let dir = TempDir::new().unwrap();
    // Long delay: every snapshot is still queued when the service shuts
    // down, so the drain must pick the one covering all commits even if
    // the off-lock channel sends arrived out of commit order
    let settings = deferred_settings(&dir, 10_000);

    {
        let service = Arc::new(build_service(&settings));
        let barrier = Arc::new(Barrier::new(DISTINCT));

        let handles: Vec<_> = (0..DISTINCT)
            .map(|n| {
                let service = Arc::clone(&service);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    let message = email(
                        &format!("Subject variant number {n}"),
                        &format!("Body text for distinct email variant number {n}."),
                    );
                    barrier.wait();
                    service.process(&message).unwrap()
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(service.stats().entry_count, DISTINCT);
    }

    let service = build_service(&settings);
    assert_eq!(
        service.stats().entry_count,
        DISTINCT,
        "a racing flush must not persist a snapshot missing later commits"
    );
    for n in 0..DISTINCT {
        let outcome = service
            .process(&email(
                &format!("Subject variant number {n}"),
                &format!("Body text for distinct email variant number {n}."),
            ))
            .unwrap();
        assert!(outcome.is_duplicate, "entry {n} was lost across restart");
    }
}

#[test]
fn sequential_resubmission_after_race_still_deduplicates() {
    let dir = TempDir::new().unwrap();
    let service = Arc::new(build_service(&test_settings(&dir)));

    let message = email("Reimbursement claim", "Taxi receipts attached.");

    let racers: Vec<_> = (0..4)
        .map(|_| {
            let service = Arc::clone(&service);
            let message = message.clone();
            thread::spawn(move || service.process(&message).unwrap())
        })
        .collect();
    for handle in racers {
        handle.join().unwrap();
    }

    let outcome = service.process(&message).unwrap();
    assert!(outcome.is_duplicate);
    assert_eq!(outcome.request_type, "REIMBURSEMENT");
    assert_eq!(service.stats().entry_count, 1);
}
