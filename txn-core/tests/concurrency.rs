use std::{
    collections::{HashMap, HashSet},
    sync::{Arc, Barrier},
    thread,
};

use txn_core::{
    Run, TimedUnit,
    artifact_store::{ArtifactStore, MemoryStore},
    config::RunConfig,
    named_counter::NamedCounter,
};

const GROUPS: usize = 16;
const PER_GROUP: usize = 200;

fn populated_run() -> Arc<Run> {
    let run = Run::new(RunConfig::default(), NamedCounter::new());
    for group in 0..GROUPS {
        for idx in 0..PER_GROUP {
            run.set_completed(&format!("g{group}-{idx}"), 1).unwrap();
        }
    }
    Arc::new(run)
}

fn label_counts(run: &Run) -> HashMap<String, usize> {
    let mut counts = HashMap::new();
    for unit in run.aggregate().subresults {
        *counts.entry(unit.label().to_owned()).or_default() += 1;
    }
    counts
}

#[test]
fn concurrent_disjoint_deletes() {
    let run = populated_run();
    let barrier = Arc::new(Barrier::new(GROUPS / 2));

    // every even group is deleted by its own thread
    let handles = (0..GROUPS)
        .filter(|group| group % 2 == 0)
        .map(|group| {
            let run = Arc::clone(&run);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                let prefix = format!("g{group}-");
                run.delete_matching(&move |u: &TimedUnit| u.label().starts_with(&prefix))
            })
        })
        .collect::<Vec<_>>();

    for handle in handles {
        assert_eq!(handle.join().unwrap(), PER_GROUP);
    }

    let counts = label_counts(&run);
    assert_eq!(counts.len(), GROUPS / 2 * PER_GROUP);
    assert!(counts.values().all(|n| *n == 1), "duplicated entries");
    for group in (0..GROUPS).filter(|group| group % 2 == 1) {
        for idx in 0..PER_GROUP {
            assert_eq!(counts.get(&format!("g{group}-{idx}")), Some(&1));
        }
    }
}

#[test]
fn deletes_interleaved_with_appends() {
    let run = populated_run();
    let barrier = Arc::new(Barrier::new(GROUPS));

    let mut handles = Vec::new();
    for group in 0..GROUPS / 2 {
        let run = Arc::clone(&run);
        let barrier = Arc::clone(&barrier);
        handles.push(thread::spawn(move || {
            barrier.wait();
            run.delete_prefixed(&format!("g{group}-")).unwrap();
        }));
    }
    for writer in 0..GROUPS / 2 {
        let run = Arc::clone(&run);
        let barrier = Arc::clone(&barrier);
        handles.push(thread::spawn(move || {
            barrier.wait();
            for idx in 0..PER_GROUP {
                let label = format!("new{writer}-{idx}");
                run.start(&label).unwrap();
                run.end(&label).unwrap();
            }
        }));
    }
    for handle in handles {
        handle.join().unwrap();
    }

    let counts = label_counts(&run);
    // deleted groups are gone, untouched groups and every appended unit remain once
    assert_eq!(counts.len(), GROUPS * PER_GROUP);
    assert!(counts.values().all(|n| *n == 1));
    assert!(counts.keys().all(|label| {
        label.starts_with("new")
            || label[1..]
                .split('-')
                .next()
                .and_then(|g| g.parse::<usize>().ok())
                .is_some_and(|g| g >= GROUPS / 2)
    }));
}

#[test]
fn auxiliary_threads_share_a_run() {
    let run = Arc::new(Run::new(RunConfig::default(), NamedCounter::new()));
    let handles = (0..8)
        .map(|worker| {
            let run = Arc::clone(&run);
            thread::spawn(move || {
                for idx in 0..50 {
                    let label = format!("w{worker}-{idx}");
                    run.start(&label).unwrap();
                    run.end(&label).unwrap();
                }
            })
        })
        .collect::<Vec<_>>();
    for handle in handles {
        handle.join().unwrap();
    }

    let report = run.teardown();
    assert!(report.failed_in_flight.is_empty());
    assert!(report.outcome.is_pass());
    assert_eq!(run.aggregate().subresults.len(), 400);
}

#[test]
fn concurrent_runs_share_counter_without_collisions() {
    let counter = NamedCounter::new();
    let store: Arc<dyn ArtifactStore> = Arc::new(MemoryStore::new());

    let handles = (0..8)
        .map(|_| {
            let counter = counter.clone();
            let store = Arc::clone(&store);
            thread::spawn(move || {
                let run = Run::with_store(RunConfig::default(), counter, Some(store));
                run.start("same-label").unwrap();
                (0..100)
                    .map(|_| run.reserve_name("shot", "png").unwrap())
                    .collect::<Vec<_>>()
            })
        })
        .collect::<Vec<_>>();

    let mut names = HashSet::new();
    for handle in handles {
        for name in handle.join().unwrap() {
            assert!(names.insert(name), "duplicate artifact name");
        }
    }
    assert_eq!(names.len(), 800);
}
