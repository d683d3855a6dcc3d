//! Property tests for the knowledge store lifecycle
//!
//! Tenet: counters only move through methods that keep
//! `success_count <= usage_count`, whatever the order of operations.

use lodestar_knowledge::{KnowledgeStore, KnowledgeTier, PlanTemplate};
use lodestar_plan::Plan;
use proptest::prelude::*;
use std::sync::Arc;
use std::thread;

const REQUESTS: [&str; 5] = [
    "grid of boxes",
    "twisted tower floors",
    "boxes on a surface",
    "sort the list",
    "tower facade panels",
];

#[derive(Debug, Clone)]
enum Op {
    Learn(usize),
    Fail(usize),
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0..REQUESTS.len()).prop_map(Op::Learn),
        (0..REQUESTS.len()).prop_map(Op::Fail),
    ]
}

fn template() -> PlanTemplate {
    PlanTemplate::new("t", Plan::empty())
}

proptest! {
    #[test]
    fn prop_success_never_exceeds_usage(ops in proptest::collection::vec(op(), 0..40)) {
        let store = KnowledgeStore::in_memory();
        for op in ops {
            match op {
                Op::Learn(i) => {
                    store.learn(REQUESTS[i], "create", template(), vec![], vec![]).unwrap();
                }
                Op::Fail(i) => {
                    store.record_failure(REQUESTS[i]).unwrap();
                }
            }
        }
        for exp in store.list(KnowledgeTier::Personal).unwrap() {
            prop_assert!(exp.success_count() <= exp.usage_count());
            prop_assert!((0.0..=1.0).contains(&exp.success_rate()));
        }
    }

    #[test]
    fn prop_search_is_repeatable(ops in proptest::collection::vec(0..REQUESTS.len(), 1..10)) {
        let store = KnowledgeStore::in_memory();
        for i in ops {
            store.learn(REQUESTS[i], "create", template(), vec![], vec![]).unwrap();
        }
        let a = store.search_text("boxes grid", None).unwrap();
        let b = store.search_text("boxes grid", None).unwrap();
        prop_assert_eq!(a, b);
    }
}

#[test]
fn concurrent_learn_keeps_one_record_per_request() {
    let store = Arc::new(KnowledgeStore::in_memory());
    let handles: Vec<_> = (0..8)
        .map(|_| {
            let store = Arc::clone(&store);
            thread::spawn(move || {
                for _ in 0..10 {
                    store
                        .learn("grid of boxes", "create", template(), vec![], vec![])
                        .unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let personal = store.list(KnowledgeTier::Personal).unwrap();
    assert_eq!(personal.len(), 1);
    assert_eq!(personal[0].usage_count(), 80);
    assert_eq!(personal[0].success_count(), 80);
}

#[test]
fn concurrent_learn_and_failure_keep_counters_consistent() {
    let store = Arc::new(KnowledgeStore::in_memory());
    let seeded = store
        .learn("grid of boxes", "create", template(), vec![], vec![])
        .unwrap();

    let handles: Vec<_> = (0..8)
        .map(|worker| {
            let store = Arc::clone(&store);
            thread::spawn(move || {
                for round in 0..10 {
                    // alternate which call goes first so the two interleave
                    if (worker + round) % 2 == 0 {
                        store
                            .learn("grid of boxes", "create", template(), vec![], vec![])
                            .unwrap();
                        store.record_failure("grid of boxes").unwrap();
                    } else {
                        store.record_failure("grid of boxes").unwrap();
                        store
                            .learn("grid of boxes", "create", template(), vec![], vec![])
                            .unwrap();
                    }
                    let (_, current) = store.get(seeded.id).unwrap().unwrap();
                    assert!(current.success_count() <= current.usage_count());
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let personal = store.list(KnowledgeTier::Personal).unwrap();
    assert_eq!(personal.len(), 1);
    assert_eq!(personal[0].id, seeded.id);
    assert_eq!(personal[0].usage_count(), 1 + 80 + 80);
    assert_eq!(personal[0].success_count(), 1 + 80);
}
