//! Cross-cutting invariants, checked with generated operation histories

use crate::common::*;
use proptest::prelude::*;
use tessera::{current_generation, next_generation, ObjectRef};

#[derive(Debug, Clone)]
enum Step {
    Set(u8, i64),
    Delete(u8),
    Read(u8),
}

fn step_strategy() -> impl Strategy<Value = Step> {
    prop_oneof![
        (0u8..4, any::<i64>()).prop_map(|(k, v)| Step::Set(k, v)),
        (0u8..4).prop_map(Step::Delete),
        (0u8..4).prop_map(Step::Read),
    ]
}

fn key(k: u8) -> String {
    format!("k{}", k)
}

fn apply(obj: &ObjectRef, step: &Step) -> Result<()> {
    match step {
        Step::Set(k, v) => obj.set(&key(*k), *v),
        Step::Delete(k) => obj.delete(&key(*k)).map(|_| ()),
        Step::Read(k) => obj.get(&key(*k)).map(|_| ()),
    }
}

fn writes(steps: &[Step]) -> bool {
    steps.iter().any(|s| !matches!(s, Step::Read(_)))
}

// ============================================================================
// Generation clock
// ============================================================================

#[test]
fn test_generation_clock_is_monotonic() {
    let a = next_generation();
    let b = next_generation();
    assert!(b > a);
    assert!(current_generation() >= b);
}

proptest! {
    #[test]
    fn prop_target_generation_strictly_increases(
        steps in prop::collection::vec(step_strategy(), 1..20),
    ) {
        let stm = Stm::new();
        let obj = stm.wrap_object(RawNode::object()).unwrap();
        let mut last = stm.generation_of(obj.handle()).unwrap();
        for step in &steps {
            apply(&obj, step).unwrap();
            let now = stm.generation_of(obj.handle()).unwrap();
            if matches!(step, Step::Read(_)) {
                prop_assert_eq!(now, last);
            } else {
                prop_assert!(now > last);
            }
            last = now;
        }
    }

    #[test]
    fn prop_committed_generation_exceeds_previous(
        batches in prop::collection::vec(prop::collection::vec(step_strategy(), 1..6), 1..6),
    ) {
        let stm = Stm::new();
        let obj = stm.wrap_object(RawNode::object()).unwrap();
        let mut last = stm.generation_of(obj.handle()).unwrap();
        for batch in &batches {
            stm.in_transaction(|| batch.iter().try_for_each(|s| apply(&obj, s))).unwrap();
            let now = stm.generation_of(obj.handle()).unwrap();
            if writes(batch) {
                prop_assert!(now > last);
            } else {
                prop_assert_eq!(now, last);
            }
            last = now;
        }
    }

    // ========================================================================
    // Atomicity
    // ========================================================================

    #[test]
    fn prop_abort_leaves_no_trace(
        steps in prop::collection::vec(step_strategy(), 1..20),
    ) {
        let stm = Stm::new();
        let obj = stm
            .wrap_object(RawNode::object_from([("k0", 0), ("k1", 1)]))
            .unwrap();
        let before = obj.entries().unwrap();
        let generation = stm.generation_of(obj.handle()).unwrap();

        let result: Result<()> = stm.in_transaction(|| {
            for step in &steps {
                apply(&obj, step)?;
            }
            Err(Error::invalid_usage("abort"))
        });

        prop_assert!(result.is_err());
        prop_assert_eq!(obj.entries().unwrap(), before);
        prop_assert_eq!(stm.generation_of(obj.handle()).unwrap(), generation);
    }

    #[test]
    fn prop_committed_matches_direct(
        steps in prop::collection::vec(step_strategy(), 0..20),
    ) {
        let stm = Stm::new();
        let direct = stm.wrap_object(RawNode::object()).unwrap();
        let staged = stm.wrap_object(RawNode::object()).unwrap();

        for step in &steps {
            apply(&direct, step).unwrap();
        }
        stm.in_transaction(|| steps.iter().try_for_each(|s| apply(&staged, s))).unwrap();

        prop_assert_eq!(direct.entries().unwrap(), staged.entries().unwrap());
    }

    // ========================================================================
    // Serializability of overlapping transactions
    // ========================================================================

    #[test]
    fn prop_overlapping_writers_never_both_commit(
        first in prop::collection::vec(step_strategy(), 1..6),
        second in prop::collection::vec(step_strategy(), 1..6),
    ) {
        let stm = Stm::new();
        let obj = stm.wrap_object(RawNode::object()).unwrap();
        let t1 = stm.transaction();
        let t2 = stm.transaction();

        within(&t1, || first.iter().try_for_each(|s| apply(&obj, s))).unwrap();
        within(&t2, || second.iter().try_for_each(|s| apply(&obj, s))).unwrap();

        let c1 = t1.commit();
        let c2 = t2.commit();
        t1.dispose();
        t2.dispose();

        prop_assert!(c1.is_ok());
        if writes(&first) {
            prop_assert!(c2.unwrap_err().is_conflict());
        } else {
            prop_assert!(c2.is_ok());
        }
    }
}
