//! Sequence wrappers under every scenario, plus a model-based property test

use crate::common::*;
use proptest::prelude::*;
use tessera::{ChangeKind, SequenceRef};

fn sequence(stm: &Stm, values: &[i64]) -> SequenceRef {
    stm.wrap_sequence(RawNode::sequence(values.iter().copied()))
        .unwrap()
}

/// Run one mutation under all three scenarios against a fresh sequence
fn check<A>(initial: &[i64], apply: A, expected: &[i64])
where
    A: Fn(&SequenceRef) -> Result<()>,
{
    for scenario in Scenario::ALL {
        let stm = Stm::new();
        let seq = sequence(&stm, initial);
        scenario.run(&stm, || seq.to_vec().unwrap(), || apply(&seq), ints(expected));
    }
}

// ============================================================================
// Mutations
// ============================================================================

mod mutations {
    use super::*;

    #[test]
    fn test_push() {
        check(&[1, 2], |s| s.push(3).map(|_| ()), &[1, 2, 3]);
    }

    #[test]
    fn test_push_all() {
        check(&[], |s| s.push_all([1, 2, 3]).map(|_| ()), &[1, 2, 3]);
    }

    #[test]
    fn test_pop() {
        check(&[1, 2, 3], |s| s.pop().map(|_| ()), &[1, 2]);
    }

    #[test]
    fn test_shift() {
        check(&[1, 2, 3], |s| s.shift().map(|_| ()), &[2, 3]);
    }

    #[test]
    fn test_unshift() {
        check(&[3], |s| s.unshift_all([1, 2]).map(|_| ()), &[1, 2, 3]);
    }

    #[test]
    fn test_splice() {
        check(&[1, 2, 3, 4], |s| s.splice(1, Some(2), [9]).map(|_| ()), &[1, 9, 4]);
    }

    #[test]
    fn test_splice_negative_start() {
        check(
            &[1, 2, 3, 4],
            |s| s.splice(-1, Some(1), [7, 8]).map(|_| ()),
            &[1, 2, 3, 7, 8],
        );
    }

    #[test]
    fn test_sort() {
        check(&[3, 1, 2], |s| s.sort(), &[1, 2, 3]);
    }

    #[test]
    fn test_sort_by_descending() {
        check(&[3, 1, 2], |s| s.sort_by(|a, b| b.compare(a)), &[3, 2, 1]);
    }

    #[test]
    fn test_reverse() {
        check(&[1, 2, 3], |s| s.reverse(), &[3, 2, 1]);
    }

    #[test]
    fn test_fill() {
        check(&[1, 2, 3, 4], |s| s.fill(0, 1, Some(-1)), &[1, 0, 0, 4]);
    }

    #[test]
    fn test_copy_within() {
        check(&[1, 2, 3, 4, 5], |s| s.copy_within(0, 3, None), &[4, 5, 3, 4, 5]);
    }

    #[test]
    fn test_index_assignment() {
        check(&[1, 2, 3], |s| s.set(1, 20), &[1, 20, 3]);
    }

    #[test]
    fn test_set_len() {
        check(&[1, 2, 3], |s| s.set_len(1), &[1]);
    }
}

// ============================================================================
// Queries inside transactions
// ============================================================================

mod queries {
    use super::*;

    #[test]
    fn test_queries_see_staged_elements() {
        let stm = Stm::new();
        let seq = sequence(&stm, &[1, 2, 3]);
        stm.in_transaction(|| {
            seq.push(4)?;
            assert_eq!(seq.len()?, 4);
            assert_eq!(seq.last()?, Some(Value::Int(4)));
            assert_eq!(seq.slice(2, None)?, ints(&[3, 4]));
            assert!(seq.includes(&Value::Int(4))?);
            assert_eq!(seq.index_of(&Value::Int(4))?, Some(3));
            assert_eq!(seq.join(",")?, "1,2,3,4");
            let total = seq.fold(0, |acc, v, _| acc + v.as_int().unwrap_or(0))?;
            assert_eq!(total, 10);
            Ok(())
        })
        .unwrap();
    }

    #[test]
    fn test_callbacks_may_read_other_wrappers() {
        let stm = Stm::new();
        let seq = sequence(&stm, &[1, 2]);
        let other = sequence(&stm, &[10]);
        let mapped = seq
            .map(|v, _| v.as_int().unwrap() + other.first().unwrap().unwrap().as_int().unwrap())
            .unwrap();
        assert_eq!(mapped, vec![11, 12]);
    }

    #[test]
    fn test_derived_sequences_are_plain() {
        let stm = Stm::new();
        let seq = sequence(&stm, &[1, 2, 3]);
        let evens = seq.filter(|v, _| v.as_int().unwrap() % 2 == 0).unwrap();
        assert_eq!(evens, ints(&[2]));
        assert_eq!(stm.target_count(), 1);
    }
}

// ============================================================================
// Commit changes
// ============================================================================

mod commit_changes {
    use super::*;

    #[test]
    fn test_full_replace_commit() {
        let stm = Stm::new();
        let seq = sequence(&stm, &[1, 2]);
        let (_, commits) = Recorder::install(&stm);
        let before = stm.generation_of(seq.handle()).unwrap();

        let tx = stm.transaction();
        within(&tx, || seq.push(3)).unwrap();
        tx.commit().unwrap();
        tx.dispose();

        assert_eq!(seq.to_vec().unwrap(), ints(&[1, 2, 3]));
        let after = stm.generation_of(seq.handle()).unwrap();
        assert!(after > before);
        assert_eq!(after, tx.generation());

        let commits = commits.borrow();
        assert_eq!(commits.len(), 1);
        assert_eq!(
            commits[0],
            vec![Change::splice(seq.handle(), 0, 2, ints(&[1, 2, 3]))]
        );
    }

    #[test]
    fn test_direct_push_emits_precise_splice() {
        let stm = Stm::new();
        let seq = sequence(&stm, &[1, 2]);
        let seen = std::rc::Rc::new(std::cell::RefCell::new(Vec::new()));

        struct Capture(std::rc::Rc<std::cell::RefCell<Vec<Change>>>);
        impl Hooks for Capture {
            fn on_direct_change(&self, _target: Handle, change: &dyn Fn() -> Change) -> Result<()> {
                self.0.borrow_mut().push(change());
                Ok(())
            }
        }
        stm.set_hooks(std::rc::Rc::new(Capture(seen.clone())));

        seq.push(3).unwrap();
        seq.pop().unwrap();
        seq.reverse().unwrap();

        let seen = seen.borrow();
        assert_eq!(seen[0], Change::splice(seq.handle(), 2, 0, ints(&[3])));
        assert_eq!(seen[1], Change::splice(seq.handle(), 2, 1, vec![]));
        assert_eq!(seen[2].kind, ChangeKind::Reverse);
    }
}

// ============================================================================
// Model-based property test
// ============================================================================

#[derive(Debug, Clone)]
enum Op {
    Push(i64),
    Pop,
    Shift,
    Unshift(i64),
    Reverse,
    Sort,
    Splice(isize, usize, Vec<i64>),
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        any::<i64>().prop_map(Op::Push),
        Just(Op::Pop),
        Just(Op::Shift),
        any::<i64>().prop_map(Op::Unshift),
        Just(Op::Reverse),
        Just(Op::Sort),
        (-8isize..8, 0usize..4, prop::collection::vec(any::<i64>(), 0..3))
            .prop_map(|(start, count, items)| Op::Splice(start, count, items)),
    ]
}

fn apply_model(model: &mut Vec<i64>, op: &Op) {
    match op {
        Op::Push(v) => model.push(*v),
        Op::Pop => {
            model.pop();
        }
        Op::Shift => {
            if !model.is_empty() {
                model.remove(0);
            }
        }
        Op::Unshift(v) => model.insert(0, *v),
        Op::Reverse => model.reverse(),
        Op::Sort => model.sort(),
        Op::Splice(start, count, items) => {
            let len = model.len();
            let start = if *start < 0 {
                len.saturating_sub(start.unsigned_abs())
            } else {
                (*start as usize).min(len)
            };
            let end = (start + count).min(len);
            model.splice(start..end, items.iter().copied());
        }
    }
}

fn apply_wrapper(seq: &SequenceRef, op: &Op) -> Result<()> {
    match op {
        Op::Push(v) => seq.push(*v).map(|_| ()),
        Op::Pop => seq.pop().map(|_| ()),
        Op::Shift => seq.shift().map(|_| ()),
        Op::Unshift(v) => seq.unshift(*v).map(|_| ()),
        Op::Reverse => seq.reverse(),
        Op::Sort => seq.sort(),
        Op::Splice(start, count, items) => seq
            .splice(*start, Some(*count), items.iter().copied())
            .map(|_| ()),
    }
}

proptest! {
    #[test]
    fn prop_sequence_matches_vec_model(
        initial in prop::collection::vec(any::<i64>(), 0..6),
        ops in prop::collection::vec(op_strategy(), 0..12),
        transactional in any::<bool>(),
    ) {
        let stm = Stm::new();
        let seq = sequence(&stm, &initial);
        let mut model = initial.clone();
        for op in &ops {
            apply_model(&mut model, op);
        }

        if transactional {
            stm.in_transaction(|| ops.iter().try_for_each(|op| apply_wrapper(&seq, op))).unwrap();
        } else {
            for op in &ops {
                apply_wrapper(&seq, op).unwrap();
            }
        }

        prop_assert_eq!(seq.to_vec().unwrap(), ints(&model));
    }

    #[test]
    fn prop_aborted_ops_leave_no_trace(
        initial in prop::collection::vec(any::<i64>(), 0..6),
        ops in prop::collection::vec(op_strategy(), 1..8),
    ) {
        let stm = Stm::new();
        let seq = sequence(&stm, &initial);
        let generation = stm.generation_of(seq.handle()).unwrap();

        let result: Result<()> = stm.in_transaction(|| {
            for op in &ops {
                apply_wrapper(&seq, op)?;
            }
            Err(Error::invalid_usage("abort"))
        });

        prop_assert!(result.is_err());
        prop_assert_eq!(seq.to_vec().unwrap(), ints(&initial));
        prop_assert_eq!(stm.generation_of(seq.handle()).unwrap(), generation);
    }
}
