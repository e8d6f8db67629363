//! Transaction lifecycle, isolation and conflict detection

use crate::common::*;
use tessera::{ConflictType, TransactionStatus};

// ============================================================================
// Isolation
// ============================================================================

mod isolation {
    use super::*;

    #[test]
    fn test_uncommitted_write_is_invisible_outside() {
        let stm = Stm::new();
        let obj = stm.wrap_object(RawNode::object_from([("a", 1)])).unwrap();

        let tx = stm.transaction();
        within(&tx, || obj.set("a", 2)).unwrap();

        assert_eq!(obj.get("a").unwrap(), Some(Value::Int(1)));
        assert_eq!(within(&tx, || obj.get("a")).unwrap(), Some(Value::Int(2)));

        tx.commit().unwrap();
        assert_eq!(obj.get("a").unwrap(), Some(Value::Int(2)));
        tx.dispose();
    }

    #[test]
    fn test_read_your_own_write() {
        let stm = Stm::new();
        let obj = stm.wrap_object(RawNode::object()).unwrap();
        stm.in_transaction(|| {
            obj.set("k", "v")?;
            assert_eq!(obj.get("k")?, Some(Value::from("v")));
            assert!(obj.has("k")?);
            Ok(())
        })
        .unwrap();
    }

    #[test]
    fn test_dispose_without_commit_discards() {
        let stm = Stm::new();
        let obj = stm.wrap_object(RawNode::object_from([("a", 1)])).unwrap();
        let before = stm.generation_of(obj.handle()).unwrap();

        let tx = stm.transaction();
        within(&tx, || obj.delete("a")).unwrap();
        tx.dispose();

        assert_eq!(obj.get("a").unwrap(), Some(Value::Int(1)));
        assert_eq!(stm.generation_of(obj.handle()).unwrap(), before);
    }

    #[test]
    fn test_two_transactions_do_not_see_each_other() {
        let stm = Stm::new();
        let obj = stm.wrap_object(RawNode::object()).unwrap();
        let t1 = stm.transaction();
        let t2 = stm.transaction();
        assert!(!t2.is_nested());

        within(&t1, || obj.set("x", 1)).unwrap();
        assert_eq!(within(&t2, || obj.get("x")).unwrap(), None);

        t1.dispose();
        t2.dispose();
    }
}

// ============================================================================
// Conflict detection
// ============================================================================

mod conflicts {
    use super::*;

    #[test]
    fn test_write_write_conflict() {
        let stm = Stm::new();
        let obj = stm.wrap_object(RawNode::object_from([("a", 0)])).unwrap();

        let t1 = stm.transaction();
        let t2 = stm.transaction();
        within(&t1, || obj.set("a", 1)).unwrap();
        within(&t2, || obj.set("a", 2)).unwrap();

        t1.commit().unwrap();
        let err = t2.commit().unwrap_err();
        assert!(err.is_conflict());
        assert_eq!(err.conflict_target(), Some(obj.handle()));
        assert_eq!(obj.get("a").unwrap(), Some(Value::Int(1)));

        t1.dispose();
        t2.dispose();
    }

    #[test]
    fn test_read_write_conflict() {
        let stm = Stm::new();
        let src = stm.wrap_object(RawNode::object_from([("n", 1)])).unwrap();
        let dst = stm.wrap_object(RawNode::object()).unwrap();

        let tx = stm.transaction();
        within(&tx, || {
            let n = src.get("n")?.unwrap_or_default();
            dst.set("copy", n)
        })
        .unwrap();

        src.set("n", 2).unwrap();

        let err = tx.commit().unwrap_err();
        assert_eq!(err.conflict_target(), Some(src.handle()));
        assert_eq!(dst.get("copy").unwrap(), None);
        tx.dispose();
    }

    #[test]
    fn test_enumeration_conflict() {
        let stm = Stm::new();
        let obj = stm.wrap_object(RawNode::object_from([("a", 1)])).unwrap();
        let count = stm.wrap_object(RawNode::object()).unwrap();

        let tx = stm.transaction();
        within(&tx, || {
            let keys = obj.keys()?;
            count.set("keys", keys.len() as i64)
        })
        .unwrap();

        obj.set("b", 2).unwrap();

        let err = tx.commit().unwrap_err();
        assert_eq!(err.conflict_target(), Some(obj.handle()));
        tx.dispose();
    }

    #[test]
    fn test_disjoint_targets_both_commit() {
        let stm = Stm::new();
        let a = stm.wrap_object(RawNode::object()).unwrap();
        let b = stm.wrap_object(RawNode::object()).unwrap();

        let t1 = stm.transaction();
        let t2 = stm.transaction();
        within(&t1, || a.set("v", 1)).unwrap();
        within(&t2, || b.set("v", 2)).unwrap();

        t2.commit().unwrap();
        t1.commit().unwrap();
        assert_eq!(a.get("v").unwrap(), Some(Value::Int(1)));
        assert_eq!(b.get("v").unwrap(), Some(Value::Int(2)));
        t1.dispose();
        t2.dispose();
    }

    #[test]
    fn test_conflict_leaves_transaction_active() {
        let stm = Stm::new();
        let obj = stm.wrap_object(RawNode::object_from([("a", 1)])).unwrap();

        let tx = stm.transaction();
        within(&tx, || obj.set("a", 10)).unwrap();
        obj.set("a", 2).unwrap();

        assert!(tx.commit().is_err());
        assert_eq!(tx.status(), TransactionStatus::Active);
        assert!(tx.has_touched_buffers());
        assert_eq!(within(&tx, || obj.get("a")).unwrap(), Some(Value::Int(10)));

        // The stale observation never goes away
        assert!(tx.commit().unwrap_err().is_conflict());
        tx.dispose();
        assert_eq!(obj.get("a").unwrap(), Some(Value::Int(2)));
    }

    #[test]
    fn test_validate_reports_without_committing() {
        let stm = Stm::new();
        let obj = stm.wrap_object(RawNode::object()).unwrap();
        let tx = stm.transaction();
        within(&tx, || obj.get("a")).unwrap();
        assert!(tx.validate().is_valid());

        obj.set("a", 1).unwrap();
        let result = tx.validate();
        assert_eq!(result.conflict_count(), 1);
        assert!(matches!(
            result.conflicts[0],
            ConflictType::StaleGeneration { target, .. } if target == obj.handle()
        ));
        assert_eq!(tx.status(), TransactionStatus::Active);
        tx.dispose();
    }
}

// ============================================================================
// Nested transactions
// ============================================================================

mod nesting {
    use super::*;

    #[test]
    fn test_nested_commit_is_visible_to_parent_only() {
        let stm = Stm::new();
        let obj = stm.wrap_object(RawNode::object_from([("a", 1)])).unwrap();

        let outer = stm.transaction();
        within(&outer, || {
            let inner = stm.transaction();
            assert!(inner.is_nested());
            within(&inner, || obj.set("a", 2))?;
            inner.commit()?;
            inner.dispose();
            assert_eq!(obj.get("a")?, Some(Value::Int(2)));
            Ok(())
        })
        .unwrap();

        assert_eq!(obj.get("a").unwrap(), Some(Value::Int(1)));
        outer.commit().unwrap();
        assert_eq!(obj.get("a").unwrap(), Some(Value::Int(2)));
        outer.dispose();
    }

    #[test]
    fn test_nested_reads_parent_writes() {
        let stm = Stm::new();
        let obj = stm.wrap_object(RawNode::object()).unwrap();

        stm.in_transaction(|| {
            obj.set("a", 1)?;
            stm.in_transaction(|| {
                assert_eq!(obj.get("a")?, Some(Value::Int(1)));
                obj.set("b", 2)
            })?;
            assert_eq!(obj.get("b")?, Some(Value::Int(2)));
            Ok(())
        })
        .unwrap();

        assert_eq!(obj.len().unwrap(), 2);
    }

    #[test]
    fn test_nested_abort_keeps_parent_state() {
        let stm = Stm::new();
        let obj = stm.wrap_object(RawNode::object()).unwrap();

        stm.in_transaction(|| {
            obj.set("kept", true)?;
            let aborted: Result<()> = stm.in_transaction(|| {
                obj.set("dropped", true)?;
                Err(Error::invalid_usage("abort"))
            });
            assert!(aborted.is_err());
            assert!(!obj.has("dropped")?);
            Ok(())
        })
        .unwrap();

        assert!(obj.has("kept").unwrap());
        assert!(!obj.has("dropped").unwrap());
    }

    #[test]
    fn test_nested_conflict_when_parent_writes_after_child_read() {
        let stm = Stm::new();
        let obj = stm.wrap_object(RawNode::object_from([("a", 1)])).unwrap();

        let outer = stm.transaction();
        let result = within(&outer, || {
            obj.set("a", 2)?;
            let inner = stm.transaction();
            within(&inner, || obj.get("a"))?;
            obj.set("a", 3)?;
            within(&inner, || obj.set("b", 1))?;
            let result = inner.commit();
            inner.dispose();
            result
        });

        let err = result.unwrap_err();
        assert_eq!(err.conflict_target(), Some(obj.handle()));
        outer.dispose();
    }

    #[test]
    fn test_nested_conflict_with_direct_write() {
        let stm = Stm::new();
        let obj = stm.wrap_object(RawNode::object_from([("a", 1)])).unwrap();

        let outer = stm.transaction();
        let inner = within(&outer, || Ok(stm.transaction())).unwrap();
        within(&inner, || obj.get("a")).unwrap();

        obj.set("a", 5).unwrap();

        assert!(inner.commit().unwrap_err().is_conflict());
        inner.dispose();
        outer.dispose();
    }

    #[test]
    fn test_merge_requires_active_parent() {
        let stm = Stm::new();
        let outer = stm.transaction();
        let inner = within(&outer, || Ok(stm.transaction())).unwrap();
        outer.dispose();
        assert!(matches!(inner.commit(), Err(Error::InvalidUsage(_))));
        inner.dispose();
    }
}

// ============================================================================
// Lifecycle
// ============================================================================

mod lifecycle {
    use super::*;

    #[test]
    fn test_dispose_is_idempotent() {
        let stm = Stm::new();
        let (events, _) = Recorder::install(&stm);
        let tx = stm.transaction();
        tx.dispose();
        tx.dispose();
        let disposals = events
            .borrow()
            .iter()
            .filter(|e| e.starts_with("dispose"))
            .count();
        assert_eq!(disposals, 1);
        assert_eq!(tx.status(), TransactionStatus::Disposed);
    }

    #[test]
    fn test_disposed_transaction_rejects_use() {
        let stm = Stm::new();
        let tx = stm.transaction();
        tx.dispose();
        assert!(matches!(tx.enter(), Err(Error::InvalidUsage(_))));
        assert!(matches!(tx.commit(), Err(Error::InvalidUsage(_))));
    }

    #[test]
    fn test_committed_transaction_rejects_access() {
        let stm = Stm::new();
        let obj = stm.wrap_object(RawNode::object()).unwrap();
        let tx = stm.transaction();
        tx.commit().unwrap();
        assert_eq!(tx.status(), TransactionStatus::Committed);
        assert!(matches!(tx.commit(), Err(Error::InvalidUsage(_))));
        assert!(matches!(
            within(&tx, || obj.get("a")),
            Err(Error::InvalidUsage(_))
        ));
        tx.dispose();
    }

    #[test]
    fn test_enter_guards_nest() {
        let stm = Stm::new();
        let a = stm.transaction();
        let b = stm.transaction();
        {
            let _ga = a.enter().unwrap();
            assert!(stm.current_transaction().unwrap().ptr_eq(&a));
            {
                let _gb = b.enter().unwrap();
                assert!(stm.current_transaction().unwrap().ptr_eq(&b));
            }
            assert!(stm.current_transaction().unwrap().ptr_eq(&a));
        }
        assert!(stm.current_transaction().is_none());
        a.dispose();
        b.dispose();
    }

    #[test]
    fn test_call_restores_slot_on_error() {
        let stm = Stm::new();
        let tx = stm.transaction();
        let result: Result<()> = within(&tx, || Err(Error::invalid_usage("boom")));
        assert!(result.is_err());
        assert!(stm.current_transaction().is_none());
        tx.dispose();
    }

    #[test]
    fn test_in_transaction_disposes_on_every_path() {
        let stm = Stm::new();
        stm.in_transaction(|| Ok(())).unwrap();
        let _ = stm.in_transaction(|| -> Result<()> { Err(Error::invalid_usage("x")) });
        assert!(stm.live_transactions().is_empty());
        assert!(stm.current_transaction().is_none());
    }

    #[test]
    fn test_transaction_ids_are_unique_and_increasing() {
        let stm = Stm::new();
        let t1 = stm.transaction();
        let t2 = stm.transaction();
        assert!(t2.id() > t1.id());
        assert_eq!(t1.id(), t1.generation().as_u64());
        t1.dispose();
        t2.dispose();
    }

    #[test]
    fn test_buffers_cleared_after_commit() {
        let stm = Stm::new();
        let obj = stm.wrap_object(RawNode::object()).unwrap();
        let tx = stm.transaction();
        within(&tx, || obj.set("a", 1)).unwrap();
        assert_eq!(tx.buffer_count(), 1);
        tx.commit().unwrap();
        assert_eq!(tx.buffer_count(), 0);
        tx.dispose();
    }
}
