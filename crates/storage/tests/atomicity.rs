#![forbid(unsafe_code)]

mod support;

use ol_storage::{ListConfig, NewRecord, ScopeKey, StoreError};
use rusqlite::params;
use support::{assert_consistent, default_list, open_store, order, resolve, seed, snapshot};

#[test]
fn failed_sibling_shift_rolls_back_the_move() {
    let (_dir, mut store) = open_store();
    let list = resolve(
        &store,
        ListConfig::builder("mixins")
            .sequential_updates(false)
            .inverted_position()
            .build()
            .expect("config"),
    );
    seed(&mut store, &list, &ScopeKey::whole_table(), 4);
    store
        .execute_batch(
            "CREATE TRIGGER reject_shift BEFORE UPDATE OF position ON mixins
             WHEN NEW.id = 3
             BEGIN SELECT RAISE(ABORT, 'shift rejected'); END;",
        )
        .expect("trigger");
    let before = snapshot(&store);

    let err = store.move_to_top(&list, 4).expect_err("shift must fail");
    assert!(matches!(err, StoreError::Sql(_)));
    assert_eq!(snapshot(&store), before);
    assert_consistent(&store, &list);
}

#[test]
fn failed_own_write_rolls_back_the_shift() {
    let (_dir, mut store) = open_store();
    let list = default_list(&store);
    seed(&mut store, &list, &ScopeKey::whole_table(), 4);
    store
        .execute_batch(
            "CREATE TRIGGER reject_own_write BEFORE UPDATE OF position ON mixins
             WHEN NEW.id = 4 AND NEW.position = 1
             BEGIN SELECT RAISE(ABORT, 'own write rejected'); END;",
        )
        .expect("trigger");
    let before = snapshot(&store);

    let err = store.move_to_top(&list, 4).expect_err("own write must fail");
    assert!(matches!(err, StoreError::Sql(_)));
    assert_eq!(snapshot(&store), before);
    assert_eq!(order(&store, &list), vec![1, 2, 3, 4]);
}

#[test]
fn failed_insert_rolls_back_the_room_made_for_it() {
    let (_dir, mut store) = open_store();
    let list = default_list(&store);
    seed(&mut store, &list, &ScopeKey::whole_table(), 3);
    store
        .execute_batch(
            "CREATE TRIGGER reject_insert BEFORE INSERT ON mixins
             BEGIN SELECT RAISE(ABORT, 'insert rejected'); END;",
        )
        .expect("trigger");
    let before = snapshot(&store);

    let err = store
        .insert_record(&list, NewRecord::new(ScopeKey::whole_table()).at(1))
        .expect_err("insert must fail");
    assert!(matches!(err, StoreError::Sql(_)));
    assert_eq!(snapshot(&store), before);
}

#[test]
fn dropped_caller_transaction_discards_placement() {
    let (_dir, mut store) = open_store();
    let list = default_list(&store);
    seed(&mut store, &list, &ScopeKey::whole_table(), 3);
    let before = snapshot(&store);

    {
        let tx = store.transaction().expect("begin");
        let mut record = NewRecord::new(ScopeKey::whole_table()).at(1);
        list.before_create(&tx, &mut record).expect("place");
        assert_eq!(record.position, Some(1));
    }
    assert_eq!(snapshot(&store), before);
}

#[test]
fn caller_driven_lifecycle_commits_together() {
    let (_dir, mut store) = open_store();
    let list = default_list(&store);
    seed(&mut store, &list, &ScopeKey::whole_table(), 3);

    let tx = store.transaction().expect("begin");
    let mut record = NewRecord::new(ScopeKey::whole_table()).at(2);
    list.before_create(&tx, &mut record).expect("place");
    tx.execute(
        "INSERT INTO mixins (position, parent_type) VALUES (?1, ?2)",
        params![record.position, "Folder"],
    )
    .expect("insert");
    let inserted = tx.last_insert_rowid();

    list.before_destroy(&tx, 1).expect("destroy hook");
    tx.execute("DELETE FROM mixins WHERE id = 1", [])
        .expect("delete");
    tx.commit().expect("commit");

    assert_eq!(order(&store, &list), vec![inserted, 2, 3]);
    assert_consistent(&store, &list);
}
