#![forbid(unsafe_code)]

mod support;

use ol_storage::{DensityProblem, ListConfig, ScopeKey};
use support::{assert_consistent, default_list, inverted_list, open_store, order, resolve, seed};

#[test]
fn reports_only_the_offending_scope() {
    let (_dir, mut store) = open_store();
    let list = resolve(
        &store,
        ListConfig::builder("mixins")
            .scope(["parent_id"])
            .build()
            .expect("config"),
    );
    seed(&mut store, &list, &ScopeKey::from(1), 3);
    let broken = seed(&mut store, &list, &ScopeKey::from(2), 3);
    store
        .connection()
        .execute("UPDATE mixins SET position = 2 WHERE id = ?1", [broken[2]])
        .expect("corrupt");

    let report = store.check_consistency(&list, None).expect("check");
    assert_eq!(report.scopes_checked, 2);
    assert_eq!(
        report.offending_scopes().cloned().collect::<Vec<_>>(),
        vec![ScopeKey::from(2)]
    );
    assert_eq!(
        report.offending[0].problems,
        vec![DensityProblem::Duplicate {
            position: 2,
            ids: vec![broken[1], broken[2]]
        }]
    );

    let single = store
        .check_consistency(&list, Some(&ScopeKey::from(1)))
        .expect("check");
    assert_eq!(single.scopes_checked, 1);
    assert!(single.is_consistent());

    let rewritten = store.repair_scope(&list, &ScopeKey::from(2)).expect("repair");
    assert_eq!(rewritten, 1);
    assert_eq!(
        store.list_ids(&list, &ScopeKey::from(2)).expect("ids"),
        broken
    );
    assert_consistent(&store, &list);
}

#[test]
fn detects_gaps_and_rows_above_the_top() {
    let (_dir, mut store) = open_store();
    let list = default_list(&store);
    seed(&mut store, &list, &ScopeKey::whole_table(), 3);
    store
        .execute_batch(
            "UPDATE mixins SET position = 7 WHERE id = 3;
             UPDATE mixins SET position = -1 WHERE id = 1;",
        )
        .expect("corrupt");

    let report = store.check_consistency(&list, None).expect("check");
    let problems = &report.offending[0].problems;
    assert!(problems.contains(&DensityProblem::BeforeTop { id: 1, position: -1 }));
    assert!(problems.contains(&DensityProblem::Gap {
        expected: 1,
        found: 2
    }));
    assert!(problems.contains(&DensityProblem::Gap {
        expected: 3,
        found: 7
    }));

    store
        .repair_scope(&list, &ScopeKey::whole_table())
        .expect("repair");
    assert_eq!(order(&store, &list), vec![1, 2, 3]);
    assert_consistent(&store, &list);
}

#[test]
fn detects_inverted_drift() {
    let (_dir, mut store) = open_store();
    let list = inverted_list(&store);
    seed(&mut store, &list, &ScopeKey::whole_table(), 3);
    store
        .connection()
        .execute("UPDATE mixins SET inverted_position = 5 WHERE id = 2", [])
        .expect("corrupt");

    let report = store.check_consistency(&list, None).expect("check");
    assert_eq!(
        report.offending[0].problems,
        vec![DensityProblem::InvertedMismatch {
            id: 2,
            expected: Some(-2),
            found: Some(5)
        }]
    );
}

#[test]
fn repair_of_a_dense_scope_rewrites_nothing() {
    let (_dir, mut store) = open_store();
    let list = default_list(&store);
    seed(&mut store, &list, &ScopeKey::whole_table(), 4);
    let rewritten = store
        .repair_scope(&list, &ScopeKey::whole_table())
        .expect("repair");
    assert_eq!(rewritten, 0);
}
