#![allow(dead_code)]

use ol_storage::{ListConfig, NewRecord, OrderedList, ScopeKey, SqliteStore};
use rusqlite::params;
use tempfile::TempDir;
use tracing_subscriber::EnvFilter;

pub const MIXINS_SCHEMA: &str = r#"
    CREATE TABLE mixins (
      id INTEGER PRIMARY KEY,
      position INTEGER,
      inverted_position INTEGER,
      parent_id INTEGER,
      parent_type TEXT,
      active INTEGER NOT NULL DEFAULT 1,
      archived_at INTEGER
    );
"#;

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Fresh database with an empty `mixins` table. Keep the `TempDir` alive for
/// the duration of the test.
pub fn open_store() -> (TempDir, SqliteStore) {
    init_tracing();
    let dir = tempfile::tempdir().expect("temp dir");
    let store = SqliteStore::open(dir.path().join("lists.db")).expect("open store");
    store.execute_batch(MIXINS_SCHEMA).expect("create mixins");
    (dir, store)
}

pub fn resolve(store: &SqliteStore, config: ListConfig) -> OrderedList {
    store.list(config).expect("resolve list")
}

pub fn default_list(store: &SqliteStore) -> OrderedList {
    resolve(
        store,
        ListConfig::builder("mixins").build().expect("config"),
    )
}

pub fn inverted_list(store: &SqliteStore) -> OrderedList {
    resolve(
        store,
        ListConfig::builder("mixins")
            .inverted_position()
            .build()
            .expect("config"),
    )
}

/// Creates `count` records at explicit positions `1..=count`; ids follow.
pub fn seed(store: &mut SqliteStore, list: &OrderedList, scope: &ScopeKey, count: i64) -> Vec<i64> {
    (1..=count)
        .map(|position| {
            store
                .insert_record(list, NewRecord::new(scope.clone()).at(position))
                .expect("seed record")
                .id
        })
        .collect()
}

pub fn order(store: &SqliteStore, list: &OrderedList) -> Vec<i64> {
    store
        .list_ids(list, &ScopeKey::whole_table())
        .expect("list ids")
}

/// Ids ordered by the inverted column, ascending.
pub fn inverted_order(store: &SqliteStore) -> Vec<i64> {
    store
        .connection()
        .prepare("SELECT id FROM mixins WHERE inverted_position IS NOT NULL ORDER BY inverted_position ASC")
        .expect("prepare")
        .query_map([], |row| row.get::<_, i64>(0))
        .expect("query")
        .collect::<Result<Vec<_>, _>>()
        .expect("rows")
}

pub fn position_of(store: &SqliteStore, id: i64) -> Option<i64> {
    store
        .connection()
        .query_row(
            "SELECT position FROM mixins WHERE id = ?1",
            params![id],
            |row| row.get::<_, Option<i64>>(0),
        )
        .expect("position")
}

/// Raw `(id, position, inverted_position)` of every row, by id.
pub fn snapshot(store: &SqliteStore) -> Vec<(i64, Option<i64>, Option<i64>)> {
    store
        .connection()
        .prepare("SELECT id, position, inverted_position FROM mixins ORDER BY id")
        .expect("prepare")
        .query_map([], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)))
        .expect("query")
        .collect::<Result<Vec<_>, _>>()
        .expect("rows")
}

pub fn assert_consistent(store: &SqliteStore, list: &OrderedList) {
    let report = store.check_consistency(list, None).expect("check");
    assert!(
        report.is_consistent(),
        "expected a consistent order, found {:?}",
        report.offending
    );
}
