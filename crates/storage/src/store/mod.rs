#![forbid(unsafe_code)]

mod error;
mod list;
mod records;

pub use error::StoreError;
pub use list::{ConsistencyReport, OrderedList, ScopeReport};
pub use records::{ListRecord, NewRecord, ScopeKey};

use list::{engine, queries, scope};
use ol_core::{ListConfig, MoveOutcome};
use rusqlite::types::Value;
use rusqlite::{Connection, Transaction, TransactionBehavior, params_from_iter};
use std::path::{Path, PathBuf};
use std::time::Duration;

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Owns one connection to a SQLite database holding list tables.
///
/// Every mutating call runs in its own `BEGIN IMMEDIATE` transaction, so
/// writers on other connections queue on the database lock instead of
/// interleaving with a shift.
#[derive(Debug)]
pub struct SqliteStore {
    conn: Connection,
    db_path: PathBuf,
}

impl SqliteStore {
    pub fn open(db_path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let db_path = db_path.as_ref().to_path_buf();
        if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(&db_path)?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;

        Ok(Self { conn, db_path })
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    pub fn execute_batch(&self, sql: &str) -> Result<(), StoreError> {
        self.conn.execute_batch(sql)?;
        Ok(())
    }

    /// Immediate write transaction for callers driving the lifecycle
    /// callbacks themselves.
    pub fn transaction(&mut self) -> Result<Transaction<'_>, StoreError> {
        Ok(self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?)
    }

    pub fn list(&self, config: ListConfig) -> Result<OrderedList, StoreError> {
        OrderedList::resolve(&self.conn, config)
    }

    /// Inserts a row, placing it with `before_create` first.
    pub fn insert_record(
        &mut self,
        list: &OrderedList,
        record: NewRecord,
    ) -> Result<ListRecord, StoreError> {
        let mut record = record;
        let tx = self.transaction()?;
        list.before_create(&tx, &mut record)?;
        let id = insert_row_tx(&tx, list, &record)?;
        let stored = engine::load_record_tx(&tx, list, id)?;
        tx.commit()?;
        Ok(stored)
    }

    /// Deletes a row after closing the gap it leaves.
    pub fn destroy_record(&mut self, list: &OrderedList, id: i64) -> Result<MoveOutcome, StoreError> {
        let tx = self.transaction()?;
        let outcome = list.before_destroy(&tx, id)?;
        tx.execute(
            &format!(
                "DELETE FROM {} WHERE {} = ?1",
                list.table_sql(),
                list.pk_sql()
            ),
            [id],
        )?;
        tx.commit()?;
        Ok(outcome)
    }

    pub fn record(&self, list: &OrderedList, id: i64) -> Result<Option<ListRecord>, StoreError> {
        engine::find_record_tx(&self.conn, list, id)
    }

    pub fn move_to(
        &mut self,
        list: &OrderedList,
        id: i64,
        position: i64,
    ) -> Result<MoveOutcome, StoreError> {
        self.write(|tx| engine::move_to_tx(tx, list, id, position))
    }

    pub fn insert_at(
        &mut self,
        list: &OrderedList,
        id: i64,
        position: i64,
    ) -> Result<MoveOutcome, StoreError> {
        self.write(|tx| engine::insert_at_tx(tx, list, id, position))
    }

    pub fn move_higher(&mut self, list: &OrderedList, id: i64) -> Result<MoveOutcome, StoreError> {
        self.write(|tx| engine::move_higher_tx(tx, list, id))
    }

    pub fn move_lower(&mut self, list: &OrderedList, id: i64) -> Result<MoveOutcome, StoreError> {
        self.write(|tx| engine::move_lower_tx(tx, list, id))
    }

    pub fn move_to_top(&mut self, list: &OrderedList, id: i64) -> Result<MoveOutcome, StoreError> {
        self.write(|tx| engine::move_to_top_tx(tx, list, id))
    }

    pub fn move_to_bottom(
        &mut self,
        list: &OrderedList,
        id: i64,
    ) -> Result<MoveOutcome, StoreError> {
        self.write(|tx| engine::move_to_bottom_tx(tx, list, id))
    }

    pub fn remove_from_list(
        &mut self,
        list: &OrderedList,
        id: i64,
    ) -> Result<MoveOutcome, StoreError> {
        self.write(|tx| engine::remove_from_list_tx(tx, list, id))
    }

    pub fn swap_positions(
        &mut self,
        list: &OrderedList,
        left: i64,
        right: i64,
    ) -> Result<MoveOutcome, StoreError> {
        self.write(|tx| engine::swap_positions_tx(tx, list, left, right))
    }

    pub fn change_scope(
        &mut self,
        list: &OrderedList,
        id: i64,
        scope: &ScopeKey,
    ) -> Result<MoveOutcome, StoreError> {
        self.write(|tx| engine::change_scope_tx(tx, list, id, scope))
    }

    pub fn repair_scope(&mut self, list: &OrderedList, scope: &ScopeKey) -> Result<usize, StoreError> {
        self.write(|tx| engine::repair_scope_tx(tx, list, scope))
    }

    pub fn higher_item(&self, list: &OrderedList, id: i64) -> Result<Option<i64>, StoreError> {
        queries::higher_item_tx(&self.conn, list, id)
    }

    pub fn higher_items(
        &self,
        list: &OrderedList,
        id: i64,
        limit: Option<usize>,
    ) -> Result<Vec<i64>, StoreError> {
        queries::higher_items_tx(&self.conn, list, id, limit)
    }

    pub fn lower_item(&self, list: &OrderedList, id: i64) -> Result<Option<i64>, StoreError> {
        queries::lower_item_tx(&self.conn, list, id)
    }

    pub fn lower_items(
        &self,
        list: &OrderedList,
        id: i64,
        limit: Option<usize>,
    ) -> Result<Vec<i64>, StoreError> {
        queries::lower_items_tx(&self.conn, list, id, limit)
    }

    pub fn first_in_scope(
        &self,
        list: &OrderedList,
        scope: &ScopeKey,
    ) -> Result<Option<i64>, StoreError> {
        queries::first_in_scope_tx(&self.conn, list, scope)
    }

    pub fn last_in_scope(
        &self,
        list: &OrderedList,
        scope: &ScopeKey,
    ) -> Result<Option<i64>, StoreError> {
        queries::last_in_scope_tx(&self.conn, list, scope)
    }

    pub fn is_first(&self, list: &OrderedList, id: i64) -> Result<bool, StoreError> {
        queries::is_first_tx(&self.conn, list, id)
    }

    pub fn is_last(&self, list: &OrderedList, id: i64) -> Result<bool, StoreError> {
        queries::is_last_tx(&self.conn, list, id)
    }

    pub fn in_list(&self, list: &OrderedList, id: i64) -> Result<bool, StoreError> {
        Ok(engine::load_record_tx(&self.conn, list, id)?.in_list())
    }

    pub fn list_ids(&self, list: &OrderedList, scope: &ScopeKey) -> Result<Vec<i64>, StoreError> {
        queries::list_ids_tx(&self.conn, list, scope)
    }

    /// Bottom of the full list, ignoring the relevance filter.
    pub fn bottom_position_in_full_list(
        &self,
        list: &OrderedList,
        scope: &ScopeKey,
    ) -> Result<i64, StoreError> {
        scope::bottom_position_in_full_list_tx(&self.conn, list, scope)
    }

    pub fn bottom_position_in_relevant_list(
        &self,
        list: &OrderedList,
        scope: &ScopeKey,
    ) -> Result<i64, StoreError> {
        scope::bottom_position_in_relevant_list_tx(&self.conn, list, scope)
    }

    /// Checks one scope, or every scope when `scope` is `None`.
    pub fn check_consistency(
        &self,
        list: &OrderedList,
        scope: Option<&ScopeKey>,
    ) -> Result<ConsistencyReport, StoreError> {
        list::check_consistency_tx(&self.conn, list, scope)
    }

    /// Runs `op` in an immediate transaction; any error rolls it back.
    fn write<T>(
        &mut self,
        op: impl FnOnce(&Transaction<'_>) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let tx = self.transaction()?;
        let out = op(&tx)?;
        tx.commit()?;
        Ok(out)
    }
}

fn insert_row_tx(
    tx: &Transaction<'_>,
    list: &OrderedList,
    record: &NewRecord,
) -> Result<i64, StoreError> {
    let mut columns = Vec::new();
    let mut values: Vec<Value> = Vec::new();
    for (column, value) in list.config().scope().iter().zip(record.scope.values()) {
        columns.push(column.quoted());
        values.push(value.clone());
    }
    columns.push(list.column_sql());
    values.push(record.position.map_or(Value::Null, Value::Integer));
    if let Some(column) = list.inverted_sql() {
        columns.push(column);
        values.push(record.inverted_position.map_or(Value::Null, Value::Integer));
    }
    for (column, value) in &record.fields {
        columns.push(column.quoted());
        values.push(value.clone());
    }

    let placeholders = vec!["?"; columns.len()].join(", ");
    let sql = format!(
        "INSERT INTO {} ({}) VALUES ({placeholders})",
        list.table_sql(),
        columns.join(", ")
    );
    tx.execute(&sql, params_from_iter(values.iter()))?;
    Ok(tx.last_insert_rowid())
}
