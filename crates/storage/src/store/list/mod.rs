#![forbid(unsafe_code)]

mod consistency;
pub(crate) mod engine;
pub(crate) mod queries;
pub(crate) mod scope;

pub use consistency::{ConsistencyReport, ScopeReport};
pub(crate) use consistency::check_consistency_tx;

use super::error::StoreError;
use super::records::{ListRecord, NewRecord, ScopeKey};
use ol_core::{ListConfig, MoveOutcome, SqlIdent};
use rusqlite::types::Value;
use rusqlite::{Connection, Row, Transaction, params};
use std::collections::BTreeSet;
use tracing::debug;

/// A table's list configuration resolved against the live schema.
///
/// Built once per table and shared by every operation on it.
#[derive(Clone, Debug)]
pub struct OrderedList {
    config: ListConfig,
    sequential: bool,
    select_sql: String,
}

impl OrderedList {
    pub fn resolve(conn: &Connection, config: ListConfig) -> Result<Self, StoreError> {
        let columns = table_columns(conn, config.table())?;
        if columns.is_empty() {
            return Err(StoreError::InvalidInput("list table does not exist"));
        }
        for column in configured_columns(&config) {
            if !columns.contains(column.as_str()) {
                return Err(StoreError::MissingColumn {
                    table: config.table().to_string(),
                    column: column.to_string(),
                });
            }
        }

        let sequential = match config.sequential_updates() {
            Some(enabled) => enabled,
            None => has_unique_rank_index(conn, &config)?,
        };
        debug!(
            table = %config.table(),
            column = %config.column(),
            sequential,
            inverted = config.has_inverted_position(),
            "resolved ordered list"
        );

        let select_sql = record_select_sql(&config);
        Ok(Self {
            config,
            sequential,
            select_sql,
        })
    }

    pub fn config(&self) -> &ListConfig {
        &self.config
    }

    /// Whether shifts run row by row instead of as one bulk UPDATE.
    pub fn sequential_updates(&self) -> bool {
        self.sequential
    }

    /// Assigns the initial position of `record` and makes room for it.
    ///
    /// Must run inside the transaction that inserts the row.
    pub fn before_create(
        &self,
        tx: &Transaction<'_>,
        record: &mut NewRecord,
    ) -> Result<(), StoreError> {
        engine::before_create_tx(tx, self, record)
    }

    /// Closes the gap the record leaves behind. Must run inside the
    /// transaction that deletes the row, before the DELETE.
    pub fn before_destroy(&self, tx: &Transaction<'_>, id: i64) -> Result<MoveOutcome, StoreError> {
        engine::before_destroy_tx(tx, self, id)
    }

    pub(crate) fn table_sql(&self) -> String {
        self.config.table().quoted()
    }

    pub(crate) fn pk_sql(&self) -> String {
        self.config.primary_key().quoted()
    }

    pub(crate) fn column_sql(&self) -> String {
        self.config.column().quoted()
    }

    pub(crate) fn inverted_sql(&self) -> Option<String> {
        self.config.inverted().map(|inverted| inverted.column().quoted())
    }

    pub(crate) fn inverted_offset(&self) -> i64 {
        self.config.inverted().map_or(0, |inverted| inverted.offset())
    }

    pub(crate) fn top(&self) -> i64 {
        self.config.top_of_list()
    }

    /// `SELECT` of the list columns; rows are read with [`Self::read_record`].
    pub(crate) fn select_sql(&self) -> &str {
        &self.select_sql
    }

    pub(crate) fn read_record(&self, row: &Row<'_>) -> rusqlite::Result<ListRecord> {
        let mut scope = Vec::with_capacity(self.config.scope().len());
        for index in 0..self.config.scope().len() {
            scope.push(row.get::<_, Value>(4 + index)?);
        }
        Ok(ListRecord {
            id: row.get(0)?,
            position: row.get(1)?,
            inverted_position: row.get(2)?,
            relevant: row.get::<_, i64>(3)? != 0,
            scope: ScopeKey::new(scope),
        })
    }
}

fn configured_columns(config: &ListConfig) -> Vec<&SqlIdent> {
    let mut columns = vec![config.primary_key(), config.column()];
    if let Some(inverted) = config.inverted() {
        columns.push(inverted.column());
    }
    if let Some(relevance) = config.relevance() {
        columns.push(relevance.column());
    }
    columns.extend(config.scope().iter());
    columns
}

fn record_select_sql(config: &ListConfig) -> String {
    let inverted = config
        .inverted()
        .map_or_else(|| "NULL".to_string(), |inverted| inverted.column().quoted());
    let relevant = config
        .relevance()
        .map_or_else(|| "1".to_string(), |relevance| relevance.to_sql());
    let mut sql = format!(
        "SELECT {}, {}, {inverted}, {relevant}",
        config.primary_key().quoted(),
        config.column().quoted(),
    );
    for column in config.scope() {
        sql.push_str(", ");
        sql.push_str(&column.quoted());
    }
    sql.push_str(" FROM ");
    sql.push_str(&config.table().quoted());
    sql
}

fn table_columns(conn: &Connection, table: &SqlIdent) -> Result<BTreeSet<String>, StoreError> {
    let mut stmt = conn.prepare("SELECT name FROM pragma_table_info(?1)")?;
    let mut rows = stmt.query(params![table.as_str()])?;
    let mut out = BTreeSet::new();
    while let Some(row) = rows.next()? {
        out.insert(row.get::<_, String>(0)?);
    }
    Ok(out)
}

/// A UNIQUE index over either rank column rejects the transient duplicates a
/// bulk `position + 1` produces mid-statement.
fn has_unique_rank_index(conn: &Connection, config: &ListConfig) -> Result<bool, StoreError> {
    let inverted = config
        .inverted()
        .map_or(config.column().as_str(), |inverted| inverted.column().as_str());
    let found = conn
        .prepare(
            "SELECT 1 FROM pragma_index_list(?1) AS il \
             JOIN pragma_index_info(il.name) AS ii \
             WHERE il.\"unique\" = 1 AND ii.name IN (?2, ?3) \
             LIMIT 1",
        )?
        .exists(params![config.table().as_str(), config.column().as_str(), inverted])?;
    Ok(found)
}
