#![forbid(unsafe_code)]

use super::OrderedList;
use crate::store::error::StoreError;
use crate::store::records::ScopeKey;
use rusqlite::types::Value;
use rusqlite::{Connection, ParamsFromIter, params_from_iter};

/// Which rows a bound is computed over.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum ListView {
    /// Every ranked row of the scope, relevant or not.
    Full,
    /// Ranked rows passing the relevance filter.
    Relevant,
}

/// Conjunction of SQL conditions with their positional `?` parameters.
#[derive(Clone, Debug, Default)]
pub(crate) struct Filter {
    clauses: Vec<String>,
    params: Vec<Value>,
}

impl Filter {
    pub(crate) fn push(&mut self, clause: impl Into<String>) {
        self.clauses.push(clause.into());
    }

    pub(crate) fn push_param(&mut self, clause: impl Into<String>, value: Value) {
        self.clauses.push(clause.into());
        self.params.push(value);
    }

    pub(crate) fn to_sql(&self) -> String {
        if self.clauses.is_empty() {
            return "1 = 1".to_string();
        }
        self.clauses.join(" AND ")
    }

    pub(crate) fn params(&self) -> ParamsFromIter<std::slice::Iter<'_, Value>> {
        params_from_iter(self.params.iter())
    }
}

impl OrderedList {
    pub(crate) fn check_scope_key(&self, scope: &ScopeKey) -> Result<(), StoreError> {
        if scope.values().len() == self.config().scope().len() {
            Ok(())
        } else {
            Err(StoreError::InvalidInput(
                "scope key does not match the configured scope columns",
            ))
        }
    }

    /// Equality on every scope column. SQL `NULL = NULL` is never true, so a
    /// NULL key matches no sibling.
    pub(crate) fn scope_condition(&self, scope: &ScopeKey) -> Result<Filter, StoreError> {
        self.check_scope_key(scope)?;
        let mut filter = Filter::default();
        for (column, value) in self.config().scope().iter().zip(scope.values()) {
            filter.push_param(format!("{} = ?", column.quoted()), value.clone());
        }
        Ok(filter)
    }

    /// Ranked siblings of `scope` under `view`.
    pub(crate) fn sibling_condition(
        &self,
        scope: &ScopeKey,
        view: ListView,
    ) -> Result<Filter, StoreError> {
        let mut filter = self.scope_condition(scope)?;
        filter.push(format!("{} IS NOT NULL", self.column_sql()));
        if view == ListView::Relevant {
            if let Some(relevance) = self.config().relevance() {
                filter.push(relevance.to_sql());
            }
        }
        Ok(filter)
    }
}

/// Largest position in the scope, or `top - 1` when the view is empty.
pub(crate) fn bottom_position_tx(
    conn: &Connection,
    list: &OrderedList,
    scope: &ScopeKey,
    view: ListView,
) -> Result<i64, StoreError> {
    let filter = list.sibling_condition(scope, view)?;
    let sql = format!(
        "SELECT MAX({}) FROM {} WHERE {}",
        list.column_sql(),
        list.table_sql(),
        filter.to_sql()
    );
    let max = conn.query_row(&sql, filter.params(), |row| row.get::<_, Option<i64>>(0))?;
    Ok(max.unwrap_or(list.top() - 1))
}

pub(crate) fn bottom_position_in_full_list_tx(
    conn: &Connection,
    list: &OrderedList,
    scope: &ScopeKey,
) -> Result<i64, StoreError> {
    bottom_position_tx(conn, list, scope, ListView::Full)
}

pub(crate) fn bottom_position_in_relevant_list_tx(
    conn: &Connection,
    list: &OrderedList,
    scope: &ScopeKey,
) -> Result<i64, StoreError> {
    bottom_position_tx(conn, list, scope, ListView::Relevant)
}
