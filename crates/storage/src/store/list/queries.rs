#![forbid(unsafe_code)]

//! Read-only neighbours and ends of a list.

use super::OrderedList;
use super::engine::load_record_tx;
use super::scope::{Filter, ListView};
use crate::store::error::StoreError;
use crate::store::records::ScopeKey;
use rusqlite::Connection;
use rusqlite::types::Value;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Direction {
    Higher,
    Lower,
}

/// Nearest first.
pub(crate) fn higher_items_tx(
    conn: &Connection,
    list: &OrderedList,
    id: i64,
    limit: Option<usize>,
) -> Result<Vec<i64>, StoreError> {
    neighbours_tx(conn, list, id, Direction::Higher, limit)
}

/// Nearest first.
pub(crate) fn lower_items_tx(
    conn: &Connection,
    list: &OrderedList,
    id: i64,
    limit: Option<usize>,
) -> Result<Vec<i64>, StoreError> {
    neighbours_tx(conn, list, id, Direction::Lower, limit)
}

pub(crate) fn higher_item_tx(
    conn: &Connection,
    list: &OrderedList,
    id: i64,
) -> Result<Option<i64>, StoreError> {
    Ok(higher_items_tx(conn, list, id, Some(1))?.into_iter().next())
}

pub(crate) fn lower_item_tx(
    conn: &Connection,
    list: &OrderedList,
    id: i64,
) -> Result<Option<i64>, StoreError> {
    Ok(lower_items_tx(conn, list, id, Some(1))?.into_iter().next())
}

pub(crate) fn first_in_scope_tx(
    conn: &Connection,
    list: &OrderedList,
    scope: &ScopeKey,
) -> Result<Option<i64>, StoreError> {
    let filter = list.sibling_condition(scope, ListView::Relevant)?;
    Ok(ordered_ids_tx(conn, list, &filter, "ASC", Some(1))?
        .into_iter()
        .next())
}

pub(crate) fn last_in_scope_tx(
    conn: &Connection,
    list: &OrderedList,
    scope: &ScopeKey,
) -> Result<Option<i64>, StoreError> {
    let filter = list.sibling_condition(scope, ListView::Relevant)?;
    Ok(ordered_ids_tx(conn, list, &filter, "DESC", Some(1))?
        .into_iter()
        .next())
}

pub(crate) fn is_first_tx(conn: &Connection, list: &OrderedList, id: i64) -> Result<bool, StoreError> {
    let record = load_record_tx(conn, list, id)?;
    if !record.participates() {
        return Ok(false);
    }
    Ok(higher_item_tx(conn, list, id)?.is_none())
}

pub(crate) fn is_last_tx(conn: &Connection, list: &OrderedList, id: i64) -> Result<bool, StoreError> {
    let record = load_record_tx(conn, list, id)?;
    if !record.participates() {
        return Ok(false);
    }
    Ok(lower_item_tx(conn, list, id)?.is_none())
}

/// Ids of the scope's relevant ranked rows, top first.
pub(crate) fn list_ids_tx(
    conn: &Connection,
    list: &OrderedList,
    scope: &ScopeKey,
) -> Result<Vec<i64>, StoreError> {
    let filter = list.sibling_condition(scope, ListView::Relevant)?;
    ordered_ids_tx(conn, list, &filter, "ASC", None)
}

fn neighbours_tx(
    conn: &Connection,
    list: &OrderedList,
    id: i64,
    direction: Direction,
    limit: Option<usize>,
) -> Result<Vec<i64>, StoreError> {
    let record = load_record_tx(conn, list, id)?;
    let Some(position) = record.position.filter(|_| record.relevant) else {
        return Ok(Vec::new());
    };

    let mut filter = list.sibling_condition(&record.scope, ListView::Relevant)?;
    let column = list.column_sql();
    let (comparison, order) = match direction {
        Direction::Higher => ("<", "DESC"),
        Direction::Lower => (">", "ASC"),
    };
    filter.push_param(format!("{column} {comparison} ?"), Value::Integer(position));
    filter.push_param(format!("{} <> ?", list.pk_sql()), Value::Integer(id));
    ordered_ids_tx(conn, list, &filter, order, limit)
}

fn ordered_ids_tx(
    conn: &Connection,
    list: &OrderedList,
    filter: &Filter,
    order: &str,
    limit: Option<usize>,
) -> Result<Vec<i64>, StoreError> {
    let mut sql = format!(
        "SELECT {pk} FROM {} WHERE {} ORDER BY {} {order}, {pk} {order}",
        list.table_sql(),
        filter.to_sql(),
        list.column_sql(),
        pk = list.pk_sql(),
    );
    if let Some(limit) = limit {
        let limit = i64::try_from(limit).map_err(|_| StoreError::InvalidInput("numeric overflow"))?;
        sql.push_str(&format!(" LIMIT {limit}"));
    }
    let ids = conn
        .prepare(&sql)?
        .query_map(filter.params(), |row| row.get::<_, i64>(0))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(ids)
}
