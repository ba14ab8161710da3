#![forbid(unsafe_code)]

//! Position engine.
//!
//! Every function here runs inside the caller's transaction. Sibling shifts
//! are always issued before the acting record's own write. In sequential mode
//! the acting record is first parked at NULL so a UNIQUE index over the rank
//! columns never sees two rows on one slot.

use super::OrderedList;
use super::scope::{
    ListView, bottom_position_in_full_list_tx, bottom_position_in_relevant_list_tx,
};
use crate::store::error::StoreError;
use crate::store::records::{ListRecord, NewRecord, ScopeKey};
use ol_core::position::{plan_create, plan_insert_at, plan_move, plan_removal};
use ol_core::{AddNewAt, MoveOutcome, MovePlan, Shift};
use rusqlite::types::Value;
use rusqlite::{Connection, OptionalExtension, Transaction, params, params_from_iter};
use tracing::{debug, info, trace};

pub(crate) fn find_record_tx(
    conn: &Connection,
    list: &OrderedList,
    id: i64,
) -> Result<Option<ListRecord>, StoreError> {
    let sql = format!("{} WHERE {} = ?1", list.select_sql(), list.pk_sql());
    Ok(conn
        .query_row(&sql, params![id], |row| list.read_record(row))
        .optional()?)
}

pub(crate) fn load_record_tx(
    conn: &Connection,
    list: &OrderedList,
    id: i64,
) -> Result<ListRecord, StoreError> {
    find_record_tx(conn, list, id)?.ok_or(StoreError::UnknownId(id))
}

pub(crate) fn before_create_tx(
    tx: &Transaction<'_>,
    list: &OrderedList,
    record: &mut NewRecord,
) -> Result<(), StoreError> {
    list.check_scope_key(&record.scope)?;
    let full_bottom = bottom_position_in_full_list_tx(tx, list, &record.scope)?;
    let relevant_bottom = bottom_position_in_relevant_list_tx(tx, list, &record.scope)?;

    let placement = plan_create(
        record.position,
        list.config().add_new_at(),
        list.top(),
        full_bottom,
        relevant_bottom,
    );
    let Some(placement) = placement else {
        record.position = None;
        record.inverted_position = None;
        return Ok(());
    };

    if let Some(shift) = placement.shift {
        apply_shift_tx(tx, list, &record.scope, shift, None)?;
    }
    record.position = Some(placement.position);
    record.inverted_position = list
        .config()
        .inverted()
        .map(|inverted| inverted.value_for(placement.position));
    trace!(
        table = %list.config().table(),
        position = placement.position,
        "placed new record"
    );
    Ok(())
}

pub(crate) fn before_destroy_tx(
    tx: &Transaction<'_>,
    list: &OrderedList,
    id: i64,
) -> Result<MoveOutcome, StoreError> {
    let record = load_record_tx(tx, list, id)?;
    let Some(current) = record.position else {
        return Ok(MoveOutcome::Unchanged);
    };
    if !record.relevant {
        return Ok(MoveOutcome::Unchanged);
    }

    if list.sequential_updates() {
        park_tx(tx, list, &record)?;
    }
    let shifted = apply_shift_tx(tx, list, &record.scope, plan_removal(current), Some(id))?;
    Ok(MoveOutcome::Moved {
        from: Some(current),
        to: None,
        shifted,
    })
}

/// Takes the record out of its list and closes the gap. The row stays, with
/// both rank columns cleared.
pub(crate) fn remove_from_list_tx(
    tx: &Transaction<'_>,
    list: &OrderedList,
    id: i64,
) -> Result<MoveOutcome, StoreError> {
    let record = load_record_tx(tx, list, id)?;
    let Some(current) = record.position else {
        return Ok(MoveOutcome::Unchanged);
    };

    let constant = record.inverted_constant(list.inverted_offset());
    let shifted = if record.relevant {
        if list.sequential_updates() {
            park_tx(tx, list, &record)?;
        }
        apply_shift_tx(tx, list, &record.scope, plan_removal(current), Some(id))?
    } else {
        0
    };
    set_position_tx(tx, list, id, None, constant)?;
    Ok(MoveOutcome::Moved {
        from: Some(current),
        to: None,
        shifted,
    })
}

pub(crate) fn move_to_tx(
    tx: &Transaction<'_>,
    list: &OrderedList,
    id: i64,
    requested: i64,
) -> Result<MoveOutcome, StoreError> {
    let record = load_record_tx(tx, list, id)?;
    if record.in_list() {
        move_record_tx(tx, list, &record, requested)
    } else {
        insert_record_at_tx(tx, list, &record, requested)
    }
}

pub(crate) fn insert_at_tx(
    tx: &Transaction<'_>,
    list: &OrderedList,
    id: i64,
    requested: i64,
) -> Result<MoveOutcome, StoreError> {
    move_to_tx(tx, list, id, requested)
}

pub(crate) fn move_higher_tx(
    tx: &Transaction<'_>,
    list: &OrderedList,
    id: i64,
) -> Result<MoveOutcome, StoreError> {
    let record = load_record_tx(tx, list, id)?;
    match record.position {
        Some(current) => move_record_tx(tx, list, &record, current.saturating_sub(1)),
        None => Ok(MoveOutcome::Unchanged),
    }
}

pub(crate) fn move_lower_tx(
    tx: &Transaction<'_>,
    list: &OrderedList,
    id: i64,
) -> Result<MoveOutcome, StoreError> {
    let record = load_record_tx(tx, list, id)?;
    match record.position {
        Some(current) => move_record_tx(tx, list, &record, current.saturating_add(1)),
        None => Ok(MoveOutcome::Unchanged),
    }
}

pub(crate) fn move_to_top_tx(
    tx: &Transaction<'_>,
    list: &OrderedList,
    id: i64,
) -> Result<MoveOutcome, StoreError> {
    move_to_tx(tx, list, id, list.top())
}

pub(crate) fn move_to_bottom_tx(
    tx: &Transaction<'_>,
    list: &OrderedList,
    id: i64,
) -> Result<MoveOutcome, StoreError> {
    let record = load_record_tx(tx, list, id)?;
    let bottom = bottom_position_in_relevant_list_tx(tx, list, &record.scope)?;
    if record.in_list() {
        move_record_tx(tx, list, &record, bottom)
    } else {
        insert_record_at_tx(tx, list, &record, bottom.saturating_add(1))
    }
}

/// Exchanges the positions of two ranked records of the same list.
pub(crate) fn swap_positions_tx(
    tx: &Transaction<'_>,
    list: &OrderedList,
    left: i64,
    right: i64,
) -> Result<MoveOutcome, StoreError> {
    if left == right {
        return Ok(MoveOutcome::Unchanged);
    }
    let a = load_record_tx(tx, list, left)?;
    let b = load_record_tx(tx, list, right)?;
    let (Some(a_position), Some(b_position)) = (a.position, b.position) else {
        return Err(StoreError::InvalidInput("both records must be in the list"));
    };
    if !a.relevant || !b.relevant || a.scope.is_singleton() || a.scope != b.scope {
        return Err(StoreError::ScopeMismatch { left, right });
    }

    let offset = list.inverted_offset();
    if list.sequential_updates() {
        park_tx(tx, list, &a)?;
    }
    set_position_tx(tx, list, right, Some(a_position), b.inverted_constant(offset))?;
    set_position_tx(tx, list, left, Some(b_position), a.inverted_constant(offset))?;
    Ok(MoveOutcome::Moved {
        from: Some(a_position),
        to: Some(b_position),
        shifted: 1,
    })
}

/// Moves a record to another scope: its old list closes the gap and the new
/// list receives it per `add_new_at` (bottom when auto-placement is off).
pub(crate) fn change_scope_tx(
    tx: &Transaction<'_>,
    list: &OrderedList,
    id: i64,
    scope: &ScopeKey,
) -> Result<MoveOutcome, StoreError> {
    list.check_scope_key(scope)?;
    let record = load_record_tx(tx, list, id)?;
    if record.scope == *scope {
        return Ok(MoveOutcome::Unchanged);
    }

    let Some(current) = record.position.filter(|_| record.relevant) else {
        write_scope_tx(
            tx,
            list,
            id,
            scope,
            record.position,
            record.inverted_position,
        )?;
        return Ok(MoveOutcome::Moved {
            from: record.position,
            to: record.position,
            shifted: 0,
        });
    };

    if list.sequential_updates() {
        park_tx(tx, list, &record)?;
    }
    let mut shifted = apply_shift_tx(tx, list, &record.scope, plan_removal(current), Some(id))?;

    let policy = match list.config().add_new_at() {
        AddNewAt::Top => AddNewAt::Top,
        AddNewAt::Bottom | AddNewAt::Disabled => AddNewAt::Bottom,
    };
    let full_bottom = bottom_position_in_full_list_tx(tx, list, scope)?;
    let relevant_bottom = bottom_position_in_relevant_list_tx(tx, list, scope)?;
    let Some(placement) = plan_create(None, policy, list.top(), full_bottom, relevant_bottom)
    else {
        return Err(StoreError::InvalidInput("no placement for scope change"));
    };
    if let Some(shift) = placement.shift {
        shifted += apply_shift_tx(tx, list, scope, shift, Some(id))?;
    }

    let constant = record.inverted_constant(list.inverted_offset());
    let inverted = list
        .config()
        .inverted()
        .map(|_| constant - placement.position);
    write_scope_tx(tx, list, id, scope, Some(placement.position), inverted)?;
    Ok(MoveOutcome::Moved {
        from: Some(current),
        to: Some(placement.position),
        shifted,
    })
}

/// Renumbers the relevant ranked rows of a scope to `top..top+n` in their
/// current order, ties broken by primary key. Returns the rows rewritten.
pub(crate) fn repair_scope_tx(
    tx: &Transaction<'_>,
    list: &OrderedList,
    scope: &ScopeKey,
) -> Result<usize, StoreError> {
    let filter = list.sibling_condition(scope, ListView::Relevant)?;
    let sql = format!(
        "{} WHERE {} ORDER BY {} ASC, {} ASC",
        list.select_sql(),
        filter.to_sql(),
        list.column_sql(),
        list.pk_sql()
    );
    let records = tx
        .prepare(&sql)?
        .query_map(filter.params(), |row| list.read_record(row))?
        .collect::<Result<Vec<_>, _>>()?;

    let offset = list.inverted_offset();
    let has_inverted = list.config().has_inverted_position();
    let mut rewrites = Vec::new();
    for (record, position) in records.iter().zip(list.top()..) {
        let constant = record.inverted_constant(offset);
        let inverted_ok = !has_inverted || record.inverted_position == Some(constant - position);
        if record.position != Some(position) || !inverted_ok {
            rewrites.push((record, position, constant));
        }
    }

    if list.sequential_updates() {
        for (record, _, _) in &rewrites {
            park_tx(tx, list, record)?;
        }
    }
    for (record, position, constant) in &rewrites {
        set_position_tx(tx, list, record.id, Some(*position), *constant)?;
    }

    info!(
        table = %list.config().table(),
        scanned = records.len(),
        rewritten = rewrites.len(),
        "repaired list scope"
    );
    Ok(rewrites.len())
}

/// Adds one to every relevant sibling in `[from, until]`, pushing them one
/// slot lower in the list.
pub(crate) fn increment_positions_on_lower_items_tx(
    conn: &Connection,
    list: &OrderedList,
    scope: &ScopeKey,
    from: i64,
    until: Option<i64>,
    exclude: Option<i64>,
) -> Result<usize, StoreError> {
    shift_rows_tx(
        conn,
        list,
        scope,
        Shift {
            from,
            to: until,
            delta: 1,
        },
        exclude,
    )
}

/// Subtracts one from every relevant sibling in `[from, until]`, pulling them
/// one slot higher in the list.
pub(crate) fn decrement_positions_on_higher_items_tx(
    conn: &Connection,
    list: &OrderedList,
    scope: &ScopeKey,
    from: i64,
    until: Option<i64>,
    exclude: Option<i64>,
) -> Result<usize, StoreError> {
    shift_rows_tx(
        conn,
        list,
        scope,
        Shift {
            from,
            to: until,
            delta: -1,
        },
        exclude,
    )
}

fn move_record_tx(
    tx: &Transaction<'_>,
    list: &OrderedList,
    record: &ListRecord,
    requested: i64,
) -> Result<MoveOutcome, StoreError> {
    let Some(current) = record.position else {
        return Ok(MoveOutcome::Unchanged);
    };
    if !record.relevant {
        return Ok(MoveOutcome::Unchanged);
    }
    let bottom = bottom_position_in_relevant_list_tx(tx, list, &record.scope)?;
    let MovePlan::Move { target, shift } = plan_move(current, requested, list.top(), bottom)
    else {
        return Ok(MoveOutcome::Unchanged);
    };

    let constant = record.inverted_constant(list.inverted_offset());
    if list.sequential_updates() {
        park_tx(tx, list, record)?;
    }
    let shifted = apply_shift_tx(tx, list, &record.scope, shift, Some(record.id))?;
    set_position_tx(tx, list, record.id, Some(target), constant)?;
    Ok(MoveOutcome::Moved {
        from: Some(current),
        to: Some(target),
        shifted,
    })
}

fn insert_record_at_tx(
    tx: &Transaction<'_>,
    list: &OrderedList,
    record: &ListRecord,
    requested: i64,
) -> Result<MoveOutcome, StoreError> {
    if !record.relevant {
        return Ok(MoveOutcome::Unchanged);
    }
    let bottom = bottom_position_in_relevant_list_tx(tx, list, &record.scope)?;
    let placement = plan_insert_at(requested, list.top(), bottom);
    let shifted = match placement.shift {
        Some(shift) => apply_shift_tx(tx, list, &record.scope, shift, Some(record.id))?,
        None => 0,
    };
    let constant = record.inverted_constant(list.inverted_offset());
    set_position_tx(tx, list, record.id, Some(placement.position), constant)?;
    Ok(MoveOutcome::Moved {
        from: None,
        to: Some(placement.position),
        shifted,
    })
}

fn apply_shift_tx(
    conn: &Connection,
    list: &OrderedList,
    scope: &ScopeKey,
    shift: Shift,
    exclude: Option<i64>,
) -> Result<usize, StoreError> {
    if shift.delta > 0 {
        increment_positions_on_lower_items_tx(conn, list, scope, shift.from, shift.to, exclude)
    } else {
        decrement_positions_on_higher_items_tx(conn, list, scope, shift.from, shift.to, exclude)
    }
}

fn shift_rows_tx(
    conn: &Connection,
    list: &OrderedList,
    scope: &ScopeKey,
    shift: Shift,
    exclude: Option<i64>,
) -> Result<usize, StoreError> {
    let column = list.column_sql();
    let pk = list.pk_sql();
    let mut filter = list.sibling_condition(scope, ListView::Relevant)?;
    filter.push_param(format!("{column} >= ?"), Value::Integer(shift.from));
    if let Some(to) = shift.to {
        filter.push_param(format!("{column} <= ?"), Value::Integer(to));
    }
    if let Some(id) = exclude {
        filter.push_param(format!("{pk} <> ?"), Value::Integer(id));
    }

    let delta = shift.delta;
    let mut assignments = format!("{column} = {column} + ({delta})");
    if let Some(inverted) = list.inverted_sql() {
        assignments.push_str(&format!(", {inverted} = {inverted} - ({delta})"));
    }

    let rows = if list.sequential_updates() {
        let order = if shift.visits_descending() { "DESC" } else { "ASC" };
        let select = format!(
            "SELECT {pk} FROM {} WHERE {} ORDER BY {column} {order}",
            list.table_sql(),
            filter.to_sql()
        );
        let ids = conn
            .prepare(&select)?
            .query_map(filter.params(), |row| row.get::<_, i64>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        let update = format!(
            "UPDATE {} SET {assignments} WHERE {pk} = ?1",
            list.table_sql()
        );
        let mut stmt = conn.prepare(&update)?;
        for id in &ids {
            stmt.execute(params![id])?;
        }
        ids.len()
    } else {
        let update = format!(
            "UPDATE {} SET {assignments} WHERE {}",
            list.table_sql(),
            filter.to_sql()
        );
        conn.execute(&update, filter.params())?
    };

    debug!(
        table = %list.config().table(),
        from = shift.from,
        to = ?shift.to,
        delta,
        rows,
        sequential = list.sequential_updates(),
        "shifted sibling positions"
    );
    Ok(rows)
}

/// Writes both rank columns of one row in a single statement.
fn set_position_tx(
    conn: &Connection,
    list: &OrderedList,
    id: i64,
    position: Option<i64>,
    constant: i64,
) -> Result<(), StoreError> {
    let changed = match list.inverted_sql() {
        Some(inverted) => {
            let sql = format!(
                "UPDATE {} SET {} = ?1, {inverted} = ?2 WHERE {} = ?3",
                list.table_sql(),
                list.column_sql(),
                list.pk_sql()
            );
            conn.execute(
                &sql,
                params![position, position.map(|p| constant - p), id],
            )?
        }
        None => {
            let sql = format!(
                "UPDATE {} SET {} = ?1 WHERE {} = ?2",
                list.table_sql(),
                list.column_sql(),
                list.pk_sql()
            );
            conn.execute(&sql, params![position, id])?
        }
    };
    if changed == 0 {
        return Err(StoreError::UnknownId(id));
    }
    trace!(table = %list.config().table(), id, ?position, "wrote own position");
    Ok(())
}

fn park_tx(conn: &Connection, list: &OrderedList, record: &ListRecord) -> Result<(), StoreError> {
    set_position_tx(
        conn,
        list,
        record.id,
        None,
        record.inverted_constant(list.inverted_offset()),
    )
}

fn write_scope_tx(
    conn: &Connection,
    list: &OrderedList,
    id: i64,
    scope: &ScopeKey,
    position: Option<i64>,
    inverted: Option<i64>,
) -> Result<(), StoreError> {
    let mut assignments = Vec::new();
    let mut values: Vec<Value> = Vec::new();
    for (column, value) in list.config().scope().iter().zip(scope.values()) {
        assignments.push(format!("{} = ?", column.quoted()));
        values.push(value.clone());
    }
    assignments.push(format!("{} = ?", list.column_sql()));
    values.push(position.map_or(Value::Null, Value::Integer));
    if let Some(column) = list.inverted_sql() {
        assignments.push(format!("{column} = ?"));
        values.push(inverted.map_or(Value::Null, Value::Integer));
    }
    values.push(Value::Integer(id));

    let sql = format!(
        "UPDATE {} SET {} WHERE {} = ?",
        list.table_sql(),
        assignments.join(", "),
        list.pk_sql()
    );
    let changed = conn.execute(&sql, params_from_iter(values.iter()))?;
    if changed == 0 {
        return Err(StoreError::UnknownId(id));
    }
    Ok(())
}
