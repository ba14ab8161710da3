#![forbid(unsafe_code)]

use super::OrderedList;
use crate::store::error::StoreError;
use crate::store::records::{ListRecord, ScopeKey};
use ol_core::{DensityProblem, RankedRow, check_scope};
use rusqlite::Connection;
use tracing::warn;

#[derive(Clone, Debug, PartialEq)]
pub struct ScopeReport {
    pub scope: ScopeKey,
    pub problems: Vec<DensityProblem>,
}

/// Outcome of a density check over one or all scopes of a list.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ConsistencyReport {
    pub scopes_checked: usize,
    pub offending: Vec<ScopeReport>,
}

impl ConsistencyReport {
    pub fn is_consistent(&self) -> bool {
        self.offending.is_empty()
    }

    pub fn offending_scopes(&self) -> impl Iterator<Item = &ScopeKey> {
        self.offending.iter().map(|report| &report.scope)
    }
}

pub(crate) fn check_consistency_tx(
    conn: &Connection,
    list: &OrderedList,
    scope: Option<&ScopeKey>,
) -> Result<ConsistencyReport, StoreError> {
    let filter = match scope {
        Some(scope) => list.scope_condition(scope)?,
        None => Default::default(),
    };
    let mut order: Vec<String> = list
        .config()
        .scope()
        .iter()
        .map(|column| column.quoted())
        .collect();
    order.push(list.pk_sql());
    let sql = format!(
        "{} WHERE {} ORDER BY {}",
        list.select_sql(),
        filter.to_sql(),
        order.join(", ")
    );
    let records = conn
        .prepare(&sql)?
        .query_map(filter.params(), |row| list.read_record(row))?
        .collect::<Result<Vec<_>, _>>()?;

    let groups = group_by_scope(records);
    let inverted_offset = list.config().inverted().map(|inverted| inverted.offset());
    let mut report = ConsistencyReport {
        scopes_checked: groups.len(),
        offending: Vec::new(),
    };
    for (scope, rows) in groups {
        let problems = check_scope(&rows, list.top(), inverted_offset);
        if !problems.is_empty() {
            report.offending.push(ScopeReport { scope, problems });
        }
    }

    if !report.is_consistent() {
        warn!(
            table = %list.config().table(),
            offending = report.offending.len(),
            checked = report.scopes_checked,
            "list positions are inconsistent"
        );
    }
    Ok(report)
}

/// Rows arrive ordered by scope columns, so equal keys are adjacent. Keys with
/// a NULL slot never merge.
fn group_by_scope(records: Vec<ListRecord>) -> Vec<(ScopeKey, Vec<RankedRow>)> {
    let mut groups: Vec<(ScopeKey, Vec<RankedRow>)> = Vec::new();
    for record in records {
        let row = RankedRow {
            id: record.id,
            position: record.position,
            inverted: record.inverted_position,
            relevant: record.relevant,
        };
        match groups.last_mut() {
            Some((scope, rows)) if !scope.is_singleton() && *scope == record.scope => rows.push(row),
            _ => groups.push((record.scope, vec![row])),
        }
    }
    groups
}
