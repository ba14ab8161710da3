#![forbid(unsafe_code)]

use ol_core::SqlIdent;
use rusqlite::types::Value;

/// Values of the scope columns, in configured order.
///
/// A NULL in any slot makes the record its own singleton scope.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ScopeKey(Vec<Value>);

impl ScopeKey {
    pub fn new(values: Vec<Value>) -> Self {
        Self(values)
    }

    /// Key for lists without scope columns.
    pub fn whole_table() -> Self {
        Self(Vec::new())
    }

    pub fn values(&self) -> &[Value] {
        &self.0
    }

    pub fn is_singleton(&self) -> bool {
        self.0.iter().any(|value| matches!(value, Value::Null))
    }
}

impl From<i64> for ScopeKey {
    fn from(value: i64) -> Self {
        Self(vec![Value::Integer(value)])
    }
}

/// A record about to be inserted.
///
/// `position` is the caller's explicit request, if any; `before_create`
/// replaces it with the assigned slot and fills `inverted_position`.
#[derive(Clone, Debug, PartialEq)]
pub struct NewRecord {
    pub scope: ScopeKey,
    pub position: Option<i64>,
    pub inverted_position: Option<i64>,
    pub fields: Vec<(SqlIdent, Value)>,
}

impl NewRecord {
    pub fn new(scope: ScopeKey) -> Self {
        Self {
            scope,
            position: None,
            inverted_position: None,
            fields: Vec::new(),
        }
    }

    pub fn at(mut self, position: i64) -> Self {
        self.position = Some(position);
        self
    }

    pub fn with_field(mut self, column: SqlIdent, value: Value) -> Self {
        self.fields.push((column, value));
        self
    }
}

/// Snapshot of the list columns of one stored row.
#[derive(Clone, Debug, PartialEq)]
pub struct ListRecord {
    pub id: i64,
    pub scope: ScopeKey,
    pub position: Option<i64>,
    pub inverted_position: Option<i64>,
    pub relevant: bool,
}

impl ListRecord {
    pub fn in_list(&self) -> bool {
        self.position.is_some()
    }

    /// Takes part in position accounting: ranked and passing the relevance filter.
    pub fn participates(&self) -> bool {
        self.relevant && self.position.is_some()
    }

    /// The per-record constant `C` of `inverted = C - position`.
    pub(crate) fn inverted_constant(&self, default_offset: i64) -> i64 {
        match (self.position, self.inverted_position) {
            (Some(position), Some(inverted)) => inverted + position,
            _ => default_offset,
        }
    }
}
