#![forbid(unsafe_code)]

//! Per-table list configuration.
//!
//! A [`ListConfig`] is resolved once for a table and never mutated
//! afterwards. It can be assembled with [`ListConfig::builder`] or parsed from
//! a JSON document with [`ListConfig::from_json`]:
//!
//! ```json
//! {
//!   "table": "mixins",
//!   "column_name": "pos",
//!   "scope": ["parent_id", "parent_type"],
//!   "add_new_at": "top",
//!   "inverted_position": true,
//!   "relevance": { "column": "archived_at", "is_null": true }
//! }
//! ```

use crate::ident::{SqlIdent, SqlIdentError};
use serde::Deserialize;
use std::collections::BTreeSet;

pub const DEFAULT_POSITION_COLUMN: &str = "position";
pub const DEFAULT_INVERTED_COLUMN: &str = "inverted_position";
pub const DEFAULT_PRIMARY_KEY: &str = "id";
pub const DEFAULT_TOP_OF_LIST: i64 = 1;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid {field} identifier {value:?}: {}", .reason.message())]
    InvalidIdentifier {
        field: &'static str,
        value: String,
        reason: SqlIdentError,
    },
    #[error("unknown add_new_at value {0:?} (expected bottom, top or none)")]
    UnknownAddNewAt(String),
    #[error("column {0} is configured for more than one role")]
    DuplicateColumn(String),
    #[error("relevance filter must set exactly one of is_null or equals")]
    AmbiguousRelevance,
    #[error("invalid list config json: {0}")]
    Json(#[from] serde_json::Error),
}

/// Placement policy for records created without an explicit position.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum AddNewAt {
    #[default]
    Bottom,
    Top,
    /// New records stay unranked until moved explicitly.
    Disabled,
}

impl AddNewAt {
    pub fn as_str(self) -> &'static str {
        match self {
            AddNewAt::Bottom => "bottom",
            AddNewAt::Top => "top",
            AddNewAt::Disabled => "none",
        }
    }

    pub fn parse(value: &str) -> Result<Self, ConfigError> {
        match value.trim() {
            "bottom" => Ok(AddNewAt::Bottom),
            "top" => Ok(AddNewAt::Top),
            "none" => Ok(AddNewAt::Disabled),
            other => Err(ConfigError::UnknownAddNewAt(other.to_string())),
        }
    }
}

/// Mirrored descending column, kept equal to `offset - position`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InvertedPosition {
    column: SqlIdent,
    offset: i64,
}

impl InvertedPosition {
    pub fn column(&self) -> &SqlIdent {
        &self.column
    }

    pub fn offset(&self) -> i64 {
        self.offset
    }

    pub fn value_for(&self, position: i64) -> i64 {
        self.offset - position
    }
}

/// Predicate selecting which rows take part in position accounting.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Relevance {
    IsNull(SqlIdent),
    NotNull(SqlIdent),
    Equals(SqlIdent, i64),
}

impl Relevance {
    pub fn column(&self) -> &SqlIdent {
        match self {
            Relevance::IsNull(column) | Relevance::NotNull(column) => column,
            Relevance::Equals(column, _) => column,
        }
    }

    /// SQL boolean expression; NULL comparisons count as not relevant.
    pub fn to_sql(&self) -> String {
        match self {
            Relevance::IsNull(column) => format!("{} IS NULL", column.quoted()),
            Relevance::NotNull(column) => format!("{} IS NOT NULL", column.quoted()),
            Relevance::Equals(column, value) => {
                format!("COALESCE({} = {value}, 0)", column.quoted())
            }
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ListConfig {
    table: SqlIdent,
    primary_key: SqlIdent,
    column: SqlIdent,
    scope: Vec<SqlIdent>,
    top_of_list: i64,
    add_new_at: AddNewAt,
    inverted: Option<InvertedPosition>,
    relevance: Option<Relevance>,
    sequential_updates: Option<bool>,
}

impl ListConfig {
    pub fn builder(table: impl Into<String>) -> ListConfigBuilder {
        ListConfigBuilder::new(table)
    }

    pub fn from_json(raw: &str) -> Result<Self, ConfigError> {
        let file: ListConfigFile = serde_json::from_str(raw)?;
        file.into_config()
    }

    pub fn table(&self) -> &SqlIdent {
        &self.table
    }

    pub fn primary_key(&self) -> &SqlIdent {
        &self.primary_key
    }

    pub fn column(&self) -> &SqlIdent {
        &self.column
    }

    pub fn scope(&self) -> &[SqlIdent] {
        &self.scope
    }

    pub fn top_of_list(&self) -> i64 {
        self.top_of_list
    }

    pub fn add_new_at(&self) -> AddNewAt {
        self.add_new_at
    }

    pub fn inverted(&self) -> Option<&InvertedPosition> {
        self.inverted.as_ref()
    }

    pub fn has_inverted_position(&self) -> bool {
        self.inverted.is_some()
    }

    pub fn relevance(&self) -> Option<&Relevance> {
        self.relevance.as_ref()
    }

    /// `None` means the store decides from its indexes.
    pub fn sequential_updates(&self) -> Option<bool> {
        self.sequential_updates
    }
}

#[derive(Clone, Debug)]
pub struct ListConfigBuilder {
    table: String,
    primary_key: String,
    column: String,
    scope: Vec<String>,
    top_of_list: i64,
    add_new_at: AddNewAt,
    inverted: Option<(String, i64)>,
    relevance: Option<RelevanceRule>,
    sequential_updates: Option<bool>,
}

#[derive(Clone, Debug)]
enum RelevanceRule {
    IsNull(String),
    NotNull(String),
    Equals(String, i64),
}

impl ListConfigBuilder {
    fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            primary_key: DEFAULT_PRIMARY_KEY.to_string(),
            column: DEFAULT_POSITION_COLUMN.to_string(),
            scope: Vec::new(),
            top_of_list: DEFAULT_TOP_OF_LIST,
            add_new_at: AddNewAt::default(),
            inverted: None,
            relevance: None,
            sequential_updates: None,
        }
    }

    pub fn primary_key(mut self, column: impl Into<String>) -> Self {
        self.primary_key = column.into();
        self
    }

    pub fn column(mut self, column: impl Into<String>) -> Self {
        self.column = column.into();
        self
    }

    pub fn scope<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.scope = columns.into_iter().map(Into::into).collect();
        self
    }

    pub fn top_of_list(mut self, top: i64) -> Self {
        self.top_of_list = top;
        self
    }

    pub fn add_new_at(mut self, policy: AddNewAt) -> Self {
        self.add_new_at = policy;
        self
    }

    pub fn inverted_position(self) -> Self {
        self.inverted_position_column(DEFAULT_INVERTED_COLUMN, 0)
    }

    pub fn inverted_position_column(mut self, column: impl Into<String>, offset: i64) -> Self {
        self.inverted = Some((column.into(), offset));
        self
    }

    pub fn relevant_when_null(mut self, column: impl Into<String>) -> Self {
        self.relevance = Some(RelevanceRule::IsNull(column.into()));
        self
    }

    pub fn relevant_when_not_null(mut self, column: impl Into<String>) -> Self {
        self.relevance = Some(RelevanceRule::NotNull(column.into()));
        self
    }

    pub fn relevant_when_equals(mut self, column: impl Into<String>, value: i64) -> Self {
        self.relevance = Some(RelevanceRule::Equals(column.into(), value));
        self
    }

    pub fn sequential_updates(mut self, enabled: bool) -> Self {
        self.sequential_updates = Some(enabled);
        self
    }

    pub fn build(self) -> Result<ListConfig, ConfigError> {
        let table = ident("table", self.table)?;
        let primary_key = ident("primary_key", self.primary_key)?;
        let column = ident("column_name", self.column)?;
        let scope = self
            .scope
            .into_iter()
            .map(|value| ident("scope", value))
            .collect::<Result<Vec<_>, _>>()?;
        let inverted = self
            .inverted
            .map(|(column, offset)| {
                Ok::<_, ConfigError>(InvertedPosition {
                    column: ident("inverted_position", column)?,
                    offset,
                })
            })
            .transpose()?;
        let relevance = self
            .relevance
            .map(|rule| {
                Ok::<_, ConfigError>(match rule {
                    RelevanceRule::IsNull(column) => Relevance::IsNull(ident("relevance", column)?),
                    RelevanceRule::NotNull(column) => {
                        Relevance::NotNull(ident("relevance", column)?)
                    }
                    RelevanceRule::Equals(column, value) => {
                        Relevance::Equals(ident("relevance", column)?, value)
                    }
                })
            })
            .transpose()?;

        // The relevance column may double as a scope column; the rank
        // columns and the key must each be distinct from everything else.
        let mut seen = BTreeSet::new();
        let mut roles = vec![&primary_key, &column];
        if let Some(inverted) = inverted.as_ref() {
            roles.push(&inverted.column);
        }
        roles.extend(scope.iter());
        for name in roles {
            if !seen.insert(name.as_str()) {
                return Err(ConfigError::DuplicateColumn(name.to_string()));
            }
        }
        if let Some(relevance) = relevance.as_ref() {
            let name = relevance.column();
            let is_rank_column = name == &column
                || name == &primary_key
                || inverted.as_ref().is_some_and(|inv| &inv.column == name);
            if is_rank_column {
                return Err(ConfigError::DuplicateColumn(name.to_string()));
            }
        }

        Ok(ListConfig {
            table,
            primary_key,
            column,
            scope,
            top_of_list: self.top_of_list,
            add_new_at: self.add_new_at,
            inverted,
            relevance,
            sequential_updates: self.sequential_updates,
        })
    }
}

fn ident(field: &'static str, value: String) -> Result<SqlIdent, ConfigError> {
    SqlIdent::try_new(value.clone()).map_err(|reason| ConfigError::InvalidIdentifier {
        field,
        value,
        reason,
    })
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ListConfigFile {
    table: String,
    #[serde(default)]
    primary_key: Option<String>,
    #[serde(default)]
    column_name: Option<String>,
    #[serde(default)]
    scope: Vec<String>,
    #[serde(default)]
    top_of_list: Option<i64>,
    #[serde(default)]
    add_new_at: Option<String>,
    #[serde(default)]
    inverted_position: Option<InvertedFile>,
    #[serde(default)]
    relevance: Option<RelevanceFile>,
    #[serde(default)]
    sequential_updates: Option<bool>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum InvertedFile {
    Enabled(bool),
    Column {
        #[serde(default)]
        column: Option<String>,
        #[serde(default)]
        offset: Option<i64>,
    },
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RelevanceFile {
    column: String,
    #[serde(default)]
    is_null: Option<bool>,
    #[serde(default)]
    equals: Option<i64>,
}

impl ListConfigFile {
    fn into_config(self) -> Result<ListConfig, ConfigError> {
        let mut builder = ListConfig::builder(self.table).scope(self.scope);
        if let Some(primary_key) = self.primary_key {
            builder = builder.primary_key(primary_key);
        }
        if let Some(column) = self.column_name {
            builder = builder.column(column);
        }
        if let Some(top) = self.top_of_list {
            builder = builder.top_of_list(top);
        }
        if let Some(policy) = self.add_new_at.as_deref() {
            builder = builder.add_new_at(AddNewAt::parse(policy)?);
        }
        match self.inverted_position {
            None | Some(InvertedFile::Enabled(false)) => {}
            Some(InvertedFile::Enabled(true)) => builder = builder.inverted_position(),
            Some(InvertedFile::Column { column, offset }) => {
                builder = builder.inverted_position_column(
                    column.unwrap_or_else(|| DEFAULT_INVERTED_COLUMN.to_string()),
                    offset.unwrap_or(0),
                );
            }
        }
        if let Some(relevance) = self.relevance {
            builder = match (relevance.is_null, relevance.equals) {
                (Some(true), None) => builder.relevant_when_null(relevance.column),
                (Some(false), None) => builder.relevant_when_not_null(relevance.column),
                (None, Some(value)) => builder.relevant_when_equals(relevance.column, value),
                _ => return Err(ConfigError::AmbiguousRelevance),
            };
        }
        if let Some(sequential) = self.sequential_updates {
            builder = builder.sequential_updates(sequential);
        }
        builder.build()
    }
}
