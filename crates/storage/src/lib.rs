#![forbid(unsafe_code)]

//! Dense, gapless `position` columns for rows of SQLite tables.
//!
//! [`SqliteStore`] wraps each list operation in an immediate transaction;
//! [`OrderedList::before_create`] and [`OrderedList::before_destroy`] let a
//! record layer drive placement from its own transactions.

mod store;

pub use ol_core::{AddNewAt, ConfigError, DensityProblem, ListConfig, MoveOutcome, SqlIdent};
pub use store::*;
