#![forbid(unsafe_code)]

pub mod config;
pub mod density;
pub mod ident;
pub mod position;

pub use config::{AddNewAt, ConfigError, InvertedPosition, ListConfig, ListConfigBuilder, Relevance};
pub use density::{DensityProblem, RankedRow, check_scope};
pub use ident::{SqlIdent, SqlIdentError};
pub use position::{MoveOutcome, MovePlan, Placement, Shift};
