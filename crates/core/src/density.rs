#![forbid(unsafe_code)]

use std::collections::BTreeMap;

/// One row of a scope as read by the consistency checker.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RankedRow {
    pub id: i64,
    pub position: Option<i64>,
    pub inverted: Option<i64>,
    pub relevant: bool,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DensityProblem {
    Gap { expected: i64, found: i64 },
    Duplicate { position: i64, ids: Vec<i64> },
    BeforeTop { id: i64, position: i64 },
    InvertedMismatch {
        id: i64,
        expected: Option<i64>,
        found: Option<i64>,
    },
}

impl DensityProblem {
    pub fn message(&self) -> String {
        match self {
            Self::Gap { expected, found } => {
                format!("gap: expected position {expected}, found {found}")
            }
            Self::Duplicate { position, ids } => {
                format!("duplicate position {position} held by {ids:?}")
            }
            Self::BeforeTop { id, position } => {
                format!("record {id} sits above the top of the list at {position}")
            }
            Self::InvertedMismatch {
                id,
                expected,
                found,
            } => format!("record {id} inverted position {found:?}, expected {expected:?}"),
        }
    }
}

/// Checks that the relevant ranked rows of one scope hold exactly
/// `top..top+n` and, when `inverted_offset` is set, that every row mirrors
/// its position.
pub fn check_scope(rows: &[RankedRow], top: i64, inverted_offset: Option<i64>) -> Vec<DensityProblem> {
    let mut problems = Vec::new();

    let mut by_position: BTreeMap<i64, Vec<i64>> = BTreeMap::new();
    for row in rows.iter().filter(|row| row.relevant) {
        if let Some(position) = row.position {
            by_position.entry(position).or_default().push(row.id);
        }
    }

    let mut expected = top;
    for (position, ids) in by_position {
        if position < top {
            problems.extend(ids.iter().map(|&id| DensityProblem::BeforeTop { id, position }));
            continue;
        }
        if position != expected {
            problems.push(DensityProblem::Gap {
                expected,
                found: position,
            });
        }
        if ids.len() > 1 {
            problems.push(DensityProblem::Duplicate { position, ids });
        }
        expected = position + 1;
    }

    if let Some(offset) = inverted_offset {
        for row in rows {
            let want = row.position.map(|position| offset - position);
            if want != row.inverted {
                problems.push(DensityProblem::InvertedMismatch {
                    id: row.id,
                    expected: want,
                    found: row.inverted,
                });
            }
        }
    }

    problems
}
