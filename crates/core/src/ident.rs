#![forbid(unsafe_code)]

use std::fmt;

const MAX_IDENT_LEN: usize = 64;

/// A table or column name that is safe to splice into SQL text.
///
/// Names are restricted to ASCII letters, digits and `_`, must not start with
/// a digit, and are always emitted double-quoted.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct SqlIdent(String);

impl SqlIdent {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }

    pub fn try_new(value: impl Into<String>) -> Result<Self, SqlIdentError> {
        let value = value.into();
        validate_ident(&value)?;
        Ok(Self(value))
    }

    /// The identifier wrapped in double quotes.
    pub fn quoted(&self) -> String {
        format!("\"{}\"", self.0)
    }
}

impl fmt::Display for SqlIdent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SqlIdentError {
    Empty,
    TooLong,
    InvalidFirstChar,
    InvalidChar { ch: char, index: usize },
}

impl SqlIdentError {
    pub fn message(&self) -> &'static str {
        match self {
            Self::Empty => "identifier must not be empty",
            Self::TooLong => "identifier is too long",
            Self::InvalidFirstChar => "identifier must start with a letter or '_'",
            Self::InvalidChar { .. } => "identifier may only contain [A-Za-z0-9_]",
        }
    }
}

fn validate_ident(value: &str) -> Result<(), SqlIdentError> {
    if value.is_empty() {
        return Err(SqlIdentError::Empty);
    }
    if value.len() > MAX_IDENT_LEN {
        return Err(SqlIdentError::TooLong);
    }
    let mut chars = value.chars();
    let Some(first) = chars.next() else {
        return Err(SqlIdentError::Empty);
    };
    if !(first.is_ascii_alphabetic() || first == '_') {
        return Err(SqlIdentError::InvalidFirstChar);
    }
    for (index, ch) in value.chars().enumerate().skip(1) {
        if ch.is_ascii_alphanumeric() || ch == '_' {
            continue;
        }
        return Err(SqlIdentError::InvalidChar { ch, index });
    }
    Ok(())
}
