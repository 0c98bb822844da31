use std::fmt;

use crate::store::StoreError;

#[derive(Debug)]
pub enum ReconError {
    /// TOML parse / deserialization error.
    ConfigParse(String),
    /// Config validation error (empty composite key, unknown layout, etc.).
    ConfigValidation(String),
    /// No portal with this name in the config.
    UnknownPortal(String),
    /// Identifier is not a 10-digit cédula or a 13-digit RUC.
    InvalidSubject(String),
    /// The document store failed; fatal to the query.
    Store(StoreError),
    /// IO error (file read, etc.).
    Io(String),
}

impl fmt::Display for ReconError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConfigParse(msg) => write!(f, "config parse error: {msg}"),
            Self::ConfigValidation(msg) => write!(f, "config validation error: {msg}"),
            Self::UnknownPortal(name) => write!(f, "unknown portal: {name}"),
            Self::InvalidSubject(raw) => {
                write!(f, "invalid identifier '{raw}': expected 10-digit cédula or 13-digit RUC")
            }
            Self::Store(err) => write!(f, "store error: {err}"),
            Self::Io(msg) => write!(f, "IO error: {msg}"),
        }
    }
}

impl std::error::Error for ReconError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Store(err) => Some(err),
            _ => None,
        }
    }
}

impl From<StoreError> for ReconError {
    fn from(err: StoreError) -> Self {
        Self::Store(err)
    }
}
