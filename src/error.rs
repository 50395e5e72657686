use std::io;

/// Errors surfaced by this crate's public API.
///
/// Sanity-check findings are *not* represented here: they are accumulated as
/// [`crate::catalog::Diagnostic`] values alongside a successfully returned
/// catalog. `Error` is reserved for failures that make it impossible to hand
/// back a usable result for the current record.
#[derive(Debug)]
pub enum Error {
    IOError(io::Error),
    SerdeJSONError(serde_json::Error),
    InvalidEnumValue(String),
    MalformedRecord(String),
    MalformedHeader(String),
    RecursiveNesting(String),
    UnexpectedTextTag(String),
    InvalidState(String),
    NotImplemented(String),
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Error::IOError(err)
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::SerdeJSONError(err)
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

impl std::error::Error for Error {}
