//! Error types

use thiserror::Error;

/// Errors that can occur while building flattened serverclass data.
///
/// Stream exhaustion is deliberately not represented here: the bitstream
/// reader signals end-of-data through its sticky overflow flag instead of
/// an error value, and callers test that flag at message boundaries.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// A serverclass names a datatable that was never parsed.
    #[error("no datatable found for serverclass `{0}`")]
    UnknownServerClassTable(String),

    /// A datatable prop points at a table name with no matching datatable.
    #[error("unable to find datatable `{0}` pointed to by sendprop")]
    UnknownPropTable(String),

    /// Two sendtables share a name, so name-based references are ambiguous.
    #[error("datatable name `{0}` is not unique")]
    DuplicateDataTable(String),

    /// A datatable or exclude prop is missing the table name it refers to.
    #[error("sendprop `{0}` has no target table name")]
    MissingTargetTable(String),
}

pub type Result<T> = std::result::Result<T, Error>;
