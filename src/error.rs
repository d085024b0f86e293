//! Error types for the data-access layer.

use thiserror::Error;

/// Result type alias for the data-access layer.
pub type Result<T> = std::result::Result<T, Error>;

/// Structural errors, detected before any network I/O.
///
/// Transport failures never show up here; they are folded into
/// [`Response`](crate::response::Response) instead.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// The request descriptor has no resource path.
    #[error("request has no resource")]
    MissingResource,

    /// The client has no configured base address.
    #[error("client has no data source configured")]
    MissingDataSource,

    /// A comparator name outside the supported set.
    #[error("{0} comparator not supported")]
    UnsupportedComparator(String),

    /// A concatenator name other than and/or/none.
    #[error("invalid concatenator: {0}")]
    InvalidConcatenator(String),

    /// A filter was built with an empty field name.
    #[error("filter field must not be empty")]
    EmptyField,

    /// A single-item request with an empty document id.
    #[error("document id must not be empty")]
    EmptyDocumentId,

    /// A literal the query dialect cannot express.
    #[error("invalid filter value: {0}")]
    InvalidValue(String),

    /// A create request without an ordered payload.
    #[error("invalid payload: {0}")]
    InvalidPayload(String),
}
