//! Error types for link checking.

use std::time::Duration;

use cdr_linkrule::SyntaxError;
use thiserror::Error;

/// Errors that abort a link-check call.
///
/// Problems with individual links are not errors at this level; they are
/// collected as messages on the affected [`LinkDescriptor`](crate::LinkDescriptor).
#[derive(Error, Debug)]
pub enum LinkCheckError {
    /// A link-check rule failed to parse.
    #[error("Link check rule parse error: {0}")]
    Syntax(#[from] SyntaxError),

    /// A link type names a custom check that is not registered.
    #[error("Unknown link check custom routine: {0}")]
    UnknownCustomRule(String),

    /// The rule cache lock could not be taken in time.
    #[error("Timeout after {0:?} waiting for the link rule cache")]
    LockTimeout(Duration),

    /// More distinct rules than the rule cache holds.
    #[error("Too many link check rules: cache capacity {capacity} exhausted")]
    CacheExhausted {
        /// Configured capacity.
        capacity: usize,
    },

    /// The source document type is not known to the store.
    #[error("Unknown document type: {0}")]
    UnknownDocType(String),

    /// A document type has no link type for a field.
    #[error("No link type is defined for field {field} in document type {doc_type}")]
    UnknownLinkField {
        /// Document type name.
        doc_type: String,
        /// Field name.
        field: String,
    },

    /// The document could not be turned into a tree.
    #[error("Document error: {0}")]
    Document(String),

    /// Error from the underlying store.
    #[error("Store error: {0}")]
    Store(String),
}

impl LinkCheckError {
    /// Whether the same call may succeed if retried.
    pub fn is_retryable(&self) -> bool {
        matches!(self, LinkCheckError::LockTimeout(_))
    }
}

impl From<quick_xml::Error> for LinkCheckError {
    fn from(err: quick_xml::Error) -> Self {
        LinkCheckError::Document(err.to_string())
    }
}

/// Result type for link-check operations.
pub type LinkResult<T> = std::result::Result<T, LinkCheckError>;
