//! Error taxonomy shared by stores, retrieval strategies, and the service.
//!
//! Every fallible operation in docstore returns [`Result`]. The HTTP layer
//! translates an [`Error`] into a status code exactly once, using
//! [`Error::code`] as the machine-readable error code.

use thiserror::Error;

/// Errors produced by document store and retrieval operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// The presented credential is missing or does not match the secret.
    #[error("{0}")]
    Unauthorized(String),

    /// No shared secret is configured, so no request can be authenticated.
    #[error("{0}")]
    MisconfiguredServer(String),

    /// The retrieval collaborator failed to initialize at startup.
    #[error("{0}")]
    ServiceUnavailable(String),

    /// No document exists with the requested id.
    #[error("Document not found: {0}")]
    NotFound(String),

    /// The search query or limit is unusable (e.g. blank query).
    #[error("{0}")]
    InvalidQuery(String),

    /// The document payload is unusable (e.g. blank text).
    #[error("{0}")]
    InvalidDocument(String),

    /// A call into the retrieval collaborator exceeded its deadline.
    #[error("{0}")]
    Timeout(String),

    /// Unexpected failure from the store or the retrieval collaborator.
    #[error("{0}")]
    StoreFailure(String),
}

impl Error {
    /// Machine-readable error code used in HTTP error bodies.
    pub fn code(&self) -> &'static str {
        match self {
            Error::Unauthorized(_) => "unauthorized",
            Error::MisconfiguredServer(_) => "misconfigured_server",
            Error::ServiceUnavailable(_) => "service_unavailable",
            Error::NotFound(_) => "not_found",
            Error::InvalidQuery(_) => "invalid_query",
            Error::InvalidDocument(_) => "bad_request",
            Error::Timeout(_) => "timeout",
            Error::StoreFailure(_) => "store_failure",
        }
    }

    /// Wrap any displayable backend error as a [`Error::StoreFailure`].
    pub fn store(err: impl std::fmt::Display) -> Self {
        Error::StoreFailure(err.to_string())
    }
}

/// Convenience result type for docstore operations.
pub type Result<T> = std::result::Result<T, Error>;
