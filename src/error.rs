//! Error types for the osapi client.
//!
//! Storage failures are values, not a type hierarchy: a [`StorageError`]
//! carries the action, the caller's request meta and the response record,
//! and is classified through predicates such as [`StorageError::is_not_found`].

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Main error type for the osapi client.
#[derive(Error, Debug, Clone)]
pub enum Error {
    /// A required option is missing or an option has an invalid value.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Operation arguments are malformed; raised before any I/O.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The token exchange was rejected. Every queued and later operation on
    /// the same connection receives this error.
    #[error("Authentication failed: {0}")]
    Authentication(StorageError),

    /// The storage service answered with an unexpected status.
    #[error(transparent)]
    Storage(StorageError),

    /// HTTP transport error
    #[error("HTTP error: {0}")]
    Http(String),

    /// XML body could not be decoded
    #[error("XML error: {0}")]
    Xml(String),

    /// JSON body could not be decoded
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// The operation is not offered by this connection style.
    #[error("Unsupported operation: {0}")]
    Unsupported(String),
}

impl Error {
    /// Build the error raised when required options are absent.
    ///
    /// Each group is a set of options that must be given together; any one
    /// group satisfies the requirement.
    #[must_use]
    pub fn option_absent(groups: &[&[&str]]) -> Self {
        let expressions: Vec<String> = groups
            .iter()
            .map(|group| {
                if group.len() == 1 {
                    group[0].to_string()
                } else {
                    format!("({})", group.join(", "))
                }
            })
            .collect();
        Self::Configuration(format!(
            "Required option(s) absent: {}",
            expressions.join(" | ")
        ))
    }

    /// Get the storage error carried by this error, if any.
    #[must_use]
    pub fn storage_error(&self) -> Option<&StorageError> {
        match self {
            Self::Storage(e) | Self::Authentication(e) => Some(e),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialization(e.to_string())
    }
}

impl From<quick_xml::DeError> for Error {
    fn from(e: quick_xml::DeError) -> Self {
        Self::Xml(e.to_string())
    }
}

/// Check whether an error is a storage error with status 404.
#[must_use]
pub fn is_not_found(error: &Error) -> bool {
    error.storage_error().is_some_and(StorageError::is_not_found)
}

/// Check whether an error is a storage error with status 400.
#[must_use]
pub fn is_bad_request(error: &Error) -> bool {
    error.storage_error().is_some_and(StorageError::is_bad_request)
}

/// What the client was doing when a storage error happened.
///
/// Rendered as `<ENTITY>_<ACTION>`, e.g. `OBJECT_DELETE`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Action {
    Auth,
    ServiceGet,
    BucketCreate,
    BucketDelete,
    BucketHead,
    BucketGet,
    ObjectGet,
    ObjectHead,
    ObjectPut,
    ObjectPost,
    ObjectCopy,
    ObjectDelete,
}

impl Action {
    /// Get the wire-style tag of the action.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Auth => "AUTH",
            Self::ServiceGet => "SERVICE_GET",
            Self::BucketCreate => "BUCKET_CREATE",
            Self::BucketDelete => "BUCKET_DELETE",
            Self::BucketHead => "BUCKET_HEAD",
            Self::BucketGet => "BUCKET_GET",
            Self::ObjectGet => "OBJECT_GET",
            Self::ObjectHead => "OBJECT_HEAD",
            Self::ObjectPut => "OBJECT_PUT",
            Self::ObjectPost => "OBJECT_POST",
            Self::ObjectCopy => "OBJECT_COPY",
            Self::ObjectDelete => "OBJECT_DELETE",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The part of a failed response kept for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseRecord {
    /// HTTP status code
    pub status_code: u16,
    /// HTTP reason phrase
    pub status_message: String,
    /// Vendor error code (e.g. `NoSuchKey`, `BucketAlreadyExists`)
    pub code: Option<String>,
    /// Vendor error message
    pub message: Option<String>,
}

/// An operation received a status outside its expected set.
#[derive(Debug, Clone, PartialEq)]
pub struct StorageError {
    /// Action being performed
    pub action: Action,
    /// Request meta supplied by the caller, for diagnostics only
    pub meta: Value,
    /// Response record
    pub response: ResponseRecord,
}

impl StorageError {
    /// Create a new storage error.
    #[must_use]
    pub fn new(action: Action, meta: Value, response: ResponseRecord) -> Self {
        Self {
            action,
            meta,
            response,
        }
    }

    /// Get the HTTP status code.
    #[must_use]
    pub fn status_code(&self) -> u16 {
        self.response.status_code
    }

    /// Get the vendor error code if the body carried one.
    #[must_use]
    pub fn code(&self) -> Option<&str> {
        self.response.code.as_deref()
    }

    /// Status was exactly 404.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        self.response.status_code == 404
    }

    /// Status was exactly 400.
    #[must_use]
    pub fn is_bad_request(&self) -> bool {
        self.response.status_code == 400
    }
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = self
            .meta
            .get("name")
            .and_then(Value::as_str)
            .unwrap_or("-");
        write!(
            f,
            "failed {} {} {} {}",
            self.action, name, self.response.status_code, self.response.status_message
        )
    }
}

impl std::error::Error for StorageError {}
