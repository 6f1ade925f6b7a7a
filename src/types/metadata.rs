//! Metadata derived from response headers.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Generic information carried by the headers of any response.
///
/// Derived purely from headers and never mutated after parsing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseMetadata {
    /// Request id (`x-{vendor}-request-id`, `x-amz-request-id` or `x-trans-id`)
    pub request_id: Option<String>,
    /// Content type
    pub content_type: Option<String>,
    /// Content length in bytes
    pub content_length: Option<u64>,
    /// Response date
    pub date: Option<DateTime<Utc>>,
    /// Entity tag, without surrounding quotes
    pub etag: Option<String>,
    /// Last modification time
    pub last_modified: Option<DateTime<Utc>>,
    /// User metadata, decoded; `None` when the response carried none
    pub meta: Option<BTreeMap<String, String>>,
}

impl ResponseMetadata {
    /// Swift name of the request id.
    #[must_use]
    pub fn trans_id(&self) -> Option<&str> {
        self.request_id.as_deref()
    }

    /// Get one user metadata value.
    #[must_use]
    pub fn meta_value(&self, name: &str) -> Option<&str> {
        self.meta.as_ref()?.get(name).map(String::as_str)
    }
}

/// Bucket (container) statistics. Parsed from a header set disjoint from
/// the generic one; absent fields are not offered by the service style.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BucketStats {
    /// Number of objects stored
    pub object_count: Option<u64>,
    /// Bytes used by stored objects
    pub bytes_used: Option<u64>,
    /// Swift storage policy
    pub storage_policy: Option<String>,
    /// S3 bucket region
    pub region: Option<String>,
}
