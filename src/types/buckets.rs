//! Bucket (container) operation inputs and results.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::metadata::{BucketStats, ResponseMetadata};

/// Options for creating a bucket.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CreateBucketOptions {
    /// Bucket name
    pub name: String,
    /// Canned ACL (S3 only): `private`, `public-read`, ...
    pub acl: Option<String>,
    /// Container metadata (Swift only)
    pub meta: Option<BTreeMap<String, String>>,
}

shorthand!(CreateBucketOptions, name);

/// Options for operations addressing a single bucket.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BucketOptions {
    /// Bucket name
    pub name: String,
    /// Resolve a 404 to `Ok(None)` instead of an error
    pub suppress_not_found_error: bool,
}

shorthand!(BucketOptions, name);

impl BucketOptions {
    /// Treat a missing bucket as an empty result.
    #[must_use]
    pub fn suppress_not_found(mut self) -> Self {
        self.suppress_not_found_error = true;
        self
    }
}

/// Options for listing buckets.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FindBucketsOptions {
    /// Bucket name prefix
    pub prefix: Option<String>,
    /// Return at most this many buckets
    pub limit: Option<u32>,
    /// Name of the bucket the previous page ended with
    pub marker: Option<String>,
}

shorthand!(FindBucketsOptions, Some(prefix));

/// Result of reading a bucket's metadata.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BucketInfo {
    /// Generic response metadata
    #[serde(flatten)]
    pub meta: ResponseMetadata,
    /// Bucket statistics
    #[serde(flatten)]
    pub stats: BucketStats,
}

/// One entry of a bucket listing, normalized across styles.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BucketEntry {
    /// Bucket name
    pub name: String,
    /// Creation time (S3)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created: Option<DateTime<Utc>>,
    /// Number of objects (Swift)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub object_count: Option<u64>,
    /// Bytes used (Swift)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bytes_used: Option<u64>,
    /// Last modification time (Swift)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_modified: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shorthand_fills_name() {
        let options = BucketOptions::from("photos");
        assert_eq!(options.name, "photos");
        assert!(!options.suppress_not_found_error);
        assert!(BucketOptions::from("photos").suppress_not_found().suppress_not_found_error);
    }

    #[test]
    fn test_shorthand_fills_prefix_for_listing() {
        let options = FindBucketsOptions::from("log-".to_string());
        assert_eq!(options.prefix.as_deref(), Some("log-"));
        assert_eq!(options.limit, None);
    }

    #[test]
    fn test_bucket_entry_serializes_only_known_fields() {
        let entry = BucketEntry {
            name: "photos".to_string(),
            created: None,
            object_count: Some(3),
            bytes_used: Some(1024),
            last_modified: None,
        };
        let value = serde_json::to_value(&entry).expect("serializable");
        assert_eq!(value, serde_json::json!({"name": "photos", "objectCount": 3, "bytesUsed": 1024}));
    }
}
