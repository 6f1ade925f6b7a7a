//! Object operation inputs and results.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::metadata::ResponseMetadata;

/// Default lifetime of a signed URL: 24 hours.
pub const DEFAULT_SIGNED_URL_TTL_SECS: u64 = 86_400;

/// Address of one object. `bucket` falls back to the connection default.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectRef {
    /// Bucket (container)
    pub bucket: Option<String>,
    /// Object name (key)
    pub name: String,
}

shorthand!(ObjectRef, name);

impl ObjectRef {
    /// Address an object in an explicit bucket.
    #[must_use]
    pub fn new(bucket: &str, name: &str) -> Self {
        Self {
            bucket: Some(bucket.to_string()),
            name: name.to_string(),
        }
    }
}

/// Options for reading or deleting one object.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ObjectOptions {
    /// Bucket (container)
    pub bucket: Option<String>,
    /// Object name (key)
    pub name: String,
    /// Resolve a 404 to `Ok(None)` instead of an error
    pub suppress_not_found_error: bool,
    /// Resolve a 400 to `Ok(None)` instead of an error
    pub suppress_bad_request_error: bool,
}

shorthand!(ObjectOptions, name);

impl ObjectOptions {
    /// Address an object in an explicit bucket.
    #[must_use]
    pub fn new(bucket: &str, name: &str) -> Self {
        Self {
            bucket: Some(bucket.to_string()),
            name: name.to_string(),
            ..Default::default()
        }
    }

    /// Treat a missing object as an empty result.
    #[must_use]
    pub fn suppress_not_found(mut self) -> Self {
        self.suppress_not_found_error = true;
        self
    }

    /// Treat a rejected request as an empty result.
    #[must_use]
    pub fn suppress_bad_request(mut self) -> Self {
        self.suppress_bad_request_error = true;
        self
    }
}

/// How a metadata-only update treats existing metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetaFlag {
    /// Replace all existing metadata (`'w'`).
    Write,
    /// Merge into existing metadata (`'a'`).
    Append,
}

/// Options for creating an object or updating its metadata.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CreateObjectOptions {
    /// Bucket (container)
    pub bucket: Option<String>,
    /// Object name (key)
    pub name: String,
    /// Content type sent with the object
    pub content_type: Option<String>,
    /// User metadata
    pub meta: Option<BTreeMap<String, String>>,
    /// Canned ACL (S3 only)
    pub acl: Option<String>,
    /// When set, only metadata is updated and the content is left untouched
    pub meta_flag: Option<MetaFlag>,
    /// Resolve a 404 to success
    pub suppress_not_found_error: bool,
    /// Resolve a 400 to success
    pub suppress_bad_request_error: bool,
}

shorthand!(CreateObjectOptions, name);

impl CreateObjectOptions {
    /// Address an object in an explicit bucket.
    #[must_use]
    pub fn new(bucket: &str, name: &str) -> Self {
        Self {
            bucket: Some(bucket.to_string()),
            name: name.to_string(),
            ..Default::default()
        }
    }

    /// Set the content type.
    #[must_use]
    pub fn content_type(mut self, content_type: &str) -> Self {
        self.content_type = Some(content_type.to_string());
        self
    }

    /// Add one user metadata entry.
    #[must_use]
    pub fn meta(mut self, name: &str, value: &str) -> Self {
        self.meta
            .get_or_insert_with(BTreeMap::new)
            .insert(name.to_string(), value.to_string());
        self
    }
}

/// Options for listing objects.
///
/// `path` and `delimiter` are mutually exclusive on Swift. `path` is
/// ignored by S3-style services.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FindObjectsOptions {
    /// Bucket (container)
    pub bucket: Option<String>,
    /// Name prefix
    pub prefix: Option<String>,
    /// Path delimiter, usually `/`
    pub delimiter: Option<String>,
    /// Name of the object the previous page ended with
    pub marker: Option<String>,
    /// Return at most this many items
    pub limit: Option<u32>,
    /// Leading path (Swift)
    pub path: Option<String>,
}

shorthand!(FindObjectsOptions, Some(prefix));

/// Options for generating a signed URL.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SignedUrlOptions {
    /// Bucket (container)
    pub bucket: Option<String>,
    /// Object name (key)
    pub name: String,
    /// Lifetime in seconds; defaults to 24 hours
    pub ttl: Option<u64>,
    /// Absolute expiry as unix seconds; overrides `ttl`
    pub expires_at: Option<i64>,
}

shorthand!(SignedUrlOptions, name);

impl SignedUrlOptions {
    /// Resolve the expiry timestamp relative to `now`.
    #[must_use]
    pub fn expires(&self, now: DateTime<Utc>) -> i64 {
        self.expires_at.unwrap_or_else(|| {
            let ttl = self.ttl.unwrap_or(DEFAULT_SIGNED_URL_TTL_SECS);
            now.timestamp() + i64::try_from(ttl).unwrap_or(i64::MAX - now.timestamp())
        })
    }
}

/// An object in a listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectEntry {
    /// Object name (key)
    pub name: String,
    /// Entity tag, without quotes
    pub etag: String,
    /// Size in bytes
    pub size: u64,
    /// Last modification time
    pub last_modified: Option<DateTime<Utc>>,
}

/// One listing item: either an object or a common prefix (subdirectory).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ListItem {
    /// Common prefix
    Directory { dirname: String },
    /// Object
    Object(ObjectEntry),
}

impl ListItem {
    /// Get the object entry, if this item is an object.
    #[must_use]
    pub fn as_object(&self) -> Option<&ObjectEntry> {
        match self {
            Self::Object(entry) => Some(entry),
            Self::Directory { .. } => None,
        }
    }

    /// Get the directory name, if this item is a common prefix.
    #[must_use]
    pub fn dirname(&self) -> Option<&str> {
        match self {
            Self::Directory { dirname } => Some(dirname),
            Self::Object(_) => None,
        }
    }
}

/// A read object: metadata plus content.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ObjectData {
    /// Response metadata
    pub meta: ResponseMetadata,
    /// Object content
    pub body: Vec<u8>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_create_object_builder() {
        let options = CreateObjectOptions::new("photos", "cat.jpg")
            .content_type("image/jpeg")
            .meta("author", "alice")
            .meta("title", "cat");

        assert_eq!(options.bucket.as_deref(), Some("photos"));
        assert_eq!(options.meta.as_ref().map(BTreeMap::len), Some(2));
        assert!(options.meta_flag.is_none());
    }

    #[test]
    fn test_signed_url_expiry_defaults_to_one_day() {
        let now = Utc.timestamp_opt(1_700_000_000, 0).single().expect("valid timestamp");
        let options = SignedUrlOptions::from("cat.jpg");
        assert_eq!(options.expires(now), 1_700_086_400);

        let options = SignedUrlOptions {
            ttl: Some(60),
            ..SignedUrlOptions::from("cat.jpg")
        };
        assert_eq!(options.expires(now), 1_700_000_060);
    }

    #[test]
    fn test_signed_url_explicit_expiry_wins() {
        let now = Utc::now();
        let options = SignedUrlOptions {
            expires_at: Some(42),
            ttl: Some(60),
            ..Default::default()
        };
        assert_eq!(options.expires(now), 42);
    }

    #[test]
    fn test_list_item_serialization_shapes() {
        let dir = ListItem::Directory {
            dirname: "2024/".to_string(),
        };
        assert_eq!(
            serde_json::to_value(&dir).expect("serializable"),
            serde_json::json!({"dirname": "2024/"})
        );
        assert_eq!(dir.dirname(), Some("2024/"));
        assert!(dir.as_object().is_none());
    }
}
