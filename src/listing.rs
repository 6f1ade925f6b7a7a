//! Listing normalization.
//!
//! S3 answers listings in XML, Swift in JSON. Both are reduced to
//! [`ListItem`] and [`BucketEntry`] values so callers never see the
//! difference.

use serde::Deserialize;

use crate::codec::parse_timestamp;
use crate::error::Error;
use crate::types::{BucketEntry, ListItem, ObjectEntry};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ListBucketResult {
    #[serde(default)]
    common_prefixes: Vec<CommonPrefix>,
    #[serde(default)]
    contents: Vec<Contents>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct CommonPrefix {
    prefix: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct Contents {
    key: String,
    #[serde(rename = "ETag", default)]
    etag: String,
    #[serde(default)]
    size: u64,
    last_modified: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ListAllMyBucketsResult {
    #[serde(default)]
    buckets: XmlBuckets,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct XmlBuckets {
    #[serde(default)]
    bucket: Vec<XmlBucket>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct XmlBucket {
    name: String,
    creation_date: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum SwiftListItem {
    Subdir {
        subdir: String,
    },
    Object {
        name: String,
        #[serde(default)]
        hash: String,
        #[serde(default)]
        bytes: u64,
        last_modified: Option<String>,
    },
}

#[derive(Debug, Deserialize)]
struct SwiftContainer {
    name: String,
    count: Option<u64>,
    bytes: Option<u64>,
    last_modified: Option<String>,
}

fn is_blank(body: &[u8]) -> bool {
    body.iter().all(u8::is_ascii_whitespace)
}

/// Normalize an S3 `ListBucketResult`. Common prefixes come first.
///
/// # Errors
///
/// Returns `Error::Xml` if the body is not a valid listing.
pub fn parse_s3_objects(body: &[u8]) -> Result<Vec<ListItem>, Error> {
    if is_blank(body) {
        return Ok(Vec::new());
    }
    let result: ListBucketResult = quick_xml::de::from_str(&String::from_utf8_lossy(body))?;

    let dirs = result
        .common_prefixes
        .into_iter()
        .map(|p| ListItem::Directory { dirname: p.prefix });
    let objects = result.contents.into_iter().map(|c| {
        ListItem::Object(ObjectEntry {
            name: c.key,
            etag: c.etag.trim_matches('"').to_string(),
            size: c.size,
            last_modified: c.last_modified.as_deref().and_then(parse_timestamp),
        })
    });
    Ok(dirs.chain(objects).collect())
}

/// Normalize an S3 `ListAllMyBucketsResult`.
///
/// # Errors
///
/// Returns `Error::Xml` if the body is not a valid listing.
pub fn parse_s3_buckets(body: &[u8]) -> Result<Vec<BucketEntry>, Error> {
    if is_blank(body) {
        return Ok(Vec::new());
    }
    let result: ListAllMyBucketsResult = quick_xml::de::from_str(&String::from_utf8_lossy(body))?;

    Ok(result
        .buckets
        .bucket
        .into_iter()
        .map(|b| BucketEntry {
            name: b.name,
            created: b.creation_date.as_deref().and_then(parse_timestamp),
            object_count: None,
            bytes_used: None,
            last_modified: None,
        })
        .collect())
}

/// Normalize a Swift JSON object listing.
///
/// # Errors
///
/// Returns `Error::Serialization` if the body is not a JSON listing.
pub fn parse_swift_objects(body: &[u8]) -> Result<Vec<ListItem>, Error> {
    if is_blank(body) {
        return Ok(Vec::new());
    }
    let items: Vec<SwiftListItem> = serde_json::from_slice(body)?;

    Ok(items
        .into_iter()
        .map(|item| match item {
            SwiftListItem::Subdir { subdir } => ListItem::Directory { dirname: subdir },
            SwiftListItem::Object {
                name,
                hash,
                bytes,
                last_modified,
            } => ListItem::Object(ObjectEntry {
                name,
                etag: hash,
                size: bytes,
                last_modified: last_modified.as_deref().and_then(parse_timestamp),
            }),
        })
        .collect())
}

/// Normalize a Swift JSON container listing.
///
/// # Errors
///
/// Returns `Error::Serialization` if the body is not a JSON listing.
pub fn parse_swift_buckets(body: &[u8]) -> Result<Vec<BucketEntry>, Error> {
    if is_blank(body) {
        return Ok(Vec::new());
    }
    let containers: Vec<SwiftContainer> = serde_json::from_slice(body)?;

    Ok(containers
        .into_iter()
        .map(|c| BucketEntry {
            name: c.name,
            created: None,
            object_count: c.count,
            bytes_used: c.bytes,
            last_modified: c.last_modified.as_deref().and_then(parse_timestamp),
        })
        .collect())
}
