//! Header and metadata codec.
//!
//! User metadata travels in headers, which only carry the single-byte range.
//! Values inside that range pass through untouched; anything wider is sent
//! base64-encoded and decoded again on the way back.

use std::borrow::Cow;
use std::collections::BTreeMap;

use base64::{engine::general_purpose::STANDARD, Engine};
use chrono::{DateTime, NaiveDateTime, Utc};

use crate::transport::ResponseHeaders;
use crate::types::{BucketStats, ResponseMetadata};

/// Placeholder in header names, replaced by the vendor code when a request
/// is sent (`x-{VENDOR_CODE}-acl` becomes `x-amz-acl` or `x-oss-acl`).
pub const VENDOR_CODE: &str = "{VENDOR_CODE}";

/// Header-name codes whose `x-{code}-meta-*` headers carry user metadata.
pub const META_CODES: &[&str] = &["amz", "object", "container"];

/// Where metadata headers are attached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetaPrefix {
    /// `x-{vendor}-meta-` (S3-style buckets and objects)
    Vendor,
    /// `X-Object-Meta-` (Swift objects)
    SwiftObject,
    /// `X-Container-Meta-` (Swift containers)
    SwiftContainer,
}

impl MetaPrefix {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Vendor => "x-{VENDOR_CODE}-meta-",
            Self::SwiftObject => "X-Object-Meta-",
            Self::SwiftContainer => "X-Container-Meta-",
        }
    }
}

/// Encode one metadata value for transport.
#[must_use]
pub fn encode_meta_value(value: &str) -> Cow<'_, str> {
    if value.chars().all(|c| u32::from(c) <= 0xFF) {
        Cow::Borrowed(value)
    } else {
        Cow::Owned(STANDARD.encode(value.as_bytes()))
    }
}

/// Decode one metadata value received from the service.
///
/// A value is only treated as encoded when it is valid base64 of UTF-8 text
/// that [`encode_meta_value`] would have had to encode. Everything else,
/// including legacy values that were never encoded, is returned as is.
///
/// Headers carry no marker telling encoded values apart, so a plain value
/// that happens to be such base64 (`"5Lit5paH"`) comes back decoded
/// (`"中文"`). Values containing a space or any character outside the
/// base64 alphabet are never affected.
#[must_use]
pub fn decode_meta_value(value: &str) -> Cow<'_, str> {
    let decoded = STANDARD
        .decode(value)
        .ok()
        .and_then(|bytes| String::from_utf8(bytes).ok())
        .filter(|text| text.chars().any(|c| u32::from(c) > 0xFF));
    match decoded {
        Some(text) => Cow::Owned(text),
        None => Cow::Borrowed(value),
    }
}

/// Replace the vendor-code placeholder in a header name.
#[must_use]
pub fn substitute_vendor_code(name: &str, vendor_code: &str) -> String {
    name.replace(VENDOR_CODE, vendor_code)
}

/// Render user metadata as request headers.
#[must_use]
pub fn meta_headers(meta: &BTreeMap<String, String>, prefix: MetaPrefix) -> Vec<(String, String)> {
    meta.iter()
        .map(|(name, value)| {
            (
                format!("{}{name}", prefix.as_str()),
                encode_meta_value(value).into_owned(),
            )
        })
        .collect()
}

/// Render the common outbound headers of a create request.
#[must_use]
pub fn format_headers(
    content_type: Option<&str>,
    meta: Option<&BTreeMap<String, String>>,
    acl: Option<&str>,
    prefix: MetaPrefix,
) -> Vec<(String, String)> {
    let mut headers = Vec::new();
    if let Some(content_type) = content_type {
        headers.push(("Content-Type".to_string(), content_type.to_string()));
    }
    if let Some(meta) = meta {
        headers.extend(meta_headers(meta, prefix));
    }
    if let Some(acl) = acl {
        headers.push((format!("x-{VENDOR_CODE}-acl"), acl.to_string()));
    }
    headers
}

/// Split `x-{code}-meta-{name}` into its code and name.
fn split_meta_header(header: &str) -> Option<(&str, &str)> {
    let rest = header.strip_prefix("x-")?;
    let (code, rest) = rest.split_once('-')?;
    let name = rest.strip_prefix("meta-")?;
    let valid_code = !code.is_empty() && code.bytes().all(|b| b.is_ascii_lowercase());
    (valid_code && !name.is_empty()).then_some((code, name))
}

/// Extract and decode user metadata. `None` when no metadata header is present.
#[must_use]
pub fn parse_meta(headers: &ResponseHeaders, vendor_code: &str) -> Option<BTreeMap<String, String>> {
    let meta: BTreeMap<String, String> = headers
        .iter()
        .filter_map(|(header, value)| {
            let (code, name) = split_meta_header(header)?;
            let allowed = META_CODES.contains(&code) || code == vendor_code;
            allowed.then(|| (name.to_string(), decode_meta_value(value).into_owned()))
        })
        .collect();
    (!meta.is_empty()).then_some(meta)
}

/// Parse the generic response headers.
#[must_use]
pub fn parse_headers(headers: &ResponseHeaders, vendor_code: &str) -> ResponseMetadata {
    let vendor_request_id = format!("x-{vendor_code}-request-id");
    let request_id = [vendor_request_id.as_str(), "x-amz-request-id", "x-trans-id"]
        .iter()
        .find_map(|name| headers.get(*name))
        .cloned();

    ResponseMetadata {
        request_id,
        content_type: headers.get("content-type").cloned(),
        content_length: parse_number(headers.get("content-length")),
        date: headers.get("date").and_then(|v| parse_timestamp(v)),
        etag: headers.get("etag").map(|v| v.trim_matches('"').to_string()),
        last_modified: headers.get("last-modified").and_then(|v| parse_timestamp(v)),
        meta: parse_meta(headers, vendor_code),
    }
}

/// Parse bucket (container) statistics headers.
#[must_use]
pub fn parse_bucket_headers(headers: &ResponseHeaders) -> BucketStats {
    let first = |names: &[&str]| names.iter().find_map(|name| headers.get(*name));
    BucketStats {
        object_count: parse_number(first(&["x-rgw-object-count", "x-container-object-count"])),
        bytes_used: parse_number(first(&["x-rgw-bytes-used", "x-container-bytes-used"])),
        storage_policy: headers.get("x-storage-policy").cloned(),
        region: headers.get("x-amz-bucket-region").cloned(),
    }
}

fn parse_number(value: Option<&String>) -> Option<u64> {
    value.and_then(|v| v.trim().parse().ok())
}

/// Parse an HTTP date, an RFC 3339 timestamp or a zone-less ISO 8601
/// timestamp (Swift listings), the latter taken as UTC.
#[must_use]
pub fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    DateTime::parse_from_rfc2822(value)
        .or_else(|_| DateTime::parse_from_rfc3339(value))
        .map(|t| t.with_timezone(&Utc))
        .ok()
        .or_else(|| {
            NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f")
                .ok()
                .map(|t| t.and_utc())
        })
}
