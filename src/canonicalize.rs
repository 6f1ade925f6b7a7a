//! Canonical request form for S3 HMAC signing.
//!
//! # Example
//!
//! ```rust
//! use osapi::canonicalize::string_to_sign;
//!
//! let headers = vec![
//!     ("Content-Type".to_string(), "text/plain".to_string()),
//!     ("x-amz-meta-author".to_string(), "alice".to_string()),
//! ];
//! let canonical = string_to_sign("PUT", &headers, "Tue, 14 Nov 2023 22:13:20 GMT", "/photos/cat.txt", "amz");
//! assert_eq!(
//!     canonical,
//!     "PUT\n\ntext/plain\nTue, 14 Nov 2023 22:13:20 GMT\nx-amz-meta-author:alice\n/photos/cat.txt"
//! );
//! ```

use std::collections::BTreeMap;

use crate::codec::substitute_vendor_code;

fn collapse_whitespace(value: &str) -> String {
    let mut result = String::with_capacity(value.len());
    let mut in_space = false;
    for c in value.chars() {
        if c.is_whitespace() {
            if !in_space {
                result.push(' ');
            }
            in_space = true;
        } else {
            result.push(c);
            in_space = false;
        }
    }
    result
}

/// Canonicalize the vendor headers (`x-{vendor_code}-*`) of a request.
///
/// Rules applied:
/// 1. The `{VENDOR_CODE}` placeholder is substituted in names
/// 2. Names are lowercased; repeated names are joined with commas
/// 3. Runs of whitespace in values become a single space
/// 4. Names are sorted lexicographically
/// 5. Each header is rendered as `name:value\n`
#[must_use]
pub fn canonicalize_headers(headers: &[(String, String)], vendor_code: &str) -> String {
    let prefix = format!("x-{vendor_code}-");
    let mut vendor_headers: BTreeMap<String, Vec<String>> = BTreeMap::new();

    for (name, value) in headers {
        let name = substitute_vendor_code(name, vendor_code).to_lowercase();
        if name.starts_with(&prefix) {
            vendor_headers
                .entry(name)
                .or_default()
                .push(collapse_whitespace(value));
        }
    }

    vendor_headers
        .into_iter()
        .map(|(name, values)| format!("{name}:{}\n", values.join(",")))
        .collect()
}

/// Build the S3 (signature version 2) string to sign.
///
/// `resource` is the bucket and object path as addressed in the path, before
/// any bucket-in-domain rewrite, and without the query string.
#[must_use]
pub fn string_to_sign(
    method: &str,
    headers: &[(String, String)],
    date: &str,
    resource: &str,
    vendor_code: &str,
) -> String {
    let find = |wanted: &str| {
        headers
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(wanted))
            .map_or("", |(_, value)| value.as_str())
    };

    format!(
        "{method}\n{}\n{}\n{date}\n{}{resource}",
        find("content-md5"),
        find("content-type"),
        canonicalize_headers(headers, vendor_code)
    )
}
