//! Error classification.
//!
//! Turns a response whose status is outside the expected set into a
//! [`StorageError`], pulling the vendor error code out of an XML or JSON
//! body when the service sent one.

use serde::Deserialize;
use serde_json::Value;

use crate::error::{Action, ResponseRecord, StorageError};
use crate::transport::ResponseHead;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct XmlErrorBody {
    code: Option<String>,
    message: Option<String>,
}

fn is_media_type(head: &ResponseHead, types: &[&str]) -> bool {
    head.header("content-type")
        .map(|v| v.trim().to_lowercase())
        .is_some_and(|v| types.iter().any(|t| v.starts_with(t)))
}

/// Extract the vendor error code and message from a response body.
fn vendor_error(head: &ResponseHead, body: &[u8]) -> (Option<String>, Option<String>) {
    if body.is_empty() {
        return (None, None);
    }

    if is_media_type(head, &["application/xml", "text/xml"]) {
        let text = String::from_utf8_lossy(body);
        let parsed: XmlErrorBody = quick_xml::de::from_str(&text).unwrap_or_default();
        return (parsed.code, parsed.message);
    }

    if is_media_type(head, &["application/json"]) {
        let data: Value = serde_json::from_slice(body).unwrap_or(Value::Null);
        let field = |names: &[&str]| {
            names
                .iter()
                .find_map(|name| data.get(*name).and_then(Value::as_str))
                .or_else(|| {
                    let nested = data.get("error")?;
                    names
                        .iter()
                        .find_map(|name| nested.get(*name).and_then(Value::as_str))
                })
                .map(String::from)
        };
        return (field(&["code", "Code"]), field(&["message", "Message"]));
    }

    (None, None)
}

/// Classify a response. `None` when the status is one of `expect`.
#[must_use]
pub fn find_error(
    action: Action,
    expect: &[u16],
    meta: &Value,
    head: &ResponseHead,
    body: &[u8],
) -> Option<StorageError> {
    if expect.contains(&head.status_code) {
        return None;
    }

    let (code, message) = vendor_error(head, body);
    Some(StorageError::new(
        action,
        meta.clone(),
        ResponseRecord {
            status_code: head.status_code,
            status_message: head.status_message.clone(),
            code,
            message,
        },
    ))
}

/// Per-call opt-in downgrades of classified errors to empty results.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Suppress {
    pub not_found: bool,
    pub bad_request: bool,
}

impl Suppress {
    /// Check whether the error should resolve as an empty success.
    #[must_use]
    pub fn matches(self, error: &StorageError) -> bool {
        (self.not_found && error.is_not_found()) || (self.bad_request && error.is_bad_request())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn head(status_code: u16, content_type: Option<&str>) -> ResponseHead {
        let mut head = ResponseHead {
            status_code,
            status_message: "Status".to_string(),
            ..Default::default()
        };
        if let Some(content_type) = content_type {
            head.headers
                .insert("content-type".to_string(), content_type.to_string());
        }
        head
    }

    #[test]
    fn test_expected_status_is_not_an_error() {
        let meta = json!({"name": "photos"});
        assert!(find_error(Action::BucketDelete, &[204], &meta, &head(204, None), b"").is_none());
    }

    #[test]
    fn test_xml_error_code() {
        let body = br#"<?xml version="1.0" encoding="UTF-8"?>
<Error><Code>BucketAlreadyExists</Code><Message>exists</Message><RequestId>tx1</RequestId></Error>"#;
        let error = find_error(
            Action::BucketCreate,
            &[200],
            &json!({"name": "photos"}),
            &head(409, Some("application/xml")),
            body,
        )
        .expect("409 is unexpected");

        assert_eq!(error.status_code(), 409);
        assert_eq!(error.code(), Some("BucketAlreadyExists"));
        assert_eq!(error.response.message.as_deref(), Some("exists"));
        assert_eq!(error.to_string(), "failed BUCKET_CREATE photos 409 Status");
    }

    #[test]
    fn test_json_error_code() {
        let flat = find_error(
            Action::ObjectGet,
            &[200],
            &Value::Null,
            &head(404, Some("application/json; charset=utf-8")),
            br#"{"Code": "NoSuchKey"}"#,
        );
        assert_eq!(flat.as_ref().and_then(StorageError::code), Some("NoSuchKey"));

        let nested = find_error(
            Action::ObjectGet,
            &[200],
            &Value::Null,
            &head(400, Some("application/json")),
            br#"{"error": {"code": "InvalidArgument", "message": "bad"}}"#,
        );
        assert_eq!(nested.as_ref().and_then(StorageError::code), Some("InvalidArgument"));
    }

    #[test]
    fn test_unparseable_body_keeps_status() {
        let error = find_error(
            Action::ObjectPut,
            &[201],
            &Value::Null,
            &head(500, Some("application/xml")),
            b"<html>oops",
        )
        .expect("500 is unexpected");
        assert_eq!(error.status_code(), 500);
        assert_eq!(error.code(), None);

        let html = find_error(Action::Auth, &[204], &Value::Null, &head(401, Some("text/html")), b"<h1>401</h1>")
            .expect("401 is unexpected");
        assert_eq!(html.code(), None);
    }

    #[test]
    fn test_suppress_matches_only_flagged_predicates() {
        let suppress = Suppress {
            not_found: true,
            bad_request: false,
        };
        let not_found = find_error(Action::ObjectHead, &[200], &Value::Null, &head(404, None), b"")
            .expect("404 is unexpected");
        let bad_request = find_error(Action::ObjectHead, &[200], &Value::Null, &head(400, None), b"")
            .expect("400 is unexpected");

        assert!(suppress.matches(&not_found));
        assert!(!suppress.matches(&bad_request));
        assert!(!Suppress::default().matches(&not_found));
    }
}
