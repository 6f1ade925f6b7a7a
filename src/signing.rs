//! HMAC-SHA1 signatures used by both protocols.
//!
//! S3 signs every request (base64 digest of the canonical string), Swift
//! only signs temporary URLs (hex digest of `METHOD\nEXPIRES\nPATH`).

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use sha1::Sha1;

use crate::error::Error;

type HmacSha1 = Hmac<Sha1>;

fn hmac_sha1(key: &str, message: &str) -> Result<Vec<u8>, Error> {
    let mut mac = HmacSha1::new_from_slice(key.as_bytes())
        .map_err(|e| Error::Configuration(format!("Invalid signing key: {e}")))?;
    mac.update(message.as_bytes());
    Ok(mac.finalize().into_bytes().to_vec())
}

/// Sign an S3 string-to-sign with the secret access key.
///
/// # Arguments
///
/// * `secret_access_key` - The shared secret
/// * `string_to_sign` - Output of [`string_to_sign`](crate::canonicalize::string_to_sign)
///
/// # Returns
///
/// Base64-encoded HMAC-SHA1 digest
///
/// # Errors
///
/// Returns an error if the key cannot be used for HMAC.
pub fn sign_s3(secret_access_key: &str, string_to_sign: &str) -> Result<String, Error> {
    Ok(BASE64.encode(hmac_sha1(secret_access_key, string_to_sign)?))
}

/// Compute the Swift temporary URL signature.
///
/// # Arguments
///
/// * `key` - The account or container temp URL key
/// * `method` - HTTP method the URL is valid for
/// * `expires` - Expiry as unix seconds
/// * `path` - Signed path, starting with `/v1/`
///
/// # Returns
///
/// Hex-encoded HMAC-SHA1 digest
///
/// # Errors
///
/// Returns an error if the key cannot be used for HMAC.
pub fn temp_url_signature(key: &str, method: &str, expires: i64, path: &str) -> Result<String, Error> {
    let body = format!("{method}\n{expires}\n{path}");
    Ok(hex::encode(hmac_sha1(key, &body)?))
}

/// Format a timestamp as an HTTP date (`Tue, 14 Nov 2023 22:13:20 GMT`).
#[must_use]
pub fn http_date(time: DateTime<Utc>) -> String {
    time.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_sign_s3_reference_vector() {
        let string_to_sign = "GET\n\n\nTue, 27 Mar 2007 19:36:42 +0000\n/awsexamplebucket1/photos/puppy.jpg";
        let signature = sign_s3("wJalrXUtnFEMI/K7MDENG/bPxRfiCYEXAMPLEKEY", string_to_sign)
            .expect("signing should succeed");
        assert_eq!(signature, "qgk2+6Sv9/oM7G3qLEjTH1a1l1g=");
    }

    #[test]
    fn test_sign_s3_with_vendor_headers() {
        let string_to_sign =
            "PUT\n\ntext/plain\nTue, 14 Nov 2023 22:13:20 GMT\nx-amz-meta-author:alice\n/photos/cat.txt";
        assert_eq!(
            sign_s3("s3-secret", string_to_sign).expect("signing should succeed"),
            "etR+hxyXjm2MYn4X+8tvq82dyuA="
        );
    }

    #[test]
    fn test_temp_url_signature_golden() {
        let signature = temp_url_signature("tempurl-secret", "GET", 1_700_000_000, "/v1/photos/cat.jpg")
            .expect("signing should succeed");
        assert_eq!(signature, "9c9c6cf10627eecc4470a2bd83a9e32a71b87420");
    }

    #[test]
    fn test_temp_url_signature_is_hex() {
        let signature = temp_url_signature("k", "GET", 0, "/v1/a/b").expect("signing should succeed");
        assert_eq!(signature.len(), 40);
        assert!(signature.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_http_date() {
        let time = Utc.timestamp_opt(1_700_000_000, 0).single().expect("valid timestamp");
        assert_eq!(http_date(time), "Tue, 14 Nov 2023 22:13:20 GMT");
    }
}
