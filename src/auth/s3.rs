//! S3 request signing (signature version 2).

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Url;
use tracing::debug;

use super::{AuthStrategy, Session};
use crate::agent::{Agent, Authorizer};
use crate::canonicalize::string_to_sign;
use crate::config::{ConnectionConfig, Credentials, Style};
use crate::error::Error;
use crate::signing::{http_date, sign_s3};
use crate::transport::{RequestDescriptor, Transport};

/// Signs requests with an access key pair.
#[derive(Clone)]
pub struct S3Signer {
    access_key: String,
    secret_access_key: String,
    vendor_code: &'static str,
    bucket_in_domain: bool,
}

impl fmt::Debug for S3Signer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("S3Signer")
            .field("access_key", &self.access_key)
            .field("secret_access_key", &"<redacted>")
            .field("vendor_code", &self.vendor_code)
            .field("bucket_in_domain", &self.bucket_in_domain)
            .finish()
    }
}

impl S3Signer {
    /// Create a new signer.
    #[must_use]
    pub fn new(
        access_key: &str,
        secret_access_key: &str,
        vendor_code: &'static str,
        bucket_in_domain: bool,
    ) -> Self {
        Self {
            access_key: access_key.to_string(),
            secret_access_key: secret_access_key.to_string(),
            vendor_code,
            bucket_in_domain,
        }
    }

    /// Create a signer for an S3-style configuration.
    ///
    /// # Errors
    ///
    /// Returns `Error::Unsupported` for a Swift-style configuration.
    pub fn from_config(config: &ConnectionConfig) -> Result<Self, Error> {
        match config.credentials() {
            Credentials::S3 {
                access_key,
                secret_access_key,
            } => Ok(Self::new(
                access_key,
                secret_access_key,
                config.vendor_code(),
                config.bucket_in_domain(),
            )),
            Credentials::Swift { .. } => Err(Error::Unsupported(
                "request signing requires S3 credentials".to_string(),
            )),
        }
    }

    /// Get the access key id.
    #[must_use]
    pub fn access_key(&self) -> &str {
        &self.access_key
    }

    /// Resolve the URL actually requested and the canonical resource.
    ///
    /// With bucket-in-domain the first path segment moves into the host name;
    /// the resource always keeps it.
    fn address(&self, url: &str) -> Result<(Url, String), Error> {
        let mut url = Url::parse(url)
            .map_err(|e| Error::InvalidArgument(format!("Invalid URL {url}: {e}")))?;
        let resource = url.path().to_string();

        if self.bucket_in_domain {
            let rest = resource.strip_prefix('/').unwrap_or(&resource);
            let (bucket, path) = rest.split_once('/').unwrap_or((rest, ""));
            if !bucket.is_empty() {
                let host = url
                    .host_str()
                    .ok_or_else(|| Error::InvalidArgument(format!("URL without host: {url}")))?;
                let host = format!("{bucket}.{host}");
                url.set_host(Some(&host))
                    .map_err(|e| Error::InvalidArgument(format!("Invalid host {host}: {e}")))?;
                url.set_path(&format!("/{path}"));
            }
        }

        Ok((url, resource))
    }

    /// Sign a request as of `now`: rewrite its URL if needed and add the
    /// `Date` and `Authorization` headers.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is invalid.
    pub fn sign_at(&self, request: &mut RequestDescriptor, now: DateTime<Utc>) -> Result<(), Error> {
        let (url, resource) = self.address(&request.url)?;
        let date = http_date(now);
        let canonical = string_to_sign(
            request.method.as_str(),
            &request.headers,
            &date,
            &resource,
            self.vendor_code,
        );
        let signature = sign_s3(&self.secret_access_key, &canonical)?;

        request.url = url.to_string();
        request.headers.push(("Date".to_string(), date));
        request.headers.push((
            "Authorization".to_string(),
            format!("AWS {}:{signature}", self.access_key),
        ));
        Ok(())
    }

    /// Build a presigned GET URL (query-string authentication).
    ///
    /// # Arguments
    ///
    /// * `url` - Absolute object URL, bucket in the path
    /// * `expires` - Expiry as unix seconds
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is invalid.
    pub fn presign(&self, url: &str, expires: i64) -> Result<String, Error> {
        let (mut url, resource) = self.address(url)?;
        let signature = sign_s3(&self.secret_access_key, &format!("GET\n\n\n{expires}\n{resource}"))?;

        url.query_pairs_mut()
            .append_pair("AWSAccessKeyId", &self.access_key)
            .append_pair("Expires", &expires.to_string())
            .append_pair("Signature", &signature);
        Ok(url.to_string())
    }
}

impl Authorizer for S3Signer {
    fn authorize(&self, request: &mut RequestDescriptor) -> Result<(), Error> {
        self.sign_at(request, Utc::now())
    }
}

/// S3 strategy: every request is signed, so the connection is ready at once.
pub struct S3Auth {
    signer: Arc<S3Signer>,
    endpoint: String,
    transport: Arc<dyn Transport>,
}

impl S3Auth {
    /// Create a new S3 strategy.
    ///
    /// # Errors
    ///
    /// Returns `Error::Unsupported` for a Swift-style configuration.
    pub fn new(config: &ConnectionConfig, transport: Arc<dyn Transport>) -> Result<Self, Error> {
        Ok(Self {
            signer: Arc::new(S3Signer::from_config(config)?),
            endpoint: config.endpoint().to_string(),
            transport,
        })
    }

    fn session(&self) -> Session {
        let authorizer: Arc<dyn Authorizer> = self.signer.clone();
        let agent = Agent::new(Arc::clone(&self.transport), &self.endpoint)
            .with_vendor_code(self.signer.vendor_code)
            .with_authorizer(authorizer);
        Session {
            streaming_agent: agent.clone(),
            agent,
            auth: None,
        }
    }
}

#[async_trait]
impl AuthStrategy for S3Auth {
    fn style(&self) -> Style {
        Style::S3
    }

    fn immediate_session(&self) -> Option<Session> {
        debug!(access_key = %self.signer.access_key, "using signed requests");
        Some(self.session())
    }

    async fn authenticate(&self) -> Result<Session, Error> {
        Ok(self.session())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::Method;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000, 0).single().expect("valid timestamp")
    }

    fn put_request() -> RequestDescriptor {
        RequestDescriptor::new(Method::Put, "http://storage.local/photos/cat.txt")
            .header("Content-Type", "text/plain")
            .header("x-amz-meta-author", "alice")
    }

    #[test]
    fn test_sign_at_adds_date_and_authorization() {
        let signer = S3Signer::new("AKID", "s3-secret", "amz", false);
        let mut request = put_request();
        signer.sign_at(&mut request, now()).expect("signing should succeed");

        assert_eq!(request.url, "http://storage.local/photos/cat.txt");
        assert_eq!(request.get_header("date"), Some("Tue, 14 Nov 2023 22:13:20 GMT"));
        assert_eq!(
            request.get_header("authorization"),
            Some("AWS AKID:etR+hxyXjm2MYn4X+8tvq82dyuA=")
        );
    }

    #[test]
    fn test_bucket_in_domain_keeps_resource() {
        let signer = S3Signer::new("AKID", "s3-secret", "amz", true);
        let mut request = put_request();
        signer.sign_at(&mut request, now()).expect("signing should succeed");

        assert_eq!(request.url, "http://photos.storage.local/cat.txt");
        assert_eq!(
            request.get_header("authorization"),
            Some("AWS AKID:etR+hxyXjm2MYn4X+8tvq82dyuA=")
        );
    }

    #[test]
    fn test_bucket_in_domain_service_level_request() {
        let signer = S3Signer::new("AKID", "s3-secret", "amz", true);
        let mut request = RequestDescriptor::new(Method::Get, "http://storage.local/");
        signer.sign_at(&mut request, now()).expect("signing should succeed");
        assert_eq!(request.url, "http://storage.local/");
    }

    #[test]
    fn test_signature_is_deterministic() {
        let signer = S3Signer::new("AKID", "s3-secret", "amz", false);
        let mut first = put_request();
        let mut second = put_request();
        signer.sign_at(&mut first, now()).expect("signing should succeed");
        signer.sign_at(&mut second, now()).expect("signing should succeed");
        assert_eq!(first, second);
    }

    #[test]
    fn test_presign() {
        let signer = S3Signer::new("AKID", "s3-secret", "amz", false);
        let url = signer
            .presign("http://storage.local/photos/cat.txt", 1_700_000_000)
            .expect("presigning should succeed");
        assert_eq!(
            url,
            "http://storage.local/photos/cat.txt?AWSAccessKeyId=AKID&Expires=1700000000&Signature=SRsfY35e7mBYx3x93JDp0Z0NkwA%3D"
        );
    }

    #[test]
    fn test_signer_requires_s3_credentials() {
        let config = ConnectionConfig::swift("http://storage.local", "test:tester", "testing");
        assert!(matches!(S3Signer::from_config(&config), Err(Error::Unsupported(_))));
    }

    #[test]
    fn test_debug_is_redacted() {
        let signer = S3Signer::new("AKID", "s3-secret", "amz", false);
        assert!(!format!("{signer:?}").contains("s3-secret"));
    }
}
