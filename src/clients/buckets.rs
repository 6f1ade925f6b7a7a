//! Buckets (containers) resource client.

use std::sync::Arc;

use serde_json::json;
use tracing::debug;

use super::{Exchange, Reply};
use crate::classify::Suppress;
use crate::client::Core;
use crate::codec::{format_headers, parse_bucket_headers, MetaPrefix};
use crate::config::{Style, Vendor};
use crate::error::{Action, Error, StorageError};
use crate::listing::{parse_s3_buckets, parse_swift_buckets};
use crate::request::{encode_path, target, Query};
use crate::transport::Method;
use crate::types::{
    BucketEntry, BucketInfo, BucketOptions, CreateBucketOptions, FindBucketsOptions,
    ResponseMetadata,
};

/// Body sent by non-ceph vendors on bucket creation.
const CREATE_BUCKET_CONFIGURATION: &str = concat!(
    r#"<?xml version="1.0" encoding="UTF-8"?>"#,
    "<CreateBucketConfiguration><StorageClass>Standard</StorageClass></CreateBucketConfiguration>"
);

const CREATE_STATUSES: &[u16] = &[200, 201, 202, 204];
const DELETE_STATUSES: &[u16] = &[204];
const READ_STATUSES: &[u16] = &[200, 204];
const LIST_STATUSES: &[u16] = &[200, 204];

fn already_exists(error: &StorageError) -> bool {
    error.status_code() == 409 && error.code() == Some("BucketAlreadyExists")
}

fn require_name(name: &str) -> Result<(), Error> {
    if name.is_empty() {
        return Err(Error::InvalidArgument("bucket (container) name is required".to_string()));
    }
    Ok(())
}

/// Client for bucket (container) operations.
#[derive(Debug)]
pub struct BucketsClient {
    core: Arc<Core>,
}

impl BucketsClient {
    /// Create a new buckets client.
    pub(crate) fn new(core: Arc<Core>) -> Self {
        Self { core }
    }

    /// Create a bucket (container).
    ///
    /// Creating a bucket that already exists succeeds.
    ///
    /// # Arguments
    ///
    /// * `options` - Bucket name, or full options with ACL (S3) or
    ///   container metadata (Swift)
    ///
    /// # Errors
    ///
    /// Returns `Error::Storage` if the service refused the bucket.
    pub async fn create(&self, options: impl Into<CreateBucketOptions>) -> Result<ResponseMetadata, Error> {
        let options = options.into();
        require_name(&options.name)?;
        let session = self.core.session().await?;
        let meta = json!({ "name": options.name });

        let exchange = match self.core.style() {
            Style::S3 => {
                let headers = format_headers(None, None, options.acl.as_deref(), MetaPrefix::Vendor);
                let body = if self.core.config().vendor() == Vendor::Ceph {
                    Vec::new()
                } else {
                    CREATE_BUCKET_CONFIGURATION.as_bytes().to_vec()
                };
                Exchange::new(
                    Method::Put,
                    encode_path(&[options.name.as_str(), ""]),
                    Action::BucketCreate,
                    CREATE_STATUSES,
                    meta,
                )
                .headers(headers)
                .body(body)
            }
            Style::Swift => {
                let headers = format_headers(None, options.meta.as_ref(), None, MetaPrefix::SwiftContainer);
                Exchange::new(
                    Method::Put,
                    encode_path(&[options.name.as_str()]),
                    Action::BucketCreate,
                    CREATE_STATUSES,
                    meta,
                )
                .headers(headers)
            }
        };

        let response = exchange
            .tolerate(already_exists)
            .send(&session.agent)
            .await?
            .into_response();
        debug!(bucket = %options.name, "bucket created");
        Ok(response.meta)
    }

    /// Delete an empty bucket (container).
    ///
    /// A missing bucket is an error unless `suppress_not_found_error` is set.
    ///
    /// # Errors
    ///
    /// Returns `Error::Storage` if the bucket is missing or not empty.
    pub async fn delete(&self, options: impl Into<BucketOptions>) -> Result<ResponseMetadata, Error> {
        let options = options.into();
        require_name(&options.name)?;
        let session = self.core.session().await?;

        let reply = Exchange::new(
            Method::Delete,
            encode_path(&[options.name.as_str(), ""]),
            Action::BucketDelete,
            DELETE_STATUSES,
            json!({ "name": options.name }),
        )
        .suppress(Suppress {
            not_found: options.suppress_not_found_error,
            bad_request: false,
        })
        .send(&session.agent)
        .await?;

        Ok(reply.into_response().meta)
    }

    /// Read a bucket's metadata and statistics.
    ///
    /// # Returns
    ///
    /// `None` when the bucket is missing and `suppress_not_found_error` is set.
    ///
    /// # Errors
    ///
    /// Returns `Error::Storage` if the bucket is missing.
    pub async fn read(&self, options: impl Into<BucketOptions>) -> Result<Option<BucketInfo>, Error> {
        let options = options.into();
        require_name(&options.name)?;
        let session = self.core.session().await?;

        let reply = Exchange::new(
            Method::Head,
            encode_path(&[options.name.as_str(), ""]),
            Action::BucketHead,
            READ_STATUSES,
            json!({ "name": options.name }),
        )
        .suppress(Suppress {
            not_found: options.suppress_not_found_error,
            bad_request: false,
        })
        .send(&session.agent)
        .await?;

        match reply {
            Reply::Accepted(response) => Ok(Some(BucketInfo {
                stats: parse_bucket_headers(&response.head.headers),
                meta: response.meta,
            })),
            Reply::Suppressed(_) => Ok(None),
        }
    }

    /// List buckets (containers) of the account.
    ///
    /// # Arguments
    ///
    /// * `options` - Name prefix, or full options with limit and marker
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the listing is malformed.
    pub async fn find(&self, options: impl Into<FindBucketsOptions>) -> Result<Vec<BucketEntry>, Error> {
        let options = options.into();
        let session = self.core.session().await?;
        let query = Query::new()
            .param_opt("limit", options.limit)
            .param_opt("marker", options.marker.as_deref())
            .param_opt("prefix", options.prefix.as_deref());

        let mut exchange = Exchange::new(
            Method::Get,
            target("/", &query),
            Action::ServiceGet,
            LIST_STATUSES,
            json!({ "prefix": options.prefix, "marker": options.marker }),
        );
        if self.core.style() == Style::S3 {
            exchange = exchange.header("Accept", "application/xml");
        }

        let response = exchange.send(&session.agent).await?.into_response();
        let entries = match self.core.style() {
            Style::S3 => parse_s3_buckets(&response.body)?,
            Style::Swift => parse_swift_buckets(&response.body)?,
        };
        debug!(count = entries.len(), "buckets listed");
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::Connection;
    use crate::config::ConnectionConfig;
    use crate::testing::MockTransport;

    fn s3(transport: &Arc<MockTransport>, vendor: Vendor) -> Connection {
        let config = ConnectionConfig::s3("http://storage.local", "AKID", "s3-secret").with_vendor(vendor);
        Connection::with_transport(config, transport.clone()).expect("valid config")
    }

    async fn swift(transport: &Arc<MockTransport>) -> Connection {
        transport.push_response(
            MockTransport::response(204)
                .header("x-auth-token", "AUTH_tk1")
                .header("x-storage-token", "AUTH_tk1")
                .header("x-storage-url", "http://storage.local/v1/AUTH_test"),
        );
        let config = ConnectionConfig::swift("http://storage.local", "test:tester", "testing");
        let connection = Connection::with_transport(config, transport.clone()).expect("valid config");
        connection.connect().await.expect("authenticated");
        connection
    }

    #[tokio::test]
    async fn test_create_s3_ceph_sends_no_body() {
        let transport = Arc::new(MockTransport::new());
        transport.push_response(MockTransport::response(200));
        let connection = s3(&transport, Vendor::Ceph);

        let options = CreateBucketOptions {
            name: "photos".to_string(),
            acl: Some("public-read".to_string()),
            meta: None,
        };
        connection.buckets().create(options).await.expect("created");

        let request = transport.last_request().expect("request sent");
        assert_eq!(request.method, Method::Put);
        assert_eq!(request.url, "http://storage.local/photos/");
        assert_eq!(request.get_header("x-amz-acl"), Some("public-read"));
        assert!(request.body.is_empty());
    }

    #[tokio::test]
    async fn test_create_s3_other_vendor_sends_configuration() {
        let transport = Arc::new(MockTransport::new());
        transport.push_response(MockTransport::response(200));
        let config = ConnectionConfig::s3("http://storage.local", "AKID", "s3-secret")
            .with_vendor(Vendor::Aliyun)
            .with_bucket_in_domain(false);
        let connection = Connection::with_transport(config, transport.clone()).expect("valid config");

        connection.buckets().create("photos").await.expect("created");

        let request = transport.last_request().expect("request sent");
        assert_eq!(request.body, CREATE_BUCKET_CONFIGURATION.as_bytes());
        assert!(request.get_header("authorization").is_some());
    }

    #[tokio::test]
    async fn test_create_existing_bucket_succeeds() {
        let transport = Arc::new(MockTransport::new());
        transport.push_response(
            MockTransport::response(409)
                .xml("<Error><Code>BucketAlreadyExists</Code></Error>"),
        );
        let connection = s3(&transport, Vendor::Ceph);

        assert!(connection.buckets().create("photos").await.is_ok());
    }

    #[tokio::test]
    async fn test_create_conflict_with_other_code_fails() {
        let transport = Arc::new(MockTransport::new());
        transport.push_response(
            MockTransport::response(409).xml("<Error><Code>BucketNotEmpty</Code></Error>"),
        );
        let connection = s3(&transport, Vendor::Ceph);

        let error = connection.buckets().create("photos").await.expect_err("conflict");
        assert_eq!(error.storage_error().and_then(StorageError::code), Some("BucketNotEmpty"));
    }

    #[tokio::test]
    async fn test_create_swift_container_with_meta() {
        let transport = Arc::new(MockTransport::new());
        let connection = swift(&transport).await;
        transport.push_response(MockTransport::response(201));

        let mut options = CreateBucketOptions::from("photos");
        options.meta = Some([("owner".to_string(), "alice".to_string())].into_iter().collect());
        connection.buckets().create(options).await.expect("created");

        let request = transport.last_request().expect("request sent");
        assert_eq!(request.url, "http://storage.local/v1/AUTH_test/photos");
        assert_eq!(request.get_header("x-container-meta-owner"), Some("alice"));
        assert_eq!(request.get_header("x-auth-token"), Some("AUTH_tk1"));
    }

    #[tokio::test]
    async fn test_delete_missing_bucket_is_not_found() {
        let transport = Arc::new(MockTransport::new());
        transport.push_response(MockTransport::response(404));
        let connection = s3(&transport, Vendor::Ceph);

        let error = connection.buckets().delete("photos").await.expect_err("missing");
        assert!(crate::error::is_not_found(&error));

        transport.push_response(MockTransport::response(404));
        let suppressed = connection
            .buckets()
            .delete(BucketOptions::from("photos").suppress_not_found())
            .await;
        assert!(suppressed.is_ok());
    }

    #[tokio::test]
    async fn test_read_bucket_stats() {
        let transport = Arc::new(MockTransport::new());
        let connection = swift(&transport).await;
        transport.push_response(
            MockTransport::response(204)
                .header("x-container-object-count", "3")
                .header("x-container-bytes-used", "1024")
                .header("x-storage-policy", "gold")
                .header("x-trans-id", "tx42"),
        );

        let info = connection.buckets().read("photos").await.expect("read").expect("present");

        assert_eq!(info.stats.object_count, Some(3));
        assert_eq!(info.stats.bytes_used, Some(1024));
        assert_eq!(info.stats.storage_policy.as_deref(), Some("gold"));
        assert_eq!(info.meta.trans_id(), Some("tx42"));
        let request = transport.last_request().expect("request sent");
        assert_eq!(request.method, Method::Head);
        assert_eq!(request.url, "http://storage.local/v1/AUTH_test/photos/");
    }

    #[tokio::test]
    async fn test_read_missing_bucket_suppressed() {
        let transport = Arc::new(MockTransport::new());
        transport.push_response(MockTransport::response(404));
        let connection = s3(&transport, Vendor::Ceph);

        let info = connection
            .buckets()
            .read(BucketOptions::from("photos").suppress_not_found())
            .await
            .expect("suppressed");
        assert!(info.is_none());
    }

    #[tokio::test]
    async fn test_find_s3_buckets() {
        let transport = Arc::new(MockTransport::new());
        transport.push_response(MockTransport::response(200).xml(
            "<ListAllMyBucketsResult><Owner><ID>o</ID></Owner><Buckets>\
             <Bucket><Name>photos</Name><CreationDate>2023-11-14T22:13:20.000Z</CreationDate></Bucket>\
             </Buckets></ListAllMyBucketsResult>",
        ));
        let connection = s3(&transport, Vendor::Ceph);

        let entries = connection.buckets().find("ph").await.expect("listed");

        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].name, "photos");
        let request = transport.last_request().expect("request sent");
        assert_eq!(request.url, "http://storage.local/?prefix=ph");
        assert_eq!(request.get_header("accept"), Some("application/xml"));
    }

    #[tokio::test]
    async fn test_find_swift_containers() {
        let transport = Arc::new(MockTransport::new());
        let connection = swift(&transport).await;
        transport.push_response(MockTransport::response(200).json(&json!([
            {"name": "photos", "count": 3, "bytes": 1024, "last_modified": "2023-11-14T22:13:20.000000"}
        ])));

        let options = FindBucketsOptions {
            limit: Some(10),
            marker: Some("a".to_string()),
            ..Default::default()
        };
        let entries = connection.buckets().find(options).await.expect("listed");

        assert_eq!(entries[0].object_count, Some(3));
        assert_eq!(
            transport.last_request().expect("request sent").url,
            "http://storage.local/v1/AUTH_test/?limit=10&marker=a"
        );
    }
}
