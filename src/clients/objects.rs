//! Objects resource client.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;
use reqwest::Url;
use serde_json::{json, Value};
use tracing::{debug, warn};

use super::{Exchange, Reply};
use crate::auth::{S3Signer, Session};
use crate::classify::{find_error, Suppress};
use crate::client::Core;
use crate::codec::{format_headers, MetaPrefix, VENDOR_CODE};
use crate::config::Style;
use crate::error::{Action, Error};
use crate::listing::{parse_s3_objects, parse_swift_objects};
use crate::receiver::StreamReceiver;
use crate::request::{encode_path, target, Query};
use crate::signing::temp_url_signature;
use crate::transport::Method;
use crate::types::{
    CreateObjectOptions, FindObjectsOptions, ListItem, MetaFlag, ObjectData, ObjectOptions,
    ObjectRef, ResponseMetadata, SignedUrlOptions,
};

const S3_WRITE_STATUSES: &[u16] = &[200, 204];
const SWIFT_WRITE_STATUSES: &[u16] = &[201, 202];
const S3_COPY_STATUSES: &[u16] = &[200];
const SWIFT_COPY_STATUSES: &[u16] = &[201];
const READ_STATUSES: &[u16] = &[200, 204];
const DELETE_STATUSES: &[u16] = &[204, 404];
const LIST_STATUSES: &[u16] = &[200, 204];

fn require_name(name: &str) -> Result<(), Error> {
    if name.is_empty() {
        return Err(Error::InvalidArgument("object name is required".to_string()));
    }
    Ok(())
}

fn suppress(not_found: bool, bad_request: bool) -> Suppress {
    Suppress {
        not_found,
        bad_request,
    }
}

/// Path prefix a temp URL signature covers: the `/v1/...` part of the
/// storage URL, or `/v1` when the storage URL has none.
fn version_path(storage_url: &str) -> String {
    let path = Url::parse(storage_url)
        .map(|url| url.path().trim_end_matches('/').to_string())
        .unwrap_or_default();
    match path.find("/v1/") {
        Some(index) => path[index..].to_string(),
        None => "/v1".to_string(),
    }
}

/// Client for object operations.
#[derive(Debug)]
pub struct ObjectsClient {
    core: Arc<Core>,
}

impl ObjectsClient {
    /// Create a new objects client.
    pub(crate) fn new(core: Arc<Core>) -> Self {
        Self { core }
    }

    fn locate(&self, bucket: Option<&str>, name: &str) -> Result<(String, Value), Error> {
        require_name(name)?;
        let bucket = self.core.bucket(bucket)?;
        Ok((
            encode_path(&[bucket, name]),
            json!({ "bucket": bucket, "name": name }),
        ))
    }

    /// Create or overwrite an object.
    ///
    /// When `meta_flag` is set only the metadata is updated and `content` is
    /// ignored; see [`update_meta`](Self::update_meta).
    ///
    /// # Arguments
    ///
    /// * `options` - Object name, or full options with bucket, content type,
    ///   metadata and ACL
    /// * `content` - Object content
    ///
    /// # Errors
    ///
    /// Returns `Error::Storage` if the service refused the object.
    pub async fn create(
        &self,
        options: impl Into<CreateObjectOptions>,
        content: impl Into<Vec<u8>>,
    ) -> Result<ResponseMetadata, Error> {
        let options = options.into();
        if let Some(flag) = options.meta_flag {
            return self.write_meta(options, flag).await;
        }

        let (path, meta) = self.locate(options.bucket.as_deref(), &options.name)?;
        let session = self.core.session().await?;

        let exchange = match self.core.style() {
            Style::S3 => Exchange::new(Method::Put, path, Action::ObjectPut, S3_WRITE_STATUSES, meta).headers(
                format_headers(
                    options.content_type.as_deref(),
                    options.meta.as_ref(),
                    options.acl.as_deref(),
                    MetaPrefix::Vendor,
                ),
            ),
            Style::Swift => Exchange::new(Method::Put, path, Action::ObjectPut, SWIFT_WRITE_STATUSES, meta)
                .headers(format_headers(
                    options.content_type.as_deref(),
                    options.meta.as_ref(),
                    None,
                    MetaPrefix::SwiftObject,
                )),
        };

        let response = exchange
            .body(content.into())
            .suppress(suppress(options.suppress_not_found_error, options.suppress_bad_request_error))
            .send(&session.agent)
            .await?
            .into_response();
        debug!(name = %options.name, etag = ?response.meta.etag, "object created");
        Ok(response.meta)
    }

    /// Update an object's metadata without touching its content.
    ///
    /// # Arguments
    ///
    /// * `options` - Object address
    /// * `meta` - New metadata entries
    /// * `flag` - `Write` replaces all metadata, `Append` merges into it
    ///
    /// # Errors
    ///
    /// Returns `Error::Storage` if the object is missing or the update was
    /// refused.
    pub async fn update_meta(
        &self,
        options: impl Into<ObjectOptions>,
        meta: BTreeMap<String, String>,
        flag: MetaFlag,
    ) -> Result<ResponseMetadata, Error> {
        let options = options.into();
        let create = CreateObjectOptions {
            bucket: options.bucket,
            name: options.name,
            meta: Some(meta),
            meta_flag: Some(flag),
            suppress_not_found_error: options.suppress_not_found_error,
            suppress_bad_request_error: options.suppress_bad_request_error,
            ..Default::default()
        };
        self.write_meta(create, flag).await
    }

    async fn write_meta(&self, options: CreateObjectOptions, flag: MetaFlag) -> Result<ResponseMetadata, Error> {
        let (path, meta) = self.locate(options.bucket.as_deref(), &options.name)?;
        let session = self.core.session().await?;
        let suppress = suppress(options.suppress_not_found_error, options.suppress_bad_request_error);

        let exchange = match (self.core.style(), flag) {
            (Style::S3, _) => {
                let mut merged = match flag {
                    MetaFlag::Write => BTreeMap::new(),
                    MetaFlag::Append => self
                        .head(&session, &path, meta.clone(), Suppress::default())
                        .await?
                        .and_then(|existing| existing.meta)
                        .unwrap_or_default(),
                };
                merged.extend(options.meta.clone().unwrap_or_default());

                Exchange::new(Method::Put, path.clone(), Action::ObjectPut, S3_WRITE_STATUSES, meta)
                    .headers(format_headers(
                        options.content_type.as_deref(),
                        Some(&merged),
                        options.acl.as_deref(),
                        MetaPrefix::Vendor,
                    ))
                    .header(&format!("x-{VENDOR_CODE}-copy-source"), path)
                    .header(&format!("x-{VENDOR_CODE}-metadata-directive"), "REPLACE")
            }
            (Style::Swift, MetaFlag::Write) => {
                Exchange::new(Method::Post, path, Action::ObjectPost, SWIFT_WRITE_STATUSES, meta).headers(
                    format_headers(
                        options.content_type.as_deref(),
                        options.meta.as_ref(),
                        None,
                        MetaPrefix::SwiftObject,
                    ),
                )
            }
            (Style::Swift, MetaFlag::Append) => {
                Exchange::new(Method::Copy, path.clone(), Action::ObjectCopy, SWIFT_WRITE_STATUSES, meta)
                    .headers(format_headers(
                        options.content_type.as_deref(),
                        options.meta.as_ref(),
                        None,
                        MetaPrefix::SwiftObject,
                    ))
                    .header("Destination", path)
            }
        };

        let response = exchange
            .suppress(suppress)
            .send(&session.agent)
            .await?
            .into_response();
        debug!(name = %options.name, ?flag, "object metadata updated");
        Ok(response.meta)
    }

    async fn head(
        &self,
        session: &Session,
        path: &str,
        meta: Value,
        suppress: Suppress,
    ) -> Result<Option<ResponseMetadata>, Error> {
        let reply = Exchange::new(Method::Head, path.to_string(), Action::ObjectHead, READ_STATUSES, meta)
            .suppress(suppress)
            .send(&session.agent)
            .await?;
        Ok(match reply {
            Reply::Accepted(response) => Some(response.meta),
            Reply::Suppressed(_) => None,
        })
    }

    /// Read an object's content and metadata.
    ///
    /// # Returns
    ///
    /// `None` when a suppressed error occurred.
    ///
    /// # Errors
    ///
    /// Returns `Error::Storage` if the object is missing.
    pub async fn read(&self, options: impl Into<ObjectOptions>) -> Result<Option<ObjectData>, Error> {
        let options = options.into();
        let (path, meta) = self.locate(options.bucket.as_deref(), &options.name)?;
        let session = self.core.session().await?;

        let reply = Exchange::new(Method::Get, path, Action::ObjectGet, READ_STATUSES, meta)
            .suppress(suppress(options.suppress_not_found_error, options.suppress_bad_request_error))
            .send(&session.agent)
            .await?;

        Ok(match reply {
            Reply::Accepted(response) => Some(ObjectData {
                meta: response.meta,
                body: response.body,
            }),
            Reply::Suppressed(_) => None,
        })
    }

    /// Read an object's metadata only (HEAD).
    ///
    /// # Returns
    ///
    /// `None` when a suppressed error occurred.
    ///
    /// # Errors
    ///
    /// Returns `Error::Storage` if the object is missing.
    pub async fn read_meta(&self, options: impl Into<ObjectOptions>) -> Result<Option<ResponseMetadata>, Error> {
        let options = options.into();
        let (path, meta) = self.locate(options.bucket.as_deref(), &options.name)?;
        let session = self.core.session().await?;
        self.head(
            &session,
            &path,
            meta,
            suppress(options.suppress_not_found_error, options.suppress_bad_request_error),
        )
        .await
    }

    /// Delete an object. Deleting a missing object succeeds.
    ///
    /// # Errors
    ///
    /// Returns `Error::Storage` if the service refused the deletion.
    pub async fn delete(&self, options: impl Into<ObjectOptions>) -> Result<ResponseMetadata, Error> {
        let options = options.into();
        let (path, meta) = self.locate(options.bucket.as_deref(), &options.name)?;
        let session = self.core.session().await?;

        let response = Exchange::new(Method::Delete, path, Action::ObjectDelete, DELETE_STATUSES, meta)
            .suppress(suppress(options.suppress_not_found_error, options.suppress_bad_request_error))
            .send(&session.agent)
            .await?
            .into_response();
        debug!(name = %options.name, "object deleted");
        Ok(response.meta)
    }

    /// Copy an object, possibly across buckets.
    ///
    /// # Arguments
    ///
    /// * `source` - Object to copy
    /// * `target` - Where to copy it
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidArgument` before any request if a name or
    /// bucket is missing, or `Error::Storage` if the copy was refused.
    pub async fn copy(
        &self,
        source: impl Into<ObjectRef>,
        target: impl Into<ObjectRef>,
    ) -> Result<ResponseMetadata, Error> {
        let (source, target) = (source.into(), target.into());
        let (source_path, source_meta) = self.locate(source.bucket.as_deref(), &source.name)?;
        let (target_path, target_meta) = self.locate(target.bucket.as_deref(), &target.name)?;
        let meta = json!({ "source": source_meta, "target": target_meta });
        let session = self.core.session().await?;

        let exchange = match self.core.style() {
            Style::S3 => Exchange::new(Method::Put, target_path.clone(), Action::ObjectCopy, S3_COPY_STATUSES, meta)
                .header(&format!("x-{VENDOR_CODE}-copy-source"), source_path.clone()),
            Style::Swift => {
                Exchange::new(Method::Copy, source_path.clone(), Action::ObjectCopy, SWIFT_COPY_STATUSES, meta)
                    .header("Destination", target_path.clone())
            }
        };

        let response = exchange.send(&session.agent).await?.into_response();
        debug!(source = %source_path, target = %target_path, "object copied");
        Ok(response.meta)
    }

    /// List objects of a bucket, common prefixes first when a delimiter is
    /// given.
    ///
    /// # Arguments
    ///
    /// * `options` - Name prefix, or full options with delimiter, marker,
    ///   limit and path
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the listing is malformed.
    pub async fn find(&self, options: impl Into<FindObjectsOptions>) -> Result<Vec<ListItem>, Error> {
        let options = options.into();
        let bucket = self.core.bucket(options.bucket.as_deref())?;
        let meta = json!({ "bucket": bucket, "prefix": options.prefix });
        let session = self.core.session().await?;

        let items = match self.core.style() {
            Style::S3 => {
                let query = Query::new()
                    .param_opt("delimiter", options.delimiter.as_deref())
                    .param_opt("max-keys", options.limit)
                    .param_opt("marker", options.marker.as_deref())
                    .param_opt("prefix", options.prefix.as_deref());
                let response = Exchange::new(
                    Method::Get,
                    target(&encode_path(&[bucket, ""]), &query),
                    Action::BucketGet,
                    LIST_STATUSES,
                    meta,
                )
                .header("Accept", "application/xml")
                .send(&session.agent)
                .await?
                .into_response();
                parse_s3_objects(&response.body)?
            }
            Style::Swift => {
                let query = Query::new()
                    .param_opt("delimiter", options.delimiter.as_deref())
                    .param_opt("limit", options.limit)
                    .param_opt("path", options.path.as_deref())
                    .param_opt("prefix", options.prefix.as_deref())
                    .param_opt("marker", options.marker.as_deref());
                let response = Exchange::new(
                    Method::Get,
                    target(&encode_path(&[bucket]), &query),
                    Action::BucketGet,
                    LIST_STATUSES,
                    meta,
                )
                .send(&session.agent)
                .await?
                .into_response();
                parse_swift_objects(&response.body)?
            }
        };
        debug!(bucket, count = items.len(), "objects listed");
        Ok(items)
    }

    /// Stream an object into `receiver`.
    ///
    /// The receiver gets the metadata first, then every chunk, then
    /// `finish`. Any failure, including an authentication failure of the
    /// connection, is reported to the receiver's `on_error` as well as
    /// returned.
    ///
    /// # Errors
    ///
    /// Returns `Error::Storage` if the object is missing, or the transport or
    /// receiver error that interrupted the stream.
    pub async fn pull<R>(&self, options: impl Into<ObjectOptions>, receiver: &mut R) -> Result<ResponseMetadata, Error>
    where
        R: StreamReceiver + ?Sized,
    {
        let outcome = self.pull_into(options.into(), receiver).await;
        if let Err(error) = &outcome {
            warn!(error = %error, "streamed read failed");
            receiver.on_error(error).await;
        }
        outcome
    }

    async fn pull_into<R>(&self, options: ObjectOptions, receiver: &mut R) -> Result<ResponseMetadata, Error>
    where
        R: StreamReceiver + ?Sized,
    {
        let (path, meta) = self.locate(options.bucket.as_deref(), &options.name)?;
        let session = self.core.session().await?;

        debug!(target = %path, "opening stream");
        let (mut response, response_meta) = session
            .streaming_agent
            .open_stream(Method::Get, &path, Vec::new())
            .await?;

        if !READ_STATUSES.contains(&response.head.status_code) {
            let body = response.body.read_to_end().await.unwrap_or_default();
            if let Some(error) = find_error(Action::ObjectGet, READ_STATUSES, &meta, &response.head, &body) {
                return Err(Error::Storage(error));
            }
        }

        receiver.on_meta(&response_meta).await?;
        while let Some(chunk) = response.body.next_chunk().await? {
            receiver.write_chunk(&chunk).await?;
        }
        receiver.finish().await?;
        Ok(response_meta)
    }

    /// Generate a Swift temp URL granting unauthenticated GET access.
    ///
    /// Waits for the connection, since the URL is built on the storage URL
    /// returned by the token exchange.
    ///
    /// # Errors
    ///
    /// Returns `Error::Unsupported` on an S3-style connection, or
    /// `Error::Configuration` if no temp URL key is configured.
    pub async fn generate_temp_url(&self, options: impl Into<SignedUrlOptions>) -> Result<String, Error> {
        if self.core.style() != Style::Swift {
            return Err(Error::Unsupported("temp URLs require a Swift connection".to_string()));
        }
        let key = self
            .core
            .config()
            .temp_url_key()
            .ok_or_else(|| Error::option_absent(&[&["tempURLKey"]]))?;
        let options = options.into();
        let (path, _) = self.locate(options.bucket.as_deref(), &options.name)?;
        let session = self.core.session().await?;
        let auth = session
            .auth
            .as_ref()
            .ok_or_else(|| Error::Unsupported("temp URLs require a token session".to_string()))?;

        let expires = options.expires(Utc::now());
        let signed_path = format!("{}{path}", version_path(auth.storage_url()));
        let signature = temp_url_signature(key, Method::Get.as_str(), expires, &signed_path)?;
        Ok(format!(
            "{}{path}?temp_url_sig={signature}&temp_url_expires={expires}",
            auth.storage_url()
        ))
    }

    /// Generate an S3 presigned GET URL (query-string authentication).
    ///
    /// Needs no network call.
    ///
    /// # Errors
    ///
    /// Returns `Error::Unsupported` on a Swift-style connection.
    pub fn presigned_url(&self, options: impl Into<SignedUrlOptions>) -> Result<String, Error> {
        let signer = S3Signer::from_config(self.core.config())?;
        let options = options.into();
        let (path, _) = self.locate(options.bucket.as_deref(), &options.name)?;
        let url = format!("{}{path}", self.core.config().endpoint());
        signer.presign(&url, options.expires(Utc::now()))
    }

    /// Generate a signed GET URL in whichever scheme the connection speaks.
    ///
    /// # Errors
    ///
    /// See [`generate_temp_url`](Self::generate_temp_url) and
    /// [`presigned_url`](Self::presigned_url).
    pub async fn signed_url(&self, options: impl Into<SignedUrlOptions>) -> Result<String, Error> {
        match self.core.style() {
            Style::S3 => self.presigned_url(options),
            Style::Swift => self.generate_temp_url(options).await,
        }
    }
}
