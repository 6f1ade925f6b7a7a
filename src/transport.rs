//! HTTP transport contract and the default reqwest implementation.
//!
//! The client never talks to the network directly: every request is a
//! [`RequestDescriptor`] handed to a [`Transport`], which answers with an
//! [`HttpResponse`] (buffered) or a [`StreamingResponse`] (drained on
//! demand). Connection pooling, TLS and socket-level retries belong to the
//! transport.

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::HeaderValue;
use reqwest::Client;
use tracing::debug;

use crate::error::Error;

/// Default request timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Response headers keyed by lowercase name. Repeated headers are joined
/// with `", "`.
pub type ResponseHeaders = BTreeMap<String, String>;

/// HTTP verbs used by the storage protocols.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Head,
    Put,
    Post,
    Delete,
    /// Swift server-side copy.
    Copy,
}

impl Method {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Head => "HEAD",
            Self::Put => "PUT",
            Self::Post => "POST",
            Self::Delete => "DELETE",
            Self::Copy => "COPY",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One outgoing request. Immutable once handed to the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestDescriptor {
    /// HTTP method
    pub method: Method,
    /// Absolute URL including the query string
    pub url: String,
    /// Header list in insertion order; names keep their case
    pub headers: Vec<(String, String)>,
    /// Request body
    pub body: Vec<u8>,
}

impl RequestDescriptor {
    /// Create a request without headers or body.
    #[must_use]
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: Vec::new(),
            body: Vec::new(),
        }
    }

    /// Append a header.
    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl ToString) -> Self {
        self.headers.push((name.into(), value.to_string()));
        self
    }

    /// Append a header only when a value is present.
    #[must_use]
    pub fn header_opt<V: ToString>(self, name: impl Into<String>, value: Option<V>) -> Self {
        match value {
            Some(v) => self.header(name, v),
            None => self,
        }
    }

    /// Append several headers.
    #[must_use]
    pub fn headers<I>(mut self, headers: I) -> Self
    where
        I: IntoIterator<Item = (String, String)>,
    {
        self.headers.extend(headers);
        self
    }

    /// Set the body.
    #[must_use]
    pub fn body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    /// Get the first header with the given name, compared case-insensitively.
    #[must_use]
    pub fn get_header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Status line and headers of a response.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResponseHead {
    pub status_code: u16,
    pub status_message: String,
    pub headers: ResponseHeaders,
}

impl ResponseHead {
    /// Get a header by lowercase name.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).map(String::as_str)
    }
}

/// A fully buffered response.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HttpResponse {
    pub head: ResponseHead,
    pub body: Vec<u8>,
}

impl HttpResponse {
    /// Get the body as text, replacing invalid UTF-8.
    #[must_use]
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// A response body read chunk by chunk.
#[async_trait]
pub trait BodyChunks: Send {
    /// Get the next chunk, or `None` at the end of the body.
    async fn next_chunk(&mut self) -> Result<Option<Vec<u8>>, Error>;

    /// Drain the remaining body into memory.
    async fn read_to_end(&mut self) -> Result<Vec<u8>, Error> {
        let mut body = Vec::new();
        while let Some(chunk) = self.next_chunk().await? {
            body.extend_from_slice(&chunk);
        }
        Ok(body)
    }
}

/// A response whose body has not been read yet.
pub struct StreamingResponse {
    pub head: ResponseHead,
    pub body: Box<dyn BodyChunks>,
}

impl fmt::Debug for StreamingResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamingResponse")
            .field("head", &self.head)
            .finish_non_exhaustive()
    }
}

/// The consumed HTTP contract.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Perform a request and buffer the whole response body.
    ///
    /// # Errors
    ///
    /// Returns `Error::Http` when no response could be obtained. Non-2xx
    /// statuses are not errors at this layer.
    async fn perform(&self, request: RequestDescriptor) -> Result<HttpResponse, Error>;

    /// Perform a request and return as soon as the response head arrives.
    ///
    /// # Errors
    ///
    /// Returns `Error::Http` when no response could be obtained.
    async fn open_stream(&self, request: RequestDescriptor) -> Result<StreamingResponse, Error>;
}

/// Settings of the default HTTP transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportSettings {
    /// Request timeout
    pub timeout: Duration,
    /// Verify TLS certificates
    pub reject_unauthorized: bool,
    /// Proxy URL applied to all requests
    pub proxy: Option<String>,
}

impl Default for TransportSettings {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            reject_unauthorized: true,
            proxy: None,
        }
    }
}

/// [`Transport`] backed by a `reqwest` client.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    /// Create a new transport.
    ///
    /// # Errors
    ///
    /// Returns an error if the proxy URL is invalid or the HTTP client
    /// cannot be created.
    pub fn new(settings: &TransportSettings) -> Result<Self, Error> {
        let mut builder = Client::builder()
            .timeout(settings.timeout)
            .danger_accept_invalid_certs(!settings.reject_unauthorized);

        if let Some(proxy) = &settings.proxy {
            let proxy = reqwest::Proxy::all(proxy.as_str())
                .map_err(|e| Error::Configuration(format!("Invalid proxy: {e}")))?;
            builder = builder.proxy(proxy);
        }

        let client = builder.build().map_err(|e| Error::Http(e.to_string()))?;
        Ok(Self { client })
    }

    async fn send(&self, request: RequestDescriptor) -> Result<reqwest::Response, Error> {
        debug!(method = %request.method, url = %request.url, "sending request");

        let method = reqwest::Method::from_bytes(request.method.as_str().as_bytes())
            .map_err(|e| Error::Http(e.to_string()))?;
        let mut builder = self.client.request(method, &request.url);
        for (name, value) in &request.headers {
            let value = HeaderValue::from_bytes(&header_bytes(value))
                .map_err(|e| Error::InvalidArgument(format!("Invalid value for header {name}: {e}")))?;
            builder = builder.header(name.as_str(), value);
        }
        if !request.body.is_empty() {
            builder = builder.body(request.body);
        }

        builder.send().await.map_err(|e| Error::Http(e.to_string()))
    }
}

/// Header values in the single-byte range go out as one byte per char.
fn header_bytes(value: &str) -> Vec<u8> {
    value
        .chars()
        .map(|c| u8::try_from(u32::from(c)).ok())
        .collect::<Option<Vec<u8>>>()
        .unwrap_or_else(|| value.as_bytes().to_vec())
}

fn header_text(value: &HeaderValue) -> String {
    match value.to_str() {
        Ok(text) => text.to_string(),
        Err(_) => match std::str::from_utf8(value.as_bytes()) {
            Ok(text) => text.to_string(),
            Err(_) => value.as_bytes().iter().map(|&b| char::from(b)).collect(),
        },
    }
}

fn response_head(response: &reqwest::Response) -> ResponseHead {
    let status = response.status();
    let mut headers = ResponseHeaders::new();
    for (name, value) in response.headers() {
        let value = header_text(value);
        headers
            .entry(name.as_str().to_lowercase())
            .and_modify(|existing: &mut String| {
                existing.push_str(", ");
                existing.push_str(&value);
            })
            .or_insert(value);
    }

    ResponseHead {
        status_code: status.as_u16(),
        status_message: status.canonical_reason().unwrap_or_default().to_string(),
        headers,
    }
}

struct ReqwestBody(reqwest::Response);

#[async_trait]
impl BodyChunks for ReqwestBody {
    async fn next_chunk(&mut self) -> Result<Option<Vec<u8>>, Error> {
        self.0
            .chunk()
            .await
            .map(|chunk| chunk.map(|bytes| bytes.to_vec()))
            .map_err(|e| Error::Http(e.to_string()))
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn perform(&self, request: RequestDescriptor) -> Result<HttpResponse, Error> {
        let response = self.send(request).await?;
        let head = response_head(&response);
        let body = response
            .bytes()
            .await
            .map_err(|e| Error::Http(format!("Failed to read response: {e}")))?
            .to_vec();
        Ok(HttpResponse { head, body })
    }

    async fn open_stream(&self, request: RequestDescriptor) -> Result<StreamingResponse, Error> {
        let response = self.send(request).await?;
        let head = response_head(&response);
        Ok(StreamingResponse {
            head,
            body: Box::new(ReqwestBody(response)),
        })
    }
}
