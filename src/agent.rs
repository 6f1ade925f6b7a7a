//! Transport agents.
//!
//! An [`Agent`] binds a [`Transport`] to a base URL and a set of static
//! headers, and optionally runs an [`Authorizer`] over every request right
//! before it is sent. Responses come back with their headers already parsed
//! into [`ResponseMetadata`].

use std::fmt;
use std::sync::Arc;

use crate::codec::{parse_headers, substitute_vendor_code};
use crate::error::Error;
use crate::transport::{
    HttpResponse, Method, RequestDescriptor, ResponseHead, StreamingResponse, Transport,
};
use crate::types::ResponseMetadata;

/// Per-request authorization hook.
pub trait Authorizer: Send + Sync {
    /// Add whatever the service needs to accept the request. May rewrite the
    /// URL.
    ///
    /// # Errors
    ///
    /// Returns an error if the request cannot be authorized.
    fn authorize(&self, request: &mut RequestDescriptor) -> Result<(), Error>;
}

/// A buffered response with its parsed metadata.
#[derive(Debug, Clone)]
pub struct AgentResponse {
    pub head: ResponseHead,
    pub body: Vec<u8>,
    pub meta: ResponseMetadata,
}

/// A transport bound to a base URL.
#[derive(Clone)]
pub struct Agent {
    transport: Arc<dyn Transport>,
    base_url: String,
    default_headers: Vec<(String, String)>,
    authorizer: Option<Arc<dyn Authorizer>>,
    vendor_code: &'static str,
}

impl fmt::Debug for Agent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let header_names: Vec<&str> = self.default_headers.iter().map(|(n, _)| n.as_str()).collect();
        f.debug_struct("Agent")
            .field("base_url", &self.base_url)
            .field("default_headers", &header_names)
            .field("authorized", &self.authorizer.is_some())
            .field("vendor_code", &self.vendor_code)
            .finish()
    }
}

impl Agent {
    /// Create an agent with no default headers and no authorizer.
    pub fn new(transport: Arc<dyn Transport>, base_url: &str) -> Self {
        Self {
            transport,
            base_url: base_url.trim_end_matches('/').to_string(),
            default_headers: Vec::new(),
            authorizer: None,
            vendor_code: "amz",
        }
    }

    /// Add a header sent with every request.
    #[must_use]
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.default_headers.push((name.to_string(), value.to_string()));
        self
    }

    /// Run `authorizer` over every request.
    #[must_use]
    pub fn with_authorizer(mut self, authorizer: Arc<dyn Authorizer>) -> Self {
        self.authorizer = Some(authorizer);
        self
    }

    /// Set the vendor code substituted into header names and used when
    /// parsing response headers.
    #[must_use]
    pub fn with_vendor_code(mut self, vendor_code: &'static str) -> Self {
        self.vendor_code = vendor_code;
        self
    }

    /// Get the base URL.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Get the vendor code.
    #[must_use]
    pub fn vendor_code(&self) -> &'static str {
        self.vendor_code
    }

    /// Build the request actually handed to the transport.
    ///
    /// `target` is an encoded path (with query) relative to the base URL.
    ///
    /// # Errors
    ///
    /// Returns an error if the authorizer rejects the request.
    pub fn prepare(
        &self,
        method: Method,
        target: &str,
        headers: Vec<(String, String)>,
        body: Vec<u8>,
    ) -> Result<RequestDescriptor, Error> {
        let headers = self
            .default_headers
            .iter()
            .cloned()
            .chain(headers)
            .map(|(name, value)| (substitute_vendor_code(&name, self.vendor_code), value));

        let mut request = RequestDescriptor::new(method, format!("{}{target}", self.base_url))
            .headers(headers)
            .body(body);

        if let Some(authorizer) = &self.authorizer {
            authorizer.authorize(&mut request)?;
        }
        Ok(request)
    }

    /// Perform a request and buffer the response.
    ///
    /// # Errors
    ///
    /// Returns an error if the request cannot be authorized or no response
    /// was obtained. Unexpected statuses are left to the caller.
    pub async fn execute(
        &self,
        method: Method,
        target: &str,
        headers: Vec<(String, String)>,
        body: Vec<u8>,
    ) -> Result<AgentResponse, Error> {
        let request = self.prepare(method, target, headers, body)?;
        let HttpResponse { head, body } = self.transport.perform(request).await?;
        let meta = parse_headers(&head.headers, self.vendor_code);
        Ok(AgentResponse { head, body, meta })
    }

    /// Perform a request and return once the response head arrived.
    ///
    /// # Errors
    ///
    /// Returns an error if the request cannot be authorized or no response
    /// was obtained.
    pub async fn open_stream(
        &self,
        method: Method,
        target: &str,
        headers: Vec<(String, String)>,
    ) -> Result<(StreamingResponse, ResponseMetadata), Error> {
        let request = self.prepare(method, target, headers, Vec::new())?;
        let response = self.transport.open_stream(request).await?;
        let meta = parse_headers(&response.head.headers, self.vendor_code);
        Ok((response, meta))
    }
}
