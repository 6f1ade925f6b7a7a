//! Mock transport for testing.
//!
//! Provides a `MockTransport` that answers requests with scripted responses
//! and records every request it sees, so connection behavior can be tested
//! without a storage service.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Notify;

use crate::error::Error;
use crate::transport::{
    BodyChunks, HttpResponse, Method, RequestDescriptor, ResponseHead, ResponseHeaders,
    StreamingResponse, Transport,
};

/// Record of a request.
#[derive(Debug, Clone)]
pub struct MockCall {
    /// The request as handed to the transport
    pub request: RequestDescriptor,
    /// Whether the request was opened as a stream
    pub streaming: bool,
    /// Timestamp of the call
    pub timestamp: DateTime<Utc>,
}

impl MockCall {
    /// Create a new mock call record.
    pub fn new(request: RequestDescriptor, streaming: bool) -> Self {
        Self {
            request,
            streaming,
            timestamp: Utc::now(),
        }
    }
}

/// Configuration for a mock response.
#[derive(Debug, Clone)]
pub struct MockResponse {
    /// Status code to return
    pub status_code: u16,
    /// Reason phrase to return
    pub status_message: String,
    /// Response headers, lowercase names
    pub headers: ResponseHeaders,
    /// Body, split into the chunks a stream yields
    pub chunks: Vec<Vec<u8>>,
    /// Fail the request instead of answering
    pub error: Option<Error>,
    /// Fail a stream after all chunks were read
    pub stream_error: Option<Error>,
    /// Hold the answer until notified
    pub gate: Option<Arc<Notify>>,
}

fn reason_phrase(status_code: u16) -> &'static str {
    match status_code {
        200 => "OK",
        201 => "Created",
        202 => "Accepted",
        204 => "No Content",
        400 => "Bad Request",
        401 => "Unauthorized",
        403 => "Forbidden",
        404 => "Not Found",
        409 => "Conflict",
        500 => "Internal Server Error",
        _ => "",
    }
}

impl MockResponse {
    /// Create a response with the given status and no body.
    pub fn status(status_code: u16) -> Self {
        Self {
            status_code,
            status_message: reason_phrase(status_code).to_string(),
            headers: ResponseHeaders::new(),
            chunks: Vec::new(),
            error: None,
            stream_error: None,
            gate: None,
        }
    }

    /// Create a transport failure.
    pub fn transport_error(message: &str) -> Self {
        Self {
            error: Some(Error::Http(message.to_string())),
            ..Self::status(0)
        }
    }

    /// Add a header.
    #[must_use]
    pub fn header(mut self, name: &str, value: &str) -> Self {
        self.headers.insert(name.to_lowercase(), value.to_string());
        self
    }

    /// Set the body.
    #[must_use]
    pub fn body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.chunks = vec![body.into()];
        self
    }

    /// Set the body as an XML document.
    #[must_use]
    pub fn xml(self, body: &str) -> Self {
        self.header("content-type", "application/xml").body(body)
    }

    /// Set the body as a JSON document.
    #[must_use]
    pub fn json(self, body: &serde_json::Value) -> Self {
        self.header("content-type", "application/json")
            .body(body.to_string())
    }

    /// Set the body as separate chunks.
    #[must_use]
    pub fn chunks(mut self, chunks: Vec<Vec<u8>>) -> Self {
        self.chunks = chunks;
        self
    }

    /// Fail a stream after its chunks were read.
    #[must_use]
    pub fn fail_stream(mut self, message: &str) -> Self {
        self.stream_error = Some(Error::Http(message.to_string()));
        self
    }

    /// Hold the answer until `gate` is notified.
    #[must_use]
    pub fn wait_for(mut self, gate: Arc<Notify>) -> Self {
        self.gate = Some(gate);
        self
    }

    fn head(&self) -> ResponseHead {
        ResponseHead {
            status_code: self.status_code,
            status_message: self.status_message.clone(),
            headers: self.headers.clone(),
        }
    }
}

struct Route {
    method: Method,
    url_contains: String,
    response: MockResponse,
}

/// Internal state for the mock transport.
#[derive(Default)]
struct MockTransportState {
    calls: Vec<MockCall>,
    queue: VecDeque<MockResponse>,
    routes: Vec<Route>,
}

impl MockTransportState {
    fn answer(&mut self, request: &RequestDescriptor, streaming: bool) -> Result<MockResponse, Error> {
        self.calls.push(MockCall::new(request.clone(), streaming));

        let routed = self
            .routes
            .iter()
            .find(|route| route.method == request.method && request.url.contains(&route.url_contains))
            .map(|route| route.response.clone());

        routed.or_else(|| self.queue.pop_front()).ok_or_else(|| {
            Error::Http(format!(
                "No mock response for {} {}",
                request.method, request.url
            ))
        })
    }
}

/// Scripted [`Transport`] for testing.
///
/// Requests are answered by the first matching route, then by the response
/// queue in FIFO order.
#[derive(Default)]
pub struct MockTransport {
    state: Mutex<MockTransportState>,
}

struct MockBody {
    chunks: VecDeque<Vec<u8>>,
    error: Option<Error>,
}

#[async_trait]
impl BodyChunks for MockBody {
    async fn next_chunk(&mut self) -> Result<Option<Vec<u8>>, Error> {
        match self.chunks.pop_front() {
            Some(chunk) => Ok(Some(chunk)),
            None => match self.error.take() {
                Some(error) => Err(error),
                None => Ok(None),
            },
        }
    }
}

impl MockTransport {
    /// Create a mock transport with nothing scripted.
    pub fn new() -> Self {
        Self::default()
    }

    /// Shorthand for [`MockResponse::status`].
    pub fn response(status_code: u16) -> MockResponse {
        MockResponse::status(status_code)
    }

    /// Queue a response for the next unrouted request.
    pub fn push_response(&self, response: MockResponse) {
        self.state
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .queue
            .push_back(response);
    }

    /// Answer every `method` request whose URL contains `url_contains`.
    pub fn on(&self, method: Method, url_contains: &str, response: MockResponse) {
        self.state
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .routes
            .push(Route {
                method,
                url_contains: url_contains.to_string(),
                response,
            });
    }

    fn answer(&self, request: &RequestDescriptor, streaming: bool) -> Result<MockResponse, Error> {
        self.state
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .answer(request, streaming)
    }

    /// Check if a method was used.
    ///
    /// # Arguments
    ///
    /// * `method` - HTTP method
    ///
    /// # Returns
    ///
    /// `true` if at least one request used the method
    #[must_use]
    pub fn was_called(&self, method: Method) -> bool {
        self.call_count(method) > 0
    }

    /// Get the number of requests that used a method.
    #[must_use]
    pub fn call_count(&self, method: Method) -> usize {
        self.state
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .calls
            .iter()
            .filter(|call| call.request.method == method)
            .count()
    }

    /// Get recorded calls, optionally filtered by method.
    ///
    /// # Arguments
    ///
    /// * `method` - Optional method to filter by
    ///
    /// # Returns
    ///
    /// List of `MockCall` objects in request order
    #[must_use]
    pub fn get_calls(&self, method: Option<Method>) -> Vec<MockCall> {
        let state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        match method {
            Some(m) => state
                .calls
                .iter()
                .filter(|call| call.request.method == m)
                .cloned()
                .collect(),
            None => state.calls.clone(),
        }
    }

    /// Get the last recorded request.
    #[must_use]
    pub fn last_request(&self) -> Option<RequestDescriptor> {
        self.state
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .calls
            .last()
            .map(|call| call.request.clone())
    }

    /// Reset recorded calls, queued responses and routes.
    pub fn reset(&self) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state.calls.clear();
        state.queue.clear();
        state.routes.clear();
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn perform(&self, request: RequestDescriptor) -> Result<HttpResponse, Error> {
        let response = self.answer(&request, false)?;
        if let Some(gate) = &response.gate {
            gate.notified().await;
        }
        if let Some(error) = response.error.clone() {
            return Err(error);
        }
        Ok(HttpResponse {
            head: response.head(),
            body: response.chunks.concat(),
        })
    }

    async fn open_stream(&self, request: RequestDescriptor) -> Result<StreamingResponse, Error> {
        let response = self.answer(&request, true)?;
        if let Some(gate) = &response.gate {
            gate.notified().await;
        }
        if let Some(error) = response.error.clone() {
            return Err(error);
        }
        Ok(StreamingResponse {
            head: response.head(),
            body: Box::new(MockBody {
                chunks: response.chunks.into_iter().collect(),
                error: response.stream_error,
            }),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_routes_win_over_queue() {
        let mock = MockTransport::new();
        mock.push_response(MockResponse::status(500));
        mock.on(Method::Get, "/auth/1.0", MockResponse::status(204));

        let auth = mock
            .perform(RequestDescriptor::new(Method::Get, "http://storage.local/auth/1.0"))
            .await
            .expect("routed");
        assert_eq!(auth.head.status_code, 204);

        let other = mock
            .perform(RequestDescriptor::new(Method::Get, "http://storage.local/photos"))
            .await
            .expect("queued");
        assert_eq!(other.head.status_code, 500);
        assert_eq!(other.head.status_message, "Internal Server Error");
    }

    #[tokio::test]
    async fn test_unscripted_request_fails() {
        let mock = MockTransport::new();
        let result = mock
            .perform(RequestDescriptor::new(Method::Delete, "http://storage.local/x"))
            .await;
        assert!(matches!(result, Err(Error::Http(_))));
        assert!(mock.was_called(Method::Delete));
    }

    #[tokio::test]
    async fn test_stream_yields_chunks_then_error() {
        let mock = MockTransport::new();
        mock.push_response(
            MockResponse::status(200)
                .chunks(vec![b"ab".to_vec(), b"cd".to_vec()])
                .fail_stream("connection reset"),
        );

        let mut stream = mock
            .open_stream(RequestDescriptor::new(Method::Get, "http://storage.local/x"))
            .await
            .expect("stream opened");
        assert_eq!(stream.body.next_chunk().await.expect("chunk"), Some(b"ab".to_vec()));
        assert_eq!(stream.body.next_chunk().await.expect("chunk"), Some(b"cd".to_vec()));
        assert!(stream.body.next_chunk().await.is_err());
    }

    #[tokio::test]
    async fn test_get_calls_and_reset() {
        let mock = MockTransport::new();
        mock.on(Method::Head, "", MockResponse::status(200));
        mock.on(Method::Get, "", MockResponse::status(200));

        for url in ["http://a/1", "http://a/2"] {
            mock.perform(RequestDescriptor::new(Method::Head, url)).await.expect("routed");
        }
        mock.perform(RequestDescriptor::new(Method::Get, "http://a/3")).await.expect("routed");

        assert_eq!(mock.get_calls(None).len(), 3);
        assert_eq!(mock.get_calls(Some(Method::Head)).len(), 2);
        assert_eq!(mock.last_request().map(|r| r.url).as_deref(), Some("http://a/3"));

        mock.reset();
        assert!(!mock.was_called(Method::Head));
        assert!(mock.get_calls(None).is_empty());
    }
}
