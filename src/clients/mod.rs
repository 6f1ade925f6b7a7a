//! Resource clients.
//!
//! Every operation follows the same shape: resolve its input, wait for the
//! connection, send one request through the session's agent, then classify
//! the response against the statuses the operation expects.

pub mod buckets;
pub mod objects;

use serde_json::Value;
use tracing::debug;

use crate::agent::{Agent, AgentResponse};
use crate::classify::{find_error, Suppress};
use crate::error::{Action, Error, StorageError};
use crate::transport::Method;

// Re-exports
pub use buckets::BucketsClient;
pub use objects::ObjectsClient;

/// A classified response.
#[derive(Debug)]
pub(crate) enum Reply {
    /// Status was expected (or tolerated).
    Accepted(AgentResponse),
    /// Status was unexpected but suppressed by the caller.
    Suppressed(AgentResponse),
}

impl Reply {
    pub(crate) fn into_response(self) -> AgentResponse {
        match self {
            Self::Accepted(response) | Self::Suppressed(response) => response,
        }
    }
}

/// One request together with the contract its response is checked against.
pub(crate) struct Exchange {
    method: Method,
    target: String,
    headers: Vec<(String, String)>,
    body: Vec<u8>,
    action: Action,
    expect: &'static [u16],
    meta: Value,
    suppress: Suppress,
    tolerate: Option<fn(&StorageError) -> bool>,
}

impl Exchange {
    pub(crate) fn new(
        method: Method,
        target: String,
        action: Action,
        expect: &'static [u16],
        meta: Value,
    ) -> Self {
        Self {
            method,
            target,
            headers: Vec::new(),
            body: Vec::new(),
            action,
            expect,
            meta,
            suppress: Suppress::default(),
            tolerate: None,
        }
    }

    pub(crate) fn header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.push((name.to_string(), value.into()));
        self
    }

    pub(crate) fn headers(mut self, headers: Vec<(String, String)>) -> Self {
        self.headers.extend(headers);
        self
    }

    pub(crate) fn body(mut self, body: Vec<u8>) -> Self {
        self.body = body;
        self
    }

    pub(crate) fn suppress(mut self, suppress: Suppress) -> Self {
        self.suppress = suppress;
        self
    }

    /// Accept an otherwise unexpected response matching `predicate`.
    pub(crate) fn tolerate(mut self, predicate: fn(&StorageError) -> bool) -> Self {
        self.tolerate = Some(predicate);
        self
    }

    /// Send the request and classify the response.
    ///
    /// # Errors
    ///
    /// Returns `Error::Storage` for an unexpected status that is neither
    /// tolerated nor suppressed, or a transport error.
    pub(crate) async fn send(self, agent: &Agent) -> Result<Reply, Error> {
        debug!(action = self.action.as_str(), method = %self.method, target = %self.target, "sending request");
        let response = agent
            .execute(self.method, &self.target, self.headers, self.body)
            .await?;

        match find_error(self.action, self.expect, &self.meta, &response.head, &response.body) {
            None => Ok(Reply::Accepted(response)),
            Some(error) if self.tolerate.is_some_and(|tolerated| tolerated(&error)) => {
                debug!(action = self.action.as_str(), status = error.status_code(), "status tolerated");
                Ok(Reply::Accepted(response))
            }
            Some(error) if self.suppress.matches(&error) => {
                debug!(action = self.action.as_str(), status = error.status_code(), "error suppressed");
                Ok(Reply::Suppressed(response))
            }
            Some(error) => {
                debug!(action = self.action.as_str(), error = %error, "request failed");
                Err(Error::Storage(error))
            }
        }
    }
}
