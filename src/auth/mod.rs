//! Authentication strategies.
//!
//! Each connection style owns exactly one [`AuthStrategy`]:
//!
//! * [`S3Auth`] signs every request with HMAC-SHA1 and needs no round trip,
//!   so its session is available immediately.
//! * [`SwiftAuth`] exchanges the subuser and key for a token once, then
//!   sends the token with every request.

mod s3;
mod swift;

use std::fmt;

use async_trait::async_trait;

use crate::agent::Agent;
use crate::config::Style;
use crate::error::Error;

pub use s3::{S3Auth, S3Signer};
pub use swift::{SwiftAuth, AUTH_PATH};

/// Result of a successful Swift token exchange.
///
/// Lives until the connection is dropped; expiry is not tracked.
#[derive(Clone, PartialEq, Eq)]
pub struct AuthSession {
    auth_token: Option<String>,
    storage_url: String,
    storage_token: String,
}

impl AuthSession {
    /// Create a new session.
    #[must_use]
    pub fn new(auth_token: Option<String>, storage_url: &str, storage_token: &str) -> Self {
        Self {
            auth_token,
            storage_url: storage_url.trim_end_matches('/').to_string(),
            storage_token: storage_token.to_string(),
        }
    }

    /// Get the token returned as `x-auth-token`.
    #[must_use]
    pub fn auth_token(&self) -> Option<&str> {
        self.auth_token.as_deref()
    }

    /// Get the account storage URL.
    #[must_use]
    pub fn storage_url(&self) -> &str {
        &self.storage_url
    }

    /// Get the token sent with every storage request.
    #[must_use]
    pub fn storage_token(&self) -> &str {
        &self.storage_token
    }
}

impl fmt::Debug for AuthSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthSession")
            .field("storage_url", &self.storage_url)
            .field("auth_token", &"<redacted>")
            .field("storage_token", &"<redacted>")
            .finish()
    }
}

/// Everything an operation needs to talk to the service. Written once when
/// the connection becomes ready and only read afterwards.
#[derive(Debug, Clone)]
pub struct Session {
    /// Agent for buffered requests
    pub agent: Agent,
    /// Agent for streamed reads
    pub streaming_agent: Agent,
    /// Swift token exchange result
    pub auth: Option<AuthSession>,
}

/// How a connection authenticates.
#[async_trait]
pub trait AuthStrategy: Send + Sync {
    /// Get the style this strategy speaks.
    fn style(&self) -> Style;

    /// Get a session without any network call, if the style allows it.
    fn immediate_session(&self) -> Option<Session>;

    /// Establish a session.
    ///
    /// # Errors
    ///
    /// Returns `Error::Authentication` if the service rejected the
    /// credentials, or a transport error.
    async fn authenticate(&self) -> Result<Session, Error>;
}
