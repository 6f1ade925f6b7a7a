//! Swift token exchange (TempAuth, `/auth/1.0`).

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::{info, warn};

use super::{AuthSession, AuthStrategy, Session};
use crate::agent::Agent;
use crate::classify::find_error;
use crate::config::{ConnectionConfig, Credentials, Style};
use crate::error::{Action, Error, ResponseRecord, StorageError};
use crate::transport::{Method, RequestDescriptor, ResponseHead, Transport};

/// Path of the token exchange, relative to the endpoint.
pub const AUTH_PATH: &str = "/auth/1.0";

/// Swift strategy: one token exchange, then bearer-token requests.
pub struct SwiftAuth {
    endpoint: String,
    subuser: String,
    key: String,
    transport: Arc<dyn Transport>,
}

impl fmt::Debug for SwiftAuth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SwiftAuth")
            .field("endpoint", &self.endpoint)
            .field("subuser", &self.subuser)
            .field("key", &"<redacted>")
            .finish_non_exhaustive()
    }
}

impl SwiftAuth {
    /// Create a new Swift strategy.
    ///
    /// # Errors
    ///
    /// Returns `Error::Unsupported` for an S3-style configuration.
    pub fn new(config: &ConnectionConfig, transport: Arc<dyn Transport>) -> Result<Self, Error> {
        match config.credentials() {
            Credentials::Swift { subuser, key } => Ok(Self {
                endpoint: config.endpoint().to_string(),
                subuser: subuser.clone(),
                key: key.clone(),
                transport,
            }),
            Credentials::S3 { .. } => Err(Error::Unsupported(
                "token exchange requires Swift credentials".to_string(),
            )),
        }
    }

    fn meta(&self) -> Value {
        json!({ "endpoint": self.endpoint, "subuser": self.subuser })
    }

    fn session_from(&self, head: &ResponseHead) -> Result<AuthSession, Error> {
        let missing = |header: &str| {
            Error::Authentication(StorageError::new(
                Action::Auth,
                self.meta(),
                ResponseRecord {
                    status_code: head.status_code,
                    status_message: head.status_message.clone(),
                    code: None,
                    message: Some(format!("Response lacks {header}")),
                },
            ))
        };

        let storage_url = head
            .header("x-storage-url")
            .ok_or_else(|| missing("x-storage-url"))?;
        let storage_token = head
            .header("x-storage-token")
            .or_else(|| head.header("x-auth-token"))
            .ok_or_else(|| missing("x-storage-token"))?;

        Ok(AuthSession::new(
            head.header("x-auth-token").map(String::from),
            storage_url,
            storage_token,
        ))
    }

    fn agent(&self, auth: &AuthSession) -> Agent {
        Agent::new(Arc::clone(&self.transport), auth.storage_url())
            .with_header("X-Auth-Token", auth.storage_token())
            .with_header("Accept", "application/json")
    }
}

#[async_trait]
impl AuthStrategy for SwiftAuth {
    fn style(&self) -> Style {
        Style::Swift
    }

    fn immediate_session(&self) -> Option<Session> {
        None
    }

    async fn authenticate(&self) -> Result<Session, Error> {
        let request = RequestDescriptor::new(Method::Get, format!("{}{AUTH_PATH}", self.endpoint))
            .header("X-Auth-User", &self.subuser)
            .header("X-Auth-Key", &self.key);

        let response = self.transport.perform(request).await.map_err(|e| {
            warn!(subuser = %self.subuser, error = %e, "token exchange failed");
            e
        })?;

        if let Some(error) = find_error(Action::Auth, &[204], &self.meta(), &response.head, &response.body) {
            warn!(subuser = %self.subuser, status = error.status_code(), "authentication rejected");
            return Err(Error::Authentication(error));
        }

        let auth = self.session_from(&response.head)?;
        info!(subuser = %self.subuser, storage_url = %auth.storage_url(), "authenticated");

        let agent = self.agent(&auth);
        Ok(Session {
            streaming_agent: agent.clone(),
            agent,
            auth: Some(auth),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockTransport;

    fn strategy(transport: Arc<MockTransport>) -> SwiftAuth {
        let config = ConnectionConfig::swift("http://storage.local", "test:tester", "testing");
        SwiftAuth::new(&config, transport).expect("swift credentials")
    }

    #[tokio::test]
    async fn test_token_exchange() {
        let transport = Arc::new(MockTransport::new());
        transport.push_response(
            MockTransport::response(204)
                .header("x-auth-token", "AUTH_tk1")
                .header("x-storage-token", "AUTH_tk1")
                .header("x-storage-url", "http://storage.local/v1/AUTH_test"),
        );

        let session = strategy(transport.clone()).authenticate().await.expect("authenticated");

        let request = transport.last_request().expect("auth request sent");
        assert_eq!(request.url, "http://storage.local/auth/1.0");
        assert_eq!(request.get_header("x-auth-user"), Some("test:tester"));
        assert_eq!(request.get_header("x-auth-key"), Some("testing"));

        let auth = session.auth.expect("swift session");
        assert_eq!(auth.storage_url(), "http://storage.local/v1/AUTH_test");
        assert_eq!(session.agent.base_url(), "http://storage.local/v1/AUTH_test");

        let prepared = session
            .agent
            .prepare(Method::Get, "/photos", Vec::new(), Vec::new())
            .expect("prepared");
        assert_eq!(prepared.get_header("x-auth-token"), Some("AUTH_tk1"));
        assert_eq!(prepared.get_header("accept"), Some("application/json"));
    }

    #[tokio::test]
    async fn test_rejected_credentials() {
        let transport = Arc::new(MockTransport::new());
        transport.push_response(MockTransport::response(401));

        let error = strategy(transport).authenticate().await.expect_err("rejected");
        match error {
            Error::Authentication(e) => {
                assert_eq!(e.action, Action::Auth);
                assert_eq!(e.status_code(), 401);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_missing_storage_url() {
        let transport = Arc::new(MockTransport::new());
        transport.push_response(MockTransport::response(204).header("x-auth-token", "AUTH_tk1"));

        let error = strategy(transport).authenticate().await.expect_err("incomplete");
        assert!(matches!(error, Error::Authentication(_)));
    }

    #[test]
    fn test_requires_swift_credentials() {
        let config = ConnectionConfig::s3("http://storage.local", "AKID", "secret");
        let transport = Arc::new(MockTransport::new());
        assert!(matches!(SwiftAuth::new(&config, transport), Err(Error::Unsupported(_))));
    }
}
