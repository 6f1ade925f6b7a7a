//! Object storage connection.
//!
//! Provides the primary interface: one [`Connection`] per endpoint and
//! credential set, exposing bucket and object operations through resource
//! clients.

use std::fmt;
use std::sync::Arc;

use serde_json::json;
use tracing::{debug, info};

use crate::auth::{AuthStrategy, S3Auth, Session, SwiftAuth};
use crate::clients::{BucketsClient, ObjectsClient};
use crate::config::{ConnectionConfig, Credentials, Style};
use crate::error::Error;
use crate::state::{ConnectionState, Readiness};
use crate::transport::{ReqwestTransport, Transport};

/// State shared by the connection and its resource clients.
pub(crate) struct Core {
    config: ConnectionConfig,
    strategy: Box<dyn AuthStrategy>,
    readiness: Readiness<Arc<Session>>,
}

impl fmt::Debug for Core {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Core")
            .field("config", &self.config)
            .field("readiness", &self.readiness)
            .finish_non_exhaustive()
    }
}

impl Core {
    fn new(config: ConnectionConfig, transport: Arc<dyn Transport>) -> Result<Self, Error> {
        let strategy: Box<dyn AuthStrategy> = match config.style() {
            Style::S3 => Box::new(S3Auth::new(&config, transport)?),
            Style::Swift => Box::new(SwiftAuth::new(&config, transport)?),
        };
        let readiness = match strategy.immediate_session() {
            Some(session) => Readiness::connected(Arc::new(session)),
            None => Readiness::disconnected(),
        };
        Ok(Self {
            config,
            strategy,
            readiness,
        })
    }

    pub(crate) fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    pub(crate) fn style(&self) -> Style {
        self.strategy.style()
    }

    async fn connect(&self) -> Result<(), Error> {
        self.session().await.map(|_| ())
    }

    /// Wait until the connection is ready and get its session.
    ///
    /// The first caller on a `Disconnected` connection runs the token
    /// exchange; everyone else queues behind it.
    pub(crate) async fn session(&self) -> Result<Arc<Session>, Error> {
        if let Some(attempt) = self.readiness.try_begin() {
            info!(style = %self.style(), endpoint = %self.config.endpoint(), "connecting");
            let outcome = self.strategy.authenticate().await.map(Arc::new);
            attempt.complete(outcome);
        } else if self.readiness.state() != ConnectionState::Connected {
            debug!(state = %self.readiness.state(), "waiting for connection");
        }
        self.readiness.wait().await
    }

    /// Resolve the bucket an operation addresses.
    pub(crate) fn bucket<'a>(&'a self, bucket: Option<&'a str>) -> Result<&'a str, Error> {
        bucket
            .or_else(|| self.config.bucket())
            .filter(|b| !b.is_empty())
            .ok_or_else(|| Error::InvalidArgument("bucket (container) name is required".to_string()))
    }
}

/// Connection to an S3-style or Swift-style object storage service.
///
/// S3-style connections sign every request and are ready immediately.
/// Swift-style connections exchange credentials for a token first;
/// operations issued before that completes wait for it, and are rejected
/// with the authentication error if it fails.
///
/// # Example
///
/// ```rust,ignore
/// use osapi::{Connection, ConnectionConfig, CreateObjectOptions};
///
/// let config = ConnectionConfig::swift("http://storage.local", "test:tester", "testing")
///     .with_bucket("photos");
/// let connection = Connection::open(config)?;
///
/// connection
///     .objects()
///     .create(CreateObjectOptions::from("cat.jpg").content_type("image/jpeg"), bytes)
///     .await?;
/// let entries = connection.objects().find("cat").await?;
/// ```
pub struct Connection {
    core: Arc<Core>,
    buckets: BucketsClient,
    objects: ObjectsClient,
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("core", &self.core)
            .finish_non_exhaustive()
    }
}

impl Connection {
    /// Create a connection using the default HTTP transport.
    ///
    /// A Swift-style connection stays `Disconnected` until [`connect`] or
    /// its first operation starts the token exchange; operations issued
    /// meanwhile wait for it. Use [`open`] to start authenticating right
    /// away.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP transport cannot be created.
    ///
    /// [`connect`]: Self::connect
    /// [`open`]: Self::open
    pub fn new(config: ConnectionConfig) -> Result<Self, Error> {
        let transport = Arc::new(ReqwestTransport::new(config.settings())?);
        Self::with_transport(config, transport)
    }

    /// Create a connection over a custom transport.
    ///
    /// # Errors
    ///
    /// Returns an error if the credentials do not match the style.
    pub fn with_transport(config: ConnectionConfig, transport: Arc<dyn Transport>) -> Result<Self, Error> {
        let core = Arc::new(Core::new(config, transport)?);
        debug!(style = %core.style(), state = %core.readiness.state(), "connection created");
        Ok(Self {
            buckets: BucketsClient::new(Arc::clone(&core)),
            objects: ObjectsClient::new(Arc::clone(&core)),
            core,
        })
    }

    /// Create a connection and start authenticating in the background.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP transport cannot be created or no tokio
    /// runtime is running.
    pub fn open(config: ConnectionConfig) -> Result<Self, Error> {
        let transport = Arc::new(ReqwestTransport::new(config.settings())?);
        Self::open_with_transport(config, transport)
    }

    /// Create a connection over a custom transport and start authenticating
    /// in the background.
    ///
    /// # Errors
    ///
    /// Returns an error if the credentials do not match the style or no
    /// tokio runtime is running.
    pub fn open_with_transport(
        config: ConnectionConfig,
        transport: Arc<dyn Transport>,
    ) -> Result<Self, Error> {
        let handle = tokio::runtime::Handle::try_current()
            .map_err(|e| Error::Configuration(format!("Connection::open requires a tokio runtime: {e}")))?;
        let connection = Self::with_transport(config, transport)?;
        let core = Arc::clone(&connection.core);
        handle.spawn(async move {
            // The outcome is delivered to every waiting operation.
            let _ = core.connect().await;
        });
        Ok(connection)
    }

    /// Create a connection from `OSAPI_*` environment variables.
    ///
    /// # Errors
    ///
    /// Returns `Error::Configuration` if required variables are missing.
    pub fn from_env() -> Result<Self, Error> {
        Self::new(ConnectionConfig::from_env()?)
    }

    /// Authenticate, or wait for the authentication already in progress.
    ///
    /// Idempotent: once the outcome is known it is returned again without
    /// any network call.
    ///
    /// # Errors
    ///
    /// Returns `Error::Authentication` if the credentials were rejected, or
    /// a transport error.
    pub async fn connect(&self) -> Result<(), Error> {
        self.core.connect().await
    }

    /// Get the configuration.
    #[must_use]
    pub fn config(&self) -> &ConnectionConfig {
        self.core.config()
    }

    /// Get the protocol style.
    #[must_use]
    pub fn style(&self) -> Style {
        self.core.style()
    }

    /// Get the readiness state.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.core.readiness.state()
    }

    /// Check whether operations run without waiting.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    /// Get the default bucket (container).
    #[must_use]
    pub fn default_bucket(&self) -> Option<&str> {
        self.core.config().bucket()
    }

    /// Get the number of operations waiting for the connection.
    #[must_use]
    pub fn pending_operations(&self) -> usize {
        self.core.readiness.pending()
    }

    /// Summarize the connection without any secret.
    #[must_use]
    pub fn describe(&self) -> String {
        let config = self.core.config();
        let user = match config.credentials() {
            Credentials::S3 { access_key, .. } => json!({ "accessKey": access_key }),
            Credentials::Swift { subuser, .. } => json!({ "subuser": subuser }),
        };
        json!({
            "style": config.style().as_str(),
            "endpoint": config.endpoint(),
            "bucket": config.bucket(),
            "vendor": config.vendor_code(),
            "user": user,
            "state": self.state(),
        })
        .to_string()
    }

    /// Get the buckets (containers) client.
    #[must_use]
    pub fn buckets(&self) -> &BucketsClient {
        &self.buckets
    }

    /// Get the objects client.
    #[must_use]
    pub fn objects(&self) -> &ObjectsClient {
        &self.objects
    }
}
