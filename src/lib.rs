//! `osapi` object storage client for Rust
//!
//! One connection API over two protocol styles: S3 (HMAC-signed requests)
//! and Swift (token exchange, then bearer-token requests). Buckets and
//! containers are the same concept here.
//!
//! # Quick Start
//!
//! ```rust
//! use osapi::signing::temp_url_signature;
//!
//! // Sign a Swift temp URL by hand
//! let signature = temp_url_signature("tempurl-secret", "GET", 1_700_000_000, "/v1/photos/cat.jpg").unwrap();
//! assert_eq!(signature, "9c9c6cf10627eecc4470a2bd83a9e32a71b87420");
//! ```
//!
//! ```rust,ignore
//! use osapi::{Connection, ConnectionConfig, CreateObjectOptions};
//!
//! let config = ConnectionConfig::s3("http://storage.local", "AKID", "secret").with_bucket("photos");
//! let connection = Connection::new(config)?;
//!
//! connection.buckets().create("photos").await?;
//! connection
//!     .objects()
//!     .create(CreateObjectOptions::from("cat.txt").content_type("text/plain"), "meow")
//!     .await?;
//! let object = connection.objects().read("cat.txt").await?;
//! ```

pub mod agent;
pub mod auth;
pub mod callback;
pub mod canonicalize;
pub mod classify;
pub mod client;
pub mod clients;
pub mod codec;
pub mod config;
pub mod error;
pub mod listing;
pub mod receiver;
pub mod request;
pub mod signing;
pub mod state;
pub mod testing;
pub mod transport;
pub mod types;

// Re-exports
pub use agent::{Agent, AgentResponse, Authorizer};
pub use auth::{AuthSession, AuthStrategy, S3Auth, S3Signer, Session, SwiftAuth};
pub use callback::settle;
pub use client::Connection;
pub use clients::{BucketsClient, ObjectsClient};
pub use config::{ConnectionConfig, Credentials, Style, Vendor};
pub use error::{is_bad_request, is_not_found, Action, Error, ResponseRecord, StorageError};
pub use receiver::{ChannelReceiver, SinkReceiver, StreamEvent, StreamReceiver};
pub use state::ConnectionState;
pub use transport::{
    HttpResponse, Method, ReqwestTransport, RequestDescriptor, ResponseHead, StreamingResponse,
    Transport, TransportSettings,
};
pub use types::{
    BucketEntry, BucketInfo, BucketOptions, BucketStats, CreateBucketOptions, CreateObjectOptions,
    FindBucketsOptions, FindObjectsOptions, ListItem, MetaFlag, ObjectData, ObjectEntry,
    ObjectOptions, ObjectRef, ResponseMetadata, SignedUrlOptions,
};
