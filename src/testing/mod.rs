//! Testing utilities for osapi.
//!
//! Provides a scripted transport for testing applications that use
//! osapi connections without a storage service.

mod mock;

pub use mock::{MockCall, MockResponse, MockTransport};
