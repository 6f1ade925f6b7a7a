//! Integration tests for osapi.
//!
//! These tests run against a live S3-compatible or Swift service (a local
//! Ceph RGW works for both) and verify end-to-end workflows.
//!
//! To run these tests:
//! ```bash
//! OSAPI_INTEGRATION_TESTS=1 OSAPI_ENDPOINT=http://localhost:7480 \
//!   OSAPI_ACCESS_KEY=... OSAPI_SECRET_ACCESS_KEY=... \
//!   cargo test --test integration_tests -- --ignored
//! ```
//!
//! Set `OSAPI_SUBUSER` and `OSAPI_KEY` instead of the access key pair to run
//! them over Swift.

use std::env;

use osapi::{
    is_not_found, BucketOptions, Connection, ConnectionConfig, CreateObjectOptions, MetaFlag,
    ObjectOptions, ObjectRef, SinkReceiver,
};
use uuid::Uuid;

/// Check if integration tests should run.
fn should_run_integration_tests() -> bool {
    env::var("OSAPI_INTEGRATION_TESTS").map_or(false, |v| v == "1")
}

/// Generate a unique name for test resources.
fn generate_unique_name(prefix: &str) -> String {
    format!("{}-{}", prefix, &Uuid::new_v4().to_string()[..8])
}

/// Connect using `OSAPI_*` variables, with a fresh default bucket.
async fn connect_with_bucket() -> Result<(Connection, String), osapi::Error> {
    let bucket = generate_unique_name("osapi-test");
    let config = ConnectionConfig::from_env()?.with_bucket(&bucket);
    let connection = Connection::new(config)?;
    connection.connect().await?;
    connection.buckets().create(bucket.as_str()).await?;
    Ok((connection, bucket))
}

async fn cleanup(connection: &Connection, bucket: &str, objects: &[&str]) {
    for name in objects {
        let _ = connection.objects().delete(*name).await;
    }
    let _ = connection.buckets().delete(bucket).await;
}

#[tokio::test]
#[ignore = "Integration test requires OSAPI_INTEGRATION_TESTS=1 and a running service"]
async fn test_bucket_lifecycle() {
    if !should_run_integration_tests() {
        return;
    }

    let (connection, bucket) = connect_with_bucket().await.expect("Setup should succeed");

    // Creating it again is not an error
    connection
        .buckets()
        .create(bucket.as_str())
        .await
        .expect("Repeated creation should succeed");

    let info = connection
        .buckets()
        .read(bucket.as_str())
        .await
        .expect("Read should succeed");
    assert!(info.is_some());

    let listed = connection
        .buckets()
        .find(bucket.as_str())
        .await
        .expect("Listing should succeed");
    assert!(listed.iter().any(|entry| entry.name == bucket));

    connection
        .buckets()
        .delete(bucket.as_str())
        .await
        .expect("Delete should succeed");

    let gone = connection
        .buckets()
        .read(BucketOptions::from(bucket.as_str()).suppress_not_found())
        .await
        .expect("Suppressed read should succeed");
    assert!(gone.is_none());
}

#[tokio::test]
#[ignore = "Integration test requires OSAPI_INTEGRATION_TESTS=1 and a running service"]
async fn test_object_lifecycle() {
    if !should_run_integration_tests() {
        return;
    }

    let (connection, bucket) = connect_with_bucket().await.expect("Setup should succeed");
    let objects = connection.objects();

    let options = CreateObjectOptions::from("dir/cat.txt")
        .content_type("text/plain")
        .meta("title", "中文")
        .meta("author", "alice");
    objects
        .create(options, "meow")
        .await
        .expect("Create should succeed");

    let object = objects
        .read("dir/cat.txt")
        .await
        .expect("Read should succeed")
        .expect("Object should exist");
    assert_eq!(object.body, b"meow");
    assert_eq!(object.meta.meta_value("title"), Some("中文"));

    let mut receiver = SinkReceiver::new(Vec::new());
    objects
        .pull("dir/cat.txt", &mut receiver)
        .await
        .expect("Pull should succeed");
    assert_eq!(receiver.into_inner(), b"meow");

    let mood = [("mood".to_string(), "sleepy".to_string())].into_iter().collect();
    objects
        .update_meta("dir/cat.txt", mood, MetaFlag::Append)
        .await
        .expect("Metadata update should succeed");
    let meta = objects
        .read_meta("dir/cat.txt")
        .await
        .expect("Read should succeed")
        .expect("Object should exist");
    assert_eq!(meta.meta_value("mood"), Some("sleepy"));
    assert_eq!(meta.meta_value("author"), Some("alice"));

    objects
        .copy("dir/cat.txt", ObjectRef::new(&bucket, "copy.txt"))
        .await
        .expect("Copy should succeed");

    let listing = objects
        .find(osapi::FindObjectsOptions {
            delimiter: Some("/".to_string()),
            ..Default::default()
        })
        .await
        .expect("Listing should succeed");
    assert_eq!(listing.first().and_then(|item| item.dirname()), Some("dir/"));

    objects.delete("dir/cat.txt").await.expect("Delete should succeed");
    objects
        .delete("dir/cat.txt")
        .await
        .expect("Deleting a missing object should succeed");

    let error = objects.read("dir/cat.txt").await.expect_err("Object should be gone");
    assert!(is_not_found(&error));
    let missing = objects
        .read(ObjectOptions::from("dir/cat.txt").suppress_not_found())
        .await
        .expect("Suppressed read should succeed");
    assert!(missing.is_none());

    cleanup(&connection, &bucket, &["copy.txt"]).await;
}
