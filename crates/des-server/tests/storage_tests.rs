//! Storage integration tests
//!
//! These tests run the S3 object store and the transfer rollback against a
//! live S3-compatible endpoint.
//!
//! **Requirements**:
//! - MinIO or S3 must be running and accessible
//! - S3_ENDPOINT environment variable must be set (e.g., "http://localhost:9000")
//! - S3_TEST_BUCKET must name an existing bucket
//! - S3_ACCESS_KEY / S3_SECRET_KEY default to the MinIO defaults
//! - Tests will be skipped if S3_ENDPOINT is not configured
//!
//! **Running tests**:
//! ```bash
//! S3_ENDPOINT=http://localhost:9000 S3_PATH_STYLE=true S3_TEST_BUCKET=des-test \
//!     cargo test --test storage_tests
//! ```

use des_common::types::S3Credentials;
use des_server::storage::{
    config::StorageConfig, ObjectStore, ObjectStoreFactory, S3ObjectStoreFactory,
};
use des_server::transfer::transaction::{RollbackOutcome, TransferTransaction};
use std::sync::Arc;

struct LiveStore {
    store: Arc<dyn ObjectStore>,
    bucket: String,
}

/// Setup helper that connects to the configured endpoint, if any
fn setup_store() -> Option<LiveStore> {
    if std::env::var("S3_ENDPOINT").is_err() {
        return None;
    }

    let bucket = std::env::var("S3_TEST_BUCKET").unwrap_or_else(|_| "des-test".to_string());
    let credentials = S3Credentials {
        aws_access_key_id: Some(
            std::env::var("S3_ACCESS_KEY").unwrap_or_else(|_| "minioadmin".to_string()),
        ),
        aws_secret_access_key: Some(
            std::env::var("S3_SECRET_KEY").unwrap_or_else(|_| "minioadmin".to_string()),
        ),
        ..Default::default()
    };

    match S3ObjectStoreFactory::new(StorageConfig::from_env()).connect(&credentials) {
        Ok(store) => Some(LiveStore { store, bucket }),
        Err(e) => {
            eprintln!("Failed to create storage client: {}", e);
            None
        },
    }
}

#[tokio::test]
async fn test_list_unknown_prefix_is_empty() {
    let Some(live) = setup_store() else {
        println!("Skipping test: S3_ENDPOINT not configured");
        return;
    };

    let objects = live
        .store
        .list_objects(&live.bucket, "test/des/no-such-prefix/")
        .await
        .unwrap();
    assert!(objects.is_empty());
}

#[tokio::test]
async fn test_rollback_of_missing_objects_completes() {
    let Some(live) = setup_store() else {
        println!("Skipping test: S3_ENDPOINT not configured");
        return;
    };

    let mut transaction = TransferTransaction::new(&live.bucket, true);
    transaction.record("test/des/rollback/part-0");
    transaction.record("test/des/rollback/part-1");

    let outcome = transaction.rollback(live.store.as_ref()).await;
    assert_eq!(outcome, RollbackOutcome::Completed { deleted: 2 });
}

#[tokio::test]
async fn test_unknown_bucket_is_a_storage_error() {
    let Some(live) = setup_store() else {
        println!("Skipping test: S3_ENDPOINT not configured");
        return;
    };

    let result = live
        .store
        .list_objects("des-test-bucket-that-does-not-exist", "")
        .await;
    assert!(result.is_err());
}
