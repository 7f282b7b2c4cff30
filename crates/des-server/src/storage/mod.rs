use async_trait::async_trait;
use aws_sdk_s3::{
    config::{Credentials, Region},
    Client,
};
use des_common::types::S3Credentials;
use des_common::DesError;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, instrument};

pub mod config;

pub use config::StorageConfig;

/// A bucket/key pair parsed from an `s3://`, `s3a://` or `s3n://` URI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct S3Location {
    pub bucket: String,
    pub key: String,
}

impl S3Location {
    pub fn parse(uri: &str) -> Result<Self, DesError> {
        let invalid = || DesError::InvalidRequest(format!("Invalid S3 location: {uri}"));

        let (scheme, rest) = uri.split_once("://").ok_or_else(invalid)?;
        if !matches!(scheme, "s3" | "s3a" | "s3n") {
            return Err(invalid());
        }
        let (bucket, key) = rest.split_once('/').ok_or_else(invalid)?;
        if bucket.is_empty() {
            return Err(invalid());
        }

        Ok(Self {
            bucket: bucket.to_string(),
            key: key.to_string(),
        })
    }
}

impl fmt::Display for S3Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "s3://{}/{}", self.bucket, self.key)
    }
}

/// One listed object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectEntry {
    pub key: String,
    pub size: u64,
}

/// The object storage operations needed for verification and rollback.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Every object under `prefix`, across all result pages.
    async fn list_objects(&self, bucket: &str, prefix: &str) -> Result<Vec<ObjectEntry>, DesError>;

    async fn delete_object(&self, bucket: &str, key: &str) -> Result<(), DesError>;
}

/// Builds an [`ObjectStore`] from the credentials carried by a request.
pub trait ObjectStoreFactory: Send + Sync {
    fn connect(&self, credentials: &S3Credentials) -> Result<Arc<dyn ObjectStore>, DesError>;
}

#[derive(Clone)]
pub struct S3ObjectStore {
    client: Client,
}

impl fmt::Debug for S3ObjectStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("S3ObjectStore").finish_non_exhaustive()
    }
}

impl S3ObjectStore {
    pub fn new(config: &StorageConfig, access_key: &str, secret_key: &str) -> Self {
        let credentials = Credentials::new(access_key, secret_key, None, None, "des-transfer");

        let mut s3_config_builder = aws_sdk_s3::Config::builder()
            .credentials_provider(credentials)
            .region(Region::new(config.region.clone()))
            .force_path_style(config.path_style);

        if let Some(endpoint) = &config.endpoint {
            s3_config_builder = s3_config_builder.endpoint_url(endpoint);
        }

        Self {
            client: Client::from_conf(s3_config_builder.build()),
        }
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    #[instrument(skip(self))]
    async fn list_objects(&self, bucket: &str, prefix: &str) -> Result<Vec<ObjectEntry>, DesError> {
        debug!("Listing objects in s3://{}/{}", bucket, prefix);

        let mut pages = self
            .client
            .list_objects_v2()
            .bucket(bucket)
            .prefix(prefix)
            .into_paginator()
            .send();

        let mut objects = Vec::new();
        while let Some(page) = pages.next().await {
            let page = page.map_err(|e| {
                DesError::Storage(format!(
                    "Unable to list s3://{bucket}/{prefix}. Verify the bucket name and credentials: {e}"
                ))
            })?;
            objects.extend(page.contents().iter().filter_map(|object| {
                object.key().map(|key| ObjectEntry {
                    key: key.to_string(),
                    size: object.size().unwrap_or(0).max(0) as u64,
                })
            }));
        }

        debug!("Listed {} objects under s3://{}/{}", objects.len(), bucket, prefix);
        Ok(objects)
    }

    #[instrument(skip(self))]
    async fn delete_object(&self, bucket: &str, key: &str) -> Result<(), DesError> {
        self.client
            .delete_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| DesError::Storage(format!("Failed to delete s3://{bucket}/{key}: {e}")))?;

        info!("Successfully deleted s3://{}/{}", bucket, key);
        Ok(())
    }
}

/// Creates [`S3ObjectStore`]s against the configured endpoint.
#[derive(Debug, Clone, Default)]
pub struct S3ObjectStoreFactory {
    config: StorageConfig,
}

impl S3ObjectStoreFactory {
    pub fn new(config: StorageConfig) -> Self {
        Self { config }
    }
}

impl ObjectStoreFactory for S3ObjectStoreFactory {
    fn connect(&self, credentials: &S3Credentials) -> Result<Arc<dyn ObjectStore>, DesError> {
        let missing = |field: &str| {
            DesError::CommandConstruction(format!("missing credential field `{field}`"))
        };
        let access_key = credentials
            .aws_access_key_id
            .as_deref()
            .ok_or_else(|| missing("aws_access_key_id"))?;
        let secret_key = credentials
            .aws_secret_access_key
            .as_deref()
            .ok_or_else(|| missing("aws_secret_access_key"))?;

        Ok(Arc::new(S3ObjectStore::new(&self.config, access_key, secret_key)))
    }
}
