use serde::{Deserialize, Serialize};
use std::env;

/// Connection settings shared by every per-request S3 client.
///
/// Credentials are not part of this: each transfer request carries its own
/// key pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageConfig {
    pub endpoint: Option<String>,
    pub region: String,
    pub path_style: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            region: "us-east-1".to_string(),
            path_style: false,
        }
    }
}

impl StorageConfig {
    pub fn from_env() -> Self {
        Self {
            endpoint: env::var("S3_ENDPOINT").ok().filter(|v| !v.is_empty()),
            region: env::var("S3_REGION").unwrap_or_else(|_| "us-east-1".to_string()),
            path_style: env::var("S3_PATH_STYLE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(false),
        }
    }

    pub fn for_minio(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: Some(endpoint.into()),
            region: "us-east-1".to_string(),
            path_style: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn test_for_minio() {
        let config = StorageConfig::for_minio("http://localhost:9000");
        assert_eq!(config.endpoint, Some("http://localhost:9000".to_string()));
        assert!(config.path_style);
    }

    #[test]
    #[serial]
    fn test_from_env() {
        std::env::set_var("S3_REGION", "eu-west-1");
        std::env::set_var("S3_PATH_STYLE", "true");
        std::env::set_var("S3_ENDPOINT", "");

        let config = StorageConfig::from_env();
        assert_eq!(config.region, "eu-west-1");
        assert!(config.path_style);
        assert_eq!(config.endpoint, None);

        std::env::remove_var("S3_REGION");
        std::env::remove_var("S3_PATH_STYLE");
        std::env::remove_var("S3_ENDPOINT");
    }
}
