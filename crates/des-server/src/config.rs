//! Configuration management

use des_common::types::flag_enabled;
use serde::{Deserialize, Serialize};

use crate::storage::StorageConfig;
use crate::transfer::TransferSettings;

// ============================================================================
// Server Configuration Constants
// ============================================================================

/// Default server host binding.
pub const DEFAULT_SERVER_HOST: &str = "127.0.0.1";

/// Default server port.
pub const DEFAULT_SERVER_PORT: u16 = 8000;

/// Default shutdown timeout in seconds.
pub const DEFAULT_SHUTDOWN_TIMEOUT_SECS: u64 = 30;

pub const DEFAULT_SERVICE_NAME: &str = "dataexportservice";

// ============================================================================
// Tool Configuration Constants
// ============================================================================

pub const DEFAULT_HADOOP_BIN: &str = "hadoop";

pub const DEFAULT_SQOOP_BIN: &str = "sqoop";

/// Default for requests without `atomic_transaction`.
pub const DEFAULT_ATOMIC_TRANSACTION: &str = "y";

/// Default for requests without `s3_cleanup_before_transfer`.
pub const DEFAULT_S3_CLEANUP_BEFORE_TRANSFER: &str = "y";

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub auth: AuthConfig,
    pub tools: ToolsConfig,
    pub storage: StorageConfig,
}

/// Server-specific configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub service_name: String,
    pub shutdown_timeout_secs: u64,
}

/// HTTP Basic credentials guarding the export endpoint
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct AuthConfig {
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

/// External tools and transfer defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolsConfig {
    pub hadoop_bin: String,
    pub sqoop_bin: String,
    pub atomic_transaction: bool,
    pub s3_cleanup_before_transfer: bool,
}

impl ToolsConfig {
    /// Tool locations and transfer defaults from `DES_*` variables.
    pub fn from_env() -> Self {
        Self {
            hadoop_bin: env_or("DES_HADOOP_BIN", DEFAULT_HADOOP_BIN),
            sqoop_bin: env_or("DES_SQOOP_BIN", DEFAULT_SQOOP_BIN),
            atomic_transaction: flag_enabled(&env_or(
                "DES_ATOMIC_TRANSACTION",
                DEFAULT_ATOMIC_TRANSACTION,
            )),
            s3_cleanup_before_transfer: flag_enabled(&env_or(
                "DES_S3_CLEANUP_BEFORE_TRANSFER",
                DEFAULT_S3_CLEANUP_BEFORE_TRANSFER,
            )),
        }
    }

    pub fn transfer_settings(&self) -> TransferSettings {
        TransferSettings {
            hadoop_bin: self.hadoop_bin.clone(),
            atomic_transaction: self.atomic_transaction,
            cleanup_before_transfer: self.s3_cleanup_before_transfer,
        }
    }
}

fn env_or(name: &str, default: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| default.to_string())
}

impl Config {
    /// Load configuration from environment and defaults
    pub fn load() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let config = Config {
            server: ServerConfig {
                host: env_or("DES_HOST", DEFAULT_SERVER_HOST),
                port: std::env::var("DES_PORT")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(DEFAULT_SERVER_PORT),
                service_name: env_or("DES_SERVICE_NAME", DEFAULT_SERVICE_NAME),
                shutdown_timeout_secs: std::env::var("DES_SHUTDOWN_TIMEOUT")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(DEFAULT_SHUTDOWN_TIMEOUT_SECS),
            },
            auth: AuthConfig {
                username: std::env::var("DES_BASIC_AUTH_USERNAME").unwrap_or_default(),
                password: std::env::var("DES_BASIC_AUTH_PASSWORD").unwrap_or_default(),
            },
            tools: ToolsConfig::from_env(),
            storage: StorageConfig::from_env(),
        };

        config.validate()?;

        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.server.port == 0 {
            anyhow::bail!("Server port must be greater than 0");
        }

        if self.auth.username.is_empty() || self.auth.password.is_empty() {
            anyhow::bail!(
                "DES_BASIC_AUTH_USERNAME and DES_BASIC_AUTH_PASSWORD must both be set"
            );
        }

        if self.tools.hadoop_bin.trim().is_empty() {
            anyhow::bail!("Hadoop binary cannot be empty");
        }

        if self.tools.sqoop_bin.trim().is_empty() {
            anyhow::bail!("Sqoop binary cannot be empty");
        }

        if !self.tools.atomic_transaction {
            tracing::warn!("Atomic transactions are disabled - failed transfers will not be cleaned up");
        }

        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: DEFAULT_SERVER_HOST.to_string(),
                port: DEFAULT_SERVER_PORT,
                service_name: DEFAULT_SERVICE_NAME.to_string(),
                shutdown_timeout_secs: DEFAULT_SHUTDOWN_TIMEOUT_SECS,
            },
            auth: AuthConfig::default(),
            tools: ToolsConfig {
                hadoop_bin: DEFAULT_HADOOP_BIN.to_string(),
                sqoop_bin: DEFAULT_SQOOP_BIN.to_string(),
                atomic_transaction: true,
                s3_cleanup_before_transfer: true,
            },
            storage: StorageConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    const VARS: [&str; 6] = [
        "DES_PORT",
        "DES_BASIC_AUTH_USERNAME",
        "DES_BASIC_AUTH_PASSWORD",
        "DES_SQOOP_BIN",
        "DES_ATOMIC_TRANSACTION",
        "DES_S3_CLEANUP_BEFORE_TRANSFER",
    ];

    fn clear() {
        VARS.iter().for_each(|var| std::env::remove_var(var));
    }

    #[test]
    fn test_default_requires_credentials() {
        let config = Config::default();
        assert!(config.validate().is_err());

        let config = Config {
            auth: AuthConfig {
                username: "admin".into(),
                password: "secret".into(),
            },
            ..Config::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    #[serial]
    fn test_load_from_env() {
        clear();
        std::env::set_var("DES_PORT", "9100");
        std::env::set_var("DES_BASIC_AUTH_USERNAME", "admin");
        std::env::set_var("DES_BASIC_AUTH_PASSWORD", "secret");
        std::env::set_var("DES_SQOOP_BIN", "/opt/sqoop/bin/sqoop");
        std::env::set_var("DES_ATOMIC_TRANSACTION", "N");

        let config = Config::load().unwrap();
        assert_eq!(config.server.port, 9100);
        assert_eq!(config.tools.sqoop_bin, "/opt/sqoop/bin/sqoop");
        assert!(!config.tools.atomic_transaction);
        assert!(config.tools.s3_cleanup_before_transfer);
        assert!(config.tools.transfer_settings().cleanup_before_transfer);

        clear();
    }

    #[test]
    #[serial]
    fn test_load_without_credentials_fails() {
        clear();
        assert!(Config::load().is_err());
    }

    #[test]
    fn test_auth_debug_hides_password() {
        let auth = AuthConfig {
            username: "admin".into(),
            password: "hunter2".into(),
        };
        assert!(!format!("{:?}", auth).contains("hunter2"));
    }
}
