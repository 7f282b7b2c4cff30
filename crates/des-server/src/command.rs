//! Command construction for the wrapped tools
//!
//! Builds the `hadoop distcp` and `sqoop import` invocations from request
//! data. Secrets are registered on the [`Invocation`] so that only the
//! redacted form ever reaches the log.

use des_common::types::{flag_enabled, ExportRequest, S3Credentials};
use des_common::DesError;
use std::path::Path;

use crate::process::Invocation;

/// Server-side encryption algorithm requested when `aes_encryption_enabled` is `y`.
pub const ENCRYPTION_ALGORITHM: &str = "AES256";

/// Default `fs.s3a.multipart.uploads.enabled`.
pub const S3A_MULTIPART_UPLOADS_ENABLED: &str = "true";

/// Default `fs.s3a.multipart.uploads.block.size` (128 MiB).
pub const S3A_MULTIPART_UPLOADS_BLOCK_SIZE: &str = "134217728";

/// Default `mapreduce.task.timeout` in milliseconds.
pub const MAPREDUCE_TASK_TIMEOUT: &str = "175000000";

/// Option string shared by every distcp run of one request.
///
/// Built once per request from the credential bundle; the key pair is kept so
/// each per-file invocation can mask it.
#[derive(Clone, PartialEq, Eq)]
pub struct DistcpOptions {
    options: Vec<String>,
    access_key: String,
    secret_key: String,
}

impl std::fmt::Debug for DistcpOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DistcpOptions")
            .field("options", &self.options.len())
            .finish_non_exhaustive()
    }
}

impl DistcpOptions {
    /// Assemble the distcp options, in this order:
    ///
    /// 1. access/secret key for both the `s3a` and `s3n` drivers
    /// 2. server-side encryption when `aes_encryption_enabled` is `y`
    /// 3. the trimmed queue name, if any
    /// 4. the multipart and task-timeout defaults
    /// 5. caller `hadoop_options` (`key=value`), then caller `distcp_options`
    pub fn build(credentials: &S3Credentials) -> Result<Self, DesError> {
        let access_key = required(&credentials.aws_access_key_id, "aws_access_key_id")?;
        let secret_key = required(&credentials.aws_secret_access_key, "aws_secret_access_key")?;

        let mut options = vec![
            format!("-Dfs.s3a.awsAccessKeyId={access_key}"),
            format!("-Dfs.s3a.awsSecretAccessKey={secret_key}"),
            format!("-Dfs.s3n.awsAccessKeyId={access_key}"),
            format!("-Dfs.s3n.awsSecretAccessKey={secret_key}"),
        ];

        if credentials
            .aes_encryption_enabled
            .as_deref()
            .is_some_and(flag_enabled)
        {
            options.push(format!(
                "-Dfs.s3a.server-side-encryption-algorithm={ENCRYPTION_ALGORITHM}"
            ));
        }

        if let Some(queue) = &credentials.mapreduce_queuename {
            options.push(format!("-Dmapreduce.job.queuename={}", queue.trim()));
        }

        options.push(format!(
            "-Dfs.s3a.multipart.uploads.enabled={S3A_MULTIPART_UPLOADS_ENABLED}"
        ));
        options.push(format!("-Dmapreduce.task.timeout={MAPREDUCE_TASK_TIMEOUT}"));
        options.push(format!(
            "-Dfs.s3a.multipart.uploads.block.size={S3A_MULTIPART_UPLOADS_BLOCK_SIZE}"
        ));

        if let Some(extra) = &credentials.distcp_command_options {
            for (option, value) in extra.hadoop_options.iter().flatten() {
                let value = match value {
                    serde_json::Value::String(text) => text.clone(),
                    other => other.to_string(),
                };
                options.push(format!("{option}={value}"));
            }
            for flags in extra.distcp_options.iter().flatten() {
                options.extend(flags.split_whitespace().map(str::to_string));
            }
        }

        Ok(Self {
            options,
            access_key: access_key.to_string(),
            secret_key: secret_key.to_string(),
        })
    }

    pub fn options(&self) -> &[String] {
        &self.options
    }

    /// `hadoop distcp <options> <source> <target>`
    pub fn invocation(&self, hadoop_bin: &str, source: &str, target: &str) -> Invocation {
        Invocation::new(hadoop_bin)
            .arg("distcp")
            .args(self.options.iter().cloned())
            .arg(source)
            .arg(target)
            .secret(&self.access_key)
            .secret(&self.secret_key)
    }
}

fn required<'a>(value: &'a Option<String>, field: &str) -> Result<&'a str, DesError> {
    match value.as_deref().map(str::trim) {
        Some(value) if !value.is_empty() => Ok(value),
        _ => Err(DesError::CommandConstruction(format!(
            "missing credential field `{field}`"
        ))),
    }
}

// ============================================================================
// Sqoop
// ============================================================================

/// Databases a sqoop export can connect to.
///
/// Only types with both a JDBC driver class and a connection-string prefix
/// are constructible.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DbType {
    MySql,
    Oracle,
}

impl DbType {
    pub fn driver(self) -> &'static str {
        match self {
            DbType::MySql => "com.mysql.jdbc.Driver",
            DbType::Oracle => "oracle.jdbc.driver.OracleDriver",
        }
    }

    pub fn connector(self) -> &'static str {
        match self {
            DbType::MySql => "jdbc:mysql://",
            DbType::Oracle => "jdbc:oracle://",
        }
    }
}

impl std::str::FromStr for DbType {
    type Err = DesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "mysql" => Ok(DbType::MySql),
            "oracle" => Ok(DbType::Oracle),
            other => Err(DesError::CommandConstruction(format!(
                "unsupported db_type `{other}`"
            ))),
        }
    }
}

/// Message reported when a `dbexport` request lacks a field.
pub const INPUT_CONFIG_ERROR: &str = "Error Parsing Input Config";

/// A validated `dbexport` request.
#[derive(Clone, PartialEq, Eq)]
pub struct ExportJob {
    pub db_type: DbType,
    pub db_name: String,
    pub user_name: String,
    pub password: String,
    pub db_host: String,
    pub db_port: String,
    pub table_name: String,
    pub destination: String,
}

impl std::fmt::Debug for ExportJob {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExportJob")
            .field("db_type", &self.db_type)
            .field("db_name", &self.db_name)
            .field("db_host", &self.db_host)
            .field("db_port", &self.db_port)
            .field("table_name", &self.table_name)
            .field("destination", &self.destination)
            .finish_non_exhaustive()
    }
}

impl ExportJob {
    /// Validate field presence first, then the database type.
    pub fn from_request(request: &ExportRequest) -> Result<Self, DesError> {
        let field = |value: &Option<String>| {
            value
                .clone()
                .ok_or_else(|| DesError::InvalidRequest(INPUT_CONFIG_ERROR.to_string()))
        };

        let db_type = field(&request.db_type)?;
        let db_name = field(&request.db_name)?;
        let user_name = field(&request.user_name)?;
        let password = field(&request.password)?;
        let db_host = field(&request.db_host)?;
        let db_port = field(&request.db_port)?;
        let table_name = field(&request.table_name)?;
        let destination = field(&request.destination)?;

        Ok(Self {
            db_type: db_type.parse()?,
            db_name,
            user_name,
            password,
            db_host,
            db_port,
            table_name,
            destination,
        })
    }

    /// `jdbc:<type>://<host>:<port>/<db>`
    pub fn connection_string(&self) -> String {
        format!(
            "{}{}:{}/{}",
            self.db_type.connector(),
            self.db_host,
            self.db_port,
            self.db_name
        )
    }

    /// `sqoop import --connect ... --target-dir <destination>`
    pub fn invocation(&self, sqoop_bin: &str) -> Invocation {
        Invocation::new(sqoop_bin)
            .arg("import")
            .args(["--connect".to_string(), self.connection_string()])
            .args(["--username", &self.user_name])
            .args(["--password", &self.password])
            .args(["--driver", self.db_type.driver()])
            .args(["--table", &self.table_name])
            .args(["--target-dir", &self.destination])
            .secret(&self.password)
    }
}

/// Reject invocations that do not launch sqoop.
pub fn ensure_sqoop_command(invocation: &Invocation) -> Result<(), DesError> {
    let program = Path::new(invocation.program())
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or_default();

    if program.starts_with("sqoop") {
        Ok(())
    } else {
        Err(DesError::CommandConstruction(format!(
            "`{}` is not a sqoop command",
            invocation.program()
        )))
    }
}
