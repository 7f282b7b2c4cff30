//! Request and status types exchanged with DES callers
//!
//! Field names follow the JSON wire format of the export endpoint, so the
//! structures deserialize directly from request bodies.

use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// Value of the `y`/`n` flags carried by requests.
pub const FLAG_YES: &str = "y";

/// Interpret a `y`/`n` style flag, case-insensitively.
pub fn flag_enabled(value: &str) -> bool {
    value.trim().eq_ignore_ascii_case(FLAG_YES)
}

// ============================================================================
// Transfer (hdfsToS3)
// ============================================================================

/// Extra options appended to the distcp command line.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DistcpCommandOptions {
    /// `-D` style hadoop options, appended as `key=value` in the given order
    #[serde(default)]
    pub hadoop_options: Option<serde_json::Map<String, serde_json::Value>>,

    /// Bare distcp flags, appended verbatim in the given order
    #[serde(default)]
    pub distcp_options: Option<Vec<String>>,
}

/// Credential bundle of an `hdfsToS3` request.
///
/// `Debug` never prints the key pair.
#[derive(Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct S3Credentials {
    #[serde(default)]
    pub aws_access_key_id: Option<String>,

    #[serde(default)]
    pub aws_secret_access_key: Option<String>,

    /// `y` enables server-side AES256 encryption
    #[serde(default)]
    pub aes_encryption_enabled: Option<String>,

    #[serde(default)]
    pub mapreduce_queuename: Option<String>,

    #[serde(default)]
    pub distcp_command_options: Option<DistcpCommandOptions>,
}

impl fmt::Debug for S3Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("S3Credentials")
            .field("aws_access_key_id", &self.aws_access_key_id.as_ref().map(|_| "***"))
            .field(
                "aws_secret_access_key",
                &self.aws_secret_access_key.as_ref().map(|_| "***"),
            )
            .field("aes_encryption_enabled", &self.aes_encryption_enabled)
            .field("mapreduce_queuename", &self.mapreduce_queuename)
            .field("distcp_command_options", &self.distcp_command_options)
            .finish()
    }
}

/// Which files of `source_path` to transfer.
///
/// The wire format accepts either a list of paths or the literal `false`,
/// which (like an absent field) means "every entry of the source directory".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FileList {
    Paths(Vec<String>),
    All(bool),
}

impl FileList {
    /// Explicit paths, or `None` when the whole source must be listed.
    pub fn paths(&self) -> Option<&[String]> {
        match self {
            FileList::Paths(paths) => Some(paths),
            FileList::All(_) => None,
        }
    }
}

/// An `hdfsToS3` request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransferRequest {
    pub source_path: String,
    pub target_path: String,

    #[serde(default)]
    pub file_list: Option<FileList>,

    pub s3_credentials: S3Credentials,

    /// `y`/`n`; when absent the service default applies
    #[serde(default)]
    pub atomic_transaction: Option<String>,

    /// `y`/`n`; when absent the service default applies
    #[serde(default)]
    pub s3_cleanup_before_transfer: Option<String>,
}

impl TransferRequest {
    /// Explicitly requested files, `None` for a full listing of the source.
    pub fn requested_files(&self) -> Option<&[String]> {
        self.file_list.as_ref().and_then(FileList::paths)
    }
}

/// Outcome of a transfer as seen by the caller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransferState {
    #[serde(rename = "SUCCESS")]
    Success,
    #[serde(rename = "FAILED")]
    Failed,
}

/// One transferred file or directory
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CopiedFile {
    /// Full destination URI
    pub file_name: String,
    /// Verified size in bytes, as a decimal string
    pub file_size: String,
}

impl CopiedFile {
    pub fn new(file_name: impl Into<String>, size: u64) -> Self {
        Self {
            file_name: file_name.into(),
            file_size: size.to_string(),
        }
    }
}

/// Terminal status of an `hdfsToS3` request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferStatus {
    pub status: TransferState,
    pub files_copied_list: Vec<CopiedFile>,
}

impl TransferStatus {
    pub fn success(files_copied_list: Vec<CopiedFile>) -> Self {
        Self {
            status: TransferState::Success,
            files_copied_list,
        }
    }

    /// Failed transfers never report partial progress.
    pub fn failed() -> Self {
        Self {
            status: TransferState::Failed,
            files_copied_list: Vec::new(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == TransferState::Success
    }
}

// ============================================================================
// Export (dbexport)
// ============================================================================

/// A `dbexport` request.
///
/// Every field is optional on the wire; presence is checked when the sqoop
/// job is built so that a missing field yields a `FAILED` status rather than
/// a rejected request.
#[derive(Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExportRequest {
    #[serde(default)]
    pub db_type: Option<String>,
    #[serde(default)]
    pub db_name: Option<String>,
    #[serde(default)]
    pub user_name: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub db_host: Option<String>,
    #[serde(default, deserialize_with = "string_or_number")]
    pub db_port: Option<String>,
    #[serde(default)]
    pub table_name: Option<String>,
    #[serde(default)]
    pub destination: Option<String>,
}

impl fmt::Debug for ExportRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExportRequest")
            .field("db_type", &self.db_type)
            .field("db_name", &self.db_name)
            .field("user_name", &self.user_name)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .field("db_host", &self.db_host)
            .field("db_port", &self.db_port)
            .field("table_name", &self.table_name)
            .field("destination", &self.destination)
            .finish()
    }
}

fn string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Port {
        Text(String),
        Number(u64),
    }

    Ok(Option::<Port>::deserialize(deserializer)?.map(|port| match port {
        Port::Text(text) => text,
        Port::Number(number) => number.to_string(),
    }))
}

/// State of an export job.
///
/// `Rerun` only exists between the first and the second sqoop attempt and is
/// never returned to a caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExportState {
    #[serde(rename = "SUCCESS")]
    Success,
    #[serde(rename = "FAILED")]
    Failed,
    #[serde(rename = "RE-RUN")]
    Rerun,
}

/// Terminal status of a `dbexport` request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportStatus {
    pub status: ExportState,
    pub record_count: Option<i64>,
    pub error: Option<String>,
}

impl ExportStatus {
    pub fn success(record_count: i64) -> Self {
        Self {
            status: ExportState::Success,
            record_count: Some(record_count),
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            status: ExportState::Failed,
            record_count: None,
            error: Some(error.into()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == ExportState::Success
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_file_list_false_means_full_listing() {
        let request: TransferRequest = serde_json::from_value(json!({
            "source_path": "/data/a",
            "target_path": "s3://bucket/a",
            "file_list": false,
            "s3_credentials": {}
        }))
        .unwrap();
        assert_eq!(request.requested_files(), None);

        let request: TransferRequest = serde_json::from_value(json!({
            "source_path": "/data/a",
            "target_path": "s3://bucket/a",
            "file_list": ["f1", "f2"],
            "s3_credentials": {}
        }))
        .unwrap();
        assert_eq!(
            request.requested_files(),
            Some(&["f1".to_string(), "f2".to_string()][..])
        );
    }

    #[test]
    fn test_hadoop_options_keep_request_order() {
        let credentials: S3Credentials = serde_json::from_value(json!({
            "distcp_command_options": {
                "hadoop_options": {"-Dz.last": "1", "-Da.first": "2"}
            }
        }))
        .unwrap();
        let keys: Vec<_> = credentials
            .distcp_command_options
            .unwrap()
            .hadoop_options
            .unwrap()
            .keys()
            .cloned()
            .collect();
        assert_eq!(keys, vec!["-Dz.last", "-Da.first"]);
    }

    #[test]
    fn test_credentials_debug_hides_keys() {
        let credentials = S3Credentials {
            aws_access_key_id: Some("AKIAEXAMPLE".into()),
            aws_secret_access_key: Some("wJalrXUtnFEMI".into()),
            ..Default::default()
        };
        let rendered = format!("{:?}", credentials);
        assert!(!rendered.contains("AKIAEXAMPLE"));
        assert!(!rendered.contains("wJalrXUtnFEMI"));
    }

    #[test]
    fn test_transfer_status_wire_format() {
        let status = TransferStatus::success(vec![CopiedFile::new("s3://bucket/a/f1", 100)]);
        assert_eq!(
            serde_json::to_value(&status).unwrap(),
            json!({
                "status": "SUCCESS",
                "files_copied_list": [{"file_name": "s3://bucket/a/f1", "file_size": "100"}]
            })
        );
        assert_eq!(
            serde_json::to_value(TransferStatus::failed()).unwrap(),
            json!({"status": "FAILED", "files_copied_list": []})
        );
    }

    #[test]
    fn test_export_status_wire_format() {
        assert_eq!(
            serde_json::to_value(ExportStatus::success(42)).unwrap(),
            json!({"status": "SUCCESS", "record_count": 42, "error": null})
        );
    }

    #[test]
    fn test_export_request_accepts_numeric_port() {
        let request: ExportRequest = serde_json::from_value(json!({
            "db_type": "mysql",
            "db_port": 3306
        }))
        .unwrap();
        assert_eq!(request.db_port.as_deref(), Some("3306"));
        assert!(request.table_name.is_none());
    }

    #[test]
    fn test_flag_enabled() {
        assert!(flag_enabled("Y"));
        assert!(flag_enabled(" y "));
        assert!(!flag_enabled("n"));
        assert!(!flag_enabled("yes"));
    }
}
