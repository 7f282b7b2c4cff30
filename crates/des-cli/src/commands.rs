//! Request execution

use des_common::types::{ExportRequest, ExportState, TransferRequest, TransferState};
use des_server::engines::Engines;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::path::Path;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::error::{CliError, Result};
use crate::Commands;

/// Status document of a finished run.
#[derive(Debug, Clone, PartialEq)]
pub struct Report {
    pub body: Value,
    pub succeeded: bool,
}

/// Read and deserialize a request file.
pub fn read_request<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let text = std::fs::read_to_string(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => CliError::FileNotFound(path.to_path_buf()),
        _ => CliError::Io(e),
    })?;
    serde_json::from_str(&text).map_err(|source| CliError::InvalidRequest {
        path: path.to_path_buf(),
        source,
    })
}

pub async fn run(command: &Commands, engines: &Engines, cancel: &CancellationToken) -> Result<Report> {
    match command {
        Commands::Transfer { request } => {
            let request: TransferRequest = read_request(request)?;
            info!(source = %request.source_path, target = %request.target_path, "Running transfer");

            let status = engines.transfers.run_transfer(&request, cancel).await?;
            Ok(Report {
                succeeded: status.status == TransferState::Success,
                body: serde_json::to_value(&status)?,
            })
        },
        Commands::Export { request } => {
            let request: ExportRequest = read_request(request)?;
            info!(table = ?request.table_name, "Running export");

            let status = engines.exports.run_export(&request, cancel).await?;
            Ok(Report {
                succeeded: status.status == ExportState::Success,
                body: serde_json::to_value(&status)?,
            })
        },
    }
}
