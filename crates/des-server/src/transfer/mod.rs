//! HDFS to S3 transfer pipeline
//!
//! Each file of a request is copied with its own distcp run, checked against
//! the tool output, recorded for rollback and then verified by comparing the
//! HDFS and S3 sizes. The first failure stops the request; with atomic mode
//! on, everything recorded so far is deleted again.

pub mod transaction;
pub mod verify;

use des_common::types::{flag_enabled, CopiedFile, TransferRequest, TransferStatus};
use des_common::{Cancelled, DesError};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::classify::detect_transfer_failure;
use crate::command::DistcpOptions;
use crate::hadoop::HadoopFs;
use crate::process::{cancellable, ProcessRunner};
use crate::storage::{ObjectStore, ObjectStoreFactory, S3Location};

pub use transaction::{RollbackOutcome, TransferTransaction};
pub use verify::FileRecord;

/// Service-level defaults for transfers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferSettings {
    pub hadoop_bin: String,
    /// Used when a request carries no `atomic_transaction` flag
    pub atomic_transaction: bool,
    /// Used when a request carries no `s3_cleanup_before_transfer` flag
    pub cleanup_before_transfer: bool,
}

impl Default for TransferSettings {
    fn default() -> Self {
        Self {
            hadoop_bin: "hadoop".to_string(),
            atomic_transaction: true,
            cleanup_before_transfer: true,
        }
    }
}

/// Everything derived from a request before the first file is copied.
struct TransferJob {
    options: DistcpOptions,
    store: Arc<dyn ObjectStore>,
    cleanup_before_transfer: bool,
}

pub struct HdfsToS3Pipeline {
    fs: Arc<dyn HadoopFs>,
    runner: Arc<dyn ProcessRunner>,
    stores: Arc<dyn ObjectStoreFactory>,
    settings: TransferSettings,
}

impl std::fmt::Debug for HdfsToS3Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HdfsToS3Pipeline")
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl HdfsToS3Pipeline {
    pub fn new(
        fs: Arc<dyn HadoopFs>,
        runner: Arc<dyn ProcessRunner>,
        stores: Arc<dyn ObjectStoreFactory>,
        settings: TransferSettings,
    ) -> Self {
        Self {
            fs,
            runner,
            stores,
            settings,
        }
    }

    /// Run one `hdfsToS3` request to completion.
    ///
    /// Every failure is reported as a `FAILED` status with an empty file
    /// list. Cancellation stops the in-flight step, skips the rollback and
    /// is the only error returned.
    pub async fn run_transfer(
        &self,
        request: &TransferRequest,
        cancel: &CancellationToken,
    ) -> Result<TransferStatus, Cancelled> {
        let span = info_span!(
            "transfer",
            job_id = %Uuid::new_v4(),
            source = %request.source_path,
            target = %request.target_path,
        );

        async move {
            info!("Executing transfer from HDFS to S3");

            let job = match self.prepare(request) {
                Ok(job) => job,
                Err(err) => {
                    error!(error = %err, "Error occurred while preparing the transfer");
                    return Ok(TransferStatus::failed());
                },
            };

            let atomic = request
                .atomic_transaction
                .as_deref()
                .map_or(self.settings.atomic_transaction, flag_enabled);
            let target = match S3Location::parse(&request.target_path) {
                Ok(target) => target,
                Err(err) => {
                    error!(error = %err, "Invalid target path");
                    return Ok(TransferStatus::failed());
                },
            };
            let mut transaction = TransferTransaction::new(target.bucket, atomic);

            let result = cancellable(
                cancel,
                self.copy_all(request, &job, &mut transaction),
            )
            .await;

            match result {
                Ok(files) => {
                    info!(files = files.len(), "Transfer completed");
                    Ok(TransferStatus::success(files))
                },
                Err(DesError::Cancelled) => {
                    warn!(
                        recorded = transaction.written().len(),
                        "Transfer cancelled, leaving transferred objects in place"
                    );
                    Err(Cancelled)
                },
                Err(err) => {
                    error!(error = %err, "Transfer failed");
                    let outcome = transaction.rollback(job.store.as_ref()).await;
                    debug!(?outcome, "Rollback finished");
                    Ok(TransferStatus::failed())
                },
            }
        }
        .instrument(span)
        .await
    }

    fn prepare(&self, request: &TransferRequest) -> Result<TransferJob, DesError> {
        let options = DistcpOptions::build(&request.s3_credentials)?;
        let store = self.stores.connect(&request.s3_credentials)?;
        let cleanup_before_transfer = request
            .s3_cleanup_before_transfer
            .as_deref()
            .map_or(self.settings.cleanup_before_transfer, flag_enabled);

        Ok(TransferJob {
            options,
            store,
            cleanup_before_transfer,
        })
    }

    async fn copy_all(
        &self,
        request: &TransferRequest,
        job: &TransferJob,
        transaction: &mut TransferTransaction,
    ) -> Result<Vec<CopiedFile>, DesError> {
        let source_root = request.source_path.trim_end_matches('/');
        let target_root = request.target_path.trim_end_matches('/');

        let names = match request.requested_files() {
            Some(files) => files.to_vec(),
            None => self
                .fs
                .list(source_root)
                .await?
                .into_iter()
                .map(|entry| entry.path)
                .collect(),
        };

        let mut copied = Vec::with_capacity(names.len());
        for name in &names {
            let relative = name
                .strip_prefix(source_root)
                .unwrap_or(name)
                .trim_matches('/');
            let hdfs_file = format!("{source_root}/{relative}");
            let s3_file = format!("{target_root}/{relative}");

            copied.push(self.copy_one(job, &hdfs_file, &s3_file, transaction).await?);
        }
        Ok(copied)
    }

    async fn copy_one(
        &self,
        job: &TransferJob,
        hdfs_file: &str,
        s3_file: &str,
        transaction: &mut TransferTransaction,
    ) -> Result<CopiedFile, DesError> {
        if !self.fs.exists(hdfs_file).await? {
            return Err(DesError::SourceNotFound(hdfs_file.to_string()));
        }
        let destination = S3Location::parse(s3_file)?;

        if job.cleanup_before_transfer {
            clear_destination(job.store.as_ref(), &destination).await?;
        }

        info!(file = %hdfs_file, "Loading file from HDFS to S3");
        let invocation = job
            .options
            .invocation(&self.settings.hadoop_bin, hdfs_file, s3_file);
        debug!(command = %invocation, "Running command");

        let run = self.runner.run(&invocation).await?;
        if let Some(signature) = detect_transfer_failure(&run.log) {
            return Err(DesError::LogDetectedFailure(format!(
                "distcp of {hdfs_file} reported `{signature}`"
            )));
        }
        if !run.succeeded() {
            warn!(exit_code = ?run.exit_code, "distcp exited unsuccessfully without an error signature");
        }

        let records = verify::enumerate_source(self.fs.as_ref(), hdfs_file).await?;
        let keys = verify::destination_keys(&destination.key, &records);
        transaction.record_all(keys.iter().cloned());

        let size = verify::verify(
            self.fs.as_ref(),
            job.store.as_ref(),
            hdfs_file,
            &destination,
            &keys,
        )
        .await?;

        info!(file = %s3_file, size, "Transferred and verified");
        Ok(CopiedFile::new(s3_file, size))
    }
}

/// Delete objects left at `destination` by an earlier run.
///
/// Removes the exact key and everything below `key/`; these deletions are
/// not part of the transaction.
async fn clear_destination(store: &dyn ObjectStore, destination: &S3Location) -> Result<(), DesError> {
    let nested = format!("{}/", destination.key.trim_end_matches('/'));
    let stale: Vec<String> = store
        .list_objects(&destination.bucket, &destination.key)
        .await?
        .into_iter()
        .map(|object| object.key)
        .filter(|key| *key == destination.key || key.starts_with(&nested))
        .collect();

    if !stale.is_empty() {
        info!(destination = %destination, objects = stale.len(), "Removing stale objects before transfer");
    }
    for key in &stale {
        store.delete_object(&destination.bucket, key).await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::CapturedRun;
    use crate::testing::{FakeHadoopFs, FakeObjectStore, FakeStoreFactory, ScriptedRunner};
    use des_common::types::{FileList, S3Credentials, TransferState};

    fn request(files: Option<Vec<&str>>) -> TransferRequest {
        TransferRequest {
            source_path: "/data/a".into(),
            target_path: "s3://bucket/a".into(),
            file_list: files.map(|files| FileList::Paths(files.into_iter().map(String::from).collect())),
            s3_credentials: S3Credentials {
                aws_access_key_id: Some("AKIA".into()),
                aws_secret_access_key: Some("SECRET".into()),
                aes_encryption_enabled: Some("n".into()),
                ..Default::default()
            },
            atomic_transaction: None,
            s3_cleanup_before_transfer: None,
        }
    }

    fn pipeline(fs: FakeHadoopFs, runner: ScriptedRunner, store: Arc<FakeObjectStore>) -> HdfsToS3Pipeline {
        HdfsToS3Pipeline::new(
            Arc::new(fs),
            Arc::new(runner),
            Arc::new(FakeStoreFactory::new(store)),
            TransferSettings::default(),
        )
    }

    #[tokio::test]
    async fn test_missing_credentials_fail_before_spawning() {
        let store = Arc::new(FakeObjectStore::new());
        let runner = Arc::new(ScriptedRunner::new());
        let pipeline = HdfsToS3Pipeline::new(
            Arc::new(FakeHadoopFs::new().with_file("/data/a/f1", 1)),
            runner.clone(),
            Arc::new(FakeStoreFactory::new(store)),
            TransferSettings::default(),
        );

        let mut request = request(Some(vec!["f1"]));
        request.s3_credentials.aws_access_key_id = None;

        let status = pipeline
            .run_transfer(&request, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(status, TransferStatus::failed());
        assert!(runner.calls().is_empty());
    }

    #[tokio::test]
    async fn test_missing_source_file_fails() {
        let store = Arc::new(FakeObjectStore::new());
        let pipeline = pipeline(
            FakeHadoopFs::new().with_dir("/data/a"),
            ScriptedRunner::new(),
            store,
        );

        let status = pipeline
            .run_transfer(&request(Some(vec!["missing"])), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(status.status, TransferState::Failed);
    }

    #[tokio::test]
    async fn test_error_signature_fails_regardless_of_exit_code() {
        let store = Arc::new(FakeObjectStore::new());
        let pipeline = pipeline(
            FakeHadoopFs::new().with_file("/data/a/f1", 100),
            ScriptedRunner::new().reply(
                "distcp",
                CapturedRun::new("ERROR tools.DistCp: Job failed\n", Some(0)),
            ),
            store.clone(),
        );

        let status = pipeline
            .run_transfer(&request(Some(vec!["f1"])), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(status, TransferStatus::failed());
        assert!(store.deleted().is_empty());
    }

    #[tokio::test]
    async fn test_pre_cleanup_removes_only_stale_destination_objects() {
        let store = Arc::new(FakeObjectStore::new());
        store.put("bucket", "a/f1", 7);
        store.put("bucket", "a/f1/part-0", 7);
        store.put("bucket", "a/f10", 7);

        let writer = store.clone();
        let pipeline = pipeline(
            FakeHadoopFs::new().with_file("/data/a/f1", 100),
            ScriptedRunner::new().on("distcp", move |_| {
                writer.put("bucket", "a/f1", 100);
                Ok(CapturedRun::new("INFO tools.DistCp: done\n", Some(0)))
            }),
            store.clone(),
        );

        let status = pipeline
            .run_transfer(&request(Some(vec!["f1"])), &CancellationToken::new())
            .await
            .unwrap();
        assert!(status.is_success());
        assert_eq!(store.deleted(), vec!["a/f1", "a/f1/part-0"]);
        assert_eq!(store.keys("bucket"), vec!["a/f1", "a/f10"]);
    }
}
