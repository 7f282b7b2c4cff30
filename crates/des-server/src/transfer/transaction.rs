//! Rollback bookkeeping for multi-file transfers

use des_common::DesError;
use std::collections::HashSet;
use tracing::{error, info, warn};

use crate::storage::ObjectStore;

/// What a rollback attempt did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RollbackOutcome {
    NothingRecorded,
    /// Atomic mode is off; the recorded objects were left in place.
    Skipped { recorded: usize },
    Completed { deleted: usize },
    /// Some deletions failed; the keys that could not be removed are listed.
    Partial { deleted: usize, failed: Vec<String> },
}

/// The destination objects written by one transfer request.
///
/// Keys are kept in insertion order without duplicates. A rollback only
/// ever deletes keys from this set.
#[derive(Debug, Clone)]
pub struct TransferTransaction {
    bucket: String,
    atomic: bool,
    written: Vec<String>,
    seen: HashSet<String>,
}

impl TransferTransaction {
    pub fn new(bucket: impl Into<String>, atomic: bool) -> Self {
        Self {
            bucket: bucket.into(),
            atomic,
            written: Vec::new(),
            seen: HashSet::new(),
        }
    }

    pub fn record(&mut self, key: impl Into<String>) {
        let key = key.into();
        if self.seen.insert(key.clone()) {
            self.written.push(key);
        }
    }

    pub fn record_all<I>(&mut self, keys: I)
    where
        I: IntoIterator<Item = String>,
    {
        keys.into_iter().for_each(|key| self.record(key));
    }

    pub fn written(&self) -> &[String] {
        &self.written
    }

    pub fn is_atomic(&self) -> bool {
        self.atomic
    }

    /// Delete every recorded object when atomic mode is on.
    ///
    /// Deletion failures are logged and reported in the outcome; they never
    /// replace the failure that triggered the rollback.
    pub async fn rollback(&self, store: &dyn ObjectStore) -> RollbackOutcome {
        if self.written.is_empty() {
            return RollbackOutcome::NothingRecorded;
        }

        if !self.atomic {
            info!(
                recorded = self.written.len(),
                "Cleanup on transaction error is disabled. Skipping the cleanup process"
            );
            return RollbackOutcome::Skipped {
                recorded: self.written.len(),
            };
        }

        warn!(
            bucket = %self.bucket,
            objects = self.written.len(),
            "Rolling back transferred objects"
        );

        let mut deleted = 0;
        let mut failed = Vec::new();
        for key in &self.written {
            match store.delete_object(&self.bucket, key).await {
                Ok(()) => deleted += 1,
                Err(err) => {
                    let err = DesError::CleanupFailed {
                        location: format!("s3://{}/{}", self.bucket, key),
                        reason: err.to_string(),
                    };
                    error!(error = %err, "Error cleaning up object already loaded to S3");
                    failed.push(key.clone());
                },
            }
        }

        if failed.is_empty() {
            RollbackOutcome::Completed { deleted }
        } else {
            RollbackOutcome::Partial { deleted, failed }
        }
    }
}
