//! HDFS access through the `hadoop fs` command line

use async_trait::async_trait;
use des_common::DesError;
use std::sync::Arc;
use tracing::debug;

use crate::classify::detect_transfer_failure;
use crate::process::{Invocation, ProcessRunner};

/// Prefix of the output of a successful `hadoop fs -rm`.
pub const DELETE_KEY: &str = "Deleted";

/// One immediate child of an HDFS directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HdfsEntry {
    pub path: String,
    pub is_dir: bool,
    pub size: u64,
}

/// The HDFS operations the transfer and export engines rely on.
#[async_trait]
pub trait HadoopFs: Send + Sync {
    async fn exists(&self, path: &str) -> Result<bool, DesError>;

    async fn is_dir(&self, path: &str) -> Result<bool, DesError>;

    /// Immediate children of a directory, in listing order.
    async fn list(&self, path: &str) -> Result<Vec<HdfsEntry>, DesError>;

    /// Total size in bytes of a file or directory tree.
    async fn du(&self, path: &str) -> Result<u64, DesError>;

    /// Delete a path recursively, bypassing the trash.
    async fn remove_recursive(&self, path: &str) -> Result<(), DesError>;
}

/// [`HadoopFs`] backed by the `hadoop` binary.
#[derive(Clone)]
pub struct HadoopCli {
    hadoop_bin: String,
    runner: Arc<dyn ProcessRunner>,
}

impl std::fmt::Debug for HadoopCli {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HadoopCli")
            .field("hadoop_bin", &self.hadoop_bin)
            .finish_non_exhaustive()
    }
}

impl HadoopCli {
    pub fn new(hadoop_bin: impl Into<String>, runner: Arc<dyn ProcessRunner>) -> Self {
        Self {
            hadoop_bin: hadoop_bin.into(),
            runner,
        }
    }

    fn fs<'a>(&self, args: impl IntoIterator<Item = &'a str>) -> Invocation {
        Invocation::new(&self.hadoop_bin).arg("fs").args(args)
    }

    async fn test(&self, flag: &str, path: &str) -> Result<bool, DesError> {
        let run = self.runner.run(&self.fs(["-test", flag, path])).await?;
        Ok(run.succeeded())
    }
}

#[async_trait]
impl HadoopFs for HadoopCli {
    async fn exists(&self, path: &str) -> Result<bool, DesError> {
        self.test("-e", path).await
    }

    async fn is_dir(&self, path: &str) -> Result<bool, DesError> {
        self.test("-d", path).await
    }

    async fn list(&self, path: &str) -> Result<Vec<HdfsEntry>, DesError> {
        let run = self.runner.run(&self.fs(["-ls", path])).await?;
        if !run.succeeded() {
            return Err(DesError::FileSystem(format!(
                "Listing {path} failed: {}",
                run.log.trim()
            )));
        }
        parse_listing(&run.log)
    }

    async fn du(&self, path: &str) -> Result<u64, DesError> {
        let size_error = |reason: String| DesError::SizeComputation {
            path: path.to_string(),
            reason,
        };

        let run = self.runner.run(&self.fs(["-du", "-s", path])).await?;
        if let Some(signature) = detect_transfer_failure(&run.log) {
            return Err(size_error(format!("`hadoop fs -du` reported `{signature}`")));
        }

        let size = run
            .log
            .split_whitespace()
            .next()
            .ok_or_else(|| size_error("`hadoop fs -du` produced no output".to_string()))?;
        let size = size
            .parse()
            .map_err(|_| size_error(format!("unexpected `hadoop fs -du` output: {size}")))?;

        debug!(path = %path, size, "Computed HDFS size");
        Ok(size)
    }

    async fn remove_recursive(&self, path: &str) -> Result<(), DesError> {
        let run = self
            .runner
            .run(&self.fs(["-rm", "-r", "-skipTrash", path]))
            .await?;
        if run.log.starts_with(DELETE_KEY) {
            debug!(path = %path, "Deleted HDFS directory");
            Ok(())
        } else {
            Err(DesError::FileSystem(format!(
                "Directory delete failed: {}",
                run.log.trim()
            )))
        }
    }
}

/// Parse `hadoop fs -ls` output:
///
/// ```text
/// Found 2 items
/// drwxr-xr-x   - etl hadoop          0 2024-01-01 12:00 /data/a/sub
/// -rw-r--r--   3 etl hadoop        100 2024-01-01 12:00 /data/a/f1
/// ```
fn parse_listing(log: &str) -> Result<Vec<HdfsEntry>, DesError> {
    log.lines()
        .filter(|line| !line.trim().is_empty() && !line.starts_with("Found "))
        .map(|line| {
            let fields: Vec<&str> = line.split_whitespace().collect();
            if fields.len() < 8 {
                return Err(DesError::FileSystem(format!(
                    "Unexpected listing line: {line}"
                )));
            }
            let size = fields[4].parse().map_err(|_| {
                DesError::FileSystem(format!("Unexpected size in listing line: {line}"))
            })?;
            Ok(HdfsEntry {
                path: fields[7..].join(" "),
                is_dir: fields[0].starts_with('d'),
                size,
            })
        })
        .collect()
}
