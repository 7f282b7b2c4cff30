//! Post-copy size verification

use des_common::DesError;
use std::collections::HashSet;
use std::future::Future;
use std::pin::Pin;
use tracing::debug;

use crate::hadoop::HadoopFs;
use crate::storage::{ObjectStore, S3Location};

/// A regular file found under a transferred HDFS path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRecord {
    /// Path below the transferred root, without a leading `/`; empty when
    /// the root itself is a file
    pub relative: String,
    pub absolute: String,
    pub size: u64,
}

/// Enumerate the regular files under `root`, depth first.
pub async fn enumerate_source(fs: &dyn HadoopFs, root: &str) -> Result<Vec<FileRecord>, DesError> {
    let mut records = Vec::new();
    if fs.is_dir(root).await? {
        walk(fs, root, root, &mut records).await?;
    } else {
        records.push(FileRecord {
            relative: String::new(),
            absolute: root.to_string(),
            size: fs.du(root).await?,
        });
    }
    debug!(root = %root, files = records.len(), "Enumerated source files");
    Ok(records)
}

fn walk<'a>(
    fs: &'a dyn HadoopFs,
    base: &'a str,
    dir: &'a str,
    records: &'a mut Vec<FileRecord>,
) -> Pin<Box<dyn Future<Output = Result<(), DesError>> + Send + 'a>> {
    Box::pin(async move {
        for entry in fs.list(dir).await? {
            if entry.is_dir {
                walk(fs, base, &entry.path, records).await?;
            } else {
                let relative = entry
                    .path
                    .strip_prefix(base)
                    .unwrap_or(&entry.path)
                    .trim_start_matches('/')
                    .to_string();
                records.push(FileRecord {
                    relative,
                    absolute: entry.path,
                    size: entry.size,
                });
            }
        }
        Ok(())
    })
}

/// Object keys a copy of `records` to `destination_key` produces.
pub fn destination_keys(destination_key: &str, records: &[FileRecord]) -> Vec<String> {
    records
        .iter()
        .map(|record| join_key(destination_key, &record.relative))
        .collect()
}

pub(crate) fn join_key(base: &str, relative: &str) -> String {
    let base = base.trim_end_matches('/');
    match (base.is_empty(), relative.is_empty()) {
        (_, true) => base.to_string(),
        (true, false) => relative.to_string(),
        (false, false) => format!("{base}/{relative}"),
    }
}

/// Total size of the objects at `destination` that belong to this copy.
///
/// Only the destination key itself and the keys in `expected` are counted,
/// so unrelated objects sharing the prefix do not inflate the total.
pub async fn destination_size(
    store: &dyn ObjectStore,
    destination: &S3Location,
    expected: &[String],
) -> Result<u64, DesError> {
    let expected: HashSet<&str> = expected.iter().map(String::as_str).collect();
    let objects = store
        .list_objects(&destination.bucket, &destination.key)
        .await
        .map_err(|err| DesError::SizeComputation {
            path: destination.to_string(),
            reason: err.to_string(),
        })?;

    let size = objects
        .iter()
        .filter(|object| object.key == destination.key || expected.contains(object.key.as_str()))
        .map(|object| object.size)
        .sum();

    debug!(destination = %destination, size, "Computed S3 size");
    Ok(size)
}

/// Compare source and destination totals, returning the verified size.
pub async fn verify(
    fs: &dyn HadoopFs,
    store: &dyn ObjectStore,
    source: &str,
    destination: &S3Location,
    expected: &[String],
) -> Result<u64, DesError> {
    let target_bytes = destination_size(store, destination, expected).await?;
    let source_bytes = fs.du(source).await?;

    if source_bytes != target_bytes {
        return Err(DesError::SizeMismatch {
            path: destination.to_string(),
            source_bytes,
            target_bytes,
        });
    }
    Ok(target_bytes)
}
