//! Wiring of the transfer and export engines to their real collaborators

use std::sync::Arc;

use crate::config::ToolsConfig;
use crate::hadoop::{HadoopCli, HadoopFs};
use crate::process::{ProcessRunner, TokioProcessRunner};
use crate::sqoop::SqoopExport;
use crate::storage::{S3ObjectStoreFactory, StorageConfig};
use crate::transfer::HdfsToS3Pipeline;

/// Both engines, sharing one process runner and HDFS client.
#[derive(Debug, Clone)]
pub struct Engines {
    pub transfers: Arc<HdfsToS3Pipeline>,
    pub exports: Arc<SqoopExport>,
}

impl Engines {
    /// Engines driving the local `hadoop` and `sqoop` binaries and S3.
    pub fn from_config(tools: &ToolsConfig, storage: &StorageConfig) -> Self {
        let runner: Arc<dyn ProcessRunner> = Arc::new(TokioProcessRunner);
        let fs: Arc<dyn HadoopFs> = Arc::new(HadoopCli::new(&tools.hadoop_bin, runner.clone()));
        let stores = Arc::new(S3ObjectStoreFactory::new(storage.clone()));

        Self {
            transfers: Arc::new(HdfsToS3Pipeline::new(
                fs.clone(),
                runner.clone(),
                stores,
                tools.transfer_settings(),
            )),
            exports: Arc::new(SqoopExport::new(fs, runner, &tools.sqoop_bin)),
        }
    }
}
