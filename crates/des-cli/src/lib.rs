//! DES CLI Library
//!
//! Runs a single transfer or export request against the local Hadoop
//! toolchain, without going through the HTTP service.
//!
//! # Overview
//!
//! - **HDFS to S3**: `des transfer --request transfer.json`
//! - **Database to HDFS**: `des export --request export.json`
//!
//! Request files use the same JSON bodies the `/dataexportservice/export`
//! endpoint accepts, minus `export_type`. The resulting status document is
//! printed to stdout.

pub mod commands;
pub mod error;

pub use error::{CliError, Result};

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// DES - Data Export Service command-line runner
#[derive(Parser, Debug)]
#[command(name = "des")]
#[command(author, version, about, long_about = None)]
#[command(arg_required_else_help = true)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Hadoop launcher used for `fs` and `distcp`
    #[arg(long, env = "DES_HADOOP_BIN", global = true)]
    pub hadoop_bin: Option<String>,

    /// Sqoop launcher used for exports
    #[arg(long, env = "DES_SQOOP_BIN", global = true)]
    pub sqoop_bin: Option<String>,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Copy HDFS files or directories to S3 with distcp
    Transfer {
        /// JSON file holding an hdfsToS3 request
        #[arg(short, long)]
        request: PathBuf,
    },

    /// Import a database table into HDFS with sqoop
    Export {
        /// JSON file holding a dbexport request
        #[arg(short, long)]
        request: PathBuf,
    },
}
