//! DES Server Library
//!
//! Managed data movement driven by external command-line tools.
//!
//! # Overview
//!
//! Two kinds of jobs are supported, each started by one request and
//! answered with one terminal status:
//!
//! - **`hdfsToS3`**: copies files or directories from HDFS to S3 with
//!   `hadoop distcp`, verifies every copy by size and rolls back the objects
//!   written so far when any file fails ([`transfer`])
//! - **`dbexport`**: imports a relational table into HDFS with
//!   `sqoop import`, rerunning once when the target directory already
//!   exists ([`sqoop`])
//!
//! The tools report their outcome through their output, so every run is
//! captured in full ([`process`]) and judged by its text ([`classify`]).
//!
//! # Architecture
//!
//! The engines only talk to their collaborators through traits:
//!
//! - [`process::ProcessRunner`] launches commands built by [`command`]
//! - [`hadoop::HadoopFs`] answers HDFS questions
//! - [`storage::ObjectStore`] lists and deletes S3 objects, created per
//!   request from the request's credentials by a
//!   [`storage::ObjectStoreFactory`]
//!
//! The `testing` module, behind the `testing` feature, provides in-memory
//! implementations of all three.
//!
//! # Example
//!
//! ```no_run
//! use des_server::{api, config::Config, engines::Engines};
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load()?;
//!     let engines = Engines::from_config(&config.tools, &config.storage);
//!     let state = api::AppState::new(engines, CancellationToken::new());
//!     let app = api::create_router(state, config.auth.clone());
//!
//!     let listener = tokio::net::TcpListener::bind("127.0.0.1:8000").await?;
//!     axum::serve(listener, app).await?;
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod classify;
pub mod command;
pub mod config;
pub mod engines;
pub mod error;
pub mod hadoop;
pub mod middleware;
pub mod process;
pub mod sqoop;
pub mod storage;
#[cfg(any(test, feature = "testing"))]
pub mod testing;
pub mod transfer;

// Re-export commonly used types
pub use error::AppError;
