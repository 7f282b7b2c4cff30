//! DES Common Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Shared types, logging, and error handling for the Data Export Service.
//!
//! # Overview
//!
//! This crate provides common functionality used across all DES workspace members:
//!
//! - **Error Handling**: The `DesError` taxonomy shared by every transfer stage
//! - **Logging**: Centralized `tracing` subscriber setup
//! - **Types**: Request and status structures exchanged with callers
//!
//! # Example
//!
//! ```no_run
//! use des_common::types::{TransferRequest, TransferStatus};
//!
//! let request: TransferRequest = serde_json::from_str(r#"{
//!     "source_path": "/data/a",
//!     "target_path": "s3://bucket/a",
//!     "file_list": ["f1"],
//!     "s3_credentials": {
//!         "aws_access_key_id": "AKIA",
//!         "aws_secret_access_key": "secret",
//!         "aes_encryption_enabled": "n"
//!     }
//! }"#).unwrap();
//! assert_eq!(request.source_path, "/data/a");
//! let _failed = TransferStatus::failed();
//! ```

pub mod error;
pub mod logging;
pub mod types;

// Re-export commonly used types
pub use error::{Cancelled, DesError, Result};
