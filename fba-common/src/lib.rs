//! # FBA Common Library
//!
//! Shared code for the floorball awards voting services:
//! - Error type and storage error classification
//! - Retry combinator for transient storage contention
//! - Configuration loading and root folder resolution
//! - Database initialization and monitored transactions
//! - Time helpers

pub mod config;
pub mod db;
pub mod error;
pub mod retry;
pub mod time;

pub use error::{Error, ErrorKind, Result};
pub use retry::{with_retry, RetryExhausted, RetryPolicy, Retryable};
