//! Developer code-change metrics.
//!
//! Snapshots of commits are validated ([`validate`]), turned into developers
//! and metrics ([`transform`]) and merged without duplicates into a
//! [`repository::Repository`], which persists through [`storage::Storage`]
//! onto any [`store::KeyValueStore`]. [`metrics`] holds the pure statistics.

pub mod cli;
pub mod commands;
pub mod error;
pub mod git;
pub mod logging;
pub mod metrics;
pub mod model;
pub mod repository;
pub mod sample;
pub mod storage;
pub mod store;
pub mod transform;
pub mod util;
pub mod validate;

pub use error::{DevMetricsError, Result};
pub use model::{CodeMetric, CommitData, DateRange, Developer, DeveloperDataset, SnapshotData};
pub use repository::{ImportOutcome, Repository, RepositoryConfig};
pub use storage::Storage;
pub use store::{KeyValueStore, SqliteStore};
