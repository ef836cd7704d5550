//! Durable storage for the ranking core.
//!
//! Handles reading and writing to the local data directory:
//! - The append-only result ledger (JSONL, source of truth)
//! - Player profile snapshots consumed from the profile service
//!
//! Aggregates and the leaderboard cache are never stored separately; they
//! ride along in each ledger line and are rebuilt by replay on startup.

mod jsonl;
mod ledger;
mod profiles;

pub use jsonl::*;
pub use ledger::*;
pub use profiles::*;

use std::path::PathBuf;
use std::time::{Duration, Instant};
use thiserror::Error;

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Storage call timed out after {0:?}")]
    Timeout(Duration),

    #[error("Storage task failed: {0}")]
    Task(String),
}

/// Configuration for storage paths.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub data_dir: PathBuf,
}

impl StorageConfig {
    pub fn new(data_dir: PathBuf) -> Self {
        Self { data_dir }
    }

    pub fn ledger_dir(&self) -> PathBuf {
        self.data_dir.join("ledger")
    }

    pub fn profiles_dir(&self) -> PathBuf {
        self.data_dir.join("profiles")
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self::new(PathBuf::from("./data"))
    }
}

/// Latest moment a write may start.
///
/// Stores check it right before their commit point. Once a write has
/// started it runs to completion and reports its real outcome.
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    at: Instant,
    limit: Duration,
}

impl Deadline {
    /// A deadline `limit` from now.
    pub fn after(limit: Duration) -> Self {
        Self {
            at: Instant::now() + limit,
            limit,
        }
    }

    /// Fail with [`StorageError::Timeout`] once the deadline has passed.
    pub fn check(&self) -> Result<(), StorageError> {
        if Instant::now() >= self.at {
            return Err(StorageError::Timeout(self.limit));
        }
        Ok(())
    }

    pub fn limit(&self) -> Duration {
        self.limit
    }

    /// The deadline on tokio's clock, for `timeout_at`.
    pub fn instant(&self) -> tokio::time::Instant {
        tokio::time::Instant::from_std(self.at)
    }
}

/// Await a storage call, failing with [`StorageError::Timeout`] past `limit`.
pub async fn with_timeout<T, F>(limit: Duration, fut: F) -> Result<T, StorageError>
where
    F: std::future::Future<Output = Result<T, StorageError>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => Err(StorageError::Timeout(limit)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_config_paths() {
        let config = StorageConfig::new(PathBuf::from("/data"));

        assert_eq!(config.ledger_dir(), PathBuf::from("/data/ledger"));
        assert_eq!(config.profiles_dir(), PathBuf::from("/data/profiles"));
    }

    #[test]
    fn test_storage_config_default() {
        let config = StorageConfig::default();
        assert_eq!(config.data_dir, PathBuf::from("./data"));
    }

    #[test]
    fn test_deadline_check() {
        assert!(Deadline::after(Duration::from_secs(60)).check().is_ok());

        let expired = Deadline::after(Duration::ZERO);
        let err = expired.check().unwrap_err();
        assert!(matches!(err, StorageError::Timeout(d) if d == Duration::ZERO));
    }

    #[tokio::test]
    async fn test_with_timeout_passes_result_through() {
        let value = with_timeout(Duration::from_secs(1), async { Ok::<_, StorageError>(7) })
            .await
            .unwrap();
        assert_eq!(value, 7);
    }

    #[tokio::test]
    async fn test_with_timeout_expires() {
        let err = with_timeout(Duration::from_millis(10), async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok::<_, StorageError>(())
        })
        .await
        .unwrap_err();
        assert!(matches!(err, StorageError::Timeout(_)));
    }
}
