//! Backend reachability check for `shv status`

use anyhow::{Context, Result};
use opendal::Operator;
use std::time::{Duration, Instant};

/// Outcome of a successful health check
#[derive(Debug, Clone)]
pub struct StorageHealth {
    /// Backend scheme reported by OpenDAL (`s3`, `fs`, `memory`)
    pub scheme: String,
    /// Round trip of one root listing
    pub latency: Duration,
}

/// List the backend root once and time it.
pub async fn check_health(op: &Operator) -> Result<StorageHealth> {
    let started = Instant::now();
    op.list("/")
        .await
        .context("storage health check failed")?;
    let health = StorageHealth {
        scheme: op.info().scheme().to_string(),
        latency: started.elapsed(),
    };
    tracing::debug!(scheme = %health.scheme, latency_ms = health.latency.as_millis() as u64, "storage reachable");
    Ok(health)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn memory_backend_reports_scheme() {
        let op = Operator::new(opendal::services::Memory::default())
            .unwrap()
            .finish();
        let health = check_health(&op).await.unwrap();
        assert_eq!(health.scheme, "memory");
    }

    #[tokio::test]
    async fn fs_backend_with_fragments_is_healthy() {
        let tmp = tempfile::TempDir::new().unwrap();
        let op = Operator::new(opendal::services::Fs::default().root(&tmp.path().to_string_lossy()))
            .unwrap()
            .finish();
        op.write("fragments/a/000000", vec![1u8; 41]).await.unwrap();
        let health = check_health(&op).await.unwrap();
        assert_eq!(health.scheme, "fs");
    }
}
