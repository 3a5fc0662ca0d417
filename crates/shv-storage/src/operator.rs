//! OpenDAL Operator factory for shardvault storage backends

use anyhow::{Context, Result};
use opendal::Operator;
use shv_core::config::{StorageBackend, StorageConfig};

/// Minimal settings needed to build an S3 operator
#[derive(Debug, Clone)]
pub struct S3Settings {
    pub endpoint: String,
    pub region: String,
    pub bucket: String,
    pub access_key_id: String,
    pub secret_access_key: String,
}

/// Build an OpenDAL Operator for any S3-compatible endpoint
///
/// Uses path-style addressing (default in opendal 0.55), which SeaweedFS and
/// MinIO require.
pub fn build_operator(cfg: &S3Settings) -> Result<Operator> {
    let builder = opendal::services::S3::default()
        .endpoint(&cfg.endpoint)
        .region(&cfg.region)
        .bucket(&cfg.bucket)
        .access_key_id(&cfg.access_key_id)
        .secret_access_key(&cfg.secret_access_key);

    let op = Operator::new(builder)
        .context("creating OpenDAL S3 operator")?
        .layer(opendal::layers::LoggingLayer::default())
        .layer(
            opendal::layers::RetryLayer::new()
                .with_max_times(5)
                .with_jitter(),
        )
        .finish();

    Ok(op)
}

/// Build an operator from the `[storage]` config section.
///
/// `credentials` is `(access_key_id, secret_access_key)` and is required for
/// the S3 backend only. An HTTP endpoint is an error when `enforce_tls` is
/// set and a warning otherwise.
pub fn build_from_core_config(
    storage: &StorageConfig,
    credentials: Option<(&str, &str)>,
) -> Result<Operator> {
    match storage.backend {
        StorageBackend::S3 => {
            if storage.endpoint.starts_with("http://") {
                if storage.enforce_tls {
                    anyhow::bail!(
                        "S3 endpoint uses plaintext HTTP ({}), but enforce_tls is enabled. \
                         Use an HTTPS endpoint or set storage.enforce_tls = false for local development.",
                        storage.endpoint
                    );
                }
                tracing::warn!(
                    endpoint = %storage.endpoint,
                    "S3 endpoint uses plaintext HTTP; fragments are encrypted but credentials are not"
                );
            }

            let (access_key_id, secret_access_key) =
                credentials.context("S3 backend requires AWS_ACCESS_KEY_ID and AWS_SECRET_ACCESS_KEY")?;

            build_operator(&S3Settings {
                endpoint: storage.endpoint.clone(),
                region: storage.region.clone(),
                bucket: storage.bucket.clone(),
                access_key_id: access_key_id.to_string(),
                secret_access_key: secret_access_key.to_string(),
            })
        }
        StorageBackend::Fs => {
            let root = storage.root.to_string_lossy();
            let op = Operator::new(opendal::services::Fs::default().root(&root))
                .with_context(|| format!("creating OpenDAL fs operator at {root}"))?
                .layer(opendal::layers::LoggingLayer::default())
                .finish();
            Ok(op)
        }
        StorageBackend::Memory => {
            tracing::warn!("memory storage backend selected; fragments are lost on exit");
            Ok(Operator::new(opendal::services::Memory::default())
                .context("creating OpenDAL memory operator")?
                .finish())
        }
    }
}
