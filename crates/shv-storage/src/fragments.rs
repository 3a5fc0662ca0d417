//! Object-store capability for encrypted fragments

use anyhow::{Context, Result};
use opendal::Operator;
use shv_core::Locator;
use std::future::Future;
use std::sync::Arc;

/// Named-blob storage consumed by the vault.
///
/// `put` must be durable once it returns `Ok`, and `get` must return exactly
/// the bytes that were stored.
pub trait FragmentStore: Send + Sync {
    /// Store `bytes` under `name`, returning a locator for later access.
    fn put(&self, name: &str, bytes: Vec<u8>) -> impl Future<Output = Result<Locator>> + Send;

    /// Fetch the bytes behind a locator.
    fn get(&self, locator: &Locator) -> impl Future<Output = Result<Vec<u8>>> + Send;

    /// Remove the blob behind a locator.
    fn delete(&self, locator: &Locator) -> impl Future<Output = Result<()>> + Send;

    /// Locator to use for reads; stores whose read and write endpoints
    /// differ override this.
    fn retrieve_locator(&self, locator: &Locator) -> Locator {
        locator.clone()
    }
}

impl<T: FragmentStore> FragmentStore for Arc<T> {
    fn put(&self, name: &str, bytes: Vec<u8>) -> impl Future<Output = Result<Locator>> + Send {
        (**self).put(name, bytes)
    }

    fn get(&self, locator: &Locator) -> impl Future<Output = Result<Vec<u8>>> + Send {
        (**self).get(locator)
    }

    fn delete(&self, locator: &Locator) -> impl Future<Output = Result<()>> + Send {
        (**self).delete(locator)
    }

    fn retrieve_locator(&self, locator: &Locator) -> Locator {
        (**self).retrieve_locator(locator)
    }
}

/// Fragment store backed by any OpenDAL operator (S3, fs, memory).
///
/// The locator is the object key.
#[derive(Clone)]
pub struct OpendalFragmentStore {
    op: Operator,
}

impl OpendalFragmentStore {
    pub fn new(op: Operator) -> Self {
        Self { op }
    }

    pub fn operator(&self) -> &Operator {
        &self.op
    }
}

impl FragmentStore for OpendalFragmentStore {
    async fn put(&self, name: &str, bytes: Vec<u8>) -> Result<Locator> {
        self.op
            .write(name, bytes)
            .await
            .with_context(|| format!("uploading fragment: {name}"))?;
        Ok(Locator::new(name))
    }

    async fn get(&self, locator: &Locator) -> Result<Vec<u8>> {
        let buf = self
            .op
            .read(locator.as_str())
            .await
            .with_context(|| format!("downloading fragment: {locator}"))?;
        Ok(buf.to_vec())
    }

    async fn delete(&self, locator: &Locator) -> Result<()> {
        self.op
            .delete(locator.as_str())
            .await
            .with_context(|| format!("deleting fragment: {locator}"))
    }
}
