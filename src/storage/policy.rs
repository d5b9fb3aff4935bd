// Concurrency contracts for reading, writing and deleting object content
use bytes::Bytes;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::storage::operations::{Deleter, StoreDeleter};
use crate::storage::read::ReadHandle;
use crate::storage::store::ObjectStore;
use crate::storage::utils::error::store_error;

/// How reads of a key behave when another writer updates it concurrently.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum IoPolicy {
    /// Last writer wins; every fetch sees the latest generation.
    #[default]
    Unsafe,
    /// A read handle pins the first generation it observes and fails with
    /// [`Error::ConcurrentModification`] once the object moves past it.
    GenerationMatch,
}

impl IoPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            IoPolicy::Unsafe => "unsafe",
            IoPolicy::GenerationMatch => "generation-match",
        }
    }

    /// Upload `data` as the full content of `key`, overwriting unconditionally.
    pub async fn write<S: ObjectStore>(&self, store: &Arc<S>, key: &str, data: Bytes) -> Result<()> {
        log::debug!("write key={key} bytes={} policy={self}", data.len());
        store
            .put_content(key, data)
            .await
            .map_err(|e| store_error(store.bucket(), key, None, e))
    }

    /// Open a lazily materialized read handle on `key`.
    pub fn read<S: ObjectStore>(&self, store: &Arc<S>, key: &str) -> ReadHandle<S> {
        let pin = matches!(self, IoPolicy::GenerationMatch);
        ReadHandle::new(store.clone(), key, pin)
    }

    /// Remove `key` and every key below it.
    pub async fn delete<S: ObjectStore>(&self, store: &Arc<S>, key: &str) -> Result<usize> {
        StoreDeleter::new(store.clone()).delete(key).await
    }
}

impl fmt::Display for IoPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for IoPolicy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "unsafe" => Ok(IoPolicy::Unsafe),
            "generation-match" | "generation_match" => Ok(IoPolicy::GenerationMatch),
            _ => Err(Error::InvalidConfig {
                key: "io_policy".to_string(),
                value: s.to_string(),
            }),
        }
    }
}
