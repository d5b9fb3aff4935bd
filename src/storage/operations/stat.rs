use serde::Serialize;
use std::fmt;
use std::sync::Arc;

use crate::error::Result;
use crate::storage::operations::exists::{Prober, StoreProber};
use crate::storage::store::ObjectStore;
use crate::storage::utils::error::store_error;
use crate::storage::utils::path::directory_key;
use crate::storage::utils::size::format_size;

/// What a path is in the emulated hierarchy.
///
/// - `path`: The queried path (as provided by caller)
/// - `key`: The flat object key the path resolves to
/// - `is_file`: An object exists at exactly `key`
/// - `is_directory`: Some key lies below `key`, or a directory marker exists
/// - `size`: Content length of the object, if it is a file
/// - `generation`: Generation of the object, if the store reports one
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PathStat {
    pub path: String,
    pub key: String,
    pub is_file: bool,
    pub is_directory: bool,
    pub size: Option<u64>,
    pub generation: Option<u64>,
}

impl PathStat {
    pub fn exists(&self) -> bool {
        self.is_file || self.is_directory
    }
}

impl fmt::Display for PathStat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match (self.is_file, self.is_directory) {
            (true, true) => "file+dir",
            (true, false) => "file",
            (false, true) => "dir",
            (false, false) => "missing",
        };
        let size = self.size.map(format_size).unwrap_or_else(|| "-".to_string());
        let generation = self
            .generation
            .map(|g| g.to_string())
            .unwrap_or_else(|| "-".to_string());
        write!(
            f,
            "path={} key={} type={kind} size={size} generation={generation}",
            self.path, self.key
        )
    }
}

/// Trait for fetching what a path is.
pub trait Stater {
    /// Inspect `key`, reporting it under the caller's `path`.
    async fn stat(&self, path: &str, key: &str) -> Result<PathStat>;
}

/// Implementation of `Stater` for any [`ObjectStore`].
pub struct StoreStater<S> {
    store: Arc<S>,
    prober: StoreProber<S>,
}

impl<S: ObjectStore> StoreStater<S> {
    pub fn new(store: Arc<S>, prober: StoreProber<S>) -> Self {
        Self { store, prober }
    }
}

impl<S: ObjectStore> Stater for StoreStater<S> {
    async fn stat(&self, path: &str, key: &str) -> Result<PathStat> {
        let meta = if self.prober.is_file(key).await? {
            self.store
                .get_metadata(key)
                .await
                .map_err(|e| store_error(self.store.bucket(), key, None, e))?
        } else {
            None
        };
        let is_directory = self.prober.is_directory(&directory_key(key)).await?;

        Ok(PathStat {
            path: path.to_string(),
            key: key.to_string(),
            is_file: meta.is_some(),
            is_directory,
            size: meta.map(|m| m.size),
            generation: meta.and_then(|m| m.generation),
        })
    }
}
