// Existence checks for buckets, directories and files
use std::sync::{Arc, Mutex, PoisonError};

use crate::error::Result;
use crate::storage::constants::{PREFIX_PROBE_PAGE_SIZE, SEPARATOR};
use crate::storage::store::{ListPage, ListRequest, ObjectStore, StoreErrorKind, StoreResult};
use crate::storage::utils::error::store_error;

/// Cached outcome of the bucket existence check.
///
/// Only a positive answer is remembered: buckets may be created out-of-band,
/// so a negative answer is re-checked on the next call.
#[derive(Debug, Default)]
pub struct BucketState {
    exists: Mutex<bool>,
}

impl BucketState {
    pub fn is_known_to_exist(&self) -> bool {
        *self.exists.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn mark_exists(&self) {
        *self.exists.lock().unwrap_or_else(PoisonError::into_inner) = true;
    }

    pub fn forget(&self) {
        *self.exists.lock().unwrap_or_else(PoisonError::into_inner) = false;
    }
}

/// Trait for existence queries against flat object storage.
pub trait Prober {
    /// Whether the bucket exists.
    async fn bucket_exists(&self) -> Result<bool>;

    /// Whether `dir_key` is a directory.
    ///
    /// # Arguments
    /// * `dir_key` - Directory key with a trailing separator, or the empty key
    ///   for the bucket root
    async fn is_directory(&self, dir_key: &str) -> Result<bool>;

    /// Whether an object exists at exactly `key`. Keys with a trailing
    /// separator are never files.
    async fn is_file(&self, key: &str) -> Result<bool>;
}

/// Implementation of Prober for any [`ObjectStore`].
pub struct StoreProber<S> {
    store: Arc<S>,
    bucket_state: Arc<BucketState>,
}

impl<S: ObjectStore> StoreProber<S> {
    pub fn new(store: Arc<S>, bucket_state: Arc<BucketState>) -> Self {
        Self {
            store,
            bucket_state,
        }
    }

    /// Check if any key starts with `prefix`, using a one-entry delimited listing.
    ///
    /// Not every directory has a marker in the store (e.g. when content was
    /// copied in with a bulk tool), so any key below the prefix counts.
    pub async fn prefix_exists(&self, prefix: &str) -> Result<bool> {
        match self.probe(prefix).await {
            Ok(page) => Ok(!page.entries.is_empty()),
            Err(e) if e.kind() == StoreErrorKind::NotFound => Ok(false),
            Err(e) => Err(store_error(self.store.bucket(), prefix, None, e)),
        }
    }

    /// Check for an explicit empty marker object at `dir_key`.
    pub async fn marker_exists(&self, dir_key: &str) -> Result<bool> {
        Ok(self.object_size(dir_key).await? == Some(0))
    }

    /// Size of the object at exactly `key`; a missing bucket holds no objects.
    async fn object_size(&self, key: &str) -> Result<Option<u64>> {
        match self.store.get_metadata(key).await {
            Ok(meta) => Ok(meta.map(|m| m.size)),
            Err(e) if e.kind() == StoreErrorKind::NotFound => Ok(None),
            Err(e) => Err(store_error(self.store.bucket(), key, None, e)),
        }
    }
}

impl<S> Clone for StoreProber<S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            bucket_state: self.bucket_state.clone(),
        }
    }
}

impl<S: ObjectStore> Prober for StoreProber<S> {
    async fn bucket_exists(&self) -> Result<bool> {
        if self.bucket_state.is_known_to_exist() {
            return Ok(true);
        }

        let exists = match self.store.bucket_exists().await {
            Ok(exists) => exists,
            // a credential may list objects without being allowed to read bucket metadata
            Err(e) if e.kind() == StoreErrorKind::PermissionDenied => {
                log::debug!(
                    "bucket_exists bucket={} falling back to listing: {e}",
                    self.store.bucket()
                );
                // an answered listing, even an empty one, proves the bucket exists
                match self.probe("").await {
                    Ok(_) => true,
                    Err(e) if e.kind() == StoreErrorKind::NotFound => false,
                    Err(e) => return Err(store_error(self.store.bucket(), "", None, e)),
                }
            }
            Err(e) => return Err(store_error(self.store.bucket(), "", None, e)),
        };

        if exists {
            self.bucket_state.mark_exists();
        }
        Ok(exists)
    }

    async fn is_directory(&self, dir_key: &str) -> Result<bool> {
        // the root existing is equivalent to the bucket existing
        if dir_key.is_empty() {
            return self.bucket_exists().await;
        }
        if self.prefix_exists(dir_key).await? {
            return Ok(true);
        }
        self.marker_exists(dir_key).await
    }

    async fn is_file(&self, key: &str) -> Result<bool> {
        if key.is_empty() || key.ends_with(SEPARATOR) {
            return Ok(false);
        }
        Ok(self.object_size(key).await?.is_some())
    }
}

impl<S: ObjectStore> StoreProber<S> {
    async fn probe(&self, prefix: &str) -> StoreResult<ListPage> {
        let request = ListRequest {
            prefix: prefix.to_string(),
            delimiter: Some(SEPARATOR),
            page_size: PREFIX_PROBE_PAGE_SIZE,
        };
        self.store.list_page(&request, None).await
    }
}
