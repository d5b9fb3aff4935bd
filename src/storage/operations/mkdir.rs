// Directory creation through empty marker objects
use bytes::Bytes;
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::storage::constants::SEPARATOR;
use crate::storage::operations::exists::{BucketState, Prober, StoreProber};
use crate::storage::store::{ObjectStore, StoreErrorKind};
use crate::storage::utils::error::store_error;
use crate::storage::utils::path::{components, directory_key};

/// Trait for creating directories in flat object storage.
pub trait Mkdirer {
    /// Create a directory and all of its ancestors.
    ///
    /// # Arguments
    /// * `key` - Normalized object key of the directory, without trailing separator
    async fn create_directories(&self, key: &str) -> Result<()>;
}

/// Implementation of Mkdirer for any [`ObjectStore`].
pub struct StoreMkdirer<S> {
    store: Arc<S>,
    prober: StoreProber<S>,
    bucket_state: Arc<BucketState>,
    create_bucket: bool,
}

impl<S: ObjectStore> StoreMkdirer<S> {
    pub fn new(
        store: Arc<S>,
        prober: StoreProber<S>,
        bucket_state: Arc<BucketState>,
        create_bucket: bool,
    ) -> Self {
        Self {
            store,
            prober,
            bucket_state,
            create_bucket,
        }
    }

    /// Create the bucket if it is missing. Only allowed when bucket
    /// management was enabled for this adapter.
    pub async fn ensure_bucket(&self) -> Result<()> {
        if !self.create_bucket {
            return Err(Error::BucketManagementNotAllowed {
                bucket: self.store.bucket().to_string(),
                action: "Create".to_string(),
            });
        }
        if self.prober.bucket_exists().await? {
            return Ok(());
        }

        match self.store.create_bucket().await {
            Ok(()) => log::debug!("created bucket {}", self.store.bucket()),
            // created concurrently by someone else
            Err(e) if e.kind() == StoreErrorKind::AlreadyExists => {}
            Err(e) => return Err(store_error(self.store.bucket(), "", None, e)),
        }
        self.bucket_state.mark_exists();
        Ok(())
    }
}

impl<S: ObjectStore> Mkdirer for StoreMkdirer<S> {
    async fn create_directories(&self, key: &str) -> Result<()> {
        if self.create_bucket {
            self.ensure_bucket().await?;
        }

        let mut current = String::new();
        for component in components(key) {
            if !current.is_empty() {
                current.push(SEPARATOR);
            }
            current.push_str(&component);

            // rewriting an existing marker leaves it an empty object
            let marker = directory_key(&current);
            self.store
                .put_content(&marker, Bytes::new())
                .await
                .map_err(|e| store_error(self.store.bucket(), &marker, None, e))?;
        }
        Ok(())
    }
}
