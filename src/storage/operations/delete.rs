// Deletion of objects and whole key hierarchies
use std::sync::Arc;

use crate::error::Result;
use crate::storage::constants::{DELETE_PAGE_SIZE, SEPARATOR};
use crate::storage::store::{ListRequest, ObjectStore, StoreErrorKind};
use crate::storage::utils::error::store_error;
use crate::storage::utils::path::ensure_trailing_slash;

/// Trait for deleting keys from flat object storage.
pub trait Deleter {
    /// Delete `key` and everything below it.
    ///
    /// A key without a trailing separator is deleted as an object first; all
    /// keys under `key` plus the separator are then removed page by page.
    /// Directory markers go last, deepest first, so stores that keep real
    /// directories never see a parent removed before its children.
    /// The empty key clears the whole bucket.
    ///
    /// # Returns
    /// * `Result<usize>` - Number of objects removed
    async fn delete(&self, key: &str) -> Result<usize>;
}

/// Implementation of Deleter for any [`ObjectStore`].
pub struct StoreDeleter<S> {
    store: Arc<S>,
}

impl<S: ObjectStore> StoreDeleter<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    async fn delete_one(&self, key: &str) -> Result<bool> {
        match self.store.delete_object(key).await {
            Ok(removed) => Ok(removed),
            Err(e) if e.kind() == StoreErrorKind::NotFound => Ok(false),
            Err(e) => Err(store_error(self.store.bucket(), key, None, e)),
        }
    }

    /// Delete a batch of keys, one by one when the store has no batch call.
    async fn delete_batch(&self, keys: &[String], batch_supported: &mut bool) -> Result<usize> {
        if *batch_supported {
            match self.store.delete_objects(keys).await {
                Ok(flags) => return Ok(flags.into_iter().filter(|removed| *removed).count()),
                Err(e) if e.kind() == StoreErrorKind::Unsupported => {
                    log::warn!(
                        "batch delete unavailable on bucket {}, deleting objects one at a time: {e}",
                        self.store.bucket()
                    );
                    *batch_supported = false;
                }
                Err(e) => {
                    let first = keys.first().map(String::as_str).unwrap_or_default();
                    return Err(store_error(self.store.bucket(), first, None, e));
                }
            }
        }

        let mut removed = 0;
        for key in keys {
            if self.delete_one(key).await? {
                removed += 1;
            }
        }
        Ok(removed)
    }
}

impl<S: ObjectStore> Deleter for StoreDeleter<S> {
    async fn delete(&self, key: &str) -> Result<usize> {
        let mut removed = 0;
        let prefix = if key.is_empty() {
            String::new()
        } else {
            if !key.ends_with(SEPARATOR) && self.delete_one(key).await? {
                removed += 1;
            }
            ensure_trailing_slash(key)
        };

        let request = ListRequest {
            prefix: prefix.clone(),
            delimiter: None,
            page_size: DELETE_PAGE_SIZE,
        };
        let mut batch_supported = true;
        let mut markers: Vec<String> = Vec::new();
        let mut token: Option<String> = None;
        loop {
            let page = match self.store.list_page(&request, token.as_deref()).await {
                Ok(page) => page,
                Err(e) if e.kind() == StoreErrorKind::NotFound => break,
                Err(e) => return Err(store_error(self.store.bucket(), &prefix, None, e)),
            };
            let (page_markers, keys): (Vec<String>, Vec<String>) = page
                .entries
                .into_iter()
                .map(|entry| entry.key)
                .partition(|key| key.ends_with(SEPARATOR));
            log::trace!(
                "delete prefix={prefix} page_keys={} page_markers={}",
                keys.len(),
                page_markers.len()
            );
            markers.extend(page_markers);

            // the store rejects empty batches
            if !keys.is_empty() {
                removed += self.delete_batch(&keys, &mut batch_supported).await?;
            }

            match page.next_page_token {
                Some(next) => token = Some(next),
                None => break,
            }
        }

        markers.sort_by_key(|marker| std::cmp::Reverse(marker.matches(SEPARATOR).count()));
        for batch in markers.chunks(DELETE_PAGE_SIZE) {
            removed += self.delete_batch(batch, &mut batch_supported).await?;
        }

        log::debug!("delete key={key} removed={removed}");
        Ok(removed)
    }
}
