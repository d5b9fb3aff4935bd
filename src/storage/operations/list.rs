// Listing of directory children over delimited prefix listings
use std::collections::HashSet;
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::storage::constants::{LIST_PAGE_SIZE, SEPARATOR};
use crate::storage::operations::exists::{Prober, StoreProber};
use crate::storage::store::{ListRequest, ObjectStore};
use crate::storage::utils::error::store_error;

/// Trait for listing the children of a directory.
pub trait Lister {
    /// List the names of the direct children of a directory.
    ///
    /// # Arguments
    /// * `dir_key` - Directory key with a trailing separator, or the empty key
    ///   for the bucket root
    /// * `only_directories` - Whether to keep only children that are directories
    ///
    /// # Returns
    /// * `Result<Vec<String>>` - Distinct child names in listing order
    async fn list(&self, dir_key: &str, only_directories: bool) -> Result<Vec<String>>;
}

/// Implementation of Lister for any [`ObjectStore`].
pub struct StoreLister<S> {
    store: Arc<S>,
    prober: StoreProber<S>,
}

impl<S: ObjectStore> StoreLister<S> {
    pub fn new(store: Arc<S>, prober: StoreProber<S>) -> Self {
        Self { store, prober }
    }

    fn not_a_group(dir_key: &str) -> Error {
        Error::NotAGroup {
            path: dir_key.trim_end_matches(SEPARATOR).to_string(),
        }
    }
}

impl<S: ObjectStore> Lister for StoreLister<S> {
    async fn list(&self, dir_key: &str, only_directories: bool) -> Result<Vec<String>> {
        if !self.prober.is_directory(dir_key).await? {
            return Err(Self::not_a_group(dir_key));
        }

        let request = ListRequest {
            prefix: dir_key.to_string(),
            delimiter: Some(SEPARATOR),
            page_size: LIST_PAGE_SIZE,
        };

        let mut children = Vec::new();
        let mut seen = HashSet::new();
        let mut listed = 0usize;
        let mut token: Option<String> = None;
        loop {
            let page = self
                .store
                .list_page(&request, token.as_deref())
                .await
                .map_err(|e| store_error(self.store.bucket(), dir_key, None, e))?;
            log::trace!(
                "list prefix={dir_key} page_entries={} more={}",
                page.entries.len(),
                page.next_page_token.is_some()
            );
            listed += page.entries.len();

            for entry in page.entries {
                // the directory marker itself is not a child
                if entry.key == dir_key {
                    continue;
                }
                let is_dir = entry.key.ends_with(SEPARATOR);
                if only_directories && !is_dir {
                    continue;
                }
                let Some(child) = entry.key.strip_prefix(dir_key) else {
                    continue;
                };
                let name = child.trim_end_matches(SEPARATOR);
                if !name.is_empty() && seen.insert(name.to_string()) {
                    children.push(name.to_string());
                }
            }

            match page.next_page_token {
                Some(next) => token = Some(next),
                None => break,
            }
        }

        // the directory may have vanished between the check and the listing
        if listed == 0 && !dir_key.is_empty() && !self.prober.marker_exists(dir_key).await? {
            return Err(Self::not_a_group(dir_key));
        }
        Ok(children)
    }
}
