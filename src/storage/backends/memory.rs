// In-process object store with per-write generations
use bytes::Bytes;
use futures::StreamExt;
use futures::stream;
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::storage::store::{
    ByteRange, ContentStream, Generation, ListEntry, ListPage, ListRequest, ObjectMetadata,
    ObjectStore, StoreError, StoreErrorKind, StoreResult,
};

/// Content streams are cut into chunks of this size.
const CHUNK_SIZE: usize = 8192;

#[derive(Debug, Clone)]
struct StoredObject {
    data: Bytes,
    generation: Generation,
}

#[derive(Debug, Default)]
struct MemoryState {
    bucket_exists: bool,
    objects: BTreeMap<String, StoredObject>,
    last_generation: Generation,
}

/// A complete object store living in memory.
///
/// Besides backing tests, it can simulate two restricted deployments: a store
/// without batch deletion and a credential that may not read bucket metadata.
/// Missing keys on content reads are reported lazily, by the first stream item.
#[derive(Debug)]
pub struct InMemoryStore {
    bucket: String,
    state: Mutex<MemoryState>,
    batch_delete: bool,
    bucket_metadata_readable: bool,
}

impl InMemoryStore {
    /// Create a store whose bucket already exists.
    pub fn new(bucket: impl Into<String>) -> Self {
        let store = Self::without_bucket(bucket);
        store.lock().bucket_exists = true;
        store
    }

    /// Create a store whose bucket has not been created yet.
    pub fn without_bucket(bucket: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            state: Mutex::new(MemoryState::default()),
            batch_delete: true,
            bucket_metadata_readable: true,
        }
    }

    /// Reject batch deletion as unsupported.
    pub fn without_batch_delete(mut self) -> Self {
        self.batch_delete = false;
        self
    }

    /// Reject bucket metadata lookups with a permission error while still
    /// allowing object listing.
    pub fn deny_bucket_metadata(mut self) -> Self {
        self.bucket_metadata_readable = false;
        self
    }

    /// All stored keys in lexicographic order.
    pub fn keys(&self) -> Vec<String> {
        self.lock().objects.keys().cloned().collect()
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn missing_bucket(&self) -> StoreError {
        StoreError::new(
            StoreErrorKind::NotFound,
            format!("The specified bucket or key does not exist. bucket: {}", self.bucket),
        )
    }

    fn missing_key(&self, key: &str) -> StoreError {
        StoreError::new(
            StoreErrorKind::NotFound,
            format!("No such object: {}/{key}", self.bucket),
        )
    }

    fn checked(&self) -> StoreResult<MutexGuard<'_, MemoryState>> {
        let state = self.lock();
        if state.bucket_exists {
            Ok(state)
        } else {
            Err(self.missing_bucket())
        }
    }
}

fn slice_range(data: &Bytes, range: ByteRange) -> Bytes {
    let len = data.len() as u64;
    let start = range.offset.min(len);
    let end = match range.length {
        Some(length) => start.saturating_add(length).min(len),
        None => len,
    };
    data.slice(start as usize..end as usize)
}

fn into_chunks(data: Bytes) -> Vec<StoreResult<Bytes>> {
    let mut chunks = Vec::with_capacity(data.len() / CHUNK_SIZE + 1);
    let mut offset = 0;
    while offset < data.len() {
        let end = (offset + CHUNK_SIZE).min(data.len());
        chunks.push(Ok(data.slice(offset..end)));
        offset = end;
    }
    chunks
}

impl ObjectStore for InMemoryStore {
    fn bucket(&self) -> &str {
        &self.bucket
    }

    async fn get_metadata(&self, key: &str) -> StoreResult<Option<ObjectMetadata>> {
        let state = self.checked()?;
        Ok(state.objects.get(key).map(|object| ObjectMetadata {
            size: object.data.len() as u64,
            generation: Some(object.generation),
        }))
    }

    async fn get_content(
        &self,
        key: &str,
        range: ByteRange,
        generation: Option<Generation>,
    ) -> StoreResult<ContentStream> {
        let state = self.checked()?;
        let object = match (state.objects.get(key), generation) {
            (Some(object), Some(expected)) if object.generation != expected => {
                return Err(StoreError::new(
                    StoreErrorKind::PreconditionFailed,
                    format!(
                        "Generation mismatch for {}/{key}: expected {expected}, found {}",
                        self.bucket, object.generation
                    ),
                ));
            }
            (Some(object), _) => object.clone(),
            (None, Some(_)) => return Err(self.missing_key(key)),
            (None, None) => {
                let err = self.missing_key(key);
                return Ok(stream::iter(vec![Err(err)]).boxed());
            }
        };

        let chunks = into_chunks(slice_range(&object.data, range));
        Ok(stream::iter(chunks).boxed())
    }

    async fn put_content(&self, key: &str, data: Bytes) -> StoreResult<()> {
        let mut state = self.checked()?;
        state.last_generation += 1;
        let generation = state.last_generation;
        state
            .objects
            .insert(key.to_string(), StoredObject { data, generation });
        Ok(())
    }

    async fn delete_object(&self, key: &str) -> StoreResult<bool> {
        let mut state = self.checked()?;
        Ok(state.objects.remove(key).is_some())
    }

    async fn delete_objects(&self, keys: &[String]) -> StoreResult<Vec<bool>> {
        if !self.batch_delete {
            return Err(StoreError::new(
                StoreErrorKind::Unsupported,
                "batch delete is not available",
            ));
        }
        let mut state = self.checked()?;
        Ok(keys
            .iter()
            .map(|key| state.objects.remove(key).is_some())
            .collect())
    }

    async fn list_page(
        &self,
        request: &ListRequest,
        page_token: Option<&str>,
    ) -> StoreResult<ListPage> {
        let state = self.checked()?;
        let prefix = request.prefix.as_str();
        let page_size = request.page_size.max(1);

        let mut page = ListPage::default();
        for (key, object) in state.objects.range(prefix.to_string()..) {
            if !key.starts_with(prefix) {
                break;
            }

            let grouped = request.delimiter.and_then(|delimiter| {
                key[prefix.len()..]
                    .find(delimiter)
                    .map(|idx| prefix.len() + idx + delimiter.len_utf8())
            });
            let entry = match grouped {
                Some(end) => ListEntry {
                    key: key[..end].to_string(),
                    size: 0,
                },
                None => ListEntry {
                    key: key.clone(),
                    size: object.data.len() as u64,
                },
            };

            if page_token.is_some_and(|token| entry.key.as_str() <= token) {
                continue;
            }
            if page.entries.last().is_some_and(|last| last.key == entry.key) {
                continue;
            }
            if page.entries.len() == page_size {
                page.next_page_token = page.entries.last().map(|last| last.key.clone());
                break;
            }
            page.entries.push(entry);
        }
        Ok(page)
    }

    async fn bucket_exists(&self) -> StoreResult<bool> {
        if !self.bucket_metadata_readable {
            return Err(StoreError::new(
                StoreErrorKind::PermissionDenied,
                format!("caller may not read metadata of bucket {}", self.bucket),
            ));
        }
        Ok(self.lock().bucket_exists)
    }

    async fn create_bucket(&self) -> StoreResult<()> {
        let mut state = self.lock();
        if state.bucket_exists {
            return Err(StoreError::new(
                StoreErrorKind::AlreadyExists,
                format!("bucket {} already exists", self.bucket),
            ));
        }
        state.bucket_exists = true;
        Ok(())
    }

    async fn delete_bucket(&self) -> StoreResult<()> {
        let mut state = self.checked()?;
        if !state.objects.is_empty() {
            return Err(StoreError::new(
                StoreErrorKind::Other,
                format!("bucket {} is not empty", self.bucket),
            ));
        }
        state.bucket_exists = false;
        Ok(())
    }
}
