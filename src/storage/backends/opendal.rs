// Object store backed by an OpenDAL operator
use bytes::Bytes;
use futures::StreamExt;
use futures::stream;
use opendal::{ErrorKind, Metadata, Operator};

use crate::storage::constants::{SEPARATOR, SEPARATOR_STR};
use crate::storage::store::{
    ByteRange, ContentStream, Generation, ListEntry, ListPage, ListRequest, ObjectMetadata,
    ObjectStore, StoreError, StoreErrorKind, StoreResult,
};

impl From<opendal::Error> for StoreError {
    fn from(err: opendal::Error) -> Self {
        let kind = match err.kind() {
            ErrorKind::NotFound => StoreErrorKind::NotFound,
            ErrorKind::ConditionNotMatch => StoreErrorKind::PreconditionFailed,
            ErrorKind::PermissionDenied => StoreErrorKind::PermissionDenied,
            ErrorKind::AlreadyExists => StoreErrorKind::AlreadyExists,
            ErrorKind::Unsupported => StoreErrorKind::Unsupported,
            _ => StoreErrorKind::Other,
        };
        StoreError::new(kind, err.to_string())
    }
}

/// [`ObjectStore`] over an OpenDAL [`Operator`] rooted at the bucket root.
///
/// Generations come from the object version reported by the service; services
/// without versions report none and generation pinning is then unavailable.
#[derive(Clone)]
pub struct OpenDalStore {
    operator: Operator,
    bucket: String,
}

impl OpenDalStore {
    pub fn new(operator: Operator, bucket: impl Into<String>) -> Self {
        Self {
            operator,
            bucket: bucket.into(),
        }
    }

    pub fn operator(&self) -> &Operator {
        &self.operator
    }

    fn generation_of(meta: &Metadata) -> Option<Generation> {
        meta.version().and_then(|v| v.parse().ok())
    }

    /// OpenDAL lists directories; a prefix not ending in the separator is
    /// served by listing its parent and filtering.
    fn listing_dir(prefix: &str) -> String {
        if prefix.is_empty() {
            return SEPARATOR_STR.to_string();
        }
        if prefix.ends_with(SEPARATOR) {
            return prefix.to_string();
        }
        match prefix.rfind(SEPARATOR) {
            Some(idx) => prefix[..=idx].to_string(),
            None => SEPARATOR_STR.to_string(),
        }
    }

    fn bucket_unsupported(&self, action: &str) -> StoreError {
        StoreError::new(
            StoreErrorKind::Unsupported,
            format!(
                "cannot {action} bucket {}: bucket management is not available through OpenDAL",
                self.bucket
            ),
        )
    }
}

impl ObjectStore for OpenDalStore {
    fn bucket(&self) -> &str {
        &self.bucket
    }

    async fn get_metadata(&self, key: &str) -> StoreResult<Option<ObjectMetadata>> {
        match self.operator.stat(key).await {
            // a directory is not an object unless it was asked for as one
            Ok(meta) if meta.mode().is_dir() && !key.ends_with(SEPARATOR) => Ok(None),
            Ok(meta) => Ok(Some(ObjectMetadata {
                size: meta.content_length(),
                generation: Self::generation_of(&meta),
            })),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn get_content(
        &self,
        key: &str,
        range: ByteRange,
        generation: Option<Generation>,
    ) -> StoreResult<ContentStream> {
        let mut etag = None;
        if let Some(expected) = generation {
            let meta = self.operator.stat(key).await?;
            let current = Self::generation_of(&meta);
            if current != Some(expected) {
                return Err(StoreError::new(
                    StoreErrorKind::PreconditionFailed,
                    format!("{key} is at generation {current:?}, expected {expected}"),
                ));
            }
            etag = meta.etag().map(str::to_string);
        }

        let mut read = self.operator.read_with(key);
        read = match range.length {
            Some(length) => read.range(range.offset..range.offset.saturating_add(length)),
            None => read.range(range.offset..),
        };
        if let Some(etag) = etag.as_deref() {
            read = read.if_match(etag);
        }

        let buffer = read.await?;
        let data: Bytes = buffer.to_bytes();
        Ok(stream::iter(vec![Ok(data)]).boxed())
    }

    async fn put_content(&self, key: &str, data: Bytes) -> StoreResult<()> {
        if key.ends_with(SEPARATOR) && data.is_empty() {
            self.operator.create_dir(key).await?;
        } else {
            self.operator.write(key, data).await?;
        }
        Ok(())
    }

    async fn delete_object(&self, key: &str) -> StoreResult<bool> {
        // a directory is only deleted when asked for with its trailing separator
        match self.get_metadata(key).await? {
            Some(_) => {
                self.operator.delete(key).await?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete_objects(&self, keys: &[String]) -> StoreResult<Vec<bool>> {
        // children before parents, so hierarchical backends can drop directories
        let mut order: Vec<usize> = (0..keys.len()).collect();
        order.sort_by_key(|&idx| {
            std::cmp::Reverse(keys[idx].trim_end_matches(SEPARATOR).matches(SEPARATOR).count())
        });
        let mut removed = vec![false; keys.len()];
        for idx in order {
            removed[idx] = self.delete_object(&keys[idx]).await?;
        }
        Ok(removed)
    }

    async fn list_page(
        &self,
        request: &ListRequest,
        page_token: Option<&str>,
    ) -> StoreResult<ListPage> {
        let dir = Self::listing_dir(&request.prefix);
        let entries = match self
            .operator
            .list_with(&dir)
            .recursive(request.delimiter.is_none())
            .await
        {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => Vec::new(),
            Err(e) => return Err(e.into()),
        };

        let mut listed: Vec<ListEntry> = entries
            .into_iter()
            .filter(|entry| entry.path() != SEPARATOR_STR)
            .filter(|entry| entry.path().starts_with(&request.prefix))
            .map(|entry| ListEntry {
                key: entry.path().to_string(),
                size: entry.metadata().content_length(),
            })
            .filter(|entry| page_token.is_none_or(|token| entry.key.as_str() > token))
            .collect();
        listed.sort_by(|a, b| a.key.cmp(&b.key));
        listed.dedup_by(|a, b| a.key == b.key);

        let page_size = request.page_size.max(1);
        let next_page_token = if listed.len() > page_size {
            listed.truncate(page_size);
            listed.last().map(|entry| entry.key.clone())
        } else {
            None
        };

        Ok(ListPage {
            entries: listed,
            next_page_token,
        })
    }

    async fn bucket_exists(&self) -> StoreResult<bool> {
        match self.operator.check().await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn create_bucket(&self) -> StoreResult<()> {
        Err(self.bucket_unsupported("create"))
    }

    async fn delete_bucket(&self) -> StoreResult<()> {
        Err(self.bucket_unsupported("delete"))
    }
}
