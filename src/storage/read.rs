// Lazily materialized views over object content
use bytes::{Bytes, BytesMut};
use futures::TryStreamExt;
use std::sync::{Arc, Mutex, PoisonError};

use crate::error::{Error, Result};
use crate::storage::store::{ByteRange, ContentStream, Generation, ObjectMetadata, ObjectStore};
use crate::storage::utils::error::store_error;

/// Drain a content stream into one buffer, mapping store failures for `key`.
pub(crate) async fn collect_content(
    mut stream: ContentStream,
    bucket: &str,
    key: &str,
    generation: Option<Generation>,
) -> Result<Bytes> {
    let mut buffer = BytesMut::new();
    while let Some(chunk) = stream
        .try_next()
        .await
        .map_err(|e| store_error(bucket, key, generation, e))?
    {
        buffer.extend_from_slice(&chunk);
    }
    Ok(buffer.freeze())
}

/// A view over a byte range of one object, fetched on demand.
///
/// A pinning handle records the generation it observes the first time
/// metadata is fetched. Every later fetch through this handle, or through
/// slices taken from it, requires the object to still be at that generation
/// and fails with [`Error::ConcurrentModification`] otherwise.
pub struct ReadHandle<S> {
    store: Arc<S>,
    key: String,
    pin: bool,
    generation: Arc<Mutex<Option<Generation>>>,
    offset: u64,
    length: Option<u64>,
}

impl<S> Clone for ReadHandle<S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            key: self.key.clone(),
            pin: self.pin,
            generation: self.generation.clone(),
            offset: self.offset,
            length: self.length,
        }
    }
}

impl<S: ObjectStore> ReadHandle<S> {
    pub(crate) fn new(store: Arc<S>, key: impl Into<String>, pin: bool) -> Self {
        Self {
            store,
            key: key.into(),
            pin,
            generation: Arc::new(Mutex::new(None)),
            offset: 0,
            length: None,
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Generation this handle is pinned to, if any.
    pub fn pinned_generation(&self) -> Option<Generation> {
        *self.generation.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Length of this view if it is known without a remote call.
    pub fn length(&self) -> Option<u64> {
        self.length
    }

    async fn metadata(&self) -> Result<ObjectMetadata> {
        let bucket = self.store.bucket();
        let meta = self
            .store
            .get_metadata(&self.key)
            .await
            .map_err(|e| store_error(bucket, &self.key, self.pinned_generation(), e))?
            .ok_or_else(|| Error::NoSuchKey {
                bucket: bucket.to_string(),
                key: self.key.clone(),
            })?;

        if self.pin {
            let mut pinned = self.generation.lock().unwrap_or_else(PoisonError::into_inner);
            match *pinned {
                None => *pinned = meta.generation,
                Some(expected) if meta.generation != Some(expected) => {
                    return Err(Error::ConcurrentModification {
                        bucket: bucket.to_string(),
                        key: self.key.clone(),
                        generation: expected,
                    });
                }
                Some(_) => {}
            }
        }
        Ok(meta)
    }

    /// Size of the whole object in bytes.
    pub async fn size(&self) -> Result<u64> {
        Ok(self.metadata().await?.size)
    }

    /// Length of this view, fetching object metadata (and pinning the
    /// generation) when needed.
    pub async fn require_length(&self) -> Result<u64> {
        let size = self.metadata().await?.size;
        let available = size.saturating_sub(self.offset);
        Ok(self.length.map_or(available, |length| length.min(available)))
    }

    /// Fetch `length` bytes starting at `offset` within this view; a `None`
    /// length reads to the end of the view.
    pub async fn materialize(&self, offset: u64, length: Option<u64>) -> Result<Bytes> {
        let available = self.require_length().await?;
        let out_of_bounds = match length {
            Some(length) => offset.checked_add(length).is_none_or(|end| end > available),
            None => offset > available,
        };
        if out_of_bounds {
            return Err(Error::OutOfBounds {
                key: self.key.clone(),
                offset,
                length,
                size: available,
            });
        }

        let length = length.unwrap_or(available - offset);
        if length == 0 {
            return Ok(Bytes::new());
        }

        let generation = self.pinned_generation();
        let range = ByteRange::new(self.offset + offset, Some(length));
        let bucket = self.store.bucket();
        let stream = self
            .store
            .get_content(&self.key, range, generation)
            .await
            .map_err(|e| store_error(bucket, &self.key, generation, e))?;
        collect_content(stream, bucket, &self.key, generation).await
    }

    /// The full content of this view.
    pub async fn all_bytes(&self) -> Result<Bytes> {
        self.materialize(0, None).await
    }

    /// A narrower view sharing this handle's pinned generation.
    pub fn slice(&self, offset: u64, length: Option<u64>) -> ReadHandle<S> {
        let length = match (self.length, length) {
            (Some(parent), Some(length)) => Some(length.min(parent.saturating_sub(offset))),
            (Some(parent), None) => Some(parent.saturating_sub(offset)),
            (None, length) => length,
        };
        Self {
            offset: self.offset.saturating_add(offset),
            length,
            ..self.clone()
        }
    }

    /// Release the pinned generation; the next fetch pins afresh.
    pub fn close(&self) {
        *self.generation.lock().unwrap_or_else(PoisonError::into_inner) = None;
    }
}
