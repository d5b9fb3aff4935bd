// Scoped read/write channels over a single object key
use bytes::Bytes;
use futures::{Stream, StreamExt};
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::task::{Context, Poll};

use crate::error::{Error, ErrorKind, Result};
use crate::storage::constants::MAX_RANGED_WRITE_GAP;
use crate::storage::read::collect_content;
use crate::storage::store::{ByteRange, ContentStream, ObjectStore, StoreErrorKind};
use crate::storage::utils::error::store_error;

fn locked<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelMode {
    Read,
    Write,
}

/// Buffered content of one output stream, committed on close.
type PendingWrite = Arc<Mutex<Option<Vec<u8>>>>;

/// State of one input stream opened through a channel.
enum InputSlot {
    Open(ContentStream),
    Exhausted,
    /// The channel was closed before the stream was read to the end.
    Released,
}

type SharedInput = Arc<Mutex<InputSlot>>;

enum Resource {
    Input(SharedInput),
    Output(PendingWrite),
}

struct ChannelInner<S> {
    store: Arc<S>,
    key: String,
    mode: ChannelMode,
    range: ByteRange,
    /// Streams opened through the channel; `None` once the channel is closed.
    resources: Mutex<Option<Vec<Resource>>>,
    /// Current object content a ranged write is spliced into.
    base: Mutex<Option<Vec<u8>>>,
}

impl<S: ObjectStore> ChannelInner<S> {
    fn closed_error(&self) -> Error {
        Error::ChannelClosed {
            key: self.key.clone(),
        }
    }

    fn ensure_open(&self) -> Result<()> {
        if locked(&self.resources).is_none() {
            return Err(self.closed_error());
        }
        Ok(())
    }

    /// Track `resource` for release on close. Checked under the same lock
    /// that close takes, so nothing is registered after the list is drained.
    fn register(&self, resource: Resource) -> Result<()> {
        match locked(&self.resources).as_mut() {
            Some(resources) => {
                resources.push(resource);
                Ok(())
            }
            None => Err(self.closed_error()),
        }
    }

    /// Upload the bytes of one output stream.
    ///
    /// The store cannot overwrite part of an object, so a ranged write
    /// replaces the range inside the full content read at lock time and
    /// uploads the whole object again. Bytes between the old end of the
    /// object and the range start are zero-filled, up to
    /// [`MAX_RANGED_WRITE_GAP`] bytes.
    async fn commit(&self, data: Vec<u8>) -> Result<()> {
        let content = if self.range.is_full() {
            data
        } else {
            let out_of_bounds = || Error::OutOfBounds {
                key: self.key.clone(),
                offset: self.range.offset,
                length: self.range.length,
                size: data.len() as u64,
            };
            if self.range.length.is_some_and(|length| data.len() as u64 > length) {
                return Err(out_of_bounds());
            }
            let start = usize::try_from(self.range.offset).map_err(|_| out_of_bounds())?;
            let end = start.checked_add(data.len()).ok_or_else(out_of_bounds)?;

            let mut base = locked(&self.base);
            let current = base.as_ref().map_or(0, Vec::len) as u64;
            if self.range.offset > current.saturating_add(MAX_RANGED_WRITE_GAP) {
                return Err(Error::OutOfBounds {
                    key: self.key.clone(),
                    offset: self.range.offset,
                    length: self.range.length,
                    size: current,
                });
            }
            let mut content = base.take().unwrap_or_default();
            if content.len() < end {
                content.resize(end, 0);
            }
            content[start..end].copy_from_slice(&data);
            *base = Some(content.clone());
            content
        };

        log::debug!(
            "channel commit key={} bytes={} range={:?}",
            self.key,
            content.len(),
            self.range
        );
        self.store
            .put_content(&self.key, Bytes::from(content))
            .await
            .map_err(|e| store_error(self.store.bucket(), &self.key, None, e))
    }
}

/// A channel bound to one object key and one direction.
///
/// Every stream opened through the channel is tracked and released by
/// [`ScopedChannel::close`], which also commits output streams that were not
/// closed individually. Callers must close the channel on every exit path.
pub struct ScopedChannel<S> {
    inner: Arc<ChannelInner<S>>,
}

impl<S> Clone for ScopedChannel<S> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<S: ObjectStore> ScopedChannel<S> {
    pub(crate) fn for_reading(store: Arc<S>, key: impl Into<String>, range: ByteRange) -> Self {
        Self::open(store, key.into(), ChannelMode::Read, range, None)
    }

    /// Open a write channel. For a ranged write the existing object, if
    /// any, is loaded into memory now.
    pub(crate) async fn for_writing(
        store: Arc<S>,
        key: impl Into<String>,
        range: ByteRange,
    ) -> Result<Self> {
        let key = key.into();
        let base = if range.is_full() {
            None
        } else {
            match store.get_content(&key, ByteRange::FULL, None).await {
                Ok(stream) => match collect_content(stream, store.bucket(), &key, None).await {
                    Ok(content) => Some(content.to_vec()),
                    Err(e) if e.kind() == ErrorKind::NoSuchKey => None,
                    Err(e) => return Err(e),
                },
                Err(e) if e.kind() == StoreErrorKind::NotFound => None,
                Err(e) => return Err(store_error(store.bucket(), &key, None, e)),
            }
        };
        Ok(Self::open(store, key, ChannelMode::Write, range, base))
    }

    fn open(
        store: Arc<S>,
        key: String,
        mode: ChannelMode,
        range: ByteRange,
        base: Option<Vec<u8>>,
    ) -> Self {
        Self {
            inner: Arc::new(ChannelInner {
                store,
                key,
                mode,
                range,
                resources: Mutex::new(Some(Vec::new())),
                base: Mutex::new(base),
            }),
        }
    }

    pub fn key(&self) -> &str {
        &self.inner.key
    }

    pub fn mode(&self) -> ChannelMode {
        self.inner.mode
    }

    pub fn is_closed(&self) -> bool {
        locked(&self.inner.resources).is_none()
    }

    fn check_writable(&self) -> Result<()> {
        if self.inner.mode == ChannelMode::Read {
            return Err(Error::NonWritableChannel {
                key: self.inner.key.clone(),
            });
        }
        Ok(())
    }

    /// Open a byte stream over the channel's range of the object.
    ///
    /// A missing object is reported as [`Error::NoSuchKey`], whether the
    /// store notices at open time or on the first chunk.
    pub async fn new_input_stream(&self) -> Result<ObjectReader> {
        self.inner.ensure_open()?;
        let inner = &self.inner;
        let stream = inner
            .store
            .get_content(&inner.key, inner.range, None)
            .await
            .map_err(|e| store_error(inner.store.bucket(), &inner.key, None, e))?;

        let slot = Arc::new(Mutex::new(InputSlot::Open(stream)));
        // the channel may have been closed while the store was opening the stream
        inner.register(Resource::Input(slot.clone()))?;
        Ok(ObjectReader {
            bucket: inner.store.bucket().to_string(),
            key: inner.key.clone(),
            stream: slot,
        })
    }

    /// Open a UTF-8 text reader over the channel's range of the object.
    pub async fn new_reader(&self) -> Result<TextReader> {
        Ok(TextReader {
            input: self.new_input_stream().await?,
        })
    }

    /// Open a byte sink whose content replaces the channel's range on close.
    pub fn new_output_stream(&self) -> Result<ObjectWriter<S>> {
        self.check_writable()?;
        let pending: PendingWrite = Arc::new(Mutex::new(Some(Vec::new())));
        self.inner.register(Resource::Output(pending.clone()))?;
        Ok(ObjectWriter {
            channel: self.inner.clone(),
            pending,
        })
    }

    /// Open a UTF-8 text sink whose content replaces the channel's range on close.
    pub fn new_writer(&self) -> Result<TextWriter<S>> {
        Ok(TextWriter {
            output: self.new_output_stream()?,
        })
    }

    /// Release every stream opened through this channel, committing output
    /// streams still open. Closing twice is a no-op.
    pub async fn close(&self) -> Result<()> {
        let Some(resources) = locked(&self.inner.resources).take() else {
            return Ok(());
        };
        log::debug!(
            "channel close key={} mode={:?} resources={}",
            self.inner.key,
            self.inner.mode,
            resources.len()
        );

        let mut first_error = None;
        for resource in resources {
            match resource {
                Resource::Input(slot) => {
                    let mut slot = locked(&slot);
                    if matches!(*slot, InputSlot::Open(_)) {
                        *slot = InputSlot::Released;
                    }
                }
                Resource::Output(pending) => {
                    let data = locked(&pending).take();
                    if let Some(data) = data {
                        if let Err(e) = self.inner.commit(data).await {
                            first_error.get_or_insert(e);
                        }
                    }
                }
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}

/// Byte stream over an object range, yielding chunks as the store sends them.
///
/// Closing the channel before the stream is exhausted makes the next read
/// fail with [`Error::ChannelClosed`] instead of ending early.
pub struct ObjectReader {
    bucket: String,
    key: String,
    stream: SharedInput,
}

impl ObjectReader {
    /// Read the remaining content into one buffer.
    pub async fn read_to_end(&mut self) -> Result<Bytes> {
        let mut buffer = Vec::new();
        while let Some(chunk) = self.next().await {
            buffer.extend_from_slice(&chunk?);
        }
        Ok(Bytes::from(buffer))
    }
}

impl Stream for ObjectReader {
    type Item = Result<Bytes>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        let mut slot = locked(&this.stream);
        let stream = match &mut *slot {
            InputSlot::Open(stream) => stream,
            InputSlot::Exhausted => return Poll::Ready(None),
            InputSlot::Released => {
                return Poll::Ready(Some(Err(Error::ChannelClosed {
                    key: this.key.clone(),
                })));
            }
        };
        match stream.poll_next_unpin(cx) {
            Poll::Ready(Some(Err(e))) => {
                Poll::Ready(Some(Err(store_error(&this.bucket, &this.key, None, e))))
            }
            Poll::Ready(Some(Ok(chunk))) => Poll::Ready(Some(Ok(chunk))),
            Poll::Ready(None) => {
                *slot = InputSlot::Exhausted;
                Poll::Ready(None)
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

/// UTF-8 text view of an [`ObjectReader`].
pub struct TextReader {
    input: ObjectReader,
}

impl TextReader {
    pub async fn read_to_string(&mut self) -> Result<String> {
        let bytes = self.input.read_to_end().await?;
        String::from_utf8(bytes.to_vec()).map_err(|e| Error::Io {
            source: std::io::Error::new(std::io::ErrorKind::InvalidData, e),
        })
    }
}

/// Byte sink for one object range. Content is buffered and uploaded on close.
pub struct ObjectWriter<S> {
    channel: Arc<ChannelInner<S>>,
    pending: PendingWrite,
}

impl<S: ObjectStore> ObjectWriter<S> {
    pub fn write_all(&mut self, data: &[u8]) -> Result<()> {
        self.channel.ensure_open()?;
        match locked(&self.pending).as_mut() {
            Some(buffer) => {
                buffer.extend_from_slice(data);
                Ok(())
            }
            None => Err(Error::ChannelClosed {
                key: self.channel.key.clone(),
            }),
        }
    }

    /// Upload the buffered content now instead of at channel close.
    pub async fn close(&mut self) -> Result<()> {
        let data = locked(&self.pending).take();
        match data {
            Some(data) => self.channel.commit(data).await,
            None => Ok(()),
        }
    }
}

/// UTF-8 text view of an [`ObjectWriter`].
pub struct TextWriter<S> {
    output: ObjectWriter<S>,
}

impl<S: ObjectStore> TextWriter<S> {
    pub fn write_str(&mut self, text: &str) -> Result<()> {
        self.output.write_all(text.as_bytes())
    }

    pub async fn close(&mut self) -> Result<()> {
        self.output.close().await
    }
}
