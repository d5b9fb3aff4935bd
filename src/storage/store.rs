// Object-store collaborator interface consumed by the key-value layer
use bytes::Bytes;
use futures::stream::BoxStream;
use std::fmt;

/// Monotonic per-key version assigned by the store on every successful write.
pub type Generation = u64;

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Stream of object content chunks returned by [`ObjectStore::get_content`].
pub type ContentStream = BoxStream<'static, StoreResult<Bytes>>;

/// Status reported by the store for a failed call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreErrorKind {
    NotFound,
    PreconditionFailed,
    PermissionDenied,
    AlreadyExists,
    Unsupported,
    Other,
}

impl fmt::Display for StoreErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StoreErrorKind::NotFound => "not found",
            StoreErrorKind::PreconditionFailed => "precondition failed",
            StoreErrorKind::PermissionDenied => "permission denied",
            StoreErrorKind::AlreadyExists => "already exists",
            StoreErrorKind::Unsupported => "unsupported",
            StoreErrorKind::Other => "unexpected",
        };
        f.write_str(name)
    }
}

/// Failure reported by an [`ObjectStore`] implementation.
#[derive(Debug, Clone)]
pub struct StoreError {
    kind: StoreErrorKind,
    message: String,
}

impl StoreError {
    pub fn new(kind: StoreErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn kind(&self) -> StoreErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.message, self.kind)
    }
}

impl std::error::Error for StoreError {}

/// Metadata of an existing object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ObjectMetadata {
    pub size: u64,
    /// `None` when the backing service does not report object versions.
    pub generation: Option<Generation>,
}

/// Byte range of an object. A `None` length extends to the end of the object.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ByteRange {
    pub offset: u64,
    pub length: Option<u64>,
}

impl ByteRange {
    pub const FULL: ByteRange = ByteRange {
        offset: 0,
        length: None,
    };

    pub fn new(offset: u64, length: Option<u64>) -> Self {
        Self { offset, length }
    }

    pub fn is_full(&self) -> bool {
        self.offset == 0 && self.length.is_none()
    }
}

/// A prefix listing request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListRequest {
    pub prefix: String,
    /// Group keys sharing a prefix up to the next delimiter into one entry.
    pub delimiter: Option<char>,
    pub page_size: usize,
}

/// One listed key. Grouped prefixes are reported with their trailing delimiter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListEntry {
    pub key: String,
    pub size: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListPage {
    pub entries: Vec<ListEntry>,
    pub next_page_token: Option<String>,
}

/// Flat-key object store bound to a single bucket.
///
/// Implementations only issue remote calls; they never retry and never
/// interpret keys hierarchically beyond what prefix/delimiter listing implies.
pub trait ObjectStore: Send + Sync + 'static {
    /// Name of the bucket this store operates on.
    fn bucket(&self) -> &str;

    /// Fetch metadata of `key`, or `None` if no such object exists.
    async fn get_metadata(&self, key: &str) -> StoreResult<Option<ObjectMetadata>>;

    /// Open a content stream for `range` of `key`.
    ///
    /// When `generation` is given, the read fails with
    /// [`StoreErrorKind::PreconditionFailed`] unless the object is still at
    /// that generation. A missing key may be reported either here or by the
    /// first item of the returned stream.
    async fn get_content(
        &self,
        key: &str,
        range: ByteRange,
        generation: Option<Generation>,
    ) -> StoreResult<ContentStream>;

    /// Upload `data` as the full content of `key`, overwriting unconditionally.
    async fn put_content(&self, key: &str, data: Bytes) -> StoreResult<()>;

    /// Delete `key`, returning whether an object was removed.
    async fn delete_object(&self, key: &str) -> StoreResult<bool>;

    /// Delete many keys in one call, returning a success flag per key.
    /// Stores without batch deletion fail with [`StoreErrorKind::Unsupported`].
    async fn delete_objects(&self, keys: &[String]) -> StoreResult<Vec<bool>>;

    /// Fetch one page of a prefix listing.
    async fn list_page(
        &self,
        request: &ListRequest,
        page_token: Option<&str>,
    ) -> StoreResult<ListPage>;

    async fn bucket_exists(&self) -> StoreResult<bool>;

    async fn create_bucket(&self) -> StoreResult<()>;

    async fn delete_bucket(&self) -> StoreResult<()>;
}
