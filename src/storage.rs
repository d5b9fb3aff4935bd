use bytes::Bytes;
use opendal::Operator;
use std::str::FromStr;
use std::sync::Arc;

use crate::error::{Error, Result};

pub mod backends;
pub mod channel;
pub mod constants;
pub mod container;
pub mod operations;
pub mod policy;
pub mod read;
pub mod store;
pub mod utils;

use self::backends::OpenDalStore;
use self::channel::ScopedChannel;
use self::constants::{DEFAULT_FS_ROOT, SEPARATOR};
use self::container::ContainerUri;
use self::operations::{
    BucketState, Lister, Mkdirer, PathStat, Prober, Stater, StoreLister, StoreMkdirer,
    StoreProber, StoreStater,
};
use self::policy::IoPolicy;
use self::read::ReadHandle;
use self::store::{ByteRange, ObjectStore};
use self::utils::error::store_error;
use self::utils::path::{self as keys, directory_key, ensure_trailing_slash};
use crate::wrap_err;

/// Behavior of a [`KeyValueAccess`] fixed at construction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AccessOptions {
    pub io_policy: IoPolicy,
    /// Allow creating the bucket in `create_directories` and removing it
    /// when the bucket root is deleted.
    pub create_bucket: bool,
}

/// Hierarchical key-value access to one container of a flat object store.
///
/// Paths are resolved against the container root; groups are emulated with
/// key prefixes and empty directory marker objects.
pub struct KeyValueAccess<S> {
    store: Arc<S>,
    container: ContainerUri,
    options: AccessOptions,
    bucket_state: Arc<BucketState>,
}

impl<S> Clone for KeyValueAccess<S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            container: self.container.clone(),
            options: self.options,
            bucket_state: self.bucket_state.clone(),
        }
    }
}

impl<S: ObjectStore> KeyValueAccess<S> {
    pub fn new(store: Arc<S>, container: ContainerUri, options: AccessOptions) -> Self {
        Self {
            store,
            container,
            options,
            bucket_state: Arc::new(BucketState::default()),
        }
    }

    pub fn from_locator(store: Arc<S>, locator: &str, options: AccessOptions) -> Result<Self> {
        let container = ContainerUri::parse(locator)?;
        Ok(Self::new(store, container, options))
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn container(&self) -> &ContainerUri {
        &self.container
    }

    pub fn options(&self) -> AccessOptions {
        self.options
    }

    pub fn components(&self, path: &str) -> Vec<String> {
        keys::components(path)
    }

    pub fn compose<I, T>(&self, components: I) -> String
    where
        I: IntoIterator<Item = T>,
        T: AsRef<str>,
    {
        keys::compose(components)
    }

    pub fn parent(&self, path: &str) -> String {
        keys::parent(path)
    }

    pub fn relativize(&self, path: &str, base: &str) -> String {
        keys::relativize(path, base)
    }

    pub fn normalize(&self, path: &str) -> String {
        keys::normalize(path)
    }

    /// Locator of `path` resolved against the container root.
    pub fn uri(&self, path: &str) -> ContainerUri {
        self.container.resolve(path)
    }

    /// Object key of `path`. A trailing separator on `path` is dropped.
    pub fn key(&self, path: &str) -> String {
        self.container.resolve_key(path)
    }

    fn prober(&self) -> StoreProber<S> {
        StoreProber::new(self.store.clone(), self.bucket_state.clone())
    }

    pub async fn bucket_exists(&self) -> Result<bool> {
        self.prober().bucket_exists().await
    }

    pub async fn exists(&self, path: &str) -> Result<bool> {
        log::debug!("exists path={path}");
        Ok(self.is_directory(path).await? || self.is_file(path).await?)
    }

    pub async fn is_directory(&self, path: &str) -> Result<bool> {
        let dir_key = directory_key(&self.key(path));
        log::debug!("is_directory path={path} key={dir_key}");
        self.prober().is_directory(&dir_key).await
    }

    /// Whether an object exists at `path`. A path with a trailing separator
    /// asks for a directory and is never a file.
    pub async fn is_file(&self, path: &str) -> Result<bool> {
        if path.ends_with(SEPARATOR) {
            return Ok(false);
        }
        let key = self.key(path);
        log::debug!("is_file path={path} key={key}");
        self.prober().is_file(&key).await
    }

    /// Names of the children of the group at `path`.
    pub async fn list(&self, path: &str) -> Result<Vec<String>> {
        self.list_children(path, false).await
    }

    /// Names of the children of the group at `path` that are groups themselves.
    pub async fn list_directories(&self, path: &str) -> Result<Vec<String>> {
        self.list_children(path, true).await
    }

    async fn list_children(&self, path: &str, only_directories: bool) -> Result<Vec<String>> {
        let dir_key = directory_key(&self.key(path));
        log::debug!("list path={path} key={dir_key} only_directories={only_directories}");
        let lister = StoreLister::new(self.store.clone(), self.prober());
        lister.list(&dir_key, only_directories).await
    }

    /// Create the group at `path` and all of its ancestors.
    pub async fn create_directories(&self, path: &str) -> Result<()> {
        let key = self.key(path);
        log::debug!("create_directories path={path} key={key}");
        let mkdirer = StoreMkdirer::new(
            self.store.clone(),
            self.prober(),
            self.bucket_state.clone(),
            self.options.create_bucket,
        );
        mkdirer.create_directories(&key).await
    }

    /// Delete `path` and everything below it.
    ///
    /// Deleting the bucket root removes every object and then the bucket
    /// itself, which requires bucket management to be enabled. Deleting from
    /// a missing bucket does nothing.
    pub async fn delete(&self, path: &str) -> Result<()> {
        let key = self.key(path);
        log::debug!(
            "delete path={path} key={key} policy={}",
            self.options.io_policy
        );

        if key.is_empty() {
            if !self.options.create_bucket {
                return Err(Error::BucketManagementNotAllowed {
                    bucket: self.store.bucket().to_string(),
                    action: "Delete".to_string(),
                });
            }
            if !self.bucket_exists().await? {
                return Ok(());
            }
            self.options.io_policy.delete(&self.store, "").await?;
            // a bucket must be empty before it can be removed
            self.store
                .delete_bucket()
                .await
                .map_err(|e| store_error(self.store.bucket(), "", None, e))?;
            self.bucket_state.forget();
            return Ok(());
        }

        if !self.bucket_exists().await? {
            return Ok(());
        }
        let key = if path.ends_with(SEPARATOR) {
            ensure_trailing_slash(&key)
        } else {
            key
        };
        self.options.io_policy.delete(&self.store, &key).await?;
        Ok(())
    }

    /// Byte length of the object at `path`.
    pub async fn size(&self, path: &str) -> Result<u64> {
        let key = self.key(path);
        log::debug!("size path={path} key={key}");
        let bucket = self.store.bucket();
        self.store
            .get_metadata(&key)
            .await
            .map_err(|e| store_error(bucket, &key, None, e))?
            .map(|meta| meta.size)
            .ok_or_else(|| Error::NoSuchKey {
                bucket: bucket.to_string(),
                key: key.clone(),
            })
    }

    pub async fn stat(&self, path: &str) -> Result<PathStat> {
        let key = self.key(path);
        log::debug!("stat path={path} key={key}");
        let stater = StoreStater::new(self.store.clone(), self.prober());
        stater.stat(path, &key).await
    }

    /// Lazily materialized handle on the object at `path`.
    pub fn read(&self, path: &str) -> ReadHandle<S> {
        let key = self.key(path);
        log::debug!("read path={path} key={key} policy={}", self.options.io_policy);
        self.options.io_policy.read(&self.store, &key)
    }

    /// Replace the content of the object at `path`.
    pub async fn write(&self, path: &str, data: impl Into<Bytes>) -> Result<()> {
        let key = self.key(path);
        self.options.io_policy.write(&self.store, &key, data.into()).await
    }

    pub fn lock_for_reading(&self, path: &str) -> ScopedChannel<S> {
        self.lock_for_reading_range(path, 0, None)
    }

    /// Read channel over `length` bytes from `offset`; a `None` length reads
    /// to the end of the object.
    pub fn lock_for_reading_range(
        &self,
        path: &str,
        offset: u64,
        length: Option<u64>,
    ) -> ScopedChannel<S> {
        let key = self.key(path);
        log::debug!("lock_for_reading path={path} key={key} offset={offset} length={length:?}");
        ScopedChannel::for_reading(self.store.clone(), key, ByteRange::new(offset, length))
    }

    pub async fn lock_for_writing(&self, path: &str) -> Result<ScopedChannel<S>> {
        self.lock_for_writing_range(path, 0, None).await
    }

    /// Write channel replacing `length` bytes from `offset`. Anything but a
    /// full-object range loads the existing object into memory and uploads
    /// it again as a whole on close.
    pub async fn lock_for_writing_range(
        &self,
        path: &str,
        offset: u64,
        length: Option<u64>,
    ) -> Result<ScopedChannel<S>> {
        let key = self.key(path);
        log::debug!("lock_for_writing path={path} key={key} offset={offset} length={length:?}");
        ScopedChannel::for_writing(self.store.clone(), key, ByteRange::new(offset, length)).await
    }
}

/// Storage provider types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageProvider {
    Gcs,
    S3,
    Fs,
}

impl FromStr for StorageProvider {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "gcs" | "gs" => Ok(Self::Gcs),
            "s3" | "minio" => Ok(Self::S3),
            "fs" => Ok(Self::Fs),
            _ => Err(Error::UnsupportedProvider {
                provider: s.to_string(),
            }),
        }
    }
}

/// Unified storage configuration for different providers
#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub provider: StorageProvider,
    /// Container root locator, e.g. `gs://bucket/some/prefix`.
    pub container: String,
    pub options: AccessOptions,
    pub credential_path: Option<String>,
    pub access_key_id: Option<String>,
    pub access_key_secret: Option<String>,
    pub endpoint: Option<String>,
    pub region: Option<String>,
    pub root_path: Option<String>,
}

impl StorageConfig {
    pub fn gcs(container: String, credential_path: Option<String>) -> Self {
        Self {
            provider: StorageProvider::Gcs,
            container,
            options: AccessOptions::default(),
            credential_path,
            access_key_id: None,
            access_key_secret: None,
            endpoint: None,
            region: None,
            root_path: None,
        }
    }

    pub fn s3(
        container: String,
        access_key_id: String,
        secret_access_key: String,
        region: Option<String>,
    ) -> Self {
        Self {
            provider: StorageProvider::S3,
            container,
            options: AccessOptions::default(),
            credential_path: None,
            access_key_id: Some(access_key_id),
            access_key_secret: Some(secret_access_key),
            endpoint: None,
            region,
            root_path: None,
        }
    }

    pub fn fs(root_path: String) -> Self {
        Self {
            provider: StorageProvider::Fs,
            container: format!("file://{}", constants::SEPARATOR_STR),
            options: AccessOptions::default(),
            credential_path: None,
            access_key_id: None,
            access_key_secret: None,
            endpoint: None,
            region: None,
            root_path: Some(root_path),
        }
    }
}

/// Key-value access backed by an OpenDAL operator for the configured provider
#[derive(Clone)]
pub struct StorageClient {
    access: KeyValueAccess<OpenDalStore>,
    provider: StorageProvider,
}

impl StorageClient {
    pub async fn new(config: StorageConfig) -> Result<Self> {
        let container = ContainerUri::parse(&config.container)?;
        let operator = Self::build_operator(&config, container.bucket())?;
        if let Some(project) = container.project() {
            log::debug!("container {container} names project {project}");
        }
        let store = Arc::new(OpenDalStore::new(operator, container.bucket()));
        Ok(Self {
            access: KeyValueAccess::new(store, container, config.options),
            provider: config.provider,
        })
    }

    pub fn provider(&self) -> StorageProvider {
        self.provider
    }

    pub fn access(&self) -> &KeyValueAccess<OpenDalStore> {
        &self.access
    }

    pub fn operator(&self) -> &Operator {
        self.access.store().operator()
    }

    fn build_operator(config: &StorageConfig, bucket: &str) -> Result<Operator> {
        match &config.provider {
            StorageProvider::Gcs => {
                #[cfg(feature = "gcs")]
                {
                    let mut builder = opendal::services::Gcs::default().bucket(bucket);
                    if let Some(credential_path) = &config.credential_path {
                        builder = builder.credential_path(credential_path);
                    }
                    if let Some(endpoint) = &config.endpoint {
                        builder = builder.endpoint(endpoint);
                    }
                    Ok(Operator::new(builder)?.finish())
                }

                #[cfg(not(feature = "gcs"))]
                {
                    Err(Error::UnsupportedProvider {
                        provider: format!("gcs (feature disabled, bucket {bucket})"),
                    })
                }
            }
            StorageProvider::S3 => {
                #[cfg(feature = "s3")]
                {
                    let mut builder = opendal::services::S3::default().bucket(bucket);
                    if let Some(access_key_id) = &config.access_key_id {
                        builder = builder.access_key_id(access_key_id);
                    }
                    if let Some(secret_access_key) = &config.access_key_secret {
                        builder = builder.secret_access_key(secret_access_key);
                    }
                    if let Some(region) = &config.region {
                        builder = builder.region(region);
                    }
                    if let Some(endpoint) = &config.endpoint {
                        builder = builder.endpoint(endpoint);
                    }
                    Ok(Operator::new(builder)?.finish())
                }

                #[cfg(not(feature = "s3"))]
                {
                    Err(Error::UnsupportedProvider {
                        provider: format!("s3 (feature disabled, bucket {bucket})"),
                    })
                }
            }
            StorageProvider::Fs => {
                #[cfg(feature = "fs")]
                {
                    let root = config.root_path.as_deref().unwrap_or(DEFAULT_FS_ROOT);
                    let builder = opendal::services::Fs::default().root(root);
                    Ok(Operator::new(builder)?.finish())
                }

                #[cfg(not(feature = "fs"))]
                {
                    Err(Error::UnsupportedProvider {
                        provider: format!("fs (feature disabled, bucket {bucket})"),
                    })
                }
            }
        }
    }

    pub async fn list_directory(&self, path: &str, only_directories: bool) -> Result<Vec<String>> {
        log::debug!(
            "list_directory provider={:?} path={} only_directories={}",
            self.provider,
            path,
            only_directories
        );
        let listed = if only_directories {
            self.access.list_directories(path).await
        } else {
            self.access.list(path).await
        };
        wrap_err!(
            listed,
            CommandFailed {
                command: "list".to_string(),
                path: path.to_string()
            }
        )
    }

    pub async fn create_directories(&self, path: &str) -> Result<()> {
        log::debug!("create_directories provider={:?} path={}", self.provider, path);
        wrap_err!(
            self.access.create_directories(path).await,
            CommandFailed {
                command: "create".to_string(),
                path: path.to_string()
            }
        )
    }

    pub async fn delete_path(&self, path: &str) -> Result<()> {
        log::debug!("delete_path provider={:?} path={}", self.provider, path);
        wrap_err!(
            self.access.delete(path).await,
            CommandFailed {
                command: "delete".to_string(),
                path: path.to_string()
            }
        )
    }

    /// Read `length` bytes from `offset` of the object at `path`.
    pub async fn read_range(&self, path: &str, offset: u64, length: Option<u64>) -> Result<Bytes> {
        log::debug!(
            "read_range provider={:?} path={} offset={} length={:?}",
            self.provider,
            path,
            offset,
            length
        );
        let handle = self.access.read(path);
        let content = handle.materialize(offset, length).await;
        handle.close();
        wrap_err!(
            content,
            CommandFailed {
                command: "read".to_string(),
                path: path.to_string()
            }
        )
    }

    /// Write `data` to the object at `path`, replacing it whole or, with an
    /// offset, only the bytes from there on.
    pub async fn write_at(&self, path: &str, offset: Option<u64>, data: Bytes) -> Result<()> {
        log::debug!(
            "write_at provider={:?} path={} offset={:?} bytes={}",
            self.provider,
            path,
            offset,
            data.len()
        );
        let written = match offset {
            None => self.access.write(path, data).await,
            Some(offset) => self.write_range(path, offset, data).await,
        };
        wrap_err!(
            written,
            CommandFailed {
                command: "write".to_string(),
                path: path.to_string()
            }
        )
    }

    async fn write_range(&self, path: &str, offset: u64, data: Bytes) -> Result<()> {
        let length = data.len() as u64;
        let channel = self
            .access
            .lock_for_writing_range(path, offset, Some(length))
            .await?;
        let written = match channel.new_output_stream() {
            Ok(mut output) => output.write_all(&data),
            Err(e) => Err(e),
        };
        let closed = channel.close().await;
        written.and(closed)
    }

    pub async fn stat_path(&self, path: &str) -> Result<PathStat> {
        log::debug!("stat_path provider={:?} path={}", self.provider, path);
        wrap_err!(
            self.access.stat(path).await,
            CommandFailed {
                command: "stat".to_string(),
                path: path.to_string()
            }
        )
    }
}
