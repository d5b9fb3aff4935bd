use assert_cmd::prelude::*;
use bucketkv::error::Result;
use bucketkv::storage::backends::InMemoryStore;
use bucketkv::storage::{AccessOptions, KeyValueAccess};
use libtest_mimic::{Failed, Trial};
use rand::prelude::*;
use std::path::PathBuf;
use std::process::Command;
use std::sync::{Arc, LazyLock};
use uuid::Uuid;

pub const TEST_BUCKET: &str = "test";
pub const TEST_CONTAINER: &str = "gs://test/behavior/root";

pub type TestAccess = KeyValueAccess<InMemoryStore>;

pub static TEST_RUNTIME: LazyLock<tokio::runtime::Runtime> = LazyLock::new(|| {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .unwrap()
});

pub async fn init_test_service() -> Result<TestAccess> {
    new_access(InMemoryStore::new(TEST_BUCKET), AccessOptions::default())
}

/// Key-value access to a dedicated store, for tests that need store switches
/// or options differing from the shared service.
pub fn new_access(store: InMemoryStore, options: AccessOptions) -> Result<TestAccess> {
    KeyValueAccess::from_locator(Arc::new(store), TEST_CONTAINER, options)
}

pub struct Fixture {
    pub paths: std::sync::Mutex<Vec<String>>,
}

impl Fixture {
    pub const fn new() -> Self {
        Self {
            paths: std::sync::Mutex::new(vec![]),
        }
    }

    pub fn new_dir_path(&self) -> String {
        let path = format!("{}/", Uuid::new_v4());
        self.paths.lock().unwrap().push(path.clone());
        path
    }

    pub fn new_file_path(&self) -> String {
        let path = format!("{}", Uuid::new_v4());
        self.paths.lock().unwrap().push(path.clone());
        path
    }

    pub fn new_file(&self) -> (String, Vec<u8>, usize) {
        self.new_file_with_range(Uuid::new_v4().to_string(), 1..64 * 1024)
    }

    pub fn new_file_with_range(
        &self,
        path: impl Into<String>,
        range: std::ops::Range<usize>,
    ) -> (String, Vec<u8>, usize) {
        let path = path.into();
        self.paths.lock().unwrap().push(path.clone());

        let mut rng = rand::rng();
        let size = rng.random_range(range);
        let mut content = vec![0; size];
        rng.fill_bytes(&mut content);

        (path, content, size)
    }

    pub async fn cleanup(&self, kva: &TestAccess) {
        let paths: Vec<_> = std::mem::take(self.paths.lock().unwrap().as_mut());
        for path in paths {
            let _ = kva.delete(&path).await;
        }
    }
}

impl Default for Fixture {
    fn default() -> Self {
        Self::new()
    }
}

/// A filesystem-backed container for driving the binary end to end.
pub struct CliTestEnv {
    pub root: PathBuf,
}

impl CliTestEnv {
    pub fn new() -> Self {
        let root = std::env::temp_dir().join(format!("bucketkv-{}", Uuid::new_v4()));
        std::fs::create_dir_all(&root).expect("failed to create test root");
        Self { root }
    }

    /// Returns a Command pre-configured with all necessary environment variables.
    pub fn command(&self) -> Command {
        let mut cmd = Command::cargo_bin("bucketkv").unwrap();
        cmd.env_clear()
            .env("RUST_LOG", "info")
            .env("STORAGE_PROVIDER", "fs")
            .env("STORAGE_ROOT_PATH", &self.root);
        cmd
    }

    pub fn local_file(&self, name: &str, content: &[u8]) -> PathBuf {
        let dir = self.root.with_extension("local");
        std::fs::create_dir_all(&dir).expect("failed to create local dir");
        let path = dir.join(name);
        std::fs::write(&path, content).expect("failed to write local file");
        path
    }
}

impl Default for CliTestEnv {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for CliTestEnv {
    fn drop(&mut self) {
        let _ = std::fs::remove_dir_all(&self.root);
        let _ = std::fs::remove_dir_all(self.root.with_extension("local"));
    }
}

pub fn build_async_trial<F, Fut>(name: &str, kva: &TestAccess, f: F) -> Trial
where
    F: FnOnce(TestAccess) -> Fut + Send + 'static,
    Fut: std::future::Future<Output = Result<()>>,
{
    let handle = TEST_RUNTIME.handle().clone();
    let kva = kva.clone();

    Trial::test(format!("behavior::{name}"), move || {
        handle
            .block_on(f(kva))
            .map_err(|err| Failed::from(err.to_string()))
    })
}

#[macro_export]
macro_rules! async_trials {
    ($kva:ident, $($test:ident),*) => {
        vec![$(build_async_trial(stringify!($test), $kva, $test),)*]
    };
}

pub static TEST_FIXTURE: Fixture = Fixture::new();
