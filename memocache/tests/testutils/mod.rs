//! Test utilities for memocache integration tests
//!
//! - TestFixture: scratch cache directory, error log and registry per test
//! - FlakyBackend: in-memory backend whose operations can be made to fail
//! - Unencodable: argument that no cache key can be derived from

#![allow(dead_code)]

use memocache::backend::InMemoryBackend;
use memocache::{
    Backend, BackendHandle, BackendKind, CacheEntry, CacheError, CacheKey, CacheRegistry,
    CacheResult, MemoConfig,
};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Isolated cache directory with its own registry
pub struct TestFixture {
    pub registry: Arc<CacheRegistry>,
    temp_dir: tempfile::TempDir,
}

impl TestFixture {
    pub fn new() -> Self {
        init_logging();
        Self {
            registry: Arc::new(CacheRegistry::new()),
            temp_dir: tempfile::tempdir().expect("Failed to create temp dir"),
        }
    }

    pub fn cache_dir(&self) -> &Path {
        self.temp_dir.path()
    }

    pub fn error_log_path(&self) -> PathBuf {
        self.cache_dir().join(memocache::memoize::ERROR_LOG_FILE)
    }

    /// Configuration rooted in this fixture's directory
    pub fn config(&self, backend: BackendKind) -> MemoConfig {
        MemoConfig::new()
            .with_backend(backend)
            .with_cache_dir(self.cache_dir())
    }

    /// Simulates a process restart: same directory, fresh registry
    pub fn restart(&mut self) {
        self.registry = Arc::new(CacheRegistry::new());
    }

    pub fn error_log_lines(&self) -> Vec<String> {
        std::fs::read_to_string(self.error_log_path())
            .map(|s| s.lines().map(str::to_string).collect())
            .unwrap_or_default()
    }
}

/// Switches that make individual backend operations fail
#[derive(Default)]
pub struct Faults {
    pub setup: AtomicBool,
    pub contains: AtomicBool,
    pub get: AtomicBool,
    pub put: AtomicBool,
    pub put_attempts: AtomicUsize,
}

impl Faults {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn fail(flag: &AtomicBool) {
        flag.store(true, Ordering::SeqCst);
    }

    pub fn put_attempts(&self) -> usize {
        self.put_attempts.load(Ordering::SeqCst)
    }
}

pub struct FlakyBackend {
    inner: InMemoryBackend,
    faults: Arc<Faults>,
}

fn injected(operation: &str) -> CacheError {
    CacheError::Storage(format!("injected {} failure", operation))
}

impl Backend for FlakyBackend {
    fn setup(&mut self, handle: &BackendHandle) -> CacheResult<()> {
        if self.faults.setup.load(Ordering::SeqCst) {
            return Err(injected("setup"));
        }
        self.inner.setup(handle)
    }

    fn contains(&self, key: &CacheKey) -> CacheResult<bool> {
        if self.faults.contains.load(Ordering::SeqCst) {
            return Err(injected("contains"));
        }
        self.inner.contains(key)
    }

    fn get(&self, key: &CacheKey) -> CacheResult<CacheEntry> {
        if self.faults.get.load(Ordering::SeqCst) {
            return Err(injected("get"));
        }
        self.inner.get(key)
    }

    fn put(&self, key: &CacheKey, entry: &CacheEntry) -> CacheResult<()> {
        self.faults.put_attempts.fetch_add(1, Ordering::SeqCst);
        if self.faults.put.load(Ordering::SeqCst) {
            return Err(injected("put"));
        }
        self.inner.put(key, entry)
    }

    fn remove(&self, key: &CacheKey) -> CacheResult<bool> {
        self.inner.remove(key)
    }

    fn kind(&self) -> BackendKind {
        BackendKind::Memory
    }
}

/// Argument whose encoding always fails
pub struct Unencodable;

impl serde::Serialize for Unencodable {
    fn serialize<S: serde::Serializer>(&self, _: S) -> Result<S::Ok, S::Error> {
        Err(serde::ser::Error::custom("value cannot be encoded"))
    }
}

/// Factory producing [`FlakyBackend`]s that obey `faults`
pub fn flaky_factory(
    faults: Arc<Faults>,
) -> impl Fn() -> CacheResult<Box<dyn Backend>> + Send + Sync + 'static {
    move || {
        Ok(Box::new(FlakyBackend {
            inner: InMemoryBackend::new(),
            faults: faults.clone(),
        }) as Box<dyn Backend>)
    }
}
