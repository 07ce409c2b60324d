// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Per-key file backend
//!
//! Each entry lives in its own file named by the SHA-512 digest of the key,
//! inside a directory derived from the source unit. Separate processes only
//! contend when they write the very same key, and then the last rename wins.

use super::traits::Backend;
use super::types::{BackendKind, CacheEntry};
use crate::error::{CacheError, CacheResult};
use crate::keys::{BackendHandle, CacheKey};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// One file per cache key
#[derive(Debug)]
pub struct PerKeyFileBackend {
    cache_dir: PathBuf,
    dir: Option<PathBuf>,
}

impl PerKeyFileBackend {
    /// Create an unopened backend that will place directories under `cache_dir`
    pub fn new<P: AsRef<Path>>(cache_dir: P) -> Self {
        Self {
            cache_dir: cache_dir.as_ref().to_path_buf(),
            dir: None,
        }
    }

    /// Directory holding the entry files, once set up
    pub fn dir(&self) -> Option<&Path> {
        self.dir.as_deref()
    }

    fn entry_path(&self, key: &CacheKey) -> CacheResult<PathBuf> {
        self.dir
            .as_ref()
            .map(|dir| dir.join(key.digest()))
            .ok_or_else(|| CacheError::Storage("per-key file backend used before setup".to_string()))
    }
}

fn io_error(operation: &str, path: &Path, e: std::io::Error) -> CacheError {
    CacheError::Storage(format!("{} '{}': {}", operation, path.display(), e))
}

impl Backend for PerKeyFileBackend {
    fn setup(&mut self, handle: &BackendHandle) -> CacheResult<()> {
        let dir = handle.per_key_dir(&self.cache_dir);
        // create_dir_all tolerates the directory appearing concurrently
        fs::create_dir_all(&dir).map_err(|e| io_error("create cache directory", &dir, e))?;
        log::debug!("per-key cache directory ready at {}", dir.display());
        self.dir = Some(dir);
        Ok(())
    }

    fn contains(&self, key: &CacheKey) -> CacheResult<bool> {
        Ok(self.entry_path(key)?.is_file())
    }

    fn get(&self, key: &CacheKey) -> CacheResult<CacheEntry> {
        let path = self.entry_path(key)?;
        match fs::read(&path) {
            Ok(bytes) => CacheEntry::decode(&bytes),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                Err(CacheError::KeyNotFound(format!("{:?}", key)))
            }
            Err(e) => Err(io_error("read cache file", &path, e)),
        }
    }

    fn put(&self, key: &CacheKey, entry: &CacheEntry) -> CacheResult<()> {
        let path = self.entry_path(key)?;
        let bytes = entry.encode()?;

        // Write to a private temp file, then rename over the entry so readers
        // never observe a partial record
        let temp_path = path.with_extension(format!("tmp.{}", uuid::Uuid::new_v4()));
        if let Err(e) = fs::write(&temp_path, &bytes) {
            let _ = fs::remove_file(&temp_path);
            return Err(io_error("write cache file", &temp_path, e));
        }
        if let Err(e) = fs::rename(&temp_path, &path) {
            let _ = fs::remove_file(&temp_path);
            return Err(io_error("rename cache file", &path, e));
        }
        Ok(())
    }

    fn remove(&self, key: &CacheKey) -> CacheResult<bool> {
        let path = self.entry_path(key)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(io_error("remove cache file", &path, e)),
        }
    }

    fn kind(&self) -> BackendKind {
        BackendKind::PerKeyFile
    }
}
