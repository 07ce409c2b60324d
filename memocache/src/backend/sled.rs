// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Shared-file backend on top of sled
//!
//! Every function of a source unit writes into the same embedded database.
//! Writes are flushed immediately so they survive an abrupt exit. Sled takes
//! an exclusive lock on the database, so a second process opening the same
//! store fails in `setup`; writers from several processes are not serialized.

use super::traits::Backend;
use super::types::{BackendKind, CacheEntry};
use crate::error::{CacheError, CacheResult};
use crate::keys::{BackendHandle, CacheKey};
use std::path::{Path, PathBuf};

/// One sled database per source unit
pub struct SharedFileBackend {
    cache_dir: PathBuf,
    db: Option<sled::Db>,
}

impl SharedFileBackend {
    /// Create an unopened backend that will place stores under `cache_dir`
    pub fn new<P: AsRef<Path>>(cache_dir: P) -> Self {
        Self {
            cache_dir: cache_dir.as_ref().to_path_buf(),
            db: None,
        }
    }

    fn db(&self) -> CacheResult<&sled::Db> {
        self.db
            .as_ref()
            .ok_or_else(|| CacheError::Storage("shared-file backend used before setup".to_string()))
    }
}

impl Backend for SharedFileBackend {
    fn setup(&mut self, handle: &BackendHandle) -> CacheResult<()> {
        let path = handle.store_path(&self.cache_dir);
        log::debug!("opening shared cache store at {}", path.display());
        self.db = Some(sled::open(&path)?);
        Ok(())
    }

    fn contains(&self, key: &CacheKey) -> CacheResult<bool> {
        Ok(self.db()?.contains_key(key.as_bytes())?)
    }

    fn get(&self, key: &CacheKey) -> CacheResult<CacheEntry> {
        match self.db()?.get(key.as_bytes())? {
            Some(bytes) => CacheEntry::decode(&bytes),
            None => Err(CacheError::KeyNotFound(format!("{:?}", key))),
        }
    }

    fn put(&self, key: &CacheKey, entry: &CacheEntry) -> CacheResult<()> {
        let db = self.db()?;
        db.insert(key.as_bytes(), entry.encode()?)?;
        // Without the flush a killed process loses the write
        db.flush()?;
        Ok(())
    }

    fn remove(&self, key: &CacheKey) -> CacheResult<bool> {
        let db = self.db()?;
        let existed = db.remove(key.as_bytes())?.is_some();
        db.flush()?;
        Ok(existed)
    }

    fn kind(&self) -> BackendKind {
        BackendKind::SharedFile
    }
}
