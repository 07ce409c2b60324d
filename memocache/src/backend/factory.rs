// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Backend factory
//!
//! This module provides factory functions for creating backends based on configuration.
//! Backends come back unopened; the registry runs `setup` on them.

use super::file::PerKeyFileBackend;
use super::memory::InMemoryBackend;
use super::traits::{Backend, BackendFactory};
use super::types::BackendKind;
use crate::error::CacheResult;
use std::path::PathBuf;

/// Everything needed to build any backend variant
#[derive(Debug, Clone, PartialEq)]
pub struct BackendOptions {
    pub kind: BackendKind,
    /// Directory under which file-based stores are created
    pub cache_dir: PathBuf,
    /// Endpoint for the network backend
    pub remote_url: String,
}

impl BackendFactory for BackendOptions {
    fn create(&self) -> CacheResult<Box<dyn Backend>> {
        create_backend(self)
    }
}

/// Factory function to create a backend based on configuration
///
/// # Arguments
/// * `options` - Backend kind plus the cache directory / endpoint it needs
///
/// # Returns
/// A boxed, not yet set up, trait object that implements Backend
pub fn create_backend(options: &BackendOptions) -> CacheResult<Box<dyn Backend>> {
    match options.kind {
        BackendKind::Memory => Ok(Box::new(InMemoryBackend::new())),
        BackendKind::PerKeyFile => Ok(Box::new(PerKeyFileBackend::new(&options.cache_dir))),
        #[cfg(feature = "sled-backend")]
        BackendKind::SharedFile => {
            use crate::backend::sled::SharedFileBackend;
            Ok(Box::new(SharedFileBackend::new(&options.cache_dir)))
        }
        #[cfg(not(feature = "sled-backend"))]
        BackendKind::SharedFile => Err(crate::error::CacheError::Storage(
            "shared-file backend requires the `sled-backend` feature".to_string(),
        )),
        #[cfg(feature = "redis-backend")]
        BackendKind::Network => {
            use crate::backend::network::{NetworkBackend, RedisStore};
            let store = RedisStore::open(&options.remote_url)?;
            Ok(Box::new(NetworkBackend::new(Box::new(store))))
        }
        #[cfg(not(feature = "redis-backend"))]
        BackendKind::Network => Err(crate::error::CacheError::Storage(format!(
            "network backend for {} requires the `redis-backend` feature",
            options.remote_url
        ))),
    }
}
