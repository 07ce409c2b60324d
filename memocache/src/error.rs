// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Error types for the memoization layer
//!
//! Cache-subsystem failures (`CacheError`) and failures raised by the wrapped
//! function travel on separate channels of `MemoError`, so one can never be
//! mistaken for the other.

use thiserror::Error;

/// Errors raised by the cache subsystem itself
#[derive(Error, Debug)]
pub enum CacheError {
    /// Argument or return value could not be encoded or decoded
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Requested key is absent from the backend
    #[error("Key not found: {0}")]
    KeyNotFound(String),

    /// Backend storage failed (disk, embedded database, remote service)
    #[error("Storage error: {0}")]
    Storage(String),

    /// The backend a wrapper was linked to is no longer held by its registry
    #[error("Backend for '{0}' is no longer registered")]
    RegistryClosed(String),
}

impl CacheError {
    /// True for the normal miss signal, which is never surfaced to callers
    pub fn is_not_found(&self) -> bool {
        matches!(self, CacheError::KeyNotFound(_))
    }
}

impl From<bincode::Error> for CacheError {
    fn from(e: bincode::Error) -> Self {
        CacheError::Serialization(e.to_string())
    }
}

#[cfg(feature = "sled-backend")]
impl From<sled::Error> for CacheError {
    fn from(e: sled::Error) -> Self {
        CacheError::Storage(e.to_string())
    }
}

/// Result type for cache-subsystem operations
pub type CacheResult<T> = Result<T, CacheError>;

/// Outcome of a memoized call that did not produce a value
#[derive(Error, Debug)]
pub enum MemoError<E> {
    /// The cache subsystem failed and `fail_silently` was off
    #[error(transparent)]
    Cache(#[from] CacheError),

    /// The wrapped function itself failed; passed through unchanged
    #[error("{0}")]
    Function(E),
}

impl<E> MemoError<E> {
    /// Returns the function's own error, if that is what failed
    pub fn into_function_error(self) -> Option<E> {
        match self {
            MemoError::Function(e) => Some(e),
            MemoError::Cache(_) => None,
        }
    }

    /// Returns the cache error, if the cache is what failed
    pub fn as_cache_error(&self) -> Option<&CacheError> {
        match self {
            MemoError::Cache(e) => Some(e),
            MemoError::Function(_) => None,
        }
    }
}
