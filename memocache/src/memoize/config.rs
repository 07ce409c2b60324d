// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Memoization configuration and named validity periods

use crate::backend::{BackendKind, BackendOptions, DEFAULT_REMOTE_URL};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

pub const SECOND: Duration = Duration::from_secs(1);
pub const MINUTE: Duration = Duration::from_secs(60);
pub const HOUR: Duration = Duration::from_secs(60 * 60);
pub const DAY: Duration = Duration::from_secs(24 * 60 * 60);
pub const WEEK: Duration = Duration::from_secs(7 * 24 * 60 * 60);
/// Thirty days
pub const MONTH: Duration = Duration::from_secs(30 * 24 * 60 * 60);
/// 365 days
pub const YEAR: Duration = Duration::from_secs(365 * 24 * 60 * 60);
/// Entries never expire
pub const FOREVER: Option<Duration> = None;

/// Default directory for file-based stores, relative to the working directory
pub const DEFAULT_CACHE_DIR: &str = ".memocache";

/// File name of the failure log inside the cache directory
pub const ERROR_LOG_FILE: &str = "memocache.err.log";

/// Settings shared by every wrapper a [`Memoizer`](super::Memoizer) produces
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoConfig {
    /// How long an entry stays fresh; `None` keeps it forever
    pub ttl: Option<Duration>,

    /// Swallow (and log) cache failures instead of returning them
    pub fail_silently: bool,

    /// Storage strategy
    pub backend: BackendKind,

    /// Root directory for file-based stores
    pub cache_dir: PathBuf,

    /// Where failure records are appended; `None` disables the file sink
    pub error_log: Option<PathBuf>,

    /// Endpoint of the remote cache for the network backend
    pub remote_url: String,
}

impl Default for MemoConfig {
    fn default() -> Self {
        let cache_dir = PathBuf::from(DEFAULT_CACHE_DIR);
        Self {
            ttl: FOREVER,
            fail_silently: false,
            backend: BackendKind::default(),
            error_log: Some(cache_dir.join(ERROR_LOG_FILE)),
            cache_dir,
            remote_url: DEFAULT_REMOTE_URL.to_string(),
        }
    }
}

impl MemoConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    pub fn forever(mut self) -> Self {
        self.ttl = FOREVER;
        self
    }

    pub fn fail_silently(mut self, fail_silently: bool) -> Self {
        self.fail_silently = fail_silently;
        self
    }

    pub fn with_backend(mut self, backend: BackendKind) -> Self {
        self.backend = backend;
        self
    }

    /// Move the cache directory; a default-located error log moves with it
    pub fn with_cache_dir(mut self, cache_dir: impl Into<PathBuf>) -> Self {
        let cache_dir = cache_dir.into();
        if self.error_log == Some(self.cache_dir.join(ERROR_LOG_FILE)) {
            self.error_log = Some(cache_dir.join(ERROR_LOG_FILE));
        }
        self.cache_dir = cache_dir;
        self
    }

    pub fn with_error_log(mut self, path: impl Into<PathBuf>) -> Self {
        self.error_log = Some(path.into());
        self
    }

    pub fn without_error_log(mut self) -> Self {
        self.error_log = None;
        self
    }

    pub fn with_remote_url(mut self, url: impl Into<String>) -> Self {
        self.remote_url = url.into();
        self
    }

    /// Backend construction parameters derived from this configuration
    pub fn backend_options(&self) -> BackendOptions {
        BackendOptions {
            kind: self.backend,
            cache_dir: self.cache_dir.clone(),
            remote_url: self.remote_url.clone(),
        }
    }
}
