// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Backend types: the stored entry record and backend selection

use crate::error::CacheResult;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Backend type configuration
///
/// Specifies which storage strategy holds the memoized values.
/// Each type has different persistence and concurrency characteristics.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum BackendKind {
    /// Process-local map, nothing persisted
    /// Best for: tests, short-lived processes
    Memory,

    /// One embedded key-value store per source unit, flushed on every write
    /// Best for: a single process reusing results across restarts
    SharedFile,

    /// One file per cache key inside a directory per source unit
    /// Best for: several processes sharing a cache directory
    PerKeyFile,

    /// External key-value service reached over the network
    /// Best for: caches shared between machines
    Network,
}

impl Default for BackendKind {
    fn default() -> Self {
        BackendKind::SharedFile
    }
}

impl std::str::FromStr for BackendKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "memory" => Ok(BackendKind::Memory),
            "shared-file" | "shared_file" | "sled" => Ok(BackendKind::SharedFile),
            "per-key-file" | "per_key_file" | "file" => Ok(BackendKind::PerKeyFile),
            "network" | "redis" => Ok(BackendKind::Network),
            _ => Err(format!(
                "Unknown backend type: {}. Valid options: memory, shared-file, per-key-file, network",
                s
            )),
        }
    }
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            BackendKind::Memory => "memory",
            BackendKind::SharedFile => "shared-file",
            BackendKind::PerKeyFile => "per-key-file",
            BackendKind::Network => "network",
        };
        write!(f, "{}", name)
    }
}

/// A stored result
///
/// Written once per computation; a later computation under the same key
/// replaces it wholesale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    /// Creation time, seconds since the UNIX epoch
    pub timestamp: f64,
    /// Encoded return value
    pub data: Vec<u8>,
}

impl CacheEntry {
    pub fn new(timestamp: f64, data: Vec<u8>) -> Self {
        Self { timestamp, data }
    }

    /// An entry is fresh while `now - timestamp < ttl`; no TTL means forever
    pub fn is_fresh(&self, ttl: Option<Duration>, now: f64) -> bool {
        match ttl {
            None => true,
            Some(ttl) => now - self.timestamp < ttl.as_secs_f64(),
        }
    }

    /// Record encoding used by the persistent backends
    pub fn encode(&self) -> CacheResult<Vec<u8>> {
        Ok(bincode::serialize(self)?)
    }

    pub fn decode(bytes: &[u8]) -> CacheResult<Self> {
        Ok(bincode::deserialize(bytes)?)
    }
}
