// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Append-only failure log
//!
//! Cache malfunctions are reported through the `log` facade and, when a path
//! is configured, appended to a file as `[timestamp] message` lines. Writing
//! the file can fail; such failures are dropped so logging never takes the
//! process down.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default)]
pub struct ErrorLog {
    path: Option<PathBuf>,
}

impl ErrorLog {
    pub fn new(path: Option<PathBuf>) -> Self {
        Self { path }
    }

    pub fn to_file(path: impl Into<PathBuf>) -> Self {
        Self::new(Some(path.into()))
    }

    /// Sink that only forwards to the `log` facade
    pub fn disabled() -> Self {
        Self::new(None)
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Record one failure
    pub fn record(&self, message: &str) {
        let line = message.replace(['\r', '\n'], " | ");
        log::error!("{}", line);

        if let Some(path) = &self.path {
            if let Err(e) = append_line(path, &line) {
                log::debug!("could not write error log {}: {}", path.display(), e);
            }
        }
    }
}

fn append_line(path: &Path, line: &str) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    writeln!(
        file,
        "[{}] {}",
        chrono::Local::now().format("%Y-%m-%dT%H:%M:%S%.6f"),
        line
    )
}
