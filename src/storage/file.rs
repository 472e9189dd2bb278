// Copyright (c) 2024-2025 Jesse Morgan / Morgan Forge
// SPDX-License-Identifier: AGPL-3.0-or-later

//! On-disk key-value store.
//!
//! The whole store is one JSON object in a single file. Reads take a shared
//! lock on a sibling `.lock` file; writes take an exclusive lock, rewrite the
//! map into a temp file and rename it over the original, so a crash mid-write
//! leaves the previous contents intact.

use anyhow::{bail, Context, Result};
use fs2::FileExt;
use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};

use super::KeyValueStore;

/// How long to wait for another process holding the store lock.
const LOCK_TIMEOUT: Duration = Duration::from_secs(5);

const LOCK_RETRY_INTERVAL: Duration = Duration::from_millis(25);

#[derive(Debug, Clone, Copy)]
enum LockMode {
    Shared,
    Exclusive,
}

/// JSON-file backed store surviving restarts.
#[derive(Debug, Clone)]
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    /// Open (lazily) the store at `path`. Nothing touches the disk until the
    /// first write.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `~/.schoolhub/storage.json`
    pub fn default_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".schoolhub")
            .join("storage.json")
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock_path(&self) -> PathBuf {
        self.path.with_extension("lock")
    }

    fn acquire_lock(&self, mode: LockMode) -> Result<File> {
        let lock_path = self.lock_path();
        if let Some(parent) = lock_path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create store directory: {:?}", parent))?;
        }

        let lock_file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&lock_path)
            .with_context(|| format!("Failed to open lock file: {:?}", lock_path))?;

        let start = Instant::now();
        loop {
            let attempt = match mode {
                LockMode::Shared => FileExt::try_lock_shared(&lock_file),
                LockMode::Exclusive => FileExt::try_lock_exclusive(&lock_file),
            };
            match attempt {
                Ok(()) => return Ok(lock_file),
                Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                    if start.elapsed() >= LOCK_TIMEOUT {
                        bail!(
                            "Timed out waiting for {:?} lock on {:?} after {:?}",
                            mode,
                            lock_path,
                            LOCK_TIMEOUT
                        );
                    }
                    thread::sleep(LOCK_RETRY_INTERVAL);
                }
                Err(e) => {
                    return Err(e)
                        .with_context(|| format!("Failed to lock store file: {:?}", lock_path));
                }
            }
        }
    }

    /// Raw file contents, `None` when missing or blank. The caller must hold
    /// a lock.
    fn read_content(&self) -> Result<Option<String>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read store file: {:?}", self.path))?;
        if content.trim().is_empty() {
            return Ok(None);
        }
        Ok(Some(content))
    }

    /// Read the map. The caller must hold a lock.
    fn read_map(&self) -> Result<BTreeMap<String, String>> {
        match self.read_content()? {
            Some(content) => serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse store file: {:?}", self.path)),
            None => Ok(BTreeMap::new()),
        }
    }

    /// Where unparseable contents are kept before a write replaces them.
    pub fn corrupt_path(&self) -> PathBuf {
        self.path.with_extension("corrupt")
    }

    /// Read the map for a write. Unparseable contents are copied aside and the
    /// write starts from an empty map. The caller must hold the exclusive lock.
    fn read_map_for_write(&self) -> Result<BTreeMap<String, String>> {
        let content = match self.read_content()? {
            Some(content) => content,
            None => return Ok(BTreeMap::new()),
        };
        match serde_json::from_str(&content) {
            Ok(map) => Ok(map),
            Err(e) => {
                let backup = self.corrupt_path();
                tracing::warn!(
                    "STORE_CORRUPT | path={:?} backup={:?} error={}",
                    self.path,
                    backup,
                    e
                );
                fs::write(&backup, &content)
                    .with_context(|| format!("Failed to keep corrupt store as {:?}", backup))?;
                Ok(BTreeMap::new())
            }
        }
    }

    /// Replace the map atomically. The caller must hold the exclusive lock.
    fn write_map(&self, map: &BTreeMap<String, String>) -> Result<()> {
        let temp_path = self.path.with_extension("tmp");
        let content =
            serde_json::to_string_pretty(map).context("Failed to serialize store contents")?;

        {
            let mut temp_file = OpenOptions::new()
                .write(true)
                .create(true)
                .truncate(true)
                .open(&temp_path)
                .with_context(|| format!("Failed to create temp file: {:?}", temp_path))?;
            temp_file
                .write_all(content.as_bytes())
                .context("Failed to write temp file")?;
            temp_file.sync_all().context("Failed to sync temp file")?;
        }

        fs::rename(&temp_path, &self.path).with_context(|| {
            format!("Failed to move {:?} over {:?}", temp_path, self.path)
        })
    }

    fn update<F>(&self, mutate: F) -> Result<()>
    where
        F: FnOnce(&mut BTreeMap<String, String>),
    {
        let _guard = self.acquire_lock(LockMode::Exclusive)?;
        let mut map = self.read_map_for_write()?;
        mutate(&mut map);
        self.write_map(&map)
    }
}

impl Default for FileStore {
    fn default() -> Self {
        Self::new(Self::default_path())
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let _guard = self.acquire_lock(LockMode::Shared)?;
        Ok(self.read_map()?.remove(key))
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.update(|map| {
            map.insert(key.to_string(), value.to_string());
        })
    }

    fn remove(&self, key: &str) -> Result<()> {
        if !self.path.exists() {
            return Ok(());
        }
        self.update(|map| {
            map.remove(key);
        })
    }
}
