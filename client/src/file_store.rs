//! Durable local store: one JSON file per key.
//!
//! Keys are percent-escaped into file names so any string key maps to a single
//! file inside the store directory. Writes go to a uniquely named temporary
//! file that is then renamed over the target, so a reader never observes a
//! half-written value.

use crate::error::storage_error;
use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tether_engine::{error::Result, LocalStore};

const EXTENSION: &str = ".json";
const TEMP_EXTENSION: &str = ".tmp";

/// A [`LocalStore`] backed by a directory.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    /// Open (creating if needed) the store at `dir`.
    pub async fn open(dir: impl Into<PathBuf>) -> std::io::Result<Self> {
        let dir = dir.into();
        tokio::fs::create_dir_all(&dir).await?;
        tracing::debug!(dir = %dir.display(), "Opened file store");
        Ok(Self { dir })
    }

    /// The store directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}{}", encode_key(key), EXTENSION))
    }
}

#[async_trait]
impl LocalStore for FileStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        match tokio::fs::read_to_string(self.path_for(key)).await {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(storage_error(&format!("read {}", key), e)),
        }
    }

    async fn set(&self, key: &str, value: String) -> Result<()> {
        let target = self.path_for(key);
        let temp = self.dir.join(format!(
            ".{}.{}{}",
            encode_key(key),
            uuid::Uuid::new_v4().simple(),
            TEMP_EXTENSION
        ));

        if let Err(e) = tokio::fs::write(&temp, value.as_bytes()).await {
            return Err(storage_error(&format!("write {}", key), e));
        }
        if let Err(e) = tokio::fs::rename(&temp, &target).await {
            let _ = tokio::fs::remove_file(&temp).await;
            return Err(storage_error(&format!("commit {}", key), e));
        }
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        match tokio::fs::remove_file(self.path_for(key)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(storage_error(&format!("remove {}", key), e)),
        }
    }

    async fn keys(&self) -> Result<Vec<String>> {
        let mut entries = tokio::fs::read_dir(&self.dir)
            .await
            .map_err(|e| storage_error("list", e))?;
        let mut keys = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| storage_error("list", e))?
        {
            let name = entry.file_name();
            let Some(name) = name.to_str() else {
                continue;
            };
            if name.starts_with('.') {
                continue;
            }
            let Some(stem) = name.strip_suffix(EXTENSION) else {
                continue;
            };
            match decode_key(stem) {
                Some(key) => keys.push(key),
                None => tracing::warn!(file = %name, "Ignoring unrecognised file in store"),
            }
        }
        Ok(keys)
    }
}

/// Percent-encode `key` into a file stem. A leading `.` is escaped too so
/// keys never collide with hidden temporary files.
pub(crate) fn encode_key(key: &str) -> String {
    let encoded = urlencoding::encode(key);
    match encoded.strip_prefix('.') {
        Some(rest) => format!("%2E{}", rest),
        None => encoded.into_owned(),
    }
}

pub(crate) fn decode_key(encoded: &str) -> Option<String> {
    urlencoding::decode(encoded).ok().map(|key| key.into_owned())
}
