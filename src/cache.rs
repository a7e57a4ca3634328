//! Append-only JSON Lines record store.
//!
//! Each record is one line. Appends open the file, write one complete line and
//! close it again, so an interrupted run loses at most the record in flight.
//! The first append through a store terminates a partial last line left by
//! such a run. Appends through one [`CacheStore`] are serialized, and lines
//! that are not valid UTF-8 JSON are skipped on load.

use std::io::{ErrorKind, SeekFrom};
use std::marker::PhantomData;
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;
use tokio::fs::{self, File, OpenOptions};
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt};
use tokio::sync::Mutex;
use tracing::{debug, instrument, warn};

/// Errors from reading or writing a cache file.
#[derive(Debug, Error)]
pub enum CacheError {
    /// File system error on the cache file.
    #[error("IO error on cache file {path}: {source}")]
    Io {
        /// The cache file path.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// A record could not be serialized.
    #[error("failed to serialize cache record: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl CacheError {
    fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// JSON Lines store of `T` records.
#[derive(Debug)]
pub struct CacheStore<T> {
    path: PathBuf,
    /// Guards writes; holds whether the file tail has been checked for a torn line.
    write_lock: Mutex<bool>,
    _record: PhantomData<fn() -> T>,
}

impl<T> CacheStore<T>
where
    T: Serialize + DeserializeOwned,
{
    /// Creates a store over `path`. Nothing is touched until the first load or append.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(false),
            _record: PhantomData,
        }
    }

    /// Path of the backing file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads every record in append order.
    ///
    /// A missing file is an empty store. Lines that do not parse (such as a
    /// partial last line left by a killed process) are skipped with a warning.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::Io`] when an existing file cannot be read.
    #[instrument(level = "debug", skip(self), fields(path = %self.path.display()))]
    pub async fn load(&self) -> Result<Vec<T>, CacheError> {
        let contents = match fs::read(&self.path).await {
            Ok(contents) => contents,
            Err(error) if error.kind() == ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "cache file does not exist yet");
                return Ok(Vec::new());
            }
            Err(error) => return Err(CacheError::io(&self.path, error)),
        };

        let mut records = Vec::new();
        for (index, line) in contents.split(|byte| *byte == b'\n').enumerate() {
            if line.iter().all(u8::is_ascii_whitespace) {
                continue;
            }
            match serde_json::from_slice(line) {
                Ok(record) => records.push(record),
                Err(error) => warn!(
                    path = %self.path.display(),
                    line = index + 1,
                    error = %error,
                    "skipping unreadable cache line"
                ),
            }
        }
        debug!(path = %self.path.display(), records = records.len(), "cache loaded");
        Ok(records)
    }

    /// Appends one record as one line.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError`] when the record cannot be serialized or written.
    pub async fn append(&self, record: &T) -> Result<(), CacheError> {
        let mut line = serde_json::to_string(record)?;
        line.push('\n');

        let mut tail_checked = self.write_lock.lock().await;
        let mut file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(&self.path)
            .await
            .map_err(|error| CacheError::io(&self.path, error))?;

        if !*tail_checked {
            if ends_mid_line(&mut file)
                .await
                .map_err(|error| CacheError::io(&self.path, error))?
            {
                warn!(
                    path = %self.path.display(),
                    "cache file ends with a partial line; starting a new one"
                );
                line.insert(0, '\n');
            }
            *tail_checked = true;
        }

        file.write_all(line.as_bytes())
            .await
            .map_err(|error| CacheError::io(&self.path, error))?;
        file.flush()
            .await
            .map_err(|error| CacheError::io(&self.path, error))?;
        Ok(())
    }

    /// Empties the file, creating it if needed.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::Io`] when the file cannot be truncated.
    #[instrument(level = "debug", skip(self), fields(path = %self.path.display()))]
    pub async fn truncate(&self) -> Result<(), CacheError> {
        let mut tail_checked = self.write_lock.lock().await;
        *tail_checked = true;
        fs::write(&self.path, b"")
            .await
            .map_err(|error| CacheError::io(&self.path, error))
    }
}

/// True when the file is non-empty and its last byte is not a newline.
async fn ends_mid_line(file: &mut File) -> std::io::Result<bool> {
    if file.metadata().await?.len() == 0 {
        return Ok(false);
    }
    file.seek(SeekFrom::End(-1)).await?;
    let mut last = [0_u8; 1];
    file.read_exact(&mut last).await?;
    Ok(last[0] != b'\n')
}
