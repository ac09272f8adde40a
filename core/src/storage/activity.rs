use crate::storage::{Error, Result};
use chrono::NaiveDateTime;
use std::path::PathBuf;
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Append-only, human-readable record of mutations, one line per event.
///
/// Recording never fails an operation. A write error is logged and dropped.
#[derive(Debug, Clone)]
pub struct ActivityLog {
    path: PathBuf,
}

impl ActivityLog {
    pub fn new(path: PathBuf) -> Self {
        ActivityLog { path }
    }

    /// Appends `[YYYY-MM-DD HH:MM:SS] message` as a new line.
    pub async fn record(&self, when: NaiveDateTime, message: &str) {
        let line = format!("[{}] {}\n", when.format(TIMESTAMP_FORMAT), message);
        if let Err(e) = self.append(line.as_bytes()).await {
            warn!("Failed to write activity log entry '{}': {}", message, e);
        }
    }

    async fn append(&self, line: &[u8]) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).await?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(line).await?;
        file.flush().await
    }

    /// Returns the whole log, or `None` if nothing has been recorded yet.
    pub async fn read(&self) -> Result<Option<String>> {
        match fs::read_to_string(&self.path).await {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(Error::Io(e)),
        }
    }

    /// Truncates the log. Clearing a log that does not exist is not an error.
    pub async fn clear(&self) -> Result<()> {
        match fs::metadata(&self.path).await {
            Ok(_) => {
                fs::write(&self.path, b"").await.map_err(Error::Io)?;
                debug!("Activity log cleared");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Error::Io(e)),
        }
    }
}
