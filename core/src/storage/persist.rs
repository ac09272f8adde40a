use crate::storage::{Error, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;

/// Reads a JSON state file. A missing or empty file yields the default value.
pub(crate) async fn read_json_or_default<T: DeserializeOwned + Default>(path: &Path) -> Result<T> {
    let content = match fs::read(path).await {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!("State file {} not found, starting empty", path.display());
            return Ok(T::default());
        }
        Err(e) => return Err(Error::Io(e)),
    };
    if content.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    Ok(serde_json::from_slice(&content)?)
}

/// Serializes `value` and replaces the file at `path` with it.
///
/// The content is written to a sibling file first and renamed over the target, so
/// readers see either the old or the new state.
pub(crate) async fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let content = serde_json::to_vec_pretty(value)?;
    let staging = staging_path(path);
    fs::write(&staging, content).await.map_err(Error::Io)?;
    fs::rename(&staging, path).await.map_err(Error::Io)?;
    debug!("State written successfully to {}", path.display());
    Ok(())
}

fn staging_path(path: &Path) -> PathBuf {
    let mut raw: OsString = path.as_os_str().to_owned();
    raw.push(".tmp");
    PathBuf::from(raw)
}
