use crate::storage::path::split_extension;
use crate::storage::{ConflictError, Error, Result};
use std::path::Path;
use tokio::fs;
use tracing::debug;

/// The name an entry is compared by: folders by their full name, files without extension.
pub(crate) fn comparison_key(name: &str, is_dir: bool) -> String {
    if is_dir {
        name.to_lowercase()
    } else {
        split_extension(name).0.to_lowercase()
    }
}

/// Checks whether `dir` already holds an entry whose comparison key matches `candidate`
/// case-insensitively.
///
/// An entry whose full path equals `exclude` (ignoring case) is skipped, which lets a
/// document be overwritten or renamed onto a differently-cased spelling of itself.
/// A directory that does not exist has no entries and therefore no conflicts.
pub(crate) async fn conflicts(dir: &Path, candidate: &str, exclude: Option<&Path>) -> Result<bool> {
    debug!("Checking for conflicts for name '{}' in directory '{}'", candidate, dir.display());

    let mut read_dir = match fs::read_dir(dir).await {
        Ok(rd) => rd,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            // The operation will create the directory later.
            return Ok(false);
        }
        Err(e) => return Err(Error::Io(e)),
    };

    let candidate = candidate.to_lowercase();
    let exclude = exclude.map(|p| p.to_string_lossy().to_lowercase());

    while let Some(entry) = read_dir.next_entry().await.map_err(Error::Io)? {
        let path = entry.path();
        if exclude.as_deref() == Some(path.to_string_lossy().to_lowercase().as_str()) {
            continue;
        }

        let file_name_os = entry.file_name();
        let Some(file_name) = file_name_os.to_str() else { continue; }; // Skip non-unicode filenames
        let is_dir = entry.file_type().await.map_err(Error::Io)?.is_dir();

        if comparison_key(file_name, is_dir) == candidate {
            debug!("Conflict found: {}", path.display());
            return Ok(true);
        }
    }

    debug!("No conflicts found.");
    Ok(false)
}

/// Like [`conflicts`], but reports a collision as [`ConflictError::NameTaken`].
pub(crate) async fn ensure_available(dir: &Path, candidate: &str, exclude: Option<&Path>) -> Result<()> {
    if conflicts(dir, candidate, exclude).await? {
        return Err(ConflictError::NameTaken {
            dir: dir.to_path_buf(),
            name: candidate.to_string(),
        }
        .into());
    }
    Ok(())
}

/// Creates the missing directories between `root` and `dir`, checking every directory
/// that is about to be created against its future siblings first.
pub(crate) async fn create_parents(root: &Path, dir: &Path) -> Result<()> {
    let relative = dir
        .strip_prefix(root)
        .map_err(|_| Error::InvalidPath(dir.display().to_string()))?;

    let mut current = root.to_path_buf();
    let mut missing = false;
    for component in relative.components() {
        let name = component.as_os_str();
        let next = current.join(name);
        if missing || !fs::try_exists(&next).await.map_err(Error::Io)? {
            let name = name.to_string_lossy();
            ensure_available(&current, &name, None).await?;
            missing = true;
        }
        current = next;
    }

    if missing {
        fs::create_dir_all(dir).await.map_err(Error::Io)?;
    }
    Ok(())
}
