//! Tree-wide repair of case-insensitive name collisions.
//!
//! Within each directory entries are visited in byte-wise lexical order of their names.
//! The first entry to claim a comparison key keeps its name; every later entry with the
//! same key is renamed by appending `-1`, `-2`, ... to its base name. The tie-break is a
//! fixed, reproducible order and carries no meaning beyond that.

use crate::storage::guard::comparison_key;
use crate::storage::path::{relative_string, split_extension};
use crate::storage::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info, instrument, warn};

/// A rename performed by the sweep, as slash-separated physical paths relative to the
/// data root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenameOperation {
    pub old_path: String,
    pub new_path: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Resolution {
    pub operation: RenameOperation,
    pub is_folder: bool,
}

struct Entry {
    name: String,
    is_dir: bool,
}

/// Walks the tree below `root` and renames every entry that collides with an earlier
/// sibling. Top-level dot entries are not visited.
///
/// An entry that cannot be given a free name or cannot be renamed is logged and skipped;
/// the renames already made are still returned. Failing to list the root is an error,
/// failing to list a subdirectory only skips that subtree.
#[instrument(skip(root), fields(root = %root.display()))]
pub(crate) async fn sweep(root: &Path) -> Result<Vec<Resolution>> {
    let mut resolutions = Vec::new();
    let mut pending = vec![root.to_path_buf()];

    while let Some(dir) = pending.pop() {
        let entries = match list_sorted(&dir).await {
            Ok(entries) => entries,
            Err(e) if dir == root => return Err(e),
            Err(e) => {
                warn!("Skipping unreadable directory {}: {}", dir.display(), e);
                continue;
            }
        };
        let at_root = dir == root;

        let mut taken: HashSet<String> = entries
            .iter()
            .map(|entry| comparison_key(&entry.name, entry.is_dir))
            .collect();
        let mut occupied: HashMap<String, PathBuf> = HashMap::new();
        let mut subdirs = Vec::new();

        for entry in entries {
            if at_root && entry.name.starts_with('.') {
                continue;
            }
            let path = dir.join(&entry.name);
            let key = comparison_key(&entry.name, entry.is_dir);

            let Some(winner) = occupied.get(&key) else {
                occupied.insert(key, path.clone());
                if entry.is_dir {
                    subdirs.push(path);
                }
                continue;
            };
            debug!("Conflict for '{}': {} and {}", key, winner.display(), path.display());

            let renamed = match free_name(&dir, &entry, &taken).await {
                Ok(new_name) => {
                    let new_path = dir.join(&new_name);
                    fs::rename(&path, &new_path).await.map(|()| (new_name, new_path)).map_err(Error::Io)
                }
                Err(e) => Err(e),
            };
            let (new_name, new_path) = match renamed {
                Ok(renamed) => renamed,
                Err(e) => {
                    warn!("Failed to rename conflicting item {}: {}", path.display(), e);
                    if entry.is_dir {
                        subdirs.push(path);
                    }
                    continue;
                }
            };

            let (Some(old_path), Some(new_relative)) =
                (relative_string(root, &path), relative_string(root, &new_path))
            else {
                continue;
            };
            info!("Renamed '{}' to '{}' to resolve a name conflict", old_path, new_relative);

            let new_key = comparison_key(&new_name, entry.is_dir);
            taken.insert(new_key.clone());
            occupied.insert(new_key, new_path.clone());
            if entry.is_dir {
                subdirs.push(new_path);
            }
            resolutions.push(Resolution {
                operation: RenameOperation { old_path, new_path: new_relative },
                is_folder: entry.is_dir,
            });
        }

        // Reversed so the stack visits subdirectories in lexical order.
        pending.extend(subdirs.into_iter().rev());
    }

    debug!("Sweep finished with {} renames", resolutions.len());
    Ok(resolutions)
}

async fn list_sorted(dir: &Path) -> Result<Vec<Entry>> {
    let mut read_dir = fs::read_dir(dir).await.map_err(Error::Io)?;
    let mut entries = Vec::new();
    while let Some(entry) = read_dir.next_entry().await.map_err(Error::Io)? {
        let Some(name) = entry.file_name().to_str().map(str::to_string) else {
            warn!("Skipping non-unicode entry: {}", entry.path().display());
            continue;
        };
        let is_dir = entry.file_type().await.map_err(Error::Io)?.is_dir();
        entries.push(Entry { name, is_dir });
    }
    entries.sort_by(|a, b| a.name.as_bytes().cmp(b.name.as_bytes()));
    Ok(entries)
}

/// The first `base-N[.ext]` that neither exists on disk nor collides with a key already
/// present in the directory.
async fn free_name(dir: &Path, entry: &Entry, taken: &HashSet<String>) -> Result<String> {
    let (base, ext) = if entry.is_dir {
        (entry.name.as_str(), None)
    } else {
        split_extension(&entry.name)
    };

    let mut counter = 1u32;
    loop {
        let candidate = match ext {
            Some(ext) => format!("{}-{}.{}", base, counter, ext),
            None => format!("{}-{}", base, counter),
        };
        let on_disk = fs::try_exists(dir.join(&candidate)).await.map_err(Error::Io)?;
        if !on_disk && !taken.contains(&comparison_key(&candidate, entry.is_dir)) {
            return Ok(candidate);
        }
        counter += 1;
    }
}
