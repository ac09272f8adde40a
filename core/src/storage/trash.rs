//! Moving items to the trash and back.
//!
//! A trashed item lives directly under `.trash/` with its trash name (see [`TrashName`]),
//! which doubles as its identifier. The origins ledger remembers the folder each item
//! came from so it can be restored there. Items without a ledger entry restore to the
//! data root under their suffix-stripped name.

use crate::storage::folder::{self, TreeItem};
use crate::storage::guard::{self, comparison_key};
use crate::storage::path::{logical_from_relative, logical_path_of, relative_string, strip_trash_suffix, TrashName};
use crate::storage::persist;
use crate::storage::workspace::split_parent;
use crate::storage::{validate_logical, ConflictError, Error, Result, Workspace};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, instrument, warn};

/// Maps a trash name to the relative physical path the item had before it was trashed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub(crate) struct TrashOrigins {
    entries: BTreeMap<String, String>,
}

impl TrashOrigins {
    fn insert(&mut self, trash_name: String, origin: String) {
        self.entries.insert(trash_name, origin);
    }

    fn get(&self, trash_name: &str) -> Option<&str> {
        self.entries.get(trash_name).map(String::as_str)
    }

    fn remove(&mut self, trash_name: &str) -> bool {
        self.entries.remove(trash_name).is_some()
    }
}

/// Trash ids are bare entry names inside `.trash/`.
fn validate_trash_id(id: &str) -> Result<()> {
    if id.is_empty() || id == "." || id == ".." || id.contains('/') || id.contains('\\') {
        return Err(Error::InvalidPath(id.to_string()));
    }
    Ok(())
}

struct TrashedItem {
    path: PathBuf,
    is_dir: bool,
    /// Relative physical path the item is restored to.
    origin: String,
}

impl Workspace {
    /// Moves the document or folder `logical` into the trash and returns its trash id.
    ///
    /// The item and everything inside it stop being reference sources or targets.
    #[instrument(skip(self))]
    pub async fn trash(&self, logical: &str) -> Result<String> {
        validate_logical(logical)?;
        let _writer = self.writer.lock().await;

        let resolved = self.resolve_existing(logical).await?;
        let logical = logical_path_of(&self.absolute_path, &resolved.path, resolved.is_dir)?;
        let origin = relative_string(&self.absolute_path, &resolved.path)
            .ok_or_else(|| Error::InvalidPath(logical.clone()))?;
        let file_name = resolved
            .path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| Error::InvalidPath(logical.clone()))?;

        let trash_name = TrashName::new(file_name, resolved.is_dir, self.clock.now()).to_string();
        let destination = self.trash_dir.join(&trash_name);
        if fs::try_exists(&destination).await.map_err(Error::Io)? {
            return Err(ConflictError::TrashSlotTaken(trash_name).into());
        }

        let removed = self.affected_documents(&logical, &resolved.path, resolved.is_dir).await?;

        fs::create_dir_all(&self.trash_dir).await.map_err(Error::Io)?;
        fs::rename(&resolved.path, &destination).await.map_err(Error::Io)?;
        debug!("Moved {} to {}", resolved.path.display(), destination.display());

        self.update_origins(|origins| origins.insert(trash_name.clone(), origin)).await;
        self.update_index(|index| {
            for document in &removed {
                index.record_delete(document);
            }
        })
        .await;
        self.log(format!("TRASH: Moved '{}' to trash as '{}'", logical, trash_name)).await;
        Ok(trash_name)
    }

    /// Moves a trashed item back to where it came from and returns its logical path.
    ///
    /// On a name collision at the destination the item stays in the trash.
    #[instrument(skip(self))]
    pub async fn restore(&self, id: &str) -> Result<String> {
        validate_trash_id(id)?;
        let _writer = self.writer.lock().await;

        let item = self.trashed_item(id).await?;
        let destination = self.absolute_path.join(&item.origin);
        let (dir, name) = split_parent(&destination, &item.origin)?;
        guard::ensure_available(&dir, &comparison_key(name, item.is_dir), None).await?;
        guard::create_parents(&self.absolute_path, &dir).await?;

        fs::rename(&item.path, &destination).await.map_err(Error::Io)?;
        debug!("Restored {} to {}", item.path.display(), destination.display());
        self.update_origins(|origins| {
            origins.remove(id);
        })
        .await;

        let logical = logical_from_relative(&item.origin, item.is_dir);
        let restored = if item.is_dir {
            let mut documents = self.affected_documents(&logical, &destination, true).await?;
            documents.remove(0);
            documents
        } else {
            vec![logical.clone()]
        };
        let mut contents = Vec::with_capacity(restored.len());
        for document in restored {
            match self.read_document(&document).await {
                Ok((bytes, _)) => contents.push((document, String::from_utf8_lossy(&bytes).into_owned())),
                Err(e) => warn!("Could not reindex restored document '{}': {}", document, e),
            }
        }
        self.update_index(|index| {
            for (document, content) in &contents {
                index.record_save(document, content);
            }
        })
        .await;

        self.log(format!("RESTORE: Restored '{}' to '{}'", id, logical)).await;
        Ok(logical)
    }

    /// Removes a trashed item for good.
    #[instrument(skip(self))]
    pub async fn delete_permanently(&self, id: &str) -> Result<()> {
        validate_trash_id(id)?;
        let _writer = self.writer.lock().await;

        let item = self.trashed_item(id).await?;
        let logical = logical_from_relative(&item.origin, item.is_dir);
        let removed = self.affected_documents(&logical, &item.path, item.is_dir).await?;
        self.update_index(|index| {
            for document in &removed {
                index.record_delete(document);
            }
        })
        .await;

        remove_entry(&item.path, item.is_dir).await?;
        self.update_origins(|origins| {
            origins.remove(id);
        })
        .await;

        self.log(format!("DELETE: Permanently deleted '{}'", id)).await;
        Ok(())
    }

    /// Removes everything in the trash and returns the number of removed items.
    ///
    /// Backlinks recorded for the removed items are left as they are. Every entry is
    /// attempted; the first failure is returned after the rest have been processed.
    #[instrument(skip(self))]
    pub async fn empty_trash(&self) -> Result<usize> {
        let _writer = self.writer.lock().await;

        let entries = folder::list_entries(&self.trash_dir).await?;
        let mut removed = Vec::new();
        let mut first_error = None;
        for entry in entries {
            let path = self.trash_dir.join(&entry.name);
            match remove_entry(&path, entry.kind == folder::ItemKind::Folder).await {
                Ok(()) => removed.push(entry.name),
                Err(e) => {
                    warn!("Failed to remove trash item {}: {}", path.display(), e);
                    first_error.get_or_insert(e);
                }
            }
        }

        self.update_origins(|origins| {
            for name in &removed {
                origins.remove(name);
            }
        })
        .await;
        self.log(format!("EMPTY TRASH: Removed {} items", removed.len())).await;

        match first_error {
            Some(e) => Err(e),
            None => Ok(removed.len()),
        }
    }

    /// Lists the trash by physical entry name.
    pub async fn list_trash(&self) -> Result<Vec<TreeItem>> {
        folder::list_entries(&self.trash_dir).await
    }

    async fn trashed_item(&self, id: &str) -> Result<TrashedItem> {
        let path = self.trash_dir.join(id);
        let is_dir = match fs::metadata(&path).await {
            Ok(meta) => meta.is_dir(),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(Error::NotFound(id.to_string()));
            }
            Err(e) => return Err(Error::Io(e)),
        };
        let origin = match self.origins.lock().await.get(id) {
            Some(origin) => origin.to_string(),
            None => strip_trash_suffix(id),
        };
        validate_logical(&origin)?;
        Ok(TrashedItem { path, is_dir, origin })
    }

    /// The logical paths of the documents that an item at `path` stands for: the item
    /// itself, plus every document inside when it is a folder.
    async fn affected_documents(&self, logical: &str, path: &Path, is_dir: bool) -> Result<Vec<String>> {
        let mut documents = vec![logical.to_string()];
        if is_dir {
            documents.extend(
                folder::documents_under(path)
                    .await?
                    .into_iter()
                    .map(|inner| format!("{}/{}", logical, inner)),
            );
        }
        Ok(documents)
    }

    async fn update_origins<F>(&self, change: F)
    where
        F: FnOnce(&mut TrashOrigins),
    {
        let mut origins = self.origins.lock().await;
        change(&mut origins);
        if let Err(e) = persist::write_json(&self.origins_path, &*origins).await {
            warn!("Failed to persist trash origins: {}", e);
        }
    }
}

async fn remove_entry(path: &Path, is_dir: bool) -> Result<()> {
    if is_dir {
        fs::remove_dir_all(path).await.map_err(Error::Io)
    } else {
        fs::remove_file(path).await.map_err(Error::Io)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::FixedClock;
    use chrono::{NaiveDate, NaiveDateTime};
    use std::sync::Arc;
    use tempfile::tempdir;

    fn moment(second: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 2, 3).unwrap().and_hms_opt(4, 5, second).unwrap()
    }

    async fn workspace(root: &Path) -> (Workspace, Arc<FixedClock>) {
        let clock = Arc::new(FixedClock::new(moment(6)));
        let ws = Workspace::open_with_clock(root, clock.clone()).await.unwrap();
        (ws, clock)
    }

    #[test]
    fn test_validate_trash_id() {
        assert!(validate_trash_id("a_20260203040506.md").is_ok());
        for bad in ["", ".", "..", "x/y", "x\\y"] {
            assert!(matches!(validate_trash_id(bad), Err(Error::InvalidPath(_))));
        }
    }

    #[tokio::test]
    async fn test_trash_names_item_with_timestamp() {
        let dir = tempdir().unwrap();
        let (ws, _) = workspace(dir.path()).await;
        ws.save("report", b"").await.unwrap();

        let id = ws.trash("report").await.unwrap();

        assert_eq!(id, "report_20260203040506.md");
        assert!(ws.path().join(".trash").join(&id).is_file());
        assert!(!ws.path().join("report.md").exists());
    }

    #[tokio::test]
    async fn test_trash_twice_in_same_second_is_a_conflict() {
        let dir = tempdir().unwrap();
        let (ws, clock) = workspace(dir.path()).await;
        ws.save("x", b"1").await.unwrap();
        ws.trash("x").await.unwrap();
        ws.save("x", b"2").await.unwrap();

        let result = ws.trash("x").await;
        assert!(matches!(result, Err(Error::Conflict(ConflictError::TrashSlotTaken(_)))));
        assert!(ws.path().join("x.md").is_file());

        clock.set(moment(7));
        assert_eq!(ws.trash("x").await.unwrap(), "x_20260203040507.md");
    }

    #[tokio::test]
    async fn test_restore_returns_to_original_folder() {
        let dir = tempdir().unwrap();
        let (ws, _) = workspace(dir.path()).await;
        ws.save("projects/plan", b"@(goals)").await.unwrap();

        let id = ws.trash("projects/plan").await.unwrap();
        assert!(ws.backlinks("goals").await.is_empty());

        let restored = ws.restore(&id).await.unwrap();
        assert_eq!(restored, "projects/plan");
        assert!(ws.path().join("projects/plan.md").is_file());
        assert_eq!(ws.backlinks("goals").await, vec!["projects/plan".to_string()]);
        assert!(ws.list_trash().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_restore_without_ledger_entry_goes_to_root() {
        let dir = tempdir().unwrap();
        let (ws, _) = workspace(dir.path()).await;
        fs::write(ws.path().join(".trash/loose_20250101120000.txt"), "@(x)").await.unwrap();

        let restored = ws.restore("loose_20250101120000.txt").await.unwrap();

        assert_eq!(restored, "loose");
        assert!(ws.path().join("loose.txt").is_file());
        assert_eq!(ws.backlinks("x").await, vec!["loose".to_string()]);
    }

    #[tokio::test]
    async fn test_restore_conflict_leaves_item_in_trash() {
        let dir = tempdir().unwrap();
        let (ws, _) = workspace(dir.path()).await;
        ws.save("note", b"old").await.unwrap();
        let id = ws.trash("note").await.unwrap();
        ws.save("NOTE", b"new").await.unwrap();

        let result = ws.restore(&id).await;

        assert!(matches!(result, Err(Error::Conflict(ConflictError::NameTaken { .. }))));
        assert!(ws.path().join(".trash").join(&id).is_file());
    }

    #[tokio::test]
    async fn test_folder_trash_and_restore_reindexes_contents() {
        let dir = tempdir().unwrap();
        let (ws, _) = workspace(dir.path()).await;
        ws.save("f/a", b"@(t)").await.unwrap();
        ws.save("f/sub/b", b"@(t)").await.unwrap();
        ws.save("reader", b"@(f/a)").await.unwrap();

        let id = ws.trash("f").await.unwrap();
        assert_eq!(id, "f_20260203040506");
        assert!(ws.backlinks("t").await.is_empty());
        assert!(ws.backlinks("f/a").await.is_empty());

        ws.restore(&id).await.unwrap();
        let mut sources = ws.backlinks("t").await;
        sources.sort();
        assert_eq!(sources, vec!["f/a".to_string(), "f/sub/b".to_string()]);
    }

    #[tokio::test]
    async fn test_delete_permanently_and_missing_ids() {
        let dir = tempdir().unwrap();
        let (ws, _) = workspace(dir.path()).await;
        ws.save("gone", b"").await.unwrap();
        let id = ws.trash("gone").await.unwrap();

        ws.delete_permanently(&id).await.unwrap();

        assert!(!ws.path().join(".trash").join(&id).exists());
        assert!(matches!(ws.delete_permanently(&id).await, Err(Error::NotFound(_))));
        assert!(matches!(ws.restore(&id).await, Err(Error::NotFound(_))));
    }

    #[tokio::test]
    async fn test_empty_trash_keeps_index() {
        let dir = tempdir().unwrap();
        let (ws, clock) = workspace(dir.path()).await;
        ws.save("a", b"").await.unwrap();
        ws.create_folder("f").await.unwrap();
        ws.trash("a").await.unwrap();
        clock.set(moment(8));
        ws.trash("f").await.unwrap();
        ws.save("b", b"@(a)").await.unwrap();

        assert_eq!(ws.empty_trash().await.unwrap(), 2);

        assert!(ws.list_trash().await.unwrap().is_empty());
        assert_eq!(ws.backlinks("a").await, vec!["b".to_string()]);
    }

    #[tokio::test]
    async fn test_trash_missing_item() {
        let dir = tempdir().unwrap();
        let (ws, _) = workspace(dir.path()).await;

        assert!(matches!(ws.trash("nothing").await, Err(Error::NotFound(_))));
    }
}
