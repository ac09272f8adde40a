use crate::storage::activity::ActivityLog;
use crate::storage::clock::{Clock, SystemClock};
use crate::storage::document::{self, Resolved};
use crate::storage::folder::{self, TreeItem};
use crate::storage::guard;
use crate::storage::path::{
    logical_from_relative, logical_path_of, relative_string, validate_logical,
    with_appended_extension,
};
use crate::storage::persist;
use crate::storage::references::ReferenceIndex;
use crate::storage::sweep::{self, RenameOperation};
use crate::storage::trash::TrashOrigins;
use crate::storage::{
    Error, Result, ACTIVITY_LOG_FILENAME, IMAGES_DIR_NAME, LOGS_DIR_NAME, REFERENCES_FILENAME,
    TRASH_DIR_NAME, TRASH_ORIGINS_FILENAME,
};
use mime::Mime;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, instrument, warn};

/// A document store rooted at one data directory.
///
/// All tree-mutating operations take the writer lock for their whole
/// guard, mutate, reindex sequence, so they never interleave.
#[derive(Debug)]
pub struct Workspace {
    pub(super) absolute_path: PathBuf,
    pub(super) trash_dir: PathBuf,
    references_path: PathBuf,
    pub(super) origins_path: PathBuf,
    references: RwLock<ReferenceIndex>,
    pub(super) origins: Mutex<TrashOrigins>,
    pub(super) writer: Mutex<()>,
    activity: ActivityLog,
    pub(super) clock: Arc<dyn Clock>,
}

impl Workspace {
    /// Opens the store at `path` using the host's local time.
    ///
    /// The directory and the internal layout are created if missing.
    pub async fn open(path: &Path) -> Result<Self> {
        Self::open_with_clock(path, Arc::new(SystemClock)).await
    }

    #[instrument(skip(path, clock), fields(path = %path.display()))]
    pub async fn open_with_clock(path: &Path, clock: Arc<dyn Clock>) -> Result<Self> {
        debug!("Attempting to open workspace");

        match fs::metadata(path).await {
            Ok(meta) if !meta.is_dir() => {
                return Err(Error::InvalidPath(format!("Path is not a directory: {}", path.display())));
            }
            Ok(_) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("Data directory missing, creating it");
                fs::create_dir_all(path).await.map_err(Error::Io)?;
            }
            Err(e) => return Err(Error::Io(e)),
        }

        let absolute_path = fs::canonicalize(path).await.map_err(Error::Io)?;
        debug!("Canonicalized workspace path: {}", absolute_path.display());

        for internal in [TRASH_DIR_NAME, IMAGES_DIR_NAME, LOGS_DIR_NAME] {
            fs::create_dir_all(absolute_path.join(internal)).await.map_err(Error::Io)?;
        }

        let references_path = absolute_path.join(REFERENCES_FILENAME);
        let origins_path = absolute_path.join(TRASH_ORIGINS_FILENAME);
        let references: ReferenceIndex = persist::read_json_or_default(&references_path).await?;
        let origins: TrashOrigins = persist::read_json_or_default(&origins_path).await?;
        let activity = ActivityLog::new(absolute_path.join(LOGS_DIR_NAME).join(ACTIVITY_LOG_FILENAME));

        debug!("Workspace opened successfully");
        Ok(Workspace {
            trash_dir: absolute_path.join(TRASH_DIR_NAME),
            absolute_path,
            references_path,
            origins_path,
            references: RwLock::new(references),
            origins: Mutex::new(origins),
            writer: Mutex::new(()),
            activity,
            clock,
        })
    }

    /// Returns the root path of the workspace.
    pub fn path(&self) -> &Path {
        &self.absolute_path
    }

    /// Writes `content` as the markdown document `logical` and rebuilds its references.
    ///
    /// Missing parent folders are created. An existing `logical.md` is overwritten; any
    /// other sibling with the same name (a `.txt` document, a folder) is a conflict.
    #[instrument(skip(self, content))]
    pub async fn save(&self, logical: &str, content: &[u8]) -> Result<()> {
        validate_logical(logical)?;
        let _writer = self.writer.lock().await;

        let path = with_appended_extension(&self.absolute_path.join(logical), "md");
        let (dir, name) = split_parent(&path, logical)?;
        // Only an existing file at exactly this path counts as the document itself.
        let exists = fs::try_exists(&path).await.map_err(Error::Io)?;
        guard::ensure_available(&dir, name, exists.then_some(path.as_path())).await?;
        guard::create_parents(&self.absolute_path, &dir).await?;

        fs::write(&path, content).await.map_err(Error::Io)?;
        debug!("Wrote {} bytes to {}", content.len(), path.display());

        let text = String::from_utf8_lossy(content);
        self.update_index(|index| index.record_save(logical, &text)).await;
        self.log(format!("SAVE: Saved '{}'", logical)).await;
        Ok(())
    }

    /// Returns the bytes and content type of the document `logical`.
    pub async fn read_document(&self, logical: &str) -> Result<(Vec<u8>, Mime)> {
        validate_logical(logical)?;
        document::read(&self.absolute_path, logical).await
    }

    #[instrument(skip(self))]
    pub async fn create_folder(&self, logical: &str) -> Result<()> {
        validate_logical(logical)?;
        let _writer = self.writer.lock().await;

        let path = self.absolute_path.join(logical);
        let (dir, name) = split_parent(&path, logical)?;
        guard::ensure_available(&dir, name, None).await?;
        guard::create_parents(&self.absolute_path, &dir).await?;
        fs::create_dir(&path).await.map_err(Error::Io)?;

        self.log(format!("FOLDER: Created '{}'", logical)).await;
        Ok(())
    }

    /// Renames or moves the document or folder at `old` to `new`.
    ///
    /// Documents keep their physical extension. Renaming an entry onto a differently
    /// cased spelling of itself is allowed; any other case-insensitive collision in the
    /// destination folder is a conflict. Backlinks follow the entry.
    #[instrument(skip(self))]
    pub async fn rename(&self, old: &str, new: &str) -> Result<()> {
        validate_logical(old)?;
        validate_logical(new)?;
        let _writer = self.writer.lock().await;

        let resolved = self.resolve_existing(old).await?;
        let new_path = match resolved.extension() {
            Some(ext) => with_appended_extension(&self.absolute_path.join(new), ext),
            None => self.absolute_path.join(new),
        };
        let Resolved { path: old_path, is_dir } = resolved;
        let old_logical = logical_path_of(&self.absolute_path, &old_path, is_dir)?;

        if new_path == old_path {
            debug!("Source and destination are identical, nothing to do");
            return Ok(());
        }
        if is_dir && new.starts_with(&format!("{}/", old_logical)) {
            return Err(Error::InvalidPath(format!(
                "Cannot move folder '{}' into itself ('{}')",
                old_logical, new
            )));
        }

        let (dir, name) = split_parent(&new_path, new)?;
        guard::ensure_available(&dir, name, Some(&old_path)).await?;
        guard::create_parents(&self.absolute_path, &dir).await?;
        fs::rename(&old_path, &new_path).await.map_err(Error::Io)?;

        self.update_index(|index| index.record_rename(&old_logical, new, is_dir)).await;

        let old_relative = relative_string(&self.absolute_path, &old_path).unwrap_or_default();
        let new_relative = relative_string(&self.absolute_path, &new_path).unwrap_or_default();
        self.log(format!("MOVE/RENAME: Moved '{}' to '{}'", old_relative, new_relative)).await;
        Ok(())
    }

    /// Returns the documents referencing `logical`, in the order they were recorded.
    pub async fn backlinks(&self, logical: &str) -> Vec<String> {
        self.references.read().await.backlinks_of(logical).to_vec()
    }

    /// Lists folders and recognised documents, folders first, then by name.
    pub async fn list_tree(&self) -> Result<Vec<TreeItem>> {
        folder::list_tree(&self.absolute_path).await
    }

    /// Renames every entry that collides with an earlier sibling and returns the renames.
    ///
    /// Backlinks are carried over to the new names. See [`sweep`](super::sweep) for the
    /// tie-break between colliding entries.
    #[instrument(skip(self))]
    pub async fn resolve_conflicts(&self) -> Result<Vec<RenameOperation>> {
        let _writer = self.writer.lock().await;

        let resolutions = sweep::sweep(&self.absolute_path).await?;
        if resolutions.is_empty() {
            return Ok(Vec::new());
        }

        self.update_index(|index| {
            for resolution in &resolutions {
                let old = logical_from_relative(&resolution.operation.old_path, resolution.is_folder);
                let new = logical_from_relative(&resolution.operation.new_path, resolution.is_folder);
                index.record_rename(&old, &new, resolution.is_folder);
            }
        })
        .await;

        let mut operations = Vec::with_capacity(resolutions.len());
        for resolution in resolutions {
            let op = resolution.operation;
            self.log(format!("DATA INTEGRITY: Renamed '{}' to '{}'", op.old_path, op.new_path)).await;
            operations.push(op);
        }
        Ok(operations)
    }

    /// Returns the activity log, or `None` if nothing has been recorded yet.
    pub async fn read_activity(&self) -> Result<Option<String>> {
        self.activity.read().await
    }

    pub async fn clear_activity(&self) -> Result<()> {
        self.activity.clear().await?;
        self.log("LOGS: Activity log cleared.".to_string()).await;
        Ok(())
    }

    pub(super) async fn resolve_existing(&self, logical: &str) -> Result<Resolved> {
        document::resolve(&self.absolute_path.join(logical))
            .await?
            .ok_or_else(|| Error::NotFound(logical.to_string()))
    }

    /// Applies `change` to the reference index and persists it.
    ///
    /// The filesystem change has already happened when this runs, so a failed write
    /// is logged rather than returned.
    pub(super) async fn update_index<F>(&self, change: F)
    where
        F: FnOnce(&mut ReferenceIndex),
    {
        let mut references = self.references.write().await;
        change(&mut references);
        if let Err(e) = persist::write_json(&self.references_path, &*references).await {
            warn!("Failed to persist reference index: {}", e);
        }
    }

    pub(super) async fn log(&self, message: String) {
        self.activity.record(self.clock.now(), &message).await;
    }
}

/// The directory an entry lives in and its final name segment.
pub(super) fn split_parent<'a>(path: &Path, logical: &'a str) -> Result<(PathBuf, &'a str)> {
    let dir = path
        .parent()
        .ok_or_else(|| Error::InvalidPath(logical.to_string()))?
        .to_path_buf();
    let name = logical.rsplit('/').next().unwrap_or(logical);
    Ok((dir, name))
}
