//! Provides the file-backed document store and the bookkeeping that keeps it consistent.
//!
//! A store is a plain directory tree on disk. Documents are files with one of the
//! [`RECOGNIZED_EXTENSIONS`], addressed by clients through an extension-free, slash-separated
//! *logical path* (e.g. `notes/project` for `notes/project.md`). Next to the documents, the
//! data root holds a few internal entries that are never addressable as documents:
//!
//! *   `.trash/` holds trashed items. Each item keeps its base name with a 15 character
//!     `_YYYYMMDDHHMMSS` suffix so that several items sharing a name can coexist.
//! *   `.images/` and `.logs/` belong to collaborators (image upload, activity log).
//! *   `.references.json` persists the [`ReferenceIndex`] (backlinks).
//! *   `.trash_origins.json` remembers where each trashed item came from.
//!
//! # Core Concepts
//!
//! *   **[`Workspace`]:** The explicit store object. [`Workspace::open`] creates the layout
//!     if needed and loads the persisted state; every mutation goes through its methods.
//! *   **[`ReferenceIndex`]:** Maps a *target* logical path to the ordered set of documents
//!     that mention it with an `@(target)` marker. It is rebuilt for a document on every
//!     save and rewritten when documents or folders are renamed, moved or trashed.
//! *   **[`TrashName`]:** The value type behind trash suffixes. Parsing a trashed name back
//!     to its original lives in exactly one place.
//!
//! # Name Uniqueness
//!
//! Within one directory no two entries may share a name under case-insensitive comparison,
//! where files are compared without their extension and folders by their full name. So
//! `Note.md`, `NOTE.txt` and a folder `note` all collide, while `Notebook.md` does not.
//! Every create, overwrite-as-new-name, rename, move and restore is checked before the
//! filesystem is touched and rejected with a [`ConflictError`] on collision.
//! [`Workspace::resolve_conflicts`] repairs collisions that slipped in out-of-band.
//!
//! # Consistency Model
//!
//! There is no transactional filesystem underneath. Operations run guard check, physical
//! change, index update in that order. Failures before the physical change abort the
//! operation. Once the physical change is done it is considered committed: failing to
//! persist the index afterwards is logged and leaves the index stale until the affected
//! document is saved again. All tree-mutating operations of one [`Workspace`] are
//! serialised by a single writer lock.
//!
//! # Example Usage
//!
//! ```rust,no_run
//! use scribe_core::storage::{Workspace, Error};
//! use tempfile::tempdir;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let temp_dir = tempdir()?;
//!     let ws = Workspace::open(temp_dir.path()).await?;
//!
//!     ws.save("ideas", b"see @(plans)").await?;
//!     assert_eq!(ws.backlinks("plans").await, vec!["ideas".to_string()]);
//!
//!     let trash_id = ws.trash("ideas").await?;
//!     ws.restore(&trash_id).await?;
//!     Ok(())
//! }
//! ```

pub use self::activity::ActivityLog;
pub use self::clock::{Clock, FixedClock, SystemClock};
pub use self::folder::{ItemKind, TreeItem};
pub use self::path::{
    decode_segment, physical_candidates, strip_trash_suffix, validate_logical, TrashName,
    RECOGNIZED_EXTENSIONS,
};
pub use self::references::{extract_references, ReferenceIndex};
pub use self::sweep::RenameOperation;
pub use self::workspace::Workspace;

mod activity;
mod clock;
mod document;
mod folder;
mod guard;
mod path;
mod persist;
mod references;
mod sweep;
mod trash;
mod workspace;

use std::path::PathBuf;
use thiserror::Error;

pub const TRASH_DIR_NAME: &str = ".trash";
pub const IMAGES_DIR_NAME: &str = ".images";
pub const LOGS_DIR_NAME: &str = ".logs";
pub const ACTIVITY_LOG_FILENAME: &str = "activity.log";
pub const REFERENCES_FILENAME: &str = ".references.json";
pub const TRASH_ORIGINS_FILENAME: &str = ".trash_origins.json";


#[derive(Debug, Error)]
pub enum ConflictError {
    #[error("An item named '{name}' already exists in {}", dir.display())]
    NameTaken { dir: PathBuf, name: String },

    #[error("The trash already holds an item named '{0}'")]
    TrashSlotTaken(String),
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("Filesystem conflict: {0}")]
    Conflict(#[from] ConflictError),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid path provided: {0}")]
    InvalidPath(String),

    #[error("Path is not a document: {0}")]
    NotADocument(String),

    #[error("Reference index serialization/deserialization error")]
    Index(#[from] serde_json::Error),

    #[error("IO error")]
    Io(#[from] std::io::Error),
}

// Define a standard Result type for the library
pub type Result<T> = std::result::Result<T, Error>;
