use crate::storage::path::{logical_from_relative, split_extension, RECOGNIZED_EXTENSIONS};
use crate::storage::{Error, Result};
use serde::Serialize;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use tokio::fs;
use tracing::{debug, instrument, warn};

/// Whether a listed entry is a folder or a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemKind {
    // Declared first so folders sort before files.
    Folder,
    File,
}

/// One node of a directory listing.
///
/// For documents `name` and `path` are extension-free; `path` is the logical path
/// relative to the listed root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TreeItem {
    pub name: String,
    pub path: String,
    #[serde(rename = "type")]
    pub kind: ItemKind,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<TreeItem>,
}

impl TreeItem {
    fn folder(name: String, path: String, children: Vec<TreeItem>) -> Self {
        TreeItem { name, path, kind: ItemKind::Folder, children }
    }

    fn file(name: String, path: String) -> Self {
        TreeItem { name, path, kind: ItemKind::File, children: Vec::new() }
    }
}

fn is_recognized(file_name: &str) -> bool {
    match split_extension(file_name).1 {
        Some(ext) => RECOGNIZED_EXTENSIONS.contains(&ext),
        None => false,
    }
}

/// Lists the document tree below `root`, skipping top-level dot entries and files
/// without a recognised extension. Each level lists folders first, then by name.
#[instrument(skip(root), fields(root = %root.display()))]
pub(crate) async fn list_tree(root: &Path) -> Result<Vec<TreeItem>> {
    let items = list_level(root.to_path_buf(), String::new()).await?;
    debug!("Listed {} top-level items", items.len());
    Ok(items)
}

type ListFuture = Pin<Box<dyn Future<Output = Result<Vec<TreeItem>>> + Send>>;

fn list_level(dir: PathBuf, prefix: String) -> ListFuture {
    Box::pin(async move {
        let mut read_dir = match fs::read_dir(&dir).await {
            Ok(rd) => rd,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("Directory not found, returning empty listing.");
                return Ok(Vec::new());
            }
            Err(e) => return Err(Error::Io(e)),
        };

        let mut items = Vec::new();
        while let Some(entry) = read_dir.next_entry().await.map_err(Error::Io)? {
            let file_name_os = entry.file_name();
            let Some(file_name) = file_name_os.to_str() else {
                warn!("Skipping non-unicode entry: {}", entry.path().display());
                continue;
            };
            if prefix.is_empty() && file_name.starts_with('.') {
                continue;
            }

            let relative = if prefix.is_empty() {
                file_name.to_string()
            } else {
                format!("{}/{}", prefix, file_name)
            };

            if entry.file_type().await.map_err(Error::Io)?.is_dir() {
                let children = list_level(entry.path(), relative.clone()).await?;
                items.push(TreeItem::folder(file_name.to_string(), relative, children));
            } else if is_recognized(file_name) {
                let name = split_extension(file_name).0.to_string();
                items.push(TreeItem::file(name, logical_from_relative(&relative, false)));
            }
        }

        items.sort_by(|a, b| a.kind.cmp(&b.kind).then_with(|| a.name.cmp(&b.name)));
        Ok(items)
    })
}

/// Collects the logical paths of every recognised document below `dir`, relative to `dir`.
pub(crate) async fn documents_under(dir: &Path) -> Result<Vec<String>> {
    let mut documents = Vec::new();
    let mut pending = vec![(dir.to_path_buf(), String::new())];

    while let Some((current, prefix)) = pending.pop() {
        let mut read_dir = match fs::read_dir(&current).await {
            Ok(rd) => rd,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
            Err(e) => return Err(Error::Io(e)),
        };
        while let Some(entry) = read_dir.next_entry().await.map_err(Error::Io)? {
            let file_name_os = entry.file_name();
            let Some(file_name) = file_name_os.to_str() else { continue; };
            let relative = if prefix.is_empty() {
                file_name.to_string()
            } else {
                format!("{}/{}", prefix, file_name)
            };

            if entry.file_type().await.map_err(Error::Io)?.is_dir() {
                pending.push((entry.path(), relative));
            } else if is_recognized(file_name) {
                documents.push(logical_from_relative(&relative, false));
            }
        }
    }

    documents.sort();
    Ok(documents)
}

/// Lists the immediate entries of `dir` as flat items, named and addressed by their
/// physical file name.
pub(crate) async fn list_entries(dir: &Path) -> Result<Vec<TreeItem>> {
    let mut read_dir = match fs::read_dir(dir).await {
        Ok(rd) => rd,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(Error::Io(e)),
    };

    let mut items = Vec::new();
    while let Some(entry) = read_dir.next_entry().await.map_err(Error::Io)? {
        let Some(file_name) = entry.file_name().to_str().map(str::to_string) else { continue; };
        let item = if entry.file_type().await.map_err(Error::Io)?.is_dir() {
            TreeItem::folder(file_name.clone(), file_name, Vec::new())
        } else {
            TreeItem::file(file_name.clone(), file_name)
        };
        items.push(item);
    }
    items.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(items)
}
