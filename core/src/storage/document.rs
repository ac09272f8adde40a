use crate::storage::path::{physical_candidates, split_extension};
use crate::storage::{Error, Result};
use mime::Mime;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, instrument};

/// A logical path matched to the physical entry that holds it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Resolved {
    pub path: PathBuf,
    pub is_dir: bool,
}

impl Resolved {
    /// The physical extension of a file, if any.
    pub fn extension(&self) -> Option<&str> {
        if self.is_dir {
            return None;
        }
        let name = self.path.file_name()?.to_str()?;
        split_extension(name).1
    }
}

/// Finds the entry behind `base`: the bare path if it exists (folders, or files
/// addressed with their extension), otherwise the first recognised-extension candidate.
pub(crate) async fn resolve(base: &Path) -> Result<Option<Resolved>> {
    if let Some(resolved) = probe(base.to_path_buf()).await? {
        return Ok(Some(resolved));
    }
    let (Some(parent), Some(name)) = (base.parent(), base.file_name().and_then(|n| n.to_str()))
    else {
        return Ok(None);
    };
    for candidate in physical_candidates(parent, name) {
        if let Some(resolved) = probe(candidate).await? {
            if !resolved.is_dir {
                return Ok(Some(resolved));
            }
        }
    }
    Ok(None)
}

async fn probe(path: PathBuf) -> Result<Option<Resolved>> {
    match fs::metadata(&path).await {
        Ok(meta) => Ok(Some(Resolved { is_dir: meta.is_dir(), path })),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(Error::Io(e)),
    }
}

/// Reads the document addressed by `logical` below `root`.
///
/// Only recognised-extension candidates are considered. A folder at the bare path is
/// reported as [`Error::NotADocument`].
#[instrument(skip(root), fields(root = %root.display()))]
pub(crate) async fn read(root: &Path, logical: &str) -> Result<(Vec<u8>, Mime)> {
    for candidate in physical_candidates(root, logical) {
        match fs::read(&candidate).await {
            Ok(bytes) => {
                let ext = candidate
                    .extension()
                    .and_then(|e| e.to_str())
                    .unwrap_or_default();
                debug!("Read {} bytes from {}", bytes.len(), candidate.display());
                return Ok((bytes, content_type_for(ext)));
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
            Err(e) => {
                // A folder named like `x.md` is not a document either.
                if fs::metadata(&candidate).await.map(|m| m.is_dir()).unwrap_or(false) {
                    continue;
                }
                return Err(Error::Io(e));
            }
        }
    }

    if fs::metadata(root.join(logical)).await.map(|m| m.is_dir()).unwrap_or(false) {
        return Err(Error::NotADocument(logical.to_string()));
    }
    Err(Error::NotFound(logical.to_string()))
}

/// The content type a document is served with, by physical extension.
pub(crate) fn content_type_for(extension: &str) -> Mime {
    match extension.to_ascii_lowercase().as_str() {
        "md" => "text/markdown".parse().unwrap_or(mime::TEXT_PLAIN),
        "png" => mime::IMAGE_PNG,
        "jpg" | "jpeg" => mime::IMAGE_JPEG,
        _ => mime::TEXT_PLAIN,
    }
}
