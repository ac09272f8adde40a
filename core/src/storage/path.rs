//! Translation between logical document paths and physical storage paths.

use chrono::NaiveDateTime;
use std::ffi::OsString;
use std::fmt;
use std::path::{Component, Path, PathBuf};

use crate::storage::{Error, Result};

/// Document extensions recognised by the store, in resolution priority order.
pub const RECOGNIZED_EXTENSIONS: [&str; 5] = ["md", "txt", "png", "jpg", "jpeg"];

const TRASH_SUFFIX_FORMAT: &str = "%Y%m%d%H%M%S";
const TRASH_SUFFIX_LEN: usize = 15;

/// Checks that a client-supplied logical path stays inside the data root and does not
/// address one of the internal top-level entries.
pub fn validate_logical(path: &str) -> Result<()> {
    if path.is_empty() {
        return Err(Error::InvalidPath("path is empty".to_string()));
    }
    if path.starts_with('/') || path.contains('\\') {
        return Err(Error::InvalidPath(path.to_string()));
    }
    for (idx, segment) in path.split('/').enumerate() {
        if segment.is_empty() || segment == "." || segment == ".." {
            return Err(Error::InvalidPath(path.to_string()));
        }
        if idx == 0 && segment.starts_with('.') {
            return Err(Error::InvalidPath(path.to_string()));
        }
    }
    Ok(())
}

/// Clients encode spaces in document ids as underscores.
pub fn decode_segment(raw: &str) -> String {
    raw.replace('_', " ")
}

/// Lists the physical paths a logical path may resolve to, one per recognised extension.
///
/// The first candidate that exists on disk is the document.
pub fn physical_candidates(root: &Path, logical: &str) -> Vec<PathBuf> {
    let base = root.join(logical);
    RECOGNIZED_EXTENSIONS
        .iter()
        .map(|ext| with_appended_extension(&base, ext))
        .collect()
}

/// Appends `.ext` without replacing anything that looks like an existing extension,
/// so `notes/v1.2` becomes `notes/v1.2.md`.
pub(crate) fn with_appended_extension(base: &Path, ext: &str) -> PathBuf {
    let mut raw: OsString = base.as_os_str().to_owned();
    raw.push(".");
    raw.push(ext);
    PathBuf::from(raw)
}

/// Splits a file name at its last dot. A leading dot does not start an extension.
pub(crate) fn split_extension(name: &str) -> (&str, Option<&str>) {
    match name.rfind('.') {
        Some(idx) if idx > 0 => (&name[..idx], Some(&name[idx + 1..])),
        _ => (name, None),
    }
}

/// Renders a path below `root` as a slash-separated relative string.
pub(crate) fn relative_string(root: &Path, path: &Path) -> Option<String> {
    let relative = path.strip_prefix(root).ok()?;
    let mut segments = Vec::new();
    for component in relative.components() {
        match component {
            Component::Normal(segment) => segments.push(segment.to_str()?.to_string()),
            _ => return None,
        }
    }
    Some(segments.join("/"))
}

/// Turns a relative physical path into a logical one by dropping the file extension.
pub(crate) fn logical_from_relative(relative: &str, is_dir: bool) -> String {
    if is_dir {
        return relative.to_string();
    }
    let (dir, name) = match relative.rfind('/') {
        Some(idx) => (&relative[..=idx], &relative[idx + 1..]),
        None => ("", relative),
    };
    format!("{}{}", dir, split_extension(name).0)
}

/// The logical path of a physical entry below `root`.
pub(crate) fn logical_path_of(root: &Path, path: &Path, is_dir: bool) -> Result<String> {
    let relative = relative_string(root, path)
        .ok_or_else(|| Error::InvalidPath(path.display().to_string()))?;
    Ok(logical_from_relative(&relative, is_dir))
}

/// The name of an item in the trash: its original name with the moment it was trashed
/// inserted before the extension (files) or appended (folders).
///
/// `report.md` trashed on 2026-03-01 at 14:05:09 becomes `report_20260301140509.md`,
/// a folder `drafts` becomes `drafts_20260301140509`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrashName {
    stem: String,
    extension: Option<String>,
    trashed_at: NaiveDateTime,
}

impl TrashName {
    pub fn new(file_name: &str, is_dir: bool, trashed_at: NaiveDateTime) -> Self {
        let (stem, extension) = if is_dir {
            (file_name, None)
        } else {
            split_extension(file_name)
        };
        TrashName {
            stem: stem.to_string(),
            extension: extension.map(str::to_string),
            trashed_at,
        }
    }

    /// Recovers the parts of a trashed name. Returns `None` when the name carries no valid
    /// timestamp suffix.
    ///
    /// The suffix is looked for before the extension first and at the very end second, so
    /// folders with a dot in their name still parse.
    pub fn parse(name: &str) -> Option<Self> {
        let (stem, extension) = split_extension(name);
        if extension.is_some() {
            if let Some((original, trashed_at)) = split_suffix(stem) {
                return Some(TrashName {
                    stem: original.to_string(),
                    extension: extension.map(str::to_string),
                    trashed_at,
                });
            }
        }
        let (original, trashed_at) = split_suffix(name)?;
        Some(TrashName {
            stem: original.to_string(),
            extension: None,
            trashed_at,
        })
    }

    /// The name the item had before it was trashed.
    pub fn original_name(&self) -> String {
        match &self.extension {
            Some(ext) => format!("{}.{}", self.stem, ext),
            None => self.stem.clone(),
        }
    }
}

impl fmt::Display for TrashName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.stem, self.trashed_at.format(TRASH_SUFFIX_FORMAT))?;
        if let Some(ext) = &self.extension {
            write!(f, ".{}", ext)?;
        }
        Ok(())
    }
}

/// Removes a trash suffix if there is a valid one, otherwise returns the name unchanged.
pub fn strip_trash_suffix(name: &str) -> String {
    TrashName::parse(name)
        .map(|trash_name| trash_name.original_name())
        .unwrap_or_else(|| name.to_string())
}

fn split_suffix(name: &str) -> Option<(&str, NaiveDateTime)> {
    if name.len() <= TRASH_SUFFIX_LEN {
        return None;
    }
    let split = name.len() - TRASH_SUFFIX_LEN;
    if !name.is_char_boundary(split) {
        return None;
    }
    let (original, suffix) = name.split_at(split);
    let digits = suffix.strip_prefix('_')?;
    if !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let trashed_at = NaiveDateTime::parse_from_str(digits, TRASH_SUFFIX_FORMAT).ok()?;
    Some((original, trashed_at))
}
