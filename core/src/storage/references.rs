//! The backlink index: which documents mention which targets.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use tracing::debug;

static REFERENCE_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"@\(([^)]+)\)").expect("reference pattern is a valid regex"));

/// Collects the targets of all `@(target)` markers in `content`, first occurrence first,
/// without duplicates. Targets are taken verbatim and not checked for existence.
pub fn extract_references(content: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    REFERENCE_PATTERN
        .captures_iter(content)
        .filter_map(|captures| captures.get(1))
        .map(|m| m.as_str())
        .filter(|target| seen.insert(*target))
        .map(str::to_string)
        .collect()
}

/// Maps a target logical path to the documents referencing it.
///
/// Source lists are sets in meaning: a source appears at most once per target. Their
/// insertion order is kept so output is deterministic. Targets without any source are
/// dropped from the map.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReferenceIndex {
    entries: BTreeMap<String, Vec<String>>,
}

impl ReferenceIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the documents referencing `target`, or an empty slice.
    pub fn backlinks_of(&self, target: &str) -> &[String] {
        self.entries.get(target).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Rebuilds the references of `source` from its freshly saved content.
    ///
    /// Every reference previously recorded for `source` is purged first, so targets the
    /// document no longer mentions lose it as a backlink.
    pub fn record_save(&mut self, source: &str, content: &str) {
        self.purge_source(source);
        for target in extract_references(content) {
            let sources = self.entries.entry(target).or_default();
            if !sources.iter().any(|s| s == source) {
                sources.push(source.to_string());
            }
        }
        debug!("Recorded references of {}", source);
    }

    /// Forgets `source` as a referencing document and as a target.
    ///
    /// Documents that still mention `source` in their content will add it back as a
    /// target the next time they are saved.
    pub fn record_delete(&mut self, source: &str) {
        self.purge_source(source);
        self.entries.remove(source);
        debug!("Removed references of {}", source);
    }

    /// Rewrites `old` to `new` wherever it occurs, as a target and as a source.
    ///
    /// For folders every path below `old/` is rewritten too. For documents only exact
    /// matches are. Lists that end up under the same target are merged without duplicates.
    pub fn record_rename(&mut self, old: &str, new: &str, is_folder: bool) {
        if old == new {
            return;
        }

        let mut renamed: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for (target, sources) in std::mem::take(&mut self.entries) {
            let target = rewrite(&target, old, new, is_folder).unwrap_or(target);
            let merged = renamed.entry(target).or_default();
            for source in sources {
                let source = rewrite(&source, old, new, is_folder).unwrap_or(source);
                if !merged.contains(&source) {
                    merged.push(source);
                }
            }
        }
        self.entries = renamed;
        debug!("Renamed references from {} to {}", old, new);
    }

    fn purge_source(&mut self, source: &str) {
        for sources in self.entries.values_mut() {
            sources.retain(|s| s != source);
        }
        self.entries.retain(|_, sources| !sources.is_empty());
    }
}

fn rewrite(path: &str, old: &str, new: &str, is_folder: bool) -> Option<String> {
    if path == old {
        return Some(new.to_string());
    }
    if is_folder {
        let rest = path.strip_prefix(old)?.strip_prefix('/')?;
        return Some(format!("{}/{}", new, rest));
    }
    None
}
