use std::path::Path;

use tracing::warn;

/// One archive member: a forward-slash relative path and its bytes.
///
/// A *directory marker* has a path ending in `/` and empty content. Markers
/// are synthesized (never read from disk) so archive readers that require
/// explicit directory records can extract the tree.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Entry {
    pub path: String,
    pub content: Vec<u8>,
}

impl Entry {
    pub fn file(path: impl Into<String>, content: Vec<u8>) -> Self {
        Self {
            path: path.into(),
            content,
        }
    }

    pub fn dir_marker(path: impl Into<String>) -> Self {
        let mut path = path.into();
        if !path.ends_with('/') {
            path.push('/');
        }
        Self {
            path,
            content: Vec::new(),
        }
    }

    pub fn is_dir_marker(&self) -> bool {
        self.path.ends_with('/')
    }
}

/// Joins an archive prefix and a relative path with `/`; an empty prefix
/// yields the relative path unchanged.
pub fn join_archive_path(prefix: &str, relative: &str) -> String {
    if prefix.is_empty() {
        relative.to_string()
    } else {
        format!("{prefix}/{relative}")
    }
}

/// Renders a filesystem path as a forward-slash archive member name.
pub fn normalize_archive_path(path: &Path) -> String {
    path.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

/// Directory markers for every ancestor of `archive_path`, root-down,
/// excluding the final (file name) segment.
pub fn dir_markers(archive_path: &str) -> Vec<Entry> {
    let Some((dirs, _name)) = archive_path.rsplit_once('/') else {
        return Vec::new();
    };
    let mut markers = Vec::new();
    let mut ancestor = String::new();
    for segment in dirs.split('/') {
        if !ancestor.is_empty() {
            ancestor.push('/');
        }
        ancestor.push_str(segment);
        markers.push(Entry::dir_marker(ancestor.clone()));
    }
    markers
}

/// Orders and deduplicates the combined entry list.
///
/// Entries are sorted by path; among equal paths the first encountered wins
/// and later ones are discarded (a collision between two real files is
/// reported, since the shadowed file silently drops out of the archive).
/// Zero-byte data entries are then removed; directory markers are recognized
/// by their trailing `/` and kept regardless of their empty content.
pub fn dedup_entries(mut entries: Vec<Entry>) -> Vec<Entry> {
    entries.sort_by(|a, b| a.path.cmp(&b.path));
    let mut deduped: Vec<Entry> = Vec::with_capacity(entries.len());
    for entry in entries {
        if let Some(kept) = deduped.last() {
            if kept.path == entry.path {
                if !entry.is_dir_marker() && kept.content != entry.content {
                    warn!(path = %entry.path, "duplicate archive path; keeping first occurrence");
                }
                continue;
            }
        }
        deduped.push(entry);
    }
    deduped.retain(|entry| entry.is_dir_marker() || !entry.content.is_empty());
    deduped
}
