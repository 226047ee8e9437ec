use std::{fs, io, path::Path};

use globset::Glob;
use walkdir::WalkDir;

use beampack_domain::{dir_markers, join_archive_path, normalize_archive_path, Entry};

/// Collects every file under `base_dir` whose relative path matches
/// `pattern`, as archive entries prefixed with `prefix`.
///
/// Patterns use shell-style globs where `*` also crosses directory
/// separators, so `*` alone picks up the whole tree. Directory markers for
/// each matched file's ancestors are synthesized alongside the data entries.
/// Any unreadable file aborts the collection.
pub fn collect(prefix: &str, pattern: &str, base_dir: &Path) -> io::Result<Vec<Entry>> {
    let matcher = Glob::new(pattern)
        .map_err(|err| io::Error::new(io::ErrorKind::InvalidInput, err))?
        .compile_matcher();

    let mut entries = Vec::new();
    for dirent in WalkDir::new(base_dir).sort_by_file_name() {
        let dirent = dirent.map_err(io::Error::from)?;
        if !dirent.file_type().is_file() {
            continue;
        }
        let relative = dirent.path().strip_prefix(base_dir).unwrap_or(dirent.path());
        if !matcher.is_match(relative) {
            continue;
        }
        let archive_path = join_archive_path(prefix, &normalize_archive_path(relative));
        let content = fs::read(dirent.path())?;
        entries.extend(dir_markers(&archive_path));
        entries.push(Entry::file(archive_path, content));
    }
    Ok(entries)
}
