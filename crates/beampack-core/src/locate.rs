use std::{
    collections::BTreeMap,
    fs, io,
    path::{Path, PathBuf},
};

use beampack_domain::{Entry, EscriptError};

use crate::collect::collect;

/// Explicit mapping from application name to its compiled-output directory.
///
/// Built once per invocation by scanning the project's lib directory; there
/// is no process-wide code-path registry, so builds stay reproducible and
/// the mapping can be assembled by hand in tests.
#[derive(Clone, Debug, Default)]
pub struct BeamLocator {
    dirs: BTreeMap<String, PathBuf>,
}

impl BeamLocator {
    /// Scans `lib_dir`, registering each subdirectory that holds compiled
    /// output (an `ebin/` directory) under its own name. Anything else in
    /// the lib dir is not an application and is skipped.
    pub fn from_lib_dir(lib_dir: &Path) -> io::Result<Self> {
        let mut locator = Self::default();
        for dirent in fs::read_dir(lib_dir)? {
            let dirent = dirent?;
            if !dirent.file_type()?.is_dir() || !dirent.path().join("ebin").is_dir() {
                continue;
            }
            if let Some(name) = dirent.file_name().to_str() {
                locator.register(name, dirent.path());
            }
        }
        Ok(locator)
    }

    pub fn register(&mut self, name: impl Into<String>, out_dir: impl Into<PathBuf>) {
        self.dirs.insert(name.into(), out_dir.into());
    }

    pub fn lookup(&self, name: &str) -> Option<&Path> {
        self.dirs.get(name).map(PathBuf::as_path)
    }

    /// Registered application names, in sorted order.
    pub fn app_names(&self) -> impl Iterator<Item = &str> {
        self.dirs.keys().map(String::as_str)
    }
}

/// Collects the compiled units of every named dependency.
///
/// Each dependency contributes its `ebin/*.beam` files under the archive
/// prefix `<name>/ebin`. The first name without a usable compiled-output
/// directory aborts the whole build; no partial archive is assembled.
pub fn dependency_entries(
    locator: &BeamLocator,
    names: &[String],
) -> Result<Vec<Entry>, EscriptError> {
    let mut entries = Vec::new();
    for name in names {
        let ebin = locator
            .lookup(name)
            .map(|dir| dir.join("ebin"))
            .filter(|ebin| ebin.is_dir())
            .ok_or_else(|| EscriptError::BadAppName(name.clone()))?;
        entries.extend(collect(&format!("{name}/ebin"), "*.beam", &ebin)?);
    }
    Ok(entries)
}
