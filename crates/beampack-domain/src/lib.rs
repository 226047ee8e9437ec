#![deny(clippy::all, warnings)]
#![allow(
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::must_use_candidate
)]

pub mod entry;
pub mod error;
pub mod manifest;
pub mod project;

pub use entry::{dedup_entries, dir_markers, join_archive_path, normalize_archive_path, Entry};
pub use error::EscriptError;
pub use manifest::{
    read_manifest, read_manifest_from_str, EscriptConfig, ExtraFiles, ProjectManifest,
    MANIFEST_FILE,
};
pub use project::{discover_project_root, project_root_from, resolve_main_app, AppUnit};
