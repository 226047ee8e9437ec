use std::{
    env,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};

use crate::error::EscriptError;
use crate::manifest::MANIFEST_FILE;

/// A project-owned application: its name and the directory holding its
/// compiled output (`<out_dir>/ebin/*.beam`).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AppUnit {
    pub name: String,
    pub out_dir: PathBuf,
}

impl AppUnit {
    pub fn new(name: impl Into<String>, out_dir: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            out_dir: out_dir.into(),
        }
    }
}

/// Walks upward from CWD to the nearest directory containing `beampack.toml`.
pub fn discover_project_root() -> Result<Option<PathBuf>> {
    let cwd = env::current_dir().context("unable to determine current directory")?;
    Ok(project_root_from(&cwd))
}

pub fn project_root_from(start: &Path) -> Option<PathBuf> {
    let mut dir = start.to_path_buf();
    loop {
        if dir.join(MANIFEST_FILE).exists() {
            return Some(dir);
        }
        if !dir.pop() {
            return None;
        }
    }
}

/// Picks the application the escript is built around.
///
/// A single project application is chosen automatically. With several, the
/// configured `escript.main_app` decides; leaving it unset is ambiguous and
/// a configured name that matches nothing is rejected.
pub fn resolve_main_app<'a>(
    apps: &'a [AppUnit],
    configured: Option<&str>,
) -> Result<&'a AppUnit, EscriptError> {
    if apps.len() == 1 {
        return Ok(&apps[0]);
    }
    let name = configured.ok_or(EscriptError::NoMainApp)?;
    apps.iter()
        .find(|app| app.name == name)
        .ok_or_else(|| EscriptError::AppNotFound(name.to_string()))
}
