use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{anyhow, Context, Result};
use toml_edit::{DocumentMut, Item};

/// Name of the project manifest searched for at the project root.
pub const MANIFEST_FILE: &str = "beampack.toml";

/// Parsed `beampack.toml`.
#[derive(Clone, Debug)]
pub struct ProjectManifest {
    pub root: PathBuf,
    pub name: Option<String>,
    pub apps: Vec<String>,
    pub escript: EscriptConfig,
}

/// `[escript]` table. Every key is optional; defaults are decided by the
/// build pipeline.
#[derive(Clone, Debug, Default)]
pub struct EscriptConfig {
    pub main_app: Option<String>,
    pub name: Option<String>,
    pub include_apps: Vec<String>,
    pub extra_files: Vec<ExtraFiles>,
    pub shebang: Option<String>,
    pub comment: Option<String>,
    pub emu_args: Option<String>,
}

/// One `[[escript.extra_files]]` stanza: a glob applied under `dir`
/// (relative to the project root).
#[derive(Clone, Debug)]
pub struct ExtraFiles {
    pub pattern: String,
    pub dir: PathBuf,
}

impl ProjectManifest {
    /// Names of project-owned applications: the `apps` list, or the project
    /// name alone for single-app projects.
    pub fn app_names(&self) -> Vec<String> {
        if self.apps.is_empty() {
            self.name.iter().cloned().collect()
        } else {
            self.apps.clone()
        }
    }
}

/// Reads and parses `beampack.toml` at `root`.
pub fn read_manifest(root: &Path) -> Result<ProjectManifest> {
    let manifest_path = root.join(MANIFEST_FILE);
    let contents = fs::read_to_string(&manifest_path)
        .with_context(|| format!("reading {}", manifest_path.display()))?;
    read_manifest_from_str(root, &contents)
}

pub fn read_manifest_from_str(root: &Path, contents: &str) -> Result<ProjectManifest> {
    let doc: DocumentMut = contents
        .parse()
        .with_context(|| format!("failed to parse {}", root.join(MANIFEST_FILE).display()))?;
    manifest_from_doc(root, &doc)
}

fn manifest_from_doc(root: &Path, doc: &DocumentMut) -> Result<ProjectManifest> {
    let project = doc.get("project").and_then(Item::as_table);

    let name = project
        .and_then(|table| table.get("name"))
        .and_then(Item::as_str)
        .map(ToString::to_string);

    let apps = match project.and_then(|table| table.get("apps")) {
        Some(item) => string_array(item).ok_or_else(|| {
            anyhow!("project.apps must be an array of application name strings")
        })?,
        None => Vec::new(),
    };

    let escript = match doc.get("escript") {
        Some(item) => escript_config_from_item(item)?,
        None => EscriptConfig::default(),
    };

    Ok(ProjectManifest {
        root: root.to_path_buf(),
        name,
        apps,
        escript,
    })
}

fn escript_config_from_item(item: &Item) -> Result<EscriptConfig> {
    let table = item
        .as_table()
        .ok_or_else(|| anyhow!("[escript] must be a table"))?;

    let include_apps = match table.get("include_apps") {
        Some(item) => string_array(item).ok_or_else(|| {
            anyhow!("escript.include_apps must be an array of application name strings")
        })?,
        None => Vec::new(),
    };

    let mut extra_files = Vec::new();
    if let Some(stanzas) = table.get("extra_files") {
        let stanzas = stanzas
            .as_array_of_tables()
            .ok_or_else(|| anyhow!("escript.extra_files must be an array of tables"))?;
        for stanza in stanzas {
            let pattern = stanza
                .get("pattern")
                .and_then(Item::as_str)
                .ok_or_else(|| anyhow!("escript.extra_files entries require a `pattern` string"))?
                .to_string();
            let dir = stanza
                .get("dir")
                .and_then(Item::as_str)
                .map_or_else(|| PathBuf::from("."), PathBuf::from);
            extra_files.push(ExtraFiles { pattern, dir });
        }
    }

    Ok(EscriptConfig {
        main_app: str_key(table, "main_app"),
        name: str_key(table, "name"),
        include_apps,
        extra_files,
        shebang: str_key(table, "shebang"),
        comment: str_key(table, "comment"),
        emu_args: str_key(table, "emu_args"),
    })
}

fn str_key(table: &toml_edit::Table, key: &str) -> Option<String> {
    table.get(key).and_then(Item::as_str).map(ToString::to_string)
}

fn string_array(item: &Item) -> Option<Vec<String>> {
    let array = item.as_array()?;
    let mut values = Vec::with_capacity(array.len());
    for value in array {
        values.push(value.as_str()?.to_string());
    }
    Some(values)
}
