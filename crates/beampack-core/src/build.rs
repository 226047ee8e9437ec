use std::{
    fs, io,
    path::{Path, PathBuf},
};

use anyhow::Result;
use serde_json::json;
use sha2::{Digest, Sha256};
use tracing::debug;

use beampack_domain::{
    dedup_entries, read_manifest, resolve_main_app, AppUnit, Entry, EscriptError, ProjectManifest,
};

use crate::collect::collect;
use crate::emit::emit;
use crate::header::{compose_headers, HeaderLines};
use crate::locate::{dependency_entries, BeamLocator};
use crate::outcome::ExecutionOutcome;

/// Per-invocation options for the build step. Everything defaults from the
/// project manifest; no field is required.
#[derive(Clone, Debug, Default)]
pub struct EscriptizeRequest {
    /// Directory holding compiled applications (default `_build/lib`).
    pub lib_dir: Option<PathBuf>,
    /// Output file override (default `bin/<name>`).
    pub out: Option<PathBuf>,
    /// Report what would be embedded without writing anything.
    pub dry_run: bool,
}

/// The produced artifact, as reported to the user.
#[derive(Clone, Debug)]
pub struct BuildOutput {
    pub path: PathBuf,
    pub bytes: u64,
    pub sha256: String,
    pub entries: usize,
}

/// Builds the project's escript: resolves the main application, gathers its
/// compiled output plus the dependency closure and any configured extra
/// files, and emits a single executable archive.
pub fn escriptize(root: &Path, request: &EscriptizeRequest) -> Result<ExecutionOutcome> {
    let manifest = match read_manifest(root) {
        Ok(manifest) => manifest,
        Err(err) => {
            return Ok(ExecutionOutcome::user_error(
                format!("beampack build: {err:#}"),
                json!({ "hint": "run beampack from a project with a beampack.toml" }),
            ));
        }
    };

    let lib_dir = resolve_dir(root, request.lib_dir.as_ref(), "_build/lib");
    let locator = match BeamLocator::from_lib_dir(&lib_dir) {
        Ok(locator) => locator,
        Err(err) => {
            return Ok(ExecutionOutcome::user_error(
                format!(
                    "beampack build: cannot read lib directory {}: {err}",
                    lib_dir.display()
                ),
                json!({ "hint": "compile the project first so _build/lib is populated" }),
            ));
        }
    };

    let app_names = manifest.app_names();
    if app_names.is_empty() {
        return Ok(ExecutionOutcome::user_error(
            "beampack build: no applications declared in beampack.toml",
            json!({ "hint": "set project.name or list project.apps" }),
        ));
    }
    let apps: Vec<AppUnit> = app_names
        .iter()
        .map(|name| {
            let out_dir = locator
                .lookup(name)
                .map_or_else(|| lib_dir.join(name), Path::to_path_buf);
            AppUnit::new(name.clone(), out_dir)
        })
        .collect();

    let assembled = match assemble(root, &manifest, &apps, &locator) {
        Ok(assembled) => assembled,
        Err(err) => return Ok(error_outcome(err)),
    };

    let name = manifest
        .escript
        .name
        .clone()
        .unwrap_or_else(|| assembled.main_app.clone());
    let output_path = resolve_dir(root, request.out.as_ref(), "bin").join(&name);

    if request.dry_run {
        let message = format!(
            "beampack build: dry-run ({} entries for {})",
            assembled.entries.len(),
            relative_path_str(&output_path, root),
        );
        return Ok(ExecutionOutcome::success(
            message,
            json!({
                "escript": relative_path_str(&output_path, root),
                "main_app": assembled.main_app,
                "dependencies": assembled.dependencies,
                "entries": assembled.entries.iter().map(|e| e.path.clone()).collect::<Vec<_>>(),
                "dry_run": true,
            }),
        ));
    }

    let output = match write_escript(&output_path, &assembled) {
        Ok(output) => output,
        Err(err) => return Ok(error_outcome(err)),
    };

    let sha_short: String = output.sha256.chars().take(12).collect();
    let message = format!(
        "beampack build: wrote {} ({}, sha256={sha_short}…)",
        relative_path_str(&output.path, root),
        format_bytes(output.bytes),
    );
    Ok(ExecutionOutcome::success(
        message,
        json!({
            "escript": relative_path_str(&output.path, root),
            "bytes": output.bytes,
            "sha256": output.sha256,
            "entries": output.entries,
            "main_app": assembled.main_app,
            "dependencies": assembled.dependencies,
            "dry_run": false,
        }),
    ))
}

struct Assembled {
    main_app: String,
    dependencies: Vec<String>,
    entries: Vec<Entry>,
    header: HeaderLines,
}

/// Runs the in-memory half of the pipeline: main-app resolution, collection,
/// dedup, and header composition. Nothing on disk is touched beyond reads.
fn assemble(
    root: &Path,
    manifest: &ProjectManifest,
    apps: &[AppUnit],
    locator: &BeamLocator,
) -> Result<Assembled, EscriptError> {
    let config = &manifest.escript;
    let main = resolve_main_app(apps, config.main_app.as_deref())?;

    let main_ebin = main.out_dir.join("ebin");
    if !main_ebin.is_dir() {
        return Err(EscriptError::BadAppName(main.name.clone()));
    }
    let mut entries = collect(&format!("{}/ebin", main.name), "*", &main_ebin)?;

    let dependencies = dependency_set(locator, apps, &main.name, &config.include_apps);
    entries.extend(dependency_entries(locator, &dependencies)?);

    for extra in &config.extra_files {
        let dir = resolve_dir(root, Some(&extra.dir), ".");
        entries.extend(collect("", &extra.pattern, &dir)?);
    }

    let entries = dedup_entries(entries);
    let header = compose_headers(config, &main.name)?;
    debug!(
        main_app = %main.name,
        dependencies = dependencies.len(),
        entries = entries.len(),
        "assembled escript contents"
    );

    Ok(Assembled {
        main_app: main.name.clone(),
        dependencies,
        entries,
        header,
    })
}

/// The embedded dependency set: every compiled application that is not
/// project-owned, plus the configured inclusions, ordered and unique.
fn dependency_set(
    locator: &BeamLocator,
    apps: &[AppUnit],
    main_app: &str,
    include_apps: &[String],
) -> Vec<String> {
    let is_project_app = |name: &str| apps.iter().any(|app| app.name == name);
    let mut names: Vec<String> = locator
        .app_names()
        .filter(|name| !is_project_app(name))
        .map(ToString::to_string)
        .collect();
    for name in include_apps {
        if name != main_app && !names.iter().any(|n| n == name) {
            names.push(name.clone());
        }
    }
    names
}

fn write_escript(output_path: &Path, assembled: &Assembled) -> Result<BuildOutput, EscriptError> {
    emit(
        output_path,
        &assembled.header,
        &assembled.entries,
        &assembled.main_app,
    )?;
    let bytes = fs::metadata(output_path)?.len();
    let sha256 = compute_file_sha256(output_path)?;
    Ok(BuildOutput {
        path: output_path.to_path_buf(),
        bytes,
        sha256,
        entries: assembled.entries.len(),
    })
}

fn error_outcome(err: EscriptError) -> ExecutionOutcome {
    let user_error = err.is_user_error();
    let hint = err.hint();
    let chain = format!("{:#}", anyhow::Error::new(err));
    let message = format!("beampack build: {chain}");
    let details = match hint {
        Some(hint) => json!({ "error": chain, "hint": hint }),
        None => json!({ "error": chain }),
    };
    if user_error {
        ExecutionOutcome::user_error(message, details)
    } else {
        ExecutionOutcome::failure(message, details)
    }
}

fn resolve_dir(root: &Path, configured: Option<&PathBuf>, default: &str) -> PathBuf {
    match configured {
        Some(path) if path.is_absolute() => path.clone(),
        Some(path) => root.join(path),
        None => root.join(default),
    }
}

fn relative_path_str(path: &Path, root: &Path) -> String {
    path.strip_prefix(root).unwrap_or(path).display().to_string()
}

fn compute_file_sha256(path: &Path) -> io::Result<String> {
    let mut file = fs::File::open(path)?;
    let mut hasher = Sha256::new();
    io::copy(&mut file, &mut hasher)?;
    Ok(format!("{:x}", hasher.finalize()))
}

fn format_bytes(bytes: u64) -> String {
    const KB: f64 = 1024.0;
    const MB: f64 = KB * 1024.0;
    let value = bytes as f64;
    if value >= MB {
        format!("{:.1} MB", value / MB)
    } else if value >= KB {
        format!("{:.1} KB", value / KB)
    } else {
        format!("{bytes} B")
    }
}

#[cfg(test)]
mod tests {
    use std::io::{Cursor, Read};

    use tempfile::tempdir;
    use zip::ZipArchive;

    use crate::outcome::CommandStatus;

    use super::*;

    fn write_file(root: &Path, rel: &str, contents: &[u8]) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, contents).unwrap();
    }

    fn scaffold_single_app(root: &Path) {
        write_file(root, "beampack.toml", b"[project]\nname = \"sample\"\n");
        write_file(root, "_build/lib/sample/ebin/sample.beam", b"FOR1 sample");
        write_file(
            root,
            "_build/lib/sample/ebin/sample.app",
            b"{application, sample, []}.",
        );
        write_file(root, "_build/lib/jsx/ebin/jsx.beam", b"FOR1 jsx");
    }

    fn read_archive(escript: &Path) -> ZipArchive<Cursor<Vec<u8>>> {
        let bytes = fs::read(escript).unwrap();
        let mut rest = bytes.as_slice();
        for _ in 0..3 {
            let cut = rest.iter().position(|b| *b == b'\n').unwrap();
            rest = &rest[cut + 1..];
        }
        ZipArchive::new(Cursor::new(rest.to_vec())).unwrap()
    }

    fn archive_names(escript: &Path) -> Vec<String> {
        let mut archive = read_archive(escript);
        (0..archive.len())
            .map(|i| archive.by_index(i).unwrap().name().to_string())
            .collect()
    }

    #[test]
    fn build_embeds_app_and_resolved_dependencies() {
        let tmp = tempdir().unwrap();
        scaffold_single_app(tmp.path());
        let outcome = escriptize(tmp.path(), &EscriptizeRequest::default()).unwrap();
        assert_eq!(outcome.status, CommandStatus::Ok);

        let escript = tmp.path().join("bin").join("sample");
        let names = archive_names(&escript);
        assert!(names.contains(&"sample/ebin/sample.beam".to_string()));
        assert!(names.contains(&"sample/ebin/sample.app".to_string()));
        assert!(names.contains(&"jsx/ebin/jsx.beam".to_string()));
        // dependency ebins carry only compiled units
        assert!(!names.contains(&"jsx/ebin/jsx.app".to_string()));
    }

    #[test]
    fn stray_lib_dir_entries_are_not_treated_as_dependencies() {
        let tmp = tempdir().unwrap();
        scaffold_single_app(tmp.path());
        fs::create_dir_all(tmp.path().join("_build/lib/.cache")).unwrap();
        fs::create_dir_all(tmp.path().join("_build/lib/doc")).unwrap();
        let outcome = escriptize(tmp.path(), &EscriptizeRequest::default()).unwrap();
        assert_eq!(outcome.status, CommandStatus::Ok);

        let names = archive_names(&tmp.path().join("bin").join("sample"));
        assert!(!names.iter().any(|n| n.starts_with(".cache") || n.starts_with("doc")));
    }

    #[test]
    fn successive_builds_are_byte_identical() {
        let tmp = tempdir().unwrap();
        scaffold_single_app(tmp.path());
        let escript = tmp.path().join("bin").join("sample");

        escriptize(tmp.path(), &EscriptizeRequest::default()).unwrap();
        let first = fs::read(&escript).unwrap();
        escriptize(tmp.path(), &EscriptizeRequest::default()).unwrap();
        let second = fs::read(&escript).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn colliding_paths_keep_the_first_source() {
        let tmp = tempdir().unwrap();
        scaffold_single_app(tmp.path());
        // Extra file mapping onto the same archive path as the jsx dependency.
        write_file(tmp.path(), "shadow/jsx/ebin/jsx.beam", b"SHADOW");
        write_file(
            tmp.path(),
            "beampack.toml",
            b"[project]\nname = \"sample\"\n\n[[escript.extra_files]]\npattern = \"*\"\ndir = \"shadow\"\n",
        );
        let outcome = escriptize(tmp.path(), &EscriptizeRequest::default()).unwrap();
        assert_eq!(outcome.status, CommandStatus::Ok);

        let escript = tmp.path().join("bin").join("sample");
        let mut archive = read_archive(&escript);
        let mut content = Vec::new();
        archive
            .by_name("jsx/ebin/jsx.beam")
            .unwrap()
            .read_to_end(&mut content)
            .unwrap();
        assert_eq!(content, b"FOR1 jsx");
    }

    #[test]
    fn empty_data_files_are_excluded_but_markers_survive() {
        let tmp = tempdir().unwrap();
        scaffold_single_app(tmp.path());
        write_file(tmp.path(), "_build/lib/sample/ebin/empty.beam", b"");
        let outcome = escriptize(tmp.path(), &EscriptizeRequest::default()).unwrap();
        assert_eq!(outcome.status, CommandStatus::Ok);

        let names = archive_names(&tmp.path().join("bin").join("sample"));
        assert!(!names.contains(&"sample/ebin/empty.beam".to_string()));
        assert!(names.contains(&"sample/".to_string()));
        assert!(names.contains(&"sample/ebin/".to_string()));
        assert!(names.contains(&"jsx/".to_string()));
        assert!(names.contains(&"jsx/ebin/".to_string()));
    }

    #[test]
    fn multiple_apps_without_main_app_is_a_user_error() {
        let tmp = tempdir().unwrap();
        write_file(
            tmp.path(),
            "beampack.toml",
            b"[project]\napps = [\"a\", \"b\"]\n",
        );
        write_file(tmp.path(), "_build/lib/a/ebin/a.beam", b"A");
        write_file(tmp.path(), "_build/lib/b/ebin/b.beam", b"B");
        let outcome = escriptize(tmp.path(), &EscriptizeRequest::default()).unwrap();
        assert_eq!(outcome.status, CommandStatus::UserError);
        assert!(outcome.message.contains("main_app"));
        assert!(!tmp.path().join("bin").exists());
    }

    #[test]
    fn unknown_main_app_is_a_user_error() {
        let tmp = tempdir().unwrap();
        write_file(
            tmp.path(),
            "beampack.toml",
            b"[project]\napps = [\"a\", \"b\"]\n\n[escript]\nmain_app = \"ghost\"\n",
        );
        write_file(tmp.path(), "_build/lib/a/ebin/a.beam", b"A");
        write_file(tmp.path(), "_build/lib/b/ebin/b.beam", b"B");
        let outcome = escriptize(tmp.path(), &EscriptizeRequest::default()).unwrap();
        assert_eq!(outcome.status, CommandStatus::UserError);
        assert!(outcome.message.contains("ghost"));
    }

    #[test]
    fn unknown_include_app_fails_without_writing_output() {
        let tmp = tempdir().unwrap();
        scaffold_single_app(tmp.path());
        write_file(
            tmp.path(),
            "beampack.toml",
            b"[project]\nname = \"sample\"\n\n[escript]\ninclude_apps = [\"missing_dep\"]\n",
        );
        let outcome = escriptize(tmp.path(), &EscriptizeRequest::default()).unwrap();
        assert_eq!(outcome.status, CommandStatus::UserError);
        assert!(outcome.message.contains("missing_dep"));
        assert!(!tmp.path().join("bin").join("sample").exists());
    }

    #[test]
    fn invalid_shebang_fails_before_any_archive_is_written() {
        let tmp = tempdir().unwrap();
        scaffold_single_app(tmp.path());
        write_file(
            tmp.path(),
            "beampack.toml",
            b"[project]\nname = \"sample\"\n\n[escript]\nshebang = \"no marker here\"\n",
        );
        let outcome = escriptize(tmp.path(), &EscriptizeRequest::default()).unwrap();
        assert_eq!(outcome.status, CommandStatus::UserError);
        assert!(outcome.message.contains("shebang"));
        assert!(!tmp.path().join("bin").exists());
    }

    #[test]
    fn escript_name_overrides_output_basename() {
        let tmp = tempdir().unwrap();
        scaffold_single_app(tmp.path());
        write_file(
            tmp.path(),
            "beampack.toml",
            b"[project]\nname = \"sample\"\n\n[escript]\nname = \"st\"\n",
        );
        escriptize(tmp.path(), &EscriptizeRequest::default()).unwrap();
        assert!(tmp.path().join("bin").join("st").exists());
    }

    #[test]
    fn dry_run_reports_entries_without_writing() {
        let tmp = tempdir().unwrap();
        scaffold_single_app(tmp.path());
        let request = EscriptizeRequest {
            dry_run: true,
            ..EscriptizeRequest::default()
        };
        let outcome = escriptize(tmp.path(), &request).unwrap();
        assert_eq!(outcome.status, CommandStatus::Ok);
        assert!(!tmp.path().join("bin").exists());
        let entries = outcome.details["entries"].as_array().unwrap();
        assert!(entries
            .iter()
            .any(|v| v.as_str() == Some("sample/ebin/sample.beam")));
    }

    #[test]
    fn extra_files_are_embedded_under_their_relative_paths() {
        let tmp = tempdir().unwrap();
        scaffold_single_app(tmp.path());
        write_file(tmp.path(), "priv/banner.txt", b"hello");
        write_file(
            tmp.path(),
            "beampack.toml",
            b"[project]\nname = \"sample\"\n\n[[escript.extra_files]]\npattern = \"priv/*\"\n",
        );
        escriptize(tmp.path(), &EscriptizeRequest::default()).unwrap();
        let names = archive_names(&tmp.path().join("bin").join("sample"));
        assert!(names.contains(&"priv/banner.txt".to_string()));
        assert!(names.contains(&"priv/".to_string()));
    }

    #[test]
    fn missing_lib_dir_is_reported_with_a_hint() {
        let tmp = tempdir().unwrap();
        write_file(tmp.path(), "beampack.toml", b"[project]\nname = \"sample\"\n");
        let outcome = escriptize(tmp.path(), &EscriptizeRequest::default()).unwrap();
        assert_eq!(outcome.status, CommandStatus::UserError);
        assert!(outcome.hint().unwrap().contains("compile"));
    }

    #[test]
    fn format_bytes_scales_values() {
        assert_eq!(format_bytes(500), "500 B");
        assert_eq!(format_bytes(2048), "2.0 KB");
        assert_eq!(format_bytes(1_572_864), "1.5 MB");
    }
}
