use std::{
    fs,
    io::{Cursor, Write},
    path::Path,
};

use tempfile::NamedTempFile;
use zip::{write::FileOptions, CompressionMethod, ZipWriter};

use beampack_domain::{Entry, EscriptError};

use crate::header::HeaderLines;

/// Writes the escript: three header lines followed by a zip archive of
/// `entries`, atomically moved into place and marked executable.
///
/// The file only ever appears at `output_path` complete; a temporary file in
/// the same directory receives the bytes and is renamed on success (and
/// removed on any failure).
pub fn emit(
    output_path: &Path,
    header: &HeaderLines,
    entries: &[Entry],
    app_name: &str,
) -> Result<(), EscriptError> {
    if let Some(parent) = output_path.parent() {
        fs::create_dir_all(parent)?;
    }

    let creation_failed = |err: anyhow::Error| EscriptError::CreationFailed {
        app: app_name.to_string(),
        source: err,
    };
    let body = archive_bytes(entries).map_err(|err| creation_failed(err.into()))?;
    write_atomic(output_path, header, &body).map_err(|err| creation_failed(err.into()))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mut perms = fs::metadata(output_path)?.permissions();
        perms.set_mode(perms.mode() | 0o111);
        fs::set_permissions(output_path, perms)?;
    }

    Ok(())
}

/// Stages the escript in a temporary file beside the destination and renames
/// it into place, so no partial artifact is ever visible at `output_path`.
fn write_atomic(
    output_path: &Path,
    header: &HeaderLines,
    body: &[u8],
) -> std::io::Result<()> {
    let dir = output_path.parent().unwrap_or_else(|| Path::new("."));
    let mut tmp = NamedTempFile::new_in(dir)?;
    for line in header.lines() {
        tmp.write_all(line.as_bytes())?;
        tmp.write_all(b"\n")?;
    }
    tmp.write_all(body)?;
    tmp.persist(output_path).map_err(|err| err.error)?;
    Ok(())
}

/// Renders the entry list as deterministic zip bytes: deflate, fixed DOS
/// epoch timestamp, directory markers as explicit directory records.
fn archive_bytes(entries: &[Entry]) -> zip::result::ZipResult<Vec<u8>> {
    let mut archive = ZipWriter::new(Cursor::new(Vec::new()));
    let options = FileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .last_modified_time(zip::DateTime::default())
        .unix_permissions(0o644);
    for entry in entries {
        if entry.is_dir_marker() {
            archive.add_directory(entry.path.trim_end_matches('/'), options)?;
        } else {
            archive.start_file(entry.path.as_str(), options)?;
            archive.write_all(&entry.content)?;
        }
    }
    Ok(archive.finish()?.into_inner())
}
