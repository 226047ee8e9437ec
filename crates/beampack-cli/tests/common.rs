#![allow(dead_code)]

use std::{
    fs, io,
    path::{Path, PathBuf},
};

use assert_cmd::assert::Assert;
use serde_json::Value;
use tempfile::TempDir;

pub fn prepare_fixture(prefix: &str) -> (TempDir, PathBuf) {
    let temp = tempfile::Builder::new()
        .prefix(prefix)
        .tempdir()
        .expect("tempdir");
    let dst = temp.path().join("sample_app");
    copy_dir_all(&fixture_source("sample_app"), &dst).expect("copy fixture");
    (temp, dst)
}

pub fn prepare_dual_fixture(prefix: &str) -> (TempDir, PathBuf) {
    let temp = tempfile::Builder::new()
        .prefix(prefix)
        .tempdir()
        .expect("tempdir");
    let dst = temp.path().join("dual_apps");
    copy_dir_all(&fixture_source("dual_apps"), &dst).expect("copy fixture");
    (temp, dst)
}

pub fn workspace_root() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .parent()
        .and_then(|p| p.parent())
        .expect("workspace root")
        .to_path_buf()
}

pub fn fixture_source(name: &str) -> PathBuf {
    workspace_root().join("fixtures").join(name)
}

fn copy_dir_all(src: &Path, dst: &Path) -> io::Result<()> {
    fs::create_dir_all(dst)?;
    for entry in fs::read_dir(src)? {
        let entry = entry?;
        let src_path = entry.path();
        let dst_path = dst.join(entry.file_name());
        if src_path.is_dir() {
            copy_dir_all(&src_path, &dst_path)?;
        } else {
            fs::copy(&src_path, &dst_path)?;
        }
    }
    Ok(())
}

pub fn parse_json(assert: &Assert) -> Value {
    serde_json::from_slice(&assert.get_output().stdout).expect("valid json")
}

/// Splits an escript into its three header lines and the archive body.
pub fn split_escript(bytes: &[u8]) -> (Vec<String>, Vec<u8>) {
    let mut lines = Vec::new();
    let mut rest = bytes;
    for _ in 0..3 {
        let cut = rest
            .iter()
            .position(|b| *b == b'\n')
            .expect("header line terminator");
        lines.push(String::from_utf8(rest[..cut].to_vec()).expect("utf-8 header"));
        rest = &rest[cut + 1..];
    }
    (lines, rest.to_vec())
}
