//! Test utilities for the build engine.
//!
//! This crate provides in-memory doubles for the engine's filesystem and
//! reporter along with helpers that lay out real projects and a fake
//! compiler for end-to-end tests.

pub mod reporter;
pub mod shell;

pub use reporter::RecordingReporter;
pub use shell::{RecordingShell, ShellOp};

use camino::{Utf8Path, Utf8PathBuf};
use std::fs::{self, File};
use std::io::Write;
use tempfile::TempDir;

/// Create a fake `gcc`/`g++` that exits with `exit_code`.
///
/// On success the script creates the file named by `-o` and, when `-MF` is
/// given, a one-line dependency record naming the last positional argument
/// as the only source. Every invocation is appended to `calls.log` next to
/// the script.
///
/// Returns the temporary directory and the path to the executable.
pub fn fake_compiler(exit_code: i32) -> (TempDir, Utf8PathBuf) {
    let dir = TempDir::new().expect("temp dir");
    let root = Utf8Path::from_path(dir.path()).expect("utf8 temp dir").to_owned();
    let path = root.join("cc");
    let log = root.join("calls.log");
    let mut file = File::create(&path).expect("script");
    write!(
        file,
        r#"#!/bin/sh
echo "$@" >> '{log}'
[ {exit_code} -eq 0 ] || exit {exit_code}
out=""; dep=""; src=""
while [ $# -gt 0 ]; do
  case "$1" in
    -o) out="$2"; shift ;;
    -MF) dep="$2"; shift ;;
    -*) ;;
    *) src="$1" ;;
  esac
  shift
done
[ -z "$out" ] || : > "$out"
[ -z "$dep" ] || printf '%s: %s\n' "$out" "$src" > "$dep"
"#
    )
    .expect("write script");
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mut perms = fs::metadata(&path).expect("meta").permissions();
        perms.set_mode(0o755);
        fs::set_permissions(&path, perms).expect("perms");
    }
    (dir, path)
}

/// Lines logged by a [`fake_compiler`] living at `compiler`.
pub fn compiler_calls(compiler: &Utf8Path) -> Vec<String> {
    let log = compiler.with_file_name("calls.log");
    fs::read_to_string(log)
        .map(|text| text.lines().map(str::to_owned).collect())
        .unwrap_or_default()
}

/// Write a project below `root`: `Recipe.yml` holding `recipe`, plus an
/// empty file for each of `files`.
///
/// Returns the project directory.
pub fn write_project(root: &Utf8Path, name: &str, recipe: &str, files: &[&str]) -> Utf8PathBuf {
    let project = root.join(name);
    fs::create_dir_all(&project).expect("project dir");
    fs::write(project.join("Recipe.yml"), recipe).expect("recipe");
    for file in files {
        let path = project.join(file);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("source dir");
        }
        fs::write(&path, "").expect("source");
    }
    project
}
