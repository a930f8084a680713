//! In-memory [`BuildShell`] that records every mutation.
//!
//! Files carry a logical modification time taken from a counter, so tests
//! can order "older" and "newer" files without sleeping.

use camino::{Utf8Path, Utf8PathBuf};
use ccbuild::shell::{BuildShell, FileStatus};
use std::collections::BTreeMap;
use std::io;
use std::sync::Mutex;
use std::time::{Duration, SystemTime};

/// A filesystem mutation performed through the shell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShellOp {
    /// `write(path, ..)`
    Write(Utf8PathBuf),
    /// `mkdir(path)`
    Mkdir(Utf8PathBuf),
    /// `unlink(path)`
    Unlink(Utf8PathBuf),
    /// `copy(from, to)`
    Copy(Utf8PathBuf, Utf8PathBuf),
    /// `symlink(target, link)`
    Symlink(String, Utf8PathBuf),
    /// `copy_tree(source_root, install_root)`
    CopyTree(Utf8PathBuf, Utf8PathBuf),
    /// `unlink_tree(source_root, install_root)`
    UnlinkTree(Utf8PathBuf, Utf8PathBuf),
}

#[derive(Debug, Default)]
struct State {
    clock: u64,
    files: BTreeMap<Utf8PathBuf, (String, u64)>,
    ops: Vec<ShellOp>,
}

impl State {
    fn tick(&mut self) -> u64 {
        self.clock += 1;
        self.clock
    }

    fn put(&mut self, path: &Utf8Path, contents: String) {
        let stamp = self.tick();
        self.files.insert(path.to_owned(), (contents, stamp));
    }
}

/// Shell over an in-memory file table.
#[derive(Debug, Default)]
pub struct RecordingShell {
    state: Mutex<State>,
}

impl RecordingShell {
    /// Create an empty filesystem.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create or update `path`, making it newer than every existing file.
    pub fn touch(&self, path: impl AsRef<Utf8Path>) {
        self.state().put(path.as_ref(), String::new());
    }

    /// Contents of `path`, if it exists.
    pub fn contents(&self, path: impl AsRef<Utf8Path>) -> Option<String> {
        self.state()
            .files
            .get(path.as_ref())
            .map(|(contents, _)| contents.clone())
    }

    /// Whether `path` exists.
    pub fn exists(&self, path: impl AsRef<Utf8Path>) -> bool {
        self.state().files.contains_key(path.as_ref())
    }

    /// Mutations performed so far, in order.
    pub fn ops(&self) -> Vec<ShellOp> {
        self.state().ops.clone()
    }

    /// Forget recorded mutations, keeping the files.
    pub fn clear_ops(&self) {
        self.state().ops.clear();
    }

    fn state(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().expect("shell state lock")
    }
}

impl BuildShell for RecordingShell {
    fn file_status(&self, path: &Utf8Path) -> Option<FileStatus> {
        self.state().files.get(path).map(|(_, stamp)| FileStatus {
            modified: SystemTime::UNIX_EPOCH + Duration::from_secs(*stamp),
        })
    }

    fn read_to_string(&self, path: &Utf8Path) -> io::Result<String> {
        self.contents(path)
            .ok_or_else(|| io::Error::from(io::ErrorKind::NotFound))
    }

    fn write(&self, path: &Utf8Path, contents: &str) -> io::Result<()> {
        let mut state = self.state();
        state.put(path, contents.to_owned());
        state.ops.push(ShellOp::Write(path.to_owned()));
        Ok(())
    }

    fn mkdir(&self, path: &Utf8Path) -> io::Result<()> {
        self.state().ops.push(ShellOp::Mkdir(path.to_owned()));
        Ok(())
    }

    fn unlink(&self, path: &Utf8Path) -> io::Result<()> {
        let mut state = self.state();
        state.files.remove(path);
        state.ops.push(ShellOp::Unlink(path.to_owned()));
        Ok(())
    }

    fn copy(&self, from: &Utf8Path, to: &Utf8Path) -> io::Result<()> {
        let mut state = self.state();
        let contents = state
            .files
            .get(from)
            .map(|(contents, _)| contents.clone())
            .ok_or_else(|| io::Error::from(io::ErrorKind::NotFound))?;
        state.put(to, contents);
        state.ops.push(ShellOp::Copy(from.to_owned(), to.to_owned()));
        Ok(())
    }

    fn symlink(&self, target: &str, link: &Utf8Path) -> io::Result<()> {
        let mut state = self.state();
        state.put(link, format!("-> {target}"));
        state.ops.push(ShellOp::Symlink(target.to_owned(), link.to_owned()));
        Ok(())
    }

    fn copy_tree(&self, source_root: &Utf8Path, install_root: &Utf8Path) -> io::Result<()> {
        let mut state = self.state();
        let mirrored: Vec<(Utf8PathBuf, String)> = state
            .files
            .iter()
            .filter_map(|(path, (contents, _))| {
                let relative = path.strip_prefix(source_root).ok()?;
                Some((install_root.join(relative), contents.clone()))
            })
            .collect();
        for (path, contents) in mirrored {
            state.put(&path, contents);
        }
        state
            .ops
            .push(ShellOp::CopyTree(source_root.to_owned(), install_root.to_owned()));
        Ok(())
    }

    fn unlink_tree(&self, source_root: &Utf8Path, install_root: &Utf8Path) -> io::Result<()> {
        let mut state = self.state();
        let mirrored: Vec<Utf8PathBuf> = state
            .files
            .keys()
            .filter_map(|path| Some(install_root.join(path.strip_prefix(source_root).ok()?)))
            .collect();
        for path in mirrored {
            state.files.remove(&path);
        }
        state
            .ops
            .push(ShellOp::UnlinkTree(source_root.to_owned(), install_root.to_owned()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn touched_files_are_newer() {
        let shell = RecordingShell::new();
        shell.touch("/a");
        shell.touch("/b");
        let a = shell.file_status(Utf8Path::new("/a")).expect("a");
        let b = shell.file_status(Utf8Path::new("/b")).expect("b");
        assert!(b.modified > a.modified);
    }

    #[test]
    fn trees_are_mirrored_and_removed() {
        let shell = RecordingShell::new();
        shell.touch("/src/include/core/a.h");
        let source = Utf8Path::new("/src/include");
        let install = Utf8Path::new("/usr/include");
        shell.copy_tree(source, install).expect("copy");
        assert!(shell.exists("/usr/include/core/a.h"));
        shell.unlink_tree(source, install).expect("unlink");
        assert!(!shell.exists("/usr/include/core/a.h"));
        assert!(shell.exists("/src/include/core/a.h"));
    }
}
