//! Filesystem access used by build stages.
//!
//! Stages never touch the filesystem directly; they go through
//! [`BuildShell`] so tests can observe or script every side effect.
//! [`LocalShell`] is the implementation used by the binary.

use camino::{Utf8Path, Utf8PathBuf};
use std::fs;
use std::io::{self, ErrorKind};
use std::time::SystemTime;
use tracing::debug;
use walkdir::WalkDir;

/// Metadata the build engine needs about an existing file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileStatus {
    /// Last modification time.
    pub modified: SystemTime,
}

/// Filesystem operations performed on behalf of build stages.
#[cfg_attr(test, mockall::automock)]
pub trait BuildShell {
    /// Return the status of `path`, or `None` when it does not exist.
    fn file_status(&self, path: &Utf8Path) -> Option<FileStatus>;

    /// Read a UTF-8 text file.
    ///
    /// # Errors
    ///
    /// Returns an error when the file cannot be read.
    fn read_to_string(&self, path: &Utf8Path) -> io::Result<String>;

    /// Replace the contents of `path`.
    ///
    /// # Errors
    ///
    /// Returns an error when the file cannot be written.
    fn write(&self, path: &Utf8Path, contents: &str) -> io::Result<()>;

    /// Create `path` and any missing parents.
    ///
    /// # Errors
    ///
    /// Returns an error when a directory cannot be created.
    fn mkdir(&self, path: &Utf8Path) -> io::Result<()>;

    /// Remove a file or symlink. A missing file counts as removed.
    ///
    /// # Errors
    ///
    /// Returns an error when an existing file cannot be removed.
    fn unlink(&self, path: &Utf8Path) -> io::Result<()>;

    /// Copy `from` to `to`, creating the destination directory.
    ///
    /// # Errors
    ///
    /// Returns an error when the copy fails.
    fn copy(&self, from: &Utf8Path, to: &Utf8Path) -> io::Result<()>;

    /// Point the symlink `link` at `target`, replacing an existing link.
    ///
    /// # Errors
    ///
    /// Returns an error when the link cannot be created.
    fn symlink(&self, target: &str, link: &Utf8Path) -> io::Result<()>;

    /// Copy every file below `source_root` to the same relative path below
    /// `install_root`.
    ///
    /// # Errors
    ///
    /// Returns an error when walking or copying fails.
    fn copy_tree(&self, source_root: &Utf8Path, install_root: &Utf8Path) -> io::Result<()>;

    /// Remove every file below `install_root` that mirrors a file below
    /// `source_root`.
    ///
    /// # Errors
    ///
    /// Returns an error when walking or removing fails.
    fn unlink_tree(&self, source_root: &Utf8Path, install_root: &Utf8Path) -> io::Result<()>;
}

/// [`BuildShell`] backed by the local filesystem.
#[derive(Debug, Default, Clone, Copy)]
pub struct LocalShell;

impl LocalShell {
    fn mirrored_files(
        source_root: &Utf8Path,
        install_root: &Utf8Path,
    ) -> io::Result<Vec<(Utf8PathBuf, Utf8PathBuf)>> {
        if !source_root.is_dir() {
            return Ok(Vec::new());
        }
        let mut files = Vec::new();
        for entry in WalkDir::new(source_root).sort_by_file_name() {
            let entry = entry?;
            if !entry.file_type().is_file() {
                continue;
            }
            let Some(path) = Utf8Path::from_path(entry.path()) else {
                debug!(path = %entry.path().display(), "skipping non UTF-8 path");
                continue;
            };
            let Ok(relative) = path.strip_prefix(source_root) else {
                continue;
            };
            files.push((path.to_owned(), install_root.join(relative)));
        }
        Ok(files)
    }
}

impl BuildShell for LocalShell {
    fn file_status(&self, path: &Utf8Path) -> Option<FileStatus> {
        let metadata = fs::metadata(path).ok()?;
        let modified = metadata.modified().ok()?;
        Some(FileStatus { modified })
    }

    fn read_to_string(&self, path: &Utf8Path) -> io::Result<String> {
        fs::read_to_string(path)
    }

    fn write(&self, path: &Utf8Path, contents: &str) -> io::Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, contents)
    }

    fn mkdir(&self, path: &Utf8Path) -> io::Result<()> {
        fs::create_dir_all(path)
    }

    fn unlink(&self, path: &Utf8Path) -> io::Result<()> {
        match fs::remove_file(path) {
            Ok(()) => {
                debug!(path = %path, "removed");
                Ok(())
            }
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err),
        }
    }

    fn copy(&self, from: &Utf8Path, to: &Utf8Path) -> io::Result<()> {
        if let Some(parent) = to.parent().filter(|p| !p.as_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        fs::copy(from, to).map(drop)
    }

    fn symlink(&self, target: &str, link: &Utf8Path) -> io::Result<()> {
        self.unlink(link)?;
        #[cfg(unix)]
        {
            std::os::unix::fs::symlink(target, link)
        }
        #[cfg(windows)]
        {
            std::os::windows::fs::symlink_file(target, link)
        }
        #[cfg(not(any(unix, windows)))]
        {
            Err(io::Error::new(
                ErrorKind::Unsupported,
                format!("cannot link {link} to {target}: symlinks unsupported"),
            ))
        }
    }

    fn copy_tree(&self, source_root: &Utf8Path, install_root: &Utf8Path) -> io::Result<()> {
        for (from, to) in Self::mirrored_files(source_root, install_root)? {
            self.copy(&from, &to)?;
        }
        Ok(())
    }

    fn unlink_tree(&self, source_root: &Utf8Path, install_root: &Utf8Path) -> io::Result<()> {
        for (_, installed) in Self::mirrored_files(source_root, install_root)? {
            self.unlink(&installed)?;
            // Drop directories left empty, stopping at the install root.
            let mut dir = installed.parent();
            while let Some(current) = dir {
                if current == install_root || fs::remove_dir(current).is_err() {
                    break;
                }
                dir = current.parent();
            }
        }
        Ok(())
    }
}
