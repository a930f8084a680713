//! Command fingerprinting.
//!
//! A build output is stale when the command that produced it changed, even
//! if no input file did. [`CommandHasher`] computes a stable SHA-256 digest
//! of a command line and keeps it in a stamp file next to the output.
//!
//! # Examples
//!
//! ```
//! use ccbuild::hasher::CommandHasher;
//!
//! let a = CommandHasher::hash("g++ -O2 -c a.cc -o a.o");
//! let b = CommandHasher::hash("g++ -O3 -c a.cc -o a.o");
//! assert_ne!(a, b);
//! assert_eq!(a.len(), 64);
//! ```

use camino::{Utf8Path, Utf8PathBuf};
use sha2::{Digest, Sha256};
use std::io;

use crate::shell::BuildShell;

const STAMP_EXTENSION: &str = "cmd";

/// Computes and stores command digests.
pub struct CommandHasher;

impl CommandHasher {
    /// Calculate the digest of `command`.
    #[must_use]
    pub fn hash(command: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(b"cmd");
        Self::update_with_len(&mut hasher, command.as_bytes());
        format!("{:x}", hasher.finalize())
    }

    /// Path of the stamp file recording the command that built `output`.
    #[must_use]
    pub fn stamp_path(output: &Utf8Path) -> Utf8PathBuf {
        let mut name = output.as_str().to_owned();
        name.push('.');
        name.push_str(STAMP_EXTENSION);
        Utf8PathBuf::from(name)
    }

    /// Whether the stamp of `output` matches `command`.
    #[must_use]
    pub fn is_current(shell: &dyn BuildShell, output: &Utf8Path, command: &str) -> bool {
        shell
            .read_to_string(&Self::stamp_path(output))
            .is_ok_and(|stored| stored.trim() == Self::hash(command))
    }

    /// Record `command` as the one that built `output`.
    ///
    /// # Errors
    ///
    /// Returns an error if the stamp file cannot be written.
    pub fn record(shell: &dyn BuildShell, output: &Utf8Path, command: &str) -> io::Result<()> {
        let mut digest = Self::hash(command);
        digest.push('\n');
        shell.write(&Self::stamp_path(output), &digest)
    }

    fn update_with_len(hasher: &mut Sha256, bytes: &[u8]) {
        let len = bytes.len();
        hasher.update(format!("{len}:").as_bytes());
        hasher.update(bytes);
    }
}
