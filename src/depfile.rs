//! Compiler dependency record parsing.
//!
//! GCC and Clang emit Makefile fragments (`-MD`/`-MF`) describing which files
//! a translation unit read, which named modules it imports and, for module
//! interface units, the module it exports. [`DependencyFile`] reduces such a
//! fragment to the three facts the build graph needs.
//!
//! # Examples
//!
//! ```
//! use ccbuild::depfile::DependencyFile;
//!
//! let record = DependencyFile::parse(
//!     "core.o gcm.cache/core.gcm: /src/core.cc\n\
//!      core.o gcm.cache/core.gcm: core:bits.c++m\n\
//!      core.c++m: gcm.cache/core.gcm\n\
//!      .PHONY: core.c++m\n",
//! );
//! assert!(record.is_valid());
//! assert_eq!(record.sources(), ["/src/core.cc"]);
//! assert_eq!(record.imports(), ["core:bits.c++m"]);
//! assert_eq!(record.module_name(), "core.c++m");
//! ```

use camino::Utf8Path;
use tracing::debug;

use crate::shell::BuildShell;

const PHONY: &str = ".PHONY";

/// A parsed compiler dependency record.
///
/// Construction never fails; malformed input produces a record whose
/// [`is_valid`](Self::is_valid) returns `false` and whose lists are empty.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DependencyFile {
    text: String,
    valid: bool,
    sources: Vec<String>,
    imports: Vec<String>,
    module_name: String,
}

impl DependencyFile {
    /// Parse a dependency record.
    #[must_use]
    pub fn parse(text: &str) -> Self {
        let joined = join_continuations(text);
        let mut lines = joined.lines();

        let Some(sources) = lines.next().and_then(right_hand_side) else {
            return Self {
                text: text.to_owned(),
                ..Self::default()
            };
        };

        let imports = lines.next().and_then(right_hand_side).unwrap_or_default();

        let module_name = lines
            .filter(|line| line.starts_with(PHONY))
            .find_map(|line| line.split_once(':'))
            .map(|(_, name)| normalize(name))
            .unwrap_or_default();

        Self {
            text: text.to_owned(),
            valid: true,
            sources: split_words(&sources),
            imports: split_words(&imports),
            module_name,
        }
    }

    /// Read and parse the record stored at `path`.
    ///
    /// A record that cannot be read is reported as invalid.
    #[must_use]
    pub fn load(shell: &dyn BuildShell, path: &Utf8Path) -> Self {
        match shell.read_to_string(path) {
            Ok(text) => Self::parse(&text),
            Err(err) => {
                debug!(path = %path, error = %err, "dependency record unavailable");
                Self::default()
            }
        }
    }

    /// The raw record text as supplied to [`parse`](Self::parse).
    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Whether the first line carried an `outputs: sources` rule.
    #[must_use]
    pub const fn is_valid(&self) -> bool {
        self.valid
    }

    /// Source files read by the translation unit, in record order.
    #[must_use]
    pub fn sources(&self) -> &[String] {
        &self.sources
    }

    /// Module names imported by the translation unit, in record order.
    #[must_use]
    pub fn imports(&self) -> &[String] {
        &self.imports
    }

    /// Name of the exported module, or the empty string.
    #[must_use]
    pub fn module_name(&self) -> &str {
        &self.module_name
    }

    /// Whether the translation unit exports a named module.
    #[must_use]
    pub const fn is_module(&self) -> bool {
        !self.module_name.is_empty()
    }
}

fn join_continuations(text: &str) -> String {
    text.replace("\\\r\n", "").replace("\\\n", "")
}

/// Return the normalised text after the first `:`, if the line has one.
fn right_hand_side(line: &str) -> Option<String> {
    line.split_once(':').map(|(_, rhs)| normalize(rhs))
}

fn normalize(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn split_words(text: &str) -> Vec<String> {
    if text.is_empty() {
        return Vec::new();
    }
    text.split(' ').map(str::to_owned).collect()
}
