//! Recipe configuration objects.
//!
//! A recipe is a small YAML document describing one build target. It is read
//! into a generic [`ConfigObject`]: a class tag (`Application`, `Library`,
//! `Release`, `Linux`, ...), ordered scalar or list properties, and ordered
//! child sections. Interpretation of the properties is left to
//! [`crate::plan`] and [`crate::params`].
//!
//! ```yaml
//! class: Application
//! name: hello
//! source: ["src/*.cc"]
//! use: ["../core"]
//! optimize: 2
//! children:
//!   - class: Release
//!     optimize: 3
//! ```

use camino::{Utf8Path, Utf8PathBuf};
use indexmap::IndexMap;
use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use std::fs;
use thiserror::Error;

/// File name of the recipe inside a project directory.
pub const RECIPE_FILE: &str = "Recipe.yml";

/// A property value in a recipe.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum ConfigValue {
    /// `true` or `false`.
    Bool(bool),
    /// An integer literal such as `optimize: 2`.
    Integer(i64),
    /// A decimal literal such as `version: 1.2`. Quote versions with
    /// trailing zeros (`"1.10"`) to keep them intact.
    Decimal(f64),
    /// A single string.
    Text(String),
    /// A list of strings.
    List(Vec<String>),
}

impl From<&str> for ConfigValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_owned())
    }
}

impl From<bool> for ConfigValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl<const N: usize> From<[&str; N]> for ConfigValue {
    fn from(values: [&str; N]) -> Self {
        Self::List(values.iter().map(|v| (*v).to_owned()).collect())
    }
}

/// A hierarchical, class-tagged configuration object.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct ConfigObject {
    /// Class tag of the section.
    #[serde(rename = "class")]
    pub class_name: String,

    /// Nested sections, in document order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<ConfigObject>,

    /// Remaining key/value pairs, in document order.
    #[serde(flatten)]
    pub properties: IndexMap<String, ConfigValue>,
}

impl ConfigObject {
    /// Create an empty object with the given class tag.
    #[must_use]
    pub fn new(class_name: impl Into<String>) -> Self {
        Self {
            class_name: class_name.into(),
            ..Self::default()
        }
    }

    /// Builder helper setting `key` to `value`.
    #[must_use]
    pub fn with(mut self, key: &str, value: impl Into<ConfigValue>) -> Self {
        self.properties.insert(key.to_owned(), value.into());
        self
    }

    /// Builder helper appending a child section.
    #[must_use]
    pub fn with_child(mut self, child: Self) -> Self {
        self.children.push(child);
        self
    }

    /// Read `key` as a string; absent keys read as the empty string.
    #[must_use]
    pub fn text(&self, key: &str) -> String {
        match self.properties.get(key) {
            Some(ConfigValue::Text(text)) => text.clone(),
            Some(ConfigValue::Integer(value)) => value.to_string(),
            Some(ConfigValue::Decimal(value)) => value.to_string(),
            Some(ConfigValue::Bool(value)) => value.to_string(),
            Some(ConfigValue::List(items)) => items.join(" "),
            None => String::new(),
        }
    }

    /// Read `key` as a boolean; absent keys read as `false`.
    #[must_use]
    pub fn flag(&self, key: &str) -> bool {
        match self.properties.get(key) {
            Some(ConfigValue::Bool(value)) => *value,
            Some(ConfigValue::Text(text)) => text == "true",
            Some(ConfigValue::Integer(value)) => *value != 0,
            Some(ConfigValue::Decimal(_) | ConfigValue::List(_)) | None => false,
        }
    }

    /// Read `key` as a list; a single string reads as a one-element list.
    #[must_use]
    pub fn list(&self, key: &str) -> Vec<String> {
        match self.properties.get(key) {
            Some(ConfigValue::List(items)) => items.clone(),
            Some(ConfigValue::Text(text)) if !text.is_empty() => vec![text.clone()],
            Some(ConfigValue::Integer(value)) => vec![value.to_string()],
            Some(ConfigValue::Decimal(value)) => vec![value.to_string()],
            Some(ConfigValue::Text(_) | ConfigValue::Bool(_)) | None => Vec::new(),
        }
    }
}

/// Errors raised while reading recipes.
#[derive(Debug, Error, Diagnostic)]
pub enum RecipeError {
    /// The recipe file could not be read.
    #[error("failed to read recipe {path}")]
    #[diagnostic(code(ccbuild::recipe::read))]
    Read {
        /// Path of the recipe.
        path: Utf8PathBuf,
        /// Underlying I/O failure.
        #[source]
        source: std::io::Error,
    },

    /// The recipe is not a valid configuration object.
    #[error("failed to parse recipe {path}: {message}")]
    #[diagnostic(
        code(ccbuild::recipe::parse),
        help("a recipe needs a `class` key and string, boolean or list values")
    )]
    Parse {
        /// Path or name of the recipe.
        path: Utf8PathBuf,
        /// Parser message.
        message: String,
    },
}

/// Parse a recipe document. `name` is used in error messages.
///
/// # Errors
///
/// Returns [`RecipeError::Parse`] when the YAML is malformed or does not
/// describe a configuration object.
pub fn from_str(yaml: &str, name: &Utf8Path) -> Result<ConfigObject, RecipeError> {
    serde_saphyr::from_str(yaml).map_err(|err| RecipeError::Parse {
        path: name.to_owned(),
        message: err.to_string(),
    })
}

/// Load the recipe file at `path`.
///
/// # Errors
///
/// Returns [`RecipeError`] when the file cannot be read or parsed.
pub fn from_path(path: &Utf8Path) -> Result<ConfigObject, RecipeError> {
    let data = fs::read_to_string(path).map_err(|source| RecipeError::Read {
        path: path.to_owned(),
        source,
    })?;
    from_str(&data, path)
}

/// Supplies the recipe of a project directory.
pub trait RecipeSource {
    /// Load the recipe describing the project at `project_path`.
    ///
    /// # Errors
    ///
    /// Returns [`RecipeError`] when the recipe is missing or malformed.
    fn load(&self, project_path: &Utf8Path) -> Result<ConfigObject, RecipeError>;

    /// Whether `project_path` holds a recipe.
    fn exists(&self, project_path: &Utf8Path) -> bool;
}

/// Reads `Recipe.yml` from each project directory.
#[derive(Debug, Default, Clone, Copy)]
pub struct FileRecipeSource;

impl RecipeSource for FileRecipeSource {
    fn load(&self, project_path: &Utf8Path) -> Result<ConfigObject, RecipeError> {
        from_path(&project_path.join(RECIPE_FILE))
    }

    fn exists(&self, project_path: &Utf8Path) -> bool {
        project_path.join(RECIPE_FILE).is_file()
    }
}

#[cfg(test)]
pub(crate) mod fixtures;
#[cfg(test)]
mod tests;
