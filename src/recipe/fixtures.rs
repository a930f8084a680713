//! In-memory recipes for unit tests.

use camino::{Utf8Path, Utf8PathBuf};
use std::collections::HashMap;
use std::io;

use super::{ConfigObject, RECIPE_FILE, RecipeError, RecipeSource};

/// Recipes keyed by project directory.
#[derive(Debug, Default)]
pub(crate) struct MemoryRecipes(HashMap<Utf8PathBuf, ConfigObject>);

impl MemoryRecipes {
    pub(crate) fn with(mut self, path: &str, recipe: ConfigObject) -> Self {
        self.0.insert(Utf8PathBuf::from(path), recipe);
        self
    }
}

impl RecipeSource for MemoryRecipes {
    fn load(&self, project_path: &Utf8Path) -> Result<ConfigObject, RecipeError> {
        self.0
            .get(project_path)
            .cloned()
            .ok_or_else(|| RecipeError::Read {
                path: project_path.join(RECIPE_FILE),
                source: io::Error::from(io::ErrorKind::NotFound),
            })
    }

    fn exists(&self, project_path: &Utf8Path) -> bool {
        self.0.contains_key(project_path)
    }
}
