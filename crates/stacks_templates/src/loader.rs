//! Template loading functionality.

use std::path::{Path, PathBuf};

use minijinja::{path_loader, Environment};
use tracing::debug;

use crate::error::{TemplateError, TemplateResult};

/// Resolves templates relative to a base directory.
///
/// Includes are resolved against the same base directory as the entry
/// template, so a template and the fragments it includes live side by side.
#[derive(Debug, Clone)]
pub struct TemplateLoader {
    base_path: PathBuf,
}

impl TemplateLoader {
    /// Create a new template loader.
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }

    /// Split a template file path into a loader for its directory and its file name.
    pub fn for_file(path: &Path) -> TemplateResult<(Self, String)> {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .ok_or_else(|| TemplateError::NotFound(path.display().to_string()))?;
        let base = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        Ok((Self::new(base), name))
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// Fail early with the full path when the entry template is missing.
    pub fn ensure_exists(&self, name: &str) -> TemplateResult<PathBuf> {
        let path = self.base_path.join(name);
        if !path.is_file() {
            return Err(TemplateError::NotFound(path.display().to_string()));
        }
        debug!("Loading template from {:?}", path);
        Ok(path)
    }

    /// A fresh engine environment reading templates from the base directory.
    pub fn environment(&self) -> Environment<'static> {
        let mut env = Environment::new();
        env.set_loader(path_loader(self.base_path.clone()));
        env
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_missing_template() {
        let temp = tempdir().unwrap();
        let loader = TemplateLoader::new(temp.path());
        match loader.ensure_exists("missing.yaml") {
            Err(TemplateError::NotFound(path)) => assert!(path.ends_with("missing.yaml")),
            other => panic!("unexpected result {:?}", other),
        }
    }

    #[test]
    fn test_environment_reads_base_directory() {
        let temp = tempdir().unwrap();
        fs::write(temp.path().join("part.yaml"), "Owner: {{ owner }}").unwrap();

        let env = TemplateLoader::new(temp.path()).environment();
        let template = env.get_template("part.yaml").unwrap();
        assert_eq!(
            template.render(minijinja::context! { owner => "ops" }).unwrap(),
            "Owner: ops"
        );
    }

    #[test]
    fn test_for_file_splits_path() {
        let (loader, name) = TemplateLoader::for_file(Path::new("stacks/vpc/main.yaml")).unwrap();
        assert_eq!(loader.base_path(), Path::new("stacks/vpc"));
        assert_eq!(name, "main.yaml");

        let (loader, _) = TemplateLoader::for_file(Path::new("main.yaml")).unwrap();
        assert_eq!(loader.base_path(), Path::new("."));
    }
}
