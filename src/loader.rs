//! Loading templates by name for `include`, `render`, `embed`, `extends`
//! and `layout`.

use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;

use crate::{Error, ErrorKind, Result};

/// Reads template sources by name.
///
/// Set on an engine with [`Engine::set_loader`][crate::Engine::set_loader].
/// Templates added with [`Engine::add_template`][crate::Engine::add_template]
/// are found without consulting the loader.
pub trait TemplateLoader: Send + Sync {
    /// Returns the source of the named template.
    ///
    /// A template that does not exist should be reported as an error of
    /// kind [`ErrorKind::FileSystem`].
    fn read_template_file(&self, name: &str) -> Result<String>;
}

/// A loader backed by a map of names to sources.
#[derive(Debug, Default, Clone)]
pub struct InMemoryLoader {
    templates: HashMap<String, String>,
}

impl InMemoryLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, source: impl Into<String>) {
        self.templates.insert(name.into(), source.into());
    }
}

impl<K, V> FromIterator<(K, V)> for InMemoryLoader
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut loader = Self::new();
        for (name, source) in iter {
            loader.insert(name, source);
        }
        loader
    }
}

impl TemplateLoader for InMemoryLoader {
    fn read_template_file(&self, name: &str) -> Result<String> {
        self.templates
            .get(name)
            .cloned()
            .ok_or_else(|| not_found(name))
    }
}

/// A loader that reads templates from a directory.
///
/// The name `products/card` resolves to `<root>/products/_card.liquid` by
/// default, see [`with_pattern`][FileSystemLoader::with_pattern].
#[derive(Debug, Clone)]
pub struct FileSystemLoader {
    root: PathBuf,
    pattern: String,
}

impl FileSystemLoader {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            pattern: "_{}.liquid".to_owned(),
        }
    }

    /// Set the file name pattern, `{}` is replaced by the last segment of
    /// the template name.
    #[must_use]
    pub fn with_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.pattern = pattern.into();
        self
    }

    /// The path the named template is read from.
    pub fn full_path(&self, name: &str) -> Result<PathBuf> {
        let legal = !name.is_empty()
            && !name.starts_with(['.', '/'])
            && name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '/' || c == '-');
        if !legal {
            return Err(Error::new(
                ErrorKind::FileSystem,
                format!("Illegal template name '{name}'"),
            ));
        }
        let (dir, file) = match name.rsplit_once('/') {
            Some((dir, file)) => (Some(dir), file),
            None => (None, name),
        };
        let mut path = self.root.clone();
        if let Some(dir) = dir {
            path.push(dir);
        }
        path.push(self.pattern.replace("{}", file));
        Ok(path)
    }
}

impl TemplateLoader for FileSystemLoader {
    fn read_template_file(&self, name: &str) -> Result<String> {
        let path = self.full_path(name)?;
        tracing::trace!(path = %path.display(), "reading template file");
        fs::read_to_string(&path).map_err(|_| not_found(name))
    }
}

fn not_found(name: &str) -> Error {
    Error::new(
        ErrorKind::FileSystem,
        format!("Could not find template '{name}'"),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn in_memory_loader_missing_template() {
        let loader: InMemoryLoader = [("a", "A")].into_iter().collect();
        assert_eq!(loader.read_template_file("a").unwrap(), "A");
        let err = loader.read_template_file("b").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::FileSystem);
        assert_eq!(err.message(), "Could not find template 'b'");
    }

    #[test]
    fn file_system_loader_paths() {
        let loader = FileSystemLoader::new("/views");
        assert_eq!(
            loader.full_path("products/card").unwrap(),
            PathBuf::from("/views/products/_card.liquid")
        );
        let loader = loader.with_pattern("{}.html");
        assert_eq!(loader.full_path("page").unwrap(), PathBuf::from("/views/page.html"));
        assert!(loader.full_path("../secret").is_err());
        assert!(loader.full_path("/etc/passwd").is_err());
    }

    #[test]
    fn file_system_loader_reads_files() {
        let dir = std::env::temp_dir().join(format!("dry-loader-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("_hello.liquid"), "hi {{ name }}").unwrap();
        let loader = FileSystemLoader::new(&dir);
        assert_eq!(loader.read_template_file("hello").unwrap(), "hi {{ name }}");
        assert!(loader.read_template_file("nope").is_err());
        fs::remove_dir_all(&dir).unwrap();
    }
}
