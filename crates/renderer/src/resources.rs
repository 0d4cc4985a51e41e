//! Named text resources (shader sources) and the tolerant loader the demo
//! uses to read them.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::diagnostics::Diagnostics;

#[derive(Debug, Error)]
pub enum ResourceError {
    #[error("resource `{0}` not found")]
    NotFound(String),

    #[error("resource `{name}` is not valid UTF-8")]
    Encoding { name: String },

    #[error("failed to read resource `{name}`: {source}")]
    Io {
        name: String,
        #[source]
        source: std::io::Error,
    },
}

/// Read-only namespace of named text blobs.
pub trait ResourceNamespace {
    fn read_text(&self, name: &str) -> Result<String, ResourceError>;
}

/// Resources stored as files below a root directory.
#[derive(Debug, Clone)]
pub struct DirectoryResources {
    root: PathBuf,
}

impl DirectoryResources {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl ResourceNamespace for DirectoryResources {
    fn read_text(&self, name: &str) -> Result<String, ResourceError> {
        let path = self.root.join(name);
        let bytes = fs::read(&path).map_err(|source| match source.kind() {
            std::io::ErrorKind::NotFound => ResourceError::NotFound(name.to_string()),
            _ => ResourceError::Io {
                name: name.to_string(),
                source,
            },
        })?;
        String::from_utf8(bytes).map_err(|_| ResourceError::Encoding {
            name: name.to_string(),
        })
    }
}

/// Resources compiled into the binary.
#[derive(Debug, Clone, Default)]
pub struct BundledResources {
    entries: HashMap<String, &'static str>,
}

impl BundledResources {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: &str, text: &'static str) -> Self {
        self.entries.insert(name.to_string(), text);
        self
    }
}

impl ResourceNamespace for BundledResources {
    fn read_text(&self, name: &str) -> Result<String, ResourceError> {
        self.entries
            .get(name)
            .map(|text| text.to_string())
            .ok_or_else(|| ResourceError::NotFound(name.to_string()))
    }
}

/// Loads `name`, reporting a failure and falling back to empty text.
///
/// Empty source is not special-cased downstream: it simply fails to compile.
pub fn load_text<R>(resources: &R, name: &str, diagnostics: &Diagnostics) -> String
where
    R: ResourceNamespace + ?Sized,
{
    match resources.read_text(name) {
        Ok(text) => {
            tracing::debug!(resource = name, bytes = text.len(), "loaded resource");
            text
        }
        Err(err) => {
            diagnostics.report(format!("Failed to load resource {name}: {err}"));
            String::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn reads_files_from_the_root() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("quad.vert"), "void main() {}").unwrap();

        let resources = DirectoryResources::new(dir.path());
        assert_eq!(resources.read_text("quad.vert").unwrap(), "void main() {}");
    }

    #[test]
    fn missing_file_is_reported_and_yields_empty_text() {
        let dir = TempDir::new().unwrap();
        let resources = DirectoryResources::new(dir.path());
        let diagnostics = Diagnostics::capturing();

        assert!(matches!(
            resources.read_text("absent.frag"),
            Err(ResourceError::NotFound(name)) if name == "absent.frag"
        ));
        let text = load_text(&resources, "absent.frag", &diagnostics);

        assert!(text.is_empty());
        assert_eq!(diagnostics.len(), 1);
        assert!(diagnostics.entries()[0].contains("absent.frag"));
    }

    #[test]
    fn invalid_utf8_is_an_encoding_error() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("bad.frag"), [0xff, 0xfe, 0x00]).unwrap();

        let resources = DirectoryResources::new(dir.path());
        assert!(matches!(
            resources.read_text("bad.frag"),
            Err(ResourceError::Encoding { .. })
        ));
    }

    #[test]
    fn bundled_resources_resolve_by_name() {
        let resources = BundledResources::new().with("a.frag", "// a");
        let diagnostics = Diagnostics::capturing();

        assert_eq!(load_text(&resources, "a.frag", &diagnostics), "// a");
        assert!(load_text(&resources, "b.frag", &diagnostics).is_empty());
        assert_eq!(diagnostics.len(), 1);
    }
}
