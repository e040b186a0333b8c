use std::path::{Path, PathBuf};

/// Extension of qualifying source files.
pub const SOURCE_EXTENSION: &str = "py";

/// A qualifying source file with its full text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    /// Absolute path to the file
    pub absolute_path: PathBuf,

    /// Relative path from the root directory
    pub relative_path: String,

    /// Full UTF-8 content
    pub content: String,
}

impl SourceFile {
    /// Creates a new source file record.
    #[must_use]
    pub fn new(absolute_path: PathBuf, relative_path: String, content: String) -> Self {
        Self {
            absolute_path,
            relative_path,
            content,
        }
    }

    /// Returns the base name of the file.
    #[must_use]
    pub fn file_name(&self) -> String {
        self.absolute_path
            .file_name()
            .map_or_else(|| self.relative_path.clone(), |n| n.to_string_lossy().to_string())
    }

    /// Returns the cache key (absolute path as text).
    #[must_use]
    pub fn key(&self) -> String {
        self.absolute_path.to_string_lossy().to_string()
    }
}

/// Checks if a path has the source extension.
///
/// Bytecode artifacts (`.pyc`, `.pyo`) fail this check by construction.
#[must_use]
pub(crate) fn has_source_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext == SOURCE_EXTENSION)
}
