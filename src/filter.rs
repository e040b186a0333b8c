//! Path filtering for repository scanning.
//!
//! Two layers decide whether a file is scanned: fixed exclusion markers
//! (dependency and cache directories matched by path-segment substring)
//! and optional user-supplied glob patterns.

use crate::error::{Error, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};
use std::path::Path;

/// Directory markers excluded by default: installed packages and bytecode caches.
pub const DEFAULT_EXCLUDE_MARKERS: &[&str] = &["site-packages", "__pycache__"];

/// Configuration for file filtering with glob patterns.
///
/// Allows selective file and directory inclusion/exclusion during repository scanning.
#[derive(Debug, Clone, Default)]
pub struct FileFilterConfig {
    exclude_files: Vec<String>,
    include_only: Vec<String>,
    exclude_directories: Vec<String>,
}

impl FileFilterConfig {
    /// Creates a new empty configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets glob patterns for files that must be skipped.
    #[must_use]
    pub fn exclude_files(mut self, patterns: Vec<String>) -> Self {
        self.exclude_files = patterns;
        self
    }

    /// Sets glob patterns for directories whose contents must be skipped.
    #[must_use]
    pub fn exclude_directories(mut self, patterns: Vec<String>) -> Self {
        self.exclude_directories = patterns;
        self
    }

    /// Restricts scanning to files matching these glob patterns.
    #[must_use]
    pub fn include_only(mut self, patterns: Vec<String>) -> Self {
        self.include_only = patterns;
        self
    }
}

#[derive(Debug, Clone)]
pub(crate) struct FileFilter {
    exclude_files: GlobSet,
    include_files: Option<GlobSet>,
    exclude_directories: GlobSet,
}

impl FileFilter {
    /// Compiles the glob patterns of `config`.
    ///
    /// # Errors
    ///
    /// Returns a configuration error for an invalid pattern.
    pub(crate) fn new(config: &FileFilterConfig) -> Result<Self> {
        let include_files = if config.include_only.is_empty() {
            None
        } else {
            Some(Self::build_globset(&config.include_only)?)
        };

        Ok(Self {
            exclude_files: Self::build_globset(&config.exclude_files)?,
            include_files,
            exclude_directories: Self::build_globset(&config.exclude_directories)?,
        })
    }

    fn build_globset(patterns: &[String]) -> Result<GlobSet> {
        let mut builder = GlobSetBuilder::new();

        for pattern in patterns {
            let glob = Glob::new(pattern).map_err(|e| {
                Error::config(format!("Invalid glob pattern '{pattern}': {e}"))
            })?;
            builder.add(glob);
        }

        builder
            .build()
            .map_err(|e| Error::config(format!("Failed to build glob set: {e}")))
    }

    /// Checks a path relative to the scan root.
    pub(crate) fn should_process(&self, path: &Path) -> bool {
        if let Some(ref include) = self.include_files {
            if !include.is_match(path) {
                return false;
            }
        }

        if path
            .ancestors()
            .skip(1)
            .any(|ancestor| self.exclude_directories.is_match(ancestor))
        {
            return false;
        }

        !self.exclude_files.is_match(path)
    }
}

/// Returns true if any directory component of `path` contains one of `markers`.
///
/// Matching is by substring, so a marker also excludes e.g. `lib/site-packages-old`.
pub(crate) fn in_excluded_directory(path: &Path, markers: &[String]) -> bool {
    let Some(parent) = path.parent() else {
        return false;
    };

    parent.components().any(|component| {
        let segment = component.as_os_str().to_string_lossy();
        markers.iter().any(|marker| segment.contains(marker.as_str()))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn markers() -> Vec<String> {
        DEFAULT_EXCLUDE_MARKERS.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn test_excluded_directory_markers() {
        let markers = markers();
        assert!(in_excluded_directory(
            Path::new("venv/lib/site-packages/requests/api.py"),
            &markers
        ));
        assert!(in_excluded_directory(Path::new("pkg/__pycache__/mod.py"), &markers));
        assert!(!in_excluded_directory(Path::new("pkg/module.py"), &markers));
    }

    #[test]
    fn test_marker_in_file_name_does_not_exclude() {
        assert!(!in_excluded_directory(Path::new("site-packages.py"), &markers()));
    }

    #[test]
    fn test_glob_exclude_directories() {
        let filter = FileFilter::new(
            &FileFilterConfig::new().exclude_directories(vec!["**/tests".to_string()]),
        )
        .unwrap();

        assert!(!filter.should_process(Path::new("pkg/tests/test_api.py")));
        assert!(filter.should_process(Path::new("pkg/api.py")));
    }

    #[test]
    fn test_glob_exclude_files_and_include_only() {
        let filter = FileFilter::new(
            &FileFilterConfig::new()
                .include_only(vec!["src/**".to_string()])
                .exclude_files(vec!["**/setup.py".to_string()]),
        )
        .unwrap();

        assert!(filter.should_process(Path::new("src/app.py")));
        assert!(!filter.should_process(Path::new("src/setup.py")));
        assert!(!filter.should_process(Path::new("scripts/run.py")));
    }

    #[test]
    fn test_invalid_glob_is_config_error() {
        let result = FileFilter::new(&FileFilterConfig::new().exclude_files(vec!["[".to_string()]));
        assert!(result.unwrap_err().is_config());
    }
}
