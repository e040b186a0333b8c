use crate::{
    config::Config,
    error::{Error, Result},
    file::{has_source_extension, SourceFile},
    filter::{in_excluded_directory, FileFilter},
};
use ignore::{DirEntry, WalkBuilder};
use std::path::{Path, PathBuf};
use tracing::{debug, trace, warn};

/// Statistics collected during scanning.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ScanStats {
    /// Regular files seen by the walker
    pub total_files: usize,

    /// Files that qualified and were read
    pub source_files: usize,

    /// Files skipped by extension, marker or glob filter
    pub skipped_files: usize,

    /// Files or directories that could not be read
    pub errors: usize,
}

/// Walks a directory tree and collects qualifying source files.
pub(crate) struct Scanner {
    root_dir: PathBuf,
    exclude_markers: Vec<String>,
    file_filter: FileFilter,
}

impl Scanner {
    /// Creates a new scanner from configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if a glob pattern is invalid.
    pub(crate) fn new(config: &Config) -> Result<Self> {
        Ok(Self {
            root_dir: config.root_dir.clone(),
            exclude_markers: config.exclude_markers.clone(),
            file_filter: FileFilter::new(&config.file_filter)?,
        })
    }

    /// Scans the root directory and returns all qualifying files, sorted by relative path.
    ///
    /// Unreadable or non-UTF-8 files are logged and skipped.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoFiles`] if the root does not exist or nothing qualifies.
    pub(crate) fn scan(&self) -> Result<(Vec<SourceFile>, ScanStats)> {
        let mut stats = ScanStats::default();
        let mut files = Vec::new();

        if !self.root_dir.is_dir() {
            return Err(Error::no_files(&self.root_dir));
        }

        let root = self
            .root_dir
            .canonicalize()
            .map_err(|e| Error::io(&self.root_dir, e))?;

        debug!("Starting scan of {}", root.display());

        // Plain recursive walk: no .gitignore or hidden-file rules. Symlinked
        // directories are not entered; symlinked files are read.
        let walker = WalkBuilder::new(&root)
            .standard_filters(false)
            .follow_links(false)
            .sort_by_file_name(|a, b| a.cmp(b))
            .build();

        for result in walker {
            match result {
                Ok(entry) if is_regular_file(&entry) => {
                    stats.total_files += 1;

                    match self.process_entry(&entry, &root) {
                        Ok(Some(file)) => {
                            stats.source_files += 1;
                            files.push(file);
                        }
                        Ok(None) => stats.skipped_files += 1,
                        Err(e) => {
                            warn!("Failed to read {}: {}", entry.path().display(), e);
                            stats.errors += 1;
                        }
                    }
                }
                Ok(_) => {}
                Err(e) => {
                    warn!("Walk error: {}", e);
                    stats.errors += 1;
                }
            }
        }

        debug!(
            "Scan complete: {} total, {} source, {} skipped, {} errors",
            stats.total_files, stats.source_files, stats.skipped_files, stats.errors
        );

        if files.is_empty() {
            return Err(Error::no_files(&self.root_dir));
        }

        files.sort_by(|a, b| a.relative_path.cmp(&b.relative_path));

        Ok((files, stats))
    }

    /// Reads an entry if it qualifies.
    fn process_entry(&self, entry: &DirEntry, root: &Path) -> Result<Option<SourceFile>> {
        let path = entry.path();

        let relative = pathdiff::diff_paths(path, root).unwrap_or_else(|| path.to_path_buf());

        if !has_source_extension(path) {
            return Ok(None);
        }

        if in_excluded_directory(&relative, &self.exclude_markers) {
            trace!("Skipping excluded path: {}", relative.display());
            return Ok(None);
        }

        if !self.file_filter.should_process(&relative) {
            trace!("Skipping filtered path: {}", relative.display());
            return Ok(None);
        }

        let content = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::InvalidData {
                Error::invalid_utf8(path)
            } else {
                Error::io(path, e)
            }
        })?;

        trace!("Read file: {}", relative.display());

        Ok(Some(SourceFile::new(
            path.to_path_buf(),
            relative.to_string_lossy().to_string(),
            content,
        )))
    }
}

/// True for regular files and for symlinks that resolve to one.
fn is_regular_file(entry: &DirEntry) -> bool {
    match entry.file_type() {
        Some(ft) if ft.is_file() => true,
        Some(ft) if ft.is_symlink() => match std::fs::metadata(entry.path()) {
            Ok(meta) => meta.is_file(),
            Err(e) => {
                debug!("Skipping dangling link {}: {}", entry.path().display(), e);
                false
            }
        },
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::FileFilterConfig;
    use assert_fs::prelude::*;

    fn create_test_config(root: &Path) -> Config {
        Config::builder()
            .root_dir(root)
            .dry_run(true)
            .build()
            .unwrap()
    }

    fn relative_paths(files: &[SourceFile]) -> Vec<&str> {
        files.iter().map(|f| f.relative_path.as_str()).collect()
    }

    #[test]
    fn test_scanner_finds_python_files() {
        let temp = assert_fs::TempDir::new().unwrap();
        temp.child("app.py").write_str("import os\n").unwrap();
        temp.child("pkg/util.py").write_str("def f(): pass\n").unwrap();
        temp.child("README.md").write_str("# hi").unwrap();

        let scanner = Scanner::new(&create_test_config(temp.path())).unwrap();
        let (files, stats) = scanner.scan().unwrap();

        assert_eq!(relative_paths(&files), vec!["app.py", "pkg/util.py"]);
        assert_eq!(stats.source_files, 2);
        assert_eq!(stats.skipped_files, 1);
        assert!(files.iter().all(|f| f.absolute_path.is_absolute()));
    }

    #[test]
    fn test_scanner_skips_bytecode_and_excluded_directories() {
        let temp = assert_fs::TempDir::new().unwrap();
        temp.child("main.py").write_str("print(1)\n").unwrap();
        temp.child("main.pyc").write_binary(&[0u8; 16]).unwrap();
        temp.child("__pycache__/main.cpython-312.py").write_str("x = 1\n").unwrap();
        temp.child("venv/lib/site-packages/requests/api.py").write_str("x = 1\n").unwrap();

        let scanner = Scanner::new(&create_test_config(temp.path())).unwrap();
        let (files, _) = scanner.scan().unwrap();

        assert_eq!(relative_paths(&files), vec!["main.py"]);
    }

    #[test]
    fn test_scanner_does_not_honour_gitignore_or_hidden_rules() {
        let temp = assert_fs::TempDir::new().unwrap();
        temp.child(".gitignore").write_str("ignored.py\n").unwrap();
        temp.child("ignored.py").write_str("x = 1\n").unwrap();
        temp.child(".hidden/tool.py").write_str("x = 2\n").unwrap();

        let scanner = Scanner::new(&create_test_config(temp.path())).unwrap();
        let (files, _) = scanner.scan().unwrap();

        assert_eq!(relative_paths(&files), vec![".hidden/tool.py", "ignored.py"]);
    }

    #[test]
    fn test_scanner_applies_glob_filter() {
        let temp = assert_fs::TempDir::new().unwrap();
        temp.child("app.py").write_str("x = 1\n").unwrap();
        temp.child("tests/test_app.py").write_str("x = 2\n").unwrap();

        let config = Config::builder()
            .root_dir(temp.path())
            .dry_run(true)
            .file_filter(FileFilterConfig::new().exclude_directories(vec!["tests".to_string()]))
            .build()
            .unwrap();

        let (files, _) = Scanner::new(&config).unwrap().scan().unwrap();
        assert_eq!(relative_paths(&files), vec!["app.py"]);
    }

    #[test]
    fn test_scanner_skips_invalid_utf8() {
        let temp = assert_fs::TempDir::new().unwrap();
        temp.child("good.py").write_str("x = 1\n").unwrap();
        temp.child("bad.py").write_binary(&[0xff, 0xfe, 0xfd]).unwrap();

        let (files, stats) = Scanner::new(&create_test_config(temp.path()))
            .unwrap()
            .scan()
            .unwrap();

        assert_eq!(relative_paths(&files), vec!["good.py"]);
        assert_eq!(stats.errors, 1);
    }

    #[test]
    fn test_scanner_empty_directory() {
        let temp = assert_fs::TempDir::new().unwrap();
        temp.child("notes.txt").write_str("nothing here").unwrap();

        let scanner = Scanner::new(&create_test_config(temp.path())).unwrap();
        let result = scanner.scan();

        assert!(result.unwrap_err().is_no_files());
    }

    #[test]
    fn test_scanner_order_is_sorted() {
        let temp = assert_fs::TempDir::new().unwrap();
        for name in ["zeta.py", "alpha.py", "mid/beta.py"] {
            temp.child(name).write_str("x = 1\n").unwrap();
        }

        let (files, _) = Scanner::new(&create_test_config(temp.path()))
            .unwrap()
            .scan()
            .unwrap();

        assert_eq!(relative_paths(&files), vec!["alpha.py", "mid/beta.py", "zeta.py"]);
    }

    #[cfg(unix)]
    #[test]
    fn test_scanner_reads_symlinked_files() {
        let temp = assert_fs::TempDir::new().unwrap();
        temp.child("outside/real.py").write_str("import yaml\n").unwrap();
        temp.child("project/main.py").write_str("x = 1\n").unwrap();
        std::os::unix::fs::symlink(
            temp.child("outside/real.py").path(),
            temp.child("project/linked.py").path(),
        )
        .unwrap();

        let (files, stats) = Scanner::new(&create_test_config(&temp.path().join("project")))
            .unwrap()
            .scan()
            .unwrap();

        assert_eq!(relative_paths(&files), vec!["linked.py", "main.py"]);
        assert_eq!(files[0].content, "import yaml\n");
        assert_eq!(stats.total_files, 2);
        assert_eq!(stats.source_files, 2);
    }

    #[cfg(unix)]
    #[test]
    fn test_scanner_does_not_enter_symlinked_directories() {
        let temp = assert_fs::TempDir::new().unwrap();
        temp.child("outside/real.py").write_str("x = 1\n").unwrap();
        temp.child("project/main.py").write_str("x = 1\n").unwrap();
        std::os::unix::fs::symlink(
            temp.child("outside").path(),
            temp.child("project/vendored").path(),
        )
        .unwrap();
        std::os::unix::fs::symlink(
            temp.child("missing.py").path(),
            temp.child("project/dangling.py").path(),
        )
        .unwrap();

        let (files, stats) = Scanner::new(&create_test_config(&temp.path().join("project")))
            .unwrap()
            .scan()
            .unwrap();

        assert_eq!(relative_paths(&files), vec!["main.py"]);
        assert_eq!(stats.total_files, 1);
    }
}
