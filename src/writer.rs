use crate::error::{Error, Result};
use std::{
    fs,
    io::Write,
    path::{Path, PathBuf},
    time::SystemTime,
};
use tracing::debug;

/// Writes a text file atomically with optional backup.
///
/// # Process
///
/// 1. Creates a timestamped backup if the file exists and `backup` is set
/// 2. Writes content to a temporary sibling file
/// 3. Syncs the temporary file to disk
/// 4. Renames the temporary file over the target path
///
/// A crash mid-write leaves either the old or the new file, never a torn one.
///
/// # Errors
///
/// Returns an error if any filesystem operation fails.
pub(crate) fn write_file_atomic(path: &Path, content: &str, backup: bool) -> Result<()> {
    if backup && path.exists() {
        backup_file(path)?;
    }

    let temp_path = temp_path_for(path);
    let mut temp_file = fs::File::create(&temp_path).map_err(|e| Error::io(&temp_path, e))?;

    temp_file
        .write_all(content.as_bytes())
        .map_err(|e| Error::io(&temp_path, e))?;

    temp_file
        .sync_all()
        .map_err(|e| Error::io(&temp_path, e))?;

    drop(temp_file);

    fs::rename(&temp_path, path).map_err(|e| Error::io(path, e))?;

    debug!("Wrote {}", path.display());
    Ok(())
}

/// `README.md` -> `README.md.tmp`, keeping the original extension visible.
fn temp_path_for(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

/// Creates a timestamped backup of an existing file and returns its path.
fn backup_file(path: &Path) -> Result<PathBuf> {
    let timestamp = SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)?
        .as_nanos();

    let filename = path
        .file_name()
        .ok_or_else(|| Error::config("Invalid file path"))?
        .to_string_lossy();

    let backup_name = format!("{filename}.backup.{timestamp}");
    let backup_path = path
        .parent()
        .ok_or_else(|| Error::config("Invalid file path"))?
        .join(backup_name);

    fs::copy(path, &backup_path).map_err(|e| Error::io(&backup_path, e))?;

    debug!("Created backup: {}", backup_path.display());
    Ok(backup_path)
}

/// Creates the output directory (and parents).
///
/// # Errors
///
/// Returns an error if the directory cannot be created.
pub(crate) fn ensure_dir(path: &Path) -> Result<()> {
    fs::create_dir_all(path).map_err(|e| Error::io(path, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_fs::prelude::*;

    fn entries(dir: &Path) -> Vec<String> {
        let mut names: Vec<_> = fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
            .collect();
        names.sort();
        names
    }

    #[test]
    fn test_write_creates_file_without_leftovers() {
        let temp = assert_fs::TempDir::new().unwrap();
        let target = temp.child("README.md");

        write_file_atomic(target.path(), "# Title", false).unwrap();

        target.assert("# Title");
        assert_eq!(entries(temp.path()), vec!["README.md"]);
    }

    #[test]
    fn test_write_overwrites_fully() {
        let temp = assert_fs::TempDir::new().unwrap();
        let target = temp.child("requirements.txt");
        target.write_str("a much longer previous content").unwrap();

        write_file_atomic(target.path(), "short", false).unwrap();

        target.assert("short");
    }

    #[test]
    fn test_write_creates_backup() {
        let temp = assert_fs::TempDir::new().unwrap();
        let target = temp.child("README.md");
        target.write_str("old content").unwrap();

        write_file_atomic(target.path(), "new content", true).unwrap();

        target.assert("new content");
        let names = entries(temp.path());
        let backup = names
            .iter()
            .find(|name| name.starts_with("README.md.backup."))
            .expect("backup file");
        assert_eq!(
            fs::read_to_string(temp.path().join(backup)).unwrap(),
            "old content"
        );
    }

    #[test]
    fn test_no_backup_for_new_file() {
        let temp = assert_fs::TempDir::new().unwrap();
        let target = temp.child("README.md");

        write_file_atomic(target.path(), "content", true).unwrap();

        assert_eq!(entries(temp.path()), vec!["README.md"]);
    }

    #[test]
    fn test_write_into_missing_directory_fails() {
        let temp = assert_fs::TempDir::new().unwrap();
        let target = temp.child("missing/README.md");

        let err = write_file_atomic(target.path(), "content", false).unwrap_err();
        assert!(err.is_io());
    }

    #[test]
    fn test_ensure_dir_nested() {
        let temp = assert_fs::TempDir::new().unwrap();
        let dir = temp.child("output/project");

        ensure_dir(dir.path()).unwrap();
        ensure_dir(dir.path()).unwrap();

        assert!(dir.path().is_dir());
    }
}
