use crate::file::SourceFile;
use std::fmt;

const MAIN_GUARD_MARKER: &str = "__main__";

/// Script named in the "How to Use" section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryPoint {
    /// A file contains the direct-execution guard
    Detected(String),
    /// No file does; the configured default is used
    Fallback(String),
}

impl EntryPoint {
    /// Base name of the script.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Detected(name) | Self::Fallback(name) => name,
        }
    }

    /// True when the name came from a scanned file.
    #[must_use]
    pub const fn is_detected(&self) -> bool {
        matches!(self, Self::Detected(_))
    }

    /// Warning to report when the name is only the configured default.
    #[must_use]
    pub fn fallback_warning(&self) -> Option<String> {
        match self {
            Self::Detected(_) => None,
            Self::Fallback(name) => Some(format!(
                "No file contains a {MAIN_GUARD_MARKER} guard, assuming {name}"
            )),
        }
    }
}

impl fmt::Display for EntryPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Returns the first file, in the given order, whose text contains `__main__`.
///
/// The match is textual: a comment or string mentioning the marker counts.
#[must_use]
pub fn detect_entry_point(files: &[SourceFile], default: &str) -> EntryPoint {
    files
        .iter()
        .find(|file| file.content.contains(MAIN_GUARD_MARKER))
        .map_or_else(
            || EntryPoint::Fallback(default.to_string()),
            |file| EntryPoint::Detected(file.file_name()),
        )
}
