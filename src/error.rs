use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using the library's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Comprehensive error types for the docsmith library.
#[derive(Error, Debug, Clone)]
#[non_exhaustive]
pub enum Error {
    /// IO error with context about the file path.
    #[error("IO error accessing '{path}': {message}")]
    Io {
        /// Path where the error occurred
        path: PathBuf,
        /// Error message
        message: String,
    },

    /// Configuration validation error.
    #[error("Invalid configuration: {message}")]
    Config {
        /// Detailed error message
        message: String,
    },

    /// The API credential is absent from the environment and the command line.
    #[error("Missing API credential: set {variable} in the environment or a .env file")]
    MissingCredential {
        /// Name of the environment variable that should carry the credential
        variable: String,
    },

    /// The persisted change cache exists but cannot be parsed.
    #[error("Cache file '{path}' is malformed ({message}). Fix or delete it before re-running.")]
    CacheCorrupt {
        /// Path to the cache file
        path: PathBuf,
        /// Parser error message
        message: String,
    },

    /// No qualifying source files found in directory.
    #[error("No Python files found in '{path}'")]
    NoFiles {
        /// Directory that was scanned
        path: PathBuf,
    },

    /// Invalid UTF-8 encountered in file.
    #[error("Invalid UTF-8 encoding in file '{path}'. File may be binary or use unsupported encoding.")]
    InvalidUtf8 {
        /// Path to file with encoding issues
        path: PathBuf,
    },

    /// Template rendering error.
    #[error("Failed to render template '{template}': {message}")]
    Template {
        /// Template name
        template: String,
        /// Error message
        message: String,
    },

    /// JSON serialization error.
    #[error("Serialization error: {message}")]
    Serialization {
        /// Error message
        message: String,
    },

    /// Tokenizer could not be resolved for the configured model.
    #[error("No tokenizer available for model '{model}': {message}")]
    Tokenizer {
        /// Model name
        model: String,
        /// Error message
        message: String,
    },

    /// Language model invocation failed (network, API, rate limit).
    #[error("Language model request failed: {message}")]
    Llm {
        /// Error message
        message: String,
    },

    /// Project-level explanation could not be produced.
    #[error("Project explanation could not be generated: {message}")]
    Synthesis {
        /// Error message
        message: String,
    },

    /// README content came out empty after composition and cleanup.
    #[error("README.md content is empty. Skipping README save.")]
    EmptyReadme,

    /// The user declined to continue at the confirmation prompt.
    #[error("Analysis cancelled by user")]
    Aborted,

    /// System time error.
    #[error("System time error: {message}")]
    SystemTime {
        /// Error message
        message: String,
    },
}

impl Error {
    /// Creates an IO error with path context.
    #[must_use]
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            message: source.to_string(),
        }
    }

    /// Creates a configuration error.
    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Creates a missing credential error.
    #[must_use]
    pub fn missing_credential(variable: impl Into<String>) -> Self {
        Self::MissingCredential {
            variable: variable.into(),
        }
    }

    /// Creates a corrupt cache error.
    #[must_use]
    pub fn cache_corrupt(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::CacheCorrupt {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Creates a template error.
    #[must_use]
    pub fn template(template: impl Into<String>, source: tera::Error) -> Self {
        use std::error::Error as _;

        // tera keeps the useful part of the message in the source chain
        let mut message = source.to_string();
        let mut cause = source.source();
        while let Some(inner) = cause {
            message.push_str(": ");
            message.push_str(&inner.to_string());
            cause = inner.source();
        }

        Self::Template {
            template: template.into(),
            message,
        }
    }

    /// Creates a tokenizer error.
    #[must_use]
    pub fn tokenizer(model: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Tokenizer {
            model: model.into(),
            message: message.into(),
        }
    }

    /// Creates a language model error.
    #[must_use]
    pub fn llm(message: impl Into<String>) -> Self {
        Self::Llm {
            message: message.into(),
        }
    }

    /// Creates a synthesis error.
    #[must_use]
    pub fn synthesis(message: impl Into<String>) -> Self {
        Self::Synthesis {
            message: message.into(),
        }
    }

    /// Creates an invalid UTF-8 error.
    #[must_use]
    pub fn invalid_utf8(path: impl Into<PathBuf>) -> Self {
        Self::InvalidUtf8 { path: path.into() }
    }

    /// Creates a no files error.
    #[must_use]
    pub fn no_files(path: impl Into<PathBuf>) -> Self {
        Self::NoFiles { path: path.into() }
    }

    /// Returns true if this is an IO error.
    #[must_use]
    pub const fn is_io(&self) -> bool {
        matches!(self, Self::Io { .. })
    }

    /// Returns true if this is a configuration error.
    #[must_use]
    pub const fn is_config(&self) -> bool {
        matches!(self, Self::Config { .. })
    }

    /// Returns true for every error that must stop the run before any paid call.
    #[must_use]
    pub const fn is_fatal_config(&self) -> bool {
        matches!(
            self,
            Self::Config { .. }
                | Self::MissingCredential { .. }
                | Self::CacheCorrupt { .. }
                | Self::Tokenizer { .. }
        )
    }

    /// Returns true if no qualifying files were found.
    #[must_use]
    pub const fn is_no_files(&self) -> bool {
        matches!(self, Self::NoFiles { .. })
    }
}

impl From<std::time::SystemTimeError> for Error {
    fn from(e: std::time::SystemTimeError) -> Self {
        Self::SystemTime {
            message: e.to_string(),
        }
    }
}

impl From<tera::Error> for Error {
    fn from(e: tera::Error) -> Self {
        Self::template("unknown", e)
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialization {
            message: e.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let err = Error::config("test message");
        assert!(err.is_config());
        assert!(err.to_string().contains("test message"));
    }

    #[test]
    fn test_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err = Error::io("/tmp/test.py", io_err);
        assert!(err.is_io());
        assert!(err.to_string().contains("/tmp/test.py"));
    }

    #[test]
    fn test_fatal_config_taxonomy() {
        assert!(Error::missing_credential("OPENAI_API_KEY").is_fatal_config());
        assert!(Error::cache_corrupt("vector_store.json", "eof").is_fatal_config());
        assert!(Error::tokenizer("nope", "unknown").is_fatal_config());
        assert!(!Error::llm("rate limited").is_fatal_config());
        assert!(!Error::EmptyReadme.is_fatal_config());
    }

    #[test]
    fn test_missing_credential_names_variable() {
        let err = Error::missing_credential("OPENAI_API_KEY");
        assert!(err.to_string().contains("OPENAI_API_KEY"));
    }

    #[test]
    fn test_no_files_error() {
        let err = Error::no_files("/tmp/empty");
        assert!(err.is_no_files());
        assert!(err.to_string().contains("/tmp/empty"));
    }

    #[test]
    fn test_error_clone() {
        let err = Error::config("test");
        let cloned = err.clone();
        assert_eq!(err.to_string(), cloned.to_string());
    }

    #[test]
    fn test_serialization_error() {
        let json_err = serde_json::from_str::<serde_json::Value>("invalid json").unwrap_err();
        let err: Error = json_err.into();
        assert!(err.to_string().contains("Serialization error"));
    }
}
