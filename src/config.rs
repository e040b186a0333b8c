use crate::error::{Error, Result};
use crate::filter::{FileFilterConfig, DEFAULT_EXCLUDE_MARKERS};
use crate::token::{price_per_1k_for_model, TokenizerKind};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Model used when none is configured.
pub const DEFAULT_MODEL: &str = "gpt-4";
/// Chat-completion API root used when none is configured.
pub const DEFAULT_API_BASE: &str = "https://api.openai.com/v1";
/// Environment variable carrying the API credential.
pub const API_KEY_VAR: &str = "OPENAI_API_KEY";
/// Environment variable carrying the model name.
pub const MODEL_VAR: &str = "OPENAI_MODEL";
/// Environment variable carrying the API root.
pub const API_BASE_VAR: &str = "OPENAI_API_BASE";
/// Entry-point name reported when no file carries the direct-execution guard.
pub const DEFAULT_ENTRY_POINT: &str = "main.py";

const DEFAULT_OUTPUT_ROOT: &str = "output";
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(120);
const CACHE_FILE_NAME: &str = "vector_store.json";

/// Configuration for a docsmith run.
///
/// Use [`Config::builder()`] to construct a new configuration. The value is
/// created once at startup and handed to every component that needs it.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub struct Config {
    /// Root directory to scan for files
    pub root_dir: PathBuf,

    /// Directory under which `<project name>/` output is written
    pub output_root: PathBuf,

    /// Chat model used for analysis and tokenization
    pub model: String,

    /// API credential (required unless `dry_run`)
    pub api_key: Option<String>,

    /// Chat-completion API root URL
    pub api_base: String,

    /// Price override per 1000 tokens; the model table applies when unset
    pub price_per_1k_tokens: Option<f64>,

    /// Tokenizer implementation to use
    pub tokenizer: TokenizerKind,

    /// Directory-name markers excluded from scanning
    pub exclude_markers: Vec<String>,

    /// Glob-based include/exclude configuration
    pub file_filter: FileFilterConfig,

    /// Module names treated as standard library in addition to the built-in list
    pub extra_stdlib: Vec<String>,

    /// Entry-point name used when detection finds nothing
    pub default_entry_point: String,

    /// HTTP timeout for a single model request
    pub request_timeout: Duration,

    /// Estimate only: no output directory, no cache writes, no model calls
    pub dry_run: bool,

    /// Create backups of existing output files before overwriting
    pub backup_existing: bool,

    /// Drop cache records whose file no longer exists
    pub prune_cache: bool,

    /// Show a progress bar during per-file analysis
    pub show_progress: bool,
}

impl Config {
    /// Creates a new configuration builder.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use docsmith::Config;
    ///
    /// let config = Config::builder()
    ///     .root_dir("./my_project")
    ///     .api_key("sk-...")
    ///     .build()
    ///     .expect("valid configuration");
    /// ```
    #[must_use]
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Root directory doesn't exist or is not a directory
    /// - Model name is empty or the price override is negative
    /// - The API credential is missing outside of dry-run mode
    pub fn validate(&self) -> Result<()> {
        if !self.dry_run && self.api_key.as_deref().is_none_or(|k| k.trim().is_empty()) {
            return Err(Error::missing_credential(API_KEY_VAR));
        }

        if !self.root_dir.exists() {
            return Err(Error::config(format!(
                "Root directory does not exist: {}",
                self.root_dir.display()
            )));
        }

        if !self.root_dir.is_dir() {
            return Err(Error::config(format!(
                "Root path is not a directory: {}",
                self.root_dir.display()
            )));
        }

        if self.model.trim().is_empty() {
            return Err(Error::config("model must not be empty"));
        }

        if let Some(price) = self.price_per_1k_tokens {
            if !price.is_finite() || price < 0.0 {
                return Err(Error::config(format!(
                    "price per 1000 tokens must be a non-negative number, got {price}"
                )));
            }
        }

        if self.project_name().is_empty() {
            return Err(Error::config(format!(
                "Cannot derive a project name from {}",
                self.root_dir.display()
            )));
        }

        Ok(())
    }

    /// Returns the effective price per 1000 tokens.
    #[must_use]
    pub fn price_per_1k(&self) -> f64 {
        self.price_per_1k_tokens
            .unwrap_or_else(|| price_per_1k_for_model(&self.model))
    }

    /// Returns the base name of the scanned folder.
    #[must_use]
    pub fn project_name(&self) -> String {
        project_name(&self.root_dir)
    }

    /// Returns `output_root/<project name>`.
    #[must_use]
    pub fn output_dir(&self) -> PathBuf {
        self.output_root.join(self.project_name())
    }

    /// Returns the change-cache location inside the output directory.
    #[must_use]
    pub fn cache_path(&self) -> PathBuf {
        self.output_dir().join(CACHE_FILE_NAME)
    }
}

/// Derives a project name from a folder path, resolving `.` and trailing separators.
fn project_name(root: &Path) -> String {
    let resolved = root.canonicalize().unwrap_or_else(|_| root.to_path_buf());
    resolved
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            root_dir: PathBuf::from("."),
            output_root: PathBuf::from(DEFAULT_OUTPUT_ROOT),
            model: DEFAULT_MODEL.to_string(),
            api_key: None,
            api_base: DEFAULT_API_BASE.to_string(),
            price_per_1k_tokens: None,
            tokenizer: TokenizerKind::Tiktoken,
            exclude_markers: default_markers(),
            file_filter: FileFilterConfig::default(),
            extra_stdlib: Vec::new(),
            default_entry_point: DEFAULT_ENTRY_POINT.to_string(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            dry_run: false,
            backup_existing: false,
            prune_cache: false,
            show_progress: true,
        }
    }
}

fn default_markers() -> Vec<String> {
    DEFAULT_EXCLUDE_MARKERS.iter().map(ToString::to_string).collect()
}

/// Builder for creating a [`Config`].
#[derive(Debug, Default)]
pub struct ConfigBuilder {
    root_dir: Option<PathBuf>,
    output_root: Option<PathBuf>,
    model: Option<String>,
    api_key: Option<String>,
    api_base: Option<String>,
    price_per_1k_tokens: Option<f64>,
    tokenizer: Option<TokenizerKind>,
    exclude_markers: Option<Vec<String>>,
    file_filter: Option<FileFilterConfig>,
    extra_stdlib: Vec<String>,
    default_entry_point: Option<String>,
    request_timeout: Option<Duration>,
    dry_run: bool,
    backup_existing: bool,
    prune_cache: bool,
    show_progress: Option<bool>,
}

impl ConfigBuilder {
    /// Sets the root directory to scan.
    #[must_use]
    pub fn root_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.root_dir = Some(path.into());
        self
    }

    /// Sets the directory under which per-project output folders are created.
    #[must_use]
    pub fn output_root(mut self, path: impl Into<PathBuf>) -> Self {
        self.output_root = Some(path.into());
        self
    }

    /// Sets the chat model.
    #[must_use]
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Sets the API credential.
    #[must_use]
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Sets the API credential if one is available.
    #[must_use]
    pub fn api_key_opt(mut self, key: Option<String>) -> Self {
        self.api_key = key;
        self
    }

    /// Sets the chat-completion API root URL.
    #[must_use]
    pub fn api_base(mut self, url: impl Into<String>) -> Self {
        self.api_base = Some(url.into());
        self
    }

    /// Overrides the price per 1000 tokens.
    #[must_use]
    pub fn price_per_1k_tokens(mut self, price: f64) -> Self {
        self.price_per_1k_tokens = Some(price);
        self
    }

    /// Sets the tokenizer implementation.
    #[must_use]
    pub fn tokenizer(mut self, kind: TokenizerKind) -> Self {
        self.tokenizer = Some(kind);
        self
    }

    /// Replaces the directory exclusion markers.
    #[must_use]
    pub fn exclude_markers(mut self, markers: Vec<String>) -> Self {
        self.exclude_markers = Some(markers);
        self
    }

    /// Sets the glob filter configuration.
    #[must_use]
    pub fn file_filter(mut self, config: FileFilterConfig) -> Self {
        self.file_filter = Some(config);
        self
    }

    /// Adds module names that count as standard library.
    #[must_use]
    pub fn extra_stdlib(mut self, names: Vec<String>) -> Self {
        self.extra_stdlib = names;
        self
    }

    /// Sets the fallback entry-point name.
    #[must_use]
    pub fn default_entry_point(mut self, name: impl Into<String>) -> Self {
        self.default_entry_point = Some(name.into());
        self
    }

    /// Sets the HTTP timeout per model request.
    #[must_use]
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    /// Enables dry run mode (estimate only).
    #[must_use]
    pub fn dry_run(mut self, enabled: bool) -> Self {
        self.dry_run = enabled;
        self
    }

    /// Enables or disables backup creation.
    #[must_use]
    pub fn backup_existing(mut self, enabled: bool) -> Self {
        self.backup_existing = enabled;
        self
    }

    /// Enables pruning of cache records for deleted files.
    #[must_use]
    pub fn prune_cache(mut self, enabled: bool) -> Self {
        self.prune_cache = enabled;
        self
    }

    /// Enables or disables the progress bar.
    #[must_use]
    pub fn show_progress(mut self, enabled: bool) -> Self {
        self.show_progress = Some(enabled);
        self
    }

    /// Builds the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if validation fails.
    pub fn build(self) -> Result<Config> {
        let config = Config {
            root_dir: self.root_dir.unwrap_or_else(|| PathBuf::from(".")),
            output_root: self
                .output_root
                .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT_ROOT)),
            model: self.model.unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            api_key: self.api_key,
            api_base: self
                .api_base
                .unwrap_or_else(|| DEFAULT_API_BASE.to_string()),
            price_per_1k_tokens: self.price_per_1k_tokens,
            tokenizer: self.tokenizer.unwrap_or_default(),
            exclude_markers: self.exclude_markers.unwrap_or_else(default_markers),
            file_filter: self.file_filter.unwrap_or_default(),
            extra_stdlib: self.extra_stdlib,
            default_entry_point: self
                .default_entry_point
                .unwrap_or_else(|| DEFAULT_ENTRY_POINT.to_string()),
            request_timeout: self.request_timeout.unwrap_or(DEFAULT_REQUEST_TIMEOUT),
            dry_run: self.dry_run,
            backup_existing: self.backup_existing,
            prune_cache: self.prune_cache,
            show_progress: self.show_progress.unwrap_or(true),
        };

        config.validate()?;
        Ok(config)
    }
}
