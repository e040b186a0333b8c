//! # docsmith
//!
//! Generates documentation for a Python source tree with a language model.
//!
//! ## Features
//!
//! - Recursive scan for `.py` files, skipping dependency and cache folders
//! - Regex-based external dependency extraction into `requirements.txt`
//! - Token counting and an advisory cost estimate before any paid request
//! - Content-hash change cache so unchanged files are never summarized twice
//! - Per-file summaries, a project-level explanation and a cleaned `README.md`
//!
//! ## Quick Start
//!
//! ```no_run
//! use docsmith::{Config, OpenAiClient, Pipeline};
//!
//! # fn main() -> anyhow::Result<()> {
//! let config = Config::builder()
//!     .root_dir("./my_project")
//!     .api_key("sk-...")
//!     .build()?;
//!
//! let model = OpenAiClient::new(&config)?;
//! let pipeline = Pipeline::new(config, Box::new(model))?;
//!
//! let prepared = pipeline.prepare()?;
//! println!("{}", prepared.survey.estimate);
//! let stats = pipeline.analyze(prepared)?;
//! println!("README written to {}", stats.readme_path.display());
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! The library follows a pipeline architecture:
//! 1. **Scanner**: Discovers qualifying source files in sorted order
//! 2. **Analysis**: Extracts dependencies, detects the entry point, counts tokens
//! 3. **Cache**: Records content hashes and reuses existing summaries
//! 4. **Agents**: Summarize each pending file, then explain the whole project
//! 5. **Writer**: Composes, cleans and atomically writes the README

#![warn(
    missing_docs,
    rust_2018_idioms,
    unreachable_pub,
    clippy::all,
    clippy::pedantic,
    clippy::nursery
)]
#![allow(clippy::module_name_repetitions)]

mod agent;
mod cache;
mod config;
mod deps;
mod entry_point;
mod error;
mod file;
mod filter;
mod llm;
mod pipeline;
mod readme;
mod scanner;
mod template;
mod token;
mod writer;

pub use cache::{hash_content, ChangeCache, FileRecord, UpsertOutcome};
pub use config::{
    Config, ConfigBuilder, API_BASE_VAR, API_KEY_VAR, DEFAULT_API_BASE, DEFAULT_ENTRY_POINT,
    DEFAULT_MODEL, MODEL_VAR,
};
pub use deps::{write_requirements, DependencyExtractor, ImportScanner};
pub use entry_point::{detect_entry_point, EntryPoint};
pub use error::{Error, Result};
pub use file::{SourceFile, SOURCE_EXTENSION};
pub use filter::{FileFilterConfig, DEFAULT_EXCLUDE_MARKERS};
pub use llm::{ChatMessage, LanguageModel, OpenAiClient, Role};
pub use pipeline::{Pipeline, Prepared, RunStats, Survey};
pub use readme::{clean_readme, ReadmeComposer, ReadmeInput};
pub use scanner::ScanStats;
pub use token::{
    estimate_cost, price_per_1k_for_model, CostEstimate, FileTokens, TiktokenEstimator,
    TokenEstimator, TokenizerKind, DEFAULT_PRICE_PER_1K_TOKENS,
};

/// Runs the complete pipeline against the configured OpenAI-compatible endpoint
/// without asking for confirmation.
///
/// # Errors
///
/// Returns an error if:
/// - Configuration is invalid or the API credential is missing
/// - No qualifying files are found
/// - The cache file is malformed
/// - The project explanation cannot be generated
///
/// # Examples
///
/// ```no_run
/// use docsmith::{run, Config};
///
/// # fn main() -> anyhow::Result<()> {
/// let config = Config::builder()
///     .root_dir("./my_project")
///     .api_key("sk-...")
///     .build()?;
///
/// let stats = run(config)?;
/// println!("{} files analyzed", stats.analyzed);
/// # Ok(())
/// # }
/// ```
pub fn run(config: Config) -> Result<RunStats> {
    let model = OpenAiClient::new(&config)?;
    Pipeline::new(config, Box::new(model))?.run()
}
