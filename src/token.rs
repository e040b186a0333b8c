use crate::error::{Error, Result};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use tiktoken_rs::CoreBPE;

const SIMPLE_CHARS_PER_TOKEN: usize = 4;
const ENHANCED_WORD_MULTIPLIER: f64 = 1.3;
const ENHANCED_SPECIAL_DIVISOR: usize = 10;

/// Price applied when the model is not in the pricing table (gpt-4 list price).
pub const DEFAULT_PRICE_PER_1K_TOKENS: f64 = 0.03;

/// Prefix-matched pricing table, most specific prefix first.
const MODEL_PRICES: &[(&str, f64)] = &[
    ("gpt-4o-mini", 0.000_15),
    ("gpt-4o", 0.005),
    ("gpt-4-turbo", 0.01),
    ("gpt-4", 0.03),
    ("gpt-3.5-turbo", 0.0015),
];

/// Type of tokenizer to use for estimation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TokenizerKind {
    /// BPE tokenizer matching the configured OpenAI model
    #[default]
    Tiktoken,
    /// Simple character-based tokenizer (~4 chars per token)
    Simple,
    /// Enhanced tokenizer with word and special character analysis
    Enhanced,
}

impl TokenizerKind {
    /// Creates a new tokenizer instance of this kind for `model`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Tokenizer`] if `Tiktoken` is requested for a model
    /// that has no known encoding.
    pub fn create(self, model: &str) -> Result<Arc<dyn TokenEstimator>> {
        Ok(match self {
            Self::Tiktoken => Arc::new(TiktokenEstimator::for_model(model)?),
            Self::Simple => Arc::new(SimpleTokenizer),
            Self::Enhanced => Arc::new(EnhancedTokenizer),
        })
    }
}

/// Trait for estimating token counts in text.
pub trait TokenEstimator: Send + Sync {
    /// Estimates the number of tokens in the given text.
    fn estimate(&self, text: &str) -> usize;
}

/// Exact token counts using the BPE encoding of an OpenAI model.
pub struct TiktokenEstimator {
    bpe: CoreBPE,
}

impl TiktokenEstimator {
    /// Resolves the encoding used by `model`.
    ///
    /// # Errors
    ///
    /// Returns an error for model names tiktoken does not recognise.
    pub fn for_model(model: &str) -> Result<Self> {
        let bpe = tiktoken_rs::get_bpe_from_model(model)
            .map_err(|e| Error::tokenizer(model, e.to_string()))?;
        Ok(Self { bpe })
    }
}

impl TokenEstimator for TiktokenEstimator {
    fn estimate(&self, text: &str) -> usize {
        self.bpe.encode_with_special_tokens(text).len()
    }
}

/// Simple character-based tokenizer.
///
/// Uses a heuristic of approximately 4 characters per token,
/// which works reasonably well for source code.
#[derive(Debug, Clone, Copy)]
pub(crate) struct SimpleTokenizer;

impl TokenEstimator for SimpleTokenizer {
    fn estimate(&self, text: &str) -> usize {
        if text.is_empty() {
            return 0;
        }

        let char_count = text.chars().count();
        char_count
            .saturating_add(SIMPLE_CHARS_PER_TOKEN - 1)
            .saturating_div(SIMPLE_CHARS_PER_TOKEN)
            .max(1)
    }
}

/// Enhanced tokenizer with multiple heuristics.
///
/// This tokenizer considers:
/// - Word count (weighted by 1.3)
/// - Character count (divided by 4)
/// - Special characters (penalty factor)
#[derive(Debug, Clone, Copy)]
pub(crate) struct EnhancedTokenizer;

impl TokenEstimator for EnhancedTokenizer {
    fn estimate(&self, text: &str) -> usize {
        if text.is_empty() {
            return 0;
        }

        let words = count_words(text);
        let chars = text.chars().count();
        let special_chars = count_special_chars(text);

        let word_estimate = (f64::from(words as u32) * ENHANCED_WORD_MULTIPLIER) as usize;
        let char_estimate = chars.saturating_div(SIMPLE_CHARS_PER_TOKEN);
        let special_penalty = special_chars.saturating_div(ENHANCED_SPECIAL_DIVISOR);

        let base_estimate = word_estimate
            .saturating_add(char_estimate)
            .saturating_div(2);

        base_estimate.saturating_add(special_penalty).max(1)
    }
}

/// Counts words in text (whitespace-separated).
#[inline]
fn count_words(text: &str) -> usize {
    text.split_whitespace().count()
}

/// Counts special (non-alphanumeric) characters.
#[inline]
fn count_special_chars(text: &str) -> usize {
    text.chars()
        .filter(|c| !c.is_alphanumeric() && !c.is_whitespace())
        .count()
}

/// Returns the per-1000-token price for `model`.
#[must_use]
pub fn price_per_1k_for_model(model: &str) -> f64 {
    MODEL_PRICES
        .iter()
        .find(|(prefix, _)| model.starts_with(prefix))
        .map_or(DEFAULT_PRICE_PER_1K_TOKENS, |(_, price)| *price)
}

/// Token count for one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileTokens {
    /// Absolute path to the file
    pub path: PathBuf,
    /// Token count of the full file text
    pub tokens: usize,
}

/// Advisory cost estimate for sending every file to the model once.
#[derive(Debug, Clone, PartialEq)]
pub struct CostEstimate {
    /// Sum of all per-file token counts
    pub total_tokens: usize,
    /// Price applied per 1000 tokens
    pub price_per_1k: f64,
    /// Exact (unrounded) cost
    pub cost: f64,
    /// Per-file breakdown in scan order
    pub per_file: Vec<FileTokens>,
}

impl CostEstimate {
    /// Builds an estimate from per-file counts.
    #[must_use]
    pub fn new(per_file: Vec<FileTokens>, price_per_1k: f64) -> Self {
        let total_tokens = per_file.iter().map(|f| f.tokens).sum();
        Self {
            total_tokens,
            price_per_1k,
            cost: estimate_cost(total_tokens, price_per_1k),
            per_file,
        }
    }
}

impl fmt::Display for CostEstimate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} tokens, ~${:.2}", self.total_tokens, self.cost)
    }
}

/// `cost = tokens / 1000 * price`.
#[must_use]
pub fn estimate_cost(total_tokens: usize, price_per_1k: f64) -> f64 {
    (total_tokens as f64 / 1000.0) * price_per_1k
}
