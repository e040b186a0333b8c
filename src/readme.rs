//! README composition and cleanup.

use crate::error::Result;
use crate::template::{ReadmeContext, TemplateEngine};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;

static BLANK_RUN_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n\s*\n").expect("valid pattern"));

static SELF_REFERENCE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(this project|this script)\b").expect("valid pattern"));

const SELF_REFERENCE_REPLACEMENT: &str = "the tool";

/// Inputs of a README.
#[derive(Debug, Clone, Copy)]
pub struct ReadmeInput<'a> {
    /// Project-level narrative from the explainer
    pub project_summary: &'a str,
    /// Per-file summaries joined by newlines
    pub features: &'a str,
    /// Sorted external dependencies
    pub requirements: &'a [String],
    /// Base name of the detected entry point
    pub main_script_name: &'a str,
}

/// Fills the README template.
pub struct ReadmeComposer {
    templates: TemplateEngine,
}

impl ReadmeComposer {
    /// Creates a composer with the built-in template.
    ///
    /// # Errors
    ///
    /// Returns an error if the template fails to parse.
    pub fn new() -> Result<Self> {
        Ok(Self {
            templates: TemplateEngine::new()?,
        })
    }

    /// Renders the README and collapses blank runs. No cleanup beyond that;
    /// see [`clean_readme`].
    ///
    /// Every non-empty line of `features` becomes one bullet, both in the
    /// features section and in the file descriptions.
    ///
    /// # Errors
    ///
    /// Returns an error if rendering fails.
    pub fn compose(&self, input: &ReadmeInput<'_>) -> Result<String> {
        let bullets = bullet_lines(input.features);

        let rendered = self.templates.render_readme(&ReadmeContext {
            project_summary: input.project_summary.trim(),
            features: bullets.clone(),
            requirements: input.requirements,
            file_descriptions: bullets,
            main_script_name: input.main_script_name,
        })?;

        Ok(BLANK_RUN_RE.replace_all(&rendered, "\n\n").trim().to_string())
    }
}

fn bullet_lines(text: &str) -> Vec<&str> {
    text.split('\n')
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect()
}

/// Normalises README text. Idempotent: `clean_readme(&clean_readme(x)) == clean_readme(x)`.
///
/// Steps, in order:
/// 1. trim the document
/// 2. replace "this project" / "this script" (any case) with "the tool"
/// 3. put a blank line before every `##`-or-deeper heading that lacks one
/// 4. drop repeated lines (trimmed, case-insensitive), keeping the first;
///    blank lines and code fences are never dropped
/// 5. strip indentation from the first line inside a tagged code fence
/// 6. collapse blank-line runs to a single blank line
/// 7. trim again
#[must_use]
pub fn clean_readme(content: &str) -> String {
    let text = content.trim();
    let text = SELF_REFERENCE_RE.replace_all(text, SELF_REFERENCE_REPLACEMENT);
    let text = space_headings(&text);
    let text = remove_duplicate_lines(&text);
    let text = strip_fence_indent(&text);
    let text = BLANK_RUN_RE.replace_all(&text, "\n\n");
    text.trim().to_string()
}

fn is_heading(line: &str) -> bool {
    let trimmed = line.trim_start();
    let hashes = trimmed.chars().take_while(|&c| c == '#').count();
    hashes >= 2 && trimmed[hashes..].starts_with(' ')
}

fn space_headings(text: &str) -> String {
    let mut lines: Vec<&str> = Vec::new();
    for line in text.lines() {
        if is_heading(line) && lines.last().is_some_and(|prev| !prev.trim().is_empty()) {
            lines.push("");
        }
        lines.push(line);
    }
    lines.join("\n")
}

/// True for an opening fence with a language tag, such as "```bash".
fn is_tagged_fence(line: &str) -> bool {
    line.strip_prefix("```").is_some_and(|tag| {
        !tag.is_empty()
            && tag
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '+' | '-'))
    })
}

// Compares against the already stripped previous line, so an indented opener
// right after another opener is settled together with the line that follows it.
fn strip_fence_indent(text: &str) -> String {
    let mut lines: Vec<&str> = Vec::new();
    for line in text.split('\n') {
        let line = if lines.last().is_some_and(|prev| is_tagged_fence(prev)) {
            line.trim_start_matches([' ', '\t'])
        } else {
            line
        };
        lines.push(line);
    }
    lines.join("\n")
}

fn remove_duplicate_lines(text: &str) -> String {
    let mut seen = HashSet::new();
    text.lines()
        .filter(|line| {
            let key = line.trim().to_lowercase();
            key.is_empty() || key.starts_with("```") || seen.insert(key)
        })
        .collect::<Vec<_>>()
        .join("\n")
}
