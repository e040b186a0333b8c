//! Per-file summarizer and project-level explainer.
//!
//! Both agents send one system+user message pair to the model and never
//! propagate a model failure: the error is logged and `None` is returned, so
//! the caller decides whether the missing text is recoverable.

use crate::error::Result;
use crate::file::SourceFile;
use crate::llm::{ChatMessage, LanguageModel};
use crate::template::TemplateEngine;
use indicatif::ProgressBar;
use tracing::{debug, error, warn};

const SUMMARIZER_ROLE: &str =
    "You are a professional Python developer with expertise in code analysis and documentation.";

const EXPLAINER_ROLE: &str = "You are an expert software developer.";

/// Asks the model for a structured summary of a single file.
pub(crate) struct Summarizer<'a> {
    model: &'a dyn LanguageModel,
    templates: &'a TemplateEngine,
    progress: ProgressBar,
}

impl<'a> Summarizer<'a> {
    pub(crate) fn new(model: &'a dyn LanguageModel, templates: &'a TemplateEngine) -> Self {
        Self {
            model,
            templates,
            progress: ProgressBar::hidden(),
        }
    }

    /// Routes log lines around `progress` so they do not tear the bar.
    pub(crate) fn with_progress(mut self, progress: ProgressBar) -> Self {
        self.progress = progress;
        self
    }

    /// Returns the model's reply verbatim, or `None` after logging the failure.
    pub(crate) fn summarize(&self, file: &SourceFile) -> Option<String> {
        match self.request(&file.content) {
            Ok(summary) => {
                self.progress.suspend(|| {
                    debug!("Summarized {} ({} chars)", file.relative_path, summary.len());
                });
                Some(summary)
            }
            Err(e) => {
                self.progress
                    .suspend(|| error!("Error analyzing {}: {e}", file.relative_path));
                None
            }
        }
    }

    fn request(&self, code: &str) -> Result<String> {
        let prompt = self.templates.render_analysis(code)?;
        self.model
            .complete(&[ChatMessage::system(SUMMARIZER_ROLE), ChatMessage::user(prompt)])
    }
}

/// Asks the model for a narrative of the whole project.
pub(crate) struct ProjectExplainer<'a> {
    model: &'a dyn LanguageModel,
    templates: &'a TemplateEngine,
}

impl<'a> ProjectExplainer<'a> {
    pub(crate) fn new(model: &'a dyn LanguageModel, templates: &'a TemplateEngine) -> Self {
        Self { model, templates }
    }

    /// Explains the project from its per-file summaries, joined by blank lines.
    ///
    /// A failed request and a blank reply both yield `None`.
    pub(crate) fn explain(&self, summaries: &[&str]) -> Option<String> {
        let combined = summaries.join("\n\n");

        match self.request(&combined) {
            Ok(text) if text.trim().is_empty() => {
                warn!("Model returned an empty project explanation");
                None
            }
            Ok(text) => Some(text),
            Err(e) => {
                error!("Error generating project explanation: {e}");
                None
            }
        }
    }

    fn request(&self, combined: &str) -> Result<String> {
        let prompt = self.templates.render_explanation(combined)?;
        self.model
            .complete(&[ChatMessage::system(EXPLAINER_ROLE), ChatMessage::user(prompt)])
    }
}
