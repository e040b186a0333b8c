use crate::error::{Error, Result};
use serde::Serialize;
use tera::{Context, Tera};

const ANALYZE_TEMPLATE: &str = "analyze";
const EXPLAIN_TEMPLATE: &str = "explain";
const README_TEMPLATE: &str = "readme";

/// Values substituted into the README template.
#[derive(Debug, Clone, Serialize)]
pub(crate) struct ReadmeContext<'a> {
    pub(crate) project_summary: &'a str,
    pub(crate) features: Vec<&'a str>,
    pub(crate) requirements: &'a [String],
    pub(crate) file_descriptions: Vec<&'a str>,
    pub(crate) main_script_name: &'a str,
}

/// Renders the fixed prompt and README templates.
pub(crate) struct TemplateEngine {
    tera: Tera,
}

impl TemplateEngine {
    /// Creates a template engine with the built-in templates registered.
    ///
    /// # Errors
    ///
    /// Returns an error if a built-in template fails to parse.
    pub(crate) fn new() -> Result<Self> {
        let mut tera = Tera::default();
        Self::register_builtin_templates(&mut tera)?;
        Ok(Self { tera })
    }

    fn register_builtin_templates(tera: &mut Tera) -> Result<()> {
        tera.add_raw_template(ANALYZE_TEMPLATE, include_str!("../templates/analyze.tera"))
            .map_err(|e| Error::template(ANALYZE_TEMPLATE, e))?;

        tera.add_raw_template(EXPLAIN_TEMPLATE, include_str!("../templates/explain.tera"))
            .map_err(|e| Error::template(EXPLAIN_TEMPLATE, e))?;

        tera.add_raw_template(README_TEMPLATE, include_str!("../templates/readme.tera"))
            .map_err(|e| Error::template(README_TEMPLATE, e))?;

        Ok(())
    }

    /// Builds the per-file analysis prompt.
    ///
    /// # Errors
    ///
    /// Returns an error if rendering fails.
    pub(crate) fn render_analysis(&self, code_content: &str) -> Result<String> {
        let mut context = Context::new();
        context.insert("code_content", code_content);
        self.render(ANALYZE_TEMPLATE, &context)
    }

    /// Builds the project explanation prompt.
    ///
    /// # Errors
    ///
    /// Returns an error if rendering fails.
    pub(crate) fn render_explanation(&self, combined_summary: &str) -> Result<String> {
        let mut context = Context::new();
        context.insert("combined_summary", combined_summary);
        self.render(EXPLAIN_TEMPLATE, &context)
    }

    /// Fills the README template.
    ///
    /// # Errors
    ///
    /// Returns an error if rendering fails.
    pub(crate) fn render_readme(&self, values: &ReadmeContext<'_>) -> Result<String> {
        let context = Context::from_serialize(values).map_err(|e| Error::template(README_TEMPLATE, e))?;
        self.render(README_TEMPLATE, &context)
    }

    fn render(&self, name: &str, context: &Context) -> Result<String> {
        self.tera
            .render(name, context)
            .map_err(|e| Error::template(name, e))
    }
}
