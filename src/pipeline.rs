use crate::{
    agent::{ProjectExplainer, Summarizer},
    cache::{ChangeCache, UpsertOutcome},
    config::Config,
    deps::{write_requirements, DependencyExtractor, ImportScanner},
    entry_point::{detect_entry_point, EntryPoint},
    error::{Error, Result},
    file::SourceFile,
    llm::{DisabledModel, LanguageModel},
    readme::{clean_readme, ReadmeComposer, ReadmeInput},
    scanner::{ScanStats, Scanner},
    template::TemplateEngine,
    token::{CostEstimate, FileTokens},
    writer::{ensure_dir, write_file_atomic},
};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tracing::{debug, info, instrument, warn};

const REQUIREMENTS_FILE: &str = "requirements.txt";
const README_FILE: &str = "README.md";

/// What a scan of the project found. Nothing has been written yet.
#[derive(Debug, Clone)]
pub struct Survey {
    /// Qualifying files, sorted by relative path
    pub files: Vec<SourceFile>,

    /// Walker counters
    pub scan_stats: ScanStats,

    /// Sorted external dependencies
    pub requirements: Vec<String>,

    /// Script named in the usage section
    pub entry_point: EntryPoint,

    /// Advisory token and cost estimate
    pub estimate: CostEstimate,
}

/// Output of [`Pipeline::prepare`]: requirements written and the cache
/// refreshed with the current content of every file.
#[derive(Debug)]
pub struct Prepared {
    /// Scan results
    pub survey: Survey,

    /// Files seen for the first time
    pub inserted: usize,

    /// Files whose content changed since the last run
    pub updated: usize,

    /// Files whose content hash matched the cache
    pub unchanged: usize,

    /// Records dropped because their file no longer exists
    pub pruned: usize,

    cache: ChangeCache,
}

impl Prepared {
    /// Number of scanned files that still need a summary.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.survey
            .files
            .iter()
            .filter(|file| self.cache.summary(&file.key()).is_none())
            .count()
    }
}

/// Statistics of a completed run.
#[derive(Debug, Clone)]
pub struct RunStats {
    /// Files summarized by the model in this run
    pub analyzed: usize,

    /// Files whose cached summary was reused
    pub reused: usize,

    /// Files whose summarization failed; retried on the next run
    pub failed: usize,

    /// Location of the written README
    pub readme_path: PathBuf,

    /// Time spent in [`Pipeline::analyze`]
    pub duration: Duration,
}

/// Documentation pipeline for one project folder.
///
/// Split into two phases so a caller can show the cost estimate and ask for
/// confirmation before any paid request is made:
///
/// 1. [`prepare`](Self::prepare): scan, write `requirements.txt`, refresh the cache
/// 2. [`analyze`](Self::analyze): summarize files, explain the project, write `README.md`
pub struct Pipeline {
    config: Config,
    model: Box<dyn LanguageModel>,
    extractor: Box<dyn DependencyExtractor>,
    scanner: Scanner,
    templates: TemplateEngine,
    composer: ReadmeComposer,
}

impl Pipeline {
    /// Creates a pipeline that sends its requests to `model`.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Configuration validation fails
    /// - A file filter pattern is invalid
    /// - A built-in template fails to parse
    pub fn new(config: Config, model: Box<dyn LanguageModel>) -> Result<Self> {
        config.validate()?;

        let scanner = Scanner::new(&config)?;
        let templates = TemplateEngine::new()?;
        let composer = ReadmeComposer::new()?;
        let extractor = Box::new(ImportScanner::new(&config.extra_stdlib));

        Ok(Self {
            config,
            model,
            extractor,
            scanner,
            templates,
            composer,
        })
    }

    /// Replaces the import scanner used to build `requirements.txt`.
    #[must_use]
    pub fn with_extractor(mut self, extractor: Box<dyn DependencyExtractor>) -> Self {
        self.extractor = extractor;
        self
    }

    /// Creates a pipeline without a language model, for dry runs.
    ///
    /// # Errors
    ///
    /// Same as [`Pipeline::new`].
    pub fn offline(config: Config) -> Result<Self> {
        Self::new(config, Box::new(DisabledModel))
    }

    /// Returns the configuration this pipeline runs with.
    #[must_use]
    pub const fn config(&self) -> &Config {
        &self.config
    }

    /// Scans and estimates without writing anything or calling the model.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoFiles`] if nothing qualifies, or a tokenizer error.
    #[instrument(skip(self), fields(root_dir = %self.config.root_dir.display()))]
    pub fn estimate_only(&self) -> Result<Survey> {
        let survey = self.survey()?;
        info!("Dry run: no files written, no model requests made");
        Ok(survey)
    }

    /// Runs everything up to the paid phase.
    ///
    /// The output directory is created only once at least one file qualifies.
    /// The cache is saved before returning.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The configuration is in dry-run mode
    /// - No qualifying files are found
    /// - The cache file is malformed
    /// - An output file cannot be written
    #[instrument(skip(self), fields(root_dir = %self.config.root_dir.display()))]
    pub fn prepare(&self) -> Result<Prepared> {
        if self.config.dry_run {
            return Err(Error::config("dry run mode only supports estimate_only()"));
        }

        let survey = self.survey()?;

        let output_dir = self.config.output_dir();
        ensure_dir(&output_dir)?;

        let mut cache = ChangeCache::load(self.config.cache_path())?;

        let pruned = if self.config.prune_cache {
            let pruned = cache.prune_missing();
            if pruned > 0 {
                info!("Pruned {pruned} cache records for deleted files");
            }
            pruned
        } else {
            0
        };

        write_requirements(
            &output_dir.join(REQUIREMENTS_FILE),
            &survey.requirements,
            self.config.backup_existing,
        )?;
        info!(
            "{} generated with {} dependencies",
            REQUIREMENTS_FILE,
            survey.requirements.len()
        );

        let (mut inserted, mut updated, mut unchanged) = (0, 0, 0);
        for (file, counted) in survey.files.iter().zip(&survey.estimate.per_file) {
            match cache.upsert(&file.key(), &file.content, counted.tokens) {
                UpsertOutcome::Inserted => inserted += 1,
                UpsertOutcome::Updated => {
                    debug!("Content changed: {}", file.relative_path);
                    updated += 1;
                }
                UpsertOutcome::Unchanged => unchanged += 1,
            }
        }
        cache.save()?;

        info!("Cache refreshed: {inserted} new, {updated} changed, {unchanged} unchanged");

        Ok(Prepared {
            survey,
            inserted,
            updated,
            unchanged,
            pruned,
            cache,
        })
    }

    /// Runs the paid phase and writes the README.
    ///
    /// Files that already have a summary are skipped. A failed summary is
    /// logged and left unset so the next run retries it. The cache is saved
    /// after every successful summary.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Synthesis`] if the project explanation fails and
    /// [`Error::EmptyReadme`] if cleanup leaves nothing. In both cases the
    /// cache and `requirements.txt` remain on disk.
    #[instrument(skip_all, fields(files = prepared.survey.files.len()))]
    pub fn analyze(&self, prepared: Prepared) -> Result<RunStats> {
        let start_time = Instant::now();
        let Prepared {
            survey, mut cache, ..
        } = prepared;

        let progress = self.progress_bar(survey.files.len());
        let summarizer =
            Summarizer::new(self.model.as_ref(), &self.templates).with_progress(progress.clone());

        let (mut analyzed, mut reused, mut failed) = (0, 0, 0);
        for file in &survey.files {
            let key = file.key();
            progress.set_message(file.relative_path.clone());

            if cache.summary(&key).is_some() {
                reused += 1;
            } else if let Some(summary) = summarizer.summarize(file) {
                cache.set_summary(&key, summary);
                cache.save()?;
                analyzed += 1;
            } else {
                failed += 1;
            }

            progress.inc(1);
        }
        progress.finish_and_clear();

        info!("Analyzed {analyzed} files ({reused} cached, {failed} failed)");
        if failed > 0 {
            warn!("{failed} files have no summary and will be retried on the next run");
        }

        let summaries: Vec<&str> = survey
            .files
            .iter()
            .filter_map(|file| cache.summary(&file.key()))
            .collect();

        info!("Generating project explanation...");
        let project_summary = ProjectExplainer::new(self.model.as_ref(), &self.templates)
            .explain(&summaries)
            .ok_or_else(|| Error::synthesis("no project explanation was produced"))?;

        let features = summaries.join("\n");
        let composed = self.composer.compose(&ReadmeInput {
            project_summary: &project_summary,
            features: &features,
            requirements: &survey.requirements,
            main_script_name: survey.entry_point.name(),
        })?;

        let readme = clean_readme(&composed);
        if readme.is_empty() {
            return Err(Error::EmptyReadme);
        }

        let readme_path = self.config.output_dir().join(README_FILE);
        write_file_atomic(&readme_path, &readme, self.config.backup_existing)?;
        info!("{} written to {}", README_FILE, readme_path.display());

        Ok(RunStats {
            analyzed,
            reused,
            failed,
            readme_path,
            duration: start_time.elapsed(),
        })
    }

    /// Runs [`prepare`](Self::prepare) and [`analyze`](Self::analyze) without
    /// stopping for confirmation.
    ///
    /// # Errors
    ///
    /// Returns any error of either phase.
    pub fn run(&self) -> Result<RunStats> {
        let prepared = self.prepare()?;
        self.analyze(prepared)
    }

    fn survey(&self) -> Result<Survey> {
        let (files, scan_stats) = self.scanner.scan()?;
        info!("Found {} Python files", files.len());

        let entry_point = detect_entry_point(&files, &self.config.default_entry_point);
        match entry_point.fallback_warning() {
            Some(message) => warn!("{message}"),
            None => info!("Entry point: {entry_point}"),
        }

        let requirements = self.extractor.extract(&files);

        let estimator = self.config.tokenizer.create(&self.config.model)?;
        let per_file = files
            .iter()
            .map(|file| FileTokens {
                path: file.absolute_path.clone(),
                tokens: estimator.estimate(&file.content),
            })
            .collect();
        let estimate = CostEstimate::new(per_file, self.config.price_per_1k());

        debug!("Estimate for model {}: {estimate}", self.config.model);

        Ok(Survey {
            files,
            scan_stats,
            requirements,
            entry_point,
            estimate,
        })
    }

    fn progress_bar(&self, len: usize) -> ProgressBar {
        if !self.config.show_progress {
            return ProgressBar::hidden();
        }

        let bar = ProgressBar::new(len as u64);
        bar.set_style(
            ProgressStyle::with_template("{spinner:.green} [{bar:30.cyan/blue}] {pos}/{len} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("#>-"),
        );
        bar
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::ChatMessage;
    use crate::token::TokenizerKind;
    use assert_fs::prelude::*;
    use std::cell::Cell;
    use std::rc::Rc;
    use std::sync::{Arc, Mutex};

    struct EchoModel {
        calls: Rc<Cell<usize>>,
    }

    impl LanguageModel for EchoModel {
        fn complete(&self, _messages: &[ChatMessage]) -> Result<String> {
            self.calls.set(self.calls.get() + 1);
            Ok(format!("reply {}", self.calls.get()))
        }
    }

    fn pipeline(root: &std::path::Path, dry_run: bool) -> (Pipeline, Rc<Cell<usize>>) {
        let calls = Rc::new(Cell::new(0));
        let mut builder = Config::builder()
            .root_dir(root.join("project"))
            .output_root(root.join("output"))
            .tokenizer(TokenizerKind::Simple)
            .show_progress(false)
            .dry_run(dry_run);
        if !dry_run {
            builder = builder.api_key("sk-test");
        }
        let model = EchoModel {
            calls: Rc::clone(&calls),
        };
        (Pipeline::new(builder.build().unwrap(), Box::new(model)).unwrap(), calls)
    }

    #[test]
    fn test_estimate_only_writes_nothing() {
        let temp = assert_fs::TempDir::new().unwrap();
        temp.child("project/main.py")
            .write_str("import requests\nif __name__ == '__main__':\n    pass\n")
            .unwrap();

        let (pipeline, calls) = pipeline(temp.path(), true);
        let survey = pipeline.estimate_only().unwrap();

        assert_eq!(survey.files.len(), 1);
        assert_eq!(survey.requirements, vec!["requests"]);
        assert_eq!(survey.entry_point.name(), "main.py");
        assert!(survey.estimate.total_tokens > 0);
        assert_eq!(calls.get(), 0);
        assert!(!temp.child("output").exists());
    }

    #[test]
    fn test_offline_pipeline_estimates_without_credential() {
        let temp = assert_fs::TempDir::new().unwrap();
        temp.child("project/tool.py").write_str("import numpy as np\n").unwrap();

        let config = Config::builder()
            .root_dir(temp.path().join("project"))
            .output_root(temp.path().join("output"))
            .tokenizer(TokenizerKind::Simple)
            .dry_run(true)
            .build()
            .unwrap();

        let survey = Pipeline::offline(config).unwrap().estimate_only().unwrap();
        assert_eq!(survey.requirements, vec!["numpy"]);
        assert_eq!(survey.entry_point, EntryPoint::Fallback("main.py".to_string()));
        assert!(!temp.child("output").exists());
    }

    #[derive(Clone, Default)]
    struct CapturedLog(Arc<Mutex<Vec<u8>>>);

    impl std::io::Write for CapturedLog {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_missing_entry_point_is_warned() {
        let temp = assert_fs::TempDir::new().unwrap();
        temp.child("project/lib.py").write_str("x = 1\n").unwrap();

        let log = CapturedLog::default();
        let writer = log.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_ansi(false)
            .with_max_level(tracing::Level::WARN)
            .finish();

        let (pipeline, _) = pipeline(temp.path(), true);
        let survey = tracing::subscriber::with_default(subscriber, || pipeline.estimate_only())
            .unwrap();

        assert_eq!(survey.entry_point.name(), "main.py");
        let output = String::from_utf8(log.0.lock().unwrap().clone()).unwrap();
        assert!(output.contains("WARN"), "{output}");
        assert!(output.contains("No file contains a __main__ guard, assuming main.py"));
    }

    #[test]
    fn test_detected_entry_point_is_not_warned() {
        let temp = assert_fs::TempDir::new().unwrap();
        temp.child("project/cli.py")
            .write_str("if __name__ == '__main__':\n    pass\n")
            .unwrap();

        let log = CapturedLog::default();
        let writer = log.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_ansi(false)
            .with_max_level(tracing::Level::WARN)
            .finish();

        let (pipeline, _) = pipeline(temp.path(), true);
        tracing::subscriber::with_default(subscriber, || pipeline.estimate_only()).unwrap();

        assert!(log.0.lock().unwrap().is_empty());
    }

    struct PinnedRequirements;

    impl DependencyExtractor for PinnedRequirements {
        fn extract(&self, _files: &[SourceFile]) -> Vec<String> {
            vec!["pinned-a".to_string(), "pinned-b".to_string()]
        }
    }

    #[test]
    fn test_custom_extractor_feeds_requirements() {
        let temp = assert_fs::TempDir::new().unwrap();
        temp.child("project/a.py").write_str("import requests\n").unwrap();

        let (pipeline, _) = pipeline(temp.path(), false);
        let prepared = pipeline.with_extractor(Box::new(PinnedRequirements)).prepare().unwrap();

        assert_eq!(prepared.survey.requirements, vec!["pinned-a", "pinned-b"]);
        temp.child("output/project/requirements.txt").assert("pinned-a\npinned-b");
    }

    #[test]
    fn test_prepare_rejected_in_dry_run() {
        let temp = assert_fs::TempDir::new().unwrap();
        temp.child("project/a.py").write_str("x = 1").unwrap();

        let (pipeline, _) = pipeline(temp.path(), true);
        assert!(pipeline.prepare().unwrap_err().is_config());
    }

    #[test]
    fn test_prepare_counts_upserts() {
        let temp = assert_fs::TempDir::new().unwrap();
        temp.child("project/a.py").write_str("a = 1").unwrap();
        temp.child("project/b.py").write_str("b = 1").unwrap();

        let (pipeline, calls) = pipeline(temp.path(), false);
        let first = pipeline.prepare().unwrap();
        assert_eq!((first.inserted, first.updated, first.unchanged), (2, 0, 0));
        assert_eq!(first.pending(), 2);

        temp.child("project/b.py").write_str("b = 2").unwrap();
        let second = pipeline.prepare().unwrap();
        assert_eq!((second.inserted, second.updated, second.unchanged), (0, 1, 1));

        assert_eq!(calls.get(), 0);
        temp.child("output/project/requirements.txt").assert("");
        assert!(temp.child("output/project/vector_store.json").path().is_file());
    }

    #[test]
    fn test_run_writes_readme() {
        let temp = assert_fs::TempDir::new().unwrap();
        temp.child("project/app.py")
            .write_str("import flask\nif __name__ == '__main__':\n    run()\n")
            .unwrap();

        let (pipeline, calls) = pipeline(temp.path(), false);
        let stats = pipeline.run().unwrap();

        assert_eq!((stats.analyzed, stats.reused, stats.failed), (1, 0, 0));
        assert_eq!(calls.get(), 2);

        let readme = std::fs::read_to_string(&stats.readme_path).unwrap();
        assert!(readme.contains("## Overview\n\nreply 2"));
        assert!(readme.contains("- reply 1"));
        assert!(readme.contains("python app.py"));
        assert!(readme.contains("- flask"));
    }
}
