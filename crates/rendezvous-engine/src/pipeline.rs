//! Analyzer-before-translator pipeline.

use rendezvous_analysis::AnalysisCache;
use rendezvous_ir::Program;
use rendezvous_translate::{translate, Translation};
use tracing::info;

use crate::config::TranslationConfig;
use crate::PipelineError;

pub use crate::report::report;

/// Runs the pipeline over one program, keeping its analysis between runs.
///
/// Call [`Pipeline::invalidate`] after mutating the program.
#[derive(Debug)]
pub struct Pipeline {
    config: TranslationConfig,
    cache: AnalysisCache,
}

impl Pipeline {
    pub fn new(config: TranslationConfig) -> Result<Self, PipelineError> {
        config.validate()?;
        let cache = AnalysisCache::new(config.saturation);
        Ok(Self { config, cache })
    }

    pub fn config(&self) -> &TranslationConfig {
        &self.config
    }

    pub fn invalidate(&mut self) {
        self.cache.invalidate();
    }

    pub fn run(&mut self, program: &Program) -> Result<Translation, PipelineError> {
        program.validate()?;
        let analysis = self.cache.get(program)?;
        let translation = translate(program, analysis, &self.config.options())?;
        info!(
            program = %program.name,
            warnings = translation.warnings.len(),
            "pipeline complete"
        );
        Ok(translation)
    }
}

/// One-shot run with a fresh analysis.
pub fn run(program: &Program, config: &TranslationConfig) -> Result<Translation, PipelineError> {
    Pipeline::new(config.clone())?.run(program)
}

/// Warnings as `miette` reports, labeled against the source when known.
pub fn diagnostics(program: &Program, translation: &Translation) -> Vec<miette::Report> {
    translation
        .warnings
        .iter()
        .map(|w| miette::Report::new(w.report(program)))
        .collect()
}
