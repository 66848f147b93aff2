//! Rendezvous engine.
//!
//! Ties the layers together: validates the IR, runs the analysis, hands
//! the result to the translator and summarizes the produced model.

pub mod config;
pub mod pipeline;
pub mod report;

pub use config::{QueryToggles, TranslationConfig};
pub use pipeline::Pipeline;
pub use report::TranslationReport;

use rendezvous_analysis::AnalysisError;
use rendezvous_ir::IrError;
use rendezvous_translate::TranslateError;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PipelineError {
    #[error("IR error: {0}")]
    Ir(#[from] IrError),
    #[error("Analysis error: {0}")]
    Analysis(#[from] AnalysisError),
    #[error("Translation error: {0}")]
    Translate(#[from] TranslateError),
    #[error("Configuration error: {0}")]
    Config(String),
}
