//! Lazily recomputed analysis results.

use rendezvous_ir::Program;
use tracing::debug;

use crate::{Analysis, AnalysisError};

/// Owns the derived analysis state of one program.
///
/// Results are computed on the first query and reused until
/// [`AnalysisCache::invalidate`] is called, which callers must do after
/// mutating the program.
#[derive(Debug)]
pub struct AnalysisCache {
    saturation: u64,
    dirty: bool,
    analysis: Option<Analysis>,
}

impl AnalysisCache {
    pub fn new(saturation: u64) -> Self {
        Self {
            saturation,
            dirty: true,
            analysis: None,
        }
    }

    pub fn saturation(&self) -> u64 {
        self.saturation
    }

    pub fn set_saturation(&mut self, saturation: u64) {
        if saturation != self.saturation {
            self.saturation = saturation;
            self.dirty = true;
        }
    }

    pub fn invalidate(&mut self) {
        self.dirty = true;
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Current analysis of `program`, recomputing it if stale.
    pub fn get(&mut self, program: &Program) -> Result<&Analysis, AnalysisError> {
        let analysis = match self.analysis.take() {
            Some(analysis) if !self.dirty => analysis,
            _ => {
                debug!(program = %program.name, "recomputing analysis");
                Analysis::run(program, self.saturation)?
            }
        };
        self.dirty = false;
        Ok(self.analysis.insert(analysis))
    }

    /// The last computed analysis, if it is still current.
    pub fn cached(&self) -> Option<&Analysis> {
        if self.dirty {
            None
        } else {
            self.analysis.as_ref()
        }
    }
}
