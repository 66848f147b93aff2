//! Machine-readable summary of a translation.

use std::collections::BTreeMap;

use rendezvous_automata::{Model, Query};
use rendezvous_ir::Program;
use rendezvous_translate::Translation;
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct ProcessSummary {
    pub name: String,
    pub states: usize,
    pub transitions: usize,
    pub instances: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PoolSizes {
    pub channels: usize,
    pub mutexes: usize,
    pub wait_groups: usize,
    pub onces: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct WarningEntry {
    pub code: String,
    pub message: String,
    pub function: Option<String>,
    /// 1-based, when the program carries its source text.
    pub line: Option<usize>,
    pub column: Option<usize>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TranslationReport {
    pub program: String,
    pub processes: Vec<ProcessSummary>,
    pub pools: PoolSizes,
    /// Query count per category name.
    pub query_counts: BTreeMap<String, usize>,
    pub queries: Vec<Query>,
    pub warnings: Vec<WarningEntry>,
}

impl TranslationReport {
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

fn declared_size(model: &Model, constant: &str) -> usize {
    model
        .declarations
        .find_var(constant)
        .and_then(|v| v.init.as_deref())
        .and_then(|init| init.parse().ok())
        .unwrap_or(0)
}

pub fn report(program: &Program, translation: &Translation) -> TranslationReport {
    let model = &translation.model;
    let processes = model
        .processes
        .iter()
        .map(|p| ProcessSummary {
            name: p.name.clone(),
            states: p.states.len(),
            transitions: p.transitions.len(),
            instances: model.instances_of(&p.name).count(),
        })
        .collect();

    let mut query_counts = BTreeMap::new();
    for q in &model.queries {
        *query_counts.entry(q.category.to_string()).or_insert(0) += 1;
    }

    let warnings = translation
        .warnings
        .iter()
        .map(|w| {
            let (line, column) = w
                .span
                .and_then(|s| program.line_col(s.start))
                .map_or((None, None), |(l, c)| (Some(l), Some(c)));
            WarningEntry {
                code: w.code.to_string(),
                message: w.message.clone(),
                function: w.function.clone(),
                line,
                column,
            }
        })
        .collect();

    TranslationReport {
        program: program.name.clone(),
        processes,
        pools: PoolSizes {
            channels: declared_size(model, "MAX_CHANNELS"),
            mutexes: declared_size(model, "MAX_MUTEXES"),
            wait_groups: declared_size(model, "MAX_WAIT_GROUPS"),
            onces: declared_size(model, "MAX_ONCES"),
        },
        query_counts,
        queries: model.queries.clone(),
        warnings,
    }
}
