//! Translation of an analyzed rendezvous program into a timed-automata
//! network.
//!
//! Every emitted function becomes a process template with a fixed number of
//! instances; channels, mutexes and wait groups are shared resource
//! processes; structs and containers live in fixed-size pools. The caller
//! runs [`rendezvous_analysis::Analysis`] first and passes the result in.

mod calls;
mod comm;
mod expr;
mod frames;
mod func;
mod layout;
mod names;
pub mod options;
mod pools;
mod queries;
mod resources;
pub mod warnings;

pub use names::sanitize;
pub use options::{Limits, TranslateOptions};
pub use warnings::{TranslationWarning, WarningCode, WarningReport};

use rendezvous_analysis::{Analysis, AnalysisError, TypeGraphError};
use rendezvous_automata::{Model, ModelError, ProcessInstance};
use rendezvous_ir::Program;
use thiserror::Error;
use tracing::{info, warn};

use crate::expr::Exprs;
use crate::frames::{declare_frames, Storage};
use crate::func::FuncTranslator;
use crate::layout::Layout;
use crate::pools::{copy_call, declare_pools, fresh_value, repr, Repr};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TranslateError {
    #[error("Program '{0}' has no entry function")]
    MissingEntry(String),
    #[error(transparent)]
    TypeGraph(#[from] TypeGraphError),
    /// The analysis passed in does not describe the program.
    #[error("Analysis does not match program: {0}")]
    StaleAnalysis(String),
    #[error("Generated model is inconsistent: {0}")]
    InvalidModel(#[from] ModelError),
}

impl From<AnalysisError> for TranslateError {
    fn from(err: AnalysisError) -> Self {
        match err {
            AnalysisError::MissingEntry(name) => TranslateError::MissingEntry(name),
            AnalysisError::TypeGraph(err) => TranslateError::TypeGraph(err),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Translation {
    pub model: Model,
    pub warnings: Vec<TranslationWarning>,
}

/// Analyze and translate in one step.
pub fn translate_program(
    program: &Program,
    saturation: u64,
    options: &TranslateOptions,
) -> Result<Translation, TranslateError> {
    let analysis = Analysis::run(program, saturation)?;
    translate(program, &analysis, options)
}

pub fn translate(
    program: &Program,
    analysis: &Analysis,
    options: &TranslateOptions,
) -> Result<Translation, TranslateError> {
    let entry = program
        .entry
        .ok_or_else(|| TranslateError::MissingEntry(program.name.clone()))?;
    if analysis.call_graph.entry() != entry {
        return Err(TranslateError::StaleAnalysis(format!(
            "analysis entry is function {}, program entry is {entry}",
            analysis.call_graph.entry()
        )));
    }
    if analysis.call_graph.graph().len() != program.funcs.len() {
        return Err(TranslateError::StaleAnalysis(format!(
            "analysis covers {} functions, program has {}",
            analysis.call_graph.graph().len(),
            program.funcs.len()
        )));
    }

    let layout = Layout::plan(program, analysis, options);
    let mut model = Model::new(program.name.clone());
    let mut warnings = Vec::new();

    resources::declare_core(&mut model.declarations, layout.func_stride);
    resources::declare_channels(&mut model, layout.channels);
    resources::declare_mutexes(&mut model, layout.mutexes);
    resources::declare_wait_groups(&mut model, layout.wait_groups);
    resources::declare_onces(&mut model.declarations, layout.onces);
    let fields = declare_pools(&layout, &mut model.declarations, &mut warnings);
    let frames = declare_frames(&layout, &mut model.declarations);

    // Globals needing storage or a computed initial value.
    let globals = Exprs {
        layout: &layout,
        frames: &frames,
        fields: &fields,
        func: None,
    };
    for v in program.globals() {
        let Some(Storage::Global(name)) = frames.storage(v.id) else {
            continue;
        };
        let r = repr(&layout, v.ty);
        if matches!(r, Repr::Composite(_) | Repr::Primitive(_)) {
            model
                .declarations
                .add_init(format!("{name} = {};", fresh_value(&layout, r)));
        }
        let Some(initial) = &v.initial else {
            continue;
        };
        match globals.value(initial) {
            Ok(rhs) => {
                let line = match r {
                    Repr::Composite(ty) if program.type_of(initial).is_some() => {
                        copy_call(&layout, ty, name, &rhs).unwrap_or_else(|| format!("{name} = {rhs}"))
                    }
                    _ => format!("{name} = {rhs}"),
                };
                model.declarations.add_init(format!("{line};"));
            }
            Err(err) => warnings.push(TranslationWarning::new(
                WarningCode::UnsupportedExpr,
                format!("initial value of '{}': {err}", v.name),
            )),
        }
    }

    let mut outputs = Vec::new();
    for (id, info) in layout.emitted() {
        let mut out = FuncTranslator::new(&layout, &frames, &fields, id).translate();
        warnings.append(&mut out.warnings);
        model.add_process(out.process.clone());
        for i in 0..info.bound {
            model.add_instance(ProcessInstance::new(
                queries::instance_name(info, i),
                info.name.clone(),
                vec![i.to_string()],
            ));
        }
        outputs.push((id, out));
    }
    queries::emit_queries(&layout, &outputs, &mut model);

    for w in &warnings {
        warn!(code = %w.code, function = ?w.function, "{}", w.message);
    }
    model.validate()?;
    info!(
        program = %program.name,
        processes = model.processes.len(),
        instances = model.instances.len(),
        queries = model.queries.len(),
        warnings = warnings.len(),
        "translation complete"
    );
    Ok(Translation { model, warnings })
}
