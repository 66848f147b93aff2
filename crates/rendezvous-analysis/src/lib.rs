//! Static analysis over the rendezvous IR.
//!
//! [`FuncCallGraph`] builds the call graph (static edges plus closed-world
//! dynamic dispatch), numbers its strongly connected components and
//! propagates saturating call, resource and allocation counts from the
//! entry function. [`TypeGraph`] orders composite types for declaration.
//! Both are bundled in [`Analysis`] and memoized by [`AnalysisCache`].

pub mod cache;
pub mod callgraph;
pub mod func_graph;
#[cfg(any(test, feature = "proptest"))]
pub mod proptest_generators;
pub mod scc;
pub mod tally;
pub mod type_graph;

pub use cache::AnalysisCache;
pub use callgraph::{CallGraph, CallKindMask, DispatchTable};
pub use func_graph::FuncCallGraph;
pub use tally::{SpecialOp, Tally};
pub use type_graph::{type_name, TypeGraph, TypeGraphError};

use rendezvous_ir::Program;
use thiserror::Error;
use tracing::info;

/// Saturation constant used when none is configured.
pub const DEFAULT_SATURATION: u64 = 1000;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AnalysisError {
    #[error("Program '{0}' has no entry function")]
    MissingEntry(String),
    #[error(transparent)]
    TypeGraph(#[from] TypeGraphError),
}

/// Everything the translator needs to know about a program.
#[derive(Debug, Clone)]
pub struct Analysis {
    pub call_graph: FuncCallGraph,
    pub type_graph: TypeGraph,
}

impl Analysis {
    /// Run the type graph first: storage counting walks value-embedded
    /// fields and would not terminate on a cyclic type.
    pub fn run(program: &Program, saturation: u64) -> Result<Self, AnalysisError> {
        let type_graph = TypeGraph::build(program)?;
        let call_graph = FuncCallGraph::build(program, saturation)?;
        info!(
            program = %program.name,
            funcs = program.funcs.len(),
            sccs = call_graph.scc_count(),
            "analysis complete"
        );
        Ok(Self {
            call_graph,
            type_graph,
        })
    }
}
