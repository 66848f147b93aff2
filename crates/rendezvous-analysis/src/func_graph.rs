//! Whole-program call multiplicities, resource counts and panic/recover
//! reachability.

use indexmap::IndexMap;
use rendezvous_ir::{FuncId, Program, Signature, Stmt, TypeId};
use tracing::debug;

use crate::callgraph::{CallGraph, CallKindMask, DispatchTable};
use crate::scc::Sccs;
use crate::tally::{sat_add, sat_mul, LocalCounter, SpecialOp, Tally};
use crate::AnalysisError;

/// The analyzed call graph of a program.
///
/// All counts saturate at the configured saturation constant and are zero
/// for functions unreachable from the entry.
#[derive(Debug, Clone)]
pub struct FuncCallGraph {
    saturation: u64,
    entry: FuncId,
    dispatch: DispatchTable,
    graph: CallGraph,
    sccs: Sccs,
    /// How many times each function body runs.
    executions: Vec<u64>,
    callee_counts: Vec<u64>,
    caller_counts: Vec<u64>,
    ops: Vec<IndexMap<SpecialOp, u64>>,
    allocs: Vec<IndexMap<TypeId, u64>>,
    globals: Tally,
    can_panic: Vec<bool>,
    can_recover: Vec<bool>,
}

impl FuncCallGraph {
    pub fn build(program: &Program, saturation: u64) -> Result<Self, AnalysisError> {
        let entry = program
            .entry
            .ok_or_else(|| AnalysisError::MissingEntry(program.name.clone()))?;
        let sat = saturation.max(1);
        let n = program.funcs.len();

        let dispatch = DispatchTable::build(program);
        let graph = CallGraph::build(program, &dispatch, CallKindMask::ALL);
        let sccs = Sccs::compute(&graph, entry);

        let counter = LocalCounter::new(program, &dispatch, sat);
        let local: Vec<Tally> = (0..n)
            .map(|f| {
                if sccs.scc_of(f) == 0 {
                    Tally::default()
                } else {
                    counter.func(f)
                }
            })
            .collect();

        let mut inbound = vec![0u64; n];
        let mut executions = vec![0u64; n];
        let mut callee_counts = vec![0u64; n];
        let entry_scc = sccs.scc_of(entry);

        for scc in sccs.callers_first() {
            let members = sccs.members(scc);
            if sccs.is_recursive(scc) {
                for &f in members {
                    executions[f] = sat;
                    callee_counts[f] = sat;
                }
            } else {
                for &f in members {
                    callee_counts[f] = inbound[f];
                    executions[f] = if scc == entry_scc {
                        sat_add(1, inbound[f], sat)
                    } else {
                        inbound[f]
                    };
                }
            }
            for &f in members {
                for (&callee, &k) in &local[f].calls {
                    if sccs.scc_of(callee) != scc {
                        let calls = sat_mul(k, executions[f], sat);
                        inbound[callee] = sat_add(inbound[callee], calls, sat);
                    }
                }
            }
        }

        let caller_counts = (0..n)
            .map(|f| sat_mul(local[f].total_calls(sat), executions[f], sat))
            .collect();
        let ops = (0..n)
            .map(|f| local[f].scaled(executions[f], sat).ops)
            .collect();
        let allocs = (0..n)
            .map(|f| local[f].scaled(executions[f], sat).allocs)
            .collect();

        let unwinding = CallGraph::build(program, &dispatch, CallKindMask::UNWINDING);
        let can_panic = propagate_flag(program, &unwinding, &sccs, |stmt| {
            matches!(stmt, Stmt::Return { panics: true, .. })
        });
        let can_recover = propagate_flag(program, &unwinding, &sccs, |stmt| {
            matches!(stmt, Stmt::Recover { .. })
        });

        for func in &program.funcs {
            debug!(
                func = %func.name,
                scc = sccs.scc_of(func.id),
                callee_count = callee_counts[func.id],
                "call multiplicity"
            );
        }

        Ok(Self {
            saturation: sat,
            entry,
            globals: counter.globals(),
            dispatch,
            graph,
            sccs,
            executions,
            callee_counts,
            caller_counts,
            ops,
            allocs,
            can_panic,
            can_recover,
        })
    }

    pub fn saturation(&self) -> u64 {
        self.saturation
    }

    pub fn entry(&self) -> FuncId {
        self.entry
    }

    pub fn graph(&self) -> &CallGraph {
        &self.graph
    }

    pub fn dispatch(&self) -> &DispatchTable {
        &self.dispatch
    }

    pub fn contains_edge(&self, caller: FuncId, callee: FuncId) -> bool {
        self.graph.contains_edge(caller, callee)
    }

    pub fn all_callees(&self, caller: FuncId) -> Vec<FuncId> {
        self.graph.all_callees(caller)
    }

    pub fn all_callers(&self, callee: FuncId) -> Vec<FuncId> {
        self.graph.all_callers(callee)
    }

    /// Closed candidate set for a dynamic call with this signature.
    pub fn dynamic_callees(&self, program: &Program, sig: &Signature) -> Vec<FuncId> {
        self.dispatch.candidates(program, sig).to_vec()
    }

    pub fn dynamic_callers(&self, program: &Program, sig: &Signature) -> Vec<FuncId> {
        self.graph.dynamic_callers(program, sig)
    }

    pub fn scc_of_func(&self, func: FuncId) -> usize {
        self.sccs.scc_of(func)
    }

    pub fn funcs_in_scc(&self, scc: usize) -> &[FuncId] {
        self.sccs.members(scc)
    }

    pub fn scc_count(&self) -> usize {
        self.sccs.count()
    }

    pub fn is_reachable(&self, func: FuncId) -> bool {
        self.sccs.scc_of(func) > 0
    }

    /// Number of times the body of `func` runs.
    pub fn executions(&self, func: FuncId) -> u64 {
        self.executions.get(func).copied().unwrap_or(0)
    }

    /// Total call executions made by `func`.
    pub fn caller_count(&self, func: FuncId) -> u64 {
        self.caller_counts.get(func).copied().unwrap_or(0)
    }

    /// Total invocations of `func`.
    pub fn callee_count(&self, func: FuncId) -> u64 {
        self.callee_counts.get(func).copied().unwrap_or(0)
    }

    pub fn special_op_count(&self, func: FuncId, op: SpecialOp) -> u64 {
        self.ops
            .get(func)
            .and_then(|m| m.get(&op))
            .copied()
            .unwrap_or(0)
    }

    /// Whole-program count, including storage declared at global scope.
    pub fn total_special_op_count(&self, op: SpecialOp) -> u64 {
        let sat = self.saturation;
        let global = self.globals.ops.get(&op).copied().unwrap_or(0);
        self.ops
            .iter()
            .filter_map(|m| m.get(&op))
            .fold(global, |acc, &n| sat_add(acc, n, sat))
    }

    pub fn type_allocations(&self, func: FuncId, ty: TypeId) -> u64 {
        self.allocs
            .get(func)
            .and_then(|m| m.get(&ty))
            .copied()
            .unwrap_or(0)
    }

    pub fn total_type_allocations(&self, ty: TypeId) -> u64 {
        let sat = self.saturation;
        let global = self.globals.allocs.get(&ty).copied().unwrap_or(0);
        self.allocs
            .iter()
            .filter_map(|m| m.get(&ty))
            .fold(global, |acc, &n| sat_add(acc, n, sat))
    }

    pub fn can_panic(&self, func: FuncId) -> bool {
        self.can_panic.get(func).copied().unwrap_or(false)
    }

    pub fn can_recover(&self, func: FuncId) -> bool {
        self.can_recover.get(func).copied().unwrap_or(false)
    }
}

/// Propagate a per-body property from callees to callers over `graph`, then
/// share it across every member of an SCC.
fn propagate_flag(
    program: &Program,
    graph: &CallGraph,
    sccs: &Sccs,
    seed: impl Fn(&Stmt) -> bool,
) -> Vec<bool> {
    let n = program.funcs.len();
    let mut flags: Vec<bool> = program
        .funcs
        .iter()
        .map(|f| {
            let mut hit = false;
            f.body.walk(&mut |stmt| hit |= seed(&stmt.node));
            hit
        })
        .collect();

    let mut changed = true;
    while changed {
        changed = false;
        for f in 0..n {
            if !flags[f] && graph.all_callees(f).iter().any(|&c| flags[c]) {
                flags[f] = true;
                changed = true;
            }
        }
    }

    for scc in 1..=sccs.count() {
        let members = sccs.members(scc);
        if members.iter().any(|&f| flags[f]) {
            for &f in members {
                flags[f] = true;
            }
        }
    }
    flags
}
