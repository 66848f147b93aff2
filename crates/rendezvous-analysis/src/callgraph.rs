//! Call-graph construction: static edges plus signature-matched dynamic
//! dispatch over a closed world.

use indexmap::IndexMap;
use rendezvous_ir::{Body, CallKind, CallStmt, Callee, FuncId, Program, Signature, Stmt};

/// Which call kinds contribute edges to a [`CallGraph`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CallKindMask {
    pub sync: bool,
    pub deferred: bool,
    pub spawned: bool,
}

impl CallKindMask {
    pub const ALL: Self = Self {
        sync: true,
        deferred: true,
        spawned: true,
    };

    /// Calls that run on the caller's stack and can therefore carry a panic
    /// back into it.
    pub const UNWINDING: Self = Self {
        sync: true,
        deferred: true,
        spawned: false,
    };

    pub fn contains(self, kind: CallKind) -> bool {
        match kind {
            CallKind::Sync => self.sync,
            CallKind::Deferred => self.deferred,
            CallKind::Async => self.spawned,
        }
    }
}

/// Candidate targets for each function signature.
///
/// Every function except the entry is a candidate for a dynamic call whose
/// signature matches its own, receiver included.
#[derive(Debug, Clone, Default)]
pub struct DispatchTable {
    entries: Vec<(Signature, Vec<FuncId>)>,
}

impl DispatchTable {
    pub fn build(program: &Program) -> Self {
        let mut table = Self::default();
        for func in &program.funcs {
            if Some(func.id) == program.entry {
                continue;
            }
            let sig = program.signature_of(func.id);
            match table
                .entries
                .iter_mut()
                .find(|(s, _)| program.signatures_equal(s, &sig))
            {
                Some((_, funcs)) => funcs.push(func.id),
                None => table.entries.push((sig, vec![func.id])),
            }
        }
        table
    }

    /// Functions a dynamic call with this signature may reach.
    pub fn candidates(&self, program: &Program, sig: &Signature) -> &[FuncId] {
        self.entries
            .iter()
            .find(|(s, _)| program.signatures_equal(s, sig))
            .map(|(_, funcs)| funcs.as_slice())
            .unwrap_or(&[])
    }

    /// Candidates of a call site; empty when the callee's signature is unknown.
    pub fn resolve(&self, program: &Program, call: &CallStmt) -> Vec<FuncId> {
        match &call.callee {
            Callee::Static(f) => vec![*f],
            Callee::Dynamic(value) => match program.func_signature_of(value) {
                Some(sig) => self.candidates(program, &sig).to_vec(),
                None => Vec::new(),
            },
        }
    }

    pub fn signatures(&self) -> impl Iterator<Item = &Signature> {
        self.entries.iter().map(|(s, _)| s)
    }
}

/// Visit every call statement in `body`, including the call guarded by a
/// `OnceDo`.
pub fn for_each_call<'a>(body: &'a Body, visit: &mut impl FnMut(&'a CallStmt)) {
    body.walk(&mut |stmt| match &stmt.node {
        Stmt::Call(call) | Stmt::OnceDo { call, .. } => visit(call),
        _ => {}
    });
}

/// Directed multigraph over functions for one [`CallKindMask`].
#[derive(Debug, Clone)]
pub struct CallGraph {
    mask: CallKindMask,
    /// Per caller: callee -> number of call sites.
    callees: Vec<IndexMap<FuncId, usize>>,
    callers: Vec<IndexMap<FuncId, usize>>,
    /// Signatures of the dynamic call sites in each function.
    dynamic_sites: Vec<Vec<Signature>>,
}

impl CallGraph {
    pub fn build(program: &Program, dispatch: &DispatchTable, mask: CallKindMask) -> Self {
        let n = program.funcs.len();
        let mut graph = Self {
            mask,
            callees: vec![IndexMap::new(); n],
            callers: vec![IndexMap::new(); n],
            dynamic_sites: vec![Vec::new(); n],
        };
        for func in &program.funcs {
            let mut sites = Vec::new();
            for_each_call(&func.body, &mut |call| {
                if !mask.contains(call.kind) {
                    return;
                }
                if let Callee::Dynamic(value) = &call.callee {
                    if let Some(sig) = program.func_signature_of(value) {
                        sites.push(sig);
                    }
                }
                for target in dispatch.resolve(program, call) {
                    sites_edge(&mut graph.callees, &mut graph.callers, func.id, target);
                }
            });
            graph.dynamic_sites[func.id] = sites;
        }
        graph
    }

    pub fn mask(&self) -> CallKindMask {
        self.mask
    }

    pub fn len(&self) -> usize {
        self.callees.len()
    }

    pub fn is_empty(&self) -> bool {
        self.callees.is_empty()
    }

    pub fn contains_edge(&self, caller: FuncId, callee: FuncId) -> bool {
        self.callees
            .get(caller)
            .is_some_and(|m| m.contains_key(&callee))
    }

    /// Number of call sites in `caller` that may reach `callee`.
    pub fn edge_count(&self, caller: FuncId, callee: FuncId) -> usize {
        self.callees
            .get(caller)
            .and_then(|m| m.get(&callee))
            .copied()
            .unwrap_or(0)
    }

    pub fn all_callees(&self, caller: FuncId) -> Vec<FuncId> {
        self.callees
            .get(caller)
            .map(|m| m.keys().copied().collect())
            .unwrap_or_default()
    }

    pub fn all_callers(&self, callee: FuncId) -> Vec<FuncId> {
        self.callers
            .get(callee)
            .map(|m| m.keys().copied().collect())
            .unwrap_or_default()
    }

    /// The `pos`-th distinct callee of `caller`, in discovery order.
    pub(crate) fn callee_at(&self, caller: FuncId, pos: usize) -> Option<FuncId> {
        self.callees[caller].get_index(pos).map(|(&f, _)| f)
    }

    /// Functions containing at least one dynamic call site with this
    /// signature.
    pub fn dynamic_callers(&self, program: &Program, sig: &Signature) -> Vec<FuncId> {
        self.dynamic_sites
            .iter()
            .enumerate()
            .filter(|(_, sites)| sites.iter().any(|s| program.signatures_equal(s, sig)))
            .map(|(f, _)| f)
            .collect()
    }
}

fn sites_edge(
    callees: &mut [IndexMap<FuncId, usize>],
    callers: &mut [IndexMap<FuncId, usize>],
    caller: FuncId,
    callee: FuncId,
) {
    *callees[caller].entry(callee).or_insert(0) += 1;
    *callers[callee].entry(caller).or_insert(0) += 1;
}

#[cfg(test)]
mod tests {
    use super::*;
    use rendezvous_ir::{ProgramBuilder, Value};

    #[test]
    fn dynamic_call_reaches_every_matching_signature() {
        let mut b = ProgramBuilder::new("dispatch");
        let main = b.func("main");
        let f1 = b.func("f1");
        let f2 = b.func("f2");
        let g = b.func("g");
        let int = b.int();
        b.param(g, "x", int);
        b.set_entry(main);
        let sig = b.program().signature_of(f1);
        let fty = b.func_type(sig.clone());
        let fv = b.local(main, "fv", fty);
        b.set_body(
            main,
            rendezvous_ir::Body::from_stmts(vec![
                Stmt::Assign {
                    target: Value::Var(fv),
                    value: Value::FuncRef(f1),
                },
                Stmt::Call(CallStmt::new(Callee::Dynamic(Value::Var(fv)), CallKind::Sync)),
            ]),
        );
        let program = b.build();
        let dispatch = DispatchTable::build(&program);
        assert_eq!(dispatch.candidates(&program, &sig), &[f1, f2]);

        let graph = CallGraph::build(&program, &dispatch, CallKindMask::ALL);
        assert!(graph.contains_edge(main, f1));
        assert!(graph.contains_edge(main, f2));
        assert!(!graph.contains_edge(main, g));
        assert_eq!(graph.all_callers(f2), vec![main]);
        assert_eq!(graph.dynamic_callers(&program, &sig), vec![main]);
    }

    #[test]
    fn mask_filters_spawned_calls() {
        let mut b = ProgramBuilder::new("mask");
        let main = b.func("main");
        let worker = b.func("worker");
        let cleanup = b.func("cleanup");
        b.set_entry(main);
        b.set_body(
            main,
            rendezvous_ir::Body::from_stmts(vec![
                Stmt::Call(CallStmt::spawn(worker)),
                Stmt::Call(CallStmt::deferred(cleanup)),
                Stmt::Call(CallStmt::deferred(cleanup)),
            ]),
        );
        let program = b.build();
        let dispatch = DispatchTable::build(&program);
        let all = CallGraph::build(&program, &dispatch, CallKindMask::ALL);
        let unwinding = CallGraph::build(&program, &dispatch, CallKindMask::UNWINDING);
        assert!(all.contains_edge(main, worker));
        assert!(!unwinding.contains_edge(main, worker));
        assert_eq!(unwinding.edge_count(main, cleanup), 2);
        assert_eq!(all.all_callees(main), vec![worker, cleanup]);
    }
}
