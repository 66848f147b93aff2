//! Strongly connected components (Tarjan) of the call graph reachable from
//! the entry function.

use rendezvous_ir::FuncId;

use crate::callgraph::CallGraph;

/// SCC numbering of a call graph.
///
/// Components are numbered from 1 in the order Tarjan's algorithm emits
/// them, which is reverse-topological: a component's callees always carry
/// smaller ids. Functions unreachable from the entry have id 0.
#[derive(Debug, Clone, Default)]
pub struct Sccs {
    scc_of: Vec<usize>,
    /// Indexed by SCC id; slot 0 is always empty.
    members: Vec<Vec<FuncId>>,
    recursive: Vec<bool>,
}

impl Sccs {
    pub fn compute(graph: &CallGraph, entry: FuncId) -> Self {
        let n = graph.len();
        let mut sccs = Self {
            scc_of: vec![0; n],
            members: vec![Vec::new()],
            recursive: vec![false],
        };
        if entry >= n {
            return sccs;
        }

        let mut index: Vec<Option<usize>> = vec![None; n];
        let mut low = vec![0usize; n];
        let mut on_stack = vec![false; n];
        let mut stack: Vec<FuncId> = Vec::new();
        let mut next_index = 0usize;
        // (node, position of the next callee to examine)
        let mut work: Vec<(FuncId, usize)> = Vec::new();

        index[entry] = Some(next_index);
        low[entry] = next_index;
        next_index += 1;
        stack.push(entry);
        on_stack[entry] = true;
        work.push((entry, 0));

        while let Some(&(v, pos)) = work.last() {
            if let Some(w) = graph.callee_at(v, pos) {
                if let Some(top) = work.last_mut() {
                    top.1 += 1;
                }
                match index[w] {
                    None => {
                        index[w] = Some(next_index);
                        low[w] = next_index;
                        next_index += 1;
                        stack.push(w);
                        on_stack[w] = true;
                        work.push((w, 0));
                    }
                    Some(iw) if on_stack[w] => low[v] = low[v].min(iw),
                    Some(_) => {}
                }
                continue;
            }

            work.pop();
            if let Some(&(parent, _)) = work.last() {
                low[parent] = low[parent].min(low[v]);
            }
            if Some(low[v]) == index[v] {
                let id = sccs.members.len();
                let mut component = Vec::new();
                while let Some(w) = stack.pop() {
                    on_stack[w] = false;
                    sccs.scc_of[w] = id;
                    component.push(w);
                    if w == v {
                        break;
                    }
                }
                component.sort_unstable();
                let recursive = component.len() > 1 || graph.contains_edge(v, v);
                sccs.members.push(component);
                sccs.recursive.push(recursive);
            }
        }
        sccs
    }

    /// SCC id of `func`; 0 when unreachable from the entry.
    pub fn scc_of(&self, func: FuncId) -> usize {
        self.scc_of.get(func).copied().unwrap_or(0)
    }

    pub fn members(&self, scc: usize) -> &[FuncId] {
        self.members.get(scc).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Number of SCCs reachable from the entry.
    pub fn count(&self) -> usize {
        self.members.len() - 1
    }

    /// More than one member, or a single member calling itself.
    pub fn is_recursive(&self, scc: usize) -> bool {
        self.recursive.get(scc).copied().unwrap_or(false)
    }

    /// SCC ids ordered so that every caller component precedes its callees.
    pub fn callers_first(&self) -> impl Iterator<Item = usize> {
        (1..self.members.len()).rev()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::callgraph::{CallKindMask, DispatchTable};
    use rendezvous_ir::{Body, CallStmt, ProgramBuilder, Stmt};

    fn calls(targets: &[FuncId]) -> Body {
        Body::from_stmts(
            targets
                .iter()
                .map(|&f| Stmt::Call(CallStmt::sync(f)))
                .collect(),
        )
    }

    #[test]
    fn numbering_is_reverse_topological() {
        // main -> a -> b -> a, a -> c, d unreachable
        let mut b = ProgramBuilder::new("scc");
        let main = b.func("main");
        let fa = b.func("a");
        let fb = b.func("b");
        let fc = b.func("c");
        let fd = b.func("d");
        b.set_entry(main);
        b.set_body(main, calls(&[fa]));
        b.set_body(fa, calls(&[fb, fc]));
        b.set_body(fb, calls(&[fa]));
        b.set_body(fd, calls(&[main]));
        let program = b.build();
        let dispatch = DispatchTable::build(&program);
        let graph = CallGraph::build(&program, &dispatch, CallKindMask::ALL);
        let sccs = Sccs::compute(&graph, main);

        assert_eq!(sccs.count(), 3);
        assert_eq!(sccs.scc_of(fd), 0);
        assert_eq!(sccs.scc_of(fa), sccs.scc_of(fb));
        assert!(sccs.scc_of(fc) < sccs.scc_of(fa));
        assert!(sccs.scc_of(fa) < sccs.scc_of(main));
        assert!(sccs.is_recursive(sccs.scc_of(fa)));
        assert!(!sccs.is_recursive(sccs.scc_of(fc)));
        assert_eq!(sccs.members(sccs.scc_of(fa)), &[fa, fb]);
        assert_eq!(sccs.callers_first().next(), Some(sccs.scc_of(main)));
    }

    #[test]
    fn self_call_is_recursive() {
        let mut b = ProgramBuilder::new("selfrec");
        let main = b.func("main");
        let f = b.func("f");
        b.set_entry(main);
        b.set_body(main, calls(&[f]));
        b.set_body(f, calls(&[f]));
        let program = b.build();
        let dispatch = DispatchTable::build(&program);
        let graph = CallGraph::build(&program, &dispatch, CallKindMask::ALL);
        let sccs = Sccs::compute(&graph, main);
        assert!(sccs.is_recursive(sccs.scc_of(f)));
        assert!(!sccs.is_recursive(sccs.scc_of(main)));
    }
}
