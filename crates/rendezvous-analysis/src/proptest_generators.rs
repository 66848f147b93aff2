//! Proptest strategies for generating call-graph-shaped programs.

use proptest::prelude::*;

use rendezvous_ir::{Body, CallKind, CallStmt, Callee, Program, ProgramBuilder, Stmt};

pub fn arb_call_kind() -> impl Strategy<Value = CallKind> {
    prop_oneof![
        Just(CallKind::Sync),
        Just(CallKind::Deferred),
        Just(CallKind::Async),
    ]
}

/// Build a program of `n` parameterless functions `f0..f{n-1}` (entry
/// `f0`) whose bodies make the given calls, in order.
pub fn build_call_program(n: usize, edges: &[(usize, usize, CallKind)]) -> Program {
    let mut b = ProgramBuilder::new("generated");
    let funcs: Vec<_> = (0..n).map(|i| b.func(format!("f{i}"))).collect();
    if let Some(&entry) = funcs.first() {
        b.set_entry(entry);
    }
    let mut bodies: Vec<Vec<Stmt>> = vec![Vec::new(); n];
    for &(caller, callee, kind) in edges {
        if caller < n && callee < n {
            bodies[caller].push(Stmt::Call(CallStmt::new(
                Callee::Static(funcs[callee]),
                kind,
            )));
        }
    }
    for (f, stmts) in funcs.iter().zip(bodies) {
        b.set_body(*f, Body::from_stmts(stmts));
    }
    b.build()
}

/// A program with 1–8 functions and up to three call sites per function.
pub fn arb_call_program() -> impl Strategy<Value = Program> {
    (1..=8usize)
        .prop_flat_map(|n| {
            let edges = proptest::collection::vec((0..n, 0..n, arb_call_kind()), 0..=n * 3);
            (Just(n), edges)
        })
        .prop_map(|(n, edges)| build_call_program(n, &edges))
}

/// `f0 -> f1 -> ... -> f{depth} -> f1`: one recursive cycle of `depth`
/// functions below the entry.
pub fn arb_recursive_chain() -> impl Strategy<Value = (Program, usize)> {
    (1..=40usize).prop_map(|depth| {
        let mut edges: Vec<_> = (0..depth).map(|i| (i, i + 1, CallKind::Sync)).collect();
        edges.push((depth, 1, CallKind::Sync));
        (build_call_program(depth + 1, &edges), depth)
    })
}
