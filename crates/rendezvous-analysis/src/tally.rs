//! Per-function local multiplicities: how many calls, special operations
//! and type allocations one execution of a function body performs.

use std::fmt;

use indexmap::IndexMap;
use rendezvous_ir::{
    BasicType, Body, CallStmt, ContainerKind, FuncId, Program, SelectStmt, Stmt, SwitchStmt, Type,
    TypeId, TypeRef, Value,
};

use crate::callgraph::DispatchTable;

/// Resource-creating operations counted by the analyzer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SpecialOp {
    MakeChan,
    NewMutex,
    NewWaitGroup,
    NewOnce,
}

impl SpecialOp {
    pub const ALL: [SpecialOp; 4] = [
        SpecialOp::MakeChan,
        SpecialOp::NewMutex,
        SpecialOp::NewWaitGroup,
        SpecialOp::NewOnce,
    ];

    /// Operation that creates a value of this primitive kind, if any.
    pub fn creating(basic: &BasicType) -> Option<Self> {
        match basic {
            BasicType::Mutex => Some(SpecialOp::NewMutex),
            BasicType::WaitGroup => Some(SpecialOp::NewWaitGroup),
            BasicType::Once => Some(SpecialOp::NewOnce),
            _ => None,
        }
    }
}

impl fmt::Display for SpecialOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SpecialOp::MakeChan => write!(f, "make(chan)"),
            SpecialOp::NewMutex => write!(f, "mutex"),
            SpecialOp::NewWaitGroup => write!(f, "waitgroup"),
            SpecialOp::NewOnce => write!(f, "once"),
        }
    }
}

pub(crate) fn sat_add(a: u64, b: u64, sat: u64) -> u64 {
    a.saturating_add(b).min(sat)
}

pub(crate) fn sat_mul(a: u64, b: u64, sat: u64) -> u64 {
    a.saturating_mul(b).min(sat)
}

fn bump<K: std::hash::Hash + Eq>(map: &mut IndexMap<K, u64>, key: K, n: u64, sat: u64) {
    if n == 0 {
        return;
    }
    let slot = map.entry(key).or_insert(0);
    *slot = sat_add(*slot, n, sat);
}

fn scale_map<K: std::hash::Hash + Eq + Copy>(
    map: &IndexMap<K, u64>,
    factor: u64,
    sat: u64,
) -> IndexMap<K, u64> {
    if factor == 0 {
        return IndexMap::new();
    }
    map.iter()
        .filter(|&(_, &n)| n > 0)
        .map(|(&k, &n)| (k, sat_mul(n, factor, sat)))
        .collect()
}

/// Multiset of calls, operations and allocations.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Tally {
    pub calls: IndexMap<FuncId, u64>,
    pub ops: IndexMap<SpecialOp, u64>,
    pub allocs: IndexMap<TypeId, u64>,
}

impl Tally {
    pub fn is_empty(&self) -> bool {
        self.calls.is_empty() && self.ops.is_empty() && self.allocs.is_empty()
    }

    /// Sequential composition.
    pub fn add(&mut self, other: &Tally, sat: u64) {
        for (&k, &n) in &other.calls {
            bump(&mut self.calls, k, n, sat);
        }
        for (&k, &n) in &other.ops {
            bump(&mut self.ops, k, n, sat);
        }
        for (&k, &n) in &other.allocs {
            bump(&mut self.allocs, k, n, sat);
        }
    }

    /// Least upper bound of two mutually exclusive alternatives.
    pub fn merge(&mut self, other: &Tally) {
        fn join<K: std::hash::Hash + Eq + Copy>(a: &mut IndexMap<K, u64>, b: &IndexMap<K, u64>) {
            for (&k, &n) in b {
                let slot = a.entry(k).or_insert(0);
                *slot = (*slot).max(n);
            }
        }
        join(&mut self.calls, &other.calls);
        join(&mut self.ops, &other.ops);
        join(&mut self.allocs, &other.allocs);
    }

    pub fn scaled(&self, factor: u64, sat: u64) -> Tally {
        Tally {
            calls: scale_map(&self.calls, factor, sat),
            ops: scale_map(&self.ops, factor, sat),
            allocs: scale_map(&self.allocs, factor, sat),
        }
    }

    pub fn calls_to(&self, func: FuncId) -> u64 {
        self.calls.get(&func).copied().unwrap_or(0)
    }

    pub fn total_calls(&self, sat: u64) -> u64 {
        self.calls.values().fold(0, |acc, &n| sat_add(acc, n, sat))
    }
}

/// Computes [`Tally`]s for bodies of one program.
pub struct LocalCounter<'a> {
    program: &'a Program,
    dispatch: &'a DispatchTable,
    sat: u64,
}

impl<'a> LocalCounter<'a> {
    pub fn new(program: &'a Program, dispatch: &'a DispatchTable, sat: u64) -> Self {
        Self {
            program,
            dispatch,
            sat,
        }
    }

    /// One execution of `func`: its declared storage plus its body.
    pub fn func(&self, func: FuncId) -> Tally {
        let mut tally = Tally::default();
        for var in self.program.func_vars(func) {
            tally.add(&self.storage(self.program.var(var).ty), self.sat);
        }
        tally.add(&self.body(&self.program.func(func).body), self.sat);
        tally
    }

    /// Storage declared in the global scope, created once.
    pub fn globals(&self) -> Tally {
        let mut tally = Tally::default();
        for var in self.program.globals() {
            tally.add(&self.storage(var.ty), self.sat);
        }
        tally
    }

    /// Primitives and value-embedded composites created when storage of
    /// type `ty` comes into existence.
    pub fn storage(&self, ty: TypeRef) -> Tally {
        let mut tally = Tally::default();
        if ty.pointer {
            return tally;
        }
        match self.program.ty(ty.id) {
            Type::Basic(basic) => {
                if let Some(op) = SpecialOp::creating(basic) {
                    bump(&mut tally.ops, op, 1, self.sat);
                }
            }
            Type::Struct(s) => {
                bump(&mut tally.allocs, ty.id, 1, self.sat);
                for field in &s.fields {
                    tally.add(&self.storage(field.ty), self.sat);
                }
            }
            Type::Container(c) if c.kind == ContainerKind::Array => {
                bump(&mut tally.allocs, ty.id, 1, self.sat);
                let len = c.len.unwrap_or(self.sat);
                tally.add(&self.storage(c.elem).scaled(len, self.sat), self.sat);
            }
            Type::Container(_) => {}
        }
        tally
    }

    pub fn body(&self, body: &Body) -> Tally {
        let mut tally = Tally::default();
        for stmt in &body.stmts {
            tally.add(&self.stmt(&stmt.node), self.sat);
        }
        tally
    }

    fn call(&self, call: &CallStmt) -> Tally {
        let mut tally = Tally::default();
        for target in self.dispatch.resolve(self.program, call) {
            let mut one = Tally::default();
            bump(&mut one.calls, target, 1, self.sat);
            tally.merge(&one);
        }
        tally
    }

    fn select(&self, sel: &SelectStmt) -> Tally {
        let mut tally = Tally::default();
        for case in &sel.cases {
            tally.merge(&self.body(&case.body));
        }
        if let Some(default) = &sel.default {
            tally.merge(&self.body(default));
        }
        tally
    }

    fn switch(&self, sw: &SwitchStmt) -> Tally {
        // A case that falls through also runs everything the next case runs.
        let mut chained: Vec<Tally> = Vec::with_capacity(sw.cases.len());
        for (i, case) in sw.cases.iter().enumerate().rev() {
            let mut tally = self.body(&case.body);
            if case.fallthrough && i + 1 < sw.cases.len() {
                if let Some(next) = chained.last() {
                    tally.add(next, self.sat);
                }
            }
            chained.push(tally);
        }
        let mut out = Tally::default();
        for tally in &chained {
            out.merge(tally);
        }
        out
    }

    fn make_container(&self, ty: TypeId, len: Option<&Value>) -> Tally {
        let mut tally = Tally::default();
        let Some(c) = self.program.ty(ty).as_container() else {
            return tally;
        };
        bump(&mut tally.allocs, ty, 1, self.sat);
        let count = match (c.len, len) {
            (Some(n), _) => n,
            (None, Some(Value::Int(n))) => u64::try_from(*n).unwrap_or(0),
            _ => self.sat,
        };
        tally.add(&self.storage(c.elem).scaled(count, self.sat), self.sat);
        tally
    }

    fn range_factor(&self, container: &Value) -> u64 {
        self.program
            .type_of(container)
            .filter(|t| !t.pointer)
            .and_then(|t| self.program.ty(t.id).as_container())
            .filter(|c| c.kind == ContainerKind::Array)
            .and_then(|c| c.len)
            .unwrap_or(self.sat)
    }

    fn stmt(&self, stmt: &Stmt) -> Tally {
        match stmt {
            Stmt::MakeChan { .. } => {
                let mut tally = Tally::default();
                bump(&mut tally.ops, SpecialOp::MakeChan, 1, self.sat);
                tally
            }
            Stmt::MakeStruct { ty, .. } => self.storage(TypeRef::value(*ty)),
            Stmt::MakeContainer { ty, len, .. } => self.make_container(*ty, len.as_ref()),
            Stmt::Call(call) | Stmt::OnceDo { call, .. } => self.call(call),
            Stmt::If {
                then_body,
                else_body,
                ..
            } => {
                let mut tally = self.body(then_body);
                if let Some(else_body) = else_body {
                    tally.merge(&self.body(else_body));
                }
                tally
            }
            Stmt::Switch(sw) => self.switch(sw),
            Stmt::Select(sel) => self.select(sel),
            Stmt::For(f) => {
                let mut inner = self.body(&f.body);
                if let Some(post) = &f.post {
                    inner.add(&self.body(post), self.sat);
                }
                inner.scaled(f.max_iterations.unwrap_or(self.sat), self.sat)
            }
            Stmt::ChanRange { body, .. } => self.body(body).scaled(self.sat, self.sat),
            Stmt::ContainerRange {
                container, body, ..
            } => self
                .body(body)
                .scaled(self.range_factor(container), self.sat),
            Stmt::Assign { .. }
            | Stmt::ChanOp(_)
            | Stmt::CloseChan { .. }
            | Stmt::Return { .. }
            | Stmt::Recover { .. }
            | Stmt::Branch { .. }
            | Stmt::MutexOp { .. }
            | Stmt::WaitGroupOp { .. } => Tally::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rendezvous_ir::{ForStmt, ProgramBuilder, StructField};

    #[test]
    fn add_saturates_and_merge_takes_max() {
        let mut a = Tally::default();
        a.calls.insert(1, 3);
        let mut b = Tally::default();
        b.calls.insert(1, 9);
        b.calls.insert(2, 1);

        let mut sum = a.clone();
        sum.add(&b, 10);
        assert_eq!(sum.calls_to(1), 10);

        let mut lub = a.clone();
        lub.merge(&b);
        assert_eq!(lub.calls_to(1), 9);
        assert_eq!(lub.calls_to(2), 1);

        assert_eq!(a.scaled(1000, 50).calls_to(1), 50);
        assert!(a.scaled(0, 50).is_empty());
    }

    #[test]
    fn loops_and_branches_fold_as_expected() {
        let mut b = ProgramBuilder::new("fold");
        let main = b.func("main");
        let f = b.func("f");
        let g = b.func("g");
        b.set_entry(main);
        let bounded = Stmt::For(ForStmt {
            cond: None,
            post: None,
            body: Body::from_stmts(vec![Stmt::Call(CallStmt::sync(f))]),
            min_iterations: Some(3),
            max_iterations: Some(3),
            label: None,
        });
        let branch = Stmt::If {
            cond: Value::Bool(true),
            then_body: Body::from_stmts(vec![
                Stmt::Call(CallStmt::sync(g)),
                Stmt::Call(CallStmt::sync(g)),
            ]),
            else_body: Some(Body::from_stmts(vec![Stmt::Call(CallStmt::sync(g))])),
        };
        b.set_body(main, Body::from_stmts(vec![bounded, branch]));
        let program = b.build();
        let dispatch = DispatchTable::build(&program);
        let counter = LocalCounter::new(&program, &dispatch, 1000);
        let tally = counter.func(main);
        assert_eq!(tally.calls_to(f), 3);
        assert_eq!(tally.calls_to(g), 2);
    }

    #[test]
    fn array_of_structs_counts_embedded_primitives() {
        let mut b = ProgramBuilder::new("storage");
        let main = b.func("main");
        b.set_entry(main);
        let mutex = b.mutex();
        let int = b.int();
        let guarded = b.struct_type(
            "Guarded",
            vec![
                StructField {
                    name: "mu".into(),
                    ty: mutex,
                    embedded: false,
                },
                StructField {
                    name: "n".into(),
                    ty: int,
                    embedded: false,
                },
            ],
        );
        let arr = b.array(TypeRef::value(guarded), 4);
        b.local(main, "xs", TypeRef::value(arr));
        b.local(main, "p", TypeRef::pointer(guarded));
        let program = b.build();
        let dispatch = DispatchTable::build(&program);
        let counter = LocalCounter::new(&program, &dispatch, 1000);
        let tally = counter.func(main);
        assert_eq!(tally.allocs.get(&arr), Some(&1));
        assert_eq!(tally.allocs.get(&guarded), Some(&4));
        assert_eq!(tally.ops.get(&SpecialOp::NewMutex), Some(&4));
    }
}
