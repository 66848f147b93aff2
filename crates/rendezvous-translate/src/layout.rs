//! Whole-program translation plan: which functions become processes, how
//! many instances each gets, and how large every resource pool is.

use indexmap::{IndexMap, IndexSet};
use rendezvous_analysis::{callgraph::for_each_call, Analysis, SpecialOp};
use rendezvous_ir::{
    BasicType, CallKind, ContainerKind, FuncId, Program, Stmt, Type, TypeId, TypeRef,
};
use tracing::debug;

use crate::names::{sanitize, Namer};
use crate::options::TranslateOptions;

#[derive(Debug, Clone)]
pub(crate) struct FuncInfo {
    /// Process template name, also the prefix of every per-function global.
    pub name: String,
    /// Called at least once or the entry. Only these become processes,
    /// whatever `eliminate_unused` says; that switch trims pools.
    pub emitted: bool,
    /// Number of instances.
    pub bound: usize,
    pub is_entry: bool,
    pub can_panic: bool,
    /// Some `recover` is reachable from this function.
    pub recovers: bool,
    /// Some async call may start this function.
    pub spawned: bool,
    /// Slots of the per-instance defer list; zero when nothing is deferred.
    pub defer_slots: usize,
    /// Functions this one may defer, in first-seen order.
    pub deferred_targets: Vec<FuncId>,
    /// Closures capture through `<name>_parent`.
    pub has_parent: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct PoolInfo {
    pub name: String,
    pub size: usize,
    /// Element slots per instance, containers only.
    pub capacity: usize,
}

pub(crate) struct Layout<'a> {
    pub program: &'a Program,
    pub analysis: &'a Analysis,
    pub options: &'a TranslateOptions,
    pub funcs: Vec<FuncInfo>,
    pub func_stride: usize,
    pub channels: usize,
    pub mutexes: usize,
    pub wait_groups: usize,
    pub onces: usize,
    /// Composite-type pools in declaration order.
    pub pools: IndexMap<TypeId, PoolInfo>,
}

impl<'a> Layout<'a> {
    pub fn plan(program: &'a Program, analysis: &'a Analysis, options: &'a TranslateOptions) -> Self {
        let graph = &analysis.call_graph;
        let limits = &options.limits;
        let entry = graph.entry();

        let mut namer = Namer::with_reserved(["Channel", "Mutex", "WaitGroup"]);
        let mut funcs: Vec<FuncInfo> = program
            .funcs
            .iter()
            .map(|f| {
                let is_entry = f.id == entry;
                let callees = graph.callee_count(f.id);
                let emitted = is_entry || callees > 0;
                let capped = usize::try_from(callees)
                    .unwrap_or(usize::MAX)
                    .min(limits.max_processes);
                let bound = match (is_entry, emitted) {
                    (true, _) => 1 + capped,
                    (false, true) => capped.max(1),
                    (false, false) => 1,
                };
                debug!(func = %f.name, emitted, bound, "planned function");
                FuncInfo {
                    name: namer.fresh(&sanitize(&f.name)),
                    emitted,
                    bound,
                    is_entry,
                    can_panic: graph.can_panic(f.id),
                    recovers: graph.can_recover(f.id),
                    spawned: false,
                    defer_slots: 0,
                    deferred_targets: Vec::new(),
                    has_parent: f.enclosing.is_some(),
                }
            })
            .collect();

        let dispatch = graph.dispatch();
        for f in &program.funcs {
            if !funcs[f.id].emitted {
                continue;
            }
            let mut spawned = Vec::new();
            let mut deferred = Vec::new();
            let mut deferred_sites = 0usize;
            for_each_call(&f.body, &mut |call| {
                let targets = dispatch.resolve(program, call);
                match call.kind {
                    CallKind::Async => spawned.extend(targets),
                    CallKind::Deferred => {
                        deferred_sites += 1;
                        for t in targets {
                            if !deferred.contains(&t) {
                                deferred.push(t);
                            }
                        }
                    }
                    CallKind::Sync => {}
                }
            });
            for t in spawned {
                funcs[t].spawned = true;
            }
            if deferred_sites > 0 {
                let slots = if defers_in_loop(&f.body) {
                    limits.max_defers
                } else {
                    deferred_sites.min(limits.max_defers)
                };
                funcs[f.id].defer_slots = slots.max(1);
                funcs[f.id].deferred_targets = deferred;
            }
        }

        let func_stride = funcs.iter().map(|f| f.bound).max().unwrap_or(1) + 1;

        let referenced = referenced_types(program, &funcs);
        let uses = |basic: BasicType| {
            program
                .basic_type_id(&basic)
                .is_some_and(|id| referenced.contains(&id))
        };
        let pool = |op: SpecialOp, max: usize, used: bool| -> usize {
            if !options.eliminate_unused {
                return max;
            }
            let counted = usize::try_from(graph.total_special_op_count(op)).unwrap_or(usize::MAX);
            let size = counted.min(max);
            if size == 0 && used {
                1
            } else {
                size
            }
        };
        let channels = pool(SpecialOp::MakeChan, limits.max_channels, uses(BasicType::Chan));
        let mutexes = pool(SpecialOp::NewMutex, limits.max_mutexes, uses(BasicType::Mutex));
        let wait_groups = pool(
            SpecialOp::NewWaitGroup,
            limits.max_wait_groups,
            uses(BasicType::WaitGroup),
        );
        let onces = pool(SpecialOp::NewOnce, limits.max_onces, uses(BasicType::Once));

        let mut pools = IndexMap::new();
        for ty in analysis.type_graph.composites(program) {
            let used = referenced.contains(&ty);
            if options.eliminate_unused && !used {
                continue;
            }
            let (max, capacity, base) = match &program.types[ty] {
                Type::Struct(s) => (limits.max_structs, 0, sanitize(&s.name)),
                Type::Container(c) => {
                    let capacity = match c.kind {
                        ContainerKind::Array => usize::try_from(c.len.unwrap_or(0))
                            .unwrap_or(usize::MAX)
                            .min(limits.container_capacity),
                        _ => limits.container_capacity,
                    };
                    (limits.max_containers, capacity.max(1), format!("{}{ty}", c.kind))
                }
                Type::Basic(_) => continue,
            };
            let size = if options.eliminate_unused {
                let counted = usize::try_from(graph.total_type_allocations(ty)).unwrap_or(usize::MAX);
                counted.min(max).max(1)
            } else {
                max
            };
            pools.insert(
                ty,
                PoolInfo {
                    name: namer.fresh(&base),
                    size,
                    capacity,
                },
            );
        }

        Self {
            program,
            analysis,
            options,
            funcs,
            func_stride,
            channels,
            mutexes,
            wait_groups,
            onces,
            pools,
        }
    }

    pub fn func(&self, id: FuncId) -> &FuncInfo {
        &self.funcs[id]
    }

    pub fn emitted(&self) -> impl Iterator<Item = (FuncId, &FuncInfo)> {
        self.funcs.iter().enumerate().filter(|(_, f)| f.emitted)
    }

    pub fn pool(&self, ty: TypeId) -> Option<&PoolInfo> {
        self.pools.get(&ty)
    }

    pub fn basic(&self, ty: TypeRef) -> Option<&BasicType> {
        if ty.pointer {
            return None;
        }
        self.program.types[ty.id].as_basic()
    }
}

fn defers_in_loop(body: &rendezvous_ir::Body) -> bool {
    let mut found = false;
    body.walk(&mut |stmt| {
        let loop_body = match &stmt.node {
            Stmt::For(f) => Some(&f.body),
            Stmt::ChanRange { body, .. } | Stmt::ContainerRange { body, .. } => Some(body),
            _ => None,
        };
        if let Some(inner) = loop_body {
            found |= inner.count_deferred() > 0;
        }
    });
    found
}

/// Types whose storage the emitted code may touch, closed over struct fields
/// and container elements.
fn referenced_types(program: &Program, funcs: &[FuncInfo]) -> IndexSet<TypeId> {
    let mut work: Vec<TypeId> = program.globals().map(|v| v.ty.id).collect();
    for f in &program.funcs {
        if !funcs[f.id].emitted {
            continue;
        }
        work.extend(program.func_vars(f.id).into_iter().map(|v| program.var(v).ty.id));
        f.body.walk(&mut |stmt| match &stmt.node {
            Stmt::MakeStruct { ty, .. } | Stmt::MakeContainer { ty, .. } => work.push(*ty),
            _ => {}
        });
    }
    let mut seen = IndexSet::new();
    while let Some(ty) = work.pop() {
        if !seen.insert(ty) {
            continue;
        }
        match &program.types[ty] {
            Type::Struct(s) => work.extend(s.fields.iter().map(|f| f.ty.id)),
            Type::Container(c) => work.push(c.elem.id),
            Type::Basic(_) => {}
        }
    }
    seen
}
