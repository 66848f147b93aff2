//! Per-function global storage: instance allocation, start/done events,
//! argument and result slots, captured variables, panic flags and defer
//! lists. All of it is indexed by instance id.

use rendezvous_automata::{Declarations, FuncDecl, VarDecl};
use rendezvous_ir::{FuncId, VarId};

use crate::layout::Layout;
use crate::names::{sanitize, Namer};
use crate::pools::{repr, Repr};
use crate::resources::{counted_alloc, OUT_OF_RESOURCES};

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Storage {
    /// Program-level variable.
    Global(String),
    /// Variable private to one process instance.
    Local(String),
    /// Variable shared with nested functions, stored in a global array
    /// indexed by the owning instance.
    Captured { owner: FuncId, array: String },
}

#[derive(Debug, Clone, Default)]
pub(crate) struct Frames {
    /// Indexed by `VarId`; `None` for variables of functions that are not
    /// emitted.
    pub storage: Vec<Option<Storage>>,
    /// Argument arrays per function, receiver first.
    pub args: Vec<Vec<String>>,
    pub results: Vec<Vec<String>>,
    /// Identifier allocator per function, seeded with every global name.
    pub namers: Vec<Namer>,
}

impl Frames {
    pub fn storage(&self, var: VarId) -> Option<&Storage> {
        self.storage.get(var).and_then(Option::as_ref)
    }
}

/// Parameters bound by callers, receiver first.
pub(crate) fn bound_params(layout: &Layout<'_>, func: FuncId) -> Vec<VarId> {
    let f = layout.program.func(func);
    f.receiver.iter().chain(&f.params).copied().collect()
}

pub(crate) fn declare_frames(layout: &Layout<'_>, decls: &mut Declarations) -> Frames {
    let program = layout.program;
    let mut frames = Frames {
        storage: vec![None; program.variables.len()],
        args: vec![Vec::new(); program.funcs.len()],
        results: vec![Vec::new(); program.funcs.len()],
        namers: Vec::new(),
    };

    for (id, info) in layout.emitted() {
        let n = &info.name;
        let max = format!("{n}_MAX");
        decls.add_var(VarDecl::constant(&max, info.bound as i64));
        let preallocated = if info.is_entry { "1" } else { "0" };
        decls.add_var(VarDecl::int(format!("{n}_count")).with_init(preallocated));
        decls.add_func(counted_alloc(
            &format!("alloc_{n}"),
            &max,
            &format!("{n}_count"),
            &[],
            Vec::new(),
        ));
        decls.add_var(VarDecl::chan(format!("{n}_start")).array(&max));
        decls.add_var(VarDecl::chan(format!("{n}_done")).array(&max));
        if info.spawned {
            decls.add_var(VarDecl::bool(format!("{n}_async")).array(&max));
        }
        if info.has_parent {
            decls.add_var(VarDecl::int(format!("{n}_parent")).array(&max));
        }

        for (i, var) in bound_params(layout, id).into_iter().enumerate() {
            let name = format!("{n}_arg_{i}");
            decls.add_var(repr(layout, program.var(var).ty).decl(&name).array(&max));
            frames.args[id].push(name);
        }
        for (i, &var) in program.func(id).results.iter().enumerate() {
            let name = format!("{n}_res_{i}");
            decls.add_var(repr(layout, program.var(var).ty).decl(&name).array(&max));
            frames.results[id].push(name);
        }

        if info.can_panic {
            decls.add_var(VarDecl::bool(format!("{n}_panicking")).array(&max));
        }
        if info.recovers {
            decls.add_var(VarDecl::bool(format!("{n}_defer_panic")).array(&max));
        }
        if info.defer_slots > 0 {
            let slots = format!("{n}_DEFERS");
            decls.add_var(VarDecl::constant(&slots, info.defer_slots as i64));
            decls.add_var(VarDecl::int(format!("{n}_defer_fid")).array(&max).array(&slots));
            decls.add_var(VarDecl::int(format!("{n}_defer_inst")).array(&max).array(&slots));
            decls.add_var(VarDecl::int(format!("{n}_defer_len")).array(&max));
            decls.add_func(
                FuncDecl::new(format!("{n}_push_defer"), "void")
                    .param("int", "pid")
                    .param("int", "fid")
                    .param("int", "inst")
                    .line(format!("if ({n}_defer_len[pid] >= {slots}) {{"))
                    .line(format!("    {OUT_OF_RESOURCES} = true;"))
                    .line("    return;")
                    .line("}")
                    .line(format!("{n}_defer_fid[pid][{n}_defer_len[pid]] = fid;"))
                    .line(format!("{n}_defer_inst[pid][{n}_defer_len[pid]] = inst;"))
                    .line(format!("{n}_defer_len[pid]++;")),
            );
        }

        let mut captured = Namer::default();
        for var in program.func_vars(id) {
            let v = program.var(var);
            if !v.captured {
                continue;
            }
            let array = format!("{n}_cap_{}", captured.fresh(&sanitize(&v.name)));
            decls.add_var(repr(layout, v.ty).decl(&array).array(&max));
            frames.storage[var] = Some(Storage::Captured { owner: id, array });
        }
    }

    let mut globals = global_namer(layout, decls);
    for v in program.globals() {
        let name = globals.fresh(&sanitize(&v.name));
        let r = repr(layout, v.ty);
        decls.add_var(r.decl(&name).with_init(zero(r)));
        frames.storage[v.id] = Some(Storage::Global(name));
    }

    let reserved = global_namer(layout, decls);
    frames.namers = vec![Namer::default(); program.funcs.len()];
    for (id, _) in layout.emitted() {
        let mut namer = reserved.clone();
        namer.reserve("pid");
        namer.reserve("callee_inst");
        for var in program.func_vars(id) {
            if frames.storage[var].is_none() {
                let name = namer.fresh(&sanitize(&program.var(var).name));
                frames.storage[var] = Some(Storage::Local(name));
            }
        }
        frames.namers[id] = namer;
    }
    frames
}

/// Initial value of a scalar declaration. Owned slots are filled in when
/// the owner starts.
pub(crate) fn zero(r: Repr) -> &'static str {
    match r {
        Repr::Bool => "false",
        Repr::Int => "0",
        Repr::Handle | Repr::Primitive(_) | Repr::Composite(_) => "-1",
    }
}

fn global_namer(layout: &Layout<'_>, decls: &Declarations) -> Namer {
    let mut namer = Namer::with_reserved(
        decls
            .vars
            .iter()
            .map(|v| v.name.clone())
            .chain(decls.funcs.iter().map(|f| f.name.clone())),
    );
    for info in &layout.funcs {
        namer.reserve(info.name.clone());
    }
    for reserved in ["Channel", "Mutex", "WaitGroup", "initialize"] {
        namer.reserve(reserved);
    }
    namer
}
