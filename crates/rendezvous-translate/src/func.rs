//! One process template per function: the start/finish skeleton, the
//! prologue binding arguments and locals, and structured control flow.
//! Calls live in `calls.rs`; channel and synchronization statements in
//! `comm.rs`.

use rendezvous_automata::{Process, StateId, StateKind, Transition};
use rendezvous_ir::{
    Body, BranchKind, ForStmt, FuncId, ReachabilityAnnotation, Span, Stmt, SwitchStmt, TypeRef,
    Value,
};

use crate::expr::{ExprError, Exprs};
use crate::frames::{bound_params, zero, Frames, Storage};
use crate::layout::{FuncInfo, Layout};
use crate::names::Namer;
use crate::pools::{copy_call, embeds_primitive, fresh_value, repr, FieldNames, Repr};
use crate::resources::{LIVE_TASKS, MAIN_ENDED};
use crate::warnings::{TranslationWarning, WarningCode};

/// States in which an instance may wait on a shared resource, by kind.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct Blocking {
    pub channel: Vec<String>,
    pub mutex: Vec<String>,
    pub wait_group: Vec<String>,
    pub once: Vec<String>,
}

/// A select case annotated in the source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Annotated {
    pub state: String,
    pub annotation: ReachabilityAnnotation,
    pub span: Span,
    pub select: usize,
    pub case: usize,
}

#[derive(Debug, Clone)]
pub(crate) struct FuncOutput {
    pub process: Process,
    pub blocking: Blocking,
    pub annotations: Vec<Annotated>,
    pub called_nil: Option<String>,
    pub warnings: Vec<TranslationWarning>,
}

struct LoopTarget {
    label: Option<String>,
    break_to: StateId,
    /// `None` for switch and select, which only accept `break`.
    continue_to: Option<StateId>,
}

pub(crate) struct FuncTranslator<'t, 'a> {
    pub(crate) layout: &'t Layout<'a>,
    pub(crate) frames: &'t Frames,
    pub(crate) exprs: Exprs<'t, 'a>,
    pub(crate) id: FuncId,
    pub(crate) info: &'t FuncInfo,
    pub(crate) process: Process,
    states: Namer,
    locals: Namer,
    pub(crate) cleanup: StateId,
    loops: Vec<LoopTarget>,
    called_nil: Option<StateId>,
    uses_callee_inst: bool,
    payload_warned: bool,
    span: Span,
    pub(crate) selects: usize,
    pub(crate) blocking: Blocking,
    pub(crate) annotations: Vec<Annotated>,
    warnings: Vec<TranslationWarning>,
}

impl<'t, 'a> FuncTranslator<'t, 'a> {
    pub fn new(
        layout: &'t Layout<'a>,
        frames: &'t Frames,
        fields: &'t FieldNames,
        id: FuncId,
    ) -> Self {
        let info = layout.func(id);
        Self {
            layout,
            frames,
            exprs: Exprs {
                layout,
                frames,
                fields,
                func: Some(id),
            },
            id,
            info,
            process: Process::new(info.name.clone()).param("const int", "pid"),
            states: Namer::default(),
            locals: frames.namers.get(id).cloned().unwrap_or_default(),
            cleanup: 0,
            loops: Vec::new(),
            called_nil: None,
            uses_callee_inst: false,
            payload_warned: false,
            span: layout.program.func(id).span,
            selects: 0,
            blocking: Blocking::default(),
            annotations: Vec::new(),
            warnings: Vec::new(),
        }
    }

    pub fn translate(mut self) -> FuncOutput {
        let program = self.layout.program;
        let info = self.info;
        let n = info.name.clone();

        let starting = self.state("starting");
        self.process.initial = starting;
        let started = self.committed("started");
        let body = self.state("body");
        let deferred = (info.defer_slots > 0).then(|| self.state("deferred"));
        let finalizing = self.committed("finalizing");
        let ending = self.state("ending");
        let ended = self.state("ended");
        self.cleanup = deferred.unwrap_or(finalizing);

        // Instance 0 of the entry function starts on its own; every other
        // instance waits for whoever allocated it.
        let pid_guard = if info.is_entry {
            self.edge(Transition::new(starting, started).guard("pid == 0"));
            Some("pid > 0")
        } else {
            None
        };
        let handshakes = !info.is_entry || info.bound > 1;
        if handshakes {
            let start = format!("{n}_start[pid]");
            let mut edges = Vec::new();
            if info.spawned {
                edges.push(
                    Transition::new(starting, started)
                        .guard(format!("!{n}_async[pid]"))
                        .accept(&start),
                );
                edges.push(
                    Transition::new(starting, started)
                        .guard(format!("{n}_async[pid]"))
                        .accept(&start)
                        .update(format!("{LIVE_TASKS}++")),
                );
            } else {
                edges.push(Transition::new(starting, started).accept(&start));
            }
            for mut t in edges {
                if let Some(g) = pid_guard {
                    t = t.guard(g);
                }
                self.edge(t);
            }
        }

        let prologue = self.prologue();
        self.edge(Transition::new(started, body).updates(prologue));

        let func_body = &program.func(self.id).body;
        if let Some(end) = self.body(func_body, body) {
            let results = self.result_updates(None);
            self.edge(Transition::new(end, self.cleanup).updates(results));
        }

        if let Some(deferred) = deferred {
            self.defer_loop(deferred, finalizing);
        }
        self.edge(Transition::new(finalizing, ending));

        if info.is_entry {
            self.edge(
                Transition::new(ending, ended)
                    .guard("pid == 0")
                    .update(format!("{MAIN_ENDED} = true")),
            );
        }
        if handshakes {
            let done = format!("{n}_done[pid]");
            let mut edges = Vec::new();
            if info.spawned {
                edges.push(
                    Transition::new(ending, ended)
                        .guard(format!("!{n}_async[pid]"))
                        .emit(&done),
                );
                edges.push(
                    Transition::new(ending, ended)
                        .guard(format!("{n}_async[pid]"))
                        .update(format!("{LIVE_TASKS}--")),
                );
            } else {
                edges.push(Transition::new(ending, ended).emit(&done));
            }
            for mut t in edges {
                if let Some(g) = pid_guard {
                    t = t.guard(g);
                }
                self.edge(t);
            }
        }

        self.declare_locals();
        FuncOutput {
            called_nil: self
                .called_nil
                .map(|s| self.process.state_name(s).to_string()),
            process: self.process,
            blocking: self.blocking,
            annotations: self.annotations,
            warnings: self.warnings,
        }
    }

    /// Bind arguments and give every owned slot its storage.
    fn prologue(&mut self) -> Vec<String> {
        let program = self.layout.program;
        let params = bound_params(self.layout, self.id);
        let mut updates = Vec::new();

        for (i, &var) in params.iter().enumerate() {
            let Ok(dst) = self.exprs.var(var) else {
                continue;
            };
            let slot = format!("{}[pid]", self.frames.args[self.id][i]);
            match repr(self.layout, program.var(var).ty) {
                Repr::Composite(ty) => {
                    updates.push(format!("{dst} = {}", fresh_value(self.layout, Repr::Composite(ty))));
                    updates.extend(copy_call(self.layout, ty, &dst, &slot));
                }
                _ => updates.push(format!("{dst} = {slot}")),
            }
        }

        for var in program.func_vars(self.id) {
            if params.contains(&var) {
                continue;
            }
            let v = program.var(var);
            let Ok(dst) = self.exprs.var(var) else {
                continue;
            };
            let r = repr(self.layout, v.ty);
            match r {
                Repr::Composite(_) | Repr::Primitive(_) => {
                    updates.push(format!("{dst} = {}", fresh_value(self.layout, r)));
                }
                _ if v.captured => updates.push(format!("{dst} = {}", zero(r))),
                _ => {}
            }
            if let Some(init) = &v.initial {
                if let Some(rhs) = self.eval(init) {
                    let update = self.store(Some(v.ty), dst, rhs, program.type_of(init).is_some());
                    updates.push(update);
                }
            }
        }
        updates
    }

    /// Copy results into the caller-visible slots: the returned values, or
    /// the named result variables when `values` is `None`.
    pub(crate) fn result_updates(&mut self, values: Option<&[Value]>) -> Vec<String> {
        let program = self.layout.program;
        let func = program.func(self.id);
        let mut updates = Vec::new();
        for (i, &var) in func.results.iter().enumerate() {
            let slot = format!("{}[pid]", self.frames.results[self.id][i]);
            let rhs = match values {
                Some(values) => match values.get(i) {
                    Some(v) => self.eval(v),
                    None => None,
                },
                None => self.exprs.var(var).ok(),
            };
            if let Some(rhs) = rhs {
                updates.push(format!("{slot} = {rhs}"));
            }
        }
        updates
    }

    fn declare_locals(&mut self) {
        let program = self.layout.program;
        for var in program.func_vars(self.id) {
            if let Some(Storage::Local(name)) = self.frames.storage(var) {
                let r = repr(self.layout, program.var(var).ty);
                self.process.decls.add_var(r.decl(name).with_init(zero(r)));
            }
        }
        if self.uses_callee_inst {
            self.process
                .decls
                .add_var(rendezvous_automata::VarDecl::int("callee_inst").with_init("0"));
        }
    }

    // ----- building blocks -----

    pub(crate) fn state(&mut self, base: &str) -> StateId {
        let name = self.states.fresh(base);
        self.process.add_state(name, StateKind::Normal)
    }

    pub(crate) fn committed(&mut self, base: &str) -> StateId {
        let name = self.states.fresh(base);
        self.process.add_state(name, StateKind::Committed)
    }

    pub(crate) fn edge(&mut self, transition: Transition) {
        self.process.add_transition(transition);
    }

    pub(crate) fn step(&mut self, from: StateId, base: &str, updates: Vec<String>) -> StateId {
        let to = self.state(base);
        self.edge(Transition::new(from, to).updates(updates));
        to
    }

    pub(crate) fn state_name(&self, state: StateId) -> String {
        self.process.state_name(state).to_string()
    }

    pub(crate) fn local(&mut self, base: &str) -> String {
        let name = self.locals.fresh(base);
        self.process
            .decls
            .add_var(rendezvous_automata::VarDecl::int(&name).with_init("0"));
        name
    }

    pub(crate) fn callee_slot(&mut self) -> &'static str {
        self.uses_callee_inst = true;
        "callee_inst"
    }

    pub(crate) fn called_nil_state(&mut self) -> StateId {
        match self.called_nil {
            Some(s) => s,
            None => {
                let s = self.state("called_nil");
                self.called_nil = Some(s);
                s
            }
        }
    }

    pub(crate) fn warn(&mut self, code: WarningCode, message: impl Into<String>) {
        let warning = TranslationWarning::new(code, message)
            .in_function(self.layout.program.func(self.id).name.clone())
            .at(self.span);
        self.warnings.push(warning);
    }

    fn expr_warning(&mut self, err: ExprError) {
        let code = match err {
            ExprError::Unsupported(_) => WarningCode::UnsupportedExpr,
            ExprError::MapIndex => WarningCode::MapIndex,
        };
        self.warn(code, err.to_string());
    }

    /// Render a value, recording a warning when it cannot be modeled.
    pub(crate) fn eval(&mut self, value: &Value) -> Option<String> {
        match self.exprs.value(value) {
            Ok(expr) => Some(expr),
            Err(err) => {
                self.expr_warning(err);
                None
            }
        }
    }

    /// Assignment of `rhs` to `lhs`; value-typed composites copy their slot
    /// when `rhs` names existing storage.
    pub(crate) fn store(
        &mut self,
        ty: Option<TypeRef>,
        lhs: String,
        rhs: String,
        rhs_is_slot: bool,
    ) -> String {
        if let (Some(ty), true) = (ty, rhs_is_slot) {
            if let Repr::Composite(id) = repr(self.layout, ty) {
                if embeds_primitive(self.layout, id) {
                    self.warn(
                        WarningCode::PartialCopy,
                        "copy shares the synchronization primitives it embeds",
                    );
                }
                if let Some(copy) = copy_call(self.layout, id, &lhs, &rhs) {
                    return copy;
                }
            }
        }
        format!("{lhs} = {rhs}")
    }

    pub(crate) fn assign(&mut self, target: &Value, value: &Value) -> Vec<String> {
        let lhs = match self.exprs.value(target) {
            Ok(lhs) => lhs,
            Err(err) => {
                self.expr_warning(err);
                return Vec::new();
            }
        };
        let Some(rhs) = self.eval(value) else {
            return Vec::new();
        };
        let program = self.layout.program;
        let update = self.store(
            program.type_of(target),
            lhs,
            rhs,
            program.type_of(value).is_some(),
        );
        vec![update]
    }

    /// Bind the zero value of the target's type; channel payloads are not
    /// modeled.
    pub(crate) fn bind_received(&mut self, target: Option<&Value>) -> Vec<String> {
        let Some(target) = target else {
            return Vec::new();
        };
        if !self.payload_warned {
            self.payload_warned = true;
            self.warn(
                WarningCode::ChannelPayload,
                "received values are bound to the zero value of their type",
            );
        }
        let program = self.layout.program;
        let r = program
            .type_of(target)
            .map(|ty| repr(self.layout, ty))
            .unwrap_or(Repr::Int);
        if matches!(r, Repr::Composite(_) | Repr::Primitive(_)) {
            return Vec::new();
        }
        match self.exprs.value(target) {
            Ok(lhs) => vec![format!("{lhs} = {}", zero(r))],
            Err(err) => {
                self.expr_warning(err);
                Vec::new()
            }
        }
    }

    // ----- control flow -----

    pub(crate) fn body(&mut self, body: &Body, mut cur: StateId) -> Option<StateId> {
        for stmt in &body.stmts {
            self.span = stmt.span;
            cur = self.stmt(&stmt.node, cur)?;
        }
        Some(cur)
    }

    fn stmt(&mut self, stmt: &Stmt, cur: StateId) -> Option<StateId> {
        match stmt {
            Stmt::Assign { target, value } => {
                let updates = self.assign(target, value);
                Some(self.step(cur, "assign", updates))
            }
            Stmt::MakeChan { target, buffer } => {
                let updates = match (self.exprs.value(target), self.eval(buffer)) {
                    (Ok(lhs), Some(size)) => vec![format!("{lhs} = alloc_chan({size})")],
                    (Err(err), _) => {
                        self.expr_warning(err);
                        Vec::new()
                    }
                    (Ok(lhs), None) => vec![format!("{lhs} = alloc_chan(0)")],
                };
                Some(self.step(cur, "make_chan", updates))
            }
            Stmt::MakeStruct { target, ty } => {
                let fresh = fresh_value(self.layout, Repr::Composite(*ty));
                let updates = self.assign_raw(target, fresh);
                Some(self.step(cur, "make_struct", updates))
            }
            Stmt::MakeContainer { target, ty, len } => {
                let updates = match self.layout.pool(*ty).map(|p| (p.name.clone(), p.capacity)) {
                    Some((pool, capacity)) => {
                        let n = match len {
                            Some(len) => self.eval(len).unwrap_or_else(|| "0".to_string()),
                            None if self.is_array(*ty) => capacity.to_string(),
                            None => "0".to_string(),
                        };
                        self.assign_raw(target, format!("alloc_{pool}({n})"))
                    }
                    None => Vec::new(),
                };
                Some(self.step(cur, "make_container", updates))
            }
            Stmt::ChanOp(op) => Some(self.chan_op(cur, op)),
            Stmt::CloseChan { chan } => Some(self.close(cur, chan)),
            Stmt::Select(sel) => self.select(cur, sel),
            Stmt::If {
                cond,
                then_body,
                else_body,
            } => {
                let guard = self.eval(cond);
                let then_entry = self.state("then");
                let else_entry = self.state("else");
                let join = self.state("endif");
                let mut yes = Transition::new(cur, then_entry);
                let mut no = Transition::new(cur, else_entry);
                if let Some(g) = guard {
                    no = no.guard(format!("!({g})"));
                    yes = yes.guard(g);
                }
                self.edge(yes);
                self.edge(no);
                if let Some(end) = self.body(then_body, then_entry) {
                    self.edge(Transition::new(end, join));
                }
                let else_end = match else_body {
                    Some(b) => self.body(b, else_entry),
                    None => Some(else_entry),
                };
                if let Some(end) = else_end {
                    self.edge(Transition::new(end, join));
                }
                Some(join)
            }
            Stmt::Switch(sw) => Some(self.switch(cur, sw)),
            Stmt::For(f) => Some(self.for_loop(cur, f)),
            Stmt::ChanRange {
                chan,
                target,
                body,
                label,
            } => Some(self.chan_range(cur, chan, target.as_ref(), body, label.clone())),
            Stmt::ContainerRange {
                container,
                key,
                elem,
                body,
                label,
            } => Some(self.container_range(
                cur,
                container,
                key.as_ref(),
                elem.as_ref(),
                body,
                label.clone(),
            )),
            Stmt::Call(call) => Some(self.call(cur, call, &[])),
            Stmt::Return { values, panics } => {
                let mut updates = if values.is_empty() {
                    self.result_updates(None)
                } else {
                    self.result_updates(Some(values))
                };
                if *panics && self.info.can_panic {
                    updates.push(format!("{}_panicking[pid] = true", self.info.name));
                }
                self.edge(Transition::new(cur, self.cleanup).updates(updates));
                None
            }
            Stmt::Recover { target } => {
                let mut updates = Vec::new();
                if self.info.recovers {
                    let flag = format!("{}_defer_panic[pid]", self.info.name);
                    if let Some(t) = target {
                        updates.extend(self.assign_raw(t, flag.clone()));
                    }
                    updates.push(format!("{flag} = false"));
                }
                Some(self.step(cur, "recover", updates))
            }
            Stmt::Branch { kind, label } => {
                match self.branch_target(*kind, label.as_deref()) {
                    Some(to) => {
                        self.edge(Transition::new(cur, to));
                        None
                    }
                    None => {
                        self.warn(WarningCode::UnsupportedExpr, "branch without a target");
                        Some(cur)
                    }
                }
            }
            Stmt::MutexOp { mutex, op } => Some(self.mutex_op(cur, mutex, *op)),
            Stmt::WaitGroupOp { wait_group, op } => Some(self.wait_group_op(cur, wait_group, op)),
            Stmt::OnceDo { once, call } => Some(self.once_do(cur, once, call)),
        }
    }

    /// Plain assignment of an already rendered expression.
    pub(crate) fn assign_raw(&mut self, target: &Value, rhs: String) -> Vec<String> {
        match self.exprs.value(target) {
            Ok(lhs) => vec![format!("{lhs} = {rhs}")],
            Err(err) => {
                self.expr_warning(err);
                Vec::new()
            }
        }
    }

    fn is_array(&self, ty: rendezvous_ir::TypeId) -> bool {
        self.layout.program.types[ty]
            .as_container()
            .is_some_and(|c| c.kind == rendezvous_ir::ContainerKind::Array)
    }

    pub(crate) fn push_loop(&mut self, label: Option<String>, break_to: StateId, continue_to: Option<StateId>) {
        self.loops.push(LoopTarget {
            label,
            break_to,
            continue_to,
        });
    }

    pub(crate) fn pop_loop(&mut self) {
        self.loops.pop();
    }

    fn branch_target(&self, kind: BranchKind, label: Option<&str>) -> Option<StateId> {
        self.loops.iter().rev().find_map(|l| {
            if label.is_some() && l.label.as_deref() != label {
                return None;
            }
            match kind {
                BranchKind::Break => Some(l.break_to),
                BranchKind::Continue => l.continue_to,
            }
        })
    }

    fn switch(&mut self, cur: StateId, sw: &SwitchStmt) -> StateId {
        let join = self.state("switch_end");
        let tag = sw.tag.as_ref().and_then(|t| self.eval(t));
        let tag_failed = sw.tag.is_some() && tag.is_none();

        let mut guards: Vec<Option<String>> = Vec::new();
        for (i, case) in sw.cases.iter().enumerate() {
            if sw.default == Some(i) {
                guards.push(None);
                continue;
            }
            let mut parts = Vec::new();
            let mut ok = !tag_failed;
            for cond in &case.conds {
                match self.eval(cond) {
                    Some(c) => match &tag {
                        Some(t) => parts.push(format!("{t} == {c}")),
                        None => parts.push(c),
                    },
                    None => ok = false,
                }
            }
            guards.push(if ok && !parts.is_empty() {
                Some(format!("({})", parts.join(" || ")))
            } else {
                None
            });
        }
        // Unmodeled conditions make the choice nondeterministic.
        let exact = sw
            .cases
            .iter()
            .enumerate()
            .all(|(i, _)| sw.default == Some(i) || guards[i].is_some());

        let entries: Vec<StateId> = (0..sw.cases.len()).map(|_| self.state("case")).collect();
        let mut earlier: Vec<String> = Vec::new();
        for (i, &entry) in entries.iter().enumerate() {
            if sw.default == Some(i) {
                continue;
            }
            let mut t = Transition::new(cur, entry);
            if exact {
                if let Some(g) = &guards[i] {
                    t = t.guard(g.clone());
                }
                if !earlier.is_empty() {
                    t = t.guard(format!("!({})", earlier.join(" || ")));
                }
            }
            if let Some(g) = &guards[i] {
                earlier.push(g.clone());
            }
            self.edge(t);
        }
        let fallback = sw.default.map(|d| entries[d]).unwrap_or(join);
        let mut t = Transition::new(cur, fallback);
        if exact && !earlier.is_empty() {
            t = t.guard(format!("!({})", earlier.join(" || ")));
        }
        self.edge(t);

        self.push_loop(sw.label.clone(), join, None);
        for (i, case) in sw.cases.iter().enumerate() {
            if let Some(end) = self.body(&case.body, entries[i]) {
                let next = if case.fallthrough && i + 1 < entries.len() {
                    entries[i + 1]
                } else {
                    join
                };
                self.edge(Transition::new(end, next));
            }
        }
        self.pop_loop();
        join
    }

    fn for_loop(&mut self, cur: StateId, f: &ForStmt) -> StateId {
        let head = self.state("loop");
        self.edge(Transition::new(cur, head));
        let body_entry = self.state("loop_body");
        let exit = self.state("loop_end");
        match &f.cond {
            Some(cond) => match self.eval(cond) {
                Some(g) => {
                    self.edge(Transition::new(head, body_entry).guard(g.clone()));
                    self.edge(Transition::new(head, exit).guard(format!("!({g})")));
                }
                None => {
                    self.edge(Transition::new(head, body_entry));
                    self.edge(Transition::new(head, exit));
                }
            },
            None => self.edge(Transition::new(head, body_entry)),
        }
        let post = if f.post.is_some() {
            self.state("loop_post")
        } else {
            head
        };
        self.push_loop(f.label.clone(), exit, Some(post));
        if let Some(end) = self.body(&f.body, body_entry) {
            self.edge(Transition::new(end, post));
        }
        if let Some(post_body) = &f.post {
            if let Some(end) = self.body(post_body, post) {
                self.edge(Transition::new(end, head));
            }
        }
        self.pop_loop();
        exit
    }

    fn container_range(
        &mut self,
        cur: StateId,
        container: &Value,
        key: Option<&Value>,
        elem: Option<&Value>,
        body: &Body,
        label: Option<String>,
    ) -> StateId {
        let program = self.layout.program;
        let ty = program.type_of(container);
        let pool = ty.and_then(|t| self.layout.pool(t.id).map(|p| p.name.clone()));
        let base = self.eval(container);
        let exit = self.state("range_end");
        let (Some(ty), Some(pool), Some(base)) = (ty, pool, base) else {
            self.warn(WarningCode::UnsupportedExpr, "range over a container without storage");
            self.edge(Transition::new(cur, exit));
            return exit;
        };
        let is_map = program.types[ty.id]
            .as_container()
            .is_some_and(|c| c.kind == rendezvous_ir::ContainerKind::Map);

        let it = self.local("it");
        let head = self.state("range");
        self.edge(Transition::new(cur, head).update(format!("{it} = 0")));
        let len = match repr(self.layout, ty) {
            Repr::Composite(_) => format!("{pool}_len[{base}]"),
            _ => format!("({base} < 0 ? 0 : {pool}_len[{base}])"),
        };

        let mut bind = Vec::new();
        if let Some(k) = key {
            bind.extend(self.assign_raw(k, it.clone()));
        }
        if let Some(e) = elem {
            if is_map {
                self.warn(WarningCode::MapIndex, "map values are not modeled");
                bind.extend(self.bind_zero(e));
            } else {
                let rhs = format!("{pool}_elem[{base}][{it}]");
                if let Ok(lhs) = self.exprs.value(e) {
                    let update = self.store(program.type_of(e), lhs, rhs, true);
                    bind.push(update);
                }
            }
        }
        let body_entry = self.state("range_body");
        self.edge(
            Transition::new(head, body_entry)
                .guard(format!("{it} < {len}"))
                .updates(bind),
        );
        self.edge(Transition::new(head, exit).guard(format!("{it} >= {len}")));

        let post = self.state("range_next");
        self.edge(Transition::new(post, head).update(format!("{it}++")));
        self.push_loop(label, exit, Some(post));
        if let Some(end) = self.body(body, body_entry) {
            self.edge(Transition::new(end, post));
        }
        self.pop_loop();
        exit
    }

    fn bind_zero(&mut self, target: &Value) -> Vec<String> {
        let r = self
            .layout
            .program
            .type_of(target)
            .map(|ty| repr(self.layout, ty))
            .unwrap_or(Repr::Int);
        if matches!(r, Repr::Composite(_) | Repr::Primitive(_)) {
            return Vec::new();
        }
        self.assign_raw(target, zero(r).to_string())
    }
}
