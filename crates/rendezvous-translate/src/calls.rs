//! Call sites and deferred-call unwinding.
//!
//! A call allocates a callee instance, writes its argument slots and then
//! hands control over on `<callee>_start[inst]`. Synchronous calls wait for
//! `<callee>_done[inst]`; async calls continue at once; deferred calls only
//! record `(fid, inst)` on the caller's defer list, which is drained in LIFO
//! order from the `deferred` state.

use rendezvous_automata::{StateId, Transition};
use rendezvous_ir::{CallKind, CallStmt, Callee, FuncId, Value};

use crate::frames::bound_params;
use crate::func::FuncTranslator;
use crate::warnings::WarningCode;

impl FuncTranslator<'_, '_> {
    /// Translate a call starting at `cur`. `on_panic` is applied alongside
    /// the caller's own panic flag when a synchronous callee panics.
    pub(crate) fn call(&mut self, cur: StateId, call: &CallStmt, on_panic: &[String]) -> StateId {
        let program = self.layout.program;
        let targets: Vec<FuncId> = self
            .layout
            .analysis
            .call_graph
            .dispatch()
            .resolve(program, call)
            .into_iter()
            .filter(|&t| self.layout.func(t).emitted)
            .collect();
        let next = self.state("returned");

        match &call.callee {
            Callee::Static(_) => match targets.first() {
                Some(&target) => {
                    let parent = self.static_parent(target);
                    self.invoke(cur, next, target, call, parent, None, on_panic);
                }
                None => self.edge(Transition::new(cur, next)),
            },
            Callee::Dynamic(value) => self.dynamic_call(cur, next, value, &targets, call, on_panic),
        }
        next
    }

    fn dynamic_call(
        &mut self,
        cur: StateId,
        next: StateId,
        value: &Value,
        targets: &[FuncId],
        call: &CallStmt,
        on_panic: &[String],
    ) {
        if targets.is_empty() {
            self.warn(
                WarningCode::DynamicUnresolved,
                "no function matches the signature of this dynamic call",
            );
            self.edge(Transition::new(cur, next));
            return;
        }
        let Some(fv) = self.eval(value) else {
            self.edge(Transition::new(cur, next));
            return;
        };
        let nil = self.called_nil_state();
        self.edge(Transition::new(cur, nil).guard(format!("{fv} < 0")));
        for &target in targets {
            let guard = format!("{fv} >= 0 && func_id({fv}) == {target}");
            let parent = self
                .layout
                .func(target)
                .has_parent
                .then(|| format!("func_inst({fv})"));
            self.invoke(cur, next, target, call, parent, Some(guard), on_panic);
        }
    }

    /// Enclosing instance of a statically called closure.
    fn static_parent(&mut self, target: FuncId) -> Option<String> {
        let enclosing = self.layout.program.func(target).enclosing?;
        match self.exprs.instance_of(enclosing) {
            Some(inst) => Some(inst),
            None => {
                self.warn(
                    WarningCode::UnsupportedExpr,
                    "closure called outside its enclosing function",
                );
                Some("0".to_string())
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn invoke(
        &mut self,
        from: StateId,
        next: StateId,
        target: FuncId,
        call: &CallStmt,
        parent: Option<String>,
        guard: Option<String>,
        on_panic: &[String],
    ) {
        let callee = self.layout.func(target);
        let g = callee.name.clone();
        let inst = self.callee_slot();

        let mut bind = vec![format!("{inst} = alloc_{g}()")];
        if let (true, Some(p)) = (callee.has_parent, parent) {
            bind.push(format!("{g}_parent[{inst}] = {p}"));
        }
        let values = call.receiver.iter().chain(&call.args);
        for (i, value) in values.enumerate().take(bound_params(self.layout, target).len()) {
            if let Some(e) = self.eval(value) {
                bind.push(format!("{}[{inst}] = {e}", self.frames.args[target][i]));
            }
        }

        let with_guard = |t: Transition| match &guard {
            Some(g) => t.guard(g.clone()),
            None => t,
        };

        match call.kind {
            CallKind::Sync => {
                let handoff = self.committed(&format!("call_{g}"));
                self.edge(with_guard(Transition::new(from, handoff)).updates(bind));
                let wait = self.state(&format!("wait_{g}"));
                self.edge(Transition::new(handoff, wait).emit(format!("{g}_start[{inst}]")));

                let results = self.call_results(target, call);
                let done = format!("{g}_done[{inst}]");
                if callee.can_panic {
                    let panicking = format!("{g}_panicking[{inst}]");
                    self.edge(
                        Transition::new(wait, next)
                            .guard(format!("!{panicking}"))
                            .accept(&done)
                            .updates(results),
                    );
                    let mut unwind = on_panic.to_vec();
                    if self.info.can_panic {
                        unwind.push(format!("{}_panicking[pid] = true", self.info.name));
                    }
                    self.edge(
                        Transition::new(wait, self.cleanup)
                            .guard(panicking)
                            .accept(&done)
                            .updates(unwind),
                    );
                } else {
                    self.edge(Transition::new(wait, next).accept(&done).updates(results));
                }
            }
            CallKind::Async => {
                bind.push(format!("{g}_async[{inst}] = true"));
                let handoff = self.committed(&format!("go_{g}"));
                self.edge(with_guard(Transition::new(from, handoff)).updates(bind));
                self.edge(Transition::new(handoff, next).emit(format!("{g}_start[{inst}]")));
            }
            CallKind::Deferred => {
                bind.push(format!("{}_push_defer(pid, {target}, {inst})", self.info.name));
                self.edge(with_guard(Transition::new(from, next)).updates(bind));
            }
        }
    }

    fn call_results(&mut self, target: FuncId, call: &CallStmt) -> Vec<String> {
        let program = self.layout.program;
        let results = &program.func(target).results;
        let mut updates = Vec::new();
        for (i, dest) in call.targets.iter().enumerate() {
            let (Some(dest), Some(&var)) = (dest, results.get(i)) else {
                continue;
            };
            let lhs = match self.exprs.value(dest) {
                Ok(lhs) => lhs,
                Err(_) => {
                    self.warn(WarningCode::UnsupportedExpr, "call result target not modeled");
                    continue;
                }
            };
            let rhs = format!("{}[callee_inst]", self.frames.results[target][i]);
            let update = self.store(Some(program.var(var).ty), lhs, rhs, true);
            updates.push(update);
        }
        updates
    }

    /// Drain the defer list from `deferred`, newest first, then move on to
    /// `finalizing`.
    pub(crate) fn defer_loop(&mut self, deferred: StateId, finalizing: StateId) {
        let n = self.info.name.clone();
        let len = format!("{n}_defer_len[pid]");
        let top_fid = format!("{n}_defer_fid[pid][{len} - 1]");
        let top_inst = format!("{n}_defer_inst[pid][{len} - 1]");

        self.edge(Transition::new(deferred, finalizing).guard(format!("{len} == 0")));

        for target in self.info.deferred_targets.clone() {
            let callee = self.layout.func(target);
            if !callee.emitted {
                continue;
            }
            let g = callee.name.clone();
            let wait = self.state(&format!("defer_wait_{g}"));

            let mut start = Transition::new(deferred, wait)
                .guard(format!("{len} > 0 && {top_fid} == {target}"))
                .emit(format!("{g}_start[{top_inst}]"));
            let hands_off = callee.recovers && self.info.can_panic;
            if hands_off {
                start = start.update(format!("{g}_defer_panic[{top_inst}] = {n}_panicking[pid]"));
            }
            self.edge(start);

            let mut back = Vec::new();
            if hands_off {
                back.push(format!("{n}_panicking[pid] = {g}_defer_panic[{top_inst}]"));
            }
            if callee.can_panic && self.info.can_panic {
                back.push(format!(
                    "{n}_panicking[pid] = {n}_panicking[pid] || {g}_panicking[{top_inst}]"
                ));
            }
            back.push(format!("{len}--"));
            self.edge(
                Transition::new(wait, deferred)
                    .accept(format!("{g}_done[{top_inst}]"))
                    .updates(back),
            );
        }
    }
}
