//! Channel, select, mutex, wait-group and once statements.

use rendezvous_automata::{StateId, Transition};
use rendezvous_ir::{
    Body, CallStmt, ChanCommOp, MutexOpKind, ReachabilityAnnotation, SelectStmt, Value,
    WaitGroupOpKind,
};

use crate::func::{Annotated, FuncTranslator};
use crate::resources::{ONCE_DONE, ONCE_NEVER, ONCE_RUNNING};
use crate::warnings::WarningCode;

/// A select case's channel and direction, `-1` when the channel expression
/// is not modeled.
struct Arm {
    chan: String,
    send: bool,
}

impl Arm {
    fn trigger(&self) -> String {
        let event = if self.send {
            "chan_send_trigger"
        } else {
            "chan_recv_trigger"
        };
        format!("{event}[{}]", self.chan)
    }

    /// Registering now would complete at once.
    fn ready(&self) -> String {
        let check = if self.send {
            "chan_can_send"
        } else {
            "chan_can_recv"
        };
        format!("{check}({})", self.chan)
    }

    /// Another select is parked on the opposite side of this channel.
    fn partner_parked(&self) -> String {
        let check = if self.send {
            "chan_parked_receivers"
        } else {
            "chan_parked_senders"
        };
        format!("{check}({})", self.chan)
    }

    /// Hands over to a parked partner.
    fn wake_partner(&self) -> String {
        let event = if self.send {
            "chan_sel_wake_recv"
        } else {
            "chan_sel_wake_send"
        };
        format!("{event}[{}]", self.chan)
    }

    /// Received by this arm while parked.
    fn woken(&self) -> String {
        let event = if self.send {
            "chan_sel_wake_send"
        } else {
            "chan_sel_wake_recv"
        };
        format!("{event}[{}]", self.chan)
    }

    fn offer(&self, delta: i64) -> String {
        format!("chan_offer({}, {}, {delta})", self.chan, self.send)
    }
}

impl FuncTranslator<'_, '_> {
    fn chan_expr(&mut self, chan: &Value) -> String {
        self.eval(chan).unwrap_or_else(|| "-1".to_string())
    }

    pub(crate) fn chan_op(&mut self, cur: StateId, op: &ChanCommOp) -> StateId {
        let c = self.chan_expr(op.chan());
        let entry = self.state_name(cur);
        self.blocking.channel.push(entry);
        match op {
            ChanCommOp::Send { value, .. } => {
                // The payload is evaluated only for its diagnostics.
                let _ = self.eval(value);
                let wait = self.state("send_wait");
                self.edge(
                    Transition::new(cur, wait)
                        .guard(format!("{c} >= 0"))
                        .emit(format!("chan_send_trigger[{c}]")),
                );
                let name = self.state_name(wait);
                self.blocking.channel.push(name);
                let next = self.state("sent");
                self.edge(Transition::new(wait, next).emit(format!("chan_send_confirm[{c}]")));
                next
            }
            ChanCommOp::Receive { target, ok, .. } => {
                let wait = self.state("recv_wait");
                self.edge(
                    Transition::new(cur, wait)
                        .guard(format!("{c} >= 0"))
                        .emit(format!("chan_recv_trigger[{c}]")),
                );
                let name = self.state_name(wait);
                self.blocking.channel.push(name);
                let next = self.state("received");
                let (got, closed) = self.receive_bindings(target.as_ref(), ok.as_ref());
                self.edge(
                    Transition::new(wait, next)
                        .emit(format!("chan_recv_confirm[{c}]"))
                        .updates(got),
                );
                self.edge(
                    Transition::new(wait, next)
                        .emit(format!("chan_recv_closed[{c}]"))
                        .updates(closed),
                );
                next
            }
        }
    }

    /// Updates for a completed receive and for a receive on a closed
    /// channel.
    fn receive_bindings(
        &mut self,
        target: Option<&Value>,
        ok: Option<&Value>,
    ) -> (Vec<String>, Vec<String>) {
        let bound = self.bind_received(target);
        let mut got = bound.clone();
        let mut closed = bound;
        if let Some(ok) = ok {
            got.extend(self.assign_raw(ok, "true".to_string()));
            closed.extend(self.assign_raw(ok, "false".to_string()));
        }
        (got, closed)
    }

    pub(crate) fn close(&mut self, cur: StateId, chan: &Value) -> StateId {
        let c = self.chan_expr(chan);
        let entry = self.state_name(cur);
        self.blocking.channel.push(entry);
        let next = self.state("closed");
        self.edge(
            Transition::new(cur, next)
                .guard(format!("{c} >= 0"))
                .emit(format!("chan_close[{c}]")),
        );
        next
    }

    pub(crate) fn chan_range(
        &mut self,
        cur: StateId,
        chan: &Value,
        target: Option<&Value>,
        body: &Body,
        label: Option<String>,
    ) -> StateId {
        let c = self.chan_expr(chan);
        let head = self.state("range_recv");
        self.edge(Transition::new(cur, head));
        let head_name = self.state_name(head);
        self.blocking.channel.push(head_name);

        let wait = self.state("range_wait");
        self.edge(
            Transition::new(head, wait)
                .guard(format!("{c} >= 0"))
                .emit(format!("chan_recv_trigger[{c}]")),
        );
        let wait_name = self.state_name(wait);
        self.blocking.channel.push(wait_name);

        let body_entry = self.state("range_body");
        let exit = self.state("range_end");
        let bind = self.bind_received(target);
        self.edge(
            Transition::new(wait, body_entry)
                .emit(format!("chan_recv_confirm[{c}]"))
                .updates(bind),
        );
        self.edge(Transition::new(wait, exit).emit(format!("chan_recv_closed[{c}]")));

        self.push_loop(label, exit, Some(head));
        if let Some(end) = self.body(body, body_entry) {
            self.edge(Transition::new(end, head));
        }
        self.pop_loop();
        exit
    }

    /// Commit to one ready case, take the default when none is, or park
    /// until a case becomes ready. Nil channels are never ready.
    pub(crate) fn select(&mut self, cur: StateId, sel: &SelectStmt) -> Option<StateId> {
        let k = self.selects;
        self.selects += 1;
        let prefix = format!("sel{k}");
        let join = self.state(&format!("{prefix}_end"));

        let arms: Vec<Arm> = sel
            .cases
            .iter()
            .map(|case| Arm {
                chan: self.chan_expr(case.op.chan()),
                send: case.op.is_send(),
            })
            .collect();

        self.push_loop(sel.label.clone(), join, None);
        let result = if arms.is_empty() {
            match &sel.default {
                Some(default) => {
                    let end = self.body(default, cur);
                    if let Some(end) = end {
                        self.edge(Transition::new(end, join));
                    }
                    Some(join)
                }
                None => {
                    let entry = self.state_name(cur);
                    self.blocking.channel.push(entry);
                    None
                }
            }
        } else {
            self.select_cases(cur, join, &prefix, k, sel, &arms);
            Some(join)
        };
        self.pop_loop();
        result
    }

    fn select_cases(
        &mut self,
        cur: StateId,
        join: StateId,
        prefix: &str,
        k: usize,
        sel: &SelectStmt,
        arms: &[Arm],
    ) {
        let entry = self.state_name(cur);
        self.blocking.channel.push(entry);

        let choose = self.committed(&format!("{prefix}_choose"));
        self.edge(Transition::new(cur, choose));

        let mut entered = Vec::new();
        let mut registered = Vec::new();
        for (i, case) in sel.cases.iter().enumerate() {
            let state = self.state(&format!("{prefix}_case{i}"));
            self.record_annotations(state, k, i, &case.annotations, case.span);
            entered.push(state);
            registered.push(self.committed(&format!("{prefix}_reg{i}")));
        }

        // A registered case completes at once; its confirmation leads in.
        for (i, case) in sel.cases.iter().enumerate() {
            for mut t in self.confirm_edges(&case.op, &arms[i]) {
                t.from = registered[i];
                t.to = entered[i];
                self.edge(t);
            }
        }

        let withdraw: Vec<String> = arms.iter().map(|a| a.offer(-1)).collect();
        for (i, case) in sel.cases.iter().enumerate() {
            let arm = &arms[i];
            self.edge(
                Transition::new(choose, registered[i])
                    .guard(arm.ready())
                    .emit(arm.trigger()),
            );
            let handed = self.partner_bindings(&case.op);
            self.edge(
                Transition::new(choose, entered[i])
                    .guard(arm.partner_parked())
                    .emit(arm.wake_partner())
                    .updates(handed),
            );
        }

        let none_ready = format!(
            "!({})",
            arms.iter()
                .flat_map(|a| [a.ready(), a.partner_parked()])
                .collect::<Vec<_>>()
                .join(" || ")
        );
        match &sel.default {
            Some(default) => {
                let state = self.state(&format!("{prefix}_default"));
                self.edge(Transition::new(choose, state).guard(none_ready));
                if let Some(end) = self.body(default, state) {
                    self.edge(Transition::new(end, join));
                }
            }
            None => {
                let blocked = self.state(&format!("{prefix}_blocked"));
                let offers: Vec<String> = arms.iter().map(|a| a.offer(1)).collect();
                self.edge(
                    Transition::new(choose, blocked)
                        .guard(none_ready)
                        .updates(offers),
                );
                let name = self.state_name(blocked);
                self.blocking.channel.push(name);

                for (i, case) in sel.cases.iter().enumerate() {
                    let arm = &arms[i];
                    self.edge(
                        Transition::new(blocked, registered[i])
                            .guard(arm.ready())
                            .emit(arm.trigger())
                            .updates(withdraw.clone()),
                    );
                    let mut handed = withdraw.clone();
                    handed.extend(self.partner_bindings(&case.op));
                    self.edge(
                        Transition::new(blocked, entered[i])
                            .guard(format!("{} >= 0", arm.chan))
                            .accept(arm.woken())
                            .updates(handed),
                    );
                }
            }
        }

        for (i, case) in sel.cases.iter().enumerate() {
            if let Some(end) = self.body(&case.body, entered[i]) {
                self.edge(Transition::new(end, join));
            }
        }
    }

    /// Confirmation edges of one registered case, with placeholder
    /// endpoints.
    fn confirm_edges(&mut self, op: &ChanCommOp, arm: &Arm) -> Vec<Transition> {
        let c = &arm.chan;
        match op {
            ChanCommOp::Send { value, .. } => {
                let _ = self.eval(value);
                vec![Transition::new(0, 0).emit(format!("chan_send_confirm[{c}]"))]
            }
            ChanCommOp::Receive { target, ok, .. } => {
                let (got, closed) = self.receive_bindings(target.as_ref(), ok.as_ref());
                vec![
                    Transition::new(0, 0)
                        .emit(format!("chan_recv_confirm[{c}]"))
                        .updates(got),
                    Transition::new(0, 0)
                        .emit(format!("chan_recv_closed[{c}]"))
                        .updates(closed),
                ]
            }
        }
    }

    /// Bindings of a case completed by a direct handover between selects.
    fn partner_bindings(&mut self, op: &ChanCommOp) -> Vec<String> {
        match op {
            ChanCommOp::Send { .. } => Vec::new(),
            ChanCommOp::Receive { target, ok, .. } => {
                self.receive_bindings(target.as_ref(), ok.as_ref()).0
            }
        }
    }

    fn record_annotations(
        &mut self,
        state: StateId,
        select: usize,
        case: usize,
        annotations: &[ReachabilityAnnotation],
        span: rendezvous_ir::Span,
    ) {
        let name = self.state_name(state);
        let mut seen: Vec<ReachabilityAnnotation> = Vec::new();
        for &annotation in annotations {
            if seen.contains(&annotation) {
                self.warn(
                    WarningCode::RedundantAnnotation,
                    format!("duplicate annotation on case {case} of select {select}"),
                );
                continue;
            }
            if !seen.is_empty() {
                self.warn(
                    WarningCode::RedundantAnnotation,
                    format!("case {case} of select {select} is annotated both reachable and unreachable"),
                );
            }
            seen.push(annotation);
            self.annotations.push(Annotated {
                state: name.clone(),
                annotation,
                span,
                select,
                case,
            });
        }
    }

    pub(crate) fn mutex_op(&mut self, cur: StateId, mutex: &Value, op: MutexOpKind) -> StateId {
        let m = self.eval(mutex).unwrap_or_else(|| "-1".to_string());
        let entry = self.state_name(cur);
        self.blocking.mutex.push(entry);
        let (request, grant, base) = match op {
            MutexOpKind::Lock => ("mutex_lock_req", Some("mutex_lock_grant"), "lock"),
            MutexOpKind::RLock => ("mutex_rlock_req", Some("mutex_rlock_grant"), "rlock"),
            MutexOpKind::Unlock => ("mutex_unlock", None, "unlock"),
            MutexOpKind::RUnlock => ("mutex_runlock", None, "runlock"),
        };
        let first = Transition::new(cur, 0)
            .guard(format!("{m} >= 0"))
            .emit(format!("{request}[{m}]"));
        match grant {
            Some(grant) => {
                let wait = self.state(&format!("{base}_wait"));
                self.edge(Transition { to: wait, ..first });
                let name = self.state_name(wait);
                self.blocking.mutex.push(name);
                let next = self.state(&format!("{base}ed"));
                self.edge(Transition::new(wait, next).emit(format!("{grant}[{m}]")));
                next
            }
            None => {
                let next = self.state(&format!("{base}ed"));
                self.edge(Transition { to: next, ..first });
                next
            }
        }
    }

    pub(crate) fn wait_group_op(&mut self, cur: StateId, wg: &Value, op: &WaitGroupOpKind) -> StateId {
        let w = self.eval(wg).unwrap_or_else(|| "-1".to_string());
        let entry = self.state_name(cur);
        self.blocking.wait_group.push(entry);
        let delta = match op {
            WaitGroupOpKind::Add(delta) => Some(self.eval(delta).unwrap_or_else(|| "1".to_string())),
            WaitGroupOpKind::Done => Some("-1".to_string()),
            WaitGroupOpKind::Wait => None,
        };
        match delta {
            Some(d) => {
                // The delta must be in place before the counter process reads it.
                let staged = self.committed("wg_delta");
                self.edge(
                    Transition::new(cur, staged)
                        .guard(format!("{w} >= 0"))
                        .update(format!("wg_delta = {d}")),
                );
                let next = self.state("wg_added");
                self.edge(Transition::new(staged, next).emit(format!("wg_add[{w}]")));
                next
            }
            None => {
                let wait = self.state("wg_wait");
                self.edge(
                    Transition::new(cur, wait)
                        .guard(format!("{w} >= 0"))
                        .emit(format!("wg_wait_req[{w}]")),
                );
                let name = self.state_name(wait);
                self.blocking.wait_group.push(name);
                let next = self.state("wg_released");
                self.edge(Transition::new(wait, next).accept(format!("wg_release[{w}]")));
                next
            }
        }
    }

    pub(crate) fn once_do(&mut self, cur: StateId, once: &Value, call: &CallStmt) -> StateId {
        let o = self.eval(once).unwrap_or_else(|| "-1".to_string());
        let entry = self.state_name(cur);
        self.blocking.once.push(entry);
        let state = format!("once_state[{o}]");
        let next = self.state("once_done");
        self.edge(
            Transition::new(cur, next).guard(format!("{o} >= 0 && {state} == {ONCE_DONE}")),
        );
        let run = self.state("once_run");
        self.edge(
            Transition::new(cur, run)
                .guard(format!("{o} >= 0 && {state} == {ONCE_NEVER}"))
                .update(format!("{state} = {ONCE_RUNNING}")),
        );
        let finished = format!("{state} = {ONCE_DONE}");
        let after = self.call(run, call, std::slice::from_ref(&finished));
        self.edge(Transition::new(after, next).update(finished));
        next
    }
}
