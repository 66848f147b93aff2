//! Shared declarations and the protocol automata for channels, mutexes and
//! wait groups. Once gates need no automaton; a global tri-state array is
//! enough.

use rendezvous_automata::{
    Declarations, FuncDecl, Model, Process, ProcessInstance, StateKind, Transition, VarDecl,
};

pub(crate) const OUT_OF_RESOURCES: &str = "out_of_resources";
pub(crate) const LIVE_TASKS: &str = "live_tasks";
pub(crate) const MAIN_ENDED: &str = "main_ended";
pub(crate) const FUNC_STRIDE: &str = "FUNC_STRIDE";

pub(crate) const CHANNEL_PROCESS: &str = "Channel";
pub(crate) const MUTEX_PROCESS: &str = "Mutex";
pub(crate) const WAIT_GROUP_PROCESS: &str = "WaitGroup";

pub(crate) const ONCE_NEVER: i64 = 0;
pub(crate) const ONCE_RUNNING: i64 = 1;
pub(crate) const ONCE_DONE: i64 = 2;

/// Bump allocator over a fixed pool. Exhaustion raises `out_of_resources`
/// and hands out the last slot again.
pub(crate) fn counted_alloc(
    name: &str,
    max: &str,
    count: &str,
    params: &[(&str, &str)],
    init: Vec<String>,
) -> FuncDecl {
    let mut func = FuncDecl::new(name, "int");
    for (ty, p) in params {
        func = func.param(*ty, *p);
    }
    func.line("int id;")
        .line(format!("if ({count} >= {max}) {{"))
        .line(format!("    {OUT_OF_RESOURCES} = true;"))
        .line(format!("    return {max} - 1;"))
        .line("}")
        .line(format!("id = {count};"))
        .line(format!("{count}++;"))
        .lines(init)
        .line("return id;")
}

/// Globals every model carries, plus the function-value codec.
pub(crate) fn declare_core(decls: &mut Declarations, func_stride: usize) {
    decls.add_var(VarDecl::constant(FUNC_STRIDE, func_stride as i64));
    decls.add_var(VarDecl::bool(OUT_OF_RESOURCES).with_init("false"));
    decls.add_var(VarDecl::int(LIVE_TASKS).with_init("0"));
    decls.add_var(VarDecl::bool(MAIN_ENDED).with_init("false"));
    decls.add_func(
        FuncDecl::new("func_id", "int")
            .param("int", "v")
            .line(format!("return v / {FUNC_STRIDE};")),
    );
    decls.add_func(
        FuncDecl::new("func_inst", "int")
            .param("int", "v")
            .line(format!("return v % {FUNC_STRIDE};")),
    );
}

fn instantiate(model: &mut Model, process: &str, count: usize) {
    for i in 0..count {
        model.add_instance(ProcessInstance::new(
            format!("{process}_{i}"),
            process,
            vec![i.to_string()],
        ));
    }
}

/// Channel state is a signed counter (sends minus receives registered) plus
/// the number of registered but unconfirmed sends (`sp`) and receives
/// (`rp`). A send confirms while it is not among the `counter - buffer`
/// blocked ones; a receive confirms while it is not among the `-counter`
/// unmatched ones.
///
/// Selects never hold registrations while they wait. A parked select only
/// counts its offers in `chan_sel_send`/`chan_sel_recv`, and a partner
/// select hands over directly on `chan_sel_wake_send`/`chan_sel_wake_recv`.
pub(crate) fn declare_channels(model: &mut Model, count: usize) {
    if count == 0 {
        return;
    }
    let decls = &mut model.declarations;
    decls.add_var(VarDecl::constant("MAX_CHANNELS", count as i64));
    decls.add_var(VarDecl::int("chan_count").with_init("0"));
    for name in [
        "chan_counter",
        "chan_buffer",
        "chan_sp",
        "chan_rp",
        "chan_sel_send",
        "chan_sel_recv",
    ] {
        decls.add_var(VarDecl::int(name).array("MAX_CHANNELS"));
    }
    decls.add_var(VarDecl::bool("chan_closed").array("MAX_CHANNELS"));
    for event in [
        "chan_send_trigger",
        "chan_send_confirm",
        "chan_recv_trigger",
        "chan_recv_confirm",
        "chan_recv_closed",
        "chan_close",
        "chan_sel_wake_send",
        "chan_sel_wake_recv",
    ] {
        decls.add_var(VarDecl::chan(event).array("MAX_CHANNELS"));
    }
    decls.add_func(counted_alloc(
        "alloc_chan",
        "MAX_CHANNELS",
        "chan_count",
        &[("int", "size")],
        vec!["chan_buffer[id] = size;".to_string()],
    ));
    // Whether a send or receive registered now would complete at once.
    decls.add_func(
        FuncDecl::new("chan_can_send", "bool")
            .param("int", "c")
            .line("return c >= 0 && (chan_closed[c] || chan_sp[c] > chan_counter[c] - chan_buffer[c]);"),
    );
    decls.add_func(
        FuncDecl::new("chan_can_recv", "bool")
            .param("int", "c")
            .line("return c >= 0 && (chan_closed[c] || chan_rp[c] + chan_counter[c] > 0);"),
    );
    decls.add_func(
        FuncDecl::new("chan_parked_senders", "bool")
            .param("int", "c")
            .line("return c >= 0 && !chan_closed[c] && chan_sel_send[c] > 0;"),
    );
    decls.add_func(
        FuncDecl::new("chan_parked_receivers", "bool")
            .param("int", "c")
            .line("return c >= 0 && !chan_closed[c] && chan_sel_recv[c] > 0;"),
    );
    decls.add_func(
        FuncDecl::new("chan_offer", "void")
            .param("int", "c")
            .param("bool", "send")
            .param("int", "d")
            .line("if (c < 0) {")
            .line("    return;")
            .line("}")
            .line("if (send) {")
            .line("    chan_sel_send[c] += d;")
            .line("} else {")
            .line("    chan_sel_recv[c] += d;")
            .line("}"),
    );
    decls.add_func(
        FuncDecl::new("chan_len", "int")
            .param("int", "c")
            .line("int n;")
            .line("if (c < 0) {")
            .line("    return 0;")
            .line("}")
            .line("n = chan_counter[c] - chan_sp[c] + chan_rp[c];")
            .line("return n > 0 ? n : 0;"),
    );

    model.add_process(channel_process());
    instantiate(model, CHANNEL_PROCESS, count);
}

fn channel_process() -> Process {
    let mut p = Process::new(CHANNEL_PROCESS).param("const int", "id");
    let open = p.add_state("open", StateKind::Normal);
    let closed = p.add_state("closed", StateKind::Normal);
    let bad = p.add_state("bad", StateKind::Normal);
    p.initial = open;

    let counter = "chan_counter[id]";
    let sp = "chan_sp[id]";
    let rp = "chan_rp[id]";

    for state in [open, closed] {
        p.add_transition(
            Transition::new(state, state)
                .accept("chan_recv_trigger[id]")
                .updates([format!("{counter}--"), format!("{rp}++")]),
        );
        p.add_transition(
            Transition::new(state, state)
                .guard(format!("{rp} > -{counter}"))
                .accept("chan_recv_confirm[id]")
                .update(format!("{rp}--")),
        );
    }

    p.add_transition(
        Transition::new(open, open)
            .accept("chan_send_trigger[id]")
            .updates([format!("{counter}++"), format!("{sp}++")]),
    );
    p.add_transition(
        Transition::new(open, open)
            .guard(format!("{sp} > {counter} - chan_buffer[id]"))
            .accept("chan_send_confirm[id]")
            .update(format!("{sp}--")),
    );
    p.add_transition(
        Transition::new(open, closed)
            .guard(format!("{sp} == 0"))
            .accept("chan_close[id]")
            .update("chan_closed[id] = true"),
    );

    // Receivers left unmatched after close drain with the zero value.
    p.add_transition(
        Transition::new(closed, closed)
            .guard(format!("{rp} > 0 && {rp} + {counter} <= 0"))
            .accept("chan_recv_closed[id]")
            .updates([format!("{rp}--"), format!("{counter}++")]),
    );
    p.add_transition(Transition::new(closed, bad).accept("chan_send_trigger[id]"));
    p.add_transition(Transition::new(closed, bad).accept("chan_close[id]"));
    p
}

/// Readers and writers first register, then wait for a grant. Unlocking a
/// mutex that is not held in the matching mode is misuse.
pub(crate) fn declare_mutexes(model: &mut Model, count: usize) {
    if count == 0 {
        return;
    }
    let decls = &mut model.declarations;
    decls.add_var(VarDecl::constant("MAX_MUTEXES", count as i64));
    decls.add_var(VarDecl::int("mutex_count").with_init("0"));
    for name in [
        "mutex_readers",
        "mutex_pending_readers",
        "mutex_pending_writers",
    ] {
        decls.add_var(VarDecl::int(name).array("MAX_MUTEXES"));
    }
    for event in [
        "mutex_lock_req",
        "mutex_lock_grant",
        "mutex_rlock_req",
        "mutex_rlock_grant",
        "mutex_unlock",
        "mutex_runlock",
    ] {
        decls.add_var(VarDecl::chan(event).array("MAX_MUTEXES"));
    }
    decls.add_func(counted_alloc(
        "alloc_mutex",
        "MAX_MUTEXES",
        "mutex_count",
        &[],
        Vec::new(),
    ));

    model.add_process(mutex_process());
    instantiate(model, MUTEX_PROCESS, count);
}

fn mutex_process() -> Process {
    let mut p = Process::new(MUTEX_PROCESS).param("const int", "id");
    let idle = p.add_state("idle", StateKind::Normal);
    let locked = p.add_state("locked", StateKind::Normal);
    let read_locked = p.add_state("read_locked", StateKind::Normal);
    let promoting = p.add_state("promoting", StateKind::Committed);
    let bad = p.add_state("bad", StateKind::Normal);
    p.initial = idle;

    let readers = "mutex_readers[id]";
    let pending_readers = "mutex_pending_readers[id]";
    let pending_writers = "mutex_pending_writers[id]";

    for state in [idle, locked, read_locked] {
        p.add_transition(
            Transition::new(state, state)
                .accept("mutex_lock_req[id]")
                .update(format!("{pending_writers}++")),
        );
        p.add_transition(
            Transition::new(state, state)
                .accept("mutex_rlock_req[id]")
                .update(format!("{pending_readers}++")),
        );
    }

    p.add_transition(
        Transition::new(idle, locked)
            .guard(format!("{pending_writers} > 0"))
            .accept("mutex_lock_grant[id]")
            .update(format!("{pending_writers}--")),
    );
    for state in [idle, read_locked] {
        p.add_transition(
            Transition::new(state, read_locked)
                .guard(format!("{pending_readers} > 0 && {pending_writers} == 0"))
                .accept("mutex_rlock_grant[id]")
                .updates([format!("{pending_readers}--"), format!("{readers}++")]),
        );
    }

    p.add_transition(Transition::new(locked, idle).accept("mutex_unlock[id]"));
    p.add_transition(
        Transition::new(read_locked, read_locked)
            .guard(format!("{readers} > 1"))
            .accept("mutex_runlock[id]")
            .update(format!("{readers}--")),
    );
    p.add_transition(
        Transition::new(read_locked, idle)
            .guard(format!("{readers} == 1 && {pending_writers} == 0"))
            .accept("mutex_runlock[id]")
            .update(format!("{readers}--")),
    );
    p.add_transition(
        Transition::new(read_locked, promoting)
            .guard(format!("{readers} == 1 && {pending_writers} > 0"))
            .accept("mutex_runlock[id]")
            .update(format!("{readers}--")),
    );
    p.add_transition(
        Transition::new(promoting, locked)
            .accept("mutex_lock_grant[id]")
            .update(format!("{pending_writers}--")),
    );

    p.add_transition(Transition::new(idle, bad).accept("mutex_unlock[id]"));
    p.add_transition(Transition::new(idle, bad).accept("mutex_runlock[id]"));
    p.add_transition(Transition::new(locked, bad).accept("mutex_runlock[id]"));
    p.add_transition(Transition::new(read_locked, bad).accept("mutex_unlock[id]"));
    p
}

/// `wg_delta` carries the argument of `Add`; callers set it from a
/// committed state right before synchronizing.
pub(crate) fn declare_wait_groups(model: &mut Model, count: usize) {
    if count == 0 {
        return;
    }
    let decls = &mut model.declarations;
    decls.add_var(VarDecl::constant("MAX_WAIT_GROUPS", count as i64));
    decls.add_var(VarDecl::int("wg_count").with_init("0"));
    decls.add_var(VarDecl::int("wg_counter").array("MAX_WAIT_GROUPS"));
    decls.add_var(VarDecl::int("wg_waiters").array("MAX_WAIT_GROUPS"));
    decls.add_var(VarDecl::int("wg_delta").with_init("0"));
    decls.add_var(VarDecl::chan("wg_add").array("MAX_WAIT_GROUPS"));
    decls.add_var(VarDecl::chan("wg_wait_req").array("MAX_WAIT_GROUPS"));
    decls.add_var(VarDecl::broadcast("wg_release").array("MAX_WAIT_GROUPS"));
    decls.add_func(counted_alloc(
        "alloc_wait_group",
        "MAX_WAIT_GROUPS",
        "wg_count",
        &[],
        Vec::new(),
    ));

    model.add_process(wait_group_process());
    instantiate(model, WAIT_GROUP_PROCESS, count);
}

fn wait_group_process() -> Process {
    let mut p = Process::new(WAIT_GROUP_PROCESS).param("const int", "id");
    let active = p.add_state("active", StateKind::Normal);
    let bad = p.add_state("bad", StateKind::Normal);
    p.initial = active;

    p.add_transition(
        Transition::new(active, active)
            .guard("wg_counter[id] + wg_delta >= 0")
            .accept("wg_add[id]")
            .update("wg_counter[id] += wg_delta"),
    );
    p.add_transition(
        Transition::new(active, bad)
            .guard("wg_counter[id] + wg_delta < 0")
            .accept("wg_add[id]")
            .update("wg_counter[id] += wg_delta"),
    );
    p.add_transition(
        Transition::new(active, active)
            .accept("wg_wait_req[id]")
            .update("wg_waiters[id]++"),
    );
    p.add_transition(
        Transition::new(active, active)
            .guard("wg_counter[id] == 0 && wg_waiters[id] > 0")
            .emit("wg_release[id]")
            .update("wg_waiters[id] = 0"),
    );
    p
}

pub(crate) fn declare_onces(decls: &mut Declarations, count: usize) {
    if count == 0 {
        return;
    }
    decls.add_var(VarDecl::constant("MAX_ONCES", count as i64));
    decls.add_var(VarDecl::int("once_count").with_init("0"));
    decls.add_var(
        VarDecl::int("once_state")
            .bounded(ONCE_NEVER, ONCE_DONE)
            .array("MAX_ONCES"),
    );
    decls.add_func(counted_alloc(
        "alloc_once",
        "MAX_ONCES",
        "once_count",
        &[],
        Vec::new(),
    ));
}
