//! Behaviour of generated models, checked by exploring every reachable
//! configuration.

mod common;

use common::*;
use rendezvous_ir::{
    Body, CallStmt, ChanCommOp, FuncId, MutexOpKind, Program, ProgramBuilder, SelectCase,
    SelectStmt, Span, Stmt, Value, VarId, WaitGroupOpKind,
};

fn make(c: VarId, buffer: i64) -> Stmt {
    Stmt::MakeChan {
        target: Value::Var(c),
        buffer: Value::Int(buffer),
    }
}

fn send_op(c: VarId) -> ChanCommOp {
    ChanCommOp::Send {
        chan: Value::Var(c),
        value: Value::Int(1),
    }
}

fn recv_op(c: VarId) -> ChanCommOp {
    ChanCommOp::Receive {
        chan: Value::Var(c),
        target: None,
        ok: None,
    }
}

fn send(c: VarId) -> Stmt {
    Stmt::ChanOp(send_op(c))
}

fn recv(c: VarId) -> Stmt {
    Stmt::ChanOp(recv_op(c))
}

fn select(ops: Vec<ChanCommOp>, default: bool) -> Stmt {
    let cases = ops
        .into_iter()
        .map(|op| SelectCase {
            op,
            body: Body::default(),
            annotations: Vec::new(),
            span: Span::new(0, 0),
        })
        .collect();
    Stmt::Select(SelectStmt {
        cases,
        default: default.then(Body::default),
        label: None,
    })
}

fn spawn(func: FuncId, arg: VarId) -> Stmt {
    Stmt::Call(CallStmt::spawn(func).with_args(vec![Value::Var(arg)]))
}

fn mutex(m: VarId, op: MutexOpKind) -> Stmt {
    Stmt::MutexOp {
        mutex: Value::Var(m),
        op,
    }
}

fn wait_group(w: VarId, op: WaitGroupOpKind) -> Stmt {
    Stmt::WaitGroupOp {
        wait_group: Value::Var(w),
        op,
    }
}

/// `main` alone, making one channel per entry of `buffers` first.
fn channels(buffers: &[i64], body: impl FnOnce(&[VarId]) -> Vec<Stmt>) -> Program {
    let mut b = ProgramBuilder::new("chans");
    let chan = b.chan();
    let main = b.func("main");
    b.set_entry(main);
    let chans: Vec<VarId> = (0..buffers.len())
        .map(|i| b.local(main, format!("c{i}"), chan))
        .collect();
    let mut stmts: Vec<Stmt> = chans.iter().zip(buffers).map(|(&c, &n)| make(c, n)).collect();
    stmts.extend(body(&chans));
    b.set_body(main, Body::from_stmts(stmts));
    b.build()
}

/// State names handed out for the `k`-th use of `base` in one process.
fn numbered(base: &str, k: usize) -> String {
    if k == 1 {
        base.to_string()
    } else {
        format!("{base}_{k}")
    }
}

fn past_send(loc: &str) -> bool {
    !matches!(loc, "starting" | "started" | "body" | "send_wait")
}

#[test]
fn buffered_sends_and_receives_up_to_capacity_all_complete() {
    for capacity in 1..=2 {
        let program = channels(&[capacity], |c| {
            let mut ops: Vec<Stmt> = (0..capacity).map(|_| send(c[0])).collect();
            ops.extend((0..capacity).map(|_| recv(c[0])));
            ops
        });
        let ex = explorer(&program);
        let space = ex.explore();
        assert!(space.any(|v| v.main_ended()), "capacity {capacity}");
        assert!(space.deadlocks().all(|v| v.main_ended()));
        assert!(space
            .deadlocks()
            .all(|v| v.elem("chan_counter", &[0]) == 0 && v.elem("chan_sp", &[0]) == 0));
        assert!(!space.reaches("Channel_0", "bad"));
    }
}

#[test]
fn send_beyond_capacity_is_never_confirmed() {
    for capacity in 0..=2 {
        let extra = capacity as usize + 1;
        let program = channels(&[capacity], |c| (0..extra).map(|_| send(c[0])).collect());
        let ex = explorer(&program);
        let space = ex.explore();
        let wait = numbered("send_wait", extra);
        assert!(space.reaches("main_0", &wait), "capacity {capacity}");
        assert!(!space.reaches("main_0", &numbered("sent", extra)));
        assert!(!space.any(|v| v.main_ended()));
        assert!(space.deadlocks().all(|v| v.at("main_0") == wait));
    }
}

#[test]
fn receive_after_close_drains_with_the_zero_value() {
    let program = channels(&[0], |c| {
        vec![
            Stmt::CloseChan {
                chan: Value::Var(c[0]),
            },
            recv(c[0]),
        ]
    });
    let ex = explorer(&program);
    let space = ex.explore();
    assert!(space.reaches("main_0", "received"));
    assert!(space.deadlocks().all(|v| v.main_ended()));
    assert!(!space.reaches("Channel_0", "bad"));
}

#[test]
fn send_on_closed_channel_is_flagged() {
    let program = channels(&[1], |c| {
        vec![
            Stmt::CloseChan {
                chan: Value::Var(c[0]),
            },
            send(c[0]),
        ]
    });
    let ex = explorer(&program);
    assert!(ex.explore().reaches("Channel_0", "bad"));
}

#[test]
fn select_never_pairs_with_itself() {
    let program = channels(&[0], |c| vec![select(vec![send_op(c[0]), recv_op(c[0])], false)]);
    let ex = explorer(&program);
    let space = ex.explore();
    assert!(!space.reaches("main_0", "sel0_case0"));
    assert!(!space.reaches("main_0", "sel0_case1"));
    assert!(space.all(|v| {
        v.elem("chan_counter", &[0]) == 0 && v.elem("chan_sp", &[0]) == 0 && v.elem("chan_rp", &[0]) == 0
    }));
    let stuck: Vec<&str> = space.deadlocks().map(|v| v.at("main_0")).collect();
    assert_eq!(stuck, vec!["sel0_blocked"]);
}

#[test]
fn select_on_its_own_channel_falls_to_default() {
    let program = channels(&[0], |c| vec![select(vec![send_op(c[0]), recv_op(c[0])], true)]);
    let ex = explorer(&program);
    let space = ex.explore();
    assert!(space.reaches("main_0", "sel0_default"));
    assert!(!space.reaches("main_0", "sel0_case0"));
    assert!(!space.reaches("main_0", "sel0_case1"));
    assert!(space.deadlocks().all(|v| v.main_ended()));
}

#[test]
fn select_sends_into_free_buffer_space() {
    let program = channels(&[1], |c| vec![select(vec![send_op(c[0]), recv_op(c[0])], false)]);
    let ex = explorer(&program);
    let space = ex.explore();
    assert!(space.reaches("main_0", "sel0_case0"));
    assert!(!space.reaches("main_0", "sel0_case1"));
    assert!(space.deadlocks().all(|v| v.main_ended() && v.elem("chan_counter", &[0]) == 1));
}

#[test]
fn simultaneously_ready_cases_can_each_be_taken() {
    let program = channels(&[1, 1], |c| {
        vec![
            send(c[0]),
            send(c[1]),
            select(vec![recv_op(c[0]), recv_op(c[1])], false),
        ]
    });
    let ex = explorer(&program);
    let space = ex.explore();
    assert!(space.reaches("main_0", "sel0_case0"));
    assert!(space.reaches("main_0", "sel0_case1"));
    assert!(!space.reaches("main_0", "sel0_blocked"));
    assert!(space.deadlocks().all(|v| v.main_ended()));

    let program = channels(&[1, 1], |c| {
        vec![
            send(c[0]),
            send(c[1]),
            select(vec![recv_op(c[0]), recv_op(c[1])], true),
        ]
    });
    let ex = explorer(&program);
    let space = ex.explore();
    assert!(space.reaches("main_0", "sel0_case0"));
    assert!(space.reaches("main_0", "sel0_case1"));
    assert!(!space.reaches("main_0", "sel0_default"));
}

#[test]
fn parked_select_takes_exactly_one_message() {
    let mut b = ProgramBuilder::new("parked");
    let chan = b.chan();
    let main = b.func("main");
    let sender = b.func("sender");
    b.set_entry(main);
    let c = b.local(main, "c", chan);
    let d = b.local(main, "d", chan);
    let ch = b.param(sender, "ch", chan);
    b.set_body(
        main,
        Body::from_stmts(vec![
            make(c, 0),
            make(d, 0),
            spawn(sender, c),
            spawn(sender, d),
            select(vec![recv_op(c), recv_op(d)], false),
        ]),
    );
    b.set_body(sender, Body::from_stmts(vec![send(ch)]));
    let ex = explorer(&b.build());
    let space = ex.explore();

    let delivered = |v: &View<'_>| {
        ["sender_0", "sender_1"]
            .iter()
            .filter(|s| past_send(v.at(s)))
            .count()
    };
    assert!(space.all(|v| delivered(v) <= 1));
    assert!(space.reaches("main_0", "sel0_blocked"));
    assert!(space.reaches("main_0", "sel0_case0"));
    assert!(space.reaches("main_0", "sel0_case1"));
    // Withdrawn offers leave nothing behind for a later sender to match.
    assert!(space.all(|v| {
        !v.main_ended()
            || (0..2).all(|i| v.elem("chan_rp", &[i]) == 0 && v.elem("chan_sel_recv", &[i]) == 0)
    }));
    assert!(space
        .deadlocks()
        .all(|v| v.main_ended() && delivered(&v) == 1));
}

#[test]
fn parked_selects_hand_over_directly() {
    let mut b = ProgramBuilder::new("handover");
    let chan = b.chan();
    let main = b.func("main");
    let peer = b.func("peer");
    b.set_entry(main);
    let c = b.local(main, "c", chan);
    let ch = b.param(peer, "ch", chan);
    b.set_body(
        main,
        Body::from_stmts(vec![
            make(c, 0),
            spawn(peer, c),
            select(vec![send_op(c)], false),
        ]),
    );
    b.set_body(peer, Body::from_stmts(vec![select(vec![recv_op(ch)], false)]));
    let ex = explorer(&b.build());
    let space = ex.explore();

    assert!(space.reaches("main_0", "sel0_case0"));
    assert!(space.reaches("peer_0", "sel0_case0"));
    assert!(space.reaches("main_0", "sel0_blocked"));
    assert!(space.reaches("peer_0", "sel0_blocked"));
    // Neither side ever registers on the channel itself.
    assert!(space.all(|v| v.elem("chan_counter", &[0]) == 0));
    assert!(space
        .deadlocks()
        .all(|v| v.main_ended() && v.at("peer_0") == "ended"));
}

#[test]
fn blocked_select_wakes_for_a_plain_sender() {
    let mut b = ProgramBuilder::new("wake");
    let chan = b.chan();
    let main = b.func("main");
    let sender = b.func("sender");
    b.set_entry(main);
    let c = b.local(main, "c", chan);
    let ch = b.param(sender, "ch", chan);
    b.set_body(
        main,
        Body::from_stmts(vec![
            make(c, 0),
            spawn(sender, c),
            select(vec![recv_op(c)], false),
        ]),
    );
    b.set_body(sender, Body::from_stmts(vec![send(ch)]));
    let ex = explorer(&b.build());
    let space = ex.explore();
    assert!(space.reaches("main_0", "sel0_blocked"));
    assert!(space
        .deadlocks()
        .all(|v| v.main_ended() && v.at("sender_0") == "ended"));
    assert!(space.deadlocks().all(|v| v.elem("chan_counter", &[0]) == 0));
}

fn wait_group_program(ops: Vec<WaitGroupOpKind>) -> Program {
    let mut b = ProgramBuilder::new("wg");
    let wg_ty = b.wait_group();
    let main = b.func("main");
    b.set_entry(main);
    let wg = b.local(main, "wg", wg_ty);
    let stmts = ops.into_iter().map(|op| wait_group(wg, op)).collect();
    b.set_body(main, Body::from_stmts(stmts));
    b.build()
}

#[test]
fn add_done_done_wait_completes_cleanly() {
    let program = wait_group_program(vec![
        WaitGroupOpKind::Add(Value::Int(2)),
        WaitGroupOpKind::Done,
        WaitGroupOpKind::Done,
        WaitGroupOpKind::Wait,
    ]);
    let ex = explorer(&program);
    let space = ex.explore();
    assert!(!space.reaches("WaitGroup_0", "bad"));
    assert!(space.any(|v| v.main_ended()));
    assert!(space
        .deadlocks()
        .all(|v| v.main_ended() && v.elem("wg_counter", &[0]) == 0));
}

#[test]
fn wait_blocks_while_a_done_is_outstanding() {
    let program = wait_group_program(vec![
        WaitGroupOpKind::Add(Value::Int(2)),
        WaitGroupOpKind::Done,
        WaitGroupOpKind::Wait,
    ]);
    let ex = explorer(&program);
    let space = ex.explore();
    assert!(!space.reaches("main_0", "wg_released"));
    assert!(!space.any(|v| v.main_ended()));
    assert!(space.deadlocks().all(|v| v.at("main_0") == "wg_wait"));
    assert!(!space.reaches("WaitGroup_0", "bad"));
}

#[test]
fn negative_counter_is_flagged() {
    let program = wait_group_program(vec![WaitGroupOpKind::Done]);
    let ex = explorer(&program);
    assert!(ex.explore().reaches("WaitGroup_0", "bad"));
}

#[test]
fn wait_releases_only_after_every_worker_is_done() {
    let mut b = ProgramBuilder::new("workers");
    let wg_ty = b.wait_group();
    let main = b.func("main");
    let worker = b.func("worker");
    b.set_entry(main);
    let wg = b.local(main, "wg", wg_ty);
    let w = b.param(worker, "w", wg_ty);
    b.set_body(
        main,
        Body::from_stmts(vec![
            wait_group(wg, WaitGroupOpKind::Add(Value::Int(2))),
            spawn(worker, wg),
            spawn(worker, wg),
            wait_group(wg, WaitGroupOpKind::Wait),
        ]),
    );
    b.set_body(worker, Body::from_stmts(vec![wait_group(w, WaitGroupOpKind::Done)]));
    let ex = explorer(&b.build());
    let space = ex.explore();

    let done = |loc: &str| !matches!(loc, "starting" | "started" | "body" | "wg_delta");
    assert!(space.all(|v| {
        v.at("main_0") != "wg_released" || (done(v.at("worker_0")) && done(v.at("worker_1")))
    }));
    assert!(space.reaches("main_0", "wg_released"));
    assert!(!space.reaches("WaitGroup_0", "bad"));
    assert!(space.deadlocks().all(|v| v.main_ended()));
}

fn mutex_program(ops: Vec<MutexOpKind>) -> Program {
    let mut b = ProgramBuilder::new("mu");
    let mutex_ty = b.mutex();
    let main = b.func("main");
    b.set_entry(main);
    let mu = b.local(main, "mu", mutex_ty);
    let stmts = ops.into_iter().map(|op| mutex(mu, op)).collect();
    b.set_body(main, Body::from_stmts(stmts));
    b.build()
}

#[test]
fn well_nested_locking_is_never_misuse() {
    let program = mutex_program(vec![
        MutexOpKind::Lock,
        MutexOpKind::Unlock,
        MutexOpKind::RLock,
        MutexOpKind::RLock,
        MutexOpKind::RUnlock,
        MutexOpKind::RUnlock,
        MutexOpKind::Lock,
        MutexOpKind::Unlock,
    ]);
    let ex = explorer(&program);
    let space = ex.explore();
    assert!(!space.reaches("Mutex_0", "bad"));
    assert!(space.any(|v| v.main_ended()));
    assert!(space.deadlocks().all(|v| v.main_ended()));
    assert!(space.deadlocks().all(|v| v.at("Mutex_0") == "idle"));
}

#[test]
fn unlocking_a_free_mutex_is_flagged() {
    let ex = explorer(&mutex_program(vec![MutexOpKind::Unlock]));
    assert!(ex.explore().reaches("Mutex_0", "bad"));
    let ex = explorer(&mutex_program(vec![MutexOpKind::Lock, MutexOpKind::RUnlock]));
    assert!(ex.explore().reaches("Mutex_0", "bad"));
}

#[test]
fn lock_excludes_other_holders() {
    let mut b = ProgramBuilder::new("exclusive");
    let mutex_ty = b.mutex();
    let main = b.func("main");
    let worker = b.func("worker");
    b.set_entry(main);
    let mu = b.local(main, "mu", mutex_ty);
    let m = b.param(worker, "m", mutex_ty);
    b.set_body(
        main,
        Body::from_stmts(vec![
            spawn(worker, mu),
            mutex(mu, MutexOpKind::Lock),
            mutex(mu, MutexOpKind::Unlock),
        ]),
    );
    b.set_body(
        worker,
        Body::from_stmts(vec![mutex(m, MutexOpKind::Lock), mutex(m, MutexOpKind::Unlock)]),
    );
    let ex = explorer(&b.build());
    let space = ex.explore();
    assert!(space.reaches("main_0", "locked"));
    assert!(space.reaches("worker_0", "locked"));
    assert!(!space.any(|v| v.at("main_0") == "locked" && v.at("worker_0") == "locked"));
    assert!(!space.reaches("Mutex_0", "bad"));
    assert!(space.deadlocks().all(|v| v.main_ended() && v.at("worker_0") == "ended"));
}

/// `main` defers `cleanup`, then panics. `cleanup` either recovers itself
/// or leaves that to a helper it calls.
fn deferred_recovery(direct: bool) -> Program {
    let mut b = ProgramBuilder::new("recover");
    let main = b.func("main");
    let cleanup = b.func("cleanup");
    let helper = b.func("helper");
    b.set_entry(main);
    b.set_body(
        main,
        Body::from_stmts(vec![
            Stmt::Call(CallStmt::deferred(cleanup)),
            Stmt::Return {
                values: Vec::new(),
                panics: true,
            },
        ]),
    );
    let recover = Stmt::Recover { target: None };
    if direct {
        b.set_body(cleanup, Body::from_stmts(vec![recover]));
    } else {
        b.set_body(cleanup, Body::from_stmts(vec![Stmt::Call(CallStmt::sync(helper))]));
        b.set_body(helper, Body::from_stmts(vec![recover]));
    }
    b.build()
}

#[test]
fn deferred_recover_stops_the_panic() {
    let ex = explorer(&deferred_recovery(true));
    let space = ex.explore();
    assert!(space.any(|v| v.elem("main_panicking", &[0]) == 1));
    assert!(space.any(|v| v.main_ended()));
    assert!(space
        .deadlocks()
        .all(|v| v.main_ended() && v.elem("main_panicking", &[0]) == 0));
}

#[test]
fn recover_one_call_deeper_does_not_stop_the_panic() {
    let ex = explorer(&deferred_recovery(false));
    let space = ex.explore();
    assert!(space.any(|v| v.main_ended()));
    assert!(space
        .deadlocks()
        .all(|v| v.main_ended() && v.elem("main_panicking", &[0]) == 1));
}
