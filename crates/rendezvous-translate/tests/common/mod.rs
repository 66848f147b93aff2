#![allow(dead_code)]

//! Explicit-state exploration of generated models.
//!
//! Guards, updates and helper routines are interpreted over a flat store of
//! integers, so tests can check what a network of automata actually does
//! instead of only how it is shaped. Binary events pair one emitter with one
//! acceptor in a different instance, broadcast events take every enabled
//! acceptor, and while any instance sits in a committed state only
//! transitions involving a committed instance may fire.

use std::collections::{HashMap, HashSet};

use rendezvous_automata::{Model, StateKind, SyncDir, VarDecl, VarKind};
use rendezvous_ir::Program;
use rendezvous_translate::{translate_program, TranslateOptions};

const STATE_LIMIT: usize = 200_000;

pub fn model_of(program: &Program) -> Model {
    translate_program(program, 1000, &TranslateOptions::default())
        .unwrap()
        .model
}

#[derive(Debug, Clone, PartialEq)]
enum Tok {
    Num(i64),
    Ident(String),
    Op(&'static str),
}

const OPS: &[&str] = &[
    "&&", "||", "==", "!=", "<=", ">=", "++", "--", "+=", "-=", "<", ">", "+", "-", "*", "/", "%",
    "!", "?", ":", "(", ")", "[", "]", "{", "}", ",", ";", "=",
];

fn lex(src: &str) -> Vec<Tok> {
    let chars: Vec<char> = src.chars().collect();
    let mut toks = Vec::new();
    let mut i = 0;
    'next: while i < chars.len() {
        let c = chars[i];
        if c.is_whitespace() {
            i += 1;
            continue;
        }
        if c.is_ascii_digit() {
            let start = i;
            while i < chars.len() && chars[i].is_ascii_digit() {
                i += 1;
            }
            let text: String = chars[start..i].iter().collect();
            toks.push(Tok::Num(text.parse().unwrap()));
            continue;
        }
        if c.is_ascii_alphabetic() || c == '_' {
            let start = i;
            while i < chars.len() && (chars[i].is_ascii_alphanumeric() || chars[i] == '_') {
                i += 1;
            }
            let word: String = chars[start..i].iter().collect();
            toks.push(match word.as_str() {
                "true" => Tok::Num(1),
                "false" => Tok::Num(0),
                _ => Tok::Ident(word),
            });
            continue;
        }
        for &op in OPS {
            let len = op.len();
            if i + len <= chars.len() && chars[i..i + len].iter().copied().eq(op.chars()) {
                toks.push(Tok::Op(op));
                i += len;
                continue 'next;
            }
        }
        panic!("unexpected {c:?} in {src:?}");
    }
    toks
}

#[derive(Debug, Clone)]
enum Expr {
    Num(i64),
    Var(String, Vec<Expr>),
    Call(String, Vec<Expr>),
    Neg(Box<Expr>),
    Not(Box<Expr>),
    Bin(&'static str, Box<Expr>, Box<Expr>),
    Cond(Box<Expr>, Box<Expr>, Box<Expr>),
}

#[derive(Debug, Clone)]
enum Code {
    Decl(String, Option<Expr>),
    Assign(Expr, &'static str, Option<Expr>),
    Eval(Expr),
    If(Expr, Vec<Code>, Vec<Code>),
    For(String, Expr, Expr, Vec<Code>),
    Return(Option<Expr>),
}

/// Binary operators, loosest first.
const LEVELS: [&[&str]; 6] = [
    &["||"],
    &["&&"],
    &["==", "!="],
    &["<", "<=", ">", ">="],
    &["+", "-"],
    &["*", "/", "%"],
];

struct Parser {
    toks: Vec<Tok>,
    pos: usize,
}

impl Parser {
    fn new(src: &str) -> Self {
        Self {
            toks: lex(src),
            pos: 0,
        }
    }

    fn done(&self) -> bool {
        self.pos == self.toks.len()
    }

    fn peek(&self) -> Option<&Tok> {
        self.toks.get(self.pos)
    }

    fn bump(&mut self) -> Tok {
        let tok = self
            .toks
            .get(self.pos)
            .cloned()
            .unwrap_or_else(|| panic!("unexpected end of input"));
        self.pos += 1;
        tok
    }

    fn eat(&mut self, op: &str) -> bool {
        if matches!(self.peek(), Some(Tok::Op(o)) if *o == op) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, op: &str) {
        assert!(self.eat(op), "expected `{op}`, found {:?}", self.peek());
    }

    fn keyword(&mut self, word: &str) -> bool {
        if matches!(self.peek(), Some(Tok::Ident(w)) if w == word) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn ident(&mut self) -> String {
        match self.bump() {
            Tok::Ident(name) => name,
            other => panic!("expected an identifier, found {other:?}"),
        }
    }

    fn expr(&mut self) -> Expr {
        let cond = self.binary(0);
        if self.eat("?") {
            let then = self.expr();
            self.expect(":");
            let other = self.expr();
            Expr::Cond(Box::new(cond), Box::new(then), Box::new(other))
        } else {
            cond
        }
    }

    fn binary(&mut self, level: usize) -> Expr {
        if level == LEVELS.len() {
            return self.unary();
        }
        let mut lhs = self.binary(level + 1);
        while let Some(&Tok::Op(op)) = self.peek() {
            if !LEVELS[level].contains(&op) {
                break;
            }
            self.pos += 1;
            let rhs = self.binary(level + 1);
            lhs = Expr::Bin(op, Box::new(lhs), Box::new(rhs));
        }
        lhs
    }

    fn unary(&mut self) -> Expr {
        if self.eat("!") {
            Expr::Not(Box::new(self.unary()))
        } else if self.eat("-") {
            Expr::Neg(Box::new(self.unary()))
        } else {
            self.primary()
        }
    }

    fn primary(&mut self) -> Expr {
        match self.bump() {
            Tok::Num(n) => Expr::Num(n),
            Tok::Op("(") => {
                let inner = self.expr();
                self.expect(")");
                inner
            }
            Tok::Ident(name) => {
                if self.eat("(") {
                    let mut args = Vec::new();
                    if !self.eat(")") {
                        loop {
                            args.push(self.expr());
                            if self.eat(")") {
                                break;
                            }
                            self.expect(",");
                        }
                    }
                    Expr::Call(name, args)
                } else {
                    let mut index = Vec::new();
                    while self.eat("[") {
                        index.push(self.expr());
                        self.expect("]");
                    }
                    Expr::Var(name, index)
                }
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    fn stmt(&mut self) -> Code {
        if self.keyword("int") || self.keyword("bool") {
            let name = self.ident();
            let init = if self.eat("=") { Some(self.expr()) } else { None };
            self.expect(";");
            return Code::Decl(name, init);
        }
        if self.keyword("if") {
            self.expect("(");
            let cond = self.expr();
            self.expect(")");
            let then = self.block();
            let other = if !self.keyword("else") {
                Vec::new()
            } else if matches!(self.peek(), Some(Tok::Op("{"))) {
                self.block()
            } else {
                vec![self.stmt()]
            };
            return Code::If(cond, then, other);
        }
        if self.keyword("for") {
            self.expect("(");
            let var = self.ident();
            self.expect(":");
            assert!(self.keyword("int"), "only integer ranges are iterated");
            self.expect("[");
            let lo = self.expr();
            self.expect(",");
            let hi = self.expr();
            self.expect("]");
            self.expect(")");
            let body = self.block();
            return Code::For(var, lo, hi, body);
        }
        if self.keyword("return") {
            if self.eat(";") {
                return Code::Return(None);
            }
            let value = self.expr();
            self.expect(";");
            return Code::Return(Some(value));
        }
        let code = self.simple();
        self.expect(";");
        code
    }

    fn simple(&mut self) -> Code {
        let target = self.expr();
        for op in ["=", "+=", "-="] {
            if self.eat(op) {
                let value = self.expr();
                return Code::Assign(target, op, Some(value));
            }
        }
        for op in ["++", "--"] {
            if self.eat(op) {
                return Code::Assign(target, op, None);
            }
        }
        Code::Eval(target)
    }

    fn block(&mut self) -> Vec<Code> {
        self.expect("{");
        let mut body = Vec::new();
        while !self.eat("}") {
            body.push(self.stmt());
        }
        body
    }
}

fn parse_expr(src: &str) -> Expr {
    let mut p = Parser::new(src);
    let e = p.expr();
    assert!(p.done(), "trailing input in {src:?}");
    e
}

fn parse_update(src: &str) -> Code {
    let mut p = Parser::new(src);
    let code = p.simple();
    assert!(p.done(), "trailing input in {src:?}");
    code
}

fn parse_body(lines: &[String]) -> Vec<Code> {
    let mut p = Parser::new(&lines.join("\n"));
    let mut body = Vec::new();
    while !p.done() {
        body.push(p.stmt());
    }
    body
}

#[derive(Debug, Clone)]
struct Slot {
    offset: usize,
    dims: Vec<usize>,
}

struct Routine {
    params: Vec<String>,
    body: Vec<Code>,
}

struct Sync {
    event: String,
    index: Vec<Expr>,
    dir: SyncDir,
}

struct Edge {
    from: usize,
    to: usize,
    guard: Option<Expr>,
    sync: Option<Sync>,
    updates: Vec<Code>,
}

struct Instance {
    name: String,
    params: HashMap<String, i64>,
    states: Vec<(String, StateKind)>,
    edges: Vec<Edge>,
}

/// One point of the state space: a location per instance and the store.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Config {
    locs: Vec<usize>,
    vars: Vec<i64>,
}

pub struct Explorer {
    consts: HashMap<String, i64>,
    slots: HashMap<String, Slot>,
    events: HashMap<String, VarKind>,
    routines: HashMap<String, Routine>,
    instances: Vec<Instance>,
    initial: Config,
}

impl Explorer {
    pub fn new(model: &Model) -> Self {
        let mut ex = Explorer {
            consts: HashMap::new(),
            slots: HashMap::new(),
            events: HashMap::new(),
            routines: HashMap::new(),
            instances: Vec::new(),
            initial: Config {
                locs: Vec::new(),
                vars: Vec::new(),
            },
        };
        let mut size = 0;
        let mut inits = Vec::new();
        for v in &model.declarations.vars {
            ex.declare(v, v.name.clone(), None, &mut size, &mut inits);
        }
        for f in &model.declarations.funcs {
            let routine = Routine {
                params: f.params.iter().map(|(_, name)| name.clone()).collect(),
                body: parse_body(&f.body),
            };
            ex.routines.insert(f.name.clone(), routine);
        }

        for (i, inst) in model.instances.iter().enumerate() {
            let process = model
                .find_process(&inst.process)
                .unwrap_or_else(|| panic!("no process {}", inst.process));
            assert!(process.decls.funcs.is_empty() && process.decls.init.is_empty());
            let params = process
                .params
                .iter()
                .zip(&inst.args)
                .map(|((_, name), arg)| (name.clone(), ex.constant(&parse_expr(arg))))
                .collect();
            for v in &process.decls.vars {
                let key = format!("{}.{}", inst.name, v.name);
                ex.declare(v, key, Some(i), &mut size, &mut inits);
            }
            let edges = process
                .transitions
                .iter()
                .map(|t| {
                    assert!(t.select.is_none(), "select bindings are not interpreted");
                    let sync = t.sync.as_ref().map(|s| match parse_expr(&s.event) {
                        Expr::Var(event, index) => Sync {
                            event,
                            index,
                            dir: s.dir,
                        },
                        other => panic!("event {other:?} is not a channel"),
                    });
                    Edge {
                        from: t.from,
                        to: t.to,
                        guard: t.guard.as_deref().map(parse_expr),
                        sync,
                        updates: t.updates.iter().map(|u| parse_update(u)).collect(),
                    }
                })
                .collect();
            ex.instances.push(Instance {
                name: inst.name.clone(),
                params,
                states: process
                    .states
                    .iter()
                    .map(|s| (s.name.clone(), s.kind))
                    .collect(),
                edges,
            });
        }

        let mut vars = vec![0; size];
        let init = parse_body(&model.declarations.init);
        {
            let mut m = Machine::new(&ex, &mut vars, None);
            for (offset, inst, value) in &inits {
                m.inst = *inst;
                let v = m.eval(value);
                m.vars[*offset] = v;
            }
            m.inst = None;
            m.frames.push(HashMap::new());
            m.run(&init);
        }
        let locs = model
            .instances
            .iter()
            .filter_map(|inst| model.find_process(&inst.process))
            .map(|p| p.initial)
            .collect();
        ex.initial = Config { locs, vars };
        ex
    }

    fn declare(
        &mut self,
        v: &VarDecl,
        key: String,
        inst: Option<usize>,
        size: &mut usize,
        inits: &mut Vec<(usize, Option<usize>, Expr)>,
    ) {
        match v.kind {
            VarKind::Chan | VarKind::BroadcastChan | VarKind::UrgentChan => {
                self.events.insert(v.name.clone(), v.kind);
            }
            VarKind::Clock => panic!("clock {} is not interpreted", v.name),
            VarKind::Int | VarKind::Bool if v.constant => {
                let value = self.constant(&parse_expr(v.init.as_deref().unwrap_or("0")));
                self.consts.insert(key, value);
            }
            VarKind::Int | VarKind::Bool => {
                let dims: Vec<usize> = v
                    .dims
                    .iter()
                    .map(|d| usize::try_from(self.constant(&parse_expr(d))).unwrap())
                    .collect();
                if let (true, Some(init)) = (dims.is_empty(), &v.init) {
                    inits.push((*size, inst, parse_expr(init)));
                }
                let len: usize = dims.iter().product();
                self.slots.insert(key, Slot { offset: *size, dims });
                *size += len;
            }
        }
    }

    fn constant(&self, e: &Expr) -> i64 {
        let mut none = Vec::new();
        Machine::new(self, &mut none, None).eval(e)
    }

    fn instance(&self, name: &str) -> usize {
        self.instances
            .iter()
            .position(|i| i.name == name)
            .unwrap_or_else(|| panic!("no instance {name}"))
    }

    fn holds(&self, scratch: &mut Vec<i64>, inst: usize, edge: &Edge) -> bool {
        match &edge.guard {
            Some(guard) => Machine::new(self, scratch, Some(inst)).eval(guard) != 0,
            None => true,
        }
    }

    fn event(&self, scratch: &mut Vec<i64>, inst: usize, sync: &Sync) -> (String, Vec<i64>) {
        let mut m = Machine::new(self, scratch, Some(inst));
        let index = sync.index.iter().map(|e| m.eval(e)).collect();
        (sync.event.clone(), index)
    }

    fn fire(&self, config: &Config, parts: &[(usize, &Edge)]) -> Config {
        let mut next = config.clone();
        for &(inst, edge) in parts {
            let mut m = Machine::new(self, &mut next.vars, Some(inst));
            for update in &edge.updates {
                m.exec(update);
            }
        }
        for &(inst, edge) in parts {
            next.locs[inst] = edge.to;
        }
        next
    }

    pub fn successors(&self, config: &Config) -> Vec<Config> {
        let mut scratch = config.vars.clone();
        let committed: Vec<bool> = self
            .instances
            .iter()
            .zip(&config.locs)
            .map(|(inst, &loc)| inst.states[loc].1 == StateKind::Committed)
            .collect();
        let urgent = committed.contains(&true);
        let allowed = |insts: &[usize]| !urgent || insts.iter().any(|&i| committed[i]);

        let mut out = Vec::new();
        for (i, inst) in self.instances.iter().enumerate() {
            for edge in inst.edges.iter().filter(|e| e.from == config.locs[i]) {
                if !self.holds(&mut scratch, i, edge) {
                    continue;
                }
                let sync = match &edge.sync {
                    None => {
                        if allowed(&[i]) {
                            out.push(self.fire(config, &[(i, edge)]));
                        }
                        continue;
                    }
                    Some(sync) if sync.dir == SyncDir::Accept => continue,
                    Some(sync) => sync,
                };
                let event = self.event(&mut scratch, i, sync);

                let mut acceptors: Vec<(usize, Vec<&Edge>)> = Vec::new();
                for (j, other) in self.instances.iter().enumerate() {
                    if j == i {
                        continue;
                    }
                    let mut ready = Vec::new();
                    for e in other.edges.iter().filter(|e| e.from == config.locs[j]) {
                        let Some(s) = &e.sync else { continue };
                        if s.dir != SyncDir::Accept || s.event != sync.event {
                            continue;
                        }
                        if self.event(&mut scratch, j, s) == event && self.holds(&mut scratch, j, e) {
                            ready.push(e);
                        }
                    }
                    if !ready.is_empty() {
                        acceptors.push((j, ready));
                    }
                }

                if self.events.get(&sync.event) == Some(&VarKind::BroadcastChan) {
                    let mut combos: Vec<Vec<(usize, &Edge)>> = vec![vec![(i, edge)]];
                    for (j, ready) in &acceptors {
                        combos = combos
                            .into_iter()
                            .flat_map(|combo| {
                                ready.iter().map(move |&e| {
                                    let mut c = combo.clone();
                                    c.push((*j, e));
                                    c
                                })
                            })
                            .collect();
                    }
                    for combo in combos {
                        let insts: Vec<usize> = combo.iter().map(|&(j, _)| j).collect();
                        if allowed(&insts) {
                            out.push(self.fire(config, &combo));
                        }
                    }
                } else {
                    for (j, ready) in &acceptors {
                        for &e in ready {
                            if allowed(&[i, *j]) {
                                out.push(self.fire(config, &[(i, edge), (*j, e)]));
                            }
                        }
                    }
                }
            }
        }
        out
    }

    /// Every configuration reachable from the initial one.
    pub fn explore(&self) -> StateSpace<'_> {
        let mut seen = HashSet::new();
        seen.insert(self.initial.clone());
        let mut states = vec![self.initial.clone()];
        let mut stuck = Vec::new();
        let mut next = 0;
        while next < states.len() {
            let successors = self.successors(&states[next]);
            if successors.is_empty() {
                stuck.push(next);
            }
            for s in successors {
                if seen.insert(s.clone()) {
                    states.push(s);
                    assert!(states.len() <= STATE_LIMIT, "more than {STATE_LIMIT} configurations");
                }
            }
            next += 1;
        }
        StateSpace {
            explorer: self,
            states,
            stuck,
        }
    }
}

enum Flow {
    Next,
    Return(i64),
}

enum Place {
    Frame(String),
    Fixed(i64),
    Cell(usize),
}

struct Machine<'a> {
    ex: &'a Explorer,
    vars: &'a mut Vec<i64>,
    inst: Option<usize>,
    frames: Vec<HashMap<String, i64>>,
}

impl<'a> Machine<'a> {
    fn new(ex: &'a Explorer, vars: &'a mut Vec<i64>, inst: Option<usize>) -> Self {
        Self {
            ex,
            vars,
            inst,
            frames: Vec::new(),
        }
    }

    fn place(&mut self, name: &str, index: &[Expr]) -> Place {
        let ex = self.ex;
        if self.frames.last().is_some_and(|f| f.contains_key(name)) {
            assert!(index.is_empty(), "routine local {name} is a scalar");
            return Place::Frame(name.to_string());
        }
        if let Some(i) = self.inst {
            let inst = &ex.instances[i];
            if let Some(&v) = inst.params.get(name) {
                return Place::Fixed(v);
            }
            let key = format!("{}.{name}", inst.name);
            if let Some(&v) = ex.consts.get(&key) {
                return Place::Fixed(v);
            }
            if let Some(slot) = ex.slots.get(&key) {
                return Place::Cell(self.cell(slot, index, name));
            }
        }
        if let Some(&v) = ex.consts.get(name) {
            return Place::Fixed(v);
        }
        let slot = ex
            .slots
            .get(name)
            .unwrap_or_else(|| panic!("unknown identifier {name}"));
        Place::Cell(self.cell(slot, index, name))
    }

    fn cell(&mut self, slot: &Slot, index: &[Expr], name: &str) -> usize {
        assert_eq!(index.len(), slot.dims.len(), "indices of {name}");
        let mut flat = 0;
        for (e, &dim) in index.iter().zip(&slot.dims) {
            let i = self.eval(e);
            assert!(
                (0..dim as i64).contains(&i),
                "{name} index {i} outside 0..{dim}"
            );
            flat = flat * dim + i as usize;
        }
        slot.offset + flat
    }

    fn read(&mut self, name: &str, index: &[Expr]) -> i64 {
        match self.place(name, index) {
            Place::Frame(n) => self.frames.last().map(|f| f[&n]).unwrap(),
            Place::Fixed(v) => v,
            Place::Cell(i) => self.vars[i],
        }
    }

    fn write(&mut self, target: &Expr, value: i64) {
        let Expr::Var(name, index) = target else {
            panic!("cannot assign to {target:?}");
        };
        match self.place(name, index) {
            Place::Frame(n) => {
                self.frames.last_mut().unwrap().insert(n, value);
            }
            Place::Fixed(_) => panic!("{name} is constant"),
            Place::Cell(i) => self.vars[i] = value,
        }
    }

    fn eval(&mut self, e: &Expr) -> i64 {
        match e {
            Expr::Num(n) => *n,
            Expr::Var(name, index) => self.read(name, index),
            Expr::Call(name, args) => self.call(name, args),
            Expr::Neg(inner) => -self.eval(inner),
            Expr::Not(inner) => i64::from(self.eval(inner) == 0),
            Expr::Cond(c, a, b) => {
                if self.eval(c) != 0 {
                    self.eval(a)
                } else {
                    self.eval(b)
                }
            }
            Expr::Bin(op, a, b) => {
                let l = self.eval(a);
                match *op {
                    "&&" if l == 0 => return 0,
                    "||" if l != 0 => return 1,
                    "&&" | "||" => return i64::from(self.eval(b) != 0),
                    _ => {}
                }
                let r = self.eval(b);
                match *op {
                    "+" => l + r,
                    "-" => l - r,
                    "*" => l * r,
                    "/" | "%" if r == 0 => panic!("division by zero in {e:?}"),
                    "/" => l / r,
                    "%" => l % r,
                    "==" => i64::from(l == r),
                    "!=" => i64::from(l != r),
                    "<" => i64::from(l < r),
                    "<=" => i64::from(l <= r),
                    ">" => i64::from(l > r),
                    ">=" => i64::from(l >= r),
                    other => panic!("unknown operator {other}"),
                }
            }
        }
    }

    fn call(&mut self, name: &str, args: &[Expr]) -> i64 {
        let ex = self.ex;
        let routine = ex
            .routines
            .get(name)
            .unwrap_or_else(|| panic!("unknown routine {name}"));
        assert_eq!(routine.params.len(), args.len(), "arguments of {name}");
        let values: Vec<i64> = args.iter().map(|a| self.eval(a)).collect();
        self.frames
            .push(routine.params.iter().cloned().zip(values).collect());
        let flow = self.run(&routine.body);
        self.frames.pop();
        match flow {
            Flow::Return(v) => v,
            Flow::Next => 0,
        }
    }

    fn run(&mut self, body: &[Code]) -> Flow {
        for code in body {
            if let Flow::Return(v) = self.exec(code) {
                return Flow::Return(v);
            }
        }
        Flow::Next
    }

    fn exec(&mut self, code: &Code) -> Flow {
        match code {
            Code::Decl(name, init) => {
                let v = init.as_ref().map_or(0, |e| self.eval(e));
                self.frames
                    .last_mut()
                    .unwrap_or_else(|| panic!("declaration of {name} outside a routine"))
                    .insert(name.clone(), v);
            }
            Code::Assign(target, op, value) => {
                let rhs = value.as_ref().map(|v| self.eval(v));
                let new = match (*op, rhs) {
                    ("=", Some(r)) => r,
                    ("+=", Some(r)) => self.eval(target) + r,
                    ("-=", Some(r)) => self.eval(target) - r,
                    ("++", None) => self.eval(target) + 1,
                    ("--", None) => self.eval(target) - 1,
                    _ => panic!("malformed assignment {code:?}"),
                };
                self.write(target, new);
            }
            Code::Eval(e) => {
                self.eval(e);
            }
            Code::If(cond, then, other) => {
                let branch = if self.eval(cond) != 0 { then } else { other };
                return self.run(branch);
            }
            Code::For(var, lo, hi, body) => {
                let (lo, hi) = (self.eval(lo), self.eval(hi));
                for v in lo..=hi {
                    self.frames
                        .last_mut()
                        .unwrap_or_else(|| panic!("loop outside a routine"))
                        .insert(var.clone(), v);
                    if let Flow::Return(r) = self.run(body) {
                        return Flow::Return(r);
                    }
                }
            }
            Code::Return(value) => {
                return Flow::Return(value.as_ref().map_or(0, |e| self.eval(e)));
            }
        }
        Flow::Next
    }
}

pub struct StateSpace<'e> {
    explorer: &'e Explorer,
    states: Vec<Config>,
    stuck: Vec<usize>,
}

impl<'e> StateSpace<'e> {
    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn views(&self) -> impl Iterator<Item = View<'_>> {
        self.states.iter().map(|config| View {
            explorer: self.explorer,
            config,
        })
    }

    /// Configurations with no enabled transition, finished runs included.
    pub fn deadlocks(&self) -> impl Iterator<Item = View<'_>> {
        self.stuck.iter().map(|&i| View {
            explorer: self.explorer,
            config: &self.states[i],
        })
    }

    pub fn any(&self, pred: impl Fn(&View<'_>) -> bool) -> bool {
        self.views().any(|v| pred(&v))
    }

    pub fn all(&self, pred: impl Fn(&View<'_>) -> bool) -> bool {
        self.views().all(|v| pred(&v))
    }

    /// `instance` is at `state` in some reachable configuration.
    pub fn reaches(&self, instance: &str, state: &str) -> bool {
        self.any(|v| v.at(instance) == state)
    }
}

/// Read access to one configuration.
pub struct View<'a> {
    explorer: &'a Explorer,
    config: &'a Config,
}

impl<'a> View<'a> {
    pub fn at(&self, instance: &str) -> &'a str {
        let i = self.explorer.instance(instance);
        &self.explorer.instances[i].states[self.config.locs[i]].0
    }

    pub fn var(&self, name: &str) -> i64 {
        self.elem(name, &[])
    }

    pub fn elem(&self, name: &str, index: &[i64]) -> i64 {
        let slot = self
            .explorer
            .slots
            .get(name)
            .unwrap_or_else(|| panic!("no global {name}"));
        assert_eq!(index.len(), slot.dims.len(), "indices of {name}");
        let flat = index
            .iter()
            .zip(&slot.dims)
            .fold(0, |acc, (&i, &dim)| acc * dim + i as usize);
        self.config.vars[slot.offset + flat]
    }

    pub fn local(&self, instance: &str, name: &str) -> i64 {
        self.elem(&format!("{instance}.{name}"), &[])
    }

    pub fn main_ended(&self) -> bool {
        self.var("main_ended") != 0
    }
}

pub fn explorer(program: &Program) -> Explorer {
    Explorer::new(&model_of(program))
}
