//! Statements and values.

use crate::program::{FuncId, VarId};
use crate::types::TypeId;
use crate::{Span, Spanned};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
pub enum UnaryOp {
    Neg,
    Not,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
}

impl BinaryOp {
    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            BinaryOp::Eq | BinaryOp::Ne | BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge
        )
    }

    pub fn is_logical(self) -> bool {
        matches!(self, BinaryOp::And | BinaryOp::Or)
    }

    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Rem => "%",
            BinaryOp::Eq => "==",
            BinaryOp::Ne => "!=",
            BinaryOp::Lt => "<",
            BinaryOp::Le => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Ge => ">=",
            BinaryOp::And => "&&",
            BinaryOp::Or => "||",
        }
    }
}

/// An expression in the IR.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
pub enum Value {
    Int(i64),
    Bool(bool),
    Nil,
    Var(VarId),
    Field {
        base: Box<Value>,
        field: usize,
    },
    Index {
        base: Box<Value>,
        index: Box<Value>,
    },
    Unary {
        op: UnaryOp,
        operand: Box<Value>,
    },
    Binary {
        op: BinaryOp,
        lhs: Box<Value>,
        rhs: Box<Value>,
    },
    /// A function used as a value (closure creation for nested functions).
    FuncRef(FuncId),
    /// Length of a container or buffered channel.
    Len(Box<Value>),
    /// A value the front end could not model.
    Unknown,
}

impl Value {
    pub fn var(id: VarId) -> Self {
        Value::Var(id)
    }

    pub fn field(base: Value, field: usize) -> Self {
        Value::Field {
            base: Box::new(base),
            field,
        }
    }

    pub fn index(base: Value, index: Value) -> Self {
        Value::Index {
            base: Box::new(base),
            index: Box::new(index),
        }
    }

    pub fn binary(op: BinaryOp, lhs: Value, rhs: Value) -> Self {
        Value::Binary {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        }
    }

    pub fn not(operand: Value) -> Self {
        Value::Unary {
            op: UnaryOp::Not,
            operand: Box::new(operand),
        }
    }

    /// Visit this value and every sub-value, outermost first.
    pub fn walk<'a>(&'a self, visit: &mut impl FnMut(&'a Value)) {
        visit(self);
        match self {
            Value::Field { base, .. } => base.walk(visit),
            Value::Index { base, index } => {
                base.walk(visit);
                index.walk(visit);
            }
            Value::Unary { operand, .. } => operand.walk(visit),
            Value::Binary { lhs, rhs, .. } => {
                lhs.walk(visit);
                rhs.walk(visit);
            }
            Value::Len(inner) => inner.walk(visit),
            Value::Int(_)
            | Value::Bool(_)
            | Value::Nil
            | Value::Var(_)
            | Value::FuncRef(_)
            | Value::Unknown => {}
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
pub enum CallKind {
    Sync,
    Deferred,
    Async,
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
pub enum Callee {
    Static(FuncId),
    /// Call through a function-valued variable, field or element.
    Dynamic(Value),
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
pub struct CallStmt {
    pub callee: Callee,
    pub kind: CallKind,
    /// Bound to the callee's receiver parameter, if it has one.
    pub receiver: Option<Value>,
    pub args: Vec<Value>,
    /// Assignment targets for the callee's results (`None` discards).
    pub targets: Vec<Option<Value>>,
}

impl CallStmt {
    pub fn new(callee: Callee, kind: CallKind) -> Self {
        Self {
            callee,
            kind,
            receiver: None,
            args: Vec::new(),
            targets: Vec::new(),
        }
    }

    pub fn sync(func: FuncId) -> Self {
        Self::new(Callee::Static(func), CallKind::Sync)
    }

    pub fn spawn(func: FuncId) -> Self {
        Self::new(Callee::Static(func), CallKind::Async)
    }

    pub fn deferred(func: FuncId) -> Self {
        Self::new(Callee::Static(func), CallKind::Deferred)
    }

    pub fn with_args(mut self, args: Vec<Value>) -> Self {
        self.args = args;
        self
    }

    pub fn with_receiver(mut self, receiver: Value) -> Self {
        self.receiver = Some(receiver);
        self
    }

    pub fn with_targets(mut self, targets: Vec<Option<Value>>) -> Self {
        self.targets = targets;
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
pub enum ChanCommOp {
    Send {
        chan: Value,
        value: Value,
    },
    Receive {
        chan: Value,
        target: Option<Value>,
        ok: Option<Value>,
    },
}

impl ChanCommOp {
    pub fn chan(&self) -> &Value {
        match self {
            ChanCommOp::Send { chan, .. } | ChanCommOp::Receive { chan, .. } => chan,
        }
    }

    pub fn is_send(&self) -> bool {
        matches!(self, ChanCommOp::Send { .. })
    }
}

/// Source annotation on a select case, compiled into a verification query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
pub enum ReachabilityAnnotation {
    Reachable,
    Unreachable,
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
pub struct SelectCase {
    pub op: ChanCommOp,
    pub body: Body,
    pub annotations: Vec<ReachabilityAnnotation>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
pub struct SelectStmt {
    pub cases: Vec<SelectCase>,
    pub default: Option<Body>,
    pub label: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
pub struct SwitchCase {
    /// Empty for the `default` clause.
    pub conds: Vec<Value>,
    pub body: Body,
    pub fallthrough: bool,
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
pub struct SwitchStmt {
    /// Compared against each case condition; without a tag every condition
    /// is a boolean.
    pub tag: Option<Value>,
    pub cases: Vec<SwitchCase>,
    /// Index of the `default` clause in `cases`.
    pub default: Option<usize>,
    pub label: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
pub struct ForStmt {
    pub cond: Option<Value>,
    pub post: Option<Body>,
    pub body: Body,
    /// Statically known lower bound on the number of iterations.
    pub min_iterations: Option<u64>,
    /// Statically known upper bound on the number of iterations.
    pub max_iterations: Option<u64>,
    pub label: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
pub enum BranchKind {
    Break,
    Continue,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
pub enum MutexOpKind {
    Lock,
    Unlock,
    RLock,
    RUnlock,
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
pub enum WaitGroupOpKind {
    Add(Value),
    Done,
    Wait,
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
pub enum Stmt {
    Assign {
        target: Value,
        value: Value,
    },
    MakeChan {
        target: Value,
        buffer: Value,
    },
    ChanOp(ChanCommOp),
    CloseChan {
        chan: Value,
    },
    Select(SelectStmt),
    If {
        cond: Value,
        then_body: Body,
        else_body: Option<Body>,
    },
    Switch(SwitchStmt),
    For(ForStmt),
    ChanRange {
        chan: Value,
        target: Option<Value>,
        body: Body,
        label: Option<String>,
    },
    ContainerRange {
        container: Value,
        key: Option<Value>,
        elem: Option<Value>,
        body: Body,
        label: Option<String>,
    },
    Call(CallStmt),
    Return {
        values: Vec<Value>,
        panics: bool,
    },
    Recover {
        target: Option<Value>,
    },
    Branch {
        kind: BranchKind,
        label: Option<String>,
    },
    MakeStruct {
        target: Value,
        ty: TypeId,
    },
    MakeContainer {
        target: Value,
        ty: TypeId,
        len: Option<Value>,
    },
    MutexOp {
        mutex: Value,
        op: MutexOpKind,
    },
    WaitGroupOp {
        wait_group: Value,
        op: WaitGroupOpKind,
    },
    OnceDo {
        once: Value,
        call: CallStmt,
    },
}

impl Stmt {
    pub fn at(self, span: Span) -> Spanned<Stmt> {
        Spanned::new(self, span)
    }

    /// Nested bodies owned by this statement, in source order.
    pub fn child_bodies(&self) -> Vec<&Body> {
        match self {
            Stmt::Select(sel) => {
                let mut out: Vec<&Body> = sel.cases.iter().map(|c| &c.body).collect();
                out.extend(sel.default.iter());
                out
            }
            Stmt::If {
                then_body,
                else_body,
                ..
            } => {
                let mut out = vec![then_body];
                out.extend(else_body.iter());
                out
            }
            Stmt::Switch(sw) => sw.cases.iter().map(|c| &c.body).collect(),
            Stmt::For(f) => {
                let mut out = vec![&f.body];
                out.extend(f.post.iter());
                out
            }
            Stmt::ChanRange { body, .. } | Stmt::ContainerRange { body, .. } => vec![body],
            _ => Vec::new(),
        }
    }
}

/// Ordered statement sequence.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
pub struct Body {
    pub stmts: Vec<Spanned<Stmt>>,
}

impl Body {
    pub fn new(stmts: Vec<Spanned<Stmt>>) -> Self {
        Self { stmts }
    }

    pub fn from_stmts(stmts: Vec<Stmt>) -> Self {
        Self {
            stmts: stmts.into_iter().map(Spanned::from).collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.stmts.is_empty()
    }

    /// Visit every statement in this body and its nested bodies.
    pub fn walk<'a>(&'a self, visit: &mut impl FnMut(&'a Spanned<Stmt>)) {
        for stmt in &self.stmts {
            visit(stmt);
            for child in stmt.node.child_bodies() {
                child.walk(visit);
            }
        }
    }

    /// Number of `defer` statements appearing anywhere in this body.
    pub fn count_deferred(&self) -> usize {
        let mut count = 0;
        self.walk(&mut |stmt| {
            if let Stmt::Call(call) = &stmt.node {
                if call.kind == CallKind::Deferred {
                    count += 1;
                }
            }
        });
        count
    }
}
