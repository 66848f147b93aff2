//! Structural validation of a [`Program`].
//!
//! The front end is trusted to produce well-typed programs, but every id in
//! the IR is a plain index; a dangling one would surface much later as a
//! panic inside the analyzer. [`Program::validate`] rejects those up front.

use thiserror::Error;

use crate::program::{FuncId, Program, ScopeId, VarId};
use crate::stmt::{Callee, CallStmt, ChanCommOp, Stmt, Value, WaitGroupOpKind};
use crate::types::{Type, TypeId};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IrError {
    #[error("Program '{0}' has no entry function")]
    MissingEntry(String),
    #[error("Unknown function id {0}")]
    UnknownFunc(FuncId),
    #[error("Unknown scope id {scope} referenced from {context}")]
    UnknownScope { scope: ScopeId, context: String },
    #[error("Unknown variable id {var} in function '{func}'")]
    UnknownVar { var: VarId, func: String },
    #[error("Unknown type id {ty} referenced from {context}")]
    UnknownType { ty: TypeId, context: String },
    #[error("Type {ty} used in '{func}' is not a {expected} type")]
    WrongTypeKind {
        ty: TypeId,
        func: String,
        expected: &'static str,
    },
    #[error("Call from '{caller}' to '{callee}' passes {given} arguments, expected {expected}")]
    ArityMismatch {
        caller: String,
        callee: String,
        given: usize,
        expected: usize,
    },
    #[error("Function '{func}' encloses itself")]
    CyclicEnclosing { func: String },
}

impl Program {
    /// Check that every id in the program resolves.
    pub fn validate(&self) -> Result<(), IrError> {
        let entry = self
            .entry
            .ok_or_else(|| IrError::MissingEntry(self.name.clone()))?;
        self.check_func_id(entry)?;

        for (id, ty) in self.types.iter().enumerate() {
            let context = format!("type {id}");
            match ty {
                Type::Struct(s) => {
                    for field in &s.fields {
                        self.check_type_id(field.ty.id, &context)?;
                    }
                }
                Type::Container(c) => self.check_type_id(c.elem.id, &context)?,
                Type::Basic(crate::types::BasicType::Func(sig)) => {
                    for t in sig.receiver.iter().chain(&sig.params).chain(&sig.results) {
                        self.check_type_id(t.id, &context)?;
                    }
                }
                Type::Basic(_) => {}
            }
        }

        for var in &self.variables {
            let context = format!("variable '{}'", var.name);
            if var.scope >= self.scopes.len() {
                return Err(IrError::UnknownScope {
                    scope: var.scope,
                    context,
                });
            }
            self.check_type_id(var.ty.id, &context)?;
        }

        for func in &self.funcs {
            if let Some(outer) = func.enclosing {
                self.check_func_id(outer)?;
            }
        }

        for func in &self.funcs {
            if func.scope >= self.scopes.len() {
                return Err(IrError::UnknownScope {
                    scope: func.scope,
                    context: format!("function '{}'", func.name),
                });
            }
            if func.enclosing.is_some() && self.enclosing_chain(func.id).contains(&func.id) {
                return Err(IrError::CyclicEnclosing {
                    func: func.name.clone(),
                });
            }
            for &v in func.receiver.iter().chain(&func.params).chain(&func.results) {
                self.check_var_id(v, func.id)?;
            }
            let mut result = Ok(());
            func.body.walk(&mut |stmt| {
                if result.is_ok() {
                    result = self.check_stmt(func.id, &stmt.node);
                }
            });
            result?;
        }
        Ok(())
    }

    fn check_func_id(&self, id: FuncId) -> Result<(), IrError> {
        if id < self.funcs.len() {
            Ok(())
        } else {
            Err(IrError::UnknownFunc(id))
        }
    }

    fn check_type_id(&self, ty: TypeId, context: &str) -> Result<(), IrError> {
        if ty < self.types.len() {
            Ok(())
        } else {
            Err(IrError::UnknownType {
                ty,
                context: context.to_string(),
            })
        }
    }

    fn check_var_id(&self, var: VarId, func: FuncId) -> Result<(), IrError> {
        if var < self.variables.len() {
            Ok(())
        } else {
            Err(IrError::UnknownVar {
                var,
                func: self.funcs[func].name.clone(),
            })
        }
    }

    fn check_value(&self, func: FuncId, value: &Value) -> Result<(), IrError> {
        let mut result = Ok(());
        value.walk(&mut |v| {
            if result.is_err() {
                return;
            }
            result = match v {
                Value::Var(var) => self.check_var_id(*var, func),
                Value::FuncRef(f) => self.check_func_id(*f),
                _ => Ok(()),
            };
        });
        result
    }

    fn check_call(&self, func: FuncId, call: &CallStmt) -> Result<(), IrError> {
        if let Callee::Static(callee) = &call.callee {
            self.check_func_id(*callee)?;
            let expected = self.funcs[*callee].params.len();
            if call.args.len() != expected {
                return Err(IrError::ArityMismatch {
                    caller: self.funcs[func].name.clone(),
                    callee: self.funcs[*callee].name.clone(),
                    given: call.args.len(),
                    expected,
                });
            }
        }
        Ok(())
    }

    fn check_stmt(&self, func: FuncId, stmt: &Stmt) -> Result<(), IrError> {
        for value in stmt_values(stmt) {
            self.check_value(func, value)?;
        }
        match stmt {
            Stmt::Call(call) | Stmt::OnceDo { call, .. } => self.check_call(func, call)?,
            Stmt::MakeStruct { ty, .. } => {
                self.check_type_id(*ty, &self.funcs[func].name)?;
                if self.types[*ty].as_struct().is_none() {
                    return Err(IrError::WrongTypeKind {
                        ty: *ty,
                        func: self.funcs[func].name.clone(),
                        expected: "struct",
                    });
                }
            }
            Stmt::MakeContainer { ty, .. } => {
                self.check_type_id(*ty, &self.funcs[func].name)?;
                if self.types[*ty].as_container().is_none() {
                    return Err(IrError::WrongTypeKind {
                        ty: *ty,
                        func: self.funcs[func].name.clone(),
                        expected: "container",
                    });
                }
            }
            _ => {}
        }
        Ok(())
    }
}

fn comm_values(op: &ChanCommOp) -> Vec<&Value> {
    match op {
        ChanCommOp::Send { chan, value } => vec![chan, value],
        ChanCommOp::Receive { chan, target, ok } => {
            let mut out = vec![chan];
            out.extend(target.iter());
            out.extend(ok.iter());
            out
        }
    }
}

fn call_values(call: &CallStmt) -> Vec<&Value> {
    let mut out = Vec::new();
    if let Callee::Dynamic(v) = &call.callee {
        out.push(v);
    }
    out.extend(call.receiver.iter());
    out.extend(call.args.iter());
    out.extend(call.targets.iter().flatten());
    out
}

/// Values appearing directly in `stmt`, excluding those of nested bodies.
pub fn stmt_values(stmt: &Stmt) -> Vec<&Value> {
    match stmt {
        Stmt::Assign { target, value } => vec![target, value],
        Stmt::MakeChan { target, buffer } => vec![target, buffer],
        Stmt::ChanOp(op) => comm_values(op),
        Stmt::CloseChan { chan } => vec![chan],
        Stmt::Select(sel) => sel.cases.iter().flat_map(|c| comm_values(&c.op)).collect(),
        Stmt::If { cond, .. } => vec![cond],
        Stmt::Switch(sw) => {
            let mut out: Vec<&Value> = sw.tag.iter().collect();
            out.extend(sw.cases.iter().flat_map(|c| c.conds.iter()));
            out
        }
        Stmt::For(f) => f.cond.iter().collect(),
        Stmt::ChanRange { chan, target, .. } => {
            let mut out = vec![chan];
            out.extend(target.iter());
            out
        }
        Stmt::ContainerRange {
            container,
            key,
            elem,
            ..
        } => {
            let mut out = vec![container];
            out.extend(key.iter());
            out.extend(elem.iter());
            out
        }
        Stmt::Call(call) => call_values(call),
        Stmt::Return { values, .. } => values.iter().collect(),
        Stmt::Recover { target } => target.iter().collect(),
        Stmt::Branch { .. } => Vec::new(),
        Stmt::MakeStruct { target, .. } => vec![target],
        Stmt::MakeContainer { target, len, .. } => {
            let mut out = vec![target];
            out.extend(len.iter());
            out
        }
        Stmt::MutexOp { mutex, .. } => vec![mutex],
        Stmt::WaitGroupOp { wait_group, op } => {
            let mut out = vec![wait_group];
            if let WaitGroupOpKind::Add(delta) = op {
                out.push(delta);
            }
            out
        }
        Stmt::OnceDo { once, call } => {
            let mut out = vec![once];
            out.extend(call_values(call));
            out
        }
    }
}
