//! Rendering IR values as guard/update expressions.

use rendezvous_ir::{BasicType, ContainerKind, FuncId, Type, UnaryOp, Value, VarId};
use thiserror::Error;

use crate::frames::{Frames, Storage};
use crate::layout::Layout;
use crate::pools::{repr, FieldNames, Repr};
use crate::resources::FUNC_STRIDE;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub(crate) enum ExprError {
    #[error("{0}")]
    Unsupported(String),
    #[error("map index is not modeled")]
    MapIndex,
}

/// Expression context: the function whose instance `pid` refers to, or
/// none at global scope.
pub(crate) struct Exprs<'t, 'a> {
    pub layout: &'t Layout<'a>,
    pub frames: &'t Frames,
    pub fields: &'t FieldNames,
    pub func: Option<FuncId>,
}

impl Exprs<'_, '_> {
    pub fn value(&self, value: &Value) -> Result<String, ExprError> {
        let program = self.layout.program;
        match value {
            Value::Int(n) if *n < 0 => Ok(format!("({n})")),
            Value::Int(n) => Ok(n.to_string()),
            Value::Bool(b) => Ok(b.to_string()),
            Value::Nil => Ok("-1".to_string()),
            Value::Var(v) => self.var(*v),
            Value::Field { base, field } => {
                let ty = program
                    .type_of(base)
                    .ok_or_else(|| unsupported("field of an untyped value"))?;
                let names = self
                    .fields
                    .get(&ty.id)
                    .ok_or_else(|| unsupported("field of a type without storage"))?;
                let array = names
                    .get(*field)
                    .ok_or_else(|| unsupported("field index out of range"))?;
                Ok(format!("{array}[{}]", self.value(base)?))
            }
            Value::Index { base, index } => {
                let ty = program
                    .type_of(base)
                    .ok_or_else(|| unsupported("index into an untyped value"))?;
                let container = program.types[ty.id]
                    .as_container()
                    .ok_or_else(|| unsupported("index into a non-container"))?;
                if container.kind == ContainerKind::Map {
                    return Err(ExprError::MapIndex);
                }
                let pool = self
                    .layout
                    .pool(ty.id)
                    .ok_or_else(|| unsupported("index into a container without storage"))?;
                Ok(format!(
                    "{}_elem[{}][{}]",
                    pool.name,
                    self.value(base)?,
                    self.value(index)?
                ))
            }
            Value::Unary { op, operand } => {
                let inner = self.value(operand)?;
                Ok(match op {
                    UnaryOp::Neg => format!("-({inner})"),
                    UnaryOp::Not => format!("!({inner})"),
                })
            }
            Value::Binary { op, lhs, rhs } => Ok(format!(
                "({} {} {})",
                self.value(lhs)?,
                op.symbol(),
                self.value(rhs)?
            )),
            Value::FuncRef(f) => self.func_value(*f),
            Value::Len(inner) => self.len(inner),
            Value::Unknown => Err(unsupported("value not modeled by the front end")),
        }
    }

    pub fn var(&self, var: VarId) -> Result<String, ExprError> {
        match self.frames.storage(var) {
            Some(Storage::Global(name)) => Ok(name.clone()),
            Some(Storage::Local(name)) if self.layout.program.owner_of(var) == self.func => {
                Ok(name.clone())
            }
            Some(Storage::Captured { owner, array }) => {
                let inst = self
                    .instance_of(*owner)
                    .ok_or_else(|| unsupported("captured variable outside its closure chain"))?;
                Ok(format!("{array}[{inst}]"))
            }
            _ => Err(unsupported(format!(
                "variable '{}' is not visible here",
                self.layout.program.var(var).name
            ))),
        }
    }

    /// Instance id of `owner` as seen from the current function, following
    /// the `_parent` chain outwards.
    pub fn instance_of(&self, owner: FuncId) -> Option<String> {
        let program = self.layout.program;
        let mut cur = self.func?;
        let mut expr = "pid".to_string();
        for _ in 0..=program.funcs.len() {
            if cur == owner {
                return Some(expr);
            }
            let parent = program.func(cur).enclosing?;
            expr = format!("{}_parent[{expr}]", self.layout.func(cur).name);
            cur = parent;
        }
        None
    }

    /// `fid * FUNC_STRIDE + enclosing_instance`.
    pub fn func_value(&self, func: FuncId) -> Result<String, ExprError> {
        let inst = match self.layout.program.func(func).enclosing {
            Some(enclosing) => self
                .instance_of(enclosing)
                .ok_or_else(|| unsupported("closure created outside its enclosing function"))?,
            None => "0".to_string(),
        };
        Ok(format!("({func} * {FUNC_STRIDE} + {inst})"))
    }

    fn len(&self, inner: &Value) -> Result<String, ExprError> {
        let program = self.layout.program;
        let ty = program
            .type_of(inner)
            .ok_or_else(|| unsupported("len of an untyped value"))?;
        let target = self.value(inner)?;
        if matches!(program.types[ty.id], Type::Basic(BasicType::Chan)) {
            return Ok(format!("chan_len({target})"));
        }
        let pool = self
            .layout
            .pool(ty.id)
            .ok_or_else(|| unsupported("len of a value without storage"))?;
        Ok(match repr(self.layout, ty) {
            Repr::Composite(_) => format!("{}_len[{target}]", pool.name),
            _ => format!("({target} < 0 ? 0 : {}_len[{target}])", pool.name),
        })
    }
}

fn unsupported(reason: impl Into<String>) -> ExprError {
    ExprError::Unsupported(reason.into())
}
