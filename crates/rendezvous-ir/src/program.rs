//! Program, functions, scopes and variables.

use crate::stmt::{Body, Value};
use crate::types::{BasicType, Signature, Type, TypeId, TypeRef};
use crate::Span;

/// Index of a function in [`Program::funcs`].
pub type FuncId = usize;
/// Index of a scope in [`Program::scopes`].
pub type ScopeId = usize;
/// Index of a variable in [`Program::variables`].
pub type VarId = usize;

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
pub struct Variable {
    pub id: VarId,
    pub name: String,
    pub ty: TypeRef,
    pub initial: Option<Value>,
    /// Referenced from a nested function; storage must be addressable across
    /// process instances.
    pub captured: bool,
    pub scope: ScopeId,
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
pub struct Scope {
    pub id: ScopeId,
    pub parent: Option<ScopeId>,
    /// Function owning this scope; `None` for the global scope.
    pub func: Option<FuncId>,
    pub vars: Vec<VarId>,
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
pub struct Func {
    pub id: FuncId,
    pub name: String,
    /// Enclosing function for closures.
    pub enclosing: Option<FuncId>,
    pub receiver: Option<VarId>,
    pub params: Vec<VarId>,
    pub results: Vec<VarId>,
    pub scope: ScopeId,
    pub body: Body,
    /// Number of `defer` statements in the body.
    pub defer_count: usize,
    pub span: Span,
}

/// A complete program.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
pub struct Program {
    pub name: String,
    /// File name used when rendering diagnostics.
    pub file: String,
    /// Source text, when the front end kept it.
    pub source: Option<String>,
    pub global_scope: ScopeId,
    pub scopes: Vec<Scope>,
    pub variables: Vec<Variable>,
    pub funcs: Vec<Func>,
    pub entry: Option<FuncId>,
    pub types: Vec<Type>,
}

impl Program {
    pub fn func(&self, id: FuncId) -> &Func {
        &self.funcs[id]
    }

    pub fn var(&self, id: VarId) -> &Variable {
        &self.variables[id]
    }

    pub fn ty(&self, id: TypeId) -> &Type {
        &self.types[id]
    }

    pub fn find_func(&self, name: &str) -> Option<FuncId> {
        self.funcs.iter().position(|f| f.name == name)
    }

    pub fn find_type(&self, pred: impl Fn(&Type) -> bool) -> Option<TypeId> {
        self.types.iter().position(pred)
    }

    pub fn basic_type_id(&self, basic: &BasicType) -> Option<TypeId> {
        self.find_type(|t| t.as_basic() == Some(basic))
    }

    /// Variables of the global scope.
    pub fn globals(&self) -> impl Iterator<Item = &Variable> {
        self.scopes[self.global_scope]
            .vars
            .iter()
            .map(move |&v| &self.variables[v])
    }

    /// Every variable declared in a scope owned by `func`, including its
    /// receiver, parameters and results.
    pub fn func_vars(&self, func: FuncId) -> Vec<VarId> {
        let mut out = Vec::new();
        for scope in self.scopes.iter().filter(|s| s.func == Some(func)) {
            out.extend(scope.vars.iter().copied());
        }
        out.sort_unstable();
        out.dedup();
        out
    }

    /// Function whose scope declares `var`, or `None` for globals.
    pub fn owner_of(&self, var: VarId) -> Option<FuncId> {
        self.scopes[self.variables[var].scope].func
    }

    /// The chain of enclosing functions, innermost first, excluding `func`.
    pub fn enclosing_chain(&self, func: FuncId) -> Vec<FuncId> {
        let mut chain = Vec::new();
        let mut cur = self.funcs[func].enclosing;
        while let Some(parent) = cur {
            if chain.contains(&parent) {
                break;
            }
            chain.push(parent);
            cur = self.funcs[parent].enclosing;
        }
        chain
    }

    /// Function-value signature of `func`.
    pub fn signature_of(&self, func: FuncId) -> Signature {
        let f = &self.funcs[func];
        Signature {
            receiver: f.receiver.map(|v| self.variables[v].ty),
            params: f.params.iter().map(|&v| self.variables[v].ty).collect(),
            results: f.results.iter().map(|&v| self.variables[v].ty).collect(),
        }
    }

    /// Structural type equality. Struct types are nominal; everything else
    /// is compared by shape.
    pub fn types_equal(&self, a: TypeRef, b: TypeRef) -> bool {
        if a.pointer != b.pointer {
            return false;
        }
        if a.id == b.id {
            return true;
        }
        match (&self.types[a.id], &self.types[b.id]) {
            (Type::Basic(BasicType::Func(sa)), Type::Basic(BasicType::Func(sb))) => {
                self.signatures_equal(sa, sb)
            }
            (Type::Basic(x), Type::Basic(y)) => x == y,
            (Type::Container(x), Type::Container(y)) => {
                x.kind == y.kind && x.len == y.len && self.types_equal(x.elem, y.elem)
            }
            _ => false,
        }
    }

    pub fn signatures_equal(&self, a: &Signature, b: &Signature) -> bool {
        let receivers_match = match (a.receiver, b.receiver) {
            (None, None) => true,
            (Some(x), Some(y)) => self.types_equal(x, y),
            _ => false,
        };
        receivers_match
            && a.params.len() == b.params.len()
            && a.results.len() == b.results.len()
            && a
                .params
                .iter()
                .zip(&b.params)
                .all(|(x, y)| self.types_equal(*x, *y))
            && a
                .results
                .iter()
                .zip(&b.results)
                .all(|(x, y)| self.types_equal(*x, *y))
    }

    /// Static type of a value, when it refers to typed storage.
    ///
    /// Literals and arithmetic yield `None`; they are plain scalars.
    pub fn type_of(&self, value: &Value) -> Option<TypeRef> {
        match value {
            Value::Var(v) => Some(self.variables[*v].ty),
            Value::Field { base, field } => {
                let base_ty = self.type_of(base)?;
                let s = self.types[base_ty.id].as_struct()?;
                s.fields.get(*field).map(|f| f.ty)
            }
            Value::Index { base, .. } => {
                let base_ty = self.type_of(base)?;
                self.types[base_ty.id].as_container().map(|c| c.elem)
            }
            _ => None,
        }
    }

    /// Signature carried by a function-typed value.
    pub fn func_signature_of(&self, value: &Value) -> Option<Signature> {
        if let Value::FuncRef(f) = value {
            return Some(self.signature_of(*f));
        }
        let ty = self.type_of(value)?;
        match &self.types[ty.id] {
            Type::Basic(BasicType::Func(sig)) => Some(sig.clone()),
            _ => None,
        }
    }

    /// Whether a value of this type is copied on assignment.
    pub fn copies_by_value(&self, ty: TypeRef) -> bool {
        !ty.pointer && self.types[ty.id].has_value_semantics()
    }

    /// 1-based line and column of a byte offset in [`Program::source`].
    pub fn line_col(&self, offset: usize) -> Option<(usize, usize)> {
        let source = self.source.as_deref()?;
        if offset > source.len() {
            return None;
        }
        let prefix = source.get(..offset)?;
        let line = prefix.matches('\n').count() + 1;
        let column = prefix.rfind('\n').map(|i| offset - i).unwrap_or(offset + 1);
        Some((line, column))
    }
}
