//! Incremental construction of a [`Program`].
//!
//! The front end (and the test suites) assemble programs through this
//! builder; it keeps ids dense, interns basic types and derives the
//! `captured` flag and per-function defer counts on [`ProgramBuilder::build`].

use indexmap::IndexMap;

use crate::program::*;
use crate::stmt::{Body, Value};
use crate::types::*;
use crate::Span;

#[derive(Debug)]
pub struct ProgramBuilder {
    program: Program,
    basic_ids: IndexMap<BasicType, TypeId>,
}

impl ProgramBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        let program = Program {
            file: format!("{name}.go"),
            name,
            source: None,
            global_scope: 0,
            scopes: vec![Scope {
                id: 0,
                parent: None,
                func: None,
                vars: Vec::new(),
            }],
            variables: Vec::new(),
            funcs: Vec::new(),
            entry: None,
            types: Vec::new(),
        };
        Self {
            program,
            basic_ids: IndexMap::new(),
        }
    }

    pub fn with_source(mut self, file: impl Into<String>, source: impl Into<String>) -> Self {
        self.program.file = file.into();
        self.program.source = Some(source.into());
        self
    }

    pub fn basic(&mut self, basic: BasicType) -> TypeId {
        if let Some(&id) = self.basic_ids.get(&basic) {
            return id;
        }
        let id = self.push_type(Type::Basic(basic.clone()));
        self.basic_ids.insert(basic, id);
        id
    }

    pub fn int(&mut self) -> TypeRef {
        TypeRef::value(self.basic(BasicType::Int))
    }

    pub fn bool(&mut self) -> TypeRef {
        TypeRef::value(self.basic(BasicType::Bool))
    }

    pub fn chan(&mut self) -> TypeRef {
        TypeRef::value(self.basic(BasicType::Chan))
    }

    pub fn mutex(&mut self) -> TypeRef {
        TypeRef::value(self.basic(BasicType::Mutex))
    }

    pub fn wait_group(&mut self) -> TypeRef {
        TypeRef::value(self.basic(BasicType::WaitGroup))
    }

    pub fn once(&mut self) -> TypeRef {
        TypeRef::value(self.basic(BasicType::Once))
    }

    pub fn func_type(&mut self, signature: Signature) -> TypeRef {
        TypeRef::value(self.basic(BasicType::Func(signature)))
    }

    /// Declare a struct type whose fields are filled in later, so that
    /// self-referential (pointer) fields can name it.
    pub fn declare_struct(&mut self, name: impl Into<String>) -> TypeId {
        self.push_type(Type::Struct(StructType {
            name: name.into(),
            fields: Vec::new(),
        }))
    }

    pub fn set_struct_fields(&mut self, id: TypeId, fields: Vec<StructField>) {
        if let Type::Struct(s) = &mut self.program.types[id] {
            s.fields = fields;
        }
    }

    pub fn struct_type(&mut self, name: impl Into<String>, fields: Vec<StructField>) -> TypeId {
        let id = self.declare_struct(name);
        self.set_struct_fields(id, fields);
        id
    }

    pub fn array(&mut self, elem: TypeRef, len: u64) -> TypeId {
        self.push_type(Type::Container(ContainerType {
            kind: ContainerKind::Array,
            elem,
            len: Some(len),
        }))
    }

    pub fn slice(&mut self, elem: TypeRef) -> TypeId {
        self.push_type(Type::Container(ContainerType {
            kind: ContainerKind::Slice,
            elem,
            len: None,
        }))
    }

    pub fn map(&mut self, elem: TypeRef) -> TypeId {
        self.push_type(Type::Container(ContainerType {
            kind: ContainerKind::Map,
            elem,
            len: None,
        }))
    }

    pub fn global(&mut self, name: impl Into<String>, ty: TypeRef) -> VarId {
        let scope = self.program.global_scope;
        self.push_var(scope, name.into(), ty, None)
    }

    pub fn global_with_init(&mut self, name: impl Into<String>, ty: TypeRef, init: Value) -> VarId {
        let scope = self.program.global_scope;
        self.push_var(scope, name.into(), ty, Some(init))
    }

    pub fn func(&mut self, name: impl Into<String>) -> FuncId {
        self.push_func(name.into(), None)
    }

    /// A function literal nested inside `enclosing`.
    pub fn closure(&mut self, name: impl Into<String>, enclosing: FuncId) -> FuncId {
        self.push_func(name.into(), Some(enclosing))
    }

    pub fn receiver(&mut self, func: FuncId, name: impl Into<String>, ty: TypeRef) -> VarId {
        let scope = self.program.funcs[func].scope;
        let var = self.push_var(scope, name.into(), ty, None);
        self.program.funcs[func].receiver = Some(var);
        var
    }

    pub fn param(&mut self, func: FuncId, name: impl Into<String>, ty: TypeRef) -> VarId {
        let scope = self.program.funcs[func].scope;
        let var = self.push_var(scope, name.into(), ty, None);
        self.program.funcs[func].params.push(var);
        var
    }

    pub fn result(&mut self, func: FuncId, name: impl Into<String>, ty: TypeRef) -> VarId {
        let scope = self.program.funcs[func].scope;
        let var = self.push_var(scope, name.into(), ty, None);
        self.program.funcs[func].results.push(var);
        var
    }

    pub fn local(&mut self, func: FuncId, name: impl Into<String>, ty: TypeRef) -> VarId {
        let scope = self.program.funcs[func].scope;
        self.push_var(scope, name.into(), ty, None)
    }

    pub fn local_with_init(
        &mut self,
        func: FuncId,
        name: impl Into<String>,
        ty: TypeRef,
        init: Value,
    ) -> VarId {
        let scope = self.program.funcs[func].scope;
        self.push_var(scope, name.into(), ty, Some(init))
    }

    pub fn mark_captured(&mut self, var: VarId) {
        self.program.variables[var].captured = true;
    }

    pub fn set_body(&mut self, func: FuncId, body: Body) {
        self.program.funcs[func].body = body;
    }

    pub fn set_span(&mut self, func: FuncId, span: Span) {
        self.program.funcs[func].span = span;
    }

    pub fn set_entry(&mut self, func: FuncId) {
        self.program.entry = Some(func);
    }

    pub fn program(&self) -> &Program {
        &self.program
    }

    /// Finish construction, deriving defer counts and `captured` flags.
    pub fn build(mut self) -> Program {
        for func in &mut self.program.funcs {
            func.defer_count = func.body.count_deferred();
        }
        let captured = collect_captured(&self.program);
        for var in captured {
            self.program.variables[var].captured = true;
        }
        self.program
    }

    fn push_type(&mut self, ty: Type) -> TypeId {
        let id = self.program.types.len();
        self.program.types.push(ty);
        id
    }

    fn push_var(
        &mut self,
        scope: ScopeId,
        name: String,
        ty: TypeRef,
        initial: Option<Value>,
    ) -> VarId {
        let id = self.program.variables.len();
        self.program.variables.push(Variable {
            id,
            name,
            ty,
            initial,
            captured: false,
            scope,
        });
        self.program.scopes[scope].vars.push(id);
        id
    }

    fn push_func(&mut self, name: String, enclosing: Option<FuncId>) -> FuncId {
        let id = self.program.funcs.len();
        let scope = self.program.scopes.len();
        let parent = match enclosing {
            Some(outer) => self.program.funcs[outer].scope,
            None => self.program.global_scope,
        };
        self.program.scopes.push(Scope {
            id: scope,
            parent: Some(parent),
            func: Some(id),
            vars: Vec::new(),
        });
        self.program.funcs.push(Func {
            id,
            name,
            enclosing,
            receiver: None,
            params: Vec::new(),
            results: Vec::new(),
            scope,
            body: Body::default(),
            defer_count: 0,
            span: Span::default(),
        });
        id
    }
}

/// Local variables referenced from a function other than their owner.
fn collect_captured(program: &Program) -> Vec<VarId> {
    let mut out = Vec::new();
    for func in &program.funcs {
        let mut note = |value: &Value| {
            value.walk(&mut |v| {
                if let Value::Var(var) = v {
                    if let Some(owner) = program.owner_of(*var) {
                        if owner != func.id {
                            out.push(*var);
                        }
                    }
                }
            });
        };
        func.body.walk(&mut |stmt| {
            for value in crate::validation::stmt_values(&stmt.node) {
                note(value);
            }
        });
    }
    out.sort_unstable();
    out.dedup();
    out
}
