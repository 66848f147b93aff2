//! Declaration order for composite types.
//!
//! A composite type depends on every type it embeds by value; pointer
//! fields are pool indices and impose no order. The resulting relation must
//! be acyclic.

use indexmap::{IndexMap, IndexSet};
use rendezvous_ir::{ContainerKind, Program, Type, TypeId, TypeRef};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TypeGraphError {
    #[error("Value-embedding cycle between types: {}", .path.join(" -> "))]
    Cycle { path: Vec<String> },
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum VisitState {
    InProgress,
    Completed,
}

#[derive(Debug, Clone, Default)]
pub struct TypeGraph {
    /// Value-embedding edges: type -> types it embeds.
    edges: IndexMap<TypeId, IndexSet<TypeId>>,
    /// Basic kinds first, then composites with dependencies before
    /// dependents.
    order: Vec<TypeId>,
}

impl TypeGraph {
    pub fn build(program: &Program) -> Result<Self, TypeGraphError> {
        let mut graph = TypeGraph::default();
        for (id, ty) in program.types.iter().enumerate() {
            let deps = graph.edges.entry(id).or_default();
            let mut embed = |r: TypeRef| {
                if !r.pointer {
                    deps.insert(r.id);
                }
            };
            match ty {
                Type::Struct(s) => s.fields.iter().for_each(|f| embed(f.ty)),
                Type::Container(c) if c.kind == ContainerKind::Array => embed(c.elem),
                Type::Container(_) | Type::Basic(_) => {}
            }
        }

        for (id, ty) in program.types.iter().enumerate() {
            if !ty.is_composite() {
                graph.order.push(id);
            }
        }

        let mut state: IndexMap<TypeId, VisitState> = IndexMap::new();
        let mut path: Vec<TypeId> = Vec::new();
        for (id, ty) in program.types.iter().enumerate() {
            if ty.is_composite() && !state.contains_key(&id) {
                graph.visit(program, id, &mut state, &mut path)?;
            }
        }
        Ok(graph)
    }

    fn visit(
        &mut self,
        program: &Program,
        node: TypeId,
        state: &mut IndexMap<TypeId, VisitState>,
        path: &mut Vec<TypeId>,
    ) -> Result<(), TypeGraphError> {
        state.insert(node, VisitState::InProgress);
        path.push(node);
        let deps: Vec<TypeId> = self
            .edges
            .get(&node)
            .map(|d| d.iter().copied().collect())
            .unwrap_or_default();
        for dep in deps {
            match state.get(&dep) {
                Some(VisitState::InProgress) => {
                    let start = path.iter().position(|&t| t == dep).unwrap_or(0);
                    let mut names: Vec<String> =
                        path[start..].iter().map(|&t| type_name(program, t)).collect();
                    names.push(type_name(program, dep));
                    return Err(TypeGraphError::Cycle { path: names });
                }
                Some(VisitState::Completed) => {}
                None => {
                    if program.types[dep].is_composite() {
                        self.visit(program, dep, state, path)?;
                    }
                }
            }
        }
        path.pop();
        state.insert(node, VisitState::Completed);
        self.order.push(node);
        Ok(())
    }

    /// Every type, in declaration order.
    pub fn order(&self) -> &[TypeId] {
        &self.order
    }

    /// Composite types in declaration order.
    pub fn composites<'a>(&'a self, program: &'a Program) -> impl Iterator<Item = TypeId> + 'a {
        self.order
            .iter()
            .copied()
            .filter(move |&t| program.types[t].is_composite())
    }

    /// Types embedded by value in `ty`.
    pub fn dependencies(&self, ty: TypeId) -> Vec<TypeId> {
        self.edges
            .get(&ty)
            .map(|d| d.iter().copied().collect())
            .unwrap_or_default()
    }

    pub fn position(&self, ty: TypeId) -> Option<usize> {
        self.order.iter().position(|&t| t == ty)
    }
}

/// Display name of a type, used in diagnostics and generated identifiers.
pub fn type_name(program: &Program, ty: TypeId) -> String {
    match &program.types[ty] {
        Type::Basic(b) => b.kind_name().to_string(),
        Type::Struct(s) => s.name.clone(),
        Type::Container(c) => {
            let elem = type_name(program, c.elem.id);
            let elem = if c.elem.pointer {
                format!("*{elem}")
            } else {
                elem
            };
            match c.len {
                Some(n) => format!("[{n}]{elem}"),
                None => format!("{}[{elem}]", c.kind),
            }
        }
    }
}
