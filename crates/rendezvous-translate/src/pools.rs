//! Storage encoding and the flat instance pools backing composite types.
//!
//! Every struct or container value lives in a slot of its type's pool and
//! is referred to by slot index. Pointers and value-typed variables both
//! hold such an index; only assignment differs (value types copy).

use indexmap::IndexMap;
use rendezvous_automata::{Declarations, FuncDecl, VarDecl};
use rendezvous_ir::{BasicType, ContainerKind, Type, TypeId, TypeRef};

use crate::layout::{Layout, PoolInfo};
use crate::names::{sanitize, Namer};
use crate::resources::{counted_alloc, OUT_OF_RESOURCES};
use crate::warnings::{TranslationWarning, WarningCode};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Primitive {
    Mutex,
    WaitGroup,
    Once,
}

impl Primitive {
    pub fn alloc(self) -> &'static str {
        match self {
            Primitive::Mutex => "alloc_mutex()",
            Primitive::WaitGroup => "alloc_wait_group()",
            Primitive::Once => "alloc_once()",
        }
    }
}

/// How a value of some type is stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Repr {
    Bool,
    Int,
    /// Pointer, slice, map, channel or function value; `-1` is nil.
    Handle,
    /// Value-typed synchronization primitive owning its own handle.
    Primitive(Primitive),
    /// Value-typed struct or array owning a pool slot.
    Composite(TypeId),
}

impl Repr {
    pub fn is_bool(self) -> bool {
        self == Repr::Bool
    }

    pub fn decl(self, name: impl Into<String>) -> VarDecl {
        if self.is_bool() {
            VarDecl::bool(name)
        } else {
            VarDecl::int(name)
        }
    }
}

pub(crate) fn repr(layout: &Layout<'_>, ty: TypeRef) -> Repr {
    if ty.pointer {
        return Repr::Handle;
    }
    match &layout.program.types[ty.id] {
        Type::Basic(BasicType::Int) => Repr::Int,
        Type::Basic(BasicType::Bool) => Repr::Bool,
        Type::Basic(BasicType::Func(_) | BasicType::Chan) => Repr::Handle,
        Type::Basic(BasicType::Mutex) => Repr::Primitive(Primitive::Mutex),
        Type::Basic(BasicType::WaitGroup) => Repr::Primitive(Primitive::WaitGroup),
        Type::Basic(BasicType::Once) => Repr::Primitive(Primitive::Once),
        Type::Struct(_) => Repr::Composite(ty.id),
        Type::Container(c) if c.kind == ContainerKind::Array => Repr::Composite(ty.id),
        Type::Container(_) => Repr::Handle,
    }
}

/// Expression producing a fresh value of this representation.
pub(crate) fn fresh_value(layout: &Layout<'_>, repr: Repr) -> String {
    match repr {
        Repr::Bool => "false".to_string(),
        Repr::Int => "0".to_string(),
        Repr::Handle => "-1".to_string(),
        Repr::Primitive(p) => p.alloc().to_string(),
        Repr::Composite(ty) => match layout.pool(ty) {
            Some(pool) if is_array(layout, ty) => format!("alloc_{}({})", pool.name, pool.capacity),
            Some(pool) => format!("alloc_{}()", pool.name),
            None => "-1".to_string(),
        },
    }
}

/// Statement copying the value in slot `src` into slot `dst`.
pub(crate) fn copy_call(layout: &Layout<'_>, ty: TypeId, dst: &str, src: &str) -> Option<String> {
    layout
        .pool(ty)
        .map(|pool| format!("copy_{}({dst}, {src})", pool.name))
}

fn is_array(layout: &Layout<'_>, ty: TypeId) -> bool {
    layout.program.types[ty]
        .as_container()
        .is_some_and(|c| c.kind == ContainerKind::Array)
}

/// Whether copying a value of this type would share a primitive handle.
pub(crate) fn embeds_primitive(layout: &Layout<'_>, ty: TypeId) -> bool {
    let mut work = vec![ty];
    let mut seen = Vec::new();
    while let Some(t) = work.pop() {
        if seen.contains(&t) {
            continue;
        }
        seen.push(t);
        let inner: Vec<TypeRef> = match &layout.program.types[t] {
            Type::Struct(s) => s.fields.iter().map(|f| f.ty).collect(),
            Type::Container(c) if c.kind == ContainerKind::Array => vec![c.elem],
            _ => Vec::new(),
        };
        for r in inner {
            match repr(layout, r) {
                Repr::Primitive(_) => return true,
                Repr::Composite(id) => work.push(id),
                _ => {}
            }
        }
    }
    false
}

/// Field array names of each struct pool, by field index.
pub(crate) type FieldNames = IndexMap<TypeId, Vec<String>>;

/// Declare every pool with its allocation and copy routines, dependencies
/// first.
pub(crate) fn declare_pools(
    layout: &Layout<'_>,
    decls: &mut Declarations,
    warnings: &mut Vec<TranslationWarning>,
) -> FieldNames {
    let mut fields = FieldNames::new();
    for (&ty, pool) in &layout.pools {
        match &layout.program.types[ty] {
            Type::Struct(s) => {
                let mut namer = Namer::default();
                let names: Vec<String> = s
                    .fields
                    .iter()
                    .map(|f| format!("{}_{}", pool.name, namer.fresh(&sanitize(&f.name))))
                    .collect();
                let reprs: Vec<Repr> = s.fields.iter().map(|f| repr(layout, f.ty)).collect();
                declare_struct_pool(layout, decls, pool, &names, &reprs);
                fields.insert(ty, names);
            }
            Type::Container(c) => {
                if let Some(len) = c.len {
                    if len > pool.capacity as u64 {
                        warnings.push(TranslationWarning::new(
                            WarningCode::UnsupportedType,
                            format!(
                                "array of {len} elements truncated to {} slots",
                                pool.capacity
                            ),
                        ));
                    }
                }
                declare_container_pool(layout, decls, pool, repr(layout, c.elem));
            }
            Type::Basic(_) => {}
        }
    }
    fields
}

fn declare_struct_pool(
    layout: &Layout<'_>,
    decls: &mut Declarations,
    pool: &PoolInfo,
    fields: &[String],
    reprs: &[Repr],
) {
    let max = format!("{}_MAX", pool.name);
    let count = format!("{}_count", pool.name);
    decls.add_var(VarDecl::constant(&max, pool.size as i64));
    decls.add_var(VarDecl::int(&count).with_init("0"));
    for (name, r) in fields.iter().zip(reprs) {
        decls.add_var(r.decl(name).array(&max));
    }

    let init: Vec<String> = fields
        .iter()
        .zip(reprs)
        .filter(|(_, r)| !matches!(r, Repr::Bool | Repr::Int))
        .map(|(name, &r)| format!("{name}[id] = {};", fresh_value(layout, r)))
        .collect();
    decls.add_func(counted_alloc(
        &format!("alloc_{}", pool.name),
        &max,
        &count,
        &[],
        init,
    ));

    let mut copy = FuncDecl::new(format!("copy_{}", pool.name), "void")
        .param("int", "dst")
        .param("int", "src");
    for (name, r) in fields.iter().zip(reprs) {
        let line = match r {
            Repr::Composite(inner) => {
                copy_call(layout, *inner, &format!("{name}[dst]"), &format!("{name}[src]"))
                    .map(|c| format!("{c};"))
            }
            _ => None,
        };
        copy = copy.line(line.unwrap_or_else(|| format!("{name}[dst] = {name}[src];")));
    }
    decls.add_func(copy);
}

fn declare_container_pool(layout: &Layout<'_>, decls: &mut Declarations, pool: &PoolInfo, elem: Repr) {
    let n = &pool.name;
    let max = format!("{n}_MAX");
    let cap = format!("{n}_CAP");
    let count = format!("{n}_count");
    decls.add_var(VarDecl::constant(&max, pool.size as i64));
    decls.add_var(VarDecl::constant(&cap, pool.capacity as i64));
    decls.add_var(VarDecl::int(&count).with_init("0"));
    decls.add_var(VarDecl::int(format!("{n}_len")).array(&max));
    decls.add_var(elem.decl(format!("{n}_elem")).array(&max).array(&cap));

    let mut init = vec![
        format!("if (n > {cap}) {{"),
        format!("    {OUT_OF_RESOURCES} = true;"),
        "}".to_string(),
        format!("{n}_len[id] = n > {cap} ? {cap} : (n < 0 ? 0 : n);"),
    ];
    if !matches!(elem, Repr::Bool | Repr::Int) {
        init.push(format!("for (i : int[0, {cap} - 1]) {{"));
        init.push(format!("    if (i < {n}_len[id]) {{"));
        init.push(format!(
            "        {n}_elem[id][i] = {};",
            fresh_value(layout, elem)
        ));
        init.push("    }".to_string());
        init.push("}".to_string());
    }
    decls.add_func(counted_alloc(
        &format!("alloc_{n}"),
        &max,
        &count,
        &[("int", "n")],
        init,
    ));

    let elem_copy = match elem {
        Repr::Composite(inner) => {
            copy_call(layout, inner, &format!("{n}_elem[dst][i]"), &format!("{n}_elem[src][i]"))
                .map(|c| format!("{c};"))
        }
        _ => None,
    };
    decls.add_func(
        FuncDecl::new(format!("copy_{n}"), "void")
            .param("int", "dst")
            .param("int", "src")
            .line(format!("{n}_len[dst] = {n}_len[src];"))
            .line(format!("for (i : int[0, {cap} - 1]) {{"))
            .line(format!(
                "    {}",
                elem_copy.unwrap_or_else(|| format!("{n}_elem[dst][i] = {n}_elem[src][i];"))
            ))
            .line("}"),
    );
}
