use std::fmt;

/// Index of a type in [`crate::Program::types`].
pub type TypeId = usize;

/// A reference to a type, optionally through a pointer.
///
/// Pointer references never embed the pointee's storage, so they do not
/// participate in declaration ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
pub struct TypeRef {
    pub id: TypeId,
    pub pointer: bool,
}

impl TypeRef {
    pub fn value(id: TypeId) -> Self {
        Self { id, pointer: false }
    }

    pub fn pointer(id: TypeId) -> Self {
        Self { id, pointer: true }
    }
}

/// Function signature, used for dynamic-dispatch matching.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
pub struct Signature {
    /// Receiver type for method values; `None` for plain functions.
    pub receiver: Option<TypeRef>,
    pub params: Vec<TypeRef>,
    pub results: Vec<TypeRef>,
}

/// Built-in scalar kinds.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
pub enum BasicType {
    Int,
    Bool,
    Func(Signature),
    Chan,
    Mutex,
    WaitGroup,
    Once,
}

impl BasicType {
    /// Short kind name, stable across runs.
    pub fn kind_name(&self) -> &'static str {
        match self {
            BasicType::Int => "int",
            BasicType::Bool => "bool",
            BasicType::Func(_) => "func",
            BasicType::Chan => "chan",
            BasicType::Mutex => "mutex",
            BasicType::WaitGroup => "waitgroup",
            BasicType::Once => "once",
        }
    }
}

/// A field of a struct type.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
pub struct StructField {
    pub name: String,
    pub ty: TypeRef,
    /// Anonymous (embedded) field.
    pub embedded: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
pub struct StructType {
    pub name: String,
    pub fields: Vec<StructField>,
}

impl StructType {
    pub fn field_index(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name == name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
pub enum ContainerKind {
    Array,
    Slice,
    Map,
}

impl fmt::Display for ContainerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContainerKind::Array => write!(f, "array"),
            ContainerKind::Slice => write!(f, "slice"),
            ContainerKind::Map => write!(f, "map"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
pub struct ContainerType {
    pub kind: ContainerKind,
    pub elem: TypeRef,
    /// Static length, arrays only.
    pub len: Option<u64>,
}

/// A type in the program's type universe.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
pub enum Type {
    Basic(BasicType),
    Struct(StructType),
    Container(ContainerType),
}

impl Type {
    pub fn is_composite(&self) -> bool {
        matches!(self, Type::Struct(_) | Type::Container(_))
    }

    pub fn as_basic(&self) -> Option<&BasicType> {
        match self {
            Type::Basic(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_struct(&self) -> Option<&StructType> {
        match self {
            Type::Struct(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_container(&self) -> Option<&ContainerType> {
        match self {
            Type::Container(c) => Some(c),
            _ => None,
        }
    }

    /// Whether assigning or passing a value of this type copies its storage.
    ///
    /// Structs and arrays have value semantics; slices and maps share their
    /// backing storage.
    pub fn has_value_semantics(&self) -> bool {
        match self {
            Type::Struct(_) => true,
            Type::Container(c) => c.kind == ContainerKind::Array,
            Type::Basic(_) => false,
        }
    }
}
