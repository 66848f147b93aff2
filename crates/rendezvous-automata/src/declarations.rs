use std::fmt;

/// Kind of a declared identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
pub enum VarKind {
    Int,
    Bool,
    Clock,
    /// Binary synchronization event.
    Chan,
    /// Synchronization event received by every enabled receiver at once.
    BroadcastChan,
    /// Synchronization event that must fire without delay once enabled.
    UrgentChan,
}

impl fmt::Display for VarKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VarKind::Int => write!(f, "int"),
            VarKind::Bool => write!(f, "bool"),
            VarKind::Clock => write!(f, "clock"),
            VarKind::Chan => write!(f, "chan"),
            VarKind::BroadcastChan => write!(f, "broadcast chan"),
            VarKind::UrgentChan => write!(f, "urgent chan"),
        }
    }
}

/// A typed variable or array declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
pub struct VarDecl {
    pub name: String,
    pub kind: VarKind,
    pub constant: bool,
    /// Inclusive bounds of an integer.
    pub range: Option<(i64, i64)>,
    /// Array dimensions, outermost first. Each is an expression so that
    /// named constants can size arrays.
    pub dims: Vec<String>,
    pub init: Option<String>,
}

impl VarDecl {
    pub fn new(name: impl Into<String>, kind: VarKind) -> Self {
        Self {
            name: name.into(),
            kind,
            constant: false,
            range: None,
            dims: Vec::new(),
            init: None,
        }
    }

    pub fn int(name: impl Into<String>) -> Self {
        Self::new(name, VarKind::Int)
    }

    pub fn bool(name: impl Into<String>) -> Self {
        Self::new(name, VarKind::Bool)
    }

    pub fn chan(name: impl Into<String>) -> Self {
        Self::new(name, VarKind::Chan)
    }

    pub fn broadcast(name: impl Into<String>) -> Self {
        Self::new(name, VarKind::BroadcastChan)
    }

    pub fn urgent(name: impl Into<String>) -> Self {
        Self::new(name, VarKind::UrgentChan)
    }

    pub fn constant(name: impl Into<String>, value: i64) -> Self {
        Self {
            constant: true,
            init: Some(value.to_string()),
            ..Self::int(name)
        }
    }

    pub fn array(mut self, dim: impl Into<String>) -> Self {
        self.dims.push(dim.into());
        self
    }

    pub fn bounded(mut self, min: i64, max: i64) -> Self {
        self.range = Some((min, max));
        self
    }

    pub fn with_init(mut self, init: impl Into<String>) -> Self {
        self.init = Some(init.into());
        self
    }

    pub fn is_array(&self) -> bool {
        !self.dims.is_empty()
    }
}

impl fmt::Display for VarDecl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.constant {
            write!(f, "const ")?;
        }
        write!(f, "{}", self.kind)?;
        if let Some((lo, hi)) = self.range {
            write!(f, "[{lo},{hi}]")?;
        }
        write!(f, " {}", self.name)?;
        for dim in &self.dims {
            write!(f, "[{dim}]")?;
        }
        if let Some(init) = &self.init {
            write!(f, " = {init}")?;
        }
        write!(f, ";")
    }
}

/// A helper routine callable from guards and updates.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
pub struct FuncDecl {
    pub name: String,
    pub return_type: String,
    /// `(type, name)` pairs.
    pub params: Vec<(String, String)>,
    pub body: Vec<String>,
}

impl FuncDecl {
    pub fn new(name: impl Into<String>, return_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            return_type: return_type.into(),
            params: Vec::new(),
            body: Vec::new(),
        }
    }

    pub fn param(mut self, ty: impl Into<String>, name: impl Into<String>) -> Self {
        self.params.push((ty.into(), name.into()));
        self
    }

    pub fn line(mut self, line: impl Into<String>) -> Self {
        self.body.push(line.into());
        self
    }

    pub fn lines<I, S>(mut self, lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.body.extend(lines.into_iter().map(Into::into));
        self
    }
}

impl fmt::Display for FuncDecl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let params: Vec<String> = self
            .params
            .iter()
            .map(|(ty, name)| format!("{ty} {name}"))
            .collect();
        writeln!(
            f,
            "{} {}({}) {{",
            self.return_type,
            self.name,
            params.join(", ")
        )?;
        for line in &self.body {
            writeln!(f, "    {line}")?;
        }
        write!(f, "}}")
    }
}

/// Variables, helper routines and an optional initializer, either global
/// or local to one process.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
pub struct Declarations {
    pub vars: Vec<VarDecl>,
    pub funcs: Vec<FuncDecl>,
    /// Body of the routine run once before any transition.
    pub init: Vec<String>,
}

impl Declarations {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_var(&mut self, var: VarDecl) -> usize {
        let id = self.vars.len();
        self.vars.push(var);
        id
    }

    pub fn add_func(&mut self, func: FuncDecl) -> usize {
        let id = self.funcs.len();
        self.funcs.push(func);
        id
    }

    pub fn add_init(&mut self, line: impl Into<String>) {
        self.init.push(line.into());
    }

    pub fn find_var(&self, name: &str) -> Option<&VarDecl> {
        self.vars.iter().find(|v| v.name == name)
    }

    pub fn find_func(&self, name: &str) -> Option<&FuncDecl> {
        self.funcs.iter().find(|f| f.name == name)
    }

    pub fn has(&self, name: &str) -> bool {
        self.find_var(name).is_some() || self.find_func(name).is_some()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty() && self.funcs.is_empty() && self.init.is_empty()
    }
}

impl fmt::Display for Declarations {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for var in &self.vars {
            writeln!(f, "{var}")?;
        }
        for func in &self.funcs {
            writeln!(f, "{func}")?;
        }
        if !self.init.is_empty() {
            writeln!(f, "void initialize() {{")?;
            for line in &self.init {
                writeln!(f, "    {line}")?;
            }
            writeln!(f, "}}")?;
        }
        Ok(())
    }
}
