use std::fmt;

use crate::declarations::Declarations;

/// A unique identifier for a state within one process.
pub type StateId = usize;
/// A unique identifier for a transition within one process.
pub type TransitionId = usize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
pub enum StateKind {
    #[default]
    Normal,
    /// Time may not pass and the next transition must leave a committed
    /// state.
    Committed,
    /// Time may not pass.
    Urgent,
}

impl fmt::Display for StateKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StateKind::Normal => write!(f, "normal"),
            StateKind::Committed => write!(f, "committed"),
            StateKind::Urgent => write!(f, "urgent"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
pub struct State {
    pub name: String,
    pub kind: StateKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
pub enum SyncDir {
    /// `event!`
    Emit,
    /// `event?`
    Accept,
}

/// A synchronization label: an event expression and a direction.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
pub struct SyncLabel {
    pub event: String,
    pub dir: SyncDir,
}

impl fmt::Display for SyncLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.dir {
            SyncDir::Emit => write!(f, "{}!", self.event),
            SyncDir::Accept => write!(f, "{}?", self.event),
        }
    }
}

/// An edge of a process.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
pub struct Transition {
    pub from: StateId,
    pub to: StateId,
    /// Nondeterministic choice, e.g. `i : int[0,3]`.
    pub select: Option<String>,
    pub guard: Option<String>,
    pub sync: Option<SyncLabel>,
    pub updates: Vec<String>,
}

impl Transition {
    pub fn new(from: StateId, to: StateId) -> Self {
        Self {
            from,
            to,
            select: None,
            guard: None,
            sync: None,
            updates: Vec::new(),
        }
    }

    pub fn select(mut self, select: impl Into<String>) -> Self {
        self.select = Some(select.into());
        self
    }

    /// Conjoin `guard` with any existing guard.
    pub fn guard(mut self, guard: impl Into<String>) -> Self {
        let guard = guard.into();
        self.guard = Some(match self.guard.take() {
            Some(prev) => format!("({prev}) && ({guard})"),
            None => guard,
        });
        self
    }

    pub fn emit(mut self, event: impl Into<String>) -> Self {
        self.sync = Some(SyncLabel {
            event: event.into(),
            dir: SyncDir::Emit,
        });
        self
    }

    pub fn accept(mut self, event: impl Into<String>) -> Self {
        self.sync = Some(SyncLabel {
            event: event.into(),
            dir: SyncDir::Accept,
        });
        self
    }

    pub fn update(mut self, update: impl Into<String>) -> Self {
        self.updates.push(update.into());
        self
    }

    pub fn updates<I, S>(mut self, updates: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.updates.extend(updates.into_iter().map(Into::into));
        self
    }
}

impl fmt::Display for Transition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.from, self.to)?;
        if let Some(select) = &self.select {
            write!(f, " select {select}")?;
        }
        if let Some(guard) = &self.guard {
            write!(f, " when {guard}")?;
        }
        if let Some(sync) = &self.sync {
            write!(f, " sync {sync}")?;
        }
        if !self.updates.is_empty() {
            write!(f, " do {}", self.updates.join(", "))?;
        }
        Ok(())
    }
}

/// A process template.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
pub struct Process {
    pub name: String,
    /// `(type, name)` pairs bound by each instance.
    pub params: Vec<(String, String)>,
    pub decls: Declarations,
    pub states: Vec<State>,
    pub initial: StateId,
    pub transitions: Vec<Transition>,
}

impl Process {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            params: Vec::new(),
            decls: Declarations::new(),
            states: Vec::new(),
            initial: 0,
            transitions: Vec::new(),
        }
    }

    pub fn param(mut self, ty: impl Into<String>, name: impl Into<String>) -> Self {
        self.params.push((ty.into(), name.into()));
        self
    }

    pub fn add_state(&mut self, name: impl Into<String>, kind: StateKind) -> StateId {
        let id = self.states.len();
        self.states.push(State {
            name: name.into(),
            kind,
        });
        id
    }

    pub fn add_transition(&mut self, transition: Transition) -> TransitionId {
        let id = self.transitions.len();
        self.transitions.push(transition);
        id
    }

    pub fn find_state(&self, name: &str) -> Option<StateId> {
        self.states.iter().position(|s| s.name == name)
    }

    pub fn state_name(&self, id: StateId) -> &str {
        self.states.get(id).map(|s| s.name.as_str()).unwrap_or("?")
    }

    pub fn outgoing(&self, state: StateId) -> impl Iterator<Item = &Transition> {
        self.transitions.iter().filter(move |t| t.from == state)
    }

    pub fn incoming(&self, state: StateId) -> impl Iterator<Item = &Transition> {
        self.transitions.iter().filter(move |t| t.to == state)
    }

    /// Transitions synchronizing on an event whose expression starts with
    /// `prefix`.
    pub fn syncs_on<'a>(&'a self, prefix: &'a str) -> impl Iterator<Item = &'a Transition> + 'a {
        self.transitions.iter().filter(move |t| {
            t.sync
                .as_ref()
                .is_some_and(|s| s.event.starts_with(prefix))
        })
    }
}

impl fmt::Display for Process {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let params: Vec<String> = self
            .params
            .iter()
            .map(|(ty, name)| format!("{ty} {name}"))
            .collect();
        writeln!(f, "process {}({}):", self.name, params.join(", "))?;
        writeln!(f, "  States:")?;
        for (i, s) in self.states.iter().enumerate() {
            let initial = if i == self.initial { " (initial)" } else { "" };
            match s.kind {
                StateKind::Normal => writeln!(f, "    s{i}: {}{initial}", s.name)?,
                kind => writeln!(f, "    s{i}: {} [{kind}]{initial}", s.name)?,
            }
        }
        writeln!(f, "  Transitions:")?;
        for t in &self.transitions {
            writeln!(f, "    {t}")?;
        }
        Ok(())
    }
}
