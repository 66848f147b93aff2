//! Rendezvous program IR.
//!
//! This crate defines the read-only intermediate representation of a
//! concurrent program: functions, scopes, variables, typed statements and
//! values. The front end builds a [`Program`] once (usually through
//! [`ProgramBuilder`]); the analyzer and translator only ever read it.

pub mod builder;
pub mod program;
pub mod stmt;
pub mod types;
pub mod validation;

pub use builder::ProgramBuilder;
pub use program::*;
pub use stmt::*;
pub use types::*;
pub use validation::IrError;

/// Source span for warning and error reporting (byte offsets into
/// [`Program::source`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A spanned IR node.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
pub struct Spanned<T> {
    pub node: T,
    pub span: Span,
}

impl<T> Spanned<T> {
    pub fn new(node: T, span: Span) -> Self {
        Self { node, span }
    }
}

impl<T> From<T> for Spanned<T> {
    fn from(node: T) -> Self {
        Self {
            node,
            span: Span::default(),
        }
    }
}
