//! Output model of the rendezvous translator: a network of timed-automata
//! process templates with shared declarations, concrete instances and
//! verification queries.
//!
//! The model carries every semantic decision; rendering it into a concrete
//! checker format is a pure, mechanical walk over these types.

pub mod declarations;
pub mod model;
pub mod process;
pub mod query;

pub use declarations::{Declarations, FuncDecl, VarDecl, VarKind};
pub use model::{Model, ModelError, ProcessInstance};
pub use process::{Process, State, StateId, StateKind, SyncDir, SyncLabel, Transition};
pub use query::{Query, QueryCategory, SourceLocation};
