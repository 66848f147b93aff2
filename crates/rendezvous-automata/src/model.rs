use std::fmt;

use indexmap::IndexSet;
use thiserror::Error;

use crate::declarations::Declarations;
use crate::process::Process;
use crate::query::{Query, QueryCategory};

/// A process template bound to concrete parameter values.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
pub struct ProcessInstance {
    pub name: String,
    pub process: String,
    pub args: Vec<String>,
}

impl ProcessInstance {
    pub fn new(name: impl Into<String>, process: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            name: name.into(),
            process: process.into(),
            args,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ModelError {
    #[error("Duplicate process '{0}'")]
    DuplicateProcess(String),
    #[error("Duplicate state '{state}' in process '{process}'")]
    DuplicateState { process: String, state: String },
    #[error("Process '{0}' has no states")]
    NoStates(String),
    #[error("Initial state of process '{0}' is out of range")]
    InitialOutOfRange(String),
    #[error("Transition {index} of process '{process}' references a missing state")]
    TransitionOutOfRange { process: String, index: usize },
    #[error("Instance '{instance}' refers to unknown process '{process}'")]
    UnknownProcess { instance: String, process: String },
    #[error("Instance '{instance}' passes {given} arguments, process expects {expected}")]
    ArityMismatch {
        instance: String,
        expected: usize,
        given: usize,
    },
    #[error("Duplicate instance '{0}'")]
    DuplicateInstance(String),
}

/// A network of process templates, their instances, shared declarations
/// and verification queries.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
pub struct Model {
    pub name: String,
    pub declarations: Declarations,
    pub processes: Vec<Process>,
    pub instances: Vec<ProcessInstance>,
    pub queries: Vec<Query>,
}

impl Model {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn add_process(&mut self, process: Process) -> usize {
        let id = self.processes.len();
        self.processes.push(process);
        id
    }

    pub fn add_instance(&mut self, instance: ProcessInstance) -> usize {
        let id = self.instances.len();
        self.instances.push(instance);
        id
    }

    pub fn add_query(&mut self, query: Query) -> usize {
        let id = self.queries.len();
        self.queries.push(query);
        id
    }

    pub fn find_process(&self, name: &str) -> Option<&Process> {
        self.processes.iter().find(|p| p.name == name)
    }

    pub fn instances_of<'a>(&'a self, process: &'a str) -> impl Iterator<Item = &'a ProcessInstance> {
        self.instances.iter().filter(move |i| i.process == process)
    }

    pub fn queries_in(&self, category: QueryCategory) -> impl Iterator<Item = &Query> {
        self.queries.iter().filter(move |q| q.category == category)
    }

    /// Check internal consistency: names are unique, every state reference
    /// resolves and every instance matches its template.
    pub fn validate(&self) -> Result<(), ModelError> {
        let mut names = IndexSet::new();
        for p in &self.processes {
            if !names.insert(p.name.as_str()) {
                return Err(ModelError::DuplicateProcess(p.name.clone()));
            }
            if p.states.is_empty() {
                return Err(ModelError::NoStates(p.name.clone()));
            }
            let mut states = IndexSet::new();
            for s in &p.states {
                if !states.insert(s.name.as_str()) {
                    return Err(ModelError::DuplicateState {
                        process: p.name.clone(),
                        state: s.name.clone(),
                    });
                }
            }
            if p.initial >= p.states.len() {
                return Err(ModelError::InitialOutOfRange(p.name.clone()));
            }
            if let Some(index) = p
                .transitions
                .iter()
                .position(|t| t.from >= p.states.len() || t.to >= p.states.len())
            {
                return Err(ModelError::TransitionOutOfRange {
                    process: p.name.clone(),
                    index,
                });
            }
        }

        let mut instances = IndexSet::new();
        for inst in &self.instances {
            if !instances.insert(inst.name.as_str()) {
                return Err(ModelError::DuplicateInstance(inst.name.clone()));
            }
            let process =
                self.find_process(&inst.process)
                    .ok_or_else(|| ModelError::UnknownProcess {
                        instance: inst.name.clone(),
                        process: inst.process.clone(),
                    })?;
            if process.params.len() != inst.args.len() {
                return Err(ModelError::ArityMismatch {
                    instance: inst.name.clone(),
                    expected: process.params.len(),
                    given: inst.args.len(),
                });
            }
        }
        Ok(())
    }
}

impl fmt::Display for Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Model {}:", self.name)?;
        writeln!(f, "  Declarations:")?;
        for line in self.declarations.to_string().lines() {
            writeln!(f, "    {line}")?;
        }
        for p in &self.processes {
            for line in p.to_string().lines() {
                writeln!(f, "  {line}")?;
            }
        }
        writeln!(f, "  Instances:")?;
        for inst in &self.instances {
            writeln!(
                f,
                "    {} = {}({});",
                inst.name,
                inst.process,
                inst.args.join(", ")
            )?;
        }
        writeln!(f, "  Queries:")?;
        for q in &self.queries {
            writeln!(f, "    {q}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::{StateKind, Transition};

    fn tiny_process(name: &str) -> Process {
        let mut p = Process::new(name).param("int", "pid");
        let a = p.add_state("starting", StateKind::Normal);
        let b = p.add_state("ended", StateKind::Normal);
        p.add_transition(Transition::new(a, b));
        p
    }

    #[test]
    fn valid_model_passes() {
        let mut m = Model::new("demo");
        m.add_process(tiny_process("main"));
        m.add_instance(ProcessInstance::new("main_0", "main", vec!["0".into()]));
        m.add_query(Query::new(
            QueryCategory::ResourceBound,
            "A[] not out_of_resources",
            "resource bounds are respected",
        ));
        assert_eq!(m.validate(), Ok(()));
        assert_eq!(m.instances_of("main").count(), 1);
        assert!(m.to_string().contains("main_0 = main(0);"));
    }

    #[test]
    fn broken_models_are_rejected() {
        let mut m = Model::new("dup");
        m.add_process(tiny_process("p"));
        m.add_process(tiny_process("p"));
        assert_eq!(m.validate(), Err(ModelError::DuplicateProcess("p".into())));

        let mut m = Model::new("dangling");
        let mut p = tiny_process("p");
        p.add_transition(Transition::new(0, 7));
        m.add_process(p);
        assert_eq!(
            m.validate(),
            Err(ModelError::TransitionOutOfRange {
                process: "p".into(),
                index: 1
            })
        );

        let mut m = Model::new("arity");
        m.add_process(tiny_process("p"));
        m.add_instance(ProcessInstance::new("p_0", "p", vec![]));
        assert!(matches!(m.validate(), Err(ModelError::ArityMismatch { .. })));

        let mut m = Model::new("unknown");
        m.add_instance(ProcessInstance::new("q_0", "q", vec![]));
        assert!(matches!(m.validate(), Err(ModelError::UnknownProcess { .. })));
    }
}
