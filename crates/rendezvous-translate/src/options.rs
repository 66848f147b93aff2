use rendezvous_automata::QueryCategory;

/// Upper bounds on concurrently live units of each kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limits {
    pub max_processes: usize,
    pub max_defers: usize,
    pub max_channels: usize,
    pub max_mutexes: usize,
    pub max_wait_groups: usize,
    pub max_onces: usize,
    pub max_structs: usize,
    pub max_containers: usize,
    /// Element slots of every slice or map instance.
    pub container_capacity: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_processes: 5,
            max_defers: 4,
            max_channels: 5,
            max_mutexes: 5,
            max_wait_groups: 5,
            max_onces: 5,
            max_structs: 5,
            max_containers: 5,
            container_capacity: 5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranslateOptions {
    pub limits: Limits,
    /// Categories of queries to emit.
    pub queries: Vec<QueryCategory>,
    /// Size pools by what live code allocates instead of by the limits.
    /// Dead functions are never emitted either way.
    pub eliminate_unused: bool,
}

impl Default for TranslateOptions {
    fn default() -> Self {
        Self {
            limits: Limits::default(),
            queries: QueryCategory::ALL.to_vec(),
            eliminate_unused: true,
        }
    }
}

impl TranslateOptions {
    pub fn emits(&self, category: QueryCategory) -> bool {
        self.queries.contains(&category)
    }
}
