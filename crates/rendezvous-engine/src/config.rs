//! Translation settings as loaded from JSON.

use rendezvous_analysis::DEFAULT_SATURATION;
use rendezvous_automata::QueryCategory;
use rendezvous_translate::{Limits, TranslateOptions};
use serde::{Deserialize, Serialize};

use crate::PipelineError;

/// One switch per query category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryToggles {
    pub resource_bound: bool,
    pub channel_safety: bool,
    pub mutex_safety: bool,
    pub wait_group_safety: bool,
    pub no_channel_deadlock: bool,
    pub no_mutex_deadlock: bool,
    pub no_wait_group_deadlock: bool,
    pub no_once_deadlock: bool,
    pub no_nil_call: bool,
    pub no_panicking_exit: bool,
    pub reachability: bool,
}

impl Default for QueryToggles {
    fn default() -> Self {
        Self {
            resource_bound: true,
            channel_safety: true,
            mutex_safety: true,
            wait_group_safety: true,
            no_channel_deadlock: true,
            no_mutex_deadlock: true,
            no_wait_group_deadlock: true,
            no_once_deadlock: true,
            no_nil_call: true,
            no_panicking_exit: true,
            reachability: true,
        }
    }
}

impl QueryToggles {
    pub fn enabled(&self, category: QueryCategory) -> bool {
        match category {
            QueryCategory::ResourceBound => self.resource_bound,
            QueryCategory::ChannelSafety => self.channel_safety,
            QueryCategory::MutexSafety => self.mutex_safety,
            QueryCategory::WaitGroupSafety => self.wait_group_safety,
            QueryCategory::NoChannelDeadlock => self.no_channel_deadlock,
            QueryCategory::NoMutexDeadlock => self.no_mutex_deadlock,
            QueryCategory::NoWaitGroupDeadlock => self.no_wait_group_deadlock,
            QueryCategory::NoOnceDeadlock => self.no_once_deadlock,
            QueryCategory::NoNilCall => self.no_nil_call,
            QueryCategory::NoPanickingExit => self.no_panicking_exit,
            QueryCategory::Reachability => self.reachability,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TranslationConfig {
    pub max_processes: usize,
    pub max_defers: usize,
    pub max_channels: usize,
    pub max_mutexes: usize,
    pub max_wait_groups: usize,
    pub max_onces: usize,
    pub max_structs: usize,
    pub max_containers: usize,
    pub container_capacity: usize,
    /// Cap on every count the analyzer computes.
    pub saturation: u64,
    pub queries: QueryToggles,
    pub eliminate_unused: bool,
}

impl Default for TranslationConfig {
    fn default() -> Self {
        let limits = Limits::default();
        Self {
            max_processes: limits.max_processes,
            max_defers: limits.max_defers,
            max_channels: limits.max_channels,
            max_mutexes: limits.max_mutexes,
            max_wait_groups: limits.max_wait_groups,
            max_onces: limits.max_onces,
            max_structs: limits.max_structs,
            max_containers: limits.max_containers,
            container_capacity: limits.container_capacity,
            saturation: DEFAULT_SATURATION,
            queries: QueryToggles::default(),
            eliminate_unused: true,
        }
    }
}

impl TranslationConfig {
    /// Parse and validate a JSON document; missing keys take their defaults.
    pub fn from_json_str(json: &str) -> Result<Self, PipelineError> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| PipelineError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), PipelineError> {
        let maxima = [
            ("max_processes", self.max_processes),
            ("max_defers", self.max_defers),
            ("max_channels", self.max_channels),
            ("max_mutexes", self.max_mutexes),
            ("max_wait_groups", self.max_wait_groups),
            ("max_onces", self.max_onces),
            ("max_structs", self.max_structs),
            ("max_containers", self.max_containers),
            ("container_capacity", self.container_capacity),
        ];
        if let Some((name, _)) = maxima.iter().find(|(_, v)| *v == 0) {
            return Err(PipelineError::Config(format!("{name} must be at least 1")));
        }
        if self.saturation < 1 {
            return Err(PipelineError::Config(
                "saturation must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    pub fn options(&self) -> TranslateOptions {
        TranslateOptions {
            limits: Limits {
                max_processes: self.max_processes,
                max_defers: self.max_defers,
                max_channels: self.max_channels,
                max_mutexes: self.max_mutexes,
                max_wait_groups: self.max_wait_groups,
                max_onces: self.max_onces,
                max_structs: self.max_structs,
                max_containers: self.max_containers,
                container_capacity: self.container_capacity,
            },
            queries: QueryCategory::ALL
                .into_iter()
                .filter(|c| self.queries.enabled(*c))
                .collect(),
            eliminate_unused: self.eliminate_unused,
        }
    }
}
