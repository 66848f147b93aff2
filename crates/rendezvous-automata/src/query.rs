use std::fmt;
use std::str::FromStr;

/// What a verification query checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
#[cfg_attr(feature = "serialize", serde(rename_all = "kebab-case"))]
pub enum QueryCategory {
    ResourceBound,
    ChannelSafety,
    MutexSafety,
    WaitGroupSafety,
    NoChannelDeadlock,
    NoMutexDeadlock,
    NoWaitGroupDeadlock,
    NoOnceDeadlock,
    NoNilCall,
    NoPanickingExit,
    Reachability,
}

impl QueryCategory {
    pub const ALL: [QueryCategory; 11] = [
        QueryCategory::ResourceBound,
        QueryCategory::ChannelSafety,
        QueryCategory::MutexSafety,
        QueryCategory::WaitGroupSafety,
        QueryCategory::NoChannelDeadlock,
        QueryCategory::NoMutexDeadlock,
        QueryCategory::NoWaitGroupDeadlock,
        QueryCategory::NoOnceDeadlock,
        QueryCategory::NoNilCall,
        QueryCategory::NoPanickingExit,
        QueryCategory::Reachability,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            QueryCategory::ResourceBound => "resource-bound",
            QueryCategory::ChannelSafety => "channel-safety",
            QueryCategory::MutexSafety => "mutex-safety",
            QueryCategory::WaitGroupSafety => "wait-group-safety",
            QueryCategory::NoChannelDeadlock => "no-channel-deadlock",
            QueryCategory::NoMutexDeadlock => "no-mutex-deadlock",
            QueryCategory::NoWaitGroupDeadlock => "no-wait-group-deadlock",
            QueryCategory::NoOnceDeadlock => "no-once-deadlock",
            QueryCategory::NoNilCall => "no-nil-call",
            QueryCategory::NoPanickingExit => "no-panicking-exit",
            QueryCategory::Reachability => "reachability",
        }
    }
}

impl fmt::Display for QueryCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for QueryCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        QueryCategory::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| format!("unknown query category '{s}'"))
    }
}

/// Where in the source program a query originates.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
pub struct SourceLocation {
    pub file: String,
    /// Byte offsets.
    pub start: usize,
    pub end: usize,
    /// 1-based line and column, when the source text is known.
    pub line: Option<usize>,
    pub column: Option<usize>,
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.line, self.column) {
            (Some(line), Some(col)) => write!(f, "{}:{line}:{col}", self.file),
            _ => write!(f, "{}@{}..{}", self.file, self.start, self.end),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
pub struct Query {
    pub formula: String,
    pub description: String,
    pub location: Option<SourceLocation>,
    pub category: QueryCategory,
}

impl Query {
    pub fn new(
        category: QueryCategory,
        formula: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            formula: formula.into(),
            description: description.into(),
            location: None,
            category,
        }
    }

    pub fn at(mut self, location: SourceLocation) -> Self {
        self.location = Some(location);
        self
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.category, self.formula)?;
        if let Some(loc) = &self.location {
            write!(f, "  // {loc}")?;
        }
        Ok(())
    }
}
