//! Compiler settings.
//!
//! ```json
//! { "cycles": "strict", "hazards": "full" }
//! ```
//!
//! Every field is optional and falls back to the behaviour of a plain
//! [`Graph::new`](crate::Graph::new).

use serde::{Deserialize, Serialize};

/// What `compile` does when the declared dependencies contain a cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CyclePolicy {
    /// Report the cycle and keep the partial order. Tasks caught in the cycle,
    /// and everything downstream of them, are left out of the timeline.
    #[default]
    BestEffort,
    /// Fail compilation with [`GraphError::Cycle`](crate::GraphError::Cycle).
    Strict,
}

/// Which read/write hazards produce ordering edges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HazardPolicy {
    /// Writers of a resource are chained in declaration order, and every
    /// writer precedes every reader. A reader is never ordered before a writer
    /// declared after it, so write-after-read hazards are not covered.
    #[default]
    WriteOrdered,
    /// Writers are chained in declaration order, a writer precedes the readers
    /// declared after it, and a reader precedes the writers declared after it.
    /// All edges point forward in declaration order, so this never cycles.
    Full,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct GraphOptions {
    #[serde(default)]
    pub cycles: CyclePolicy,
    #[serde(default)]
    pub hazards: HazardPolicy,
}

impl GraphOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cycles(mut self, policy: CyclePolicy) -> Self {
        self.cycles = policy;
        self
    }

    pub fn hazards(mut self, policy: HazardPolicy) -> Self {
        self.hazards = policy;
        self
    }

    /// Parse options from a JSON document.
    pub fn from_json(text: &str) -> serde_json::Result<Self> {
        serde_json::from_str(text)
    }
}
