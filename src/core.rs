use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

/// Dense index of a task, assigned in declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TaskId(pub(crate) usize);

impl TaskId {
    pub fn index(self) -> usize {
        self.0
    }
}

impl From<usize> for TaskId {
    fn from(index: usize) -> Self {
        TaskId(index)
    }
}

/// Dense index of a resource, assigned at creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ResourceId(pub(crate) usize);

impl ResourceId {
    pub fn index(self) -> usize {
        self.0
    }
}

impl From<usize> for ResourceId {
    fn from(index: usize) -> Self {
        ResourceId(index)
    }
}

/// Identity of a single [`Graph`](crate::Graph) instance. Handles carry it so
/// that a handle minted by one graph cannot silently address another.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct GraphId(u64);

impl GraphId {
    pub(crate) fn next() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        GraphId(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

/// Lifetime policy of a resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Lifetime {
    /// Allocated right before the first use and released right after the last
    /// use, within one execution.
    #[default]
    Transient,
    /// Backing object is owned by the caller. The graph never allocates or
    /// releases it.
    External,
    /// Allocated on first use and kept alive across executions until
    /// [`Graph::teardown`](crate::Graph::teardown).
    Persistent,
}

/// Positions in the compiled order at which a resource is first and last
/// touched. Always `first <= last`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    pub first: usize,
    pub last: usize,
}

impl Usage {
    pub(crate) fn at(position: usize) -> Self {
        Self {
            first: position,
            last: position,
        }
    }

    pub(crate) fn extend(&mut self, position: usize) {
        self.first = self.first.min(position);
        self.last = self.last.max(position);
    }

    /// Whether the resource is live while the step at `position` runs.
    pub fn contains(&self, position: usize) -> bool {
        self.first <= position && position <= self.last
    }
}
