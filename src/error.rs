pub use anyhow::Error as RuntimeError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GraphError {
    #[error("Cycle detected in task graph: scheduled {scheduled} of {total} tasks, stuck on [{}]", .stuck.join(", "))]
    Cycle {
        scheduled: usize,
        total: usize,
        stuck: Vec<String>,
    },

    #[error("Graph has declarations that were not compiled; call `compile` before `execute`")]
    NotCompiled,

    #[error("Resource '{0}' is not external")]
    NotExternal(String),

    #[error("Couldn't realize resource '{0}':\n{1}")]
    Realize(String, RuntimeError),

    #[error("Task '{0}':\n{1}")]
    Task(String, RuntimeError),
}

impl GraphError {
    /// Whether the error happened while running a compiled timeline, in which
    /// case resources realized by earlier steps are still allocated.
    pub fn is_fatal(&self) -> bool {
        matches!(self, GraphError::Realize(..) | GraphError::Task(..))
    }
}
