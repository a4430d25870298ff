use crate::compiler::Edge;
use crate::core::{ResourceId, TaskId};

/// One position of the compiled schedule.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Step {
    /// Task to run at this position. Every position produced by the compiler
    /// has one; the field stays optional for steps that only move resources.
    pub task: Option<TaskId>,
    /// Resources whose first use is this step, realized before the task runs.
    pub realize: Vec<ResourceId>,
    /// Resources whose last use is this step, derealized after the task runs.
    pub derealize: Vec<ResourceId>,
}

/// Tasks that could not be ordered because of circular dependencies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cycle {
    /// Every task left out of the order, in declaration order. Includes tasks
    /// that merely depend on a cycle.
    pub unscheduled: Vec<TaskId>,
    /// Groups of tasks that form the cycles themselves.
    pub components: Vec<Vec<TaskId>>,
}

/// The compiled, ordered sequence of realize/execute/derealize steps.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Timeline {
    pub(crate) steps: Vec<Step>,
    pub(crate) cycle: Option<Cycle>,
    pub(crate) edges: Vec<Edge>,
}

impl Timeline {
    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Task order, one entry per step.
    pub fn order(&self) -> impl Iterator<Item = TaskId> + '_ {
        self.steps.iter().filter_map(|step| step.task)
    }

    /// Position of a task in the order, `None` if it was not scheduled.
    pub fn position(&self, task: TaskId) -> Option<usize> {
        self.steps.iter().position(|step| step.task == Some(task))
    }

    /// Set when compilation hit a cycle under the best-effort policy.
    pub fn cycle(&self) -> Option<&Cycle> {
        self.cycle.as_ref()
    }

    /// Ordering edges the timeline was compiled from.
    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }
}
