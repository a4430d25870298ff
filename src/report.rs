//! Serializable summary of a compiled graph, for tooling and debugging.

use serde::Serialize;

use crate::Graph;
use crate::compiler::Edge;
use crate::core::{Lifetime, ResourceId, TaskId, Usage};
use crate::timeline::Timeline;

#[derive(Debug, Clone, Serialize)]
pub struct TaskEntry {
    pub id: TaskId,
    pub name: String,
    /// Position in the compiled order, absent for unscheduled tasks.
    pub position: Option<usize>,
    pub reads: Vec<ResourceId>,
    pub writes: Vec<ResourceId>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ResourceEntry {
    pub id: ResourceId,
    pub name: String,
    pub kind: &'static str,
    pub lifetime: Lifetime,
    pub creator: TaskId,
    pub first: Option<usize>,
    pub last: Option<usize>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CycleEntry {
    pub unscheduled: Vec<TaskId>,
    pub components: Vec<Vec<TaskId>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ScheduleReport {
    pub order: Vec<TaskId>,
    pub tasks: Vec<TaskEntry>,
    pub resources: Vec<ResourceEntry>,
    pub edges: Vec<Edge>,
    pub cycle: Option<CycleEntry>,
}

impl ScheduleReport {
    pub(crate) fn new<C>(graph: &Graph<C>, timeline: &Timeline) -> Self {
        let tasks = graph
            .tasks
            .iter()
            .map(|task| TaskEntry {
                id: task.id,
                name: task.name.to_string(),
                position: timeline.position(task.id),
                reads: task.reads.clone(),
                writes: task.writes.clone(),
            })
            .collect();

        let resources = graph
            .resources
            .iter()
            .map(|resource| ResourceEntry {
                id: resource.id,
                name: resource.name.to_string(),
                kind: resource.slot.kind_name(),
                lifetime: resource.lifetime,
                creator: resource.creator,
                first: resource.usage.map(|Usage { first, .. }| first),
                last: resource.usage.map(|Usage { last, .. }| last),
            })
            .collect();

        let cycle = timeline.cycle().map(|cycle| CycleEntry {
            unscheduled: cycle.unscheduled.clone(),
            components: cycle.components.clone(),
        });

        Self {
            order: timeline.order().collect(),
            tasks,
            resources,
            edges: timeline.edges().to_vec(),
            cycle,
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}
