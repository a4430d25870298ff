//! Turns declared tasks and resources into a [`Timeline`].
//!
//! Compilation happens in four passes:
//!
//! 1. **Edges.** Every resource contributes ordering edges between the tasks
//!    that touch it, according to the [`HazardPolicy`]. The edges live in a
//!    `petgraph` graph whose node `i` is task `i`.
//! 2. **Order.** Kahn's algorithm over that graph. Successors are visited in
//!    edge insertion order, which makes the order a pure function of the
//!    declarations. If tasks remain with unsatisfied dependencies, there is a
//!    cycle.
//! 3. **Usage.** Each resource gets the first and last position, in the order,
//!    of any scheduled task that touches it.
//! 4. **Timeline.** One step per ordered task; a resource is realized at its
//!    first position and derealized at its last.

use std::collections::{HashSet, VecDeque};

use petgraph::Direction;
use petgraph::algo::tarjan_scc;
use petgraph::graph::{DiGraph, NodeIndex};
use serde::Serialize;

use crate::config::{CyclePolicy, GraphOptions, HazardPolicy};
use crate::core::{ResourceId, TaskId, Usage};
use crate::error::GraphError;
use crate::resource::ResourceNode;
use crate::task::TaskNode;
use crate::timeline::{Cycle, Step, Timeline};

/// Why one task has to run before another.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Hazard {
    /// Both tasks write the resource; declaration order wins.
    WriteAfterWrite,
    /// The later task reads what the earlier one wrote.
    ReadAfterWrite,
    /// The later task overwrites what the earlier one reads.
    WriteAfterRead,
}

/// An ordering edge: `from` must run before `to`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Edge {
    pub from: TaskId,
    pub to: TaskId,
    pub hazard: Hazard,
    pub resource: ResourceId,
}

pub(crate) type DependencyGraph = DiGraph<TaskId, (Hazard, ResourceId)>;

pub(crate) fn compile<C>(
    tasks: &[TaskNode<C>],
    resources: &mut [ResourceNode<C>],
    options: &GraphOptions,
) -> Result<Timeline, GraphError> {
    let graph = build_dependencies(tasks.len(), resources, options.hazards);
    let order = sort(&graph);

    let cycle = if order.len() != tasks.len() {
        let cycle = find_cycle(&graph, &order);
        let stuck = cycle
            .unscheduled
            .iter()
            .map(|id| tasks[id.index()].name.to_string())
            .collect::<Vec<_>>();

        match options.cycles {
            CyclePolicy::Strict => {
                return Err(GraphError::Cycle {
                    scheduled: order.len(),
                    total: tasks.len(),
                    stuck,
                });
            }
            CyclePolicy::BestEffort => {
                tracing::error!(
                    scheduled = order.len(),
                    total = tasks.len(),
                    ?stuck,
                    "cycle detected in task graph, continuing with a partial order"
                );
                Some(cycle)
            }
        }
    } else {
        None
    };

    // Nothing is written to the resources until the cycle policy has passed,
    // so a rejected compilation leaves the previous one intact.
    let usages = analyze_usage(&order, tasks.len(), resources);
    for (resource, usage) in resources.iter_mut().zip(usages) {
        resource.usage = usage;
    }

    let mut steps = order
        .iter()
        .map(|&task| Step {
            task: Some(task),
            ..Step::default()
        })
        .collect::<Vec<_>>();

    for resource in resources.iter() {
        if let Some(usage) = resource.usage {
            steps[usage.first].realize.push(resource.id);
            steps[usage.last].derealize.push(resource.id);
        }
    }

    log_schedule(tasks, resources, &order);

    Ok(Timeline {
        steps,
        cycle,
        edges: edges(&graph),
    })
}

pub(crate) fn build_dependencies<C>(
    task_count: usize,
    resources: &[ResourceNode<C>],
    policy: HazardPolicy,
) -> DependencyGraph {
    let mut graph = DependencyGraph::with_capacity(task_count, resources.len());

    for index in 0..task_count {
        graph.add_node(TaskId(index));
    }

    for resource in resources {
        let writers = first_seen(&resource.writers);
        let readers = first_seen(&resource.readers);

        for pair in writers.windows(2) {
            link(&mut graph, pair[0], pair[1], Hazard::WriteAfterWrite, resource.id);
        }

        for &writer in &writers {
            for &reader in &readers {
                match policy {
                    HazardPolicy::WriteOrdered => {
                        link(&mut graph, writer, reader, Hazard::ReadAfterWrite, resource.id)
                    }
                    HazardPolicy::Full if writer < reader => {
                        link(&mut graph, writer, reader, Hazard::ReadAfterWrite, resource.id)
                    }
                    HazardPolicy::Full => {
                        link(&mut graph, reader, writer, Hazard::WriteAfterRead, resource.id)
                    }
                }
            }
        }
    }

    graph
}

pub(crate) fn edges(graph: &DependencyGraph) -> Vec<Edge> {
    graph
        .raw_edges()
        .iter()
        .map(|edge| Edge {
            from: graph[edge.source()],
            to: graph[edge.target()],
            hazard: edge.weight.0,
            resource: edge.weight.1,
        })
        .collect()
}

fn link(
    graph: &mut DependencyGraph,
    from: TaskId,
    to: TaskId,
    hazard: Hazard,
    resource: ResourceId,
) {
    // a task that reads and writes the same resource does not wait on itself
    if from != to {
        graph.add_edge(NodeIndex::new(from.0), NodeIndex::new(to.0), (hazard, resource));
    }
}

/// Removes duplicates, keeping the first occurrence of each task.
fn first_seen(tasks: &[TaskId]) -> Vec<TaskId> {
    let mut seen = HashSet::with_capacity(tasks.len());
    tasks.iter().copied().filter(|task| seen.insert(*task)).collect()
}

/// Kahn's algorithm. Returns fewer tasks than the graph has nodes when the
/// graph contains a cycle.
fn sort(graph: &DependencyGraph) -> Vec<TaskId> {
    let mut indegree = graph
        .node_indices()
        .map(|node| graph.neighbors_directed(node, Direction::Incoming).count())
        .collect::<Vec<_>>();

    let mut queue = graph
        .node_indices()
        .filter(|node| indegree[node.index()] == 0)
        .collect::<VecDeque<_>>();

    let mut order = Vec::with_capacity(graph.node_count());

    while let Some(node) = queue.pop_front() {
        order.push(graph[node]);

        // petgraph walks adjacency lists newest edge first
        let mut next = graph
            .neighbors_directed(node, Direction::Outgoing)
            .collect::<Vec<_>>();
        next.reverse();

        for succ in next {
            indegree[succ.index()] -= 1;
            if indegree[succ.index()] == 0 {
                queue.push_back(succ);
            }
        }
    }

    order
}

fn find_cycle(graph: &DependencyGraph, order: &[TaskId]) -> Cycle {
    let scheduled = order.iter().copied().collect::<HashSet<_>>();

    let unscheduled = graph
        .node_indices()
        .map(|node| graph[node])
        .filter(|task| !scheduled.contains(task))
        .collect();

    let mut components = tarjan_scc(graph)
        .into_iter()
        .filter(|component| component.len() > 1)
        .map(|component| {
            let mut tasks = component
                .into_iter()
                .map(|node| graph[node])
                .collect::<Vec<_>>();
            tasks.sort();
            tasks
        })
        .collect::<Vec<_>>();
    components.sort();

    Cycle {
        unscheduled,
        components,
    }
}

/// A resource counts as used once something touches it beyond the implicit
/// write of its creation: a reader, or a second registered write.
fn analyze_usage<C>(
    order: &[TaskId],
    task_count: usize,
    resources: &[ResourceNode<C>],
) -> Vec<Option<Usage>> {
    let mut position = vec![None; task_count];
    for (index, task) in order.iter().enumerate() {
        position[task.index()] = Some(index);
    }

    resources
        .iter()
        .map(|resource| {
            if resource.readers.is_empty() && resource.writers.len() < 2 {
                return None;
            }

            resource
                .writers
                .iter()
                .chain(resource.readers.iter())
                .filter_map(|task| position[task.index()])
                .fold(None, |usage: Option<Usage>, at| match usage {
                    Some(mut usage) => {
                        usage.extend(at);
                        Some(usage)
                    }
                    None => Some(Usage::at(at)),
                })
        })
        .collect()
}

fn log_schedule<C>(tasks: &[TaskNode<C>], resources: &[ResourceNode<C>], order: &[TaskId]) {
    if !tracing::enabled!(tracing::Level::DEBUG) {
        return;
    }

    for (position, task) in order.iter().enumerate() {
        tracing::debug!(
            position,
            id = task.index(),
            task = %tasks[task.index()].name,
            "scheduled task"
        );
    }

    for resource in resources {
        match resource.usage {
            Some(usage) => tracing::debug!(
                resource = %resource.name,
                first = usage.first,
                last = usage.last,
                "resource lifetime"
            ),
            None => tracing::debug!(resource = %resource.name, "resource not used by any task"),
        }
    }
}
