mod diagnostics;

use std::time::{Duration, Instant};

use crate::core::{GraphId, TaskId};
use crate::error::GraphError;
use crate::resource::{ResourceNode, Transition};
use crate::task::{TaskContext, TaskNode};
use crate::timeline::Timeline;

pub use crate::executor::diagnostics::Diagnostics;

/// Wall-clock timing of a single task run.
#[derive(Debug, Clone, Copy)]
pub struct TaskExecution {
    pub start: Instant,
    pub duration: Duration,
}

/// Walk the compiled timeline once.
///
/// Each step realizes the resources whose first use it is, runs its task, and
/// then derealizes the resources whose last use it is. The first allocator or
/// task error stops the walk and is returned; later steps do not run.
pub(crate) fn run<C>(
    graph: GraphId,
    timeline: &Timeline,
    tasks: &mut [TaskNode<C>],
    resources: &mut [ResourceNode<C>],
    ctx: &mut C,
) -> Result<Diagnostics, GraphError> {
    let mut diagnostics = Diagnostics::default();

    let root_span = tracing::debug_span!("execute", steps = timeline.len());
    let _enter = root_span.enter();

    for step in timeline.steps() {
        for &id in &step.realize {
            let node = &mut resources[id.index()];

            match node.slot.realize(node.lifetime, ctx) {
                Ok(Transition::Allocated) => {
                    tracing::trace!(
                        resource = %node.name,
                        kind = node.slot.kind_name(),
                        "realized"
                    );
                    diagnostics.allocated += 1;
                }
                Ok(Transition::Missing) => {
                    tracing::warn!(
                        resource = %node.name,
                        "external resource has no backing object"
                    );
                }
                Ok(_) => {}
                Err(err) => return Err(GraphError::Realize(node.name.to_string(), err)),
            }
        }

        if let Some(id) = step.task {
            let execution = run_task(graph, id, tasks, resources, ctx)?;
            diagnostics.execution_times.insert(id, execution);
        }

        for &id in &step.derealize {
            let node = &mut resources[id.index()];

            if node.slot.derealize(node.lifetime, ctx) == Transition::Released {
                tracing::trace!(resource = %node.name, "derealized");
                diagnostics.released += 1;
            }
        }

        diagnostics.steps += 1;
    }

    Ok(diagnostics)
}

fn run_task<C>(
    graph: GraphId,
    id: TaskId,
    tasks: &mut [TaskNode<C>],
    resources: &mut [ResourceNode<C>],
    ctx: &mut C,
) -> Result<TaskExecution, GraphError> {
    let task = &mut tasks[id.index()];

    let span = tracing::debug_span!("task", name = %task.name);
    let _enter = span.enter();

    let mut context = TaskContext {
        ctx,
        graph,
        name: &task.name,
        reads: &task.reads,
        writes: &task.writes,
        resources,
    };

    let start = Instant::now();

    // A panicking task is reported like a failing one.
    let result = match std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
        task.job.run(&mut context)
    })) {
        Ok(result) => result,
        Err(panic) => {
            let msg = if let Some(s) = panic.downcast_ref::<&str>() {
                format!("Task panicked: {s}")
            } else if let Some(s) = panic.downcast_ref::<String>() {
                format!("Task panicked: {s}")
            } else {
                String::from("Task panicked with unknown payload")
            };

            Err(anyhow::anyhow!(msg))
        }
    };

    let duration = start.elapsed();

    match result {
        Ok(()) => {
            tracing::trace!(?duration, "task finished");
            Ok(TaskExecution { start, duration })
        }
        Err(err) => Err(GraphError::Task(task.name.to_string(), err)),
    }
}
