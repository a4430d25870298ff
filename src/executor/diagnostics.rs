use std::collections::HashMap;
use std::fmt::Write;
use std::time::Duration;

use crate::Graph;
use crate::core::TaskId;
use crate::executor::TaskExecution;

/// What happened during one [`Graph::execute`] call.
#[derive(Debug, Default)]
pub struct Diagnostics {
    pub execution_times: HashMap<TaskId, TaskExecution>,
    /// Backing objects created through an allocator.
    pub allocated: usize,
    /// Backing objects handed back to an allocator.
    pub released: usize,
    /// Timeline steps that ran to completion.
    pub steps: usize,
}

impl Diagnostics {
    /// Sum of task run times.
    pub fn busy_time(&self) -> Duration {
        self.execution_times.values().map(|t| t.duration).sum()
    }

    /// Tasks sorted by start time, with their offset from the first one.
    pub fn waterfall(&self) -> Vec<(TaskId, Duration, Duration)> {
        let mut ran = self
            .execution_times
            .iter()
            .map(|(id, t)| (*id, *t))
            .collect::<Vec<_>>();

        ran.sort_by_key(|(_, t)| t.start);

        let Some(first) = ran.first().map(|(_, t)| t.start) else {
            return Vec::new();
        };

        ran.into_iter()
            .map(|(id, t)| (id, t.start.duration_since(first), t.duration))
            .collect()
    }

    /// Plain-text waterfall, one task per line.
    pub fn render_waterfall<C>(&self, graph: &Graph<C>) -> String {
        let rows = self.waterfall();
        if rows.is_empty() {
            return String::from("No tasks ran\n");
        }

        let width = rows
            .iter()
            .map(|(id, ..)| graph.task_name(*id).len())
            .max()
            .unwrap_or(0);

        let mut output = String::new();
        for (id, offset, duration) in rows {
            let _ = writeln!(
                output,
                "{:<width$}  +{:>10}  {:>10}",
                graph.task_name(id),
                format_micros(offset),
                format_micros(duration),
            );
        }

        output
    }
}

fn format_micros(duration: Duration) -> String {
    let micros = duration.as_micros() as f64;
    if micros < 1000.0 {
        format!("{micros:.0}µs")
    } else {
        format!("{:.2}ms", micros / 1000.0)
    }
}
