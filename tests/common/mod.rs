#![allow(dead_code)]

use framegraph::{Realize, ResourceKind, TaskContext};

/// A resource whose descriptor is its own name, so allocator calls can be
/// traced in the event log.
pub struct Buffer;

impl ResourceKind for Buffer {
    type Desc = &'static str;
    type Actual = String;
}

/// Execution context that records everything the graph asks of it.
#[derive(Debug, Default)]
pub struct Device {
    pub events: Vec<String>,
    pub allocations: usize,
    pub releases: usize,
    /// Allocation of the buffer with this name fails.
    pub fail: Option<&'static str>,
}

impl Realize<Device> for Buffer {
    fn realize(desc: &&'static str, device: &mut Device) -> anyhow::Result<String> {
        if device.fail == Some(*desc) {
            anyhow::bail!("out of memory for {desc}");
        }

        device.allocations += 1;
        device.events.push(format!("realize {desc}"));
        Ok(desc.to_string())
    }

    fn derealize(actual: String, device: &mut Device) {
        device.releases += 1;
        device.events.push(format!("derealize {actual}"));
    }
}

/// Execute callback that only logs the task name.
pub fn record<D>(_: &D, task: &mut TaskContext<'_, Device>) -> anyhow::Result<()> {
    let name = task.name().to_string();
    task.ctx.events.push(format!("run {name}"));
    Ok(())
}
