#![forbid(unsafe_code)]
#![doc = include_str!("../README.md")]

mod compiler;
mod config;
mod core;
mod error;
mod executor;
mod graph;
#[cfg(feature = "logging")]
mod logging;
mod report;
mod resource;
mod task;
mod timeline;

pub use crate::compiler::{Edge, Hazard};
pub use crate::config::{CyclePolicy, GraphOptions, HazardPolicy};
pub use crate::core::{Lifetime, ResourceId, TaskId, Usage};
pub use crate::error::*;
pub use crate::executor::{Diagnostics, TaskExecution};
pub use crate::graph::Graph;
#[cfg(feature = "logging")]
pub use crate::logging::{LOG_ENV, init_logging};
pub use crate::report::{CycleEntry, ResourceEntry, ScheduleReport, TaskEntry};
pub use crate::resource::{Handle, Realize, ResourceKind, Value};
pub use crate::task::{TaskBuilder, TaskContext, TaskRef};
pub use crate::timeline::{Cycle, Step, Timeline};
