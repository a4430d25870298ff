use std::borrow::Cow;

use crate::compiler::{self, Edge};
use crate::config::GraphOptions;
use crate::core::{GraphId, Lifetime, ResourceId, TaskId, Usage};
use crate::error::GraphError;
use crate::executor::{self, Diagnostics};
use crate::report::ScheduleReport;
use crate::resource::{Handle, ResourceKind, ResourceNode, Transition};
use crate::task::{TaskBuilder, TaskContext, TaskNode, TaskRef, TypedJob};
use crate::timeline::Timeline;

/// The frame graph.
///
/// A `Graph` owns every task and resource of one scheduling epoch. Tasks are
/// declared with [`Graph::add_task`], which runs their setup callback right
/// away. [`Graph::compile`] then orders the tasks and computes resource
/// lifetimes, and [`Graph::execute`] runs the result, realizing each resource
/// just before its first use and derealizing it right after its last.
///
/// `C` is the execution context handed to every allocator and task callback,
/// e.g. a command recorder for the current frame. Use `()` if there is none.
///
/// # Example
///
/// ```rust
/// use framegraph::{Graph, Value};
///
/// let mut graph = Graph::<()>::new();
///
/// let mut color = None;
/// graph.add_task(
///     "clear",
///     |_: &mut (), builder| color = Some(builder.create::<Value<[u8; 4]>>("color", [0; 4])),
///     |_, _| Ok(()),
/// );
///
/// let color = color.unwrap();
/// graph.add_task(
///     "present",
///     |_: &mut (), builder| {
///         builder.read(color);
///     },
///     move |_, task| {
///         assert_eq!(task.get(color), Some(&[0; 4]));
///         Ok(())
///     },
/// );
///
/// graph.compile()?;
/// graph.execute(&mut ())?;
/// # Ok::<(), framegraph::GraphError>(())
/// ```
pub struct Graph<C = ()> {
    pub(crate) id: GraphId,
    pub(crate) options: GraphOptions,
    pub(crate) tasks: Vec<TaskNode<C>>,
    pub(crate) resources: Vec<ResourceNode<C>>,
    pub(crate) timeline: Option<Timeline>,
    pub(crate) dirty: bool,
}

impl<C> Graph<C> {
    /// Creates a new, empty graph with default options.
    pub fn new() -> Self {
        Self::with_options(GraphOptions::default())
    }

    pub fn with_options(options: GraphOptions) -> Self {
        Self {
            id: GraphId::next(),
            options,
            tasks: Vec::new(),
            resources: Vec::new(),
            timeline: None,
            dirty: false,
        }
    }

    pub fn options(&self) -> &GraphOptions {
        &self.options
    }

    /// Declare a task.
    ///
    /// `setup` runs exactly once, before this call returns, with a default
    /// payload and a [`TaskBuilder`] through which the task declares the
    /// resources it creates, reads and writes. `exec` runs once per
    /// [`Graph::execute`], at the position the compiler assigned to the task.
    ///
    /// Marks the graph dirty.
    pub fn add_task<D, S, E>(
        &mut self,
        name: impl Into<Cow<'static, str>>,
        setup: S,
        exec: E,
    ) -> TaskRef<D>
    where
        D: Default + 'static,
        S: FnOnce(&mut D, &mut TaskBuilder<'_, C>),
        E: FnMut(&D, &mut TaskContext<'_, C>) -> anyhow::Result<()> + 'static,
    {
        let id = TaskId(self.tasks.len());
        let name = name.into();
        let mut data = D::default();

        let mut builder = TaskBuilder::new(self.id, id, &mut self.resources);
        setup(&mut data, &mut builder);
        let TaskBuilder { reads, writes, .. } = builder;

        tracing::trace!(
            task = %name,
            id = id.index(),
            reads = reads.len(),
            writes = writes.len(),
            "declared task"
        );

        self.tasks.push(TaskNode {
            id,
            name,
            reads,
            writes,
            job: Box::new(TypedJob { data, exec }),
        });
        self.dirty = true;

        TaskRef::new(self.id, id)
    }

    /// Order the tasks and compute resource lifetimes.
    ///
    /// Safe to call any number of times; without new declarations in between
    /// the resulting timeline is identical. With [`CyclePolicy::Strict`] a
    /// cycle is an error: the graph stays dirty, and the previous timeline and
    /// resource lifetimes are left as they were. Otherwise the cycle is
    /// recorded on the timeline and the tasks that could be ordered are kept.
    ///
    /// [`CyclePolicy::Strict`]: crate::CyclePolicy::Strict
    pub fn compile(&mut self) -> Result<&Timeline, GraphError> {
        let timeline = compiler::compile(&self.tasks, &mut self.resources, &self.options)?;

        tracing::debug!(
            tasks = self.tasks.len(),
            resources = self.resources.len(),
            steps = timeline.len(),
            "compiled task graph"
        );

        self.dirty = false;
        Ok(self.timeline.insert(timeline))
    }

    /// Run the compiled timeline with the given context.
    ///
    /// Fails fast with [`GraphError::NotCompiled`] if anything was declared
    /// since the last successful [`Graph::compile`]. A failing allocator or
    /// task aborts the remaining steps; resources realized before the failure
    /// stay allocated until [`Graph::teardown`].
    pub fn execute(&mut self, ctx: &mut C) -> Result<Diagnostics, GraphError> {
        if self.dirty {
            return Err(GraphError::NotCompiled);
        }

        let Some(timeline) = self.timeline.as_ref() else {
            return Err(GraphError::NotCompiled);
        };

        executor::run(self.id, timeline, &mut self.tasks, &mut self.resources, ctx)
    }

    /// Release every backing object the graph still holds, persistent ones
    /// included. External resources are left alone.
    ///
    /// Returns the number of objects handed back to their allocators.
    pub fn teardown(&mut self, ctx: &mut C) -> usize {
        let mut released = 0;

        for resource in self.resources.iter_mut() {
            if resource.slot.release(resource.lifetime, ctx) == Transition::Released {
                tracing::trace!(resource = %resource.name, "released on teardown");
                released += 1;
            }
        }

        released
    }

    /// Whether declarations were added since the last compilation.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// The last compiled timeline. May be stale, see [`Graph::is_dirty`].
    pub fn timeline(&self) -> Option<&Timeline> {
        self.timeline.as_ref()
    }

    /// Ordering edges implied by the current declarations.
    pub fn edges(&self) -> Vec<Edge> {
        let graph =
            compiler::build_dependencies(self.tasks.len(), &self.resources, self.options.hazards);
        compiler::edges(&graph)
    }

    /// Serializable summary of the last compilation.
    pub fn report(&self) -> Option<ScheduleReport> {
        self.timeline
            .as_ref()
            .map(|timeline| ScheduleReport::new(self, timeline))
    }

    pub fn task_count(&self) -> usize {
        self.tasks.len()
    }

    pub fn resource_count(&self) -> usize {
        self.resources.len()
    }

    /// Name the task was declared with.
    ///
    /// # Panics
    ///
    /// If `task` is not a task of this graph.
    pub fn task_name(&self, task: TaskId) -> &str {
        &self.task_node(task).name
    }

    /// Resources the task declared as read.
    ///
    /// # Panics
    ///
    /// If `task` is not a task of this graph.
    pub fn task_reads(&self, task: TaskId) -> &[ResourceId] {
        &self.task_node(task).reads
    }

    /// Resources the task created or declared as written.
    ///
    /// # Panics
    ///
    /// If `task` is not a task of this graph.
    pub fn task_writes(&self, task: TaskId) -> &[ResourceId] {
        &self.task_node(task).writes
    }

    /// Payload of a task, as left by its setup callback.
    pub fn task_data<D: 'static>(&self, task: TaskRef<D>) -> &D {
        assert!(task.graph == self.id, "{task:?} belongs to a different graph");
        self.tasks[task.id.index()]
            .job
            .data()
            .downcast_ref::<D>()
            .expect("Type mismatch in task reference")
    }

    /// Name the resource was created with.
    ///
    /// # Panics
    ///
    /// If `resource` is not a resource of this graph.
    pub fn resource_name(&self, resource: ResourceId) -> &str {
        &self.resource_node(resource).name
    }

    /// Lifetime policy of the resource.
    ///
    /// # Panics
    ///
    /// If `resource` is not a resource of this graph.
    pub fn lifetime_of(&self, resource: ResourceId) -> Lifetime {
        self.resource_node(resource).lifetime
    }

    /// First and last position in the compiled order, `None` if no scheduled
    /// task uses the resource.
    ///
    /// # Panics
    ///
    /// If `resource` is not a resource of this graph.
    pub fn usage(&self, resource: ResourceId) -> Option<Usage> {
        self.resource_node(resource).usage
    }

    /// Task that created the resource.
    ///
    /// # Panics
    ///
    /// If `resource` is not a resource of this graph.
    pub fn creator(&self, resource: ResourceId) -> TaskId {
        self.resource_node(resource).creator
    }

    /// Tasks that read the resource, in declaration order.
    ///
    /// # Panics
    ///
    /// If `resource` is not a resource of this graph.
    pub fn readers(&self, resource: ResourceId) -> &[TaskId] {
        &self.resource_node(resource).readers
    }

    /// Tasks that write the resource, creator first.
    ///
    /// # Panics
    ///
    /// If `resource` is not a resource of this graph.
    pub fn writers(&self, resource: ResourceId) -> &[TaskId] {
        &self.resource_node(resource).writers
    }

    /// Whether the resource currently has a backing object.
    ///
    /// # Panics
    ///
    /// If `resource` is not a resource of this graph.
    pub fn is_realized(&self, resource: ResourceId) -> bool {
        self.resource_node(resource).slot.is_live()
    }

    pub fn descriptor<K: ResourceKind>(&self, handle: Handle<K>) -> &K::Desc {
        &self.node(handle).typed::<K>().desc
    }

    /// Backing object of a resource, if it currently has one.
    pub fn get<K: ResourceKind>(&self, handle: Handle<K>) -> Option<&K::Actual> {
        self.node(handle).typed::<K>().actual.as_ref()
    }

    pub fn get_mut<K: ResourceKind>(&mut self, handle: Handle<K>) -> Option<&mut K::Actual> {
        self.check(handle);
        self.resources[handle.id.index()]
            .typed_mut::<K>()
            .actual
            .as_mut()
    }

    /// Install the backing object of an `External` resource, replacing the
    /// previous one. Does not mark the graph dirty.
    pub fn set_external<K: ResourceKind>(
        &mut self,
        handle: Handle<K>,
        actual: K::Actual,
    ) -> Result<Option<K::Actual>, GraphError> {
        self.check(handle);
        let node = &mut self.resources[handle.id.index()];

        if node.lifetime != Lifetime::External {
            return Err(GraphError::NotExternal(node.name.to_string()));
        }

        Ok(node.typed_mut::<K>().actual.replace(actual))
    }

    fn task_node(&self, task: TaskId) -> &TaskNode<C> {
        self.tasks
            .get(task.index())
            .unwrap_or_else(|| panic!("{task:?} is not a task of this graph"))
    }

    fn resource_node(&self, resource: ResourceId) -> &ResourceNode<C> {
        self.resources
            .get(resource.index())
            .unwrap_or_else(|| panic!("{resource:?} is not a resource of this graph"))
    }

    fn node<K>(&self, handle: Handle<K>) -> &ResourceNode<C> {
        self.check(handle);
        &self.resources[handle.id.index()]
    }

    fn check<K>(&self, handle: Handle<K>) {
        assert!(
            handle.graph == self.id,
            "{handle:?} belongs to a different graph"
        );
    }
}

impl<C> Default for Graph<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C> std::fmt::Display for Graph<C> {
    /// Mermaid flowchart of tasks and the resources they touch.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "graph LR")?;

        for task in &self.tasks {
            let name = task.name.replace('"', "\\\"");
            writeln!(f, "    t{}[\"{}\"]", task.id.index(), name)?;
        }

        for resource in &self.resources {
            let name = resource.name.replace('"', "\\\"");
            writeln!(f, "    r{}[(\"{}\")]", resource.id.index(), name)?;
        }

        for task in &self.tasks {
            for resource in &task.writes {
                writeln!(f, "    t{} --> r{}", task.id.index(), resource.index())?;
            }
            for resource in &task.reads {
                writeln!(f, "    r{} --> t{}", resource.index(), task.id.index())?;
            }
        }

        Ok(())
    }
}
