//! Task declaration and execution-time access.
//!
//! Declaring a task is a two-phase protocol. [`Graph::add_task`] creates the
//! task record and immediately runs its setup callback with a [`TaskBuilder`].
//! The builder borrows the graph mutably, so it cannot outlive that single
//! `add_task` call; every resource and edge the task will ever have is known
//! once `add_task` returns. The execute callback is stored and only runs later,
//! from [`Graph::execute`], with a [`TaskContext`].
//!
//! [`Graph::add_task`]: crate::Graph::add_task
//! [`Graph::execute`]: crate::Graph::execute

use std::any::Any;
use std::borrow::Cow;
use std::marker::PhantomData;

use crate::core::{GraphId, Lifetime, ResourceId, TaskId};
use crate::resource::{Handle, Realize, ResourceKind, ResourceNode, TypedSlot};

/// A typed reference to a declared task, carrying the type of its payload.
pub struct TaskRef<D> {
    pub(crate) graph: GraphId,
    pub(crate) id: TaskId,
    _phantom: PhantomData<fn() -> D>,
}

impl<D> TaskRef<D> {
    pub(crate) fn new(graph: GraphId, id: TaskId) -> Self {
        Self {
            graph,
            id,
            _phantom: PhantomData,
        }
    }

    /// Returns the dense id of the task within its graph.
    pub fn id(&self) -> TaskId {
        self.id
    }
}

impl<D> Clone for TaskRef<D> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<D> Copy for TaskRef<D> {}

impl<D> std::fmt::Debug for TaskRef<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "TaskRef({})", self.id.index())
    }
}

/// Payload plus execute callback, with the payload type erased.
pub(crate) trait Job<C> {
    fn run(&mut self, context: &mut TaskContext<'_, C>) -> anyhow::Result<()>;
    fn data(&self) -> &dyn Any;
}

pub(crate) struct TypedJob<D, F> {
    pub data: D,
    pub exec: F,
}

impl<C, D, F> Job<C> for TypedJob<D, F>
where
    D: 'static,
    F: FnMut(&D, &mut TaskContext<'_, C>) -> anyhow::Result<()>,
{
    fn run(&mut self, context: &mut TaskContext<'_, C>) -> anyhow::Result<()> {
        (self.exec)(&self.data, context)
    }

    fn data(&self) -> &dyn Any {
        &self.data
    }
}

/// A task record owned by the graph arena.
pub(crate) struct TaskNode<C> {
    pub id: TaskId,
    pub name: Cow<'static, str>,
    pub reads: Vec<ResourceId>,
    pub writes: Vec<ResourceId>,
    pub job: Box<dyn Job<C>>,
}

/// Declares the resources a task creates, reads and writes.
///
/// Only handed out for the duration of a task's setup callback.
pub struct TaskBuilder<'a, C> {
    pub(crate) graph: GraphId,
    pub(crate) task: TaskId,
    pub(crate) resources: &'a mut Vec<ResourceNode<C>>,
    pub(crate) reads: Vec<ResourceId>,
    pub(crate) writes: Vec<ResourceId>,
}

impl<'a, C> TaskBuilder<'a, C> {
    pub(crate) fn new(
        graph: GraphId,
        task: TaskId,
        resources: &'a mut Vec<ResourceNode<C>>,
    ) -> Self {
        Self {
            graph,
            task,
            resources,
            reads: Vec::new(),
            writes: Vec::new(),
        }
    }

    /// The task being declared.
    pub fn task(&self) -> TaskId {
        self.task
    }

    /// Create a new transient resource. The declaring task becomes its
    /// creator and its first writer.
    pub fn create<K>(&mut self, name: impl Into<Cow<'static, str>>, desc: K::Desc) -> Handle<K>
    where
        K: Realize<C>,
    {
        self.insert::<K>(name.into(), desc, None, Lifetime::Transient)
    }

    /// Create a new resource with an explicit lifetime policy.
    ///
    /// An `External` resource created this way has no backing object until
    /// [`Graph::set_external`](crate::Graph::set_external) installs one.
    pub fn create_with_lifetime<K>(
        &mut self,
        name: impl Into<Cow<'static, str>>,
        desc: K::Desc,
        lifetime: Lifetime,
    ) -> Handle<K>
    where
        K: Realize<C>,
    {
        self.insert::<K>(name.into(), desc, None, lifetime)
    }

    /// Create an `External` resource backed by a caller-owned object.
    pub fn create_external<K>(
        &mut self,
        name: impl Into<Cow<'static, str>>,
        desc: K::Desc,
        actual: K::Actual,
    ) -> Handle<K>
    where
        K: Realize<C>,
    {
        self.insert::<K>(name.into(), desc, Some(actual), Lifetime::External)
    }

    /// Declare that the task reads `handle`.
    pub fn read<K>(&mut self, handle: Handle<K>) -> Handle<K> {
        let index = self.check(&handle);
        let task = self.task;

        self.resources[index].readers.push(task);
        self.reads.push(handle.id);
        handle
    }

    /// Declare that the task writes `handle`.
    pub fn write<K>(&mut self, handle: Handle<K>) -> Handle<K> {
        let index = self.check(&handle);
        let task = self.task;

        self.resources[index].writers.push(task);
        self.writes.push(handle.id);
        handle
    }

    /// Descriptor of an already declared resource, e.g. to size a new
    /// resource after an input.
    pub fn descriptor<K: ResourceKind>(&self, handle: Handle<K>) -> &K::Desc {
        let index = self.check(&handle);
        &self.resources[index].typed::<K>().desc
    }

    fn insert<K>(
        &mut self,
        name: Cow<'static, str>,
        desc: K::Desc,
        actual: Option<K::Actual>,
        lifetime: Lifetime,
    ) -> Handle<K>
    where
        K: Realize<C>,
    {
        let id = ResourceId(self.resources.len());

        tracing::trace!(resource = %name, id = id.index(), ?lifetime, "declared resource");

        self.resources.push(ResourceNode {
            id,
            name,
            lifetime,
            creator: self.task,
            readers: Vec::new(),
            writers: vec![self.task],
            usage: None,
            slot: Box::new(TypedSlot::<K>::new(desc, actual)),
        });
        self.writes.push(id);

        Handle::new(self.graph, id)
    }

    fn check<K>(&self, handle: &Handle<K>) -> usize {
        assert!(
            handle.graph == self.graph,
            "{handle:?} belongs to a different graph"
        );
        handle.id.index()
    }
}

/// Access to the execution context and declared resources from inside a
/// task's execute callback.
pub struct TaskContext<'a, C> {
    /// The opaque context passed to [`Graph::execute`](crate::Graph::execute).
    pub ctx: &'a mut C,
    pub(crate) graph: GraphId,
    pub(crate) name: &'a str,
    pub(crate) reads: &'a [ResourceId],
    pub(crate) writes: &'a [ResourceId],
    pub(crate) resources: &'a mut [ResourceNode<C>],
}

impl<'a, C> TaskContext<'a, C> {
    /// Name of the running task.
    pub fn name(&self) -> &str {
        self.name
    }

    /// Backing object of a resource this task reads or writes.
    ///
    /// Returns `None` for an undeclared resource, or for an external resource
    /// that has no backing object.
    pub fn get<K: ResourceKind>(&self, handle: Handle<K>) -> Option<&K::Actual> {
        let declared = self.reads.contains(&handle.id) || self.writes.contains(&handle.id);
        let node = self.node(handle, declared)?;
        node.typed::<K>().actual.as_ref()
    }

    /// Mutable backing object of a resource this task writes.
    pub fn get_mut<K: ResourceKind>(&mut self, handle: Handle<K>) -> Option<&mut K::Actual> {
        let declared = self.writes.contains(&handle.id);
        self.node(handle, declared)?;
        self.resources[handle.id.index()]
            .typed_mut::<K>()
            .actual
            .as_mut()
    }

    /// Descriptor of a resource, declared or not.
    pub fn descriptor<K: ResourceKind>(&self, handle: Handle<K>) -> &K::Desc {
        assert!(
            handle.graph == self.graph,
            "{handle:?} belongs to a different graph"
        );
        &self.resources[handle.id.index()].typed::<K>().desc
    }

    fn node<K>(&self, handle: Handle<K>, declared: bool) -> Option<&ResourceNode<C>> {
        assert!(
            handle.graph == self.graph,
            "{handle:?} belongs to a different graph"
        );

        let node = &self.resources[handle.id.index()];
        if !declared {
            tracing::warn!(
                task = self.name,
                resource = %node.name,
                "task accessed a resource it did not declare"
            );
            return None;
        }

        Some(node)
    }
}
