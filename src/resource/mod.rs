//! Resource kinds and the handles used to refer to them.
//!
//! A resource is described by two traits:
//!
//! * [`ResourceKind`] names the descriptor type (what to allocate) and the
//!   actual type (the allocated object). It carries no behaviour, so typed
//!   storage does not depend on the execution context.
//! * [`Realize<C>`] is the backing allocator. It turns a descriptor into an
//!   actual object, and releases it again, given the opaque context `C` that
//!   the caller passes to [`Graph::execute`](crate::Graph::execute).
//!
//! The compiler never looks at either trait. It only needs the kind-independent
//! bookkeeping kept by the graph: readers, writers, lifetime and usage span.

mod slot;

use std::fmt::Debug;
use std::hash::Hash;
use std::marker::PhantomData;

use crate::core::{GraphId, ResourceId};

pub(crate) use crate::resource::slot::{ResourceNode, Transition, TypedSlot};

/// Descriptor and backing object types of one kind of resource.
pub trait ResourceKind: 'static {
    /// What the allocator needs to know to create the backing object.
    type Desc: 'static;
    /// The backing object itself.
    type Actual: 'static;
}

/// Backing allocator for a [`ResourceKind`] under the execution context `C`.
pub trait Realize<C>: ResourceKind {
    /// Create the backing object. An error here is fatal for the running
    /// `execute` call.
    fn realize(desc: &Self::Desc, ctx: &mut C) -> anyhow::Result<Self::Actual>;

    /// Release the backing object. Dropping it is the default.
    fn derealize(actual: Self::Actual, ctx: &mut C) {
        let _ = ctx;
        drop(actual);
    }
}

/// A resource whose backing object is a clone of its descriptor.
///
/// Useful for CPU-side scratch data that should follow the same lifetime
/// rules as device objects.
pub struct Value<T>(PhantomData<fn() -> T>);

impl<T: Clone + 'static> ResourceKind for Value<T> {
    type Desc = T;
    type Actual = T;
}

impl<C, T: Clone + 'static> Realize<C> for Value<T> {
    fn realize(desc: &T, _: &mut C) -> anyhow::Result<T> {
        Ok(desc.clone())
    }
}

/// A typed reference to a resource owned by a [`Graph`](crate::Graph).
///
/// Handles are lightweight, copyable tokens. They are only meaningful for the
/// graph that created them; passing one to a different graph panics.
pub struct Handle<K> {
    pub(crate) graph: GraphId,
    pub(crate) id: ResourceId,
    _phantom: PhantomData<fn() -> K>,
}

impl<K> Handle<K> {
    pub(crate) fn new(graph: GraphId, id: ResourceId) -> Self {
        Self {
            graph,
            id,
            _phantom: PhantomData,
        }
    }

    /// Returns the dense id of the resource within its graph.
    pub fn id(&self) -> ResourceId {
        self.id
    }
}

impl<K> Clone for Handle<K> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<K> Copy for Handle<K> {}

impl<K> PartialEq for Handle<K> {
    fn eq(&self, other: &Self) -> bool {
        self.graph == other.graph && self.id == other.id
    }
}

impl<K> Eq for Handle<K> {}

impl<K> Hash for Handle<K> {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.graph.hash(state);
        self.id.hash(state);
    }
}

impl<K> Debug for Handle<K> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Handle<{}>({})",
            std::any::type_name::<K>(),
            self.id.index()
        )
    }
}
