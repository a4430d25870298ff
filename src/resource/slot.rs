use std::any::{Any, type_name};
use std::borrow::Cow;

use crate::core::{Lifetime, ResourceId, TaskId, Usage};
use crate::resource::{Realize, ResourceKind};

/// Outcome of a realize/derealize request on a single resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Transition {
    /// A backing object was created through the allocator.
    Allocated,
    /// A backing object was handed back to the allocator.
    Released,
    /// Nothing to do, the lifetime policy or current state says so.
    Kept,
    /// External resource without a backing object.
    Missing,
}

/// Kind-erased view of a resource's storage.
///
/// Has a blanket implementation for every `TypedSlot<K>` where `K: Realize<C>`.
pub(crate) trait Slot<C> {
    fn realize(&mut self, lifetime: Lifetime, ctx: &mut C) -> anyhow::Result<Transition>;
    fn derealize(&mut self, lifetime: Lifetime, ctx: &mut C) -> Transition;
    /// Like `derealize`, but also releases persistent objects.
    fn release(&mut self, lifetime: Lifetime, ctx: &mut C) -> Transition;
    fn is_live(&self) -> bool;
    fn kind_name(&self) -> &'static str;
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

pub(crate) struct TypedSlot<K: ResourceKind> {
    pub desc: K::Desc,
    pub actual: Option<K::Actual>,
}

impl<K: ResourceKind> TypedSlot<K> {
    pub(crate) fn new(desc: K::Desc, actual: Option<K::Actual>) -> Self {
        Self { desc, actual }
    }
}

impl<C, K: Realize<C>> Slot<C> for TypedSlot<K> {
    fn realize(&mut self, lifetime: Lifetime, ctx: &mut C) -> anyhow::Result<Transition> {
        match lifetime {
            Lifetime::External if self.actual.is_none() => Ok(Transition::Missing),
            Lifetime::External => Ok(Transition::Kept),
            Lifetime::Transient | Lifetime::Persistent if self.actual.is_some() => {
                Ok(Transition::Kept)
            }
            Lifetime::Transient | Lifetime::Persistent => {
                self.actual = Some(K::realize(&self.desc, ctx)?);
                Ok(Transition::Allocated)
            }
        }
    }

    fn derealize(&mut self, lifetime: Lifetime, ctx: &mut C) -> Transition {
        match lifetime {
            Lifetime::Transient => self.release(lifetime, ctx),
            Lifetime::External | Lifetime::Persistent => Transition::Kept,
        }
    }

    fn release(&mut self, lifetime: Lifetime, ctx: &mut C) -> Transition {
        if lifetime == Lifetime::External {
            return Transition::Kept;
        }

        match self.actual.take() {
            Some(actual) => {
                K::derealize(actual, ctx);
                Transition::Released
            }
            None => Transition::Kept,
        }
    }

    fn is_live(&self) -> bool {
        self.actual.is_some()
    }

    fn kind_name(&self) -> &'static str {
        type_name::<K>()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// A resource record owned by the graph arena.
pub(crate) struct ResourceNode<C> {
    pub id: ResourceId,
    pub name: Cow<'static, str>,
    pub lifetime: Lifetime,
    pub creator: TaskId,
    pub readers: Vec<TaskId>,
    pub writers: Vec<TaskId>,
    /// Filled in by the compiler, `None` if no scheduled task touches it.
    pub usage: Option<Usage>,
    pub slot: Box<dyn Slot<C>>,
}

impl<C> ResourceNode<C> {
    pub(crate) fn typed<K: ResourceKind>(&self) -> &TypedSlot<K> {
        self.slot
            .as_any()
            .downcast_ref::<TypedSlot<K>>()
            .expect("Type mismatch in resource handle")
    }

    pub(crate) fn typed_mut<K: ResourceKind>(&mut self) -> &mut TypedSlot<K> {
        self.slot
            .as_any_mut()
            .downcast_mut::<TypedSlot<K>>()
            .expect("Type mismatch in resource handle")
    }
}
