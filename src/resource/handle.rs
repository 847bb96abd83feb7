use std::any::Any;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use super::driver::ErasedDriver;
use super::{Resource, ResourceId, ResourceKind};
use crate::context::{ContextManager, HardwareAccess, OpenGLContext};
use crate::errors::*;
use crate::sched::future::Future;
use crate::utils::hash::FastHashMap;

/// The task group used for resource updates and destruction.
pub const RESOURCE_GROUP: &str = "resource";

/// Bookkeeping of the GPU twin of a resource, visible from any thread.
///
/// A handle is destroyed at most once. The first `destroy` wins the race and submits the
/// teardown to the context thread; every other call completes immediately.
pub struct ResourceHandle {
    id: ResourceId,
    kind: ResourceKind,
    destroyed: AtomicBool,
    released: AtomicBool,
    resource: Weak<dyn Any + Send + Sync>,
}

impl ResourceHandle {
    pub fn new(resource: &dyn Resource) -> Self {
        ResourceHandle {
            id: resource.id(),
            kind: resource.kind(),
            destroyed: AtomicBool::new(false),
            released: AtomicBool::new(false),
            resource: resource.downgrade(),
        }
    }

    #[inline]
    pub fn id(&self) -> ResourceId {
        self.id
    }

    #[inline]
    pub fn kind(&self) -> ResourceKind {
        self.kind
    }

    /// Checks if `destroy` has been called.
    #[inline]
    pub fn is_destroyed(&self) -> bool {
        self.destroyed.load(Ordering::Acquire)
    }

    /// Checks if the GPU twin has been torn down on the context thread.
    #[inline]
    pub fn is_released(&self) -> bool {
        self.released.load(Ordering::Acquire)
    }

    /// Checks if the application still holds the resource.
    #[inline]
    pub fn is_reachable(&self) -> bool {
        self.resource.upgrade().is_some()
    }

    /// Destroys the GPU twin. Only the first call submits a teardown task; the futures of
    /// all other calls are completed already.
    ///
    /// The teardown runs even while the framework is shutting down. Once the context
    /// thread stopped accepting work, leftovers are torn down by its final cleanup, so a
    /// rejected submission completes successfully as well.
    pub(crate) fn destroy(
        self: &Arc<Self>,
        contexts: &ContextManager,
        resource: Option<Arc<dyn Resource>>,
    ) -> Future<()> {
        if self.is_destroyed() {
            return Future::completed(());
        }

        if self
            .destroyed
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Future::completed(());
        }

        let handle = self.clone();
        let task = move |access: &mut HardwareAccess| {
            if let Err(err) = access.release(&handle) {
                warn!("Failed to destroy {:?} {}: {}", handle.kind(), handle.id(), err);
                return Err(err);
            }

            if let Some(resource) = resource {
                resource.invalidate();
            }

            Ok(())
        };

        match contexts.try_invoke(RESOURCE_GROUP, task, true) {
            Ok(future) => future,
            Err(Error::Shutdown) => Future::completed(()),
            Err(err) => Future::failed(err),
        }
    }

    /// Marks the GPU twin as torn down. Returns false if that happened before.
    pub(crate) fn mark_released(&self) -> bool {
        !self.released.swap(true, Ordering::AcqRel)
    }
}

/// A GPU object together with the driver that owns it.
pub(crate) struct HandleSlot {
    pub driver: Arc<dyn ErasedDriver>,
    pub object: Option<Box<dyn Any + Send>>,
}

/// The GPU side of every handle. Owned by the context thread exclusively.
#[derive(Default)]
pub(crate) struct HandleArena {
    slots: FastHashMap<ResourceId, HandleSlot>,
}

impl HandleArena {
    /// Gets the slot of `id`, creating an empty one if it does not exist.
    pub fn slot(&mut self, id: ResourceId, driver: &Arc<dyn ErasedDriver>) -> &mut HandleSlot {
        self.slots.entry(id).or_insert_with(|| HandleSlot {
            driver: driver.clone(),
            object: None,
        })
    }

    pub fn get(&self, id: ResourceId) -> Option<&HandleSlot> {
        self.slots.get(&id)
    }

    pub fn remove(&mut self, id: ResourceId) -> Option<HandleSlot> {
        self.slots.remove(&id)
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Tears down every GPU object left in the arena.
    pub fn clear(&mut self, ctx: &mut OpenGLContext) {
        for (id, slot) in self.slots.drain() {
            if let Some(object) = slot.object {
                warn!("GPU object of {:?} {} was never destroyed explicitly.", slot.driver.kind(), id);
                if let Err(err) = slot.driver.destroy(ctx, object) {
                    warn!("Failed to destroy GPU object of {}: {}", id, err);
                }
            }
        }
    }
}
