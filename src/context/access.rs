use std::sync::Arc;

use super::opengl::OpenGLContext;
use super::state::Binding;
use super::thread;
use crate::backends::capabilities::Capabilities;
use crate::errors::*;
use crate::resource::driver::Drivers;
use crate::resource::handle::{HandleArena, ResourceHandle};
use crate::resource::registry::Registry;
use crate::resource::surface::{Surface, SurfaceObject};
use crate::resource::{Resource, ResourceId, Status};

/// Exclusive access to the graphics context, handed to every task that runs on the
/// context thread.
pub struct HardwareAccess {
    context: OpenGLContext,
    arena: HandleArena,
    drivers: Arc<Drivers>,
    registry: Arc<Registry>,
    active_surface: Option<ResourceId>,
}

impl HardwareAccess {
    pub(crate) fn new(context: OpenGLContext, drivers: Arc<Drivers>, registry: Arc<Registry>) -> Self {
        HardwareAccess {
            context,
            arena: HandleArena::default(),
            drivers,
            registry,
            active_surface: None,
        }
    }

    #[inline]
    pub fn capabilities(&self) -> &Capabilities {
        self.context.capabilities()
    }

    /// Makes the context current if it is not yet, and returns it.
    pub fn ensure_context(&mut self) -> Result<&mut OpenGLContext> {
        if thread::current_manager().is_none() {
            return Err(Error::NotContextThread("HardwareAccess::ensure_context"));
        }

        self.context.make_current()?;
        Ok(&mut self.context)
    }

    /// Synchronizes `resource` with its GPU twin right away.
    pub fn update(&mut self, resource: &dyn Resource) -> Result<Status> {
        let handle = self.registry.handle(resource);
        if handle.is_released() {
            return Err(Error::Destroyed(handle.id()));
        }

        let driver = match self.drivers.get(resource.kind()) {
            Some(driver) => driver.clone(),
            None => return Ok(Status::Unsupported),
        };

        self.context.make_current()?;
        let slot = self.arena.slot(resource.id(), &driver);
        Ok(driver.update(&mut self.context, resource, &mut slot.object))
    }

    /// Updates `surface` and makes it the render target of the current task. The
    /// surface is deactivated once the task finishes.
    pub fn set_active_surface(&mut self, surface: &Surface) -> Result<&mut OpenGLContext> {
        match self.update(surface)? {
            Status::Ready => {}
            status => return Err(Error::SurfaceUnavailable(status)),
        }

        let object = self
            .arena
            .get(surface.id())
            .and_then(|slot| slot.object.as_ref())
            .and_then(|v| v.downcast_ref::<SurfaceObject>())
            .and_then(|v| v.name())
            .ok_or(Error::SurfaceUnavailable(Status::Dirty))?;

        let binding = Binding {
            resource: surface.id(),
            object,
        };

        self.context.bind_surface(Some(binding))?;
        self.active_surface = Some(surface.id());
        Ok(&mut self.context)
    }

    #[inline]
    pub fn active_surface(&self) -> Option<ResourceId> {
        self.active_surface
    }

    /// The number of live GPU twins.
    #[inline]
    pub fn objects(&self) -> usize {
        self.arena.len()
    }

    pub(crate) fn deactivate_surface(&mut self) {
        self.active_surface = None;
    }

    /// Tears down the GPU twin of `handle`.
    pub(crate) fn release(&mut self, handle: &ResourceHandle) -> Result<()> {
        if !handle.mark_released() {
            return Ok(());
        }

        if self.active_surface == Some(handle.id()) {
            self.active_surface = None;
        }

        let slot = match self.arena.remove(handle.id()) {
            Some(slot) => slot,
            None => return Ok(()),
        };

        if let Some(object) = slot.object {
            self.context.make_current()?;
            slot.driver.destroy(&mut self.context, object)?;
            debug!("Destroyed GPU twin of {:?} {}.", handle.kind(), handle.id());
        }

        Ok(())
    }

    /// Releases everything left, and the context itself.
    pub(crate) fn teardown(&mut self) {
        if let Err(err) = self.context.make_current() {
            warn!("Failed to make context current for teardown: {}", err);
        }

        self.active_surface = None;
        self.arena.clear(&mut self.context);

        if let Err(err) = self.context.destroy() {
            warn!("Failed to destroy context: {}", err);
        }
    }
}
