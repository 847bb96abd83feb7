use std::any::Any;
use std::sync::Arc;

use super::buffer::BufferDriver;
use super::shader::ShaderDriver;
use super::surface::SurfaceDriver;
use super::texture::TextureDriver;
use super::{Content, Resource, ResourceId, ResourceKind, Shared, Status};
use crate::context::OpenGLContext;
use crate::errors::*;
use crate::sched::unwind;
use crate::utils::hash::FastHashMap;

/// The failure of a driver update.
#[derive(Debug, Clone, PartialEq, Fail)]
pub enum UpdateError {
    /// The context could never represent the resource.
    #[fail(display = "{}", _0)]
    Unsupported(String),
    /// The update failed, and could be retried once the resource changes.
    #[fail(display = "{}", _0)]
    Failed(String),
}

impl From<Error> for UpdateError {
    fn from(err: Error) -> UpdateError {
        UpdateError::Failed(format!("{}", err))
    }
}

/// Synchronizes one kind of resource with its GPU twin.
///
/// Drivers are only invoked on the context thread with a current context. The status
/// bookkeeping is shared by all drivers: `allocate` is called the first time a resource
/// is updated, followed by a `full` update. Later updates are incremental unless the
/// content asks for a rebuild.
pub trait ResourceDriver: Send + Sync + 'static {
    type Content: Content;
    type Handle: Send + 'static;

    fn kind(&self) -> ResourceKind;

    /// Creates the GPU object, without uploading anything yet.
    fn allocate(
        &self,
        ctx: &mut OpenGLContext,
        id: ResourceId,
        content: &Self::Content,
    ) -> ::std::result::Result<Self::Handle, UpdateError>;

    /// Pushes the content to the GPU object. Returns the status message on success.
    fn update(
        &self,
        ctx: &mut OpenGLContext,
        content: &mut Self::Content,
        handle: &mut Self::Handle,
        full: bool,
    ) -> ::std::result::Result<String, UpdateError>;

    /// Deletes the GPU object, after unbinding it from wherever it is bound.
    fn destroy_impl(&self, ctx: &mut OpenGLContext, handle: Self::Handle) -> Result<()>;
}

/// The type-erased side of `ResourceDriver` that the context thread works with.
pub(crate) trait ErasedDriver: Send + Sync {
    fn kind(&self) -> ResourceKind;

    fn update(
        &self,
        ctx: &mut OpenGLContext,
        resource: &dyn Resource,
        object: &mut Option<Box<dyn Any + Send>>,
    ) -> Status;

    fn destroy(&self, ctx: &mut OpenGLContext, object: Box<dyn Any + Send>) -> Result<()>;
}

impl<D: ResourceDriver> ErasedDriver for D {
    fn kind(&self) -> ResourceKind {
        ResourceDriver::kind(self)
    }

    fn update(
        &self,
        ctx: &mut OpenGLContext,
        resource: &dyn Resource,
        object: &mut Option<Box<dyn Any + Send>>,
    ) -> Status {
        let shared = match resource.as_any().downcast_ref::<Shared<D::Content>>() {
            Some(shared) => shared,
            None => {
                warn!(
                    "{:?} driver can not handle resource {}.",
                    ResourceDriver::kind(self),
                    resource.id()
                );
                return Status::Unsupported;
            }
        };

        let mut state = shared.lock();
        match state.status {
            Status::Unsupported | Status::Error => return state.status,
            Status::Dirty | Status::Ready => {}
        }

        let outcome = unwind::halt_unwinding(|| {
            let mut full = state.content.needs_full_update();
            if object.is_none() {
                let handle = self.allocate(ctx, shared.id(), &state.content)?;
                *object = Some(Box::new(handle));
                full = true;
            }

            let handle = object
                .as_mut()
                .and_then(|v| v.downcast_mut::<D::Handle>())
                .ok_or_else(|| UpdateError::Failed("GPU object has an unexpected type.".into()))?;

            ResourceDriver::update(self, ctx, &mut state.content, handle, full)
        });

        let (status, message) = match outcome {
            Ok(Ok(message)) => {
                state.content.clear_dirty();
                (Status::Ready, message)
            }
            Ok(Err(UpdateError::Unsupported(message))) => (Status::Unsupported, message),
            Ok(Err(UpdateError::Failed(message))) => (Status::Error, message),
            Err(payload) => {
                let message = format!("Driver panicked: {}", unwind::payload_message(&*payload));
                (Status::Error, message)
            }
        };

        if status == Status::Ready {
            debug!("{} is {:?}. {}", shared.id(), status, message);
        } else {
            warn!("{} is {:?}: {}", shared.id(), status, message);
        }

        state.status = status;
        state.message = message;
        status
    }

    fn destroy(&self, ctx: &mut OpenGLContext, object: Box<dyn Any + Send>) -> Result<()> {
        match object.downcast::<D::Handle>() {
            Ok(handle) => self.destroy_impl(ctx, *handle),
            Err(_) => Err(Error::Backend("GPU object has an unexpected type.".into())),
        }
    }
}

/// The set of drivers a framework dispatches resources to.
#[derive(Clone)]
pub struct Drivers {
    drivers: FastHashMap<ResourceKind, Arc<dyn ErasedDriver>>,
}

impl Default for Drivers {
    /// All the built-in drivers.
    fn default() -> Self {
        Drivers::empty()
            .with(TextureDriver)
            .with(BufferDriver)
            .with(ShaderDriver)
            .with(SurfaceDriver)
    }
}

impl Drivers {
    /// A set without any driver.
    pub fn empty() -> Self {
        Drivers {
            drivers: FastHashMap::default(),
        }
    }

    /// Registers `driver`, replacing the previous one of the same kind.
    pub fn with<D: ResourceDriver>(mut self, driver: D) -> Self {
        let kind = ResourceDriver::kind(&driver);
        self.drivers.insert(kind, Arc::new(driver));
        self
    }

    /// Unregisters the driver of `kind`.
    pub fn without(mut self, kind: ResourceKind) -> Self {
        self.drivers.remove(&kind);
        self
    }

    #[inline]
    pub fn contains(&self, kind: ResourceKind) -> bool {
        self.drivers.contains_key(&kind)
    }

    pub(crate) fn get(&self, kind: ResourceKind) -> Option<&Arc<dyn ErasedDriver>> {
        self.drivers.get(&kind)
    }
}
