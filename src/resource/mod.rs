//! Application-side resources and their GPU twins.
//!
//! A resource (`Texture`, `Buffer`, `Shader`, `Surface`) is a cheaply clonable description
//! that the application mutates freely from any thread. Every mutation is recorded as
//! dirty state. Calling `Framework::update` hands the resource to its `ResourceDriver` on
//! the context thread, which allocates the GPU object on first use and pushes only what
//! has changed since the previous update.
//!
//! The outcome of the last update is reported through `Status`:
//!
//! * `Dirty` - the GPU object is missing or older than the description.
//! * `Ready` - the GPU object matches the description.
//! * `Error` - the last update failed; a later change triggers a retry.
//! * `Unsupported` - the context can never represent this resource. This is terminal.

use std::any::Any;
use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError, Weak};

use uuid::Uuid;

/// Generates a public resource type backed by `Shared<$content>`.
macro_rules! impl_resource {
    ($name: ident, $content: ty, $kind: expr) => {
        #[derive(Clone)]
        pub struct $name {
            shared: ::std::sync::Arc<$crate::resource::Shared<$content>>,
        }

        impl $name {
            #[inline]
            fn from_content(content: $content) -> Self {
                $name {
                    shared: ::std::sync::Arc::new($crate::resource::Shared::new(content)),
                }
            }
        }

        impl $crate::resource::Resource for $name {
            #[inline]
            fn id(&self) -> $crate::resource::ResourceId {
                self.shared.id()
            }

            #[inline]
            fn kind(&self) -> $crate::resource::ResourceKind {
                $kind
            }

            #[inline]
            fn status(&self) -> $crate::resource::Status {
                self.shared.status()
            }

            #[inline]
            fn status_message(&self) -> String {
                self.shared.status_message()
            }

            #[inline]
            fn invalidate(&self) {
                self.shared.invalidate()
            }

            #[inline]
            fn as_any(&self) -> &dyn ::std::any::Any {
                &*self.shared
            }

            fn downgrade(&self) -> ::std::sync::Weak<dyn ::std::any::Any + Send + Sync> {
                let weak = ::std::sync::Arc::downgrade(&self.shared);
                weak
            }
        }

        impl ::std::fmt::Debug for $name {
            fn fmt(&self, f: &mut ::std::fmt::Formatter) -> ::std::fmt::Result {
                write!(f, "{}({})", stringify!($name), self.shared.id())
            }
        }
    };
}

pub mod buffer;
pub mod driver;
pub mod handle;
pub mod registry;
pub mod shader;
pub mod surface;
pub mod texture;

pub mod prelude {
    pub use super::buffer::{Buffer, BufferParams, BufferTarget, BufferUsage};
    pub use super::driver::{Drivers, ResourceDriver, UpdateError};
    pub use super::shader::{Shader, UniformValue};
    pub use super::surface::{Surface, SurfaceParams};
    pub use super::texture::{
        Comparison, Texture, TextureFilter, TextureFormat, TextureParams, TextureRegion,
        TextureWrap,
    };
    pub use super::{Resource, ResourceId, ResourceKind, Status};
}

/// Opaque identity of a resource, shared by all of its clones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceId(Uuid);

impl ResourceId {
    #[inline]
    pub fn new() -> Self {
        ResourceId(Uuid::new_v4())
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResourceKind {
    Texture,
    Buffer,
    Shader,
    Surface,
}

/// The synchronization status between a resource and its GPU twin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Status {
    Unsupported,
    Error,
    Dirty,
    Ready,
}

/// A resource that can be updated and destroyed through the framework.
pub trait Resource: Send + Sync + 'static {
    fn id(&self) -> ResourceId;
    fn kind(&self) -> ResourceKind;
    fn status(&self) -> Status;
    /// Message of the last update. Empty if it went without notable events.
    fn status_message(&self) -> String;
    /// Marks everything as changed, so the next update rebuilds the GPU twin from
    /// scratch. This is a no-op on unsupported resources.
    fn invalidate(&self);
    fn as_any(&self) -> &dyn Any;
    /// A weak reference that dies with the last clone of this resource.
    fn downgrade(&self) -> Weak<dyn Any + Send + Sync>;
}

/// The dirty-tracking content of a resource.
pub trait Content: Send + 'static {
    /// Checks if anything changed since the last successful update.
    fn is_dirty(&self) -> bool;
    /// Checks if the GPU twin must be rebuilt from scratch.
    fn needs_full_update(&self) -> bool;
    fn clear_dirty(&mut self);
    fn invalidate(&mut self);
}

/// The logical state of a resource, shared by all of its clones.
pub struct Shared<C> {
    id: ResourceId,
    state: Mutex<Tracked<C>>,
}

pub(crate) struct Tracked<C> {
    pub status: Status,
    pub message: String,
    pub content: C,
}

impl<C> Tracked<C> {
    /// Moves a synchronized or failed resource back to `Dirty`.
    fn touch(&mut self) {
        match self.status {
            Status::Ready | Status::Error => {
                self.status = Status::Dirty;
                self.message.clear();
            }
            Status::Dirty | Status::Unsupported => {}
        }
    }
}

impl<C: Content> Shared<C> {
    pub fn new(content: C) -> Self {
        Shared {
            id: ResourceId::new(),
            state: Mutex::new(Tracked {
                status: Status::Dirty,
                message: String::new(),
                content,
            }),
        }
    }

    #[inline]
    pub fn id(&self) -> ResourceId {
        self.id
    }

    pub fn status(&self) -> Status {
        self.lock().status
    }

    pub fn status_message(&self) -> String {
        self.lock().message.clone()
    }

    pub fn invalidate(&self) {
        let mut state = self.lock();
        if state.status != Status::Unsupported {
            state.content.invalidate();
            state.status = Status::Dirty;
            state.message.clear();
        }
    }

    /// Reads the content.
    pub fn read<F, R>(&self, func: F) -> R
    where
        F: FnOnce(&C) -> R,
    {
        func(&self.lock().content)
    }

    /// Mutates the content. `func` reports whether it changed anything, in which case
    /// the status falls back to `Dirty`.
    pub fn modify<F, R>(&self, func: F) -> R
    where
        F: FnOnce(&mut C) -> (bool, R),
    {
        let mut state = self.lock();
        let (changed, result) = func(&mut state.content);
        if changed {
            state.touch();
        }

        result
    }

    /// Locks the state. A panic inside a driver must not render the resource unusable,
    /// so poisoning is ignored.
    pub(crate) fn lock(&self) -> MutexGuard<Tracked<C>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
