//! The context thread and everything that lives on it.
//!
//! Graphics contexts are bound to a single thread. The `ContextManager` owns that
//! thread, and funnels every interaction with the context through a FIFO queue of
//! tasks. Only while a task runs, it has exclusive access to the context through
//! `HardwareAccess`.

pub mod access;
pub mod lifecycle;
pub mod manager;
pub mod opengl;
pub mod state;
pub(crate) mod thread;

pub use self::access::HardwareAccess;
pub use self::lifecycle::LifecycleStatus;
pub use self::manager::ContextManager;
pub use self::opengl::OpenGLContext;
pub use self::state::{Binding, ContextState};
