//! # What is Ferox
//!
//! Ferox manages the lifecycle of GPU resources (textures, buffers, shader programs and
//! render surfaces) for renderers built on thread-affine graphics APIs like OpenGL.
//!
//! A graphics context could only be used from the thread it is current on. Ferox owns
//! that thread: every interaction with the context is submitted as a task into a single
//! FIFO queue, and its outcome is delivered through a `Future`. Applications describe
//! resources on any thread, and ask the framework to bring their GPU twins up to date.
//! Only what changed since the last update is pushed to the GPU.
//!
//! ```rust,ignore
//! use ferox::prelude::*;
//!
//! let framework = Framework::headless(FrameworkParams::default())?;
//! let shader = Shader::new(VS, FS);
//! shader.set_uniform("u_Color", UniformValue::F32(0.5));
//!
//! match framework.update(&shader).wait()? {
//!     Status::Ready => {}
//!     status => println!("{:?}: {}", status, framework.status_message(&shader)),
//! }
//! ```
//!
//! The framework is shut down when the `Framework` is dropped. GPU twins of resources
//! that are still alive at that point are destroyed on the context thread before it
//! exits.

#[macro_use]
extern crate failure;
#[macro_use]
extern crate log;
#[macro_use]
extern crate serde;

pub mod backends;
pub mod context;
pub mod errors;
pub mod framework;
pub mod resource;
pub mod sched;
pub mod settings;
pub mod utils;

pub mod prelude {
    pub use crate::backends::capabilities::Capabilities;
    pub use crate::backends::headless::{Call, HeadlessFactory, Recorder};
    pub use crate::backends::{SurfaceFactory, Visitor};
    pub use crate::context::{HardwareAccess, LifecycleStatus, OpenGLContext};
    pub use crate::errors::Error;
    pub use crate::framework::{Framework, FrameworkShared};
    pub use crate::resource::handle::RESOURCE_GROUP;
    pub use crate::resource::prelude::*;
    pub use crate::sched::prelude::*;
    pub use crate::settings::FrameworkParams;
}
