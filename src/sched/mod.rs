//! Primitives to hand work over to the context thread and wait for its results.
//!
//! Every interaction with the graphics context is wrapped into a `Task`, pushed into the
//! FIFO queue of the `ContextManager` and answered through a `Future`. Tasks are isolated
//! from each other: a panic inside one is captured and reported through its own future,
//! and the context thread moves on to the next task.

pub mod future;
pub mod latch;
pub mod task;
pub mod unwind;

pub mod prelude {
    pub use super::future::Future;
    pub use super::task::Task;
}
