use std::fmt;
use std::sync::Arc;

use super::future::Promise;
use super::unwind;
use crate::context::HardwareAccess;
use crate::errors::*;

/// A unit of work that runs on the context thread, with exclusive access to the
/// graphics context for its whole duration.
pub trait Task<T>: Send + 'static {
    fn run(self: Box<Self>, access: &mut HardwareAccess) -> Result<T>;
}

impl<T, F> Task<T> for F
where
    F: FnOnce(&mut HardwareAccess) -> Result<T> + Send + 'static,
{
    fn run(self: Box<Self>, access: &mut HardwareAccess) -> Result<T> {
        (*self)(access)
    }
}

pub(crate) enum TaskMode<'a> {
    Execute(&'a mut HardwareAccess),
    Abort,
}

type Job = Box<dyn for<'a> FnOnce(TaskMode<'a>) + Send>;

/// A type-erased task paired with the promise of its future.
pub(crate) struct TaskRef {
    label: String,
    job: Option<Job>,
}

impl TaskRef {
    pub fn new<T, K>(label: &str, task: K, promise: Arc<Promise<T>>) -> Self
    where
        T: Send + 'static,
        K: Task<T>,
    {
        let task = Box::new(task);
        let job: Job = Box::new(move |mode: TaskMode<'_>| {
            let result = match mode {
                TaskMode::Execute(access) => {
                    match unwind::halt_unwinding(move || task.run(access)) {
                        Ok(result) => result,
                        Err(payload) => {
                            let message = unwind::payload_message(&*payload);
                            warn!("Task panicked on the context thread: {}", message);
                            Err(Error::TaskPanicked(message))
                        }
                    }
                }
                TaskMode::Abort => Err(Error::Shutdown),
            };

            promise.set(result);
        });

        TaskRef {
            label: label.to_owned(),
            job: Some(job),
        }
    }

    #[inline]
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Runs the task and resolves its future with the outcome.
    pub fn execute(mut self, access: &mut HardwareAccess) {
        if let Some(job) = self.job.take() {
            job(TaskMode::Execute(access));
        }
    }

    /// Resolves the future with `Error::Shutdown` without running the task.
    pub fn abort(mut self) {
        if let Some(job) = self.job.take() {
            job(TaskMode::Abort);
        }
    }
}

impl Drop for TaskRef {
    fn drop(&mut self) {
        if let Some(job) = self.job.take() {
            job(TaskMode::Abort);
        }
    }
}

impl fmt::Debug for TaskRef {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "TaskRef({})", self.label)
    }
}
