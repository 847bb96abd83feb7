use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{Builder, JoinHandle};

use crossbeam_deque::{Injector, Steal};

use super::lifecycle::{Lifecycle, LifecycleStatus};
use super::thread::{self, Startup, Watcher};
use crate::backends::capabilities::Capabilities;
use crate::backends::SurfaceFactory;
use crate::errors::*;
use crate::resource::driver::Drivers;
use crate::resource::registry::Registry;
use crate::sched::future::Future;
use crate::sched::latch::LockLatch;
use crate::sched::task::{Task, TaskRef};
use crate::settings::FrameworkParams;
use crate::utils::hash::FastHashMap;

static NEXT_MANAGER: AtomicUsize = AtomicUsize::new(1);

/// The state shared between a manager and its context thread.
pub(crate) struct ManagerShared {
    pub id: usize,
    pub lifecycle: Lifecycle,
    pub injector: Injector<TaskRef>,
    pub watcher: Watcher,
    pending: Mutex<FastHashMap<String, usize>>,
}

impl ManagerShared {
    pub fn new() -> Self {
        ManagerShared {
            id: NEXT_MANAGER.fetch_add(1, Ordering::Relaxed),
            lifecycle: Lifecycle::new(),
            injector: Injector::new(),
            watcher: Watcher::new(),
            pending: Mutex::new(FastHashMap::default()),
        }
    }

    /// Pops the next task, if there is any.
    pub fn pop(&self) -> Option<TaskRef> {
        loop {
            match self.injector.steal() {
                Steal::Success(task) => return Some(task),
                Steal::Empty => return None,
                Steal::Retry => {}
            }
        }
    }

    /// Bookkeeping after a task of group `label` has run.
    pub fn complete(&self, label: &str) {
        let mut pending = self.pending.lock().unwrap();
        let done = match pending.get_mut(label) {
            Some(v) => {
                *v -= 1;
                *v == 0
            }
            None => false,
        };

        if done {
            pending.remove(label);
        }
    }

    /// The number of tasks of group `label` that are submitted but not finished yet.
    pub fn pending(&self, label: &str) -> usize {
        self.pending.lock().unwrap().get(label).cloned().unwrap_or(0)
    }

    pub fn submit(&self, task: TaskRef) {
        *self
            .pending
            .lock()
            .unwrap()
            .entry(task.label().to_owned())
            .or_insert(0) += 1;

        self.injector.push(task);
    }
}

/// Owns the context thread, and the FIFO queue of tasks it executes.
///
/// The graphics context is only ever touched by the context thread. Any other thread
/// gets work done by submitting a `Task`, and receives its outcome through a `Future`.
/// Tasks are executed strictly in submission order, one at a time.
pub struct ContextManager {
    shared: Arc<ManagerShared>,
    capabilities: Capabilities,
    thread: Mutex<Option<JoinHandle<()>>>,
}

impl ContextManager {
    /// Spawns the context thread and waits until its context has been created.
    pub(crate) fn new(
        params: &FrameworkParams,
        factory: Box<dyn SurfaceFactory>,
        drivers: Arc<Drivers>,
        registry: Arc<Registry>,
    ) -> Result<Self> {
        let shared = Arc::new(ManagerShared::new());
        let primed = Arc::new(LockLatch::new());

        let startup = Startup {
            factory,
            drivers,
            registry,
            primed: primed.clone(),
        };

        let mut builder = Builder::new().name(params.thread_name.clone());
        if let Some(size) = params.stack_size {
            builder = builder.stack_size(size);
        }

        let handle = {
            let shared = shared.clone();
            builder
                .spawn(move || thread::main(shared, startup))
                .map_err(|err| Error::Backend(format!("Failed to spawn context thread: {}", err)))?
        };

        primed.wait();
        match primed.take() {
            Some(Ok(capabilities)) => {
                info!("Context thread '{}' started with {}.", params.thread_name, capabilities.version);

                Ok(ContextManager {
                    shared,
                    capabilities,
                    thread: Mutex::new(Some(handle)),
                })
            }
            Some(Err(err)) => {
                let _ = handle.join();
                Err(err)
            }
            None => Err(Error::Shutdown),
        }
    }

    /// The capabilities of the graphics context.
    #[inline]
    pub fn capabilities(&self) -> &Capabilities {
        &self.capabilities
    }

    #[inline]
    pub fn status(&self) -> LifecycleStatus {
        self.shared.lifecycle.status()
    }

    /// Checks if the calling thread is the context thread of this manager.
    #[inline]
    pub fn is_context_thread(&self) -> bool {
        thread::current_manager() == Some(self.shared.id)
    }

    /// The number of tasks of group `label` that are submitted but not finished yet.
    #[inline]
    pub fn pending(&self, label: &str) -> usize {
        self.shared.pending(label)
    }

    /// Submits `task` to the context thread.
    ///
    /// Once shutdown has begun, only tasks with `run_during_shutdown` are accepted. The
    /// others are rejected with `Error::Shutdown`. Submissions from the context thread
    /// itself are queued behind the running task like any other.
    pub fn try_invoke<T, K>(&self, label: &str, task: K, run_during_shutdown: bool) -> Result<Future<T>>
    where
        T: Send + 'static,
        K: Task<T>,
    {
        let (future, promise) = Future::pending(self.shared.id);

        {
            let status = self.shared.lifecycle.read();
            if !status.accepts(run_during_shutdown) {
                debug!("Rejects task of group '{}' while {:?}.", label, *status);
                return Err(Error::Shutdown);
            }

            self.shared.submit(TaskRef::new(label, task, promise));
        }

        self.shared.watcher.notify();
        Ok(future)
    }

    /// Submits `task` to the context thread. A rejected task yields a failed future.
    pub fn invoke_on_context_thread<T, K>(&self, label: &str, task: K, run_during_shutdown: bool) -> Future<T>
    where
        T: Send + 'static,
        K: Task<T>,
    {
        match self.try_invoke(label, task, run_during_shutdown) {
            Ok(future) => future,
            Err(err) => Future::failed(err),
        }
    }

    /// Stops accepting ordinary tasks. Returns false if shutdown has begun before.
    pub(crate) fn begin_shutdown(&self) -> bool {
        let began = self.shared.lifecycle.begin_stop();
        self.shared.watcher.notify();
        began
    }

    /// Stops accepting any task, and waits until the context thread has drained its
    /// queue and released the context.
    pub(crate) fn finish_shutdown(&self) -> Result<()> {
        if self.is_context_thread() {
            return Err(Error::WouldDeadlock);
        }

        self.shared.lifecycle.stop();
        self.shared.watcher.notify();

        let mut thread = self.thread.lock().unwrap();
        if let Some(handle) = thread.take() {
            handle
                .join()
                .map_err(|_| Error::Backend("Context thread panicked.".into()))?;
            info!("Context thread has been stopped.");
        }

        Ok(())
    }
}

impl Drop for ContextManager {
    fn drop(&mut self) {
        self.shared.lifecycle.stop();
        self.shared.watcher.notify();

        if !self.is_context_thread() {
            if let Err(err) = self.finish_shutdown() {
                warn!("{}", err);
            }
        }
    }
}
