//! The entry point of the crate.
//!
//! ```rust,ignore
//! let framework = Framework::headless(FrameworkParams::default())?;
//!
//! let texture = Texture::new(TextureParams::default(), None)?;
//! assert_eq!(framework.update(&texture).wait()?, Status::Ready);
//!
//! framework.destroy(&texture).wait()?;
//! framework.shutdown()?;
//! ```

use std::ops::Deref;
use std::sync::{Arc, Mutex, Weak};
use std::thread::{Builder, JoinHandle};
use std::time::Duration;

use crate::backends::capabilities::Capabilities;
use crate::backends::headless::HeadlessFactory;
use crate::backends::SurfaceFactory;
use crate::context::{ContextManager, HardwareAccess, LifecycleStatus};
use crate::errors::*;
use crate::resource::driver::Drivers;
use crate::resource::handle::RESOURCE_GROUP;
use crate::resource::registry::Registry;
use crate::resource::surface::Surface;
use crate::resource::{Resource, Status};
use crate::sched::future::Future;
use crate::sched::latch::LockLatch;
use crate::sched::task::Task;
use crate::settings::FrameworkParams;

/// Owner of the framework. Shuts the framework down when dropped.
pub struct Framework {
    shared: Arc<FrameworkShared>,
}

impl Framework {
    /// Starts the context thread, and creates its offscreen context with `factory`.
    pub fn new<F>(params: FrameworkParams, factory: F, drivers: Drivers) -> Result<Self>
    where
        F: SurfaceFactory + 'static,
    {
        let registry = Arc::new(Registry::new());
        let drivers = Arc::new(drivers);
        let contexts = ContextManager::new(&params, Box::new(factory), drivers.clone(), registry.clone())?;

        let shared = Arc::new(FrameworkShared {
            contexts,
            registry,
            drivers,
            sweeper: Mutex::new(None),
        });

        if let Some(interval) = params.gc_interval() {
            let sweeper = Sweeper::spawn(Arc::downgrade(&shared), interval)?;
            *shared.sweeper.lock().unwrap() = Some(sweeper);
        }

        info!("Framework is up.");
        Ok(Framework { shared })
    }

    /// Creates a framework on top of the headless backend with all the built-in drivers.
    pub fn headless(params: FrameworkParams) -> Result<Self> {
        Framework::new(params, HeadlessFactory::default(), Drivers::default())
    }

    /// Returns the multi-thread friendly parts of the framework.
    #[inline]
    pub fn shared(&self) -> Arc<FrameworkShared> {
        self.shared.clone()
    }
}

impl Deref for Framework {
    type Target = FrameworkShared;

    fn deref(&self) -> &Self::Target {
        &self.shared
    }
}

impl Drop for Framework {
    fn drop(&mut self) {
        if let Err(err) = self.shared.shutdown() {
            warn!("Failed to shut down framework: {}", err);
        }
    }
}

pub struct FrameworkShared {
    contexts: ContextManager,
    registry: Arc<Registry>,
    drivers: Arc<Drivers>,
    sweeper: Mutex<Option<Sweeper>>,
}

impl FrameworkShared {
    #[inline]
    pub fn capabilities(&self) -> &Capabilities {
        self.contexts.capabilities()
    }

    /// Synchronizes the GPU twin of `resource` with its current content.
    ///
    /// Resources of a kind without driver resolve to `Status::Unsupported`. Destroyed
    /// resources fail with `Error::Destroyed`.
    pub fn update<R: Resource + Clone>(&self, resource: &R) -> Future<Status> {
        self.update_in(RESOURCE_GROUP, resource)
    }

    /// Same as `update`, but submitted to the task group `label`.
    pub fn update_in<R: Resource + Clone>(&self, label: &str, resource: &R) -> Future<Status> {
        if self.is_destroyed(resource) {
            return Future::failed(Error::Destroyed(resource.id()));
        }

        let resource = resource.clone();
        self.contexts.invoke_on_context_thread(
            label,
            move |access: &mut HardwareAccess| access.update(&resource),
            false,
        )
    }

    /// Destroys the GPU twin of `resource`. Only the first call does any work; the
    /// futures of all calls complete successfully once the twin is gone. Destruction is
    /// accepted while the framework is shutting down.
    pub fn destroy<R: Resource + Clone>(&self, resource: &R) -> Future<()> {
        if !self.drivers.contains(resource.kind()) {
            return Future::failed(Error::NoDriver(resource.kind()));
        }

        let handle = self.registry.handle(resource);
        let resource: Arc<dyn Resource> = Arc::new(resource.clone());
        handle.destroy(&self.contexts, Some(resource))
    }

    /// Checks if `destroy` has been called on `resource`.
    pub fn is_destroyed<R: Resource>(&self, resource: &R) -> bool {
        self.registry
            .get(resource.id())
            .map(|v| v.is_destroyed())
            .unwrap_or(false)
    }

    /// The status of `resource`. Destroyed resources are `Dirty`, since they have no GPU
    /// twin anymore.
    pub fn status<R: Resource>(&self, resource: &R) -> Status {
        if !self.drivers.contains(resource.kind()) {
            return Status::Unsupported;
        }

        if self.is_destroyed(resource) {
            return Status::Dirty;
        }

        resource.status()
    }

    pub fn status_message<R: Resource>(&self, resource: &R) -> String {
        if !self.drivers.contains(resource.kind()) {
            return format!("{}", Error::NoDriver(resource.kind()));
        }

        if self.is_destroyed(resource) {
            return String::new();
        }

        resource.status_message()
    }

    /// Submits `task` to the context thread under the group `label`.
    pub fn queue<T, K>(&self, label: &str, task: K) -> Future<T>
    where
        T: Send + 'static,
        K: Task<T>,
    {
        self.contexts.invoke_on_context_thread(label, task, false)
    }

    /// Presents what has been rendered into `surface`.
    pub fn flush(&self, surface: &Surface, label: &str) -> Future<()> {
        let surface = surface.clone();
        self.queue(label, move |access: &mut HardwareAccess| {
            access.set_active_surface(&surface)?.flush()
        })
    }

    /// Blocks until every task submitted to group `label` before this call has run.
    pub fn sync(&self, label: &str) -> Result<()> {
        self.queue(label, |_: &mut HardwareAccess| Ok(())).wait()
    }

    /// The number of tasks of group `label` that have not finished yet.
    #[inline]
    pub fn pending(&self, label: &str) -> usize {
        self.contexts.pending(label)
    }

    /// Destroys the GPU twins of resources the application has dropped. Returns the
    /// number of twins scheduled for destruction.
    pub fn collect(&self) -> usize {
        let orphans = self.registry.collect();
        for handle in &orphans {
            debug!("Collects unreachable {:?} {}.", handle.kind(), handle.id());
            handle.destroy(&self.contexts, None);
        }

        orphans.len()
    }

    /// The number of resources the framework keeps track of.
    #[inline]
    pub fn tracked(&self) -> usize {
        self.registry.len()
    }

    #[inline]
    pub fn lifecycle(&self) -> LifecycleStatus {
        self.contexts.status()
    }

    #[inline]
    pub fn is_shutdown(&self) -> bool {
        self.lifecycle() != LifecycleStatus::Active
    }

    #[inline]
    pub fn is_context_thread(&self) -> bool {
        self.contexts.is_context_thread()
    }

    /// Shuts the framework down: ordinary tasks are rejected from now on, the GPU twins
    /// of all known resources are destroyed, and the context thread exits after draining
    /// its queue. Calling it again waits for the first call to finish.
    pub fn shutdown(&self) -> Result<()> {
        if self.is_context_thread() {
            return Err(Error::WouldDeadlock);
        }

        if self.contexts.begin_shutdown() {
            info!("Framework is shutting down.");
            self.stop_sweeper();

            let futures: Vec<_> = self
                .registry
                .handles()
                .into_iter()
                .map(|handle| handle.destroy(&self.contexts, None))
                .collect();

            for future in futures {
                if let Err(err) = future.wait() {
                    warn!("Failed to destroy resource during shutdown: {}", err);
                }
            }
        }

        self.contexts.finish_shutdown()
    }

    fn stop_sweeper(&self) {
        let sweeper = self.sweeper.lock().unwrap().take();
        if let Some(sweeper) = sweeper {
            sweeper.stop();
        }
    }
}

/// Collects unreachable resources periodically.
struct Sweeper {
    stop: Arc<LockLatch<()>>,
    handle: JoinHandle<()>,
}

impl Sweeper {
    fn spawn(framework: Weak<FrameworkShared>, interval: Duration) -> Result<Self> {
        let stop = Arc::new(LockLatch::new());
        let latch = stop.clone();

        let handle = Builder::new()
            .name("ferox-sweeper".into())
            .spawn(move || {
                while !latch.wait_timeout(interval) {
                    match framework.upgrade() {
                        Some(framework) => {
                            framework.collect();
                        }
                        None => return,
                    }
                }
            })
            .map_err(|err| Error::Backend(format!("Failed to spawn sweeper thread: {}", err)))?;

        Ok(Sweeper { stop, handle })
    }

    fn stop(self) {
        self.stop.set(());
        if self.handle.join().is_err() {
            warn!("Sweeper thread panicked.");
        }
    }
}
