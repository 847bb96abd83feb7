use std::cell::Cell;
use std::cmp;
use std::sync::{Arc, Condvar, Mutex};
use std::time::Duration;

use crossbeam_deque::Steal;

use super::access::HardwareAccess;
use super::lifecycle::LifecycleStatus;
use super::manager::ManagerShared;
use super::opengl::OpenGLContext;
use crate::backends::capabilities::Capabilities;
use crate::backends::SurfaceFactory;
use crate::errors::*;
use crate::resource::driver::Drivers;
use crate::resource::registry::Registry;
use crate::sched::latch::LockLatch;
use crate::sched::unwind;

thread_local! {
    static CURRENT_MANAGER: Cell<Option<usize>> = Cell::new(None);
}

/// Identity of the manager whose context thread is the calling thread.
#[inline]
pub(crate) fn current_manager() -> Option<usize> {
    CURRENT_MANAGER.with(|v| v.get())
}

/// Puts the context thread to sleep while there is nothing to do. Producers take the
/// lock before notifying, so a wake-up could not slip in between the check of the queue
/// and the wait.
pub(crate) struct Watcher {
    m: Mutex<()>,
    v: Condvar,
}

impl Watcher {
    pub fn new() -> Self {
        Watcher {
            m: Mutex::new(()),
            v: Condvar::new(),
        }
    }

    pub fn notify(&self) {
        let _guard = self.m.lock().unwrap();
        self.v.notify_all();
    }

    fn wait_timeout<F>(&self, timeout: Duration, idle: F)
    where
        F: Fn() -> bool,
    {
        let guard = self.m.lock().unwrap();
        if idle() {
            let _ = self.v.wait_timeout(guard, timeout).unwrap();
        }
    }
}

const MIN_BACKOFF: Duration = Duration::from_millis(1);
const MAX_BACKOFF: Duration = Duration::from_millis(48);

pub(crate) struct Startup {
    pub factory: Box<dyn SurfaceFactory>,
    pub drivers: Arc<Drivers>,
    pub registry: Arc<Registry>,
    pub primed: Arc<LockLatch<Result<Capabilities>>>,
}

/// Aborts the tasks left in the queue when the context thread exits, including by
/// unwinding, so nobody waits for a task that never runs.
struct AbortGuard<'a>(&'a ManagerShared);

impl<'a> Drop for AbortGuard<'a> {
    fn drop(&mut self) {
        self.0.lifecycle.stop();
        while let Some(task) = self.0.pop() {
            self.0.complete(task.label());
            task.abort();
        }
    }
}

/// The body of the context thread.
pub(crate) fn main(shared: Arc<ManagerShared>, startup: Startup) {
    CURRENT_MANAGER.with(|v| v.set(Some(shared.id)));

    let Startup {
        mut factory,
        drivers,
        registry,
        primed,
    } = startup;

    let created = unwind::halt_unwinding(|| {
        factory
            .create_offscreen_context()
            .map(OpenGLContext::new)
    })
    .unwrap_or_else(|payload| Err(Error::Backend(unwind::payload_message(&*payload))));

    let context = match created {
        Ok(context) => context,
        Err(err) => {
            shared.lifecycle.stop();
            primed.set(Err(err));
            return;
        }
    };

    primed.set(Ok(context.capabilities().clone()));
    let _guard = AbortGuard(&shared);

    let mut access = HardwareAccess::new(context, drivers, registry);
    run(&shared, &mut access);

    access.teardown();
    factory.destroy();
    info!("Context thread exits.");
}

fn run(shared: &ManagerShared, access: &mut HardwareAccess) {
    let mut backoff = MIN_BACKOFF;

    loop {
        let stopped = shared.lifecycle.status() == LifecycleStatus::Stopped;

        match shared.injector.steal() {
            Steal::Success(task) => {
                backoff = MIN_BACKOFF;

                let label = task.label().to_owned();
                trace!("Runs task of group '{}'.", label);
                task.execute(access);
                access.deactivate_surface();
                shared.complete(&label);
            }
            Steal::Retry => {}
            Steal::Empty => {
                // Nothing could be pushed after `Stopped` has been observed.
                if stopped {
                    return;
                }

                shared.watcher.wait_timeout(backoff, || {
                    shared.injector.is_empty()
                        && shared.lifecycle.status() != LifecycleStatus::Stopped
                });

                backoff = cmp::min(backoff * 2, MAX_BACKOFF);
            }
        }
    }
}
