use std::sync::{RwLock, RwLockReadGuard};

/// The lifecycle of a context manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum LifecycleStatus {
    /// Every task is accepted.
    Active,
    /// Shutdown has begun, only tasks that must run during shutdown are accepted.
    Stopping,
    /// No task is accepted anymore. The context thread drains its queue and exits.
    Stopped,
}

impl LifecycleStatus {
    /// Checks if a task could be submitted in this status.
    #[inline]
    pub fn accepts(self, run_during_shutdown: bool) -> bool {
        match self {
            LifecycleStatus::Active => true,
            LifecycleStatus::Stopping => run_during_shutdown,
            LifecycleStatus::Stopped => false,
        }
    }
}

/// Submissions hold the read lock while they enqueue, so once a transition took the
/// write lock no submission of the previous status could sneak in afterwards.
pub(crate) struct Lifecycle {
    status: RwLock<LifecycleStatus>,
}

impl Lifecycle {
    pub fn new() -> Self {
        Lifecycle {
            status: RwLock::new(LifecycleStatus::Active),
        }
    }

    #[inline]
    pub fn status(&self) -> LifecycleStatus {
        *self.status.read().unwrap()
    }

    #[inline]
    pub fn read(&self) -> RwLockReadGuard<LifecycleStatus> {
        self.status.read().unwrap()
    }

    /// Moves from `Active` to `Stopping`. Returns false if shutdown has begun before.
    pub fn begin_stop(&self) -> bool {
        let mut status = self.status.write().unwrap();
        if *status == LifecycleStatus::Active {
            *status = LifecycleStatus::Stopping;
            true
        } else {
            false
        }
    }

    /// Moves to `Stopped`. Returns false if it was stopped already.
    pub fn stop(&self) -> bool {
        let mut status = self.status.write().unwrap();
        if *status != LifecycleStatus::Stopped {
            *status = LifecycleStatus::Stopped;
            true
        } else {
            false
        }
    }
}
