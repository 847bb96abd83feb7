use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use super::latch::LockLatch;
use crate::context::thread;
use crate::errors::*;

/// The eventual result of a task submitted to the context thread.
///
/// A future is either completed already (`Future::completed`, `Future::failed`), or
/// pending until the context thread runs the task it belongs to. There is no way to
/// cancel a pending future; dropping it simply discards the result.
pub struct Future<T> {
    inner: Inner<T>,
}

enum Inner<T> {
    Ready(Result<T>),
    Pending(Arc<Promise<T>>),
}

/// The writing side of a `Future`.
pub(crate) struct Promise<T> {
    latch: LockLatch<Result<T>>,
    owner: usize,
}

impl<T> Promise<T> {
    /// Resolves the future. The first resolution wins.
    pub fn set(&self, result: Result<T>) {
        self.latch.set(result);
    }
}

impl<T> Future<T> {
    /// Creates a future that is complete with `value` already.
    pub fn completed(value: T) -> Self {
        Future {
            inner: Inner::Ready(Ok(value)),
        }
    }

    /// Creates a future that has failed with `err` already.
    pub fn failed(err: Error) -> Self {
        Future {
            inner: Inner::Ready(Err(err)),
        }
    }

    /// Creates a pending future which is resolved by the context thread of the manager
    /// identified by `owner`.
    pub(crate) fn pending(owner: usize) -> (Self, Arc<Promise<T>>) {
        let promise = Arc::new(Promise {
            latch: LockLatch::new(),
            owner,
        });

        let future = Future {
            inner: Inner::Pending(promise.clone()),
        };

        (future, promise)
    }

    /// Checks if the result is available, without blocking.
    pub fn is_done(&self) -> bool {
        match self.inner {
            Inner::Ready(_) => true,
            Inner::Pending(ref promise) => promise.latch.is_set(),
        }
    }

    /// Polls the underlying task, moving its result into this future if it is available.
    /// Returns true when the result can be inspected with `result`.
    pub fn poll(&mut self) -> bool {
        let result = match self.inner {
            Inner::Ready(_) => return true,
            Inner::Pending(ref promise) => match promise.latch.take() {
                Some(result) => result,
                None => return false,
            },
        };

        self.inner = Inner::Ready(result);
        true
    }

    /// Returns the result if `poll` has observed it.
    pub fn result(&self) -> Option<&Result<T>> {
        match self.inner {
            Inner::Ready(ref result) => Some(result),
            Inner::Pending(_) => None,
        }
    }

    /// Blocks until the result is available or `timeout` elapsed. Returns true if the
    /// result is available. On the context thread this never blocks, since the task
    /// could not run before the current one finishes.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        match self.inner {
            Inner::Ready(_) => true,
            Inner::Pending(ref promise) => {
                if thread::current_manager() == Some(promise.owner) {
                    promise.latch.is_set()
                } else {
                    promise.latch.wait_timeout(timeout)
                }
            }
        }
    }

    /// Blocks until the result is available and returns it.
    ///
    /// Waiting on the context thread for a task that has not run yet fails with
    /// `Error::WouldDeadlock` instead of blocking forever.
    pub fn wait(self) -> Result<T> {
        match self.inner {
            Inner::Ready(result) => result,
            Inner::Pending(promise) => {
                if !promise.latch.is_set() && thread::current_manager() == Some(promise.owner) {
                    return Err(Error::WouldDeadlock);
                }

                promise.latch.wait();
                promise.latch.take().unwrap_or(Err(Error::Shutdown))
            }
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for Future<T> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.inner {
            Inner::Ready(ref result) => write!(f, "Future::Ready({:?})", result),
            Inner::Pending(_) => write!(f, "Future::Pending"),
        }
    }
}
