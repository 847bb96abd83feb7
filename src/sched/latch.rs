use std::sync::{Condvar, Mutex};
use std::time::{Duration, Instant};

/// A latch starts as empty and is set exactly once with a value. You can block until
/// it becomes set, and take the value out afterwards.
pub struct LockLatch<T> {
    m: Mutex<Slot<T>>,
    v: Condvar,
}

enum Slot<T> {
    NotReady,
    Ready(T),
    Taken,
}

impl<T> Default for LockLatch<T> {
    fn default() -> Self {
        LockLatch::new()
    }
}

impl<T> LockLatch<T> {
    #[inline]
    pub fn new() -> LockLatch<T> {
        LockLatch {
            m: Mutex::new(Slot::NotReady),
            v: Condvar::new(),
        }
    }

    /// Sets the latch, waking up every waiter. Returns false if it has been set before,
    /// in which case `value` is dropped.
    pub fn set(&self, value: T) -> bool {
        let mut guard = self.m.lock().unwrap();
        match *guard {
            Slot::NotReady => {
                *guard = Slot::Ready(value);
                self.v.notify_all();
                true
            }
            _ => false,
        }
    }

    /// Tests if the latch has been set.
    #[inline]
    pub fn is_set(&self) -> bool {
        let guard = self.m.lock().unwrap();
        match *guard {
            Slot::NotReady => false,
            _ => true,
        }
    }

    /// Takes the value out. Returns `None` if the latch is not set yet, or the value has
    /// been taken already.
    pub fn take(&self) -> Option<T> {
        let mut guard = self.m.lock().unwrap();
        match ::std::mem::replace(&mut *guard, Slot::Taken) {
            Slot::Ready(v) => Some(v),
            Slot::NotReady => {
                *guard = Slot::NotReady;
                None
            }
            Slot::Taken => None,
        }
    }

    /// Blocks until the latch is set.
    pub fn wait(&self) {
        let mut guard = self.m.lock().unwrap();
        while let Slot::NotReady = *guard {
            guard = self.v.wait(guard).unwrap();
        }
    }

    /// Blocks until the latch is set or `timeout` elapsed. Returns true if the latch
    /// has been set.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut guard = self.m.lock().unwrap();

        loop {
            if let Slot::NotReady = *guard {
                let now = Instant::now();
                if now >= deadline {
                    return false;
                }

                guard = self.v.wait_timeout(guard, deadline - now).unwrap().0;
            } else {
                return true;
            }
        }
    }
}
