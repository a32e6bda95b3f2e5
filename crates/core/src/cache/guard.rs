use crate::error::{ClassCacheError, Result};
use std::sync::RwLock;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Single reader/writer section around the cache state.
///
/// Every access to the state goes through [`with_read_lock`](Self::with_read_lock)
/// or [`with_write_lock`](Self::with_write_lock). The guard counts how often
/// each was entered so callers can assert that no lock was taken at all.
#[derive(Debug, Default)]
pub struct ConcurrencyGuard<T> {
    lock: RwLock<T>,
    reads: AtomicUsize,
    writes: AtomicUsize,
}

impl<T> ConcurrencyGuard<T> {
    pub fn new(state: T) -> Self {
        Self {
            lock: RwLock::new(state),
            reads: AtomicUsize::new(0),
            writes: AtomicUsize::new(0),
        }
    }

    /// Runs `op` with shared access. The lock is released before the result
    /// (or error) is handed back.
    pub fn with_read_lock<R>(&self, op: impl FnOnce(&T) -> Result<R>) -> Result<R> {
        self.reads.fetch_add(1, Ordering::Relaxed);
        let state = self
            .lock
            .read()
            .map_err(|_| ClassCacheError::LockPoisoned("read"))?;
        op(&state)
    }

    /// Runs `op` with exclusive access.
    pub fn with_write_lock<R>(&self, op: impl FnOnce(&mut T) -> Result<R>) -> Result<R> {
        self.writes.fetch_add(1, Ordering::Relaxed);
        let mut state = self
            .lock
            .write()
            .map_err(|_| ClassCacheError::LockPoisoned("write"))?;
        op(&mut state)
    }

    pub fn read_acquisitions(&self) -> usize {
        self.reads.load(Ordering::Relaxed)
    }

    pub fn write_acquisitions(&self) -> usize {
        self.writes.load(Ordering::Relaxed)
    }
}
