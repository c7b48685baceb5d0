use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex, PoisonError};
use thiserror::Error;

/// Rendezvous point shared by the cooperating processes of one training run.
pub trait Barrier: Send + Sync {
    fn wait(&self) -> anyhow::Result<()>;

    /// Releases everyone blocked in [`Barrier::wait`] with an error, used when the
    /// process everyone is waiting on has failed.
    fn abort(&self) {}
}

/// Used when there is only one process and nobody to wait for.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoBarrier;

impl Barrier for NoBarrier {
    fn wait(&self) -> anyhow::Result<()> {
        Ok(())
    }
}

#[derive(Debug, Error)]
#[error("Cancelled barrier")]
pub struct CancelledBarrier;

/// In-process barrier for `total` participants that can be cancelled.
pub struct CancellableBarrier {
    mutex: Mutex<()>,
    cvar: Condvar,
    arrived: AtomicUsize,
    total: usize,
    generation: AtomicUsize,
    cancelled: AtomicBool,
}

impl CancellableBarrier {
    pub fn new(total: usize) -> Arc<Self> {
        Arc::new(Self {
            mutex: Mutex::new(()),
            cvar: Condvar::new(),
            arrived: AtomicUsize::new(0),
            total,
            generation: AtomicUsize::new(0),
            cancelled: AtomicBool::new(false),
        })
    }

    /// Blocks until `total` participants have arrived, or the barrier is cancelled.
    pub fn wait(&self) -> Result<(), CancelledBarrier> {
        let mut guard = self.mutex.lock().unwrap_or_else(PoisonError::into_inner);
        if self.cancelled.load(Ordering::Acquire) {
            return Err(CancelledBarrier);
        }
        let generation = self.generation.load(Ordering::Acquire);

        let arrived = self.arrived.fetch_add(1, Ordering::AcqRel) + 1;
        if arrived >= self.total {
            self.arrived.store(0, Ordering::Release);
            self.generation.fetch_add(1, Ordering::Release);
            self.cvar.notify_all();
            return Ok(());
        }

        loop {
            guard = self
                .cvar
                .wait(guard)
                .unwrap_or_else(PoisonError::into_inner);
            if self.cancelled.load(Ordering::Acquire) {
                return Err(CancelledBarrier);
            }
            if generation != self.generation.load(Ordering::Acquire) {
                return Ok(());
            }
        }
    }

    pub fn cancel(&self) {
        let _guard = self.mutex.lock().unwrap_or_else(PoisonError::into_inner);
        self.cancelled.store(true, Ordering::Release);
        self.cvar.notify_all();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    pub fn reset(&self) {
        let _guard = self.mutex.lock().unwrap_or_else(PoisonError::into_inner);
        self.cancelled.store(false, Ordering::Release);
        self.arrived.store(0, Ordering::Release);
        self.generation.fetch_add(1, Ordering::Release);
    }
}

impl Barrier for CancellableBarrier {
    fn wait(&self) -> anyhow::Result<()> {
        Ok(CancellableBarrier::wait(self)?)
    }

    fn abort(&self) {
        self.cancel()
    }
}
