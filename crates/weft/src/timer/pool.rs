// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 weftworks

//! Timer pool: a free-list of recyclable delay handles.
//!
//! Acquire pops an idle handle (or spawns a new worker when the list is
//! empty) and arms it; release disarms, drains the borrow's pending
//! completion, and pushes the handle back. The free list is the only shared
//! mutable state and is held for a push/pop only; the countdown itself runs
//! on the handle's worker thread outside any lock.
//!
//! Misuse is largely unrepresentable: a handle moves into `release` (or its
//! `Drop`), so double-release and use-after-release do not compile. The
//! generation check inside the reclaim path remains as a loud guard against
//! pool-internal state corruption.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, OnceLock};
use std::thread::JoinHandle;
use std::time::Duration;

use super::handle::{Command, CompletionSignal, HandleCore, HandleShared, TimerState, TimerStatus};
use crossbeam::channel::Sender;

pub(crate) struct PoolInner {
    free: Mutex<Vec<HandleCore>>,
    /// Command sender + completion slot of every handle ever spawned, for
    /// shutdown. Handles currently borrowed are reachable only through here.
    registry: Mutex<Vec<(Sender<Command>, Arc<HandleShared>)>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    next_id: AtomicU32,
    closed: AtomicBool,
}

impl PoolInner {
    fn allocate(&self) -> HandleCore {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (core, worker) = HandleCore::spawn(id);
        self.registry
            .lock()
            .push((core.command_sender(), Arc::clone(core.shared())));
        self.workers.lock().push(worker);
        log::debug!("[timer-pool] allocated handle {id}");
        core
    }

    fn reclaim(&self, core: HandleCore) {
        core.disarm();
        log::trace!("[timer-pool] released handle {}", core.id());
        if self.closed.load(Ordering::Acquire) {
            return; // workers are gone; the core is dropped here
        }
        self.free.lock().push(core);
    }

    fn shutdown(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        for (commands, shared) in self.registry.lock().iter() {
            let _ = commands.send(Command::Shutdown);
            shared.cancel_any();
        }
        for worker in self.workers.lock().drain(..) {
            let _ = worker.join();
        }
        self.free.lock().clear();
        log::debug!("[timer-pool] closed");
    }
}

impl Drop for PoolInner {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Free-list pool of recyclable timer handles.
///
/// Cheap to clone; clones share one pool. Grows by spawning a worker when
/// the free list is empty and never shrinks.
#[derive(Clone)]
pub struct TimerPool {
    inner: Arc<PoolInner>,
}

impl TimerPool {
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Arc::new(PoolInner {
                free: Mutex::new(Vec::new()),
                registry: Mutex::new(Vec::new()),
                workers: Mutex::new(Vec::new()),
                next_id: AtomicU32::new(0),
                closed: AtomicBool::new(false),
            }),
        }
    }

    /// Borrow a handle armed to fire after `duration`. Never blocks.
    ///
    /// # Panics
    ///
    /// Panics if the pool has been closed.
    #[must_use]
    pub fn acquire(&self, duration: Duration) -> TimerHandle {
        assert!(
            !self.inner.closed.load(Ordering::Acquire),
            "acquire on closed timer pool"
        );
        let popped = { self.inner.free.lock().pop() };
        let mut core = popped.unwrap_or_else(|| self.inner.allocate());
        core.arm(duration);
        log::trace!(
            "[timer-pool] acquired handle {} (generation {})",
            core.id(),
            core.generation()
        );
        TimerHandle {
            core: Some(core),
            pool: Arc::clone(&self.inner),
        }
    }

    /// Disarm `handle`, drain its pending completion, and return it to the
    /// free list. Equivalent to dropping the handle.
    pub fn release(&self, handle: TimerHandle) {
        debug_assert!(
            Arc::ptr_eq(&self.inner, &handle.pool),
            "handle released to a foreign pool"
        );
        drop(handle);
    }

    /// Cancel all outstanding borrows, stop and join every worker.
    ///
    /// Intended for clean shutdown in tests; must not race in-flight
    /// `acquire` calls. Idempotent; also runs when the last pool reference
    /// (including borrowed handles) is dropped.
    pub fn close(&self) {
        self.inner.shutdown();
    }

    /// Total handles ever spawned (peak concurrent borrows).
    #[must_use]
    pub fn allocated(&self) -> usize {
        self.inner.next_id.load(Ordering::Relaxed) as usize
    }

    /// Handles currently idle on the free list.
    #[must_use]
    pub fn idle(&self) -> usize {
        self.inner.free.lock().len()
    }
}

impl Default for TimerPool {
    fn default() -> Self {
        Self::new()
    }
}

/// One borrowed timer handle. Moving it into `release` (or dropping it)
/// returns it to the pool; every exit path releases.
pub struct TimerHandle {
    core: Option<HandleCore>,
    pool: Arc<PoolInner>,
}

impl TimerHandle {
    /// Stable identity of the underlying pooled handle.
    #[must_use]
    pub fn id(&self) -> u32 {
        self.core().id()
    }

    /// Current state of this borrow.
    #[must_use]
    pub fn state(&self) -> TimerState {
        let core = self.core();
        core.shared().state(core.generation())
    }

    /// Waiter token for this borrow, cloneable into a background task.
    #[must_use]
    pub fn completion(&self) -> CompletionSignal {
        let core = self.core();
        CompletionSignal::new(Arc::clone(core.shared()), core.generation())
    }

    /// Block until this borrow fires or is cancelled.
    #[must_use]
    pub fn wait(&self) -> TimerStatus {
        let core = self.core();
        core.shared().wait(core.generation())
    }

    /// Bounded wait; `None` means the handle was still armed at the timeout.
    #[must_use]
    pub fn wait_timeout(&self, timeout: Duration) -> Option<TimerStatus> {
        let core = self.core();
        core.shared().wait_timeout(core.generation(), timeout)
    }

    /// Release early. Equivalent to dropping the handle.
    pub fn cancel(self) {
        drop(self);
    }

    fn core(&self) -> &HandleCore {
        // The core is only taken in drop, so it is always present here.
        self.core.as_ref().expect("timer handle core present")
    }
}

impl Drop for TimerHandle {
    fn drop(&mut self) {
        if let Some(core) = self.core.take() {
            self.pool.reclaim(core);
        }
    }
}

/// Process-wide default pool for consumers that do not inject their own.
#[must_use]
pub fn default_pool() -> &'static TimerPool {
    static DEFAULT: OnceLock<TimerPool> = OnceLock::new();
    DEFAULT.get_or_init(TimerPool::new)
}
