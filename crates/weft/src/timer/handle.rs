// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 weftworks

//! Pooled timer handle internals.
//!
//! Each handle owns one long-lived worker thread that sleeps in
//! `recv_timeout` while armed and parks in a blocking `recv` while idle, so
//! recycling a handle never tears a thread down. Completion is a
//! generation-stamped slot guarded by a mutex/condvar rather than a queue: a
//! queued signal could be stolen by a stale waiter from an earlier borrow,
//! while the slot plus the generation check makes "a released borrow's signal
//! is never observed" hold by construction.

use crossbeam::channel::{self, Receiver, RecvTimeoutError, Sender};
use parking_lot::{Condvar, Mutex};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Observable handle state.
///
/// `Idle` is both the initial and the recycled state; `Armed` and `Fired`
/// are the states a borrower can observe. Cancellation collapses into `Idle`
/// inside release and surfaces to waiters as [`TimerStatus::Cancelled`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerState {
    Idle,
    Armed,
    Fired,
}

/// Outcome of waiting on a borrow's completion signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerStatus {
    /// The armed duration elapsed.
    Fired,
    /// The borrow ended before a fire was observed.
    Cancelled,
}

/// Worker command protocol. Channel FIFO ordering guarantees a release's
/// `Disarm` is consumed before the next borrow's `Arm`.
pub(crate) enum Command {
    Arm { duration: Duration, generation: u64 },
    Disarm,
    Shutdown,
}

struct Slot {
    generation: u64,
    state: TimerState,
}

/// Completion slot shared by the worker, the handle, and signal clones.
pub(crate) struct HandleShared {
    slot: Mutex<Slot>,
    fired: Condvar,
}

impl HandleShared {
    fn new() -> Self {
        Self {
            slot: Mutex::new(Slot {
                generation: 0,
                state: TimerState::Idle,
            }),
            fired: Condvar::new(),
        }
    }

    /// Record a fire for `generation`. A stale fire racing a release or a
    /// rearm fails the generation/state check and is dropped unobserved.
    fn fire(&self, generation: u64) {
        let mut slot = self.slot.lock();
        if slot.generation == generation && slot.state == TimerState::Armed {
            slot.state = TimerState::Fired;
            self.fired.notify_all();
        }
    }

    /// Arm for a new borrow. Resets any leftover state from the prior borrow.
    pub(crate) fn arm(&self, generation: u64) {
        let mut slot = self.slot.lock();
        slot.generation = generation;
        slot.state = TimerState::Armed;
    }

    /// Discard any pending fire and return the slot to `Idle`, waking stale
    /// waiters so they resolve `Cancelled`. This is release's non-blocking
    /// check-and-discard of an in-flight completion.
    pub(crate) fn reclaim(&self, generation: u64) {
        let mut slot = self.slot.lock();
        assert_eq!(
            slot.generation, generation,
            "timer handle released with a stale generation (double release?)"
        );
        slot.state = TimerState::Idle;
        self.fired.notify_all();
    }

    /// Force the slot to `Idle` regardless of generation (pool shutdown).
    pub(crate) fn cancel_any(&self) {
        let mut slot = self.slot.lock();
        slot.state = TimerState::Idle;
        self.fired.notify_all();
    }

    pub(crate) fn state(&self, generation: u64) -> TimerState {
        let slot = self.slot.lock();
        if slot.generation == generation {
            slot.state
        } else {
            TimerState::Idle
        }
    }

    pub(crate) fn wait(&self, generation: u64) -> TimerStatus {
        let mut slot = self.slot.lock();
        loop {
            if slot.generation != generation || slot.state == TimerState::Idle {
                return TimerStatus::Cancelled;
            }
            if slot.state == TimerState::Fired {
                return TimerStatus::Fired;
            }
            self.fired.wait(&mut slot);
        }
    }

    pub(crate) fn wait_timeout(&self, generation: u64, timeout: Duration) -> Option<TimerStatus> {
        let deadline = Instant::now() + timeout;
        let mut slot = self.slot.lock();
        loop {
            if slot.generation != generation || slot.state == TimerState::Idle {
                return Some(TimerStatus::Cancelled);
            }
            if slot.state == TimerState::Fired {
                return Some(TimerStatus::Fired);
            }
            if self.fired.wait_until(&mut slot, deadline).timed_out() {
                // One re-check: the fire may have landed exactly at the deadline.
                return match slot.state {
                    TimerState::Fired if slot.generation == generation => Some(TimerStatus::Fired),
                    TimerState::Armed if slot.generation == generation => None,
                    _ => Some(TimerStatus::Cancelled),
                };
            }
        }
    }
}

/// Pool-owned core of one recyclable timer handle.
pub(crate) struct HandleCore {
    id: u32,
    generation: u64,
    commands: Sender<Command>,
    shared: Arc<HandleShared>,
}

impl HandleCore {
    /// Spawn the worker thread for a new handle.
    pub(crate) fn spawn(id: u32) -> (Self, JoinHandle<()>) {
        let (commands, worker_commands) = channel::unbounded();
        let shared = Arc::new(HandleShared::new());
        let worker_shared = Arc::clone(&shared);

        let worker = thread::Builder::new()
            .name(format!("weft-timer-{id}"))
            .spawn(move || run_worker(id, &worker_commands, &worker_shared))
            .expect("failed to spawn timer worker thread");

        (
            Self {
                id,
                generation: 0,
                commands,
                shared,
            },
            worker,
        )
    }

    pub(crate) fn id(&self) -> u32 {
        self.id
    }

    pub(crate) fn generation(&self) -> u64 {
        self.generation
    }

    pub(crate) fn shared(&self) -> &Arc<HandleShared> {
        &self.shared
    }

    pub(crate) fn command_sender(&self) -> Sender<Command> {
        self.commands.clone()
    }

    /// Bump the generation, reset the slot, and start the countdown.
    pub(crate) fn arm(&mut self, duration: Duration) {
        self.generation += 1;
        self.shared.arm(self.generation);
        // Send may only fail after pool shutdown, where the armed slot has
        // already been cancelled by close().
        let _ = self.commands.send(Command::Arm {
            duration,
            generation: self.generation,
        });
    }

    /// Stop the countdown and drain the borrow's pending completion.
    pub(crate) fn disarm(&self) {
        let _ = self.commands.send(Command::Disarm);
        self.shared.reclaim(self.generation);
    }
}

/// Worker loop: park while idle, sleep in `recv_timeout` while armed.
fn run_worker(id: u32, commands: &Receiver<Command>, shared: &Arc<HandleShared>) {
    log::trace!("[timer-pool] worker {id} started");
    while let Ok(command) = commands.recv() {
        let (duration, generation) = match command {
            Command::Arm {
                duration,
                generation,
            } => (duration, generation),
            // A release raced a fire: the cycle already ended, nothing to stop.
            Command::Disarm => continue,
            Command::Shutdown => break,
        };

        match commands.recv_timeout(duration) {
            Err(RecvTimeoutError::Timeout) => shared.fire(generation),
            Ok(Command::Disarm) => {} // cancelled before firing
            Ok(Command::Shutdown) | Err(RecvTimeoutError::Disconnected) => break,
            Ok(Command::Arm { .. }) => unreachable!("timer worker armed while armed"),
        }
    }
    log::trace!("[timer-pool] worker {id} stopped");
}

/// Waiter token for one borrow, cloneable into background tasks.
///
/// `wait` blocks until the borrow fires or ends; a signal held past its
/// borrow resolves `Cancelled` and can never observe a later borrow's fire.
#[derive(Clone)]
pub struct CompletionSignal {
    shared: Arc<HandleShared>,
    generation: u64,
}

impl CompletionSignal {
    pub(crate) fn new(shared: Arc<HandleShared>, generation: u64) -> Self {
        Self { shared, generation }
    }

    /// Block until the borrow resolves.
    #[must_use]
    pub fn wait(&self) -> TimerStatus {
        self.shared.wait(self.generation)
    }

    /// Block until the borrow resolves or `timeout` elapses. `None` means the
    /// handle was still armed when the timeout expired.
    #[must_use]
    pub fn wait_timeout(&self, timeout: Duration) -> Option<TimerStatus> {
        self.shared.wait_timeout(self.generation, timeout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stale_fire_is_dropped() {
        let shared = HandleShared::new();
        shared.arm(2);

        // A fire stamped with an older generation must not be observed.
        shared.fire(1);
        assert_eq!(shared.state(2), TimerState::Armed);

        shared.fire(2);
        assert_eq!(shared.state(2), TimerState::Fired);
    }

    #[test]
    fn reclaim_discards_pending_fire() {
        let shared = HandleShared::new();
        shared.arm(1);
        shared.fire(1);
        assert_eq!(shared.state(1), TimerState::Fired);

        shared.reclaim(1);
        assert_eq!(shared.wait(1), TimerStatus::Cancelled);
    }

    #[test]
    fn wait_timeout_reports_armed_as_none() {
        let shared = HandleShared::new();
        shared.arm(1);
        assert_eq!(
            shared.wait_timeout(1, Duration::from_millis(10)),
            None
        );
    }

    #[test]
    #[should_panic(expected = "stale generation")]
    fn reclaim_with_stale_generation_panics() {
        let shared = HandleShared::new();
        shared.arm(3);
        shared.reclaim(2);
    }
}
