// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 weftworks

//! Trailing-edge debounce built on the timer pool.
//!
//! The canonical pool consumer: every call borrows a handle, the previous
//! pending borrow is cancelled by an early release, and a single long-lived
//! dispatcher thread waits on each borrow's completion signal in the
//! background. Actions run only when their wait resolves `Fired`; superseded
//! actions resolve `Cancelled` and are dropped.

use crossbeam::channel::{self, Sender};
use parking_lot::Mutex;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use super::handle::TimerStatus;
use super::pool::{TimerHandle, TimerPool};

type Action = Box<dyn FnOnce() + Send>;

enum DispatchMsg {
    Watch {
        signal: super::handle::CompletionSignal,
        action: Action,
    },
    Shutdown,
}

/// Debounces calls: only the last action within a quiet period runs.
pub struct Debouncer {
    pool: TimerPool,
    delay: Duration,
    pending: Mutex<Option<TimerHandle>>,
    dispatch: Sender<DispatchMsg>,
    dispatcher: Option<JoinHandle<()>>,
}

impl Debouncer {
    /// Create a debouncer with the given quiet period.
    #[must_use]
    pub fn new(pool: TimerPool, delay: Duration) -> Self {
        let (dispatch, inbox) = channel::unbounded();

        let dispatcher = thread::Builder::new()
            .name("weft-debounce".to_string())
            .spawn(move || {
                while let Ok(message) = inbox.recv() {
                    let DispatchMsg::Watch { signal, action } = message else {
                        break;
                    };
                    // Cancelled waits resolve immediately, so superseded
                    // actions never delay the live one.
                    if signal.wait() == TimerStatus::Fired {
                        action();
                    }
                }
                log::trace!("[debounce] dispatcher stopped");
            })
            .expect("failed to spawn debounce dispatcher thread");

        Self {
            pool,
            delay,
            pending: Mutex::new(None),
            dispatch,
            dispatcher: Some(dispatcher),
        }
    }

    /// Schedule `action` to run after the quiet period, superseding any
    /// action scheduled earlier that has not yet run.
    pub fn call(&self, action: impl FnOnce() + Send + 'static) {
        let handle = self.pool.acquire(self.delay);
        let signal = handle.completion();

        let superseded = self.pending.lock().replace(handle);
        if let Some(superseded) = superseded {
            self.pool.release(superseded);
        }

        let _ = self.dispatch.send(DispatchMsg::Watch {
            signal,
            action: Box::new(action),
        });
    }

    /// The configured quiet period.
    #[must_use]
    pub fn delay(&self) -> Duration {
        self.delay
    }
}

impl Drop for Debouncer {
    fn drop(&mut self) {
        if let Some(pending) = self.pending.lock().take() {
            self.pool.release(pending);
        }
        let _ = self.dispatch.send(DispatchMsg::Shutdown);
        if let Some(dispatcher) = self.dispatcher.take() {
            let _ = dispatcher.join();
        }
    }
}
