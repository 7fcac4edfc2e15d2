// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 weftworks

//! Timer resource pool.
//!
//! Recycles delay timer handles so high-frequency time-based operations
//! (debounce, throttle, timeout, countdown) avoid repeated thread
//! spawn/teardown. A borrow is scoped: releasing (or dropping) a handle
//! disarms it and drains any completion the release raced against, so the
//! next borrower can never observe a stale fire.
//!
//! # Example
//!
//! ```rust
//! use std::time::Duration;
//! use weft::timer::{TimerPool, TimerStatus};
//!
//! let pool = TimerPool::new();
//!
//! // Wait out a full borrow.
//! let handle = pool.acquire(Duration::from_millis(5));
//! assert_eq!(handle.wait(), TimerStatus::Fired);
//! pool.release(handle);
//!
//! // Cancel early: the released borrow never signals.
//! let handle = pool.acquire(Duration::from_millis(500));
//! let signal = handle.completion();
//! pool.release(handle);
//! assert_eq!(signal.wait(), TimerStatus::Cancelled);
//! ```

mod debounce;
mod handle;
mod pool;

pub use debounce::Debouncer;
pub use handle::{CompletionSignal, TimerState, TimerStatus};
pub use pool::{default_pool, TimerHandle, TimerPool};
