// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 weftworks

//! # Weft - runtime support services for component composition
//!
//! The two low-level services a reactive composition layer leans on:
//!
//! - [`fields`] - a **field-access cache** memoizing per-type accessor
//!   tables, so generic "set field by name" operations on arbitrary record
//!   types pay the table build exactly once per type (single-flighted under
//!   concurrency).
//! - [`timer`] - a **timer pool** recycling delay handles backed by parked
//!   worker threads, so debounce/throttle/timeout-style operations avoid
//!   repeated thread spawn and teardown without ever leaking a stale fire
//!   into the next borrower.
//!
//! ## Quick Start
//!
//! ```rust
//! use std::time::Duration;
//! use weft::fields::{default_cache, FieldError, Fields};
//! use weft::timer::{default_pool, TimerStatus};
//!
//! #[derive(Clone, Fields)]
//! struct Profile {
//!     pub name: String,
//!     pub age: u32,
//! }
//!
//! fn main() -> Result<(), FieldError> {
//!     let mut profile = Profile { name: "Ada".into(), age: 36 };
//!
//!     // Accessor table built once, reused by every later call.
//!     default_cache().set_field(&mut profile, "name", String::from("Grace"))?;
//!     assert_eq!(profile.name, "Grace");
//!
//!     // Borrow a pooled timer; dropping the handle releases it.
//!     let handle = default_pool().acquire(Duration::from_millis(5));
//!     assert_eq!(handle.wait(), TimerStatus::Fired);
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! +--------------------------------------------------------------+
//! |                    Composition Layer (external)              |
//! |    state / list / form / async / selection functions         |
//! +--------------------------------------------------------------+
//! |                      Runtime Support (this crate)            |
//! |  FieldCache: TypeKey -> TypeDescriptor   TimerPool: free list |
//! |  single-flight build, lock-free-ish read  of recycled handles |
//! +--------------------------------------------------------------+
//! |  #[derive(Fields)] accessor tables       worker threads,      |
//! |  (weft-codegen)                          command channels     |
//! +--------------------------------------------------------------+
//! ```
//!
//! ## Key Types
//!
//! | Type | Description |
//! |------|-------------|
//! | [`fields::FieldCache`] | Memoizing store of per-type accessor tables |
//! | [`fields::TypeDescriptor`] | One type's named set/get accessor table |
//! | [`timer::TimerPool`] | Free-list pool of recyclable delay handles |
//! | [`timer::TimerHandle`] | One scoped borrow of a pooled timer |
//! | [`timer::CompletionSignal`] | Waiter token for a borrow's completion |

// Allow the derive macro to work inside this crate's tests
extern crate self as weft;

/// Field access by name: descriptors, builder, memoizing cache.
pub mod fields;
/// Timer pool: recyclable delay handles, completion signals, debounce.
pub mod timer;

pub use fields::{FieldAccess, FieldCache, FieldError, Fields, TypeDescriptor};
pub use timer::{CompletionSignal, TimerHandle, TimerPool, TimerStatus};
