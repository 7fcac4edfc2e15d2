// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 weftworks

//! Field access by name, with a memoizing accessor cache.
//!
//! Record types register a table of named accessor functions — via
//! `#[derive(Fields)]` or [`TypeDescriptorBuilder`] — and the [`FieldCache`]
//! memoizes those tables so generic "set field by name" operations pay the
//! table build exactly once per type.
//!
//! # Example
//!
//! ```rust
//! use weft::fields::{CacheMode, FieldCache, Fields};
//!
//! #[derive(Clone, Fields)]
//! struct Profile {
//!     pub name: String,
//!     pub age: u32,
//! }
//!
//! let cache = FieldCache::with_mode(CacheMode::Enabled);
//! let mut profile = Profile { name: "Ada".into(), age: 36 };
//!
//! cache.set_field(&mut profile, "name", String::from("Grace")).unwrap();
//! assert_eq!(profile.name, "Grace");
//!
//! let age: u32 = cache.get_field(&profile, "age").unwrap();
//! assert_eq!(age, 36);
//! ```

mod cache;
mod descriptor;

pub use cache::{default_cache, CacheMode, FieldCache, LookupStats};
pub use descriptor::{
    DescriptorError, FieldAccess, FieldDescriptor, FieldError, GetFn, SetFn, TypeDescriptor,
    TypeDescriptorBuilder, TypeKey,
};

/// Derive macro generating the [`FieldAccess`] impl for a struct.
pub use weft_codegen::Fields;
