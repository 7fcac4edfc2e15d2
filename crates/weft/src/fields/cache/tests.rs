// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 weftworks
//! Tests for FieldCache.

use super::*;
use crate::fields::{Fields, TypeDescriptorBuilder};
use std::sync::Barrier;
use std::thread;

#[derive(Clone, Debug, PartialEq, Fields)]
struct Profile {
    pub name: String,
    pub email: String,
    pub age: u32,
    revision: u64, // not pub: excluded from the descriptor
    #[fields(skip)]
    pub token: String, // explicitly excluded
}

fn sample_profile() -> Profile {
    Profile {
        name: "Ada".to_string(),
        email: "ada@example.com".to_string(),
        age: 36,
        revision: 7,
        token: "opaque".to_string(),
    }
}

#[test]
fn cache_hit_and_miss_paths() {
    let cache = FieldCache::with_mode(CacheMode::Enabled);
    let key = TypeKey::of::<Profile>();

    let first = cache.descriptor::<Profile>().expect("first build");
    let stats = cache.stats();
    assert_eq!(stats.misses, 1);
    assert_eq!(stats.hits, 0);
    assert_eq!(cache.builds_for(&key), 1);

    let second = cache.descriptor::<Profile>().expect("cached lookup");
    assert!(Arc::ptr_eq(&first, &second));

    let stats = cache.stats();
    assert_eq!(stats.misses, 1);
    assert_eq!(stats.hits, 1);
    assert_eq!(cache.builds_for(&key), 1);
}

#[test]
fn single_flight_concurrent_first_use() {
    let cache = Arc::new(FieldCache::with_mode(CacheMode::Enabled));
    let barrier = Arc::new(Barrier::new(8));
    let mut handles = Vec::new();

    for _ in 0..8 {
        let cache = Arc::clone(&cache);
        let barrier = Arc::clone(&barrier);
        handles.push(thread::spawn(move || {
            barrier.wait();
            cache.descriptor::<Profile>().expect("descriptor")
        }));
    }

    let descriptors: Vec<_> = handles
        .into_iter()
        .map(|handle| handle.join().expect("thread should succeed"))
        .collect();

    for descriptor in &descriptors[1..] {
        assert!(Arc::ptr_eq(&descriptors[0], descriptor));
    }
    assert_eq!(cache.builds_for(&TypeKey::of::<Profile>()), 1);
    assert_eq!(cache.len(), 1);
}

#[test]
fn set_field_mutates_exactly_one_field() {
    let cache = FieldCache::with_mode(CacheMode::Enabled);
    let mut profile = sample_profile();

    cache
        .set_field(&mut profile, "name", "Grace".to_string())
        .expect("set name");

    assert_eq!(profile.name, "Grace");
    assert_eq!(profile.email, "ada@example.com");
    assert_eq!(profile.age, 36);
    assert_eq!(profile.revision, 7);
    assert_eq!(profile.token, "opaque");
}

#[test]
fn unknown_field_not_found_and_record_unchanged() {
    let cache = FieldCache::with_mode(CacheMode::Enabled);
    let mut profile = sample_profile();
    let before = profile.clone();

    let err = cache
        .set_field(&mut profile, "nonexistent", 1i32)
        .unwrap_err();
    assert!(matches!(err, FieldError::NotFound { .. }));
    assert_eq!(profile, before);
}

#[test]
fn type_mismatch_leaves_record_unmodified() {
    let cache = FieldCache::with_mode(CacheMode::Enabled);
    let mut profile = sample_profile();
    let before = profile.clone();

    // age is u32; an i64 must be rejected without touching the record.
    let err = cache.set_field(&mut profile, "age", 99i64).unwrap_err();
    assert!(matches!(err, FieldError::TypeMismatch { field: "age", .. }));
    assert_eq!(profile, before);
}

#[test]
fn invisible_fields_resolve_like_nonexistent_ones() {
    let cache = FieldCache::with_mode(CacheMode::Enabled);
    let mut profile = sample_profile();

    let err = cache.set_field(&mut profile, "revision", 8u64).unwrap_err();
    assert!(matches!(err, FieldError::NotFound { .. }));

    let err = cache
        .set_field(&mut profile, "token", "x".to_string())
        .unwrap_err();
    assert!(matches!(err, FieldError::NotFound { .. }));

    let descriptor = cache.descriptor::<Profile>().expect("descriptor");
    assert_eq!(descriptor.len(), 3);
}

#[test]
fn disabled_cache_builds_per_call() {
    let cache = FieldCache::new(); // disabled by default
    assert!(!cache.is_enabled());
    let key = TypeKey::of::<Profile>();

    let mut profile = sample_profile();
    cache
        .set_field(&mut profile, "name", "Grace".to_string())
        .expect("set name");
    cache
        .set_field(&mut profile, "age", 40u32)
        .expect("set age");

    // Each call built afresh; the map was never populated.
    assert_eq!(cache.builds_for(&key), 2);
    assert_eq!(cache.len(), 0);

    // Same inputs through an enabled cache give the same result.
    let enabled = FieldCache::with_mode(CacheMode::Enabled);
    let mut reference = sample_profile();
    enabled
        .set_field(&mut reference, "name", "Grace".to_string())
        .expect("set name");
    enabled
        .set_field(&mut reference, "age", 40u32)
        .expect("set age");
    assert_eq!(profile, reference);
}

#[test]
fn toggling_affects_future_calls_only() {
    let cache = FieldCache::with_mode(CacheMode::Enabled);
    let held = cache.descriptor::<Profile>().expect("descriptor");

    cache.disable();
    let fresh = cache.descriptor::<Profile>().expect("uncached build");
    assert!(!Arc::ptr_eq(&held, &fresh));

    // The held descriptor keeps working regardless of the toggle.
    let mut profile = sample_profile();
    held.set(&mut profile, "age", 41u32).expect("set age");
    assert_eq!(profile.age, 41);

    cache.enable();
    let cached = cache.descriptor::<Profile>().expect("cached again");
    assert!(Arc::ptr_eq(&held, &cached));
}

#[test]
fn concurrent_set_field_stress() {
    let cache = Arc::new(FieldCache::with_mode(CacheMode::Enabled));
    let _ = cache.descriptor::<Profile>().expect("warmup");

    let barrier = Arc::new(Barrier::new(8));
    let mut handles = Vec::new();

    for _ in 0..8 {
        let cache = Arc::clone(&cache);
        let barrier = Arc::clone(&barrier);
        handles.push(thread::spawn(move || {
            let mut profile = sample_profile();
            barrier.wait();
            for _ in 0..12_500 {
                let outcome = match fastrand::usize(..3) {
                    0 => cache.set_field(&mut profile, "name", "X".to_string()),
                    1 => cache.set_field(&mut profile, "email", "x@example.com".to_string()),
                    _ => cache.set_field(&mut profile, "age", 1u32),
                };
                outcome.expect("set_field should succeed");
            }
        }));
    }

    for handle in handles {
        handle.join().expect("thread should succeed");
    }

    assert_eq!(cache.builds_for(&TypeKey::of::<Profile>()), 1);
    let stats = cache.stats();
    assert_eq!(stats.builds, 1);
    assert!(stats.hits >= 100_000);
}

#[test]
fn get_field_round_trip() {
    let cache = FieldCache::with_mode(CacheMode::Enabled);
    let profile = sample_profile();

    let name: String = cache.get_field(&profile, "name").expect("get name");
    assert_eq!(name, "Ada");

    let err = cache.get_field::<Profile, i32>(&profile, "age").unwrap_err();
    assert!(matches!(err, FieldError::TypeMismatch { .. }));
}

#[test]
fn manual_registration_through_builder() {
    struct Reading {
        celsius: f64,
    }

    fn reading_descriptor() -> Result<TypeDescriptor, DescriptorError> {
        TypeDescriptorBuilder::new("Reading")
            .field(
                "celsius",
                std::any::type_name::<f64>(),
                |record, value| {
                    let record = record.downcast_mut::<Reading>().ok_or(FieldError::Record {
                        expected: "Reading",
                    })?;
                    let value =
                        value
                            .downcast::<f64>()
                            .map_err(|_| FieldError::TypeMismatch {
                                type_name: "Reading",
                                field: "celsius",
                                expected: "f64",
                            })?;
                    record.celsius = *value;
                    Ok(())
                },
                |record| {
                    let record = record.downcast_ref::<Reading>().ok_or(FieldError::Record {
                        expected: "Reading",
                    })?;
                    Ok(Box::new(record.celsius) as Box<dyn std::any::Any>)
                },
            )
            .build()
    }

    let cache = FieldCache::with_mode(CacheMode::Enabled);
    let key = TypeKey::of::<Reading>();

    let first = cache
        .get_or_try_build(key, reading_descriptor)
        .expect("build");
    let second = cache
        .get_or_try_build(key, reading_descriptor)
        .expect("cached");
    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(cache.builds_for(&key), 1);

    let mut reading = Reading { celsius: 20.0 };
    first.set(&mut reading, "celsius", 21.5f64).expect("set");
    assert!((reading.celsius - 21.5).abs() < f64::EPSILON);
}

#[test]
fn build_errors_are_not_cached() {
    struct Flaky;

    let cache = FieldCache::with_mode(CacheMode::Enabled);
    let key = TypeKey::of::<Flaky>();

    let failed = cache.get_or_try_build(key, || {
        Err(DescriptorError::DuplicateField {
            type_name: "Flaky".to_string(),
            field: "x".to_string(),
        })
    });
    assert!(failed.is_err());
    assert_eq!(cache.len(), 0);

    // The next call retries the build and can succeed.
    let recovered = cache.get_or_try_build(key, || {
        TypeDescriptorBuilder::new("Flaky").build()
    });
    assert!(recovered.is_ok());
    assert_eq!(cache.builds_for(&key), 2);
    assert_eq!(cache.len(), 1);
}
