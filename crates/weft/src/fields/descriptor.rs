// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 weftworks

//! Type descriptors for by-name field access.
//!
//! A [`TypeDescriptor`] is the per-type table of named accessor functions
//! produced either by `#[derive(Fields)]` or by the fluent
//! [`TypeDescriptorBuilder`]. Descriptors are immutable after construction
//! and shared read-only through the cache.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::hash::{Hash, Hasher};

/// Setter accessor: downcasts the record and the boxed value, then assigns.
pub type SetFn = fn(&mut dyn Any, Box<dyn Any>) -> Result<(), FieldError>;

/// Getter accessor: downcasts the record and clones the field out.
pub type GetFn = fn(&dyn Any) -> Result<Box<dyn Any>, FieldError>;

/// Errors for by-name field access.
#[derive(Debug)]
pub enum FieldError {
    /// The name did not resolve, or the field was excluded at build time.
    NotFound {
        type_name: &'static str,
        field: String,
    },
    /// The supplied value's type is incompatible with the field's type.
    /// The record is left unmodified.
    TypeMismatch {
        type_name: &'static str,
        field: &'static str,
        expected: &'static str,
    },
    /// A descriptor was applied to a record of the wrong concrete type.
    /// Only reachable through hand-built descriptors used with raw `dyn Any`.
    Record { expected: &'static str },
    /// The descriptor build itself failed; nothing was cached.
    Build(DescriptorError),
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound { type_name, field } => {
                write!(f, "Field not found: {}.{}", type_name, field)
            }
            Self::TypeMismatch {
                type_name,
                field,
                expected,
            } => write!(
                f,
                "Type mismatch for {}.{}: expected {}",
                type_name, field, expected
            ),
            Self::Record { expected } => {
                write!(f, "Record type mismatch: descriptor is for {}", expected)
            }
            Self::Build(err) => write!(f, "Descriptor build failed: {}", err),
        }
    }
}

impl std::error::Error for FieldError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Build(err) => Some(err),
            _ => None,
        }
    }
}

/// Errors raised while building a descriptor.
#[derive(Debug)]
pub enum DescriptorError {
    /// Two fields with the same name were registered for one type.
    DuplicateField { type_name: String, field: String },
}

impl fmt::Display for DescriptorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DuplicateField { type_name, field } => {
                write!(f, "Duplicate field registered: {}.{}", type_name, field)
            }
        }
    }
}

impl std::error::Error for DescriptorError {}

/// Identifies a record type uniquely within the process.
///
/// Equality and hashing use the runtime [`TypeId`] only; the name is carried
/// for diagnostics. Identical runtime types always produce equal keys and
/// distinct types never collide.
#[derive(Clone, Copy, Debug, Eq)]
pub struct TypeKey {
    id: TypeId,
    name: &'static str,
}

impl TypeKey {
    /// Key for the record type `R`.
    #[must_use]
    pub fn of<R: Any>() -> Self {
        Self {
            id: TypeId::of::<R>(),
            name: std::any::type_name::<R>(),
        }
    }

    /// Diagnostic name of the record type.
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl PartialEq for TypeKey {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Hash for TypeKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

/// One named accessor pair. Immutable after construction.
pub struct FieldDescriptor {
    name: &'static str,
    value_type: &'static str,
    set: SetFn,
    get: GetFn,
}

impl FieldDescriptor {
    #[must_use]
    pub fn new(name: &'static str, value_type: &'static str, set: SetFn, get: GetFn) -> Self {
        Self {
            name,
            value_type,
            set,
            get,
        }
    }

    /// Field name as registered.
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Diagnostic name of the field's value type.
    #[must_use]
    pub fn value_type(&self) -> &'static str {
        self.value_type
    }
}

impl fmt::Debug for FieldDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldDescriptor")
            .field("name", &self.name)
            .field("value_type", &self.value_type)
            .finish_non_exhaustive()
    }
}

/// Per-type accessor table: field list plus a name -> index map.
///
/// Created once per distinct type on the first cache miss, never mutated,
/// never evicted.
#[derive(Debug)]
pub struct TypeDescriptor {
    type_name: &'static str,
    fields: Vec<FieldDescriptor>,
    index: HashMap<&'static str, usize>,
}

impl TypeDescriptor {
    /// Assemble a descriptor from pre-validated parts.
    ///
    /// Used by generated code, where field names are unique by construction.
    /// On a duplicate name the first registration wins.
    #[must_use]
    pub fn from_parts(type_name: &'static str, fields: Vec<FieldDescriptor>) -> Self {
        let mut index = HashMap::with_capacity(fields.len());
        for (position, field) in fields.iter().enumerate() {
            index.entry(field.name).or_insert(position);
        }
        debug_assert_eq!(index.len(), fields.len(), "duplicate field names");
        Self {
            type_name,
            fields,
            index,
        }
    }

    /// Name of the described record type.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Resolve a field by exact, case-sensitive name.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&FieldDescriptor> {
        self.index.get(name).map(|&position| &self.fields[position])
    }

    /// Iterate the registered fields in declaration order.
    pub fn fields(&self) -> impl Iterator<Item = &FieldDescriptor> {
        self.fields.iter()
    }

    /// Number of registered fields.
    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Set a field by name on a typed record.
    ///
    /// Unknown names fail with [`FieldError::NotFound`]; a value of the wrong
    /// type fails with [`FieldError::TypeMismatch`] and leaves the record
    /// unmodified (the downcast happens before any assignment).
    pub fn set<R: Any, V: Any>(
        &self,
        record: &mut R,
        name: &str,
        value: V,
    ) -> Result<(), FieldError> {
        let field = self.field(name).ok_or_else(|| FieldError::NotFound {
            type_name: self.type_name,
            field: name.to_string(),
        })?;
        (field.set)(record, Box::new(value))
    }

    /// Read a field by name from a typed record (clone-out semantics).
    pub fn get<R: Any, V: Any>(&self, record: &R, name: &str) -> Result<V, FieldError> {
        let field = self.field(name).ok_or_else(|| FieldError::NotFound {
            type_name: self.type_name,
            field: name.to_string(),
        })?;
        let value = (field.get)(record)?;
        match value.downcast::<V>() {
            Ok(value) => Ok(*value),
            Err(_) => Err(FieldError::TypeMismatch {
                type_name: self.type_name,
                field: field.name,
                expected: field.value_type,
            }),
        }
    }

    /// Type-erased setter for callers that only hold `dyn Any`.
    pub fn set_any(
        &self,
        record: &mut dyn Any,
        name: &str,
        value: Box<dyn Any>,
    ) -> Result<(), FieldError> {
        let field = self.field(name).ok_or_else(|| FieldError::NotFound {
            type_name: self.type_name,
            field: name.to_string(),
        })?;
        (field.set)(record, value)
    }
}

/// Record types with a registered accessor table.
///
/// Implemented via `#[derive(Fields)]`, or by hand through
/// [`TypeDescriptorBuilder`] for types the derive cannot express.
pub trait FieldAccess: Any {
    /// Build this type's accessor table. The cache invokes this at most once
    /// per type while enabled; the uncached path invokes it per call.
    fn field_descriptor() -> Result<TypeDescriptor, DescriptorError>;

    /// Cache key for this type.
    #[must_use]
    fn type_key() -> TypeKey
    where
        Self: Sized,
    {
        TypeKey::of::<Self>()
    }
}

/// Fluent builder for hand-registered descriptors.
#[derive(Debug)]
pub struct TypeDescriptorBuilder {
    type_name: &'static str,
    fields: Vec<FieldDescriptor>,
}

impl TypeDescriptorBuilder {
    /// Create a new builder for a record type.
    #[must_use]
    pub fn new(type_name: &'static str) -> Self {
        Self {
            type_name,
            fields: Vec::new(),
        }
    }

    /// Register an accessor pair for one field.
    #[must_use]
    pub fn field(
        mut self,
        name: &'static str,
        value_type: &'static str,
        set: SetFn,
        get: GetFn,
    ) -> Self {
        self.fields
            .push(FieldDescriptor::new(name, value_type, set, get));
        self
    }

    /// Build the descriptor, rejecting duplicate field names.
    pub fn build(self) -> Result<TypeDescriptor, DescriptorError> {
        let mut seen = HashMap::with_capacity(self.fields.len());
        for field in &self.fields {
            if seen.insert(field.name, ()).is_some() {
                return Err(DescriptorError::DuplicateField {
                    type_name: self.type_name.to_string(),
                    field: field.name.to_string(),
                });
            }
        }
        Ok(TypeDescriptor::from_parts(self.type_name, self.fields))
    }
}
