//! Querytree metadata (the type system the query IR is built against).
//!
//! The IR builder never inspects schema files; it only needs a provider that
//! can answer a handful of questions:
//!
//! - which primitive types exist (boolean/integer/string are mandatory),
//! - what properties and keys a structured type has,
//! - which extents (entity sets) back a type,
//! - what the common supertype of two types is (for implicit widening), and
//! - which relationship ends a navigation walks.
//!
//! All types are **interned** inside a [`MetadataWorkspace`]: structurally
//! identical row/collection/ref types and identically-named declared types map
//! to the same [`TypeUsage`] handle. Handle identity is therefore a sound and
//! complete notion of type equality for everything downstream.

pub mod error;
pub mod relationship;
pub mod types;

pub use error::{MetadataError, Result};
pub use relationship::{Extent, ExtentId, Multiplicity, Relationship, RelationshipEnd, RelationshipId};
pub use types::{MetadataWorkspace, PrimitiveKind, Property, StructuralType, TypeKind, TypeUsage};
