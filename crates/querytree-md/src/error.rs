use thiserror::Error;

use crate::TypeUsage;

/// Errors raised while declaring or querying metadata.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MetadataError {
    #[error("type `{0}` is already defined")]
    DuplicateType(String),

    #[error("unknown type `{0}`")]
    UnknownType(String),

    #[error("type #{0} is not an entity type and cannot be used as a base type")]
    InvalidBaseType(u32),

    #[error("type `{type_name}` has no property `{property}`")]
    UnknownProperty { type_name: String, property: String },

    #[error("extent `{0}` is already defined")]
    DuplicateExtent(String),

    #[error("relationship `{0}` is already defined")]
    DuplicateRelationship(String),

    #[error("relationship `{relationship}` has no end named `{end}`")]
    UnknownRelationshipEnd { relationship: String, end: String },

    #[error("expected a structured type, found type #{}", .0.raw())]
    NotStructured(TypeUsage),
}

pub type Result<T> = std::result::Result<T, MetadataError>;
