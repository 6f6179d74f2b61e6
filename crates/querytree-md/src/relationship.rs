//! Extents (entity sets) and relationships.

use serde::{Deserialize, Serialize};

use crate::error::{MetadataError, Result};
use crate::TypeUsage;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(transparent)]
pub struct ExtentId(u32);

impl ExtentId {
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    pub const fn raw(self) -> u32 {
        self.0
    }
}

/// A named, persistent source of rows of `element_type`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extent {
    pub id: ExtentId,
    pub name: String,
    pub element_type: TypeUsage,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(transparent)]
pub struct RelationshipId(u32);

impl RelationshipId {
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    pub const fn raw(self) -> u32 {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Multiplicity {
    ZeroOrOne,
    One,
    Many,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelationshipEnd {
    pub name: String,
    pub entity_type: TypeUsage,
    pub multiplicity: Multiplicity,
}

impl RelationshipEnd {
    pub fn new(name: impl Into<String>, entity_type: TypeUsage, multiplicity: Multiplicity) -> Self {
        Self {
            name: name.into(),
            entity_type,
            multiplicity,
        }
    }
}

/// A binary association between two entity types.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relationship {
    pub id: RelationshipId,
    pub name: String,
    pub ends: [RelationshipEnd; 2],
}

impl Relationship {
    pub fn end(&self, name: &str) -> Result<&RelationshipEnd> {
        self.ends
            .iter()
            .find(|end| end.name == name)
            .ok_or_else(|| MetadataError::UnknownRelationshipEnd {
                relationship: self.name.clone(),
                end: name.to_string(),
            })
    }

    /// The end opposite to `name`.
    pub fn other_end(&self, name: &str) -> Result<&RelationshipEnd> {
        self.end(name)?;
        Ok(if self.ends[0].name == name {
            &self.ends[1]
        } else {
            &self.ends[0]
        })
    }
}
