//! Relationship properties: one directed walk across a relationship.

use querytree_md::{MetadataWorkspace, RelationshipId};

use crate::error::ir_assert;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RelProperty {
    relationship: RelationshipId,
    from_end: String,
    to_end: String,
}

impl RelProperty {
    /// Panics unless both ends exist on the relationship and differ.
    #[track_caller]
    pub fn new(
        md: &MetadataWorkspace,
        relationship: RelationshipId,
        from_end: &str,
        to_end: &str,
    ) -> Self {
        let rel = md.relationship(relationship);
        ir_assert!(
            rel.end(from_end).is_ok() && rel.end(to_end).is_ok() && from_end != to_end,
            "relationship `{}` has no walk {from_end} -> {to_end}",
            rel.name
        );
        Self {
            relationship,
            from_end: from_end.to_string(),
            to_end: to_end.to_string(),
        }
    }

    pub fn relationship(&self) -> RelationshipId {
        self.relationship
    }

    pub fn from_end(&self) -> &str {
        &self.from_end
    }

    pub fn to_end(&self) -> &str {
        &self.to_end
    }

    /// Same relationship walked the other way.
    pub fn inverse(&self) -> Self {
        Self {
            relationship: self.relationship,
            from_end: self.to_end.clone(),
            to_end: self.from_end.clone(),
        }
    }
}

impl std::fmt::Display for RelProperty {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "r{}:{}->{}",
            self.relationship.raw(),
            self.from_end,
            self.to_end
        )
    }
}
