//! Interned type algebra.
//!
//! Every type lives in a [`MetadataWorkspace`] and is referred to by a small
//! copyable [`TypeUsage`] handle. Declared types (entity/complex/enum) are keyed
//! by name; anonymous types (row/collection/ref) are keyed by structure. Either
//! way a given type has exactly one handle per workspace.

use ahash::AHashMap;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::error::{MetadataError, Result};
use crate::relationship::{Extent, ExtentId, Relationship, RelationshipEnd, RelationshipId};

// ============================================================================
// Handles
// ============================================================================

/// Interned type handle (4 bytes). Equality is type identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(transparent)]
pub struct TypeUsage(u32);

impl TypeUsage {
    pub const fn raw(self) -> u32 {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum PrimitiveKind {
    Boolean,
    Byte,
    Int16,
    Int32,
    Int64,
    Decimal,
    Single,
    Double,
    String,
    DateTime,
    Guid,
    Binary,
    Geometry,
    Geography,
}

impl PrimitiveKind {
    pub const ALL: [PrimitiveKind; 14] = [
        PrimitiveKind::Boolean,
        PrimitiveKind::Byte,
        PrimitiveKind::Int16,
        PrimitiveKind::Int32,
        PrimitiveKind::Int64,
        PrimitiveKind::Decimal,
        PrimitiveKind::Single,
        PrimitiveKind::Double,
        PrimitiveKind::String,
        PrimitiveKind::DateTime,
        PrimitiveKind::Guid,
        PrimitiveKind::Binary,
        PrimitiveKind::Geometry,
        PrimitiveKind::Geography,
    ];

    pub fn name(self) -> &'static str {
        match self {
            PrimitiveKind::Boolean => "Boolean",
            PrimitiveKind::Byte => "Byte",
            PrimitiveKind::Int16 => "Int16",
            PrimitiveKind::Int32 => "Int32",
            PrimitiveKind::Int64 => "Int64",
            PrimitiveKind::Decimal => "Decimal",
            PrimitiveKind::Single => "Single",
            PrimitiveKind::Double => "Double",
            PrimitiveKind::String => "String",
            PrimitiveKind::DateTime => "DateTime",
            PrimitiveKind::Guid => "Guid",
            PrimitiveKind::Binary => "Binary",
            PrimitiveKind::Geometry => "Geometry",
            PrimitiveKind::Geography => "Geography",
        }
    }

    /// Position on the implicit numeric widening ladder, if numeric.
    fn numeric_rank(self) -> Option<u8> {
        match self {
            PrimitiveKind::Byte => Some(0),
            PrimitiveKind::Int16 => Some(1),
            PrimitiveKind::Int32 => Some(2),
            PrimitiveKind::Int64 => Some(3),
            PrimitiveKind::Decimal => Some(4),
            PrimitiveKind::Single => Some(5),
            PrimitiveKind::Double => Some(6),
            _ => None,
        }
    }

    pub fn is_numeric(self) -> bool {
        self.numeric_rank().is_some()
    }
}

// ============================================================================
// Type definitions
// ============================================================================

/// A named, typed member of a structured or row type.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Property {
    pub name: String,
    pub ty: TypeUsage,
    pub nullable: bool,
}

impl Property {
    pub fn new(name: impl Into<String>, ty: TypeUsage) -> Self {
        Self {
            name: name.into(),
            ty,
            nullable: true,
        }
    }

    pub fn non_nullable(mut self) -> Self {
        self.nullable = false;
        self
    }
}

/// Entity or complex type body. `properties` holds only the declared members;
/// inherited members are reachable through `base`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StructuralType {
    pub name: String,
    pub base: Option<TypeUsage>,
    pub properties: Vec<Property>,
    pub key_members: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TypeKind {
    Primitive(PrimitiveKind),
    Enum { name: String, underlying: PrimitiveKind },
    Entity(StructuralType),
    Complex(StructuralType),
    Row(Vec<Property>),
    Collection(TypeUsage),
    Ref(TypeUsage),
}

impl TypeKind {
    fn declared_name(&self) -> Option<&str> {
        match self {
            TypeKind::Primitive(p) => Some(p.name()),
            TypeKind::Enum { name, .. } => Some(name),
            TypeKind::Entity(s) | TypeKind::Complex(s) => Some(&s.name),
            TypeKind::Row(_) | TypeKind::Collection(_) | TypeKind::Ref(_) => None,
        }
    }
}

// ============================================================================
// Workspace
// ============================================================================

#[derive(Default)]
struct Inner {
    types: Vec<Arc<TypeKind>>,
    by_name: AHashMap<String, TypeUsage>,
    anonymous: AHashMap<TypeKind, TypeUsage>,
    primitives: AHashMap<PrimitiveKind, TypeUsage>,
    extents: Vec<Extent>,
    extents_by_name: AHashMap<String, ExtentId>,
    relationships: Vec<Arc<Relationship>>,
    relationships_by_name: AHashMap<String, RelationshipId>,
}

impl Inner {
    fn push(&mut self, kind: TypeKind) -> TypeUsage {
        let ty = TypeUsage(self.types.len() as u32);
        self.types.push(Arc::new(kind));
        ty
    }
}

/// Interning store for all metadata one query compilation can see.
///
/// Methods take `&self`: anonymous types are minted lazily while the IR is
/// being built, and the workspace is shared (via `Arc`) by every Command.
pub struct MetadataWorkspace {
    inner: RwLock<Inner>,
}

impl MetadataWorkspace {
    /// Workspace with every [`PrimitiveKind`] registered.
    pub fn new() -> Self {
        Self::with_primitives(&PrimitiveKind::ALL)
    }

    /// Workspace exposing only the given primitives (a restricted provider).
    pub fn with_primitives(kinds: &[PrimitiveKind]) -> Self {
        let mut inner = Inner::default();
        for &kind in kinds {
            if inner.primitives.contains_key(&kind) {
                continue;
            }
            let ty = inner.push(TypeKind::Primitive(kind));
            inner.primitives.insert(kind, ty);
            inner.by_name.insert(kind.name().to_string(), ty);
        }
        Self {
            inner: RwLock::new(inner),
        }
    }

    pub fn primitive(&self, kind: PrimitiveKind) -> Option<TypeUsage> {
        self.inner.read().primitives.get(&kind).copied()
    }

    pub fn lookup(&self, name: &str) -> Option<TypeUsage> {
        self.inner.read().by_name.get(name).copied()
    }

    /// Resolve a handle. Panics on a handle minted by another workspace.
    pub fn get(&self, ty: TypeUsage) -> Arc<TypeKind> {
        let inner = self.inner.read();
        match inner.types.get(ty.0 as usize) {
            Some(kind) => Arc::clone(kind),
            None => panic!("type handle #{} does not belong to this workspace", ty.0),
        }
    }

    pub fn len(&self) -> usize {
        self.inner.read().types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // ------------------------------------------------------------------------
    // Declarations
    // ------------------------------------------------------------------------

    fn declare(&self, kind: TypeKind) -> Result<TypeUsage> {
        let name = kind
            .declared_name()
            .map(str::to_string)
            .unwrap_or_default();
        let mut inner = self.inner.write();
        if inner.by_name.contains_key(&name) {
            return Err(MetadataError::DuplicateType(name));
        }
        let ty = inner.push(kind);
        inner.by_name.insert(name, ty);
        Ok(ty)
    }

    pub fn define_enum_type(&self, name: &str, underlying: PrimitiveKind) -> Result<TypeUsage> {
        self.declare(TypeKind::Enum {
            name: name.to_string(),
            underlying,
        })
    }

    /// Declare an entity type. Keys are inherited from the base when
    /// `key_members` is empty.
    pub fn define_entity_type(
        &self,
        name: &str,
        base: Option<TypeUsage>,
        properties: Vec<Property>,
        key_members: &[&str],
    ) -> Result<TypeUsage> {
        if let Some(base) = base {
            if !matches!(*self.get(base), TypeKind::Entity(_)) {
                return Err(MetadataError::InvalidBaseType(base.0));
            }
        }
        let body = StructuralType {
            name: name.to_string(),
            base,
            properties,
            key_members: key_members.iter().map(|k| k.to_string()).collect(),
        };
        let visible: Vec<String> = base
            .map(|b| self.properties(b))
            .unwrap_or_default()
            .into_iter()
            .chain(body.properties.iter().cloned())
            .map(|p| p.name)
            .collect();
        for key in &body.key_members {
            if !visible.contains(key) {
                return Err(MetadataError::UnknownProperty {
                    type_name: name.to_string(),
                    property: key.clone(),
                });
            }
        }
        self.declare(TypeKind::Entity(body))
    }

    pub fn define_complex_type(&self, name: &str, properties: Vec<Property>) -> Result<TypeUsage> {
        self.declare(TypeKind::Complex(StructuralType {
            name: name.to_string(),
            base: None,
            properties,
            key_members: Vec::new(),
        }))
    }

    // ------------------------------------------------------------------------
    // Anonymous (interned by structure)
    // ------------------------------------------------------------------------

    fn intern(&self, kind: TypeKind) -> TypeUsage {
        if let Some(ty) = self.inner.read().anonymous.get(&kind) {
            return *ty;
        }
        let mut inner = self.inner.write();
        // Re-check: another caller may have interned it between the locks.
        if let Some(ty) = inner.anonymous.get(&kind) {
            return *ty;
        }
        let ty = inner.push(kind.clone());
        inner.anonymous.insert(kind, ty);
        ty
    }

    pub fn row_type(&self, properties: Vec<Property>) -> TypeUsage {
        self.intern(TypeKind::Row(properties))
    }

    pub fn collection_of(&self, element: TypeUsage) -> TypeUsage {
        self.intern(TypeKind::Collection(element))
    }

    pub fn ref_of(&self, entity: TypeUsage) -> TypeUsage {
        self.intern(TypeKind::Ref(entity))
    }

    // ------------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------------

    pub fn type_name(&self, ty: TypeUsage) -> String {
        match &*self.get(ty) {
            TypeKind::Row(props) => {
                let fields: Vec<String> = props
                    .iter()
                    .map(|p| format!("{}: {}", p.name, self.type_name(p.ty)))
                    .collect();
                format!("Row({})", fields.join(", "))
            }
            TypeKind::Collection(elem) => format!("Collection({})", self.type_name(*elem)),
            TypeKind::Ref(elem) => format!("Ref({})", self.type_name(*elem)),
            other => other.declared_name().unwrap_or_default().to_string(),
        }
    }

    pub fn primitive_kind(&self, ty: TypeUsage) -> Option<PrimitiveKind> {
        match &*self.get(ty) {
            TypeKind::Primitive(p) => Some(*p),
            _ => None,
        }
    }

    pub fn is_structured(&self, ty: TypeUsage) -> bool {
        matches!(
            &*self.get(ty),
            TypeKind::Entity(_) | TypeKind::Complex(_) | TypeKind::Row(_)
        )
    }

    pub fn element_type(&self, ty: TypeUsage) -> Option<TypeUsage> {
        match &*self.get(ty) {
            TypeKind::Collection(elem) => Some(*elem),
            _ => None,
        }
    }

    pub fn base_type(&self, ty: TypeUsage) -> Option<TypeUsage> {
        match &*self.get(ty) {
            TypeKind::Entity(s) => s.base,
            _ => None,
        }
    }

    /// All properties of a structured type, inherited members first.
    /// Non-structured types have none.
    pub fn properties(&self, ty: TypeUsage) -> Vec<Property> {
        match &*self.get(ty) {
            TypeKind::Entity(s) => {
                let mut out = s.base.map(|b| self.properties(b)).unwrap_or_default();
                out.extend(s.properties.iter().cloned());
                out
            }
            TypeKind::Complex(s) => s.properties.clone(),
            TypeKind::Row(props) => props.clone(),
            _ => Vec::new(),
        }
    }

    /// Key member names; entity subtypes without declared keys use the base's.
    pub fn key_members(&self, ty: TypeUsage) -> Vec<String> {
        match &*self.get(ty) {
            TypeKind::Entity(s) if s.key_members.is_empty() => {
                s.base.map(|b| self.key_members(b)).unwrap_or_default()
            }
            TypeKind::Entity(s) => s.key_members.clone(),
            _ => Vec::new(),
        }
    }

    /// Reflexive subtype test along the entity base chain (and through
    /// ref/collection constructors).
    pub fn is_subtype_of(&self, sub: TypeUsage, sup: TypeUsage) -> bool {
        if sub == sup {
            return true;
        }
        match (&*self.get(sub), &*self.get(sup)) {
            (TypeKind::Entity(s), TypeKind::Entity(_)) => match s.base {
                Some(base) => self.is_subtype_of(base, sup),
                None => false,
            },
            (TypeKind::Ref(a), TypeKind::Ref(b)) | (TypeKind::Collection(a), TypeKind::Collection(b)) => {
                self.is_subtype_of(*a, *b)
            }
            _ => false,
        }
    }

    /// Can a value of `from` be implicitly widened to `to`?
    pub fn is_promotable_to(&self, from: TypeUsage, to: TypeUsage) -> bool {
        if self.is_subtype_of(from, to) {
            return true;
        }
        match (self.primitive_kind(from), self.primitive_kind(to)) {
            (Some(a), Some(b)) => match (a.numeric_rank(), b.numeric_rank()) {
                (Some(ra), Some(rb)) => ra <= rb,
                _ => false,
            },
            _ => false,
        }
    }

    /// Least type both arguments widen to, if any.
    pub fn common_type(&self, a: TypeUsage, b: TypeUsage) -> Option<TypeUsage> {
        if a == b {
            return Some(a);
        }
        if self.is_promotable_to(a, b) {
            return Some(b);
        }
        if self.is_promotable_to(b, a) {
            return Some(a);
        }
        match (&*self.get(a), &*self.get(b)) {
            (TypeKind::Entity(_), TypeKind::Entity(_)) => {
                // Walk a's ancestors; the first one b is a subtype of wins.
                let mut cursor = self.base_type(a);
                while let Some(candidate) = cursor {
                    if self.is_subtype_of(b, candidate) {
                        return Some(candidate);
                    }
                    cursor = self.base_type(candidate);
                }
                None
            }
            (TypeKind::Ref(x), TypeKind::Ref(y)) => {
                self.common_type(*x, *y).map(|t| self.ref_of(t))
            }
            (TypeKind::Collection(x), TypeKind::Collection(y)) => {
                self.common_type(*x, *y).map(|t| self.collection_of(t))
            }
            (TypeKind::Row(xs), TypeKind::Row(ys)) if xs.len() == ys.len() => {
                let mut merged = Vec::with_capacity(xs.len());
                for (x, y) in xs.iter().zip(ys) {
                    if x.name != y.name {
                        return None;
                    }
                    let ty = self.common_type(x.ty, y.ty)?;
                    merged.push(Property {
                        name: x.name.clone(),
                        ty,
                        nullable: x.nullable || y.nullable,
                    });
                }
                Some(self.row_type(merged))
            }
            _ => None,
        }
    }

    // ------------------------------------------------------------------------
    // Extents and relationships
    // ------------------------------------------------------------------------

    pub fn define_extent(&self, name: &str, element_type: TypeUsage) -> Result<ExtentId> {
        let mut inner = self.inner.write();
        if inner.extents_by_name.contains_key(name) {
            return Err(MetadataError::DuplicateExtent(name.to_string()));
        }
        let id = ExtentId::new(inner.extents.len() as u32);
        inner.extents.push(Extent {
            id,
            name: name.to_string(),
            element_type,
        });
        inner.extents_by_name.insert(name.to_string(), id);
        Ok(id)
    }

    pub fn extent(&self, id: ExtentId) -> Extent {
        let inner = self.inner.read();
        match inner.extents.get(id.raw() as usize) {
            Some(extent) => extent.clone(),
            None => panic!("extent #{} does not belong to this workspace", id.raw()),
        }
    }

    pub fn extent_by_name(&self, name: &str) -> Option<ExtentId> {
        self.inner.read().extents_by_name.get(name).copied()
    }

    pub fn define_relationship(
        &self,
        name: &str,
        ends: [RelationshipEnd; 2],
    ) -> Result<RelationshipId> {
        let mut inner = self.inner.write();
        if inner.relationships_by_name.contains_key(name) {
            return Err(MetadataError::DuplicateRelationship(name.to_string()));
        }
        let id = RelationshipId::new(inner.relationships.len() as u32);
        inner.relationships.push(Arc::new(Relationship {
            id,
            name: name.to_string(),
            ends,
        }));
        inner.relationships_by_name.insert(name.to_string(), id);
        Ok(id)
    }

    pub fn relationship(&self, id: RelationshipId) -> Arc<Relationship> {
        let inner = self.inner.read();
        match inner.relationships.get(id.raw() as usize) {
            Some(rel) => Arc::clone(rel),
            None => panic!("relationship #{} does not belong to this workspace", id.raw()),
        }
    }

    pub fn relationship_by_name(&self, name: &str) -> Option<RelationshipId> {
        self.inner.read().relationships_by_name.get(name).copied()
    }
}

impl Default for MetadataWorkspace {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for MetadataWorkspace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.read();
        f.debug_struct("MetadataWorkspace")
            .field("types", &inner.types.len())
            .field("extents", &inner.extents.len())
            .field("relationships", &inner.relationships.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn people(md: &MetadataWorkspace) -> (TypeUsage, TypeUsage, TypeUsage) {
        let int32 = md.primitive(PrimitiveKind::Int32).unwrap();
        let string = md.primitive(PrimitiveKind::String).unwrap();
        let person = md
            .define_entity_type(
                "Person",
                None,
                vec![Property::new("Id", int32).non_nullable(), Property::new("Name", string)],
                &["Id"],
            )
            .unwrap();
        let student = md
            .define_entity_type("Student", Some(person), vec![Property::new("School", string)], &[])
            .unwrap();
        let employee = md
            .define_entity_type("Employee", Some(person), vec![Property::new("Title", string)], &[])
            .unwrap();
        (person, student, employee)
    }

    #[test]
    fn anonymous_types_are_interned() {
        let md = MetadataWorkspace::new();
        let int32 = md.primitive(PrimitiveKind::Int32).unwrap();
        let a = md.row_type(vec![Property::new("x", int32)]);
        let b = md.row_type(vec![Property::new("x", int32)]);
        assert_eq!(a, b);
        assert_eq!(md.collection_of(a), md.collection_of(b));
        assert_ne!(md.collection_of(a), a);
    }

    #[test]
    fn duplicate_declared_name_is_rejected() {
        let md = MetadataWorkspace::new();
        md.define_complex_type("Address", vec![]).unwrap();
        assert_eq!(
            md.define_complex_type("Address", vec![]),
            Err(MetadataError::DuplicateType("Address".to_string()))
        );
    }

    #[test]
    fn subtype_inherits_properties_and_keys() {
        let md = MetadataWorkspace::new();
        let (_, student, _) = people(&md);
        let names: Vec<String> = md.properties(student).into_iter().map(|p| p.name).collect();
        assert_eq!(names, vec!["Id", "Name", "School"]);
        assert_eq!(md.key_members(student), vec!["Id".to_string()]);
    }

    #[test]
    fn common_type_of_siblings_is_their_base() {
        let md = MetadataWorkspace::new();
        let (person, student, employee) = people(&md);
        assert_eq!(md.common_type(student, employee), Some(person));
        assert_eq!(md.common_type(student, person), Some(person));
        assert_eq!(
            md.common_type(md.ref_of(student), md.ref_of(employee)),
            Some(md.ref_of(person))
        );
    }

    #[test]
    fn numeric_widening() {
        let md = MetadataWorkspace::new();
        let int16 = md.primitive(PrimitiveKind::Int16).unwrap();
        let int64 = md.primitive(PrimitiveKind::Int64).unwrap();
        let string = md.primitive(PrimitiveKind::String).unwrap();
        assert_eq!(md.common_type(int16, int64), Some(int64));
        assert_eq!(md.common_type(int64, int16), Some(int64));
        assert_eq!(md.common_type(int16, string), None);
    }

    #[test]
    fn unknown_key_member_is_rejected() {
        let md = MetadataWorkspace::new();
        let err = md.define_entity_type("Thing", None, vec![], &["Missing"]).unwrap_err();
        assert!(matches!(err, MetadataError::UnknownProperty { .. }));
    }
}
