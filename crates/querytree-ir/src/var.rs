//! Variables.
//!
//! A [`Var`] is a copyable handle; the data behind it lives in the owning
//! Command. Ids are allocated from one monotonic counter shared by all four
//! kinds, so a handle is never reissued for a different logical variable.

use querytree_md::TypeUsage;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::table::TableId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(transparent)]
pub struct Var(u32);

impl Var {
    pub(crate) const fn new(id: u32) -> Self {
        Self(id)
    }

    pub const fn id(self) -> u32 {
        self.0
    }
}

impl std::fmt::Display for Var {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "v{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VarKind {
    Parameter { name: String },
    /// `column` indexes into the table's `TableMd::columns`.
    Column { table: TableId, column: usize },
    Computed,
    SetOp,
}

impl VarKind {
    pub fn label(&self) -> &'static str {
        match self {
            VarKind::Parameter { .. } => "Parameter",
            VarKind::Column { .. } => "Column",
            VarKind::Computed => "Computed",
            VarKind::SetOp => "SetOp",
        }
    }
}

/// Type slot of a var. `NotValid` marks a var superseded by a replacement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VarType {
    Valid(TypeUsage),
    NotValid,
}

#[derive(Debug, Clone)]
pub struct VarData {
    var: Var,
    kind: VarKind,
    ty: VarType,
}

impl VarData {
    pub(crate) fn new(var: Var, kind: VarKind, ty: TypeUsage) -> Self {
        Self {
            var,
            kind,
            ty: VarType::Valid(ty),
        }
    }

    pub fn var(&self) -> Var {
        self.var
    }

    pub fn kind(&self) -> &VarKind {
        &self.kind
    }

    /// Only reachable for valid vars; lookups refuse invalid ones.
    pub fn ty(&self) -> TypeUsage {
        match self.ty {
            VarType::Valid(ty) => ty,
            VarType::NotValid => crate::error::contract_violation(format_args!(
                "type of invalidated var {}",
                self.var
            )),
        }
    }

    pub fn is_valid(&self) -> bool {
        matches!(self.ty, VarType::Valid(_))
    }

    pub(crate) fn type_state(&self) -> VarType {
        self.ty
    }

    pub(crate) fn invalidate(&mut self) {
        self.ty = VarType::NotValid;
    }

    pub fn parameter_name(&self) -> Option<&str> {
        match &self.kind {
            VarKind::Parameter { name } => Some(name),
            _ => None,
        }
    }
}

/// Ordered var list (column order of a set-op input, project outputs, ...).
pub type VarList = Vec<Var>;

/// Maps a set-op output var to the var it draws from on one input.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VarMap(BTreeMap<Var, Var>);

impl VarMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, output: Var, input: Var) {
        self.0.insert(output, input);
    }

    pub fn get(&self, output: Var) -> Option<Var> {
        self.0.get(&output).copied()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Var, Var)> + '_ {
        self.0.iter().map(|(k, v)| (*k, *v))
    }

    pub fn outputs(&self) -> impl Iterator<Item = Var> + '_ {
        self.0.keys().copied()
    }

    pub fn inputs(&self) -> impl Iterator<Item = Var> + '_ {
        self.0.values().copied()
    }
}

impl FromIterator<(Var, Var)> for VarMap {
    fn from_iter<I: IntoIterator<Item = (Var, Var)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}
