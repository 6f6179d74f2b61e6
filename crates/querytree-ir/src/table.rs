//! Tables and table metadata.
//!
//! [`TableMd`] is a reusable row shape: columns, key columns, and (optionally)
//! the extent it reads from. A [`Table`] is one bound use of a shape inside a
//! Command. Column vars are created on demand, only for referenced columns.

use querytree_md::{ExtentId, TypeUsage};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::var::{Var, VarList};
use crate::var_vec::VarVec;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(transparent)]
pub struct TableId(u32);

impl TableId {
    pub(crate) const fn new(raw: u32) -> Self {
        Self(raw)
    }

    pub const fn raw(self) -> u32 {
        self.0
    }
}

impl std::fmt::Display for TableId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "t{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnMd {
    pub name: String,
    pub ty: TypeUsage,
    pub nullable: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableMd {
    columns: Vec<ColumnMd>,
    /// Indexes into `columns`.
    keys: Vec<usize>,
    extent: Option<ExtentId>,
    /// One column per property of the row type, rather than a single
    /// column holding the whole element.
    flattened: bool,
}

impl TableMd {
    pub(crate) fn new(
        columns: Vec<ColumnMd>,
        keys: Vec<usize>,
        extent: Option<ExtentId>,
        flattened: bool,
    ) -> Self {
        Self {
            columns,
            keys,
            extent,
            flattened,
        }
    }

    pub fn columns(&self) -> &[ColumnMd] {
        &self.columns
    }

    pub fn column(&self, index: usize) -> Option<&ColumnMd> {
        self.columns.get(index)
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    pub fn keys(&self) -> &[usize] {
        &self.keys
    }

    pub fn extent(&self) -> Option<ExtentId> {
        self.extent
    }

    pub fn is_flattened(&self) -> bool {
        self.flattened
    }
}

#[derive(Debug, Clone)]
pub struct Table {
    id: TableId,
    md: Arc<TableMd>,
    /// Referenced column vars, in creation order.
    columns: VarList,
    column_vars: Vec<Option<Var>>,
    referenced: VarVec,
    keys: VarVec,
    non_nullable: VarVec,
}

impl Table {
    pub(crate) fn new(id: TableId, md: Arc<TableMd>) -> Self {
        let width = md.columns.len();
        Self {
            id,
            md,
            columns: Vec::new(),
            column_vars: vec![None; width],
            referenced: VarVec::new(),
            keys: VarVec::new(),
            non_nullable: VarVec::new(),
        }
    }

    pub fn id(&self) -> TableId {
        self.id
    }

    pub fn md(&self) -> &Arc<TableMd> {
        &self.md
    }

    pub fn columns(&self) -> &[Var] {
        &self.columns
    }

    pub fn column_var(&self, column: usize) -> Option<Var> {
        self.column_vars.get(column).copied().flatten()
    }

    pub fn referenced_columns(&self) -> &VarVec {
        &self.referenced
    }

    /// Key column vars created so far.
    pub fn keys(&self) -> &VarVec {
        &self.keys
    }

    /// True once every key column of the shape has a var.
    pub fn has_complete_keys(&self) -> bool {
        !self.md.keys.is_empty() && self.md.keys.iter().all(|&k| self.column_vars[k].is_some())
    }

    pub fn non_nullable_columns(&self) -> &VarVec {
        &self.non_nullable
    }

    pub(crate) fn bind_column(&mut self, column: usize, var: Var) {
        self.column_vars[column] = Some(var);
        self.columns.push(var);
        self.referenced.set(var);
        if self.md.keys.contains(&column) {
            self.keys.set(var);
        }
        if !self.md.columns[column].nullable {
            self.non_nullable.set(var);
        }
    }
}
