//! The owning context of one IR graph.
//!
//! A [`Command`] owns every node, var, table and pooled set created for one
//! query compilation, and is the only way to create or replace any of them.
//! Id counters live here: node ids and var ids are arena slots, handed out
//! strictly increasing from zero and never reused.
//!
//! Op constructors live in `factory.rs`, derived tree builders in
//! `builders.rs`, and node-info derivation in `node_info.rs`; all of them are
//! `impl Command` blocks over the state defined here.

use ahash::AHashMap;
use querytree_md::{ExtentId, MetadataWorkspace, PrimitiveKind, Property, TypeKind, TypeUsage};
use std::collections::BTreeSet;
use std::sync::Arc;

use crate::config::CommandConfig;
use crate::error::{contract_violation, ir_assert, IrError, Result};
use crate::node::{Node, NodeId};
use crate::node_info::NodeInfo;
use crate::ops::{Arity, Op};
use crate::rel_property::RelProperty;
use crate::table::{ColumnMd, Table, TableId, TableMd};
use crate::var::{Var, VarData, VarKind, VarType};
use crate::var_vec::{Pool, PoolStats, VarVec, VarVecEnumerator};

/// Pool counters for both pools of a Command.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CommandPoolStats {
    pub var_vecs: PoolStats,
    pub enumerators: PoolStats,
}

pub struct Command {
    md: Arc<MetadataWorkspace>,
    config: CommandConfig,

    boolean_type: TypeUsage,
    integer_type: TypeUsage,
    string_type: TypeUsage,

    nodes: Vec<Node>,
    vars: Vec<VarData>,
    parameters: AHashMap<String, Var>,
    tables: Vec<Table>,
    root: Option<NodeId>,

    var_vec_pool: Pool<VarVec>,
    enumerator_pool: Pool<VarVecEnumerator>,

    rel_properties: BTreeSet<RelProperty>,
    /// Nodes whose op reads each table's columns.
    table_readers: AHashMap<TableId, Vec<NodeId>>,

    /// Indexed by node id; `None` means not computed (or invalidated).
    pub(crate) node_info: Vec<Option<NodeInfo>>,
}

impl Command {
    pub fn new(md: Arc<MetadataWorkspace>) -> Result<Self> {
        Self::with_config(md, CommandConfig::default())
    }

    /// Fails with [`IrError::IncompatibleProvider`] when the workspace lacks
    /// a boolean, 32-bit integer or string type.
    pub fn with_config(md: Arc<MetadataWorkspace>, config: CommandConfig) -> Result<Self> {
        let require = |kind: PrimitiveKind| {
            md.primitive(kind)
                .ok_or(IrError::IncompatibleProvider { missing: kind })
        };
        let boolean_type = require(PrimitiveKind::Boolean)?;
        let integer_type = require(PrimitiveKind::Int32)?;
        let string_type = require(PrimitiveKind::String)?;

        tracing::debug!(
            var_vec_pooling = config.var_vec_pooling,
            enumerator_pooling = config.enumerator_pooling,
            "created command"
        );

        Ok(Self {
            var_vec_pool: Pool::new(config.var_vec_pooling, config.max_pooled),
            enumerator_pool: Pool::new(config.enumerator_pooling, config.max_pooled),
            md,
            config,
            boolean_type,
            integer_type,
            string_type,
            nodes: Vec::new(),
            vars: Vec::new(),
            parameters: AHashMap::new(),
            tables: Vec::new(),
            root: None,
            rel_properties: BTreeSet::new(),
            table_readers: AHashMap::new(),
            node_info: Vec::new(),
        })
    }

    pub fn metadata(&self) -> &Arc<MetadataWorkspace> {
        &self.md
    }

    pub fn config(&self) -> &CommandConfig {
        &self.config
    }

    pub fn boolean_type(&self) -> TypeUsage {
        self.boolean_type
    }

    pub fn integer_type(&self) -> TypeUsage {
        self.integer_type
    }

    pub fn string_type(&self) -> TypeUsage {
        self.string_type
    }

    /// The one type-equality test used by every builder. Types are interned
    /// by the workspace, so this is handle identity.
    pub fn equal_types(a: TypeUsage, b: TypeUsage) -> bool {
        a == b
    }

    pub fn root(&self) -> Option<NodeId> {
        self.root
    }

    pub fn set_root(&mut self, root: NodeId) {
        self.check_node(root);
        self.root = Some(root);
    }

    // ========================================================================
    // Nodes
    // ========================================================================

    /// Create a node. The child count must match the op's fixed arity.
    ///
    /// Navigate and RelProperty ops record their relationship properties
    /// here, however the op was built.
    #[track_caller]
    pub fn create_node(&mut self, op: Op, children: impl IntoIterator<Item = NodeId>) -> NodeId {
        let children: Vec<NodeId> = children.into_iter().collect();
        if let Arity::Fixed(expected) = op.arity() {
            ir_assert!(
                children.len() == expected,
                "{:?} expects {expected} children, got {}",
                op.op_type(),
                children.len()
            );
        }
        for &child in &children {
            self.check_node(child);
        }

        let id = NodeId::new(self.nodes.len() as u32);
        tracing::trace!(node = id.raw(), op = ?op.op_type(), "create node");
        self.register_op(id, &op);
        self.nodes.push(Node::new(id, op, children));
        self.node_info.push(None);
        id
    }

    /// Swap the op of an existing node in place. The new op must accept the
    /// node's current child count. Cached node info for `id` is dropped.
    #[track_caller]
    pub fn set_op(&mut self, id: NodeId, op: Op) {
        self.check_node(id);
        let count = self.nodes[id.index()].child_count();
        if let Arity::Fixed(expected) = op.arity() {
            ir_assert!(
                count == expected,
                "{:?} expects {expected} children, node {id} has {count}",
                op.op_type()
            );
        }
        tracing::trace!(node = id.raw(), op = ?op.op_type(), "set op");
        self.register_op(id, &op);
        self.node_mut(id).set_op(op);
    }

    /// Bookkeeping every new op of node `id` goes through.
    fn register_op(&mut self, id: NodeId, op: &Op) {
        match op {
            Op::Navigate { property, .. } => {
                self.add_rel_property_reference(property.clone());
                self.add_rel_property_reference(property.inverse());
            }
            Op::RelProperty { property, .. } => {
                self.add_rel_property_reference(property.clone());
            }
            Op::ScanTable { table } | Op::ScanView { table } | Op::Unnest { table, .. } => {
                self.table_readers.entry(*table).or_default().push(id);
            }
            _ => {}
        }
    }

    #[track_caller]
    pub(crate) fn check_node(&self, id: NodeId) {
        ir_assert!(
            id.index() < self.nodes.len(),
            "node {id} does not belong to this command"
        );
    }

    #[track_caller]
    pub fn node(&self, id: NodeId) -> &Node {
        self.check_node(id);
        &self.nodes[id.index()]
    }

    /// Mutable access for rewrites. Cached node info for `id` is dropped;
    /// callers re-derive ancestors with `recompute_node_info`.
    #[track_caller]
    pub fn node_mut(&mut self, id: NodeId) -> &mut Node {
        self.check_node(id);
        self.node_info[id.index()] = None;
        &mut self.nodes[id.index()]
    }

    pub fn op(&self, id: NodeId) -> &Op {
        self.node(id).op()
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.node(id).children()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.iter()
    }

    /// Replace one child in place; the parent keeps its id.
    #[track_caller]
    pub fn replace_child(&mut self, parent: NodeId, index: usize, child: NodeId) {
        self.check_node(child);
        let node = self.node_mut(parent);
        ir_assert!(
            index < node.child_count(),
            "node {parent} has no child at index {index}"
        );
        node.children_mut()[index] = child;
    }

    /// Result type of a scalar node. Panics for relational/ancillary nodes.
    #[track_caller]
    pub fn node_type(&self, id: NodeId) -> TypeUsage {
        match self.op(id).result_type() {
            Some(ty) => ty,
            None => contract_violation(format_args!(
                "node {id} ({:?}) is not a scalar",
                self.op(id).op_type()
            )),
        }
    }

    // ========================================================================
    // Vars
    // ========================================================================

    fn push_var(&mut self, kind: VarKind, ty: TypeUsage) -> Var {
        let var = Var::new(self.vars.len() as u32);
        tracing::trace!(var = var.id(), kind = kind.label(), "create var");
        self.vars.push(VarData::new(var, kind, ty));
        var
    }

    pub fn create_parameter_var(&mut self, name: &str, ty: TypeUsage) -> Result<Var> {
        if self.parameters.contains_key(name) {
            return Err(IrError::DuplicateParameter(name.to_string()));
        }
        let var = self.push_var(
            VarKind::Parameter {
                name: name.to_string(),
            },
            ty,
        );
        self.parameters.insert(name.to_string(), var);
        Ok(var)
    }

    /// Var for one column of a table instance. A column is bound to at most
    /// one var; asking again returns the existing one.
    ///
    /// Binding a new column drops the cached node info of every node that
    /// reads the table. Cached facts of their ancestors are left alone;
    /// rewrites re-derive those with `recompute_node_info`.
    #[track_caller]
    pub fn create_column_var(&mut self, table: TableId, column: usize) -> Var {
        let t = self.table(table);
        if let Some(existing) = t.column_var(column) {
            return existing;
        }
        let ty = match t.md().column(column) {
            Some(col) => col.ty,
            None => contract_violation(format_args!("table {table} has no column {column}")),
        };
        let var = self.push_var(VarKind::Column { table, column }, ty);
        self.tables[table.raw() as usize].bind_column(column, var);
        if let Some(readers) = self.table_readers.get(&table) {
            for reader in readers {
                self.node_info[reader.index()] = None;
            }
        }
        var
    }

    /// Column var looked up by column name.
    #[track_caller]
    pub fn create_column_var_by_name(&mut self, table: TableId, name: &str) -> Var {
        match self.table(table).md().column_index(name) {
            Some(column) => self.create_column_var(table, column),
            None => contract_violation(format_args!("table {table} has no column `{name}`")),
        }
    }

    pub fn create_computed_var(&mut self, ty: TypeUsage) -> Var {
        self.push_var(VarKind::Computed, ty)
    }

    pub fn create_set_op_var(&mut self, ty: TypeUsage) -> Var {
        self.push_var(VarKind::SetOp, ty)
    }

    /// Supersede a parameter var with a new one whose type is
    /// `transform(old_type)`. The name now resolves to the new var and the
    /// old var is invalid from here on.
    #[track_caller]
    pub fn replace_parameter_var(
        &mut self,
        old: Var,
        transform: impl FnOnce(&MetadataWorkspace, TypeUsage) -> TypeUsage,
    ) -> Var {
        let (name, old_ty) = {
            let data = self.var(old);
            match data.parameter_name() {
                Some(name) => (name.to_string(), data.ty()),
                None => contract_violation(format_args!("{old} is not a parameter var")),
            }
        };
        let new_ty = transform(self.md.as_ref(), old_ty);
        let new = self.push_var(VarKind::Parameter { name: name.clone() }, new_ty);
        self.parameters.insert(name.clone(), new);
        self.vars[old.id() as usize].invalidate();

        tracing::debug!(
            parameter = %name,
            old = old.id(),
            new = new.id(),
            "replaced parameter var"
        );
        new
    }

    /// Replace an enum-typed parameter by one of the enum's underlying type.
    #[track_caller]
    pub fn replace_enum_parameter_var(&mut self, old: Var) -> Var {
        self.replace_parameter_var(old, |md, ty| match &*md.get(ty) {
            TypeKind::Enum { underlying, .. } => match md.primitive(*underlying) {
                Some(prim) => prim,
                None => contract_violation(format_args!(
                    "underlying type {} of enum is not available",
                    underlying.name()
                )),
            },
            _ => contract_violation(format_args!("{} is not an enum type", md.type_name(ty))),
        })
    }

    /// Look up a valid var. Panics for ids from another command and for
    /// vars that were replaced.
    #[track_caller]
    pub fn var(&self, var: Var) -> &VarData {
        match self.vars.get(var.id() as usize) {
            Some(data) if data.is_valid() => data,
            Some(_) => contract_violation(format_args!("{var} was replaced and is no longer valid")),
            None => contract_violation(format_args!("{var} does not belong to this command")),
        }
    }

    pub fn try_var(&self, var: Var) -> Option<&VarData> {
        self.vars.get(var.id() as usize).filter(|d| d.is_valid())
    }

    #[track_caller]
    pub fn var_type(&self, var: Var) -> TypeUsage {
        self.var(var).ty()
    }

    /// Raw type slot, including the `NotValid` marker of replaced vars.
    #[track_caller]
    pub fn var_type_state(&self, var: Var) -> VarType {
        match self.vars.get(var.id() as usize) {
            Some(data) => data.type_state(),
            None => contract_violation(format_args!("{var} does not belong to this command")),
        }
    }

    /// All valid vars in id order.
    pub fn vars(&self) -> impl Iterator<Item = &VarData> {
        self.vars.iter().filter(|d| d.is_valid())
    }

    /// Number of var ids handed out so far (valid or not).
    pub fn var_id_count(&self) -> usize {
        self.vars.len()
    }

    pub fn parameter(&self, name: &str) -> Result<Var> {
        self.parameters
            .get(name)
            .copied()
            .ok_or_else(|| IrError::UnknownParameter(name.to_string()))
    }

    pub fn parameters(&self) -> impl Iterator<Item = (&str, Var)> {
        self.parameters.iter().map(|(k, v)| (k.as_str(), *v))
    }

    // ========================================================================
    // VarVec pool
    // ========================================================================

    /// Check out an empty set. Hand it back with [`Command::release_var_vec`].
    pub fn create_var_vec(&mut self) -> VarVec {
        let vec = self.var_vec_pool.checkout();
        debug_assert!(vec.is_empty());
        tracing::trace!(checkouts = self.var_vec_pool.stats().checkouts, "checked out var vec");
        vec
    }

    pub fn create_var_vec_from(&mut self, var: Var) -> VarVec {
        let mut vec = self.create_var_vec();
        vec.set(var);
        vec
    }

    pub fn create_var_vec_from_vars(&mut self, vars: impl IntoIterator<Item = Var>) -> VarVec {
        let mut vec = self.create_var_vec();
        vec.extend(vars);
        vec
    }

    pub fn create_var_vec_copy(&mut self, other: &VarVec) -> VarVec {
        let mut vec = self.create_var_vec();
        vec.init_from(other);
        vec
    }

    /// Return a set to the pool. The value is consumed.
    pub fn release_var_vec(&mut self, vec: VarVec) {
        tracing::trace!(count = vec.count(), "released var vec");
        self.var_vec_pool.release(vec);
    }

    pub fn var_vec_enumerator(&mut self, vec: &VarVec) -> VarVecEnumerator {
        let mut enumerator = self.enumerator_pool.checkout();
        enumerator.init(vec);
        enumerator
    }

    pub fn release_var_vec_enumerator(&mut self, enumerator: VarVecEnumerator) {
        self.enumerator_pool.release(enumerator);
    }

    pub fn pool_stats(&self) -> CommandPoolStats {
        CommandPoolStats {
            var_vecs: self.var_vec_pool.stats(),
            enumerators: self.enumerator_pool.stats(),
        }
    }

    // ========================================================================
    // Tables
    // ========================================================================

    /// Shape with a single `element` column of type `ty`, optionally backed
    /// by an extent.
    pub fn create_table_definition(&self, ty: TypeUsage, extent: Option<ExtentId>) -> Arc<TableMd> {
        let column = ColumnMd {
            name: "element".to_string(),
            ty,
            nullable: true,
        };
        let flattened = !self.md.is_structured(ty);
        Arc::new(TableMd::new(vec![column], Vec::new(), extent, flattened))
    }

    /// Flat shape with one column per property; `keys` name key columns.
    #[track_caller]
    pub fn create_flat_table_definition(
        &self,
        properties: Vec<Property>,
        keys: &[&str],
        extent: Option<ExtentId>,
    ) -> Arc<TableMd> {
        let columns: Vec<ColumnMd> = properties
            .into_iter()
            .map(|p| ColumnMd {
                name: p.name,
                ty: p.ty,
                nullable: p.nullable,
            })
            .collect();
        let key_indexes = keys
            .iter()
            .map(|key| match columns.iter().position(|c| c.name == *key) {
                Some(index) => index,
                None => contract_violation(format_args!("key `{key}` is not a column")),
            })
            .collect();
        Arc::new(TableMd::new(columns, key_indexes, extent, true))
    }

    /// Flat shape for every property of a structured type; entity key
    /// members become key columns.
    #[track_caller]
    pub fn create_flat_table_definition_for_type(
        &self,
        ty: TypeUsage,
        extent: Option<ExtentId>,
    ) -> Arc<TableMd> {
        ir_assert!(
            self.md.is_structured(ty),
            "{} is not a structured type",
            self.md.type_name(ty)
        );
        let keys = self.md.key_members(ty);
        let keys: Vec<&str> = keys.iter().map(String::as_str).collect();
        self.create_flat_table_definition(self.md.properties(ty), &keys, extent)
    }

    /// Bind a new table instance. No column vars are created here.
    pub fn create_table_instance(&mut self, md: Arc<TableMd>) -> TableId {
        let id = TableId::new(self.tables.len() as u32);
        tracing::debug!(table = id.raw(), columns = md.columns().len(), "created table instance");
        self.tables.push(Table::new(id, md));
        id
    }

    #[track_caller]
    pub fn table(&self, id: TableId) -> &Table {
        match self.tables.get(id.raw() as usize) {
            Some(table) => table,
            None => contract_violation(format_args!("table {id} does not belong to this command")),
        }
    }

    pub fn tables(&self) -> &[Table] {
        &self.tables
    }

    // ========================================================================
    // Relationship property references
    // ========================================================================

    pub(crate) fn add_rel_property_reference(&mut self, property: RelProperty) {
        if !self.config.track_rel_properties {
            return;
        }
        if self.rel_properties.insert(property.clone()) {
            tracing::trace!(%property, "referenced rel property");
        }
    }

    pub fn referenced_rel_properties(&self) -> &BTreeSet<RelProperty> {
        &self.rel_properties
    }

    pub fn is_rel_property_referenced(&self, property: &RelProperty) -> bool {
        self.rel_properties.contains(property)
    }
}

impl std::fmt::Debug for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Command")
            .field("nodes", &self.nodes.len())
            .field("vars", &self.vars.len())
            .field("tables", &self.tables.len())
            .field("root", &self.root)
            .finish()
    }
}
