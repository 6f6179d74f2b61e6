//! Derived per-node facts used by analysis and rewrite passes.
//!
//! Facts are computed bottom-up on demand and cached per node id. The cache
//! does not track parents: after editing a subtree, a rewrite calls
//! [`Command::recompute_node_info`] on each edited node from the bottom up
//! (or [`Command::invalidate_node_info`] to drop everything).

use querytree_md::TypeUsage;

use crate::command::Command;
use crate::error::contract_violation;
use crate::node::NodeId;
use crate::ops::{Op, OpCategory};
use crate::var_vec::VarVec;

/// Key columns of a relational node's output, or `no_keys` when no set of
/// output vars is known to be unique.
#[derive(Debug, Clone, PartialEq)]
pub struct KeyVec {
    keys: VarVec,
    no_keys: bool,
}

impl KeyVec {
    pub fn new(keys: VarVec) -> Self {
        Self {
            keys,
            no_keys: false,
        }
    }

    pub fn none() -> Self {
        Self {
            keys: VarVec::new(),
            no_keys: true,
        }
    }

    pub fn keys(&self) -> &VarVec {
        &self.keys
    }

    pub fn no_keys(&self) -> bool {
        self.no_keys
    }

    /// Keys of a product of inputs: the union, if every input has keys.
    fn combine<'a>(parts: impl IntoIterator<Item = &'a KeyVec>) -> Self {
        let mut out = KeyVec::new(VarVec::new());
        for part in parts {
            if part.no_keys {
                return KeyVec::none();
            }
            out.keys.or(&part.keys);
        }
        out
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NodeInfo {
    /// Vars produced by this node (relational) or defined by it (ancillary).
    pub definitions: VarVec,
    /// Vars referenced in the subtree but defined outside it.
    pub external_references: VarVec,
    pub keys: KeyVec,
    pub result_type: Option<TypeUsage>,
}

impl NodeInfo {
    /// No definitions, no references, no keys.
    fn empty() -> Self {
        Self {
            definitions: VarVec::new(),
            external_references: VarVec::new(),
            keys: KeyVec::none(),
            result_type: None,
        }
    }
}

fn union(a: &VarVec, b: &VarVec) -> VarVec {
    let mut out = a.clone();
    out.or(b);
    out
}

fn minus(a: &VarVec, b: &VarVec) -> VarVec {
    let mut out = a.clone();
    out.minus(b);
    out
}

impl Command {
    /// Cached facts for `id`, computing them (and any missing facts below
    /// it) first if needed.
    ///
    /// The walk is an explicit post-order stack, so tree depth is bounded by
    /// heap rather than by the thread's stack.
    pub fn node_info(&mut self, id: NodeId) -> &NodeInfo {
        self.check_node(id);
        let mut stack = vec![(id, false)];
        while let Some((node, expanded)) = stack.pop() {
            if self.node_info[node.index()].is_some() {
                continue;
            }
            if expanded {
                let info = self.compute_node_info(node);
                self.node_info[node.index()] = Some(info);
                continue;
            }
            stack.push((node, true));
            for &child in self.children(node) {
                if self.node_info[child.index()].is_none() {
                    stack.push((child, false));
                }
            }
        }
        self.cached_node_info(id)
    }

    /// Re-derive facts for `id` alone, reusing the children's cached facts.
    pub fn recompute_node_info(&mut self, id: NodeId) -> &NodeInfo {
        self.check_node(id);
        self.node_info[id.index()] = None;
        self.node_info(id)
    }

    pub fn invalidate_node_info(&mut self) {
        self.node_info.iter_mut().for_each(|slot| *slot = None);
    }

    fn cached_node_info(&self, id: NodeId) -> &NodeInfo {
        match &self.node_info[id.index()] {
            Some(info) => info,
            None => contract_violation(format_args!("node info for {id} was not derived")),
        }
    }

    /// Facts for `id` from its children's cached facts, which must exist.
    fn compute_node_info(&self, id: NodeId) -> NodeInfo {
        let kids: Vec<&NodeInfo> = self
            .children(id)
            .iter()
            .map(|&child| self.cached_node_info(child))
            .collect();

        // Scalar and ancillary ops share one rule: references flow up,
        // definitions only from VarDef/VarDefList.
        let op = self.op(id);
        let category = op.op_type().category();
        if category != OpCategory::Relational {
            let mut info = NodeInfo {
                result_type: op.result_type(),
                ..NodeInfo::empty()
            };
            for kid in &kids {
                info.external_references.or(&kid.external_references);
                if category == OpCategory::Ancillary {
                    info.definitions.or(&kid.definitions);
                }
            }
            match op {
                Op::VarRef { var, .. } => info.external_references.set(*var),
                Op::VarDef { var } => info.definitions.set(*var),
                _ => {}
            }
            return info;
        }

        let mut info = NodeInfo::empty();
        match op {
            Op::ScanTable { table } | Op::ScanView { table } => {
                let table = self.table(*table);
                info.definitions = table.referenced_columns().clone();
                info.keys = match op {
                    Op::ScanTable { .. } if table.has_complete_keys() => {
                        KeyVec::new(table.keys().clone())
                    }
                    _ => KeyVec::none(),
                };
                if let Some(input) = kids.first() {
                    info.external_references = input.external_references.clone();
                }
            }
            Op::Unnest { var, table } => {
                info.definitions = self.table(*table).referenced_columns().clone();
                let mut refs = kids[0].external_references.clone();
                refs.set(*var);
                info.external_references = minus(&refs, &kids[0].definitions);
            }
            Op::Filter => {
                let (input, predicate) = (kids[0], kids[1]);
                info.definitions = input.definitions.clone();
                info.external_references = union(
                    &input.external_references,
                    &minus(&predicate.external_references, &input.definitions),
                );
                info.keys = input.keys.clone();
            }
            Op::Project { outputs } => {
                let (input, defs) = (kids[0], kids[1]);
                info.definitions = outputs.clone();
                info.external_references = union(
                    &input.external_references,
                    &minus(&defs.external_references, &input.definitions),
                );
                if !input.keys.no_keys() && outputs.subsumes(input.keys.keys()) {
                    info.keys = input.keys.clone();
                }
            }
            Op::InnerJoin | Op::LeftOuterJoin | Op::FullOuterJoin => {
                let (left, right, predicate) = (kids[0], kids[1], kids[2]);
                let defined = union(&left.definitions, &right.definitions);
                let mut refs = union(&left.external_references, &right.external_references);
                refs.or(&minus(&predicate.external_references, &defined));
                info.definitions = defined;
                info.external_references = refs;
                info.keys = KeyVec::combine([&left.keys, &right.keys]);
            }
            Op::CrossJoin => {
                for kid in &kids {
                    info.definitions.or(&kid.definitions);
                    info.external_references.or(&kid.external_references);
                }
                info.keys = KeyVec::combine(kids.iter().copied().map(|k| &k.keys));
            }
            Op::CrossApply | Op::OuterApply => {
                let (left, right) = (kids[0], kids[1]);
                info.definitions = union(&left.definitions, &right.definitions);
                info.external_references = union(
                    &left.external_references,
                    &minus(&right.external_references, &left.definitions),
                );
                info.keys = KeyVec::combine([&left.keys, &right.keys]);
            }
            Op::UnionAll(body) | Op::Intersect(body) | Op::Except(body) => {
                info.definitions = body.outputs.clone();
                info.external_references =
                    union(&kids[0].external_references, &kids[1].external_references);
                if !matches!(op, Op::UnionAll(_)) {
                    info.keys = KeyVec::new(body.outputs.clone());
                }
            }
            Op::Distinct { keys } => {
                info.definitions = keys.clone();
                info.external_references = kids[0].external_references.clone();
                info.keys = KeyVec::new(keys.clone());
            }
            Op::Sort { .. } | Op::ConstrainedSort { .. } | Op::SingleRow => {
                let input = kids[0];
                info.definitions = input.definitions.clone();
                info.external_references = input.external_references.clone();
                for rest in &kids[1..] {
                    info.external_references.or(&rest.external_references);
                }
                info.keys = input.keys.clone();
            }
            Op::GroupBy { keys, outputs } => {
                let input = kids[0];
                info.definitions = outputs.clone();
                let inner = union(&kids[1].external_references, &kids[2].external_references);
                info.external_references =
                    union(&input.external_references, &minus(&inner, &input.definitions));
                info.keys = KeyVec::new(keys.clone());
            }
            Op::SingleRowTable => {
                // One row: the empty set is a key.
                info.keys = KeyVec::new(VarVec::new());
            }
            other => unreachable!("{:?} is not relational", other.op_type()),
        }
        info
    }

    /// Relational nodes under `root` (inclusive) in post-order, each once.
    fn relational_post_order(&self, root: NodeId) -> Vec<NodeId> {
        let mut order = Vec::new();
        let mut seen = vec![false; self.node_count()];
        let mut stack = vec![(root, false)];
        while let Some((node, expanded)) = stack.pop() {
            if expanded {
                order.push(node);
                continue;
            }
            if seen[node.index()] {
                continue;
            }
            seen[node.index()] = true;
            stack.push((node, true));
            for &child in self.children(node).iter().rev() {
                if !seen[child.index()] && self.op(child).op_type().is_relational() {
                    stack.push((child, false));
                }
            }
        }
        order
    }

    /// Make the keys of every relational node under `id` visible at `id`.
    ///
    /// Scans bind vars for unreferenced key columns; projects that drop
    /// their input's keys get those key vars added to their outputs. Facts
    /// of every touched node are recomputed, children before parents.
    pub fn pull_up_keys(&mut self, id: NodeId) -> KeyVec {
        if !self.op(id).op_type().is_relational() {
            return KeyVec::none();
        }
        for node in self.relational_post_order(id) {
            match self.op(node) {
                Op::ScanTable { table } => {
                    let table = *table;
                    let key_columns = self.table(table).md().keys().to_vec();
                    for column in key_columns {
                        self.create_column_var(table, column);
                    }
                }
                Op::Project { .. } => {
                    let input = self.children(node)[0];
                    let input_keys = self.node_info(input).keys.clone();
                    if let Op::Project { outputs } = self.node_mut(node).op_mut() {
                        if !input_keys.no_keys() && !outputs.subsumes(input_keys.keys()) {
                            outputs.or(input_keys.keys());
                            tracing::trace!(node = node.raw(), "added key vars to project outputs");
                        }
                    }
                }
                _ => {}
            }
            self.recompute_node_info(node);
        }
        self.node_info(id).keys.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ops::ComparisonKind;
    use querytree_md::{MetadataWorkspace, Property};
    use std::sync::Arc;

    struct Fixture {
        cmd: Command,
        scan: NodeId,
        id: crate::var::Var,
        name: crate::var::Var,
    }

    fn people() -> Fixture {
        let mut cmd = Command::new(Arc::new(MetadataWorkspace::new())).unwrap();
        let int = cmd.integer_type();
        let string = cmd.string_type();
        let md = cmd.create_flat_table_definition(
            vec![Property::new("Id", int).non_nullable(), Property::new("Name", string)],
            &["Id"],
            None,
        );
        let table = cmd.create_table_instance(md);
        let id = cmd.create_column_var(table, 0);
        let name = cmd.create_column_var(table, 1);
        let op = cmd.create_scan_table_op(table);
        let scan = cmd.create_node(op, []);
        Fixture { cmd, scan, id, name }
    }

    #[test]
    fn filter_references_outer_param() {
        let Fixture {
            mut cmd, scan, name, ..
        } = people();
        let string = cmd.string_type();
        let param = cmd.create_parameter_var("p", string).unwrap();

        let lhs = cmd.create_var_ref_op(name);
        let lhs = cmd.create_node(lhs, []);
        let rhs = cmd.create_var_ref_op(param);
        let rhs = cmd.create_node(rhs, []);
        let pred = cmd.build_comparison(ComparisonKind::Eq, lhs, rhs).unwrap();
        let filter = cmd.create_node(Op::Filter, [scan, pred]);

        let info = cmd.node_info(filter).clone();
        assert!(info.definitions.is_set(name));
        assert!(info.external_references.is_set(param));
        assert!(!info.external_references.is_set(name));
        assert!(!info.keys.no_keys());
    }

    #[test]
    fn project_dropping_keys_has_none_until_pulled_up() {
        let Fixture {
            mut cmd,
            scan,
            id,
            name,
        } = people();
        let outputs = cmd.create_var_vec_from(name);
        let defs = cmd.create_node(Op::VarDefList, []);
        let project = cmd.create_node(Op::Project { outputs }, [scan, defs]);

        assert!(cmd.node_info(project).keys.no_keys());

        let keys = cmd.pull_up_keys(project);
        assert!(!keys.no_keys());
        assert!(keys.keys().is_set(id));
        let Op::Project { outputs } = cmd.op(project) else {
            panic!("expected project");
        };
        assert!(outputs.is_set(id));
    }

    #[test]
    fn pull_up_binds_unreferenced_key_columns() {
        let mut cmd = Command::new(Arc::new(MetadataWorkspace::new())).unwrap();
        let int = cmd.integer_type();
        let md = cmd.create_flat_table_definition(
            vec![Property::new("Id", int), Property::new("Qty", int)],
            &["Id"],
            None,
        );
        let table = cmd.create_table_instance(md);
        cmd.create_column_var(table, 1);
        let op = cmd.create_scan_table_op(table);
        let scan = cmd.create_node(op, []);

        assert!(cmd.node_info(scan).keys.no_keys());
        let keys = cmd.pull_up_keys(scan);
        let key_var = cmd.table(table).column_var(0).unwrap();
        assert!(keys.keys().is_set(key_var));
        assert_eq!(cmd.table(table).columns().len(), 2);
    }

    #[test]
    fn union_all_has_no_keys() {
        let Fixture { mut cmd, scan, id, .. } = people();
        let (union, _) = cmd
            .build_union_all_ladder(&[scan, scan], &[vec![id], vec![id]])
            .unwrap();
        assert!(cmd.node_info(union).keys.no_keys());
    }
}
