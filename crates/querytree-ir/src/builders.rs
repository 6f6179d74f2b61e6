//! Derived tree builders.
//!
//! Multi-node shapes that translators and rewrites need over and over. Each
//! builder only goes through `create_node` and the var factories, so ids stay
//! dense and every minted var is fresh.

use querytree_md::TypeUsage;

use crate::command::Command;
use crate::error::{ir_assert, IrError, Result};
use crate::node::NodeId;
use crate::ops::ComparisonKind;
use crate::var::{Var, VarList, VarMap};

impl Command {
    /// `VarDef(expr)` defining a fresh computed var of the expression's type.
    #[track_caller]
    pub fn create_var_def_node(&mut self, expr: NodeId) -> (NodeId, Var) {
        let ty = self.node_type(expr);
        let var = self.create_computed_var(ty);
        let op = self.create_var_def_op(var);
        (self.create_node(op, [expr]), var)
    }

    /// `VarDefList` with one `VarDef` per expression, in order.
    #[track_caller]
    pub fn create_var_def_list_node(&mut self, exprs: &[NodeId]) -> (NodeId, VarList) {
        let mut defs = Vec::with_capacity(exprs.len());
        let mut vars = Vec::with_capacity(exprs.len());
        for &expr in exprs {
            let (def, var) = self.create_var_def_node(expr);
            defs.push(def);
            vars.push(var);
        }
        let op = self.create_var_def_list_op();
        (self.create_node(op, defs), vars)
    }

    /// `Project(input, VarDefList(...))` whose outputs are `pass_through`
    /// plus one fresh computed var per expression. Returns the computed vars
    /// in expression order.
    #[track_caller]
    pub fn build_project(
        &mut self,
        input: NodeId,
        pass_through: &[Var],
        exprs: &[NodeId],
    ) -> (NodeId, VarList) {
        let (defs, computed) = self.create_var_def_list_node(exprs);
        let mut outputs = self.create_var_vec_from_vars(pass_through.iter().copied());
        outputs.extend(computed.iter().copied());
        let op = self.create_project_op(outputs);
        let project = self.create_node(op, [input, defs]);
        tracing::trace!(node = project.raw(), computed = computed.len(), "built project");
        (project, computed)
    }

    /// Project exactly one computed expression.
    #[track_caller]
    pub fn build_project_single(&mut self, input: NodeId, expr: NodeId) -> (NodeId, Var) {
        let (project, vars) = self.build_project(input, &[], &[expr]);
        (project, vars[0])
    }

    /// `Project(input, VarDef(FakeTreat<desired>(VarRef(input_var))))`.
    ///
    /// The treat only re-asserts a type already guaranteed by a filter below;
    /// consumers must not execute it.
    #[track_caller]
    pub fn build_fake_treat_project(
        &mut self,
        input: NodeId,
        input_var: Var,
        desired: TypeUsage,
    ) -> (NodeId, Var) {
        let var_ref_op = self.create_var_ref_op(input_var);
        let var_ref = self.create_node(var_ref_op, []);
        let treat_op = self.create_fake_treat_op(desired);
        let treat = self.create_node(treat_op, [var_ref]);
        self.build_project_single(input, treat)
    }

    /// Rows of `input` whose `input_var` is of type `desired` (or exactly
    /// `desired` when `include_subtypes` is false), projected as `desired`.
    #[track_caller]
    pub fn build_of_type_tree(
        &mut self,
        input: NodeId,
        input_var: Var,
        desired: TypeUsage,
        include_subtypes: bool,
    ) -> (NodeId, Var) {
        let var_ref_op = self.create_var_ref_op(input_var);
        let var_ref = self.create_node(var_ref_op, []);
        let is_of = if include_subtypes {
            self.create_is_of_op(desired)
        } else {
            self.create_is_of_only_op(desired)
        };
        let predicate = self.create_node(is_of, [var_ref]);
        let filter_op = self.create_filter_op();
        let filter = self.create_node(filter_op, [input, predicate]);
        self.build_fake_treat_project(filter, input_var, desired)
    }

    /// Comparison of two scalars, soft-casting whichever operands are not
    /// already of their common type.
    #[track_caller]
    pub fn build_comparison(
        &mut self,
        kind: ComparisonKind,
        left: NodeId,
        right: NodeId,
    ) -> Result<NodeId> {
        let left_ty = self.node_type(left);
        let right_ty = self.node_type(right);
        let (mut left, mut right) = (left, right);

        if !Self::equal_types(left_ty, right_ty) {
            let common = self
                .metadata()
                .common_type(left_ty, right_ty)
                .ok_or_else(|| IrError::NoCommonType {
                    left: self.metadata().type_name(left_ty),
                    right: self.metadata().type_name(right_ty),
                })?;
            if !Self::equal_types(common, left_ty) {
                let cast = self.create_soft_cast_op(common);
                left = self.create_node(cast, [left]);
            }
            if !Self::equal_types(common, right_ty) {
                let cast = self.create_soft_cast_op(common);
                right = self.create_node(cast, [right]);
            }
        }

        let op = self.create_comparison_op(kind);
        Ok(self.create_node(op, [left, right]))
    }

    /// Left-deep UnionAll ladder over `inputs`.
    ///
    /// `input_vars[i]` lists the output columns of `inputs[i]`; all lists have
    /// the same length. Every level mints its own set-op vars. Returns `None`
    /// for no inputs and the single input unchanged for one.
    #[track_caller]
    pub fn build_union_all_ladder(
        &mut self,
        inputs: &[NodeId],
        input_vars: &[VarList],
    ) -> Option<(NodeId, VarList)> {
        ir_assert!(
            inputs.len() == input_vars.len(),
            "{} union inputs but {} var lists",
            inputs.len(),
            input_vars.len()
        );
        let (&first, rest) = inputs.split_first()?;
        let width = input_vars[0].len();
        ir_assert!(
            input_vars.iter().all(|vars| vars.len() == width),
            "union inputs expose different column counts"
        );

        let mut tree = first;
        let mut left_vars = input_vars[0].clone();
        for (offset, &input) in rest.iter().enumerate() {
            let right_vars = &input_vars[offset + 1];
            let mut left_map = VarMap::new();
            let mut right_map = VarMap::new();
            let mut level_vars = Vec::with_capacity(width);
            for column in 0..width {
                let ty = self.var_type(left_vars[column]);
                let out = self.create_set_op_var(ty);
                left_map.insert(out, left_vars[column]);
                right_map.insert(out, right_vars[column]);
                level_vars.push(out);
            }
            let op = self.create_union_all_op(left_map, right_map);
            tree = self.create_node(op, [tree, input]);
            left_vars = level_vars;
        }

        if !rest.is_empty() {
            tracing::debug!(
                inputs = inputs.len(),
                columns = width,
                root = tree.raw(),
                "built union-all ladder"
            );
        }
        Some((tree, left_vars))
    }

    /// Ladder over inputs that each expose exactly one var.
    #[track_caller]
    pub fn build_union_all_ladder_single(
        &mut self,
        inputs: &[NodeId],
        vars: &[Var],
    ) -> Option<(NodeId, Var)> {
        let lists: Vec<VarList> = vars.iter().map(|&v| vec![v]).collect();
        self.build_union_all_ladder(inputs, &lists)
            .map(|(node, out)| (node, out[0]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ops::{Op, OpType};
    use querytree_md::{MetadataWorkspace, PrimitiveKind, Property};
    use std::sync::Arc;

    fn command() -> Command {
        Command::new(Arc::new(MetadataWorkspace::new())).unwrap()
    }

    fn scan_one(cmd: &mut Command) -> (NodeId, Var) {
        let int = cmd.integer_type();
        let md = cmd.create_flat_table_definition(vec![Property::new("x", int)], &[], None);
        let table = cmd.create_table_instance(md);
        let var = cmd.create_column_var(table, 0);
        let op = cmd.create_scan_table_op(table);
        (cmd.create_node(op, []), var)
    }

    fn count(cmd: &Command, op_type: OpType) -> usize {
        cmd.nodes().filter(|n| n.op().op_type() == op_type).count()
    }

    #[test]
    fn ladder_of_zero_and_one() {
        let mut cmd = command();
        assert!(cmd.build_union_all_ladder(&[], &[]).is_none());

        let (scan, var) = scan_one(&mut cmd);
        let before = cmd.node_count();
        let (node, vars) = cmd.build_union_all_ladder(&[scan], &[vec![var]]).unwrap();
        assert_eq!(node, scan);
        assert_eq!(vars, vec![var]);
        assert_eq!(cmd.node_count(), before);
    }

    #[test]
    fn ladder_mints_fresh_vars_per_level() {
        let mut cmd = command();
        let inputs: Vec<(NodeId, Var)> = (0..3).map(|_| scan_one(&mut cmd)).collect();
        let nodes: Vec<NodeId> = inputs.iter().map(|(n, _)| *n).collect();
        let vars: Vec<Var> = inputs.iter().map(|(_, v)| *v).collect();

        let (root, out) = cmd.build_union_all_ladder_single(&nodes, &vars).unwrap();
        assert_eq!(count(&cmd, OpType::UnionAll), 2);
        assert!(!vars.contains(&out));

        let Op::UnionAll(top) = cmd.op(root) else {
            panic!("expected union all at the root");
        };
        assert_eq!(top.var_maps[1].get(out), Some(vars[2]));
        let lower_out = top.var_maps[0].get(out).unwrap();
        assert_ne!(lower_out, out);
        assert!(!vars.contains(&lower_out));
    }

    #[test]
    fn project_outputs_pass_through_and_computed() {
        let mut cmd = command();
        let (scan, x) = scan_one(&mut cmd);
        let one = cmd.create_constant_op(crate::ops::ConstantValue::Integer(1), cmd.integer_type());
        let one = cmd.create_node(one, []);

        let (project, computed) = cmd.build_project(scan, &[x], &[one]);
        let Op::Project { outputs } = cmd.op(project) else {
            panic!("expected project");
        };
        assert_eq!(outputs.count(), 2);
        assert!(outputs.is_set(x) && outputs.is_set(computed[0]));

        let defs = cmd.children(project)[1];
        assert_eq!(cmd.op(defs).op_type(), OpType::VarDefList);
        let def = cmd.children(defs)[0];
        assert_eq!(cmd.op(def), &Op::VarDef { var: computed[0] });
    }

    #[test]
    fn comparison_of_equal_types_has_no_casts() {
        let mut cmd = command();
        let int = cmd.integer_type();
        let a = cmd.create_node(Op::Null { ty: int }, []);
        let b = cmd.create_node(Op::Null { ty: int }, []);
        cmd.build_comparison(ComparisonKind::Eq, a, b).unwrap();
        assert_eq!(count(&cmd, OpType::SoftCast), 0);
    }

    #[test]
    fn comparison_widens_one_side() {
        let mut cmd = command();
        let int = cmd.integer_type();
        let long = cmd.metadata().primitive(PrimitiveKind::Int64).unwrap();
        let a = cmd.create_node(Op::Null { ty: int }, []);
        let b = cmd.create_node(Op::Null { ty: long }, []);
        let cmp = cmd.build_comparison(ComparisonKind::Lt, a, b).unwrap();

        assert_eq!(count(&cmd, OpType::SoftCast), 1);
        let left = cmd.children(cmp)[0];
        assert_eq!(cmd.op(left), &Op::SoftCast { ty: long });
        assert_eq!(cmd.children(cmp)[1], b);
    }

    #[test]
    fn comparison_without_common_type_fails() {
        let mut cmd = command();
        let int = cmd.integer_type();
        let string = cmd.string_type();
        let a = cmd.create_node(Op::Null { ty: int }, []);
        let b = cmd.create_node(Op::Null { ty: string }, []);
        let err = cmd.build_comparison(ComparisonKind::Eq, a, b).unwrap_err();
        assert!(matches!(err, IrError::NoCommonType { .. }));
    }
}
