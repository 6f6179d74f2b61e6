//! Op constructors.
//!
//! Translators build ops through these methods rather than spelling out
//! `Op` variants, so that scalar result types (always boolean for
//! predicates) and bookkeeping side effects (relationship property
//! references, unnest tables) stay consistent.

use querytree_md::{ExtentId, TypeUsage};

use crate::command::Command;
use crate::error::contract_violation;
use crate::ops::{
    ArithmeticKind, ComparisonKind, ConditionalKind, ConstantValue, Op, SetOpBody, SortKey,
};
use crate::rel_property::RelProperty;
use crate::table::TableId;
use crate::var::{Var, VarMap};
use crate::var_vec::VarVec;

impl Command {
    // ------------------------------------------------------------------------
    // Scalar ops
    // ------------------------------------------------------------------------

    pub fn create_constant_op(&self, value: ConstantValue, ty: TypeUsage) -> Op {
        Op::Constant { value, ty }
    }

    pub fn create_internal_constant_op(&self, value: ConstantValue, ty: TypeUsage) -> Op {
        Op::InternalConstant { value, ty }
    }

    pub fn create_null_op(&self, ty: TypeUsage) -> Op {
        Op::Null { ty }
    }

    /// Reference to `var`, typed as the var.
    #[track_caller]
    pub fn create_var_ref_op(&self, var: Var) -> Op {
        Op::VarRef {
            var,
            ty: self.var_type(var),
        }
    }

    pub fn create_comparison_op(&self, kind: ComparisonKind) -> Op {
        Op::Comparison {
            kind,
            ty: self.boolean_type(),
        }
    }

    pub fn create_like_op(&self) -> Op {
        Op::Like {
            ty: self.boolean_type(),
        }
    }

    pub fn create_arithmetic_op(&self, kind: ArithmeticKind, ty: TypeUsage) -> Op {
        Op::Arithmetic { kind, ty }
    }

    pub fn create_conditional_op(&self, kind: ConditionalKind) -> Op {
        Op::Conditional {
            kind,
            ty: self.boolean_type(),
        }
    }

    pub fn create_case_op(&self, ty: TypeUsage) -> Op {
        Op::Case { ty }
    }

    pub fn create_cast_op(&self, ty: TypeUsage) -> Op {
        Op::Cast { ty }
    }

    pub fn create_soft_cast_op(&self, ty: TypeUsage) -> Op {
        Op::SoftCast { ty }
    }

    pub fn create_treat_op(&self, ty: TypeUsage) -> Op {
        Op::Treat { ty, is_fake: false }
    }

    /// Compile-time-only type assertion; never executed.
    pub fn create_fake_treat_op(&self, ty: TypeUsage) -> Op {
        Op::Treat { ty, is_fake: true }
    }

    pub fn create_is_of_op(&self, target: TypeUsage) -> Op {
        Op::IsOf {
            target,
            only: false,
            ty: self.boolean_type(),
        }
    }

    pub fn create_is_of_only_op(&self, target: TypeUsage) -> Op {
        Op::IsOf {
            target,
            only: true,
            ty: self.boolean_type(),
        }
    }

    pub fn create_function_op(&self, name: &str, ty: TypeUsage) -> Op {
        Op::Function {
            name: name.to_string(),
            ty,
        }
    }

    pub fn create_property_op(&self, name: &str, ty: TypeUsage) -> Op {
        Op::Property {
            name: name.to_string(),
            ty,
        }
    }

    /// `property` is recorded as referenced when a node carrying the op is
    /// created.
    pub fn create_rel_property_op(&self, property: RelProperty, ty: TypeUsage) -> Op {
        Op::RelProperty { property, ty }
    }

    /// Creating a node with this op records both `property` and its inverse
    /// as referenced.
    pub fn create_navigate_op(&self, ty: TypeUsage, property: RelProperty) -> Op {
        Op::Navigate { property, ty }
    }

    pub fn create_new_entity_op(&self, ty: TypeUsage, extent: Option<ExtentId>) -> Op {
        Op::NewEntity { extent, ty }
    }

    pub fn create_new_record_op(&self, ty: TypeUsage) -> Op {
        Op::NewRecord { ty }
    }

    pub fn create_new_multiset_op(&self, ty: TypeUsage) -> Op {
        Op::NewMultiset { ty }
    }

    pub fn create_aggregate_op(&self, name: &str, distinct: bool, ty: TypeUsage) -> Op {
        Op::Aggregate {
            name: name.to_string(),
            distinct,
            ty,
        }
    }

    pub fn create_exists_op(&self) -> Op {
        Op::Exists {
            ty: self.boolean_type(),
        }
    }

    pub fn create_element_op(&self, ty: TypeUsage) -> Op {
        Op::Element { ty }
    }

    pub fn create_collect_op(&self, ty: TypeUsage) -> Op {
        Op::Collect { ty }
    }

    pub fn create_get_entity_ref_op(&self, ty: TypeUsage) -> Op {
        Op::GetEntityRef { ty }
    }

    pub fn create_get_ref_key_op(&self, ty: TypeUsage) -> Op {
        Op::GetRefKey { ty }
    }

    pub fn create_deref_op(&self, ty: TypeUsage) -> Op {
        Op::Deref { ty }
    }

    // ------------------------------------------------------------------------
    // Relational ops
    // ------------------------------------------------------------------------

    #[track_caller]
    pub fn create_scan_table_op(&self, table: TableId) -> Op {
        self.table(table);
        Op::ScanTable { table }
    }

    #[track_caller]
    pub fn create_scan_view_op(&self, table: TableId) -> Op {
        self.table(table);
        Op::ScanView { table }
    }

    /// Unnest a collection-valued var into a fresh single-column table.
    #[track_caller]
    pub fn create_unnest_op(&mut self, var: Var) -> (Op, TableId) {
        let collection = self.var_type(var);
        let element = match self.metadata().element_type(collection) {
            Some(element) => element,
            None => contract_violation(format_args!(
                "cannot unnest {var} of non-collection type {}",
                self.metadata().type_name(collection)
            )),
        };
        let md = self.create_table_definition(element, None);
        let table = self.create_table_instance(md);
        (Op::Unnest { var, table }, table)
    }

    pub fn create_filter_op(&self) -> Op {
        Op::Filter
    }

    pub fn create_project_op(&self, outputs: VarVec) -> Op {
        Op::Project { outputs }
    }

    pub fn create_inner_join_op(&self) -> Op {
        Op::InnerJoin
    }

    pub fn create_left_outer_join_op(&self) -> Op {
        Op::LeftOuterJoin
    }

    pub fn create_full_outer_join_op(&self) -> Op {
        Op::FullOuterJoin
    }

    pub fn create_cross_join_op(&self) -> Op {
        Op::CrossJoin
    }

    pub fn create_cross_apply_op(&self) -> Op {
        Op::CrossApply
    }

    pub fn create_outer_apply_op(&self) -> Op {
        Op::OuterApply
    }

    fn set_op_body(&self, left: VarMap, right: VarMap) -> SetOpBody {
        let outputs = VarVec::from_vars(left.outputs());
        debug_assert!(right.outputs().all(|v| outputs.is_set(v)));
        SetOpBody {
            outputs,
            var_maps: [left, right],
        }
    }

    pub fn create_union_all_op(&self, left: VarMap, right: VarMap) -> Op {
        Op::UnionAll(self.set_op_body(left, right))
    }

    pub fn create_intersect_op(&self, left: VarMap, right: VarMap) -> Op {
        Op::Intersect(self.set_op_body(left, right))
    }

    pub fn create_except_op(&self, left: VarMap, right: VarMap) -> Op {
        Op::Except(self.set_op_body(left, right))
    }

    pub fn create_distinct_op(&self, keys: VarVec) -> Op {
        Op::Distinct { keys }
    }

    pub fn create_sort_op(&self, keys: Vec<SortKey>) -> Op {
        Op::Sort { keys }
    }

    pub fn create_constrained_sort_op(&self, keys: Vec<SortKey>, with_ties: bool) -> Op {
        Op::ConstrainedSort { keys, with_ties }
    }

    pub fn create_group_by_op(&self, keys: VarVec, outputs: VarVec) -> Op {
        Op::GroupBy { keys, outputs }
    }

    pub fn create_single_row_op(&self) -> Op {
        Op::SingleRow
    }

    pub fn create_single_row_table_op(&self) -> Op {
        Op::SingleRowTable
    }

    // ------------------------------------------------------------------------
    // Ancillary ops
    // ------------------------------------------------------------------------

    pub fn create_var_def_op(&self, var: Var) -> Op {
        Op::VarDef { var }
    }

    pub fn create_var_def_list_op(&self) -> Op {
        Op::VarDefList
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use querytree_md::{MetadataWorkspace, Multiplicity, Property, RelationshipEnd};
    use std::sync::Arc;

    #[test]
    fn navigate_node_records_property_and_inverse() {
        let md = Arc::new(MetadataWorkspace::new());
        let int = md.primitive(querytree_md::PrimitiveKind::Int32).unwrap();
        let customer = md
            .define_entity_type("Customer", None, vec![Property::new("Id", int)], &["Id"])
            .unwrap();
        let order = md
            .define_entity_type("Order", None, vec![Property::new("Id", int)], &["Id"])
            .unwrap();
        let rel = md
            .define_relationship(
                "CustomerOrders",
                [
                    RelationshipEnd::new("Customer", customer, Multiplicity::One),
                    RelationshipEnd::new("Orders", order, Multiplicity::Many),
                ],
            )
            .unwrap();

        let mut cmd = Command::new(Arc::clone(&md)).unwrap();
        let walk = RelProperty::new(&md, rel, "Customer", "Orders");
        let ty = md.collection_of(md.ref_of(order));
        let op = cmd.create_navigate_op(ty, walk.clone());
        assert_eq!(op.result_type(), Some(ty));
        assert!(cmd.referenced_rel_properties().is_empty());

        let source = cmd.create_node(Op::Null { ty: md.ref_of(customer) }, []);
        cmd.create_node(op, [source]);
        assert!(cmd.is_rel_property_referenced(&walk));
        assert!(cmd.is_rel_property_referenced(&walk.inverse()));
        assert_eq!(cmd.referenced_rel_properties().len(), 2);
    }

    #[test]
    fn predicates_are_boolean() {
        let cmd = Command::new(Arc::new(MetadataWorkspace::new())).unwrap();
        let boolean = cmd.boolean_type();
        assert_eq!(cmd.create_comparison_op(ComparisonKind::Lt).result_type(), Some(boolean));
        assert_eq!(cmd.create_exists_op().result_type(), Some(boolean));
        assert_eq!(
            cmd.create_is_of_only_op(cmd.string_type()).result_type(),
            Some(boolean)
        );
    }

    #[test]
    fn unnest_creates_element_table() {
        let mut cmd = Command::new(Arc::new(MetadataWorkspace::new())).unwrap();
        let int = cmd.integer_type();
        let ints = cmd.metadata().collection_of(int);
        let v = cmd.create_computed_var(ints);
        let (op, table) = cmd.create_unnest_op(v);

        assert_eq!(op, Op::Unnest { var: v, table });
        let md = cmd.table(table).md();
        assert_eq!(md.columns().len(), 1);
        assert_eq!(md.columns()[0].ty, int);
        assert!(md.is_flattened());
    }
}
