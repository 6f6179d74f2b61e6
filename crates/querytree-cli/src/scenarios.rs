//! Small demo trees built against a fixed order-entry schema.

use anyhow::{Context, Result};
use clap::ValueEnum;
use querytree_ir::{Command, ComparisonKind, ConstantValue, NodeId, RelProperty};
use querytree_md::{
    ExtentId, MetadataWorkspace, Multiplicity, PrimitiveKind, Property, RelationshipEnd,
    RelationshipId, TypeUsage,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Scenario {
    /// Union-all ladder over three scans
    Union,
    /// Project a computed column next to a pass-through column
    Project,
    /// Customers that are exactly preferred customers
    OfType,
    /// Int32 column compared with an Int64 parameter
    Compare,
    /// Navigate from an order to its customer
    Navigate,
}

pub struct Schema {
    pub customer: TypeUsage,
    pub preferred: TypeUsage,
    pub order: TypeUsage,
    pub customers: ExtentId,
    pub placed: RelationshipId,
}

pub fn schema(md: &MetadataWorkspace) -> Result<Schema> {
    let int = md.primitive(PrimitiveKind::Int32).context("Int32 missing")?;
    let string = md.primitive(PrimitiveKind::String).context("String missing")?;
    let decimal = md.primitive(PrimitiveKind::Decimal).context("Decimal missing")?;

    let customer = md.define_entity_type(
        "Customer",
        None,
        vec![Property::new("Id", int).non_nullable(), Property::new("Name", string)],
        &["Id"],
    )?;
    let preferred = md.define_entity_type(
        "PreferredCustomer",
        Some(customer),
        vec![Property::new("Discount", decimal)],
        &[],
    )?;
    let order = md.define_entity_type(
        "Order",
        None,
        vec![Property::new("Id", int).non_nullable(), Property::new("Total", decimal)],
        &["Id"],
    )?;
    let customers = md.define_extent("Customers", customer)?;
    let placed = md.define_relationship(
        "CustomerOrders",
        [
            RelationshipEnd::new("Customer", customer, Multiplicity::One),
            RelationshipEnd::new("Orders", order, Multiplicity::Many),
        ],
    )?;

    Ok(Schema {
        customer,
        preferred,
        order,
        customers,
        placed,
    })
}

fn scan_flat(cmd: &mut Command, ty: TypeUsage) -> (NodeId, querytree_ir::TableId) {
    let md = cmd.create_flat_table_definition_for_type(ty, None);
    let table = cmd.create_table_instance(md);
    let op = cmd.create_scan_table_op(table);
    (cmd.create_node(op, []), table)
}

/// Build `scenario` in `cmd` and return the root.
pub fn build(cmd: &mut Command, schema: &Schema, scenario: Scenario) -> Result<NodeId> {
    let root = match scenario {
        Scenario::Union => {
            let mut inputs = Vec::new();
            let mut vars = Vec::new();
            for _ in 0..3 {
                let (scan, table) = scan_flat(cmd, schema.customer);
                inputs.push(scan);
                vars.push(vec![
                    cmd.create_column_var_by_name(table, "Id"),
                    cmd.create_column_var_by_name(table, "Name"),
                ]);
            }
            let (root, _) = cmd
                .build_union_all_ladder(&inputs, &vars)
                .context("union ladder needs at least one input")?;
            root
        }
        Scenario::Project => {
            let (scan, table) = scan_flat(cmd, schema.order);
            let id = cmd.create_column_var_by_name(table, "Id");
            let total = cmd.create_column_var_by_name(table, "Total");
            let total_ref = cmd.create_var_ref_op(total);
            let total_ref = cmd.create_node(total_ref, []);
            let ty = cmd.var_type(total);
            let two = cmd.create_constant_op(ConstantValue::Integer(2), ty);
            let two = cmd.create_node(two, []);
            let times = cmd.create_arithmetic_op(querytree_ir::ArithmeticKind::Multiply, ty);
            let doubled = cmd.create_node(times, [total_ref, two]);
            let (root, _) = cmd.build_project(scan, &[id], &[doubled]);
            root
        }
        Scenario::OfType => {
            let md = cmd.create_table_definition(schema.customer, Some(schema.customers));
            let table = cmd.create_table_instance(md);
            let element = cmd.create_column_var(table, 0);
            let op = cmd.create_scan_table_op(table);
            let scan = cmd.create_node(op, []);
            let (root, _) = cmd.build_of_type_tree(scan, element, schema.preferred, false);
            root
        }
        Scenario::Compare => {
            let (scan, table) = scan_flat(cmd, schema.customer);
            let id = cmd.create_column_var_by_name(table, "Id");
            let long = cmd
                .metadata()
                .primitive(PrimitiveKind::Int64)
                .context("Int64 missing")?;
            let param = cmd.create_parameter_var("min_id", long)?;
            let lhs = cmd.create_var_ref_op(id);
            let lhs = cmd.create_node(lhs, []);
            let rhs = cmd.create_var_ref_op(param);
            let rhs = cmd.create_node(rhs, []);
            let predicate = cmd.build_comparison(ComparisonKind::Ge, lhs, rhs)?;
            let filter = cmd.create_filter_op();
            cmd.create_node(filter, [scan, predicate])
        }
        Scenario::Navigate => {
            let md = cmd.metadata().clone();
            let table_md = cmd.create_table_definition(schema.order, None);
            let table = cmd.create_table_instance(table_md);
            let order = cmd.create_column_var(table, 0);
            let op = cmd.create_scan_table_op(table);
            let scan = cmd.create_node(op, []);

            let order_ref = cmd.create_var_ref_op(order);
            let order_ref = cmd.create_node(order_ref, []);
            let get_ref = cmd.create_get_entity_ref_op(md.ref_of(schema.order));
            let get_ref = cmd.create_node(get_ref, [order_ref]);
            let property = RelProperty::new(&md, schema.placed, "Orders", "Customer");
            let nav = cmd.create_navigate_op(md.ref_of(schema.customer), property);
            let nav = cmd.create_node(nav, [get_ref]);
            let (root, _) = cmd.build_project(scan, &[order], &[nav]);
            root
        }
    };
    cmd.set_root(root);
    Ok(root)
}
