//! Human-readable tree dumps for logs, tests and the CLI.

use std::fmt::Write;

use crate::command::Command;
use crate::node::NodeId;
use crate::ops::{Op, SetOpBody, SortKey};

/// Indented one-node-per-line rendering of the subtree at `root`.
///
/// Each line is `<OpType>[payload] : <type> #<id>`; scalar nodes carry their
/// result type, relational nodes their payload (tables, output vars, keys).
pub fn dump(cmd: &Command, root: NodeId) -> String {
    let mut out = String::new();
    let mut stack = vec![(root, 0usize)];
    while let Some((id, depth)) = stack.pop() {
        write_node(cmd, id, depth, &mut out);
        // Reversed so the first child is printed first.
        stack.extend(cmd.children(id).iter().rev().map(|&child| (child, depth + 1)));
    }
    out
}

fn write_node(cmd: &Command, id: NodeId, depth: usize, out: &mut String) {
    let op = cmd.op(id);
    let _ = write!(out, "{:indent$}{:?}", "", op.op_type(), indent = depth * 2);
    let payload = payload(cmd, op);
    if !payload.is_empty() {
        let _ = write!(out, "[{payload}]");
    }
    if let Some(ty) = op.result_type() {
        let _ = write!(out, " : {}", cmd.metadata().type_name(ty));
    }
    let _ = writeln!(out, " {id}");
}

fn payload(cmd: &Command, op: &Op) -> String {
    let md = cmd.metadata();
    match op {
        Op::Constant { value, .. } | Op::InternalConstant { value, .. } => value.to_string(),
        Op::VarRef { var, .. } => var.to_string(),
        Op::Treat { is_fake: true, .. } => "fake".to_string(),
        Op::IsOf { target, only, .. } => {
            let name = md.type_name(*target);
            if *only {
                format!("only {name}")
            } else {
                name
            }
        }
        Op::Function { name, .. } | Op::Property { name, .. } => name.clone(),
        Op::Aggregate { name, distinct, .. } => {
            if *distinct {
                format!("{name} distinct")
            } else {
                name.clone()
            }
        }
        Op::RelProperty { property, .. } | Op::Navigate { property, .. } => property.to_string(),
        Op::ScanTable { table } | Op::ScanView { table } => table.to_string(),
        Op::Unnest { var, table } => format!("{var} -> {table}"),
        Op::Project { outputs } | Op::Distinct { keys: outputs } => outputs.to_string(),
        Op::UnionAll(body) | Op::Intersect(body) | Op::Except(body) => set_op(body),
        Op::Sort { keys } => sort_keys(keys),
        Op::ConstrainedSort { keys, with_ties } => {
            let keys = sort_keys(keys);
            if *with_ties {
                format!("{keys} with ties")
            } else {
                keys
            }
        }
        Op::GroupBy { keys, outputs } => format!("keys {keys} out {outputs}"),
        Op::VarDef { var } => var.to_string(),
        _ => String::new(),
    }
}

fn set_op(body: &SetOpBody) -> String {
    let side = |index: usize| {
        body.var_maps[index]
            .iter()
            .map(|(out, input)| format!("{out}<-{input}"))
            .collect::<Vec<_>>()
            .join(",")
    };
    format!("{} | {} | {}", body.outputs, side(0), side(1))
}

fn sort_keys(keys: &[SortKey]) -> String {
    keys.iter()
        .map(|k| format!("{}{}", k.var, if k.ascending { "" } else { " desc" }))
        .collect::<Vec<_>>()
        .join(",")
}

#[cfg(test)]
mod tests {
    use super::*;
    use querytree_md::{MetadataWorkspace, Property};
    use std::sync::Arc;

    #[test]
    fn dump_indents_children_and_shows_types() {
        let mut cmd = Command::new(Arc::new(MetadataWorkspace::new())).unwrap();
        let int = cmd.integer_type();
        let md = cmd.create_flat_table_definition(vec![Property::new("x", int)], &[], None);
        let table = cmd.create_table_instance(md);
        let x = cmd.create_column_var(table, 0);
        let scan_op = cmd.create_scan_table_op(table);
        let scan = cmd.create_node(scan_op, []);
        let (project, _) = cmd.build_fake_treat_project(scan, x, int);

        let text = dump(&cmd, project);
        let lines: Vec<&str> = text.lines().collect();
        assert!(lines[0].starts_with("Project["));
        assert_eq!(lines[1], "  ScanTable[t0] #0");
        assert!(lines.iter().any(|l| l.trim_start() == "Treat[fake] : Int32 #2"));
        assert!(lines.iter().any(|l| l.trim_start() == "VarRef[v0] : Int32 #1"));
    }
}
