//! Left-deep trees far deeper than a thread stack could recurse through.

use querytree_ir::{dump, Command, NodeId, OpType, Var};
use querytree_md::{MetadataWorkspace, Property};
use std::sync::Arc;

const INPUTS: usize = 1500;

/// Root, its output var, and the first scan.
fn ladder(inputs: usize) -> (Command, NodeId, Var, NodeId) {
    let mut cmd = Command::new(Arc::new(MetadataWorkspace::new())).unwrap();
    let int = cmd.integer_type();
    let mut scans = Vec::with_capacity(inputs);
    let mut vars = Vec::with_capacity(inputs);
    for _ in 0..inputs {
        let md = cmd.create_flat_table_definition(vec![Property::new("x", int)], &["x"], None);
        let table = cmd.create_table_instance(md);
        vars.push(cmd.create_column_var(table, 0));
        let op = cmd.create_scan_table_op(table);
        scans.push(cmd.create_node(op, []));
    }
    let (root, out) = cmd.build_union_all_ladder_single(&scans, &vars).unwrap();
    (cmd, root, out, scans[0])
}

#[test]
fn node_info_on_deep_union_ladder() {
    let (mut cmd, root, out, first_scan) = ladder(INPUTS);
    let info = cmd.node_info(root).clone();
    assert!(info.definitions.is_set(out));
    assert_eq!(info.definitions.count(), 1);
    assert!(info.external_references.is_empty());
    assert!(info.keys.no_keys());

    // Leaves were derived on the way up.
    assert!(!cmd.node_info(first_scan).keys.no_keys());
}

#[test]
fn dump_on_deep_union_ladder() {
    let (cmd, root, _, _) = ladder(INPUTS);
    let text = dump(&cmd, root);
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines.len(), cmd.node_count());
    assert!(lines[0].starts_with("UnionAll["));
    assert_eq!(
        lines.iter().filter(|l| l.trim_start().starts_with("ScanTable")).count(),
        INPUTS
    );
    // The deepest pair sits under INPUTS - 1 union levels.
    let deepest = lines.iter().map(|l| l.len() - l.trim_start().len()).max();
    assert_eq!(deepest, Some((INPUTS - 1) * 2));
}

#[test]
fn pull_up_keys_on_deep_union_ladder() {
    let (mut cmd, root, _, _) = ladder(INPUTS);
    let keys = cmd.pull_up_keys(root);
    assert!(keys.no_keys());
    assert_eq!(
        cmd.nodes().filter(|n| n.op().op_type() == OpType::UnionAll).count(),
        INPUTS - 1
    );
}
