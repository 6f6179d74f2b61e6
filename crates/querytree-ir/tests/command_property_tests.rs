use proptest::prelude::*;
use querytree_ir::{Command, CommandConfig, ConstantValue, Op, Var};
use querytree_md::{MetadataWorkspace, Property};
use std::collections::BTreeSet;
use std::sync::Arc;

fn command(pooling: bool) -> Command {
    let config = if pooling {
        CommandConfig::default()
    } else {
        CommandConfig::without_pooling()
    };
    Command::with_config(Arc::new(MetadataWorkspace::new()), config).unwrap()
}

#[derive(Debug, Clone, Copy)]
enum VarCall {
    Parameter,
    Computed,
    SetOp,
    Column,
}

fn var_call() -> impl Strategy<Value = VarCall> {
    prop_oneof![
        Just(VarCall::Parameter),
        Just(VarCall::Computed),
        Just(VarCall::SetOp),
        Just(VarCall::Column),
    ]
}

proptest! {
    #[test]
    fn node_ids_follow_call_order(values in prop::collection::vec(any::<i64>(), 1..64)) {
        let mut cmd = command(true);
        let int = cmd.integer_type();
        let ids: Vec<u32> = values
            .iter()
            .map(|&v| {
                let op = cmd.create_constant_op(ConstantValue::Integer(v), int);
                cmd.create_node(op, []).raw()
            })
            .collect();
        let expected: Vec<u32> = (0..values.len() as u32).collect();
        prop_assert_eq!(ids, expected);
    }

    #[test]
    fn var_ids_are_one_monotonic_space(calls in prop::collection::vec(var_call(), 1..48)) {
        let mut cmd = command(true);
        let int = cmd.integer_type();
        let mut ids = Vec::new();
        for (i, call) in calls.iter().enumerate() {
            let var = match call {
                VarCall::Parameter => cmd.create_parameter_var(&format!("p{i}"), int).unwrap(),
                VarCall::Computed => cmd.create_computed_var(int),
                VarCall::SetOp => cmd.create_set_op_var(int),
                VarCall::Column => {
                    let md = cmd.create_flat_table_definition(
                        vec![Property::new("a", int), Property::new("b", int)],
                        &[],
                        None,
                    );
                    let table = cmd.create_table_instance(md);
                    cmd.create_column_var(table, i % 2)
                }
            };
            ids.push(var.id());
        }
        let expected: Vec<u32> = (0..calls.len() as u32).collect();
        prop_assert_eq!(ids, expected);
    }

    #[test]
    fn enumerator_yields_the_set(
        picks in prop::collection::vec(0usize..32, 0..64),
        pooling in any::<bool>(),
    ) {
        let mut cmd = command(pooling);
        let int = cmd.integer_type();
        let vars: Vec<Var> = (0..32).map(|_| cmd.create_computed_var(int)).collect();
        let chosen: Vec<Var> = picks.iter().map(|&i| vars[i]).collect();

        let set = cmd.create_var_vec_from_vars(chosen.iter().copied());
        let enumerator = cmd.var_vec_enumerator(&set);
        let seen: Vec<Var> = enumerator.collect();

        let expected: BTreeSet<Var> = chosen.iter().copied().collect();
        prop_assert_eq!(seen.len(), expected.len());
        prop_assert_eq!(seen.into_iter().collect::<BTreeSet<_>>(), expected);
    }

    #[test]
    fn released_sets_come_back_empty(
        rounds in prop::collection::vec(prop::collection::vec(0u32..16, 1..8), 1..16),
    ) {
        let mut cmd = command(true);
        let int = cmd.integer_type();
        let vars: Vec<Var> = (0..16).map(|_| cmd.create_computed_var(int)).collect();
        for round in rounds {
            let fresh = cmd.create_var_vec();
            prop_assert!(fresh.is_empty());
            let mut set = fresh;
            set.extend(round.iter().map(|&i| vars[i as usize]));
            cmd.release_var_vec(set);
        }
    }
}

#[test]
fn enumerator_round_trips_through_pool() {
    let mut cmd = command(true);
    let int = cmd.integer_type();
    let a = cmd.create_computed_var(int);
    let b = cmd.create_computed_var(int);

    let set = cmd.create_var_vec_from_vars([b, a]);
    let enumerator = cmd.var_vec_enumerator(&set);
    assert_eq!(enumerator.len(), 2);
    cmd.release_var_vec_enumerator(enumerator);

    let empty = cmd.create_var_vec();
    let mut again = cmd.var_vec_enumerator(&empty);
    assert_eq!(again.next(), None);
    assert_eq!(cmd.pool_stats().enumerators.reuses, 1);
}

#[test]
fn replaced_child_keeps_parent_id() {
    let mut cmd = command(true);
    let int = cmd.integer_type();
    let a = cmd.create_node(Op::Null { ty: int }, []);
    let b = cmd.create_node(Op::Null { ty: int }, []);
    let c = cmd.create_node(Op::Null { ty: int }, []);
    let cast_op = cmd.create_cast_op(int);
    let cast = cmd.create_node(cast_op, [a]);

    cmd.replace_child(cast, 0, b);
    assert_eq!(cmd.children(cast), &[b]);
    cmd.node_mut(cast).children_mut()[0] = c;
    assert_eq!(cmd.node(cast).child(0), c);
    assert_eq!(cmd.node(cast).id(), cast);
}
