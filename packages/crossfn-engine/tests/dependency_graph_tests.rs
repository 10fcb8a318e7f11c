//! Dependency graph integration tests
//!
//! - Exhaustiveness: every StorageRead/StorageWrite lands in exactly one
//!   writer or reader set
//! - Unresolved references abort the build with every reference listed
//! - Couplings and inlined footprints on the fixtures

mod common;

use common::*;
use crossfn_engine::config::EngineConfig;
use crossfn_engine::errors::EngineError;
use crossfn_engine::features::dependency_graph::DependencyGraphBuilder;
use crossfn_engine::shared::models::{
    walk_body, AnalysisInput, CondExpr, Function, Operation, ProgramModel, Sensitivity,
};
use pretty_assertions::assert_eq;
use proptest::prelude::*;

const VARS: [&str; 3] = ["P.a", "P.b", "P.c"];

fn op_strategy() -> impl Strategy<Value = Operation> {
    let leaf = prop_oneof![
        (0..VARS.len(), 0..4u8).prop_map(|(v, b)| read(VARS[v], &format!("l{}", b))),
        (0..VARS.len(), 0..100i64).prop_map(|(v, c)| write(VARS[v], constant(c as i128))),
        Just(call("token.transfer", None)),
    ];
    leaf.prop_recursive(3, 24, 4, |inner| {
        (
            prop::collection::vec(inner.clone(), 0..4),
            prop::collection::vec(inner, 0..4),
        )
            .prop_map(|(then_ops, else_ops)| {
                branch(CondExpr::gt(constant(1), constant(0)), then_ops, else_ops)
            })
    })
}

fn function_strategy(index: usize) -> impl Strategy<Value = Function> {
    prop::collection::vec(op_strategy(), 0..8).prop_map(move |ops| {
        FunctionBuilder::new("P", &format!("f{}", index)).ops(ops).build()
    })
}

fn model_strategy() -> impl Strategy<Value = ProgramModel> {
    (1..5usize)
        .prop_flat_map(|n| {
            (0..n)
                .map(function_strategy)
                .collect::<Vec<_>>()
        })
        .prop_map(|functions| {
            let mut contract = ContractBuilder::new("P")
                .var("a", Sensitivity::High)
                .var("b", Sensitivity::Low)
                .var("c", Sensitivity::Medium);
            for function in functions {
                contract = contract.function(function);
            }
            model(vec![contract.build()])
        })
}

fn storage_op_count(model: &ProgramModel) -> usize {
    let mut count = 0;
    for function in model.functions() {
        walk_body(&function.body, &mut |_, op| {
            if matches!(op, Operation::StorageRead { .. } | Operation::StorageWrite { .. }) {
                count += 1;
            }
        });
    }
    count
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_every_storage_operation_is_recorded_once(model in model_strategy()) {
        let expected = storage_op_count(&model);
        let input = AnalysisInput::new(model);
        let graph = DependencyGraphBuilder::new(&EngineConfig::default())
            .build(&input, &[])
            .unwrap();

        let recorded: usize = graph
            .relations
            .values()
            .map(|r| r.writers.len() + r.readers.len())
            .sum();
        prop_assert_eq!(recorded, expected);
        prop_assert_eq!(graph.access_count(), expected);
    }
}

#[test]
fn test_unresolved_variable_aborts_with_every_reference() {
    let broken = FunctionBuilder::new("P", "f")
        .ops([read("P.ghost", "g"), write("P.phantom", local("g"))])
        .build();
    let input = AnalysisInput::new(model(vec![ContractBuilder::new("P")
        .var("a", Sensitivity::Low)
        .function(broken)
        .build()]));

    let err = DependencyGraphBuilder::new(&EngineConfig::default())
        .build(&input, &[])
        .unwrap_err();
    match err {
        EngineError::ModelInconsistency {
            reference,
            unresolved,
            ..
        } => {
            assert_eq!(reference, "P.ghost");
            assert_eq!(unresolved.len(), 2);
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_internal_helper_is_inlined_into_footprint() {
    let input = share_price_vault();
    let graph = build_graph(&input, &EngineConfig::default());

    let deposit = graph.footprint(&fid("Vault.deposit")).unwrap();
    assert!(deposit.reads.contains(&vid("Vault.totalSupply")));
    assert!(deposit.writes.contains(&vid("Vault.totalAssets")));
    assert!(!deposit.widened);
    assert_eq!(deposit.internal_calls, 1);
}

#[test]
fn test_couplings_only_join_entrypoints() {
    let input = share_price_vault();
    let graph = build_graph(&input, &EngineConfig::default());

    assert_eq!(graph.couplings.len(), 1);
    let coupling = &graph.couplings[0];
    assert_eq!(coupling.first, fid("Vault.deposit"));
    assert_eq!(coupling.second, fid("Vault.reportProfit"));
    assert!(coupling.shared.contains(&vid("Vault.totalAssets")));
}
