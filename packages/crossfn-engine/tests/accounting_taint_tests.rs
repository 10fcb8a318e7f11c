//! Permissionless accounting integration tests

mod common;

use common::*;
use crossfn_engine::config::EngineConfig;
use crossfn_engine::features::accounting_taint::AccountingTaintDetector;
use crossfn_engine::shared::models::{
    AccessControl, AnalysisInput, Calldata, CondExpr, ExternalTarget, Finding, FindingCategory, Operation,
    Param, RoleDecl, Sensitivity,
};
use pretty_assertions::assert_eq;

fn detect(input: &AnalysisInput, function: &str) -> Vec<Finding> {
    let config = EngineConfig::default();
    let graph = build_graph(input, &config);
    let index = input.model.index();
    let function = index.function(&fid(function)).unwrap();
    AccountingTaintDetector::new(&index, &graph, &config).detect(function)
}

fn with_sync_access(mut input: AnalysisInput, access: AccessControl) -> AnalysisInput {
    for function in &mut input.model.contracts[0].functions {
        if function.id == fid("Market.sync") {
            function.access = access.clone();
        }
    }
    input
}

#[test]
fn test_uncorroborated_oracle_write_is_flagged() {
    let findings = detect(&oracle_sync(false), "Market.sync");

    assert_eq!(findings.len(), 1);
    let finding = &findings[0];
    assert_eq!(finding.category, FindingCategory::PermissionlessAccounting);
    assert_eq!(finding.details["sources"], "oracle.latestAnswer");
    assert_eq!(finding.details["readers"], "Market.redeem");
    assert!(finding.witness.variables.contains(&vid("Market.exchangeRate")));
    assert!(finding.witness.functions.contains(&fid("Market.redeem")));
    assert!(!finding.evidence.is_empty());
}

#[test]
fn test_twap_cross_check_clears_the_write() {
    assert!(detect(&oracle_sync(true), "Market.sync").is_empty());
}

#[test]
fn test_cross_check_on_one_arm_leaves_the_other_path_open() {
    let sync = FunctionBuilder::new("Market", "sync")
        .param(Param::new("strict"))
        .ops([
            call("oracle.latestAnswer", Some("price")),
            branch(
                CondExpr::eq(param("strict"), constant(1)),
                vec![
                    call("twap.consult", Some("reference")),
                    require(CondExpr::le(local("price"), local("reference").mul(constant(2)))),
                ],
                vec![],
            ),
            write("Market.exchangeRate", local("price")),
        ])
        .build();
    let redeem = FunctionBuilder::new("Market", "redeem")
        .param(Param::amount("shares"))
        .ops([read("Market.exchangeRate", "rate"), ret(param("shares").mul(local("rate")))])
        .build();
    let input = AnalysisInput::new(model(vec![ContractBuilder::new("Market")
        .var("exchangeRate", Sensitivity::Critical)
        .function(sync)
        .function(redeem)
        .build()]));

    let findings = detect(&input, "Market.sync");
    assert_eq!(findings.len(), 1);
    assert_eq!(findings[0].details["sources"], "oracle.latestAnswer");
}

#[test]
fn test_restricted_role_is_not_attacker_callable() {
    let input = with_sync_access(oracle_sync(false), AccessControl::Permissioned("keeper".to_string()));
    assert!(detect(&input, "Market.sync").is_empty());
}

#[test]
fn test_self_enrollable_role_is_attacker_callable() {
    let mut input = with_sync_access(oracle_sync(false), AccessControl::Permissioned("keeper".to_string()));
    input.model.roles.push(RoleDecl {
        name: "keeper".to_string(),
        self_enrollable: true,
    });
    assert_eq!(detect(&input, "Market.sync").len(), 1);
}

#[test]
fn test_immutable_target_is_trusted() {
    let sync = FunctionBuilder::new("Market", "sync")
        .ops([
            Operation::ExternalCall {
                target: ExternalTarget::immutable("oracle.latestAnswer"),
                calldata: Calldata::selector("latestAnswer"),
                returns: Some("price".to_string()),
            },
            write("Market.exchangeRate", local("price")),
        ])
        .build();
    let redeem = FunctionBuilder::new("Market", "redeem")
        .param(Param::amount("shares"))
        .ops([read("Market.exchangeRate", "rate"), ret(param("shares").mul(local("rate")))])
        .build();
    let input = AnalysisInput::new(model(vec![ContractBuilder::new("Market")
        .var("exchangeRate", Sensitivity::Critical)
        .function(sync)
        .function(redeem)
        .build()]));

    assert!(detect(&input, "Market.sync").is_empty());
}

#[test]
fn test_low_sensitivity_or_unread_variable_is_ignored() {
    let sync = FunctionBuilder::new("Market", "sync")
        .ops([
            call("oracle.latestAnswer", Some("price")),
            write("Market.lastPrice", local("price")),
            write("Market.exchangeRate", local("price")),
        ])
        .build();
    let redeem = FunctionBuilder::new("Market", "redeem")
        .ops([read("Market.lastPrice", "last")])
        .build();
    // lastPrice is read elsewhere but low sensitivity; exchangeRate is
    // economic but nobody else reads it
    let input = AnalysisInput::new(model(vec![ContractBuilder::new("Market")
        .var("lastPrice", Sensitivity::Low)
        .var("exchangeRate", Sensitivity::Critical)
        .function(sync)
        .function(redeem)
        .build()]));

    assert!(detect(&input, "Market.sync").is_empty());
}
