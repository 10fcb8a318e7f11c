//! Program-model fixtures
//!
//! Small protocols, each built to exhibit one interaction pattern.

use super::builders::*;
use crossfn_engine::shared::models::{
    AnalysisInput, CondExpr, Invariant, Param, Sensitivity, ValueProbe,
};

/// `deposit` writes `totalSupply`, calls the asset, then writes `totalAssets`;
/// `convertToShares` reads both.
pub fn stale_deposit_vault() -> AnalysisInput {
    let deposit = FunctionBuilder::new("Vault", "deposit")
        .param(Param::amount("assets").with_samples([1000]))
        .ops([
            read("Vault.totalSupply", "supply"),
            write("Vault.totalSupply", local("supply").add(param("assets"))),
            call("asset.transferFrom", None),
            read("Vault.totalAssets", "held"),
            write("Vault.totalAssets", local("held").add(param("assets"))),
        ])
        .build();
    let convert = FunctionBuilder::new("Vault", "convertToShares")
        .view()
        .param(Param::amount("assets"))
        .ops([
            read("Vault.totalSupply", "supply"),
            read("Vault.totalAssets", "held"),
            ret(param("assets").mul(local("supply")).div(local("held"))),
        ])
        .build();

    AnalysisInput::new(model(vec![ContractBuilder::new("Vault")
        .var("totalAssets", Sensitivity::Critical)
        .var("totalSupply", Sensitivity::Critical)
        .function(deposit)
        .function(convert)
        .build()]))
}

/// `addAssets(x)`, `borrow(y)` checked against a stale headroom, and
/// `removeAssets(z)`, under `totalAssets >= totalDebt`.
pub fn lending_pool() -> AnalysisInput {
    let add = FunctionBuilder::new("Pool", "addAssets")
        .param(Param::amount("x").with_samples([100]))
        .precondition(CondExpr::ge(param("x"), constant(0)))
        .ops([
            read("Pool.totalAssets", "assets"),
            write("Pool.totalAssets", local("assets").add(param("x"))),
        ])
        .build();
    let borrow = FunctionBuilder::new("Pool", "borrow")
        .param(Param::amount("y").with_samples([90]))
        .precondition(CondExpr::le(
            param("y"),
            storage("Pool.totalAssets").sub(storage("Pool.totalDebt")),
        ))
        .ops([
            read("Pool.totalDebt", "debt"),
            write("Pool.totalDebt", local("debt").add(param("y"))),
        ])
        .build();
    let remove = FunctionBuilder::new("Pool", "removeAssets")
        .param(Param::amount("z").with_samples([20]))
        .precondition(CondExpr::le(param("z"), storage("Pool.totalAssets")))
        .ops([
            read("Pool.totalAssets", "assets"),
            write("Pool.totalAssets", local("assets").sub(param("z"))),
        ])
        .build();

    let mut input = AnalysisInput::new(model(vec![ContractBuilder::new("Pool")
        .var("totalAssets", Sensitivity::Critical)
        .var("totalDebt", Sensitivity::Critical)
        .function(add)
        .function(borrow)
        .function(remove)
        .build()]));
    input.invariants.push(Invariant::explicit(
        "solvency",
        CondExpr::ge(storage("Pool.totalAssets"), storage("Pool.totalDebt")),
    ));
    input
}

/// ERC-4626 style vault: `deposit` mints through `_convertToShares`,
/// `reportProfit` raises `totalAssets` only.
pub fn share_price_vault() -> AnalysisInput {
    let convert = FunctionBuilder::new("Vault", "_convertToShares")
        .internal()
        .param(Param::amount("assets"))
        .ops([
            read("Vault.totalSupply", "supply"),
            read("Vault.totalAssets", "held"),
            branch(
                CondExpr::eq(local("supply"), constant(0)),
                vec![ret(param("assets"))],
                vec![ret(param("assets").mul(local("supply")).div(local("held")))],
            ),
        ])
        .build();
    let deposit = FunctionBuilder::new("Vault", "deposit")
        .param(Param::amount("assets").with_samples([1000]))
        .ops([
            internal_call("Vault._convertToShares", vec![param("assets")], Some("shares")),
            read("Vault.totalSupply", "supply"),
            read("Vault.totalAssets", "held"),
            write("Vault.totalSupply", local("supply").add(local("shares"))),
            write("Vault.totalAssets", local("held").add(param("assets"))),
            ret(local("shares")),
        ])
        .build();
    let report = FunctionBuilder::new("Vault", "reportProfit")
        .role("keeper")
        .param(Param::amount("profit").with_samples([500]))
        .ops([
            read("Vault.totalAssets", "held"),
            write("Vault.totalAssets", local("held").add(param("profit"))),
        ])
        .build();

    let mut input = AnalysisInput::new(model_with_roles(
        vec![ContractBuilder::new("Vault")
            .var("totalAssets", Sensitivity::Critical)
            .var("totalSupply", Sensitivity::Critical)
            .function(convert)
            .function(deposit)
            .function(report)
            .build()],
        &[("keeper", false)],
    ));
    input.probes.push(ValueProbe::new(
        "assetsPerShare",
        storage("Vault.totalAssets").div(storage("Vault.totalSupply")),
    ));
    input
}

/// Anyone can `sync` the exchange rate from an oracle; `redeem` prices with it.
/// With `corroborated`, the oracle answer is checked against a TWAP first.
pub fn oracle_sync(corroborated: bool) -> AnalysisInput {
    let mut sync = FunctionBuilder::new("Market", "sync").op(call("oracle.latestAnswer", Some("price")));
    if corroborated {
        sync = sync.ops([
            call("twap.consult", Some("reference")),
            require(CondExpr::le(local("price"), local("reference").mul(constant(2)))),
        ]);
    }
    let sync = sync.op(write("Market.exchangeRate", local("price"))).build();
    let redeem = FunctionBuilder::new("Market", "redeem")
        .param(Param::amount("shares"))
        .ops([
            read("Market.exchangeRate", "rate"),
            ret(param("shares").mul(local("rate"))),
        ])
        .build();

    AnalysisInput::new(model(vec![ContractBuilder::new("Market")
        .var("exchangeRate", Sensitivity::Critical)
        .function(sync)
        .function(redeem)
        .build()]))
}

/// Two round-up fees on every withdrawal
pub fn fee_vault() -> AnalysisInput {
    let withdraw = FunctionBuilder::new("Fees", "withdraw")
        .param(Param::amount("assets").with_samples([1000]))
        .ops([
            read("Fees.collected", "fees"),
            write(
                "Fees.collected",
                local("fees")
                    .add(param("assets").div_up(constant(100)))
                    .add(param("assets").div_up(constant(1000))),
            ),
        ])
        .build();

    AnalysisInput::new(model(vec![ContractBuilder::new("Fees")
        .var("collected", Sensitivity::High)
        .function(withdraw)
        .build()]))
}

/// Anyone may move the deposit cap; `deposit` requires the amount fits.
pub fn capped_vault() -> AnalysisInput {
    let set_cap = FunctionBuilder::new("Capped", "setCap")
        .param(Param::new("cap"))
        .op(write("Capped.cap", param("cap")))
        .build();
    let deposit = FunctionBuilder::new("Capped", "deposit")
        .param(Param::amount("assets").with_samples([500]))
        .ops([
            read("Capped.cap", "cap"),
            require(CondExpr::le(param("assets"), local("cap"))),
            read("Capped.totalAssets", "held"),
            write("Capped.totalAssets", local("held").add(param("assets"))),
        ])
        .build();

    AnalysisInput::new(model(vec![ContractBuilder::new("Capped")
        .var("cap", Sensitivity::Medium)
        .var("totalAssets", Sensitivity::High)
        .function(set_cap)
        .function(deposit)
        .build()]))
}

/// `deposit` mints, calls the token, then books the assets; `withdraw` pays
/// out against both totals. `guarded` puts both behind the same lock.
pub fn reentrant_vault(guarded: bool) -> AnalysisInput {
    let mut deposit = FunctionBuilder::new("Vault", "deposit")
        .param(Param::amount("assets").with_samples([1000]))
        .ops([
            read("Vault.totalSupply", "supply"),
            write("Vault.totalSupply", local("supply").add(param("assets"))),
            call("token.transferFrom", None),
            read("Vault.totalAssets", "held"),
            write("Vault.totalAssets", local("held").add(param("assets"))),
        ]);
    let mut withdraw = FunctionBuilder::new("Vault", "withdraw")
        .param(Param::amount("shares").with_samples([100]))
        .ops([
            read("Vault.totalSupply", "supply"),
            read("Vault.totalAssets", "held"),
            write("Vault.totalSupply", local("supply").sub(param("shares"))),
            ret(param("shares").mul(local("held")).div(local("supply"))),
        ]);
    if guarded {
        deposit = deposit.guard("lock");
        withdraw = withdraw.guard("lock");
    }

    AnalysisInput::new(model(vec![ContractBuilder::new("Vault")
        .var("totalAssets", Sensitivity::Critical)
        .var("totalSupply", Sensitivity::Critical)
        .function(deposit.build())
        .function(withdraw.build())
        .build()]))
}
