use alloy::primitives::Address;
use eyre::Result;
use release_common::types::DeploymentRecord;
use scripts::{commands::deploy_proxy, errors::ScriptError};
use tests::{
    mocks::{MockUpgrades, UpgradeCall},
    utils::TestEnv,
};

/// Turn string literals into owned contract names
fn names(contracts: &[&str]) -> Vec<String> {
    contracts.iter().map(|c| c.to_string()).collect()
}

#[tokio::test]
async fn test_deploy_records_proxy_and_implementation() -> Result<()> {
    let env = TestEnv::new()?;
    let backend = MockUpgrades::new();

    deploy_proxy(&env.ctx, &backend, &names(&["Box", "Token"]), &[]).await?;

    // Implementations are deployed before their proxies
    let box_record = env.record("Box")?;
    assert_eq!(box_record.implementation, Some(Address::with_last_byte(0x10)));
    assert_eq!(box_record.address, Some(Address::with_last_byte(0x11)));

    let token_record = env.record("Token")?;
    assert_eq!(token_record.implementation, Some(Address::with_last_byte(0x12)));
    assert_eq!(token_record.address, Some(Address::with_last_byte(0x13)));

    let manifest = env.manifest()?;
    assert_eq!(manifest.get("Box"), Some(&box_record));
    assert_eq!(manifest.get("Token"), Some(&token_record));

    Ok(())
}

#[tokio::test]
async fn test_deploy_writes_summary() -> Result<()> {
    let env = TestEnv::new()?;
    let backend = MockUpgrades::new();

    deploy_proxy(&env.ctx, &backend, &names(&["Box"]), &[]).await?;

    let summary = env.summary()?;
    let proxy = Address::with_last_byte(0x11);
    assert!(summary.starts_with("## Contracts deployed\n\n- Box at "));
    assert!(summary.contains(&format!("[`{proxy}`](https://etherscan.io/address/{proxy})")));

    Ok(())
}

#[tokio::test]
async fn test_deploy_failure_stops_run() -> Result<()> {
    let env = TestEnv::new()?;
    let previous =
        DeploymentRecord::proxy(Address::with_last_byte(0xa0), Address::with_last_byte(0xb0));
    env.seed_address_book("Vault", previous)?;

    let backend = MockUpgrades::failing_on("Token");
    let res = deploy_proxy(&env.ctx, &backend, &names(&["Box", "Token", "Vault"]), &[]).await;
    assert!(matches!(res, Err(ScriptError::ContractDeployment(_))));

    // Nothing is attempted past the failing contract
    let attempted: Vec<_> = backend
        .calls()
        .into_iter()
        .map(|call| match call {
            UpgradeCall::DeployProxy { contract, .. } => contract,
            UpgradeCall::PrepareUpgrade { contract, .. } => contract,
        })
        .collect();
    assert_eq!(attempted, names(&["Box", "Token"]));

    assert!(env.record("Box")?.address.is_some());
    assert!(env.record("Token").is_err());
    assert_eq!(env.record("Vault")?, previous);

    // The summary still covers the work that completed
    let summary = env.summary()?;
    assert!(summary.contains("- Box at "));
    assert!(!summary.contains("Token"));

    Ok(())
}

#[tokio::test]
async fn test_deploy_passes_init_args() -> Result<()> {
    let env = TestEnv::new()?;
    let backend = MockUpgrades::new();
    let init_args = names(&["42"]);

    deploy_proxy(&env.ctx, &backend, &names(&["Box"]), &init_args).await?;

    assert_eq!(
        backend.calls(),
        vec![UpgradeCall::DeployProxy { contract: "Box".to_string(), init_args }]
    );

    Ok(())
}

#[tokio::test]
async fn test_init_args_rejected_for_many_contracts() -> Result<()> {
    let env = TestEnv::new()?;
    let backend = MockUpgrades::new();

    let res = deploy_proxy(&env.ctx, &backend, &names(&["Box", "Token"]), &names(&["42"])).await;

    assert!(matches!(res, Err(ScriptError::Config(_))));
    assert!(backend.calls().is_empty());
    assert!(!env.address_book_path().exists());

    Ok(())
}

#[tokio::test]
async fn test_deploy_nothing() -> Result<()> {
    let env = TestEnv::new()?;
    let backend = MockUpgrades::new();

    deploy_proxy(&env.ctx, &backend, &[], &[]).await?;

    assert!(backend.calls().is_empty());
    assert!(env.summary()?.is_empty());

    Ok(())
}
