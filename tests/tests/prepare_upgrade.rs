use alloy::primitives::Address;
use eyre::Result;
use release_common::types::DeploymentRecord;
use scripts::{commands::prepare_upgrade, errors::ScriptError};
use tests::{
    mocks::{MockUpgrades, UpgradeCall},
    utils::TestEnv,
};

/// The proxy of the `Box` contract seeded in the address book
const BOX_PROXY: Address = Address::with_last_byte(0xa0);
/// The implementation of the `Box` contract seeded in the address book
const BOX_IMPLEMENTATION: Address = Address::with_last_byte(0xb0);

/// An environment whose address book holds a deployed `Box`
fn setup() -> Result<TestEnv> {
    let env = TestEnv::new()?;
    env.seed_address_book("Box", DeploymentRecord::proxy(BOX_PROXY, BOX_IMPLEMENTATION))?;
    Ok(env)
}

#[tokio::test]
async fn test_prepare_only_touches_implementation() -> Result<()> {
    let env = setup()?;
    let backend = MockUpgrades::new();

    prepare_upgrade(&env.ctx, &backend, &["Box".to_string()]).await?;

    assert_eq!(
        backend.calls(),
        vec![UpgradeCall::PrepareUpgrade { proxy: BOX_PROXY, contract: "Box".to_string() }]
    );

    let new_implementation = Address::with_last_byte(0x10);
    let record = env.record("Box")?;
    assert_eq!(record.address, Some(BOX_PROXY));
    assert_eq!(record.implementation, Some(new_implementation));

    // The manifest only learns about the new implementation
    let manifest = env.manifest()?;
    assert_eq!(
        manifest.get("Box"),
        Some(&DeploymentRecord::implementation_only(new_implementation))
    );

    Ok(())
}

#[tokio::test]
async fn test_prepare_writes_summary() -> Result<()> {
    let env = setup()?;
    let backend = MockUpgrades::new();

    prepare_upgrade(&env.ctx, &backend, &["Box".to_string()]).await?;

    let implementation = Address::with_last_byte(0x10);
    assert_eq!(
        env.summary()?,
        format!(
            "## Implementation contracts deployed\n\n- Box at \
             [`{implementation}`](https://etherscan.io/address/{implementation})\n"
        )
    );

    Ok(())
}

#[tokio::test]
async fn test_prepare_unknown_contract() -> Result<()> {
    let env = setup()?;
    let backend = MockUpgrades::new();

    let contracts = vec!["Greeter".to_string(), "Box".to_string()];
    let res = prepare_upgrade(&env.ctx, &backend, &contracts).await;

    assert!(matches!(res, Err(ScriptError::NotFound(_))));
    assert!(backend.calls().is_empty());
    assert_eq!(env.record("Box")?.implementation, Some(BOX_IMPLEMENTATION));
    assert!(env.manifest()?.is_empty());

    Ok(())
}

#[tokio::test]
async fn test_prepare_requires_proxy_address() -> Result<()> {
    let env = setup()?;
    env.seed_address_book("Token", DeploymentRecord::implementation_only(BOX_IMPLEMENTATION))?;
    let backend = MockUpgrades::new();

    let res = prepare_upgrade(&env.ctx, &backend, &["Token".to_string()]).await;

    assert!(matches!(res, Err(ScriptError::NotFound(_))));
    assert!(backend.calls().is_empty());

    Ok(())
}

#[tokio::test]
async fn test_prepare_failure_keeps_completed_work() -> Result<()> {
    let env = setup()?;
    env.seed_address_book("Token", DeploymentRecord::proxy(BOX_IMPLEMENTATION, BOX_PROXY))?;
    let backend = MockUpgrades::failing_on("Token");

    let contracts = vec!["Box".to_string(), "Token".to_string()];
    let res = prepare_upgrade(&env.ctx, &backend, &contracts).await;

    assert!(matches!(res, Err(ScriptError::ContractDeployment(_))));
    assert_eq!(env.record("Box")?.implementation, Some(Address::with_last_byte(0x10)));
    assert_eq!(env.record("Token")?.implementation, Some(BOX_PROXY));
    assert!(env.summary()?.contains("- Box at "));

    Ok(())
}
