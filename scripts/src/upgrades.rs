//! Deployment of UUPS proxies & implementation contracts.
//!
//! Concretely, new contracts are deployed behind an
//! [`ERC1967Proxy`](https://docs.openzeppelin.com/contracts/4.x/api/proxy#ERC1967Proxy)
//! whose upgrade logic lives in the implementation itself (UUPS, ERC-1822).
//! Preparing an upgrade deploys a new implementation without touching the proxy;
//! the proxy is pointed at it later through an approved proposal.

use alloy::{
    dyn_abi::{DynSolValue, JsonAbiExt, Specifier},
    json_abi::JsonAbi,
    network::TransactionBuilder,
    primitives::{Address, Bytes, B256, U256},
    providers::{DynProvider, Provider},
    rpc::types::TransactionRequest,
    sol_types::SolValue,
};
use tracing::{debug, info};

use crate::{
    artifacts::{Artifact, ArtifactSource},
    constants::{PROXY_ARTIFACT, IMPLEMENTATION_STORAGE_SLOT, INITIALIZER_NAME},
    errors::ScriptError,
    solidity::IProxiable,
};

/// The addresses resulting from deploying a contract behind a proxy
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ProxyDeployment {
    /// The address of the new proxy
    pub proxy: Address,
    /// The implementation the proxy delegates to
    pub implementation: Address,
}

/// The upgradeable deployment mechanism used by the deploy & prepare-upgrade tasks
pub trait UpgradesBackend {
    /// Deploy the named contract behind a new proxy, calling its initializer
    /// with the given arguments
    #[allow(async_fn_in_trait)]
    async fn deploy_proxy(
        &self,
        contract: &str,
        init_args: &[String],
    ) -> Result<ProxyDeployment, ScriptError>;

    /// Deploy a new implementation of the named contract for the given proxy,
    /// leaving the proxy untouched
    #[allow(async_fn_in_trait)]
    async fn prepare_upgrade(&self, proxy: Address, contract: &str)
        -> Result<Address, ScriptError>;
}

/// Read access to deployed proxies, used to resolve what a proxy delegates to
pub trait ProxyReader {
    /// The implementation the proxy at `proxy` delegates to, `None` if its
    /// ERC-1967 implementation slot is empty
    #[allow(async_fn_in_trait)]
    async fn implementation_of(&self, proxy: Address) -> Result<Option<Address>, ScriptError>;
}

impl ProxyReader for DynProvider {
    async fn implementation_of(&self, proxy: Address) -> Result<Option<Address>, ScriptError> {
        let implementation = read_implementation_slot(self, proxy).await?;
        Ok((!implementation.is_zero()).then_some(implementation))
    }
}

/// Read the implementation address out of a proxy's ERC-1967 slot
async fn read_implementation_slot(
    provider: &DynProvider,
    proxy: Address,
) -> Result<Address, ScriptError> {
    let slot = U256::from_be_bytes(IMPLEMENTATION_STORAGE_SLOT.0);
    let word = provider
        .get_storage_at(proxy, slot)
        .await
        .map_err(|e| ScriptError::ContractInteraction(e.to_string()))?;

    Ok(Address::from_word(B256::from(word.to_be_bytes::<32>())))
}

/// An [`UpgradesBackend`] sending transactions through an RPC provider
pub struct RpcUpgrades<A> {
    /// The provider, with the deployer's wallet attached
    provider: DynProvider,
    /// The source of contract artifacts
    artifacts: A,
}

impl<A: ArtifactSource> RpcUpgrades<A> {
    /// Create a backend deploying through `provider`
    pub fn new(provider: DynProvider, artifacts: A) -> Self {
        Self { provider, artifacts }
    }

    /// Deploy the given creation code, returning the new contract's address
    async fn deploy_code(&self, code: Bytes) -> Result<Address, ScriptError> {
        let tx = TransactionRequest::default().with_deploy_code(code);
        let receipt = self
            .provider
            .send_transaction(tx)
            .await
            .map_err(|e| ScriptError::ContractDeployment(e.to_string()))?
            .get_receipt()
            .await
            .map_err(|e| ScriptError::ContractDeployment(e.to_string()))?;

        if !receipt.status() {
            return Err(ScriptError::ContractDeployment(format!(
                "deployment reverted in tx {}",
                receipt.transaction_hash
            )));
        }

        receipt.contract_address.ok_or_else(|| {
            ScriptError::ContractDeployment("receipt carries no contract address".to_string())
        })
    }

    /// Deploy the implementation of the named contract, ensuring it is UUPS-compatible
    async fn deploy_implementation(
        &self,
        contract: &str,
    ) -> Result<(Address, Artifact), ScriptError> {
        let artifact = self.artifacts.read_artifact(contract)?;
        if artifact.bytecode.is_empty() {
            return Err(ScriptError::ArtifactParsing(format!(
                "{contract} has no bytecode, is it abstract?"
            )));
        }

        let implementation = self.deploy_code(artifact.bytecode.clone()).await?;
        debug!("Deployed implementation of {contract} at {implementation}");
        self.check_proxiable(contract, implementation).await?;

        Ok((implementation, artifact))
    }

    /// Ensure the contract at `address` reports the ERC-1967 implementation slot
    /// as its `proxiableUUID`
    async fn check_proxiable(&self, contract: &str, address: Address) -> Result<(), ScriptError> {
        let uuid = IProxiable::new(address, self.provider.clone())
            .proxiableUUID()
            .call()
            .await
            .map_err(|e| {
                ScriptError::ContractInteraction(format!(
                    "{contract} at {address} is not UUPS proxiable: {e}"
                ))
            })?;

        if uuid != IMPLEMENTATION_STORAGE_SLOT {
            return Err(ScriptError::ContractInteraction(format!(
                "{contract} at {address} reports unexpected proxiableUUID {uuid}"
            )));
        }

        Ok(())
    }
}

impl<A: ArtifactSource> UpgradesBackend for RpcUpgrades<A> {
    async fn deploy_proxy(
        &self,
        contract: &str,
        init_args: &[String],
    ) -> Result<ProxyDeployment, ScriptError> {
        let (implementation, artifact) = self.deploy_implementation(contract).await?;
        let init_data = initializer_calldata(&artifact.json_abi()?, init_args)?;

        let proxy_artifact = self.artifacts.read_artifact(PROXY_ARTIFACT)?;
        let constructor_args = (implementation, init_data).abi_encode_params();
        let code = [&proxy_artifact.bytecode[..], constructor_args.as_slice()].concat();
        let proxy = self.deploy_code(code.into()).await?;

        let recorded = read_implementation_slot(&self.provider, proxy).await?;
        if recorded != implementation {
            return Err(ScriptError::ContractDeployment(format!(
                "proxy at {proxy} points at {recorded} instead of {implementation}"
            )));
        }

        Ok(ProxyDeployment {
            proxy,
            implementation,
        })
    }

    async fn prepare_upgrade(
        &self,
        proxy: Address,
        contract: &str,
    ) -> Result<Address, ScriptError> {
        let code = self
            .provider
            .get_code_at(proxy)
            .await
            .map_err(|e| ScriptError::ContractInteraction(e.to_string()))?;
        if code.is_empty() {
            return Err(ScriptError::ContractInteraction(format!(
                "no contract deployed at proxy address {proxy}"
            )));
        }

        let current = read_implementation_slot(&self.provider, proxy).await?;
        info!(" Current implementation for {contract} at {current}");

        let (implementation, _) = self.deploy_implementation(contract).await?;
        Ok(implementation)
    }
}

/// Encode a call to the contract's initializer with the given string arguments,
/// coerced to the initializer's parameter types.
///
/// A contract without an initializer gets empty calldata, provided no
/// arguments were given.
pub fn initializer_calldata(abi: &JsonAbi, args: &[String]) -> Result<Bytes, ScriptError> {
    let Some(overloads) = abi.function(INITIALIZER_NAME) else {
        if args.is_empty() {
            return Ok(Bytes::new());
        }
        return Err(ScriptError::CalldataConstruction(format!(
            "contract has no `{INITIALIZER_NAME}` function but {} arguments were given",
            args.len()
        )));
    };

    let function = overloads
        .iter()
        .find(|f| f.inputs.len() == args.len())
        .ok_or_else(|| {
            ScriptError::CalldataConstruction(format!(
                "no `{INITIALIZER_NAME}` overload takes {} arguments",
                args.len()
            ))
        })?;

    let values = function
        .inputs
        .iter()
        .zip(args)
        .map(|(param, arg)| {
            let ty = param
                .resolve()
                .map_err(|e| ScriptError::CalldataConstruction(e.to_string()))?;
            ty.coerce_str(arg).map_err(|e| {
                ScriptError::CalldataConstruction(format!("invalid value for `{}`: {e}", param.name))
            })
        })
        .collect::<Result<Vec<DynSolValue>, _>>()?;

    let calldata = function
        .abi_encode_input(&values)
        .map_err(|e| ScriptError::CalldataConstruction(e.to_string()))?;

    Ok(calldata.into())
}
