//! Implementations of the release tasks

use alloy::primitives::Address;
use itertools::Itertools;
use release_common::{
    networks::Network,
    store::DeploymentStores,
    types::{DeploymentRecord, ReleaseManifest, ReleaseMetadata},
};
use serde_json::json;
use tracing::{debug, info, warn};

use crate::{
    artifacts::ArtifactSource,
    constants::{DEFAULT_PROPOSAL_TITLE, MULTISIG_TYPE},
    defender::{
        AdminService, BytecodeVerification, BytecodeVerificationRequest, MatchType, Proposal,
        ProposalContract, ProposalRequest, ProposalStep,
    },
    errors::{ScriptError, VerificationFailure},
    etherscan::{SourceTarget, SourceVerifier},
    provenance::ProvenanceProvider,
    solidity::upgrade_to_fragment,
    summary::{approval_summary, implementations_summary, proxies_summary, SummarySink},
    upgrades::{ProxyReader, UpgradesBackend},
};

/// The kind of every step of an upgrade proposal
const CUSTOM_STEP_KIND: &str = "custom";
/// The kind of an upgrade proposal
const BATCH_PROPOSAL_KIND: &str = "batch";

/// Everything a task needs besides its service clients
pub struct TaskContext<P> {
    /// The network the task runs against
    pub network: Network,
    /// The address book & release manifest
    pub stores: DeploymentStores,
    /// Where to write the markdown summary of the run, if anywhere
    pub summary: Option<SummarySink>,
    /// The source of the working tree's version control info
    pub provenance: P,
}

impl<P: ProvenanceProvider> TaskContext<P> {
    /// The chain ID of the network the task runs against
    pub fn chain_id(&self) -> u64 {
        self.network.chain_id
    }

    /// Log the start of a task along with the commit it runs from
    fn log_start(&self, action: &str, contracts: &[String]) {
        let commit = self.provenance.commit_hash().unwrap_or_else(|e| {
            warn!("Could not determine the current commit: {e}");
            "unknown".to_string()
        });

        info!(
            "{action} contracts {} from commit {commit} on chain {}",
            contracts.join(", "),
            self.chain_id()
        );
    }

    /// Append the summary built from the release manifest, then return the
    /// task's result.
    ///
    /// The summary is written whether or not the task succeeded; an error
    /// writing it only surfaces if the task itself succeeded.
    fn finish_with_summary<F>(
        &self,
        res: Result<(), ScriptError>,
        summarize: F,
    ) -> Result<(), ScriptError>
    where
        F: FnOnce(&Network, &ReleaseManifest) -> Option<String>,
    {
        let summary_res = self.append_summary(summarize);
        match (res, summary_res) {
            (Err(e), Err(summary_err)) => {
                warn!("Could not write summary: {summary_err}");
                Err(e)
            },
            (res, summary_res) => res.and(summary_res),
        }
    }

    /// Append the summary built from the release manifest, if a sink is configured
    fn append_summary<F>(&self, summarize: F) -> Result<(), ScriptError>
    where
        F: FnOnce(&Network, &ReleaseManifest) -> Option<String>,
    {
        let Some(sink) = &self.summary else {
            return Ok(());
        };

        let manifest = self.stores.release.list_manifest()?;
        match summarize(&self.network, &manifest) {
            Some(summary) => sink.append(&summary),
            None => Ok(()),
        }
    }
}

// ----------
// | Deploy |
// ----------

/// Ensure initializer arguments are only given when deploying a single contract
pub fn check_init_args(contracts: &[String], init_args: &[String]) -> Result<(), ScriptError> {
    if !init_args.is_empty() && contracts.len() != 1 {
        return Err(ScriptError::Config(format!(
            "initializer arguments require exactly one contract, got {}",
            contracts.len()
        )));
    }

    Ok(())
}

/// Deploy each contract behind a new proxy, in order, stopping at the first failure.
///
/// The summary of the release's deployments is written in any case.
pub async fn deploy_proxy<P: ProvenanceProvider, U: UpgradesBackend>(
    ctx: &TaskContext<P>,
    backend: &U,
    contracts: &[String],
    init_args: &[String],
) -> Result<(), ScriptError> {
    if contracts.is_empty() {
        return Ok(());
    }
    check_init_args(contracts, init_args)?;

    ctx.log_start("Deploying", contracts);
    let res = deploy_all(ctx, backend, contracts, init_args).await;
    ctx.finish_with_summary(res, proxies_summary)
}

/// Deploy & record each contract
async fn deploy_all<P, U: UpgradesBackend>(
    ctx: &TaskContext<P>,
    backend: &U,
    contracts: &[String],
    init_args: &[String],
) -> Result<(), ScriptError> {
    for contract in contracts {
        info!("- Deploying contract {contract}");
        let deployment = backend.deploy_proxy(contract, init_args).await?;

        info!(
            " Deployed {contract} at {} with implementation {}",
            deployment.proxy, deployment.implementation
        );
        let record = DeploymentRecord::proxy(deployment.proxy, deployment.implementation);
        ctx.stores.write_deploy(ctx.network.chain_id, contract, &record)?;
    }

    Ok(())
}

// -----------
// | Prepare |
// -----------

/// Deploy a new implementation for each contract's existing proxy, in order,
/// stopping at the first failure.
///
/// Proxies are left untouched; only the implementations are recorded.
pub async fn prepare_upgrade<P: ProvenanceProvider, U: UpgradesBackend>(
    ctx: &TaskContext<P>,
    backend: &U,
    contracts: &[String],
) -> Result<(), ScriptError> {
    if contracts.is_empty() {
        return Ok(());
    }

    ctx.log_start("Preparing upgrade for", contracts);
    let res = prepare_all(ctx, backend, contracts).await;
    ctx.finish_with_summary(res, implementations_summary)
}

/// Deploy & record a new implementation for each contract
async fn prepare_all<P, U: UpgradesBackend>(
    ctx: &TaskContext<P>,
    backend: &U,
    contracts: &[String],
) -> Result<(), ScriptError> {
    let chain_id = ctx.network.chain_id;
    for contract in contracts {
        info!("- Preparing upgrade for {contract}");
        let proxy = ctx.stores.address_book.get(chain_id, contract)?.address.ok_or_else(|| {
            ScriptError::NotFound(format!("no proxy recorded for {contract} on chain {chain_id}"))
        })?;

        let implementation = backend.prepare_upgrade(proxy, contract).await?;
        info!(" Deployed new implementation for {contract} at {implementation}");

        let record = DeploymentRecord::implementation_only(implementation);
        ctx.stores.write_deploy(chain_id, contract, &record)?;
    }

    Ok(())
}

// -----------
// | Propose |
// -----------

/// A proxy to point at a new implementation
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PlannedUpgrade {
    /// The name of the contract
    pub name: String,
    /// The address of the proxy
    pub proxy: Address,
    /// The new implementation
    pub implementation: Address,
    /// The contract's ABI, including the upgrade function, as a JSON string
    pub abi: String,
}

/// Propose pointing every proxy upgraded by the release at its new
/// implementation, as a single batch approved by `multisig`
pub async fn propose_upgrade<P, A: AdminService, S: ArtifactSource>(
    ctx: &TaskContext<P>,
    admin: &A,
    artifacts: &S,
    multisig: Address,
) -> Result<Proposal, ScriptError> {
    let network_name = ctx.network.admin_name().ok_or_else(|| {
        ScriptError::Config(format!("{} is not supported by the admin service", ctx.network))
    })?;

    let upgrades = plan_upgrades(ctx, artifacts)?;
    if upgrades.is_empty() {
        return Err(ScriptError::NothingToPropose);
    }

    info!(
        "Creating upgrade proposal for contracts {}",
        upgrades.iter().map(|u| u.name.as_str()).join(", ")
    );
    for upgrade in &upgrades {
        info!("- {} at {} to {}", upgrade.name, upgrade.proxy, upgrade.implementation);
    }

    let metadata = ctx.stores.release.read_metadata()?.unwrap_or_default();
    let request = build_upgrade_proposal(network_name, multisig, &upgrades, &metadata);

    let proposal = admin.create_proposal(&request).await?;
    let link = proposal.link();
    info!("Created upgrade proposal for multisig {multisig} at {link}");

    if let Some(sink) = &ctx.summary {
        sink.write(&approval_summary(&ctx.network, &link, multisig))?;
    }

    Ok(proposal)
}

/// Resolve the proxy & ABI of every contract the release holds a new implementation for
fn plan_upgrades<P, S: ArtifactSource>(
    ctx: &TaskContext<P>,
    artifacts: &S,
) -> Result<Vec<PlannedUpgrade>, ScriptError> {
    let chain_id = ctx.network.chain_id;
    let manifest = ctx.stores.release.list_manifest()?;
    let book = ctx.stores.address_book.load()?;

    manifest
        .upgraded()
        .map(|(name, implementation)| -> Result<PlannedUpgrade, ScriptError> {
            let proxy = book.get(chain_id, name)?.address.ok_or_else(|| {
                ScriptError::NotFound(format!("no proxy recorded for {name} on chain {chain_id}"))
            })?;

            let mut abi = artifacts.read_artifact(name)?.abi;
            abi.push(upgrade_to_fragment());
            let abi = serde_json::to_string(&abi)
                .map_err(|e| ScriptError::ArtifactParsing(e.to_string()))?;

            Ok(PlannedUpgrade { name: name.clone(), proxy, implementation, abi })
        })
        .collect()
}

/// Build the batch proposal upgrading every planned proxy, one step per contract
pub fn build_upgrade_proposal(
    network_name: &str,
    multisig: Address,
    upgrades: &[PlannedUpgrade],
    metadata: &ReleaseMetadata,
) -> ProposalRequest {
    let contract = upgrades
        .iter()
        .map(|u| ProposalContract {
            name: u.name.clone(),
            network: network_name.to_string(),
            address: u.proxy,
            abi: u.abi.clone(),
        })
        .collect();

    let steps = upgrades
        .iter()
        .map(|u| ProposalStep {
            contract_id: format!("{network_name}-{}", u.proxy),
            target_function: upgrade_to_fragment(),
            function_inputs: vec![u.implementation.to_string()],
            kind: CUSTOM_STEP_KIND.to_string(),
        })
        .collect();

    let title = metadata
        .title
        .clone()
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| DEFAULT_PROPOSAL_TITLE.to_string());
    let description = metadata.description.clone().filter(|d| !d.is_empty()).unwrap_or_else(|| {
        upgrades
            .iter()
            .map(|u| format!("{} at {} to {}", u.name, u.proxy, u.implementation))
            .join("\n")
    });

    ProposalRequest {
        contract,
        title,
        description,
        kind: BATCH_PROPOSAL_KIND.to_string(),
        via: multisig,
        via_type: MULTISIG_TYPE.to_string(),
        metadata: json!({}),
        steps,
    }
}

// ----------
// | Verify |
// ----------

/// Verify every deployment of the release, first publishing sources on the
/// block explorer, then checking bytecode on the admin service.
///
/// Every contract goes through both passes; failures are collected & reported together.
pub async fn verify_deployed<P, R, V, A, S>(
    ctx: &TaskContext<P>,
    proxies: &R,
    explorer: &V,
    admin: &A,
    artifacts: &S,
    reference_url: Option<String>,
) -> Result<(), ScriptError>
where
    P: ProvenanceProvider,
    R: ProxyReader,
    V: SourceVerifier,
    A: AdminService,
    S: ArtifactSource,
{
    let network_name = ctx.network.admin_name().ok_or_else(|| {
        ScriptError::Config(format!("{} is not supported by the admin service", ctx.network))
    })?;
    let reference_url = match reference_url {
        Some(url) => url,
        None => ctx.provenance.remote_url()?,
    };

    let manifest = ctx.stores.release.list_manifest()?;
    let mut failures = Vec::new();

    // Sources are published for the implementation & linked to the proxy
    // when there is one
    for (name, record) in manifest.iter() {
        let Some(address) = record.proxy_or_implementation() else {
            continue;
        };

        let implementation = match resolve_implementation(proxies, record).await {
            Ok(implementation) => implementation,
            Err(error) => {
                warn!(" Error resolving the implementation of {name}: {error}");
                failures.push(VerificationFailure { contract: name.clone(), error });
                continue;
            },
        };

        info!("Verifying source for {name} at {address} on the block explorer");
        let target = SourceTarget { contract: name, address, implementation };

        match explorer.verify_source(&target).await {
            Ok(()) => info!(" Source verified"),
            Err(ScriptError::AlreadyVerified) => info!(" Source code already verified"),
            Err(error) => {
                warn!(" Error verifying source code: {error}");
                failures.push(VerificationFailure { contract: name.clone(), error });
            },
        }
    }

    // Bytecode is only meaningful for implementations
    for (name, record) in manifest.iter() {
        let Some(address) = record.implementation_or_proxy() else {
            continue;
        };

        info!("Verifying artifact for {name} at {address} on the admin service");
        match verify_bytecode(admin, artifacts, name, address, network_name, &reference_url).await
        {
            Ok(verification) => info!(
                " Bytecode match for {name} is {}, build info sha256 {}",
                verification.match_type,
                verification.provided_sha256.as_deref().unwrap_or("unknown")
            ),
            Err(error) => {
                warn!(" Error verifying artifact: {error}");
                failures.push(VerificationFailure { contract: name.clone(), error });
            },
        }
    }

    if failures.is_empty() {
        Ok(())
    } else {
        Err(ScriptError::Verification(failures))
    }
}

/// The implementation behind a record's proxy, if it has one.
///
/// A record holding only a proxy address has its implementation read from the
/// proxy's ERC-1967 slot.
async fn resolve_implementation<R: ProxyReader>(
    proxies: &R,
    record: &DeploymentRecord,
) -> Result<Option<Address>, ScriptError> {
    match (record.address, record.implementation) {
        (Some(_), Some(implementation)) => Ok(Some(implementation)),
        (Some(proxy), None) => {
            let implementation = proxies.implementation_of(proxy).await?;
            if let Some(implementation) = implementation {
                debug!(" Proxy {proxy} delegates to {implementation}");
            }
            Ok(implementation)
        },
        (None, _) => Ok(None),
    }
}

/// Compare the bytecode deployed at `address` with the contract's build
async fn verify_bytecode<A: AdminService, S: ArtifactSource>(
    admin: &A,
    artifacts: &S,
    contract: &str,
    address: Address,
    network_name: &str,
    reference_url: &str,
) -> Result<BytecodeVerification, ScriptError> {
    let artifact = artifacts.read_artifact(contract)?;
    let build_info = artifacts.read_build_info(contract)?;
    let artifact_payload = serde_json::to_string(&build_info.raw)
        .map_err(|e| ScriptError::ArtifactParsing(e.to_string()))?;

    let request = BytecodeVerificationRequest {
        artifact_payload,
        reference_uri: reference_url.to_string(),
        contract_name: artifact.contract_name,
        solidity_file_path: artifact.source_name,
        contract_address: address,
        contract_network: network_name.to_string(),
    };

    let verification = admin.verify_deployment(&request).await?;
    if verification.match_type == MatchType::NoMatch {
        return Err(ScriptError::ExternalService(format!(
            "bytecode at {address} does not match the compiled artifact"
        )));
    }

    Ok(verification)
}
