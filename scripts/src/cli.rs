//! Definitions of CLI arguments and commands for the release scripts

use std::path::PathBuf;

use alloy::{primitives::Address, providers::DynProvider};
use clap::{Args, Parser, Subcommand};
use release_common::{
    constants::DEFAULT_ADDRESS_BOOK_PATH,
    networks::Network,
    store::{AddressBookStore, DeploymentStores, ReleaseStore},
};

use crate::{
    artifacts::HardhatArtifacts,
    commands::{
        check_init_args, deploy_proxy, prepare_upgrade, propose_upgrade, verify_deployed,
        TaskContext,
    },
    constants::{DEFAULT_ADMIN_API_URL, DEFAULT_ARTIFACTS_PATH},
    defender::DefenderClient,
    errors::ScriptError,
    etherscan::EtherscanClient,
    provenance::GitProvenance,
    summary::SummarySink,
    upgrades::RpcUpgrades,
    utils::{chain_id, setup_provider},
};

/// Deploy, upgrade & verify upgradeable contracts
#[derive(Parser)]
#[command(version, about)]
pub struct Cli {
    /// Options shared by every command
    #[command(flatten)]
    pub globals: GlobalArgs,

    /// The command to run
    #[command(subcommand)]
    pub command: Command,
}

/// Options shared by every command
#[derive(Args, Clone, Debug)]
pub struct GlobalArgs {
    /// Network RPC URL
    #[arg(short, long, env = "RPC_URL")]
    pub rpc_url: String,

    /// Private key of the deployer, required by the commands that deploy
    #[arg(short, long, env = "PRIVATE_KEY", hide_env_values = true)]
    pub priv_key: Option<String>,

    /// Path of the address book
    #[arg(long, env = "ADDRESS_BOOK_PATH", default_value = DEFAULT_ADDRESS_BOOK_PATH)]
    pub address_book: PathBuf,

    /// Directory of the current release, holding its manifest & metadata
    #[arg(long, env = "RELEASE_PATH")]
    pub release_path: Option<PathBuf>,

    /// File to write the markdown summary of the run to
    #[arg(long, env = "GITHUB_STEP_SUMMARY")]
    pub summary_path: Option<PathBuf>,

    /// Directory of the compiled contract artifacts
    #[arg(long, env = "ARTIFACTS_PATH", default_value = DEFAULT_ARTIFACTS_PATH)]
    pub artifacts: PathBuf,

    /// Admin service options
    #[command(flatten)]
    pub admin: AdminArgs,

    /// Block explorer options
    #[command(flatten)]
    pub explorer: ExplorerArgs,
}

impl GlobalArgs {
    /// The deployer's private key, required to send transactions
    fn deployer_key(&self) -> Result<&str, ScriptError> {
        self.priv_key.as_deref().ok_or_else(|| {
            ScriptError::Config("missing deployer key, set --priv-key or PRIVATE_KEY".to_string())
        })
    }

    /// The stores deployments are recorded in
    fn stores(&self) -> DeploymentStores {
        DeploymentStores::new(
            AddressBookStore::new(&self.address_book),
            ReleaseStore::new(self.release_path.as_deref()),
        )
    }

    /// The artifacts contracts are deployed & verified from
    fn artifacts(&self) -> HardhatArtifacts {
        HardhatArtifacts::new(&self.artifacts)
    }

    /// Connect to the chain & assemble the context shared by every task
    async fn task_context(
        &self,
        priv_key: Option<&str>,
    ) -> Result<(DynProvider, TaskContext<GitProvenance>), ScriptError> {
        let provider = setup_provider(&self.rpc_url, priv_key)?;
        let network = Network::new(chain_id(&provider).await?);

        let ctx = TaskContext {
            network,
            stores: self.stores(),
            summary: self.summary_path.as_ref().map(SummarySink::new),
            provenance: GitProvenance,
        };

        Ok((provider, ctx))
    }
}

/// Options of the admin service hosting proposals & bytecode verifications
#[derive(Args, Clone, Debug)]
pub struct AdminArgs {
    /// Base URL of the admin API
    #[arg(long, env = "DEFENDER_API_URL", default_value = DEFAULT_ADMIN_API_URL)]
    pub defender_api_url: String,

    /// Admin API key
    #[arg(long, env = "DEFENDER_API_KEY", hide_env_values = true)]
    pub defender_api_key: Option<String>,

    /// Admin API bearer token
    #[arg(long, env = "DEFENDER_API_TOKEN", hide_env_values = true)]
    pub defender_api_token: Option<String>,
}

/// Options of the block explorer sources are published to
#[derive(Args, Clone, Debug)]
pub struct ExplorerArgs {
    /// Block explorer API key
    #[arg(long, env = "ETHERSCAN_API_KEY", hide_env_values = true)]
    pub etherscan_api_key: Option<String>,

    /// Block explorer API URL, defaults to the chain's Etherscan API
    #[arg(long, env = "ETHERSCAN_API_URL")]
    pub etherscan_api_url: Option<String>,
}

impl ExplorerArgs {
    /// The explorer API key, required to publish sources
    pub fn api_key(&self) -> Result<&str, ScriptError> {
        self.etherscan_api_key.as_deref().ok_or_else(|| {
            ScriptError::Config("missing explorer API key, set ETHERSCAN_API_KEY".to_string())
        })
    }
}

/// The release tasks
#[derive(Subcommand)]
pub enum Command {
    /// Deploy new contracts as upgradeable
    DeployProxy(DeployProxyArgs),
    /// Deploy new implementations for existing proxies
    PrepareUpgrade(PrepareUpgradeArgs),
    /// Propose the release's upgrades as a batch to the admin service
    ProposeUpgrade(ProposeUpgradeArgs),
    /// Verify the release's deployments on the block explorer & admin service
    VerifyDeployed(VerifyDeployedArgs),
}

impl Command {
    /// Run the command
    pub async fn run(self, globals: GlobalArgs) -> Result<(), ScriptError> {
        match self {
            Command::DeployProxy(args) => {
                check_init_args(&args.contracts, &args.init_args)?;
                let key = globals.deployer_key()?;
                let (provider, ctx) = globals.task_context(Some(key)).await?;
                let backend = RpcUpgrades::new(provider, globals.artifacts());

                deploy_proxy(&ctx, &backend, &args.contracts, &args.init_args).await
            },
            Command::PrepareUpgrade(args) => {
                let key = globals.deployer_key()?;
                let (provider, ctx) = globals.task_context(Some(key)).await?;
                let backend = RpcUpgrades::new(provider, globals.artifacts());

                prepare_upgrade(&ctx, &backend, &args.contracts).await
            },
            Command::ProposeUpgrade(args) => {
                let multisig = args.multisig()?;
                let admin = DefenderClient::new(&globals.admin)?;
                let (_, mut ctx) = globals.task_context(None).await?;
                if let Some(input) = args.input {
                    ctx.stores.release = ctx.stores.release.with_manifest_path(input);
                }

                propose_upgrade(&ctx, &admin, &globals.artifacts(), multisig).await.map(|_| ())
            },
            Command::VerifyDeployed(args) => {
                let admin = DefenderClient::new(&globals.admin)?;
                globals.explorer.api_key()?;
                let (provider, ctx) = globals.task_context(None).await?;
                let explorer =
                    EtherscanClient::new(&globals.explorer, &ctx.network, globals.artifacts())?;

                let artifacts = globals.artifacts();
                verify_deployed(&ctx, &provider, &explorer, &admin, &artifacts, args.reference_url)
                    .await
            },
        }
    }
}

/// Deploy new contracts behind UUPS proxies.
///
/// Concretely, each contract is deployed behind an
/// [`ERC1967Proxy`](https://docs.openzeppelin.com/contracts/4.x/api/proxy#ERC1967Proxy)
/// and initialized through it.
#[derive(Args)]
pub struct DeployProxyArgs {
    /// Names of the contracts to deploy
    #[arg(required = true)]
    pub contracts: Vec<String>,

    /// Argument of the initializer, repeated once per argument; only allowed
    /// when deploying a single contract
    #[arg(long = "args")]
    pub init_args: Vec<String>,
}

/// Deploy new implementations of existing upgradeable contracts
#[derive(Args)]
pub struct PrepareUpgradeArgs {
    /// Names of the contracts to upgrade
    #[arg(required = true)]
    pub contracts: Vec<String>,
}

/// Propose the release's upgrades to the admin service
#[derive(Args)]
pub struct ProposeUpgradeArgs {
    /// Address of the multisig that needs to approve the upgrade
    #[arg(long, env = "MULTISIG_ADDRESS")]
    pub multisig: Option<Address>,

    /// Release manifest to propose, instead of the current release's
    #[arg(long)]
    pub input: Option<PathBuf>,
}

impl ProposeUpgradeArgs {
    /// The multisig approving the upgrade
    pub fn multisig(&self) -> Result<Address, ScriptError> {
        self.multisig.ok_or_else(|| {
            ScriptError::Config("missing multisig, set --multisig or MULTISIG_ADDRESS".to_string())
        })
    }
}

/// Verify the release's deployments
#[derive(Args)]
pub struct VerifyDeployedArgs {
    /// URL the admin service links verified artifacts to,
    /// defaults to the repository's origin remote
    #[arg(long, env = "ARTIFACT_REFERENCE_URL")]
    pub reference_url: Option<String>,
}
