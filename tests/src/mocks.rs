//! In-memory implementations of the services the release tasks talk to

use std::{collections::HashMap, sync::Mutex};

use alloy::primitives::{Address, Bytes};
use scripts::{
    artifacts::{Artifact, ArtifactSource, BuildInfo},
    defender::{
        AdminService, BytecodeVerification, BytecodeVerificationRequest, MatchType, Proposal,
        ProposalRequest,
    },
    errors::ScriptError,
    etherscan::{SourceTarget, SourceVerifier},
    provenance::ProvenanceProvider,
    upgrades::{ProxyDeployment, ProxyReader, UpgradesBackend},
};
use serde_json::json;

/// The compiler version reported by [`MockArtifacts`]
pub const MOCK_SOLC_VERSION: &str = "0.8.9+commit.e5eed63a";
/// The commit reported by [`StaticProvenance`]
pub const MOCK_COMMIT: &str = "0123456789abcdef0123456789abcdef01234567";
/// The remote URL reported by [`StaticProvenance`]
pub const MOCK_REMOTE_URL: &str = "git@github.com:example/contracts.git";
/// The ID of every proposal created by [`MockAdmin`]
pub const MOCK_PROPOSAL_ID: &str = "proposal-1";
/// The link of every proposal created by [`MockAdmin`]
pub const MOCK_PROPOSAL_URL: &str = "https://defender.example/proposals/proposal-1";

// ------------
// | Upgrades |
// ------------

/// A call made to the [`MockUpgrades`] backend
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum UpgradeCall {
    /// A proxy deployment
    DeployProxy {
        /// The contract deployed
        contract: String,
        /// The initializer arguments given
        init_args: Vec<String>,
    },
    /// An implementation deployment for an existing proxy
    PrepareUpgrade {
        /// The proxy upgraded
        proxy: Address,
        /// The contract upgraded
        contract: String,
    },
}

/// An upgrades backend handing out sequential addresses
#[derive(Default)]
pub struct MockUpgrades {
    /// The contract whose deployment fails, if any
    fail_on: Option<String>,
    /// The last byte of the next address handed out
    next_byte: Mutex<u8>,
    /// Every call made, in order
    calls: Mutex<Vec<UpgradeCall>>,
}

impl MockUpgrades {
    /// A backend whose addresses start at `0x..10`
    pub fn new() -> Self {
        Self { next_byte: Mutex::new(0x10), ..Default::default() }
    }

    /// Fail every deployment of the named contract
    pub fn failing_on(contract: &str) -> Self {
        Self { fail_on: Some(contract.to_string()), ..Self::new() }
    }

    /// The calls made so far
    pub fn calls(&self) -> Vec<UpgradeCall> {
        self.calls.lock().unwrap().clone()
    }

    /// Hand out the next address
    fn next_address(&self) -> Address {
        let mut byte = self.next_byte.lock().unwrap();
        let address = Address::with_last_byte(*byte);
        *byte += 1;
        address
    }

    /// Fail if the contract was configured to fail
    fn check_failure(&self, contract: &str) -> Result<(), ScriptError> {
        match &self.fail_on {
            Some(failing) if failing == contract => Err(ScriptError::ContractDeployment(format!(
                "{contract} reverted"
            ))),
            _ => Ok(()),
        }
    }
}

impl UpgradesBackend for MockUpgrades {
    async fn deploy_proxy(
        &self,
        contract: &str,
        init_args: &[String],
    ) -> Result<ProxyDeployment, ScriptError> {
        self.calls.lock().unwrap().push(UpgradeCall::DeployProxy {
            contract: contract.to_string(),
            init_args: init_args.to_vec(),
        });
        self.check_failure(contract)?;

        let implementation = self.next_address();
        let proxy = self.next_address();
        Ok(ProxyDeployment { proxy, implementation })
    }

    async fn prepare_upgrade(
        &self,
        proxy: Address,
        contract: &str,
    ) -> Result<Address, ScriptError> {
        self.calls
            .lock()
            .unwrap()
            .push(UpgradeCall::PrepareUpgrade { proxy, contract: contract.to_string() });
        self.check_failure(contract)?;

        Ok(self.next_address())
    }
}

/// A view of deployed proxies answering from a table
#[derive(Default)]
pub struct MockProxies {
    /// The implementation behind each proxy
    implementations: HashMap<Address, Address>,
    /// Whether every read fails
    failing: bool,
    /// Every proxy read, in order
    reads: Mutex<Vec<Address>>,
}

impl MockProxies {
    /// No proxy delegates to anything
    pub fn new() -> Self {
        Self::default()
    }

    /// Every read fails, as if the node were unreachable
    pub fn failing() -> Self {
        Self { failing: true, ..Self::default() }
    }

    /// Have `proxy` delegate to `implementation`
    pub fn with_implementation(mut self, proxy: Address, implementation: Address) -> Self {
        self.implementations.insert(proxy, implementation);
        self
    }

    /// The proxies read so far
    pub fn reads(&self) -> Vec<Address> {
        self.reads.lock().unwrap().clone()
    }
}

impl ProxyReader for MockProxies {
    async fn implementation_of(&self, proxy: Address) -> Result<Option<Address>, ScriptError> {
        self.reads.lock().unwrap().push(proxy);
        if self.failing {
            return Err(ScriptError::ContractInteraction("connection refused".to_string()));
        }

        Ok(self.implementations.get(&proxy).copied())
    }
}

// ---------
// | Admin |
// ---------

/// An admin service recording proposals & answering verifications from a table
#[derive(Default)]
pub struct MockAdmin {
    /// Error messages of bytecode verifications, by contract name
    bytecode_failures: HashMap<String, String>,
    /// Match results of bytecode verifications, by contract name, `EXACT` otherwise
    match_types: HashMap<String, MatchType>,
    /// Every proposal created
    proposals: Mutex<Vec<ProposalRequest>>,
    /// Every bytecode verification requested
    verifications: Mutex<Vec<BytecodeVerificationRequest>>,
}

impl MockAdmin {
    /// An admin service where everything succeeds
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the bytecode verification of `contract` with `message`
    pub fn with_bytecode_failure(mut self, contract: &str, message: &str) -> Self {
        self.bytecode_failures.insert(contract.to_string(), message.to_string());
        self
    }

    /// Answer the bytecode verification of `contract` with `match_type`
    pub fn with_match_type(mut self, contract: &str, match_type: MatchType) -> Self {
        self.match_types.insert(contract.to_string(), match_type);
        self
    }

    /// The proposals created so far
    pub fn proposals(&self) -> Vec<ProposalRequest> {
        self.proposals.lock().unwrap().clone()
    }

    /// The bytecode verifications requested so far
    pub fn verifications(&self) -> Vec<BytecodeVerificationRequest> {
        self.verifications.lock().unwrap().clone()
    }
}

impl AdminService for MockAdmin {
    async fn create_proposal(&self, request: &ProposalRequest) -> Result<Proposal, ScriptError> {
        self.proposals.lock().unwrap().push(request.clone());
        Ok(Proposal {
            proposal_id: MOCK_PROPOSAL_ID.to_string(),
            url: Some(MOCK_PROPOSAL_URL.to_string()),
        })
    }

    async fn verify_deployment(
        &self,
        request: &BytecodeVerificationRequest,
    ) -> Result<BytecodeVerification, ScriptError> {
        self.verifications.lock().unwrap().push(request.clone());
        if let Some(message) = self.bytecode_failures.get(&request.contract_name) {
            return Err(ScriptError::ExternalService(message.clone()));
        }

        let match_type =
            self.match_types.get(&request.contract_name).copied().unwrap_or(MatchType::Exact);
        Ok(BytecodeVerification { match_type, provided_sha256: None })
    }
}

// ------------
// | Explorer |
// ------------

/// The outcome of a mocked source verification
#[derive(Clone, Debug)]
pub enum SourceOutcome {
    /// The source was published
    Verified,
    /// The explorer already had the source
    AlreadyVerified,
    /// The explorer rejected the source with the given message
    Fail(String),
}

/// A source verification requested from [`MockVerifier`]
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VerifiedTarget {
    /// The contract verified
    pub contract: String,
    /// The address verified
    pub address: Address,
    /// The implementation behind the address, if a proxy
    pub implementation: Option<Address>,
}

/// A block explorer answering source verifications from a table
#[derive(Default)]
pub struct MockVerifier {
    /// Outcomes by contract name, [`SourceOutcome::Verified`] otherwise
    outcomes: HashMap<String, SourceOutcome>,
    /// Every verification requested
    targets: Mutex<Vec<VerifiedTarget>>,
}

impl MockVerifier {
    /// A verifier where everything succeeds
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer the source verification of `contract` with `outcome`
    pub fn with_outcome(mut self, contract: &str, outcome: SourceOutcome) -> Self {
        self.outcomes.insert(contract.to_string(), outcome);
        self
    }

    /// The verifications requested so far
    pub fn targets(&self) -> Vec<VerifiedTarget> {
        self.targets.lock().unwrap().clone()
    }
}

impl SourceVerifier for MockVerifier {
    async fn verify_source(&self, target: &SourceTarget<'_>) -> Result<(), ScriptError> {
        self.targets.lock().unwrap().push(VerifiedTarget {
            contract: target.contract.to_string(),
            address: target.address,
            implementation: target.implementation,
        });

        match self.outcomes.get(target.contract).cloned().unwrap_or(SourceOutcome::Verified) {
            SourceOutcome::Verified => Ok(()),
            SourceOutcome::AlreadyVerified => Err(ScriptError::AlreadyVerified),
            SourceOutcome::Fail(message) => Err(ScriptError::ExternalService(message)),
        }
    }
}

// -------------
// | Artifacts |
// -------------

/// Artifacts synthesized for any contract name, except the ones marked missing
#[derive(Default)]
pub struct MockArtifacts {
    /// Contracts with no artifact
    missing: Vec<String>,
}

impl MockArtifacts {
    /// Artifacts for every contract
    pub fn new() -> Self {
        Self::default()
    }

    /// Report the named contract's artifact as missing
    pub fn without(mut self, contract: &str) -> Self {
        self.missing.push(contract.to_string());
        self
    }

    /// Fail if the contract's artifact is marked missing
    fn check_exists(&self, contract: &str) -> Result<(), ScriptError> {
        if self.missing.iter().any(|m| m == contract) {
            return Err(ScriptError::ArtifactParsing(format!("no artifact found for {contract}")));
        }
        Ok(())
    }
}

impl ArtifactSource for MockArtifacts {
    fn read_artifact(&self, contract: &str) -> Result<Artifact, ScriptError> {
        self.check_exists(contract)?;
        Ok(Artifact {
            contract_name: contract.to_string(),
            source_name: format!("contracts/{contract}.sol"),
            abi: vec![json!({
                "type": "function",
                "name": "initialize",
                "inputs": [],
                "outputs": [],
                "stateMutability": "nonpayable",
            })],
            bytecode: Bytes::from_static(&[0x60, 0x80]),
        })
    }

    fn read_build_info(&self, contract: &str) -> Result<BuildInfo, ScriptError> {
        self.check_exists(contract)?;
        Ok(BuildInfo {
            solc_long_version: MOCK_SOLC_VERSION.to_string(),
            input: json!({ "language": "Solidity", "sources": {} }),
            raw: json!({ "id": contract, "solcLongVersion": MOCK_SOLC_VERSION }),
        })
    }
}

// --------------
// | Provenance |
// --------------

/// A provenance provider reporting fixed values
#[derive(Clone, Debug, Default)]
pub struct StaticProvenance {
    /// Whether the remote URL lookup fails
    no_remote: bool,
}

impl StaticProvenance {
    /// A provider whose lookups all succeed
    pub fn new() -> Self {
        Self::default()
    }

    /// A provider with no origin remote
    pub fn without_remote() -> Self {
        Self { no_remote: true }
    }
}

impl ProvenanceProvider for StaticProvenance {
    fn commit_hash(&self) -> Result<String, ScriptError> {
        Ok(MOCK_COMMIT.to_string())
    }

    fn remote_url(&self) -> Result<String, ScriptError> {
        if self.no_remote {
            return Err(ScriptError::Provenance("no origin remote".to_string()));
        }
        Ok(MOCK_REMOTE_URL.to_string())
    }
}
