//! A client for the admin service that hosts upgrade proposals & bytecode
//! verifications, i.e. the OpenZeppelin Defender admin API

use std::fmt::{self, Display};

use alloy::primitives::Address;
use reqwest::{header::AUTHORIZATION, Client};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::{
    cli::AdminArgs,
    constants::{ADMIN_APP_URL, API_KEY_HEADER, BYTECODE_VERIFICATIONS_ROUTE, PROPOSALS_ROUTE},
    errors::ScriptError,
};

// ---------
// | Types |
// ---------

/// A contract referenced by a proposal
#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ProposalContract {
    /// The name of the contract
    pub name: String,
    /// The admin service's name for the network
    pub network: String,
    /// The address of the proxy
    pub address: Address,
    /// The contract ABI, serialized to a JSON string
    pub abi: String,
}

/// A single step of a batch proposal
#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ProposalStep {
    /// The contract the step calls, `<network>-<address>`
    pub contract_id: String,
    /// The ABI fragment of the function called
    pub target_function: Value,
    /// The arguments of the call
    pub function_inputs: Vec<String>,
    /// The kind of step
    #[serde(rename = "type")]
    pub kind: String,
}

/// A batch proposal executed through a multisig
#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ProposalRequest {
    /// The contracts called by the proposal's steps
    pub contract: Vec<ProposalContract>,
    /// The title of the proposal
    pub title: String,
    /// The description of the proposal
    pub description: String,
    /// The kind of proposal
    #[serde(rename = "type")]
    pub kind: String,
    /// The multisig approving & executing the proposal
    pub via: Address,
    /// The kind of multisig
    pub via_type: String,
    /// Free-form metadata
    pub metadata: Value,
    /// The calls made by the proposal, in order
    pub steps: Vec<ProposalStep>,
}

/// A proposal as returned by the admin service
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Proposal {
    /// The ID of the proposal
    pub proposal_id: String,
    /// The link to the proposal in the admin web app, if the service returned one
    #[serde(default)]
    pub url: Option<String>,
}

impl Proposal {
    /// The link to the proposal in the admin web app
    pub fn link(&self) -> String {
        self.url
            .clone()
            .unwrap_or_else(|| format!("{ADMIN_APP_URL}/v2/#/admin/proposals/{}", self.proposal_id))
    }
}

/// A request to compare the bytecode deployed at an address with a build's output
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BytecodeVerificationRequest {
    /// The compiler build info the contract was compiled in
    pub artifact_payload: String,
    /// Where the build artifacts can be retrieved from
    pub reference_uri: String,
    /// The name of the contract
    pub contract_name: String,
    /// The path of the contract's source file
    pub solidity_file_path: String,
    /// The deployed address to compare against
    pub contract_address: Address,
    /// The admin service's name for the network
    pub contract_network: String,
}

/// How well deployed bytecode matched a build's output
#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MatchType {
    /// The bytecode does not match
    NoMatch,
    /// The bytecode matches, up to its metadata hash
    Partial,
    /// The bytecode matches exactly
    Exact,
}

impl Display for MatchType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MatchType::NoMatch => write!(f, "NO_MATCH"),
            MatchType::Partial => write!(f, "PARTIAL"),
            MatchType::Exact => write!(f, "EXACT"),
        }
    }
}

/// The result of a bytecode verification
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BytecodeVerification {
    /// How well the bytecode matched
    pub match_type: MatchType,
    /// The hash of the submitted build info
    #[serde(default)]
    pub provided_sha256: Option<String>,
}

/// The admin service used by the propose & verify tasks
pub trait AdminService {
    /// Create a proposal
    #[allow(async_fn_in_trait)]
    async fn create_proposal(&self, request: &ProposalRequest) -> Result<Proposal, ScriptError>;

    /// Verify the bytecode deployed at an address against a build
    #[allow(async_fn_in_trait)]
    async fn verify_deployment(
        &self,
        request: &BytecodeVerificationRequest,
    ) -> Result<BytecodeVerification, ScriptError>;
}

// ----------
// | Client |
// ----------

/// An [`AdminService`] talking to the Defender admin API over HTTP
pub struct DefenderClient {
    /// The HTTP client
    client: Client,
    /// The base URL of the API, without a trailing slash
    api_url: String,
    /// The API key
    api_key: String,
    /// The bearer token authorizing requests
    api_token: String,
}

impl DefenderClient {
    /// Create a client from the admin service options, failing if credentials are missing
    pub fn new(args: &AdminArgs) -> Result<Self, ScriptError> {
        let api_key = args.defender_api_key.clone().ok_or_else(|| {
            ScriptError::Config("missing admin API key, set DEFENDER_API_KEY".to_string())
        })?;
        let api_token = args.defender_api_token.clone().ok_or_else(|| {
            ScriptError::Config("missing admin API token, set DEFENDER_API_TOKEN".to_string())
        })?;

        Ok(Self {
            client: Client::new(),
            api_url: args.defender_api_url.trim_end_matches('/').to_string(),
            api_key,
            api_token,
        })
    }

    /// POST a JSON body to an API route & parse the JSON response
    async fn post<B: Serialize, R: DeserializeOwned>(
        &self,
        route: &str,
        body: &B,
    ) -> Result<R, ScriptError> {
        let url = format!("{}{route}", self.api_url);
        debug!("POST {url}");

        let response = self
            .client
            .post(&url)
            .header(API_KEY_HEADER, &self.api_key)
            .header(AUTHORIZATION, format!("Bearer {}", self.api_token))
            .json(body)
            .send()
            .await
            .map_err(|e| ScriptError::ExternalService(format!("request to {url} failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(ScriptError::ExternalService(format!(
                "{url} returned {status}: {text}"
            )));
        }

        response
            .json()
            .await
            .map_err(|e| ScriptError::ExternalService(format!("invalid response from {url}: {e}")))
    }
}

impl AdminService for DefenderClient {
    async fn create_proposal(&self, request: &ProposalRequest) -> Result<Proposal, ScriptError> {
        self.post(PROPOSALS_ROUTE, request).await
    }

    async fn verify_deployment(
        &self,
        request: &BytecodeVerificationRequest,
    ) -> Result<BytecodeVerification, ScriptError> {
        self.post(BYTECODE_VERIFICATIONS_ROUTE, request).await
    }
}
