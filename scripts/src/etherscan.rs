//! Source verification on Etherscan-compatible block explorers.
//!
//! The explorer API is asynchronous: a submission returns a GUID whose status
//! is polled until the explorer has compiled & compared the source.

use std::time::Duration;

use alloy::primitives::Address;
use release_common::networks::Network;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, info};

use crate::{
    artifacts::ArtifactSource,
    cli::ExplorerArgs,
    constants::{
        ALREADY_VERIFIED_STATUS, PASSED_VERIFICATION_MESSAGE, PENDING_VERIFICATION_MESSAGE,
        STANDARD_JSON_CODE_FORMAT, VERIFICATION_POLL_ATTEMPTS, VERIFICATION_POLL_INTERVAL_MS,
    },
    errors::ScriptError,
};

/// A contract whose source should be published
#[derive(Clone, Copy, Debug)]
pub struct SourceTarget<'a> {
    /// The name of the contract's artifact
    pub contract: &'a str,
    /// The address to verify, a proxy or a bare implementation
    pub address: Address,
    /// The implementation behind `address`, if it is a proxy
    pub implementation: Option<Address>,
}

/// A block explorer able to publish contract sources
pub trait SourceVerifier {
    /// Publish the source of the target contract.
    ///
    /// Returns [`ScriptError::AlreadyVerified`] if the explorer already has it.
    #[allow(async_fn_in_trait)]
    async fn verify_source(&self, target: &SourceTarget<'_>) -> Result<(), ScriptError>;
}

/// The envelope of every explorer API response
#[derive(Debug, Deserialize)]
struct ExplorerResponse {
    /// `"1"` on success, `"0"` otherwise
    status: String,
    /// A short status message
    #[serde(default)]
    message: String,
    /// The payload, or the error message on failure
    result: String,
}

impl ExplorerResponse {
    /// Whether the request succeeded
    fn is_ok(&self) -> bool {
        self.status == "1"
    }
}

/// A [`SourceVerifier`] using the Etherscan API
pub struct EtherscanClient<A> {
    /// The HTTP client
    client: Client,
    /// The explorer API endpoint
    api_url: String,
    /// The explorer API key
    api_key: String,
    /// The source of the build info submitted for verification
    artifacts: A,
}

impl<A: ArtifactSource> EtherscanClient<A> {
    /// Create a client for the given network's explorer.
    ///
    /// The API URL defaults to the chain's known Etherscan endpoint.
    pub fn new(args: &ExplorerArgs, network: &Network, artifacts: A) -> Result<Self, ScriptError> {
        let api_key = args.api_key()?.to_string();
        let api_url = args
            .etherscan_api_url
            .clone()
            .or_else(|| network.explorer_api_url().map(str::to_string))
            .ok_or_else(|| {
                ScriptError::Config(format!(
                    "no known explorer API for {network}, set ETHERSCAN_API_URL"
                ))
            })?;

        Ok(Self {
            client: Client::new(),
            api_url,
            api_key,
            artifacts,
        })
    }

    /// Submit the standard JSON input of a contract deployed at `address`
    async fn submit_source(&self, contract: &str, address: Address) -> Result<(), ScriptError> {
        let artifact = self.artifacts.read_artifact(contract)?;
        let build_info = self.artifacts.read_build_info(contract)?;
        let source = serde_json::to_string(&build_info.input)
            .map_err(|e| ScriptError::ArtifactParsing(e.to_string()))?;
        let address = address.to_string();
        let compiler = format!("v{}", build_info.solc_long_version);
        let contract_name = artifact.qualified_name();

        let form = [
            ("apikey", self.api_key.as_str()),
            ("module", "contract"),
            ("action", "verifysourcecode"),
            ("contractaddress", address.as_str()),
            ("sourceCode", source.as_str()),
            ("codeformat", STANDARD_JSON_CODE_FORMAT),
            ("contractname", contract_name.as_str()),
            ("compilerversion", compiler.as_str()),
            // Implementations are deployed without constructor arguments
            ("constructorArguements", ""),
        ];

        let response = self.send_form(&form).await?;
        if !response.is_ok() {
            return Err(explorer_error(&response.result));
        }

        let guid = response.result;
        debug!("Submitted source of {contract}, guid {guid}");
        self.poll("checkverifystatus", &guid, |res| {
            if res.result.contains(PENDING_VERIFICATION_MESSAGE) {
                Poll::Pending
            } else if res.result.contains(PASSED_VERIFICATION_MESSAGE) {
                Poll::Done(Ok(()))
            } else if res.result.contains(ALREADY_VERIFIED_STATUS) {
                Poll::Done(Err(ScriptError::AlreadyVerified))
            } else {
                Poll::Done(Err(explorer_error(&res.result)))
            }
        })
        .await
    }

    /// Ask the explorer to link a proxy to its implementation
    async fn link_proxy(&self, proxy: Address, implementation: Address) -> Result<(), ScriptError> {
        let proxy = proxy.to_string();
        let implementation = implementation.to_string();
        let form = [
            ("apikey", self.api_key.as_str()),
            ("module", "contract"),
            ("action", "verifyproxycontract"),
            ("address", proxy.as_str()),
            ("expectedimplementation", implementation.as_str()),
        ];

        let response = self.send_form(&form).await?;
        if !response.is_ok() {
            return Err(explorer_error(&response.result));
        }

        self.poll("checkproxyverification", &response.result, |res| {
            if res.is_ok() {
                Poll::Done(Ok(()))
            } else if res.result.contains(PENDING_VERIFICATION_MESSAGE) {
                Poll::Pending
            } else {
                Poll::Done(Err(explorer_error(&res.result)))
            }
        })
        .await
    }

    /// POST a form to the explorer API
    async fn send_form(&self, form: &[(&str, &str)]) -> Result<ExplorerResponse, ScriptError> {
        let response = self
            .client
            .post(&self.api_url)
            .form(form)
            .send()
            .await
            .map_err(|e| ScriptError::ExternalService(format!("explorer request failed: {e}")))?;

        response
            .json()
            .await
            .map_err(|e| ScriptError::ExternalService(format!("invalid explorer response: {e}")))
    }

    /// Poll the status of a submission until `check` settles it,
    /// for a bounded number of attempts
    async fn poll<F>(&self, action: &str, guid: &str, check: F) -> Result<(), ScriptError>
    where
        F: Fn(&ExplorerResponse) -> Poll,
    {
        for _ in 0..VERIFICATION_POLL_ATTEMPTS {
            tokio::time::sleep(Duration::from_millis(VERIFICATION_POLL_INTERVAL_MS)).await;

            let query = [
                ("apikey", self.api_key.as_str()),
                ("module", "contract"),
                ("action", action),
                ("guid", guid),
            ];
            let response: ExplorerResponse = self
                .client
                .get(&self.api_url)
                .query(&query)
                .send()
                .await
                .map_err(|e| ScriptError::ExternalService(format!("explorer request failed: {e}")))?
                .json()
                .await
                .map_err(|e| {
                    ScriptError::ExternalService(format!("invalid explorer response: {e}"))
                })?;

            debug!("{action} {guid}: {} {}", response.message, response.result);
            if let Poll::Done(res) = check(&response) {
                return res;
            }
        }

        Err(ScriptError::ExternalService(format!(
            "verification {guid} still pending after {VERIFICATION_POLL_ATTEMPTS} attempts"
        )))
    }
}

impl<A: ArtifactSource> SourceVerifier for EtherscanClient<A> {
    async fn verify_source(&self, target: &SourceTarget<'_>) -> Result<(), ScriptError> {
        let Some(implementation) = target.implementation.filter(|i| *i != target.address) else {
            return self.submit_source(target.contract, target.address).await;
        };

        // A proxy's page shows its implementation's source once the two are linked
        match self.submit_source(target.contract, implementation).await {
            Ok(()) | Err(ScriptError::AlreadyVerified) => {},
            Err(e) => return Err(e),
        }

        self.link_proxy(target.address, implementation).await?;
        info!("Linked proxy {} to implementation {implementation}", target.address);
        Ok(())
    }
}

/// The outcome of a single status poll
enum Poll {
    /// The explorer is still processing the submission
    Pending,
    /// The submission settled
    Done(Result<(), ScriptError>),
}

/// Map an explorer error message to an error
fn explorer_error(message: &str) -> ScriptError {
    if message.to_lowercase().contains("already verified") {
        ScriptError::AlreadyVerified
    } else {
        ScriptError::ExternalService(message.to_string())
    }
}
