//! Definitions of errors that can occur during the execution of the release scripts

use std::fmt::{self, Display, Formatter};

use release_common::errors::StoreError;
use thiserror::Error;

/// The message block explorers return when asked to verify a contract
/// whose source is already published
pub const ALREADY_VERIFIED_MESSAGE: &str = "Contract source code already verified";

/// Errors that can occur during the execution of the release scripts
#[derive(Debug, Error)]
pub enum ScriptError {
    /// A referenced contract is missing from the address book
    #[error("{0}")]
    NotFound(String),
    /// Required configuration is missing or invalid
    #[error("configuration error: {0}")]
    Config(String),
    /// Error reading or writing the address book or release manifest
    #[error("{0}")]
    Store(StoreError),
    /// Error reading or parsing a compilation artifact
    #[error("error reading artifact: {0}")]
    ArtifactParsing(String),
    /// Error initializing the RPC client
    #[error("error initializing client: {0}")]
    ClientInitialization(String),
    /// Error constructing calldata for a contract method
    #[error("error constructing calldata: {0}")]
    CalldataConstruction(String),
    /// Error deploying a contract
    #[error("error deploying contract: {0}")]
    ContractDeployment(String),
    /// Error calling a contract method or reading chain state
    #[error("error interacting with contract: {0}")]
    ContractInteraction(String),
    /// An external service (admin API, block explorer) returned an error
    #[error("{0}")]
    ExternalService(String),
    /// The block explorer already has the contract's source.
    ///
    /// Source verification treats this as success.
    #[error("{}", ALREADY_VERIFIED_MESSAGE)]
    AlreadyVerified,
    /// Error running a version control command
    #[error("error running git: {0}")]
    Provenance(String),
    /// Error writing the CI summary
    #[error("error writing summary: {0}")]
    Summary(String),
    /// The release manifest holds no new implementation to propose
    #[error("no new implementations found in the release manifest")]
    NothingToPropose,
    /// One or more verifications failed
    #[error("some verifications failed:\n{}", display_failures(.0))]
    Verification(Vec<VerificationFailure>),
}

impl From<StoreError> for ScriptError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound { .. } => ScriptError::NotFound(err.to_string()),
            err => ScriptError::Store(err),
        }
    }
}

/// A failed verification of a single contract
#[derive(Debug)]
pub struct VerificationFailure {
    /// The name of the contract
    pub contract: String,
    /// What went wrong
    pub error: ScriptError,
}

impl Display for VerificationFailure {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.contract, self.error)
    }
}

/// List verification failures one per line
fn display_failures(failures: &[VerificationFailure]) -> String {
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("\n")
}
