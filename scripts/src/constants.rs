//! Constants used in the release scripts

use alloy::primitives::{b256, B256};

/// The storage slot holding the implementation address in an ERC-1967 proxy.
///
/// This is specified in EIP1967: https://eips.ethereum.org/EIPS/eip-1967#logic-contract-address
pub const IMPLEMENTATION_STORAGE_SLOT: B256 =
    b256!("0x360894a13ba1a3210667c828492db98dca3e2076cc3735a920a3ca505d382bbc");

/// The name of the artifact of the proxy deployed in front of new contracts
pub const PROXY_ARTIFACT: &str = "ERC1967Proxy";

/// The name of the initializer called through a freshly deployed proxy
pub const INITIALIZER_NAME: &str = "initialize";

/// The name of the function that points a UUPS proxy at a new implementation
pub const UPGRADE_FUNCTION_NAME: &str = "upgradeTo";

/// The name of the single argument of the upgrade function
pub const UPGRADE_FUNCTION_ARG: &str = "newImplementation";

/// The default directory holding the compiled contract artifacts
pub const DEFAULT_ARTIFACTS_PATH: &str = "artifacts";

/// The directory, under the artifacts root, holding compiler build info
pub const BUILD_INFO_DIR: &str = "build-info";

/// The suffix of the debug file that points an artifact at its build info
pub const DEBUG_ARTIFACT_SUFFIX: &str = ".dbg.json";

/// The extension of artifact files
pub const ARTIFACT_EXTENSION: &str = "json";

// ---------
// | Admin |
// ---------

/// The default base URL of the admin (proposal) service API
pub const DEFAULT_ADMIN_API_URL: &str = "https://defender-api.openzeppelin.com";

/// The base URL of the admin service web app, used to link proposals
pub const ADMIN_APP_URL: &str = "https://defender.openzeppelin.com";

/// The admin API route for creating proposals
pub const PROPOSALS_ROUTE: &str = "/admin/proposals";

/// The admin API route for bytecode verifications
pub const BYTECODE_VERIFICATIONS_ROUTE: &str = "/admin/bytecode-verifications";

/// The header carrying the admin API key
pub const API_KEY_HEADER: &str = "X-Api-Key";

/// The kind of multisig approving upgrade proposals
pub const MULTISIG_TYPE: &str = "Gnosis Safe";

/// The title of an upgrade proposal when the release has none
pub const DEFAULT_PROPOSAL_TITLE: &str = "Upgrade";

/// The base URL of the Safe web app
pub const SAFE_APP_URL: &str = "https://app.safe.global";

// ------------
// | Explorer |
// ------------

/// The message returned by the block explorer while a verification is queued
pub const PENDING_VERIFICATION_MESSAGE: &str = "Pending in queue";

/// The message returned by the block explorer once a verification passed
pub const PASSED_VERIFICATION_MESSAGE: &str = "Pass - Verified";

/// The shorter "already verified" message returned by the status endpoint
pub const ALREADY_VERIFIED_STATUS: &str = "Already Verified";

/// The code format of standard JSON input submissions
pub const STANDARD_JSON_CODE_FORMAT: &str = "solidity-standard-json-input";

/// The number of times to poll the block explorer for a verification result
pub const VERIFICATION_POLL_ATTEMPTS: usize = 10;

/// The number of milliseconds to wait between verification status polls
pub const VERIFICATION_POLL_INTERVAL_MS: u64 = 3_000;

// -------
// | Git |
// -------

/// The name of the git command
pub const GIT_COMMAND: &str = "git";
