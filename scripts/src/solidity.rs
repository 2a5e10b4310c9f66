//! Definitions of Solidity functions called during deployment & upgrades

use alloy::sol;
use serde_json::{json, Value};

use crate::constants::{UPGRADE_FUNCTION_ARG, UPGRADE_FUNCTION_NAME};

sol! {
    /// The ERC-1822 surface of a UUPS implementation contract
    #[sol(rpc)]
    interface IProxiable {
        function proxiableUUID() external view returns (bytes32);
        function upgradeTo(address newImplementation) external;
    }
}

/// The JSON ABI fragment of the UUPS `upgradeTo` function.
///
/// Appended to every contract ABI submitted with an upgrade proposal, since the
/// compiled ABI of the implementation need not expose it.
pub fn upgrade_to_fragment() -> Value {
    json!({
        "inputs": [{
            "internalType": "address",
            "name": UPGRADE_FUNCTION_ARG,
            "type": "address",
        }],
        "name": UPGRADE_FUNCTION_NAME,
        "outputs": [],
        "stateMutability": "nonpayable",
        "type": "function",
    })
}
