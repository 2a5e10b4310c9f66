//! Naming of EVM networks across the services the scripts talk to.
//!
//! The admin service identifies networks by its own names, the Safe UI by
//! EIP-3770 short names, and block explorers by URL.

use std::fmt::{self, Display};

use alloy_chains::NamedChain;
use alloy_primitives::Address;

/// `(chain ID, admin service network name, EIP-3770 short name)`
const KNOWN_NETWORKS: &[(u64, &str, &str)] = &[
    (1, "mainnet", "eth"),
    (5, "goerli", "gor"),
    (10, "optimism", "oeth"),
    (56, "bsc", "bnb"),
    (97, "bsctest", "bnbt"),
    (100, "xdai", "gno"),
    (137, "matic", "matic"),
    (250, "fantom", "ftm"),
    (324, "zksync", "zksync"),
    (420, "optimism-goerli", "ogor"),
    (1284, "moonbeam", "mbeam"),
    (1285, "moonriver", "mriver"),
    (4002, "fantomtest", "tftm"),
    (8453, "base", "base"),
    (42161, "arbitrum", "arb1"),
    (42220, "celo", "celo"),
    (43113, "fuji", "fuji"),
    (43114, "avalanche", "avax"),
    (59144, "linea", "linea"),
    (80001, "mumbai", "maticmum"),
    (84531, "base-goerli", "basegor"),
    (421613, "arbitrum-goerli", "arb-goerli"),
    (11155111, "sepolia", "sep"),
];

/// The network a task runs against, identified by its chain ID
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Network {
    /// The EIP-155 chain ID
    pub chain_id: u64,
}

impl Network {
    /// The network with the given chain ID
    pub fn new(chain_id: u64) -> Self {
        Self { chain_id }
    }

    /// The row for this chain in the known networks table
    fn known(&self) -> Option<&'static (u64, &'static str, &'static str)> {
        KNOWN_NETWORKS.iter().find(|(id, ..)| *id == self.chain_id)
    }

    /// The name the admin service uses for this network
    pub fn admin_name(&self) -> Option<&'static str> {
        self.known().map(|(_, name, _)| *name)
    }

    /// The EIP-3770 short name of this network
    pub fn short_name(&self) -> Option<&'static str> {
        self.known().map(|(.., short)| *short)
    }

    /// The base URL of the network's Etherscan-family block explorer
    pub fn explorer_url(&self) -> Option<&'static str> {
        self.etherscan_urls().map(|(_, base)| base)
    }

    /// The API URL of the network's Etherscan-family block explorer
    pub fn explorer_api_url(&self) -> Option<&'static str> {
        self.etherscan_urls().map(|(api, _)| api)
    }

    /// The block explorer page for an address on this network
    pub fn address_url(&self, address: &Address) -> Option<String> {
        self.explorer_url()
            .map(|base| format!("{}/address/{address}", base.trim_end_matches('/')))
    }

    /// The EIP-3770 qualified form of an address, e.g. `eth:0xabc...`
    pub fn qualified_address(&self, address: &Address) -> String {
        match self.short_name() {
            Some(short) => format!("{short}:{address}"),
            None => address.to_string(),
        }
    }

    /// `(api, base)` explorer URLs, if the chain is known to `alloy-chains`
    fn etherscan_urls(&self) -> Option<(&'static str, &'static str)> {
        NamedChain::try_from(self.chain_id)
            .ok()
            .and_then(|chain| chain.etherscan_urls())
    }
}

impl Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.admin_name() {
            Some(name) => write!(f, "{name} ({})", self.chain_id),
            None => write!(f, "chain {}", self.chain_id),
        }
    }
}
