//! Type definitions for the records kept in the address book & release manifest

use std::collections::BTreeMap;

use alloy_primitives::Address;
use serde::{Deserialize, Serialize};

use crate::errors::StoreError;

/// The addresses recorded for a single deployed contract.
///
/// Either field may be absent in a partial update, but a record with neither
/// field is never persisted.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentRecord {
    /// The address of the proxy users interact with
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<Address>,
    /// The address of the implementation contract behind the proxy
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub implementation: Option<Address>,
}

impl DeploymentRecord {
    /// A record for a freshly deployed proxy & its implementation
    pub fn proxy(address: Address, implementation: Address) -> Self {
        Self {
            address: Some(address),
            implementation: Some(implementation),
        }
    }

    /// A partial record that only refreshes the implementation
    pub fn implementation_only(implementation: Address) -> Self {
        Self {
            address: None,
            implementation: Some(implementation),
        }
    }

    /// Whether the record carries no address at all
    pub fn is_empty(&self) -> bool {
        self.address.is_none() && self.implementation.is_none()
    }

    /// Merge the fields present in `partial` into this record,
    /// leaving the fields it omits untouched
    pub fn merge(&mut self, partial: &DeploymentRecord) {
        if let Some(address) = partial.address {
            self.address = Some(address);
        }
        if let Some(implementation) = partial.implementation {
            self.implementation = Some(implementation);
        }
    }

    /// The address to verify source code at: the proxy if there is one,
    /// otherwise the bare implementation
    pub fn proxy_or_implementation(&self) -> Option<Address> {
        self.address.or(self.implementation)
    }

    /// The address to verify bytecode at: the implementation if known,
    /// otherwise the proxy
    pub fn implementation_or_proxy(&self) -> Option<Address> {
        self.implementation.or(self.address)
    }
}

/// The deployments on a single chain, keyed by contract name
pub type ChainDeployments = BTreeMap<String, DeploymentRecord>;

/// The durable, cross-release ledger of deployments, keyed by chain ID
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AddressBook(BTreeMap<String, ChainDeployments>);

impl AddressBook {
    /// Get the record for a contract on a chain
    pub fn get(&self, chain_id: u64, contract: &str) -> Result<DeploymentRecord, StoreError> {
        self.0
            .get(&chain_id.to_string())
            .and_then(|deployments| deployments.get(contract))
            .copied()
            .ok_or_else(|| StoreError::NotFound {
                chain_id,
                contract: contract.to_string(),
            })
    }

    /// Merge a partial record into the entry for a contract on a chain,
    /// creating the chain & contract entries if absent.
    ///
    /// Returns the merged record.
    pub fn upsert(
        &mut self,
        chain_id: u64,
        contract: &str,
        partial: &DeploymentRecord,
    ) -> Result<DeploymentRecord, StoreError> {
        if partial.is_empty() {
            return Err(StoreError::EmptyRecord(contract.to_string()));
        }

        let record = self
            .0
            .entry(chain_id.to_string())
            .or_default()
            .entry(contract.to_string())
            .or_default();
        record.merge(partial);

        Ok(*record)
    }

    /// The deployments recorded for a chain, if any
    pub fn chain(&self, chain_id: u64) -> Option<&ChainDeployments> {
        self.0.get(&chain_id.to_string())
    }

    /// Ensure every chain key is a chain ID & no record is empty
    pub(crate) fn validate(&self) -> Result<(), String> {
        for (chain_id, deployments) in &self.0 {
            chain_id
                .parse::<u64>()
                .map_err(|_| format!("chain key `{chain_id}` is not a chain ID"))?;
            validate_records(deployments)
                .map_err(|reason| format!("chain {chain_id}: {reason}"))?;
        }

        Ok(())
    }
}

/// The working set of deployments touched by a single release, keyed by
/// contract name. A release targets a single chain, so there is no chain nesting.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReleaseManifest(ChainDeployments);

impl ReleaseManifest {
    /// Merge a partial record into the entry for a contract,
    /// returning the merged record
    pub fn upsert(
        &mut self,
        contract: &str,
        partial: &DeploymentRecord,
    ) -> Result<DeploymentRecord, StoreError> {
        if partial.is_empty() {
            return Err(StoreError::EmptyRecord(contract.to_string()));
        }

        let record = self.0.entry(contract.to_string()).or_default();
        record.merge(partial);

        Ok(*record)
    }

    /// Get the record for a contract, if the release touched it
    pub fn get(&self, contract: &str) -> Option<&DeploymentRecord> {
        self.0.get(contract)
    }

    /// Iterate over the records in the manifest, ordered by contract name
    pub fn iter(&self) -> impl Iterator<Item = (&String, &DeploymentRecord)> {
        self.0.iter()
    }

    /// The entries that carry a new implementation, i.e. the contracts
    /// actually upgraded by this release
    pub fn upgraded(&self) -> impl Iterator<Item = (&String, Address)> {
        self.0
            .iter()
            .filter_map(|(name, record)| record.implementation.map(|imp| (name, imp)))
    }

    /// Whether the release has touched any contract yet
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Ensure no record in the manifest is empty
    pub(crate) fn validate(&self) -> Result<(), String> {
        validate_records(&self.0)
    }
}

impl FromIterator<(String, DeploymentRecord)> for ReleaseManifest {
    fn from_iter<I: IntoIterator<Item = (String, DeploymentRecord)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Free-form metadata labelling a release, used to title the upgrade proposal
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseMetadata {
    /// The title of the release
    #[serde(default)]
    pub title: Option<String>,
    /// A longer description of the release
    #[serde(default)]
    pub description: Option<String>,
}

/// Reject records that carry neither a proxy nor an implementation address
fn validate_records(deployments: &ChainDeployments) -> Result<(), String> {
    match deployments.iter().find(|(_, record)| record.is_empty()) {
        Some((name, _)) => Err(format!("record for {name} has no address")),
        None => Ok(()),
    }
}
