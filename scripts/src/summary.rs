//! Markdown summaries of a task's outcome, written to the CI step summary file

use std::{
    fs::{self, OpenOptions},
    io::Write,
    path::PathBuf,
};

use alloy::primitives::Address;
use itertools::Itertools;
use release_common::{constants::UNKNOWN_ADDRESS, networks::Network, types::ReleaseManifest};

use crate::{constants::SAFE_APP_URL, errors::ScriptError};

/// The file a task's summary is written to
#[derive(Clone, Debug)]
pub struct SummarySink {
    /// The path of the summary file
    path: PathBuf,
}

impl SummarySink {
    /// Write summaries to the file at `path`
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Append a section to the summary
    pub fn append(&self, contents: &str) -> Result<(), ScriptError> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| ScriptError::Summary(e.to_string()))?;

        file.write_all(contents.as_bytes())
            .map_err(|e| ScriptError::Summary(e.to_string()))
    }

    /// Replace the summary
    pub fn write(&self, contents: &str) -> Result<(), ScriptError> {
        fs::write(&self.path, contents).map_err(|e| ScriptError::Summary(e.to_string()))
    }
}

/// The summary of the proxies deployed by a release, `None` if there are none
pub fn proxies_summary(network: &Network, manifest: &ReleaseManifest) -> Option<String> {
    if manifest.is_empty() {
        return None;
    }

    let list = manifest
        .iter()
        .map(|(name, record)| {
            format!(
                "- {name} at {} with implementation at {}",
                address_link(network, record.address),
                address_link(network, record.implementation)
            )
        })
        .join("\n");

    Some(format!("## Contracts deployed\n\n{list}\n"))
}

/// The summary of the implementations deployed by a release, `None` if there are none
pub fn implementations_summary(network: &Network, manifest: &ReleaseManifest) -> Option<String> {
    if manifest.is_empty() {
        return None;
    }

    let list = manifest
        .iter()
        .map(|(name, record)| {
            format!("- {name} at {}", address_link(network, record.implementation))
        })
        .join("\n");

    Some(format!("## Implementation contracts deployed\n\n{list}\n"))
}

/// The summary asking the multisig signers to approve a proposal
pub fn approval_summary(network: &Network, proposal_url: &str, multisig: Address) -> String {
    let safe_link = format!("{SAFE_APP_URL}/{}/home", network.qualified_address(&multisig));
    format!(
        "## Approval\n\n[Approval required]({proposal_url}) by multisig \
         [`{multisig}`]({safe_link}) signers."
    )
}

/// A markdown link to an address on the network's block explorer
fn address_link(network: &Network, address: Option<Address>) -> String {
    let Some(address) = address else {
        return format!("`{UNKNOWN_ADDRESS}`");
    };

    match network.address_url(&address) {
        Some(url) => format!("[`{address}`]({url})"),
        None => format!("`{address}`"),
    }
}
