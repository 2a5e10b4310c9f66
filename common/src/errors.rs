//! Errors raised while reading or writing the deployment stores

use thiserror::Error;

/// Errors that can occur while accessing the address book or release manifest
#[derive(Debug, Error)]
pub enum StoreError {
    /// The address book has no entry for the given chain & contract
    #[error("could not find info for {contract} on chain {chain_id}")]
    NotFound {
        /// The chain that was looked up
        chain_id: u64,
        /// The contract that was looked up
        contract: String,
    },
    /// A store file exists but does not match the expected schema
    #[error("malformed file {path}: {reason}")]
    Schema {
        /// The offending file
        path: String,
        /// What was wrong with it
        reason: String,
    },
    /// A write was attempted with a record that carries no address at all
    #[error("refusing to record an empty deployment for {0}")]
    EmptyRecord(String),
    /// Error reading a store file from disk
    #[error("error reading {path}: {reason}")]
    Read {
        /// The file being read
        path: String,
        /// The underlying I/O error
        reason: String,
    },
    /// Error writing a store file to disk
    #[error("error writing {path}: {reason}")]
    Write {
        /// The file being written
        path: String,
        /// The underlying I/O or serialization error
        reason: String,
    },
}
