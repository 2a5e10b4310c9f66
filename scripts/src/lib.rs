//! Scripts for deploying, upgrading & verifying upgradeable contracts
//! across releases.

#![deny(missing_docs)]
#![deny(clippy::missing_docs_in_private_items)]

pub mod artifacts;
pub mod cli;
pub mod commands;
pub mod constants;
pub mod defender;
pub mod errors;
pub mod etherscan;
pub mod provenance;
mod solidity;
pub mod summary;
pub mod upgrades;
pub mod utils;
