//! Utilities for the release scripts.

use std::str::FromStr;

use alloy::{
    providers::{DynProvider, Provider, ProviderBuilder},
    signers::local::PrivateKeySigner,
    transports::http::reqwest::Url,
};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::errors::ScriptError;

/// The log filter used when `RUST_LOG` is unset
const DEFAULT_LOG_FILTER: &str = "info";

/// Sets up the provider the scripts talk to the chain through.
///
/// Transactions are signed with the given private key, if any; without one
/// the provider can only read chain state.
pub fn setup_provider(rpc_url: &str, priv_key: Option<&str>) -> Result<DynProvider, ScriptError> {
    let url = Url::parse(rpc_url).map_err(|e| ScriptError::ClientInitialization(e.to_string()))?;

    let provider = match priv_key {
        Some(key) => {
            let signer = PrivateKeySigner::from_str(key)
                .map_err(|e| ScriptError::ClientInitialization(e.to_string()))?;
            ProviderBuilder::new().wallet(signer).connect_http(url).erased()
        },
        None => ProviderBuilder::new().connect_http(url).erased(),
    };

    Ok(provider)
}

/// Fetch the chain ID of the network the provider is connected to
pub async fn chain_id(provider: &DynProvider) -> Result<u64, ScriptError> {
    provider
        .get_chain_id()
        .await
        .map_err(|e| ScriptError::ClientInitialization(e.to_string()))
}

/// Sets up logging to stderr, filtered by `RUST_LOG` (`info` by default)
pub fn setup_logging() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .with(filter)
        .init();
}
