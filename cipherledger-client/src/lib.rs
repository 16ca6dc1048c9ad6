//! cipherledger-client
//!
//! Shipment submission against a privacy-preserving supply-chain ledger.
//!
//! Two collaborators are consumed through traits:
//! - [`EncryptionProvider`]: FHE encryption of bounded integers for a
//!   contract/user pair, shared process-wide through [`EncryptionRuntime`].
//! - [`LedgerClient`]: transaction dispatch, receipts and read-only calls.
//!
//! [`ShipmentOrchestrator`] ties them together for one contract deployment.

pub mod config;
pub mod encryption;
pub mod evm;
pub mod ledger;
pub mod orchestrator;
pub mod progress;
pub mod relayer;

pub use config::{ClientConfig, ContractDirectory};
pub use encryption::{
    EncryptionProvider, EncryptionRequest, EncryptionRuntime, ProviderFactory, SharedEncryption,
    UnavailableFactory,
};
pub use evm::EthersLedgerClient;
pub use ledger::{LedgerCall, LedgerClient};
pub use orchestrator::ShipmentOrchestrator;
pub use progress::SubmissionProgress;
pub use relayer::{RelayerEncryptionProvider, RelayerFactory};

use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::info;

/// Connect a wallet session and build an orchestrator for the configured
/// deployment. Encryption is initialized lazily on the first submission.
pub async fn connect(config: &ClientConfig) -> Result<ShipmentOrchestrator> {
    let manifest = config.manifest()?;

    let ledger = EthersLedgerClient::connect(&config.rpc_url, &config.private_key)
        .await
        .context("Failed to connect wallet session")?;
    let contract = config.contracts.address_for(ledger.chain_id());

    let factory: Arc<dyn ProviderFactory> = match &config.encryption_relayer_url {
        Some(url) => Arc::new(RelayerFactory::new(url.clone())),
        None => Arc::new(UnavailableFactory::new("ENCRYPTION_RELAYER_URL is not set")),
    };
    let encryption = SharedEncryption::global(factory, config.encryption_init_timeout);

    info!(
        "Using {} ledger at {:?} on chain {}",
        manifest.name,
        contract,
        ledger.chain_id()
    );

    let orchestrator = ShipmentOrchestrator::new(Arc::new(ledger), Arc::new(encryption), manifest, contract)?
        .with_confirmations(config.confirmations);
    Ok(orchestrator)
}
