//! Client configuration.

use anyhow::{bail, Context, Result};
use cipherledger_core::{parse_address, LedgerManifest, DEFAULT_CONFIRMATIONS};
use cipherledger_core::manifest::VARIANT_SIMPLIFIED;
use ethers::types::Address;
use std::collections::HashMap;
use std::env;
use std::path::PathBuf;
use std::time::Duration;
use tracing::warn;

use crate::encryption::DEFAULT_INIT_TIMEOUT;

/// Chain the single-address variable applies to.
pub const SEPOLIA_CHAIN_ID: u64 = 11_155_111;

/// Ledger contract addresses by chain id.
///
/// Entries are kept as given and validated on lookup, so one malformed entry
/// only affects its own chain.
#[derive(Clone, Debug, Default)]
pub struct ContractDirectory {
    entries: HashMap<u64, String>,
}

impl ContractDirectory {
    /// Build from the `SUPPLY_LEDGER_ADDRESS` (Sepolia) and
    /// `SUPPLY_LEDGER_ADDRESSES` (`chainId=0xaddr,...`) values.
    pub fn parse(sepolia: Option<&str>, mapping: Option<&str>) -> Self {
        let mut entries = HashMap::new();

        for pair in mapping.unwrap_or_default().split(',') {
            let pair = pair.trim();
            if pair.is_empty() {
                continue;
            }
            match pair.split_once('=') {
                Some((chain, address)) => match chain.trim().parse::<u64>() {
                    Ok(chain_id) => {
                        entries.insert(chain_id, address.trim().to_string());
                    }
                    Err(_) => warn!("Ignoring contract entry with bad chain id: {}", pair),
                },
                None => warn!("Ignoring malformed contract entry: {}", pair),
            }
        }

        if let Some(address) = sepolia.map(str::trim).filter(|a| !a.is_empty()) {
            entries.insert(SEPOLIA_CHAIN_ID, address.to_string());
        }

        Self { entries }
    }

    pub fn with_address(mut self, chain_id: u64, address: Address) -> Self {
        self.entries.insert(chain_id, format!("{address:?}"));
        self
    }

    /// Contract address for `chain_id`. Unsupported chains and malformed
    /// entries resolve to the zero address.
    pub fn address_for(&self, chain_id: u64) -> Address {
        let Some(raw) = self.entries.get(&chain_id) else {
            warn!("No ledger contract configured for chain {}", chain_id);
            return Address::zero();
        };
        match parse_address("contract", raw) {
            Ok(address) => address,
            Err(e) => {
                warn!("Invalid ledger contract address for chain {}: {}", chain_id, e);
                Address::zero()
            }
        }
    }

    pub fn chains(&self) -> impl Iterator<Item = u64> + '_ {
        self.entries.keys().copied()
    }
}

/// Client configuration.
#[derive(Clone, Debug)]
pub struct ClientConfig {
    /// JSON-RPC endpoint of the ledger chain.
    pub rpc_url: String,
    /// Signing key of the wallet session.
    pub private_key: String,
    /// Built-in deployment variant.
    pub variant: String,
    /// JSON manifest overriding the variant.
    pub manifest_path: Option<PathBuf>,
    pub contracts: ContractDirectory,
    /// Encryption relayer base URL.
    pub encryption_relayer_url: Option<String>,
    pub encryption_init_timeout: Duration,
    /// Confirmation depth; 1 waits for inclusion only.
    pub confirmations: usize,
}

impl ClientConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let rpc_url = lookup("LEDGER_RPC_URL").context("LEDGER_RPC_URL must be set")?;
        let private_key = lookup("LEDGER_PRIVATE_KEY").context("LEDGER_PRIVATE_KEY must be set")?;

        let variant = lookup("LEDGER_VARIANT").unwrap_or_else(|| VARIANT_SIMPLIFIED.to_string());
        let manifest_path = lookup("LEDGER_MANIFEST_PATH").map(PathBuf::from);

        let contracts = ContractDirectory::parse(
            lookup("SUPPLY_LEDGER_ADDRESS").as_deref(),
            lookup("SUPPLY_LEDGER_ADDRESSES").as_deref(),
        );

        let encryption_relayer_url = lookup("ENCRYPTION_RELAYER_URL").filter(|s| !s.trim().is_empty());

        let encryption_init_timeout = lookup("ENCRYPTION_INIT_TIMEOUT_SECS")
            .and_then(|s| s.parse().ok())
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_INIT_TIMEOUT);

        let confirmations: usize = lookup("LEDGER_CONFIRMATIONS")
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_CONFIRMATIONS)
            .max(1);

        Ok(Self {
            rpc_url,
            private_key,
            variant,
            manifest_path,
            contracts,
            encryption_relayer_url,
            encryption_init_timeout,
            confirmations,
        })
    }

    /// Resolve the deployment manifest: the JSON file when set, otherwise
    /// the built-in variant.
    pub fn manifest(&self) -> Result<LedgerManifest> {
        if let Some(path) = &self.manifest_path {
            let json = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read manifest {}", path.display()))?;
            return LedgerManifest::from_json(&json)
                .with_context(|| format!("Invalid manifest {}", path.display()));
        }
        match LedgerManifest::builtin(&self.variant) {
            Some(manifest) => Ok(manifest),
            None => bail!("Unknown LEDGER_VARIANT: {}", self.variant),
        }
    }
}
