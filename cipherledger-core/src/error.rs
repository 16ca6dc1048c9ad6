//! Error taxonomy for ledger client operations.
//!
//! Every failure surfaced to a caller is one of four kinds: local input
//! validation, encryption provider failures, contract call failures, and
//! deployment configuration problems.

use ethers_core::types::H256;
use std::time::Duration;
use thiserror::Error;

/// Input rejected before any network call.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("shipment id is required")]
    EmptyIdentifier,

    #[error("shipment id must be <= 31 bytes or a 32-byte hex string (got {0} bytes)")]
    IdentifierTooLong(usize),

    #[error("{field}: invalid address {value:?}: {reason}")]
    InvalidAddress {
        field: String,
        value: String,
        reason: String,
    },

    #[error("invalid cargo category: {0:?}")]
    UnknownCategory(String),

    #[error("{field}: value {value} does not fit in {bits} bits")]
    ValueOutOfRange { field: String, value: u64, bits: u16 },
}

/// Encryption provider failures. All of them clear up once the provider is
/// reachable again, so callers may retry.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum EncryptionError {
    #[error("encryption provider unavailable: {0}")]
    Unavailable(String),

    #[error("encryption provider not ready after {0:?}")]
    InitTimeout(Duration),

    #[error("encryption failed: {0}")]
    Failed(String),

    #[error("malformed encryption response: {0}")]
    MalformedResponse(String),
}

/// Contract call failures.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ContractCallError {
    /// The contract rejected the call (permission denied, illegal state
    /// transition, unknown shipment, contract missing).
    #[error("contract call reverted: {reason}")]
    Reverted {
        reason: String,
        tx_hash: Option<H256>,
    },

    /// Transport failure, timeout, or a transaction dropped from the pool.
    #[error("network error: {message}")]
    Network {
        message: String,
        tx_hash: Option<H256>,
    },

    /// The contract answered with data that does not match the expected ABI.
    #[error("invalid contract response: {message}")]
    InvalidResponse {
        message: String,
        tx_hash: Option<H256>,
    },
}

impl ContractCallError {
    pub fn reverted(reason: impl Into<String>) -> Self {
        ContractCallError::Reverted {
            reason: reason.into(),
            tx_hash: None,
        }
    }

    pub fn network(message: impl Into<String>) -> Self {
        ContractCallError::Network {
            message: message.into(),
            tx_hash: None,
        }
    }

    pub fn invalid_response(message: impl Into<String>) -> Self {
        ContractCallError::InvalidResponse {
            message: message.into(),
            tx_hash: None,
        }
    }

    /// Transaction hash known at the time of failure, if any.
    pub fn tx_hash(&self) -> Option<H256> {
        match self {
            ContractCallError::Reverted { tx_hash, .. }
            | ContractCallError::Network { tx_hash, .. }
            | ContractCallError::InvalidResponse { tx_hash, .. } => *tx_hash,
        }
    }

    /// Attach a transaction hash. An already attached hash is kept.
    pub fn with_tx_hash(self, hash: H256) -> Self {
        match self {
            ContractCallError::Reverted { reason, tx_hash } => ContractCallError::Reverted {
                reason,
                tx_hash: tx_hash.or(Some(hash)),
            },
            ContractCallError::Network { message, tx_hash } => ContractCallError::Network {
                message,
                tx_hash: tx_hash.or(Some(hash)),
            },
            ContractCallError::InvalidResponse { message, tx_hash } => ContractCallError::InvalidResponse {
                message,
                tx_hash: tx_hash.or(Some(hash)),
            },
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, ContractCallError::Network { .. })
    }
}

/// Deployment configuration problems. Not retryable until the configuration
/// changes.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigurationError {
    #[error("ledger contract address is not configured for chain {0}")]
    ContractNotConfigured(u64),

    #[error("missing configuration: {0}")]
    Missing(String),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Aggregated error type returned by orchestrator operations.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LedgerError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Encryption(#[from] EncryptionError),

    #[error(transparent)]
    Contract(#[from] ContractCallError),

    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
}

impl LedgerError {
    /// Get a machine-readable error code.
    pub fn error_code(&self) -> &'static str {
        match self {
            LedgerError::Validation(_) => "VALIDATION_ERROR",
            LedgerError::Encryption(EncryptionError::InitTimeout(_)) => "ENCRYPTION_TIMEOUT",
            LedgerError::Encryption(_) => "ENCRYPTION_ERROR",
            LedgerError::Contract(ContractCallError::Reverted { .. }) => "CONTRACT_REVERTED",
            LedgerError::Contract(ContractCallError::Network { .. }) => "NETWORK_ERROR",
            LedgerError::Contract(ContractCallError::InvalidResponse { .. }) => "INVALID_RESPONSE",
            LedgerError::Configuration(_) => "CONFIGURATION_ERROR",
        }
    }

    /// Check if this error is retryable without changing input or state.
    pub fn is_retryable(&self) -> bool {
        match self {
            LedgerError::Validation(_) | LedgerError::Configuration(_) => false,
            LedgerError::Encryption(_) => true,
            LedgerError::Contract(err) => err.is_retryable(),
        }
    }

    /// Hash of a transaction that was dispatched before the failure.
    pub fn tx_hash(&self) -> Option<H256> {
        match self {
            LedgerError::Contract(err) => err.tx_hash(),
            _ => None,
        }
    }
}
