//! cipherledger-core
//!
//! Domain types for a privacy-preserving supply-chain ledger client.
//! Shipments are recorded by an EVM contract; sensitive numeric fields are
//! submitted as FHE ciphertext handles with validity proofs.
//!
//! This crate holds everything that does not touch the network: identifier
//! normalization, address and category validation, deployment manifests
//! and the ABI derived from them, and decoding of contract return values.

use ethers_core::types::{Address, H256};
use serde::{Deserialize, Serialize};

pub mod abi;
pub mod address;
pub mod category;
pub mod draft;
pub mod error;
pub mod explorer;
pub mod identifier;
pub mod manifest;
pub mod record;

pub use abi::LedgerAbi;
pub use address::{checksum, parse_address};
pub use category::{CargoCategory, ShipmentStatus, CARGO_CATEGORIES, SHIPMENT_STATUSES};
pub use draft::{Metric, NormalizedDraft, ShipmentDraft, ShipmentMetrics};
pub use error::{ConfigurationError, ContractCallError, EncryptionError, LedgerError, ValidationError};
pub use identifier::ShipmentId;
pub use manifest::{BitWidth, CategoryArg, FieldEncoding, LedgerManifest, RecordLayout, StatsTail};
pub use record::{ShipmentRecord, SupplyStats, UserShipmentIds, UserShipments};

/// Default confirmation depth: wait for inclusion only.
pub const DEFAULT_CONFIRMATIONS: usize = 1;

// ═══════════════════════════════════════════════════════════════════════════════
// ENCRYPTED INPUT
// ═══════════════════════════════════════════════════════════════════════════════

/// One encrypted metric, bound to the contract and user it was produced for.
///
/// Never reuse across submissions or contracts: a different binding needs a
/// fresh encryption.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptedField {
    /// Ciphertext handle passed as `bytes32`.
    pub handle: [u8; 32],
    /// Input validity proof passed as `bytes`.
    pub proof: Vec<u8>,
    pub bits: BitWidth,
    pub contract: Address,
    pub user: Address,
}

impl EncryptedField {
    pub fn is_bound_to(&self, contract: Address, user: Address) -> bool {
        self.contract == contract && self.user == user
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// TRANSACTION OUTCOMES
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReceiptStatus {
    Success,
    Failed,
}

/// Final on-chain outcome of a transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxReceipt {
    pub tx_hash: H256,
    pub block_number: Option<u64>,
    pub gas_used: Option<u64>,
    pub status: ReceiptStatus,
}

impl TxReceipt {
    pub fn succeeded(&self) -> bool {
        self.status == ReceiptStatus::Success
    }
}

/// Confirmed shipment submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionResult {
    pub shipment_id: ShipmentId,
    pub tx_hash: H256,
    pub receipt: TxReceipt,
}

/// Confirmed one-shot call: a lifecycle transition or an admin action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionResult {
    pub action: String,
    /// Shipment the action applied to, for lifecycle transitions.
    pub shipment_id: Option<ShipmentId>,
    /// Account the action applied to, for role management.
    pub account: Option<Address>,
    pub tx_hash: H256,
    pub receipt: TxReceipt,
}
