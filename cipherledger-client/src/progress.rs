//! Submission progress notifications.

use cipherledger_core::ShipmentId;
use ethers::types::H256;
use std::fmt;
use std::time::Duration;

/// Stages reported while a shipment is being submitted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmissionProgress {
    /// Draft normalized; about to encrypt `count` fields.
    Encrypting { shipment_id: ShipmentId, count: usize },
    /// All fields encrypted.
    Encrypted { count: usize, elapsed: Duration },
    /// Transaction accepted by the node.
    Dispatched { tx_hash: H256 },
    /// Waiting for inclusion and `confirmations` blocks.
    AwaitingConfirmation { tx_hash: H256, confirmations: usize },
    Confirmed { tx_hash: H256, block_number: Option<u64> },
}

impl SubmissionProgress {
    pub fn tx_hash(&self) -> Option<H256> {
        match self {
            SubmissionProgress::Dispatched { tx_hash }
            | SubmissionProgress::AwaitingConfirmation { tx_hash, .. }
            | SubmissionProgress::Confirmed { tx_hash, .. } => Some(*tx_hash),
            _ => None,
        }
    }
}

impl fmt::Display for SubmissionProgress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SubmissionProgress::Encrypting { shipment_id, count } => {
                write!(f, "Encrypting {count} parameters for shipment {shipment_id}")
            }
            SubmissionProgress::Encrypted { count, elapsed } => {
                write!(f, "Encrypted {count} parameters in {:.1}s", elapsed.as_secs_f64())
            }
            SubmissionProgress::Dispatched { tx_hash } => {
                write!(f, "Transaction sent: {tx_hash:?}")
            }
            SubmissionProgress::AwaitingConfirmation { confirmations, .. } => {
                if *confirmations <= 1 {
                    write!(f, "Waiting for confirmation...")
                } else {
                    write!(f, "Waiting for {confirmations} confirmations...")
                }
            }
            SubmissionProgress::Confirmed { block_number, .. } => match block_number {
                Some(block) => write!(f, "Confirmed in block {block}"),
                None => write!(f, "Confirmed"),
            },
        }
    }
}
