//! Typed views of ledger read calls.
//!
//! Contract view functions return positional tuples. They are decoded here,
//! once, into named records; nothing past this module indexes by position.

use ethers_core::abi::Token;
use ethers_core::types::{Address, U256};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::vec::IntoIter;

use crate::category::{CargoCategory, ShipmentStatus};
use crate::draft::Metric;
use crate::error::ContractCallError;
use crate::identifier::ShipmentId;
use crate::manifest::{RecordLayout, StatsTail};

/// On-chain projection of a shipment.
///
/// A shipment that was never submitted decodes to the all-zero record:
/// zero addresses, no category, `Draft` status and `is_active == false`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShipmentRecord {
    pub shipment_id: ShipmentId,
    pub shipper: Address,
    pub carrier: Address,
    pub receiver: Address,
    pub category: Option<CargoCategory>,
    /// Category as reported by the contract; empty when not found.
    pub category_label: String,
    pub status: ShipmentStatus,
    pub submitted_at: u64,
    pub delivered_at: u64,
    pub is_active: bool,
    /// Plaintext metrics exposed by the record layout.
    pub metrics: BTreeMap<Metric, u64>,
    /// Bookkeeping only present in the full layout.
    pub details: Option<RecordDetails>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordDetails {
    pub cleared_at: u64,
    pub is_insured: bool,
    pub status_change_count: u64,
    pub checkpoint_count: u64,
}

impl ShipmentRecord {
    /// Decode a `getShipmentInfo` return value.
    pub fn decode(
        layout: RecordLayout,
        shipment_id: ShipmentId,
        tokens: Vec<Token>,
    ) -> Result<Self, ContractCallError> {
        let mut reader = TokenReader::new("getShipmentInfo", tokens);

        let shipper = reader.address()?;
        let carrier = reader.address()?;
        let receiver = reader.address()?;
        let found = !shipper.is_zero();

        let (category, category_label) = match layout {
            RecordLayout::Full => {
                let index = reader.u8()?;
                if found {
                    let category = CargoCategory::from_index(index);
                    let label = category.map(|c| c.label()).unwrap_or("Unknown").to_string();
                    (category, label)
                } else {
                    (None, String::new())
                }
            }
            RecordLayout::Compact => {
                let label = reader.string()?;
                (CargoCategory::resolve(&label).ok(), label)
            }
        };

        let status_index = reader.u8()?;
        let status = ShipmentStatus::from_index(status_index).ok_or_else(|| {
            ContractCallError::invalid_response(format!("unknown shipment status {status_index}"))
        })?;
        let submitted_at = reader.u64()?;

        let (delivered_at, is_active, details, metrics) = match layout {
            RecordLayout::Full => {
                let cleared_at = reader.u64()?;
                let delivered_at = reader.u64()?;
                let is_active = reader.bool()?;
                let details = RecordDetails {
                    cleared_at,
                    is_insured: reader.bool()?,
                    status_change_count: reader.u64()?,
                    checkpoint_count: reader.u64()?,
                };
                (delivered_at, is_active, Some(details), BTreeMap::new())
            }
            RecordLayout::Compact => {
                let delivered_at = reader.u64()?;
                let is_active = reader.bool()?;
                let mut metrics = BTreeMap::new();
                for metric in layout.plaintext_metrics() {
                    metrics.insert(*metric, reader.u64()?);
                }
                (delivered_at, is_active, None, metrics)
            }
        };
        reader.finish()?;

        Ok(Self {
            shipment_id,
            shipper,
            carrier,
            receiver,
            category,
            category_label,
            status,
            submitted_at,
            delivered_at,
            is_active,
            metrics,
            details,
        })
    }

    /// Whether the contract holds a record for this id.
    pub fn is_found(&self) -> bool {
        !self.shipper.is_zero()
    }
}

/// Aggregate ledger counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SupplyStats {
    pub total_shipments: u64,
    pub delivered: u64,
    /// Reported by deployments whose stats end with an active count.
    pub active: Option<u64>,
    /// Reported by deployments whose stats end with a lost count.
    pub lost: Option<u64>,
}

impl SupplyStats {
    pub fn decode(tail: StatsTail, tokens: Vec<Token>) -> Result<Self, ContractCallError> {
        let mut reader = TokenReader::new("stats", tokens);
        let total_shipments = reader.u64()?;
        let delivered = reader.u64()?;
        let third = reader.u64()?;
        reader.finish()?;

        let (active, lost) = match tail {
            StatsTail::Active => (Some(third), None),
            StatsTail::Lost => (None, Some(third)),
        };
        Ok(Self {
            total_shipments,
            delivered,
            active,
            lost,
        })
    }
}

/// Shipment ids a user takes part in, by role.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserShipmentIds {
    pub as_shipper: Vec<ShipmentId>,
    pub as_carrier: Vec<ShipmentId>,
    pub as_receiver: Vec<ShipmentId>,
}

impl UserShipmentIds {
    pub fn decode(tokens: Vec<Token>) -> Result<Self, ContractCallError> {
        let mut reader = TokenReader::new("getAllUserShipments", tokens);
        let ids = Self {
            as_shipper: reader.bytes32_array()?,
            as_carrier: reader.bytes32_array()?,
            as_receiver: reader.bytes32_array()?,
        };
        reader.finish()?;
        Ok(ids)
    }

    pub fn len(&self) -> usize {
        self.as_shipper.len() + self.as_carrier.len() + self.as_receiver.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Shipment records a user takes part in, by role.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserShipments {
    pub as_shipper: Vec<ShipmentRecord>,
    pub as_carrier: Vec<ShipmentRecord>,
    pub as_receiver: Vec<ShipmentRecord>,
}

/// Decode a single `bool` return value.
pub fn decode_bool(function: &str, tokens: Vec<Token>) -> Result<bool, ContractCallError> {
    let mut reader = TokenReader::new(function, tokens);
    let value = reader.bool()?;
    reader.finish()?;
    Ok(value)
}

/// Decode a single `uint256` return value that must fit a `u64`.
pub fn decode_u64(function: &str, tokens: Vec<Token>) -> Result<u64, ContractCallError> {
    let mut reader = TokenReader::new(function, tokens);
    let value = reader.u64()?;
    reader.finish()?;
    Ok(value)
}

// ═══════════════════════════════════════════════════════════════════════════════
// POSITIONAL READER
// ═══════════════════════════════════════════════════════════════════════════════

struct TokenReader {
    function: String,
    tokens: IntoIter<Token>,
    position: usize,
}

impl TokenReader {
    fn new(function: &str, tokens: Vec<Token>) -> Self {
        Self {
            function: function.to_string(),
            tokens: tokens.into_iter(),
            position: 0,
        }
    }

    fn next(&mut self, expected: &str) -> Result<Token, ContractCallError> {
        let position = self.position;
        self.position += 1;
        self.tokens.next().ok_or_else(|| {
            ContractCallError::invalid_response(format!(
                "{}: missing {} at position {}",
                self.function, expected, position
            ))
        })
    }

    fn mismatch(&self, expected: &str, got: &Token) -> ContractCallError {
        ContractCallError::invalid_response(format!(
            "{}: expected {} at position {}, got {:?}",
            self.function,
            expected,
            self.position - 1,
            got
        ))
    }

    fn address(&mut self) -> Result<Address, ContractCallError> {
        match self.next("address")? {
            Token::Address(address) => Ok(address),
            other => Err(self.mismatch("address", &other)),
        }
    }

    fn uint(&mut self, expected: &str) -> Result<U256, ContractCallError> {
        match self.next(expected)? {
            Token::Uint(value) => Ok(value),
            other => Err(self.mismatch(expected, &other)),
        }
    }

    fn u64(&mut self) -> Result<u64, ContractCallError> {
        let value = self.uint("uint")?;
        if value > U256::from(u64::MAX) {
            return Err(ContractCallError::invalid_response(format!(
                "{}: value {} at position {} exceeds u64",
                self.function,
                value,
                self.position - 1
            )));
        }
        Ok(value.low_u64())
    }

    fn u8(&mut self) -> Result<u8, ContractCallError> {
        let value = self.uint("uint8")?;
        if value > U256::from(u8::MAX) {
            return Err(ContractCallError::invalid_response(format!(
                "{}: value {} at position {} exceeds uint8",
                self.function,
                value,
                self.position - 1
            )));
        }
        Ok(value.low_u32() as u8)
    }

    fn bool(&mut self) -> Result<bool, ContractCallError> {
        match self.next("bool")? {
            Token::Bool(value) => Ok(value),
            other => Err(self.mismatch("bool", &other)),
        }
    }

    fn string(&mut self) -> Result<String, ContractCallError> {
        match self.next("string")? {
            Token::String(value) => Ok(value),
            other => Err(self.mismatch("string", &other)),
        }
    }

    fn bytes32_array(&mut self) -> Result<Vec<ShipmentId>, ContractCallError> {
        let items = match self.next("bytes32[]")? {
            Token::Array(items) => items,
            other => return Err(self.mismatch("bytes32[]", &other)),
        };
        items
            .into_iter()
            .map(|item| match item {
                Token::FixedBytes(bytes) if bytes.len() == 32 => {
                    let mut id = [0u8; 32];
                    id.copy_from_slice(&bytes);
                    Ok(ShipmentId::from_bytes(id))
                }
                other => Err(self.mismatch("bytes32", &other)),
            })
            .collect()
    }

    fn finish(mut self) -> Result<(), ContractCallError> {
        match self.tokens.next() {
            None => Ok(()),
            Some(extra) => Err(ContractCallError::invalid_response(format!(
                "{}: unexpected trailing value {:?}",
                self.function, extra
            ))),
        }
    }
}
