//! Shipment identifiers.
//!
//! The ledger keys shipments by `bytes32`. Callers may pass either the
//! 32-byte hex form directly or a short free-text label, which is stored as a
//! null-padded UTF-8 string.

use ethers_core::utils::{format_bytes32_string, parse_bytes32_string};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ValidationError;

/// Longest free-text identifier that fits a `bytes32` with a terminating null.
pub const MAX_LABEL_BYTES: usize = 31;

/// Normalized on-chain shipment identifier.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct ShipmentId([u8; 32]);

impl ShipmentId {
    /// Normalize user input into an identifier.
    ///
    /// `0x` followed by exactly 64 hex digits is taken as-is. Anything else
    /// is encoded as a null-padded string if it is at most 31 bytes long.
    pub fn normalize(input: &str) -> Result<Self, ValidationError> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(ValidationError::EmptyIdentifier);
        }

        if is_bytes32_hex(trimmed) {
            let mut bytes = [0u8; 32];
            hex::decode_to_slice(&trimmed[2..], &mut bytes)
                .map_err(|_| ValidationError::IdentifierTooLong(trimmed.len()))?;
            return Ok(Self(bytes));
        }

        if trimmed.len() > MAX_LABEL_BYTES {
            return Err(ValidationError::IdentifierTooLong(trimmed.len()));
        }

        format_bytes32_string(trimmed)
            .map(Self)
            .map_err(|_| ValidationError::IdentifierTooLong(trimmed.len()))
    }

    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Lowercase `0x`-prefixed hex form.
    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.0))
    }

    /// Decode the free-text label, if the identifier was built from one.
    pub fn label(&self) -> Option<String> {
        if self.0[31] != 0 || self.0[0] == 0 {
            return None;
        }
        parse_bytes32_string(&self.0).ok().map(str::to_owned)
    }
}

fn is_bytes32_hex(value: &str) -> bool {
    value.len() == 66
        && value.starts_with("0x")
        && value[2..].bytes().all(|b| b.is_ascii_hexdigit())
}

impl fmt::Display for ShipmentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for ShipmentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.label() {
            Some(label) => write!(f, "ShipmentId({} {:?})", self.to_hex(), label),
            None => write!(f, "ShipmentId({})", self.to_hex()),
        }
    }
}

impl FromStr for ShipmentId {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::normalize(s)
    }
}

impl TryFrom<String> for ShipmentId {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::normalize(&value)
    }
}

impl From<ShipmentId> for String {
    fn from(id: ShipmentId) -> Self {
        id.to_hex()
    }
}
