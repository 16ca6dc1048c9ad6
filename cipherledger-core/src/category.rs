//! Closed enumerations shared with the ledger contract.
//!
//! Index order is part of the contract ABI.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ValidationError;

/// Cargo category labels in contract index order.
pub const CARGO_CATEGORIES: [&str; 6] = [
    "GeneralGoods",
    "Perishable",
    "Hazardous",
    "HighValue",
    "Pharmaceutical",
    "Electronics",
];

/// Shipment status labels in contract index order.
pub const SHIPMENT_STATUSES: [&str; 5] = ["Draft", "Submitted", "InTransit", "Delivered", "Lost"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum CargoCategory {
    GeneralGoods = 0,
    Perishable = 1,
    Hazardous = 2,
    HighValue = 3,
    Pharmaceutical = 4,
    Electronics = 5,
}

impl CargoCategory {
    pub const ALL: [CargoCategory; 6] = [
        CargoCategory::GeneralGoods,
        CargoCategory::Perishable,
        CargoCategory::Hazardous,
        CargoCategory::HighValue,
        CargoCategory::Pharmaceutical,
        CargoCategory::Electronics,
    ];

    /// Resolve a form label to its category. Labels are matched exactly.
    pub fn resolve(label: &str) -> Result<Self, ValidationError> {
        CARGO_CATEGORIES
            .iter()
            .position(|candidate| *candidate == label)
            .map(|index| Self::ALL[index])
            .ok_or_else(|| ValidationError::UnknownCategory(label.to_string()))
    }

    pub fn from_index(index: u8) -> Option<Self> {
        Self::ALL.get(index as usize).copied()
    }

    pub fn index(self) -> u8 {
        self as u8
    }

    pub fn label(self) -> &'static str {
        CARGO_CATEGORIES[self as usize]
    }
}

impl fmt::Display for CargoCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for CargoCategory {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::resolve(s)
    }
}

/// Shipment lifecycle status. Transitions are enforced by the contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[repr(u8)]
pub enum ShipmentStatus {
    #[default]
    Draft = 0,
    Submitted = 1,
    InTransit = 2,
    Delivered = 3,
    Lost = 4,
}

impl ShipmentStatus {
    pub const ALL: [ShipmentStatus; 5] = [
        ShipmentStatus::Draft,
        ShipmentStatus::Submitted,
        ShipmentStatus::InTransit,
        ShipmentStatus::Delivered,
        ShipmentStatus::Lost,
    ];

    pub fn from_index(index: u8) -> Option<Self> {
        Self::ALL.get(index as usize).copied()
    }

    pub fn index(self) -> u8 {
        self as u8
    }

    pub fn label(self) -> &'static str {
        SHIPMENT_STATUSES[self as usize]
    }

    /// Delivered and Lost are terminal.
    pub fn is_terminal(self) -> bool {
        matches!(self, ShipmentStatus::Delivered | ShipmentStatus::Lost)
    }
}

impl fmt::Display for ShipmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}
