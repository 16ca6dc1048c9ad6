//! Shipment form input and its normalized form.

use ethers_core::types::Address;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::address::parse_address;
use crate::category::CargoCategory;
use crate::error::ValidationError;
use crate::identifier::ShipmentId;

/// Numeric shipment attributes a deployment may submit, encrypted or not.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    WeightKg,
    VolumeCubicMeters,
    DeclaredValue,
    Quantity,
    Temperature,
    Humidity,
    FragilityScore,
    Priority,
    RiskCode,
}

impl Metric {
    /// Parameter name used in the contract ABI.
    pub fn abi_name(self) -> &'static str {
        match self {
            Metric::WeightKg => "weightKg",
            Metric::VolumeCubicMeters => "volumeCubicMeters",
            Metric::DeclaredValue => "declaredValue",
            Metric::Quantity => "quantity",
            Metric::Temperature => "temperature",
            Metric::Humidity => "humidity",
            Metric::FragilityScore => "fragilityScore",
            Metric::Priority => "priority",
            Metric::RiskCode => "riskCode",
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.abi_name())
    }
}

/// Numeric form values. Metrics a deployment does not use are ignored.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShipmentMetrics {
    pub weight_kg: u64,
    pub volume_cubic_meters: u64,
    pub declared_value: u64,
    pub quantity: u64,
    pub temperature: u64,
    pub humidity: u64,
    pub fragility_score: u64,
    pub priority: u64,
    pub risk_code: u64,
}

impl ShipmentMetrics {
    pub fn get(&self, metric: Metric) -> u64 {
        match metric {
            Metric::WeightKg => self.weight_kg,
            Metric::VolumeCubicMeters => self.volume_cubic_meters,
            Metric::DeclaredValue => self.declared_value,
            Metric::Quantity => self.quantity,
            Metric::Temperature => self.temperature,
            Metric::Humidity => self.humidity,
            Metric::FragilityScore => self.fragility_score,
            Metric::Priority => self.priority,
            Metric::RiskCode => self.risk_code,
        }
    }
}

/// User-supplied shipment form values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShipmentDraft {
    /// Free text (<= 31 bytes) or a 32-byte hex string.
    pub shipment_id: String,
    pub carrier: String,
    pub receiver: String,
    #[serde(default)]
    pub metrics: ShipmentMetrics,
    /// One of the cargo category labels.
    pub category: String,
}

/// Draft with identifier, addresses and category resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedDraft {
    pub shipment_id: ShipmentId,
    pub carrier: Address,
    pub receiver: Address,
    pub category: CargoCategory,
    pub metrics: ShipmentMetrics,
}

impl ShipmentDraft {
    pub fn normalize(&self) -> Result<NormalizedDraft, ValidationError> {
        Ok(NormalizedDraft {
            shipment_id: ShipmentId::normalize(&self.shipment_id)?,
            carrier: parse_address("carrier", &self.carrier)?,
            receiver: parse_address("receiver", &self.receiver)?,
            category: CargoCategory::resolve(&self.category)?,
            metrics: self.metrics,
        })
    }
}
