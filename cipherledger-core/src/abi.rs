//! Contract ABI derived from a deployment manifest.

use ethers_core::abi::{parse_abi, Abi, Function};

use crate::error::ConfigurationError;
use crate::manifest::LedgerManifest;

pub const SUBMIT_SHIPMENT: &str = "submitShipment";
pub const START_TRANSIT: &str = "startTransit";
pub const MARK_DELIVERED: &str = "markDelivered";
pub const MARK_LOST: &str = "markLost";
pub const GET_SHIPMENT_INFO: &str = "getShipmentInfo";
pub const IS_CARRIER: &str = "isCarrier";
pub const IS_INSPECTOR: &str = "isInspector";
pub const AUTHORIZE_CARRIER: &str = "authorizeCarrier";
pub const REVOKE_CARRIER: &str = "revokeCarrier";
pub const ADD_INSPECTOR: &str = "addInspector";
pub const REMOVE_INSPECTOR: &str = "removeInspector";
pub const ASSESS_RISK: &str = "assessRisk";
pub const GET_ALL_USER_SHIPMENTS: &str = "getAllUserShipments";
pub const GET_SHIPPER_SHIPMENT_COUNT: &str = "getShipperShipmentCount";

/// Parsed ABI of one ledger deployment.
#[derive(Debug, Clone)]
pub struct LedgerAbi {
    manifest_name: String,
    stats_function: String,
    abi: Abi,
}

impl LedgerAbi {
    pub fn from_manifest(manifest: &LedgerManifest) -> Result<Self, ConfigurationError> {
        let signatures = manifest.abi_signatures();
        let refs: Vec<&str> = signatures.iter().map(String::as_str).collect();
        let abi = parse_abi(&refs).map_err(|e| {
            ConfigurationError::Invalid(format!("manifest {} ABI: {e}", manifest.name))
        })?;

        Ok(Self {
            manifest_name: manifest.name.clone(),
            stats_function: manifest.stats.name.clone(),
            abi,
        })
    }

    /// Look up a function the deployment exposes.
    pub fn function(&self, name: &str) -> Result<&Function, ConfigurationError> {
        self.abi.function(name).map_err(|_| {
            ConfigurationError::Invalid(format!(
                "deployment {} does not expose {name}",
                self.manifest_name
            ))
        })
    }

    pub fn stats(&self) -> Result<&Function, ConfigurationError> {
        self.function(&self.stats_function)
    }

    pub fn abi(&self) -> &Abi {
        &self.abi
    }
}
