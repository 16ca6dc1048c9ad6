//! Deployment manifests.
//!
//! Ledger deployments differ in which shipment metrics they take encrypted,
//! how the category is passed, and how `getShipmentInfo` lays out its return
//! values. A manifest captures one deployment; every ABI signature the client
//! uses is derived from it.

use ethers_core::abi::Token;
use ethers_core::types::U256;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

use crate::draft::{Metric, NormalizedDraft};
use crate::error::{ConfigurationError, ValidationError};
use crate::EncryptedField;

pub const VARIANT_FULL: &str = "full";
pub const VARIANT_SIMPLIFIED: &str = "simplified";
pub const VARIANT_ULTRA_SIMPLIFIED: &str = "ultra-simplified";

// ═══════════════════════════════════════════════════════════════════════════════
// FIELD ENCODING
// ═══════════════════════════════════════════════════════════════════════════════

/// Width of an encrypted unsigned integer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u16", into = "u16")]
pub enum BitWidth {
    U8,
    U16,
    U32,
    U64,
}

impl BitWidth {
    pub fn bits(self) -> u16 {
        match self {
            BitWidth::U8 => 8,
            BitWidth::U16 => 16,
            BitWidth::U32 => 32,
            BitWidth::U64 => 64,
        }
    }

    pub fn max_value(self) -> u64 {
        match self {
            BitWidth::U8 => u8::MAX as u64,
            BitWidth::U16 => u16::MAX as u64,
            BitWidth::U32 => u32::MAX as u64,
            BitWidth::U64 => u64::MAX,
        }
    }

    pub fn fits(self, value: u64) -> bool {
        value <= self.max_value()
    }
}

impl TryFrom<u16> for BitWidth {
    type Error = String;

    fn try_from(bits: u16) -> Result<Self, Self::Error> {
        match bits {
            8 => Ok(BitWidth::U8),
            16 => Ok(BitWidth::U16),
            32 => Ok(BitWidth::U32),
            64 => Ok(BitWidth::U64),
            other => Err(format!("unsupported bit width {other}")),
        }
    }
}

impl From<BitWidth> for u16 {
    fn from(width: BitWidth) -> Self {
        width.bits()
    }
}

impl fmt::Display for BitWidth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "uint{}", self.bits())
    }
}

/// How a metric travels in `submitShipment`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum FieldEncoding {
    /// Ciphertext handle plus validity proof.
    Encrypted { bits: BitWidth },
    /// Plain `uint256`.
    Plain,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionField {
    pub metric: Metric,
    #[serde(flatten)]
    pub encoding: FieldEncoding,
}

impl SubmissionField {
    pub const fn encrypted(metric: Metric, bits: BitWidth) -> Self {
        Self {
            metric,
            encoding: FieldEncoding::Encrypted { bits },
        }
    }

    pub const fn plain(metric: Metric) -> Self {
        Self {
            metric,
            encoding: FieldEncoding::Plain,
        }
    }
}

/// How the cargo category is passed to `submitShipment`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CategoryArg {
    /// `uint8` index into the category list.
    Index,
    /// `string` label.
    Label,
}

impl CategoryArg {
    fn abi_type(self) -> &'static str {
        match self {
            CategoryArg::Index => "uint8",
            CategoryArg::Label => "string",
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// READ LAYOUTS
// ═══════════════════════════════════════════════════════════════════════════════

/// Return layout of `getShipmentInfo`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordLayout {
    /// Category index, clearance/insurance bookkeeping, no plaintext metrics.
    Full,
    /// Category label followed by the plaintext metrics.
    Compact,
}

impl RecordLayout {
    pub fn signature(self) -> &'static str {
        match self {
            RecordLayout::Full => {
                "function getShipmentInfo(bytes32 shipmentId) view returns (address shipper, \
                 address carrier, address receiver, uint8 category, uint8 status, \
                 uint256 submittedAt, uint256 clearedAt, uint256 deliveredAt, bool isActive, \
                 bool isInsured, uint256 statusChangeCount, uint256 checkpointCount)"
            }
            RecordLayout::Compact => {
                "function getShipmentInfo(bytes32 shipmentId) view returns (address shipper, \
                 address carrier, address receiver, string category, uint8 status, \
                 uint256 submittedAt, uint256 deliveredAt, bool isActive, uint256 weightKg, \
                 uint256 quantity, uint256 riskCode, uint256 temperature, uint256 humidity, \
                 uint256 priority)"
            }
        }
    }

    /// Plaintext metrics trailing the compact layout, in return order.
    pub fn plaintext_metrics(self) -> &'static [Metric] {
        match self {
            RecordLayout::Full => &[],
            RecordLayout::Compact => &[
                Metric::WeightKg,
                Metric::Quantity,
                Metric::RiskCode,
                Metric::Temperature,
                Metric::Humidity,
                Metric::Priority,
            ],
        }
    }
}

/// Third value returned by the stats function.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatsTail {
    Active,
    Lost,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatsFunction {
    pub name: String,
    pub tail: StatsTail,
}

impl StatsFunction {
    pub fn signature(&self) -> String {
        let tail = match self.tail {
            StatsTail::Active => "active",
            StatsTail::Lost => "lost",
        };
        format!(
            "function {}() view returns (uint256 totalShipments, uint256 delivered, uint256 {})",
            self.name, tail
        )
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// MANIFEST
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerManifest {
    pub name: String,
    /// Submission fields. Encrypted fields are passed first, then plaintext
    /// ones, each group in the order listed here.
    pub fields: Vec<SubmissionField>,
    pub category_arg: CategoryArg,
    pub record_layout: RecordLayout,
    pub stats: StatsFunction,
    /// Gas limit attached to `submitShipment`.
    pub gas_limit: u64,
    #[serde(default)]
    pub assess_risk: bool,
    #[serde(default)]
    pub user_queries: bool,
}

impl LedgerManifest {
    /// Nine encrypted metrics, category by index.
    pub fn full() -> Self {
        Self {
            name: VARIANT_FULL.to_string(),
            fields: vec![
                SubmissionField::encrypted(Metric::WeightKg, BitWidth::U64),
                SubmissionField::encrypted(Metric::VolumeCubicMeters, BitWidth::U64),
                SubmissionField::encrypted(Metric::DeclaredValue, BitWidth::U64),
                SubmissionField::encrypted(Metric::Quantity, BitWidth::U32),
                SubmissionField::encrypted(Metric::Temperature, BitWidth::U16),
                SubmissionField::encrypted(Metric::Humidity, BitWidth::U16),
                SubmissionField::encrypted(Metric::FragilityScore, BitWidth::U8),
                SubmissionField::encrypted(Metric::Priority, BitWidth::U32),
                SubmissionField::encrypted(Metric::RiskCode, BitWidth::U8),
            ],
            category_arg: CategoryArg::Index,
            record_layout: RecordLayout::Full,
            stats: StatsFunction {
                name: "getSupplyChainStats".to_string(),
                tail: StatsTail::Lost,
            },
            gas_limit: 10_000_000,
            assess_risk: false,
            user_queries: false,
        }
    }

    /// Four encrypted metrics, environment readings in plaintext.
    pub fn simplified() -> Self {
        Self {
            name: VARIANT_SIMPLIFIED.to_string(),
            fields: vec![
                SubmissionField::encrypted(Metric::WeightKg, BitWidth::U64),
                SubmissionField::encrypted(Metric::DeclaredValue, BitWidth::U64),
                SubmissionField::encrypted(Metric::Quantity, BitWidth::U32),
                SubmissionField::encrypted(Metric::RiskCode, BitWidth::U8),
                SubmissionField::plain(Metric::Temperature),
                SubmissionField::plain(Metric::Humidity),
                SubmissionField::plain(Metric::Priority),
            ],
            category_arg: CategoryArg::Index,
            record_layout: RecordLayout::Compact,
            stats: StatsFunction {
                name: "getSupplyStats".to_string(),
                tail: StatsTail::Active,
            },
            gas_limit: 3_000_000,
            assess_risk: true,
            user_queries: true,
        }
    }

    /// Only the declared value is encrypted; category by label.
    pub fn ultra_simplified() -> Self {
        Self {
            name: VARIANT_ULTRA_SIMPLIFIED.to_string(),
            fields: vec![
                SubmissionField::encrypted(Metric::DeclaredValue, BitWidth::U64),
                SubmissionField::plain(Metric::WeightKg),
                SubmissionField::plain(Metric::Quantity),
                SubmissionField::plain(Metric::RiskCode),
                SubmissionField::plain(Metric::Temperature),
                SubmissionField::plain(Metric::Humidity),
                SubmissionField::plain(Metric::Priority),
            ],
            category_arg: CategoryArg::Label,
            record_layout: RecordLayout::Compact,
            stats: StatsFunction {
                name: "getSupplyStats".to_string(),
                tail: StatsTail::Active,
            },
            gas_limit: 3_000_000,
            assess_risk: false,
            user_queries: false,
        }
    }

    /// Look up a built-in manifest by variant name.
    pub fn builtin(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            VARIANT_FULL => Some(Self::full()),
            VARIANT_SIMPLIFIED => Some(Self::simplified()),
            VARIANT_ULTRA_SIMPLIFIED | "ultra" => Some(Self::ultra_simplified()),
            _ => None,
        }
    }

    /// Parse and validate a manifest supplied as JSON.
    pub fn from_json(json: &str) -> Result<Self, ConfigurationError> {
        let manifest: Self = serde_json::from_str(json)
            .map_err(|e| ConfigurationError::Invalid(format!("manifest: {e}")))?;
        manifest.validate()?;
        Ok(manifest)
    }

    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.name.trim().is_empty() {
            return Err(ConfigurationError::Invalid("manifest name is empty".into()));
        }
        if self.encrypted_count() == 0 {
            return Err(ConfigurationError::Invalid(format!(
                "manifest {} has no encrypted fields",
                self.name
            )));
        }
        let mut seen = HashSet::new();
        for field in &self.fields {
            if !seen.insert(field.metric) {
                return Err(ConfigurationError::Invalid(format!(
                    "manifest {} lists {} twice",
                    self.name, field.metric
                )));
            }
        }
        if self.gas_limit == 0 {
            return Err(ConfigurationError::Invalid(format!(
                "manifest {} has a zero gas limit",
                self.name
            )));
        }
        Ok(())
    }

    /// Encrypted metrics in submission order.
    pub fn encrypted_fields(&self) -> impl Iterator<Item = (Metric, BitWidth)> + '_ {
        self.fields.iter().filter_map(|field| match field.encoding {
            FieldEncoding::Encrypted { bits } => Some((field.metric, bits)),
            FieldEncoding::Plain => None,
        })
    }

    /// Plaintext metrics in submission order.
    pub fn plain_fields(&self) -> impl Iterator<Item = Metric> + '_ {
        self.fields
            .iter()
            .filter(|field| field.encoding == FieldEncoding::Plain)
            .map(|field| field.metric)
    }

    pub fn encrypted_count(&self) -> usize {
        self.encrypted_fields().count()
    }

    /// Reject encrypted values wider than their declared bit width.
    pub fn check_ranges(&self, draft: &NormalizedDraft) -> Result<(), ValidationError> {
        for (metric, bits) in self.encrypted_fields() {
            let value = draft.metrics.get(metric);
            if !bits.fits(value) {
                return Err(ValidationError::ValueOutOfRange {
                    field: metric.abi_name().to_string(),
                    value,
                    bits: bits.bits(),
                });
            }
        }
        Ok(())
    }

    /// Human-readable signature of `submitShipment` for this deployment.
    pub fn submit_signature(&self) -> String {
        let mut params = vec![
            "bytes32 shipmentId".to_string(),
            "address carrier".to_string(),
            "address receiver".to_string(),
        ];
        for (metric, _) in self.encrypted_fields() {
            params.push(format!("bytes32 encrypted{}", capitalize(metric.abi_name())));
            params.push(format!("bytes {}Proof", metric.abi_name()));
        }
        for metric in self.plain_fields() {
            params.push(format!("uint256 {}", metric.abi_name()));
        }
        params.push(format!("{} category", self.category_arg.abi_type()));
        format!("function submitShipment({}) returns (bytes32)", params.join(", "))
    }

    /// Every function signature the client may call on this deployment.
    pub fn abi_signatures(&self) -> Vec<String> {
        let mut signatures: Vec<String> = [
            "function owner() view returns (address)",
            "function authorizeCarrier(address carrier)",
            "function revokeCarrier(address carrier)",
            "function addInspector(address inspector)",
            "function removeInspector(address inspector)",
            "function isCarrier(address account) view returns (bool)",
            "function isInspector(address account) view returns (bool)",
            "function startTransit(bytes32 shipmentId)",
            "function markDelivered(bytes32 shipmentId)",
            "function markLost(bytes32 shipmentId)",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();

        signatures.push(self.submit_signature());
        signatures.push(self.record_layout.signature().to_string());
        signatures.push(self.stats.signature());

        if self.assess_risk {
            signatures.push("function assessRisk(bytes32 shipmentId) view returns (bool)".into());
        }
        if self.user_queries {
            signatures.push(
                "function getAllUserShipments(address user) view returns (bytes32[] asShipper, \
                 bytes32[] asCarrier, bytes32[] asReceiver)"
                    .into(),
            );
            signatures.push(
                "function getShipperShipmentCount(address shipper) view returns (uint256)".into(),
            );
        }
        signatures
    }

    /// Positional `submitShipment` arguments.
    ///
    /// `encrypted` must hold one field per encrypted metric, in manifest order.
    pub fn submission_tokens(&self, draft: &NormalizedDraft, encrypted: &[EncryptedField]) -> Vec<Token> {
        debug_assert_eq!(encrypted.len(), self.encrypted_count());

        let mut tokens = Vec::with_capacity(4 + encrypted.len() * 2 + self.fields.len());
        tokens.push(Token::FixedBytes(draft.shipment_id.as_bytes().to_vec()));
        tokens.push(Token::Address(draft.carrier));
        tokens.push(Token::Address(draft.receiver));

        for field in encrypted {
            tokens.push(Token::FixedBytes(field.handle.to_vec()));
            tokens.push(Token::Bytes(field.proof.clone()));
        }

        for metric in self.plain_fields() {
            tokens.push(Token::Uint(U256::from(draft.metrics.get(metric))));
        }

        tokens.push(match self.category_arg {
            CategoryArg::Index => Token::Uint(U256::from(draft.category.index())),
            CategoryArg::Label => Token::String(draft.category.label().to_string()),
        });
        tokens
    }
}

fn capitalize(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
        None => String::new(),
    }
}
