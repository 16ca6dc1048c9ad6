//! Shipment submission orchestrator.
//!
//! Drives one deployment of the ledger contract: validates and normalizes
//! shipment drafts, encrypts the fields the deployment manifest marks as
//! sensitive, submits them, and awaits the receipt. Also exposes the
//! lifecycle triggers, role management and read paths of the contract.
//!
//! The contract owns all shipment state. Nothing here enforces lifecycle
//! rules; rejections come back as [`ContractCallError::Reverted`].

use cipherledger_core::abi::{
    ADD_INSPECTOR, ASSESS_RISK, AUTHORIZE_CARRIER, GET_ALL_USER_SHIPMENTS, GET_SHIPMENT_INFO,
    GET_SHIPPER_SHIPMENT_COUNT, IS_CARRIER, IS_INSPECTOR, MARK_DELIVERED, MARK_LOST,
    REMOVE_INSPECTOR, REVOKE_CARRIER, START_TRANSIT, SUBMIT_SHIPMENT,
};
use cipherledger_core::record::{decode_bool, decode_u64};
use cipherledger_core::{
    ActionResult, ConfigurationError, ContractCallError, EncryptedField, EncryptionError, LedgerAbi,
    LedgerError, LedgerManifest, ShipmentDraft, ShipmentId, ShipmentRecord, SubmissionResult,
    SupplyStats, TxReceipt, UserShipmentIds, UserShipments, DEFAULT_CONFIRMATIONS,
};
use ethers::abi::Token;
use ethers::types::{Address, H256};
use futures::future::{join_all, try_join_all};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

use crate::encryption::{EncryptionProvider, EncryptionRequest};
use crate::ledger::{LedgerCall, LedgerClient};
use crate::progress::SubmissionProgress;

pub struct ShipmentOrchestrator {
    ledger: Arc<dyn LedgerClient>,
    encryption: Arc<dyn EncryptionProvider>,
    manifest: LedgerManifest,
    abi: LedgerAbi,
    contract: Address,
    confirmations: usize,
}

impl ShipmentOrchestrator {
    /// Bind an orchestrator to the contract deployed at `contract` on the
    /// ledger client's chain. A zero address means the chain has no
    /// deployment.
    pub fn new(
        ledger: Arc<dyn LedgerClient>,
        encryption: Arc<dyn EncryptionProvider>,
        manifest: LedgerManifest,
        contract: Address,
    ) -> Result<Self, LedgerError> {
        if contract.is_zero() {
            return Err(ConfigurationError::ContractNotConfigured(ledger.chain_id()).into());
        }
        manifest.validate()?;
        let abi = LedgerAbi::from_manifest(&manifest)?;

        Ok(Self {
            ledger,
            encryption,
            manifest,
            abi,
            contract,
            confirmations: DEFAULT_CONFIRMATIONS,
        })
    }

    /// Blocks to wait for after inclusion; 1 waits for inclusion only.
    pub fn with_confirmations(mut self, confirmations: usize) -> Self {
        self.confirmations = confirmations.max(1);
        self
    }

    pub fn manifest(&self) -> &LedgerManifest {
        &self.manifest
    }

    pub fn contract(&self) -> Address {
        self.contract
    }

    pub fn account(&self) -> Address {
        self.ledger.account()
    }

    pub fn chain_id(&self) -> u64 {
        self.ledger.chain_id()
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // SUBMISSION
    // ═══════════════════════════════════════════════════════════════════════════

    /// Encrypt and submit a shipment, then wait for its receipt.
    ///
    /// Validation failures never reach either collaborator. Once a
    /// transaction hash exists, every error carries it.
    pub async fn submit_shipment<F>(
        &self,
        draft: &ShipmentDraft,
        mut on_progress: F,
    ) -> Result<SubmissionResult, LedgerError>
    where
        F: FnMut(SubmissionProgress) + Send,
    {
        let normalized = draft.normalize()?;
        self.manifest.check_ranges(&normalized)?;

        let user = self.ledger.account();
        debug!(
            shipment_id = %normalized.shipment_id,
            carrier = ?normalized.carrier,
            receiver = ?normalized.receiver,
            category = %normalized.category,
            "Normalized shipment draft"
        );

        let requests: Vec<EncryptionRequest> = self
            .manifest
            .encrypted_fields()
            .map(|(metric, bits)| EncryptionRequest {
                metric,
                bits,
                value: normalized.metrics.get(metric),
                contract: self.contract,
                user,
            })
            .collect();
        let count = requests.len();

        on_progress(SubmissionProgress::Encrypting {
            shipment_id: normalized.shipment_id,
            count,
        });
        let started = Instant::now();
        let encrypted = try_join_all(requests.into_iter().map(|request| self.encrypt(request))).await?;
        let elapsed = started.elapsed();
        debug!("Encrypted {} fields in {:?}", count, elapsed);
        on_progress(SubmissionProgress::Encrypted { count, elapsed });

        let function = self.abi.function(SUBMIT_SHIPMENT)?;
        let args = self.manifest.submission_tokens(&normalized, &encrypted);
        let call = LedgerCall::new(self.contract, function, args).with_gas_limit(self.manifest.gas_limit);

        let tx_hash = self.ledger.send(call).await?;
        info!(
            shipment_id = %normalized.shipment_id,
            "Shipment submitted: {:?}", tx_hash
        );
        on_progress(SubmissionProgress::Dispatched { tx_hash });

        on_progress(SubmissionProgress::AwaitingConfirmation {
            tx_hash,
            confirmations: self.confirmations,
        });
        let receipt = self.confirm(tx_hash).await?;
        on_progress(SubmissionProgress::Confirmed {
            tx_hash,
            block_number: receipt.block_number,
        });

        Ok(SubmissionResult {
            shipment_id: normalized.shipment_id,
            tx_hash,
            receipt,
        })
    }

    async fn encrypt(&self, request: EncryptionRequest) -> Result<EncryptedField, EncryptionError> {
        let field = self.encryption.encrypt(request).await?;
        if !field.is_bound_to(request.contract, request.user) || field.bits != request.bits {
            return Err(EncryptionError::MalformedResponse(format!(
                "{} encrypted for a different binding",
                request.metric
            )));
        }
        Ok(field)
    }

    async fn confirm(&self, tx_hash: H256) -> Result<TxReceipt, ContractCallError> {
        let receipt = self
            .ledger
            .wait_for_receipt(tx_hash, self.confirmations)
            .await
            .map_err(|e| e.with_tx_hash(tx_hash))?;

        if !receipt.succeeded() {
            warn!("Transaction reverted: {:?}", tx_hash);
            return Err(ContractCallError::Reverted {
                reason: "transaction reverted".into(),
                tx_hash: Some(tx_hash),
            });
        }

        info!(
            "Transaction confirmed: {:?} (block {:?})",
            tx_hash, receipt.block_number
        );
        Ok(receipt)
    }

    /// Dispatch a one-shot transaction and wait for its receipt.
    async fn transact(
        &self,
        name: &str,
        args: Vec<Token>,
        shipment_id: Option<ShipmentId>,
        account: Option<Address>,
    ) -> Result<ActionResult, LedgerError> {
        let function = self.abi.function(name)?;
        let tx_hash = self
            .ledger
            .send(LedgerCall::new(self.contract, function, args))
            .await?;
        info!("{} sent: {:?}", name, tx_hash);

        let receipt = self.confirm(tx_hash).await?;
        Ok(ActionResult {
            action: name.to_string(),
            shipment_id,
            account,
            tx_hash,
            receipt,
        })
    }

    async fn read(&self, name: &str, args: Vec<Token>) -> Result<Vec<Token>, LedgerError> {
        let function = self.abi.function(name)?;
        let tokens = self
            .ledger
            .call(LedgerCall::new(self.contract, function, args))
            .await?;
        Ok(tokens)
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // LIFECYCLE
    // ═══════════════════════════════════════════════════════════════════════════

    pub async fn start_transit(&self, shipment_id: &str) -> Result<ActionResult, LedgerError> {
        self.transition(START_TRANSIT, shipment_id).await
    }

    pub async fn mark_delivered(&self, shipment_id: &str) -> Result<ActionResult, LedgerError> {
        self.transition(MARK_DELIVERED, shipment_id).await
    }

    pub async fn mark_lost(&self, shipment_id: &str) -> Result<ActionResult, LedgerError> {
        self.transition(MARK_LOST, shipment_id).await
    }

    async fn transition(&self, name: &str, shipment_id: &str) -> Result<ActionResult, LedgerError> {
        let id = ShipmentId::normalize(shipment_id)?;
        self.transact(name, vec![id_token(&id)], Some(id), None).await
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // ROLES (owner only)
    // ═══════════════════════════════════════════════════════════════════════════

    pub async fn authorize_carrier(&self, carrier: &str) -> Result<ActionResult, LedgerError> {
        self.role_change(AUTHORIZE_CARRIER, "carrier", carrier).await
    }

    pub async fn revoke_carrier(&self, carrier: &str) -> Result<ActionResult, LedgerError> {
        self.role_change(REVOKE_CARRIER, "carrier", carrier).await
    }

    pub async fn add_inspector(&self, inspector: &str) -> Result<ActionResult, LedgerError> {
        self.role_change(ADD_INSPECTOR, "inspector", inspector).await
    }

    pub async fn remove_inspector(&self, inspector: &str) -> Result<ActionResult, LedgerError> {
        self.role_change(REMOVE_INSPECTOR, "inspector", inspector).await
    }

    async fn role_change(&self, name: &str, field: &str, account: &str) -> Result<ActionResult, LedgerError> {
        let account = cipherledger_core::parse_address(field, account)?;
        self.transact(name, vec![Token::Address(account)], None, Some(account))
            .await
    }

    pub async fn is_carrier(&self, account: &str) -> Result<bool, LedgerError> {
        let account = cipherledger_core::parse_address("account", account)?;
        let tokens = self.read(IS_CARRIER, vec![Token::Address(account)]).await?;
        Ok(decode_bool(IS_CARRIER, tokens)?)
    }

    pub async fn is_inspector(&self, account: &str) -> Result<bool, LedgerError> {
        let account = cipherledger_core::parse_address("account", account)?;
        let tokens = self.read(IS_INSPECTOR, vec![Token::Address(account)]).await?;
        Ok(decode_bool(IS_INSPECTOR, tokens)?)
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // READS
    // ═══════════════════════════════════════════════════════════════════════════

    /// Fetch a shipment record. An id the contract has never seen yields the
    /// all-zero record rather than an error; check [`ShipmentRecord::is_found`].
    pub async fn fetch_shipment(&self, shipment_id: &str) -> Result<ShipmentRecord, LedgerError> {
        let id = ShipmentId::normalize(shipment_id)?;
        self.fetch_by_id(id).await
    }

    async fn fetch_by_id(&self, id: ShipmentId) -> Result<ShipmentRecord, LedgerError> {
        let tokens = self.read(GET_SHIPMENT_INFO, vec![id_token(&id)]).await?;
        let record = ShipmentRecord::decode(self.manifest.record_layout, id, tokens)?;
        if !record.is_found() {
            debug!("Shipment {} not found", id);
        }
        Ok(record)
    }

    pub async fn supply_stats(&self) -> Result<SupplyStats, LedgerError> {
        let function = self.abi.stats()?;
        let tokens = self
            .ledger
            .call(LedgerCall::new(self.contract, function, vec![]))
            .await?;
        Ok(SupplyStats::decode(self.manifest.stats.tail, tokens)?)
    }

    /// Whether the contract rates the shipment as low risk.
    pub async fn assess_risk(&self, shipment_id: &str) -> Result<bool, LedgerError> {
        let id = ShipmentId::normalize(shipment_id)?;
        let tokens = self.read(ASSESS_RISK, vec![id_token(&id)]).await?;
        Ok(decode_bool(ASSESS_RISK, tokens)?)
    }

    pub async fn shipper_shipment_count(&self, shipper: Option<&str>) -> Result<u64, LedgerError> {
        let shipper = self.account_or_session("shipper", shipper)?;
        let tokens = self
            .read(GET_SHIPPER_SHIPMENT_COUNT, vec![Token::Address(shipper)])
            .await?;
        Ok(decode_u64(GET_SHIPPER_SHIPMENT_COUNT, tokens)?)
    }

    /// Shipments where `user` (default: the session account) is shipper,
    /// carrier or receiver. Records that fail to load are skipped.
    pub async fn user_shipments(&self, user: Option<&str>) -> Result<UserShipments, LedgerError> {
        let user = self.account_or_session("user", user)?;
        let tokens = self
            .read(GET_ALL_USER_SHIPMENTS, vec![Token::Address(user)])
            .await?;
        let ids = UserShipmentIds::decode(tokens)?;
        debug!("User {:?} takes part in {} shipments", user, ids.len());

        Ok(UserShipments {
            as_shipper: self.fetch_many(&ids.as_shipper).await,
            as_carrier: self.fetch_many(&ids.as_carrier).await,
            as_receiver: self.fetch_many(&ids.as_receiver).await,
        })
    }

    async fn fetch_many(&self, ids: &[ShipmentId]) -> Vec<ShipmentRecord> {
        join_all(ids.iter().map(|id| self.fetch_by_id(*id)))
            .await
            .into_iter()
            .zip(ids)
            .filter_map(|(result, id)| match result {
                Ok(record) => Some(record),
                Err(e) => {
                    warn!("Skipping shipment {}: {}", id, e);
                    None
                }
            })
            .collect()
    }

    fn account_or_session(&self, field: &str, account: Option<&str>) -> Result<Address, LedgerError> {
        match account {
            Some(account) => Ok(cipherledger_core::parse_address(field, account)?),
            None => Ok(self.ledger.account()),
        }
    }
}

fn id_token(id: &ShipmentId) -> Token {
    Token::FixedBytes(id.as_bytes().to_vec())
}
