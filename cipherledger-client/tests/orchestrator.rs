//! Orchestrator behavior against in-memory collaborators.

use async_trait::async_trait;
use cipherledger_client::{
    EncryptionProvider, EncryptionRequest, LedgerCall, LedgerClient, ShipmentOrchestrator,
    SubmissionProgress,
};
use cipherledger_core::{
    CargoCategory, ConfigurationError, ContractCallError, EncryptedField, EncryptionError,
    LedgerError, LedgerManifest, ReceiptStatus, ShipmentDraft, ShipmentId, ShipmentMetrics,
    ShipmentStatus, TxReceipt, ValidationError,
};
use ethers::abi::Token;
use ethers::types::{Address, H256, U256};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

const CHAIN_ID: u64 = 11_155_111;

fn contract() -> Address {
    Address::repeat_byte(0xcc)
}

fn account() -> Address {
    Address::repeat_byte(0xaa)
}

fn dispatched_hash() -> H256 {
    H256::repeat_byte(0xab)
}

// ═══════════════════════════════════════════════════════════════════════════════
// MOCKS
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Default)]
struct MockEncryption {
    calls: AtomicUsize,
    requests: Mutex<Vec<EncryptionRequest>>,
    fail: bool,
}

#[async_trait]
impl EncryptionProvider for MockEncryption {
    async fn encrypt(&self, request: EncryptionRequest) -> Result<EncryptedField, EncryptionError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push(request);
        if self.fail {
            return Err(EncryptionError::Failed("relayer error".into()));
        }
        Ok(EncryptedField {
            handle: [n as u8 + 1; 32],
            proof: vec![0xee; 4],
            bits: request.bits,
            contract: request.contract,
            user: request.user,
        })
    }
}

#[derive(Clone, Copy)]
enum ReceiptOutcome {
    Success,
    Failed,
    Dropped,
    Malformed,
}

struct MockLedger {
    sent: Mutex<Vec<LedgerCall>>,
    reads: Mutex<Vec<LedgerCall>>,
    receipt: ReceiptOutcome,
    send_error: Option<ContractCallError>,
    responses: HashMap<String, Vec<Token>>,
    missing_ids: HashSet<Vec<u8>>,
}

impl MockLedger {
    fn new() -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            reads: Mutex::new(Vec::new()),
            receipt: ReceiptOutcome::Success,
            send_error: None,
            responses: HashMap::new(),
            missing_ids: HashSet::new(),
        }
    }

    fn with_receipt(mut self, receipt: ReceiptOutcome) -> Self {
        self.receipt = receipt;
        self
    }

    fn respond(mut self, function: &str, tokens: Vec<Token>) -> Self {
        self.responses.insert(function.to_string(), tokens);
        self
    }

    fn sent_count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }

    fn call_count(&self) -> usize {
        self.sent_count() + self.reads.lock().unwrap().len()
    }
}

#[async_trait]
impl LedgerClient for MockLedger {
    fn account(&self) -> Address {
        account()
    }

    fn chain_id(&self) -> u64 {
        CHAIN_ID
    }

    async fn send(&self, call: LedgerCall) -> Result<H256, ContractCallError> {
        self.sent.lock().unwrap().push(call);
        match &self.send_error {
            Some(err) => Err(err.clone()),
            None => Ok(dispatched_hash()),
        }
    }

    async fn wait_for_receipt(&self, tx_hash: H256, _confirmations: usize) -> Result<TxReceipt, ContractCallError> {
        let status = match self.receipt {
            ReceiptOutcome::Success => ReceiptStatus::Success,
            ReceiptOutcome::Failed => ReceiptStatus::Failed,
            ReceiptOutcome::Dropped => {
                return Err(ContractCallError::network("transaction dropped from mempool"))
            }
            ReceiptOutcome::Malformed => {
                return Err(ContractCallError::invalid_response("receipt missing logs bloom"))
            }
        };
        Ok(TxReceipt {
            tx_hash,
            block_number: Some(7),
            gas_used: Some(21_000),
            status,
        })
    }

    async fn call(&self, call: LedgerCall) -> Result<Vec<Token>, ContractCallError> {
        let name = call.name().to_string();
        let first_arg = match call.args.first() {
            Some(Token::FixedBytes(bytes)) => Some(bytes.clone()),
            _ => None,
        };
        self.reads.lock().unwrap().push(call);

        if let Some(id) = first_arg {
            if self.missing_ids.contains(&id) {
                return Err(ContractCallError::network("rpc timeout"));
            }
        }
        self.responses
            .get(&name)
            .cloned()
            .ok_or_else(|| ContractCallError::reverted(format!("no response for {name}")))
    }
}

fn orchestrator(
    manifest: LedgerManifest,
    ledger: &Arc<MockLedger>,
    encryption: &Arc<MockEncryption>,
) -> ShipmentOrchestrator {
    ShipmentOrchestrator::new(ledger.clone(), encryption.clone(), manifest, contract()).unwrap()
}

fn draft() -> ShipmentDraft {
    ShipmentDraft {
        shipment_id: "SHIP-2024-001".into(),
        carrier: "0x5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed".into(),
        receiver: "0xfb6916095ca1df60bb79ce92ce3ea74c37c5d359".into(),
        metrics: ShipmentMetrics {
            weight_kg: 1200,
            volume_cubic_meters: 30,
            declared_value: 250_000,
            quantity: 40,
            temperature: 4,
            humidity: 55,
            fragility_score: 7,
            priority: 2,
            risk_code: 3,
        },
        category: "Pharmaceutical".into(),
    }
}

fn compact_record(shipper: Address, category: &str, status: u8) -> Vec<Token> {
    let mut tokens = vec![
        Token::Address(shipper),
        Token::Address(Address::zero()),
        Token::Address(Address::zero()),
        Token::String(category.into()),
        Token::Uint(U256::from(status)),
        Token::Uint(U256::zero()),
        Token::Uint(U256::zero()),
        Token::Bool(!shipper.is_zero()),
    ];
    tokens.extend((0..6).map(|_| Token::Uint(U256::zero())));
    tokens
}

// ═══════════════════════════════════════════════════════════════════════════════
// SUBMISSION
// ═══════════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn test_encryption_count_per_variant() {
    for (manifest, expected) in [
        (LedgerManifest::full(), 9),
        (LedgerManifest::simplified(), 4),
        (LedgerManifest::ultra_simplified(), 1),
    ] {
        let gas_limit = manifest.gas_limit;
        let ledger = Arc::new(MockLedger::new());
        let encryption = Arc::new(MockEncryption::default());
        let orchestrator = orchestrator(manifest, &ledger, &encryption);

        let result = orchestrator.submit_shipment(&draft(), |_| {}).await.unwrap();

        assert_eq!(encryption.calls.load(Ordering::SeqCst), expected);
        assert!(encryption
            .requests
            .lock()
            .unwrap()
            .iter()
            .all(|r| r.contract == contract() && r.user == account()));

        let sent = ledger.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].name(), "submitShipment");
        assert_eq!(sent[0].contract, contract());
        assert_eq!(sent[0].gas_limit, Some(gas_limit));
        assert_eq!(sent[0].args.len(), sent[0].function.inputs.len());

        assert_eq!(result.tx_hash, dispatched_hash());
        assert_eq!(result.shipment_id.label().as_deref(), Some("SHIP-2024-001"));
        assert!(result.receipt.succeeded());
    }
}

#[tokio::test]
async fn test_submission_arguments_keep_manifest_order() {
    let ledger = Arc::new(MockLedger::new());
    let encryption = Arc::new(MockEncryption::default());
    let orchestrator = orchestrator(LedgerManifest::simplified(), &ledger, &encryption);

    orchestrator.submit_shipment(&draft(), |_| {}).await.unwrap();

    let requests = encryption.requests.lock().unwrap();
    let mut values: Vec<u64> = requests.iter().map(|r| r.value).collect();
    values.sort_unstable();
    assert_eq!(values, vec![3, 40, 1200, 250_000]);

    let sent = ledger.sent.lock().unwrap();
    let args = &sent[0].args;
    // plaintext temperature, humidity, priority, then the category index
    assert_eq!(args[11], Token::Uint(U256::from(4)));
    assert_eq!(args[12], Token::Uint(U256::from(55)));
    assert_eq!(args[13], Token::Uint(U256::from(2)));
    assert_eq!(
        args[14],
        Token::Uint(U256::from(CargoCategory::Pharmaceutical.index()))
    );
}

#[tokio::test]
async fn test_invalid_carrier_makes_no_calls() {
    let ledger = Arc::new(MockLedger::new());
    let encryption = Arc::new(MockEncryption::default());
    let orchestrator = orchestrator(LedgerManifest::full(), &ledger, &encryption);

    let bad = ShipmentDraft {
        carrier: "not-an-address".into(),
        ..draft()
    };
    let err = orchestrator.submit_shipment(&bad, |_| {}).await.unwrap_err();

    assert!(matches!(
        err,
        LedgerError::Validation(ValidationError::InvalidAddress { .. })
    ));
    assert_eq!(encryption.calls.load(Ordering::SeqCst), 0);
    assert_eq!(ledger.call_count(), 0);
}

#[tokio::test]
async fn test_unknown_category_and_long_id_make_no_calls() {
    let ledger = Arc::new(MockLedger::new());
    let encryption = Arc::new(MockEncryption::default());
    let orchestrator = orchestrator(LedgerManifest::ultra_simplified(), &ledger, &encryption);

    let toys = ShipmentDraft {
        category: "Toys".into(),
        ..draft()
    };
    assert!(matches!(
        orchestrator.submit_shipment(&toys, |_| {}).await,
        Err(LedgerError::Validation(ValidationError::UnknownCategory(_)))
    ));

    let long_id = ShipmentDraft {
        shipment_id: "x".repeat(32),
        ..draft()
    };
    assert!(matches!(
        orchestrator.submit_shipment(&long_id, |_| {}).await,
        Err(LedgerError::Validation(ValidationError::IdentifierTooLong(32)))
    ));

    assert_eq!(encryption.calls.load(Ordering::SeqCst), 0);
    assert_eq!(ledger.call_count(), 0);
}

#[tokio::test]
async fn test_out_of_range_value_rejected() {
    let ledger = Arc::new(MockLedger::new());
    let encryption = Arc::new(MockEncryption::default());
    let orchestrator = orchestrator(LedgerManifest::full(), &ledger, &encryption);

    let mut heavy = draft();
    heavy.metrics.fragility_score = 300;
    let err = orchestrator.submit_shipment(&heavy, |_| {}).await.unwrap_err();

    assert_eq!(err.error_code(), "VALIDATION_ERROR");
    assert_eq!(encryption.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_failed_receipt_carries_tx_hash() {
    for outcome in [ReceiptOutcome::Failed, ReceiptOutcome::Dropped] {
        let ledger = Arc::new(MockLedger::new().with_receipt(outcome));
        let encryption = Arc::new(MockEncryption::default());
        let orchestrator = orchestrator(LedgerManifest::simplified(), &ledger, &encryption);

        let err = orchestrator.submit_shipment(&draft(), |_| {}).await.unwrap_err();
        assert_eq!(err.tx_hash(), Some(dispatched_hash()));
        assert_eq!(ledger.sent_count(), 1);
    }
}

#[tokio::test]
async fn test_malformed_receipt_carries_tx_hash() {
    let ledger = Arc::new(MockLedger::new().with_receipt(ReceiptOutcome::Malformed));
    let encryption = Arc::new(MockEncryption::default());
    let orchestrator = orchestrator(LedgerManifest::simplified(), &ledger, &encryption);

    let err = orchestrator.submit_shipment(&draft(), |_| {}).await.unwrap_err();
    assert_eq!(err.error_code(), "INVALID_RESPONSE");
    assert_eq!(err.tx_hash(), Some(dispatched_hash()));
    assert!(!err.is_retryable());
    assert_eq!(ledger.sent_count(), 1);

    let err = orchestrator.mark_lost("SHIP-2024-001").await.unwrap_err();
    assert_eq!(err.error_code(), "INVALID_RESPONSE");
    assert_eq!(err.tx_hash(), Some(dispatched_hash()));
}

#[tokio::test]
async fn test_encryption_failure_stops_before_dispatch() {
    let ledger = Arc::new(MockLedger::new());
    let encryption = Arc::new(MockEncryption {
        fail: true,
        ..Default::default()
    });
    let orchestrator = orchestrator(LedgerManifest::simplified(), &ledger, &encryption);

    let err = orchestrator.submit_shipment(&draft(), |_| {}).await.unwrap_err();
    assert!(matches!(err, LedgerError::Encryption(EncryptionError::Failed(_))));
    assert!(err.is_retryable());
    assert_eq!(ledger.sent_count(), 0);
}

#[tokio::test]
async fn test_progress_sequence() {
    let ledger = Arc::new(MockLedger::new());
    let encryption = Arc::new(MockEncryption::default());
    let orchestrator = orchestrator(LedgerManifest::full(), &ledger, &encryption);

    let mut events = Vec::new();
    orchestrator
        .submit_shipment(&draft(), |event| events.push(event))
        .await
        .unwrap();

    assert_eq!(events.len(), 5);
    assert!(matches!(events[0], SubmissionProgress::Encrypting { count: 9, .. }));
    assert!(matches!(events[1], SubmissionProgress::Encrypted { count: 9, .. }));
    assert_eq!(
        events[2],
        SubmissionProgress::Dispatched {
            tx_hash: dispatched_hash()
        }
    );
    assert!(matches!(
        events[3],
        SubmissionProgress::AwaitingConfirmation { confirmations: 1, .. }
    ));
    assert_eq!(
        events[4],
        SubmissionProgress::Confirmed {
            tx_hash: dispatched_hash(),
            block_number: Some(7)
        }
    );
}

#[tokio::test]
async fn test_zero_contract_is_configuration_error() {
    let ledger: Arc<MockLedger> = Arc::new(MockLedger::new());
    let encryption = Arc::new(MockEncryption::default());

    let result = ShipmentOrchestrator::new(ledger.clone(), encryption, LedgerManifest::full(), Address::zero());
    assert!(matches!(
        result,
        Err(LedgerError::Configuration(ConfigurationError::ContractNotConfigured(CHAIN_ID)))
    ));
    assert_eq!(ledger.call_count(), 0);
}

// ═══════════════════════════════════════════════════════════════════════════════
// LIFECYCLE AND ROLES
// ═══════════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn test_mark_lost_rejected_by_contract() {
    let ledger = Arc::new(MockLedger {
        send_error: Some(ContractCallError::reverted("execution reverted: Not owner")),
        ..MockLedger::new()
    });
    let encryption = Arc::new(MockEncryption::default());
    let orchestrator = orchestrator(LedgerManifest::simplified(), &ledger, &encryption);

    let err = orchestrator.mark_lost("SHIP-2024-001").await.unwrap_err();
    assert_eq!(err.error_code(), "CONTRACT_REVERTED");
    assert!(!err.is_retryable());
    assert_eq!(encryption.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_lifecycle_transitions() {
    let ledger = Arc::new(MockLedger::new());
    let encryption = Arc::new(MockEncryption::default());
    let orchestrator = orchestrator(LedgerManifest::full(), &ledger, &encryption);

    let transit = orchestrator.start_transit("SHIP-2024-001").await.unwrap();
    let delivered = orchestrator.mark_delivered("SHIP-2024-001").await.unwrap();

    assert_eq!(transit.action, "startTransit");
    assert_eq!(delivered.action, "markDelivered");
    assert_eq!(transit.tx_hash, dispatched_hash());
    assert_eq!(
        transit.shipment_id,
        Some(ShipmentId::normalize("SHIP-2024-001").unwrap())
    );

    let sent = ledger.sent.lock().unwrap();
    assert_eq!(sent.len(), 2);
    assert_eq!(sent[0].gas_limit, None);
    assert_eq!(
        sent[1].args,
        vec![Token::FixedBytes(
            ShipmentId::normalize("SHIP-2024-001").unwrap().as_bytes().to_vec()
        )]
    );
}

#[tokio::test]
async fn test_role_management() {
    let ledger = Arc::new(MockLedger::new().respond("isCarrier", vec![Token::Bool(true)]));
    let encryption = Arc::new(MockEncryption::default());
    let orchestrator = orchestrator(LedgerManifest::simplified(), &ledger, &encryption);

    let carrier = "0x5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed";
    let result = orchestrator.authorize_carrier(carrier).await.unwrap();
    assert_eq!(result.account, Some(carrier.parse().unwrap()));
    assert!(orchestrator.is_carrier(carrier).await.unwrap());

    assert!(matches!(
        orchestrator.add_inspector("0x1234").await,
        Err(LedgerError::Validation(_))
    ));
    assert_eq!(ledger.sent_count(), 1);
}

// ═══════════════════════════════════════════════════════════════════════════════
// READS
// ═══════════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn test_fetch_unknown_shipment_returns_sentinel() {
    let ledger = Arc::new(
        MockLedger::new().respond("getShipmentInfo", compact_record(Address::zero(), "", 0)),
    );
    let encryption = Arc::new(MockEncryption::default());
    let orchestrator = orchestrator(LedgerManifest::simplified(), &ledger, &encryption);

    let record = orchestrator.fetch_shipment("NEVER-SUBMITTED").await.unwrap();

    assert!(!record.is_found());
    assert!(record.shipper.is_zero());
    assert_eq!(record.category, None);
    assert_eq!(record.category_label, "");
    assert_eq!(record.status, ShipmentStatus::Draft);
    assert!(!record.is_active);
}

#[tokio::test]
async fn test_supply_stats() {
    let ledger = Arc::new(MockLedger::new().respond(
        "getSupplyStats",
        vec![
            Token::Uint(U256::from(12)),
            Token::Uint(U256::from(5)),
            Token::Uint(U256::from(6)),
        ],
    ));
    let encryption = Arc::new(MockEncryption::default());
    let orchestrator = orchestrator(LedgerManifest::ultra_simplified(), &ledger, &encryption);

    let stats = orchestrator.supply_stats().await.unwrap();
    assert_eq!(stats.total_shipments, 12);
    assert_eq!(stats.active, Some(6));
    assert_eq!(stats.lost, None);
}

#[tokio::test]
async fn test_assess_risk_requires_manifest_support() {
    let ledger = Arc::new(MockLedger::new());
    let encryption = Arc::new(MockEncryption::default());
    let orchestrator = orchestrator(LedgerManifest::ultra_simplified(), &ledger, &encryption);

    assert!(matches!(
        orchestrator.assess_risk("SHIP-2024-001").await,
        Err(LedgerError::Configuration(ConfigurationError::Invalid(_)))
    ));
    assert_eq!(ledger.call_count(), 0);
}

#[tokio::test]
async fn test_user_shipments_skip_failed_records() {
    let first = ShipmentId::normalize("SHIP-A").unwrap();
    let broken = ShipmentId::normalize("SHIP-B").unwrap();
    let id_token = |id: &ShipmentId| Token::FixedBytes(id.as_bytes().to_vec());

    let mut ledger = MockLedger::new()
        .respond(
            "getAllUserShipments",
            vec![
                Token::Array(vec![id_token(&first), id_token(&broken)]),
                Token::Array(vec![]),
                Token::Array(vec![id_token(&first)]),
            ],
        )
        .respond("getShipmentInfo", compact_record(account(), "Perishable", 2));
    ledger.missing_ids.insert(broken.as_bytes().to_vec());

    let ledger = Arc::new(ledger);
    let encryption = Arc::new(MockEncryption::default());
    let orchestrator = orchestrator(LedgerManifest::simplified(), &ledger, &encryption);

    let shipments = orchestrator.user_shipments(None).await.unwrap();
    assert_eq!(shipments.as_shipper.len(), 1);
    assert_eq!(shipments.as_shipper[0].shipment_id, first);
    assert_eq!(shipments.as_shipper[0].status, ShipmentStatus::InTransit);
    assert_eq!(shipments.as_shipper[0].category, Some(CargoCategory::Perishable));
    assert!(shipments.as_carrier.is_empty());
    assert_eq!(shipments.as_receiver.len(), 1);

    let reads = ledger.reads.lock().unwrap();
    assert_eq!(reads[0].args, vec![Token::Address(account())]);
}
