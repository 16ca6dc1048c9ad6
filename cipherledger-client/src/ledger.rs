//! Ledger contract client seam.

use async_trait::async_trait;
use cipherledger_core::{ContractCallError, TxReceipt};
use ethers::abi::{Function, Token};
use ethers::types::{Address, H256};

/// A call to one ledger contract function.
#[derive(Debug, Clone)]
pub struct LedgerCall {
    pub contract: Address,
    pub function: Function,
    pub args: Vec<Token>,
    /// Explicit gas limit; estimated by the node when absent.
    pub gas_limit: Option<u64>,
}

impl LedgerCall {
    pub fn new(contract: Address, function: &Function, args: Vec<Token>) -> Self {
        Self {
            contract,
            function: function.clone(),
            args,
            gas_limit: None,
        }
    }

    pub fn with_gas_limit(mut self, gas_limit: u64) -> Self {
        self.gas_limit = Some(gas_limit);
        self
    }

    pub fn name(&self) -> &str {
        &self.function.name
    }
}

/// Signs and submits transactions and performs read-only calls for one
/// wallet session.
#[async_trait]
pub trait LedgerClient: Send + Sync {
    /// Signer account of the session.
    fn account(&self) -> Address;

    /// Active chain id of the session.
    fn chain_id(&self) -> u64;

    /// Submit a transaction and return its hash without waiting for inclusion.
    async fn send(&self, call: LedgerCall) -> Result<H256, ContractCallError>;

    /// Wait until `tx_hash` is included with `confirmations` blocks on top
    /// (1 = inclusion only).
    async fn wait_for_receipt(&self, tx_hash: H256, confirmations: usize) -> Result<TxReceipt, ContractCallError>;

    /// Read-only call returning decoded outputs.
    async fn call(&self, call: LedgerCall) -> Result<Vec<Token>, ContractCallError>;
}
