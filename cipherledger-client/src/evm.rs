//! Ledger client over an EVM JSON-RPC endpoint.

use async_trait::async_trait;
use cipherledger_core::{ConfigurationError, ContractCallError, LedgerError, ReceiptStatus, TxReceipt};
use ethers::{
    abi::Token,
    prelude::*,
    types::{transaction::eip2718::TypedTransaction, Address, Bytes, H256},
};
use std::sync::Arc;
use tracing::{debug, info};

use crate::ledger::{LedgerCall, LedgerClient};

type SignerClient = SignerMiddleware<Provider<Http>, LocalWallet>;

/// Ledger client backed by `ethers` with a local signing key.
pub struct EthersLedgerClient {
    client: Arc<SignerClient>,
    chain_id: u64,
}

impl EthersLedgerClient {
    /// Connect to `rpc_url` and bind the signer to the node's chain id.
    pub async fn connect(rpc_url: &str, private_key: &str) -> Result<Self, LedgerError> {
        let provider = Provider::<Http>::try_from(rpc_url)
            .map_err(|e| ConfigurationError::Invalid(format!("rpc url {rpc_url:?}: {e}")))?;

        let wallet = private_key
            .trim()
            .parse::<LocalWallet>()
            .map_err(|_| ConfigurationError::Invalid("invalid private key".into()))?;

        let chain_id = provider
            .get_chainid()
            .await
            .map_err(|e| ContractCallError::network(format!("eth_chainId: {e}")))?
            .as_u64();
        let wallet = wallet.with_chain_id(chain_id);

        info!("Connected to chain {} as {:?}", chain_id, wallet.address());

        Ok(Self {
            client: Arc::new(SignerMiddleware::new(provider, wallet)),
            chain_id,
        })
    }

    fn encode(call: &LedgerCall) -> Result<Bytes, ContractCallError> {
        call.function
            .encode_input(&call.args)
            .map(Bytes::from)
            .map_err(|e| ContractCallError::invalid_response(format!("encoding {}: {e}", call.name())))
    }
}

/// Map a node or middleware error onto the call error taxonomy.
fn classify(context: &str, message: String) -> ContractCallError {
    if message.to_ascii_lowercase().contains("revert") {
        ContractCallError::reverted(message)
    } else {
        ContractCallError::network(format!("{context}: {message}"))
    }
}

#[async_trait]
impl LedgerClient for EthersLedgerClient {
    fn account(&self) -> Address {
        self.client.address()
    }

    fn chain_id(&self) -> u64 {
        self.chain_id
    }

    async fn send(&self, call: LedgerCall) -> Result<H256, ContractCallError> {
        let data = Self::encode(&call)?;
        let mut tx = TransactionRequest::new().to(call.contract).data(data);
        if let Some(gas) = call.gas_limit {
            tx = tx.gas(gas);
        }

        debug!("Sending {} to {:?}", call.name(), call.contract);

        let pending = self
            .client
            .send_transaction(tx, None)
            .await
            .map_err(|e| classify(call.name(), e.to_string()))?;
        let tx_hash = pending.tx_hash();

        info!("Transaction submitted: {} {:?}", call.name(), tx_hash);
        Ok(tx_hash)
    }

    async fn wait_for_receipt(&self, tx_hash: H256, confirmations: usize) -> Result<TxReceipt, ContractCallError> {
        let receipt = PendingTransaction::new(tx_hash, self.client.provider())
            .confirmations(confirmations.max(1))
            .await
            .map_err(|e| classify("receipt", e.to_string()).with_tx_hash(tx_hash))?
            .ok_or_else(|| {
                ContractCallError::network("transaction dropped from mempool").with_tx_hash(tx_hash)
            })?;

        // Pre-Byzantium receipts carry no status.
        let status = match receipt.status {
            Some(status) if status.is_zero() => ReceiptStatus::Failed,
            _ => ReceiptStatus::Success,
        };

        Ok(TxReceipt {
            tx_hash: receipt.transaction_hash,
            block_number: receipt.block_number.map(|n| n.as_u64()),
            gas_used: receipt.gas_used.map(|g| g.low_u64()),
            status,
        })
    }

    async fn call(&self, call: LedgerCall) -> Result<Vec<Token>, ContractCallError> {
        let data = Self::encode(&call)?;
        let tx: TypedTransaction = TransactionRequest::new().to(call.contract).data(data).into();

        let output = self
            .client
            .call(&tx, None)
            .await
            .map_err(|e| classify(call.name(), e.to_string()))?;

        call.function
            .decode_output(&output)
            .map_err(|e| ContractCallError::invalid_response(format!("{}: {e}", call.name())))
    }
}
