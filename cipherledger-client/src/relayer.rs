//! HTTP encryption relayer client.
//!
//! The relayer exposes two endpoints:
//! - `GET  {base}/health` answers 2xx once the FHE keys are loaded.
//! - `POST {base}/v1/encrypt` encrypts one value for a contract/user pair.

use async_trait::async_trait;
use cipherledger_core::{checksum, EncryptedField, EncryptionError};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::encryption::{EncryptionProvider, EncryptionRequest, ProviderFactory};

/// Interval between readiness checks.
pub const READINESS_POLL_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Debug, Serialize)]
struct EncryptBody {
    bits: u16,
    value: u64,
    contract_address: String,
    user_address: String,
}

#[derive(Debug, Deserialize)]
struct EncryptResponse {
    handle: String,
    proof: String,
}

pub struct RelayerEncryptionProvider {
    client: reqwest::Client,
    base_url: String,
}

impl RelayerEncryptionProvider {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Poll the health endpoint until it answers with success.
    ///
    /// Never gives up on its own; callers bound it with a timeout.
    pub async fn wait_until_ready(&self, poll_interval: Duration) {
        let url = format!("{}/health", self.base_url);
        loop {
            match self.client.get(&url).send().await {
                Ok(response) if response.status().is_success() => return,
                Ok(response) => debug!("Encryption relayer not ready: HTTP {}", response.status()),
                Err(e) => debug!("Encryption relayer not reachable: {}", e),
            }
            tokio::time::sleep(poll_interval).await;
        }
    }
}

#[async_trait]
impl EncryptionProvider for RelayerEncryptionProvider {
    async fn encrypt(&self, request: EncryptionRequest) -> Result<EncryptedField, EncryptionError> {
        let body = EncryptBody {
            bits: request.bits.bits(),
            value: request.value,
            contract_address: checksum(&request.contract),
            user_address: checksum(&request.user),
        };

        let response = self
            .client
            .post(format!("{}/v1/encrypt", self.base_url))
            .json(&body)
            .send()
            .await
            .map_err(|e| EncryptionError::Unavailable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(EncryptionError::Failed(format!("HTTP {status}: {text}")));
        }

        let parsed: EncryptResponse = response
            .json()
            .await
            .map_err(|e| EncryptionError::MalformedResponse(e.to_string()))?;

        let handle = decode_hex("handle", &parsed.handle)?;
        let handle: [u8; 32] = handle.try_into().map_err(|bytes: Vec<u8>| {
            EncryptionError::MalformedResponse(format!("handle is {} bytes, expected 32", bytes.len()))
        })?;
        let proof = decode_hex("proof", &parsed.proof)?;
        if proof.is_empty() {
            return Err(EncryptionError::MalformedResponse("empty proof".into()));
        }

        Ok(EncryptedField {
            handle,
            proof,
            bits: request.bits,
            contract: request.contract,
            user: request.user,
        })
    }
}

fn decode_hex(field: &str, value: &str) -> Result<Vec<u8>, EncryptionError> {
    let digits = value.strip_prefix("0x").unwrap_or(value);
    hex::decode(digits).map_err(|e| EncryptionError::MalformedResponse(format!("{field}: {e}")))
}

/// Creates a relayer provider once the relayer reports ready.
pub struct RelayerFactory {
    base_url: String,
    poll_interval: Duration,
}

impl RelayerFactory {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            poll_interval: READINESS_POLL_INTERVAL,
        }
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }
}

#[async_trait]
impl ProviderFactory for RelayerFactory {
    async fn create(&self) -> Result<Arc<dyn EncryptionProvider>, EncryptionError> {
        let provider = RelayerEncryptionProvider::new(self.base_url.clone());
        provider.wait_until_ready(self.poll_interval).await;
        Ok(Arc::new(provider))
    }
}
