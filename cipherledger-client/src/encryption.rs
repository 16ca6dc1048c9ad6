//! FHE encryption provider seam and the process-wide provider runtime.

use async_trait::async_trait;
use cipherledger_core::{BitWidth, EncryptedField, EncryptionError, Metric};
use ethers::types::Address;
use once_cell::sync::Lazy;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Default bound on provider initialization.
pub const DEFAULT_INIT_TIMEOUT: Duration = Duration::from_secs(15);

/// One value to encrypt, bound to a contract and the submitting user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncryptionRequest {
    pub metric: Metric,
    pub bits: BitWidth,
    pub value: u64,
    pub contract: Address,
    pub user: Address,
}

/// Produces ciphertext handles and validity proofs.
#[async_trait]
pub trait EncryptionProvider: Send + Sync {
    async fn encrypt(&self, request: EncryptionRequest) -> Result<EncryptedField, EncryptionError>;
}

/// Builds a ready-to-use provider.
#[async_trait]
pub trait ProviderFactory: Send + Sync {
    async fn create(&self) -> Result<Arc<dyn EncryptionProvider>, EncryptionError>;
}

/// Factory used when no provider is configured.
pub struct UnavailableFactory {
    reason: String,
}

impl UnavailableFactory {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

#[async_trait]
impl ProviderFactory for UnavailableFactory {
    async fn create(&self) -> Result<Arc<dyn EncryptionProvider>, EncryptionError> {
        Err(EncryptionError::Unavailable(self.reason.clone()))
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// RUNTIME
// ═══════════════════════════════════════════════════════════════════════════════

/// Lazily-initialized, memoized provider handle.
///
/// At most one initialization runs at a time; callers arriving while it runs
/// wait for it and share its result. A failed initialization leaves the
/// runtime empty so the next caller tries again.
pub struct EncryptionRuntime {
    provider: RwLock<Option<Arc<dyn EncryptionProvider>>>,
    init: Mutex<()>,
}

impl EncryptionRuntime {
    pub fn new() -> Self {
        Self {
            provider: RwLock::new(None),
            init: Mutex::new(()),
        }
    }

    /// Return the memoized provider, creating it with `factory` on first use.
    ///
    /// `timeout` bounds the whole call, including time spent queued behind
    /// another caller's initialization.
    pub async fn get_or_init(
        &self,
        factory: &dyn ProviderFactory,
        timeout: Duration,
    ) -> Result<Arc<dyn EncryptionProvider>, EncryptionError> {
        if let Some(provider) = self.provider.read().await.as_ref() {
            return Ok(Arc::clone(provider));
        }

        let deadline = Instant::now() + timeout;
        match tokio::time::timeout_at(deadline, self.initialize(factory, timeout)).await {
            Ok(result) => result,
            Err(_) => {
                warn!("Encryption provider not ready after {:?}", timeout);
                Err(EncryptionError::InitTimeout(timeout))
            }
        }
    }

    async fn initialize(
        &self,
        factory: &dyn ProviderFactory,
        timeout: Duration,
    ) -> Result<Arc<dyn EncryptionProvider>, EncryptionError> {
        let _guard = self.init.lock().await;
        if let Some(provider) = self.provider.read().await.as_ref() {
            return Ok(Arc::clone(provider));
        }

        debug!("Initializing encryption provider (timeout {:?})", timeout);
        let provider = factory.create().await?;

        *self.provider.write().await = Some(Arc::clone(&provider));
        info!("Encryption provider initialized");
        Ok(provider)
    }

    /// Install a provider directly, replacing any memoized one.
    pub async fn install(&self, provider: Arc<dyn EncryptionProvider>) {
        *self.provider.write().await = Some(provider);
    }

    pub async fn is_initialized(&self) -> bool {
        self.provider.read().await.is_some()
    }

    /// Drop the memoized provider; the next use initializes a fresh one.
    pub async fn reset(&self) {
        if self.provider.write().await.take().is_some() {
            info!("Encryption provider reset");
        }
    }
}

impl Default for EncryptionRuntime {
    fn default() -> Self {
        Self::new()
    }
}

static RUNTIME: Lazy<EncryptionRuntime> = Lazy::new(EncryptionRuntime::new);

/// Process-wide encryption runtime.
pub fn global() -> &'static EncryptionRuntime {
    &RUNTIME
}

/// Provider that initializes a runtime on first encryption and delegates to it.
pub struct SharedEncryption {
    runtime: &'static EncryptionRuntime,
    factory: Arc<dyn ProviderFactory>,
    timeout: Duration,
}

impl SharedEncryption {
    pub fn new(runtime: &'static EncryptionRuntime, factory: Arc<dyn ProviderFactory>, timeout: Duration) -> Self {
        Self {
            runtime,
            factory,
            timeout,
        }
    }

    /// Backed by the process-wide runtime.
    pub fn global(factory: Arc<dyn ProviderFactory>, timeout: Duration) -> Self {
        Self::new(global(), factory, timeout)
    }
}

#[async_trait]
impl EncryptionProvider for SharedEncryption {
    async fn encrypt(&self, request: EncryptionRequest) -> Result<EncryptedField, EncryptionError> {
        let provider = self
            .runtime
            .get_or_init(self.factory.as_ref(), self.timeout)
            .await?;
        provider.encrypt(request).await
    }
}
