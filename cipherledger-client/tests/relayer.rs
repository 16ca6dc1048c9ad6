//! HTTP relayer provider against a fake relayer.

use axum::{extract::State, http::StatusCode, routing::{get, post}, Json, Router};
use cipherledger_client::{
    EncryptionProvider, EncryptionRequest, EncryptionRuntime, ProviderFactory,
    RelayerEncryptionProvider, RelayerFactory,
};
use cipherledger_core::{BitWidth, EncryptionError, Metric};
use ethers::types::Address;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Clone, Copy)]
enum Reply {
    Valid,
    ShortHandle,
    EmptyProof,
    ServerError,
}

struct FakeRelayer {
    ready_after: usize,
    health_polls: AtomicUsize,
    reply: Reply,
    bodies: Mutex<Vec<Value>>,
}

async fn health(State(relayer): State<Arc<FakeRelayer>>) -> StatusCode {
    let polls = relayer.health_polls.fetch_add(1, Ordering::SeqCst) + 1;
    if polls > relayer.ready_after {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}

async fn encrypt(
    State(relayer): State<Arc<FakeRelayer>>,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    relayer.bodies.lock().unwrap().push(body);
    let handle = format!("0x{}", "11".repeat(32));
    match relayer.reply {
        Reply::Valid => (StatusCode::OK, Json(json!({ "handle": handle, "proof": "0xbeef" }))),
        Reply::ShortHandle => (StatusCode::OK, Json(json!({ "handle": "0x1111", "proof": "0xbeef" }))),
        Reply::EmptyProof => (StatusCode::OK, Json(json!({ "handle": handle, "proof": "0x" }))),
        Reply::ServerError => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": "keys not loaded" })),
        ),
    }
}

async fn spawn_relayer(ready_after: usize, reply: Reply) -> (String, Arc<FakeRelayer>) {
    let relayer = Arc::new(FakeRelayer {
        ready_after,
        health_polls: AtomicUsize::new(0),
        reply,
        bodies: Mutex::new(Vec::new()),
    });
    let app = Router::new()
        .route("/health", get(health))
        .route("/v1/encrypt", post(encrypt))
        .with_state(relayer.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (format!("http://{addr}"), relayer)
}

fn request() -> EncryptionRequest {
    EncryptionRequest {
        metric: Metric::DeclaredValue,
        bits: BitWidth::U64,
        value: 250_000,
        contract: Address::repeat_byte(0xcc),
        user: Address::repeat_byte(0xaa),
    }
}

#[tokio::test]
async fn test_factory_waits_for_readiness() {
    let (url, relayer) = spawn_relayer(3, Reply::Valid).await;
    let factory = RelayerFactory::new(url).with_poll_interval(Duration::from_millis(10));

    let provider = factory.create().await.unwrap();
    assert_eq!(relayer.health_polls.load(Ordering::SeqCst), 4);

    let field = provider.encrypt(request()).await.unwrap();
    assert_eq!(field.handle, [0x11; 32]);
    assert_eq!(field.proof, vec![0xbe, 0xef]);
    assert_eq!(field.bits, BitWidth::U64);
    assert!(field.is_bound_to(Address::repeat_byte(0xcc), Address::repeat_byte(0xaa)));

    let bodies = relayer.bodies.lock().unwrap();
    assert_eq!(bodies[0]["bits"], 64);
    assert_eq!(bodies[0]["value"], 250_000);
    assert_eq!(
        bodies[0]["contract_address"].as_str().unwrap().to_lowercase(),
        format!("0x{}", "cc".repeat(20))
    );
}

#[tokio::test]
async fn test_runtime_times_out_when_relayer_never_ready() {
    let (url, _relayer) = spawn_relayer(usize::MAX, Reply::Valid).await;
    let runtime = EncryptionRuntime::new();
    let factory = RelayerFactory::new(url).with_poll_interval(Duration::from_millis(10));

    let result = runtime.get_or_init(&factory, Duration::from_millis(200)).await;
    assert!(matches!(
        result,
        Err(EncryptionError::InitTimeout(timeout)) if timeout == Duration::from_millis(200)
    ));
}

#[tokio::test]
async fn test_malformed_responses() {
    for reply in [Reply::ShortHandle, Reply::EmptyProof] {
        let (url, _relayer) = spawn_relayer(0, reply).await;
        let provider = RelayerEncryptionProvider::new(url);
        assert!(matches!(
            provider.encrypt(request()).await,
            Err(EncryptionError::MalformedResponse(_))
        ));
    }
}

#[tokio::test]
async fn test_server_error_is_encryption_failure() {
    let (url, _relayer) = spawn_relayer(0, Reply::ServerError).await;
    let provider = RelayerEncryptionProvider::new(url);

    match provider.encrypt(request()).await {
        Err(EncryptionError::Failed(message)) => assert!(message.contains("500")),
        other => panic!("expected Failed, got {other:?}"),
    }
}

#[tokio::test]
async fn test_unreachable_relayer_is_unavailable() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let provider = RelayerEncryptionProvider::new(format!("http://{addr}"));
    assert!(matches!(
        provider.encrypt(request()).await,
        Err(EncryptionError::Unavailable(_))
    ));
}
