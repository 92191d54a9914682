//! Relay behaviour against a local echo node.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::post;
use axum::Router;
use serde_json::{json, Value};
use tokio::net::TcpListener;

use sandbox_nullables::NullRegistry;
use sandbox_rpc::{PolicyViolation, ProxyOutcome, RejectReason, RpcError, RpcProxy};
use sandbox_store::InstanceRegistry;
use sandbox_types::{AccountInfo, BackendKind, InstanceId, NodeInfo, TeamId};

/// Answers every request with its own body and counts hits.
async fn echo(State(hits): State<Arc<AtomicUsize>>, body: Bytes) -> impl IntoResponse {
    hits.fetch_add(1, Ordering::SeqCst);
    let mut headers = HeaderMap::new();
    headers.insert("content-type", "application/json".parse().unwrap());
    headers.insert("x-node", "echo".parse().unwrap());
    (StatusCode::OK, headers, body)
}

async fn echo_node() -> (u16, Arc<AtomicUsize>) {
    let hits = Arc::new(AtomicUsize::new(0));
    let app = Router::new().route("/", post(echo)).with_state(hits.clone());
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (port, hits)
}

fn node(backend: BackendKind, port: u16) -> NodeInfo {
    let accounts = (0..backend.account_arity())
        .map(|i| AccountInfo::new(format!("a{i}"), format!("k{i}"), format!("p{i}")))
        .collect();
    NodeInfo {
        backend,
        port,
        accounts,
        process_id: 1,
        uuid: InstanceId::random(),
        team_id: TeamId::new("teamA").unwrap(),
        seed: None,
        contract_addr: None,
    }
}

async fn setup(backend: BackendKind) -> (RpcProxy, NodeInfo, Arc<AtomicUsize>) {
    let (port, hits) = echo_node().await;
    let registry = Arc::new(NullRegistry::new());
    let n = node(backend, port);
    registry.save(&n).unwrap();
    (RpcProxy::new(registry).unwrap(), n, hits)
}

fn rejected(outcome: ProxyOutcome) -> (RejectReason, Value) {
    match outcome {
        ProxyOutcome::Rejected { reason, document } => (reason, document),
        ProxyOutcome::Forwarded(r) => panic!("unexpectedly forwarded: {:?}", r.status),
    }
}

#[tokio::test]
async fn permitted_request_is_relayed_byte_for_byte() {
    let (proxy, n, hits) = setup(BackendKind::Evm).await;
    let raw = Bytes::from_static(br#"{"jsonrpc":"2.0",   "id":1,"method":"eth_chainId","params":[]}"#);

    let outcome = proxy.forward(&n.uuid, raw.clone()).await.unwrap();
    let ProxyOutcome::Forwarded(upstream) = outcome else {
        panic!("request was rejected");
    };
    assert_eq!(upstream.status, StatusCode::OK);
    assert_eq!(upstream.body, raw);
    assert_eq!(upstream.headers.get("x-node").unwrap(), "echo");
    assert!(upstream.headers.get("content-length").is_none());
    assert_eq!(hits.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn unknown_instance_never_reaches_a_node() {
    let (proxy, _, hits) = setup(BackendKind::Evm).await;
    let raw = Bytes::from(json!({"jsonrpc": "2.0", "id": 42, "method": "eth_chainId"}).to_string());

    let (reason, doc) = rejected(proxy.forward(&InstanceId::random(), raw).await.unwrap());
    assert_eq!(reason, RejectReason::InvalidInstance);
    assert_eq!(doc["id"], 42);
    assert_eq!(doc["error"]["code"], -32602);
    assert_eq!(doc["error"]["message"], "invalid uuid specified");
    assert_eq!(hits.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn unsigned_transactions_are_refused() {
    let (proxy, n, hits) = setup(BackendKind::Evm).await;
    let raw = Bytes::from(
        json!({"jsonrpc": "2.0", "id": "x", "method": "eth_sendUnsignedTransaction", "params": []}).to_string(),
    );

    let (reason, doc) = rejected(proxy.forward(&n.uuid, raw).await.unwrap());
    assert_eq!(
        reason,
        RejectReason::Policy(PolicyViolation::Disallowed("eth_sendUnsignedTransaction".into()))
    );
    assert_eq!(doc["id"], "x");
    assert_eq!(doc["error"]["code"], -32600);
    assert_eq!(doc["error"]["message"], "invalid request");
    assert_eq!(hits.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn solana_airdrop_is_refused() {
    let (proxy, n, hits) = setup(BackendKind::Solana).await;
    let raw = Bytes::from(json!({"jsonrpc": "2.0", "id": 1, "method": "requestAirdrop"}).to_string());

    let (reason, _) = rejected(proxy.forward(&n.uuid, raw).await.unwrap());
    assert!(matches!(reason, RejectReason::Policy(_)));
    assert_eq!(hits.load(Ordering::SeqCst), 0);

    let balance = Bytes::from(json!({"jsonrpc": "2.0", "id": 2, "method": "getBalance"}).to_string());
    assert!(matches!(
        proxy.forward(&n.uuid, balance).await.unwrap(),
        ProxyOutcome::Forwarded(_)
    ));
    assert_eq!(hits.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn policy_follows_the_instance_family() {
    let (proxy, n, hits) = setup(BackendKind::Starknet).await;
    let raw = Bytes::from(json!({"jsonrpc": "2.0", "id": 1, "method": "eth_chainId"}).to_string());

    let (reason, _) = rejected(proxy.forward(&n.uuid, raw).await.unwrap());
    assert!(matches!(reason, RejectReason::Policy(PolicyViolation::Disallowed(_))));
    assert_eq!(hits.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn missing_method_is_an_invalid_request() {
    let (proxy, n, hits) = setup(BackendKind::Evm).await;
    let raw = Bytes::from(json!({"jsonrpc": "2.0", "id": 3}).to_string());

    let (reason, doc) = rejected(proxy.forward(&n.uuid, raw).await.unwrap());
    assert_eq!(reason, RejectReason::Policy(PolicyViolation::MissingMethod));
    assert_eq!(doc["error"]["code"], -32600);
    assert_eq!(hits.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn batch_with_one_denied_call_is_refused_whole() {
    let (proxy, n, hits) = setup(BackendKind::Evm).await;
    let raw = Bytes::from(
        json!([
            {"jsonrpc": "2.0", "id": 1, "method": "eth_blockNumber"},
            {"jsonrpc": "2.0", "id": 2, "method": "anvil_setBalance"},
        ])
        .to_string(),
    );

    let (_, doc) = rejected(proxy.forward(&n.uuid, raw).await.unwrap());
    assert_eq!(doc["id"], Value::Null);
    assert_eq!(hits.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn non_json_body_is_an_error() {
    let (proxy, n, hits) = setup(BackendKind::Evm).await;
    let err = proxy
        .forward(&n.uuid, Bytes::from_static(b"not json"))
        .await
        .unwrap_err();
    assert!(matches!(err, RpcError::MalformedBody(_)));
    assert_eq!(hits.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn dead_node_is_an_upstream_error() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);

    let registry = Arc::new(NullRegistry::new());
    let n = node(BackendKind::Evm, port);
    registry.save(&n).unwrap();
    let proxy = RpcProxy::new(registry).unwrap();

    let raw = Bytes::from(json!({"jsonrpc": "2.0", "id": 1, "method": "eth_chainId"}).to_string());
    let err = proxy.forward(&n.uuid, raw).await.unwrap_err();
    assert_eq!(err.code(), "upstream");
}
