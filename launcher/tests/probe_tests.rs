//! Liveness probing and the JSON-RPC client against an in-process node stub.

use axum::{routing::post, Json, Router};
use serde_json::{json, Value};
use std::time::Duration;
use tokio::net::TcpListener;

use sandbox_launcher::{JsonRpcClient, LivenessProbe, ProbeFailure, ProbePolicy, RpcCallError};

async fn fake_node(body: Json<Value>) -> Json<Value> {
    let id = body.get("id").cloned().unwrap_or(Value::Null);
    match body.get("method").and_then(Value::as_str) {
        Some("web3_clientVersion") => Json(json!({ "jsonrpc": "2.0", "id": id, "result": "anvil/v0.2.0" })),
        Some("getVersion") => Json(json!({ "jsonrpc": "2.0", "id": id, "result": { "solana-core": "1.18.0" } })),
        _ => Json(json!({
            "jsonrpc": "2.0",
            "id": id,
            "error": { "code": -32601, "message": "Method not found" }
        })),
    }
}

async fn serve_fake_node() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = Router::new().route("/", post(fake_node));
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

fn quick() -> ProbePolicy {
    ProbePolicy {
        interval: Duration::from_millis(5),
        max_attempts: 4,
    }
}

#[tokio::test]
async fn probe_succeeds_against_answering_node() {
    let url = serve_fake_node().await;
    let attempts = LivenessProbe::evm(&url).wait_until_live(&quick(), None).await.unwrap();
    assert_eq!(attempts, 1);
    assert!(LivenessProbe::solana(&url).check().await);
}

#[tokio::test]
async fn rpc_error_is_not_liveness() {
    let url = serve_fake_node().await;
    // the stub rejects the starknet method
    assert!(!LivenessProbe::starknet(&url).check().await);
}

#[tokio::test]
async fn probe_exhausts_against_closed_port() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let failure = LivenessProbe::evm(format!("http://{addr}"))
        .wait_until_live(&quick(), None)
        .await
        .unwrap_err();
    assert!(matches!(failure, ProbeFailure::Exhausted { attempts: 4 }));
}

#[tokio::test]
async fn client_returns_result_and_maps_errors() {
    let url = serve_fake_node().await;
    let client = JsonRpcClient::new(&url);

    let version = client.call("web3_clientVersion", json!([])).await.unwrap();
    assert_eq!(version, "anvil/v0.2.0");

    match client.call("eth_unknown", json!([])).await.unwrap_err() {
        RpcCallError::Rpc { code, message } => {
            assert_eq!(code, -32601);
            assert_eq!(message, "Method not found");
        }
        other => panic!("unexpected error: {other}"),
    }
}
