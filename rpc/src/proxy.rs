//! Filtered JSON-RPC relay from the public gateway to instance nodes.
//!
//! The relay reads the body only to find the instance and check `method`
//! names. Permitted requests go to the node byte for byte and the node's
//! answer comes back unchanged apart from hop-by-hop headers.

use std::sync::Arc;
use std::time::Duration;

use axum::body::Bytes;
use axum::http::{header, HeaderMap, HeaderName, StatusCode};
use serde_json::{json, Value};

use sandbox_store::{InstanceRegistry, StoreError};
use sandbox_types::{InstanceId, NodeInfo};

use crate::policy::{MethodPolicy, PolicyViolation};
use crate::RpcError;

pub const INVALID_PARAMS: i64 = -32602;
pub const INVALID_REQUEST: i64 = -32600;

const UPSTREAM_TIMEOUT: Duration = Duration::from_secs(30);

const HOP_BY_HOP: [HeaderName; 6] = [
    header::CONNECTION,
    header::TRANSFER_ENCODING,
    header::TE,
    header::TRAILER,
    header::UPGRADE,
    header::CONTENT_LENGTH,
];

/// What the node answered.
#[derive(Debug)]
pub struct UpstreamResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RejectReason {
    InvalidInstance,
    Policy(PolicyViolation),
}

#[derive(Debug)]
pub enum ProxyOutcome {
    Forwarded(UpstreamResponse),
    /// Refused without contacting any node; `document` is the JSON-RPC
    /// error to hand back.
    Rejected { reason: RejectReason, document: Value },
}

/// JSON-RPC error object echoing the caller's id.
pub fn error_document(id: Value, code: i64, message: &str) -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": id,
        "error": { "code": code, "message": message },
    })
}

fn request_id(body: &Value) -> Value {
    body.get("id").cloned().unwrap_or(Value::Null)
}

#[derive(Clone)]
pub struct RpcProxy {
    registry: Arc<dyn InstanceRegistry>,
    http: reqwest::Client,
}

impl RpcProxy {
    pub fn new(registry: Arc<dyn InstanceRegistry>) -> Result<Self, RpcError> {
        let http = reqwest::Client::builder()
            .timeout(UPSTREAM_TIMEOUT)
            .build()
            .map_err(|e| RpcError::Internal(format!("http client: {e}")))?;
        Ok(Self { registry, http })
    }

    /// Relay `raw` to the node of instance `uuid` if the instance exists
    /// and every method in the request is permitted for its family.
    pub async fn forward(&self, uuid: &InstanceId, raw: Bytes) -> Result<ProxyOutcome, RpcError> {
        let body: Value =
            serde_json::from_slice(&raw).map_err(|e| RpcError::MalformedBody(e.to_string()))?;
        let id = request_id(&body);

        let node = match self.registry.load(uuid) {
            Ok(node) => node,
            Err(StoreError::NotFound(_)) => {
                tracing::debug!(%uuid, "relay to unknown instance");
                return Ok(ProxyOutcome::Rejected {
                    reason: RejectReason::InvalidInstance,
                    document: error_document(id, INVALID_PARAMS, "invalid uuid specified"),
                });
            }
            Err(e) => return Err(RpcError::Internal(e.to_string())),
        };

        if let Err(violation) = MethodPolicy::for_backend(node.backend).check(&body) {
            tracing::info!(%uuid, team = %node.team_id, "relay refused: {violation}");
            return Ok(ProxyOutcome::Rejected {
                reason: RejectReason::Policy(violation),
                document: error_document(id, INVALID_REQUEST, "invalid request"),
            });
        }

        self.relay(&node, raw).await.map(ProxyOutcome::Forwarded)
    }

    async fn relay(&self, node: &NodeInfo, raw: Bytes) -> Result<UpstreamResponse, RpcError> {
        let response = self
            .http
            .post(format!("{}/", node.rpc_url()))
            .header(header::CONTENT_TYPE, "application/json")
            .body(raw)
            .send()
            .await
            .map_err(|e| RpcError::Upstream(format!("instance {}: {e}", node.uuid)))?;

        let status = response.status();
        let mut headers = response.headers().clone();
        for name in &HOP_BY_HOP {
            headers.remove(name);
        }
        let body = response
            .bytes()
            .await
            .map_err(|e| RpcError::Upstream(format!("instance {}: {e}", node.uuid)))?;
        Ok(UpstreamResponse { status, headers, body })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_document_shape() {
        let doc = error_document(json!(7), INVALID_PARAMS, "invalid uuid specified");
        assert_eq!(doc["jsonrpc"], "2.0");
        assert_eq!(doc["id"], 7);
        assert_eq!(doc["error"]["code"], -32602);
        assert_eq!(doc["error"]["message"], "invalid uuid specified");
    }

    #[test]
    fn batch_has_no_single_id() {
        assert_eq!(request_id(&json!([{"id": 1}])), Value::Null);
        assert_eq!(request_id(&json!({"id": "abc"})), json!("abc"));
    }
}
